//! Wave director - round state machine, difficulty curve, zombie spawning and AI

use glam::Vec2;
use rand::Rng;

use crate::ws::protocol::RoundInfo;

use super::level::Obstacle;
use super::physics::{ArenaBounds, PhysicsSystem, PLAYER_RADIUS, ZOMBIE_RADIUS};

/// Reach beyond touching distance for a zombie swipe
pub const MELEE_REACH: f32 = 0.35;
/// Minimum time between zombie hits on the same player
pub const MELEE_COOLDOWN_MS: u64 = 650;
/// Speed added to the fast variant
pub const FAST_VARIANT_BONUS: f32 = 0.9;
/// Upper bound on the fast variant probability
pub const FAST_VARIANT_MAX_CHANCE: f64 = 0.18;
/// Distance outside the wall where zombies appear
pub const SPAWN_OFFSET: f32 = 1.0;

/// Live zombie. `pos` is (x, z) on the ground plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Zombie {
    pub id: u32,
    pub pos: Vec2,
    pub hp: i32,
    pub speed: f32,
    pub fast: bool,
}

/// Process-wide round counters for one arena
#[derive(Debug, Clone, PartialEq)]
pub struct RoundState {
    pub wave: u32,
    pub between: bool,
    pub zombies_target: u32,
    pub zombies_spawned: u32,
    pub zombies_killed: u32,
    pub spawn_every_ms: u64,
    pub last_spawn_at: u64,
}

impl RoundState {
    pub fn new() -> Self {
        Self {
            wave: 1,
            between: true,
            zombies_target: 0,
            zombies_spawned: 0,
            zombies_killed: 0,
            spawn_every_ms: spawn_every_ms(1),
            last_spawn_at: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.between
    }

    pub fn info(&self) -> RoundInfo {
        RoundInfo {
            between: self.between,
            wave: self.wave,
            zombies_target: self.zombies_target,
            zombies_spawned: self.zombies_spawned,
            zombies_killed: self.zombies_killed,
        }
    }
}

impl Default for RoundState {
    fn default() -> Self {
        Self::new()
    }
}

/// floor(8 + wave * 2.4), in integer arithmetic
pub fn zombies_target(wave: u32) -> u32 {
    (40 + wave * 12) / 5
}

pub fn spawn_every_ms(wave: u32) -> u64 {
    (760 - wave as i64 * 18).clamp(280, 760) as u64
}

pub fn zombie_hp(wave: u32) -> i32 {
    90 + wave as i32 * 14
}

pub fn zombie_speed(wave: u32) -> f32 {
    2.1 + wave as f32 * 0.06
}

pub fn fast_variant_chance(wave: u32) -> f64 {
    (wave as f64 * 0.015).min(FAST_VARIANT_MAX_CHANCE)
}

/// Raw swipe damage before armor
pub fn melee_damage(wave: u32) -> i32 {
    10 + (wave * 2 / 5) as i32
}

/// Swipe damage after the target's armor fraction, never below 1
pub fn melee_damage_after_armor(wave: u32, armor: f32) -> i32 {
    let reduced = melee_damage(wave) as f32 * (1.0 - armor.clamp(0.0, 1.0));
    (reduced.round() as i32).max(1)
}

pub fn kill_reward(wave: u32) -> u32 {
    6 + wave * 2 / 5
}

/// A zombie close enough to swipe at its target this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeleeContact {
    pub zid: u32,
    /// Index into the target slice passed to `step_zombies`
    pub target: usize,
}

/// Drives the between/active cycle and owns zombie id allocation
#[derive(Debug, Default)]
pub struct SpawnDirector {
    next_zombie_id: u32,
}

impl SpawnDirector {
    pub fn new() -> Self {
        Self { next_zombie_id: 1 }
    }

    /// Leave the between-rounds phase. Returns false if a wave is already running.
    pub fn start_wave(&self, round: &mut RoundState, now: u64) -> bool {
        if !round.between {
            return false;
        }
        round.between = false;
        round.zombies_target = zombies_target(round.wave);
        round.spawn_every_ms = spawn_every_ms(round.wave);
        round.zombies_spawned = 0;
        round.zombies_killed = 0;
        // First zombie arrives on the next tick
        round.last_spawn_at = now.saturating_sub(round.spawn_every_ms);
        true
    }

    /// Count a kill. Returns true if it ended the wave.
    pub fn record_kill(&self, round: &mut RoundState) -> bool {
        round.zombies_killed += 1;
        if round.is_active() && round.zombies_killed >= round.zombies_target {
            round.between = true;
            round.wave += 1;
            return true;
        }
        false
    }

    /// Spawn at most one zombie if the wave wants more and the cadence elapsed
    pub fn maybe_spawn<R: Rng>(
        &mut self,
        round: &mut RoundState,
        now: u64,
        rng: &mut R,
        bounds: ArenaBounds,
    ) -> Option<Zombie> {
        if !round.is_active() || round.zombies_spawned >= round.zombies_target {
            return None;
        }
        if now < round.last_spawn_at + round.spawn_every_ms {
            return None;
        }

        round.last_spawn_at = now;
        round.zombies_spawned += 1;

        let half = bounds.half_size;
        let along = rng.gen_range(-half..half);
        let out = half + SPAWN_OFFSET;
        let pos = match rng.gen_range(0..4) {
            0 => Vec2::new(along, -out),
            1 => Vec2::new(along, out),
            2 => Vec2::new(-out, along),
            _ => Vec2::new(out, along),
        };

        let fast = rng.gen_bool(fast_variant_chance(round.wave));
        let mut speed = zombie_speed(round.wave);
        if fast {
            speed += FAST_VARIANT_BONUS;
        }

        let id = self.next_zombie_id.max(1);
        self.next_zombie_id = id + 1;

        Some(Zombie {
            id,
            pos,
            hp: zombie_hp(round.wave),
            speed,
            fast,
        })
    }

    /// Walk every zombie toward its nearest living target and report who is
    /// in swiping range. `targets` holds the positions of living players only.
    pub fn step_zombies(
        zombies: &mut [Zombie],
        targets: &[Vec2],
        obstacles: &[Obstacle],
        dt: f32,
    ) -> Vec<MeleeContact> {
        let mut contacts = Vec::new();
        if targets.is_empty() {
            return contacts;
        }

        let reach = PLAYER_RADIUS + ZOMBIE_RADIUS + MELEE_REACH;

        for zombie in zombies.iter_mut() {
            let Some((target, target_pos)) = targets
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.distance_squared(zombie.pos)
                        .total_cmp(&b.distance_squared(zombie.pos))
                })
            else {
                continue;
            };

            let to_target = *target_pos - zombie.pos;
            let dist = to_target.length();
            if dist > 1e-4 {
                let step = (zombie.speed * dt).min(dist);
                zombie.pos += to_target / dist * step;
            }
            PhysicsSystem::push_out_of_obstacles(&mut zombie.pos, ZOMBIE_RADIUS, obstacles);

            if zombie.pos.distance(*target_pos) <= reach {
                contacts.push(MeleeContact {
                    zid: zombie.id,
                    target,
                });
            }
        }

        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const BOUNDS: ArenaBounds = ArenaBounds { half_size: 40.0 };

    #[test]
    fn difficulty_curve_is_exact() {
        for (wave, target) in [(1, 10), (2, 12), (3, 15), (4, 17), (5, 20), (10, 32), (25, 68)] {
            assert_eq!(zombies_target(wave), target);
        }
        for wave in 1..=60u32 {
            let expected = (760i64 - wave as i64 * 18).clamp(280, 760) as u64;
            assert_eq!(spawn_every_ms(wave), expected);
        }
        assert_eq!(spawn_every_ms(1), 742);
        assert_eq!(spawn_every_ms(30), 280);
        assert_eq!(zombie_hp(1), 104);
        assert!((zombie_speed(10) - 2.7).abs() < 1e-5);
        assert_eq!(kill_reward(1), 6);
        assert_eq!(kill_reward(5), 8);
        assert_eq!(fast_variant_chance(100), FAST_VARIANT_MAX_CHANCE);
    }

    #[test]
    fn armor_reduces_melee() {
        assert_eq!(melee_damage(1), 10);
        assert_eq!(melee_damage_after_armor(1, 0.0), 10);
        assert_eq!(melee_damage_after_armor(1, 0.6), 4);
        assert_eq!(melee_damage_after_armor(5, 0.2), 10);
    }

    #[test]
    fn ready_starts_wave_once() {
        let director = SpawnDirector::new();
        let mut round = RoundState::new();
        assert!(director.start_wave(&mut round, 5_000));
        assert!(!round.between);
        assert_eq!(round.wave, 1);
        assert_eq!(round.zombies_target, 10);
        assert!(!director.start_wave(&mut round, 5_100));
    }

    #[test]
    fn wave_ends_on_target_kills() {
        let director = SpawnDirector::new();
        let mut round = RoundState::new();
        director.start_wave(&mut round, 0);
        for _ in 0..9 {
            assert!(!director.record_kill(&mut round));
        }
        assert!(director.record_kill(&mut round));
        assert!(round.between);
        assert_eq!(round.wave, 2);
    }

    #[test]
    fn spawns_follow_cadence_and_target() {
        let mut director = SpawnDirector::new();
        let mut round = RoundState::new();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        assert!(director.maybe_spawn(&mut round, 0, &mut rng, BOUNDS).is_none());

        director.start_wave(&mut round, 10_000);
        let first = director.maybe_spawn(&mut round, 10_000, &mut rng, BOUNDS).unwrap();
        assert_eq!(first.hp, 104);
        assert!(first.pos.x.abs() > 40.0 || first.pos.y.abs() > 40.0);
        assert!(director.maybe_spawn(&mut round, 10_100, &mut rng, BOUNDS).is_none());

        let mut now = 10_000;
        let mut ids = vec![first.id];
        while round.zombies_spawned < round.zombies_target {
            now += round.spawn_every_ms;
            ids.push(director.maybe_spawn(&mut round, now, &mut rng, BOUNDS).unwrap().id);
        }
        assert!(director.maybe_spawn(&mut round, now + 10_000, &mut rng, BOUNDS).is_none());
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn zombies_chase_nearest_and_report_contact() {
        let mut zombies = vec![
            Zombie { id: 1, pos: Vec2::new(10.0, 0.0), hp: 100, speed: 2.0, fast: false },
            Zombie { id: 2, pos: Vec2::new(0.5, 0.0), hp: 100, speed: 2.0, fast: false },
        ];
        let targets = [Vec2::new(0.0, 0.0), Vec2::new(25.0, 0.0)];
        let contacts = SpawnDirector::step_zombies(&mut zombies, &targets, &[], 0.5);

        assert!((zombies[0].pos.x - 9.0).abs() < 1e-5);
        assert_eq!(contacts, vec![MeleeContact { zid: 2, target: 0 }]);

        let mut idle = zombies.clone();
        assert!(SpawnDirector::step_zombies(&mut idle, &[], &[], 0.5).is_empty());
        assert_eq!(idle, zombies);
    }
}
