//! Combat system - hitscan rays, damage falloff, ammo gates

use std::collections::HashMap;

use glam::{Vec2, Vec3};
use rand::Rng;

use crate::ws::protocol::{Aim, HitPart};

use super::director::Zombie;
use super::weapons::{FireMode, Weapon, WeaponState};

/// Ray origin height above the ground plane
pub const EYE_HEIGHT: f32 = 1.6;
pub const BODY_CENTER_Y: f32 = 1.0;
pub const BODY_RADIUS: f32 = 0.70;
pub const HEAD_CENTER_Y: f32 = 1.65;
pub const HEAD_RADIUS: f32 = 0.28;
pub const HEADSHOT_MULTIPLIER: f32 = 2.0;

/// Balancing knob: pellets of one trigger pull that may land on the same zombie
pub const MAX_PELLET_HITS_PER_ZOMBIE: usize = 2;

/// Nearest zombie hitbox struck by one ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub zid: u32,
    pub distance: f32,
    pub part: HitPart,
}

/// Damage applied to one zombie by one pellet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZombieDamage {
    pub zid: u32,
    pub hp: i32,
    pub part: HitPart,
    pub dmg: i32,
    pub killed: bool,
}

/// Result of checking the trigger gates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCheck {
    /// Mid-reload, fire-rate gate closed, or nothing to shoot
    Blocked,
    /// Magazine was empty; a reload has been started instead
    AutoReload,
    /// A bullet may be fired
    Ready,
}

/// Combat system for managing weapons and damage
pub struct CombatSystem;

impl CombatSystem {
    /// Falloff damage at `distance`, doubled on headshots, never below 1
    pub fn damage(weapon: &Weapon, distance: f32, part: HitPart) -> i32 {
        let t = (distance / weapon.range).clamp(0.0, 1.0);
        let base = (weapon.dmg_close + (weapon.dmg_far - weapon.dmg_close) * t).round();
        let scaled = match part {
            HitPart::Head => base * HEADSHOT_MULTIPLIER,
            HitPart::Body => base,
        };
        (scaled.round() as i32).max(1)
    }

    /// Unit view vector; yaw 0 looks down -z, positive pitch looks up
    pub fn aim_direction(yaw: f32, pitch: f32) -> Vec3 {
        Vec3::new(
            -yaw.sin() * pitch.cos(),
            pitch.sin(),
            -yaw.cos() * pitch.cos(),
        )
    }

    /// Distance along a unit ray to a sphere, 0 if the origin is inside it
    pub fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
        let m = origin - center;
        let b = m.dot(dir);
        let c = m.length_squared() - radius * radius;
        if c > 0.0 && b > 0.0 {
            return None;
        }
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        Some((-b - disc.sqrt()).max(0.0))
    }

    /// Nearest hitbox along one ray among all live zombies
    pub fn cast_ray(origin: Vec3, dir: Vec3, range: f32, zombies: &[Zombie]) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;

        for zombie in zombies.iter().filter(|z| z.hp > 0) {
            let head = Vec3::new(zombie.pos.x, HEAD_CENTER_Y, zombie.pos.y);
            let body = Vec3::new(zombie.pos.x, BODY_CENTER_Y, zombie.pos.y);

            // Head wins ties
            let mut hit = Self::ray_sphere(origin, dir, head, HEAD_RADIUS).map(|d| (d, HitPart::Head));
            if let Some(d) = Self::ray_sphere(origin, dir, body, BODY_RADIUS) {
                if hit.map_or(true, |(best_d, _)| d < best_d) {
                    hit = Some((d, HitPart::Body));
                }
            }

            let Some((distance, part)) = hit else { continue };
            if distance > range {
                continue;
            }
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(RayHit {
                    zid: zombie.id,
                    distance,
                    part,
                });
            }
        }

        best
    }

    /// Sort by distance and keep at most `MAX_PELLET_HITS_PER_ZOMBIE` per zombie
    pub fn cap_hits(mut hits: Vec<RayHit>) -> Vec<RayHit> {
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        let mut per_zombie: HashMap<u32, usize> = HashMap::new();
        hits.retain(|hit| {
            let count = per_zombie.entry(hit.zid).or_insert(0);
            *count += 1;
            *count <= MAX_PELLET_HITS_PER_ZOMBIE
        });
        hits
    }

    /// Cast every pellet of one trigger pull from a standing player at `pos`
    pub fn trace_pellets<R: Rng>(
        rng: &mut R,
        pos: Vec2,
        aim: Aim,
        weapon: &Weapon,
        zombies: &[Zombie],
    ) -> Vec<RayHit> {
        let origin = Vec3::new(pos.x, EYE_HEIGHT, pos.y);
        let mut hits = Vec::with_capacity(weapon.pellets as usize);

        for _ in 0..weapon.pellets {
            let (yaw, pitch) = if weapon.spread > 0.0 {
                (
                    aim.yaw + rng.gen_range(-weapon.spread..=weapon.spread),
                    aim.pitch + rng.gen_range(-weapon.spread..=weapon.spread),
                )
            } else {
                (aim.yaw, aim.pitch)
            };
            let dir = Self::aim_direction(yaw, pitch);
            if let Some(hit) = Self::cast_ray(origin, dir, weapon.range, zombies) {
                hits.push(hit);
            }
        }

        Self::cap_hits(hits)
    }

    /// Apply hits in distance order. Dead zombies are removed; later pellets
    /// aimed at an already dead zombie are discarded.
    pub fn apply_hits(zombies: &mut Vec<Zombie>, hits: &[RayHit], weapon: &Weapon) -> Vec<ZombieDamage> {
        let mut applied = Vec::with_capacity(hits.len());

        for hit in hits {
            let Some(zombie) = zombies.iter_mut().find(|z| z.id == hit.zid && z.hp > 0) else {
                continue;
            };
            let dmg = Self::damage(weapon, hit.distance, hit.part);
            zombie.hp -= dmg;
            applied.push(ZombieDamage {
                zid: zombie.id,
                hp: zombie.hp,
                part: hit.part,
                dmg,
                killed: zombie.hp <= 0,
            });
        }

        zombies.retain(|z| z.hp > 0);
        applied
    }

    /// Walk the trigger gates in order: reload timer, fire-rate, magazine.
    pub fn check_trigger(state: &mut WeaponState, weapon: &Weapon, now: u64) -> TriggerCheck {
        if state.settle_reload(now) {
            return TriggerCheck::Blocked;
        }
        if now < state.next_fire_at || state.burst_left > 0 {
            return TriggerCheck::Blocked;
        }
        if state.mag == 0 {
            if state.begin_reload(weapon, now) {
                return TriggerCheck::AutoReload;
            }
            return TriggerCheck::Blocked;
        }
        TriggerCheck::Ready
    }

    /// Spend the first bullet of a trigger pull
    pub fn consume_trigger(state: &mut WeaponState, weapon: &Weapon, now: u64) {
        state.mag -= 1;
        state.next_fire_at = now + weapon.fire_ms;
        if let FireMode::Burst { burst, burst_gap_ms } = weapon.mode {
            state.burst_left = burst - 1;
            state.burst_next_at = now + burst_gap_ms;
        }
    }

    /// Whether a scheduled burst bullet is due. Cancels the remaining burst
    /// when the magazine ran dry or a reload is underway.
    pub fn burst_due(state: &mut WeaponState, now: u64) -> bool {
        if state.burst_left == 0 || now < state.burst_next_at {
            return false;
        }
        if state.mag == 0 || state.reloading {
            state.burst_left = 0;
            return false;
        }
        true
    }

    /// Spend one scheduled burst bullet
    pub fn consume_burst(state: &mut WeaponState, weapon: &Weapon, now: u64) {
        let FireMode::Burst { burst_gap_ms, .. } = weapon.mode else {
            state.burst_left = 0;
            return;
        };
        state.mag -= 1;
        state.burst_left -= 1;
        state.burst_next_at += burst_gap_ms;
        if state.burst_left == 0 {
            state.next_fire_at = now + weapon.fire_ms;
        }
    }

    /// Manual reload: only when idle, with reserve ammo and room in the mag
    pub fn request_reload(state: &mut WeaponState, weapon: &Weapon, now: u64) -> bool {
        if state.settle_reload(now) {
            return false;
        }
        state.begin_reload(weapon, now)
    }
}
