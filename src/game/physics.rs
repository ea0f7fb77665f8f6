//! Collision resolution: circle separation, box push-out and arena bounds

use glam::Vec2;

use super::level::Obstacle;

/// Player collision radius
pub const PLAYER_RADIUS: f32 = 0.4;
/// Zombie collision radius
pub const ZOMBIE_RADIUS: f32 = 0.45;
/// Share of a player-zombie overlap absorbed by the zombie
pub const ZOMBIE_PUSH_SHARE: f32 = 0.85;
/// Obstacle push-out passes per entity (two boxes can trap one circle)
pub const OBSTACLE_PASSES: usize = 2;
/// How far outside the arena wall zombies may stand (spawn ring)
pub const ZOMBIE_SPAWN_MARGIN: f32 = 2.0;

const EPSILON: f32 = 1e-6;

/// Square arena centered on the origin
#[derive(Debug, Clone, Copy)]
pub struct ArenaBounds {
    pub half_size: f32,
}

impl ArenaBounds {
    /// Clamp limit for a player center
    pub fn player_limit(&self) -> f32 {
        self.half_size - PLAYER_RADIUS
    }

    /// Clamp limit for a zombie center
    pub fn zombie_limit(&self) -> f32 {
        self.half_size + ZOMBIE_SPAWN_MARGIN
    }
}

/// Stateless collision helpers
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Separate two overlapping circles along their connecting normal.
    /// `share_a` is the fraction of the overlap applied to `a` (0.5 = symmetric).
    /// Returns true if the circles overlapped.
    pub fn separate(a: &mut Vec2, ra: f32, b: &mut Vec2, rb: f32, share_a: f32) -> bool {
        let delta = *b - *a;
        let dist = delta.length();
        let combined = ra + rb;
        if dist >= combined {
            return false;
        }

        // Coincident centers: fixed normal keeps the result deterministic
        let normal = if dist < EPSILON { Vec2::X } else { delta / dist };
        let overlap = combined - dist;

        *a -= normal * overlap * share_a;
        *b += normal * overlap * (1.0 - share_a);
        true
    }

    /// Push a circle out of one box. Returns true if it moved.
    pub fn push_out_of_box(p: &mut Vec2, radius: f32, ob: &Obstacle) -> bool {
        let min = Vec2::new(ob.x - ob.hw, ob.z - ob.hd);
        let max = Vec2::new(ob.x + ob.hw, ob.z + ob.hd);
        let nearest = p.clamp(min, max);
        let delta = *p - nearest;
        let dist_sq = delta.length_squared();

        if dist_sq >= radius * radius {
            return false;
        }

        if dist_sq > EPSILON * EPSILON {
            let dist = dist_sq.sqrt();
            *p += delta / dist * (radius - dist);
            return true;
        }

        // Center is inside the box: leave through the nearest face
        let left = p.x - min.x;
        let right = max.x - p.x;
        let back = p.y - min.y;
        let front = max.y - p.y;
        let nearest_face = left.min(right).min(back).min(front);

        if nearest_face == left {
            p.x = min.x - radius;
        } else if nearest_face == right {
            p.x = max.x + radius;
        } else if nearest_face == back {
            p.y = min.y - radius;
        } else {
            p.y = max.y + radius;
        }
        true
    }

    /// Push a circle out of every obstacle, repeating for corner cases
    pub fn push_out_of_obstacles(p: &mut Vec2, radius: f32, obstacles: &[Obstacle]) {
        for _ in 0..OBSTACLE_PASSES {
            let mut moved = false;
            for ob in obstacles {
                moved |= Self::push_out_of_box(p, radius, ob);
            }
            if !moved {
                break;
            }
        }
    }

    /// Keep a center within `[-limit, limit]` on both axes
    pub fn clamp_to_arena(p: &mut Vec2, limit: f32) {
        p.x = p.x.clamp(-limit, limit);
        p.y = p.y.clamp(-limit, limit);
    }

    /// Full per-tick relaxation over every entity pair and obstacle.
    /// Positions are (x, z) pairs; slices keep the caller's iteration order.
    pub fn resolve_world(
        players: &mut [Vec2],
        zombies: &mut [Vec2],
        obstacles: &[Obstacle],
        bounds: ArenaBounds,
    ) {
        for i in 0..players.len() {
            let (head, tail) = players.split_at_mut(i + 1);
            for other in tail.iter_mut() {
                Self::separate(&mut head[i], PLAYER_RADIUS, other, PLAYER_RADIUS, 0.5);
            }
        }

        for i in 0..zombies.len() {
            let (head, tail) = zombies.split_at_mut(i + 1);
            for other in tail.iter_mut() {
                Self::separate(&mut head[i], ZOMBIE_RADIUS, other, ZOMBIE_RADIUS, 0.5);
            }
        }

        for player in players.iter_mut() {
            for zombie in zombies.iter_mut() {
                Self::separate(
                    player,
                    PLAYER_RADIUS,
                    zombie,
                    ZOMBIE_RADIUS,
                    1.0 - ZOMBIE_PUSH_SHARE,
                );
            }
        }

        for player in players.iter_mut() {
            Self::push_out_of_obstacles(player, PLAYER_RADIUS, obstacles);
            Self::clamp_to_arena(player, bounds.player_limit());
        }

        for zombie in zombies.iter_mut() {
            Self::push_out_of_obstacles(zombie, ZOMBIE_RADIUS, obstacles);
            Self::clamp_to_arena(zombie, bounds.zombie_limit());
        }
    }

    /// True if a center lies strictly inside a box
    pub fn inside_box(p: Vec2, ob: &Obstacle) -> bool {
        (p.x - ob.x).abs() < ob.hw && (p.y - ob.z).abs() < ob.hd
    }
}
