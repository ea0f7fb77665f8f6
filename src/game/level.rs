//! Static arena geometry: seeded obstacle layout plus an optional overlay

use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Number of procedurally placed boxes
pub const GENERATED_OBSTACLES: usize = 14;
/// Radius around the arena center kept free for spawning
pub const CLEAR_RADIUS: f32 = 6.0;

/// Static axis-aligned box on the ground plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub x: f32,
    pub z: f32,
    /// Half-width along x
    pub hw: f32,
    /// Half-depth along z
    pub hd: f32,
    /// Height above the ground plane
    pub h: f32,
}

impl Obstacle {
    fn is_valid(&self) -> bool {
        [self.x, self.z, self.hw, self.hd, self.h]
            .iter()
            .all(|v| v.is_finite())
            && self.hw > 0.0
            && self.hd > 0.0
            && self.h > 0.0
    }
}

/// Deterministic layout for `seed`: same seed, same boxes
pub fn generate(seed: u64, half_size: f32) -> Vec<Obstacle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let extent = (half_size - 6.0).max(CLEAR_RADIUS + 4.0);
    let mut obstacles = Vec::with_capacity(GENERATED_OBSTACLES);

    while obstacles.len() < GENERATED_OBSTACLES {
        let ob = Obstacle {
            x: rng.gen_range(-extent..extent),
            z: rng.gen_range(-extent..extent),
            hw: rng.gen_range(0.8..3.0),
            hd: rng.gen_range(0.8..3.0),
            h: rng.gen_range(1.0..3.5),
        };

        let near_x = ob.x.abs() - ob.hw;
        let near_z = ob.z.abs() - ob.hd;
        if near_x.max(near_z) < CLEAR_RADIUS {
            continue;
        }
        obstacles.push(ob);
    }

    obstacles
}

/// Read a JSON array of boxes exported by the level tooling
pub fn load_overlay(path: &Path) -> Result<Vec<Obstacle>, LevelError> {
    let raw = std::fs::read_to_string(path)?;
    parse_overlay(&raw)
}

pub fn parse_overlay(raw: &str) -> Result<Vec<Obstacle>, LevelError> {
    let overlay: Vec<Obstacle> = serde_json::from_str(raw)?;
    if let Some(index) = overlay.iter().position(|ob| !ob.is_valid()) {
        return Err(LevelError::InvalidObstacle(index));
    }
    Ok(overlay)
}

/// Level load errors
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("failed to read obstacle overlay: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse obstacle overlay: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("obstacle overlay entry {0} has non-finite or non-positive extents")]
    InvalidObstacle(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_layout() {
        assert_eq!(generate(42, 40.0), generate(42, 40.0));
        assert_ne!(generate(42, 40.0), generate(43, 40.0));
    }

    #[test]
    fn layout_keeps_center_clear_and_inside_arena() {
        for ob in generate(7, 40.0) {
            assert!((ob.x.abs() - ob.hw).max(ob.z.abs() - ob.hd) >= CLEAR_RADIUS);
            assert!(ob.x.abs() + ob.hw < 40.0);
            assert!(ob.z.abs() + ob.hd < 40.0);
        }
    }

    #[test]
    fn overlay_parses_and_validates() {
        let ok = parse_overlay(r#"[{"x":1,"z":2,"hw":0.5,"hd":0.5,"h":2}]"#).unwrap();
        assert_eq!(ok.len(), 1);

        let bad = parse_overlay(r#"[{"x":1,"z":2,"hw":0.5,"hd":0.5,"h":2},{"x":0,"z":0,"hw":-1,"hd":1,"h":1}]"#);
        assert!(matches!(bad, Err(LevelError::InvalidObstacle(1))));

        assert!(matches!(parse_overlay("{"), Err(LevelError::Parse(_))));
    }
}
