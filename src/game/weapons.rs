//! Weapon catalog and per-player ammo state

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Which loadout slot a weapon occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Pistol,
    Primary,
}

/// Trigger behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FireMode {
    /// One shot per trigger pull
    Semi,
    /// Held trigger; clients repeat `shoot` and the fire-rate gate paces it
    Auto,
    /// Fixed number of bullets per pull, spaced `burst_gap_ms` apart
    Burst {
        burst: u32,
        #[serde(rename = "burstGapMs")]
        burst_gap_ms: u64,
    },
}

/// Immutable weapon archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weapon {
    pub id: String,
    pub name: String,
    pub slot: Slot,
    #[serde(flatten)]
    pub mode: FireMode,
    /// Minimum time between trigger pulls
    pub fire_ms: u64,
    pub dmg_close: f32,
    pub dmg_far: f32,
    /// Max jitter applied to yaw and pitch per pellet, radians
    pub spread: f32,
    pub pellets: u32,
    pub range: f32,
    pub mag: u32,
    pub reload_ms: u64,
}

impl Weapon {
    pub fn is_burst(&self) -> bool {
        matches!(self.mode, FireMode::Burst { .. })
    }
}

// Compact constructor for the built-in table
#[allow(clippy::too_many_arguments)]
fn weapon(
    id: &str,
    name: &str,
    slot: Slot,
    mode: FireMode,
    fire_ms: u64,
    dmg: (f32, f32),
    spread: f32,
    pellets: u32,
    range: f32,
    mag: u32,
    reload_ms: u64,
) -> Weapon {
    Weapon {
        id: id.to_string(),
        name: name.to_string(),
        slot,
        mode,
        fire_ms,
        dmg_close: dmg.0,
        dmg_far: dmg.1,
        spread,
        pellets,
        range,
        mag,
        reload_ms,
    }
}

fn builtin_table() -> Vec<Weapon> {
    use FireMode::*;
    use Slot::*;

    vec![
        weapon("pistol_semi", "M9 Service", Pistol, Semi, 220, (24.0, 14.0), 0.010, 1, 40.0, 12, 1100),
        weapon("pistol_auto", "Machine Pistol", Pistol, Auto, 90, (14.0, 8.0), 0.030, 1, 30.0, 20, 1300),
        weapon("pistol_heavy", "Hand Cannon", Pistol, Semi, 380, (48.0, 28.0), 0.008, 1, 45.0, 7, 1500),
        weapon("ar_auto", "Assault Rifle", Primary, Auto, 100, (22.0, 14.0), 0.018, 1, 55.0, 30, 1700),
        weapon(
            "ar_burst",
            "Burst Rifle",
            Primary,
            Burst { burst: 3, burst_gap_ms: 65 },
            320,
            (26.0, 16.0),
            0.012,
            1,
            60.0,
            30,
            1800,
        ),
        weapon("smg_auto", "SMG", Primary, Auto, 70, (15.0, 9.0), 0.035, 1, 32.0, 35, 1500),
        weapon("shotgun_semi", "Pump Shotgun", Primary, Semi, 650, (10.0, 6.0), 0.090, 7, 22.0, 6, 2200),
        weapon("shotgun_auto", "Auto Shotgun", Primary, Auto, 260, (8.0, 4.0), 0.110, 6, 18.0, 8, 2400),
        weapon("sniper_semi", "Marksman Rifle", Primary, Semi, 1100, (140.0, 110.0), 0.002, 1, 120.0, 5, 2600),
    ]
}

/// Validated, immutable table of weapon archetypes
#[derive(Debug, Clone)]
pub struct WeaponCatalog {
    weapons: Vec<Weapon>,
}

impl WeaponCatalog {
    pub fn builtin() -> Self {
        // The built-in table is covered by `builtin_table_is_valid`
        Self {
            weapons: builtin_table(),
        }
    }

    /// Build a catalog, rejecting inconsistent archetypes
    pub fn from_weapons(weapons: Vec<Weapon>) -> Result<Self, CatalogError> {
        if weapons.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for w in &weapons {
            if !seen.insert(w.id.as_str()) {
                return Err(CatalogError::DuplicateId(w.id.clone()));
            }
            validate(w)?;
        }

        if !weapons.iter().any(|w| w.slot == Slot::Pistol) {
            return Err(CatalogError::NoPistol);
        }

        Ok(Self { weapons })
    }

    /// Load a JSON array of archetypes
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let weapons: Vec<Weapon> = serde_json::from_str(&raw)?;
        Self::from_weapons(weapons)
    }

    pub fn get(&self, id: &str) -> Option<&Weapon> {
        self.weapons.iter().find(|w| w.id == id)
    }

    /// Weapon for `id` only if it belongs in `slot`
    pub fn get_in_slot(&self, id: &str, slot: Slot) -> Option<&Weapon> {
        self.get(id).filter(|w| w.slot == slot)
    }

    pub fn pistols(&self) -> impl Iterator<Item = &Weapon> {
        self.weapons.iter().filter(|w| w.slot == Slot::Pistol)
    }

    pub fn all(&self) -> &[Weapon] {
        &self.weapons
    }
}

fn validate(w: &Weapon) -> Result<(), CatalogError> {
    let invalid = |reason: &'static str| CatalogError::Invalid {
        id: w.id.clone(),
        reason,
    };

    if w.mag == 0 {
        return Err(invalid("mag must be at least 1"));
    }
    if w.pellets == 0 {
        return Err(invalid("pellets must be at least 1"));
    }
    if !(w.range.is_finite() && w.range > 0.0) {
        return Err(invalid("range must be positive"));
    }
    if !(w.spread.is_finite() && w.spread >= 0.0) {
        return Err(invalid("spread must be non-negative"));
    }
    if !(w.dmg_close.is_finite() && w.dmg_far.is_finite() && w.dmg_far >= 1.0 && w.dmg_close >= 1.0) {
        return Err(invalid("damage values must be at least 1"));
    }
    if let FireMode::Burst { burst, burst_gap_ms } = w.mode {
        if burst < 2 || burst_gap_ms == 0 {
            return Err(invalid("burst weapons need burst >= 2 and a non-zero gap"));
        }
    }
    Ok(())
}

/// Catalog load errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("weapon catalog is empty")]
    Empty,

    #[error("duplicate weapon id: {0}")]
    DuplicateId(String),

    #[error("weapon catalog has no pistol")]
    NoPistol,

    #[error("weapon {id}: {reason}")]
    Invalid { id: String, reason: &'static str },

    #[error("failed to read weapon table: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse weapon table: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Ammo and timing state of one equipped weapon. Replaced wholesale on re-equip.
#[derive(Debug, Clone, PartialEq)]
pub struct WeaponState {
    pub weapon: String,
    pub mag: u32,
    pub reserve: u32,
    pub reloading: bool,
    pub reload_until: u64,
    pub next_fire_at: u64,
    pub burst_left: u32,
    pub burst_next_at: u64,
}

impl WeaponState {
    pub fn new(weapon: &Weapon) -> Self {
        Self {
            weapon: weapon.id.clone(),
            mag: weapon.mag,
            reserve: weapon.mag * 4,
            reloading: false,
            reload_until: 0,
            next_fire_at: 0,
            burst_left: 0,
            burst_next_at: 0,
        }
    }

    /// Clear the reload flag once its timer has passed.
    /// Returns true while the weapon is still mid-reload.
    pub fn settle_reload(&mut self, now: u64) -> bool {
        if self.reloading {
            if now < self.reload_until {
                return true;
            }
            self.reloading = false;
        }
        false
    }

    /// Start a reload, moving ammo from reserve into the magazine up front.
    /// Returns false (and changes nothing) when there is nothing to load.
    pub fn begin_reload(&mut self, weapon: &Weapon, now: u64) -> bool {
        let room = weapon.mag.saturating_sub(self.mag);
        let moved = room.min(self.reserve);
        if moved == 0 {
            return false;
        }

        self.mag += moved;
        self.reserve -= moved;
        self.reloading = true;
        self.reload_until = now + weapon.reload_ms;
        self.burst_left = 0;
        true
    }
}
