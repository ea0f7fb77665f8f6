//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::level::Obstacle;
use crate::game::weapons::Weapon;

/// Movement keys held by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keys {
    #[serde(default)]
    pub w: bool,
    #[serde(default)]
    pub a: bool,
    #[serde(default)]
    pub s: bool,
    #[serde(default)]
    pub d: bool,
}

/// View direction in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aim {
    pub yaw: f32,
    pub pitch: f32,
}

/// Items sold between rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopItem {
    Medkit,
    Armor,
    Speed,
}

/// Zombie hitbox struck by a ray
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitPart {
    Body,
    Head,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Latest view direction and held keys
    Input {
        yaw: f32,
        pitch: f32,
        #[serde(default)]
        keys: Keys,
        /// Client frame time; the server integrates with its own fixed step
        #[serde(default)]
        dt: Option<f32>,
    },

    /// Trigger pull
    Shoot {
        weapon: String,
        /// Aim at the moment of firing, falls back to the last input
        #[serde(default)]
        aim: Option<Aim>,
    },

    Reload {
        weapon: String,
    },

    PickPistol {
        weapon: String,
    },

    PickPrimary {
        weapon: String,
    },

    /// Start the next wave
    Ready,

    Buy {
        item: ShopItem,
    },

    /// Development override, ignores every gate
    DevSetLoadout {
        #[serde(default)]
        primary: Option<String>,
        #[serde(default)]
        pistol: Option<String>,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Sent once to a newly connected player
    Welcome {
        id: Uuid,
        server_time: u64,
        tick_rate: u32,
        arena: ArenaInfo,
        weapons: Vec<Weapon>,
        obstacles: Vec<Obstacle>,
        round: RoundInfo,
        players: Vec<PlayerSnapshot>,
    },

    /// Player joined the arena
    Join {
        player: PlayerSnapshot,
    },

    /// Player left the arena
    Leave {
        id: Uuid,
    },

    /// Round phase changed
    Round {
        between: bool,
        wave: u32,
        zombies_target: u32,
    },

    /// Full world snapshot, every tick
    State {
        tick: u64,
        round: RoundInfo,
        players: Vec<PlayerSnapshot>,
        zombies: Vec<ZombieSnapshot>,
    },

    Shot {
        id: Uuid,
        weapon: String,
        yaw: f32,
        pitch: f32,
        mag: u32,
        reserve: u32,
    },

    Reload {
        id: Uuid,
        weapon: String,
        mag: u32,
        reserve: u32,
        reload_ms: u64,
    },

    #[serde(rename = "zhit")]
    ZombieHit {
        zid: u32,
        hp: i32,
        part: HitPart,
        dmg: i32,
        by: Uuid,
    },

    #[serde(rename = "zdead")]
    ZombieDead {
        zid: u32,
        by: Uuid,
        reward: u32,
    },

    #[serde(rename = "phit")]
    PlayerHit {
        id: Uuid,
        hp: i32,
        dmg: i32,
        zid: u32,
    },

    #[serde(rename = "pdown")]
    PlayerDown {
        id: Uuid,
    },

    Loadout {
        id: Uuid,
        pistol: AmmoSnapshot,
        primary: Option<AmmoSnapshot>,
    },

    Bought {
        id: Uuid,
        item: ShopItem,
        cash: u32,
    },

    PickDenied {
        weapon: String,
        reason: String,
    },

    Toast {
        msg: String,
    },
}

/// Static arena description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaInfo {
    pub half_size: f32,
}

/// Round counters as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundInfo {
    pub between: bool,
    pub wave: u32,
    pub zombies_target: u32,
    pub zombies_spawned: u32,
    pub zombies_killed: u32,
}

/// Public ammo view of an equipped weapon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmmoSnapshot {
    pub weapon: String,
    pub mag: u32,
    pub reserve: u32,
    pub reloading: bool,
}

/// Player public fields in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub x: f32,
    pub z: f32,
    pub yaw: f32,
    pub pitch: f32,
    /// Health (0-100), 0 = down
    pub hp: i32,
    pub cash: u32,
    pub armor: f32,
    pub speed: f32,
    pub pistol: AmmoSnapshot,
    pub primary: Option<AmmoSnapshot>,
}

/// Zombie state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZombieSnapshot {
    pub id: u32,
    pub x: f32,
    pub z: f32,
    pub hp: i32,
    pub fast: bool,
}
