//! Snapshot building for network transmission

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::ws::protocol::{AmmoSnapshot, PlayerSnapshot, ServerMsg, ZombieSnapshot};

use super::arena::Player;
use super::director::{RoundState, Zombie};
use super::weapons::WeaponState;

/// Builds the per-tick `state` message
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    pub stats: SnapshotStats,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full world snapshot; players in id order, zombies in spawn order
    pub fn build(
        &self,
        tick: u64,
        round: &RoundState,
        players: &BTreeMap<Uuid, Player>,
        zombies: &[Zombie],
    ) -> ServerMsg {
        ServerMsg::State {
            tick,
            round: round.info(),
            players: players.values().map(player_snapshot).collect(),
            zombies: zombies.iter().map(zombie_snapshot).collect(),
        }
    }
}

pub fn ammo_snapshot(state: &WeaponState) -> AmmoSnapshot {
    AmmoSnapshot {
        weapon: state.weapon.clone(),
        mag: state.mag,
        reserve: state.reserve,
        reloading: state.reloading,
    }
}

pub fn player_snapshot(p: &Player) -> PlayerSnapshot {
    PlayerSnapshot {
        id: p.id,
        name: p.name.clone(),
        x: p.pos.x,
        z: p.pos.y,
        yaw: p.yaw,
        pitch: p.pitch,
        hp: p.hp,
        cash: p.cash,
        armor: p.armor,
        speed: p.speed,
        pistol: ammo_snapshot(&p.pistol),
        primary: p.primary.as_ref().map(ammo_snapshot),
    }
}

pub fn zombie_snapshot(z: &Zombie) -> ZombieSnapshot {
    ZombieSnapshot {
        id: z.id,
        x: z.pos.x,
        z: z.pos.y,
        hp: z.hp,
        fast: z.fast,
    }
}

/// Snapshot size stats for debugging
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_players_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f32 / n);
    }

    pub fn avg_bytes(&self) -> u64 {
        self.total_bytes.checked_div(self.total_snapshots).unwrap_or(0)
    }
}
