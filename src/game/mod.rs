//! Game simulation modules

pub mod arena;
pub mod combat;
pub mod director;
pub mod level;
pub mod physics;
pub mod shop;
pub mod snapshot;
pub mod weapons;

pub use arena::{load_world, ArenaHandle, GameArena};

use std::sync::Arc;

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Command from a connection handler to the arena task
#[derive(Debug, Clone)]
pub enum ArenaCommand {
    Join { id: Uuid, name: String },
    Leave { id: Uuid },
    Client { id: Uuid, msg: ClientMsg },
}

/// Addressee of an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    Player(Uuid),
}

/// Server message serialized once by the arena and fanned out to writers
#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Recipient,
    pub json: Arc<str>,
}

impl Outbound {
    pub fn is_for(&self, id: Uuid) -> bool {
        match self.to {
            Recipient::All => true,
            Recipient::Player(target) => target == id,
        }
    }
}
