//! Arena state and authoritative tick loop

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ArenaConfig;
use crate::util::time::{tick_delta, unix_millis, Timer, SIMULATION_TPS, TICK_DURATION_MICROS};
use crate::ws::protocol::{Aim, ArenaInfo, ClientMsg, Keys, ServerMsg, ShopItem};

use super::combat::{CombatSystem, TriggerCheck};
use super::director::{self, RoundState, SpawnDirector, Zombie, MELEE_COOLDOWN_MS};
use super::level::{self, LevelError, Obstacle};
use super::physics::{ArenaBounds, PhysicsSystem, PLAYER_RADIUS};
use super::shop::{self, Buyer, BASE_SPEED, MAX_HP};
use super::snapshot::{ammo_snapshot, player_snapshot, SnapshotBuilder};
use super::weapons::{CatalogError, Slot, WeaponCatalog, WeaponState};
use super::{ArenaCommand, Outbound, Recipient};

/// Waves a picked primary stays locked for
pub const PICK_COOLDOWN_WAVES: u32 = 3;
/// Cash a new player starts with
pub const STARTING_CASH: u32 = 20;
/// Pitch is clamped to just short of straight up/down
pub const MAX_PITCH: f32 = 1.55;
/// Players spawn within this fraction of the arena half-size
const SPAWN_SPREAD: f32 = 0.5;
const SPAWN_ATTEMPTS: usize = 16;
/// Debug-log snapshot size every this many ticks
const STATS_LOG_INTERVAL: u64 = 200;

/// Player state in the arena (authoritative). `pos` is (x, z) on the ground plane.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub pos: Vec2,
    pub yaw: f32,
    pub pitch: f32,
    pub hp: i32,
    pub cash: u32,
    pub armor: f32,
    pub speed: f32,

    pub pistol: WeaponState,
    pub primary: Option<WeaponState>,

    // Input tracking
    pub keys: Keys,
    pub last_aim: Aim,

    /// Weapon id -> first wave it may be picked again
    pub pick_cooldowns: HashMap<String, u32>,
    pub last_primary: Option<String>,
    pub last_hurt_at: Option<u64>,
}

impl Player {
    pub fn new(id: Uuid, name: String, pos: Vec2, pistol: WeaponState) -> Self {
        Self {
            id,
            name,
            pos,
            yaw: 0.0,
            pitch: 0.0,
            hp: MAX_HP,
            cash: STARTING_CASH,
            armor: 0.0,
            speed: BASE_SPEED,
            pistol,
            primary: None,
            keys: Keys::default(),
            last_aim: Aim::default(),
            pick_cooldowns: HashMap::new(),
            last_primary: None,
            last_hurt_at: None,
        }
    }

    pub fn is_down(&self) -> bool {
        self.hp <= 0
    }

    /// Equipped weapon state for `weapon`, if either slot holds it
    pub fn weapon_mut(&mut self, weapon: &str) -> Option<&mut WeaponState> {
        if self.pistol.weapon == weapon {
            return Some(&mut self.pistol);
        }
        self.primary.as_mut().filter(|p| p.weapon == weapon)
    }

    fn weapons_mut(&mut self) -> impl Iterator<Item = &mut WeaponState> {
        std::iter::once(&mut self.pistol).chain(self.primary.as_mut())
    }
}

/// Who fired a bullet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// Client `shoot` message
    Manual,
    /// Scheduled follow-up bullet of a burst
    Burst,
}

/// What a trigger pull did to the weapon
enum PullOutcome {
    Fired { pos: Vec2, aim: Aim, mag: u32, reserve: u32 },
    Reloading { mag: u32, reserve: u32, reload_ms: u64 },
}

/// Errors loading the static world at startup
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Level(#[from] LevelError),
}

/// Load the weapon catalog and obstacle layout named by the config
pub fn load_world(config: &ArenaConfig) -> Result<(WeaponCatalog, Vec<Obstacle>), WorldError> {
    let catalog = match &config.weapons_path {
        Some(path) => WeaponCatalog::from_json_file(path)?,
        None => WeaponCatalog::builtin(),
    };

    let mut obstacles = level::generate(config.level_seed, config.half_size);
    if let Some(path) = &config.obstacles_path {
        let overlay = level::load_overlay(path)?;
        info!(count = overlay.len(), path = %path.display(), "Loaded obstacle overlay");
        obstacles.extend(overlay);
    }

    Ok((catalog, obstacles))
}

/// Arena state (owned by the arena task)
pub struct Arena {
    pub bounds: ArenaBounds,
    pub tick: u64,
    pub catalog: WeaponCatalog,
    pub obstacles: Vec<Obstacle>,
    pub players: BTreeMap<Uuid, Player>,
    pub zombies: Vec<Zombie>,
    pub round: RoundState,
    director: SpawnDirector,
    rng: ChaCha8Rng,
    dev_commands: bool,
    outbound: broadcast::Sender<Outbound>,
    snapshots: SnapshotBuilder,
}

impl Arena {
    pub fn new(
        config: &ArenaConfig,
        catalog: WeaponCatalog,
        obstacles: Vec<Obstacle>,
        seed: u64,
        outbound: broadcast::Sender<Outbound>,
    ) -> Self {
        Self {
            bounds: ArenaBounds {
                half_size: config.half_size,
            },
            tick: 0,
            catalog,
            obstacles,
            players: BTreeMap::new(),
            zombies: Vec::new(),
            round: RoundState::new(),
            director: SpawnDirector::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            dev_commands: config.dev_commands,
            outbound,
            snapshots: SnapshotBuilder::new(),
        }
    }

    /// Serialize once and hand to every connection writer
    fn emit(&self, to: Recipient, msg: &ServerMsg) {
        match serde_json::to_string(msg) {
            Ok(json) => {
                // No receivers is fine: nobody is connected
                let _ = self.outbound.send(Outbound {
                    to,
                    json: json.into(),
                });
            }
            Err(e) => warn!(error = %e, "Failed to serialize server message"),
        }
    }

    fn broadcast(&self, msg: &ServerMsg) {
        self.emit(Recipient::All, msg);
    }

    fn toast(&self, id: Uuid, msg: impl Into<String>) {
        self.emit(Recipient::Player(id), &ServerMsg::Toast { msg: msg.into() });
    }

    fn deny_pick(&self, id: Uuid, weapon: &str, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(player_id = %id, weapon, reason = %reason, "Pick denied");
        self.emit(
            Recipient::Player(id),
            &ServerMsg::PickDenied {
                weapon: weapon.to_string(),
                reason,
            },
        );
    }

    /// Random open spot near the middle of the arena
    fn random_spawn_point(&mut self) -> Vec2 {
        let extent = self.bounds.half_size * SPAWN_SPREAD;
        let mut pos = Vec2::ZERO;
        for _ in 0..SPAWN_ATTEMPTS {
            pos = Vec2::new(
                self.rng.gen_range(-extent..extent),
                self.rng.gen_range(-extent..extent),
            );
            let blocked = self.obstacles.iter().any(|ob| {
                (pos.x - ob.x).abs() < ob.hw + PLAYER_RADIUS && (pos.y - ob.z).abs() < ob.hd + PLAYER_RADIUS
            });
            if !blocked {
                return pos;
            }
        }
        PhysicsSystem::push_out_of_obstacles(&mut pos, PLAYER_RADIUS, &self.obstacles);
        pos
    }

    /// Apply one command from a connection handler
    pub fn handle(&mut self, command: ArenaCommand, now: u64) {
        match command {
            ArenaCommand::Join { id, name } => self.handle_join(id, name),
            ArenaCommand::Leave { id } => self.handle_leave(id),
            ArenaCommand::Client { id, msg } => self.handle_client(id, msg, now),
        }
    }

    fn handle_client(&mut self, id: Uuid, msg: ClientMsg, now: u64) {
        if !self.players.contains_key(&id) {
            return;
        }

        match msg {
            ClientMsg::Input { yaw, pitch, keys, .. } => self.handle_input(id, yaw, pitch, keys),
            ClientMsg::Shoot { weapon, aim } => self.handle_shoot(id, &weapon, aim, now),
            ClientMsg::Reload { weapon } => self.handle_reload(id, &weapon, now),
            ClientMsg::PickPistol { weapon } => self.handle_pick(id, &weapon, Slot::Pistol),
            ClientMsg::PickPrimary { weapon } => self.handle_pick(id, &weapon, Slot::Primary),
            ClientMsg::Ready => self.handle_ready(id, now),
            ClientMsg::Buy { item } => self.handle_buy(id, item),
            ClientMsg::DevSetLoadout { primary, pistol } => {
                self.handle_dev_loadout(id, primary.as_deref(), pistol.as_deref())
            }
        }
    }

    /// Handle a new connection
    fn handle_join(&mut self, id: Uuid, name: String) {
        if self.players.contains_key(&id) {
            warn!(player_id = %id, "Player already in arena");
            return;
        }

        let pistols: Vec<&str> = self.catalog.pistols().map(|w| w.id.as_str()).collect();
        let Some(pistol) = pistols
            .choose(&mut self.rng)
            .and_then(|w| self.catalog.get(w))
            .map(WeaponState::new)
        else {
            warn!(player_id = %id, "Catalog has no pistol, refusing join");
            return;
        };

        let pos = self.random_spawn_point();
        let player = Player::new(id, name, pos, pistol);
        let joined = player_snapshot(&player);
        self.players.insert(id, player);

        self.emit(
            Recipient::Player(id),
            &ServerMsg::Welcome {
                id,
                server_time: unix_millis(),
                tick_rate: SIMULATION_TPS,
                arena: ArenaInfo {
                    half_size: self.bounds.half_size,
                },
                weapons: self.catalog.all().to_vec(),
                obstacles: self.obstacles.clone(),
                round: self.round.info(),
                players: self.players.values().map(player_snapshot).collect(),
            },
        );
        self.broadcast(&ServerMsg::Join { player: joined });

        info!(
            player_id = %id,
            player_count = self.players.len(),
            "Player joined arena"
        );
    }

    /// Handle disconnect; in-flight bursts go with the player
    fn handle_leave(&mut self, id: Uuid) {
        if self.players.remove(&id).is_some() {
            self.broadcast(&ServerMsg::Leave { id });
            info!(
                player_id = %id,
                player_count = self.players.len(),
                "Player left arena"
            );
        }
    }

    fn handle_input(&mut self, id: Uuid, yaw: f32, pitch: f32, keys: Keys) {
        if !(yaw.is_finite() && pitch.is_finite()) {
            debug!(player_id = %id, "Dropping non-finite input");
            return;
        }
        if let Some(player) = self.players.get_mut(&id) {
            player.yaw = yaw.rem_euclid(std::f32::consts::TAU);
            player.pitch = pitch.clamp(-MAX_PITCH, MAX_PITCH);
            player.last_aim = Aim {
                yaw: player.yaw,
                pitch: player.pitch,
            };
            player.keys = keys;
        }
    }

    fn handle_shoot(&mut self, id: Uuid, weapon: &str, aim: Option<Aim>, now: u64) {
        if let (Some(player), Some(aim)) = (self.players.get_mut(&id), aim) {
            if aim.yaw.is_finite() && aim.pitch.is_finite() {
                player.last_aim = Aim {
                    yaw: aim.yaw,
                    pitch: aim.pitch.clamp(-MAX_PITCH, MAX_PITCH),
                };
            }
        }
        self.fire(id, weapon, now, Trigger::Manual);
    }

    /// Run the trigger gates and spend ammo; no world effects yet
    fn pull(&mut self, id: Uuid, weapon_id: &str, now: u64, trigger: Trigger) -> Option<PullOutcome> {
        let player = self.players.get_mut(&id)?;
        if player.is_down() {
            return None;
        }
        let (pos, aim) = (player.pos, player.last_aim);
        let state = player.weapon_mut(weapon_id)?;
        let weapon = self.catalog.get(weapon_id)?;

        match trigger {
            Trigger::Manual => {
                if !self.round.is_active() {
                    return None;
                }
                match CombatSystem::check_trigger(state, weapon, now) {
                    TriggerCheck::Blocked => return None,
                    TriggerCheck::AutoReload => {
                        return Some(PullOutcome::Reloading {
                            mag: state.mag,
                            reserve: state.reserve,
                            reload_ms: weapon.reload_ms,
                        });
                    }
                    TriggerCheck::Ready => CombatSystem::consume_trigger(state, weapon, now),
                }
            }
            Trigger::Burst => CombatSystem::consume_burst(state, weapon, now),
        }

        Some(PullOutcome::Fired {
            pos,
            aim,
            mag: state.mag,
            reserve: state.reserve,
        })
    }

    /// Fire one bullet (all pellets) and apply its effects
    fn fire(&mut self, id: Uuid, weapon_id: &str, now: u64, trigger: Trigger) {
        let (pos, aim, mag, reserve) = match self.pull(id, weapon_id, now, trigger) {
            None => return,
            Some(PullOutcome::Reloading { mag, reserve, reload_ms }) => {
                self.broadcast(&ServerMsg::Reload {
                    id,
                    weapon: weapon_id.to_string(),
                    mag,
                    reserve,
                    reload_ms,
                });
                return;
            }
            Some(PullOutcome::Fired { pos, aim, mag, reserve }) => (pos, aim, mag, reserve),
        };

        let Some(weapon) = self.catalog.get(weapon_id) else {
            return;
        };
        let hits = CombatSystem::trace_pellets(&mut self.rng, pos, aim, weapon, &self.zombies);
        let applied = CombatSystem::apply_hits(&mut self.zombies, &hits, weapon);

        for hit in applied {
            if !hit.killed {
                self.broadcast(&ServerMsg::ZombieHit {
                    zid: hit.zid,
                    hp: hit.hp,
                    part: hit.part,
                    dmg: hit.dmg,
                    by: id,
                });
                continue;
            }

            let reward = director::kill_reward(self.round.wave);
            if let Some(shooter) = self.players.get_mut(&id) {
                shooter.cash += reward;
            }
            let wave_ended = self.director.record_kill(&mut self.round);
            self.broadcast(&ServerMsg::ZombieDead {
                zid: hit.zid,
                by: id,
                reward,
            });
            if wave_ended {
                self.end_wave();
            }
        }

        self.broadcast(&ServerMsg::Shot {
            id,
            weapon: weapon_id.to_string(),
            yaw: aim.yaw,
            pitch: aim.pitch,
            mag,
            reserve,
        });
    }

    fn end_wave(&mut self) {
        info!(
            cleared_wave = self.round.wave - 1,
            next_wave = self.round.wave,
            tick = self.tick,
            "Wave cleared"
        );
        self.broadcast(&ServerMsg::Round {
            between: true,
            wave: self.round.wave,
            zombies_target: self.round.zombies_target,
        });
    }

    fn handle_reload(&mut self, id: Uuid, weapon_id: &str, now: u64) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if player.is_down() {
            return;
        }
        let Some(state) = player.weapon_mut(weapon_id) else {
            return;
        };
        let Some(weapon) = self.catalog.get(weapon_id) else {
            return;
        };

        if CombatSystem::request_reload(state, weapon, now) {
            let msg = ServerMsg::Reload {
                id,
                weapon: weapon_id.to_string(),
                mag: state.mag,
                reserve: state.reserve,
                reload_ms: weapon.reload_ms,
            };
            self.broadcast(&msg);
        }
    }

    fn handle_pick(&mut self, id: Uuid, weapon_id: &str, slot: Slot) {
        let Some(weapon) = self.catalog.get(weapon_id) else {
            return;
        };
        if weapon.slot != slot {
            self.deny_pick(id, weapon_id, "wrong slot");
            return;
        }
        if !self.round.between {
            self.deny_pick(id, weapon_id, "round in progress");
            return;
        }

        let wave = self.round.wave;
        let fresh = WeaponState::new(weapon);
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };

        match slot {
            Slot::Pistol => player.pistol = fresh,
            Slot::Primary => {
                if let Some(&until) = player.pick_cooldowns.get(weapon_id) {
                    if wave < until {
                        let reason = if player.last_primary.as_deref() == Some(weapon_id) {
                            format!("just picked, available again in wave {until}")
                        } else {
                            format!("on cooldown until wave {until}")
                        };
                        self.deny_pick(id, weapon_id, reason);
                        return;
                    }
                }
                player.primary = Some(fresh);
                player.last_primary = Some(weapon_id.to_string());
                player
                    .pick_cooldowns
                    .insert(weapon_id.to_string(), wave + PICK_COOLDOWN_WAVES);
            }
        }

        self.send_loadout(id);
    }

    fn send_loadout(&self, id: Uuid) {
        if let Some(player) = self.players.get(&id) {
            self.broadcast(&ServerMsg::Loadout {
                id,
                pistol: ammo_snapshot(&player.pistol),
                primary: player.primary.as_ref().map(ammo_snapshot),
            });
        }
    }

    fn handle_ready(&mut self, id: Uuid, now: u64) {
        if !self.director.start_wave(&mut self.round, now) {
            return;
        }
        info!(
            player_id = %id,
            wave = self.round.wave,
            zombies_target = self.round.zombies_target,
            spawn_every_ms = self.round.spawn_every_ms,
            "Wave started"
        );
        self.broadcast(&ServerMsg::Round {
            between: false,
            wave: self.round.wave,
            zombies_target: self.round.zombies_target,
        });
    }

    fn handle_buy(&mut self, id: Uuid, item: ShopItem) {
        let between = self.round.between;
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };

        let mut buyer = Buyer {
            hp: player.hp,
            cash: player.cash,
            armor: player.armor,
            speed: player.speed,
        };
        match shop::purchase(&mut buyer, item, between) {
            Ok(()) => {
                player.hp = buyer.hp;
                player.cash = buyer.cash;
                player.armor = buyer.armor;
                player.speed = buyer.speed;
                self.broadcast(&ServerMsg::Bought {
                    id,
                    item,
                    cash: buyer.cash,
                });
            }
            Err(e) => self.toast(id, e.to_string()),
        }
    }

    fn handle_dev_loadout(&mut self, id: Uuid, primary: Option<&str>, pistol: Option<&str>) {
        if !self.dev_commands {
            debug!(player_id = %id, "Ignoring devSetLoadout, dev commands disabled");
            return;
        }

        let primary = primary
            .and_then(|w| self.catalog.get_in_slot(w, Slot::Primary))
            .map(WeaponState::new);
        let pistol = pistol
            .and_then(|w| self.catalog.get_in_slot(w, Slot::Pistol))
            .map(WeaponState::new);
        if primary.is_none() && pistol.is_none() {
            return;
        }

        if let Some(player) = self.players.get_mut(&id) {
            if let Some(state) = primary {
                player.primary = Some(state);
            }
            if let Some(state) = pistol {
                player.pistol = state;
            }
        }
        self.send_loadout(id);
    }

    /// Advance the world by one fixed step and broadcast the snapshot
    pub fn tick(&mut self, now: u64) {
        let dt = tick_delta();
        self.tick += 1;

        self.move_players(dt);
        self.respawn_downed();

        if let Some(zombie) = self
            .director
            .maybe_spawn(&mut self.round, now, &mut self.rng, self.bounds)
        {
            self.zombies.push(zombie);
        }

        self.run_zombies(now, dt);
        self.resolve_collisions();
        self.continue_bursts(now);

        let snapshot = self
            .snapshots
            .build(self.tick, &self.round, &self.players, &self.zombies);
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                self.snapshots.stats.record(self.players.len(), json.len());
                let _ = self.outbound.send(Outbound {
                    to: Recipient::All,
                    json: json.into(),
                });
            }
            Err(e) => warn!(error = %e, "Failed to serialize snapshot"),
        }

        if self.tick % STATS_LOG_INTERVAL == 0 {
            debug!(
                tick = self.tick,
                players = self.players.len(),
                zombies = self.zombies.len(),
                avg_snapshot_bytes = self.snapshots.stats.avg_bytes(),
                "Arena stats"
            );
        }
    }

    /// WASD relative to yaw, diagonals normalized
    fn move_players(&mut self, dt: f32) {
        let limit = self.bounds.player_limit();

        for player in self.players.values_mut() {
            if player.is_down() {
                continue;
            }

            let keys = player.keys;
            let forward = Vec2::new(-player.yaw.sin(), -player.yaw.cos());
            let right = Vec2::new(player.yaw.cos(), -player.yaw.sin());
            let axis = |pos: bool, neg: bool| (pos as i32 - neg as i32) as f32;
            let wish = forward * axis(keys.w, keys.s) + right * axis(keys.d, keys.a);

            if wish.length_squared() > 0.0 {
                player.pos += wish.normalize() * player.speed * dt;
            }

            PhysicsSystem::clamp_to_arena(&mut player.pos, limit);
            PhysicsSystem::push_out_of_obstacles(&mut player.pos, PLAYER_RADIUS, &self.obstacles);
            PhysicsSystem::clamp_to_arena(&mut player.pos, limit);
        }
    }

    /// Downed players come back once the wave is over
    fn respawn_downed(&mut self) {
        if !self.round.between {
            return;
        }

        let downed: Vec<Uuid> = self
            .players
            .values()
            .filter(|p| p.is_down())
            .map(|p| p.id)
            .collect();

        for id in downed {
            let pos = self.random_spawn_point();
            if let Some(player) = self.players.get_mut(&id) {
                player.hp = MAX_HP;
                player.pos = pos;
                player.last_hurt_at = None;
                info!(player_id = %id, "Player respawned");
            }
        }
    }

    /// Zombie movement and melee
    fn run_zombies(&mut self, now: u64, dt: f32) {
        let (ids, targets): (Vec<Uuid>, Vec<Vec2>) = self
            .players
            .values()
            .filter(|p| !p.is_down())
            .map(|p| (p.id, p.pos))
            .unzip();

        let contacts = SpawnDirector::step_zombies(&mut self.zombies, &targets, &self.obstacles, dt);

        for contact in contacts {
            let pid = ids[contact.target];
            let Some(player) = self.players.get_mut(&pid) else {
                continue;
            };
            if player.is_down() {
                continue;
            }
            if player
                .last_hurt_at
                .is_some_and(|at| now < at + MELEE_COOLDOWN_MS)
            {
                continue;
            }

            let dmg = director::melee_damage_after_armor(self.round.wave, player.armor);
            player.hp = (player.hp - dmg).max(0);
            player.last_hurt_at = Some(now);
            let (hp, down) = (player.hp, player.is_down());
            if down {
                for state in player.weapons_mut() {
                    state.burst_left = 0;
                }
            }

            self.broadcast(&ServerMsg::PlayerHit {
                id: pid,
                hp,
                dmg,
                zid: contact.zid,
            });
            if down {
                self.broadcast(&ServerMsg::PlayerDown { id: pid });
                info!(player_id = %pid, wave = self.round.wave, "Player down");
            }
        }
    }

    fn resolve_collisions(&mut self) {
        let mut player_pos: Vec<Vec2> = self
            .players
            .values()
            .filter(|p| !p.is_down())
            .map(|p| p.pos)
            .collect();
        let mut zombie_pos: Vec<Vec2> = self.zombies.iter().map(|z| z.pos).collect();

        PhysicsSystem::resolve_world(&mut player_pos, &mut zombie_pos, &self.obstacles, self.bounds);

        for (player, pos) in self
            .players
            .values_mut()
            .filter(|p| !p.is_down())
            .zip(player_pos)
        {
            player.pos = pos;
        }
        for (zombie, pos) in self.zombies.iter_mut().zip(zombie_pos) {
            zombie.pos = pos;
        }
    }

    /// Fire scheduled burst bullets with each player's current aim
    fn continue_bursts(&mut self, now: u64) {
        let mut due = Vec::new();
        for player in self.players.values_mut() {
            let id = player.id;
            for state in player.weapons_mut() {
                if CombatSystem::burst_due(state, now) {
                    due.push((id, state.weapon.clone()));
                }
            }
        }

        for (id, weapon) in due {
            self.fire(id, &weapon, now, Trigger::Burst);
        }
    }
}

/// Live counters published by the arena task
#[derive(Debug, Default)]
pub struct ArenaStats {
    pub players: AtomicUsize,
    pub zombies: AtomicUsize,
    pub wave: AtomicU32,
    pub tick: AtomicU64,
}

/// Handle to a running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub command_tx: mpsc::Sender<ArenaCommand>,
    pub outbound_tx: broadcast::Sender<Outbound>,
    pub stats: Arc<ArenaStats>,
}

impl ArenaHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.outbound_tx.subscribe()
    }
}

/// The authoritative arena task
pub struct GameArena {
    arena: Arena,
    command_rx: mpsc::Receiver<ArenaCommand>,
    clock: Timer,
    stats: Arc<ArenaStats>,
}

impl GameArena {
    /// Create a new arena and the handle connections use to reach it
    pub fn new(
        config: &ArenaConfig,
        catalog: WeaponCatalog,
        obstacles: Vec<Obstacle>,
        seed: u64,
    ) -> (Self, ArenaHandle) {
        let (command_tx, command_rx) = mpsc::channel(1024);
        let (outbound_tx, _) = broadcast::channel(256);
        let stats = Arc::new(ArenaStats::default());

        let handle = ArenaHandle {
            command_tx,
            outbound_tx: outbound_tx.clone(),
            stats: stats.clone(),
        };

        let game_arena = Self {
            arena: Arena::new(config, catalog, obstacles, seed, outbound_tx),
            command_rx,
            clock: Timer::new(),
            stats,
        };

        (game_arena, handle)
    }

    /// Run the fixed-step loop. Commands are applied between ticks on this
    /// task; the loop ends when every handle is dropped.
    pub async fn run(mut self) {
        info!(
            obstacles = self.arena.obstacles.len(),
            weapons = self.arena.catalog.all().len(),
            "Arena started"
        );

        let mut ticker = interval(Duration::from_micros(TICK_DURATION_MICROS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.arena.tick(self.clock.elapsed_ms());
                    self.publish_stats();
                }
                command = self.command_rx.recv() => match command {
                    Some(command) => self.arena.handle(command, self.clock.elapsed_ms()),
                    None => break,
                },
            }
        }

        info!(tick = self.arena.tick, "Arena stopped");
    }

    fn publish_stats(&self) {
        self.stats.players.store(self.arena.players.len(), Ordering::Relaxed);
        self.stats.zombies.store(self.arena.zombies.len(), Ordering::Relaxed);
        self.stats.wave.store(self.arena.round.wave, Ordering::Relaxed);
        self.stats.tick.store(self.arena.tick, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::HitPart;
    use serde_json::Value;

    fn test_arena() -> (Arena, broadcast::Receiver<Outbound>) {
        let config = ArenaConfig {
            dev_commands: true,
            ..ArenaConfig::default()
        };
        let (tx, rx) = broadcast::channel(4096);
        let arena = Arena::new(&config, WeaponCatalog::builtin(), Vec::new(), 99, tx);
        (arena, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<Outbound>) -> Vec<(Recipient, Value)> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push((msg.to, serde_json::from_str(&msg.json).unwrap()));
        }
        out
    }

    fn of_type<'a>(msgs: &'a [(Recipient, Value)], ty: &str) -> Vec<&'a Value> {
        msgs.iter().filter(|(_, v)| v["type"] == ty).map(|(_, v)| v).collect()
    }

    fn join(arena: &mut Arena, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        arena.handle(
            ArenaCommand::Join {
                id,
                name: name.to_string(),
            },
            0,
        );
        id
    }

    fn client(arena: &mut Arena, id: Uuid, json: &str, now: u64) {
        let msg: ClientMsg = serde_json::from_str(json).unwrap();
        arena.handle(ArenaCommand::Client { id, msg }, now);
    }

    fn equip(arena: &mut Arena, id: Uuid, weapon: &str) {
        let state = WeaponState::new(arena.catalog.get(weapon).unwrap());
        arena.players.get_mut(&id).unwrap().primary = Some(state);
    }

    fn put_zombie(arena: &mut Arena, id: u32, x: f32, z: f32, hp: i32) {
        arena.zombies.push(Zombie {
            id: 1000 + id,
            pos: Vec2::new(x, z),
            hp,
            speed: 0.0,
            fast: false,
        });
    }

    #[test]
    fn join_sends_targeted_welcome_and_broadcast_join() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        let msgs = drain(&mut rx);

        let (to, welcome) = msgs.iter().find(|(_, v)| v["type"] == "welcome").unwrap();
        assert_eq!(*to, Recipient::Player(id));
        assert_eq!(welcome["id"], id.to_string());
        assert_eq!(welcome["round"]["between"], true);
        assert!(welcome["weapons"].as_array().unwrap().len() >= 5);

        let (to, _) = msgs.iter().find(|(_, v)| v["type"] == "join").unwrap();
        assert_eq!(*to, Recipient::All);

        let player = &arena.players[&id];
        assert_eq!(player.hp, 100);
        assert_eq!(arena.catalog.get(&player.pistol.weapon).unwrap().slot, Slot::Pistol);
        assert!(player.primary.is_none());
    }

    #[test]
    fn ready_starts_wave_one() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        drain(&mut rx);

        client(&mut arena, id, r#"{"type":"ready"}"#, 500);
        assert!(!arena.round.between);
        assert_eq!(arena.round.zombies_target, 10);

        let msgs = drain(&mut rx);
        let rounds = of_type(&msgs, "round");
        assert_eq!(rounds.len(), 1);
        assert_eq!(
            *rounds[0],
            serde_json::json!({"type": "round", "between": false, "wave": 1, "zombiesTarget": 10})
        );

        // Second ready while active is ignored
        client(&mut arena, id, r#"{"type":"ready"}"#, 600);
        assert!(of_type(&drain(&mut rx), "round").is_empty());
    }

    #[test]
    fn movement_follows_yaw_and_normalizes_diagonals() {
        let (mut arena, _rx) = test_arena();
        let id = join(&mut arena, "alice");
        arena.players.get_mut(&id).unwrap().pos = Vec2::ZERO;

        client(&mut arena, id, r#"{"type":"input","yaw":0,"pitch":0,"keys":{"w":true}}"#, 0);
        arena.tick(50);
        let pos = arena.players[&id].pos;
        assert!(pos.x.abs() < 1e-5);
        assert!((pos.y + BASE_SPEED * tick_delta()).abs() < 1e-5);

        arena.players.get_mut(&id).unwrap().pos = Vec2::ZERO;
        client(&mut arena, id, r#"{"type":"input","yaw":0,"pitch":0,"keys":{"w":true,"d":true}}"#, 0);
        arena.tick(100);
        let pos = arena.players[&id].pos;
        assert!((pos.length() - BASE_SPEED * tick_delta()).abs() < 1e-5);
        assert!(pos.x > 0.0 && pos.y < 0.0);
    }

    #[test]
    fn input_is_sanitized() {
        let (mut arena, _rx) = test_arena();
        let id = join(&mut arena, "alice");
        client(&mut arena, id, r#"{"type":"input","yaw":1.0,"pitch":9.0,"keys":{}}"#, 0);
        assert_eq!(arena.players[&id].pitch, MAX_PITCH);

        arena.handle(
            ArenaCommand::Client {
                id,
                msg: ClientMsg::Input {
                    yaw: f32::NAN,
                    pitch: 0.0,
                    keys: Keys::default(),
                    dt: None,
                },
            },
            0,
        );
        assert_eq!(arena.players[&id].yaw, 1.0);
    }

    #[test]
    fn shooting_needs_active_round() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        let pistol = arena.players[&id].pistol.weapon.clone();
        let mag = arena.players[&id].pistol.mag;
        drain(&mut rx);

        client(&mut arena, id, &format!(r#"{{"type":"shoot","weapon":"{pistol}"}}"#), 1000);
        assert_eq!(arena.players[&id].pistol.mag, mag);
        assert!(of_type(&drain(&mut rx), "shot").is_empty());

        // Weapon the player does not hold
        client(&mut arena, id, r#"{"type":"ready"}"#, 1000);
        client(&mut arena, id, r#"{"type":"shoot","weapon":"sniper_semi"}"#, 1000);
        assert!(of_type(&drain(&mut rx), "shot").is_empty());

        client(&mut arena, id, &format!(r#"{{"type":"shoot","weapon":"{pistol}"}}"#), 1000);
        assert_eq!(arena.players[&id].pistol.mag, mag - 1);
        let msgs = drain(&mut rx);
        let shots = of_type(&msgs, "shot");
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0]["mag"], mag - 1);
    }

    #[test]
    fn shotgun_body_shot_applies_two_pellets() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        equip(&mut arena, id, "shotgun_semi");
        client(&mut arena, id, r#"{"type":"ready"}"#, 0);
        arena.players.get_mut(&id).unwrap().pos = Vec2::ZERO;
        put_zombie(&mut arena, 1, 0.0, -2.0, 104);
        drain(&mut rx);

        let pitch = ((crate::game::combat::BODY_CENTER_Y - crate::game::combat::EYE_HEIGHT) / 2.0).atan();
        client(
            &mut arena,
            id,
            &format!(r#"{{"type":"shoot","weapon":"shotgun_semi","aim":{{"yaw":0,"pitch":{pitch}}}}}"#),
            1000,
        );

        let msgs = drain(&mut rx);
        let hits = of_type(&msgs, "zhit");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h["part"] == "body" && h["dmg"] == 10));
        assert_eq!(arena.zombies[0].hp, 84);
        assert_eq!(arena.players[&id].primary.as_ref().unwrap().mag, 5);
    }

    #[test]
    fn kill_pays_out_and_ends_wave() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        equip(&mut arena, id, "sniper_semi");
        client(&mut arena, id, r#"{"type":"ready"}"#, 0);
        arena.round.zombies_target = 1;
        arena.round.zombies_spawned = 1;
        arena.players.get_mut(&id).unwrap().pos = Vec2::ZERO;
        put_zombie(&mut arena, 1, 0.0, -5.0, 30);
        let cash = arena.players[&id].cash;
        drain(&mut rx);

        client(
            &mut arena,
            id,
            r#"{"type":"shoot","weapon":"sniper_semi","aim":{"yaw":0,"pitch":0}}"#,
            1000,
        );

        assert!(arena.zombies.is_empty());
        assert_eq!(arena.players[&id].cash, cash + director::kill_reward(1));
        assert!(arena.round.between);
        assert_eq!(arena.round.wave, 2);

        let msgs = drain(&mut rx);
        assert_eq!(of_type(&msgs, "zdead").len(), 1);
        let round = of_type(&msgs, "round");
        assert_eq!(round.len(), 1);
        assert_eq!(round[0]["between"], true);
        assert_eq!(round[0]["wave"], 2);
    }

    #[test]
    fn headshot_part_is_reported() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        equip(&mut arena, id, "sniper_semi");
        client(&mut arena, id, r#"{"type":"ready"}"#, 0);
        arena.players.get_mut(&id).unwrap().pos = Vec2::ZERO;
        put_zombie(&mut arena, 1, 0.0, -5.0, 1000);
        drain(&mut rx);

        // Upper half of the head, clear of the body sphere
        let pitch = ((crate::game::combat::HEAD_CENTER_Y + 0.15 - crate::game::combat::EYE_HEIGHT) / 5.0).atan();
        client(
            &mut arena,
            id,
            &format!(r#"{{"type":"shoot","weapon":"sniper_semi","aim":{{"yaw":0,"pitch":{pitch}}}}}"#),
            1000,
        );
        let msgs = drain(&mut rx);
        let hit = of_type(&msgs, "zhit")[0];
        assert_eq!(hit["part"], serde_json::to_value(HitPart::Head).unwrap());
        assert!(hit["dmg"].as_i64().unwrap() >= 2 * 110);
    }

    #[test]
    fn burst_fires_three_bullets_over_three_ticks() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        equip(&mut arena, id, "ar_burst");
        client(&mut arena, id, r#"{"type":"ready"}"#, 1000);
        drain(&mut rx);

        client(&mut arena, id, r#"{"type":"shoot","weapon":"ar_burst"}"#, 1000);
        // Aim moves between bullets; continuation uses the fresh aim
        client(&mut arena, id, r#"{"type":"input","yaw":0.5,"pitch":0,"keys":{}}"#, 1020);
        for now in [1050, 1100, 1150] {
            arena.tick(now);
        }

        let msgs = drain(&mut rx);
        let shots: Vec<_> = of_type(&msgs, "shot")
            .into_iter()
            .filter(|s| s["id"] == id.to_string())
            .collect();
        assert_eq!(shots.len(), 3);
        assert_eq!(shots[2]["yaw"], 0.5);

        let state = arena.players[&id].primary.as_ref().unwrap();
        assert_eq!(state.mag, 27);
        assert_eq!(state.burst_left, 0);
        assert_eq!(state.next_fire_at, 1150 + 320);

        // Gate holds until the fire interval passes
        client(&mut arena, id, r#"{"type":"shoot","weapon":"ar_burst"}"#, 1200);
        assert_eq!(arena.players[&id].primary.as_ref().unwrap().mag, 27);
    }

    #[test]
    fn empty_mag_auto_reloads_instead_of_firing() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        equip(&mut arena, id, "ar_auto");
        client(&mut arena, id, r#"{"type":"ready"}"#, 0);
        arena.players.get_mut(&id).unwrap().primary.as_mut().unwrap().mag = 0;
        drain(&mut rx);

        client(&mut arena, id, r#"{"type":"shoot","weapon":"ar_auto"}"#, 1000);
        let msgs = drain(&mut rx);
        assert!(of_type(&msgs, "shot").is_empty());
        assert_eq!(of_type(&msgs, "reload").len(), 1);

        let state = arena.players[&id].primary.as_ref().unwrap();
        assert!(state.reloading);
        assert_eq!((state.mag, state.reserve), (30, 90));
    }

    #[test]
    fn manual_reload_broadcasts() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        equip(&mut arena, id, "smg_auto");
        arena.players.get_mut(&id).unwrap().primary.as_mut().unwrap().mag = 10;
        drain(&mut rx);

        client(&mut arena, id, r#"{"type":"reload","weapon":"smg_auto"}"#, 0);
        client(&mut arena, id, r#"{"type":"reload","weapon":"smg_auto"}"#, 10);
        let msgs = drain(&mut rx);
        assert_eq!(of_type(&msgs, "reload").len(), 1);
        assert_eq!(arena.players[&id].primary.as_ref().unwrap().mag, 35);
    }

    #[test]
    fn primary_pick_cooldown_and_phase() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        drain(&mut rx);

        client(&mut arena, id, r#"{"type":"pickPrimary","weapon":"ar_auto"}"#, 0);
        assert_eq!(arena.players[&id].primary.as_ref().unwrap().weapon, "ar_auto");
        assert_eq!(arena.players[&id].pick_cooldowns["ar_auto"], 4);
        assert_eq!(of_type(&drain(&mut rx), "loadout").len(), 1);

        client(&mut arena, id, r#"{"type":"pickPrimary","weapon":"smg_auto"}"#, 0);
        client(&mut arena, id, r#"{"type":"pickPrimary","weapon":"ar_auto"}"#, 0);
        let msgs = drain(&mut rx);
        let denied: Vec<_> = msgs.iter().filter(|(_, v)| v["type"] == "pickDenied").collect();
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].0, Recipient::Player(id));
        assert_eq!(arena.players[&id].primary.as_ref().unwrap().weapon, "smg_auto");

        // Wave 4 unlocks it again
        arena.round.wave = 4;
        client(&mut arena, id, r#"{"type":"pickPrimary","weapon":"ar_auto"}"#, 0);
        assert_eq!(arena.players[&id].primary.as_ref().unwrap().weapon, "ar_auto");

        client(&mut arena, id, r#"{"type":"ready"}"#, 0);
        drain(&mut rx);
        client(&mut arena, id, r#"{"type":"pickPistol","weapon":"pistol_heavy"}"#, 0);
        assert_eq!(of_type(&drain(&mut rx), "pickDenied").len(), 1);
    }

    #[test]
    fn pick_rejects_wrong_slot_and_ignores_unknown() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        drain(&mut rx);

        client(&mut arena, id, r#"{"type":"pickPistol","weapon":"ar_auto"}"#, 0);
        assert_eq!(of_type(&drain(&mut rx), "pickDenied").len(), 1);

        client(&mut arena, id, r#"{"type":"pickPistol","weapon":"railgun"}"#, 0);
        assert!(drain(&mut rx).is_empty());

        client(&mut arena, id, r#"{"type":"pickPistol","weapon":"pistol_heavy"}"#, 0);
        assert_eq!(arena.players[&id].pistol.weapon, "pistol_heavy");
        assert_eq!(arena.players[&id].pistol.reserve, 28);
    }

    #[test]
    fn buy_between_rounds_only() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        arena.players.get_mut(&id).unwrap().cash = 200;
        drain(&mut rx);

        client(&mut arena, id, r#"{"type":"buy","item":"armor"}"#, 0);
        assert!((arena.players[&id].armor - 0.2).abs() < 1e-5);
        assert_eq!(arena.players[&id].cash, 125);
        assert_eq!(of_type(&drain(&mut rx), "bought").len(), 1);

        client(&mut arena, id, r#"{"type":"buy","item":"medkit"}"#, 0);
        let msgs = drain(&mut rx);
        let (to, toast) = msgs.iter().find(|(_, v)| v["type"] == "toast").unwrap();
        assert_eq!(*to, Recipient::Player(id));
        assert_eq!(toast["msg"], "Already at full health");

        client(&mut arena, id, r#"{"type":"ready"}"#, 0);
        client(&mut arena, id, r#"{"type":"buy","item":"speed"}"#, 0);
        assert_eq!(arena.players[&id].speed, BASE_SPEED);
    }

    #[test]
    fn dev_loadout_bypasses_gates() {
        let (mut arena, _rx) = test_arena();
        let id = join(&mut arena, "alice");
        client(&mut arena, id, r#"{"type":"ready"}"#, 0);
        client(
            &mut arena,
            id,
            r#"{"type":"devSetLoadout","primary":"sniper_semi","pistol":"pistol_auto"}"#,
            0,
        );
        assert_eq!(arena.players[&id].primary.as_ref().unwrap().weapon, "sniper_semi");
        assert_eq!(arena.players[&id].pistol.weapon, "pistol_auto");

        arena.dev_commands = false;
        client(&mut arena, id, r#"{"type":"devSetLoadout","primary":"ar_auto"}"#, 0);
        assert_eq!(arena.players[&id].primary.as_ref().unwrap().weapon, "sniper_semi");
    }

    #[test]
    fn zombie_melee_respects_cooldown_and_armor() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        client(&mut arena, id, r#"{"type":"ready"}"#, 0);
        arena.round.zombies_spawned = arena.round.zombies_target;
        {
            let p = arena.players.get_mut(&id).unwrap();
            p.pos = Vec2::ZERO;
            p.armor = 0.6;
        }
        put_zombie(&mut arena, 1, 0.9, 0.0, 100);
        drain(&mut rx);

        arena.tick(1000);
        arena.tick(1300);
        assert_eq!(arena.players[&id].hp, 96);
        arena.tick(1650);
        assert_eq!(arena.players[&id].hp, 92);

        let msgs = drain(&mut rx);
        let hits = of_type(&msgs, "phit");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["dmg"], 4);
    }

    #[test]
    fn downed_player_waits_for_round_end() {
        let (mut arena, mut rx) = test_arena();
        let id = join(&mut arena, "alice");
        client(&mut arena, id, r#"{"type":"ready"}"#, 0);
        arena.round.zombies_spawned = arena.round.zombies_target;
        {
            let p = arena.players.get_mut(&id).unwrap();
            p.pos = Vec2::ZERO;
            p.hp = 5;
        }
        put_zombie(&mut arena, 1, 0.9, 0.0, 100);
        let cash = arena.players[&id].cash;

        arena.tick(1000);
        assert_eq!(arena.players[&id].hp, 0);
        assert_eq!(of_type(&drain(&mut rx), "pdown").len(), 1);

        arena.tick(5000);
        assert_eq!(arena.players[&id].hp, 0);

        arena.zombies.clear();
        arena.round.between = true;
        let before = arena.players[&id].pos;
        arena.tick(6000);
        let player = &arena.players[&id];
        assert_eq!(player.hp, 100);
        assert_ne!(player.pos, before);
        assert_eq!(player.cash, cash);
    }

    #[test]
    fn leave_removes_player_from_next_snapshot() {
        let (mut arena, mut rx) = test_arena();
        let a = join(&mut arena, "alice");
        let b = join(&mut arena, "bob");
        arena.handle(ArenaCommand::Leave { id: a }, 0);
        drain(&mut rx);

        arena.tick(50);
        let msgs = drain(&mut rx);
        let state = of_type(&msgs, "state")[0];
        let ids: Vec<&str> = state["players"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![b.to_string().as_str()]);
        assert_eq!(state["tick"], 1);
    }

    #[test]
    fn snapshots_are_tick_numbered() {
        let (mut arena, mut rx) = test_arena();
        join(&mut arena, "alice");
        drain(&mut rx);
        for i in 1..=3 {
            arena.tick(i * 50);
        }
        let msgs = drain(&mut rx);
        let ticks: Vec<u64> = of_type(&msgs, "state")
            .iter()
            .map(|s| s["tick"].as_u64().unwrap())
            .collect();
        assert_eq!(ticks, vec![1, 2, 3]);
    }

    #[test]
    fn active_wave_spawns_zombies_outside_walls() {
        let (mut arena, _rx) = test_arena();
        let id = join(&mut arena, "alice");
        client(&mut arena, id, r#"{"type":"ready"}"#, 10_000);
        arena.tick(10_000);
        assert_eq!(arena.zombies.len(), 1);
        assert_eq!(arena.round.zombies_spawned, 1);
        let z = &arena.zombies[0];
        assert!(z.pos.x.abs() > 38.0 || z.pos.y.abs() > 38.0);
    }

    #[test]
    fn commands_from_unknown_players_are_ignored() {
        let (mut arena, mut rx) = test_arena();
        client(&mut arena, Uuid::new_v4(), r#"{"type":"ready"}"#, 0);
        assert!(arena.round.between);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn arena_task_welcomes_over_channels() {
        let (game_arena, handle) = GameArena::new(&ArenaConfig::default(), WeaponCatalog::builtin(), Vec::new(), 5);
        let mut rx = handle.subscribe();
        let task = tokio::spawn(game_arena.run());

        let id = Uuid::new_v4();
        handle
            .command_tx
            .send(ArenaCommand::Join {
                id,
                name: "alice".into(),
            })
            .await
            .unwrap();

        let welcome = loop {
            let msg = rx.recv().await.unwrap();
            if msg.is_for(id) && msg.json.contains(r#""type":"welcome""#) {
                break msg;
            }
        };
        assert_eq!(welcome.to, Recipient::Player(id));

        drop(handle);
        tokio_test::assert_ok!(task.await);
    }
}
