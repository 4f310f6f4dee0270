//! Match state definitions and structures
//!
//! Contains all entities (players, asteroids, bullets, towers, effects) and the
//! `MatchState` that owns them. Systems receive `&mut MatchState` explicitly;
//! there is no ambient global state.

use std::collections::VecDeque;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::game::constants::{aim, bullet, player, tower, world};
use crate::game::phase::UpgradeRound;
use crate::game::systems::spawner::AttackType;
use crate::game::systems::towers::TowerKind;
use crate::game::upgrades::PlayerUpgrades;
use crate::lobby::roster::Roster;
use crate::net::protocol::{ServerMessage, WorldInfo};
use crate::util::vec2::Vec2;

/// Unique player identifier
pub type PlayerId = Uuid;

/// Identifier for asteroids and bullets, never reused within a match
pub type EntityId = u64;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lobby,
    Playing,
    Upgrades,
    #[serde(rename = "gameover")]
    GameOver,
}

/// Asteroid size class; determines radius band and base HP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    pub fn radius_range(&self) -> (f32, f32) {
        use crate::game::constants::asteroid::*;
        match self {
            SizeClass::Small => SMALL_RADIUS,
            SizeClass::Medium => MEDIUM_RADIUS,
            SizeClass::Large => LARGE_RADIUS,
        }
    }

    pub fn base_hp(&self) -> f32 {
        use crate::game::constants::asteroid::*;
        match self {
            SizeClass::Small => SMALL_BASE_HP,
            SizeClass::Medium => MEDIUM_BASE_HP,
            SizeClass::Large => LARGE_BASE_HP,
        }
    }
}

/// Player state for one match participant
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Lane index, fixed for the match
    pub slot: usize,

    // Economy and health
    pub gold: u32,
    pub hp: i32,
    pub max_hp: i32,
    pub score: u32,
    pub kills: u32,
    pub damage_dealt: f32,
    pub wave_damage: f32,

    // Aiming
    pub cooldown: f32,
    pub turret_angle: f32,
    /// Last aim point reported by the client
    pub target: Vec2,
    pub manual_shooting: bool,

    pub upgrades: PlayerUpgrades,
    pub towers: [Option<Tower>; tower::SLOTS],
    /// Attack purchases aimed at this lane, spawned with the next wave
    pub incoming_attacks: Vec<AttackType>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, slot: usize) -> Self {
        let (x0, _) = crate::game::systems::targeting::segment_bounds(slot);
        Self {
            id,
            name,
            slot,
            gold: player::STARTING_GOLD,
            hp: player::BASE_HP,
            max_hp: player::BASE_HP,
            score: 0,
            kills: 0,
            damage_dealt: 0.0,
            wave_damage: 0.0,
            cooldown: 0.0,
            turret_angle: aim::STRAIGHT_UP,
            target: Vec2::new(x0 + world::SEGMENT_W / 2.0, 0.0),
            manual_shooting: false,
            upgrades: PlayerUpgrades::default(),
            towers: [None; tower::SLOTS],
            incoming_attacks: Vec::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Deduct gold if affordable. Returns false (and changes nothing) otherwise.
    pub fn try_spend(&mut self, cost: u32) -> bool {
        if self.gold < cost {
            return false;
        }
        self.gold -= cost;
        true
    }
}

/// A purchased tower occupying one of a player's slots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tower {
    pub kind: TowerKind,
    /// 1..=MAX_LEVEL
    pub level: u8,
    pub cooldown: f32,
    pub angle: f32,
}

impl Tower {
    pub fn new(kind: TowerKind) -> Self {
        Self {
            kind,
            level: 1,
            cooldown: 0.0,
            angle: aim::STRAIGHT_UP,
        }
    }
}

/// A queued asteroid waiting for its staggered entry
#[derive(Debug, Clone)]
pub struct SpawnEntry {
    /// Horizontal spawn position (world x)
    pub x: f32,
    pub velocity: Vec2,
    pub radius: f32,
    pub hp: f32,
    pub size: SizeClass,
    pub target_slot: usize,
    pub attack_type: Option<AttackType>,
    pub rotation: f32,
    pub spin: f32,
}

/// Hostile unit falling toward exactly one lane
#[derive(Debug, Clone)]
pub struct Asteroid {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub rotation: f32,
    pub spin: f32,
    /// Outline as (angle, distance factor) pairs
    pub shape: Vec<(f32, f32)>,
    pub hp: f32,
    pub max_hp: f32,
    pub size: SizeClass,
    target_slot: usize,
    pub attack_type: Option<AttackType>,
    pub phasing: bool,
    pub phase_timer: f32,
    pub is_phased: bool,
    /// Bomber: detonates on ground impact
    pub explosive: bool,
    /// Number of children spawned on death
    pub splits: u32,
    pub in_ftl: bool,
    pub ftl_threshold: f32,
    /// Player credited with the kill if hp drops to zero
    pub last_hit_by: Option<PlayerId>,
    pub dead: bool,
}

impl Asteroid {
    pub fn new(
        id: EntityId,
        position: Vec2,
        radius: f32,
        hp: f32,
        size: SizeClass,
        target_slot: usize,
    ) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            radius,
            rotation: 0.0,
            spin: 0.0,
            shape: Vec::new(),
            hp,
            max_hp: hp,
            size,
            target_slot,
            attack_type: None,
            phasing: false,
            phase_timer: 0.0,
            is_phased: false,
            explosive: false,
            splits: 0,
            in_ftl: false,
            ftl_threshold: 0.0,
            last_hit_by: None,
            dead: false,
        }
    }

    /// Lane this asteroid attacks. Fixed at spawn.
    pub fn target_slot(&self) -> usize {
        self.target_slot
    }

    /// Alive and past its FTL entry, so it can be targeted and hit
    pub fn is_engaged(&self) -> bool {
        !self.dead && !self.in_ftl
    }

    pub fn is_natural(&self) -> bool {
        self.attack_type.is_none()
    }
}

/// Visual class of a bullet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulletKind {
    Main,
    Gatling,
    Sniper,
    Missile,
}

/// Projectile fired by a player turret or tower
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: EntityId,
    pub owner_id: PlayerId,
    pub owner_slot: usize,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub damage: f32,
    pub is_crit: bool,
    /// Explosive level; 0 means no splash
    pub explosive: f32,
    pub chain: bool,
    pub ricochet: u32,
    pub pierce: u32,
    pub lifespan: f32,
    pub kind: BulletKind,
    pub is_tower_bullet: bool,
    pub homing: bool,
    /// Asteroids already struck since the last ricochet
    pub hit_list: SmallVec<[EntityId; 8]>,
    pub dead: bool,
}

impl Bullet {
    pub fn new(id: EntityId, owner_id: PlayerId, owner_slot: usize, position: Vec2, velocity: Vec2) -> Self {
        Self {
            id,
            owner_id,
            owner_slot,
            position,
            velocity,
            radius: bullet::RADIUS,
            damage: bullet::DAMAGE,
            is_crit: false,
            explosive: 0.0,
            chain: false,
            ricochet: 0,
            pierce: 0,
            lifespan: bullet::LIFESPAN,
            kind: BulletKind::Main,
            is_tower_bullet: false,
            homing: true,
            hit_list: SmallVec::new(),
            dead: false,
        }
    }
}

/// Cosmetic explosion fragment
#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub life: f32,
    pub max_life: f32,
    pub alpha: f32,
    pub color: &'static str,
    pub size: f32,
}

/// Floating damage readout
#[derive(Debug, Clone)]
pub struct DamageNumber {
    pub position: Vec2,
    /// Rounded to one decimal
    pub value: f32,
    pub is_crit: bool,
    pub age: f32,
}

/// Who receives an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    Player(PlayerId),
}

/// Message produced by the match for the session layer to deliver
#[derive(Debug, Clone)]
pub struct Outbound {
    pub recipient: Recipient,
    pub message: ServerMessage,
}

/// Complete state of the lobby and the match in progress
#[derive(Debug)]
pub struct MatchState {
    pub phase: Phase,
    pub wave: u32,
    /// Connected clients, with lobby slots and ready flags
    pub roster: Roster,
    /// Match participants, created on start
    pub players: HashMap<PlayerId, Player>,
    /// Lane index to participant, for O(1) lane lookups
    pub lanes: [Option<PlayerId>; world::MAX_PLAYERS],
    /// Number of lanes locked when the match started
    pub lane_count: usize,
    pub asteroids: Vec<Asteroid>,
    pub bullets: Vec<Bullet>,
    pub particles: Vec<Particle>,
    pub damage_numbers: Vec<DamageNumber>,
    pub spawn_queue: VecDeque<SpawnEntry>,
    pub spawn_timer: f32,
    /// Wall-clock ms when the field was first seen empty
    pub wave_cleared_at: Option<u64>,
    pub upgrade_round: Option<UpgradeRound>,
    /// Wall-clock ms when the match ended
    pub gameover_at: Option<u64>,
    pub outbox: Vec<Outbound>,
    next_entity_id: EntityId,
}

impl MatchState {
    pub fn new(max_players: usize) -> Self {
        Self {
            phase: Phase::Lobby,
            wave: 0,
            roster: Roster::new(max_players),
            players: HashMap::with_capacity(world::MAX_PLAYERS),
            lanes: [None; world::MAX_PLAYERS],
            lane_count: 0,
            asteroids: Vec::with_capacity(64),
            bullets: Vec::with_capacity(128),
            particles: Vec::with_capacity(256),
            damage_numbers: Vec::with_capacity(64),
            spawn_queue: VecDeque::new(),
            spawn_timer: 0.0,
            wave_cleared_at: None,
            upgrade_round: None,
            gameover_at: None,
            outbox: Vec::new(),
            next_entity_id: 1,
        }
    }

    /// Allocate a fresh entity id
    pub fn alloc_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Participant owning the given lane
    pub fn lane_player(&self, slot: usize) -> Option<&Player> {
        let id = (*self.lanes.get(slot)?)?;
        self.players.get(&id)
    }

    pub fn lane_player_mut(&mut self, slot: usize) -> Option<&mut Player> {
        let id = (*self.lanes.get(slot)?)?;
        self.players.get_mut(&id)
    }

    /// Participant ids in lane order
    pub fn lane_ids(&self) -> Vec<PlayerId> {
        self.lanes.iter().flatten().copied().collect()
    }

    /// Lanes whose owner still has HP
    pub fn living_lanes(&self) -> Vec<usize> {
        self.lanes
            .iter()
            .enumerate()
            .filter_map(|(slot, id)| {
                let id = (*id)?;
                self.players.get(&id).filter(|p| p.is_alive()).map(|_| slot)
            })
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }

    /// True when the match was started with two or more lanes
    pub fn is_pvp(&self) -> bool {
        self.lane_count >= 2
    }

    /// World geometry as sent to clients
    pub fn world(&self) -> WorldInfo {
        let lanes = if self.phase == Phase::Lobby {
            self.roster.len()
        } else {
            self.lane_count
        };
        WorldInfo::for_lanes(lanes)
    }

    /// Queue a message for one player
    pub fn send(&mut self, player_id: PlayerId, message: ServerMessage) {
        self.outbox.push(Outbound {
            recipient: Recipient::Player(player_id),
            message,
        });
    }

    /// Queue a message for every connected client
    pub fn broadcast(&mut self, message: ServerMessage) {
        self.outbox.push(Outbound {
            recipient: Recipient::All,
            message,
        });
    }

    /// Take all queued outbound messages
    pub fn take_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Clear every transient entity list
    pub fn clear_entities(&mut self) {
        self.asteroids.clear();
        self.bullets.clear();
        self.particles.clear();
        self.damage_numbers.clear();
        self.spawn_queue.clear();
        self.spawn_timer = 0.0;
        self.wave_cleared_at = None;
    }

    /// Remove dead asteroids and bullets in place
    pub fn sweep_dead(&mut self) {
        self.asteroids.retain(|a| !a.dead);
        self.bullets.retain(|b| !b.dead);
    }

    /// Drop everything belonging to the current match and return to lobby geometry
    pub fn clear_match(&mut self) {
        self.clear_entities();
        self.players.clear();
        self.lanes = [None; world::MAX_PLAYERS];
        self.lane_count = 0;
        self.wave = 0;
        self.upgrade_round = None;
        self.gameover_at = None;
    }
}
