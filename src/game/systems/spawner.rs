//! Wave composition, PvP attack purchases and staggered asteroid entry

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::game::constants::{asteroid, ftl, wave, world};
use crate::game::state::{Asteroid, MatchState, Phase, PlayerId, SizeClass, SpawnEntry};
use crate::game::systems::targeting::segment_bounds;
use crate::net::protocol::ServerMessage;
use crate::util::vec2::Vec2;

/// Themed asteroid group a player can send at an opponent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackType {
    Swarm,
    Bruiser,
    Bomber,
    Splitter,
    Ghost,
}

/// Static stats of an attack type
#[derive(Debug, Clone, Copy)]
pub struct AttackDef {
    pub name: &'static str,
    pub cost: u32,
    pub count: u32,
    pub base_hp: f32,
    pub hp_scale: f32,
    pub size: SizeClass,
    pub speed: f32,
    pub explosive: bool,
    pub splits: u32,
    pub phasing: bool,
}

impl AttackType {
    pub const ALL: [AttackType; 5] = [
        AttackType::Swarm,
        AttackType::Bruiser,
        AttackType::Bomber,
        AttackType::Splitter,
        AttackType::Ghost,
    ];

    pub fn def(&self) -> AttackDef {
        let plain = AttackDef {
            name: "",
            cost: 0,
            count: 1,
            base_hp: 1.0,
            hp_scale: 1.0,
            size: SizeClass::Medium,
            speed: 1.0,
            explosive: false,
            splits: 0,
            phasing: false,
        };
        match self {
            AttackType::Swarm => AttackDef { name: "Swarm", cost: 15, count: 4, base_hp: 1.0, hp_scale: 1.2, size: SizeClass::Small, speed: 1.3, ..plain },
            AttackType::Bruiser => AttackDef { name: "Bruiser", cost: 45, count: 1, base_hp: 5.0, hp_scale: 1.5, size: SizeClass::Large, speed: 0.6, ..plain },
            AttackType::Bomber => AttackDef { name: "Bomber", cost: 55, count: 1, base_hp: 3.0, hp_scale: 1.0, size: SizeClass::Medium, speed: 1.0, explosive: true, ..plain },
            AttackType::Splitter => AttackDef { name: "Splitter", cost: 50, count: 1, base_hp: 4.0, hp_scale: 1.3, size: SizeClass::Large, speed: 0.75, splits: 4, ..plain },
            AttackType::Ghost => AttackDef { name: "Ghost", cost: 40, count: 2, base_hp: 2.0, hp_scale: 1.2, size: SizeClass::Medium, speed: 1.1, phasing: true, ..plain },
        }
    }
}

/// Attack purchase errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttackError {
    #[error("Attacks can only be bought during a match")]
    WrongPhase,
    #[error("Attacks need at least two players")]
    NotPvp,
    #[error("Player is not in the match")]
    UnknownPlayer,
    #[error("Eliminated players cannot attack")]
    BuyerEliminated,
    #[error("No living opponent")]
    NoOpponent,
    #[error("Not enough gold: need {need}, have {have}")]
    InsufficientGold { need: u32, have: u32 },
}

/// Result of a successful attack purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackReceipt {
    pub target_id: PlayerId,
    pub target_slot: usize,
    pub cost: u32,
}

fn random_radius<R: Rng + ?Sized>(size: SizeClass, rng: &mut R) -> f32 {
    let (lo, hi) = size.radius_range();
    rng.gen_range(lo..=hi)
}

fn lane_spawn_x<R: Rng + ?Sized>(slot: usize, radius: f32, rng: &mut R) -> f32 {
    let (x0, _) = segment_bounds(slot);
    let margin = radius + asteroid::SPAWN_MARGIN;
    x0 + rng.gen_range(margin..=world::SEGMENT_W - margin)
}

fn roll_size<R: Rng + ?Sized>(wave_number: u32, rng: &mut R) -> SizeClass {
    let large_chance = (wave::LARGE_CHANCE_BASE + wave::LARGE_CHANCE_PER_WAVE * wave_number as f32).min(wave::LARGE_CHANCE_CAP);
    let roll: f32 = rng.gen();
    if roll < large_chance {
        SizeClass::Large
    } else if roll < large_chance + wave::MEDIUM_CHANCE {
        SizeClass::Medium
    } else {
        SizeClass::Small
    }
}

fn natural_entry<R: Rng + ?Sized>(slot: usize, wave_number: u32, rng: &mut R) -> SpawnEntry {
    let size = roll_size(wave_number, rng);
    let radius = random_radius(size, rng);
    SpawnEntry {
        x: lane_spawn_x(slot, radius, rng),
        velocity: Vec2::new(
            rng.gen_range(asteroid::VX_RANGE.0..=asteroid::VX_RANGE.1),
            rng.gen_range(asteroid::VY_RANGE.0..=asteroid::VY_RANGE.1),
        ),
        radius,
        hp: (size.base_hp() + wave_number as f32 * wave::HP_SCALE).ceil(),
        size,
        target_slot: slot,
        attack_type: None,
        rotation: rng.gen_range(0.0..std::f32::consts::TAU),
        spin: rng.gen_range(asteroid::SPIN_RANGE.0..=asteroid::SPIN_RANGE.1),
    }
}

fn attack_entry<R: Rng + ?Sized>(attack: AttackType, slot: usize, wave_number: u32, rng: &mut R) -> SpawnEntry {
    let def = attack.def();
    let radius = random_radius(def.size, rng);
    SpawnEntry {
        x: lane_spawn_x(slot, radius, rng),
        velocity: Vec2::new(
            rng.gen_range(asteroid::VX_RANGE.0..=asteroid::VX_RANGE.1),
            rng.gen_range(asteroid::VY_RANGE.0..=asteroid::VY_RANGE.1) * def.speed,
        ),
        radius,
        hp: (def.base_hp + wave_number as f32 * def.hp_scale).ceil(),
        size: def.size,
        target_slot: slot,
        attack_type: Some(attack),
        rotation: rng.gen_range(0.0..std::f32::consts::TAU),
        spin: rng.gen_range(asteroid::SPIN_RANGE.0..=asteroid::SPIN_RANGE.1),
    }
}

/// Number of natural asteroids in a wave
pub fn natural_count(wave_number: u32) -> u32 {
    wave::BASE_COUNT + (wave_number as f32 * wave::COUNT_SCALE).floor() as u32
}

/// Reset the field and queue the next wave
pub fn spawn_wave<R: Rng + ?Sized>(state: &mut MatchState, rng: &mut R) {
    state.clear_entities();
    for player in state.players.values_mut() {
        player.wave_damage = 0.0;
        player.upgrades.recharge_shield();
    }

    let wave_number = state.wave;
    let lanes = state.living_lanes();
    if lanes.is_empty() {
        return;
    }

    for _ in 0..natural_count(wave_number) {
        let slot = lanes.choose(rng).copied().unwrap_or(lanes[0]);
        let entry = natural_entry(slot, wave_number, rng);
        state.spawn_queue.push_back(entry);
    }

    for slot in 0..world::MAX_PLAYERS {
        let orders = match state.lane_player_mut(slot) {
            Some(p) => std::mem::take(&mut p.incoming_attacks),
            None => continue,
        };
        if !lanes.contains(&slot) {
            continue;
        }
        for attack in orders {
            for _ in 0..attack.def().count {
                let entry = attack_entry(attack, slot, wave_number, rng);
                state.spawn_queue.push_back(entry);
            }
        }
    }

    state.spawn_queue.make_contiguous().shuffle(rng);
    debug!("Wave {} queued {} asteroids", wave_number, state.spawn_queue.len());
}

/// Random polygon outline as (angle, distance factor) pairs
pub fn make_shape<R: Rng + ?Sized>(rng: &mut R) -> Vec<(f32, f32)> {
    let points = rng.gen_range(asteroid::SHAPE_POINTS.0..=asteroid::SHAPE_POINTS.1);
    (0..points)
        .map(|i| {
            let angle = i as f32 / points as f32 * std::f32::consts::TAU;
            (angle, rng.gen_range(0.7..=1.0))
        })
        .collect()
}

/// Turn a queued entry into a live asteroid in FTL entry
pub fn spawn_asteroid<R: Rng + ?Sized>(state: &mut MatchState, entry: SpawnEntry, rng: &mut R) {
    let speed_bonus = if state.wave >= wave::SPEED_BONUS_FROM {
        1.0 + (state.wave - wave::SPEED_BONUS_FROM) as f32 * wave::SPEED_BONUS_PER_WAVE
    } else {
        1.0
    };
    let y = -50.0 - rng.gen_range(0.0..100.0);

    let id = state.alloc_id();
    let mut a = Asteroid::new(id, Vec2::new(entry.x, y), entry.radius, entry.hp, entry.size, entry.target_slot);
    a.velocity = Vec2::new(entry.velocity.x, entry.velocity.y * speed_bonus);
    a.rotation = entry.rotation;
    a.spin = entry.spin;
    a.shape = make_shape(rng);
    a.in_ftl = true;
    a.ftl_threshold = rng.gen_range(ftl::THRESHOLD_RANGE.0..ftl::THRESHOLD_RANGE.1);
    if let Some(attack) = entry.attack_type {
        let def = attack.def();
        a.attack_type = Some(attack);
        a.explosive = def.explosive;
        a.splits = def.splits;
        if def.phasing {
            a.phasing = true;
            a.phase_timer = rng.gen_range(0.0..std::f32::consts::TAU);
        }
    }
    state.asteroids.push(a);
}

/// Release queued asteroids at a steady cadence
pub fn drain_spawn_queue<R: Rng + ?Sized>(state: &mut MatchState, dt: f32, rng: &mut R) {
    state.spawn_timer -= dt;
    if state.spawn_timer > 0.0 || state.spawn_queue.is_empty() {
        return;
    }

    let burst = if rng.gen_bool(wave::DOUBLE_SPAWN_CHANCE) { 2 } else { 1 };
    for _ in 0..burst {
        let Some(entry) = state.spawn_queue.pop_front() else { break };
        spawn_asteroid(state, entry, rng);
    }
    state.spawn_timer = wave::SPAWN_INTERVAL + rng.gen_range(-wave::SPAWN_JITTER..wave::SPAWN_JITTER);
}

/// Spend gold to send an attack group at a random living opponent
pub fn buy_attack<R: Rng + ?Sized>(
    state: &mut MatchState,
    buyer_id: PlayerId,
    attack: AttackType,
    rng: &mut R,
) -> Result<AttackReceipt, AttackError> {
    if !matches!(state.phase, Phase::Playing | Phase::Upgrades) {
        return Err(AttackError::WrongPhase);
    }
    if !state.is_pvp() {
        return Err(AttackError::NotPvp);
    }

    let buyer = state.get_player(buyer_id).ok_or(AttackError::UnknownPlayer)?;
    if !buyer.is_alive() {
        return Err(AttackError::BuyerEliminated);
    }
    let buyer_slot = buyer.slot;
    let opponents: Vec<usize> = state.living_lanes().into_iter().filter(|&s| s != buyer_slot).collect();
    if opponents.is_empty() {
        return Err(AttackError::NoOpponent);
    }

    let cost = attack.def().cost;
    let buyer = state.get_player_mut(buyer_id).ok_or(AttackError::UnknownPlayer)?;
    if !buyer.try_spend(cost) {
        return Err(AttackError::InsufficientGold { need: cost, have: buyer.gold });
    }
    let buyer_name = buyer.name.clone();

    let target_slot = *opponents.choose(rng).ok_or(AttackError::NoOpponent)?;
    let target = state.lane_player_mut(target_slot).ok_or(AttackError::NoOpponent)?;
    target.incoming_attacks.push(attack);
    let target_id = target.id;
    let target_name = target.name.clone();

    debug!("{} sent {} at {}", buyer_name, attack.def().name, target_name);
    state.send(
        buyer_id,
        ServerMessage::AttackQueued {
            attack_type: attack,
            target_slot,
            target_name,
        },
    );
    state.send(
        target_id,
        ServerMessage::IncomingAttack {
            attack_type: attack,
            from_name: buyer_name,
        },
    );

    Ok(AttackReceipt { target_id, target_slot, cost })
}
