//! Purchasable towers: catalog, economy and per-tick firing

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::game::constants::{aim, tower};
use crate::game::state::{BulletKind, MatchState, Phase, Player, PlayerId, Tower};
use crate::game::systems::combat;
use crate::game::systems::targeting::{clamp_aim_angle, find_best_target, tower_position};

/// Tower type, sent on the wire as its index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TowerKind {
    Gatling,
    Sniper,
    Missile,
}

/// Static stats of a tower type
#[derive(Debug, Clone, Copy)]
pub struct TowerDef {
    pub name: &'static str,
    pub cost: u32,
    pub damage: f32,
    pub cooldown: f32,
    pub range_mult: f32,
    pub upgrade_cost: u32,
    pub bullet: BulletKind,
}

impl TowerKind {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(TowerKind::Gatling),
            1 => Some(TowerKind::Sniper),
            2 => Some(TowerKind::Missile),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            TowerKind::Gatling => 0,
            TowerKind::Sniper => 1,
            TowerKind::Missile => 2,
        }
    }

    pub fn def(&self) -> TowerDef {
        match self {
            TowerKind::Gatling => TowerDef {
                name: "Gatling",
                cost: 50,
                damage: 1.0,
                cooldown: 0.25,
                range_mult: 0.8,
                upgrade_cost: 40,
                bullet: BulletKind::Gatling,
            },
            TowerKind::Sniper => TowerDef {
                name: "Sniper",
                cost: 120,
                damage: 5.0,
                cooldown: 1.2,
                range_mult: 1.5,
                upgrade_cost: 80,
                bullet: BulletKind::Sniper,
            },
            TowerKind::Missile => TowerDef {
                name: "Missile",
                cost: 250,
                damage: 8.0,
                cooldown: 2.0,
                range_mult: 1.0,
                upgrade_cost: 150,
                bullet: BulletKind::Missile,
            },
        }
    }
}

impl From<TowerKind> for u8 {
    fn from(kind: TowerKind) -> u8 {
        kind.index()
    }
}

impl TryFrom<u8> for TowerKind {
    type Error = TowerError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        TowerKind::from_index(index).ok_or(TowerError::UnknownType(index))
    }
}

impl Tower {
    /// Damage per shot at the current level
    pub fn damage(&self) -> f32 {
        let def = self.kind.def();
        (def.damage * (1.0 + tower::DAMAGE_PER_LEVEL * (self.level as f32 - 1.0))).round()
    }

    /// Seconds between shots at the current level
    pub fn reload_time(&self) -> f32 {
        self.kind.def().cooldown / (1.0 + tower::RATE_PER_LEVEL * (self.level as f32 - 1.0))
    }

    /// Gold returned when sold
    pub fn refund(&self) -> u32 {
        let def = self.kind.def();
        let upgrades: u32 = (1..self.level as u32).map(|l| def.upgrade_cost * l).sum();
        ((def.cost + upgrades) as f32 * tower::SELL_REFUND).floor() as u32
    }
}

/// Tower command errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TowerError {
    #[error("Towers can only be changed while playing")]
    WrongPhase,
    #[error("Player is not in the match")]
    UnknownPlayer,
    #[error("Invalid tower slot: {0}")]
    InvalidSlot(usize),
    #[error("Unknown tower type: {0}")]
    UnknownType(u8),
    #[error("Tower slot {0} is occupied")]
    SlotOccupied(usize),
    #[error("Tower slot {0} is empty")]
    EmptySlot(usize),
    #[error("Tower is at max level")]
    MaxLevel,
    #[error("Not enough gold: need {need}, have {have}")]
    InsufficientGold { need: u32, have: u32 },
}

fn tower_owner(state: &mut MatchState, player_id: PlayerId, slot_index: usize) -> Result<&mut Player, TowerError> {
    if state.phase != Phase::Playing {
        return Err(TowerError::WrongPhase);
    }
    if slot_index >= tower::SLOTS {
        return Err(TowerError::InvalidSlot(slot_index));
    }
    state.get_player_mut(player_id).ok_or(TowerError::UnknownPlayer)
}

/// Buy a tower into an empty slot. Returns the gold spent.
pub fn buy_tower(state: &mut MatchState, player_id: PlayerId, slot_index: usize, kind: TowerKind) -> Result<u32, TowerError> {
    let player = tower_owner(state, player_id, slot_index)?;
    if player.towers[slot_index].is_some() {
        return Err(TowerError::SlotOccupied(slot_index));
    }
    let cost = kind.def().cost;
    if !player.try_spend(cost) {
        return Err(TowerError::InsufficientGold { need: cost, have: player.gold });
    }
    player.towers[slot_index] = Some(Tower::new(kind));
    debug!("{} bought {} in slot {}", player.name, kind.def().name, slot_index);
    Ok(cost)
}

/// Raise a tower one level. Returns the gold spent.
pub fn upgrade_tower(state: &mut MatchState, player_id: PlayerId, slot_index: usize) -> Result<u32, TowerError> {
    let player = tower_owner(state, player_id, slot_index)?;
    let current = player.towers[slot_index].ok_or(TowerError::EmptySlot(slot_index))?;
    if current.level >= tower::MAX_LEVEL {
        return Err(TowerError::MaxLevel);
    }
    let cost = current.kind.def().upgrade_cost * current.level as u32;
    if !player.try_spend(cost) {
        return Err(TowerError::InsufficientGold { need: cost, have: player.gold });
    }
    if let Some(t) = player.towers[slot_index].as_mut() {
        t.level += 1;
    }
    Ok(cost)
}

/// Sell a tower. Returns the refund.
pub fn sell_tower(state: &mut MatchState, player_id: PlayerId, slot_index: usize) -> Result<u32, TowerError> {
    let player = tower_owner(state, player_id, slot_index)?;
    let sold = player.towers[slot_index].take().ok_or(TowerError::EmptySlot(slot_index))?;
    let refund = sold.refund();
    player.gold += refund;
    Ok(refund)
}

/// Aim and fire every tower of every living participant
pub fn update_towers(state: &mut MatchState, dt: f32) {
    for player_id in state.lane_ids() {
        let (slot, towers) = match state.get_player(player_id) {
            Some(p) if p.is_alive() => (p.slot, p.towers),
            _ => continue,
        };

        for (index, entry) in towers.iter().enumerate() {
            let Some(mut t) = *entry else { continue };
            let origin = tower_position(slot, index);

            match find_best_target(&state.asteroids, slot, origin, t.kind.def().range_mult) {
                Some(target_index) => {
                    let aim = clamp_aim_angle(origin, state.asteroids[target_index].position);
                    t.angle = aim.angle;
                    t.cooldown -= dt;
                    if t.cooldown <= 0.0 {
                        combat::fire_tower_bullet(state, player_id, slot, &t, origin, aim.angle);
                        t.cooldown = t.reload_time();
                    }
                }
                None => {
                    t.angle = aim::STRAIGHT_UP;
                    t.cooldown = (t.cooldown - dt).max(0.0);
                }
            }

            if let Some(p) = state.get_player_mut(player_id) {
                if let Some(stored) = p.towers[index].as_mut() {
                    stored.angle = t.angle;
                    stored.cooldown = t.cooldown;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Asteroid, Player, SizeClass};
    use crate::util::vec2::Vec2;
    use uuid::Uuid;

    fn playing_state(gold: u32) -> (MatchState, PlayerId) {
        let mut state = MatchState::new(4);
        let id = Uuid::new_v4();
        let mut player = Player::new(id, "P1".to_string(), 0);
        player.gold = gold;
        state.players.insert(id, player);
        state.lanes[0] = Some(id);
        state.lane_count = 1;
        state.phase = Phase::Playing;
        (state, id)
    }

    #[test]
    fn test_buy_tower_deducts_once() {
        let (mut state, id) = playing_state(100);
        assert_eq!(buy_tower(&mut state, id, 0, TowerKind::Gatling), Ok(50));
        assert_eq!(state.get_player(id).unwrap().gold, 50);
        assert_eq!(buy_tower(&mut state, id, 0, TowerKind::Gatling), Err(TowerError::SlotOccupied(0)));
        assert_eq!(state.get_player(id).unwrap().gold, 50);
    }

    #[test]
    fn test_buy_tower_rejects_insufficient_gold() {
        let (mut state, id) = playing_state(30);
        let err = buy_tower(&mut state, id, 1, TowerKind::Sniper).unwrap_err();
        assert_eq!(err, TowerError::InsufficientGold { need: 120, have: 30 });
        let player = state.get_player(id).unwrap();
        assert_eq!(player.gold, 30);
        assert!(player.towers[1].is_none());
    }

    #[test]
    fn test_buy_tower_requires_playing_and_valid_slot() {
        let (mut state, id) = playing_state(500);
        assert_eq!(buy_tower(&mut state, id, 4, TowerKind::Gatling), Err(TowerError::InvalidSlot(4)));
        state.phase = Phase::Upgrades;
        assert_eq!(buy_tower(&mut state, id, 0, TowerKind::Gatling), Err(TowerError::WrongPhase));
    }

    #[test]
    fn test_upgrade_cost_scales_with_level() {
        let (mut state, id) = playing_state(1000);
        buy_tower(&mut state, id, 0, TowerKind::Gatling).unwrap();
        assert_eq!(upgrade_tower(&mut state, id, 0), Ok(40));
        assert_eq!(upgrade_tower(&mut state, id, 0), Ok(80));
        assert_eq!(upgrade_tower(&mut state, id, 0), Ok(120));
        assert_eq!(upgrade_tower(&mut state, id, 0), Ok(160));
        assert_eq!(upgrade_tower(&mut state, id, 0), Err(TowerError::MaxLevel));
        assert_eq!(state.get_player(id).unwrap().towers[0].unwrap().level, 5);
        assert_eq!(state.get_player(id).unwrap().gold, 1000 - 50 - 400);
    }

    #[test]
    fn test_sell_refunds_half_of_investment() {
        let (mut state, id) = playing_state(1000);
        buy_tower(&mut state, id, 2, TowerKind::Sniper).unwrap();
        upgrade_tower(&mut state, id, 2).unwrap();
        upgrade_tower(&mut state, id, 2).unwrap();
        // 120 + 80 + 160 = 360
        assert_eq!(sell_tower(&mut state, id, 2), Ok(180));
        assert!(state.get_player(id).unwrap().towers[2].is_none());
        assert_eq!(sell_tower(&mut state, id, 2), Err(TowerError::EmptySlot(2)));
    }

    #[test]
    fn test_level_scaling() {
        let mut t = Tower::new(TowerKind::Missile);
        assert_eq!(t.damage(), 8.0);
        t.level = 3;
        assert_eq!(t.damage(), 12.0);
        assert!((t.reload_time() - 2.0 / 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_kind_wire_index() {
        assert_eq!(serde_json::to_string(&TowerKind::Sniper).unwrap(), "1");
        assert_eq!(serde_json::from_str::<TowerKind>("2").unwrap(), TowerKind::Missile);
        assert!(serde_json::from_str::<TowerKind>("3").is_err());
    }

    #[test]
    fn test_tower_fires_at_lane_target() {
        let (mut state, id) = playing_state(100);
        buy_tower(&mut state, id, 0, TowerKind::Gatling).unwrap();
        let aid = state.alloc_id();
        state.asteroids.push(Asteroid::new(aid, Vec2::new(100.0, 300.0), 10.0, 5.0, SizeClass::Medium, 0));

        update_towers(&mut state, 1.0 / 30.0);

        assert_eq!(state.bullets.len(), 1);
        let b = &state.bullets[0];
        assert!(b.is_tower_bullet);
        assert_eq!(b.kind, BulletKind::Gatling);
        assert!(!b.is_crit);
        let t = state.get_player(id).unwrap().towers[0].unwrap();
        assert!((t.cooldown - 0.25).abs() < 1e-6);
        assert!(t.angle != aim::STRAIGHT_UP);
    }

    #[test]
    fn test_idle_tower_returns_upright() {
        let (mut state, id) = playing_state(100);
        buy_tower(&mut state, id, 0, TowerKind::Gatling).unwrap();
        if let Some(t) = state.get_player_mut(id).unwrap().towers[0].as_mut() {
            t.angle = 0.3;
            t.cooldown = 0.01;
        }
        update_towers(&mut state, 1.0 / 30.0);
        let t = state.get_player(id).unwrap().towers[0].unwrap();
        assert_eq!(t.angle, aim::STRAIGHT_UP);
        assert_eq!(t.cooldown, 0.0);
        assert!(state.bullets.is_empty());
    }
}
