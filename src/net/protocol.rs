//! JSON wire protocol
//!
//! Every frame is a JSON object tagged by its `t` field, sent as a WebSocket
//! text message. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::game::constants::world;
use crate::game::match_result::MatchResult;
use crate::game::state::{Asteroid, Bullet, BulletKind, MatchState, Phase, Player, PlayerId, SizeClass};
use crate::game::systems::spawner::AttackType;
use crate::game::systems::towers::TowerKind;
use crate::game::upgrades::UpgradeCard;
use crate::leaderboard::LeaderboardEntry;

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    SetName { name: String },
    /// Toggle the sender's ready flag
    Ready,
    Start,
    /// Aim point in world coordinates
    Input {
        x: f32,
        y: f32,
        #[serde(default)]
        shooting: bool,
    },
    PickUpgrade { key: String },
    RerollUpgrades,
    BuyTower {
        slot_index: usize,
        /// Tower type index; unknown values are rejected by the handler
        #[serde(rename = "type")]
        tower_type: u8,
    },
    UpgradeTower { slot_index: usize },
    SellTower { slot_index: usize },
    BuyAttack { attack_type: AttackType },
    ReturnToLobby,
    ClearLeaderboard { password: String },
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome {
        id: PlayerId,
        slot: usize,
        is_host: bool,
        world: WorldInfo,
        phase: Phase,
    },
    Reject { reason: String },
    Lobby(LobbySnapshot),
    Started { world: WorldInfo, wave: u32 },
    Wave { wave: u32 },
    /// Personal upgrade offer
    Upgrade {
        options: Vec<UpgradeCard>,
        /// Wall-clock ms
        deadline: u64,
        reroll_cost: u32,
    },
    UpgradePhase { deadline: u64 },
    Picked { key: String, auto: bool },
    UpgradeWaiting { waiting: Vec<String> },
    State(GameSnapshot),
    AttackQueued {
        attack_type: AttackType,
        target_slot: usize,
        target_name: String,
    },
    IncomingAttack { attack_type: AttackType, from_name: String },
    GameOver {
        wave: u32,
        scores: Vec<ScoreLine>,
        winner_id: Option<PlayerId>,
    },
}

/// World geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldInfo {
    pub width: f32,
    pub height: f32,
    pub segment_width: f32,
}

impl WorldInfo {
    /// One segment per lane, never narrower than one segment
    pub fn for_lanes(lanes: usize) -> Self {
        Self {
            width: world::SEGMENT_W * lanes.max(1) as f32,
            height: world::WORLD_H,
            segment_width: world::SEGMENT_W,
        }
    }
}

/// Lobby member as shown to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyMember {
    pub id: PlayerId,
    pub slot: usize,
    pub name: String,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbySnapshot {
    pub players: Vec<LobbyMember>,
    pub host_id: Option<PlayerId>,
    pub all_ready: bool,
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl LobbySnapshot {
    pub fn from_state(state: &MatchState, leaderboard: &[LeaderboardEntry]) -> Self {
        Self {
            players: state
                .roster
                .iter()
                .map(|m| LobbyMember {
                    id: m.id,
                    slot: m.slot,
                    name: m.name.clone(),
                    ready: m.ready,
                })
                .collect(),
            host_id: state.roster.host_id(),
            all_ready: state.roster.all_ready(),
            leaderboard: leaderboard.to_vec(),
        }
    }
}

/// Final score line in `gameOver`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreLine {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub kills: u32,
    pub slot: usize,
    pub is_winner: bool,
}

impl ServerMessage {
    pub fn game_over(result: &MatchResult) -> Self {
        ServerMessage::GameOver {
            wave: result.wave,
            scores: result
                .rankings
                .iter()
                .map(|r| ScoreLine {
                    id: r.player_id,
                    name: r.name.clone(),
                    score: r.score,
                    kills: r.kills,
                    slot: r.slot,
                    is_winner: r.is_winner,
                })
                .collect(),
            winner_id: result.winner_id,
        }
    }
}

/// Per-tick world snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub phase: Phase,
    pub wave: u32,
    pub world: WorldInfo,
    pub missiles: Vec<AsteroidSnapshot>,
    pub bullets: Vec<BulletSnapshot>,
    pub particles: Vec<ParticleSnapshot>,
    pub damage_numbers: Vec<DamageNumberSnapshot>,
    pub players: Vec<PlayerSnapshot>,
}

impl GameSnapshot {
    pub fn from_state(state: &MatchState) -> Self {
        Self {
            phase: state.phase,
            wave: state.wave,
            world: state.world(),
            missiles: state
                .asteroids
                .iter()
                .filter(|a| !a.dead)
                .map(AsteroidSnapshot::from_asteroid)
                .collect(),
            bullets: state
                .bullets
                .iter()
                .filter(|b| !b.dead)
                .map(BulletSnapshot::from_bullet)
                .collect(),
            particles: state
                .particles
                .iter()
                .map(|p| ParticleSnapshot {
                    x: p.position.x,
                    y: p.position.y,
                    vx: p.velocity.x,
                    vy: p.velocity.y,
                    life: p.life,
                    max_life: p.max_life,
                    alpha: p.alpha,
                    color: p.color.to_string(),
                    size: p.size,
                })
                .collect(),
            damage_numbers: state
                .damage_numbers
                .iter()
                .map(|d| DamageNumberSnapshot {
                    x: d.position.x,
                    y: d.position.y,
                    value: d.value,
                    is_crit: d.is_crit,
                    age: d.age,
                })
                .collect(),
            players: state
                .lane_ids()
                .into_iter()
                .filter_map(|id| state.get_player(id))
                .map(PlayerSnapshot::from_player)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsteroidSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub r: f32,
    pub hp: f32,
    pub max_hp: f32,
    #[serde(rename = "type")]
    pub size: SizeClass,
    pub target_slot: usize,
    pub attack_type: Option<AttackType>,
    pub rotation: f32,
    pub spin: f32,
    pub shape: Vec<(f32, f32)>,
    #[serde(rename = "inFTL")]
    pub in_ftl: bool,
    pub is_phased: bool,
    pub splits: u32,
    pub explosive: bool,
}

impl AsteroidSnapshot {
    pub fn from_asteroid(a: &Asteroid) -> Self {
        Self {
            id: a.id,
            x: a.position.x,
            y: a.position.y,
            r: a.radius,
            hp: a.hp,
            max_hp: a.max_hp,
            size: a.size,
            target_slot: a.target_slot(),
            attack_type: a.attack_type,
            rotation: a.rotation,
            spin: a.spin,
            shape: a.shape.clone(),
            in_ftl: a.in_ftl,
            is_phased: a.is_phased,
            splits: a.splits,
            explosive: a.explosive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub r: f32,
    pub vx: f32,
    pub vy: f32,
    pub is_crit: bool,
    pub bullet_type: BulletKind,
    pub lifespan: f32,
    pub owner_slot: usize,
    pub is_tower_bullet: bool,
}

impl BulletSnapshot {
    pub fn from_bullet(b: &Bullet) -> Self {
        Self {
            id: b.id,
            x: b.position.x,
            y: b.position.y,
            r: b.radius,
            vx: b.velocity.x,
            vy: b.velocity.y,
            is_crit: b.is_crit,
            bullet_type: b.kind,
            lifespan: b.lifespan,
            owner_slot: b.owner_slot,
            is_tower_bullet: b.is_tower_bullet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticleSnapshot {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub life: f32,
    pub max_life: f32,
    pub alpha: f32,
    pub color: String,
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageNumberSnapshot {
    pub x: f32,
    pub y: f32,
    pub value: f32,
    pub is_crit: bool,
    pub age: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TowerSnapshot {
    #[serde(rename = "type")]
    pub kind: TowerKind,
    pub level: u8,
    pub angle: f32,
}

/// Upgrade flags the client draws
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeFlags {
    pub shield_active: u32,
    pub slowfield: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub slot: usize,
    pub name: String,
    pub score: u32,
    pub gold: u32,
    pub hp: i32,
    pub max_hp: i32,
    pub turret_angle: f32,
    pub is_manual: bool,
    pub towers: Vec<Option<TowerSnapshot>>,
    pub kills: u32,
    pub damage_dealt: f32,
    pub wave_damage: f32,
    pub upgrades: UpgradeFlags,
}

impl PlayerSnapshot {
    pub fn from_player(p: &Player) -> Self {
        Self {
            id: p.id,
            slot: p.slot,
            name: p.name.clone(),
            score: p.score,
            gold: p.gold,
            hp: p.hp,
            max_hp: p.max_hp,
            turret_angle: p.turret_angle,
            is_manual: p.manual_shooting,
            towers: p
                .towers
                .iter()
                .map(|t| {
                    t.map(|t| TowerSnapshot {
                        kind: t.kind,
                        level: t.level,
                        angle: t.angle,
                    })
                })
                .collect(),
            kills: p.kills,
            damage_dealt: p.damage_dealt,
            wave_damage: p.wave_damage,
            upgrades: UpgradeFlags {
                shield_active: p.upgrades.shield_active,
                slowfield: p.upgrades.slowfield,
            },
        }
    }
}

/// Encode a server message as a JSON text frame
pub fn encode(message: &ServerMessage) -> Result<String, EncodeError> {
    serde_json::to_string(message).map_err(|e| EncodeError(e.to_string()))
}

/// Decode a client text frame
pub fn decode(text: &str) -> Result<ClientMessage, DecodeError> {
    serde_json::from_str(text).map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
