//! Roguelike upgrade catalog and rarity rolls
//!
//! Cards are generated from a fixed catalog, scaled by a weighted rarity draw,
//! and applied through a closed set of effect variants.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::constants::upgrade;

/// Stat touched by an upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stat {
    DamageAdd,
    BulletSpeedMult,
    FireRateMult,
    Multishot,
    CritChance,
    Explosive,
    LifespanAdd,
    Ricochet,
    Pierce,
    Chain,
    Shield,
    Slowfield,
    GoldMult,
}

impl Stat {
    /// Stats stored as whole counts
    pub fn is_integer(&self) -> bool {
        matches!(self, Stat::Shield | Stat::Ricochet | Stat::Pierce)
    }
}

/// Catalog grouping shown on the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Offense,
    Utility,
    Defense,
    Economy,
}

/// How a catalog entry turns a rolled value into an effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectKind {
    Add,
    Mult,
    AddCap(f32),
    Bool,
    Multishot,
}

/// Static catalog entry
#[derive(Debug, Clone, Copy)]
pub struct UpgradeDef {
    pub id: &'static str,
    pub title: &'static str,
    pub category: Category,
    pub icon: &'static str,
    /// `{val}` and `{penalty}` are substituted when the card is rolled
    pub desc: &'static str,
    pub stat: Stat,
    pub base: f32,
    pub kind: EffectKind,
}

pub static CATALOG: [UpgradeDef; 13] = [
    UpgradeDef { id: "dmg", title: "Heavy Rounds", category: Category::Offense, icon: "💥", desc: "+{val} Damage", stat: Stat::DamageAdd, base: 0.5, kind: EffectKind::Add },
    UpgradeDef { id: "spd", title: "Velocity", category: Category::Offense, icon: "💨", desc: "+{val}% Bullet Speed", stat: Stat::BulletSpeedMult, base: 0.08, kind: EffectKind::Mult },
    UpgradeDef { id: "fire", title: "Rapid Fire", category: Category::Offense, icon: "⚡", desc: "+{val}% Fire Rate", stat: Stat::FireRateMult, base: 0.05, kind: EffectKind::Mult },
    UpgradeDef { id: "multi", title: "Multishot", category: Category::Offense, icon: "⚔️", desc: "+{val} Bullets (-{penalty}% dmg)", stat: Stat::Multishot, base: 1.0, kind: EffectKind::Multishot },
    UpgradeDef { id: "crit", title: "Crit Scope", category: Category::Offense, icon: "🎯", desc: "+{val}% Crit Chance", stat: Stat::CritChance, base: 0.05, kind: EffectKind::AddCap(1.0) },
    UpgradeDef { id: "boom", title: "Explosive", category: Category::Offense, icon: "💣", desc: "Explosions size +{val}", stat: Stat::Explosive, base: 1.0, kind: EffectKind::Add },
    UpgradeDef { id: "life", title: "Stabilizer", category: Category::Utility, icon: "⏱️", desc: "+{val}s Bullet Life", stat: Stat::LifespanAdd, base: 0.75, kind: EffectKind::Add },
    UpgradeDef { id: "rico", title: "Ricochet", category: Category::Utility, icon: "🎱", desc: "Bounces {val} times", stat: Stat::Ricochet, base: 1.0, kind: EffectKind::Add },
    UpgradeDef { id: "pierce", title: "Railgun", category: Category::Utility, icon: "📌", desc: "Pierces {val} enemies", stat: Stat::Pierce, base: 1.0, kind: EffectKind::Add },
    UpgradeDef { id: "chain", title: "Tesla Coil", category: Category::Utility, icon: "⚡", desc: "Chain Lightning", stat: Stat::Chain, base: 1.0, kind: EffectKind::Bool },
    UpgradeDef { id: "shield", title: "Shield Gen", category: Category::Defense, icon: "🛡️", desc: "Block {val} Hits/Wave", stat: Stat::Shield, base: 1.0, kind: EffectKind::Add },
    UpgradeDef { id: "slow", title: "Grav Field", category: Category::Defense, icon: "🌀", desc: "Slow Enemies", stat: Stat::Slowfield, base: 1.0, kind: EffectKind::Bool },
    UpgradeDef { id: "income", title: "War Profiteer", category: Category::Economy, icon: "💰", desc: "+{val}% Gold Gain", stat: Stat::GoldMult, base: 0.12, kind: EffectKind::Mult },
];

/// Card quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub const ALL: [Rarity; 4] = [Rarity::Common, Rarity::Rare, Rarity::Epic, Rarity::Legendary];

    /// Draw weight out of 100
    pub fn weight(&self) -> f32 {
        match self {
            Rarity::Common => 75.0,
            Rarity::Rare => 17.0,
            Rarity::Epic => 6.0,
            Rarity::Legendary => 2.0,
        }
    }

    /// Multiplier applied to the catalog base value
    pub fn scale(&self) -> f32 {
        match self {
            Rarity::Common => 1.0,
            Rarity::Rare => 1.5,
            Rarity::Epic => 2.5,
            Rarity::Legendary => 4.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rarity::Common => "COMMON",
            Rarity::Rare => "RARE",
            Rarity::Epic => "EPIC",
            Rarity::Legendary => "LEGENDARY",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Rarity::Common => "#ffffff",
            Rarity::Rare => "#00ffff",
            Rarity::Epic => "#bf00ff",
            Rarity::Legendary => "#ffaa00",
        }
    }

    /// Extra bullets granted by a multishot card of this tier, with its damage penalty in percent
    pub fn multishot_tier(&self) -> (u32, u32) {
        match self {
            Rarity::Common | Rarity::Rare => (1, 35),
            Rarity::Epic => (2, 60),
            Rarity::Legendary => (3, 85),
        }
    }
}

/// Weighted rarity draw
pub fn roll_rarity<R: Rng + ?Sized>(rng: &mut R) -> Rarity {
    let roll = rng.gen::<f32>() * 100.0;
    let mut accum = 0.0;
    for rarity in [Rarity::Common, Rarity::Rare, Rarity::Epic] {
        accum += rarity.weight();
        if roll <= accum {
            return rarity;
        }
    }
    Rarity::Legendary
}

/// Machine-applicable effect of a card
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpgradeEffect {
    Add { stat: Stat, val: f32 },
    Mult { stat: Stat, val: f32 },
    AddCap { stat: Stat, val: f32, cap: f32 },
    Bool { stat: Stat },
    Multishot { val: u32, penalty: f32 },
}

impl UpgradeEffect {
    /// Merge this effect into a player's stats
    pub fn apply(&self, upgrades: &mut PlayerUpgrades) {
        match *self {
            UpgradeEffect::Add { stat, val } => upgrades.add(stat, val),
            UpgradeEffect::Mult { stat, val } => upgrades.compound(stat, 1.0 + val),
            UpgradeEffect::AddCap { stat, val, cap } => {
                upgrades.add(stat, val);
                if upgrades.value(stat) > cap {
                    upgrades.set(stat, cap);
                }
            }
            UpgradeEffect::Bool { stat } => upgrades.set(stat, 1.0),
            UpgradeEffect::Multishot { val, penalty } => {
                upgrades.multishot += val;
                upgrades.multishot_dmg_mult *= 1.0 - penalty;
            }
        }
    }
}

/// A rolled upgrade offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeCard {
    pub key: String,
    pub def_id: String,
    pub title: String,
    pub desc: String,
    pub category: Category,
    pub icon: String,
    pub rarity: Rarity,
    pub rarity_label: String,
    pub rarity_color: String,
    pub effect: UpgradeEffect,
}

/// Accumulated upgrade stats for one player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerUpgrades {
    pub damage_add: f32,
    pub bullet_speed_mult: f32,
    pub fire_rate_mult: f32,
    /// Total bullets per volley, including the primary shot
    pub multishot: u32,
    pub multishot_dmg_mult: f32,
    pub crit_chance: f32,
    pub explosive: f32,
    pub lifespan_add: f32,
    pub ricochet: u32,
    pub pierce: u32,
    pub chain: bool,
    pub shield: u32,
    /// Shield charges left this wave
    pub shield_active: u32,
    pub slowfield: bool,
    pub gold_mult: f32,
}

impl Default for PlayerUpgrades {
    fn default() -> Self {
        Self {
            damage_add: 0.0,
            bullet_speed_mult: 1.0,
            fire_rate_mult: 1.0,
            multishot: 1,
            multishot_dmg_mult: 1.0,
            crit_chance: 0.0,
            explosive: 0.0,
            lifespan_add: 0.0,
            ricochet: 0,
            pierce: 0,
            chain: false,
            shield: 0,
            shield_active: 0,
            slowfield: false,
            gold_mult: 1.0,
        }
    }
}

impl PlayerUpgrades {
    /// Current value of a stat as a float
    pub fn value(&self, stat: Stat) -> f32 {
        match stat {
            Stat::DamageAdd => self.damage_add,
            Stat::BulletSpeedMult => self.bullet_speed_mult,
            Stat::FireRateMult => self.fire_rate_mult,
            Stat::Multishot => self.multishot as f32,
            Stat::CritChance => self.crit_chance,
            Stat::Explosive => self.explosive,
            Stat::LifespanAdd => self.lifespan_add,
            Stat::Ricochet => self.ricochet as f32,
            Stat::Pierce => self.pierce as f32,
            Stat::Chain => bool_value(self.chain),
            Stat::Shield => self.shield as f32,
            Stat::Slowfield => bool_value(self.slowfield),
            Stat::GoldMult => self.gold_mult,
        }
    }

    fn set(&mut self, stat: Stat, value: f32) {
        let count = value.round().max(0.0) as u32;
        match stat {
            Stat::DamageAdd => self.damage_add = value,
            Stat::BulletSpeedMult => self.bullet_speed_mult = value,
            Stat::FireRateMult => self.fire_rate_mult = value,
            Stat::Multishot => self.multishot = count.max(1),
            Stat::CritChance => self.crit_chance = value,
            Stat::Explosive => self.explosive = value,
            Stat::LifespanAdd => self.lifespan_add = value,
            Stat::Ricochet => self.ricochet = count,
            Stat::Pierce => self.pierce = count,
            Stat::Chain => self.chain = value > 0.0,
            Stat::Shield => {
                self.shield = count;
                // Fresh charges are usable this wave
                self.shield_active = count;
            }
            Stat::Slowfield => self.slowfield = value > 0.0,
            Stat::GoldMult => self.gold_mult = value,
        }
    }

    fn add(&mut self, stat: Stat, amount: f32) {
        self.set(stat, self.value(stat) + amount);
    }

    fn compound(&mut self, stat: Stat, factor: f32) {
        self.set(stat, self.value(stat) * factor);
    }

    /// Whether a one-time unlock is already owned
    pub fn owns(&self, stat: Stat) -> bool {
        self.value(stat) > 0.0
    }

    /// Refill shield charges for a new wave
    pub fn recharge_shield(&mut self) {
        self.shield_active = self.shield;
    }

    /// Seconds between player shots
    pub fn fire_cooldown(&self, base: f32) -> f32 {
        base / self.fire_rate_mult.max(f32::EPSILON)
    }
}

fn bool_value(flag: bool) -> f32 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// Whether a catalog entry may be offered to this player
fn is_eligible(def: &UpgradeDef, upgrades: &PlayerUpgrades) -> bool {
    match def.kind {
        EffectKind::Bool => !upgrades.owns(def.stat),
        EffectKind::AddCap(cap) => upgrades.value(def.stat) < cap,
        _ => true,
    }
}

/// Roll a concrete card from a catalog entry
pub fn roll_card<R: Rng + ?Sized>(def: &UpgradeDef, rarity: Rarity, rng: &mut R) -> UpgradeCard {
    let (desc, effect) = match def.kind {
        EffectKind::Multishot => {
            let (extra, penalty) = rarity.multishot_tier();
            let desc = def
                .desc
                .replace("{val}", &extra.to_string())
                .replace("{penalty}", &penalty.to_string());
            (
                desc,
                UpgradeEffect::Multishot {
                    val: extra,
                    penalty: penalty as f32 / 100.0,
                },
            )
        }
        EffectKind::Bool => (def.desc.to_string(), UpgradeEffect::Bool { stat: def.stat }),
        EffectKind::Add | EffectKind::Mult | EffectKind::AddCap(_) => {
            let raw = def.base * rarity.scale();
            let percent = matches!(def.kind, EffectKind::Mult) || def.stat == Stat::CritChance;
            let shown = if def.stat.is_integer() {
                raw.round().max(1.0)
            } else if percent {
                (raw * 100.0).round()
            } else {
                (raw * 10.0).round() / 10.0
            };
            let val = if percent { shown / 100.0 } else { shown };
            let effect = match def.kind {
                EffectKind::Mult => UpgradeEffect::Mult { stat: def.stat, val },
                EffectKind::AddCap(cap) => UpgradeEffect::AddCap { stat: def.stat, val, cap },
                _ => UpgradeEffect::Add { stat: def.stat, val },
            };
            (def.desc.replace("{val}", &shown.to_string()), effect)
        }
    };

    UpgradeCard {
        key: card_key(rng),
        def_id: def.id.to_string(),
        title: def.title.to_string(),
        desc,
        category: def.category,
        icon: def.icon.to_string(),
        rarity,
        rarity_label: rarity.label().to_string(),
        rarity_color: rarity.color().to_string(),
        effect,
    }
}

/// Three distinct cards the player is allowed to take
pub fn make_upgrade_options<R: Rng + ?Sized>(upgrades: &PlayerUpgrades, rng: &mut R) -> Vec<UpgradeCard> {
    let eligible: Vec<&UpgradeDef> = CATALOG.iter().filter(|def| is_eligible(def, upgrades)).collect();
    let picks: Vec<&UpgradeDef> = eligible
        .choose_multiple(rng, upgrade::OPTION_COUNT)
        .copied()
        .collect();

    picks
        .into_iter()
        .map(|def| {
            let rarity = roll_rarity(rng);
            roll_card(def, rarity, rng)
        })
        .collect()
}

/// Gold needed for the next reroll after `rerolls` rerolls this round
pub fn reroll_cost(rerolls: u32) -> u32 {
    (upgrade::REROLL_BASE_COST * upgrade::REROLL_GROWTH.powi(rerolls as i32)).floor() as u32
}

/// Unique card key drawn from the match rng
fn card_key<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .simple()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn def(id: &str) -> &'static UpgradeDef {
        CATALOG.iter().find(|d| d.id == id).unwrap()
    }

    #[test]
    fn test_rarity_weights_sum_to_100() {
        let total: f32 = Rarity::ALL.iter().map(|r| r.weight()).sum();
        assert_eq!(total, 100.0);
    }

    #[test]
    fn test_roll_rarity_distribution() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut commons = 0;
        for _ in 0..10_000 {
            if roll_rarity(&mut rng) == Rarity::Common {
                commons += 1;
            }
        }
        assert!((7_000..8_000).contains(&commons), "commons = {}", commons);
    }

    #[test]
    fn test_options_are_distinct() {
        let mut rng = StdRng::seed_from_u64(1);
        let upgrades = PlayerUpgrades::default();
        for _ in 0..500 {
            let options = make_upgrade_options(&upgrades, &mut rng);
            assert_eq!(options.len(), 3);
            let mut ids: Vec<&str> = options.iter().map(|o| o.def_id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), 3);
            let mut keys: Vec<&str> = options.iter().map(|o| o.key.as_str()).collect();
            keys.sort_unstable();
            keys.dedup();
            assert_eq!(keys.len(), 3);
        }
    }

    #[test]
    fn test_owned_bools_and_capped_stats_are_never_offered() {
        let mut rng = StdRng::seed_from_u64(2);
        let upgrades = PlayerUpgrades {
            chain: true,
            slowfield: true,
            crit_chance: 1.0,
            ..PlayerUpgrades::default()
        };
        for _ in 0..500 {
            for card in make_upgrade_options(&upgrades, &mut rng) {
                assert!(!["chain", "slow", "crit"].contains(&card.def_id.as_str()));
            }
        }
    }

    #[test]
    fn test_integer_stats_round_up_to_one() {
        let mut rng = StdRng::seed_from_u64(3);
        let card = roll_card(def("shield"), Rarity::Common, &mut rng);
        assert_eq!(card.effect, UpgradeEffect::Add { stat: Stat::Shield, val: 1.0 });
        assert_eq!(card.desc, "Block 1 Hits/Wave");

        let card = roll_card(def("rico"), Rarity::Epic, &mut rng);
        // 2.5 rounds half away from zero
        assert_eq!(card.effect, UpgradeEffect::Add { stat: Stat::Ricochet, val: 3.0 });
    }

    #[test]
    fn test_percent_stats_stored_as_fraction() {
        let mut rng = StdRng::seed_from_u64(4);
        let card = roll_card(def("income"), Rarity::Rare, &mut rng);
        assert_eq!(card.desc, "+18% Gold Gain");
        match card.effect {
            UpgradeEffect::Mult { stat, val } => {
                assert_eq!(stat, Stat::GoldMult);
                assert!((val - 0.18).abs() < 1e-6);
            }
            other => panic!("unexpected effect {:?}", other),
        }

        let card = roll_card(def("crit"), Rarity::Legendary, &mut rng);
        assert_eq!(card.desc, "+20% Crit Chance");
    }

    #[test]
    fn test_decimal_stats_round_to_tenth() {
        let mut rng = StdRng::seed_from_u64(5);
        let card = roll_card(def("life"), Rarity::Rare, &mut rng);
        // 0.75 * 1.5 = 1.125
        assert_eq!(card.desc, "+1.1s Bullet Life");
    }

    #[test]
    fn test_multishot_tiers() {
        let mut rng = StdRng::seed_from_u64(6);
        let card = roll_card(def("multi"), Rarity::Epic, &mut rng);
        assert_eq!(card.desc, "+2 Bullets (-60% dmg)");
        let card = roll_card(def("multi"), Rarity::Rare, &mut rng);
        assert_eq!(card.effect, UpgradeEffect::Multishot { val: 1, penalty: 0.35 });
    }

    #[test]
    fn test_multishot_penalty_is_cumulative_product() {
        let mut upgrades = PlayerUpgrades::default();
        let mut expected = 1.0f32;
        let mut previous = upgrades.multishot_dmg_mult;
        for rarity in [Rarity::Common, Rarity::Legendary, Rarity::Epic, Rarity::Rare] {
            let (extra, penalty) = rarity.multishot_tier();
            UpgradeEffect::Multishot {
                val: extra,
                penalty: penalty as f32 / 100.0,
            }
            .apply(&mut upgrades);
            expected *= 1.0 - penalty as f32 / 100.0;
            assert!((upgrades.multishot_dmg_mult - expected).abs() < 1e-6);
            assert!(upgrades.multishot_dmg_mult < previous);
            assert!(upgrades.multishot_dmg_mult <= 1.0);
            previous = upgrades.multishot_dmg_mult;
        }
        assert_eq!(upgrades.multishot, 1 + 1 + 3 + 2 + 1);
    }

    #[test]
    fn test_mult_compounds() {
        let mut upgrades = PlayerUpgrades::default();
        let effect = UpgradeEffect::Mult { stat: Stat::FireRateMult, val: 0.05 };
        effect.apply(&mut upgrades);
        effect.apply(&mut upgrades);
        assert!((upgrades.fire_rate_mult - 1.05 * 1.05).abs() < 1e-6);
    }

    #[test]
    fn test_add_cap_clamps() {
        let mut upgrades = PlayerUpgrades { crit_chance: 0.9, ..PlayerUpgrades::default() };
        UpgradeEffect::AddCap { stat: Stat::CritChance, val: 0.2, cap: 1.0 }.apply(&mut upgrades);
        assert_eq!(upgrades.crit_chance, 1.0);
    }

    #[test]
    fn test_shield_pick_arms_charges() {
        let mut upgrades = PlayerUpgrades::default();
        UpgradeEffect::Add { stat: Stat::Shield, val: 2.0 }.apply(&mut upgrades);
        assert_eq!(upgrades.shield, 2);
        assert_eq!(upgrades.shield_active, 2);
        upgrades.shield_active = 0;
        upgrades.recharge_shield();
        assert_eq!(upgrades.shield_active, 2);
    }

    #[test]
    fn test_bool_sets_flag() {
        let mut upgrades = PlayerUpgrades::default();
        UpgradeEffect::Bool { stat: Stat::Chain }.apply(&mut upgrades);
        assert!(upgrades.chain);
        assert!(upgrades.owns(Stat::Chain));
    }

    #[test]
    fn test_reroll_cost_growth() {
        assert_eq!(reroll_cost(0), 10);
        assert_eq!(reroll_cost(1), 15);
        assert_eq!(reroll_cost(2), 22);
        assert_eq!(reroll_cost(3), 33);
    }

    #[test]
    fn test_card_wire_format() {
        let mut rng = StdRng::seed_from_u64(8);
        let card = roll_card(def("dmg"), Rarity::Common, &mut rng);
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["defId"], "dmg");
        assert_eq!(json["rarityLabel"], "COMMON");
        assert_eq!(json["rarityColor"], "#ffffff");
        assert_eq!(json["category"], "offense");
    }
}
