//! End-to-end match scenarios driven through the public game API

use lane_defense_server::game::constants::{aim, world};
use lane_defense_server::game::game_loop::{GameLoop, GameLoopConfig, GameLoopEvent};
use lane_defense_server::game::state::{
    Asteroid, Bullet, MatchState, Phase, Player, PlayerId, Recipient, SizeClass,
};
use lane_defense_server::game::systems::spawner::{self, AttackType};
use lane_defense_server::game::systems::targeting::segment_bounds;
use lane_defense_server::game::systems::{combat, physics};
use lane_defense_server::game::upgrades::{self, Rarity, CATALOG};
use lane_defense_server::leaderboard::Leaderboard;
use lane_defense_server::net::protocol::{ClientMessage, ServerMessage};
use lane_defense_server::util::vec2::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

const TICK_MS: u64 = 33;

fn new_loop(seed: u64) -> GameLoop {
    let path = std::env::temp_dir().join(format!("scenario-{}.json", Uuid::new_v4()));
    GameLoop::with_seed(GameLoopConfig::default(), Leaderboard::new(path), seed)
}

/// Connect `count` players, ready them all and start at t=0
fn start_match(game: &mut GameLoop, count: usize) -> Vec<PlayerId> {
    let ids: Vec<PlayerId> = (0..count).map(|_| Uuid::new_v4()).collect();
    for &id in &ids {
        game.connect(id).unwrap();
        game.queue_command(id, ClientMessage::Ready);
    }
    game.queue_command(ids[0], ClientMessage::Start);
    game.tick(0);
    assert_eq!(game.state().phase, Phase::Playing);
    game.take_outbox();
    ids
}

fn match_with(count: usize) -> (MatchState, Vec<PlayerId>) {
    let mut state = MatchState::new(world::MAX_PLAYERS);
    let mut ids = Vec::new();
    for slot in 0..count {
        let id = Uuid::new_v4();
        state.players.insert(id, Player::new(id, format!("P{}", slot + 1), slot));
        state.lanes[slot] = Some(id);
        ids.push(id);
    }
    state.lane_count = count;
    state.phase = Phase::Playing;
    state.wave = 1;
    (state, ids)
}

fn landed(state: &mut MatchState, slot: usize) -> usize {
    let (x0, _) = segment_bounds(slot);
    let id = state.alloc_id();
    let mut a = Asteroid::new(id, Vec2::new(x0 + 180.0, world::GROUND_Y), 10.0, 5.0, SizeClass::Medium, slot);
    a.velocity = Vec2::new(0.0, 40.0);
    state.asteroids.push(a);
    state.asteroids.len() - 1
}

#[test]
fn test_bruiser_attack_lands_in_target_lane() {
    let mut game = new_loop(1);
    let ids = start_match(&mut game, 2);
    let (buyer, target) = (ids[0], ids[1]);
    game.state_mut().wave = 3;
    game.state_mut().get_player_mut(buyer).unwrap().gold = 45;

    game.apply_command(buyer, ClientMessage::BuyAttack { attack_type: AttackType::Bruiser }, 100)
        .unwrap();
    assert_eq!(game.state().get_player(buyer).unwrap().gold, 0);
    assert_eq!(game.state().get_player(target).unwrap().incoming_attacks, vec![AttackType::Bruiser]);

    let out = game.take_outbox();
    assert!(out.iter().any(|o| o.recipient == Recipient::Player(buyer)
        && matches!(o.message, ServerMessage::AttackQueued { target_slot: 1, .. })));
    assert!(out.iter().any(|o| o.recipient == Recipient::Player(target)
        && matches!(o.message, ServerMessage::IncomingAttack { .. })));

    let mut rng = StdRng::seed_from_u64(9);
    let state = game.state_mut();
    spawner::spawn_wave(state, &mut rng);
    let bruisers: Vec<_> = state
        .spawn_queue
        .iter()
        .filter(|e| e.attack_type == Some(AttackType::Bruiser))
        .cloned()
        .collect();
    assert_eq!(bruisers.len(), 1);
    assert_eq!(bruisers[0].hp, 10.0);
    assert_eq!(bruisers[0].size, SizeClass::Large);
    assert_eq!(bruisers[0].target_slot, 1);

    state.spawn_queue.clear();
    spawner::spawn_asteroid(state, bruisers[0].clone(), &mut rng);
    let a = state.asteroids.last_mut().unwrap();
    a.in_ftl = false;
    a.position.y = world::GROUND_Y;

    assert_eq!(combat::resolve_ground_impacts(state, &mut rng), 1);
    assert_eq!(state.get_player(target).unwrap().hp, 7);
    assert_eq!(state.get_player(buyer).unwrap().hp, 8);
}

#[test]
fn test_ricochet_bounces_twice_then_despawns() {
    let id = Uuid::new_v4();
    let (x0, x1) = segment_bounds(0);
    let mut b = Bullet::new(1, id, 0, Vec2::new(x0 + 5.0, 300.0), Vec2::new(-200.0, 0.0));
    b.ricochet = 2;
    b.homing = false;

    let mut flips = 0;
    for _ in 0..400 {
        b.hit_list.push(99);
        b.position += b.velocity * (1.0 / 30.0);
        if physics::confine_to_lane(&mut b) {
            flips += 1;
            assert!(b.hit_list.is_empty());
            assert!(b.position.x >= x0 && b.position.x <= x1);
        }
        if b.dead {
            break;
        }
    }

    assert_eq!(flips, 2);
    assert!(b.dead);
    assert_eq!(b.ricochet, 0);
}

#[test]
fn test_shield_blocks_two_impacts_per_wave() {
    let (mut state, ids) = match_with(1);
    let mut rng = StdRng::seed_from_u64(3);
    state.get_player_mut(ids[0]).unwrap().upgrades.shield = 2;
    spawner::spawn_wave(&mut state, &mut rng);
    state.spawn_queue.clear();
    assert_eq!(state.get_player(ids[0]).unwrap().upgrades.shield_active, 2);

    for expected_hp in [8, 8, 7] {
        landed(&mut state, 0);
        assert_eq!(combat::resolve_ground_impacts(&mut state, &mut rng), 1);
        state.sweep_dead();
        assert_eq!(state.get_player(ids[0]).unwrap().hp, expected_hp);
    }

    state.wave = 2;
    spawner::spawn_wave(&mut state, &mut rng);
    assert_eq!(state.get_player(ids[0]).unwrap().upgrades.shield_active, 2);
}

#[test]
fn test_deadline_auto_picks_from_own_cards() {
    let mut game = new_loop(4);
    let ids = start_match(&mut game, 2);
    let (a, b) = (ids[0], ids[1]);
    game.state_mut().spawn_queue.clear();
    game.state_mut().asteroids.clear();

    game.tick(1_000);
    let events = game.tick(2_000);
    assert!(events.iter().any(|e| matches!(e, GameLoopEvent::UpgradePhaseStarted { .. })));
    assert_eq!(game.state().phase, Phase::Upgrades);

    let round = game.state().upgrade_round.clone().unwrap();
    assert_eq!(round.deadline_ms, 12_000);
    let a_key = round.offers[&a].options[0].key.clone();
    let b_keys: Vec<String> = round.offers[&b].options.iter().map(|c| c.key.clone()).collect();
    assert_eq!(b_keys.len(), 3);

    game.queue_command(a, ClientMessage::PickUpgrade { key: a_key });
    game.tick(5_000);
    assert_eq!(game.state().phase, Phase::Upgrades);
    game.take_outbox();

    let events = game.tick(12_000);
    let out = game.take_outbox();
    let auto_picks: Vec<&String> = out
        .iter()
        .filter(|o| o.recipient == Recipient::Player(b))
        .filter_map(|o| match &o.message {
            ServerMessage::Picked { key, auto: true } => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(auto_picks.len(), 1);
    assert!(b_keys.contains(auto_picks[0]));
    assert!(!out
        .iter()
        .any(|o| o.recipient == Recipient::Player(a) && matches!(o.message, ServerMessage::Picked { auto: true, .. })));

    assert_eq!(game.state().wave, 2);
    assert_eq!(game.state().phase, Phase::Playing);
    assert_eq!(
        events.iter().filter(|e| matches!(e, GameLoopEvent::WaveStarted { .. })).count(),
        1
    );

    game.tick(12_033);
    assert_eq!(game.state().wave, 2);
}

#[test]
fn test_splitter_death_spawns_four_children() {
    let (mut state, ids) = match_with(2);
    let mut rng = StdRng::seed_from_u64(5);
    state.wave = 5;

    let id = state.alloc_id();
    let parent_pos = Vec2::new(540.0, 300.0);
    let mut parent = Asteroid::new(id, parent_pos, 16.0, 0.0, SizeClass::Medium, 1);
    parent.attack_type = Some(AttackType::Splitter);
    parent.splits = 4;
    parent.last_hit_by = Some(ids[1]);
    state.asteroids.push(parent);

    assert_eq!(combat::reap_kills(&mut state, &mut rng), 1);
    state.sweep_dead();

    assert_eq!(state.asteroids.len(), 4);
    for child in &state.asteroids {
        assert_eq!(child.hp, 3.0);
        assert_eq!(child.target_slot(), 1);
        assert!((child.position.x - parent_pos.x).abs() <= 30.0);
        assert!((child.position.y - parent_pos.y).abs() <= 20.0);
    }
    assert_eq!(state.get_player(ids[1]).unwrap().kills, 1);
}

#[test]
fn test_bullets_stay_in_owner_lane() {
    let mut game = new_loop(21);
    let ids = start_match(&mut game, 3);
    for &id in &ids {
        let p = game.state_mut().get_player_mut(id).unwrap();
        p.hp = 10_000;
        p.upgrades.ricochet = 3;
        p.upgrades.multishot = 3;
    }

    let mut rng = StdRng::seed_from_u64(22);
    let mut now = 0;
    for _ in 0..900 {
        now += TICK_MS;
        for &id in &ids {
            let x = rng.gen_range(-200.0..1300.0);
            let y = rng.gen_range(-100.0..700.0);
            game.queue_command(id, ClientMessage::Input { x, y, shooting: rng.gen_bool(0.5) });
        }
        game.tick(now);
        game.take_outbox();

        for b in &game.state().bullets {
            let (x0, x1) = segment_bounds(b.owner_slot);
            assert!(b.position.x >= x0 && b.position.x <= x1, "bullet {} left lane {}", b.id, b.owner_slot);
        }
        for p in game.state().players.values() {
            let offset = (p.turret_angle - aim::STRAIGHT_UP).abs();
            assert!(offset <= aim::MAX_AIM_ANGLE + 1e-4, "turret angle {} out of range", p.turret_angle);
        }
    }
}

#[test]
fn test_wave_clear_debounce_resets_on_repopulation() {
    let mut game = new_loop(8);
    start_match(&mut game, 1);
    game.state_mut().spawn_queue.clear();
    game.state_mut().asteroids.clear();

    game.tick(1_000);
    assert_eq!(game.state().wave_cleared_at, Some(1_000));

    let id = game.state_mut().alloc_id();
    game.state_mut()
        .asteroids
        .push(Asteroid::new(id, Vec2::new(180.0, 100.0), 20.0, 50.0, SizeClass::Large, 0));
    game.tick(1_500);
    assert_eq!(game.state().wave_cleared_at, None);

    game.state_mut().asteroids.clear();
    game.tick(1_600);
    game.tick(2_100);
    assert_eq!(game.state().phase, Phase::Playing);
    game.tick(2_600);
    assert_eq!(game.state().phase, Phase::Upgrades);
}

#[test]
fn test_purchases_debit_gold_once() {
    let mut game = new_loop(12);
    let ids = start_match(&mut game, 1);
    let id = ids[0];

    game.state_mut().get_player_mut(id).unwrap().gold = 49;
    assert!(game
        .apply_command(id, ClientMessage::BuyTower { slot_index: 0, tower_type: 0 }, 0)
        .is_err());
    let p = game.state().get_player(id).unwrap();
    assert_eq!(p.gold, 49);
    assert!(p.towers[0].is_none());

    game.state_mut().get_player_mut(id).unwrap().gold = 120;
    game.apply_command(id, ClientMessage::BuyTower { slot_index: 0, tower_type: 0 }, 0)
        .unwrap();
    assert_eq!(game.state().get_player(id).unwrap().gold, 70);

    // Occupied slot: no second charge
    assert!(game
        .apply_command(id, ClientMessage::BuyTower { slot_index: 0, tower_type: 0 }, 0)
        .is_err());
    assert_eq!(game.state().get_player(id).unwrap().gold, 70);
}

#[test]
fn test_upgrade_options_are_distinct_and_eligible() {
    let mut rng = StdRng::seed_from_u64(31);
    let mut owned = upgrades::PlayerUpgrades::default();
    owned.chain = true;
    owned.crit_chance = 0.5;

    for _ in 0..500 {
        let options = upgrades::make_upgrade_options(&owned, &mut rng);
        assert_eq!(options.len(), 3);
        for (i, card) in options.iter().enumerate() {
            assert!(options[i + 1..].iter().all(|other| other.def_id != card.def_id));
            assert_ne!(card.def_id, "chain");
        }
    }
}

#[test]
fn test_multishot_penalty_compounds() {
    let mut rng = StdRng::seed_from_u64(41);
    let def = CATALOG.iter().find(|d| d.id == "multi").unwrap();
    let mut stats = upgrades::PlayerUpgrades::default();
    let mut expected = 1.0f32;
    let mut previous = stats.multishot_dmg_mult;

    for rarity in [Rarity::Common, Rarity::Rare, Rarity::Epic, Rarity::Legendary] {
        let card = upgrades::roll_card(def, rarity, &mut rng);
        card.effect.apply(&mut stats);
        let (_, penalty) = rarity.multishot_tier();
        expected *= 1.0 - penalty as f32 / 100.0;

        assert!((stats.multishot_dmg_mult - expected).abs() < 1e-6);
        assert!(stats.multishot_dmg_mult < previous);
        assert!(stats.multishot_dmg_mult <= 1.0);
        previous = stats.multishot_dmg_mult;
    }
    assert_eq!(stats.multishot, 1 + 1 + 1 + 2 + 3);
}
