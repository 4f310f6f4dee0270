//! Combat resolution
//!
//! Handles:
//! - Player turret aiming and multishot volleys
//! - Tower shots
//! - Bullet vs asteroid collisions with splash and chain lightning
//! - Kill rewards and splitter children
//! - Ground impacts, shields and bomber detonations

use rand::Rng;

use crate::game::constants::{asteroid, blast, bullet, player, world};
use crate::game::state::{Asteroid, Bullet, BulletKind, EntityId, MatchState, PlayerId, SizeClass, Tower};
use crate::game::systems::effects::{self, colors};
use crate::game::systems::spawner::make_shape;
use crate::game::systems::targeting::{clamp_aim_angle, clamp_to_lane, find_best_target, turret_position};
use crate::util::vec2::Vec2;

/// Fire a single player bullet from `origin` along `aim_angle`, rotated by `angle_offset`
///
/// `aim_angle` must already be clamped to the turret cone.
pub fn fire_bullet<R: Rng + ?Sized>(
    state: &mut MatchState,
    owner: PlayerId,
    origin: Vec2,
    aim_angle: f32,
    angle_offset: f32,
    rng: &mut R,
) -> Option<EntityId> {
    let shooter = state.get_player(owner)?;
    let slot = shooter.slot;
    let u = shooter.upgrades.clone();

    let mut damage = (bullet::DAMAGE + u.damage_add) * u.multishot_dmg_mult;
    let is_crit = u.crit_chance > 0.0 && rng.gen::<f32>() < u.crit_chance;
    if is_crit {
        damage *= bullet::CRIT_MULTIPLIER;
    }

    let angle = aim_angle + angle_offset;
    let speed = bullet::SPEED * u.bullet_speed_mult;
    let spawn = Vec2::new(origin.x, origin.y - bullet::SPAWN_OFFSET_Y);

    let id = state.alloc_id();
    let mut b = Bullet::new(id, owner, slot, spawn, Vec2::from_angle(angle) * speed);
    b.damage = damage;
    b.is_crit = is_crit;
    b.lifespan = bullet::LIFESPAN + u.lifespan_add;
    b.explosive = u.explosive;
    b.chain = u.chain;
    b.ricochet = u.ricochet;
    b.pierce = u.pierce;
    state.bullets.push(b);
    Some(id)
}

/// Angle offset of shot `i` in a multishot fan; odd shots go left
pub fn fan_offset(i: u32) -> f32 {
    if i == 0 {
        return 0.0;
    }
    let layer = i.div_ceil(2) as f32;
    let side = if i % 2 == 1 { -1.0 } else { 1.0 };
    side * layer * bullet::FAN_STEP
}

/// Primary shot plus the fanned extra shots
pub fn fire_with_multishot<R: Rng + ?Sized>(state: &mut MatchState, owner: PlayerId, origin: Vec2, aim_angle: f32, rng: &mut R) {
    let shots = state.get_player(owner).map_or(1, |p| p.upgrades.multishot.max(1));
    for i in 0..shots {
        fire_bullet(state, owner, origin, aim_angle, fan_offset(i), rng);
    }
}

/// Fire a tower shot. Tower shots never crit.
pub fn fire_tower_bullet(state: &mut MatchState, owner: PlayerId, slot: usize, tower: &Tower, origin: Vec2, aim_angle: f32) -> EntityId {
    let def = tower.kind.def();
    let speed = match def.bullet {
        BulletKind::Sniper => bullet::SPEED * 1.5,
        _ => bullet::SPEED,
    };
    let velocity = Vec2::from_angle(aim_angle) * speed;

    let id = state.alloc_id();
    let mut b = Bullet::new(id, owner, slot, origin, velocity);
    b.damage = tower.damage();
    b.kind = def.bullet;
    b.is_tower_bullet = true;
    match def.bullet {
        BulletKind::Sniper => {
            b.radius = 4.0;
            b.pierce = 1;
        }
        BulletKind::Missile => {
            b.radius = 5.0;
            b.explosive = 1.0;
        }
        _ => {}
    }
    state.bullets.push(b);
    id
}

/// Aim every living turret and fire when its lane has something to shoot at
pub fn update_turrets<R: Rng + ?Sized>(state: &mut MatchState, dt: f32, rng: &mut R) {
    for player_id in state.lane_ids() {
        let Some(p) = state.get_player(player_id) else { continue };
        if !p.is_alive() {
            continue;
        }
        let slot = p.slot;
        let origin = turret_position(slot);

        let desired = if p.manual_shooting {
            p.target
        } else {
            find_best_target(&state.asteroids, slot, origin, 1.0)
                .map(|i| state.asteroids[i].position)
                .unwrap_or(p.target)
        };
        let aim = clamp_aim_angle(origin, desired);
        let has_targets = state
            .asteroids
            .iter()
            .any(|a| a.is_engaged() && a.target_slot() == slot && a.position.y > 0.0);

        let Some(p) = state.get_player_mut(player_id) else { continue };
        p.turret_angle = aim.angle;
        p.cooldown = (p.cooldown - dt).max(0.0);
        if p.cooldown > 0.0 || !has_targets {
            continue;
        }
        p.cooldown = p.upgrades.fire_cooldown(bullet::COOLDOWN);
        fire_with_multishot(state, player_id, origin, aim.angle, rng);
    }
}

fn credit_damage(state: &mut MatchState, owner: PlayerId, amount: f32) {
    if let Some(p) = state.get_player_mut(owner) {
        p.damage_dealt += amount;
        p.wave_damage += amount;
    }
}

/// Apply damage to an asteroid, emit a readout and credit the owner
fn damage_asteroid(state: &mut MatchState, index: usize, owner: PlayerId, amount: f32, is_crit: bool) {
    let a = &mut state.asteroids[index];
    a.hp -= amount;
    a.last_hit_by = Some(owner);
    let at = Vec2::new(a.position.x, a.position.y - a.radius);
    effects::add_damage_number(state, at, amount, is_crit);
    credit_damage(state, owner, amount);
}

/// First asteroid this bullet overlaps, if any
fn find_hit<R: Rng + ?Sized>(state: &MatchState, b: &Bullet, rng: &mut R) -> Option<usize> {
    for (i, a) in state.asteroids.iter().enumerate() {
        if !a.is_engaged() || a.hp <= 0.0 || a.target_slot() != b.owner_slot || b.hit_list.contains(&a.id) {
            continue;
        }
        if a.is_phased && rng.gen_bool(asteroid::PHASE_EVADE_CHANCE) {
            continue;
        }
        let reach = a.radius + b.radius;
        if a.position.distance_sq_to(b.position) <= reach * reach {
            return Some(i);
        }
    }
    None
}

/// Splash half the hit damage onto nearby same-lane asteroids
fn splash<R: Rng + ?Sized>(state: &mut MatchState, center: usize, owner: PlayerId, damage: f32, explosive: f32, rng: &mut R) {
    let origin = state.asteroids[center].position;
    let slot = state.asteroids[center].target_slot();
    let radius = blast::SPLASH_BASE_RADIUS + blast::SPLASH_RADIUS_PER_LEVEL * explosive;
    let splash_damage = damage * blast::SPLASH_FRACTION;

    let victims: Vec<usize> = state
        .asteroids
        .iter()
        .enumerate()
        .filter(|(i, a)| {
            *i != center
                && a.is_engaged()
                && a.hp > 0.0
                && a.target_slot() == slot
                && a.position.distance_to(origin) < radius + a.radius
        })
        .map(|(i, _)| i)
        .collect();

    for i in victims {
        damage_asteroid(state, i, owner, splash_damage, false);
    }
    effects::create_explosion(state, origin, colors::SPLASH, rng);
}

/// Arc from a killed asteroid to the nearest living neighbour in its lane
fn chain_lightning<R: Rng + ?Sized>(state: &mut MatchState, from: usize, owner: PlayerId, rng: &mut R) {
    let origin = state.asteroids[from].position;
    let slot = state.asteroids[from].target_slot();

    let nearest = state
        .asteroids
        .iter()
        .enumerate()
        .filter(|(i, a)| *i != from && a.is_engaged() && a.hp > 0.0 && a.target_slot() == slot)
        .map(|(i, a)| (i, a.position.distance_to(origin)))
        .filter(|(_, d)| *d < blast::CHAIN_RANGE)
        .min_by(|a, b| a.1.total_cmp(&b.1));

    if let Some((i, _)) = nearest {
        damage_asteroid(state, i, owner, blast::CHAIN_DAMAGE, false);
        let at = state.asteroids[i].position;
        effects::create_explosion(state, at, colors::CHAIN, rng);
    }
}

/// Resolve bullet hits for this tick. Each bullet strikes at most one asteroid per tick.
pub fn resolve_collisions<R: Rng + ?Sized>(state: &mut MatchState, rng: &mut R) {
    for bi in 0..state.bullets.len() {
        if state.bullets[bi].dead {
            continue;
        }
        let Some(ai) = find_hit(state, &state.bullets[bi], rng) else { continue };

        let asteroid_id = state.asteroids[ai].id;
        let b = &mut state.bullets[bi];
        b.hit_list.push(asteroid_id);
        if b.pierce > 0 {
            b.pierce -= 1;
        } else {
            b.dead = true;
        }
        let (owner, damage, is_crit, explosive, chain) = (b.owner_id, b.damage, b.is_crit, b.explosive, b.chain);

        damage_asteroid(state, ai, owner, damage, is_crit);
        if explosive > 0.0 {
            splash(state, ai, owner, damage, explosive, rng);
        }
        if chain && state.asteroids[ai].hp <= 0.0 {
            chain_lightning(state, ai, owner, rng);
        }
    }
}

/// Children spawned when a splitter dies
fn split_children<R: Rng + ?Sized>(state: &mut MatchState, parent: &Asteroid, rng: &mut R) {
    let hp = (asteroid::CHILD_BASE_HP + state.wave as f32 * asteroid::CHILD_HP_SCALE).ceil();
    let slot = parent.target_slot();
    for _ in 0..parent.splits {
        let x = clamp_to_lane(
            slot,
            parent.position.x + rng.gen_range(-asteroid::CHILD_SPREAD_X..=asteroid::CHILD_SPREAD_X),
            asteroid::CHILD_RADIUS,
        );
        let y = parent.position.y + rng.gen_range(-asteroid::CHILD_SPREAD_Y..=asteroid::CHILD_SPREAD_Y);

        let id = state.alloc_id();
        let mut child = Asteroid::new(id, Vec2::new(x, y), asteroid::CHILD_RADIUS, hp, SizeClass::Small, slot);
        child.attack_type = parent.attack_type;
        child.velocity = Vec2::new(
            rng.gen_range(asteroid::VX_RANGE.0..=asteroid::VX_RANGE.1),
            rng.gen_range(asteroid::VY_RANGE.0..=asteroid::VY_RANGE.1),
        );
        child.rotation = rng.gen_range(0.0..std::f32::consts::TAU);
        child.spin = rng.gen_range(-3.0..=3.0);
        child.shape = make_shape(rng);
        state.asteroids.push(child);
    }
}

/// Mark every asteroid at or below zero HP dead and pay out the kill
pub fn reap_kills<R: Rng + ?Sized>(state: &mut MatchState, rng: &mut R) -> usize {
    let killed: Vec<usize> = state
        .asteroids
        .iter()
        .enumerate()
        .filter(|(_, a)| !a.dead && a.hp <= 0.0)
        .map(|(i, _)| i)
        .collect();

    let gold_base = player::KILL_GOLD_BASE + state.wave / 3;
    for &i in &killed {
        state.asteroids[i].dead = true;
        let corpse = state.asteroids[i].clone();
        effects::create_explosion(state, corpse.position, colors::DEATH, rng);

        if let Some(p) = corpse.last_hit_by.and_then(|id| state.get_player_mut(id)) {
            p.score += player::KILL_SCORE;
            p.kills += 1;
            if corpse.is_natural() {
                p.gold += (gold_base as f32 * p.upgrades.gold_mult).round() as u32;
            }
        }

        if corpse.splits > 0 {
            split_children(state, &corpse, rng);
        }
    }
    killed.len()
}

/// Asteroids reaching the ground damage their lane's player unless a shield blocks them
///
/// Returns the number of impacts.
pub fn resolve_ground_impacts<R: Rng + ?Sized>(state: &mut MatchState, rng: &mut R) -> usize {
    let landed: Vec<usize> = state
        .asteroids
        .iter()
        .enumerate()
        .filter(|(_, a)| a.is_engaged() && a.position.y + a.radius >= world::GROUND_Y)
        .map(|(i, _)| i)
        .collect();

    for &i in &landed {
        // Finished off by an earlier bomber blast this tick; reap_kills handles it
        if state.asteroids[i].hp <= 0.0 {
            continue;
        }
        state.asteroids[i].dead = true;
        let (slot, x, bomber) = {
            let a = &state.asteroids[i];
            (a.target_slot(), a.position.x, a.explosive)
        };
        let impact = Vec2::new(x, world::GROUND_Y - 5.0);

        let Some(p) = state.lane_player_mut(slot) else { continue };
        if p.upgrades.shield_active > 0 {
            p.upgrades.shield_active -= 1;
            effects::create_explosion(state, impact, colors::SHIELD_BLOCK, rng);
            continue;
        }

        let damage = if bomber { 2 } else { 1 };
        p.hp = (p.hp - damage).max(0);

        if bomber {
            let origin = state.asteroids[i].position;
            for (j, other) in state.asteroids.iter_mut().enumerate() {
                if j != i
                    && other.is_engaged()
                    && other.hp > 0.0
                    && other.target_slot() == slot
                    && other.position.distance_to(origin) < blast::BOMBER_RADIUS
                {
                    other.hp -= 2.0;
                    // Blast kills pay out to nobody
                    if other.hp <= 0.0 {
                        other.last_hit_by = None;
                    }
                }
            }
            effects::create_explosion(state, impact, colors::BOMBER_IMPACT, rng);
        } else {
            effects::create_explosion(state, impact, colors::GROUND_IMPACT, rng);
        }
    }
    landed.len()
}
