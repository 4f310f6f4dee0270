//! Asteroid and bullet motion
//!
//! Bullets never leave their owner's lane: they bounce off its walls while
//! ricochets remain and despawn otherwise.

use rand::Rng;

use crate::game::constants::{asteroid, bullet, ftl, world};
use crate::game::state::{Bullet, MatchState};
use crate::game::systems::effects::{self, colors};
use crate::game::systems::targeting::segment_bounds;
use crate::util::vec2::Vec2;

/// Advance asteroids: phasing, FTL entry, slowfield and lane-wall bounces
pub fn update_asteroids<R: Rng + ?Sized>(state: &mut MatchState, dt: f32, rng: &mut R) {
    let mut slowed = [false; world::MAX_PLAYERS];
    for (slot, flag) in slowed.iter_mut().enumerate() {
        *flag = state.lane_player(slot).is_some_and(|p| p.upgrades.slowfield);
    }

    let mut ftl_exits = Vec::new();
    for a in state.asteroids.iter_mut().filter(|a| !a.dead) {
        if a.phasing {
            a.phase_timer += dt;
            a.is_phased = (a.phase_timer * asteroid::PHASE_FREQ).sin() > asteroid::PHASE_THRESHOLD;
        }

        if a.in_ftl {
            a.position.y += a.velocity.y * dt * ftl::VERTICAL_MULT;
            a.position.x += a.velocity.x * dt * ftl::HORIZONTAL_MULT;
            a.rotation += a.spin * dt * ftl::SPIN_MULT;
            if a.position.y >= a.ftl_threshold {
                a.in_ftl = false;
                ftl_exits.push(a.position);
            }
            continue;
        }

        let slot = a.target_slot();
        let speed_mult = if slowed.get(slot).copied().unwrap_or(false) {
            asteroid::SLOWFIELD_MULT
        } else {
            1.0
        };
        a.position += a.velocity * (dt * speed_mult);
        a.rotation += a.spin * dt;

        let (x0, x1) = segment_bounds(slot);
        if a.position.x - a.radius < x0 {
            a.position.x = x0 + a.radius;
            a.velocity.x = a.velocity.x.abs();
        }
        if a.position.x + a.radius > x1 {
            a.position.x = x1 - a.radius;
            a.velocity.x = -a.velocity.x.abs();
        }
    }

    for at in ftl_exits {
        effects::create_explosion(state, at, colors::FTL_EXIT, rng);
    }
}

/// Keep a bullet inside its owner's lane. Side walls ricochet while charges remain;
/// anything else leaving the field despawns.
///
/// Returns true if the bullet bounced.
pub fn confine_to_lane(b: &mut Bullet) -> bool {
    let (x0, x1) = segment_bounds(b.owner_slot);
    let mut bounced = false;

    for wall in [x0, x1] {
        let outside = if wall == x0 { b.position.x < x0 } else { b.position.x > x1 };
        if !outside {
            continue;
        }
        if b.ricochet > 0 {
            b.position.x = wall;
            b.velocity.x = -b.velocity.x;
            b.ricochet -= 1;
            bounced = true;
        } else {
            b.dead = true;
        }
    }

    if b.position.y < world::TOP_EXIT_Y || b.position.y > world::GROUND_Y {
        b.dead = true;
    }
    if bounced {
        b.hit_list.clear();
    }
    bounced
}

/// Advance bullets: homing, integration, lifespan and lane confinement
pub fn update_bullets(state: &mut MatchState, dt: f32) {
    let asteroids = &state.asteroids;
    let homing_speed = bullet::SPEED * bullet::HOMING_SPEED_FACTOR;

    for b in state.bullets.iter_mut().filter(|b| !b.dead) {
        if b.homing {
            let nearest = asteroids
                .iter()
                .filter(|a| a.is_engaged() && !a.is_phased && a.hp > 0.0 && a.target_slot() == b.owner_slot)
                .map(|a| (a.position, a.position.distance_to(b.position)))
                .filter(|(_, d)| *d < bullet::HOMING_RADIUS)
                .min_by(|x, y| x.1.total_cmp(&y.1));

            if let Some((target, _)) = nearest {
                let dir = (target - b.position).normalize();
                let steered: Vec2 = b.velocity + dir * (bullet::HOMING_STRENGTH * dt);
                if steered.length_sq() > 0.0 {
                    b.velocity = steered.with_length(homing_speed);
                }
            }
        }

        b.position += b.velocity * dt;
        b.lifespan -= dt;
        if b.lifespan <= 0.0 {
            b.dead = true;
            continue;
        }

        confine_to_lane(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Asteroid, Phase, Player, SizeClass};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    const DT: f32 = 1.0 / 30.0;

    fn solo() -> MatchState {
        let mut state = MatchState::new(4);
        let id = Uuid::new_v4();
        state.players.insert(id, Player::new(id, "P1".to_string(), 0));
        state.lanes[0] = Some(id);
        state.lane_count = 1;
        state.phase = Phase::Playing;
        state
    }

    fn bullet_at(slot: usize, pos: Vec2, vel: Vec2) -> Bullet {
        let mut b = Bullet::new(1, Uuid::nil(), slot, pos, vel);
        b.homing = false;
        b
    }

    #[test]
    fn test_ftl_entry_then_normal_fall() {
        let mut state = solo();
        let mut a = Asteroid::new(1, Vec2::new(100.0, -60.0), 10.0, 3.0, SizeClass::Medium, 0);
        a.velocity = Vec2::new(0.0, 40.0);
        a.in_ftl = true;
        a.ftl_threshold = 50.0;
        state.asteroids.push(a);
        let mut rng = StdRng::seed_from_u64(1);

        update_asteroids(&mut state, DT, &mut rng);
        let y = state.asteroids[0].position.y;
        assert!((y - (-60.0 + 40.0 * DT * 8.0)).abs() < 1e-4);

        for _ in 0..20 {
            update_asteroids(&mut state, DT, &mut rng);
        }
        assert!(!state.asteroids[0].in_ftl);
        assert_eq!(state.particles.len(), 12);
        assert_eq!(state.particles[0].color, "#88f");
    }

    #[test]
    fn test_slowfield_slows_own_lane() {
        let mut state = solo();
        state.lane_player_mut(0).unwrap().upgrades.slowfield = true;
        let mut a = Asteroid::new(1, Vec2::new(100.0, 100.0), 10.0, 3.0, SizeClass::Medium, 0);
        a.velocity = Vec2::new(0.0, 30.0);
        state.asteroids.push(a);
        let mut rng = StdRng::seed_from_u64(1);
        update_asteroids(&mut state, 1.0, &mut rng);
        assert!((state.asteroids[0].position.y - 122.5).abs() < 1e-4);
    }

    #[test]
    fn test_asteroid_bounces_off_lane_wall() {
        let mut state = solo();
        let mut a = Asteroid::new(1, Vec2::new(355.0, 100.0), 10.0, 3.0, SizeClass::Medium, 0);
        a.velocity = Vec2::new(15.0, 30.0);
        state.asteroids.push(a);
        let mut rng = StdRng::seed_from_u64(1);
        update_asteroids(&mut state, DT, &mut rng);
        let a = &state.asteroids[0];
        assert_eq!(a.position.x, 350.0);
        assert!(a.velocity.x < 0.0);
    }

    #[test]
    fn test_phasing_window() {
        let mut state = solo();
        let mut a = Asteroid::new(1, Vec2::new(100.0, 100.0), 10.0, 3.0, SizeClass::Medium, 0);
        a.phasing = true;
        // sin(4 * 0.4) > 0.5 after one step of 0.4 - DT
        a.phase_timer = 0.4 - DT;
        state.asteroids.push(a);
        let mut rng = StdRng::seed_from_u64(1);
        update_asteroids(&mut state, DT, &mut rng);
        assert!(state.asteroids[0].is_phased);
    }

    #[test]
    fn test_ricochet_flips_and_clears_hits() {
        let mut b = bullet_at(1, Vec2::new(355.0, 300.0), Vec2::new(-100.0, 0.0));
        b.ricochet = 1;
        b.hit_list.push(7);
        assert!(confine_to_lane(&mut b));
        assert_eq!(b.position.x, 360.0);
        assert!(b.velocity.x > 0.0);
        assert_eq!(b.ricochet, 0);
        assert!(b.hit_list.is_empty());
        assert!(!b.dead);

        b.position.x = 355.0;
        assert!(!confine_to_lane(&mut b));
        assert!(b.dead);
    }

    #[test]
    fn test_top_and_bottom_exit_despawn() {
        let mut b = bullet_at(0, Vec2::new(100.0, -51.0), Vec2::new(0.0, -100.0));
        b.ricochet = 3;
        confine_to_lane(&mut b);
        assert!(b.dead);

        let mut b = bullet_at(0, Vec2::new(100.0, 561.0), Vec2::new(0.0, 100.0));
        confine_to_lane(&mut b);
        assert!(b.dead);
    }

    #[test]
    fn test_lifespan_expiry() {
        let mut state = solo();
        let mut b = bullet_at(0, Vec2::new(100.0, 300.0), Vec2::new(0.0, -10.0));
        b.lifespan = DT / 2.0;
        state.bullets.push(b);
        update_bullets(&mut state, DT);
        assert!(state.bullets[0].dead);
    }

    #[test]
    fn test_homing_steers_toward_lane_target() {
        let mut state = solo();
        state.asteroids.push(Asteroid::new(1, Vec2::new(200.0, 300.0), 10.0, 3.0, SizeClass::Medium, 0));
        let mut b = bullet_at(0, Vec2::new(100.0, 300.0), Vec2::new(0.0, -175.0));
        b.homing = true;
        state.bullets.push(b);
        update_bullets(&mut state, DT);
        let b = &state.bullets[0];
        assert!(b.velocity.x > 0.0);
        assert!((b.velocity.length() - 210.0).abs() < 1e-2);
    }

    #[test]
    fn test_homing_ignores_phased_and_other_lanes() {
        let mut state = solo();
        let mut phased = Asteroid::new(1, Vec2::new(200.0, 300.0), 10.0, 3.0, SizeClass::Medium, 0);
        phased.is_phased = true;
        state.asteroids.push(phased);
        state.asteroids.push(Asteroid::new(2, Vec2::new(150.0, 300.0), 10.0, 3.0, SizeClass::Medium, 1));
        let mut b = bullet_at(0, Vec2::new(100.0, 300.0), Vec2::new(0.0, -175.0));
        b.homing = true;
        state.bullets.push(b);
        update_bullets(&mut state, DT);
        assert_eq!(state.bullets[0].velocity, Vec2::new(0.0, -175.0));
    }
}
