//! Lane geometry, target selection and aim clamping

use crate::game::constants::{aim, tower, world};
use crate::game::state::Asteroid;
use crate::util::vec2::Vec2;

/// Horizontal extent `(x0, x1)` of a lane
#[inline]
pub fn segment_bounds(slot: usize) -> (f32, f32) {
    let x0 = slot as f32 * world::SEGMENT_W;
    (x0, x0 + world::SEGMENT_W)
}

/// Main turret sits at the lane centre on the ground line
pub fn turret_position(slot: usize) -> Vec2 {
    let (x0, _) = segment_bounds(slot);
    Vec2::new(x0 + world::SEGMENT_W / 2.0, world::GROUND_Y)
}

/// Position of tower slot `index` within a lane
pub fn tower_position(slot: usize, index: usize) -> Vec2 {
    let (x0, _) = segment_bounds(slot);
    Vec2::new(
        x0 + tower::FIRST_X + tower::SPACING_X * index as f32,
        world::GROUND_Y - tower::HEIGHT,
    )
}

/// Clamp `x` so a body of radius `r` stays inside the lane
pub fn clamp_to_lane(slot: usize, x: f32, r: f32) -> f32 {
    let (x0, x1) = segment_bounds(slot);
    x.clamp(x0 + r, (x1 - r).max(x0 + r))
}

/// Index of the most dangerous asteroid attacking `slot` within range of `origin`
///
/// Candidates are alive, on screen, out of FTL and aimed at this lane. The score
/// favours asteroids close to the ground, with distance as a tiebreaker.
pub fn find_best_target(asteroids: &[Asteroid], slot: usize, origin: Vec2, range_mult: f32) -> Option<usize> {
    let range = aim::TARGET_RANGE * range_mult;
    let range_sq = range * range;

    let mut best = None;
    let mut best_score = f32::NEG_INFINITY;

    for (i, asteroid) in asteroids.iter().enumerate() {
        if !asteroid.is_engaged() || asteroid.target_slot() != slot || asteroid.position.y < 0.0 {
            continue;
        }
        let dist_sq = origin.distance_sq_to(asteroid.position);
        if dist_sq > range_sq {
            continue;
        }

        let danger = asteroid.position.y / world::GROUND_Y;
        let score = danger * 1000.0 - dist_sq.sqrt() * 0.1;
        if score > best_score {
            best_score = score;
            best = Some(i);
        }
    }

    best
}

/// Aim point and angle after clamping to the forward cone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimSolution {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

/// Below this the aim direction is undefined
const MIN_AIM_DISTANCE: f32 = 1e-3;

/// Pull a desired aim point into the ±80° cone around straight up
///
/// The returned point lies at the same distance from `origin` as `target`.
/// A target on top of `origin` has no direction, so it aims straight up at
/// targeting range.
pub fn clamp_aim_angle(origin: Vec2, target: Vec2) -> AimSolution {
    let delta = target - origin;
    let dist = delta.length();
    if dist < MIN_AIM_DISTANCE {
        let point = origin + Vec2::from_angle(aim::STRAIGHT_UP) * aim::TARGET_RANGE;
        return AimSolution {
            x: point.x,
            y: point.y,
            angle: aim::STRAIGHT_UP,
        };
    }

    let from_vertical = normalize_angle(delta.angle() - aim::STRAIGHT_UP);
    let clamped = aim::STRAIGHT_UP + from_vertical.clamp(-aim::MAX_AIM_ANGLE, aim::MAX_AIM_ANGLE);

    let point = origin + Vec2::from_angle(clamped) * dist;
    AimSolution {
        x: point.x,
        y: point.y,
        angle: clamped,
    }
}

/// Wrap an angle into (-PI, PI]
fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    while angle > PI {
        angle -= TAU;
    }
    while angle <= -PI {
        angle += TAU;
    }
    angle
}
