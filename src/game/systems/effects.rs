//! Cosmetic particles and floating damage numbers

use rand::Rng;

use crate::game::constants::blast;
use crate::game::state::{DamageNumber, MatchState, Particle};
use crate::util::vec2::Vec2;

/// Particle colours
pub mod colors {
    pub const FTL_EXIT: &str = "#88f";
    pub const SHIELD_BLOCK: &str = "#0ff";
    pub const BOMBER_IMPACT: &str = "#ff00ff";
    pub const GROUND_IMPACT: &str = "#f44";
    pub const SPLASH: &str = "#ff8800";
    pub const CHAIN: &str = "#8cf";
    pub const DEATH: &str = "#fa0";
}

const PARTICLE_MAX_LIFE: f32 = 0.5;

/// Burst of particles radiating from `at`
pub fn create_explosion<R: Rng + ?Sized>(state: &mut MatchState, at: Vec2, color: &'static str, rng: &mut R) {
    let count = blast::PARTICLE_COUNT;
    state.particles.reserve(count);
    for i in 0..count {
        let angle = (i as f32 / count as f32) * std::f32::consts::TAU + rng.gen_range(0.0..0.3);
        let speed = rng.gen_range(50.0..150.0);
        state.particles.push(Particle {
            position: at,
            velocity: Vec2::from_angle(angle) * speed,
            life: rng.gen_range(0.3..0.5),
            max_life: PARTICLE_MAX_LIFE,
            alpha: 1.0,
            color,
            size: rng.gen_range(2.0..5.0),
        });
    }
}

/// Floating readout above a struck asteroid
pub fn add_damage_number(state: &mut MatchState, at: Vec2, value: f32, is_crit: bool) {
    state.damage_numbers.push(DamageNumber {
        position: at,
        value: (value * 10.0).round() / 10.0,
        is_crit,
        age: 0.0,
    });
}

/// Advance and expire particles and damage numbers
pub fn update_effects(state: &mut MatchState, dt: f32) {
    for particle in &mut state.particles {
        particle.position += particle.velocity * dt;
        particle.life -= dt;
        particle.alpha = (particle.life / particle.max_life).max(0.0);
    }
    state.particles.retain(|p| p.life > 0.0);

    for number in &mut state.damage_numbers {
        number.age += dt;
        number.position.y -= blast::DAMAGE_NUMBER_RISE * dt;
    }
    state.damage_numbers.retain(|d| d.age < blast::DAMAGE_NUMBER_TTL);
}
