/// Simulation timing
pub mod sim {
    /// Server tick rate in Hz
    pub const TICK_RATE: u32 = 30;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / 30.0;
    /// Tick duration in milliseconds
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
}

/// World geometry
pub mod world {
    /// Maximum players (and therefore lanes) per match
    pub const MAX_PLAYERS: usize = 4;
    /// World height in pixels
    pub const WORLD_H: f32 = 600.0;
    /// Ground line; asteroids reaching it hit the lane's base
    pub const GROUND_Y: f32 = 560.0;
    /// Width of a single lane segment
    pub const SEGMENT_W: f32 = 360.0;
    /// Bullets above this line leave the playfield
    pub const TOP_EXIT_Y: f32 = -50.0;
}

/// Player economy and health
pub mod player {
    /// Starting and maximum HP per player
    pub const BASE_HP: i32 = 8;
    /// Gold at match start
    pub const STARTING_GOLD: u32 = 30;
    /// Longest accepted display name, in characters
    pub const MAX_NAME_LEN: usize = 16;
    /// Score awarded per kill
    pub const KILL_SCORE: u32 = 50;
    /// Base gold per natural kill (before the wave bonus)
    pub const KILL_GOLD_BASE: u32 = 3;
}

/// Turret aiming
pub mod aim {
    /// Maximum deviation from straight up (80 degrees)
    pub const MAX_AIM_ANGLE: f32 = 80.0 * std::f32::consts::PI / 180.0;
    /// Straight up, in atan2 convention
    pub const STRAIGHT_UP: f32 = -std::f32::consts::FRAC_PI_2;
    /// Base targeting radius, scaled by the firer's range multiplier
    pub const TARGET_RANGE: f32 = 600.0;
}

/// Player bullets
pub mod bullet {
    pub const RADIUS: f32 = 2.5;
    pub const SPEED: f32 = 175.0;
    /// Seconds between player shots before fire-rate upgrades
    pub const COOLDOWN: f32 = 0.72;
    pub const DAMAGE: f32 = 1.25;
    /// Seconds before a bullet expires
    pub const LIFESPAN: f32 = 6.0;
    /// Bullets spawn slightly above the turret
    pub const SPAWN_OFFSET_Y: f32 = 6.0;
    /// Multishot fan step per layer (10 degrees)
    pub const FAN_STEP: f32 = 10.0 * std::f32::consts::PI / 180.0;
    pub const CRIT_MULTIPLIER: f32 = 3.0;
    /// Homing detection radius
    pub const HOMING_RADIUS: f32 = 400.0;
    /// Homing steering acceleration per second
    pub const HOMING_STRENGTH: f32 = 1500.0;
    /// Homing bullets are renormalized to SPEED * this factor
    pub const HOMING_SPEED_FACTOR: f32 = 1.2;
}

/// Explosions, chain lightning, splash
pub mod blast {
    /// Base splash radius for explosive bullets
    pub const SPLASH_BASE_RADIUS: f32 = 20.0;
    /// Extra splash radius per explosive level
    pub const SPLASH_RADIUS_PER_LEVEL: f32 = 8.0;
    /// Fraction of the hit damage dealt as splash
    pub const SPLASH_FRACTION: f32 = 0.5;
    /// Chain lightning jump range
    pub const CHAIN_RANGE: f32 = 70.0;
    /// Chain lightning damage
    pub const CHAIN_DAMAGE: f32 = 1.0;
    /// Bomber ground detonation radius
    pub const BOMBER_RADIUS: f32 = 60.0;
    /// Particles per explosion
    pub const PARTICLE_COUNT: usize = 12;
    /// Damage numbers drift upward at this speed
    pub const DAMAGE_NUMBER_RISE: f32 = 40.0;
    /// Damage numbers disappear after this many seconds
    pub const DAMAGE_NUMBER_TTL: f32 = 0.8;
}

/// Asteroid generation and movement
pub mod asteroid {
    pub const SMALL_RADIUS: (f32, f32) = (8.0, 10.0);
    pub const MEDIUM_RADIUS: (f32, f32) = (11.0, 14.0);
    pub const LARGE_RADIUS: (f32, f32) = (15.0, 16.0);
    pub const SMALL_BASE_HP: f32 = 0.75;
    pub const MEDIUM_BASE_HP: f32 = 1.5;
    pub const LARGE_BASE_HP: f32 = 3.0;
    /// Keep spawns this far from the lane walls
    pub const SPAWN_MARGIN: f32 = 20.0;
    /// Horizontal drift range
    pub const VX_RANGE: (f32, f32) = (-15.0, 15.0);
    /// Fall speed range
    pub const VY_RANGE: (f32, f32) = (30.0, 50.0);
    /// Spin range in radians per second
    pub const SPIN_RANGE: (f32, f32) = (-2.0, 2.0);
    /// Slowfield movement multiplier
    pub const SLOWFIELD_MULT: f32 = 0.75;
    /// Phasing asteroids are invulnerable while sin(t * FREQ) > THRESHOLD
    pub const PHASE_FREQ: f32 = 4.0;
    pub const PHASE_THRESHOLD: f32 = 0.5;
    /// Chance that a phased asteroid ignores a collision check
    pub const PHASE_EVADE_CHANCE: f64 = 0.7;
    /// Polygon outline vertex count range (inclusive)
    pub const SHAPE_POINTS: (usize, usize) = (10, 14);
    /// Split children
    pub const CHILD_RADIUS: f32 = 6.0;
    pub const CHILD_SPREAD_X: f32 = 30.0;
    pub const CHILD_SPREAD_Y: f32 = 20.0;
    pub const CHILD_BASE_HP: f32 = 1.0;
    pub const CHILD_HP_SCALE: f32 = 0.4;
}

/// FTL entry
pub mod ftl {
    pub const VERTICAL_MULT: f32 = 8.0;
    pub const HORIZONTAL_MULT: f32 = 0.3;
    pub const SPIN_MULT: f32 = 3.0;
    pub const THRESHOLD_RANGE: (f32, f32) = (30.0, 100.0);
}

/// Wave composition and pacing
pub mod wave {
    pub const BASE_COUNT: u32 = 3;
    pub const COUNT_SCALE: f32 = 2.0;
    /// HP added per wave to natural asteroids
    pub const HP_SCALE: f32 = 0.8;
    pub const LARGE_CHANCE_BASE: f32 = 0.15;
    pub const LARGE_CHANCE_PER_WAVE: f32 = 0.015;
    pub const LARGE_CHANCE_CAP: f32 = 0.30;
    pub const MEDIUM_CHANCE: f32 = 0.35;
    /// Seconds between spawn bursts, plus or minus SPAWN_JITTER
    pub const SPAWN_INTERVAL: f32 = 0.3;
    pub const SPAWN_JITTER: f32 = 0.1;
    /// Chance a spawn burst releases two asteroids
    pub const DOUBLE_SPAWN_CHANCE: f64 = 0.3;
    /// Waves from which asteroids fall faster
    pub const SPEED_BONUS_FROM: u32 = 5;
    pub const SPEED_BONUS_PER_WAVE: f32 = 0.02;
    /// Debounce before an empty field counts as cleared
    pub const CLEAR_DELAY_MS: u64 = 1000;
}

/// Upgrade phase
pub mod upgrade {
    /// Cards offered per round
    pub const OPTION_COUNT: usize = 3;
    /// Time to pick before auto-pick kicks in
    pub const TIMEOUT_MS: u64 = 10_000;
    /// Reroll cost is floor(BASE * GROWTH^n)
    pub const REROLL_BASE_COST: f32 = 10.0;
    pub const REROLL_GROWTH: f32 = 1.5;
}

/// Towers
pub mod tower {
    pub const SLOTS: usize = 4;
    pub const MAX_LEVEL: u8 = 5;
    /// Tower x offset within the lane
    pub const FIRST_X: f32 = 60.0;
    pub const SPACING_X: f32 = 80.0;
    /// Towers sit above the ground line
    pub const HEIGHT: f32 = 30.0;
    /// Damage bonus per level above 1
    pub const DAMAGE_PER_LEVEL: f32 = 0.25;
    /// Fire-rate bonus per level above 1
    pub const RATE_PER_LEVEL: f32 = 0.1;
    /// Fraction of invested gold returned on sale
    pub const SELL_REFUND: f32 = 0.5;
}
