pub mod combat;
pub mod effects;
pub mod physics;
pub mod spawner;
pub mod targeting;
pub mod towers;
