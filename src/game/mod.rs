pub mod constants;
pub mod game_loop;
pub mod input_buffer;
pub mod match_result;
pub mod phase;
pub mod state;
pub mod systems;
pub mod upgrades;
