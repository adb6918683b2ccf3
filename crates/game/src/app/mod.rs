pub(crate) mod bootstrap;
pub(crate) mod loop_runner;
mod session_config;
mod world_game;
