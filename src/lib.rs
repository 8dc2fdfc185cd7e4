// Public API for the CLI and integration tests

pub mod api;
pub mod channel;
pub mod config;
pub mod editor;
pub mod host;
pub mod lobby;
pub mod player;
pub mod podium;
pub mod protocol;
pub mod session;
pub mod types;
