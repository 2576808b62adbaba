pub mod bridge;
pub mod catalog;
pub mod common;
pub mod configs;
pub mod control;
pub mod node;
pub mod player;
pub mod protocol;
pub mod server;
pub mod session;
pub mod settings;
pub mod transport;
