pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod interaction;
pub mod keep_alive;
pub mod order;
pub mod platform;
pub mod service;
pub mod state;
pub mod telegram;
pub mod ticket;
pub mod util;
