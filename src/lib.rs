//! Signal Bot: guided Telegram signal broadcaster.

pub mod bot;
pub mod channels;
pub mod config;
pub mod delivery;
pub mod error;
pub mod health;
pub mod wizard;
