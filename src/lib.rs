//! mentions-bot: Telegram bot that mentions whole groups of chat members, with Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
