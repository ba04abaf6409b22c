//! Infrastructure adapters. Implement outbound ports.
//!
//! Telegram transport and persistence. Map errors to DomainError.

pub mod persistence;
pub mod telegram;
