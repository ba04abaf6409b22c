//! Telegram transport (grammers, bot account).

pub mod auth_adapter;
pub mod client;
pub mod mapper;
pub mod session;
pub mod updates;

pub use auth_adapter::GrammersAuthAdapter;
pub use client::{GrammersChatGateway, PeerCache};
pub use updates::GrammersUpdateLoop;
