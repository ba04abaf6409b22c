//! Inbound port. The transport (adapter) calls into the application.

use crate::domain::DomainError;

/// Input port: pumps inbound chat updates into the dispatcher.
#[async_trait::async_trait]
pub trait InputPort: Send + Sync {
    /// Receive updates until the transport closes.
    async fn run(&self) -> Result<(), DomainError>;
}
