//! Implements AuthPort using grammers Client.
//!
//! Holds a client clone (same session as the gateway and the update loop).

use crate::domain::DomainError;
use crate::ports::AuthPort;
use async_trait::async_trait;
use grammers_client::{Client, SignInError};

/// Auth adapter. Wraps grammers Client for bot sign-in.
pub struct GrammersAuthAdapter {
    client: Client,
}

impl GrammersAuthAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthPort for GrammersAuthAdapter {
    async fn is_authenticated(&self) -> Result<bool, DomainError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| DomainError::Auth(e.to_string()))
    }

    async fn bot_sign_in(&self, token: &str, api_hash: &str) -> Result<Option<String>, DomainError> {
        match self.client.bot_sign_in(token, api_hash).await {
            Ok(user) => Ok(user.username().map(String::from)),
            Err(SignInError::InvalidCode) => Err(DomainError::Auth(
                "Bot token rejected. Check MENTIONS_BOT_BOT_TOKEN.".into(),
            )),
            Err(e) => Err(DomainError::Auth(format!("bot sign in: {e}"))),
        }
    }

    async fn bot_username(&self) -> Result<Option<String>, DomainError> {
        let me = self
            .client
            .get_me()
            .await
            .map_err(|e| DomainError::Auth(format!("get_me: {e}")))?;
        Ok(me.username().map(String::from))
    }
}
