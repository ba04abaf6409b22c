//! Bot sign-in and identity. Delegates to the AuthPort adapter.

use crate::domain::DomainError;
use crate::ports::AuthPort;
use std::sync::Arc;
use tracing::info;

pub struct AuthService {
    auth: Arc<dyn AuthPort>,
    api_hash: String,
}

impl AuthService {
    pub fn new(auth: Arc<dyn AuthPort>, api_hash: String) -> Self {
        Self { auth, api_hash }
    }

    /// Sign in with the bot token unless the session is already authorized, then settle the
    /// bot username used to accept `/cmd@name` commands.
    ///
    /// A configured username wins; otherwise the one reported by sign-in, otherwise `get_me`.
    pub async fn sign_in_bot(
        &self,
        token: &str,
        configured_username: Option<&str>,
    ) -> Result<Option<String>, DomainError> {
        let mut reported = None;
        if self.auth.is_authenticated().await? {
            info!("session already authorized");
        } else {
            if token.is_empty() {
                return Err(DomainError::Config(
                    "Set MENTIONS_BOT_BOT_TOKEN (env or .env). Get it from @BotFather".into(),
                ));
            }
            reported = self.auth.bot_sign_in(token, &self.api_hash).await?;
            info!("signed in as bot");
        }

        let username = match configured_username {
            Some(name) if !name.trim().is_empty() => {
                Some(name.trim().trim_start_matches('@').to_string())
            }
            _ => match reported {
                Some(name) => Some(name),
                None => self.auth.bot_username().await?,
            },
        };
        info!(username = ?username, "bot identity resolved");
        Ok(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeAuth {
        authorized: bool,
        sign_ins: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl AuthPort for FakeAuth {
        async fn is_authenticated(&self) -> Result<bool, DomainError> {
            Ok(self.authorized)
        }

        async fn bot_sign_in(
            &self,
            token: &str,
            api_hash: &str,
        ) -> Result<Option<String>, DomainError> {
            self.sign_ins
                .lock()
                .unwrap()
                .push((token.to_string(), api_hash.to_string()));
            Ok(Some("from_sign_in_bot".into()))
        }

        async fn bot_username(&self) -> Result<Option<String>, DomainError> {
            Ok(Some("from_get_me_bot".into()))
        }
    }

    #[tokio::test]
    async fn test_signs_in_when_unauthorized() {
        let auth = Arc::new(FakeAuth::default());
        let service = AuthService::new(auth.clone(), "hash".into());
        let username = service.sign_in_bot("123:abc", None).await.unwrap();
        assert_eq!(username.as_deref(), Some("from_sign_in_bot"));
        assert_eq!(
            *auth.sign_ins.lock().unwrap(),
            vec![("123:abc".to_string(), "hash".to_string())]
        );
    }

    #[tokio::test]
    async fn test_existing_session_uses_get_me() {
        let auth = Arc::new(FakeAuth {
            authorized: true,
            ..Default::default()
        });
        let service = AuthService::new(auth.clone(), "hash".into());
        let username = service.sign_in_bot("", None).await.unwrap();
        assert_eq!(username.as_deref(), Some("from_get_me_bot"));
        assert!(auth.sign_ins.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configured_username_wins() {
        let service = AuthService::new(Arc::new(FakeAuth::default()), "hash".into());
        let username = service.sign_in_bot("t", Some("@My_Bot")).await.unwrap();
        assert_eq!(username.as_deref(), Some("My_Bot"));
    }

    #[tokio::test]
    async fn test_missing_token_is_config_error() {
        let service = AuthService::new(Arc::new(FakeAuth::default()), "hash".into());
        let err = service.sign_in_bot("", None).await.unwrap_err();
        assert!(matches!(err, DomainError::Config(_)));
    }
}
