//! Access control: grant -> short-circuiting rule chain.
//!
//! Rules are evaluated lazily in order; the first one that allows wins. The admin
//! roster and the anarchy flag are re-read on every check.

use crate::domain::{DomainError, Grant, IncomingMessage};
use crate::ports::{ChatGateway, Repository};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Always,
    PrivateChat,
    OwnerOrAdmin,
    Anarchy,
}

/// Anarchy relaxes write access only; chat settings stay with owners and admins.
fn rules(grant: Grant) -> &'static [Rule] {
    match grant {
        Grant::ReadAccess => &[Rule::Always],
        Grant::WriteAccess => &[Rule::PrivateChat, Rule::OwnerOrAdmin, Rule::Anarchy],
        Grant::ChangeChatSettings => &[Rule::PrivateChat, Rule::OwnerOrAdmin],
    }
}

pub struct AccessControl {
    gateway: Arc<dyn ChatGateway>,
    repo: Arc<dyn Repository>,
}

impl AccessControl {
    pub fn new(gateway: Arc<dyn ChatGateway>, repo: Arc<dyn Repository>) -> Self {
        Self { gateway, repo }
    }

    /// Ok when some rule of `grant` allows the sender, `Authorization` otherwise.
    /// Gateway and repository failures propagate unchanged.
    pub async fn check(&self, grant: Grant, msg: &IncomingMessage) -> Result<(), DomainError> {
        for &rule in rules(grant) {
            if self.allows(rule, msg).await? {
                debug!(chat_id = %msg.chat.id, ?grant, ?rule, "access granted");
                return Ok(());
            }
        }
        Err(DomainError::Authorization(format!(
            "grant=[{grant:?}], chat=[{}], sender=[{:?}]",
            msg.chat.id, msg.sender_id
        )))
    }

    async fn allows(&self, rule: Rule, msg: &IncomingMessage) -> Result<bool, DomainError> {
        match rule {
            Rule::Always => Ok(true),
            Rule::PrivateChat => Ok(msg.chat.is_private()),
            Rule::OwnerOrAdmin => {
                let Some(sender) = msg.sender_id else {
                    return Ok(false);
                };
                let admins = self.gateway.fetch_chat_administrators(msg.chat.id).await?;
                Ok(admins
                    .iter()
                    .any(|a| a.user_id == sender && (a.is_owner || a.is_admin)))
            }
            Rule::Anarchy => self.repo.get_anarchy_flag(msg.chat.id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::memory_repo::MemoryRepo;
    use crate::domain::{Chat, ChatAdministrator, ChatId, UserId};
    use crate::usecases::test_support::{
        RecordingGateway, admin, message_from, private_chat, supergroup,
    };

    async fn set_anarchy(repo: &MemoryRepo, chat_id: i64, enabled: bool) {
        let mut tx = repo.begin().await.unwrap();
        tx.upsert_chat(&Chat {
            id: ChatId(chat_id),
            title: None,
            username: None,
            is_anarchy_enabled: false,
        })
        .await
        .unwrap();
        tx.set_anarchy_flag(ChatId(chat_id), enabled).await.unwrap();
        tx.commit().await.unwrap();
    }

    fn setup(gateway: RecordingGateway) -> (AccessControl, Arc<RecordingGateway>, MemoryRepo) {
        let gateway = Arc::new(gateway);
        let repo = MemoryRepo::new();
        let access = AccessControl::new(gateway.clone(), Arc::new(repo.clone()));
        (access, gateway, repo)
    }

    #[tokio::test]
    async fn test_read_access_never_fetches_admins() {
        let (access, gateway, _) = setup(RecordingGateway::default());
        let msg = message_from(supergroup(-1), 5, "/groups", &[]);
        access.check(Grant::ReadAccess, &msg).await.unwrap();
        assert_eq!(gateway.admin_fetches(), 0);
    }

    #[tokio::test]
    async fn test_private_chat_short_circuits() {
        let (access, gateway, _) = setup(RecordingGateway::default());
        let msg = message_from(private_chat(5), 5, "/enable_anarchy", &[]);
        access
            .check(Grant::ChangeChatSettings, &msg)
            .await
            .unwrap();
        assert_eq!(gateway.admin_fetches(), 0);
    }

    #[tokio::test]
    async fn test_admin_and_owner_allowed() {
        let owner = ChatAdministrator {
            user_id: UserId(9),
            is_owner: true,
            is_admin: false,
        };
        let (access, _, _) = setup(RecordingGateway::with_admins(vec![admin(5), owner]));
        for sender in [5, 9] {
            let msg = message_from(supergroup(-1), sender, "/add_group devs", &[]);
            access.check(Grant::WriteAccess, &msg).await.unwrap();
            access
                .check(Grant::ChangeChatSettings, &msg)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_write_access_denied_without_anarchy() {
        let (access, _, _) = setup(RecordingGateway::with_admins(vec![admin(5)]));
        let msg = message_from(supergroup(-1), 6, "/add_group devs", &[]);
        let err = access.check(Grant::WriteAccess, &msg).await.unwrap_err();
        assert!(matches!(err, DomainError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_write_access_allowed_with_anarchy() {
        let (access, _, repo) = setup(RecordingGateway::with_admins(vec![admin(5)]));
        set_anarchy(&repo, -1, true).await;
        let msg = message_from(supergroup(-1), 6, "/add_group devs", &[]);
        access.check(Grant::WriteAccess, &msg).await.unwrap();
    }

    #[tokio::test]
    async fn test_anarchy_does_not_relax_chat_settings() {
        let (access, _, repo) = setup(RecordingGateway::with_admins(vec![admin(5)]));
        set_anarchy(&repo, -1, true).await;
        let msg = message_from(supergroup(-1), 6, "/disable_anarchy", &[]);
        let err = access
            .check(Grant::ChangeChatSettings, &msg)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_gateway_failure_propagates() {
        let (access, _, _) = setup(RecordingGateway {
            fail_admin_fetch: true,
            ..Default::default()
        });
        let msg = message_from(supergroup(-1), 6, "/add_group devs", &[]);
        let err = access.check(Grant::WriteAccess, &msg).await.unwrap_err();
        assert!(matches!(err, DomainError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_roster_fetched_on_every_check() {
        let (access, gateway, _) = setup(RecordingGateway::with_admins(vec![admin(5)]));
        let msg = message_from(supergroup(-1), 5, "/add_group devs", &[]);
        access.check(Grant::WriteAccess, &msg).await.unwrap();
        access.check(Grant::WriteAccess, &msg).await.unwrap();
        assert_eq!(gateway.admin_fetches(), 2);
    }
}
