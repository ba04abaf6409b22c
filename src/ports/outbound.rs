//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    AliasId, Chat, ChatAdministrator, ChatId, Command, DomainError, GroupAlias, GroupId,
    GroupName, InlineButton, Member, MemberName, UserId,
};

/// Messaging gateway. Administrator rosters, replies, keyboards, command publishing.
#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    /// Current administrator roster of a chat. Not cached: every call may hit the network.
    async fn fetch_chat_administrators(
        &self,
        chat_id: ChatId,
    ) -> Result<Vec<ChatAdministrator>, DomainError>;

    /// Send an HTML-formatted reply to `reply_to` in `chat_id`.
    async fn send_reply(&self, chat_id: ChatId, reply_to: i32, text: &str)
    -> Result<(), DomainError>;

    /// HTML reply carrying an inline keyboard, one button per row.
    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        reply_to: i32,
        text: &str,
        buttons: &[InlineButton],
    ) -> Result<(), DomainError>;

    /// Answer a button press. `alert` shows a popup instead of a short notice.
    async fn answer_callback(
        &self,
        query_id: i64,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), DomainError>;

    /// Replace the text of a bot message; its keyboard goes away.
    async fn edit_message(&self, chat_id: ChatId, message_id: i32, text: &str)
    -> Result<(), DomainError>;

    async fn delete_message(&self, chat_id: ChatId, message_id: i32) -> Result<(), DomainError>;

    /// Publish the command list (every key with its description).
    async fn register_commands(&self, commands: &[Command]) -> Result<(), DomainError>;
}

/// Bot authorization against the transport.
#[async_trait::async_trait]
pub trait AuthPort: Send + Sync {
    /// Check whether the session is already authorized.
    async fn is_authenticated(&self) -> Result<bool, DomainError>;

    /// Sign in with a bot token. Returns the bot username when the server reports one.
    async fn bot_sign_in(&self, token: &str, api_hash: &str)
    -> Result<Option<String>, DomainError>;

    /// Username of the signed-in bot.
    async fn bot_username(&self) -> Result<Option<String>, DomainError>;
}

/// Repository port. Lock-free reads for listing plus transactions for everything else.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Open a transaction. Dropping the handle without `commit` discards its writes.
    async fn begin(&self) -> Result<Box<dyn RepoTx>, DomainError>;

    /// Anarchy flag of a chat. A chat without a stored row reads as `false`.
    async fn get_anarchy_flag(&self, chat_id: ChatId) -> Result<bool, DomainError>;

    async fn list_aliases_by_chat(&self, chat_id: ChatId) -> Result<Vec<GroupAlias>, DomainError>;

    async fn find_alias_by_name(
        &self,
        chat_id: ChatId,
        name: &GroupName,
    ) -> Result<Option<GroupAlias>, DomainError>;

    async fn list_members_by_group(&self, group_id: GroupId) -> Result<Vec<Member>, DomainError>;

    /// Members of every group in the chat, duplicates included.
    async fn list_members_by_chat(&self, chat_id: ChatId) -> Result<Vec<Member>, DomainError>;
}

/// Transaction-scoped repository handle. All reads observe one snapshot.
#[async_trait::async_trait]
pub trait RepoTx: Send {
    /// Insert the chat or refresh its title/username. Keeps the anarchy flag.
    async fn upsert_chat(&mut self, chat: &Chat) -> Result<(), DomainError>;

    /// Serialize with other writers of the same chat until commit/rollback.
    async fn lock_chat_for_update(&mut self, chat_id: ChatId) -> Result<(), DomainError>;

    async fn list_aliases_by_chat(&mut self, chat_id: ChatId)
    -> Result<Vec<GroupAlias>, DomainError>;

    async fn list_aliases_by_group(
        &mut self,
        group_id: GroupId,
    ) -> Result<Vec<GroupAlias>, DomainError>;

    async fn find_alias_by_name(
        &mut self,
        chat_id: ChatId,
        name: &GroupName,
    ) -> Result<Option<GroupAlias>, DomainError>;

    async fn create_group(&mut self, chat_id: ChatId) -> Result<GroupId, DomainError>;

    async fn delete_group(&mut self, group_id: GroupId) -> Result<(), DomainError>;

    async fn create_alias(
        &mut self,
        chat_id: ChatId,
        group_id: GroupId,
        name: &GroupName,
    ) -> Result<(), DomainError>;

    async fn delete_alias(&mut self, alias_id: AliasId) -> Result<(), DomainError>;

    async fn list_members_by_group(&mut self, group_id: GroupId)
    -> Result<Vec<Member>, DomainError>;

    /// Insert, ignoring a conflicting row.
    async fn add_member(&mut self, group_id: GroupId, member: &Member) -> Result<(), DomainError>;

    async fn remove_member_by_name(
        &mut self,
        group_id: GroupId,
        name: &MemberName,
    ) -> Result<(), DomainError>;

    async fn remove_member_by_user_id(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<(), DomainError>;

    /// Remove from every group of the chat.
    async fn remove_chat_member_by_name(
        &mut self,
        chat_id: ChatId,
        name: &MemberName,
    ) -> Result<(), DomainError>;

    /// Remove from every group of the chat.
    async fn remove_chat_member_by_user_id(
        &mut self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<(), DomainError>;

    async fn set_chat_member_enabled_by_name(
        &mut self,
        chat_id: ChatId,
        name: &MemberName,
        enabled: bool,
    ) -> Result<(), DomainError>;

    async fn set_chat_member_enabled_by_user_id(
        &mut self,
        chat_id: ChatId,
        user_id: UserId,
        enabled: bool,
    ) -> Result<(), DomainError>;

    async fn set_anarchy_flag(&mut self, chat_id: ChatId, enabled: bool)
    -> Result<(), DomainError>;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}
