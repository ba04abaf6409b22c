//! Domain entities. Pure data structures for the core business.
//!
//! No Telegram/IO types here — these are mapped from adapters.

use crate::domain::names::{GroupName, MemberName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Telegram chat id in Bot API form (negative for groups and supergroups).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Store-generated group id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub i64);

/// Store-generated alias id. Older aliases have smaller ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AliasId(pub i64);

/// Telegram account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

macro_rules! display_inner {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        })*
    };
}

display_inner!(ChatId, GroupId, AliasId, UserId);

/// Persisted chat row. Created on first administrative interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub title: Option<String>,
    pub username: Option<String>,
    pub is_anarchy_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

/// One name of a group. The oldest alias is the group's canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAlias {
    pub chat_id: ChatId,
    pub group_id: GroupId,
    pub alias_id: AliasId,
    pub alias_name: GroupName,
}

/// Listing projection: canonical name plus the remaining aliases, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupWithAliases {
    pub group_id: GroupId,
    pub group_name: GroupName,
    pub alias_names: Vec<GroupName>,
}

/// A group member. `user_id` is known only for members added via a text mention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub name: MemberName,
    pub user_id: Option<UserId>,
    /// Muted members stay in the group but are skipped when calling it.
    pub enabled: bool,
}

impl Member {
    pub fn new(name: MemberName, user_id: Option<UserId>) -> Self {
        Self {
            name,
            user_id,
            enabled: true,
        }
    }

    /// Same person: by user id when both sides carry one, else by name.
    pub fn is_same_person(&self, other: &Member) -> bool {
        match (self.user_id, other.user_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.name == other.name,
        }
    }

    /// Identity used for de-duplication of parsed member sets.
    pub fn key(&self) -> MemberKey {
        match self.user_id {
            Some(id) => MemberKey::UserId(id),
            None => MemberKey::Name(self.name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKey {
    UserId(UserId),
    Name(MemberName),
}

/// Administrator roster entry as reported by the messaging gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatAdministrator {
    pub user_id: UserId,
    pub is_owner: bool,
    pub is_admin: bool,
}

/// Chat metadata attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatInfo {
    pub id: ChatId,
    pub kind: ChatType,
    pub title: Option<String>,
    pub username: Option<String>,
}

impl ChatInfo {
    pub fn is_private(&self) -> bool {
        self.kind == ChatType::Private
    }
}

/// Annotated span of a message. Offsets and lengths are UTF-16 code units, as Telegram sends them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntity {
    pub offset: usize,
    pub length: usize,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    BotCommand,
    /// `@username` mention (name only).
    Mention,
    /// Mention bound to a resolved account.
    TextMention { user_id: UserId },
    Other,
}

/// Inbound message projected from the transport. Text holds the caption for media messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub message_id: i32,
    pub chat: ChatInfo,
    pub sender_id: Option<UserId>,
    pub text: String,
    pub entities: Vec<MessageEntity>,
    pub is_forwarded: bool,
    pub reply_to_message_id: Option<i32>,
}

/// Button of an inline keyboard. `data` comes back in the callback query when pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub data: String,
}

/// Press of an inline keyboard button under one of the bot's messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCallback {
    pub query_id: i64,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    /// The bot message carrying the keyboard.
    pub message_id: i32,
    pub data: Vec<u8>,
}

impl IncomingMessage {
    /// Literal text covered by an entity, or None when the span is out of range.
    pub fn entity_text(&self, entity: &MessageEntity) -> Option<String> {
        let units: Vec<u16> = self.text.encode_utf16().collect();
        let end = entity.offset.checked_add(entity.length)?;
        let span = units.get(entity.offset..end)?;
        String::from_utf16(span).ok()
    }
}
