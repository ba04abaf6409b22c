//! Map grammers types to domain entities.
//!
//! Extracts IncomingMessage, IncomingCallback and ChatInfo from grammers_client tl types.

use crate::domain::{
    ChatAdministrator, ChatId, ChatInfo, ChatType, EntityKind, IncomingCallback, IncomingMessage,
    MessageEntity, UserId,
};
use grammers_client::peer::Peer;
use grammers_client::tl;

/// Bot API offset of supergroup and channel ids.
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// Map a grammers Peer to domain ChatType.
///
/// * `Peer::User` → Private (DM).
/// * `Peer::Group` → Group or Supergroup (Supergroup when megagroup).
/// * `Peer::Channel` → Channel (broadcast).
pub fn chat_type_from_peer(peer: &Peer) -> ChatType {
    match peer {
        Peer::User(_) => ChatType::Private,
        Peer::Group(g) => {
            if g.is_megagroup() {
                ChatType::Supergroup
            } else {
                ChatType::Group
            }
        }
        Peer::Channel(_) => ChatType::Channel,
    }
}

pub fn chat_info_from_peer(peer: &Peer) -> ChatInfo {
    ChatInfo {
        id: ChatId(peer.id().bot_api_dialog_id()),
        kind: chat_type_from_peer(peer),
        title: peer.name().map(String::from),
        username: peer.username().map(String::from),
    }
}

/// Bot API chat id: users positive, basic groups negated, channels offset by -10^12.
pub fn chat_id_from_peer(peer: &tl::enums::Peer) -> ChatId {
    match peer {
        tl::enums::Peer::User(u) => ChatId(u.user_id),
        tl::enums::Peer::Chat(c) => ChatId(-c.chat_id),
        tl::enums::Peer::Channel(c) => ChatId(-CHANNEL_ID_OFFSET - c.channel_id),
    }
}

/// Chat metadata from the raw peer alone (no title). `post` marks broadcast channel posts.
fn chat_info_from_raw(peer: &tl::enums::Peer, post: bool) -> ChatInfo {
    let kind = match peer {
        tl::enums::Peer::User(_) => ChatType::Private,
        tl::enums::Peer::Chat(_) => ChatType::Group,
        tl::enums::Peer::Channel(_) if post => ChatType::Channel,
        tl::enums::Peer::Channel(_) => ChatType::Supergroup,
    };
    ChatInfo {
        id: chat_id_from_peer(peer),
        kind,
        title: None,
        username: None,
    }
}

/// Only the annotation kinds the parser reads are kept; offsets stay in UTF-16 units.
pub fn entity_to_domain(entity: &tl::enums::MessageEntity) -> Option<MessageEntity> {
    let (offset, length, kind) = match entity {
        tl::enums::MessageEntity::BotCommand(e) => (e.offset, e.length, EntityKind::BotCommand),
        tl::enums::MessageEntity::Mention(e) => (e.offset, e.length, EntityKind::Mention),
        tl::enums::MessageEntity::MentionName(e) => (
            e.offset,
            e.length,
            EntityKind::TextMention {
                user_id: UserId(e.user_id),
            },
        ),
        _ => return None,
    };
    Some(MessageEntity {
        offset: usize::try_from(offset).ok()?,
        length: usize::try_from(length).ok()?,
        kind,
    })
}

/// Map a raw incoming message to the domain. Outgoing, empty and service messages are skipped.
/// `chat` replaces the raw-derived chat metadata when the peer is known to the session.
pub fn message_to_domain(
    msg: &tl::enums::Message,
    chat: Option<ChatInfo>,
) -> Option<IncomingMessage> {
    let m = match msg {
        tl::enums::Message::Message(m) => m,
        tl::enums::Message::Empty(_) | tl::enums::Message::Service(_) => return None,
    };
    if m.out {
        return None;
    }

    // In private chats with a bot `from_id` is unset; the peer is the sender.
    let sender_id = m
        .from_id
        .as_ref()
        .or(Some(&m.peer_id))
        .and_then(|p| match p {
            tl::enums::Peer::User(u) => Some(UserId(u.user_id)),
            _ => None,
        });

    let entities = m
        .entities
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(entity_to_domain)
        .collect();

    let reply_to_message_id = m
        .reply_to
        .as_ref()
        .and_then(|r| match r {
            tl::enums::MessageReplyHeader::Header(h) => Some(h.reply_to_msg_id),
            _ => None,
        })
        .flatten();

    Some(IncomingMessage {
        message_id: m.id,
        chat: chat.unwrap_or_else(|| chat_info_from_raw(&m.peer_id, m.post)),
        sender_id,
        text: m.message.clone(),
        entities,
        is_forwarded: m.fwd_from.is_some(),
        reply_to_message_id,
    })
}

/// Creator and admin rows of `channels.getParticipants`; everyone else is dropped.
pub fn channel_admins(participants: &[tl::enums::ChannelParticipant]) -> Vec<ChatAdministrator> {
    participants
        .iter()
        .filter_map(|p| match p {
            tl::enums::ChannelParticipant::Creator(c) => Some(ChatAdministrator {
                user_id: UserId(c.user_id),
                is_owner: true,
                is_admin: false,
            }),
            tl::enums::ChannelParticipant::Admin(a) => Some(ChatAdministrator {
                user_id: UserId(a.user_id),
                is_owner: false,
                is_admin: true,
            }),
            _ => None,
        })
        .collect()
}

/// Button press under a chat message. Missing data (game buttons) maps to an empty payload.
pub fn callback_to_domain(raw: &tl::types::UpdateBotCallbackQuery) -> IncomingCallback {
    IncomingCallback {
        query_id: raw.query_id,
        chat_id: chat_id_from_peer(&raw.peer),
        sender_id: UserId(raw.user_id),
        message_id: raw.msg_id,
        data: raw.data.clone().unwrap_or_default(),
    }
}

/// Creator and admin rows of a basic group's participant list.
pub fn chat_admins(participants: &[tl::enums::ChatParticipant]) -> Vec<ChatAdministrator> {
    participants
        .iter()
        .filter_map(|p| match p {
            tl::enums::ChatParticipant::Creator(c) => Some(ChatAdministrator {
                user_id: UserId(c.user_id),
                is_owner: true,
                is_admin: false,
            }),
            tl::enums::ChatParticipant::Admin(a) => Some(ChatAdministrator {
                user_id: UserId(a.user_id),
                is_owner: false,
                is_admin: true,
            }),
            _ => None,
        })
        .collect()
}
