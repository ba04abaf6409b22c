//! Payload of the group-picker keyboard (`/xcall`).
//!
//! Telegram caps callback data at 64 bytes, so the payload is a compact
//! `x:<kind>:<chat>:<user>[:<group>]` string rather than a serialized struct.

use crate::domain::entities::{ChatId, GroupId, UserId};

pub const MAX_CALLBACK_DATA_LEN: usize = 64;

const PREFIX: &str = "x";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    Cancel,
    SelectGroup(GroupId),
}

/// Who opened the picker, where, and which button was pressed.
/// Only the user who opened it may press its buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickerCallback {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub action: PickerAction,
}

impl PickerCallback {
    pub fn encode(&self) -> String {
        match self.action {
            PickerAction::Cancel => format!("{PREFIX}:c:{}:{}", self.chat_id, self.user_id),
            PickerAction::SelectGroup(group_id) => {
                format!("{PREFIX}:g:{}:{}:{group_id}", self.chat_id, self.user_id)
            }
        }
    }

    /// None for data this bot did not produce.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(data).ok()?;
        let mut parts = text.split(':');
        if parts.next()? != PREFIX {
            return None;
        }
        let kind = parts.next()?;
        let chat_id = ChatId(parts.next()?.parse().ok()?);
        let user_id = UserId(parts.next()?.parse().ok()?);
        let action = match kind {
            "c" => PickerAction::Cancel,
            "g" => PickerAction::SelectGroup(GroupId(parts.next()?.parse().ok()?)),
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            chat_id,
            user_id,
            action,
        })
    }

    /// True when the press comes from the user who opened the picker, in the same chat.
    pub fn is_owned_by(&self, chat_id: ChatId, user_id: UserId) -> bool {
        self.chat_id == chat_id && self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_select_group() {
        let data = b"x:g:-1001234567890:77:12";
        assert_eq!(
            PickerCallback::decode(data),
            Some(PickerCallback {
                chat_id: ChatId(-1001234567890),
                user_id: UserId(77),
                action: PickerAction::SelectGroup(GroupId(12)),
            })
        );
    }

    #[test]
    fn test_decode_rejects_foreign_data() {
        for data in [
            &b""[..],
            b"x:c:1",
            b"x:q:1:2",
            b"x:g:1:2",
            b"x:c:1:2:3",
            b"y:c:1:2",
            b"x:c:abc:2",
            &[0xff, 0xfe],
        ] {
            assert_eq!(PickerCallback::decode(data), None, "{data:?}");
        }
    }

    #[test]
    fn test_largest_payload_fits_telegram_limit() {
        let callback = PickerCallback {
            chat_id: ChatId(-1_009_999_999_999_999),
            user_id: UserId(9_999_999_999_999),
            action: PickerAction::SelectGroup(GroupId(i64::MAX)),
        };
        let data = callback.encode();
        assert!(data.len() <= MAX_CALLBACK_DATA_LEN, "{data}");
        assert_eq!(PickerCallback::decode(data.as_bytes()), Some(callback));
    }

    #[test]
    fn test_ownership() {
        let callback = PickerCallback {
            chat_id: ChatId(-5),
            user_id: UserId(1),
            action: PickerAction::Cancel,
        };
        assert!(callback.is_owned_by(ChatId(-5), UserId(1)));
        assert!(!callback.is_owned_by(ChatId(-5), UserId(2)));
        assert!(!callback.is_owned_by(ChatId(-6), UserId(1)));
    }
}
