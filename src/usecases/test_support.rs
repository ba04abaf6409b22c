//! Test doubles shared by the use case tests.

use crate::domain::{
    ChatAdministrator, ChatId, ChatInfo, ChatType, Command, DomainError, EntityKind,
    IncomingCallback, IncomingMessage, InlineButton, MessageEntity, UserId,
};
use crate::ports::ChatGateway;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Callback answer as seen by the user: popup text and whether it was an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub query_id: i64,
    pub text: Option<String>,
    pub alert: bool,
}

/// Gateway double: fixed admin roster, records every reply, keyboard and registration.
#[derive(Default)]
pub struct RecordingGateway {
    pub admins: Mutex<Vec<ChatAdministrator>>,
    pub fail_admin_fetch: bool,
    pub panic_on_admin_fetch: bool,
    pub admin_fetches: AtomicUsize,
    pub replies: Mutex<Vec<(ChatId, i32, String)>>,
    pub keyboards: Mutex<Vec<(ChatId, i32, String, Vec<InlineButton>)>>,
    pub answers: Mutex<Vec<Answer>>,
    pub edits: Mutex<Vec<(ChatId, i32, String)>>,
    pub deletions: Mutex<Vec<(ChatId, i32)>>,
    pub registered: Mutex<Vec<Command>>,
}

impl RecordingGateway {
    pub fn with_admins(admins: Vec<ChatAdministrator>) -> Self {
        Self {
            admins: Mutex::new(admins),
            ..Default::default()
        }
    }

    pub fn admin_fetches(&self) -> usize {
        self.admin_fetches.load(Ordering::SeqCst)
    }

    pub fn replies(&self) -> Vec<(ChatId, i32, String)> {
        self.replies.lock().unwrap().clone()
    }

    pub fn last_reply(&self) -> Option<String> {
        self.replies.lock().unwrap().last().map(|(_, _, t)| t.clone())
    }

    pub fn last_keyboard(&self) -> Option<(ChatId, i32, String, Vec<InlineButton>)> {
        self.keyboards.lock().unwrap().last().cloned()
    }

    pub fn answers(&self) -> Vec<Answer> {
        self.answers.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<(ChatId, i32, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn deletions(&self) -> Vec<(ChatId, i32)> {
        self.deletions.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatGateway for RecordingGateway {
    async fn fetch_chat_administrators(
        &self,
        _chat_id: ChatId,
    ) -> Result<Vec<ChatAdministrator>, DomainError> {
        self.admin_fetches.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_admin_fetch {
            panic!("admin roster handler bug");
        }
        if self.fail_admin_fetch {
            return Err(DomainError::Gateway("admin roster unavailable".into()));
        }
        Ok(self.admins.lock().unwrap().clone())
    }

    async fn send_reply(&self, chat_id: ChatId, reply_to: i32, text: &str) -> Result<(), DomainError> {
        self.replies
            .lock()
            .unwrap()
            .push((chat_id, reply_to, text.to_string()));
        Ok(())
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        reply_to: i32,
        text: &str,
        buttons: &[InlineButton],
    ) -> Result<(), DomainError> {
        self.keyboards
            .lock()
            .unwrap()
            .push((chat_id, reply_to, text.to_string(), buttons.to_vec()));
        Ok(())
    }

    async fn answer_callback(
        &self,
        query_id: i64,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), DomainError> {
        self.answers.lock().unwrap().push(Answer {
            query_id,
            text: text.map(str::to_string),
            alert,
        });
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: i32,
        text: &str,
    ) -> Result<(), DomainError> {
        self.edits
            .lock()
            .unwrap()
            .push((chat_id, message_id, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: i32) -> Result<(), DomainError> {
        self.deletions.lock().unwrap().push((chat_id, message_id));
        Ok(())
    }

    async fn register_commands(&self, commands: &[Command]) -> Result<(), DomainError> {
        self.registered.lock().unwrap().extend_from_slice(commands);
        Ok(())
    }
}

pub fn admin(user_id: i64) -> ChatAdministrator {
    ChatAdministrator {
        user_id: UserId(user_id),
        is_owner: false,
        is_admin: true,
    }
}

pub fn supergroup(id: i64) -> ChatInfo {
    ChatInfo {
        id: ChatId(id),
        kind: ChatType::Supergroup,
        title: Some("team".into()),
        username: None,
    }
}

pub fn private_chat(id: i64) -> ChatInfo {
    ChatInfo {
        id: ChatId(id),
        kind: ChatType::Private,
        title: None,
        username: Some("someone".into()),
    }
}

/// Message with a command annotation on its first token plus the given spans,
/// each located by its first occurrence in `text`.
pub fn message_from(
    chat: ChatInfo,
    sender: i64,
    text: &str,
    spans: &[(&str, EntityKind)],
) -> IncomingMessage {
    let mut entities = Vec::new();
    if text.starts_with('/') {
        let key = text.split_whitespace().next().unwrap_or(text);
        entities.push(MessageEntity {
            offset: 0,
            length: key.encode_utf16().count(),
            kind: EntityKind::BotCommand,
        });
    }
    for (needle, kind) in spans {
        let at = text.find(needle).expect("span present in text");
        entities.push(MessageEntity {
            offset: text[..at].encode_utf16().count(),
            length: needle.encode_utf16().count(),
            kind: kind.clone(),
        });
    }
    IncomingMessage {
        message_id: 42,
        chat,
        sender_id: Some(UserId(sender)),
        text: text.to_string(),
        entities,
        is_forwarded: false,
        reply_to_message_id: None,
    }
}

/// Press of a keyboard button under bot message 50.
pub fn button_press(chat_id: i64, sender: i64, data: &str) -> IncomingCallback {
    IncomingCallback {
        query_id: 900,
        chat_id: ChatId(chat_id),
        sender_id: UserId(sender),
        message_id: 50,
        data: data.as_bytes().to_vec(),
    }
}
