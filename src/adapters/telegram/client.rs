//! Implements ChatGateway using grammers Client.
//!
//! Handles FloodWait by sleeping and retrying. Uses raw invoke for participant
//! lists, callback answers and the bot command menu.

use crate::adapters::telegram::mapper;
use crate::domain::{ChatAdministrator, ChatId, Command, DomainError, InlineButton};
use crate::ports::ChatGateway;
use async_trait::async_trait;
use grammers_client::message::InputMessage;
use grammers_client::{button, reply_markup};
use grammers_client::peer::Peer;
use grammers_client::tl;
use grammers_client::{Client, InvocationError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// FloodWait retries per request before giving up.
const MAX_ATTEMPTS: u32 = 3;
/// Upper bound of the admin roster of a chat.
const ADMIN_PAGE_LIMIT: i32 = 200;

/// Peers by chat id, filled from incoming updates. Bots cannot list dialogs, so every
/// chat the bot replies to has been seen in an update first.
#[derive(Default)]
pub struct PeerCache {
    peers: Mutex<HashMap<ChatId, Peer>>,
}

impl PeerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn remember(&self, chat_id: ChatId, peer: Peer) {
        self.peers.lock().await.insert(chat_id, peer);
    }

    /// InputPeer with the access hash from the session cache.
    async fn resolve(&self, chat_id: ChatId) -> Result<tl::enums::InputPeer, DomainError> {
        let peer_ref = self
            .peer(chat_id)
            .await?
            .to_ref()
            .await
            .ok_or_else(|| DomainError::Gateway("peer not in session cache".into()))?;
        Ok(peer_ref.into())
    }

    async fn peer(&self, chat_id: ChatId) -> Result<Peer, DomainError> {
        self.peers
            .lock()
            .await
            .get(&chat_id)
            .cloned()
            .ok_or_else(|| DomainError::Gateway(format!("peer {chat_id} not seen in updates")))
    }
}

/// Telegram gateway adapter. Wraps a grammers Client clone (same session as auth and updates).
pub struct GrammersChatGateway {
    client: Client,
    peers: Arc<PeerCache>,
}

impl GrammersChatGateway {
    pub fn new(client: Client, peers: Arc<PeerCache>) -> Self {
        Self { client, peers }
    }

    /// Invoke with FloodWait handling: sleep the requested time and retry.
    async fn invoke<R>(&self, request: &R) -> Result<R::Return, DomainError>
    where
        R: tl::RemoteCall,
    {
        for attempt in 0..MAX_ATTEMPTS {
            match self.client.invoke(request).await {
                Ok(result) => return Ok(result),
                Err(InvocationError::Rpc(rpc)) if rpc.code == 420 => {
                    let wait_secs = rpc.value.unwrap_or(60) as u64;
                    warn!(attempt, wait_secs, "FloodWait, sleeping");
                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                }
                Err(e) => return Err(DomainError::Gateway(e.to_string())),
            }
        }
        Err(DomainError::Gateway("FloodWait max retries".into()))
    }

    async fn send(&self, chat_id: ChatId, message: InputMessage) -> Result<(), DomainError> {
        let peer = self.peers.peer(chat_id).await?;
        let peer_ref = peer
            .to_ref()
            .await
            .ok_or_else(|| DomainError::Gateway("peer not in session cache".into()))?;
        self.client
            .send_message(peer_ref, message)
            .await
            .map_err(|e| DomainError::Gateway(format!("send_message: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ChatGateway for GrammersChatGateway {
    async fn fetch_chat_administrators(
        &self,
        chat_id: ChatId,
    ) -> Result<Vec<ChatAdministrator>, DomainError> {
        let input_peer = self.peers.resolve(chat_id).await?;

        let admins = match input_peer {
            tl::enums::InputPeer::Channel(channel) => {
                let request = tl::functions::channels::GetParticipants {
                    channel: tl::enums::InputChannel::Channel(tl::types::InputChannel {
                        channel_id: channel.channel_id,
                        access_hash: channel.access_hash,
                    }),
                    filter: tl::enums::ChannelParticipantsFilter::ChannelParticipantsAdmins,
                    offset: 0,
                    limit: ADMIN_PAGE_LIMIT,
                    hash: 0,
                };
                match self.invoke(&request).await? {
                    tl::enums::channels::ChannelParticipants::Participants(p) => {
                        mapper::channel_admins(&p.participants)
                    }
                    tl::enums::channels::ChannelParticipants::NotModified => Vec::new(),
                }
            }
            tl::enums::InputPeer::Chat(chat) => {
                let request = tl::functions::messages::GetFullChat {
                    chat_id: chat.chat_id,
                };
                let tl::enums::messages::ChatFull::Full(full) = self.invoke(&request).await?;
                match full.full_chat {
                    tl::enums::ChatFull::Full(chat_full) => match chat_full.participants {
                        tl::enums::ChatParticipants::Participants(p) => {
                            mapper::chat_admins(&p.participants)
                        }
                        tl::enums::ChatParticipants::Forbidden(_) => Vec::new(),
                    },
                    tl::enums::ChatFull::ChannelFull(_) => Vec::new(),
                }
            }
            // Private chats have no administrators.
            _ => Vec::new(),
        };

        debug!(%chat_id, count = admins.len(), "fetched chat administrators");
        Ok(admins)
    }

    async fn send_reply(&self, chat_id: ChatId, reply_to: i32, text: &str) -> Result<(), DomainError> {
        let message = InputMessage::new().html(text).reply_to(Some(reply_to));
        self.send(chat_id, message).await
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        reply_to: i32,
        text: &str,
        buttons: &[InlineButton],
    ) -> Result<(), DomainError> {
        let rows: Vec<Vec<button::Inline>> = buttons
            .iter()
            .map(|b| vec![button::inline(b.text.clone(), b.data.clone().into_bytes())])
            .collect();
        let message = InputMessage::new()
            .html(text)
            .reply_to(Some(reply_to))
            .reply_markup(&reply_markup::inline(rows));
        self.send(chat_id, message).await
    }

    async fn answer_callback(
        &self,
        query_id: i64,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), DomainError> {
        let request = tl::functions::messages::SetBotCallbackAnswer {
            alert,
            query_id,
            message: text.map(str::to_string),
            url: None,
            cache_time: 0,
        };
        self.invoke(&request).await?;
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: i32,
        text: &str,
    ) -> Result<(), DomainError> {
        let peer = self.peers.peer(chat_id).await?;
        let peer_ref = peer
            .to_ref()
            .await
            .ok_or_else(|| DomainError::Gateway("peer not in session cache".into()))?;
        self.client
            .edit_message(peer_ref, message_id, InputMessage::new().html(text))
            .await
            .map_err(|e| DomainError::Gateway(format!("edit_message: {e}")))?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: i32) -> Result<(), DomainError> {
        let peer = self.peers.peer(chat_id).await?;
        let peer_ref = peer
            .to_ref()
            .await
            .ok_or_else(|| DomainError::Gateway("peer not in session cache".into()))?;
        self.client
            .delete_messages(peer_ref, &[message_id])
            .await
            .map_err(|e| DomainError::Gateway(format!("delete_messages: {e}")))?;
        Ok(())
    }

    async fn register_commands(&self, commands: &[Command]) -> Result<(), DomainError> {
        let commands = commands
            .iter()
            .flat_map(|command| {
                command.keys().iter().map(move |key| {
                    tl::enums::BotCommand::Command(tl::types::BotCommand {
                        command: (*key).to_string(),
                        description: command.description().to_string(),
                    })
                })
            })
            .collect();
        let request = tl::functions::bots::SetBotCommands {
            scope: tl::enums::BotCommandScope::Default,
            lang_code: String::new(),
            commands,
        };
        self.invoke(&request).await?;
        Ok(())
    }
}
