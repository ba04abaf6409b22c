//! Implements InputPort: pump grammers updates into the dispatcher.
//!
//! Each new message and each keyboard button press is mapped to the domain and handled
//! on its own task, so a slow gateway call in one chat never blocks another.

use crate::adapters::telegram::client::PeerCache;
use crate::adapters::telegram::mapper;
use crate::domain::DomainError;
use crate::ports::InputPort;
use crate::usecases::Dispatcher;
use async_trait::async_trait;
use grammers_client::Update;
use grammers_client::client::UpdateStream;
use grammers_client::tl;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct GrammersUpdateLoop {
    updates: Mutex<UpdateStream>,
    dispatcher: Arc<Dispatcher>,
    peers: Arc<PeerCache>,
}

impl GrammersUpdateLoop {
    pub fn new(updates: UpdateStream, dispatcher: Arc<Dispatcher>, peers: Arc<PeerCache>) -> Self {
        Self {
            updates: Mutex::new(updates),
            dispatcher,
            peers,
        }
    }
}

#[async_trait]
impl InputPort for GrammersUpdateLoop {
    async fn run(&self) -> Result<(), DomainError> {
        let mut updates = self.updates.lock().await;
        info!("listening for updates");

        loop {
            let update = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested");
                    break;
                }
                update = updates.next() => {
                    update.map_err(|e| DomainError::Gateway(format!("updates: {e}")))?
                }
            };

            let message = match update {
                Update::NewMessage(message) => message,
                Update::CallbackQuery(query) => {
                    match &query.raw {
                        tl::enums::Update::BotCallbackQuery(raw) => {
                            self.dispatcher.spawn_callback(mapper::callback_to_domain(raw));
                        }
                        _ => debug!("skipping inline-message callback"),
                    }
                    continue;
                }
                _ => continue,
            };

            // The peer (with its access hash) is needed later to reply and to list admins.
            let chat = match message.peer() {
                Some(peer) => {
                    let info = mapper::chat_info_from_peer(peer);
                    self.peers.remember(info.id, peer.clone()).await;
                    Some(info)
                }
                None => {
                    warn!("message peer not in session; replies to this chat will fail");
                    None
                }
            };

            match mapper::message_to_domain(&message.raw, chat) {
                Some(incoming) => {
                    self.dispatcher.spawn(incoming);
                }
                None => debug!("skipping outgoing or service message"),
            }
        }

        updates.sync_update_state().await;
        info!("update loop stopped");
        Ok(())
    }
}
