//! Command dispatcher: message -> command -> access check -> domain operation -> reply.
//!
//! Every command message gets exactly one reply. Only non-command, forwarded and
//! unknown-command messages stay silent. Nothing is retained between messages: the
//! `/xcall` picker carries its whole state in the button payloads.

use crate::domain::{
    Command, DomainError, GroupWithAliases, IncomingCallback, IncomingMessage, InlineButton,
    Limits, PickerAction, PickerCallback, UserId,
};
use crate::ports::{ChatGateway, Repository};
use crate::usecases::access_control::AccessControl;
use crate::usecases::group_service::GroupService;
use crate::usecases::replies;
use crate::usecases::request_parser::{
    ParsedCommand, is_command_message, parse_command, parse_group, parse_group_with_alias,
    parse_group_with_members, parse_group_with_tail, parse_members,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What a command answers with.
enum Reply {
    Text(String),
    Keyboard {
        text: String,
        buttons: Vec<InlineButton>,
    },
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

/// Picker keyboard: Cancel first, then one button per group.
fn picker_buttons(
    msg: &IncomingMessage,
    sender: UserId,
    groups: &[GroupWithAliases],
) -> Vec<InlineButton> {
    let button = |text: String, action: PickerAction| InlineButton {
        text,
        data: PickerCallback {
            chat_id: msg.chat.id,
            user_id: sender,
            action,
        }
        .encode(),
    };
    std::iter::once(button(
        replies::PICKER_CANCEL_BUTTON.to_string(),
        PickerAction::Cancel,
    ))
    .chain(groups.iter().map(|g| {
        button(
            replies::group_button(g),
            PickerAction::SelectGroup(g.group_id),
        )
    }))
    .collect()
}

pub struct Dispatcher {
    gateway: Arc<dyn ChatGateway>,
    access: AccessControl,
    groups: GroupService,
    /// Commands addressed as `/cmd@name` are ours only when `name` matches.
    bot_username: Option<String>,
}

impl Dispatcher {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        repo: Arc<dyn Repository>,
        limits: Limits,
        bot_username: Option<String>,
    ) -> Self {
        Self {
            access: AccessControl::new(Arc::clone(&gateway), Arc::clone(&repo)),
            groups: GroupService::new(repo, limits),
            gateway,
            bot_username,
        }
    }

    /// Publish every command key with its description.
    pub async fn register_commands(&self) -> Result<(), DomainError> {
        self.gateway.register_commands(&Command::ALL).await?;
        info!(count = Command::ALL.len(), "bot commands registered");
        Ok(())
    }

    /// Handle one message on its own task. A panic inside the handler still gets the
    /// generic reply and never reaches the caller.
    pub fn spawn(self: &Arc<Self>, msg: IncomingMessage) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let chat_id = msg.chat.id;
            let message_id = msg.message_id;
            let worker = Arc::clone(&dispatcher);
            let handled = tokio::spawn(async move { worker.handle(msg).await }).await;
            if let Err(join_err) = handled {
                error!(%chat_id, message_id, error = %join_err, "message handler crashed");
                if let Err(e) = dispatcher
                    .gateway
                    .send_reply(chat_id, message_id, replies::UNEXPECTED)
                    .await
                {
                    error!(%chat_id, error = %e, "failed to send reply");
                }
            }
        })
    }

    /// Handle one button press on its own task.
    pub fn spawn_callback(self: &Arc<Self>, callback: IncomingCallback) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.handle_callback(callback).await })
    }

    /// Handle a press on the `/xcall` picker. Only the user who opened it may press;
    /// others get a popup and the keyboard stays.
    pub async fn handle_callback(&self, cb: IncomingCallback) {
        let chat_id = cb.chat_id;
        let Some(picker) = PickerCallback::decode(&cb.data) else {
            warn!(%chat_id, data = ?cb.data, "cannot decode callback data");
            self.answer(&cb, Some(replies::PICKER_BROKEN), false).await;
            self.delete(&cb).await;
            return;
        };
        if !picker.is_owned_by(chat_id, cb.sender_id) {
            warn!(%chat_id, sender = %cb.sender_id, ?picker, "picker pressed by another user");
            self.answer(&cb, Some(replies::PICKER_FOREIGN), true).await;
            return;
        }

        match picker.action {
            PickerAction::Cancel => {
                debug!(%chat_id, "picker cancelled");
                self.delete(&cb).await;
                self.answer(&cb, Some(replies::PICKER_CANCELLED), false).await;
            }
            PickerAction::SelectGroup(group_id) => {
                let picked = self.groups.get_group_by_id(chat_id, group_id).await;
                let (group, members) = match picked {
                    Ok(found) => found,
                    Err(e) => {
                        let text = match e.user_message() {
                            Some(text) => {
                                warn!(%chat_id, %group_id, error = %e, "picked group rejected");
                                text.to_string()
                            }
                            None => {
                                error!(%chat_id, %group_id, error = %e, "picked group failed");
                                replies::UNEXPECTED.to_string()
                            }
                        };
                        self.answer(&cb, Some(text.as_str()), true).await;
                        return;
                    }
                };
                match replies::call(&group, &members) {
                    Some(text) => {
                        self.answer(&cb, None, false).await;
                        let edited = self.gateway.edit_message(chat_id, cb.message_id, &text).await;
                        if let Err(e) = edited {
                            error!(%chat_id, error = %e, "failed to edit picker message");
                        }
                        info!(%chat_id, %group, "group called from picker");
                    }
                    None => self.answer(&cb, Some(replies::PICKER_EMPTY), true).await,
                }
            }
        }
    }

    async fn answer(&self, cb: &IncomingCallback, text: Option<&str>, alert: bool) {
        if let Err(e) = self.gateway.answer_callback(cb.query_id, text, alert).await {
            error!(chat_id = %cb.chat_id, error = %e, "failed to answer callback");
        }
    }

    async fn delete(&self, cb: &IncomingCallback) {
        if let Err(e) = self.gateway.delete_message(cb.chat_id, cb.message_id).await {
            error!(chat_id = %cb.chat_id, error = %e, "failed to delete picker message");
        }
    }

    /// Handle one message. All failures end up as a reply; the only error left is a
    /// failed send, which is logged.
    pub async fn handle(&self, msg: IncomingMessage) {
        let chat_id = msg.chat.id;
        if !is_command_message(&msg) {
            debug!(%chat_id, message_id = msg.message_id, forwarded = msg.is_forwarded, "not a command");
            return;
        }
        let command = match parse_command(&msg, self.bot_username.as_deref()) {
            Some(ParsedCommand::Known(command)) => command,
            Some(ParsedCommand::Unknown(key)) => {
                info!(%chat_id, %key, "unknown command");
                return;
            }
            None => return,
        };
        info!(%chat_id, %command, sender = ?msg.sender_id, "command received");

        let (reply, reply_to) = match self.route(command, &msg).await {
            Ok(reply) => {
                let reply_to = match command {
                    Command::Call => msg.reply_to_message_id.unwrap_or(msg.message_id),
                    _ => msg.message_id,
                };
                (reply, reply_to)
            }
            Err(e) => (Reply::Text(failure_reply(command, &msg, e)), msg.message_id),
        };

        let sent = match reply {
            Reply::Text(text) => self.gateway.send_reply(chat_id, reply_to, &text).await,
            Reply::Keyboard { text, buttons } => {
                self.gateway
                    .send_keyboard(chat_id, reply_to, &text, &buttons)
                    .await
            }
        };
        if let Err(e) = sent {
            error!(%chat_id, %command, error = %e, "failed to send reply");
        }
    }

    async fn route(&self, command: Command, msg: &IncomingMessage) -> Result<Reply, DomainError> {
        self.access.check(command.grant(), msg).await?;
        let chat_id = msg.chat.id;
        match command {
            Command::Help => Ok(replies::help().into()),
            Command::Groups => {
                let groups = self.groups.get_groups(chat_id).await?;
                Ok(replies::groups(&groups).into())
            }
            Command::Members => {
                let group = parse_group(msg)?;
                let members = self.groups.get_group_members(chat_id, &group).await?;
                Ok(replies::members(&group, &members).into())
            }
            Command::Call => {
                let group = parse_group_with_tail(msg)?;
                let members = self.groups.get_group_members(chat_id, &group).await?;
                let text = replies::call(&group, &members)
                    .unwrap_or_else(|| replies::empty_group(&group));
                Ok(text.into())
            }
            Command::Xcall => {
                let sender = msg.sender_id.ok_or_else(|| {
                    DomainError::validation(
                        "xcall without sender",
                        "Anonymous senders cannot use the group picker.",
                    )
                })?;
                let groups = self.groups.get_groups(chat_id).await?;
                Ok(Reply::Keyboard {
                    text: replies::PICK_GROUP.to_string(),
                    buttons: picker_buttons(msg, sender, &groups),
                })
            }
            Command::Here => {
                let members = self.groups.get_chat_members(chat_id).await?;
                Ok(replies::here(&members).unwrap_or_else(replies::nobody_here).into())
            }
            Command::AddGroup => {
                let group = parse_group(msg)?;
                self.groups.add_group(&msg.chat, &group).await?;
                Ok(replies::group_added(&group).into())
            }
            Command::RemoveGroup | Command::RemoveGroupForce => {
                let group = parse_group(msg)?;
                let force = command == Command::RemoveGroupForce;
                self.groups.remove_group(chat_id, &group, force).await?;
                Ok(replies::group_removed(&group).into())
            }
            Command::AddAlias => {
                let (group, alias) = parse_group_with_alias(msg)?;
                self.groups.add_alias(chat_id, &group, &alias).await?;
                Ok(replies::alias_added(&group, &alias).into())
            }
            Command::RemoveAlias => {
                let alias = parse_group(msg)?;
                self.groups.remove_alias(chat_id, &alias).await?;
                Ok(replies::alias_removed(&alias).into())
            }
            Command::AddMembers => {
                let (group, members) = parse_group_with_members(msg)?;
                self.groups.add_members(chat_id, &group, &members).await?;
                Ok(replies::members_added(&group, &members).into())
            }
            Command::RemoveMembers => {
                let (group, members) = parse_group_with_members(msg)?;
                self.groups.remove_members(chat_id, &group, &members).await?;
                Ok(replies::members_removed(&group, &members).into())
            }
            Command::PurgeMembers => {
                let members = parse_members(msg)?;
                self.groups.purge_members(chat_id, &members).await?;
                Ok(replies::members_purged(&members).into())
            }
            Command::MuteMembers => {
                let members = parse_members(msg)?;
                self.groups.mute_members(chat_id, &members).await?;
                Ok(replies::members_muted(&members).into())
            }
            Command::UnmuteMembers => {
                let members = parse_members(msg)?;
                self.groups.unmute_members(chat_id, &members).await?;
                Ok(replies::members_unmuted(&members).into())
            }
            Command::EnableAnarchy => {
                self.groups.enable_anarchy(&msg.chat).await?;
                Ok(replies::anarchy_enabled().into())
            }
            Command::DisableAnarchy => {
                self.groups.disable_anarchy(&msg.chat).await?;
                Ok(replies::anarchy_disabled().into())
            }
        }
    }
}

/// Map a failure to its reply text. Expected failures log at warn, the rest at error.
fn failure_reply(command: Command, msg: &IncomingMessage, err: DomainError) -> String {
    let chat_id = msg.chat.id;
    match err {
        DomainError::Parse { input, violated } => {
            warn!(%chat_id, %command, %input, ?violated, "cannot parse arguments");
            replies::usage(command, &violated)
        }
        DomainError::Authorization(detail) => {
            warn!(%chat_id, %command, %detail, "access denied");
            replies::FORBIDDEN.to_string()
        }
        err => match err.user_message() {
            Some(text) => {
                warn!(%chat_id, %command, error = %err, "command rejected");
                text.to_string()
            }
            None => {
                error!(%chat_id, %command, error = %err, "command failed");
                replies::UNEXPECTED.to_string()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::memory_repo::MemoryRepo;
    use crate::domain::{ChatId, EntityKind, UserId};
    use crate::usecases::test_support::{
        Answer, RecordingGateway, admin, button_press, message_from, private_chat, supergroup,
    };

    const ADMIN: i64 = 5;
    const USER: i64 = 6;

    fn setup(gateway: RecordingGateway) -> (Arc<Dispatcher>, Arc<RecordingGateway>) {
        let gateway = Arc::new(gateway);
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepo::new());
        let dispatcher = Dispatcher::new(
            gateway.clone(),
            repo,
            Limits::default(),
            Some("mention_bot".into()),
        );
        (Arc::new(dispatcher), gateway)
    }

    fn admin_gateway() -> RecordingGateway {
        RecordingGateway::with_admins(vec![admin(ADMIN)])
    }

    async fn send(dispatcher: &Dispatcher, sender: i64, text: &str) {
        dispatcher
            .handle(message_from(supergroup(-100), sender, text, &[]))
            .await;
    }

    #[tokio::test]
    async fn test_full_flow() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, ADMIN, "/add_group devs").await;
        assert!(gateway.last_reply().unwrap().contains("added"));

        let msg = message_from(
            supergroup(-100),
            ADMIN,
            "/add_members devs @bob Ann",
            &[
                ("@bob", EntityKind::Mention),
                ("Ann", EntityKind::TextMention { user_id: UserId(7) }),
            ],
        );
        dispatcher.handle(msg).await;
        assert!(gateway.last_reply().unwrap().starts_with("Added to group"));

        send(&dispatcher, USER, "/call devs lunch time").await;
        let reply = gateway.last_reply().unwrap();
        assert!(reply.contains("@bob"));
        assert!(reply.contains(r#"<a href="tg://user?id=7">Ann</a>"#));

        send(&dispatcher, USER, "/groups").await;
        assert!(gateway.last_reply().unwrap().contains("- devs"));
    }

    #[tokio::test]
    async fn test_non_commands_and_unknown_are_silent() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, USER, "hello there").await;
        send(&dispatcher, USER, "/dance").await;
        send(&dispatcher, USER, "/help@other_bot").await;

        let mut forwarded = message_from(supergroup(-100), USER, "/help", &[]);
        forwarded.is_forwarded = true;
        dispatcher.handle(forwarded).await;

        assert!(gateway.replies().is_empty());
    }

    #[tokio::test]
    async fn test_forbidden_reply_is_generic() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, USER, "/add_group devs").await;
        assert_eq!(gateway.last_reply().as_deref(), Some(replies::FORBIDDEN));
    }

    #[tokio::test]
    async fn test_private_chat_allows_writes() {
        let (dispatcher, gateway) = setup(RecordingGateway::default());
        dispatcher
            .handle(message_from(private_chat(USER), USER, "/add_group mine", &[]))
            .await;
        assert!(gateway.last_reply().unwrap().contains("added"));
        assert_eq!(gateway.admin_fetches(), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_replies_with_usage() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, ADMIN, "/add_alias devs").await;
        let reply = gateway.last_reply().unwrap();
        assert!(reply.starts_with("Usage: <code>/add_alias group alias</code>"));
        assert!(reply.contains("<b>alias</b>"));
    }

    #[tokio::test]
    async fn test_domain_failures_reply_with_user_message() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, USER, "/groups").await;
        assert!(gateway.last_reply().unwrap().contains("no groups"));

        send(&dispatcher, USER, "/members ghost").await;
        assert_eq!(
            gateway.last_reply().as_deref(),
            Some("Group ghost not found!")
        );
    }

    #[tokio::test]
    async fn test_gateway_failure_is_unexpected() {
        let (dispatcher, gateway) = setup(RecordingGateway {
            fail_admin_fetch: true,
            ..Default::default()
        });
        send(&dispatcher, USER, "/add_group devs").await;
        assert_eq!(gateway.last_reply().as_deref(), Some(replies::UNEXPECTED));
    }

    #[tokio::test]
    async fn test_call_answers_replied_message() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, ADMIN, "/add_group devs").await;
        let msg = message_from(
            supergroup(-100),
            ADMIN,
            "/add_members devs @bob",
            &[("@bob", EntityKind::Mention)],
        );
        dispatcher.handle(msg).await;

        let mut call = message_from(supergroup(-100), USER, "/call@mention_bot devs", &[]);
        call.reply_to_message_id = Some(3);
        dispatcher.handle(call).await;

        let (chat_id, reply_to, text) = gateway.replies().pop().unwrap();
        assert_eq!(chat_id, ChatId(-100));
        assert_eq!(reply_to, 3);
        assert!(text.contains("@bob"));
    }

    #[tokio::test]
    async fn test_empty_group_call() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, ADMIN, "/add_group devs").await;
        send(&dispatcher, USER, "/call devs").await;
        assert!(gateway.last_reply().unwrap().contains("has no members"));
    }

    #[tokio::test]
    async fn test_panicking_handler_still_replies() {
        let (dispatcher, gateway) = setup(RecordingGateway {
            panic_on_admin_fetch: true,
            ..Default::default()
        });
        let msg = message_from(supergroup(-100), USER, "/add_group devs", &[]);
        dispatcher.spawn(msg).await.unwrap();
        assert_eq!(
            gateway.replies(),
            vec![(ChatId(-100), 42, replies::UNEXPECTED.to_string())]
        );
    }

    #[tokio::test]
    async fn test_register_commands_publishes_registry() {
        let (dispatcher, gateway) = setup(RecordingGateway::default());
        dispatcher.register_commands().await.unwrap();
        assert_eq!(*gateway.registered.lock().unwrap(), Command::ALL.to_vec());
    }

    /// Opens the picker as USER and returns the data of each button, Cancel first.
    async fn open_picker(dispatcher: &Dispatcher, gateway: &RecordingGateway) -> Vec<String> {
        send(dispatcher, USER, "/xcall").await;
        let (chat_id, reply_to, text, buttons) = gateway.last_keyboard().unwrap();
        assert_eq!((chat_id, reply_to), (ChatId(-100), 42));
        assert_eq!(text, replies::PICK_GROUP);
        buttons.into_iter().map(|b| b.data).collect()
    }

    #[tokio::test]
    async fn test_xcall_lists_groups_with_cancel_first() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, ADMIN, "/add_group devs").await;
        send(&dispatcher, ADMIN, "/add_alias devs dev").await;
        send(&dispatcher, ADMIN, "/add_group ops").await;

        send(&dispatcher, USER, "/xcall").await;
        let (_, _, _, buttons) = gateway.last_keyboard().unwrap();
        let captions: Vec<&str> = buttons.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(
            captions,
            vec![replies::PICKER_CANCEL_BUTTON, "devs (aliases: dev)", "ops"]
        );
        let cancel = PickerCallback::decode(buttons[0].data.as_bytes()).unwrap();
        assert_eq!(cancel.action, PickerAction::Cancel);
        assert!(cancel.is_owned_by(ChatId(-100), UserId(USER)));
    }

    #[tokio::test]
    async fn test_xcall_without_groups_is_not_found() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, USER, "/xcall").await;
        assert!(gateway.last_keyboard().is_none());
        assert!(gateway.last_reply().unwrap().contains("no groups"));
    }

    #[tokio::test]
    async fn test_picker_selection_edits_into_mentions() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, ADMIN, "/add_group devs").await;
        let msg = message_from(
            supergroup(-100),
            ADMIN,
            "/add_members devs @bob",
            &[("@bob", EntityKind::Mention)],
        );
        dispatcher.handle(msg).await;
        let buttons = open_picker(&dispatcher, &gateway).await;

        dispatcher
            .handle_callback(button_press(-100, USER, &buttons[1]))
            .await;

        let (chat_id, message_id, text) = gateway.edits().pop().unwrap();
        assert_eq!((chat_id, message_id), (ChatId(-100), 50));
        assert!(text.contains("@bob"));
        assert_eq!(
            gateway.answers(),
            vec![Answer {
                query_id: 900,
                text: None,
                alert: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_picker_rejects_other_users() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, ADMIN, "/add_group devs").await;
        let buttons = open_picker(&dispatcher, &gateway).await;

        dispatcher
            .handle_callback(button_press(-100, ADMIN, &buttons[1]))
            .await;
        dispatcher
            .handle_callback(button_press(-200, USER, &buttons[0]))
            .await;

        let answers = gateway.answers();
        assert_eq!(answers.len(), 2);
        for answer in answers {
            assert_eq!(answer.text.as_deref(), Some(replies::PICKER_FOREIGN));
            assert!(answer.alert);
        }
        assert!(gateway.edits().is_empty());
        assert!(gateway.deletions().is_empty());
    }

    #[tokio::test]
    async fn test_picker_cancel_deletes_keyboard() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, ADMIN, "/add_group devs").await;
        let buttons = open_picker(&dispatcher, &gateway).await;

        dispatcher
            .handle_callback(button_press(-100, USER, &buttons[0]))
            .await;

        assert_eq!(gateway.deletions(), vec![(ChatId(-100), 50)]);
        let answer = gateway.answers().pop().unwrap();
        assert_eq!(answer.text.as_deref(), Some(replies::PICKER_CANCELLED));
        assert!(!answer.alert);
    }

    #[tokio::test]
    async fn test_picker_empty_group_keeps_keyboard() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, ADMIN, "/add_group devs").await;
        let buttons = open_picker(&dispatcher, &gateway).await;

        dispatcher
            .handle_callback(button_press(-100, USER, &buttons[1]))
            .await;

        let answer = gateway.answers().pop().unwrap();
        assert_eq!(answer.text.as_deref(), Some(replies::PICKER_EMPTY));
        assert!(answer.alert);
        assert!(gateway.edits().is_empty());
        assert!(gateway.deletions().is_empty());
    }

    #[tokio::test]
    async fn test_picker_removed_group_and_garbage_data() {
        let (dispatcher, gateway) = setup(admin_gateway());
        send(&dispatcher, ADMIN, "/add_group devs").await;
        let buttons = open_picker(&dispatcher, &gateway).await;
        send(&dispatcher, ADMIN, "/remove_group devs").await;

        dispatcher
            .handle_callback(button_press(-100, USER, &buttons[1]))
            .await;
        let answer = gateway.answers().pop().unwrap();
        assert_eq!(answer.text.as_deref(), Some("This group no longer exists!"));
        assert!(answer.alert);

        dispatcher
            .handle_callback(button_press(-100, USER, "{\"not\":\"ours\"}"))
            .await;
        let answer = gateway.answers().pop().unwrap();
        assert_eq!(answer.text.as_deref(), Some(replies::PICKER_BROKEN));
        assert_eq!(gateway.deletions(), vec![(ChatId(-100), 50)]);
    }
}
