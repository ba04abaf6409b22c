//! Request parser: classify an incoming message and extract typed arguments.
//!
//! Grammars decide the textual shape of the message. Members come from the
//! message's mention annotations, never from the raw tokens.

use crate::domain::grammar::{
    CMD_GROUP, CMD_GROUP_ALIAS, CMD_GROUP_MEMBERS, CMD_GROUP_WITH_TAIL, CMD_MEMBERS, Grammar,
};
use crate::domain::{
    Command, DomainError, EntityKind, GroupName, IncomingMessage, Member, MemberName,
    MessageEntity,
};
use regex::Captures;
use std::collections::HashSet;

/// Outcome of resolving the leading `/key` of a command message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Known(Command),
    /// Key not in the registry, or addressed to another bot.
    Unknown(String),
}

fn command_entity(msg: &IncomingMessage) -> Option<&MessageEntity> {
    msg.entities
        .iter()
        .find(|e| e.offset == 0 && e.kind == EntityKind::BotCommand)
}

/// True when the message starts with a bot-command annotation and was not forwarded.
pub fn is_command_message(msg: &IncomingMessage) -> bool {
    !msg.is_forwarded && command_entity(msg).is_some()
}

/// Resolve the offset-0 command annotation against the registry.
///
/// A `@botname` suffix is stripped when it names this bot (case-insensitive). When the
/// bot username is not known the suffix is stripped unconditionally.
pub fn parse_command(msg: &IncomingMessage, bot_username: Option<&str>) -> Option<ParsedCommand> {
    let entity = command_entity(msg)?;
    let raw = msg.entity_text(entity)?;

    let key = match raw.split_once('@') {
        Some((key, target)) => match bot_username {
            Some(me) if !target.eq_ignore_ascii_case(me.trim_start_matches('@')) => {
                return Some(ParsedCommand::Unknown(raw.clone()));
            }
            _ => key,
        },
        None => raw.as_str(),
    };

    Some(match Command::from_key(key) {
        Some(command) => ParsedCommand::Known(command),
        None => ParsedCommand::Unknown(raw),
    })
}

/// `/<cmd> <group>`
pub fn parse_group(msg: &IncomingMessage) -> Result<GroupName, DomainError> {
    let caps = matches(&CMD_GROUP, msg)?;
    GroupName::new(&caps["group"])
}

/// `/<cmd> <group> [any text]`
pub fn parse_group_with_tail(msg: &IncomingMessage) -> Result<GroupName, DomainError> {
    let caps = matches(&CMD_GROUP_WITH_TAIL, msg)?;
    GroupName::new(&caps["group"])
}

/// `/<cmd> <group> <alias>`
pub fn parse_group_with_alias(
    msg: &IncomingMessage,
) -> Result<(GroupName, GroupName), DomainError> {
    let caps = matches(&CMD_GROUP_ALIAS, msg)?;
    Ok((GroupName::new(&caps["group"])?, GroupName::new(&caps["alias"])?))
}

/// `/<cmd> <group> <member>+`
pub fn parse_group_with_members(
    msg: &IncomingMessage,
) -> Result<(GroupName, Vec<Member>), DomainError> {
    let caps = matches(&CMD_GROUP_MEMBERS, msg)?;
    let group = GroupName::new(&caps["group"])?;
    Ok((group, mentioned_members(msg)?))
}

/// `/<cmd> <member>+`
pub fn parse_members(msg: &IncomingMessage) -> Result<Vec<Member>, DomainError> {
    matches(&CMD_MEMBERS, msg)?;
    mentioned_members(msg)
}

fn matches<'m>(grammar: &Grammar, msg: &'m IncomingMessage) -> Result<Captures<'m>, DomainError> {
    let text = msg.text.trim();
    grammar.captures(text).ok_or_else(|| DomainError::Parse {
        input: text.to_string(),
        violated: grammar.violations(text),
    })
}

/// Members named by mention annotations, in message order.
/// A second annotation of the same person (same user id, or same name without one) is dropped.
fn mentioned_members(msg: &IncomingMessage) -> Result<Vec<Member>, DomainError> {
    let mut seen = HashSet::new();
    let mut members = Vec::new();
    for entity in &msg.entities {
        let user_id = match entity.kind {
            EntityKind::Mention => None,
            EntityKind::TextMention { user_id } => Some(user_id),
            EntityKind::BotCommand | EntityKind::Other => continue,
        };
        let Some(text) = msg.entity_text(entity) else {
            continue;
        };
        let member = Member::new(MemberName::new(text)?, user_id);
        if seen.insert(member.key()) {
            members.push(member);
        }
    }
    Ok(members)
}
