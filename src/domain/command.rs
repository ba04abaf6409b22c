//! Command registry. Closed set of commands, their `/keys`, descriptions and access grants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Access level a command requires. Evaluated by access control as a rule chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grant {
    ReadAccess,
    WriteAccess,
    ChangeChatSettings,
}

/// Help-page tier: commands anyone can run vs. commands that configure the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Common,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Help,
    Groups,
    Members,
    Call,
    Xcall,
    Here,
    AddGroup,
    RemoveGroup,
    RemoveGroupForce,
    AddAlias,
    RemoveAlias,
    AddMembers,
    RemoveMembers,
    PurgeMembers,
    MuteMembers,
    UnmuteMembers,
    EnableAnarchy,
    DisableAnarchy,
}

impl Command {
    /// Registry order; also the order of the help page and of the published command list.
    pub const ALL: [Command; 18] = [
        Command::Help,
        Command::Groups,
        Command::Members,
        Command::Call,
        Command::Xcall,
        Command::Here,
        Command::AddGroup,
        Command::RemoveGroup,
        Command::RemoveGroupForce,
        Command::AddAlias,
        Command::RemoveAlias,
        Command::AddMembers,
        Command::RemoveMembers,
        Command::PurgeMembers,
        Command::MuteMembers,
        Command::UnmuteMembers,
        Command::EnableAnarchy,
        Command::DisableAnarchy,
    ];

    /// Invocation keys without the leading slash. The first key is the primary one.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            Command::Help => &["help", "start"],
            Command::Groups => &["groups"],
            Command::Members => &["members"],
            Command::Call => &["call"],
            Command::Xcall => &["xcall"],
            Command::Here => &["here"],
            Command::AddGroup => &["add_group"],
            Command::RemoveGroup => &["remove_group"],
            Command::RemoveGroupForce => &["remove_group_force"],
            Command::AddAlias => &["add_alias", "add_group_alias"],
            Command::RemoveAlias => &["remove_alias", "remove_group_alias"],
            Command::AddMembers => &["add_members", "add_member"],
            Command::RemoveMembers => &["remove_members", "remove_member"],
            Command::PurgeMembers => &["purge_members"],
            Command::MuteMembers => &["mute_members"],
            Command::UnmuteMembers => &["unmute_members"],
            Command::EnableAnarchy => &["enable_anarchy"],
            Command::DisableAnarchy => &["disable_anarchy"],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::Help => "show help for all commands",
            Command::Groups => "list groups",
            Command::Members => "list members of a group",
            Command::Call => "mention all members of a group",
            Command::Xcall => "pick a group to mention from a keyboard",
            Command::Here => "mention every member of every group",
            Command::AddGroup => "create a group",
            Command::RemoveGroup => "remove an empty group",
            Command::RemoveGroupForce => "remove a group together with its members",
            Command::AddAlias => "add an alias to a group",
            Command::RemoveAlias => "remove a group alias",
            Command::AddMembers => "add members to a group",
            Command::RemoveMembers => "remove members from a group",
            Command::PurgeMembers => "remove members from every group",
            Command::MuteMembers => "stop mentioning members",
            Command::UnmuteMembers => "mention muted members again",
            Command::EnableAnarchy => "let everyone configure the bot",
            Command::DisableAnarchy => "only admins can configure the bot",
        }
    }

    pub fn grant(self) -> Grant {
        match self {
            Command::Help
            | Command::Groups
            | Command::Members
            | Command::Call
            | Command::Xcall
            | Command::Here => Grant::ReadAccess,
            Command::AddGroup
            | Command::RemoveGroup
            | Command::RemoveGroupForce
            | Command::AddAlias
            | Command::RemoveAlias
            | Command::AddMembers
            | Command::RemoveMembers
            | Command::PurgeMembers
            | Command::MuteMembers
            | Command::UnmuteMembers => Grant::WriteAccess,
            Command::EnableAnarchy | Command::DisableAnarchy => Grant::ChangeChatSettings,
        }
    }

    pub fn tier(self) -> Tier {
        match self.grant() {
            Grant::ReadAccess => Tier::Common,
            Grant::WriteAccess | Grant::ChangeChatSettings => Tier::Admin,
        }
    }

    /// Usage example shown when arguments fail to parse.
    pub fn usage(self) -> &'static str {
        match self {
            Command::Help => "/help",
            Command::Groups => "/groups",
            Command::Members => "/members group",
            Command::Call => "/call group [message]",
            Command::Xcall => "/xcall",
            Command::Here => "/here",
            Command::AddGroup => "/add_group group",
            Command::RemoveGroup => "/remove_group group",
            Command::RemoveGroupForce => "/remove_group_force group",
            Command::AddAlias => "/add_alias group alias",
            Command::RemoveAlias => "/remove_alias alias",
            Command::AddMembers => "/add_members group @user1 @user2",
            Command::RemoveMembers => "/remove_members group @user1 @user2",
            Command::PurgeMembers => "/purge_members @user1 @user2",
            Command::MuteMembers => "/mute_members @user1 @user2",
            Command::UnmuteMembers => "/unmute_members @user1 @user2",
            Command::EnableAnarchy => "/enable_anarchy",
            Command::DisableAnarchy => "/disable_anarchy",
        }
    }

    /// Exact, case-sensitive lookup of a `/key` (bot suffix already stripped).
    pub fn from_key(key: &str) -> Option<Command> {
        let key = key.strip_prefix('/')?;
        Command::ALL
            .into_iter()
            .find(|command| command.keys().contains(&key))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.keys()[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_no_command_duplicates_by_key() {
        let mut by_key: HashMap<&str, Vec<Command>> = HashMap::new();
        for command in Command::ALL {
            for &key in command.keys() {
                by_key.entry(key).or_default().push(command);
            }
        }
        for (key, commands) in by_key {
            assert_eq!(commands.len(), 1, "key = [{key}], commands = {commands:?}");
        }
    }

    #[test]
    fn test_every_command_has_keys() {
        for command in Command::ALL {
            assert!(!command.keys().is_empty(), "{command:?}");
            assert!(command.usage().starts_with(&format!("/{}", command.keys()[0])));
        }
    }

    #[test]
    fn test_from_key() {
        assert_eq!(Command::from_key("/start"), Some(Command::Help));
        assert_eq!(Command::from_key("/help"), Some(Command::Help));
        assert_eq!(Command::from_key("/add_group_alias"), Some(Command::AddAlias));
        assert_eq!(Command::from_key("/Help"), None);
        assert_eq!(Command::from_key("help"), None);
        assert_eq!(Command::from_key("/unknown"), None);
    }

    #[test]
    fn test_grants() {
        assert_eq!(Command::Call.grant(), Grant::ReadAccess);
        assert_eq!(Command::Xcall.grant(), Grant::ReadAccess);
        assert_eq!(Command::PurgeMembers.grant(), Grant::WriteAccess);
        assert_eq!(Command::EnableAnarchy.grant(), Grant::ChangeChatSettings);
        assert_eq!(Command::DisableAnarchy.tier(), Tier::Admin);
        assert_eq!(Command::Here.tier(), Tier::Common);
    }
}
