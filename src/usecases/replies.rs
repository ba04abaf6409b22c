//! Reply texts. HTML parse mode: every user-provided string is escaped.

use crate::domain::{Command, Constraint, GroupName, GroupWithAliases, Member, Tier};

pub const FORBIDDEN: &str = "You are not allowed to do that here.";
pub const UNEXPECTED: &str = "Something went wrong. Please try again later.";

pub const PICK_GROUP: &str = "<b>Choose a group</b>";
pub const PICKER_CANCEL_BUTTON: &str = "✖ Cancel ✖";
pub const PICKER_CANCELLED: &str = "Cancelled!";
pub const PICKER_FOREIGN: &str = "This is not your dialog!";
pub const PICKER_EMPTY: &str = "This group is empty! Choose another one.";
pub const PICKER_BROKEN: &str = "Something went wrong!";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn bold_group(name: &GroupName) -> String {
    format!("<b>{}</b>", escape_html(name.as_str()))
}

/// Clickable mention for members with a user id; plain (escaped) name otherwise.
fn member_link(member: &Member) -> String {
    let name = escape_html(member.name.as_str());
    match member.user_id {
        Some(user_id) => format!(r#"<a href="tg://user?id={user_id}">{name}</a>"#),
        None => name,
    }
}

fn command_line(command: Command) -> String {
    let keys: Vec<String> = command.keys().iter().map(|k| format!("/{k}")).collect();
    format!("{} - {}", keys.join(", "), command.description())
}

pub fn help() -> String {
    let section = |tier: Tier| {
        Command::ALL
            .into_iter()
            .filter(|c| c.tier() == tier)
            .map(command_line)
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "<b>Commands:</b>\n{}\n\n<b>Bot settings (admins, or everyone in anarchy mode):</b>\n{}\n\n\
         Example: <code>{}</code>",
        section(Tier::Common),
        section(Tier::Admin),
        escape_html(Command::AddMembers.usage())
    )
}

pub fn groups(groups: &[GroupWithAliases]) -> String {
    let lines: Vec<String> = groups
        .iter()
        .map(|g| {
            let mut line = format!("- {}", escape_html(g.group_name.as_str()));
            if !g.alias_names.is_empty() {
                let aliases: Vec<String> = g
                    .alias_names
                    .iter()
                    .map(|a| escape_html(a.as_str()))
                    .collect();
                line.push_str(&format!(" (aliases: {})", aliases.join(", ")));
            }
            line
        })
        .collect();
    format!("<b>Groups:</b>\n{}", lines.join("\n"))
}

/// Picker button caption. Plain text: button captions are not parsed as HTML.
pub fn group_button(group: &GroupWithAliases) -> String {
    let mut caption = group.group_name.to_string();
    if !group.alias_names.is_empty() {
        let aliases: Vec<&str> = group.alias_names.iter().map(|a| a.as_str()).collect();
        caption.push_str(&format!(" (aliases: {})", aliases.join(", ")));
    }
    caption
}

pub fn empty_group(group: &GroupName) -> String {
    format!("Group {} has no members!", bold_group(group))
}

/// Member listing; muted members are marked.
pub fn members(group: &GroupName, members: &[Member]) -> String {
    if members.is_empty() {
        return empty_group(group);
    }
    let lines: Vec<String> = members
        .iter()
        .map(|m| {
            let name = escape_html(m.name.as_str());
            if m.enabled {
                format!("- {name}")
            } else {
                format!("- {name} (muted)")
            }
        })
        .collect();
    format!("Members of group {}:\n{}", bold_group(group), lines.join("\n"))
}

/// Mentions of every enabled member. `None` when nobody is left to mention.
pub fn call(group: &GroupName, members: &[Member]) -> Option<String> {
    let links: Vec<String> = members
        .iter()
        .filter(|m| m.enabled)
        .map(member_link)
        .collect();
    if links.is_empty() {
        return None;
    }
    Some(format!(
        "Calling members of group {}:\n{}",
        bold_group(group),
        links.join(", ")
    ))
}

pub fn here(members: &[Member]) -> Option<String> {
    let links: Vec<String> = members
        .iter()
        .filter(|m| m.enabled)
        .map(member_link)
        .collect();
    if links.is_empty() {
        return None;
    }
    Some(format!("Calling everyone:\n{}", links.join(", ")))
}

pub fn nobody_here() -> String {
    "Nobody to call: there are no members in this chat yet!".to_string()
}

/// Usage example followed by the broken constraints.
pub fn usage(command: Command, violated: &[Constraint]) -> String {
    let mut text = format!(
        "Usage: <code>{}</code>",
        escape_html(command.usage())
    );
    if !violated.is_empty() {
        text.push_str("\n\nCheck the arguments:");
        for c in violated {
            text.push_str(&format!("\n- <b>{}</b>: {}", c.name, escape_html(c.rule)));
        }
    }
    text
}

pub fn group_added(group: &GroupName) -> String {
    format!("Group {} added!", bold_group(group))
}

pub fn group_removed(group: &GroupName) -> String {
    format!("Group {} removed.", bold_group(group))
}

pub fn alias_added(group: &GroupName, alias: &GroupName) -> String {
    format!(
        "Alias {} for group {} added.",
        bold_group(alias),
        bold_group(group)
    )
}

pub fn alias_removed(alias: &GroupName) -> String {
    format!("Alias {} removed.", bold_group(alias))
}

fn member_list(members: &[Member]) -> String {
    members
        .iter()
        .map(|m| format!("- {}", member_link(m)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn members_added(group: &GroupName, members: &[Member]) -> String {
    format!(
        "Added to group {}:\n{}",
        bold_group(group),
        member_list(members)
    )
}

pub fn members_removed(group: &GroupName, members: &[Member]) -> String {
    format!(
        "Removed from group {}:\n{}",
        bold_group(group),
        member_list(members)
    )
}

pub fn members_purged(members: &[Member]) -> String {
    format!("Removed from every group:\n{}", member_list(members))
}

pub fn members_muted(members: &[Member]) -> String {
    format!("These members will not be called:\n{}", member_list(members))
}

pub fn members_unmuted(members: &[Member]) -> String {
    format!("These members will be called again:\n{}", member_list(members))
}

pub fn anarchy_enabled() -> String {
    "Anarchy enabled. Everyone can configure the bot.".to_string()
}

pub fn anarchy_disabled() -> String {
    "Anarchy disabled. Only admins can configure the bot.".to_string()
}
