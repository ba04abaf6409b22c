//! Cardinality limits and fixed name lengths.

pub const MAX_GROUP_NAME_LENGTH: usize = 10;
pub const MAX_MEMBER_NAME_LENGTH: usize = 100;

pub const DEFAULT_MAX_GROUPS_PER_CHAT: usize = 10;
pub const DEFAULT_MAX_ALIASES_PER_GROUP: usize = 3;
pub const DEFAULT_MAX_MEMBERS_PER_GROUP: usize = 20;

/// Virtual group names that resolve to every member of the chat.
pub const VIRTUAL_ALL_GROUPS: &[&str] = &["all", "все", "everyone"];

/// Per-chat limits enforced inside domain operations. Overridable from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_groups_per_chat: usize,
    pub max_aliases_per_group: usize,
    pub max_members_per_group: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_groups_per_chat: DEFAULT_MAX_GROUPS_PER_CHAT,
            max_aliases_per_group: DEFAULT_MAX_ALIASES_PER_GROUP,
            max_members_per_group: DEFAULT_MAX_MEMBERS_PER_GROUP,
        }
    }
}

/// True when `name` addresses the whole chat instead of a stored group.
pub fn is_virtual_all_group(name: &str) -> bool {
    let name = name.to_lowercase();
    VIRTUAL_ALL_GROUPS.contains(&name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_names_ignore_case() {
        for name in ["all", "ALL", "все", "ВСЕ", "Все", "Everyone"] {
            assert!(is_virtual_all_group(name), "{name}");
        }
        assert!(!is_virtual_all_group("allx"));
        assert!(!is_virtual_all_group("вс"));
    }
}
