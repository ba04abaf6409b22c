//! Command argument grammars. Whitespace-delimited, anchored to the whole message.
//!
//! The full-string regex decides acceptance. Per-token rules only explain a rejection:
//! they name the violated constraints, in declaration order, for the usage reply.

use crate::domain::errors::Constraint;
use regex::{Captures, Regex};
use std::sync::LazyLock;

const CMD: &str = r"[@a-zA-Z0-9_-]+";
const GROUP: &str = r"[a-zA-Z0-9а-яА-ЯёЁ_-]+";
const MEMBER: &str = r"[@\w-]+";

static CMD_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"^/{CMD}\s+(?P<group>{GROUP})$")));

static CMD_GROUP_WITH_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"(?s)^/{CMD}\s+(?P<group>{GROUP})(?:\s+.*)?$")));

static CMD_GROUP_ALIAS_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"^/{CMD}\s+(?P<group>{GROUP})\s+(?P<alias>{GROUP})$"
    ))
});

static CMD_GROUP_MEMBERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"^/{CMD}\s+(?P<group>{GROUP})(?:\s+{MEMBER})+$"
    ))
});

static CMD_MEMBERS_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"^/{CMD}(?:\s+{MEMBER})+$")));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("grammar regex is valid")
}

pub const GROUP_RULE: &str = "latin or cyrillic letters, digits, hyphen and underscore";
pub const MEMBER_RULE: &str = "@mentions of users: letters, digits, hyphen and underscore";

const GROUP_PARAM: Param = Param {
    constraint: Constraint {
        name: "group",
        rule: GROUP_RULE,
    },
    accepts: is_group_token,
    arity: Arity::One,
};

const ALIAS_PARAM: Param = Param {
    constraint: Constraint {
        name: "alias",
        rule: GROUP_RULE,
    },
    accepts: is_group_token,
    arity: Arity::One,
};

const MEMBERS_PARAM: Param = Param {
    constraint: Constraint {
        name: "members",
        rule: MEMBER_RULE,
    },
    accepts: is_member_token,
    arity: Arity::OneOrMore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arity {
    One,
    OneOrMore,
}

#[derive(Debug, Clone, Copy)]
struct Param {
    constraint: Constraint,
    accepts: fn(&str) -> bool,
    arity: Arity,
}

/// One fixed grammar: `/<cmd>` followed by its declared parameters.
pub struct Grammar {
    regex: &'static LazyLock<Regex>,
    params: &'static [Param],
}

/// `/<cmd> <group>`
pub static CMD_GROUP: Grammar = Grammar {
    regex: &CMD_GROUP_RE,
    params: &[GROUP_PARAM],
};

/// `/<cmd> <group> [any text]`
pub static CMD_GROUP_WITH_TAIL: Grammar = Grammar {
    regex: &CMD_GROUP_WITH_TAIL_RE,
    params: &[GROUP_PARAM],
};

/// `/<cmd> <group> <alias>`
pub static CMD_GROUP_ALIAS: Grammar = Grammar {
    regex: &CMD_GROUP_ALIAS_RE,
    params: &[GROUP_PARAM, ALIAS_PARAM],
};

/// `/<cmd> <group> <member>+`
pub static CMD_GROUP_MEMBERS: Grammar = Grammar {
    regex: &CMD_GROUP_MEMBERS_RE,
    params: &[GROUP_PARAM, MEMBERS_PARAM],
};

/// `/<cmd> <member>+`
pub static CMD_MEMBERS: Grammar = Grammar {
    regex: &CMD_MEMBERS_RE,
    params: &[MEMBERS_PARAM],
};

impl Grammar {
    /// Full-string match. Partial matches are rejected.
    pub fn captures<'t>(&self, input: &'t str) -> Option<Captures<'t>> {
        self.regex.captures(input)
    }

    /// Constraints the input breaks, in declaration order. Falls back to all of them
    /// when every token is fine but the overall shape is not (e.g. extra arguments).
    pub fn violations(&self, input: &str) -> Vec<Constraint> {
        let mut tokens = input.split_whitespace().skip(1);
        let mut violated = Vec::new();
        for param in self.params {
            let ok = match param.arity {
                Arity::One => tokens.next().is_some_and(param.accepts),
                Arity::OneOrMore => {
                    let rest: Vec<&str> = tokens.by_ref().collect();
                    !rest.is_empty() && rest.into_iter().all(param.accepts)
                }
            };
            if !ok {
                violated.push(param.constraint);
            }
        }
        if violated.is_empty() {
            violated = self.constraints();
        }
        violated
    }

    pub fn constraints(&self) -> Vec<Constraint> {
        self.params.iter().map(|p| p.constraint).collect()
    }
}

fn is_group_token(token: &str) -> bool {
    !token.is_empty()
        && token.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё' | '-' | '_')
        })
}

fn is_member_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(grammar: &Grammar, input: &str) -> Option<String> {
        grammar
            .captures(input)
            .and_then(|c| c.name("group").map(|m| m.as_str().to_string()))
    }

    #[test]
    fn test_parse_command_and_group() {
        assert_eq!(group(&CMD_GROUP, "/cmd apple123"), Some("apple123".into()));
        assert_eq!(group(&CMD_GROUP, "/cmd@my_bot ёлка-2"), Some("ёлка-2".into()));
    }

    #[test]
    fn test_group_rejects_any_disallowed_char() {
        for input in [
            "/cmd apple!",
            "/cmd app le",
            "/cmd",
            "/cmd apple123 extra",
            "cmd apple",
            " /cmd apple",
            "/cmd äpple",
        ] {
            assert!(CMD_GROUP.captures(input).is_none(), "{input}");
        }
    }

    #[test]
    fn test_parse_command_and_group_with_tail() {
        assert_eq!(
            group(&CMD_GROUP_WITH_TAIL, "/cmd apple123 some text, 123!"),
            Some("apple123".into())
        );
        assert_eq!(
            group(&CMD_GROUP_WITH_TAIL, "/cmd apple123\nline one\nline two"),
            Some("apple123".into())
        );
        assert_eq!(group(&CMD_GROUP_WITH_TAIL, "/cmd apple123"), Some("apple123".into()));
        assert!(CMD_GROUP_WITH_TAIL.captures("/cmd apple!23 text").is_none());
    }

    #[test]
    fn test_parse_command_and_members() {
        assert!(CMD_MEMBERS.captures("/cmd user1 user2 user3").is_some());
        assert!(CMD_MEMBERS.captures("/cmd @user1 @Юзер_2").is_some());
        assert!(CMD_MEMBERS.captures("/cmd").is_none());
        assert!(CMD_MEMBERS.captures("/cmd user;1").is_none());
    }

    #[test]
    fn test_parse_command_and_group_with_members() {
        assert_eq!(
            group(&CMD_GROUP_MEMBERS, "/cmd apple123 user1 user2 user3"),
            Some("apple123".into())
        );
        assert!(CMD_GROUP_MEMBERS.captures("/cmd apple123").is_none());
    }

    #[test]
    fn test_parse_command_and_group_with_alias() {
        let caps = CMD_GROUP_ALIAS.captures("/cmd apple123 fruit456").unwrap();
        assert_eq!(&caps["group"], "apple123");
        assert_eq!(&caps["alias"], "fruit456");
        assert!(CMD_GROUP_ALIAS.captures("/cmd apple123").is_none());
    }

    #[test]
    fn test_violations_name_the_bad_token() {
        let violated = CMD_GROUP_ALIAS.violations("/add_alias good bad!");
        assert_eq!(violated.len(), 1);
        assert_eq!(violated[0].name, "alias");

        let violated = CMD_GROUP_MEMBERS.violations("/add_members gr*up");
        let names: Vec<_> = violated.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["group", "members"]);
    }

    #[test]
    fn test_violations_fall_back_to_all_constraints() {
        let violated = CMD_GROUP.violations("/members one two");
        assert_eq!(violated, CMD_GROUP.constraints());
    }
}
