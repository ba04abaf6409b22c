//! Core domain layer. No external I/O dependencies.
//!
//! Entities, validated names, limits, grammars and the command registry live here.
//! Dependencies flow inward.

pub mod command;
pub mod entities;
pub mod errors;
pub mod grammar;
pub mod limits;
pub mod names;
pub mod picker;

pub use command::{Command, Grant, Tier};
pub use entities::{
    AliasId, Chat, ChatAdministrator, ChatId, ChatInfo, ChatType, EntityKind, GroupAlias,
    GroupId, GroupWithAliases, IncomingCallback, IncomingMessage, InlineButton, Member, MemberKey,
    MessageEntity, UserId,
};
pub use errors::{Constraint, DomainError};
pub use limits::Limits;
pub use names::{GroupName, MemberName};
pub use picker::{PickerAction, PickerCallback};
