//! Group, alias and member operations for one chat.
//!
//! Every mutating operation is one unit of work: open a transaction, lock the chat row,
//! read/check/write on the transaction handle, then commit on success or roll back on
//! any failure. Listing reads go straight to the repository without a lock.

use crate::domain::limits::is_virtual_all_group;
use crate::domain::{
    Chat, ChatId, ChatInfo, DomainError, GroupAlias, GroupId, GroupName, GroupWithAliases,
    Limits, Member, MemberName, UserId,
};
use crate::ports::{RepoTx, Repository};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Commit on `Ok`, roll back on `Err`. A failed rollback is logged; the original error wins.
async fn complete<T>(
    tx: Box<dyn RepoTx>,
    outcome: Result<T, DomainError>,
) -> Result<T, DomainError> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}

fn group_not_found(chat_id: ChatId, name: &GroupName) -> DomainError {
    DomainError::not_found(
        format!("chat=[{chat_id}], group=[{name}]"),
        format!("Group {name} not found!"),
    )
}

fn reserved_name(name: &GroupName) -> DomainError {
    DomainError::validation(
        format!("reserved group name [{name}]"),
        format!("The name {name} is reserved for the whole chat."),
    )
}

fn require_members(members: &[Member]) -> Result<(), DomainError> {
    if members.is_empty() {
        return Err(DomainError::validation(
            "empty member set",
            "Mention at least one member: @username or a user picked from the mention list.",
        ));
    }
    Ok(())
}

fn chat_row(chat: &ChatInfo) -> Chat {
    Chat {
        id: chat.id,
        title: chat.title.clone(),
        username: chat.username.clone(),
        is_anarchy_enabled: false,
    }
}

/// Aliases grouped by group id; canonical name is the oldest alias.
fn group_aliases(aliases: Vec<GroupAlias>) -> Vec<GroupWithAliases> {
    let mut by_group: BTreeMap<GroupId, Vec<GroupAlias>> = BTreeMap::new();
    for alias in aliases {
        by_group.entry(alias.group_id).or_default().push(alias);
    }
    by_group
        .into_values()
        .filter_map(|mut aliases| {
            aliases.sort_by_key(|a| a.alias_id);
            let group_id = aliases.first()?.group_id;
            let mut names = aliases.into_iter().map(|a| a.alias_name);
            let group_name = names.next()?;
            Some(GroupWithAliases {
                group_id,
                group_name,
                alias_names: names.collect(),
            })
        })
        .collect()
}

/// Union without repeats of the same (name, user id) pair, first occurrence kept.
fn distinct_members(members: Vec<Member>) -> Vec<Member> {
    let mut seen: HashSet<(MemberName, Option<UserId>)> = HashSet::new();
    members
        .into_iter()
        .filter(|m| seen.insert((m.name.clone(), m.user_id)))
        .collect()
}

/// Domain operations over groups, aliases, members and chat settings.
pub struct GroupService {
    repo: Arc<dyn Repository>,
    limits: Limits,
}

impl GroupService {
    pub fn new(repo: Arc<dyn Repository>, limits: Limits) -> Self {
        Self { repo, limits }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// All groups of the chat, ordered by creation. No groups at all is `NotFound`.
    pub async fn get_groups(&self, chat_id: ChatId) -> Result<Vec<GroupWithAliases>, DomainError> {
        let aliases = self.repo.list_aliases_by_chat(chat_id).await?;
        if aliases.is_empty() {
            return Err(DomainError::not_found(
                format!("chat=[{chat_id}] has no groups"),
                "There are no groups yet! Create one with /add_group.",
            ));
        }
        Ok(group_aliases(aliases))
    }

    /// Members of a group. Virtual names (all/все/everyone) resolve to the whole chat.
    pub async fn get_group_members(
        &self,
        chat_id: ChatId,
        name: &GroupName,
    ) -> Result<Vec<Member>, DomainError> {
        if is_virtual_all_group(name.as_str()) {
            return self.get_chat_members(chat_id).await;
        }
        let alias = self
            .repo
            .find_alias_by_name(chat_id, name)
            .await?
            .ok_or_else(|| group_not_found(chat_id, name))?;
        self.repo.list_members_by_group(alias.group_id).await
    }

    /// Canonical name and members of a group picked by id. The group must belong to the chat.
    pub async fn get_group_by_id(
        &self,
        chat_id: ChatId,
        group_id: GroupId,
    ) -> Result<(GroupName, Vec<Member>), DomainError> {
        let aliases = self.repo.list_aliases_by_chat(chat_id).await?;
        let name = aliases
            .into_iter()
            .filter(|a| a.group_id == group_id)
            .min_by_key(|a| a.alias_id)
            .map(|a| a.alias_name)
            .ok_or_else(|| {
                DomainError::not_found(
                    format!("chat=[{chat_id}], group_id=[{group_id}]"),
                    "This group no longer exists!",
                )
            })?;
        let members = self.repo.list_members_by_group(group_id).await?;
        Ok((name, members))
    }

    /// Every member of every group in the chat, de-duplicated by (name, user id).
    pub async fn get_chat_members(&self, chat_id: ChatId) -> Result<Vec<Member>, DomainError> {
        let members = self.repo.list_members_by_chat(chat_id).await?;
        Ok(distinct_members(members))
    }

    pub async fn add_group(&self, chat: &ChatInfo, name: &GroupName) -> Result<(), DomainError> {
        if is_virtual_all_group(name.as_str()) {
            return Err(reserved_name(name));
        }
        let mut tx = self.repo.begin().await?;
        let outcome = self.add_group_in(tx.as_mut(), chat, name).await;
        complete(tx, outcome).await?;
        info!(chat_id = %chat.id, group = %name, "group added");
        Ok(())
    }

    async fn add_group_in(
        &self,
        tx: &mut dyn RepoTx,
        chat: &ChatInfo,
        name: &GroupName,
    ) -> Result<(), DomainError> {
        tx.upsert_chat(&chat_row(chat)).await?;
        tx.lock_chat_for_update(chat.id).await?;

        let aliases = tx.list_aliases_by_chat(chat.id).await?;
        let groups: HashSet<GroupId> = aliases.iter().map(|a| a.group_id).collect();
        if groups.len() >= self.limits.max_groups_per_chat {
            return Err(DomainError::validation(
                format!("chat=[{}] has {} groups", chat.id, groups.len()),
                format!(
                    "A chat can have at most {} groups.",
                    self.limits.max_groups_per_chat
                ),
            ));
        }
        if aliases.iter().any(|a| &a.alias_name == name) {
            return Err(DomainError::integrity(
                format!("chat=[{}], group=[{name}] already exists", chat.id),
                format!("Group {name} already exists!"),
            ));
        }

        let group_id = tx.create_group(chat.id).await?;
        tx.create_alias(chat.id, group_id, name).await
    }

    /// Delete a group. Without `force` a group that still has members is left untouched.
    pub async fn remove_group(
        &self,
        chat_id: ChatId,
        name: &GroupName,
        force: bool,
    ) -> Result<(), DomainError> {
        let mut tx = self.repo.begin().await?;
        let outcome = remove_group_in(tx.as_mut(), chat_id, name, force).await;
        complete(tx, outcome).await?;
        info!(%chat_id, group = %name, force, "group removed");
        Ok(())
    }

    pub async fn add_alias(
        &self,
        chat_id: ChatId,
        group: &GroupName,
        alias: &GroupName,
    ) -> Result<(), DomainError> {
        if is_virtual_all_group(alias.as_str()) {
            return Err(reserved_name(alias));
        }
        let mut tx = self.repo.begin().await?;
        let outcome = self.add_alias_in(tx.as_mut(), chat_id, group, alias).await;
        complete(tx, outcome).await?;
        info!(%chat_id, %group, %alias, "alias added");
        Ok(())
    }

    async fn add_alias_in(
        &self,
        tx: &mut dyn RepoTx,
        chat_id: ChatId,
        group: &GroupName,
        alias: &GroupName,
    ) -> Result<(), DomainError> {
        tx.lock_chat_for_update(chat_id).await?;
        let target = tx
            .find_alias_by_name(chat_id, group)
            .await?
            .ok_or_else(|| group_not_found(chat_id, group))?;

        if tx.find_alias_by_name(chat_id, alias).await?.is_some() {
            return Err(DomainError::integrity(
                format!("chat=[{chat_id}], alias=[{alias}] already taken"),
                format!("The name {alias} is already used by a group!"),
            ));
        }
        let existing = tx.list_aliases_by_group(target.group_id).await?;
        if existing.len() >= self.limits.max_aliases_per_group {
            return Err(DomainError::validation(
                format!("group=[{}] has {} aliases", target.group_id, existing.len()),
                format!(
                    "A group can have at most {} names.",
                    self.limits.max_aliases_per_group
                ),
            ));
        }
        tx.create_alias(chat_id, target.group_id, alias).await
    }

    /// Remove one name of a group. The last remaining name cannot be removed.
    pub async fn remove_alias(&self, chat_id: ChatId, alias: &GroupName) -> Result<(), DomainError> {
        let mut tx = self.repo.begin().await?;
        let outcome = remove_alias_in(tx.as_mut(), chat_id, alias).await;
        complete(tx, outcome).await?;
        info!(%chat_id, %alias, "alias removed");
        Ok(())
    }

    /// Capacity is checked before duplicates; either failure leaves the group unchanged.
    pub async fn add_members(
        &self,
        chat_id: ChatId,
        group: &GroupName,
        members: &[Member],
    ) -> Result<(), DomainError> {
        require_members(members)?;
        let mut tx = self.repo.begin().await?;
        let outcome = self.add_members_in(tx.as_mut(), chat_id, group, members).await;
        complete(tx, outcome).await?;
        info!(%chat_id, %group, count = members.len(), "members added");
        Ok(())
    }

    async fn add_members_in(
        &self,
        tx: &mut dyn RepoTx,
        chat_id: ChatId,
        group: &GroupName,
        members: &[Member],
    ) -> Result<(), DomainError> {
        tx.lock_chat_for_update(chat_id).await?;
        let target = tx
            .find_alias_by_name(chat_id, group)
            .await?
            .ok_or_else(|| group_not_found(chat_id, group))?;

        let existing = tx.list_members_by_group(target.group_id).await?;
        let max = self.limits.max_members_per_group;
        if existing.len() + members.len() > max {
            return Err(DomainError::validation(
                format!(
                    "group=[{group}] has {} members, adding {}",
                    existing.len(),
                    members.len()
                ),
                format!("A group can have at most {max} members."),
            ));
        }
        if let Some(dup) = members
            .iter()
            .find(|m| existing.iter().any(|e| e.is_same_person(m)))
        {
            return Err(DomainError::integrity(
                format!("group=[{group}], member=[{}] already present", dup.name),
                format!("{} is already in group {group}!", dup.name),
            ));
        }

        for member in members {
            tx.add_member(target.group_id, member).await?;
        }
        Ok(())
    }

    pub async fn remove_members(
        &self,
        chat_id: ChatId,
        group: &GroupName,
        members: &[Member],
    ) -> Result<(), DomainError> {
        require_members(members)?;
        let mut tx = self.repo.begin().await?;
        let outcome = remove_members_in(tx.as_mut(), chat_id, group, members).await;
        complete(tx, outcome).await?;
        info!(%chat_id, %group, count = members.len(), "members removed");
        Ok(())
    }

    /// Remove members from every group of the chat.
    pub async fn purge_members(&self, chat_id: ChatId, members: &[Member]) -> Result<(), DomainError> {
        require_members(members)?;
        let mut tx = self.repo.begin().await?;
        let outcome = purge_members_in(tx.as_mut(), chat_id, members).await;
        complete(tx, outcome).await?;
        info!(%chat_id, count = members.len(), "members purged");
        Ok(())
    }

    /// Muted members stay in their groups but are skipped by mentions.
    pub async fn mute_members(&self, chat_id: ChatId, members: &[Member]) -> Result<(), DomainError> {
        self.set_members_enabled(chat_id, members, false).await
    }

    pub async fn unmute_members(&self, chat_id: ChatId, members: &[Member]) -> Result<(), DomainError> {
        self.set_members_enabled(chat_id, members, true).await
    }

    async fn set_members_enabled(
        &self,
        chat_id: ChatId,
        members: &[Member],
        enabled: bool,
    ) -> Result<(), DomainError> {
        require_members(members)?;
        let mut tx = self.repo.begin().await?;
        let outcome = set_enabled_in(tx.as_mut(), chat_id, members, enabled).await;
        complete(tx, outcome).await?;
        info!(%chat_id, count = members.len(), enabled, "member mention state changed");
        Ok(())
    }

    pub async fn enable_anarchy(&self, chat: &ChatInfo) -> Result<(), DomainError> {
        self.set_anarchy(chat, true).await
    }

    pub async fn disable_anarchy(&self, chat: &ChatInfo) -> Result<(), DomainError> {
        self.set_anarchy(chat, false).await
    }

    /// Upsert the chat row, then store the flag. Idempotent.
    async fn set_anarchy(&self, chat: &ChatInfo, enabled: bool) -> Result<(), DomainError> {
        let mut tx = self.repo.begin().await?;
        let outcome = set_anarchy_in(tx.as_mut(), chat, enabled).await;
        complete(tx, outcome).await?;
        info!(chat_id = %chat.id, enabled, "anarchy flag set");
        Ok(())
    }
}

async fn remove_group_in(
    tx: &mut dyn RepoTx,
    chat_id: ChatId,
    name: &GroupName,
    force: bool,
) -> Result<(), DomainError> {
    tx.lock_chat_for_update(chat_id).await?;
    let target = tx
        .find_alias_by_name(chat_id, name)
        .await?
        .ok_or_else(|| group_not_found(chat_id, name))?;

    let members = tx.list_members_by_group(target.group_id).await?;
    if !members.is_empty() {
        if !force {
            return Err(DomainError::integrity(
                format!("group=[{name}] has {} members", members.len()),
                format!(
                    "Group {name} is not empty! Remove its members first or use /remove_group_force."
                ),
            ));
        }
        debug!(group = %name, count = members.len(), "removing members before group");
        for member in &members {
            remove_from_group(tx, target.group_id, member).await?;
        }
    }

    for alias in tx.list_aliases_by_group(target.group_id).await? {
        tx.delete_alias(alias.alias_id).await?;
    }
    tx.delete_group(target.group_id).await
}

async fn remove_alias_in(
    tx: &mut dyn RepoTx,
    chat_id: ChatId,
    alias: &GroupName,
) -> Result<(), DomainError> {
    tx.lock_chat_for_update(chat_id).await?;
    let target = tx
        .find_alias_by_name(chat_id, alias)
        .await?
        .ok_or_else(|| group_not_found(chat_id, alias))?;

    let names = tx.list_aliases_by_group(target.group_id).await?;
    if names.len() <= 1 {
        return Err(DomainError::validation(
            format!("alias=[{alias}] is the last name of group {}", target.group_id),
            format!("{alias} is the only name of its group. Use /remove_group instead."),
        ));
    }
    tx.delete_alias(target.alias_id).await
}

async fn remove_members_in(
    tx: &mut dyn RepoTx,
    chat_id: ChatId,
    group: &GroupName,
    members: &[Member],
) -> Result<(), DomainError> {
    tx.lock_chat_for_update(chat_id).await?;
    let target = tx
        .find_alias_by_name(chat_id, group)
        .await?
        .ok_or_else(|| group_not_found(chat_id, group))?;
    for member in members {
        remove_from_group(tx, target.group_id, member).await?;
    }
    Ok(())
}

async fn remove_from_group(
    tx: &mut dyn RepoTx,
    group_id: GroupId,
    member: &Member,
) -> Result<(), DomainError> {
    match member.user_id {
        Some(user_id) => tx.remove_member_by_user_id(group_id, user_id).await,
        None => tx.remove_member_by_name(group_id, &member.name).await,
    }
}

async fn purge_members_in(
    tx: &mut dyn RepoTx,
    chat_id: ChatId,
    members: &[Member],
) -> Result<(), DomainError> {
    tx.lock_chat_for_update(chat_id).await?;
    for member in members {
        match member.user_id {
            Some(user_id) => tx.remove_chat_member_by_user_id(chat_id, user_id).await?,
            None => tx.remove_chat_member_by_name(chat_id, &member.name).await?,
        }
    }
    Ok(())
}

async fn set_enabled_in(
    tx: &mut dyn RepoTx,
    chat_id: ChatId,
    members: &[Member],
    enabled: bool,
) -> Result<(), DomainError> {
    tx.lock_chat_for_update(chat_id).await?;
    for member in members {
        match member.user_id {
            Some(user_id) => {
                tx.set_chat_member_enabled_by_user_id(chat_id, user_id, enabled)
                    .await?
            }
            None => {
                tx.set_chat_member_enabled_by_name(chat_id, &member.name, enabled)
                    .await?
            }
        }
    }
    Ok(())
}

async fn set_anarchy_in(
    tx: &mut dyn RepoTx,
    chat: &ChatInfo,
    enabled: bool,
) -> Result<(), DomainError> {
    tx.upsert_chat(&chat_row(chat)).await?;
    tx.set_anarchy_flag(chat.id, enabled).await
}
