//! In-process repository. Implements Repository with snapshot transactions.
//!
//! A transaction holds the writer mutex from `begin` until `commit`/`rollback` and works on a
//! copy of the state, so writers are serialized and a failed operation leaves nothing behind.
//! Reads go to the last committed snapshot and never wait for an open transaction.
//! Every write-path call is appended to a history log (committed transactions only).

use crate::domain::{
    AliasId, Chat, ChatId, DomainError, GroupAlias, GroupId, GroupName, Member, MemberName,
    UserId,
};
use crate::ports::{RepoTx, Repository};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

#[derive(Debug, Clone, Default)]
struct State {
    chats: BTreeMap<ChatId, Chat>,
    groups: BTreeMap<GroupId, ChatId>,
    aliases: BTreeMap<AliasId, GroupAlias>,
    members: Vec<(GroupId, Member)>,
    last_id: i64,
    history: Vec<String>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn aliases_by_chat(&self, chat_id: ChatId) -> Vec<GroupAlias> {
        self.aliases
            .values()
            .filter(|a| a.chat_id == chat_id)
            .cloned()
            .collect()
    }

    fn alias_by_name(&self, chat_id: ChatId, name: &GroupName) -> Option<GroupAlias> {
        self.aliases
            .values()
            .find(|a| a.chat_id == chat_id && &a.alias_name == name)
            .cloned()
    }

    fn members_by_group(&self, group_id: GroupId) -> Vec<Member> {
        self.members
            .iter()
            .filter(|(g, _)| *g == group_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn members_by_chat(&self, chat_id: ChatId) -> Vec<Member> {
        self.members
            .iter()
            .filter(|(g, _)| self.in_chat(*g, chat_id))
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn in_chat(&self, group_id: GroupId, chat_id: ChatId) -> bool {
        self.groups.get(&group_id) == Some(&chat_id)
    }
}

/// In-memory repository. Used by tests and by `storage = "memory"` (nothing survives a restart).
#[derive(Clone, Default)]
pub struct MemoryRepo {
    writer: Arc<Mutex<State>>,
    committed: Arc<RwLock<Arc<State>>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write-path calls of committed transactions, oldest first.
    pub async fn history(&self) -> Vec<String> {
        self.snapshot().await.history.clone()
    }

    pub async fn clear_history(&self) {
        let mut state = self.writer.lock().await;
        state.history.clear();
        *self.committed.write().await = Arc::new(state.clone());
    }

    async fn snapshot(&self) -> Arc<State> {
        Arc::clone(&*self.committed.read().await)
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepo {
    async fn begin(&self) -> Result<Box<dyn RepoTx>, DomainError> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            committed: Arc::clone(&self.committed),
            working,
        }))
    }

    async fn get_anarchy_flag(&self, chat_id: ChatId) -> Result<bool, DomainError> {
        let state = self.snapshot().await;
        Ok(state
            .chats
            .get(&chat_id)
            .is_some_and(|c| c.is_anarchy_enabled))
    }

    async fn list_aliases_by_chat(&self, chat_id: ChatId) -> Result<Vec<GroupAlias>, DomainError> {
        Ok(self.snapshot().await.aliases_by_chat(chat_id))
    }

    async fn find_alias_by_name(
        &self,
        chat_id: ChatId,
        name: &GroupName,
    ) -> Result<Option<GroupAlias>, DomainError> {
        Ok(self.snapshot().await.alias_by_name(chat_id, name))
    }

    async fn list_members_by_group(&self, group_id: GroupId) -> Result<Vec<Member>, DomainError> {
        Ok(self.snapshot().await.members_by_group(group_id))
    }

    async fn list_members_by_chat(&self, chat_id: ChatId) -> Result<Vec<Member>, DomainError> {
        Ok(self.snapshot().await.members_by_chat(chat_id))
    }
}

/// Open transaction: exclusive write access plus a working copy.
pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    committed: Arc<RwLock<Arc<State>>>,
    working: State,
}

impl MemoryTx {
    fn record(&mut self, entry: String) {
        self.working.history.push(entry);
    }
}

#[async_trait::async_trait]
impl RepoTx for MemoryTx {
    async fn upsert_chat(&mut self, chat: &Chat) -> Result<(), DomainError> {
        self.working
            .chats
            .entry(chat.id)
            .and_modify(|c| {
                c.title = chat.title.clone();
                c.username = chat.username.clone();
            })
            .or_insert_with(|| chat.clone());
        self.record(format!("upsert_chat chat={}", chat.id));
        Ok(())
    }

    async fn lock_chat_for_update(&mut self, chat_id: ChatId) -> Result<(), DomainError> {
        self.record(format!("lock_chat chat={chat_id}"));
        Ok(())
    }

    async fn list_aliases_by_chat(
        &mut self,
        chat_id: ChatId,
    ) -> Result<Vec<GroupAlias>, DomainError> {
        Ok(self.working.aliases_by_chat(chat_id))
    }

    async fn list_aliases_by_group(
        &mut self,
        group_id: GroupId,
    ) -> Result<Vec<GroupAlias>, DomainError> {
        Ok(self
            .working
            .aliases
            .values()
            .filter(|a| a.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn find_alias_by_name(
        &mut self,
        chat_id: ChatId,
        name: &GroupName,
    ) -> Result<Option<GroupAlias>, DomainError> {
        Ok(self.working.alias_by_name(chat_id, name))
    }

    async fn create_group(&mut self, chat_id: ChatId) -> Result<GroupId, DomainError> {
        let group_id = GroupId(self.working.next_id());
        self.working.groups.insert(group_id, chat_id);
        self.record(format!("create_group chat={chat_id} group={group_id}"));
        Ok(group_id)
    }

    async fn delete_group(&mut self, group_id: GroupId) -> Result<(), DomainError> {
        self.working
            .groups
            .remove(&group_id)
            .ok_or_else(|| DomainError::Repo(format!("group {group_id} does not exist")))?;
        self.record(format!("delete_group group={group_id}"));
        Ok(())
    }

    async fn create_alias(
        &mut self,
        chat_id: ChatId,
        group_id: GroupId,
        name: &GroupName,
    ) -> Result<(), DomainError> {
        if self.working.alias_by_name(chat_id, name).is_none() {
            let alias_id = AliasId(self.working.next_id());
            self.working.aliases.insert(
                alias_id,
                GroupAlias {
                    chat_id,
                    group_id,
                    alias_id,
                    alias_name: name.clone(),
                },
            );
        }
        self.record(format!("create_alias group={group_id} name={name}"));
        Ok(())
    }

    async fn delete_alias(&mut self, alias_id: AliasId) -> Result<(), DomainError> {
        self.working
            .aliases
            .remove(&alias_id)
            .ok_or_else(|| DomainError::Repo(format!("alias {alias_id} does not exist")))?;
        self.record(format!("delete_alias alias={alias_id}"));
        Ok(())
    }

    async fn list_members_by_group(
        &mut self,
        group_id: GroupId,
    ) -> Result<Vec<Member>, DomainError> {
        Ok(self.working.members_by_group(group_id))
    }

    async fn add_member(&mut self, group_id: GroupId, member: &Member) -> Result<(), DomainError> {
        let conflict = self
            .working
            .members
            .iter()
            .any(|(g, m)| *g == group_id && m.is_same_person(member));
        if !conflict {
            self.working.members.push((group_id, member.clone()));
        }
        self.record(format!("add_member group={group_id} name={}", member.name));
        Ok(())
    }

    async fn remove_member_by_name(
        &mut self,
        group_id: GroupId,
        name: &MemberName,
    ) -> Result<(), DomainError> {
        self.working
            .members
            .retain(|(g, m)| !(*g == group_id && &m.name == name));
        self.record(format!("remove_member group={group_id} name={name}"));
        Ok(())
    }

    async fn remove_member_by_user_id(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<(), DomainError> {
        self.working
            .members
            .retain(|(g, m)| !(*g == group_id && m.user_id == Some(user_id)));
        self.record(format!("remove_member group={group_id} user={user_id}"));
        Ok(())
    }

    async fn remove_chat_member_by_name(
        &mut self,
        chat_id: ChatId,
        name: &MemberName,
    ) -> Result<(), DomainError> {
        let groups = self.working.groups.clone();
        self.working
            .members
            .retain(|(g, m)| !(groups.get(g) == Some(&chat_id) && &m.name == name));
        self.record(format!("remove_chat_member chat={chat_id} name={name}"));
        Ok(())
    }

    async fn remove_chat_member_by_user_id(
        &mut self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<(), DomainError> {
        let groups = self.working.groups.clone();
        self.working
            .members
            .retain(|(g, m)| !(groups.get(g) == Some(&chat_id) && m.user_id == Some(user_id)));
        self.record(format!("remove_chat_member chat={chat_id} user={user_id}"));
        Ok(())
    }

    async fn set_chat_member_enabled_by_name(
        &mut self,
        chat_id: ChatId,
        name: &MemberName,
        enabled: bool,
    ) -> Result<(), DomainError> {
        let State {
            groups, members, ..
        } = &mut self.working;
        for (g, m) in members.iter_mut() {
            if groups.get(g) == Some(&chat_id) && &m.name == name {
                m.enabled = enabled;
            }
        }
        self.record(format!(
            "set_member_enabled chat={chat_id} name={name} enabled={enabled}"
        ));
        Ok(())
    }

    async fn set_chat_member_enabled_by_user_id(
        &mut self,
        chat_id: ChatId,
        user_id: UserId,
        enabled: bool,
    ) -> Result<(), DomainError> {
        let State {
            groups, members, ..
        } = &mut self.working;
        for (g, m) in members.iter_mut() {
            if groups.get(g) == Some(&chat_id) && m.user_id == Some(user_id) {
                m.enabled = enabled;
            }
        }
        self.record(format!(
            "set_member_enabled chat={chat_id} user={user_id} enabled={enabled}"
        ));
        Ok(())
    }

    async fn set_anarchy_flag(&mut self, chat_id: ChatId, enabled: bool) -> Result<(), DomainError> {
        let chat = self
            .working
            .chats
            .get_mut(&chat_id)
            .ok_or_else(|| DomainError::Repo(format!("chat {chat_id} does not exist")))?;
        chat.is_anarchy_enabled = enabled;
        self.record(format!("set_anarchy chat={chat_id} enabled={enabled}"));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let MemoryTx {
            mut guard,
            committed,
            working,
        } = *self;
        *committed.write().await = Arc::new(working.clone());
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}
