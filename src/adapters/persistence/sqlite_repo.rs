//! SQLite-backed repository via libsql. Implements Repository and RepoTx.
//!
//! Uses the same libsql backend as grammers-session to avoid duplicate SQLite symbol link errors.
//! All chats share one database file: data/mentions.db
//! Inserts use ON CONFLICT DO NOTHING; logical duplicate checks belong to the use cases.

use crate::domain::{
    AliasId, Chat, ChatId, DomainError, GroupAlias, GroupId, GroupName, Member, MemberName,
    UserId,
};
use crate::ports::{RepoTx, Repository};
use libsql::params::IntoParams;
use libsql::{Connection, Database, Transaction, params};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CHATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chats (
    chat_id INTEGER PRIMARY KEY,
    chat_title TEXT,
    chat_username TEXT,
    is_anarchy_enabled INTEGER NOT NULL DEFAULT 0
)"#;

const GROUPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chat_groups (
    group_id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id INTEGER NOT NULL REFERENCES chats (chat_id)
)"#;

/// Alias names are unique per chat across all groups: the name is the group's lookup key.
const ALIASES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chat_group_aliases (
    alias_id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id INTEGER NOT NULL,
    group_id INTEGER NOT NULL REFERENCES chat_groups (group_id),
    alias_name TEXT NOT NULL,
    UNIQUE (chat_id, alias_name)
)"#;

const MEMBERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS members (
    member_id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id INTEGER NOT NULL REFERENCES chat_groups (group_id),
    member_name TEXT NOT NULL,
    user_id INTEGER,
    is_enabled INTEGER NOT NULL DEFAULT 1
)"#;
/// Same identity rule as the use cases: by user id when known, by name otherwise.
const MEMBERS_NAME_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_members_group_name \
     ON members (group_id, member_name) WHERE user_id IS NULL";
const MEMBERS_USER_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_members_group_user \
     ON members (group_id, user_id) WHERE user_id IS NOT NULL";
const ALIASES_GROUP_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_aliases_group ON chat_group_aliases (group_id)";

const SELECT_ALIASES: &str = "SELECT chat_id, group_id, alias_id, alias_name FROM chat_group_aliases";
const SELECT_MEMBERS_BY_GROUP: &str =
    "SELECT member_name, user_id, is_enabled FROM members WHERE group_id = ?1 ORDER BY member_id";
const SELECT_MEMBERS_BY_CHAT: &str = r#"
    SELECT m.member_name, m.user_id, m.is_enabled
    FROM members m
    JOIN chat_groups g ON g.group_id = m.group_id
    WHERE g.chat_id = ?1
    ORDER BY m.member_id
"#;

/// Milliseconds a writer waits for the database lock held by another transaction.
const BUSY_TIMEOUT_MS: u32 = 5_000;

fn db_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Repo(e.to_string())
}

/// SQLite repository. One database file (mentions.db) in the given base directory.
pub struct SqliteRepo {
    db: Database,
    db_path: PathBuf,
}

impl SqliteRepo {
    /// Connect to (or create) the SQLite database and ensure the schema exists.
    /// Call this once at startup; the returned repo is safe to share via Arc.
    ///
    /// WAL mode lets listing reads run while a writer holds the lock.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(db_err)?;
        let db_path = base.join("mentions.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        // PRAGMA returns a row (new value); use query and consume rows (execute fails when rows are returned).
        pragma(&conn, "PRAGMA journal_mode=WAL").await?;
        pragma(&conn, "PRAGMA synchronous=NORMAL").await?;

        for ddl in [
            CHATS_TABLE,
            GROUPS_TABLE,
            ALIASES_TABLE,
            MEMBERS_TABLE,
            MEMBERS_NAME_INDEX,
            MEMBERS_USER_INDEX,
            ALIASES_GROUP_INDEX,
        ] {
            conn.execute(ddl, ()).await.map_err(db_err)?;
        }

        info!(path = %db_path.display(), "SQLite connected with WAL mode");

        Ok(Self { db, db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn connection(&self) -> Result<Connection, DomainError> {
        let conn = self.db.connect().map_err(db_err)?;
        pragma(&conn, &format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}")).await?;
        Ok(conn)
    }
}

async fn pragma(conn: &Connection, sql: &str) -> Result<(), DomainError> {
    let mut rows = conn
        .query(sql, ())
        .await
        .map_err(|e| DomainError::Repo(format!("{sql} failed: {e}")))?;
    while rows.next().await.map_err(db_err)?.is_some() {}
    Ok(())
}

async fn load_aliases(
    conn: &Connection,
    filter: &str,
    params: impl IntoParams,
) -> Result<Vec<GroupAlias>, DomainError> {
    let sql = format!("{SELECT_ALIASES} WHERE {filter} ORDER BY alias_id");
    let mut rows = conn.query(&sql, params).await.map_err(db_err)?;
    let mut aliases = Vec::new();
    while let Some(row) = rows.next().await.map_err(db_err)? {
        let chat_id: i64 = row.get(0).map_err(db_err)?;
        let group_id: i64 = row.get(1).map_err(db_err)?;
        let alias_id: i64 = row.get(2).map_err(db_err)?;
        let alias_name: String = row.get(3).map_err(db_err)?;
        aliases.push(GroupAlias {
            chat_id: ChatId(chat_id),
            group_id: GroupId(group_id),
            alias_id: AliasId(alias_id),
            alias_name: GroupName::new(alias_name).map_err(db_err)?,
        });
    }
    Ok(aliases)
}

async fn load_members(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<Vec<Member>, DomainError> {
    let mut rows = conn.query(sql, params).await.map_err(db_err)?;
    let mut members = Vec::new();
    while let Some(row) = rows.next().await.map_err(db_err)? {
        let name: String = row.get(0).map_err(db_err)?;
        let user_id = row.get::<Option<i64>>(1).map_err(db_err)?;
        let enabled: i64 = row.get(2).map_err(db_err)?;
        members.push(Member {
            name: MemberName::new(name).map_err(db_err)?,
            user_id: user_id.map(UserId),
            enabled: enabled != 0,
        });
    }
    Ok(members)
}

#[async_trait::async_trait]
impl Repository for SqliteRepo {
    async fn begin(&self) -> Result<Box<dyn RepoTx>, DomainError> {
        let conn = self.connection().await?;
        let tx = conn.transaction().await.map_err(db_err)?;
        Ok(Box::new(SqliteTx { tx }))
    }

    async fn get_anarchy_flag(&self, chat_id: ChatId) -> Result<bool, DomainError> {
        let conn = self.connection().await?;
        let mut rows = conn
            .query(
                "SELECT is_anarchy_enabled FROM chats WHERE chat_id = ?1",
                params![chat_id.0],
            )
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => {
                let flag: i64 = row.get(0).map_err(db_err)?;
                Ok(flag != 0)
            }
            None => Ok(false),
        }
    }

    async fn list_aliases_by_chat(&self, chat_id: ChatId) -> Result<Vec<GroupAlias>, DomainError> {
        let conn = self.connection().await?;
        load_aliases(&conn, "chat_id = ?1", params![chat_id.0]).await
    }

    async fn find_alias_by_name(
        &self,
        chat_id: ChatId,
        name: &GroupName,
    ) -> Result<Option<GroupAlias>, DomainError> {
        let conn = self.connection().await?;
        let aliases = load_aliases(
            &conn,
            "chat_id = ?1 AND alias_name = ?2",
            params![chat_id.0, name.as_str()],
        )
        .await?;
        Ok(aliases.into_iter().next())
    }

    async fn list_members_by_group(&self, group_id: GroupId) -> Result<Vec<Member>, DomainError> {
        let conn = self.connection().await?;
        load_members(&conn, SELECT_MEMBERS_BY_GROUP, params![group_id.0]).await
    }

    async fn list_members_by_chat(&self, chat_id: ChatId) -> Result<Vec<Member>, DomainError> {
        let conn = self.connection().await?;
        load_members(&conn, SELECT_MEMBERS_BY_CHAT, params![chat_id.0]).await
    }
}

/// Open libsql transaction. Dropped without commit = rolled back.
pub struct SqliteTx {
    tx: Transaction,
}

impl SqliteTx {
    async fn execute(&self, sql: &str, params: impl IntoParams) -> Result<u64, DomainError> {
        self.tx.execute(sql, params).await.map_err(db_err)
    }
}

fn check_update_count(actual: u64, expected: u64, what: &str) -> Result<(), DomainError> {
    if actual == expected {
        Ok(())
    } else {
        Err(DomainError::Repo(format!(
            "wrong update count for {what}: actual=[{actual}], expected=[{expected}]"
        )))
    }
}

#[async_trait::async_trait]
impl RepoTx for SqliteTx {
    async fn upsert_chat(&mut self, chat: &Chat) -> Result<(), DomainError> {
        debug!(chat_id = %chat.id, "upserting chat");
        self.execute(
            r#"
            INSERT INTO chats (chat_id, chat_title, chat_username, is_anarchy_enabled)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (chat_id) DO UPDATE SET
                chat_title = excluded.chat_title,
                chat_username = excluded.chat_username
            "#,
            params![
                chat.id.0,
                chat.title.clone(),
                chat.username.clone(),
                chat.is_anarchy_enabled as i64
            ],
        )
        .await?;
        Ok(())
    }

    /// A no-op write takes SQLite's write lock; it is held until commit/rollback.
    async fn lock_chat_for_update(&mut self, chat_id: ChatId) -> Result<(), DomainError> {
        self.execute(
            "UPDATE chats SET chat_id = chat_id WHERE chat_id = ?1",
            params![chat_id.0],
        )
        .await?;
        Ok(())
    }

    async fn list_aliases_by_chat(
        &mut self,
        chat_id: ChatId,
    ) -> Result<Vec<GroupAlias>, DomainError> {
        load_aliases(&self.tx, "chat_id = ?1", params![chat_id.0]).await
    }

    async fn list_aliases_by_group(
        &mut self,
        group_id: GroupId,
    ) -> Result<Vec<GroupAlias>, DomainError> {
        load_aliases(&self.tx, "group_id = ?1", params![group_id.0]).await
    }

    async fn find_alias_by_name(
        &mut self,
        chat_id: ChatId,
        name: &GroupName,
    ) -> Result<Option<GroupAlias>, DomainError> {
        let aliases = load_aliases(
            &self.tx,
            "chat_id = ?1 AND alias_name = ?2",
            params![chat_id.0, name.as_str()],
        )
        .await?;
        Ok(aliases.into_iter().next())
    }

    async fn create_group(&mut self, chat_id: ChatId) -> Result<GroupId, DomainError> {
        let mut rows = self
            .tx
            .query(
                "INSERT INTO chat_groups (chat_id) VALUES (?1) RETURNING group_id",
                params![chat_id.0],
            )
            .await
            .map_err(db_err)?;
        let row = rows
            .next()
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::Repo("insert into chat_groups returned no id".into()))?;
        let group_id: i64 = row.get(0).map_err(db_err)?;
        Ok(GroupId(group_id))
    }

    async fn delete_group(&mut self, group_id: GroupId) -> Result<(), DomainError> {
        let n = self
            .execute(
                "DELETE FROM chat_groups WHERE group_id = ?1",
                params![group_id.0],
            )
            .await?;
        check_update_count(n, 1, "delete_group")
    }

    async fn create_alias(
        &mut self,
        chat_id: ChatId,
        group_id: GroupId,
        name: &GroupName,
    ) -> Result<(), DomainError> {
        self.execute(
            r#"
            INSERT INTO chat_group_aliases (chat_id, group_id, alias_name)
            VALUES (?1, ?2, ?3)
            ON CONFLICT DO NOTHING
            "#,
            params![chat_id.0, group_id.0, name.as_str()],
        )
        .await?;
        Ok(())
    }

    async fn delete_alias(&mut self, alias_id: AliasId) -> Result<(), DomainError> {
        let n = self
            .execute(
                "DELETE FROM chat_group_aliases WHERE alias_id = ?1",
                params![alias_id.0],
            )
            .await?;
        check_update_count(n, 1, "delete_alias")
    }

    async fn list_members_by_group(
        &mut self,
        group_id: GroupId,
    ) -> Result<Vec<Member>, DomainError> {
        load_members(&self.tx, SELECT_MEMBERS_BY_GROUP, params![group_id.0]).await
    }

    async fn add_member(&mut self, group_id: GroupId, member: &Member) -> Result<(), DomainError> {
        self.execute(
            r#"
            INSERT INTO members (group_id, member_name, user_id, is_enabled)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT DO NOTHING
            "#,
            params![
                group_id.0,
                member.name.as_str(),
                member.user_id.map(|u| u.0),
                member.enabled as i64
            ],
        )
        .await?;
        Ok(())
    }

    async fn remove_member_by_name(
        &mut self,
        group_id: GroupId,
        name: &MemberName,
    ) -> Result<(), DomainError> {
        self.execute(
            "DELETE FROM members WHERE group_id = ?1 AND member_name = ?2",
            params![group_id.0, name.as_str()],
        )
        .await?;
        Ok(())
    }

    async fn remove_member_by_user_id(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<(), DomainError> {
        self.execute(
            "DELETE FROM members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id.0, user_id.0],
        )
        .await?;
        Ok(())
    }

    async fn remove_chat_member_by_name(
        &mut self,
        chat_id: ChatId,
        name: &MemberName,
    ) -> Result<(), DomainError> {
        self.execute(
            r#"
            DELETE FROM members
            WHERE member_name = ?2
            AND group_id IN (SELECT group_id FROM chat_groups WHERE chat_id = ?1)
            "#,
            params![chat_id.0, name.as_str()],
        )
        .await?;
        Ok(())
    }

    async fn remove_chat_member_by_user_id(
        &mut self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<(), DomainError> {
        self.execute(
            r#"
            DELETE FROM members
            WHERE user_id = ?2
            AND group_id IN (SELECT group_id FROM chat_groups WHERE chat_id = ?1)
            "#,
            params![chat_id.0, user_id.0],
        )
        .await?;
        Ok(())
    }

    async fn set_chat_member_enabled_by_name(
        &mut self,
        chat_id: ChatId,
        name: &MemberName,
        enabled: bool,
    ) -> Result<(), DomainError> {
        self.execute(
            r#"
            UPDATE members SET is_enabled = ?3
            WHERE member_name = ?2
            AND group_id IN (SELECT group_id FROM chat_groups WHERE chat_id = ?1)
            "#,
            params![chat_id.0, name.as_str(), enabled as i64],
        )
        .await?;
        Ok(())
    }

    async fn set_chat_member_enabled_by_user_id(
        &mut self,
        chat_id: ChatId,
        user_id: UserId,
        enabled: bool,
    ) -> Result<(), DomainError> {
        self.execute(
            r#"
            UPDATE members SET is_enabled = ?3
            WHERE user_id = ?2
            AND group_id IN (SELECT group_id FROM chat_groups WHERE chat_id = ?1)
            "#,
            params![chat_id.0, user_id.0, enabled as i64],
        )
        .await?;
        Ok(())
    }

    async fn set_anarchy_flag(&mut self, chat_id: ChatId, enabled: bool) -> Result<(), DomainError> {
        let n = self
            .execute(
                "UPDATE chats SET is_anarchy_enabled = ?2 WHERE chat_id = ?1",
                params![chat_id.0, enabled as i64],
            )
            .await?;
        check_update_count(n, 1, "set_anarchy_flag")
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(db_err)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.rollback().await.map_err(db_err)
    }
}
