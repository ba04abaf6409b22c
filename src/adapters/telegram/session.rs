//! Session management. Persistent grammers session for the bot account.
//!
//! SqliteSession keeps the bot authorization and the peer access hashes across restarts,
//! so the bot token is exchanged only on first start.

use crate::domain::DomainError;
use grammers_session::storages::SqliteSession;
use std::path::Path;
use std::sync::Arc;

/// Opens (or creates) the session file at `path`. Parent directories are created as needed.
pub async fn open_bot_session(path: impl AsRef<Path>) -> Result<Arc<SqliteSession>, DomainError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DomainError::Config(format!("create session directory: {e}")))?;
    }
    let session = SqliteSession::open(path)
        .await
        .map_err(|e| DomainError::Config(format!("open session file {}: {e}", path.display())))?;
    Ok(Arc::new(session))
}
