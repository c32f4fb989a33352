//! Checkpoint：按 thread_id 保存 / 恢复 OrchestratorState
//!
//! 每次保存追加一行（step 自增），加载时取最新一行；每个 thread 只保留最近 KEEP_CHECKPOINTS 行。
//! SQLite 实现经 spawn_blocking 调用 rusqlite。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{Mutex, RwLock};

use super::StoreError;
use crate::core::OrchestratorState;

/// 跨轮状态存储接口
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<OrchestratorState>, StoreError>;
    async fn save(&self, thread_id: &str, state: &OrchestratorState) -> Result<(), StoreError>;
}

/// 内存 checkpoint（进程退出即丢失）
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    states: RwLock<HashMap<String, OrchestratorState>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<OrchestratorState>, StoreError> {
        Ok(self.states.read().await.get(thread_id).cloned())
    }

    async fn save(&self, thread_id: &str, state: &OrchestratorState) -> Result<(), StoreError> {
        self.states
            .write()
            .await
            .insert(thread_id.to_string(), state.clone());
        Ok(())
    }
}

/// 每个 thread 保留的 checkpoint 行数
pub const KEEP_CHECKPOINTS: i64 = 3;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS checkpoints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id TEXT NOT NULL,
    step INTEGER NOT NULL,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checkpoints_thread ON checkpoints(thread_id, step);
"#;

/// SQLite checkpoint，状态以 JSON 文本存储
pub struct SqliteCheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCheckpointStore {
    /// 打开（或创建）数据库文件；父目录不存在时自动创建
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to create checkpoint dir: {}", e)))?;
        }

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            conn.execute_batch(SCHEMA)?;
            Ok::<_, StoreError>(conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("Task join error: {}", e)))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 某个 thread 已保存的 checkpoint 数量
    pub async fn count(&self, thread_id: &str) -> Result<usize, StoreError> {
        let conn = self.conn.clone();
        let thread_id = thread_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM checkpoints WHERE thread_id = ?1",
                params![&thread_id],
                |row| row.get(0),
            )?;
            Ok::<_, StoreError>(n as usize)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<OrchestratorState>, StoreError> {
        let conn = self.conn.clone();
        let thread_id = thread_id.to_string();
        let raw: Option<String> = tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.query_row(
                "SELECT state FROM checkpoints WHERE thread_id = ?1 ORDER BY step DESC LIMIT 1",
                params![&thread_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(|e| StoreError::Backend(format!("Task join error: {}", e)))??;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, thread_id: &str, state: &OrchestratorState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        let conn = self.conn.clone();
        let thread_id = thread_id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let now = chrono::Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO checkpoints (thread_id, step, state, created_at)
                 VALUES (?1, COALESCE((SELECT MAX(step) FROM checkpoints WHERE thread_id = ?1), -1) + 1, ?2, ?3)",
                params![&thread_id, &json, &now],
            )?;
            tx.execute(
                "DELETE FROM checkpoints
                 WHERE thread_id = ?1
                   AND step <= (SELECT MAX(step) FROM checkpoints WHERE thread_id = ?1) - ?2",
                params![&thread_id, KEEP_CHECKPOINTS],
            )?;
            tx.commit()?;
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Backend(format!("Task join error: {}", e)))?
    }
}
