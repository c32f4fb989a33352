//! 持久化接口：任务 / 日程 / 笔记的按用户隔离的 CRUD，以及跨轮 checkpoint
//!
//! 子 Agent 的工具只依赖这里的 trait；内置 InMemoryStore 供 CLI 与测试使用，
//! 生产环境可替换为任意数据库实现。

pub mod checkpoint;
pub mod memory;
pub mod models;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

pub use checkpoint::{CheckpointStore, InMemoryCheckpointStore, SqliteCheckpointStore};
pub use memory::InMemoryStore;
pub use models::{
    word_count, NewNote, NewSchedule, NewTask, Note, NoteCategory, NoteQuery, NoteUpdate,
    Schedule, ScheduleUpdate, Task, TaskUpdate, UserId, DEFAULT_SCHEDULE_COLOR,
};

/// 存储层错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// 任务持久化；所有查询均按 user_id 隔离，不存在返回 None
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, user_id: UserId, input: NewTask) -> Result<Task, StoreError>;
    async fn list_tasks(&self, user_id: UserId) -> Result<Vec<Task>, StoreError>;
    async fn get_task(&self, user_id: UserId, id: i64) -> Result<Option<Task>, StoreError>;
    async fn update_task(
        &self,
        user_id: UserId,
        id: i64,
        update: TaskUpdate,
    ) -> Result<Option<Task>, StoreError>;
    async fn delete_task(&self, user_id: UserId, id: i64) -> Result<bool, StoreError>;
    /// 最近创建的任务
    async fn latest_task(&self, user_id: UserId) -> Result<Option<Task>, StoreError>;
}

/// 日程持久化
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn create_schedule(
        &self,
        user_id: UserId,
        input: NewSchedule,
    ) -> Result<Schedule, StoreError>;
    /// 按开始时间升序
    async fn list_schedules(&self, user_id: UserId) -> Result<Vec<Schedule>, StoreError>;
    async fn get_schedule(&self, user_id: UserId, id: i64)
        -> Result<Option<Schedule>, StoreError>;
    async fn update_schedule(
        &self,
        user_id: UserId,
        id: i64,
        update: ScheduleUpdate,
    ) -> Result<Option<Schedule>, StoreError>;
    async fn delete_schedule(&self, user_id: UserId, id: i64) -> Result<bool, StoreError>;
    /// 开始日期（按日程自身时区）落在 [start, end] 闭区间内的日程
    async fn schedules_between(
        &self,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Schedule>, StoreError>;
    /// 开始时间不早于 now 的日程，按开始时间升序取前 limit 个
    async fn upcoming_schedules(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Schedule>, StoreError>;
}

/// 笔记持久化
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn create_note(&self, user_id: UserId, input: NewNote) -> Result<Note, StoreError>;
    /// 置顶优先，其次按更新时间倒序
    async fn list_notes(&self, user_id: UserId) -> Result<Vec<Note>, StoreError>;
    async fn get_note(&self, user_id: UserId, id: i64) -> Result<Option<Note>, StoreError>;
    async fn update_note(
        &self,
        user_id: UserId,
        id: i64,
        update: NoteUpdate,
    ) -> Result<Option<Note>, StoreError>;
    async fn delete_note(&self, user_id: UserId, id: i64) -> Result<bool, StoreError>;
    async fn search_notes(&self, user_id: UserId, query: &NoteQuery)
        -> Result<Vec<Note>, StoreError>;
    async fn pinned_notes(&self, user_id: UserId) -> Result<Vec<Note>, StoreError>;
    /// created_at 不早于 since 的笔记，按创建时间倒序取前 limit 个
    async fn recent_notes(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Note>, StoreError>;
}
