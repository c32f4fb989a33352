//! 内存存储：任务 / 日程 / 笔记各一张表，ID 各自自增
//!
//! 进程内有效，用于 CLI 演示与测试。

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use super::{
    models::word_count, NewNote, NewSchedule, NewTask, Note, NoteQuery, NoteStore, NoteUpdate,
    Schedule, ScheduleStore, ScheduleUpdate, StoreError, Task, TaskStore, TaskUpdate, UserId,
};

#[derive(Debug)]
struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tasks: RwLock<Table<Task>>,
    schedules: RwLock<Table<Schedule>>,
    notes: RwLock<Table<Note>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn create_task(&self, user_id: UserId, input: NewTask) -> Result<Task, StoreError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(StoreError::Invalid("任务标题不能为空".to_string()));
        }
        let mut table = self.tasks.write().await;
        let now = Utc::now();
        let task = Task {
            id: table.allocate(),
            user_id,
            title,
            is_complete: input.is_complete,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(task.id, task.clone());
        Ok(task)
    }

    async fn list_tasks(&self, user_id: UserId) -> Result<Vec<Task>, StoreError> {
        let table = self.tasks.read().await;
        Ok(table
            .rows
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_task(&self, user_id: UserId, id: i64) -> Result<Option<Task>, StoreError> {
        let table = self.tasks.read().await;
        Ok(table.rows.get(&id).filter(|t| t.user_id == user_id).cloned())
    }

    async fn update_task(
        &self,
        user_id: UserId,
        id: i64,
        update: TaskUpdate,
    ) -> Result<Option<Task>, StoreError> {
        let title = match update.title {
            Some(raw) if raw.trim().is_empty() => {
                return Err(StoreError::Invalid("任务标题不能为空".to_string()))
            }
            Some(raw) => Some(raw.trim().to_string()),
            None => None,
        };
        let mut table = self.tasks.write().await;
        let Some(task) = table.rows.get_mut(&id).filter(|t| t.user_id == user_id) else {
            return Ok(None);
        };
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(done) = update.is_complete {
            task.is_complete = done;
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, user_id: UserId, id: i64) -> Result<bool, StoreError> {
        let mut table = self.tasks.write().await;
        if table.rows.get(&id).is_some_and(|t| t.user_id == user_id) {
            table.rows.remove(&id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn latest_task(&self, user_id: UserId) -> Result<Option<Task>, StoreError> {
        let table = self.tasks.read().await;
        Ok(table
            .rows
            .values()
            .rev()
            .find(|t| t.user_id == user_id)
            .cloned())
    }
}

#[async_trait]
impl ScheduleStore for InMemoryStore {
    async fn create_schedule(
        &self,
        user_id: UserId,
        input: NewSchedule,
    ) -> Result<Schedule, StoreError> {
        if input.end_time < input.start_time {
            return Err(StoreError::Invalid("结束时间不能早于开始时间".to_string()));
        }
        let mut table = self.schedules.write().await;
        let schedule = Schedule {
            id: table.allocate(),
            user_id,
            title: input.title,
            description: input.description,
            start_time: input.start_time,
            end_time: input.end_time,
            is_all_day: input.is_all_day,
            location: input.location,
            color: input.color,
            created_at: Utc::now(),
        };
        table.rows.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn list_schedules(&self, user_id: UserId) -> Result<Vec<Schedule>, StoreError> {
        let table = self.schedules.read().await;
        let mut list: Vec<Schedule> = table
            .rows
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by_key(|s| s.start_time);
        Ok(list)
    }

    async fn get_schedule(
        &self,
        user_id: UserId,
        id: i64,
    ) -> Result<Option<Schedule>, StoreError> {
        let table = self.schedules.read().await;
        Ok(table.rows.get(&id).filter(|s| s.user_id == user_id).cloned())
    }

    async fn update_schedule(
        &self,
        user_id: UserId,
        id: i64,
        update: ScheduleUpdate,
    ) -> Result<Option<Schedule>, StoreError> {
        let mut table = self.schedules.write().await;
        let Some(existing) = table.rows.get(&id).filter(|s| s.user_id == user_id) else {
            return Ok(None);
        };
        let mut schedule = existing.clone();
        if let Some(title) = update.title {
            schedule.title = title;
        }
        if let Some(description) = update.description {
            schedule.description = Some(description);
        }
        if let Some(start) = update.start_time {
            schedule.start_time = start;
        }
        if let Some(end) = update.end_time {
            schedule.end_time = end;
        }
        if let Some(all_day) = update.is_all_day {
            schedule.is_all_day = all_day;
        }
        if let Some(location) = update.location {
            schedule.location = Some(location);
        }
        if let Some(color) = update.color {
            schedule.color = color;
        }
        if schedule.end_time < schedule.start_time {
            return Err(StoreError::Invalid("结束时间不能早于开始时间".to_string()));
        }
        table.rows.insert(id, schedule.clone());
        Ok(Some(schedule))
    }

    async fn delete_schedule(&self, user_id: UserId, id: i64) -> Result<bool, StoreError> {
        let mut table = self.schedules.write().await;
        if table.rows.get(&id).is_some_and(|s| s.user_id == user_id) {
            table.rows.remove(&id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn schedules_between(
        &self,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Schedule>, StoreError> {
        let mut list = self.list_schedules(user_id).await?;
        list.retain(|s| {
            let day = s.start_time.date_naive();
            day >= start && day <= end
        });
        Ok(list)
    }

    async fn upcoming_schedules(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Schedule>, StoreError> {
        let mut list = self.list_schedules(user_id).await?;
        list.retain(|s| s.start_time >= now);
        list.truncate(limit);
        Ok(list)
    }
}

#[async_trait]
impl NoteStore for InMemoryStore {
    async fn create_note(&self, user_id: UserId, input: NewNote) -> Result<Note, StoreError> {
        let mut table = self.notes.write().await;
        let now = Utc::now();
        let note = Note {
            id: table.allocate(),
            user_id,
            word_count: word_count(&input.content),
            title: input.title,
            content: input.content,
            category: input.category,
            tags: input.tags,
            is_pinned: input.is_pinned,
            is_archived: input.is_archived,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(note.id, note.clone());
        Ok(note)
    }

    async fn list_notes(&self, user_id: UserId) -> Result<Vec<Note>, StoreError> {
        let table = self.notes.read().await;
        let mut list: Vec<Note> = table
            .rows
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then(b.updated_at.cmp(&a.updated_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(list)
    }

    async fn get_note(&self, user_id: UserId, id: i64) -> Result<Option<Note>, StoreError> {
        let table = self.notes.read().await;
        Ok(table.rows.get(&id).filter(|n| n.user_id == user_id).cloned())
    }

    async fn update_note(
        &self,
        user_id: UserId,
        id: i64,
        update: NoteUpdate,
    ) -> Result<Option<Note>, StoreError> {
        let mut table = self.notes.write().await;
        let Some(note) = table.rows.get_mut(&id).filter(|n| n.user_id == user_id) else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            note.title = title;
        }
        if let Some(content) = update.content {
            note.word_count = word_count(&content);
            note.content = content;
        }
        if let Some(category) = update.category {
            note.category = category;
        }
        if let Some(tags) = update.tags {
            note.tags = tags;
        }
        if let Some(pinned) = update.is_pinned {
            note.is_pinned = pinned;
        }
        if let Some(archived) = update.is_archived {
            note.is_archived = archived;
        }
        note.updated_at = Utc::now();
        Ok(Some(note.clone()))
    }

    async fn delete_note(&self, user_id: UserId, id: i64) -> Result<bool, StoreError> {
        let mut table = self.notes.write().await;
        if table.rows.get(&id).is_some_and(|n| n.user_id == user_id) {
            table.rows.remove(&id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn search_notes(
        &self,
        user_id: UserId,
        query: &NoteQuery,
    ) -> Result<Vec<Note>, StoreError> {
        let mut list = self.list_notes(user_id).await?;
        list.retain(|n| query.matches(n));
        list.truncate(query.limit);
        Ok(list)
    }

    async fn pinned_notes(&self, user_id: UserId) -> Result<Vec<Note>, StoreError> {
        let mut list = self.list_notes(user_id).await?;
        list.retain(|n| n.is_pinned);
        Ok(list)
    }

    async fn recent_notes(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Note>, StoreError> {
        let mut list = self.list_notes(user_id).await?;
        list.retain(|n| n.created_at >= since);
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        list.truncate(limit);
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NoteCategory, DEFAULT_SCHEDULE_COLOR};
    use chrono::{DateTime, Duration};

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            is_complete: false,
        }
    }

    #[tokio::test]
    async fn test_tasks_are_scoped_by_user() {
        let store = InMemoryStore::new();
        let a = store.create_task(Some(1), new_task("买菜")).await.unwrap();
        store.create_task(Some(2), new_task("跑步")).await.unwrap();

        assert_eq!(store.list_tasks(Some(1)).await.unwrap().len(), 1);
        assert!(store.get_task(Some(2), a.id).await.unwrap().is_none());
        assert!(!store.delete_task(Some(2), a.id).await.unwrap());
        assert!(store.delete_task(Some(1), a.id).await.unwrap());
        assert!(store.list_tasks(Some(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_latest_task() {
        let store = InMemoryStore::new();
        store.create_task(None, new_task("一")).await.unwrap();
        let second = store.create_task(None, new_task("二")).await.unwrap();

        let latest = store.latest_task(None).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);

        let updated = store
            .update_task(
                None,
                second.id,
                TaskUpdate {
                    is_complete: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(updated.is_complete);
        assert_eq!(updated.title, "二");
        assert!(store
            .update_task(None, 99, TaskUpdate::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_empty_task_title_rejected() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.create_task(None, new_task("  ")).await,
            Err(StoreError::Invalid(_))
        ));

        let task = store.create_task(None, new_task("买菜")).await.unwrap();
        let blank = TaskUpdate {
            title: Some(" \t ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_task(None, task.id, blank).await,
            Err(StoreError::Invalid(_))
        ));
        let renamed = TaskUpdate {
            title: Some("  买水果 ".to_string()),
            ..Default::default()
        };
        let updated = store.update_task(None, task.id, renamed).await.unwrap().unwrap();
        assert_eq!(updated.title, "买水果");
        let kept = store.get_task(None, task.id).await.unwrap().unwrap();
        assert_eq!(kept.title, "买水果");
    }

    fn schedule(title: &str, start: &str, end: &str) -> NewSchedule {
        NewSchedule {
            title: title.to_string(),
            description: None,
            start_time: DateTime::parse_from_rfc3339(start).unwrap(),
            end_time: DateTime::parse_from_rfc3339(end).unwrap(),
            is_all_day: false,
            location: None,
            color: DEFAULT_SCHEDULE_COLOR.to_string(),
        }
    }

    #[tokio::test]
    async fn test_schedule_range_and_order() {
        let store = InMemoryStore::new();
        store
            .create_schedule(
                None,
                schedule("周会", "2024-01-03T09:00:00+08:00", "2024-01-03T10:00:00+08:00"),
            )
            .await
            .unwrap();
        store
            .create_schedule(
                None,
                schedule("晨跑", "2024-01-02T07:00:00+08:00", "2024-01-02T08:00:00+08:00"),
            )
            .await
            .unwrap();

        let all = store.list_schedules(None).await.unwrap();
        assert_eq!(all[0].title, "晨跑");

        let day = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let hits = store.schedules_between(None, day, day).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "周会");

        let now = DateTime::parse_from_rfc3339("2024-01-02T12:00:00+08:00")
            .unwrap()
            .with_timezone(&Utc);
        let upcoming = store.upcoming_schedules(None, now, 10).await.unwrap();
        assert_eq!(upcoming.len(), 1);
    }

    #[tokio::test]
    async fn test_schedule_end_before_start_rejected() {
        let store = InMemoryStore::new();
        let err = store
            .create_schedule(
                None,
                schedule("x", "2024-01-03T10:00:00+08:00", "2024-01-03T09:00:00+08:00"),
            )
            .await;
        assert!(matches!(err, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_note_search_and_word_count() {
        let store = InMemoryStore::new();
        let note = store
            .create_note(
                None,
                NewNote {
                    title: "会议纪要".into(),
                    content: "讨论 Q3 计划".into(),
                    category: NoteCategory::Meeting,
                    tags: vec!["工作".into()],
                    is_pinned: true,
                    is_archived: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(note.word_count, 6);

        store
            .create_note(
                None,
                NewNote {
                    title: "灵感".into(),
                    content: "写一个效率工具".into(),
                    category: NoteCategory::Idea,
                    tags: vec![],
                    is_pinned: false,
                    is_archived: false,
                },
            )
            .await
            .unwrap();

        let query = NoteQuery {
            text: Some("q3".into()),
            ..Default::default()
        };
        let hits = store.search_notes(None, &query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, note.id);

        assert_eq!(store.pinned_notes(None).await.unwrap().len(), 1);
        let recent = store
            .recent_notes(None, Utc::now() - Duration::days(7), 20)
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);

        let updated = store
            .update_note(
                None,
                note.id,
                NoteUpdate {
                    content: Some("ab c".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.word_count, 3);
    }
}
