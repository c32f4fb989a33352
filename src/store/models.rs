//! 领域记录：任务 / 日程 / 笔记，以及创建、更新、查询时的输入类型

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// 用户标识；None 表示匿名会话，仅能看到同样无归属的记录
pub type UserId = Option<i64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: UserId,
    pub title: String,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn status_label(&self) -> &'static str {
        if self.is_complete {
            "已完成"
        } else {
            "未完成"
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub is_complete: Option<bool>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.is_complete.is_none()
    }
}

pub const DEFAULT_SCHEDULE_COLOR: &str = "#1890ff";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub is_all_day: bool,
    pub location: Option<String>,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub is_all_day: bool,
    pub location: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub is_all_day: Option<bool>,
    pub location: Option<String>,
    pub color: Option<String>,
}

impl ScheduleUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.is_all_day.is_none()
            && self.location.is_none()
            && self.color.is_none()
    }
}

/// 笔记分类；无法识别的分类名在创建时退回 PERSONAL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NoteCategory {
    Personal,
    Work,
    Study,
    Idea,
    Meeting,
    Other,
}

impl NoteCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteCategory::Personal => "PERSONAL",
            NoteCategory::Work => "WORK",
            NoteCategory::Study => "STUDY",
            NoteCategory::Idea => "IDEA",
            NoteCategory::Meeting => "MEETING",
            NoteCategory::Other => "OTHER",
        }
    }

    /// 大小写不敏感解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PERSONAL" => Some(NoteCategory::Personal),
            "WORK" => Some(NoteCategory::Work),
            "STUDY" => Some(NoteCategory::Study),
            "IDEA" => Some(NoteCategory::Idea),
            "MEETING" => Some(NoteCategory::Meeting),
            "OTHER" => Some(NoteCategory::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for NoteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub category: NoteCategory,
    pub tags: Vec<String>,
    pub is_pinned: bool,
    pub is_archived: bool,
    pub word_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 字数：不含空白字符的字符数（中英文混排按字符计）
pub fn word_count(content: &str) -> usize {
    content.chars().filter(|c| !c.is_whitespace()).count()
}

#[derive(Debug, Clone)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub category: NoteCategory,
    pub tags: Vec<String>,
    pub is_pinned: bool,
    pub is_archived: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<NoteCategory>,
    pub tags: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
    pub is_archived: Option<bool>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.category.is_none()
            && self.tags.is_none()
            && self.is_pinned.is_none()
            && self.is_archived.is_none()
    }
}

/// 笔记搜索条件；各字段为 None 时不参与过滤
#[derive(Debug, Clone)]
pub struct NoteQuery {
    /// 标题或正文包含（大小写不敏感）
    pub text: Option<String>,
    pub category: Option<NoteCategory>,
    /// 命中任一标签即可
    pub tags: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
    pub is_archived: Option<bool>,
    pub limit: usize,
}

impl Default for NoteQuery {
    fn default() -> Self {
        Self {
            text: None,
            category: None,
            tags: None,
            is_pinned: None,
            is_archived: None,
            limit: 20,
        }
    }
}

impl NoteQuery {
    pub fn matches(&self, note: &Note) -> bool {
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            if !note.title.to_lowercase().contains(&needle)
                && !note.content.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(category) = self.category {
            if note.category != category {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.is_empty() && !tags.iter().any(|t| note.tags.contains(t)) {
                return false;
            }
        }
        if let Some(pinned) = self.is_pinned {
            if note.is_pinned != pinned {
                return false;
            }
        }
        if let Some(archived) = self.is_archived {
            if note.is_archived != archived {
                return false;
            }
        }
        true
    }
}
