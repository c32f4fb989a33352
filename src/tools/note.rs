//! 笔记工具：创建 / 查询 / 更新 / 删除笔记，搜索、置顶与最近笔记，通知前端刷新

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{args_schema, parse_args, Tool, ToolContext, ToolRegistry};
use crate::store::{NewNote, NoteCategory, NoteQuery, NoteStore, NoteUpdate};

pub const REFRESH_NOTE_LIST: &str = "frontend_tool_call:refresh_note_list 正在为您刷新笔记列表...";

pub fn note_tools(store: Arc<dyn NoteStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(CreateNoteTool(store.clone()));
    registry.register(GetNotesTool(store.clone()));
    registry.register(GetNoteTool(store.clone()));
    registry.register(UpdateNoteTool(store.clone()));
    registry.register(DeleteNoteTool(store.clone()));
    registry.register(SearchNotesTool(store.clone()));
    registry.register(PinnedNotesTool(store.clone()));
    registry.register(RecentNotesTool(store));
    registry.register(RefreshNoteListTool);
    registry
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CreateNoteArgs {
    /// 笔记标题
    title: String,
    /// 笔记内容
    content: String,
    /// 分类：PERSONAL / WORK / STUDY / IDEA / MEETING / OTHER（默认 PERSONAL）
    #[serde(default)]
    category: Option<String>,
    /// 标签列表
    #[serde(default)]
    tags: Option<Vec<String>>,
    /// 是否置顶
    #[serde(default)]
    is_pinned: bool,
    /// 是否归档
    #[serde(default)]
    is_archived: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct NoteIdArgs {
    /// 笔记 ID
    id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateNoteArgs {
    /// 笔记 ID
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    /// 分类（无法识别的值会被忽略）
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    is_pinned: Option<bool>,
    #[serde(default)]
    is_archived: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchNotesArgs {
    /// 关键词（匹配标题或内容）
    #[serde(default)]
    query: Option<String>,
    /// 分类
    #[serde(default)]
    category: Option<String>,
    /// 标签（命中任一即可）
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    is_pinned: Option<bool>,
    #[serde(default)]
    is_archived: Option<bool>,
    /// 最多返回条数（默认 20）
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RecentNotesArgs {
    /// 最近天数（默认 7）
    #[serde(default = "default_days")]
    days: i64,
    /// 最多返回条数（默认 20）
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

fn default_days() -> i64 {
    7
}

/// 内容预览：前 200 个字符
fn preview(content: &str) -> String {
    content.chars().take(200).collect()
}

pub struct CreateNoteTool(Arc<dyn NoteStore>);

#[async_trait]
impl Tool for CreateNoteTool {
    fn name(&self) -> &str {
        "create_note"
    }

    fn description(&self) -> &str {
        "创建新笔记"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<CreateNoteArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: CreateNoteArgs = parse_args(args)?;
        let category = args
            .category
            .as_deref()
            .and_then(NoteCategory::parse)
            .unwrap_or(NoteCategory::Personal);
        let note = self
            .0
            .create_note(
                ctx.user_id,
                NewNote {
                    title: args.title,
                    content: args.content,
                    category,
                    tags: args.tags.unwrap_or_default(),
                    is_pinned: args.is_pinned,
                    is_archived: args.is_archived,
                },
            )
            .await
            .map_err(|e| format!("笔记创建失败: {}", e))?;
        Ok(format!(
            "笔记创建成功: \"{}\" (ID: {}, 字数: {})\n{}",
            note.title, note.id, note.word_count, REFRESH_NOTE_LIST
        ))
    }
}

pub struct GetNotesTool(Arc<dyn NoteStore>);

#[async_trait]
impl Tool for GetNotesTool {
    fn name(&self) -> &str {
        "get_notes"
    }

    fn description(&self) -> &str {
        "获取所有笔记"
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, String> {
        let notes = self
            .0
            .list_notes(ctx.user_id)
            .await
            .map_err(|e| format!("获取笔记列表失败: {}", e))?;
        if notes.is_empty() {
            return Ok("没有找到笔记。".to_string());
        }
        let lines: Vec<String> = notes
            .iter()
            .map(|n| {
                format!(
                    "- {}: {} ({}, {}字{})",
                    n.id,
                    n.title,
                    n.category,
                    n.word_count,
                    if n.is_pinned { ", 置顶" } else { "" }
                )
            })
            .collect();
        Ok(format!("找到 {} 个笔记:\n{}", notes.len(), lines.join("\n")))
    }
}

pub struct GetNoteTool(Arc<dyn NoteStore>);

#[async_trait]
impl Tool for GetNoteTool {
    fn name(&self) -> &str {
        "get_note"
    }

    fn description(&self) -> &str {
        "获取指定笔记"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<NoteIdArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: NoteIdArgs = parse_args(args)?;
        let note = self
            .0
            .get_note(ctx.user_id, args.id)
            .await
            .map_err(|e| format!("获取笔记失败: {}", e))?;
        Ok(match note {
            Some(n) => format!(
                "笔记 {}: \"{}\"\n分类: {}\n内容: {}...\n字数: {}",
                n.id,
                n.title,
                n.category,
                preview(&n.content),
                n.word_count
            ),
            None => format!("未找到 ID 为 {} 的笔记。", args.id),
        })
    }
}

pub struct UpdateNoteTool(Arc<dyn NoteStore>);

#[async_trait]
impl Tool for UpdateNoteTool {
    fn name(&self) -> &str {
        "update_note"
    }

    fn description(&self) -> &str {
        "更新笔记"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<UpdateNoteArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: UpdateNoteArgs = parse_args(args)?;
        let update = NoteUpdate {
            title: args.title,
            content: args.content,
            category: args.category.as_deref().and_then(NoteCategory::parse),
            tags: args.tags,
            is_pinned: args.is_pinned,
            is_archived: args.is_archived,
        };
        if update.is_empty() {
            return Ok("没有提供要更新的字段。".to_string());
        }
        match self
            .0
            .update_note(ctx.user_id, args.id, update)
            .await
            .map_err(|e| format!("更新笔记失败: {}", e))?
        {
            Some(n) => Ok(format!(
                "笔记 {} 更新成功: \"{}\"\n{}",
                n.id, n.title, REFRESH_NOTE_LIST
            )),
            None => Err(format!("更新笔记 {} 失败。", args.id)),
        }
    }
}

pub struct DeleteNoteTool(Arc<dyn NoteStore>);

#[async_trait]
impl Tool for DeleteNoteTool {
    fn name(&self) -> &str {
        "delete_note"
    }

    fn description(&self) -> &str {
        "删除指定笔记"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<NoteIdArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: NoteIdArgs = parse_args(args)?;
        let store = &self.0;
        let Some(note) = store
            .get_note(ctx.user_id, args.id)
            .await
            .map_err(|e| format!("删除笔记失败: {}", e))?
        else {
            return Ok(format!("未找到 ID 为 {} 的笔记。", args.id));
        };
        let deleted = store
            .delete_note(ctx.user_id, note.id)
            .await
            .map_err(|e| format!("删除笔记失败: {}", e))?;
        if !deleted {
            return Err(format!("删除笔记 {} 失败。", note.id));
        }
        Ok(format!(
            "笔记 {} (\"{}\") 删除成功。\n{}",
            note.id, note.title, REFRESH_NOTE_LIST
        ))
    }
}

pub struct SearchNotesTool(Arc<dyn NoteStore>);

#[async_trait]
impl Tool for SearchNotesTool {
    fn name(&self) -> &str {
        "search_notes"
    }

    fn description(&self) -> &str {
        "搜索笔记（关键词 / 分类 / 标签 / 置顶 / 归档）"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<SearchNotesArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: SearchNotesArgs = parse_args(args)?;
        let query = NoteQuery {
            text: args.query.filter(|q| !q.trim().is_empty()),
            category: args.category.as_deref().and_then(NoteCategory::parse),
            tags: args.tags,
            is_pinned: args.is_pinned,
            is_archived: args.is_archived,
            limit: args.limit,
        };
        let notes = self
            .0
            .search_notes(ctx.user_id, &query)
            .await
            .map_err(|e| format!("搜索笔记失败: {}", e))?;
        if notes.is_empty() {
            return Ok("没有找到匹配的笔记。".to_string());
        }
        let lines: Vec<String> = notes
            .iter()
            .map(|n| format!("- {}: {} ({}, {}字)", n.id, n.title, n.category, n.word_count))
            .collect();
        Ok(format!("找到 {} 个匹配的笔记:\n{}", notes.len(), lines.join("\n")))
    }
}

pub struct PinnedNotesTool(Arc<dyn NoteStore>);

#[async_trait]
impl Tool for PinnedNotesTool {
    fn name(&self) -> &str {
        "get_pinned_notes"
    }

    fn description(&self) -> &str {
        "获取置顶笔记"
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, String> {
        let notes = self
            .0
            .pinned_notes(ctx.user_id)
            .await
            .map_err(|e| format!("获取置顶笔记失败: {}", e))?;
        if notes.is_empty() {
            return Ok("没有置顶笔记。".to_string());
        }
        let lines: Vec<String> = notes
            .iter()
            .map(|n| format!("- {}: {} ({}字)", n.id, n.title, n.word_count))
            .collect();
        Ok(format!("找到 {} 个置顶笔记:\n{}", notes.len(), lines.join("\n")))
    }
}

pub struct RecentNotesTool(Arc<dyn NoteStore>);

#[async_trait]
impl Tool for RecentNotesTool {
    fn name(&self) -> &str {
        "get_recent_notes"
    }

    fn description(&self) -> &str {
        "获取最近笔记"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<RecentNotesArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: RecentNotesArgs = parse_args(args)?;
        let since = Utc::now() - Duration::days(args.days.max(0));
        let notes = self
            .0
            .recent_notes(ctx.user_id, since, args.limit)
            .await
            .map_err(|e| format!("获取最近笔记失败: {}", e))?;
        if notes.is_empty() {
            return Ok(format!("最近 {} 天没有创建笔记。", args.days));
        }
        let lines: Vec<String> = notes
            .iter()
            .map(|n| {
                format!(
                    "- {}: {} ({}字, {})",
                    n.id,
                    n.title,
                    n.word_count,
                    n.created_at.format("%Y-%m-%d")
                )
            })
            .collect();
        Ok(format!("找到 {} 个最近笔记:\n{}", notes.len(), lines.join("\n")))
    }
}

pub struct RefreshNoteListTool;

#[async_trait]
impl Tool for RefreshNoteListTool {
    fn name(&self) -> &str {
        "refresh_note_list"
    }

    fn description(&self) -> &str {
        "刷新前端笔记列表"
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String, String> {
        Ok(REFRESH_NOTE_LIST.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn tools() -> ToolRegistry {
        note_tools(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_with_unknown_category_falls_back() {
        let tools = tools();
        let ctx = ToolContext::new(Some(5));
        let out = tools
            .execute(
                "create_note",
                json!({"title": "读书", "content": "三体 第一部", "category": "diary"}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            out,
            format!("笔记创建成功: \"读书\" (ID: 1, 字数: 5)\n{}", REFRESH_NOTE_LIST)
        );

        let out = tools.execute("get_note", json!({"id": 1}), &ctx).await.unwrap();
        assert!(out.contains("分类: PERSONAL"));
        assert!(out.contains("字数: 5"));
    }

    #[tokio::test]
    async fn test_search_pinned_and_recent() {
        let tools = tools();
        let ctx = ToolContext::default();
        tools
            .execute(
                "create_note",
                json!({"title": "周会纪要", "content": "讨论排期", "category": "meeting", "is_pinned": true}),
                &ctx,
            )
            .await
            .unwrap();
        tools
            .execute("create_note", json!({"title": "想法", "content": "做个 app"}), &ctx)
            .await
            .unwrap();

        let out = tools
            .execute("search_notes", json!({"category": "MEETING"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "找到 1 个匹配的笔记:\n- 1: 周会纪要 (MEETING, 4字)");

        let out = tools.execute("get_pinned_notes", json!({}), &ctx).await.unwrap();
        assert!(out.starts_with("找到 1 个置顶笔记"));

        let out = tools.execute("get_recent_notes", json!({}), &ctx).await.unwrap();
        assert!(out.starts_with("找到 2 个最近笔记"));

        let out = tools
            .execute("search_notes", json!({"query": "不存在"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "没有找到匹配的笔记。");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let tools = tools();
        let ctx = ToolContext::default();
        tools
            .execute("create_note", json!({"title": "草稿", "content": "a"}), &ctx)
            .await
            .unwrap();
        let out = tools
            .execute("update_note", json!({"id": 1, "is_pinned": true}), &ctx)
            .await
            .unwrap();
        assert!(out.starts_with("笔记 1 更新成功: \"草稿\""));

        let err = tools
            .execute("update_note", json!({"id": 42, "title": "x"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err, "更新笔记 42 失败。");

        let out = tools.execute("delete_note", json!({"id": 1}), &ctx).await.unwrap();
        assert!(out.starts_with("笔记 1 (\"草稿\") 删除成功。"));
        let out = tools.execute("get_notes", json!({}), &ctx).await.unwrap();
        assert_eq!(out, "没有找到笔记。");
    }
}
