//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `STEWARD__*` 覆盖（双下划线表示嵌套，如 `STEWARD__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub supervisor: SupervisorSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、跨轮对话保留轮数、checkpoint 数据库路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 新一轮开始时从 checkpoint 带入的历史轮数
    pub max_context_turns: usize,
    /// SQLite checkpoint 路径；未设置时使用内存 checkpoint（进程退出即丢失）
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            max_context_turns: default_max_context_turns(),
            checkpoint_path: None,
        }
    }
}

fn default_max_context_turns() -> usize {
    20
}

/// [llm] 段：后端选择、模型、温度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai；最终由 API Key 与 provider 共同决定
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 显式 API Key；为空时读取 DEEPSEEK_API_KEY / OPENAI_API_KEY
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: "deepseek-chat".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.1,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [supervisor] 段：编排器的步数预算与子 Agent 工具循环上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    /// 单轮最多允许的图节点转移次数，超出即终止本轮
    pub step_budget: usize,
    /// 单次子 Agent 调用内最多的 LLM ↔ 工具往返轮数
    pub worker_max_iterations: usize,
    /// 意图分类短输入保护：少于该字符数且无业务关键词时强制判为闲聊
    pub short_message_chars: usize,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            step_budget: 25,
            worker_max_iterations: 6,
            short_message_chars: 10,
        }
    }
}

/// [tools] 段：工具调用超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// 从 config 目录加载配置，环境变量 STEWARD__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 STEWARD__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("STEWARD")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
