//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DECKHAND__*` 覆盖（双下划线表示嵌套，如 `DECKHAND__LLM__PROVIDER=mock`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::llm::RetryConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
}

/// [app] 段：应用名、演示文稿目录、允许的扩展名、system prompt 文件
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    #[serde(default = "default_presentations_dir")]
    pub presentations_dir: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// 未设置时依次查找 config/prompts/system.txt、../config/prompts/system.txt
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            presentations_dir: default_presentations_dir(),
            extensions: default_extensions(),
            system_prompt_path: None,
        }
    }
}

fn default_presentations_dir() -> PathBuf {
    PathBuf::from("presentations")
}

fn default_extensions() -> Vec<String> {
    vec!["pptx".into(), "pdf".into(), "md".into()]
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / mock；openai 缺少 API Key 时退回 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 存放 API Key 的环境变量名
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [agent] 段：上下文预算、单次 turn 最大步数、重试策略
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub retry: RetrySection,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            max_steps: default_max_steps(),
            retry: RetrySection::default(),
        }
    }
}

fn default_token_budget() -> usize {
    10_000
}

fn default_max_steps() -> usize {
    crate::react::DEFAULT_MAX_STEPS
}

/// [agent.retry] 段
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    200
}

impl AppConfig {
    /// 重试策略；请求超时取自 [llm.timeouts]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.agent.retry.max_attempts.max(1),
            base_delay: Duration::from_millis(self.agent.retry.base_delay_ms),
            request_timeout: Some(Duration::from_secs(self.llm.timeouts.request)),
        }
    }
}

/// 从 config 目录加载配置，环境变量 DECKHAND__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 DECKHAND__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("DECKHAND")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.presentations_dir, PathBuf::from("presentations"));
        assert_eq!(cfg.app.extensions, vec!["pptx", "pdf", "md"]);
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.agent.token_budget, 10_000);
        assert_eq!(cfg.agent.max_steps, 20);

        let retry = cfg.retry_config();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.base_delay, Duration::from_millis(200));
        assert_eq!(retry.request_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deckhand.toml");
        std::fs::write(
            &path,
            r#"
[app]
presentations_dir = "/srv/decks"

[llm]
provider = "mock"

[agent.retry]
max_attempts = 2
"#,
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.app.presentations_dir, PathBuf::from("/srv/decks"));
        assert_eq!(cfg.app.extensions, vec!["pptx", "pdf", "md"]);
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.agent.retry.max_attempts, 2);
        assert_eq!(cfg.agent.retry.base_delay_ms, 200);
        assert_eq!(cfg.agent.max_steps, 20);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let mut cfg = AppConfig::default();
        cfg.agent.retry.max_attempts = 0;
        assert_eq!(cfg.retry_config().max_attempts, 1);
    }
}
