//! Agent 运行时
//!
//! 从配置组装 LLM、Planner、ToolExecutor 与演示文稿句柄，
//! run_turn 对单条用户输入跑一次 PLAN / ACT 循环并返回新的会话状态。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::config::{load_config, AppConfig};
use crate::core::{AgentError, SessionState, TurnOutput};
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient, RetryingLlmClient};
use crate::react::{react_loop, Planner, ReactEvent, ReactSession, DEFAULT_MAX_STEPS, DEFAULT_SYSTEM_PROMPT};
use crate::tools::{DeckController, DirectoryLibrary, LoggingViewer, ToolExecutor, ToolRegistry};

/// 组装好的 Agent：可被多个会话共享（演示文稿句柄只有一个）
pub struct Agent {
    planner: Planner,
    executor: ToolExecutor,
    max_steps: usize,
}

impl Agent {
    pub fn new(planner: Planner, executor: ToolExecutor) -> Self {
        Self {
            planner,
            executor,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// 按配置创建：LLM 由 [llm] 决定，演示文稿来自 [app].presentations_dir，查看器只记录日志
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AgentError> {
        let llm = create_llm_from_config(cfg)?;
        let library = DirectoryLibrary::new(&cfg.app.presentations_dir, &cfg.app.extensions);
        let deck = DeckController::new(library, LoggingViewer::new());
        Self::with_components(cfg, llm, deck)
    }

    /// 使用外部提供的 LLM 与演示文稿句柄，其余取自配置
    pub fn with_components(
        cfg: &AppConfig,
        llm: Arc<dyn LlmClient>,
        deck: DeckController,
    ) -> Result<Self, AgentError> {
        let system_prompt = load_system_prompt(cfg)?;
        let planner = Planner::new(
            RetryingLlmClient::new(llm, cfg.retry_config()),
            system_prompt,
            cfg.agent.token_budget,
        );
        let registry = ToolRegistry::slide_tools();
        tracing::debug!(tools = %registry.to_schema_json(), "slide tools registered");
        let executor = ToolExecutor::new(registry, deck);
        Ok(Self::new(planner, executor).with_max_steps(cfg.agent.max_steps))
    }

    /// 累计 token 使用统计：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.planner.token_usage()
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// 处理单条用户消息；出错时传入的 state 不受影响
    pub async fn run_turn(&self, state: &SessionState, user_text: &str) -> Result<TurnOutput, AgentError> {
        self.run_turn_with(state, user_text, CancellationToken::new(), None)
            .await
    }

    /// 可取消、可推送过程事件的 run_turn
    pub async fn run_turn_with(
        &self,
        state: &SessionState,
        user_text: &str,
        cancel_token: CancellationToken,
        event_tx: Option<&UnboundedSender<ReactEvent>>,
    ) -> Result<TurnOutput, AgentError> {
        let mut session =
            ReactSession::new(&self.planner, &self.executor, cancel_token).with_max_steps(self.max_steps);
        if let Some(tx) = event_tx {
            session = session.with_event_tx(tx);
        }
        react_loop(&session, state, user_text).await
    }
}

/// 读取配置并创建 Agent
pub fn create_agent(config_path: Option<PathBuf>) -> Result<Agent, AgentError> {
    let cfg = load_config(config_path)?;
    Agent::from_config(&cfg)
}

/// 根据 [llm] 段创建客户端；provider=openai 但没有 API Key 时退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    match cfg.llm.provider.to_lowercase().as_str() {
        "openai" => match std::env::var(&cfg.llm.api_key_env).ok().filter(|k| !k.is_empty()) {
            Some(key) => {
                tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
                let client = OpenAiClient::new(
                    cfg.llm.base_url.as_deref(),
                    &cfg.llm.model,
                    Some(key),
                    Duration::from_secs(cfg.llm.timeouts.request),
                )
                .map_err(|e| AgentError::Config(e.to_string()))?;
                Ok(Arc::new(client))
            }
            None => {
                tracing::warn!(env = %cfg.llm.api_key_env, "No API key set, using Mock LLM");
                Ok(Arc::new(MockLlmClient::new()))
            }
        },
        "mock" => Ok(Arc::new(MockLlmClient::new())),
        other => Err(AgentError::Config(format!("unknown llm provider: {other}"))),
    }
}

/// system prompt：[app].system_prompt_path 指定的文件必须存在；
/// 否则依次查找 config/prompts/system.txt、../config/prompts/system.txt，都没有时用内置 prompt
pub fn load_system_prompt(cfg: &AppConfig) -> Result<String, AgentError> {
    if let Some(path) = &cfg.app.system_prompt_path {
        return std::fs::read_to_string(path)
            .map(|s| s.trim().to_string())
            .map_err(|e| AgentError::Config(format!("cannot read system prompt {}: {e}", path.display())));
    }
    Ok([
        "config/prompts/system.txt",
        "../config/prompts/system.txt",
    ]
    .into_iter()
    .find_map(|p| std::fs::read_to_string(p).ok())
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".into();
        assert!(create_llm_from_config(&cfg).is_ok());

        cfg.llm.provider = "deepseek".into();
        assert!(matches!(create_llm_from_config(&cfg), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_openai_without_key_falls_back() {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key_env = "DECKHAND_TEST_KEY_THAT_IS_NEVER_SET".into();
        assert!(create_llm_from_config(&cfg).is_ok());
    }

    #[test]
    fn test_explicit_prompt_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "  custom prompt\n").unwrap();
        let mut cfg = AppConfig::default();
        cfg.app.system_prompt_path = Some(path);
        assert_eq!(load_system_prompt(&cfg).unwrap(), "custom prompt");

        cfg.app.system_prompt_path = Some(dir.path().join("missing.txt"));
        assert!(matches!(load_system_prompt(&cfg), Err(AgentError::Config(_))));
    }

    #[tokio::test]
    async fn test_from_config_runs_turn_with_mock() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".into();
        cfg.app.presentations_dir = dir.path().to_path_buf();
        let agent = Agent::from_config(&cfg).unwrap();
        assert_eq!(agent.max_steps(), 20);

        let out = agent.run_turn(&SessionState::new(), "hello").await.unwrap();
        assert_eq!(out.reply(), Some("Echo from Mock: hello"));
    }
}
