//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url），带 function tools；
//! 对返回空 tool_call id 的后端补生成 id，保证对话内调用 ID 唯一。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    FunctionCall, FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{LlmClient, LlmError};
use crate::memory::{AssistantMessage, Message, ToolCall};
use crate::tools::ToolSpec;

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, LlmError> {
        let mut config = OpenAIConfig::new();
        if let Some(url) = base_url {
            config = config.with_api_base(url.trim_end_matches('/'));
        }
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
            model: model.to_string(),
            request_timeout,
            usage: TokenUsage::new(),
        })
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(to_openai_messages(messages)?);
        if !tools.is_empty() {
            args.tools(to_openai_tools(tools)?);
        }
        args.build().map_err(invalid_request)
    }

    fn map_error(&self, err: OpenAIError) -> LlmError {
        match err {
            OpenAIError::Reqwest(e) if e.is_timeout() => LlmError::Timeout(self.request_timeout),
            other => map_openai_error(other),
        }
    }
}

fn invalid_request(err: impl std::fmt::Display) -> LlmError {
    LlmError::InvalidRequest(err.to_string())
}

/// 将内部消息转换为 chat/completions 的消息类型；纯工具调用的 Assistant 消息不带 content
fn to_openai_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    messages
        .iter()
        .map(|m| {
            let msg = match m {
                Message::System { text } => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(text.clone())
                        .build()
                        .map_err(invalid_request)?,
                ),
                Message::Human { text } => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(text.clone())
                        .build()
                        .map_err(invalid_request)?,
                ),
                Message::Assistant(a) => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    if !a.text.is_empty() || !a.has_calls() {
                        args.content(a.text.clone());
                    }
                    if a.has_calls() {
                        args.tool_calls(
                            a.calls
                                .iter()
                                .map(|c| {
                                    ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
                                        id: c.id.clone(),
                                        function: FunctionCall {
                                            name: c.name.clone(),
                                            arguments: c.arguments.to_string(),
                                        },
                                    })
                                })
                                .collect::<Vec<_>>(),
                        );
                    }
                    ChatCompletionRequestMessage::Assistant(args.build().map_err(invalid_request)?)
                }
                Message::ToolResult(r) => ChatCompletionRequestMessage::Tool(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(r.call_id.clone())
                        .content(r.payload.to_string())
                        .build()
                        .map_err(invalid_request)?,
                ),
            };
            Ok(msg)
        })
        .collect()
}

fn to_openai_tools(tools: &[ToolSpec]) -> Result<Vec<ChatCompletionTools>, LlmError> {
    tools
        .iter()
        .map(|t| {
            let function = FunctionObjectArgs::default()
                .name(t.name.clone())
                .description(t.description.clone())
                .parameters(t.parameters.clone())
                .build()
                .map_err(invalid_request)?;
            Ok(ChatCompletionTools::Function(ChatCompletionTool { function }))
        })
        .collect()
}

/// async_openai 已在内部对 429 / 5xx 做过退避，这里剩下的服务端错误都按不可重试处理
fn map_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::Reqwest(e) => LlmError::Transport(e.to_string()),
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.as_deref().unwrap_or_default();
            let code = api.code.as_deref().unwrap_or_default();
            if kind == "authentication_error" || code == "invalid_api_key" {
                LlmError::Auth(api.message)
            } else if kind == "invalid_request_error" {
                LlmError::InvalidRequest(api.message)
            } else {
                LlmError::Api(api.message)
            }
        }
        OpenAIError::JSONDeserialize(..) => LlmError::InvalidResponse(err.to_string()),
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg),
        other => LlmError::Api(other.to_string()),
    }
}

/// 取首个 choice 转为 AssistantMessage；arguments 解析失败时原样保留交给参数校验报错
fn parse_response(response: CreateChatCompletionResponse) -> Result<AssistantMessage, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;
    let calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .filter_map(|tc| match tc {
            ChatCompletionMessageToolCalls::Function(call) => Some(call),
            _ => {
                tracing::warn!("ignoring non-function tool call");
                None
            }
        })
        .map(|call| {
            let raw = call.function.arguments;
            let arguments = if raw.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&raw).unwrap_or(Value::String(raw))
            };
            let id = if call.id.is_empty() {
                format!("call_{}", uuid::Uuid::new_v4().simple())
            } else {
                call.id
            };
            ToolCall::new(id, call.function.name, arguments)
        })
        .collect();
    Ok(AssistantMessage::with_calls(
        choice.message.content.unwrap_or_default(),
        calls,
    ))
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AssistantMessage, LlmError> {
        let request = self.build_request(messages, tools)?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| self.map_error(e))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }
        parse_response(response)
    }
}
