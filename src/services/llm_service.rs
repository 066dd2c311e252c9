//! LLM 服务 - 业务能力层
//!
//! 只负责"调用大模型"能力，不关心题目和流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 DashScope、Doubao 等）
//! - 每次调用带超时，失败按退避策略重试

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};
use crate::utils::logging::truncate_text;
use crate::utils::retry::{retry_with_backoff, RetryPolicy};

/// LLM 服务
///
/// 职责：
/// - 发送一轮 system + user 对话，返回文本
/// - 从回复中宽松地提取 JSON
/// - 不出现题目、学生等业务概念
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    timeout: Duration,
    retry: RetryPolicy,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            timeout: Duration::from_secs(config.oracle_timeout_secs),
            retry: RetryPolicy::from_config(config),
        }
    }

    /// 通用的 LLM 调用函数（单次，不重试）
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 去掉首尾空白的回复内容
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let api_failed = |e: OpenAIError| AppError::llm_api_failed(&self.model_name, e);

        let mut messages = Vec::new();
        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(api_failed)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(api_failed)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(2048u32)
            .build()
            .map_err(api_failed)?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout {
                model: self.model_name.clone(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                api_failed(e)
            })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }

    /// 带重试的文本调用
    pub async fn ask_text(&self, label: &str, user_message: &str, system_message: &str) -> AppResult<String> {
        retry_with_backoff(&self.retry, label, || {
            self.send_to_llm(user_message, Some(system_message))
        })
        .await
    }

    /// 带重试的结构化调用，回复无法解析时同样重试
    pub async fn ask_json<T: DeserializeOwned>(
        &self,
        label: &str,
        user_message: &str,
        system_message: &str,
    ) -> AppResult<T> {
        retry_with_backoff(&self.retry, label, || async {
            let reply = self.send_to_llm(user_message, Some(system_message)).await?;
            parse_json_reply(&reply)
        })
        .await
    }
}

/// 从大模型回复中取出 JSON 对象
///
/// 依次尝试：整段即 JSON、```json 代码块、第一个 `{` 到最后一个 `}`
pub fn extract_json_object(reply: &str) -> Option<JsonValue> {
    let trimmed = reply.trim();
    if let Ok(value @ JsonValue::Object(_)) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Ok(re) = Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```") {
        for cap in re.captures_iter(trimmed) {
            if let Some(m) = cap.get(1) {
                if let Ok(value @ JsonValue::Object(_)) = serde_json::from_str(m.as_str()) {
                    return Some(value);
                }
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(value @ JsonValue::Object(_)) => Some(value),
        _ => None,
    }
}

/// 把回复解析成指定结构，失败视为格式错误（可重试）
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> AppResult<T> {
    let value = extract_json_object(reply)
        .ok_or_else(|| AppError::malformed_response(truncate_text(reply, 200), "未找到 JSON 对象"))?;
    serde_json::from_value(value)
        .map_err(|e| AppError::malformed_response(truncate_text(reply, 200), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Decision {
        point_earned: f64,
        get_full_point: bool,
    }

    #[test]
    fn test_extract_plain_json() {
        let value = extract_json_object(r#"{"point_earned": 3, "get_full_point": false}"#).unwrap();
        assert_eq!(value["point_earned"], 3);
    }

    #[test]
    fn test_extract_fenced_json() {
        let reply = "好的，评分如下：\n```json\n{\"point_earned\": 6, \"get_full_point\": true}\n```\n以上。";
        let decision: Decision = parse_json_reply(reply).unwrap();
        assert_eq!(
            decision,
            Decision {
                point_earned: 6.0,
                get_full_point: true
            }
        );
    }

    #[test]
    fn test_extract_surrounded_json() {
        let reply = "分析完毕 {\"point_earned\": 2, \"get_full_point\": false} 请参考";
        let decision: Decision = parse_json_reply(reply).unwrap();
        assert_eq!(decision.point_earned, 2.0);
    }

    #[test]
    fn test_unstructured_reply_is_malformed() {
        let result: AppResult<Decision> = parse_json_reply("学生大致正确，应得 4 分");
        assert!(matches!(
            result,
            Err(AppError::Llm(LlmError::MalformedResponse { .. }))
        ));

        let wrong_shape: AppResult<Decision> = parse_json_reply(r#"{"score": 4}"#);
        assert!(matches!(
            wrong_shape,
            Err(AppError::Llm(LlmError::MalformedResponse { .. }))
        ));
    }

    /// 需要真实的 API Key
    #[tokio::test]
    #[ignore]
    async fn test_send_to_llm_simple() {
        let _ = tracing_subscriber::fmt::try_init();
        let config = Config::from_env().unwrap();
        let service = LlmService::new(&config);
        let response = service
            .send_to_llm("1+1等于几？只回答数字", Some("你是一个简洁的助手"))
            .await
            .unwrap();
        assert!(!response.is_empty());
    }
}
