//! 学习建议 - 业务能力层

use async_trait::async_trait;

use crate::error::AppResult;
use crate::services::llm_service::LlmService;

/// 根据提示词生成一段建议文字
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(&self, prompt: &str) -> AppResult<String>;
}

#[async_trait]
impl Advisor for LlmService {
    async fn advise(&self, prompt: &str) -> AppResult<String> {
        self.ask_text("生成建议", prompt, "你是一位经验丰富的中学教师，回答简洁、具体。")
            .await
    }
}
