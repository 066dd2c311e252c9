//! 带退避的重试
//!
//! 只重试 LLM 错误（网络失败、超时、空回复、格式不符），其它错误直接返回

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最多尝试次数（含第一次）
    pub max_attempts: u32,
    /// 第一次重试前的等待，之后每次翻倍
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.oracle_max_retries,
            Duration::from_millis(config.oracle_retry_backoff_ms),
        )
    }

    /// 第 attempt 次失败后的等待时间
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

/// 按策略重试异步操作
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(AppError::Llm(e)) if e.is_retryable() => {
                if attempt >= policy.max_attempts {
                    return Err(LlmError::RetriesExhausted {
                        attempts: attempt,
                        last_error: Box::new(e),
                    }
                    .into());
                }
                let delay = policy.backoff_for(attempt);
                warn!(
                    "⚠️ {} 第 {}/{} 次失败: {}，{}ms 后重试",
                    label,
                    attempt,
                    policy.max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
