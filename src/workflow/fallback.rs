//! 两阶段兜底批改 - 流程层
//!
//! 没有参考答案、没有细则，或答案形状不符合确定性判分时使用：
//!
//! ```text
//! Pending ──assess──▶ Assessed{narrative} ──decide──▶ Decided{point_earned}
//! ```
//!
//! 每一步都是一次独立的（带重试的）大模型调用

use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::same_score;
use crate::services::{GradingOracle, OracleRequest};

/// 兜底批改的状态
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackState {
    Pending,
    Assessed { narrative: String },
    Decided { point_earned: f64, narrative: String },
}

impl FallbackState {
    pub fn is_decided(&self) -> bool {
        matches!(self, FallbackState::Decided { .. })
    }

    /// 前进一步；已定分时原样返回
    pub async fn advance(
        self,
        oracle: &dyn GradingOracle,
        request: &OracleRequest,
    ) -> AppResult<FallbackState> {
        match self {
            FallbackState::Pending => {
                let narrative = oracle.assess(request).await?;
                debug!("题目 {} 兜底分析完成", request.question_id);
                Ok(FallbackState::Assessed { narrative })
            }
            FallbackState::Assessed { narrative } => {
                let decision = oracle.decide(request, &narrative).await?;
                let point_earned =
                    ensure_in_range(decision.point_earned, request.full_point, "兜底定分")?;
                if let Some(flag) = decision.get_full_point {
                    if flag != same_score(point_earned, request.full_point) {
                        warn!(
                            "⚠️ 题目 {} 的满分标记与得分 {} 不一致，以得分为准",
                            request.question_id, point_earned
                        );
                    }
                }
                Ok(FallbackState::Decided {
                    point_earned,
                    narrative,
                })
            }
            decided @ FallbackState::Decided { .. } => Ok(decided),
        }
    }
}

/// 兜底批改结果：(得分, 反馈)
pub async fn run_fallback(
    oracle: &dyn GradingOracle,
    request: &OracleRequest,
) -> AppResult<(f64, String)> {
    let mut state = FallbackState::Pending;
    while !state.is_decided() {
        state = state.advance(oracle, request).await?;
    }
    match state {
        FallbackState::Decided {
            point_earned,
            narrative,
        } => Ok((point_earned, format!("大模型评分：{}", narrative))),
        _ => Err(AppError::Other("兜底批改未完成".to_string())),
    }
}

/// 大模型给出的分数必须在 [0, 满分] 之内，否则视为格式错误
pub fn ensure_in_range(points: f64, full_point: f64, what: &str) -> AppResult<f64> {
    if points.is_finite() && points >= 0.0 && points <= full_point {
        Ok(points)
    } else {
        Err(AppError::malformed_response(
            points.to_string(),
            format!("{}得分超出范围 [0, {}]", what, full_point),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::services::{RubricVerdict, ScoreDecision};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        decision: f64,
        flag: Option<bool>,
        assess_calls: AtomicU32,
        decide_calls: AtomicU32,
    }

    impl Scripted {
        fn new(decision: f64, flag: Option<bool>) -> Self {
            Self {
                decision,
                flag,
                assess_calls: AtomicU32::new(0),
                decide_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl GradingOracle for Scripted {
        async fn grade_with_rubric(&self, _request: &OracleRequest) -> AppResult<RubricVerdict> {
            Err(LlmError::EmptyContent {
                model: "scripted".to_string(),
            }
            .into())
        }

        async fn assess(&self, _request: &OracleRequest) -> AppResult<String> {
            self.assess_calls.fetch_add(1, Ordering::SeqCst);
            Ok("思路正确，最后一步计算有误".to_string())
        }

        async fn decide(&self, _request: &OracleRequest, narrative: &str) -> AppResult<ScoreDecision> {
            assert_eq!(narrative, "思路正确，最后一步计算有误");
            self.decide_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ScoreDecision {
                point_earned: self.decision,
                get_full_point: self.flag,
            })
        }
    }

    fn request() -> OracleRequest {
        OracleRequest {
            question_id: "12".to_string(),
            question: "填空".to_string(),
            rubric: None,
            few_shot: None,
            full_point: 6.0,
            student_answer: "[x；y]".to_string(),
        }
    }

    #[tokio::test]
    async fn test_states_advance_in_order() {
        let oracle = Scripted::new(4.0, Some(false));
        let req = request();

        let assessed = FallbackState::Pending.advance(&oracle, &req).await.unwrap();
        assert_eq!(
            assessed,
            FallbackState::Assessed {
                narrative: "思路正确，最后一步计算有误".to_string()
            }
        );
        let decided = assessed.advance(&oracle, &req).await.unwrap();
        assert!(decided.is_decided());
        let again = decided.clone().advance(&oracle, &req).await.unwrap();
        assert_eq!(again, decided);
        assert_eq!(oracle.assess_calls.load(Ordering::SeqCst), 1);
        assert_eq!(oracle.decide_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_fallback_derives_from_points() {
        let oracle = Scripted::new(6.0, Some(false));
        let (points, feedback) = run_fallback(&oracle, &request()).await.unwrap();
        assert_eq!(points, 6.0);
        assert!(feedback.starts_with("大模型评分："));
    }

    #[tokio::test]
    async fn test_out_of_range_decision_is_malformed() {
        let oracle = Scripted::new(7.0, None);
        let err = run_fallback(&oracle, &request()).await.unwrap_err();
        assert!(matches!(err, AppError::Llm(LlmError::MalformedResponse { .. })));

        let negative = Scripted::new(-1.0, None);
        assert!(run_fallback(&negative, &request()).await.is_err());
    }
}
