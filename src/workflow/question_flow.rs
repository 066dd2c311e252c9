//! 题目批改流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整批改流程
//!
//! 流程顺序：
//! 1. 查元数据，按评分方案分派
//! 2. 选择题 / 填空题 → 确定性判分；答案形状不符 → 兜底批改
//! 3. 解答题 → 大模型按细则批改
//! 4. 无参考答案无细则 → 兜底批改
//! 5. 失败 → 记录错误并写入复核清单（不计 0 分）

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::AppResult;
use crate::infrastructure::QuestionMetadataStore;
use crate::models::{
    AnswerValue, GradedAnswer, GradingFailure, GradingScheme, QuestionMetadata, QuestionOutcome,
};
use crate::services::{scoring, GradingOracle, OracleRequest, ReviewWriter};
use crate::utils::logging::truncate_text;
use crate::workflow::fallback::{ensure_in_range, run_fallback};
use crate::workflow::question_ctx::QuestionCtx;

/// 题目批改流程
///
/// - 决定何时确定性判分、何时调用大模型、何时兜底
/// - 只依赖业务能力（services），不读写学生文件
/// - 一道题失败不会影响其它题
pub struct QuestionFlow {
    store: Arc<QuestionMetadataStore>,
    oracle: Arc<dyn GradingOracle>,
    review_writer: Arc<ReviewWriter>,
    verbose_logging: bool,
}

impl QuestionFlow {
    pub fn new(
        store: Arc<QuestionMetadataStore>,
        oracle: Arc<dyn GradingOracle>,
        review_writer: Arc<ReviewWriter>,
        verbose_logging: bool,
    ) -> Self {
        Self {
            store,
            oracle,
            review_writer,
            verbose_logging,
        }
    }

    /// 批改一道题，总是返回结果（成功或失败）
    pub async fn run(&self, ctx: &QuestionCtx, answer: &AnswerValue) -> QuestionOutcome {
        if self.verbose_logging {
            info!("{} 学生答案: {}", ctx, truncate_text(&answer.to_string(), 80));
        }

        let meta = match self.store.get(&ctx.question_id) {
            Ok(meta) => meta,
            Err(e) => return self.fail(ctx, e.to_string(), None).await,
        };

        if meta.question_type != ctx.category {
            warn!(
                "{} ⚠️ 答题卡题型 {} 与元数据题型 {} 不一致，以元数据为准",
                ctx, ctx.category, meta.question_type
            );
        }

        match self.grade(ctx, meta, answer).await {
            Ok(graded) => {
                info!(
                    "{} ✓ {}: {}/{}",
                    ctx,
                    meta.scheme.label(),
                    graded.point_earned,
                    meta.full_point
                );
                QuestionOutcome::Graded(graded)
            }
            Err(e) => {
                self.fail(ctx, e.to_string(), Some(meta.question_focus.clone()))
                    .await
            }
        }
    }

    async fn grade(
        &self,
        ctx: &QuestionCtx,
        meta: &QuestionMetadata,
        answer: &AnswerValue,
    ) -> AppResult<GradedAnswer> {
        let deterministic = match &meta.scheme {
            GradingScheme::SingleChoice { correct } => scoring::ensure_single_choice_shape(answer)
                .map(|_| scoring::score_single_choice(correct, answer, meta.full_point)),
            GradingScheme::MultiChoice {
                correct,
                partially_correct,
            } => Ok(scoring::score_multi_choice(
                correct,
                *partially_correct,
                answer,
                meta.full_point,
            )),
            GradingScheme::FillInBlank { correct, penalties } => {
                scoring::score_fill_in_blank(correct, penalties, answer, meta.full_point)
            }
            GradingScheme::Rubric { rubric, few_shot } => {
                return self
                    .grade_with_rubric(meta, answer, rubric, few_shot.as_deref())
                    .await;
            }
            GradingScheme::OracleOnly { section_rubric } => {
                return self
                    .fallback(meta, answer, section_rubric.as_deref())
                    .await;
            }
        };

        match deterministic {
            Ok(points) => Ok(GradedAnswer::new(
                points,
                meta.full_point,
                meta.question_focus.as_str(),
                None,
            )),
            Err(e) if e.is_shape_error() => {
                warn!("{} ⚠️ {}，转交大模型兜底批改", ctx, e);
                let answer_key = meta.scheme.answer_key();
                self.fallback(meta, answer, answer_key.as_deref()).await
            }
            Err(e) => Err(e),
        }
    }

    async fn grade_with_rubric(
        &self,
        meta: &QuestionMetadata,
        answer: &AnswerValue,
        rubric: &str,
        few_shot: Option<&str>,
    ) -> AppResult<GradedAnswer> {
        let request = build_request(meta, answer, Some(rubric), few_shot);
        let verdict = self.oracle.grade_with_rubric(&request).await?;
        let points = ensure_in_range(verdict.point_earned, meta.full_point, "细则批改")?;
        Ok(GradedAnswer::new(
            points,
            meta.full_point,
            meta.question_focus.as_str(),
            Some(verdict.render()),
        ))
    }

    async fn fallback(
        &self,
        meta: &QuestionMetadata,
        answer: &AnswerValue,
        section_rubric: Option<&str>,
    ) -> AppResult<GradedAnswer> {
        let request = build_request(meta, answer, section_rubric, None);
        let (points, feedback) = run_fallback(self.oracle.as_ref(), &request).await?;
        Ok(GradedAnswer::new(
            points,
            meta.full_point,
            meta.question_focus.as_str(),
            Some(feedback),
        ))
    }

    /// 记录失败并写入复核清单
    async fn fail(
        &self,
        ctx: &QuestionCtx,
        reason: String,
        question_focus: Option<String>,
    ) -> QuestionOutcome {
        error!("{} ❌ 批改失败，需人工复核: {}", ctx, reason);
        if let Err(e) = self
            .review_writer
            .write(&ctx.student_id, &ctx.exam_id, &ctx.question_id, &reason)
            .await
        {
            warn!("{} ⚠️ 写入复核清单失败: {}", ctx, e);
        }
        QuestionOutcome::Failed(GradingFailure {
            grading_error: reason,
            question_focus,
        })
    }
}

fn build_request(
    meta: &QuestionMetadata,
    answer: &AnswerValue,
    rubric: Option<&str>,
    few_shot: Option<&str>,
) -> OracleRequest {
    OracleRequest {
        question_id: meta.question_id.clone(),
        question: meta.question.clone(),
        rubric: rubric.map(str::to_string),
        few_shot: few_shot.map(str::to_string),
        full_point: meta.full_point,
        student_answer: answer.to_string(),
    }
}
