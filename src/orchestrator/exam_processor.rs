//! 单个学生处理器 - 编排层
//!
//! ## 职责
//!
//! 批改一个学生本次考试的全部题目，是学生级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **遍历题目**：按题型、题号顺序逐题批改（同一学生内串行）
//! 2. **流程调度**：复用同一个 `QuestionFlow`
//! 3. **汇总总分**：只累加批改成功的题目
//! 4. **写回结果**：整体覆盖 answer_revise.json
//! 5. **统计输出**：记录成功 / 失败题数

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::error::AppResult;
use crate::infrastructure::StudentRepository;
use crate::models::{AnswerRevise, QuestionOutcome};
use crate::workflow::{QuestionCtx, QuestionFlow};

/// 一个学生的批改结果
#[derive(Debug, Clone)]
pub struct StudentResult {
    pub student_id: String,
    pub revise: AnswerRevise,
    pub graded: usize,
    pub failed: usize,
}

/// 学生级编排器
pub struct ExamProcessor {
    flow: QuestionFlow,
    repo: StudentRepository,
    exam_id: String,
}

impl ExamProcessor {
    pub fn new(flow: QuestionFlow, repo: StudentRepository, exam_id: impl Into<String>) -> Self {
        Self {
            flow,
            repo,
            exam_id: exam_id.into(),
        }
    }

    /// 批改一个学生并写回批改结果
    ///
    /// 单题失败只记录在结果中；只有答题记录无法读取或结果无法写入时才返回错误
    pub async fn grade_student(&self, student_id: &str) -> AppResult<StudentResult> {
        let answers = self.repo.load_answers(student_id).await?;
        info!(
            "[学生 {}] 📝 开始批改，共 {} 道题",
            student_id,
            answers.question_count()
        );

        let mut outcomes: BTreeMap<String, QuestionOutcome> = BTreeMap::new();
        for (category, question_id, answer) in answers.iter() {
            let ctx = QuestionCtx::new(student_id, &self.exam_id, question_id, category);
            let outcome = self.flow.run(&ctx, answer).await;
            if outcomes.insert(question_id.to_string(), outcome).is_some() {
                warn!("{} ⚠️ 题号在答题卡中重复出现，保留最后一次", ctx);
            }
        }

        let revise = AnswerRevise::from_outcomes(outcomes);
        let failed = revise.needs_review().len();
        let graded = revise.questions.len() - failed;
        self.repo.save_answer_revise(student_id, &revise).await?;

        info!(
            "[学生 {}] ✓ 批改完成: 总分 {}，成功 {} 题，待复核 {} 题",
            student_id, revise.total, graded, failed
        );

        Ok(StudentResult {
            student_id: student_id.to_string(),
            revise,
            graded,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, FileError};
    use crate::infrastructure::QuestionMetadataStore;
    use crate::models::{GradingScheme, QuestionMetadata, QuestionType};
    use crate::services::{GradingOracle, OracleRequest, ReviewWriter, RubricVerdict, ScoreDecision};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl GradingOracle for Unreachable {
        async fn grade_with_rubric(&self, _r: &OracleRequest) -> AppResult<RubricVerdict> {
            Err(AppError::malformed_response("", "不可用"))
        }
        async fn assess(&self, _r: &OracleRequest) -> AppResult<String> {
            Err(AppError::malformed_response("", "不可用"))
        }
        async fn decide(&self, _r: &OracleRequest, _n: &str) -> AppResult<ScoreDecision> {
            Err(AppError::malformed_response("", "不可用"))
        }
    }

    fn processor(dir: &std::path::Path) -> ExamProcessor {
        let store = QuestionMetadataStore::from_questions(vec![
            QuestionMetadata {
                question_id: "1".into(),
                question_type: QuestionType::SingleChoice,
                question: String::new(),
                full_point: 5.0,
                question_focus: "集合".into(),
                section: None,
                scheme: GradingScheme::SingleChoice { correct: "A".into() },
            },
            QuestionMetadata {
                question_id: "15".into(),
                question_type: QuestionType::Comprehensive,
                question: String::new(),
                full_point: 12.0,
                question_focus: "导数".into(),
                section: None,
                scheme: GradingScheme::OracleOnly { section_rubric: None },
            },
        ]);
        let flow = QuestionFlow::new(
            Arc::new(store),
            Arc::new(Unreachable),
            Arc::new(ReviewWriter::with_path(dir.join("needs_review.txt"))),
            false,
        );
        ExamProcessor::new(flow, StudentRepository::new(dir), "exam_5")
    }

    #[tokio::test]
    async fn test_failed_question_does_not_abort_student() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("s1")).unwrap();
        std::fs::write(
            dir.path().join("s1").join("student_s_answers.json"),
            r#"{"单项选择题": {"1": "A"}, "解答题": {"15": "解：……"}}"#,
        )
        .unwrap();

        let result = processor(dir.path()).grade_student("s1").await.unwrap();
        assert_eq!(result.graded, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.revise.total, 5.0);
        assert_eq!(result.revise.needs_review(), vec!["15"]);

        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("s1").join("answer_revise.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved["total_point_earned_of_this_exam"], 5.0);
        assert_eq!(saved["1"]["get_full_point"], true);
        assert!(saved["15"]["grading_error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_answer_sheet_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("s2")).unwrap();
        let err = processor(dir.path()).grade_student("s2").await.unwrap_err();
        assert!(matches!(err, AppError::File(FileError::NotFound { .. })));
    }
}
