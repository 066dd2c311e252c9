//! 历史记录 - 业务能力层
//!
//! 把本次考试的分数、名次、错题知识点写入学生的 exam_record.json

use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::StudentRepository;
use crate::models::{AnswerRevise, ExamRecordEntry};

pub struct HistoryRecorder {
    repo: StudentRepository,
}

impl HistoryRecorder {
    pub fn new(repo: StudentRepository) -> Self {
        Self { repo }
    }

    /// 以考试标识为键写入（覆盖同名考试，保留其它考试）
    ///
    /// 返回记录是否有变化；内容相同时不重写文件
    pub async fn record(
        &self,
        student_id: &str,
        exam_id: &str,
        revise: &AnswerRevise,
        rank: u32,
    ) -> AppResult<bool> {
        let mut ledger = self.repo.load_ledger(student_id).await?;
        let entry = ExamRecordEntry {
            score: revise.total,
            rank,
            wrong_focus: revise.wrong_focus(),
            needs_review: revise.needs_review(),
        };

        let changed = ledger.record(exam_id, entry);
        if changed {
            self.repo.save_ledger(student_id, &ledger).await?;
            debug!("[学生 {}] 历史记录已更新: {}", student_id, exam_id);
        } else {
            debug!("[学生 {}] 历史记录无变化: {}", student_id, exam_id);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GradedAnswer, GradingFailure, HistoryLedger, QuestionOutcome};
    use std::collections::BTreeMap;

    fn revise() -> AnswerRevise {
        let mut questions = BTreeMap::new();
        questions.insert(
            "1".to_string(),
            QuestionOutcome::Graded(GradedAnswer::new(5.0, 5.0, "集合", None)),
        );
        questions.insert(
            "2".to_string(),
            QuestionOutcome::Graded(GradedAnswer::new(0.0, 5.0, "复数", None)),
        );
        questions.insert(
            "17".to_string(),
            QuestionOutcome::Failed(GradingFailure {
                grading_error: "大模型返回内容无法解析".to_string(),
                question_focus: Some("导数".to_string()),
            }),
        );
        AnswerRevise::from_outcomes(questions)
    }

    #[tokio::test]
    async fn test_record_is_idempotent_and_keeps_other_exams() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("s1")).unwrap();
        std::fs::write(
            dir.path().join("s1").join("exam_record.json"),
            r#"{"exam_1": {"score": 70, "rank": 3, "wrong_focus": ["函数"]}}"#,
        )
        .unwrap();

        let repo = StudentRepository::new(dir.path());
        let recorder = HistoryRecorder::new(repo.clone());

        assert!(recorder.record("s1", "exam_2", &revise(), 2).await.unwrap());
        let first = std::fs::read_to_string(dir.path().join("s1").join("exam_record.json")).unwrap();

        assert!(!recorder.record("s1", "exam_2", &revise(), 2).await.unwrap());
        let second = std::fs::read_to_string(dir.path().join("s1").join("exam_record.json")).unwrap();
        assert_eq!(first, second);

        let ledger: HistoryLedger = repo.load_ledger("s1").await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("exam_1").unwrap().rank, 3);
        let entry = ledger.get("exam_2").unwrap();
        assert_eq!(entry.score, 5.0);
        assert_eq!(entry.wrong_focus, vec!["复数"]);
        assert_eq!(entry.needs_review, vec!["17"]);
    }

    #[tokio::test]
    async fn test_rerecord_overwrites_same_exam() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("s1")).unwrap();
        let repo = StudentRepository::new(dir.path());
        let recorder = HistoryRecorder::new(repo.clone());

        recorder.record("s1", "exam_3", &revise(), 5).await.unwrap();
        assert!(recorder.record("s1", "exam_3", &revise(), 1).await.unwrap());
        let ledger = repo.load_ledger("s1").await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("exam_3").unwrap().rank, 1);
    }
}
