//! 题目批改上下文
//!
//! 封装"我正在批改哪个学生哪次考试的哪道题"这一信息

use std::fmt::Display;

use crate::models::QuestionType;

/// 题目批改上下文
#[derive(Debug, Clone)]
pub struct QuestionCtx {
    pub student_id: String,
    pub exam_id: String,
    pub question_id: String,

    /// 答题卡上的题型分类（可能与元数据不一致）
    pub category: QuestionType,
}

impl QuestionCtx {
    pub fn new(
        student_id: impl Into<String>,
        exam_id: impl Into<String>,
        question_id: impl Into<String>,
        category: QuestionType,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            exam_id: exam_id.into(),
            question_id: question_id.into(),
            category,
        }
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[学生 {} 题目#{}]", self.student_id, self.question_id)
    }
}
