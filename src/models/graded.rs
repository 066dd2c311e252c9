use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::question::compare_question_ids;

const SCORE_EPSILON: f64 = 1e-9;

/// 两个分数是否相等
pub fn same_score(a: f64, b: f64) -> bool {
    (a - b).abs() < SCORE_EPSILON
}

/// 单题批改结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub point_earned: f64,
    pub question_focus: String,
    pub get_full_point: bool,
    /// 仅在调用过大模型时存在
    #[serde(
        default,
        alias = "LLM_feedback",
        skip_serializing_if = "Option::is_none"
    )]
    pub feedback: Option<String>,
}

impl GradedAnswer {
    /// 根据得分与满分构造，自动判定是否满分
    pub fn new(
        point_earned: f64,
        full_point: f64,
        question_focus: impl Into<String>,
        feedback: Option<String>,
    ) -> Self {
        Self {
            point_earned,
            question_focus: question_focus.into(),
            get_full_point: same_score(point_earned, full_point),
            feedback,
        }
    }
}

/// 无法批改的题目，留给人工处理
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingFailure {
    pub grading_error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_focus: Option<String>,
}

/// 单题结果：已批改或批改失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionOutcome {
    Graded(GradedAnswer),
    Failed(GradingFailure),
}

impl QuestionOutcome {
    pub fn graded(&self) -> Option<&GradedAnswer> {
        match self {
            QuestionOutcome::Graded(answer) => Some(answer),
            QuestionOutcome::Failed(_) => None,
        }
    }
}

/// 一个学生本次考试的批改结果（answer_revise.json）
///
/// 每次批改整体覆盖，总分每次重新计算
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerRevise {
    #[serde(flatten)]
    pub questions: BTreeMap<String, QuestionOutcome>,
    #[serde(rename = "total_point_earned_of_this_exam", default)]
    pub total: f64,
}

impl AnswerRevise {
    /// 由各题结果构造，总分只累加已批改的题目
    pub fn from_outcomes(questions: BTreeMap<String, QuestionOutcome>) -> Self {
        let total = questions
            .values()
            .filter_map(QuestionOutcome::graded)
            .map(|g| g.point_earned)
            .sum();
        Self { questions, total }
    }

    /// 按题号顺序排列的结果
    pub fn ordered(&self) -> Vec<(&str, &QuestionOutcome)> {
        let mut items: Vec<_> = self
            .questions
            .iter()
            .map(|(id, outcome)| (id.as_str(), outcome))
            .collect();
        items.sort_by(|a, b| compare_question_ids(a.0, b.0));
        items
    }

    /// 未得满分的题目 (题号, 知识点)
    pub fn wrong_items(&self) -> Vec<(&str, &str)> {
        self.ordered()
            .into_iter()
            .filter_map(|(id, outcome)| outcome.graded().map(|g| (id, g)))
            .filter(|(_, g)| !g.get_full_point)
            .map(|(id, g)| (id, g.question_focus.as_str()))
            .collect()
    }

    /// 未得满分题目的知识点列表
    pub fn wrong_focus(&self) -> Vec<String> {
        self.wrong_items()
            .into_iter()
            .map(|(_, focus)| focus.to_string())
            .collect()
    }

    /// 批改失败、需人工复核的题号
    pub fn needs_review(&self) -> Vec<String> {
        self.ordered()
            .into_iter()
            .filter(|(_, outcome)| matches!(outcome, QuestionOutcome::Failed(_)))
            .map(|(id, _)| id.to_string())
            .collect()
    }
}
