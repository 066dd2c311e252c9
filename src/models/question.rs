use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{AppResult, MetadataError};
use crate::models::answer::AnswerValue;

/// 题型
///
/// 答题卡上的中文分类名（单项选择题 等）作为别名接受
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[serde(alias = "单项选择题", alias = "单选题")]
    SingleChoice,
    #[serde(alias = "多项选择题", alias = "多选题")]
    MultiChoice,
    #[serde(alias = "填空题")]
    FillInBlank,
    #[serde(alias = "解答题")]
    Comprehensive,
}

impl QuestionType {
    /// 获取中文名称
    pub fn name(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "单项选择题",
            QuestionType::MultiChoice => "多项选择题",
            QuestionType::FillInBlank => "填空题",
            QuestionType::Comprehensive => "解答题",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 题目元数据文件（question_metadata.json）的原始内容
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestionMetadata {
    pub question_type: QuestionType,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub correct_answer: Option<AnswerValue>,
    pub full_point: f64,
    #[serde(default)]
    pub scoring_rules: Option<JsonValue>,
    #[serde(default)]
    pub grading_rubric: Option<JsonValue>,
    #[serde(default)]
    pub few_shot: Option<JsonValue>,
    #[serde(default)]
    pub question_focus: String,
    #[serde(default, alias = "section_it_belongs_to")]
    pub section: Option<String>,
}

impl RawQuestionMetadata {
    /// 既没有参考答案也没有评分细则，只能交给大模型
    pub fn needs_section_rubric(&self) -> bool {
        self.correct_answer.is_none() && self.grading_rubric.is_none()
    }
}

/// 评分方案，在加载元数据时一次性确定
#[derive(Debug, Clone, PartialEq)]
pub enum GradingScheme {
    SingleChoice {
        correct: String,
    },
    MultiChoice {
        correct: BTreeSet<char>,
        partially_correct: f64,
    },
    FillInBlank {
        correct: Vec<String>,
        penalties: Vec<f64>,
    },
    /// 按评分细则由大模型逐点批改
    Rubric {
        rubric: String,
        few_shot: Option<String>,
    },
    /// 无参考答案也无细则，两阶段兜底批改
    OracleOnly {
        section_rubric: Option<String>,
    },
}

impl GradingScheme {
    pub fn label(&self) -> &'static str {
        match self {
            GradingScheme::SingleChoice { .. } => "单选判分",
            GradingScheme::MultiChoice { .. } => "多选判分",
            GradingScheme::FillInBlank { .. } => "填空判分",
            GradingScheme::Rubric { .. } => "细则批改",
            GradingScheme::OracleOnly { .. } => "大模型兜底",
        }
    }

    /// 有参考答案的方案转交兜底批改时，附给大模型的参考答案与给分规则
    pub fn answer_key(&self) -> Option<String> {
        match self {
            GradingScheme::SingleChoice { correct } => Some(format!("参考答案：{}", correct)),
            GradingScheme::MultiChoice {
                correct,
                partially_correct,
            } => Some(format!(
                "参考答案：{}，全部选对得满分，选对部分且无错选得 {} 分，有错选不得分",
                correct.iter().collect::<String>(),
                partially_correct
            )),
            GradingScheme::FillInBlank { correct, penalties } => Some(format!(
                "参考答案：[{}]，每空扣分 [{}]",
                correct.join("；"),
                penalties
                    .iter()
                    .map(f64::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            GradingScheme::Rubric { .. } | GradingScheme::OracleOnly { .. } => None,
        }
    }
}

/// 解析完成的题目元数据
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionMetadata {
    pub question_id: String,
    pub question_type: QuestionType,
    pub question: String,
    pub full_point: f64,
    pub question_focus: String,
    pub section: Option<String>,
    pub scheme: GradingScheme,
}

impl QuestionMetadata {
    /// 根据题型和已有字段确定评分方案
    ///
    /// - 选择题 / 填空题：有参考答案走确定性判分；只有细则走细则批改
    /// - 解答题：必须有细则
    /// - 两者皆无：大模型兜底（附带分区通用评分标准）
    pub fn resolve(
        question_id: &str,
        raw: RawQuestionMetadata,
        section_rubric: Option<String>,
    ) -> AppResult<Self> {
        if !raw.full_point.is_finite() || raw.full_point < 0.0 {
            return Err(MetadataError::Malformed {
                question_id: question_id.to_string(),
                reason: format!("full_point 不合法: {}", raw.full_point),
            }
            .into());
        }

        let scheme = match (&raw.correct_answer, &raw.grading_rubric) {
            (None, None) => GradingScheme::OracleOnly { section_rubric },
            (Some(answer), _) if raw.question_type != QuestionType::Comprehensive => {
                resolve_keyed(
                    question_id,
                    raw.question_type,
                    answer,
                    raw.scoring_rules.as_ref(),
                    raw.full_point,
                )?
            }
            (_, Some(rubric)) => GradingScheme::Rubric {
                rubric: render_json_text(rubric),
                few_shot: raw.few_shot.as_ref().map(render_json_text),
            },
            (Some(_), None) => {
                return Err(MetadataError::MissingField {
                    question_id: question_id.to_string(),
                    field: "grading_rubric".to_string(),
                }
                .into())
            }
        };

        Ok(Self {
            question_id: question_id.to_string(),
            question_type: raw.question_type,
            question: raw.question.unwrap_or_default(),
            full_point: raw.full_point,
            question_focus: raw.question_focus,
            section: raw.section,
            scheme,
        })
    }
}

fn resolve_keyed(
    question_id: &str,
    question_type: QuestionType,
    answer: &AnswerValue,
    scoring_rules: Option<&JsonValue>,
    full_point: f64,
) -> AppResult<GradingScheme> {
    let missing = |field: &str| MetadataError::MissingField {
        question_id: question_id.to_string(),
        field: field.to_string(),
    };

    match question_type {
        QuestionType::SingleChoice => Ok(GradingScheme::SingleChoice {
            correct: normalize_choice(&answer.joined("")),
        }),
        QuestionType::MultiChoice => {
            let partially_correct = scoring_rules
                .and_then(|rules| rules.get("partially_correct"))
                .and_then(JsonValue::as_f64)
                .ok_or_else(|| missing("scoring_rules.partially_correct"))?;
            if !partially_correct.is_finite()
                || partially_correct < 0.0
                || partially_correct > full_point
            {
                return Err(MetadataError::Malformed {
                    question_id: question_id.to_string(),
                    reason: format!(
                        "partially_correct 应在 0 到 {} 之间: {}",
                        full_point, partially_correct
                    ),
                }
                .into());
            }
            Ok(GradingScheme::MultiChoice {
                correct: choice_letters(answer),
                partially_correct,
            })
        }
        QuestionType::FillInBlank => {
            let correct = answer.items();
            let penalties = scoring_rules
                .and_then(penalty_vector)
                .ok_or_else(|| missing("scoring_rules"))?;
            if penalties.len() != correct.len() {
                return Err(MetadataError::PenaltyLengthMismatch {
                    question_id: question_id.to_string(),
                    penalties: penalties.len(),
                    answers: correct.len(),
                }
                .into());
            }
            Ok(GradingScheme::FillInBlank { correct, penalties })
        }
        QuestionType::Comprehensive => Err(missing("grading_rubric").into()),
    }
}

/// 扣分向量：数组，或 `{"penalties": [...]}`
///
/// 取绝对值，负数写法（满分加上扣分）与正数写法等价
fn penalty_vector(rules: &JsonValue) -> Option<Vec<f64>> {
    let array = rules
        .as_array()
        .or_else(|| rules.get("penalties").and_then(JsonValue::as_array))?;
    array
        .iter()
        .map(|v| v.as_f64().map(f64::abs))
        .collect::<Option<Vec<_>>>()
}

fn render_json_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// 单选答案归一化：去空白、转大写
pub fn normalize_choice(answer: &str) -> String {
    answer
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// 多选答案的字母集合
pub fn choice_letters(answer: &AnswerValue) -> BTreeSet<char> {
    answer
        .joined("")
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// 题号排序：纯数字按数值，其余按字典序且排在数字之后
pub fn compare_question_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: JsonValue) -> RawQuestionMetadata {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_chinese_type_alias() {
        let t: QuestionType = serde_json::from_str("\"多项选择题\"").unwrap();
        assert_eq!(t, QuestionType::MultiChoice);
        let t: QuestionType = serde_json::from_str("\"fill_in_blank\"").unwrap();
        assert_eq!(t, QuestionType::FillInBlank);
    }

    #[test]
    fn test_resolve_multi_choice() {
        let meta = QuestionMetadata::resolve(
            "9",
            raw(json!({
                "question_type": "multi_choice",
                "correct_answer": "ABC",
                "full_point": 5,
                "scoring_rules": {"partially_correct": 3},
                "question_focus": "函数性质"
            })),
            None,
        )
        .unwrap();

        match meta.scheme {
            GradingScheme::MultiChoice {
                correct,
                partially_correct,
            } => {
                assert_eq!(correct, BTreeSet::from(['A', 'B', 'C']));
                assert_eq!(partially_correct, 3.0);
            }
            other => panic!("意外的评分方案: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_multi_choice_without_partial_rule_fails() {
        let err = QuestionMetadata::resolve(
            "9",
            raw(json!({
                "question_type": "multi_choice",
                "correct_answer": "ABC",
                "full_point": 5
            })),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("partially_correct"));
    }

    #[test]
    fn test_resolve_fill_in_blank_accepts_negative_penalties() {
        let meta = QuestionMetadata::resolve(
            "12",
            raw(json!({
                "question_type": "填空题",
                "correct_answer": ["x", "y"],
                "full_point": 4,
                "scoring_rules": [-2, -2]
            })),
            None,
        )
        .unwrap();
        assert_eq!(
            meta.scheme,
            GradingScheme::FillInBlank {
                correct: vec!["x".to_string(), "y".to_string()],
                penalties: vec![2.0, 2.0],
            }
        );
    }

    #[test]
    fn test_resolve_penalty_length_mismatch() {
        let err = QuestionMetadata::resolve(
            "12",
            raw(json!({
                "question_type": "fill_in_blank",
                "correct_answer": ["x", "y", "z"],
                "full_point": 6,
                "scoring_rules": {"penalties": [2, 2]}
            })),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Metadata(MetadataError::PenaltyLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_resolve_without_key_or_rubric_goes_to_oracle() {
        let meta = QuestionMetadata::resolve(
            "3",
            raw(json!({
                "question_type": "single_choice",
                "full_point": 5,
                "section_it_belongs_to": "选择题"
            })),
            Some("选对得分".to_string()),
        )
        .unwrap();
        assert_eq!(
            meta.scheme,
            GradingScheme::OracleOnly {
                section_rubric: Some("选对得分".to_string())
            }
        );
        assert_eq!(meta.section.as_deref(), Some("选择题"));
    }

    #[test]
    fn test_resolve_comprehensive_needs_rubric() {
        let err = QuestionMetadata::resolve(
            "15",
            raw(json!({
                "question_type": "comprehensive",
                "correct_answer": "x = 1",
                "full_point": 12
            })),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("grading_rubric"));

        let meta = QuestionMetadata::resolve(
            "15",
            raw(json!({
                "question_type": "comprehensive",
                "full_point": 12,
                "grading_rubric": {"point_1": "求导正确得 2 分"}
            })),
            None,
        )
        .unwrap();
        assert!(matches!(meta.scheme, GradingScheme::Rubric { .. }));
    }

    #[test]
    fn test_negative_full_point_rejected() {
        assert!(QuestionMetadata::resolve(
            "1",
            raw(json!({"question_type": "single_choice", "correct_answer": "A", "full_point": -1})),
            None,
        )
        .is_err());
    }

    #[test]
    fn test_resolve_rejects_out_of_range_partial_credit() {
        for partial in [-2.0, 6.0] {
            let err = QuestionMetadata::resolve(
                "9",
                raw(json!({
                    "question_type": "multi_choice",
                    "correct_answer": "ABC",
                    "full_point": 5,
                    "scoring_rules": {"partially_correct": partial}
                })),
                None,
            )
            .unwrap_err();
            assert!(matches!(
                err,
                crate::error::AppError::Metadata(MetadataError::Malformed { .. })
            ));
        }
    }

    #[test]
    fn test_answer_key_for_fallback() {
        let fill = GradingScheme::FillInBlank {
            correct: vec!["x".into(), "y".into(), "z".into()],
            penalties: vec![2.0, 2.0, 2.0],
        };
        assert_eq!(
            fill.answer_key().as_deref(),
            Some("参考答案：[x；y；z]，每空扣分 [2, 2, 2]")
        );
        let single = GradingScheme::SingleChoice { correct: "B".into() };
        assert_eq!(single.answer_key().as_deref(), Some("参考答案：B"));
        let oracle_only = GradingScheme::OracleOnly { section_rubric: None };
        assert_eq!(oracle_only.answer_key(), None);
    }

    #[test]
    fn test_compare_question_ids() {
        let mut ids = vec!["10", "2", "b", "1", "a"];
        ids.sort_by(|a, b| compare_question_ids(a, b));
        assert_eq!(ids, vec!["1", "2", "10", "a", "b"]);
    }
}
