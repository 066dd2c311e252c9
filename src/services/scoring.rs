//! 确定性判分 - 业务能力层
//!
//! 纯函数：(评分方案参数, 学生答案) → 得分，不做任何 I/O

use std::collections::BTreeSet;

use crate::error::{AppResult, ShapeError};
use crate::models::{choice_letters, normalize_choice, AnswerValue, QuestionType};

/// 单选题答案应为字符串，或只有一项的列表
///
/// 多选题的字母列表由 [`score_multi_choice`] 直接按集合处理，不经过这里
pub fn ensure_single_choice_shape(answer: &AnswerValue) -> AppResult<()> {
    match answer {
        AnswerValue::List(items) if items.len() != 1 => Err(ShapeError::UnexpectedKind {
            expected: QuestionType::SingleChoice.name().to_string(),
            wanted: "字符串",
            got: answer.kind_name(),
        }
        .into()),
        _ => Ok(()),
    }
}

/// 单选题：归一化后完全一致得满分，否则 0 分
pub fn score_single_choice(correct: &str, answer: &AnswerValue, full_point: f64) -> f64 {
    if normalize_choice(&answer.joined("")) == correct {
        full_point
    } else {
        0.0
    }
}

/// 多选题
///
/// 完全一致得满分；选了且只选了正确选项中的一部分得部分分；
/// 含错误选项、空答案或完全不相交都是 0 分
pub fn score_multi_choice(
    correct: &BTreeSet<char>,
    partially_correct: f64,
    answer: &AnswerValue,
    full_point: f64,
) -> f64 {
    let selected = choice_letters(answer);
    if selected.is_empty() {
        return 0.0;
    }
    if &selected == correct {
        full_point
    } else if selected.is_subset(correct) {
        partially_correct.min(full_point)
    } else {
        0.0
    }
}

/// 填空题：满分减去每个错空的扣分，向零取整，最低 0 分
///
/// 空数与参考答案不一致时返回 [`ShapeError`]，由调用方转交兜底批改
pub fn score_fill_in_blank(
    correct: &[String],
    penalties: &[f64],
    answer: &AnswerValue,
    full_point: f64,
) -> AppResult<f64> {
    let submitted = answer.items();
    if submitted.len() != correct.len() {
        return Err(ShapeError::LengthMismatch {
            expected: correct.len(),
            submitted: submitted.len(),
        }
        .into());
    }

    let deduction: f64 = correct
        .iter()
        .zip(&submitted)
        .zip(penalties)
        .filter(|((expected, given), _)| expected.trim() != given.trim())
        .map(|(_, penalty)| penalty)
        .sum();

    if deduction == 0.0 {
        return Ok(full_point);
    }
    Ok((full_point - deduction).trunc().max(0.0))
}
