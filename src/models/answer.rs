use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::question::QuestionType;

/// 答案值：字符串（单选 / 多选 / 解答）或有序列表（填空）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    List(Vec<String>),
}

impl AnswerValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AnswerValue::Text(_) => "字符串",
            AnswerValue::List(_) => "列表",
        }
    }

    /// 拼接为单个字符串
    pub fn joined(&self, sep: &str) -> String {
        match self {
            AnswerValue::Text(s) => s.clone(),
            AnswerValue::List(items) => items.join(sep),
        }
    }

    /// 作为有序序列；字符串视为只有一个空
    pub fn items(&self) -> Vec<String> {
        match self {
            AnswerValue::Text(s) => vec![s.clone()],
            AnswerValue::List(items) => items.clone(),
        }
    }
}

impl std::fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerValue::Text(s) => write!(f, "{}", s),
            AnswerValue::List(items) => write!(f, "[{}]", items.join("；")),
        }
    }
}

/// 一个学生一次考试的答题记录（student_s_answers.json）
///
/// 按题型分类，每类内为 题号 → 原始答案
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentAnswerRecord {
    pub categories: BTreeMap<QuestionType, BTreeMap<String, AnswerValue>>,
}

impl StudentAnswerRecord {
    /// 按题型顺序遍历所有 (题型, 题号, 答案)
    pub fn iter(&self) -> impl Iterator<Item = (QuestionType, &str, &AnswerValue)> {
        self.categories.iter().flat_map(|(category, answers)| {
            answers
                .iter()
                .map(move |(id, answer)| (*category, id.as_str(), answer))
        })
    }

    pub fn question_count(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer_sheet_with_chinese_categories() {
        let record: StudentAnswerRecord = serde_json::from_str(
            r#"{
                "单项选择题": {"1": "A", "2": "B"},
                "多项选择题": {"9": "ABC"},
                "填空题": {"12": ["x", "w", "z"]},
                "解答题": {"15": "解：令 f'(x) = 0 ……"}
            }"#,
        )
        .unwrap();

        assert_eq!(record.question_count(), 5);
        let items: Vec<_> = record.iter().map(|(t, id, _)| (t, id.to_string())).collect();
        assert_eq!(items[0], (QuestionType::SingleChoice, "1".to_string()));
        assert_eq!(items[3], (QuestionType::FillInBlank, "12".to_string()));
        assert_eq!(
            record.categories[&QuestionType::FillInBlank]["12"],
            AnswerValue::List(vec!["x".into(), "w".into(), "z".into()])
        );
    }

    #[test]
    fn test_answer_value_helpers() {
        let list = AnswerValue::List(vec!["1".into(), "2".into()]);
        assert_eq!(list.joined(","), "1,2");
        assert_eq!(list.to_string(), "[1；2]");
        assert_eq!(AnswerValue::Text("AB".into()).items(), vec!["AB".to_string()]);
    }
}
