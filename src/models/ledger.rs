use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 一次考试的历史记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamRecordEntry {
    pub score: f64,
    pub rank: u32,
    #[serde(default)]
    pub wrong_focus: Vec<String>,
    /// 批改失败、等待人工复核的题号
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub needs_review: Vec<String>,
}

/// 学生跨考试的历史记录（exam_record.json）
///
/// 以考试标识为键，只追加或覆盖同名考试，从不删除
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLedger {
    entries: BTreeMap<String, ExamRecordEntry>,
}

impl HistoryLedger {
    /// 写入一次考试的记录，返回记录是否发生变化
    pub fn record(&mut self, exam_id: &str, entry: ExamRecordEntry) -> bool {
        match self.entries.get(exam_id) {
            Some(existing) if *existing == entry => false,
            _ => {
                self.entries.insert(exam_id.to_string(), entry);
                true
            }
        }
    }

    pub fn get(&self, exam_id: &str) -> Option<&ExamRecordEntry> {
        self.entries.get(exam_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按考试序号排序的记录；无法解析序号的键被跳过
    pub fn by_exam_number(&self) -> Vec<(u32, &ExamRecordEntry)> {
        let mut items: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(key, entry)| exam_number(key).map(|n| (n, entry)))
            .collect();
        items.sort_by_key(|(n, _)| *n);
        items
    }

    /// 所有考试中答错的知识点
    pub fn all_wrong_focus(&self) -> Vec<&str> {
        self.by_exam_number()
            .into_iter()
            .flat_map(|(_, entry)| entry.wrong_focus.iter().map(String::as_str))
            .collect()
    }
}

/// 从 "exam_5" 这样的键中取出考试序号
pub fn exam_number(exam_id: &str) -> Option<u32> {
    let re = Regex::new(r"(\d+)\s*$").ok()?;
    re.captures(exam_id)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
