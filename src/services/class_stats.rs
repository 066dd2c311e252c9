//! 班级统计 - 业务能力层
//!
//! 只做计算，不读写文件；报告生成器负责把结果渲染成表格

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{compare_question_ids, AnswerRevise, HistoryLedger, StudentInfo};

/// 一个学生在本次考试后的完整数据
#[derive(Debug, Clone)]
pub struct StudentSnapshot {
    pub student_id: String,
    pub info: StudentInfo,
    pub revise: AnswerRevise,
    pub ledger: HistoryLedger,
    pub score: f64,
    pub rank: u32,
}

impl StudentSnapshot {
    /// 截止到指定考试的 (考试序号, 分数, 名次)
    pub fn history_until(&self, exam_number: u32) -> Vec<(u32, f64, u32)> {
        self.ledger
            .by_exam_number()
            .into_iter()
            .filter(|(n, _)| *n <= exam_number)
            .map(|(n, entry)| (n, entry.score, entry.rank))
            .collect()
    }
}

/// 分数段
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBin {
    pub lower: u32,
    pub upper: u32,
    pub count: usize,
}

/// 一次考试的分数统计
#[derive(Debug, Clone, PartialEq)]
pub struct ExamStats {
    pub exam_number: u32,
    pub count: usize,
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    pub median: f64,
}

/// 满分率
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyRow {
    pub key: String,
    pub full_credit: usize,
    pub total: usize,
}

impl AccuracyRow {
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.full_credit as f64 / self.total as f64
        }
    }
}

/// 第一次考试到最近一次考试的名次变化，正数为进步
#[derive(Debug, Clone, PartialEq)]
pub struct RankChange {
    pub name: String,
    pub first_rank: u32,
    pub latest_rank: u32,
    pub diff: i64,
}

/// 平均名次表的一行
#[derive(Debug, Clone, PartialEq)]
pub struct AverageRankRow {
    pub name: String,
    pub ranks: Vec<Option<u32>>,
    pub average: Option<f64>,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// 中位数，偶数个时取中间两个的平均
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// 10 分一段的分数分布；最后一段包含最高分
pub fn score_distribution(scores: &[f64]) -> Vec<ScoreBin> {
    let max = scores.iter().cloned().fold(0.0_f64, f64::max);
    let bins = ((max / 10.0).ceil() as usize).max(1);
    let mut counts = vec![0usize; bins];
    for score in scores {
        let index = ((score.max(0.0) / 10.0).floor() as usize).min(bins - 1);
        counts[index] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| ScoreBin {
            lower: i as u32 * 10,
            upper: (i as u32 + 1) * 10,
            count,
        })
        .collect()
}

/// 每次考试的平均分、最高分、最低分、中位数
pub fn exam_trend(students: &[StudentSnapshot]) -> Vec<ExamStats> {
    let mut by_exam: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for student in students {
        for (n, entry) in student.ledger.by_exam_number() {
            by_exam.entry(n).or_default().push(entry.score);
        }
    }

    by_exam
        .into_iter()
        .filter_map(|(exam_number, scores)| {
            Some(ExamStats {
                exam_number,
                count: scores.len(),
                mean: mean(&scores)?,
                max: scores.iter().cloned().fold(f64::MIN, f64::max),
                min: scores.iter().cloned().fold(f64::MAX, f64::min),
                median: median(&scores)?,
            })
        })
        .collect()
}

/// 每道题的满分率，按题号排序；批改失败的题不计入
pub fn question_accuracy(students: &[StudentSnapshot]) -> Vec<AccuracyRow> {
    let mut rows: BTreeMap<String, AccuracyRow> = BTreeMap::new();
    for student in students {
        for (question_id, outcome) in &student.revise.questions {
            if let Some(graded) = outcome.graded() {
                let row = rows.entry(question_id.clone()).or_insert_with(|| AccuracyRow {
                    key: question_id.clone(),
                    full_credit: 0,
                    total: 0,
                });
                row.total += 1;
                if graded.get_full_point {
                    row.full_credit += 1;
                }
            }
        }
    }
    let mut rows: Vec<_> = rows.into_values().collect();
    rows.sort_by(|a, b| compare_question_ids(&a.key, &b.key));
    rows
}

/// 每个知识点的满分率，从低到高
pub fn focus_accuracy(students: &[StudentSnapshot]) -> Vec<AccuracyRow> {
    let mut rows: BTreeMap<String, AccuracyRow> = BTreeMap::new();
    for student in students {
        for graded in student.revise.questions.values().filter_map(|o| o.graded()) {
            let focus = if graded.question_focus.is_empty() {
                "未知知识点"
            } else {
                graded.question_focus.as_str()
            };
            let row = rows.entry(focus.to_string()).or_insert_with(|| AccuracyRow {
                key: focus.to_string(),
                full_credit: 0,
                total: 0,
            });
            row.total += 1;
            if graded.get_full_point {
                row.full_credit += 1;
            }
        }
    }
    let mut rows: Vec<_> = rows.into_values().collect();
    rows.sort_by(|a, b| a.rate().partial_cmp(&b.rate()).unwrap_or(Ordering::Equal));
    rows
}

/// 满分率最低的 n 行（同率保持原顺序）
pub fn lowest(rows: &[AccuracyRow], n: usize) -> Vec<&AccuracyRow> {
    let mut sorted: Vec<&AccuracyRow> = rows.iter().collect();
    sorted.sort_by(|a, b| a.rate().partial_cmp(&b.rate()).unwrap_or(Ordering::Equal));
    sorted.truncate(n);
    sorted
}

/// 本次考试名次最靠前的 n 人
pub fn top_students(students: &[StudentSnapshot], n: usize) -> Vec<&StudentSnapshot> {
    let mut sorted: Vec<&StudentSnapshot> = students.iter().collect();
    sorted.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.student_id.cmp(&b.student_id)));
    sorted.truncate(n);
    sorted
}

/// 参加过至少两次考试的学生的名次变化
pub fn rank_changes(students: &[StudentSnapshot]) -> Vec<RankChange> {
    students
        .iter()
        .filter_map(|student| {
            let history = student.ledger.by_exam_number();
            let (_, first) = history.first()?;
            let (_, latest) = history.last()?;
            if history.len() < 2 {
                return None;
            }
            Some(RankChange {
                name: student.info.name.clone(),
                first_rank: first.rank,
                latest_rank: latest.rank,
                diff: first.rank as i64 - latest.rank as i64,
            })
        })
        .collect()
}

/// 进步最多的 n 人（只含名次上升的学生）
pub fn top_progress(changes: &[RankChange], n: usize) -> Vec<&RankChange> {
    let mut sorted: Vec<&RankChange> = changes.iter().filter(|c| c.diff > 0).collect();
    sorted.sort_by(|a, b| b.diff.cmp(&a.diff));
    sorted.truncate(n);
    sorted
}

/// 退步最多的 n 人（只含名次下降的学生）
pub fn top_decline(changes: &[RankChange], n: usize) -> Vec<&RankChange> {
    let mut sorted: Vec<&RankChange> = changes.iter().filter(|c| c.diff < 0).collect();
    sorted.sort_by(|a, b| a.diff.cmp(&b.diff));
    sorted.truncate(n);
    sorted
}

/// 各次考试名次与平均名次，平均名次从小到大，没有记录的排在最后
pub fn average_ranks(students: &[StudentSnapshot]) -> (Vec<u32>, Vec<AverageRankRow>) {
    let mut exams: Vec<u32> = students
        .iter()
        .flat_map(|s| s.ledger.by_exam_number().into_iter().map(|(n, _)| n))
        .collect();
    exams.sort_unstable();
    exams.dedup();

    let mut rows: Vec<AverageRankRow> = students
        .iter()
        .map(|student| {
            let by_exam: BTreeMap<u32, u32> = student
                .ledger
                .by_exam_number()
                .into_iter()
                .map(|(n, entry)| (n, entry.rank))
                .collect();
            let ranks: Vec<Option<u32>> = exams.iter().map(|n| by_exam.get(n).copied()).collect();
            let present: Vec<f64> = ranks.iter().flatten().map(|r| *r as f64).collect();
            AverageRankRow {
                name: student.info.name.clone(),
                ranks,
                average: mean(&present),
            }
        })
        .collect();

    rows.sort_by(|a, b| match (a.average, b.average) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    (exams, rows)
}
