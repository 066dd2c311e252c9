//! 排名 - 业务能力层
//!
//! 标准竞赛排名（"1224"）：名次 = 1 + 总分严格更高的人数

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// 一个学生的名次
#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub student_id: String,
    pub total: f64,
    pub rank: u32,
}

/// 按总分从高到低排名，同分同名次，后续名次跳过
///
/// 同分时按学号排列，只影响输出顺序，不影响名次
pub fn rank_students(totals: &BTreeMap<String, f64>) -> Vec<RankEntry> {
    let mut sorted: Vec<(&String, f64)> = totals.iter().map(|(id, total)| (id, *total)).collect();
    sorted.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let mut entries: Vec<RankEntry> = Vec::with_capacity(sorted.len());
    for (position, (student_id, total)) in sorted.into_iter().enumerate() {
        let rank = match entries.last() {
            Some(prev) if prev.total == total => prev.rank,
            _ => position as u32 + 1,
        };
        entries.push(RankEntry {
            student_id: student_id.clone(),
            total,
            rank,
        });
    }
    entries
}

/// 学号 → 名次
pub fn rank_map(totals: &BTreeMap<String, f64>) -> BTreeMap<String, u32> {
    rank_students(totals)
        .into_iter()
        .map(|entry| (entry.student_id, entry.rank))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(items: &[(&str, f64)]) -> BTreeMap<String, f64> {
        items.iter().map(|(id, t)| (id.to_string(), *t)).collect()
    }

    #[test]
    fn test_competition_ranking_with_ties() {
        let ranks = rank_map(&totals(&[("a", 90.0), ("b", 85.0), ("c", 85.0), ("d", 70.0)]));
        assert_eq!(ranks["a"], 1);
        assert_eq!(ranks["b"], 2);
        assert_eq!(ranks["c"], 2);
        assert_eq!(ranks["d"], 4);
    }

    #[test]
    fn test_rank_is_one_plus_strictly_greater() {
        let input = totals(&[("s1", 60.0), ("s2", 99.5), ("s3", 60.0), ("s4", 60.0), ("s5", 12.0)]);
        for entry in rank_students(&input) {
            let greater = input.values().filter(|t| **t > entry.total).count() as u32;
            assert_eq!(entry.rank, greater + 1, "学生 {}", entry.student_id);
        }
    }

    #[test]
    fn test_ties_ordered_by_student_id() {
        let order: Vec<String> = rank_students(&totals(&[("z", 80.0), ("m", 80.0), ("a", 95.0)]))
            .into_iter()
            .map(|e| e.student_id)
            .collect();
        assert_eq!(order, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(rank_students(&BTreeMap::new()).is_empty());
    }
}
