//! 批改校准 - 业务能力层
//!
//! 比较人工批改与大模型批改在每个踩分点上的得分，统计一致率

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::{load_json, same_score};

const REFERENCE_INSTANCE: &str = "correct";
const POINT_SCORE_KEY: &str = "该点得分";

/// 校准结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationReport {
    /// 实例 → 一致率
    pub instances: BTreeMap<String, f64>,
    /// 模型结果中缺失、未参与比较的实例
    pub skipped: Vec<String>,
    /// 各实例一致率的平均；没有可比较的实例时为 None
    pub overall: Option<f64>,
}

/// 单个实例的一致率：得分相同的踩分点数 / 人工踩分点数
pub fn instance_accuracy(reference: &JsonValue, model: &JsonValue) -> f64 {
    let Some(points) = reference.get("explanation").and_then(JsonValue::as_object) else {
        return 0.0;
    };
    if points.is_empty() {
        return 0.0;
    }
    let model_points = model.get("explanation");

    let matched = points
        .iter()
        .filter(|(name, detail)| {
            let expected = detail.get(POINT_SCORE_KEY).and_then(JsonValue::as_f64);
            let actual = model_points
                .and_then(|m| m.get(name.as_str()))
                .and_then(|d| d.get(POINT_SCORE_KEY))
                .and_then(JsonValue::as_f64);
            match (expected, actual) {
                (Some(a), Some(b)) => same_score(a, b),
                (None, None) => true,
                _ => false,
            }
        })
        .count();

    matched as f64 / points.len() as f64
}

/// 比较两份批改结果（均为 `{"scoring_rules": {<实例>: {...}}}`）
pub fn calibrate(reference: &JsonValue, model: &JsonValue) -> CalibrationReport {
    let empty = serde_json::Map::new();
    let reference = reference
        .get("scoring_rules")
        .and_then(JsonValue::as_object)
        .unwrap_or(&empty);
    let model = model
        .get("scoring_rules")
        .and_then(JsonValue::as_object)
        .unwrap_or(&empty);

    let mut report = CalibrationReport::default();
    for (instance, human) in reference {
        if instance == REFERENCE_INSTANCE {
            continue;
        }
        match model.get(instance) {
            Some(machine) => {
                report
                    .instances
                    .insert(instance.clone(), instance_accuracy(human, machine));
            }
            None => {
                warn!("⚠️ 模型结果中缺少实例 '{}'，跳过比较", instance);
                report.skipped.push(instance.clone());
            }
        }
    }

    if !report.instances.is_empty() {
        let sum: f64 = report.instances.values().sum();
        report.overall = Some(sum / report.instances.len() as f64);
    }
    report
}

/// 从文件读取并比较，逐项输出一致率
pub async fn calibrate_files(reference: &Path, model: &Path) -> AppResult<CalibrationReport> {
    let reference: JsonValue = load_json(reference).await?;
    let model: JsonValue = load_json(model).await?;
    let report = calibrate(&reference, &model);

    for (instance, accuracy) in &report.instances {
        info!("{} 准确率: {:.1}%", instance, accuracy * 100.0);
    }
    match report.overall {
        Some(overall) => info!("📊 总体准确率: {:.1}%", overall * 100.0),
        None => warn!("⚠️ 未找到任何可比较的实例"),
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reference() -> JsonValue {
        json!({"scoring_rules": {
            "correct": {"explanation": {"p1": {"该点得分": 2}}},
            "wrong_1": {"explanation": {
                "p1": {"该点得分": 2},
                "p2": {"该点得分": 0},
                "p3": {"该点得分": 1},
                "p4": {"该点得分": 0}
            }},
            "wrong_2": {"explanation": {"p1": {"该点得分": 1}}},
            "wrong_3": {"explanation": {}}
        }})
    }

    #[test]
    fn test_accuracy_per_instance_and_overall() {
        let model = json!({"scoring_rules": {
            "wrong_1": {"explanation": {
                "p1": {"该点得分": 2},
                "p2": {"该点得分": 1},
                "p3": {"该点得分": 1.0}
            }},
            "wrong_3": {"explanation": {"p1": {"该点得分": 1}}}
        }});

        let report = calibrate(&reference(), &model);
        assert_eq!(report.instances["wrong_1"], 0.5);
        assert_eq!(report.instances["wrong_3"], 0.0);
        assert!(!report.instances.contains_key("correct"));
        assert_eq!(report.skipped, vec!["wrong_2"]);
        assert_eq!(report.overall, Some(0.25));
    }

    #[test]
    fn test_nothing_comparable() {
        let report = calibrate(&reference(), &json!({"scoring_rules": {}}));
        assert!(report.instances.is_empty());
        assert_eq!(report.overall, None);
    }

    #[tokio::test]
    async fn test_calibrate_files() {
        let dir = tempfile::tempdir().unwrap();
        let ref_path = dir.path().join("human.json");
        let model_path = dir.path().join("model.json");
        std::fs::write(&ref_path, reference().to_string()).unwrap();
        std::fs::write(
            &model_path,
            json!({"scoring_rules": {"wrong_2": {"explanation": {"p1": {"该点得分": 1}}}}}).to_string(),
        )
        .unwrap();

        let report = calibrate_files(&ref_path, &model_path).await.unwrap();
        assert_eq!(report.overall, Some(1.0));
    }
}
