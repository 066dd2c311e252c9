//! 批改大模型接口 - 业务能力层
//!
//! [`GradingOracle`] 是评分引擎与外部大模型之间唯一的边界。
//! 生产环境使用 [`LlmOracle`]，测试中可以换成脚本化的实现。

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::AppResult;
use crate::services::llm_service::LlmService;

/// 发给大模型的一道题
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub question_id: String,
    pub question: String,
    /// 评分细则；兜底批改时为分区通用评分标准
    pub rubric: Option<String>,
    pub few_shot: Option<String>,
    pub full_point: f64,
    pub student_answer: String,
}

/// 一个踩分点的批改结果
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RubricPoint {
    #[serde(
        default,
        alias = "该点得分",
        alias = "points_earned_of_this_point",
        alias = "point_earned"
    )]
    pub points_earned: Option<f64>,
    #[serde(default, alias = "explanation", alias = "理由")]
    pub why: String,
}

/// 按细则批改的结果：逐点说明与本题总分
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "JsonValue")]
pub struct RubricVerdict {
    pub breakdown: BTreeMap<String, RubricPoint>,
    pub point_earned: f64,
}

impl RubricVerdict {
    /// 渲染为写入批改结果的反馈文本
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (point, detail) in &self.breakdown {
            match detail.points_earned {
                Some(p) => {
                    let _ = writeln!(out, "{}（{}分）：{}", point, p, detail.why);
                }
                None => {
                    let _ = writeln!(out, "{}：{}", point, detail.why);
                }
            }
        }
        let _ = write!(out, "本题得分：{}", self.point_earned);
        out
    }
}

impl TryFrom<JsonValue> for RubricVerdict {
    type Error = String;

    /// 兼容两种写法：顶层字段，或包在 `LLM_feedback` 里
    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        let body = value
            .get("LLM_feedback")
            .filter(|inner| inner.is_object())
            .unwrap_or(&value);

        let point_earned = ["point_earned_of_this_question", "points_earned_of_this_question"]
            .iter()
            .find_map(|key| body.get(key).or_else(|| value.get(key)))
            .and_then(JsonValue::as_f64)
            .ok_or_else(|| "缺少数值字段 point_earned_of_this_question".to_string())?;

        let mut breakdown = BTreeMap::new();
        if let Some(points) = body
            .get("correction_and_explanation")
            .and_then(JsonValue::as_object)
        {
            for (name, detail) in points {
                let point = match detail {
                    JsonValue::String(why) => RubricPoint {
                        points_earned: None,
                        why: why.clone(),
                    },
                    other => serde_json::from_value(other.clone()).unwrap_or(RubricPoint {
                        points_earned: None,
                        why: other.to_string(),
                    }),
                };
                breakdown.insert(name.clone(), point);
            }
        }

        Ok(Self {
            breakdown,
            point_earned,
        })
    }
}

/// 兜底批改第二步的结构化结论
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoreDecision {
    #[serde(alias = "score")]
    pub point_earned: f64,
    #[serde(default)]
    pub get_full_point: Option<bool>,
}

/// 批改大模型
#[async_trait]
pub trait GradingOracle: Send + Sync {
    /// 按评分细则逐点批改
    async fn grade_with_rubric(&self, request: &OracleRequest) -> AppResult<RubricVerdict>;

    /// 兜底第一步：自由分析学生答案
    async fn assess(&self, request: &OracleRequest) -> AppResult<String>;

    /// 兜底第二步：根据分析给出得分
    async fn decide(&self, request: &OracleRequest, narrative: &str) -> AppResult<ScoreDecision>;
}

/// 基于 OpenAI 兼容接口的批改实现
pub struct LlmOracle {
    llm: Arc<LlmService>,
}

impl LlmOracle {
    pub fn new(llm: Arc<LlmService>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl GradingOracle for LlmOracle {
    async fn grade_with_rubric(&self, request: &OracleRequest) -> AppResult<RubricVerdict> {
        debug!("题目 {} 按细则批改", request.question_id);
        let system = rubric_prompt(request);
        let user = format!("学生答案：{}", request.student_answer);
        self.llm
            .ask_json(&format!("题目 {} 细则批改", request.question_id), &user, &system)
            .await
    }

    async fn assess(&self, request: &OracleRequest) -> AppResult<String> {
        debug!("题目 {} 兜底批改：分析", request.question_id);
        let system = assessment_prompt(request);
        let user = format!("学生答案：{}", request.student_answer);
        self.llm
            .ask_text(&format!("题目 {} 兜底分析", request.question_id), &user, &system)
            .await
    }

    async fn decide(&self, request: &OracleRequest, narrative: &str) -> AppResult<ScoreDecision> {
        debug!("题目 {} 兜底批改：定分", request.question_id);
        let system = decision_prompt(request, narrative);
        let user = format!("学生答案：{}", request.student_answer);
        self.llm
            .ask_json(&format!("题目 {} 兜底定分", request.question_id), &user, &system)
            .await
    }
}

fn rubric_prompt(request: &OracleRequest) -> String {
    format!(
        r#"现在你是一个中学老师，你要负责批改学生数学试卷的题目。
请严格按照评分细则里的踩分点进行批改，并对每一个踩分点给出解释：
该踩分点有对应的公式或步骤，得到相应的分数（不是累计得分）；没有或者错误，该点不得分。
本题满分 {full} 分，总分不得超过满分。
只返回一个 JSON 对象，格式如下：
{{"correction_and_explanation": {{"<踩分点>": {{"该点得分": <数字>, "why": "<理由>"}}}}, "point_earned_of_this_question": <数字>}}

题目：{question}
评分细则：{rubric}
批改示例：{few_shot}"#,
        full = request.full_point,
        question = request.question,
        rubric = request.rubric.as_deref().unwrap_or("无"),
        few_shot = request.few_shot.as_deref().unwrap_or("无"),
    )
}

fn assessment_prompt(request: &OracleRequest) -> String {
    let mut prompt = format!(
        "现在你是一个高中老师，你要负责批改学生数学试卷的题目。\n\
         请判断学生的答案是否正确，分析理由，并说明应该给几分。\n\
         本题满分 {} 分。\n\
         题目：{}",
        request.full_point, request.question
    );
    if let Some(rubric) = &request.rubric {
        let _ = write!(prompt, "\n评分标准：{}", rubric);
    }
    prompt
}

fn decision_prompt(request: &OracleRequest, narrative: &str) -> String {
    format!(
        r#"现在你是一个高中老师，你要负责批改学生数学试卷的题目。
这是对学生这道题答题情况的分析：{narrative}
这道题满分 {full} 分，请判断学生应该得几分（0 到 {full} 之间），只返回如下 JSON：
{{"point_earned": <学生获得的分数>, "get_full_point": <是否获得满分, true/false>}}"#,
        narrative = narrative,
        full = request.full_point,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm_service::parse_json_reply;

    fn request() -> OracleRequest {
        OracleRequest {
            question_id: "17".to_string(),
            question: "求函数 f(x) = x^2 - 2x 的最小值".to_string(),
            rubric: Some("配方 2 分，结论 2 分".to_string()),
            few_shot: None,
            full_point: 4.0,
            student_answer: "f(x) = (x-1)^2 - 1，最小值 -1".to_string(),
        }
    }

    #[test]
    fn test_verdict_from_top_level_reply() {
        let reply = r#"```json
{"correction_and_explanation": {"配方": {"该点得分": 2, "why": "配方正确"}, "结论": {"该点得分": 2, "why": "结论正确"}},
 "point_earned_of_this_question": 4}
```"#;
        let verdict: RubricVerdict = parse_json_reply(reply).unwrap();
        assert_eq!(verdict.point_earned, 4.0);
        assert_eq!(verdict.breakdown["配方"].points_earned, Some(2.0));
        assert!(verdict.render().contains("配方（2分）：配方正确"));
    }

    #[test]
    fn test_verdict_from_wrapped_reply() {
        let reply = r#"{"LLM_feedback": {"correction_and_explanation": {"结论": "没有写出最小值"}, "point_earned_of_this_question": 2}}"#;
        let verdict: RubricVerdict = parse_json_reply(reply).unwrap();
        assert_eq!(verdict.point_earned, 2.0);
        assert_eq!(verdict.breakdown["结论"].points_earned, None);
        assert_eq!(verdict.breakdown["结论"].why, "没有写出最小值");
    }

    #[test]
    fn test_verdict_without_total_is_malformed() {
        let result: AppResult<RubricVerdict> =
            parse_json_reply(r#"{"correction_and_explanation": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decision_reply() {
        let decision: ScoreDecision =
            parse_json_reply(r#"{"point_earned": 3, "get_full_point": false}"#).unwrap();
        assert_eq!(decision.point_earned, 3.0);
        assert_eq!(decision.get_full_point, Some(false));
    }

    #[test]
    fn test_prompts_carry_question_context() {
        let req = request();
        assert!(rubric_prompt(&req).contains("配方 2 分"));
        assert!(assessment_prompt(&req).contains("评分标准"));
        let no_rubric = OracleRequest {
            rubric: None,
            ..request()
        };
        assert!(!assessment_prompt(&no_rubric).contains("评分标准"));
        assert!(decision_prompt(&req, "基本正确").contains("基本正确"));
    }
}
