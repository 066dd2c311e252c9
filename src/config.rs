use std::path::Path;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};
use crate::models::exam_number;

/// 默认配置文件路径（可由 GRADER_CONFIG 覆盖）
pub const DEFAULT_CONFIG_FILE: &str = "grader.toml";

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 数据目录 ---
    /// 学生目录根路径（每个学生一个子目录）
    pub students_root: String,
    /// 题目元数据根路径（每道题一个子目录）
    pub questions_root: String,
    /// 分区通用评分标准目录
    pub section_rules_root: String,
    /// 教师报告输出目录
    pub output_root: String,
    // --- 考试信息 ---
    /// 本次考试标识，写入历史记录的键
    pub exam_id: String,
    /// 本次考试序号；exam_id 末尾带数字时以 exam_id 为准
    pub exam_number: u32,
    /// 年级
    pub grade: String,
    /// 班级
    pub class_id: String,
    /// 试卷名称
    pub paper_id: String,
    // --- 运行参数 ---
    /// 同时批改的学生数量
    pub max_concurrent_students: usize,
    /// 是否生成报告
    pub generate_reports: bool,
    /// 报告中是否包含 AI 建议
    pub enable_ai_advice: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 需要人工复核的题目清单
    pub review_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    /// 单次调用超时（秒）
    pub oracle_timeout_secs: u64,
    /// 最大尝试次数
    pub oracle_max_retries: u32,
    /// 重试初始等待（毫秒），之后每次翻倍
    pub oracle_retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            students_root: "students".to_string(),
            questions_root: "questions".to_string(),
            section_rules_root: "scoring_rules_given_question_section".to_string(),
            output_root: ".".to_string(),
            exam_id: "exam_5".to_string(),
            exam_number: 5,
            grade: "高三".to_string(),
            class_id: "5班".to_string(),
            paper_id: "第二学期 第五次考试".to_string(),
            max_concurrent_students: 8,
            generate_reports: true,
            enable_ai_advice: true,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            review_file: "needs_review.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            llm_model_name: "qwen3-32b".to_string(),
            llm_temperature: 0.3,
            oracle_timeout_secs: 120,
            oracle_max_retries: 3,
            oracle_retry_backoff_ms: 1000,
        }
    }
}

impl Config {
    /// 加载配置：默认值 ← TOML 文件（若存在） ← 环境变量
    pub fn load() -> AppResult<Self> {
        let path = std::env::var("GRADER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = if Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        let config = base.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置，缺失的字段使用默认值
    pub fn from_toml_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileParseFailed {
            path: path.to_string(),
            source: Box::new(e),
        })?;
        parse_toml(&content, path)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        parse_toml(content, "<inline>")
    }

    /// 仅使用默认值和环境变量
    pub fn from_env() -> AppResult<Self> {
        Self::default().apply_env()
    }

    /// 用环境变量覆盖已有配置
    pub fn apply_env(self) -> AppResult<Self> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        if let Some(v) = var("STUDENTS_ROOT") {
            self.students_root = v;
        }
        if let Some(v) = var("QUESTIONS_ROOT") {
            self.questions_root = v;
        }
        if let Some(v) = var("SECTION_RULES_ROOT") {
            self.section_rules_root = v;
        }
        if let Some(v) = var("OUTPUT_ROOT") {
            self.output_root = v;
        }
        if let Some(v) = var("EXAM_ID") {
            self.exam_id = v;
        }
        if let Some(v) = var("EXAM_NUMBER") {
            self.exam_number = parse_var("EXAM_NUMBER", &v, "u32")?;
        }
        if let Some(v) = var("GRADE") {
            self.grade = v;
        }
        if let Some(v) = var("CLASS_ID") {
            self.class_id = v;
        }
        if let Some(v) = var("PAPER_ID") {
            self.paper_id = v;
        }
        if let Some(v) = var("MAX_CONCURRENT_STUDENTS") {
            self.max_concurrent_students = parse_var("MAX_CONCURRENT_STUDENTS", &v, "usize")?;
        }
        if let Some(v) = var("GENERATE_REPORTS") {
            self.generate_reports = parse_var("GENERATE_REPORTS", &v, "bool")?;
        }
        if let Some(v) = var("ENABLE_AI_ADVICE") {
            self.enable_ai_advice = parse_var("ENABLE_AI_ADVICE", &v, "bool")?;
        }
        if let Some(v) = var("VERBOSE_LOGGING") {
            self.verbose_logging = parse_var("VERBOSE_LOGGING", &v, "bool")?;
        }
        if let Some(v) = var("OUTPUT_LOG_FILE") {
            self.output_log_file = v;
        }
        if let Some(v) = var("REVIEW_FILE") {
            self.review_file = v;
        }
        if let Some(v) = var("LLM_API_KEY").or_else(|| var("DASHSCOPE_API_KEY")) {
            self.llm_api_key = v;
        }
        if let Some(v) = var("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Some(v) = var("LLM_MODEL_NAME") {
            self.llm_model_name = v;
        }
        if let Some(v) = var("LLM_TEMPERATURE") {
            self.llm_temperature = parse_var("LLM_TEMPERATURE", &v, "f32")?;
        }
        if let Some(v) = var("ORACLE_TIMEOUT_SECS") {
            self.oracle_timeout_secs = parse_var("ORACLE_TIMEOUT_SECS", &v, "u64")?;
        }
        if let Some(v) = var("ORACLE_MAX_RETRIES") {
            self.oracle_max_retries = parse_var("ORACLE_MAX_RETRIES", &v, "u32")?;
        }
        if let Some(v) = var("ORACLE_RETRY_BACKOFF_MS") {
            self.oracle_retry_backoff_ms = parse_var("ORACLE_RETRY_BACKOFF_MS", &v, "u64")?;
        }
        Ok(self.with_exam_number_from_id())
    }

    /// 历史记录按 exam_id 中的序号排序，报告按 exam_number 截取，两者必须一致
    fn with_exam_number_from_id(mut self) -> Self {
        if let Some(number) = exam_number(&self.exam_id) {
            self.exam_number = number;
        }
        self
    }

    /// 检查配置值
    pub fn validate(&self) -> AppResult<()> {
        if self.max_concurrent_students == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_students".to_string(),
                reason: "必须大于 0".to_string(),
            }
            .into());
        }
        if self.oracle_max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "oracle_max_retries".to_string(),
                reason: "至少需要尝试 1 次".to_string(),
            }
            .into());
        }
        if self.exam_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "exam_id".to_string(),
                reason: "不能为空".to_string(),
            }
            .into());
        }
        if let Some(number) = exam_number(&self.exam_id) {
            if number != self.exam_number {
                return Err(ConfigError::InvalidValue {
                    field: "exam_number".to_string(),
                    reason: format!(
                        "与 exam_id {} 中的序号 {} 不一致: {}",
                        self.exam_id, number, self.exam_number
                    ),
                }
                .into());
            }
        }
        Ok(())
    }
}

fn parse_toml(content: &str, path: &str) -> AppResult<Config> {
    toml::from_str(content).map(Config::with_exam_number_from_id).map_err(|e| {
        ConfigError::FileParseFailed {
            path: path.to_string(),
            source: Box::new(e),
        }
        .into()
    })
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str, expected_type: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::EnvVarParseFailed {
            var_name: name.to_string(),
            value: value.to_string(),
            expected_type: expected_type.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_toml_fills_missing_fields_with_defaults() {
        let config = Config::from_toml_str(
            r#"
            exam_id = "exam_6"
            exam_number = 6
            max_concurrent_students = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.exam_id, "exam_6");
        assert_eq!(config.exam_number, 6);
        assert_eq!(config.max_concurrent_students, 2);
        assert_eq!(config.questions_root, "questions");
        assert_eq!(config.oracle_max_retries, 3);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("EXAM_ID", "exam_7"),
            ("ORACLE_TIMEOUT_SECS", "30"),
            ("DASHSCOPE_API_KEY", "sk-test"),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .apply_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.exam_id, "exam_7");
        assert_eq!(config.exam_number, 7);
        assert!(config.validate().is_ok());
        assert_eq!(config.oracle_timeout_secs, 30);
        assert_eq!(config.llm_api_key, "sk-test");
    }

    #[test]
    fn test_bad_env_value_is_reported() {
        let err = Config::default()
            .apply_vars(|name| (name == "MAX_CONCURRENT_STUDENTS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_CONCURRENT_STUDENTS"));
    }

    #[test]
    fn test_exam_number_follows_exam_id() {
        let config = Config::from_toml_str(r#"exam_id = "exam_7""#).unwrap();
        assert_eq!(config.exam_number, 7);

        let config = Config::from_toml_str(
            r#"
            exam_id = "期中考试"
            exam_number = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.exam_number, 3);
    }

    #[test]
    fn test_validate_rejects_exam_number_mismatch() {
        let config = Config {
            exam_id: "exam_7".to_string(),
            exam_number: 5,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exam_number"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = Config {
            max_concurrent_students: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
