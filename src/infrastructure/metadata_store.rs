//! 题目元数据仓库 - 基础设施层
//!
//! 启动时一次性读取全部题目元数据并确定评分方案，之后只读共享

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, FileError, MetadataError};
use crate::models::{list_subdirectories, load_json, QuestionMetadata, RawQuestionMetadata};

const METADATA_FILE: &str = "question_metadata.json";

/// 分区通用评分标准文件
#[derive(Debug, Deserialize)]
struct SectionRules {
    scoring_description: serde_json::Value,
}

/// 题目元数据仓库
///
/// 加载失败的题目会保留错误原因，批改时按题报告，不影响其它题目
#[derive(Debug, Default)]
pub struct QuestionMetadataStore {
    questions: HashMap<String, QuestionMetadata>,
    broken: HashMap<String, String>,
}

impl QuestionMetadataStore {
    /// 从题目目录和分区评分标准目录加载
    pub async fn load(questions_root: &Path, section_rules_root: &Path) -> AppResult<Self> {
        info!("📁 正在加载题目元数据: {}", questions_root.display());

        let mut store = Self::default();
        for (question_id, dir) in list_subdirectories(questions_root).await? {
            match load_question(&question_id, &dir, section_rules_root).await {
                Ok(meta) => {
                    debug!(
                        "题目 {} 加载完成: {} / {}",
                        question_id,
                        meta.question_type,
                        meta.scheme.label()
                    );
                    store.questions.insert(question_id, meta);
                }
                Err(e) => {
                    warn!("⚠️ 题目 {} 元数据不可用: {}", question_id, e);
                    store.broken.insert(question_id, e.to_string());
                }
            }
        }

        info!(
            "✓ 成功加载 {} 道题目，{} 道题目元数据有误",
            store.questions.len(),
            store.broken.len()
        );
        Ok(store)
    }

    /// 直接由已解析的元数据构造
    pub fn from_questions(questions: impl IntoIterator<Item = QuestionMetadata>) -> Self {
        Self {
            questions: questions
                .into_iter()
                .map(|q| (q.question_id.clone(), q))
                .collect(),
            broken: HashMap::new(),
        }
    }

    /// 查询题目元数据
    pub fn get(&self, question_id: &str) -> AppResult<&QuestionMetadata> {
        if let Some(meta) = self.questions.get(question_id) {
            return Ok(meta);
        }
        match self.broken.get(question_id) {
            Some(reason) => Err(MetadataError::Malformed {
                question_id: question_id.to_string(),
                reason: reason.clone(),
            }
            .into()),
            None => Err(MetadataError::NotFound {
                question_id: question_id.to_string(),
            }
            .into()),
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

async fn load_question(
    question_id: &str,
    dir: &Path,
    section_rules_root: &Path,
) -> AppResult<QuestionMetadata> {
    let path = dir.join(METADATA_FILE);
    let raw: RawQuestionMetadata = load_json(&path).await.map_err(|e| -> AppError {
        match e {
            AppError::File(FileError::NotFound { .. }) => MetadataError::NotFound {
                question_id: question_id.to_string(),
            }
            .into(),
            other => MetadataError::Malformed {
                question_id: question_id.to_string(),
                reason: other.to_string(),
            }
            .into(),
        }
    })?;

    let section_rubric = match (&raw.section, raw.needs_section_rubric()) {
        (Some(section), true) => load_section_rubric(section_rules_root, section).await,
        _ => None,
    };

    QuestionMetadata::resolve(question_id, raw, section_rubric)
}

/// 读取分区通用评分标准；缺失时兜底批改照常进行
async fn load_section_rubric(root: &Path, section: &str) -> Option<String> {
    let path: PathBuf = root.join(format!("{}.json", section));
    match load_json::<SectionRules>(&path).await {
        Ok(rules) => Some(match rules.scoring_description {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        }),
        Err(e) => {
            warn!("⚠️ 分区 {} 的通用评分标准不可用: {}", section, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GradingScheme;
    use std::fs;

    fn write_question(root: &Path, id: &str, json: &str) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(METADATA_FILE), json).unwrap();
    }

    #[tokio::test]
    async fn test_load_store_with_broken_and_section_rules() {
        let questions = tempfile::tempdir().unwrap();
        let sections = tempfile::tempdir().unwrap();

        write_question(
            questions.path(),
            "1",
            r#"{"question_type": "single_choice", "correct_answer": "A", "full_point": 5, "question_focus": "集合"}"#,
        );
        write_question(
            questions.path(),
            "3",
            r#"{"question_type": "single_choice", "full_point": 5, "question": "下列说法正确的是", "section_it_belongs_to": "选择题"}"#,
        );
        write_question(questions.path(), "4", "{broken");
        fs::create_dir_all(questions.path().join("5")).unwrap();
        fs::write(
            sections.path().join("选择题.json"),
            r#"{"scoring_description": "选对得满分，选错不得分"}"#,
        )
        .unwrap();

        let store = QuestionMetadataStore::load(questions.path(), sections.path())
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("1").unwrap().question_focus, "集合");
        assert_eq!(
            store.get("3").unwrap().scheme,
            GradingScheme::OracleOnly {
                section_rubric: Some("选对得满分，选错不得分".to_string())
            }
        );
        assert!(matches!(
            store.get("4"),
            Err(AppError::Metadata(MetadataError::Malformed { .. }))
        ));
        assert!(matches!(
            store.get("5"),
            Err(AppError::Metadata(MetadataError::Malformed { .. }))
        ));
        assert!(matches!(
            store.get("99"),
            Err(AppError::Metadata(MetadataError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_missing_questions_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = QuestionMetadataStore::load(&dir.path().join("none"), dir.path()).await;
        assert!(result.is_err());
    }
}
