//! 学生数据仓库 - 基础设施层
//!
//! 每个学生一个目录，目录名即学号

use std::path::PathBuf;

use tokio::fs;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{
    list_subdirectories, load_json, load_json_or_default, save_json, AnswerRevise, HistoryLedger,
    StudentAnswerRecord, StudentInfo,
};

const ANSWERS_FILE: &str = "student_s_answers.json";
const REVISE_FILE: &str = "answer_revise.json";
const LEDGER_FILE: &str = "exam_record.json";
const INFO_FILE: &str = "student_info.json";
const REPORT_FILE: &str = "student_report.md";

/// 学生数据仓库
#[derive(Debug, Clone)]
pub struct StudentRepository {
    root: PathBuf,
}

impl StudentRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn student_dir(&self, student_id: &str) -> PathBuf {
        self.root.join(student_id)
    }

    /// 所有学生的学号（按目录名排序）
    pub async fn list_students(&self) -> AppResult<Vec<String>> {
        Ok(list_subdirectories(&self.root)
            .await?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// 读取答题记录
    pub async fn load_answers(&self, student_id: &str) -> AppResult<StudentAnswerRecord> {
        load_json(&self.student_dir(student_id).join(ANSWERS_FILE)).await
    }

    /// 读取本次批改结果
    pub async fn load_answer_revise(&self, student_id: &str) -> AppResult<AnswerRevise> {
        load_json(&self.student_dir(student_id).join(REVISE_FILE)).await
    }

    /// 整体覆盖写入批改结果
    pub async fn save_answer_revise(&self, student_id: &str, revise: &AnswerRevise) -> AppResult<()> {
        let path = self.student_dir(student_id).join(REVISE_FILE);
        debug!("写入批改结果: {}", path.display());
        save_json(&path, revise).await
    }

    /// 读取历史记录，不存在时为空
    pub async fn load_ledger(&self, student_id: &str) -> AppResult<HistoryLedger> {
        load_json_or_default(&self.student_dir(student_id).join(LEDGER_FILE)).await
    }

    pub async fn save_ledger(&self, student_id: &str, ledger: &HistoryLedger) -> AppResult<()> {
        save_json(&self.student_dir(student_id).join(LEDGER_FILE), ledger).await
    }

    /// 读取学生信息，缺失时使用学号占位
    pub async fn load_info(&self, student_id: &str) -> AppResult<StudentInfo> {
        match load_json(&self.student_dir(student_id).join(INFO_FILE)).await {
            Err(AppError::File(crate::error::FileError::NotFound { .. })) => {
                Ok(StudentInfo::placeholder(student_id))
            }
            other => other,
        }
    }

    /// 写入学生报告，返回报告路径
    pub async fn write_report(&self, student_id: &str, markdown: &str) -> AppResult<PathBuf> {
        let path = self.student_dir(student_id).join(REPORT_FILE);
        fs::write(&path, markdown)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        Ok(path)
    }
}
