//! 人工复核清单 - 业务能力层
//!
//! 只负责"写 needs_review.txt"能力，不关心流程

use std::path::PathBuf;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// 复核清单写入服务
///
/// 职责：
/// - 将批改失败的题目追加写入复核清单
/// - 一次只写一道题
/// - 多个学生任务共享同一个实例
pub struct ReviewWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ReviewWriter {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// 清空复核清单，每次批改开始时调用，重复运行不会累积旧记录
    pub async fn reset(&self) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        let write_failed = |e| AppError::file_write_failed(self.path.display().to_string(), e);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(write_failed)?;
        }
        fs::write(&self.path, "").await.map_err(write_failed)
    }

    /// 追加一道待复核的题目
    pub async fn write(
        &self,
        student_id: &str,
        exam_id: &str,
        question_id: &str,
        reason: &str,
    ) -> AppResult<()> {
        debug!(
            "写入复核清单: 学生 {} | 考试 {} | 题目 {}",
            student_id, exam_id, question_id
        );

        let line = format!(
            "学生 {} | 考试 {} | 题目 {} | 原因: {}\n",
            student_id,
            exam_id,
            question_id,
            reason.replace('\n', " ")
        );

        let _guard = self.lock.lock().await;
        let write_failed = |e| AppError::file_write_failed(self.path.display().to_string(), e);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(write_failed)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_failed)?;
        file.write_all(line.as_bytes()).await.map_err(write_failed)?;
        file.flush().await.map_err(write_failed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_appends_keep_whole_lines() {
        let dir = tempfile::tempdir().unwrap();
        let writer = Arc::new(ReviewWriter::with_path(dir.path().join("needs_review.txt")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let writer = Arc::clone(&writer);
                tokio::spawn(async move {
                    writer
                        .write(&format!("s{}", i), "exam_5", "17", "调用超时\n重试耗尽")
                        .await
                })
            })
            .collect();
        for handle in futures::future::join_all(handles).await {
            handle.unwrap().unwrap();
        }

        let content = std::fs::read_to_string(dir.path().join("needs_review.txt")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 8);
        assert!(lines.iter().all(|l| l.ends_with("原因: 调用超时 重试耗尽")));
    }

    #[tokio::test]
    async fn test_reset_clears_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("needs_review.txt");
        let writer = ReviewWriter::with_path(&path);

        writer.reset().await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        writer.write("s1", "exam_5", "17", "超时").await.unwrap();
        writer.reset().await.unwrap();
        writer.write("s1", "exam_5", "17", "超时").await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
