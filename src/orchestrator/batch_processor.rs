//! 批量学生处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次考试的全班批改和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：加载题目元数据、创建大模型客户端
//! 2. **并发批改**：使用 Semaphore 限制同时批改的学生数
//! 3. **统一排名**：全部学生批改完成后才计算排名
//! 4. **历史记录**：按考试写入每个学生的 exam_record.json
//! 5. **报告生成**：学生报告与教师报告
//! 6. **全局统计**：汇总成功 / 失败 / 待复核数量
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单道题的细节
//! - **批改屏障**：排名依赖全班总分，必须等所有批改任务结束
//! - **向下委托**：委托 exam_processor 批改单个学生

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::{QuestionMetadataStore, StudentRepository};
use crate::orchestrator::exam_processor::{ExamProcessor, StudentResult};
use crate::services::{
    rank_students, Advisor, GradingOracle, HistoryRecorder, LlmOracle, LlmService, RankEntry,
    ReportContext, ReportGenerator, ReviewWriter,
};
use crate::utils::logging::{log_stage, log_startup, log_students_loaded, print_final_stats};
use crate::workflow::QuestionFlow;

/// 一次运行的汇总结果
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// 批改完成的学生数
    pub graded: usize,
    /// 无法批改的学生数（答题卡缺失、写入失败等）
    pub failed: usize,
    /// 需要人工复核的题目总数
    pub flagged_questions: usize,
    pub ranks: Vec<RankEntry>,
}

/// 应用主结构
pub struct App {
    config: Config,
    processor: Arc<ExamProcessor>,
    review_writer: Arc<ReviewWriter>,
    repo: StudentRepository,
    history: HistoryRecorder,
    reports: ReportGenerator,
}

impl App {
    /// 初始化应用：使用配置中的大模型
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let llm = Arc::new(LlmService::new(&config));
        let oracle: Arc<dyn GradingOracle> = Arc::new(LlmOracle::new(llm.clone()));
        let advisor: Option<Arc<dyn Advisor>> = if config.enable_ai_advice {
            Some(llm as Arc<dyn Advisor>)
        } else {
            None
        };

        Self::with_oracle(config, oracle, advisor).await
    }

    /// 使用给定的批改实现初始化（测试中注入脚本化实现）
    pub async fn with_oracle(
        config: Config,
        oracle: Arc<dyn GradingOracle>,
        advisor: Option<Arc<dyn Advisor>>,
    ) -> Result<Self> {
        config.validate().context("配置无效")?;

        let store = QuestionMetadataStore::load(
            Path::new(&config.questions_root),
            Path::new(&config.section_rules_root),
        )
        .await
        .with_context(|| format!("加载题目元数据失败: {}", config.questions_root))?;
        if store.is_empty() {
            warn!("⚠️ 没有可用的题目元数据，所有题目都将进入人工复核");
        }

        let output_root = PathBuf::from(&config.output_root);
        let review_writer = Arc::new(ReviewWriter::with_path(output_root.join(&config.review_file)));
        let flow = QuestionFlow::new(
            Arc::new(store),
            oracle,
            review_writer.clone(),
            config.verbose_logging,
        );

        let repo = StudentRepository::new(&config.students_root);
        let processor = Arc::new(ExamProcessor::new(flow, repo.clone(), &config.exam_id));
        let history = HistoryRecorder::new(repo.clone());
        let reports = ReportGenerator::new(
            ReportContext::from_config(&config),
            repo.clone(),
            output_root,
            advisor,
        );

        Ok(Self {
            config,
            processor,
            review_writer,
            repo,
            history,
            reports,
        })
    }

    /// 运行一次完整的批改流程
    pub async fn run(&self) -> Result<RunSummary> {
        info!("\n📁 正在扫描学生目录...");
        let students = self
            .repo
            .list_students()
            .await
            .with_context(|| format!("无法读取学生目录: {}", self.config.students_root))?;

        if students.is_empty() {
            warn!("⚠️ 没有找到待批改的学生，程序结束");
            return Ok(RunSummary::default());
        }
        log_students_loaded(students.len(), self.config.max_concurrent_students);

        self.review_writer
            .reset()
            .await
            .context("无法清空人工复核清单")?;

        log_stage("📝 第一阶段：批改");
        let results = self.grade_all(&students).await?;

        let mut summary = RunSummary {
            graded: results.len(),
            failed: students.len() - results.len(),
            flagged_questions: results.iter().map(|r| r.failed).sum(),
            ranks: Vec::new(),
        };

        log_stage("🏆 第二阶段：排名与历史记录");
        let totals: BTreeMap<String, f64> = results
            .iter()
            .map(|r| (r.student_id.clone(), r.revise.total))
            .collect();
        summary.ranks = rank_students(&totals);
        self.record_history(&results, &summary.ranks).await;

        if self.config.generate_reports {
            log_stage("📊 第三阶段：生成报告");
            self.generate_reports(&summary.ranks).await;
        }

        print_final_stats(
            summary.graded,
            summary.failed,
            students.len(),
            summary.flagged_questions,
            &Path::new(&self.config.output_root).join(&self.config.output_log_file),
        );

        Ok(summary)
    }

    /// 并发批改所有学生，全部完成后返回（排名前的屏障）
    async fn grade_all(&self, students: &[String]) -> Result<Vec<StudentResult>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_students.max(1)));
        let mut handles = Vec::with_capacity(students.len());

        for student_id in students {
            let permit = semaphore.clone().acquire_owned().await?;
            let processor = self.processor.clone();
            let id = student_id.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                processor.grade_student(&id).await
            });
            handles.push((student_id.clone(), handle));
        }

        let mut results = Vec::new();
        for (student_id, handle) in handles {
            match handle.await {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => {
                    error!("[学生 {}] ❌ 批改过程中发生错误: {}", student_id, e);
                }
                Err(e) => {
                    error!("[学生 {}] 任务执行失败: {}", student_id, e);
                }
            }
        }

        info!("✓ 批改完成: {}/{} 名学生", results.len(), students.len());
        Ok(results)
    }

    async fn record_history(&self, results: &[StudentResult], ranks: &[RankEntry]) {
        let rank_of: BTreeMap<&str, u32> = ranks
            .iter()
            .map(|entry| (entry.student_id.as_str(), entry.rank))
            .collect();

        for result in results {
            let Some(&rank) = rank_of.get(result.student_id.as_str()) else {
                continue;
            };
            if let Err(e) = self
                .history
                .record(&result.student_id, &self.config.exam_id, &result.revise, rank)
                .await
            {
                error!("[学生 {}] ❌ 写入历史记录失败: {}", result.student_id, e);
            }
        }
        info!("✓ 历史记录已更新: {} 名学生", results.len());
    }

    /// 并发读取学生数据并生成学生报告，最后汇总生成教师报告
    async fn generate_reports(&self, ranks: &[RankEntry]) {
        let tasks = ranks.iter().map(|entry| async move {
            let snapshot = self
                .reports
                .load_snapshot(&entry.student_id, &self.config.exam_id)
                .await;
            match snapshot {
                Ok(snapshot) => {
                    if let Err(e) = self.reports.student_report(&snapshot).await {
                        error!("[学生 {}] ❌ 学生报告生成失败: {}", entry.student_id, e);
                    }
                    Some(snapshot)
                }
                Err(e) => {
                    error!("[学生 {}] ❌ 读取报告数据失败: {}", entry.student_id, e);
                    None
                }
            }
        });
        let snapshots: Vec<_> = join_all(tasks).await.into_iter().flatten().collect();

        if snapshots.is_empty() {
            warn!("⚠️ 没有可用的学生数据，跳过教师报告");
            return;
        }
        if let Err(e) = self.reports.teacher_report(&snapshots).await {
            error!("❌ 教师报告生成失败: {}", e);
        }
    }
}
