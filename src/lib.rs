//! # Exam Scoring
//!
//! 数学考试自动批改：逐题判分、全班排名、历史记录与学情报告
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 只读的题目元数据与学生目录读写
//! - `QuestionMetadataStore` - 启动时一次性确定每道题的评分方案
//! - `StudentRepository` - 答题卡、批改结果、历史记录、报告
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `scoring` - 选择题 / 填空题的确定性判分
//! - `GradingOracle` - 大模型批改（细则批改、两阶段兜底）
//! - `ranking` / `HistoryRecorder` / `ReportGenerator` - 排名、历史、报告
//! - `ReviewWriter` - 写待复核清单
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的完整批改流程
//! - `QuestionCtx` - 上下文封装（学生 + 考试 + 题号）
//! - `QuestionFlow` - 元数据 → 判分 / 大模型 → 失败记录
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 全班并发批改、排名、历史、报告
//! - `orchestrator/exam_processor` - 单个学生处理器，遍历题目
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::{App, RunSummary};
pub use services::GradingOracle;
pub use workflow::{QuestionCtx, QuestionFlow};
