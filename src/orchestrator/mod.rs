//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量学生处理器
//! - 管理应用生命周期（初始化、运行）
//! - 控制并发数量（Semaphore）
//! - 全部批改完成后统一排名
//! - 写入历史记录、生成报告
//! - 输出全局统计信息
//!
//! ### `exam_processor` - 单个学生处理器
//! - 遍历单个学生的所有题目
//! - 复用 QuestionFlow
//! - 汇总总分并写回 answer_revise.json
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理全班学生)
//!     ↓
//! exam_processor (处理一个学生的所有题目)
//!     ↓
//! workflow::QuestionFlow (处理单道题)
//!     ↓
//! services (能力层：scoring / oracle / ranking / history / report)
//!     ↓
//! infrastructure (基础设施：元数据、学生目录)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管全班，exam_processor 管单个学生
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和统计，不做具体判分

pub mod batch_processor;
pub mod exam_processor;

pub use batch_processor::{App, RunSummary};
pub use exam_processor::{ExamProcessor, StudentResult};
