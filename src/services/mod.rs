pub mod advisor;
pub mod calibration;
pub mod class_stats;
pub mod history;
pub mod llm_service;
pub mod oracle;
pub mod ranking;
pub mod report;
pub mod review_writer;
pub mod scoring;

pub use advisor::Advisor;
pub use history::HistoryRecorder;
pub use llm_service::LlmService;
pub use oracle::{GradingOracle, LlmOracle, OracleRequest, RubricVerdict, ScoreDecision};
pub use ranking::{rank_students, RankEntry};
pub use report::{ReportContext, ReportGenerator};
pub use review_writer::ReviewWriter;
