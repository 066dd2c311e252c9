//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

/// 初始化日志：控制台 + 运行日志文件
///
/// `RUST_LOG` 优先；否则 `verbose_logging` 决定 debug / info
pub fn init_logging(config: &Config, log_file_path: &Path) -> Result<()> {
    init_log_file(log_file_path)?;
    let file = OpenOptions::new()
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件 {}", log_file_path.display()))?;

    let default_level = if config.verbose_logging { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("日志系统初始化失败")?;
    Ok(())
}

/// 初始化日志文件（写入带时间的表头，覆盖旧内容）
pub fn init_log_file(log_file_path: &Path) -> Result<()> {
    if let Some(parent) = log_file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let log_header = format!(
        "{}\n批改日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 并发批改模式");
    info!("📝 考试: {} ({})", config.exam_id, config.paper_id);
    info!("📊 最大并发学生数: {}", config.max_concurrent_students);
    info!("🤖 模型: {}", config.llm_model_name);
    info!("{}", "=".repeat(60));
}

/// 记录学生加载信息
pub fn log_students_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 名待批改的学生", total);
    info!("📋 最多同时批改 {} 名学生", max_concurrent);
    info!("💡 全部批改完成后统一排名\n");
}

/// 记录阶段开始
pub fn log_stage(title: &str) {
    info!("\n{}", "─".repeat(60));
    info!("{}", title);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(
    graded: usize,
    failed: usize,
    total: usize,
    flagged_questions: usize,
    log_file_path: &Path,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部批改完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", graded, total);
    info!("❌ 失败: {}", failed);
    info!("🔍 待人工复核题目: {}", flagged_questions);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path.display());
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
