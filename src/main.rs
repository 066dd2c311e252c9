use std::path::{Path, PathBuf};

use anyhow::Result;
use exam_scoring::services::calibration::calibrate_files;
use exam_scoring::utils::logging::init_logging;
use exam_scoring::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    let log_file = Path::new(&config.output_root).join(&config.output_log_file);
    init_logging(&config, &log_file)?;

    // 校准模式：exam_scoring calibrate <人工批改.json> <模型批改.json>
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [command, reference, model] = args.as_slice() {
        if command == "calibrate" {
            calibrate_files(&PathBuf::from(reference), &PathBuf::from(model)).await?;
            return Ok(());
        }
    }

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
