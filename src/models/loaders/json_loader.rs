use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use crate::error::{AppError, AppResult, FileError};

/// 读取 JSON 文件并反序列化
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let display = path.display().to_string();
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FileError::NotFound { path: display }.into())
        }
        Err(e) => return Err(AppError::file_read_failed(display, e)),
    };

    serde_json::from_str(&content).map_err(|e| AppError::json_parse_failed(display, e))
}

/// 读取 JSON 文件，文件不存在时返回默认值
pub async fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> AppResult<T> {
    match load_json(path).await {
        Err(AppError::File(FileError::NotFound { .. })) => Ok(T::default()),
        other => other,
    }
}

/// 以缩进格式写入 JSON（整体覆盖）
pub async fn save_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let display = path.display().to_string();
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::json_parse_failed(display.clone(), e))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::file_write_failed(display.clone(), e))?;
        }
    }

    fs::write(path, content)
        .await
        .map_err(|e| AppError::file_write_failed(display, e))
}

/// 列出目录下的直接子目录（按名称排序）
pub async fn list_subdirectories(folder: &Path) -> AppResult<Vec<(String, PathBuf)>> {
    if !folder.exists() {
        return Err(FileError::DirectoryNotFound {
            path: folder.display().to_string(),
        }
        .into());
    }

    let mut entries = fs::read_dir(folder)
        .await
        .map_err(|e| AppError::file_read_failed(folder.display().to_string(), e))?;

    let mut dirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(folder.display().to_string(), e))?
    {
        let path = entry.path();
        if path.is_dir() {
            let name = entry.file_name().to_string_lossy().to_string();
            dirs.push((name, path));
        }
    }

    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(dirs)
}
