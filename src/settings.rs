//! 应用设置模块
//!
//! 设置以 JSON 文件保存（键名为 camelCase），所有字段都有默认值。
//! 文件缺失或无法解析时回退到默认设置，不会阻止启动。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clipboard::watcher::{normalize_poll_interval_ms, POLL_INTERVAL_DEFAULT_MS};
use crate::db::{RetentionPolicy, DEFAULT_MAX_UNPINNED};
use crate::error::AppError;

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_DB_FILE: &str = "clipboard_history.db";
pub const DEFAULT_MAX_BACKUP_FILES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub poll_interval_ms: u64,
    pub max_unpinned: usize,
    pub backup_enabled: bool,
    pub backup_path: String,
    pub max_backup_files: usize,
    pub db_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: POLL_INTERVAL_DEFAULT_MS,
            max_unpinned: DEFAULT_MAX_UNPINNED,
            backup_enabled: false,
            backup_path: String::new(),
            max_backup_files: DEFAULT_MAX_BACKUP_FILES,
            db_path: DEFAULT_DB_FILE.to_string(),
        }
    }
}

impl Settings {
    /// 从文件加载并归一化；任何失败都回退到默认值
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            log::info!("设置文件不存在，使用默认设置: {}", path.display());
            return Self::default();
        }

        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str::<Settings>(&content).map_err(|e| e.to_string()));

        match parsed {
            Ok(settings) => settings.normalized(),
            Err(err) => {
                log::warn!("解析设置文件失败，使用默认设置: {}", err);
                Self::default()
            }
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), AppError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Storage(format!("序列化设置失败: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 把越界取值收敛到可用范围
    pub fn normalized(mut self) -> Self {
        self.poll_interval_ms = normalize_poll_interval_ms(self.poll_interval_ms);
        self.max_unpinned = self.max_unpinned.max(1);
        self.max_backup_files = self.max_backup_files.max(1);
        if self.db_path.trim().is_empty() {
            self.db_path = DEFAULT_DB_FILE.to_string();
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.max_unpinned)
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.db_path)
    }

    /// 备份目录；未启用或路径为空时返回 `None`
    pub fn backup_dir(&self) -> Option<PathBuf> {
        let path = self.backup_path.trim();
        if self.backup_enabled && !path.is_empty() {
            Some(PathBuf::from(path))
        } else {
            None
        }
    }
}
