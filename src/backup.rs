//! 启动备份模块
//!
//! # 设计思路
//!
//! 每次启动、在打开存储之前，把数据库文件整体复制到备份目录，
//! 文件名内嵌秒级时间戳，并按时间戳只保留最近的若干份。
//! 备份直接操作存储文件本身，不经过 `EntryStore`。
//!
//! # 实现思路
//!
//! - 复制前尝试执行 `PRAGMA wal_checkpoint(TRUNCATE)`，把 WAL 中的内容合并回主文件；
//!   失败只记录日志，复制照常进行。
//! - SQLite 的 `-wal`/`-shm` 伴随文件存在时一并复制，清理时一并删除。
//! - 备份失败返回 `AppError::Backup`，调用方记录后继续启动。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::error::AppError;
use crate::settings::Settings;

pub const BACKUP_PREFIX: &str = "pastey_backup_";
pub const BACKUP_EXTENSION: &str = ".db";
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

/// 一份备份文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub taken_at: NaiveDateTime,
}

pub fn backup_file_name(at: &NaiveDateTime) -> String {
    format!("{}{}{}", BACKUP_PREFIX, at.format(BACKUP_TIMESTAMP_FORMAT), BACKUP_EXTENSION)
}

/// 从文件名解析备份时间；不是备份文件时返回 `None`
pub fn parse_backup_file_name(name: &str) -> Option<NaiveDateTime> {
    let stamp = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_EXTENSION)?;
    NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT).ok()
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

fn copy_database_files(source: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(source, dest)?;

    for suffix in SIDECAR_SUFFIXES {
        let src_sidecar = sidecar_path(source, suffix);
        let dst_sidecar = sidecar_path(dest, suffix);
        if src_sidecar.exists() {
            fs::copy(&src_sidecar, &dst_sidecar)?;
        } else {
            remove_if_exists(&dst_sidecar)?;
        }
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn checkpoint_wal(source: &Path) {
    let result = Connection::open(source)
        .and_then(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"));
    if let Err(err) = result {
        log::warn!("备份前 WAL 检查点失败，直接复制文件: {}", err);
    }
}

/// 备份轮转器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRotator {
    backup_dir: PathBuf,
    max_backups: usize,
}

impl BackupRotator {
    pub fn new(backup_dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            max_backups,
        }
    }

    /// 未启用备份或未配置目录时返回 `None`
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        settings
            .backup_dir()
            .map(|dir| Self::new(dir, settings.max_backup_files))
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// 以当前时间创建备份并清理超出数量的旧备份
    pub fn rotate(&self, source: &Path) -> Result<PathBuf, AppError> {
        self.rotate_at(source, chrono::Local::now().naive_local())
    }

    pub fn rotate_at(&self, source: &Path, now: NaiveDateTime) -> Result<PathBuf, AppError> {
        if !source.is_file() {
            return Err(AppError::Backup(format!("数据库文件不存在: {}", source.display())));
        }

        fs::create_dir_all(&self.backup_dir).map_err(|e| {
            AppError::Backup(format!("创建备份目录 '{}' 失败: {}", self.backup_dir.display(), e))
        })?;

        // 同一秒内的重复轮转沿用已有备份，已生成的备份文件不再改写
        let dest = self.backup_dir.join(backup_file_name(&now));
        if dest.exists() {
            log::info!("备份已存在，跳过本次复制: {}", dest.display());
            return Ok(dest);
        }

        checkpoint_wal(source);

        copy_database_files(source, &dest)
            .map_err(|e| AppError::Backup(format!("复制数据库到 '{}' 失败: {}", dest.display(), e)))?;
        log::info!("✅ 已创建备份: {}", dest.display());

        if let Err(err) = self.prune() {
            log::warn!("清理旧备份失败: {}", err);
        }

        Ok(dest)
    }

    /// 按内嵌时间戳升序列出备份；目录不存在时返回空列表
    pub fn list_backups(&self) -> Result<Vec<BackupArtifact>, AppError> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Backup(format!(
                    "读取备份目录 '{}' 失败: {}",
                    self.backup_dir.display(),
                    e
                )));
            }
        };

        let mut backups: Vec<BackupArtifact> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let name = entry.file_name();
                let taken_at = parse_backup_file_name(name.to_str()?)?;
                Some(BackupArtifact { path: entry.path(), taken_at })
            })
            .collect();

        backups.sort_by(|a, b| a.taken_at.cmp(&b.taken_at).then_with(|| a.path.cmp(&b.path)));
        Ok(backups)
    }

    /// 删除最旧的备份直到数量不超过上限，返回被删除的备份路径
    pub fn prune(&self) -> Result<Vec<PathBuf>, AppError> {
        let backups = self.list_backups()?;
        if backups.len() <= self.max_backups {
            return Ok(Vec::new());
        }

        let excess = backups.len() - self.max_backups;
        let mut removed = Vec::with_capacity(excess);
        for backup in backups.into_iter().take(excess) {
            let result = remove_if_exists(&backup.path).and_then(|_| {
                SIDECAR_SUFFIXES
                    .iter()
                    .try_for_each(|suffix| remove_if_exists(&sidecar_path(&backup.path, suffix)))
            });
            match result {
                Ok(()) => {
                    log::info!("🗑️  已删除旧备份: {}", backup.path.display());
                    removed.push(backup.path);
                }
                Err(e) => log::warn!("删除旧备份 '{}' 失败: {}", backup.path.display(), e),
            }
        }
        Ok(removed)
    }

    /// 用备份覆盖目标数据库，返回覆盖前为目标留存的副本路径
    ///
    /// 必须在存储关闭时调用。
    pub fn restore(&self, backup: &Path, target: &Path) -> Result<Option<PathBuf>, AppError> {
        self.restore_at(backup, target, chrono::Local::now().naive_local())
    }

    pub fn restore_at(
        &self,
        backup: &Path,
        target: &Path,
        now: NaiveDateTime,
    ) -> Result<Option<PathBuf>, AppError> {
        if !backup.is_file() {
            return Err(AppError::Backup(format!("备份文件不存在: {}", backup.display())));
        }

        let safety_copy = if target.is_file() {
            let copy_path = sidecar_path(
                target,
                &format!(".before_restore_{}", now.format(BACKUP_TIMESTAMP_FORMAT)),
            );
            copy_database_files(target, &copy_path)
                .map_err(|e| AppError::Backup(format!("留存当前数据库失败: {}", e)))?;
            log::info!("当前数据库已留存到: {}", copy_path.display());
            Some(copy_path)
        } else {
            None
        };

        copy_database_files(backup, target)
            .map_err(|e| AppError::Backup(format!("从备份恢复失败: {}", e)))?;
        log::info!("✅ 已从备份恢复数据库: {}", backup.display());

        Ok(safety_copy)
    }
}

/// 启动时执行一次备份；未启用时直接返回，失败只记录日志
pub fn rotate_on_startup(settings: &Settings, source: &Path) -> Option<PathBuf> {
    let Some(rotator) = BackupRotator::from_settings(settings) else {
        log::info!("ℹ️  备份未启用");
        return None;
    };

    match rotator.rotate(source) {
        Ok(path) => Some(path),
        Err(err) => {
            log::warn!("❌ 启动备份失败，继续启动: {}", err);
            None
        }
    }
}
