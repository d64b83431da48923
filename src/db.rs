//! 数据库模块（条目存储）
//!
//! # 设计思路
//!
//! 剪贴板历史持久化在单个 SQLite 文件中，由 `rusqlite` 直接操作。
//! `EntryStore` 是引擎内唯一的共享可变资源：监控循环与展示层并发调用，
//! 所有操作经由同一把互斥锁串行化，读者不会看到写了一半的状态。
//!
//! # 实现思路
//!
//! - SQL 逻辑按职责拆分到子模块：`schema` 建表迁移，`history` 增删改查，
//!   `retention` 淘汰策略。子模块均为 `&Connection` 上的自由函数，便于用内存库单测。
//! - 行数据在存储边界转换为强类型 `Entry`，并在此处校验 `is_sensitive` 与 `alias` 的一致性。
//! - 存储层不做任何重试，失败原样上抛给调用方。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub(crate) mod history;
mod retention;
mod schema;

pub use history::TIMESTAMP_FORMAT;
pub use retention::{RetentionPolicy, DEFAULT_MAX_UNPINNED};

// ============================================================================
// 数据模型
// ============================================================================

/// 剪贴板历史条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    /// 原始内容；敏感条目同样保留，粘贴时需要
    pub content: String,
    pub is_pinned: bool,
    pub is_sensitive: bool,
    /// 仅在 `is_sensitive` 时有值
    pub alias: Option<String>,
    pub created_at: NaiveDateTime,
}

/// 存储统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: i64,
    pub today: i64,
    pub pinned: i64,
    pub sensitive: i64,
}

// ============================================================================
// 条目存储
// ============================================================================

/// 条目存储句柄
///
/// 克隆开销很低，所有克隆共享同一个连接。
#[derive(Clone)]
pub struct EntryStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl EntryStore {
    /// 打开（必要时创建）持久化存储并初始化 Schema
    ///
    /// 启动时调用；失败视为致命，因为没有存储就无法采集或查询。
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::Storage(format!("创建数据库目录失败: {}", e))
                })?;
            }
        }
        log::info!("数据库路径: {}", path.display());

        let conn = Connection::open(path).map_err(|e| {
            AppError::Storage(format!("打开数据库失败: {}", e))
        })?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// 打开内存存储，主要用于测试
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AppError::Storage(format!("打开内存数据库失败: {}", e))
        })?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// 持久化文件路径；内存存储返回 `None`
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn with_conn<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let conn = self.conn.lock().map_err(|e| {
            AppError::Storage(format!("获取数据库锁失败: {}", e))
        })?;
        op(&conn)
    }

    /// 新建一条未置顶、非敏感的条目
    pub fn insert(&self, content: &str) -> Result<Entry, AppError> {
        self.with_conn(|conn| {
            let at = history::next_timestamp(conn)?;
            history::insert_item(conn, content, at)
        })
    }

    /// 插入后在同一把锁内执行淘汰
    ///
    /// 外部观察者看不到“超过上限”的中间状态。淘汰失败只记录日志，不影响插入结果。
    pub fn capture(&self, content: &str, policy: &RetentionPolicy) -> Result<Entry, AppError> {
        self.with_conn(|conn| {
            let at = history::next_timestamp(conn)?;
            let entry = history::insert_item(conn, content, at)?;
            policy.after_insert_locked(conn);
            Ok(entry)
        })
    }

    /// 全部条目快照：置顶在前，组内按创建时间倒序
    pub fn list(&self) -> Result<Vec<Entry>, AppError> {
        self.with_conn(history::list_items)
    }

    pub fn get(&self, id: i64) -> Result<Entry, AppError> {
        self.with_conn(|conn| history::get_item(conn, id))
    }

    pub fn set_pinned(&self, id: i64, pinned: bool) -> Result<(), AppError> {
        self.with_conn(|conn| history::set_pinned(conn, id, pinned))
    }

    /// 翻转置顶状态，返回更新后的条目
    pub fn toggle_pin(&self, id: i64) -> Result<Entry, AppError> {
        self.with_conn(|conn| history::toggle_pin(conn, id))
    }

    pub fn delete(&self, id: i64) -> Result<(), AppError> {
        self.with_conn(|conn| history::delete_item(conn, id))
    }

    /// 设置敏感标记
    ///
    /// 取消敏感时别名被清空；设置敏感时别名缺省为空串。
    /// 别名非空校验属于敏感信息管理（`sensitivity`）的职责。
    pub fn set_sensitive(&self, id: i64, sensitive: bool, alias: Option<&str>) -> Result<(), AppError> {
        self.with_conn(|conn| history::set_sensitive(conn, id, sensitive, alias))
    }

    /// 最新条目（不区分置顶）的内容，用于去重比较
    pub fn most_recent_content(&self) -> Result<Option<String>, AppError> {
        self.with_conn(history::most_recent_content)
    }

    /// 清空所有未置顶条目，返回删除数量
    pub fn clear_unpinned(&self) -> Result<usize, AppError> {
        self.with_conn(history::clear_unpinned)
    }

    pub fn stats(&self) -> Result<StoreStats, AppError> {
        self.with_conn(history::get_stats)
    }
}
