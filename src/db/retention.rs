//! 淘汰策略子模块
//!
//! ## 职责
//! - 每次插入后检查未置顶条目数量，超出上限时按创建时间从旧到新逐条删除
//!
//! ## 错误语义
//! - 淘汰从不让触发它的插入失败：错误只记录日志，剩余候选在下一次插入时重新计算并重试
//! - 置顶条目永远不会被淘汰

use rusqlite::{params, Connection};

use crate::error::AppError;

use super::EntryStore;

/// 未置顶条目默认上限
pub const DEFAULT_MAX_UNPINNED: usize = 100;

/// 未置顶条目的容量策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    max_unpinned: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNPINNED)
    }
}

impl RetentionPolicy {
    pub fn new(max_unpinned: usize) -> Self {
        Self { max_unpinned }
    }

    pub fn max_unpinned(&self) -> usize {
        self.max_unpinned
    }

    /// 插入成功后调用，返回本次淘汰的条目数
    pub fn after_insert(&self, store: &EntryStore) -> usize {
        match store.with_conn(|conn| Ok(self.after_insert_locked(conn))) {
            Ok(evicted) => evicted,
            Err(err) => {
                log::error!("淘汰检查无法获取存储: {}", err);
                0
            }
        }
    }

    /// 在已持有连接的前提下执行淘汰，供 `EntryStore::capture` 在同一把锁内调用
    pub(crate) fn after_insert_locked(&self, conn: &Connection) -> usize {
        match evict_excess(conn, self.max_unpinned) {
            Ok(evicted) => {
                if evicted > 0 {
                    log::debug!("🧹 已淘汰 {} 条最旧的未置顶记录", evicted);
                }
                evicted
            }
            Err(err) => {
                log::error!("淘汰旧记录失败，将在下次插入时重试: {}", err);
                0
            }
        }
    }
}

fn count_unpinned(conn: &Connection) -> Result<usize, AppError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM clipboard_items WHERE is_pinned = 0 OR is_pinned IS NULL",
            [],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Storage(format!("统计未置顶记录失败: {}", e)))?;
    Ok(usize::try_from(count).unwrap_or(0))
}

fn oldest_unpinned_ids(conn: &Connection, limit: usize) -> Result<Vec<i64>, AppError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn
        .prepare(
            "SELECT id FROM clipboard_items
             WHERE is_pinned = 0 OR is_pinned IS NULL
             ORDER BY timestamp ASC, id ASC
             LIMIT ?1",
        )
        .map_err(|e| AppError::Storage(format!("准备淘汰查询失败: {}", e)))?;

    let ids = stmt
        .query_map(params![limit], |row| row.get::<_, i64>(0))
        .map_err(|e| AppError::Storage(format!("查询淘汰候选失败: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Storage(format!("读取淘汰候选失败: {}", e)))?;

    Ok(ids)
}

/// 逐条删除最旧的未置顶条目，直到数量等于上限
///
/// 中途失败时已删除的条目不回滚，返回错误；下一次调用会重新统计并从失败的候选继续。
pub(crate) fn evict_excess(conn: &Connection, max_unpinned: usize) -> Result<usize, AppError> {
    let unpinned = count_unpinned(conn)?;
    if unpinned <= max_unpinned {
        return Ok(0);
    }

    let candidates = oldest_unpinned_ids(conn, unpinned - max_unpinned)?;
    let mut evicted = 0;
    for id in candidates {
        conn.execute(
            "DELETE FROM clipboard_items WHERE id = ?1 AND (is_pinned = 0 OR is_pinned IS NULL)",
            params![id],
        )
        .map_err(|e| AppError::Storage(format!("淘汰记录 {} 失败: {}", id, e)))?;
        evicted += 1;
    }

    Ok(evicted)
}
