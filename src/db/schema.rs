//! Schema 初始化子模块
//!
//! ## 职责
//! - 创建/迁移 `clipboard_items` 表与索引
//! - 设置 SQLite 运行参数（WAL）
//!
//! ## 输入/输出
//! - 输入：`&Connection`
//! - 输出：`Result<(), AppError>`
//!
//! ## 错误语义
//! - DDL 失败统一映射为 `AppError::Storage`
//!
//! 表结构与既有数据文件逐列兼容，旧文件缺少的 `is_sensitive`/`alias` 列以追加方式补齐。

use rusqlite::Connection;

use crate::error::AppError;

const SCHEMA_VERSION: i64 = 1;

fn get_user_version(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| AppError::Storage(format!("读取数据库版本失败: {}", e)))
}

fn set_user_version(conn: &Connection, version: i64) -> Result<(), AppError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| AppError::Storage(format!("写入数据库版本失败: {}", e)))
}

fn has_column(conn: &Connection, column: &str) -> Result<bool, AppError> {
    let mut stmt = conn
        .prepare("PRAGMA table_info(clipboard_items)")
        .map_err(|e| AppError::Storage(format!("读取表结构失败: {}", e)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| AppError::Storage(format!("读取表结构失败: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Storage(format!("读取表结构失败: {}", e)))?;
    Ok(columns.iter().any(|c| c == column))
}

fn ensure_sensitivity_columns(conn: &Connection) -> Result<(), AppError> {
    if !has_column(conn, "is_sensitive")? {
        conn.execute("ALTER TABLE clipboard_items ADD COLUMN is_sensitive BOOLEAN DEFAULT 0", [])
            .map_err(|e| AppError::Storage(format!("追加 is_sensitive 列失败: {}", e)))?;
    }
    if !has_column(conn, "alias")? {
        conn.execute("ALTER TABLE clipboard_items ADD COLUMN alias TEXT DEFAULT NULL", [])
            .map_err(|e| AppError::Storage(format!("追加 alias 列失败: {}", e)))?;
    }
    Ok(())
}

fn create_base_tables(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS clipboard_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            is_pinned BOOLEAN DEFAULT 0,
            is_sensitive BOOLEAN DEFAULT 0,
            alias TEXT DEFAULT NULL,
            timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
        );"
    ).map_err(|e| AppError::Storage(format!("创建基础表失败: {}", e)))?;

    ensure_sensitivity_columns(conn)?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_items_timestamp ON clipboard_items(timestamp);
         CREATE INDEX IF NOT EXISTS idx_items_pinned_timestamp ON clipboard_items(is_pinned, timestamp DESC);"
    ).map_err(|e| AppError::Storage(format!("创建索引失败: {}", e)))?;

    Ok(())
}

pub(super) fn initialize_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

    create_base_tables(conn)?;

    let version = get_user_version(conn)?;
    if version < SCHEMA_VERSION {
        set_user_version(conn, SCHEMA_VERSION)?;
    } else if version > SCHEMA_VERSION {
        return Err(AppError::Storage(format!(
            "数据库版本不匹配: current={}, expected={}",
            version, SCHEMA_VERSION
        )));
    }

    Ok(())
}
