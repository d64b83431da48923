//! 历史条目子模块
//!
//! ## 职责
//! - `clipboard_items` 的增删改查
//! - 行数据到 `Entry` 的强类型转换与一致性校验
//!
//! ## 错误语义
//! - 目标 id 不存在映射为 `AppError::NotFound`
//! - 其余 SQL 失败映射为 `AppError::Storage`

use chrono::{NaiveDateTime, Timelike};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::AppError;

use super::{Entry, StoreStats};

/// 时间戳落盘格式（本地时间，微秒精度）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const SELECT_COLUMNS: &str = "SELECT id, content, is_pinned, is_sensitive, alias, timestamp FROM clipboard_items";

/// 当前本地时间，截断到落盘精度，保证写入值与读回值一致
pub(crate) fn now() -> NaiveDateTime {
    let at = chrono::Local::now().naive_local();
    at.with_nanosecond(at.nanosecond() / 1_000 * 1_000).unwrap_or(at)
}

/// 下一条记录的时间戳：不早于已存储的最大时间戳
///
/// 本地时钟回拨（夏令时结束、NTP 校时）时沿用最大值，
/// 保证“最新条目”始终是最后插入的那条，时间顺序与 id 顺序一致。
pub(crate) fn next_timestamp(conn: &Connection) -> Result<NaiveDateTime, AppError> {
    let current = now();
    let latest: Option<String> = conn
        .query_row("SELECT MAX(timestamp) FROM clipboard_items", [], |row| row.get(0))
        .map_err(|e| AppError::Storage(format!("查询最大时间戳失败: {}", e)))?;

    match latest.as_deref().and_then(parse_timestamp) {
        Some(latest) if latest > current => {
            log::debug!("本地时钟早于最新记录，沿用最新时间戳");
            Ok(latest)
        }
        _ => Ok(current),
    }
}

fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// 解析落盘时间戳；兼容 `CURRENT_TIMESTAMP` 默认值写入的无小数秒格式
pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let raw_timestamp: String = row.get(5)?;
    let created_at = parse_timestamp(&raw_timestamp).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            format!("无法解析时间戳: {raw_timestamp}").into(),
        )
    })?;

    let is_sensitive = row.get::<_, Option<bool>>(3)?.unwrap_or(false);
    let alias: Option<String> = row.get(4)?;
    // 非敏感条目的别名一律视为不存在；敏感条目缺失别名时读作空串，由展示层提示补填
    let alias = if is_sensitive {
        Some(alias.unwrap_or_default())
    } else {
        None
    };

    Ok(Entry {
        id: row.get(0)?,
        content: row.get(1)?,
        is_pinned: row.get::<_, Option<bool>>(2)?.unwrap_or(false),
        is_sensitive,
        alias,
        created_at,
    })
}

pub(crate) fn insert_item(conn: &Connection, content: &str, at: NaiveDateTime) -> Result<Entry, AppError> {
    conn.execute(
        "INSERT INTO clipboard_items (content, is_pinned, is_sensitive, alias, timestamp)
         VALUES (?1, 0, 0, NULL, ?2)",
        params![content, format_timestamp(&at)],
    ).map_err(|e| AppError::Storage(format!("插入记录失败: {}", e)))?;

    Ok(Entry {
        id: conn.last_insert_rowid(),
        content: content.to_string(),
        is_pinned: false,
        is_sensitive: false,
        alias: None,
        created_at: at,
    })
}

pub(crate) fn list_items(conn: &Connection) -> Result<Vec<Entry>, AppError> {
    let mut stmt = conn
        .prepare(&format!("{SELECT_COLUMNS} ORDER BY COALESCE(is_pinned, 0) DESC, timestamp DESC, id DESC"))
        .map_err(|e| AppError::Storage(format!("准备查询失败: {}", e)))?;

    let items = stmt
        .query_map([], entry_from_row)
        .map_err(|e| AppError::Storage(format!("查询历史失败: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Storage(format!("读取行失败: {}", e)))?;

    Ok(items)
}

pub(crate) fn get_item(conn: &Connection, id: i64) -> Result<Entry, AppError> {
    conn.query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), params![id], entry_from_row)
        .optional()
        .map_err(|e| AppError::Storage(format!("查询记录失败: {}", e)))?
        .ok_or(AppError::NotFound(id))
}

fn expect_changed(changed: usize, id: i64) -> Result<(), AppError> {
    if changed == 0 {
        Err(AppError::NotFound(id))
    } else {
        Ok(())
    }
}

pub(crate) fn set_pinned(conn: &Connection, id: i64, pinned: bool) -> Result<(), AppError> {
    let changed = conn.execute(
        "UPDATE clipboard_items SET is_pinned = ?1 WHERE id = ?2",
        params![pinned, id],
    ).map_err(|e| AppError::Storage(format!("设置置顶失败: {}", e)))?;
    expect_changed(changed, id)
}

pub(crate) fn toggle_pin(conn: &Connection, id: i64) -> Result<Entry, AppError> {
    let changed = conn.execute(
        "UPDATE clipboard_items SET is_pinned = CASE WHEN is_pinned THEN 0 ELSE 1 END WHERE id = ?1",
        params![id],
    ).map_err(|e| AppError::Storage(format!("切换置顶失败: {}", e)))?;
    expect_changed(changed, id)?;
    get_item(conn, id)
}

pub(crate) fn delete_item(conn: &Connection, id: i64) -> Result<(), AppError> {
    let changed = conn
        .execute("DELETE FROM clipboard_items WHERE id = ?1", params![id])
        .map_err(|e| AppError::Storage(format!("删除记录失败: {}", e)))?;
    expect_changed(changed, id)
}

pub(crate) fn set_sensitive(
    conn: &Connection,
    id: i64,
    sensitive: bool,
    alias: Option<&str>,
) -> Result<(), AppError> {
    let changed = if sensitive {
        conn.execute(
            "UPDATE clipboard_items SET is_sensitive = 1, alias = ?1 WHERE id = ?2",
            params![alias.unwrap_or_default(), id],
        )
    } else {
        conn.execute(
            "UPDATE clipboard_items SET is_sensitive = 0, alias = NULL WHERE id = ?1",
            params![id],
        )
    }
    .map_err(|e| AppError::Storage(format!("设置敏感标记失败: {}", e)))?;
    expect_changed(changed, id)
}

pub(crate) fn update_alias(conn: &Connection, id: i64, alias: &str) -> Result<(), AppError> {
    let changed = conn.execute(
        "UPDATE clipboard_items SET alias = ?1 WHERE id = ?2 AND is_sensitive = 1",
        params![alias, id],
    ).map_err(|e| AppError::Storage(format!("更新别名失败: {}", e)))?;
    expect_changed(changed, id)
}

pub(crate) fn most_recent_content(conn: &Connection) -> Result<Option<String>, AppError> {
    conn.query_row(
        "SELECT content FROM clipboard_items ORDER BY timestamp DESC, id DESC LIMIT 1",
        [],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| AppError::Storage(format!("查询最新记录失败: {}", e)))
}

pub(crate) fn clear_unpinned(conn: &Connection) -> Result<usize, AppError> {
    conn.execute(
        "DELETE FROM clipboard_items WHERE is_pinned = 0 OR is_pinned IS NULL",
        [],
    ).map_err(|e| AppError::Storage(format!("清空未置顶记录失败: {}", e)))
}

pub(crate) fn get_stats(conn: &Connection) -> Result<StoreStats, AppError> {
    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM clipboard_items", [], |row| row.get(0))
        .map_err(|e| AppError::Storage(format!("查询总数失败: {}", e)))?;

    let pinned: i64 = conn
        .query_row("SELECT COUNT(*) FROM clipboard_items WHERE is_pinned = 1", [], |row| row.get(0))
        .map_err(|e| AppError::Storage(format!("查询置顶数失败: {}", e)))?;

    let sensitive: i64 = conn
        .query_row("SELECT COUNT(*) FROM clipboard_items WHERE is_sensitive = 1", [], |row| row.get(0))
        .map_err(|e| AppError::Storage(format!("查询敏感数失败: {}", e)))?;

    // 日期前缀按字典序比较即可覆盖当天任意时刻
    let start_of_day = now().date().format("%Y-%m-%d").to_string();
    let today: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM clipboard_items WHERE timestamp >= ?1",
            params![start_of_day],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Storage(format!("查询今日数失败: {}", e)))?;

    Ok(StoreStats { total, today, pinned, sensitive })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use rusqlite::{params, Connection};

    use super::{
        clear_unpinned, delete_item, get_item, get_stats, insert_item, list_items,
        most_recent_content, next_timestamp, parse_timestamp, set_pinned, set_sensitive, toggle_pin, update_alias,
    };
    use crate::error::AppError;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("create memory db");
        super::super::schema::initialize_schema(&conn).expect("init schema");
        conn
    }

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_micro_opt(9, minute, 0, 500))
            .expect("valid time")
    }

    #[test]
    fn insert_then_get_roundtrips_fields() {
        let conn = setup_conn();
        let created = insert_item(&conn, "hello", at(1)).expect("insert");

        let loaded = get_item(&conn, created.id).expect("get");
        assert_eq!(loaded, created);
        assert!(!loaded.is_pinned);
        assert!(!loaded.is_sensitive);
        assert_eq!(loaded.alias, None);
    }

    #[test]
    fn list_puts_pinned_first_then_newest_first() {
        let conn = setup_conn();
        let a = insert_item(&conn, "a", at(1)).expect("insert a");
        let b = insert_item(&conn, "b", at(2)).expect("insert b");
        let c = insert_item(&conn, "c", at(3)).expect("insert c");
        let d = insert_item(&conn, "d", at(4)).expect("insert d");
        set_pinned(&conn, a.id, true).expect("pin a");
        set_pinned(&conn, c.id, true).expect("pin c");

        let ids: Vec<i64> = list_items(&conn).expect("list").iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![c.id, a.id, d.id, b.id]);
    }

    #[test]
    fn list_breaks_timestamp_ties_by_id() {
        let conn = setup_conn();
        let first = insert_item(&conn, "first", at(1)).expect("insert first");
        let second = insert_item(&conn, "second", at(1)).expect("insert second");

        let ids: Vec<i64> = list_items(&conn).expect("list").iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(most_recent_content(&conn).expect("recent").as_deref(), Some("second"));
    }

    #[test]
    fn next_timestamp_never_goes_behind_stored_entries() {
        let conn = setup_conn();
        let before = next_timestamp(&conn).expect("empty table");
        assert!(before <= super::now());

        let future = super::now() + Duration::minutes(20);
        insert_item(&conn, "from the future", future).expect("insert future");

        let next = next_timestamp(&conn).expect("next");
        assert_eq!(next, future);

        let entry = insert_item(&conn, "after clock rollback", next).expect("insert");
        assert_eq!(
            most_recent_content(&conn).expect("recent").as_deref(),
            Some("after clock rollback")
        );
        assert_eq!(list_items(&conn).expect("list")[0].id, entry.id);
    }

    #[test]
    fn null_pin_flag_sorts_like_unpinned() {
        let conn = setup_conn();
        let older = insert_item(&conn, "older", at(1)).expect("insert older");
        let newer = insert_item(&conn, "newer", at(2)).expect("insert newer");
        conn.execute(
            "UPDATE clipboard_items SET is_pinned = NULL WHERE id = ?1",
            params![newer.id],
        )
        .expect("null pin flag");

        let ids: Vec<i64> = list_items(&conn).expect("list").iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[test]
    fn most_recent_content_ignores_pin_status() {
        let conn = setup_conn();
        assert_eq!(most_recent_content(&conn).expect("empty"), None);

        let old = insert_item(&conn, "old", at(1)).expect("insert old");
        insert_item(&conn, "new", at(2)).expect("insert new");
        set_pinned(&conn, old.id, true).expect("pin old");

        assert_eq!(most_recent_content(&conn).expect("recent").as_deref(), Some("new"));
    }

    #[test]
    fn set_pinned_is_idempotent_and_toggle_flips() {
        let conn = setup_conn();
        let e = insert_item(&conn, "x", at(1)).expect("insert");

        set_pinned(&conn, e.id, true).expect("pin once");
        set_pinned(&conn, e.id, true).expect("pin twice");
        assert!(get_item(&conn, e.id).expect("get").is_pinned);
        assert_eq!(list_items(&conn).expect("list").len(), 1);

        let toggled = toggle_pin(&conn, e.id).expect("toggle");
        assert!(!toggled.is_pinned);
    }

    #[test]
    fn set_sensitive_keeps_alias_consistent() {
        let conn = setup_conn();
        let e = insert_item(&conn, "s3cr3t", at(1)).expect("insert");

        set_sensitive(&conn, e.id, true, Some("Gmail PW")).expect("mark");
        let marked = get_item(&conn, e.id).expect("get marked");
        assert!(marked.is_sensitive);
        assert_eq!(marked.alias.as_deref(), Some("Gmail PW"));
        assert_eq!(marked.content, "s3cr3t");

        set_sensitive(&conn, e.id, false, Some("ignored")).expect("clear");
        let cleared = get_item(&conn, e.id).expect("get cleared");
        assert!(!cleared.is_sensitive);
        assert_eq!(cleared.alias, None);
    }

    #[test]
    fn update_alias_only_touches_sensitive_rows() {
        let conn = setup_conn();
        let e = insert_item(&conn, "plain", at(1)).expect("insert");

        assert!(matches!(update_alias(&conn, e.id, "x"), Err(AppError::NotFound(_))));

        set_sensitive(&conn, e.id, true, Some("first")).expect("mark");
        update_alias(&conn, e.id, "second").expect("update alias");
        assert_eq!(get_item(&conn, e.id).expect("get").alias.as_deref(), Some("second"));
    }

    #[test]
    fn row_validation_normalizes_alias() {
        let conn = setup_conn();
        conn.execute(
            "INSERT INTO clipboard_items (content, is_sensitive, alias, timestamp) VALUES (?1, 0, ?2, ?3)",
            params!["stray", "leftover", "2024-05-01 10:00:00"],
        ).expect("insert non-sensitive with alias");
        let stray = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO clipboard_items (content, is_sensitive, alias, timestamp) VALUES (?1, 1, NULL, ?2)",
            params!["unnamed", "2024-05-01 10:00:01"],
        ).expect("insert sensitive without alias");
        let unnamed = conn.last_insert_rowid();

        assert_eq!(get_item(&conn, stray).expect("get stray").alias, None);
        assert_eq!(get_item(&conn, unnamed).expect("get unnamed").alias.as_deref(), Some(""));
    }

    #[test]
    fn unparseable_timestamp_is_storage_error() {
        let conn = setup_conn();
        conn.execute(
            "INSERT INTO clipboard_items (content, timestamp) VALUES ('bad', 'yesterday')",
            [],
        ).expect("insert bad timestamp");

        assert!(matches!(list_items(&conn), Err(AppError::Storage(_))));
    }

    #[test]
    fn default_timestamp_column_is_readable() {
        let conn = setup_conn();
        conn.execute("INSERT INTO clipboard_items (content) VALUES ('defaulted')", [])
            .expect("insert with default timestamp");

        let items = list_items(&conn).expect("list");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, "defaulted");
    }

    #[test]
    fn parse_timestamp_accepts_known_formats() {
        let with_micros = parse_timestamp("2024-05-01 09:30:00.250000").expect("micros");
        let plain = parse_timestamp("2024-05-01 09:30:00").expect("plain");
        assert_eq!(with_micros - plain, Duration::milliseconds(250));
        assert!(parse_timestamp("2024-05-01T09:30:00").is_some());
        assert!(parse_timestamp("not a time").is_none());
    }

    #[test]
    fn delete_and_clear_unpinned() {
        let conn = setup_conn();
        let keep = insert_item(&conn, "keep", at(1)).expect("insert keep");
        let gone = insert_item(&conn, "gone", at(2)).expect("insert gone");
        insert_item(&conn, "also gone", at(3)).expect("insert also gone");
        insert_item(&conn, "third", at(4)).expect("insert third");
        set_pinned(&conn, keep.id, true).expect("pin keep");

        delete_item(&conn, gone.id).expect("delete");
        assert!(matches!(delete_item(&conn, gone.id), Err(AppError::NotFound(_))));

        assert_eq!(clear_unpinned(&conn).expect("clear"), 2);
        let remaining = list_items(&conn).expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let conn = setup_conn();
        let first = insert_item(&conn, "a", at(1)).expect("insert a");
        delete_item(&conn, first.id).expect("delete a");
        let second = insert_item(&conn, "b", at(2)).expect("insert b");

        assert!(second.id > first.id);
    }

    #[test]
    fn stats_count_groups() {
        let conn = setup_conn();
        let a = insert_item(&conn, "a", super::now()).expect("insert a");
        let b = insert_item(&conn, "b", super::now()).expect("insert b");
        insert_item(&conn, "old", at(1)).expect("insert old");
        set_pinned(&conn, a.id, true).expect("pin");
        set_sensitive(&conn, b.id, true, Some("pw")).expect("mark");

        let stats = get_stats(&conn).expect("stats");
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pinned, 1);
        assert_eq!(stats.sensitive, 1);
        assert_eq!(stats.today, 2);
    }
}
