//! 敏感信息管理模块
//!
//! # 设计思路
//!
//! 敏感条目在列表中只显示别名，真实内容仅在粘贴时使用。
//! 这一分离只通过两个函数实现：
//! - [`display_text`]：展示层渲染列表时唯一可用的文本
//! - [`paste_text`]：粘贴执行方唯一可接收的文本
//!
//! 其他代码路径不得为展示目的读取 `content`，也不得在粘贴时替换为别名。
//!
//! # 实现思路
//!
//! - 变更操作先做无 I/O 的输入校验，再在存储锁内完成“检查状态 + 写入”，保证原子性。
//! - 别名在落盘前去除首尾空白。

use crate::db::{history, Entry, EntryStore};
use crate::error::AppError;

const PREVIEW_MAX_CHARS: usize = 80;
const PREVIEW_ELLIPSIS: &str = "...";

fn normalize_alias(alias: &str) -> Result<&str, AppError> {
    let trimmed = alias.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("别名不能为空".to_string()));
    }
    Ok(trimmed)
}

/// 标记为敏感并设置别名
pub fn mark_sensitive(store: &EntryStore, id: i64, alias: &str) -> Result<(), AppError> {
    let alias = normalize_alias(alias)?;
    store.set_sensitive(id, true, Some(alias))
}

/// 取消敏感标记，同时清空别名
pub fn clear_sensitive(store: &EntryStore, id: i64) -> Result<(), AppError> {
    store.set_sensitive(id, false, None)
}

/// 编辑敏感条目的别名，不触碰 `content` 与 `is_sensitive`
pub fn edit_alias(store: &EntryStore, id: i64, new_alias: &str) -> Result<(), AppError> {
    store.with_conn(|conn| {
        let entry = history::get_item(conn, id)?;
        if !entry.is_sensitive {
            return Err(AppError::InvalidState(format!("条目 {} 未标记为敏感，不能编辑别名", id)));
        }
        let alias = normalize_alias(new_alias)?;
        history::update_alias(conn, id, alias)
    })
}

/// 列表展示文本：敏感条目返回别名，否则返回原始内容
pub fn display_text(entry: &Entry) -> &str {
    if entry.is_sensitive {
        entry.alias.as_deref().unwrap_or_default()
    } else {
        &entry.content
    }
}

/// 粘贴文本：始终返回原始内容
pub fn paste_text(entry: &Entry) -> &str {
    &entry.content
}

/// 单行列表预览：换行折叠为空格，过长时截断并追加省略号
pub fn display_preview(entry: &Entry) -> String {
    let flat: String = display_text(entry)
        .chars()
        .filter(|c| *c != '\r')
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();

    if flat.chars().count() > PREVIEW_MAX_CHARS {
        let keep = PREVIEW_MAX_CHARS - PREVIEW_ELLIPSIS.len();
        let mut cut: String = flat.chars().take(keep).collect();
        cut.push_str(PREVIEW_ELLIPSIS);
        cut
    } else {
        flat
    }
}
