//! # Pastey 剪贴板历史引擎 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            展示层（托盘 / 窗口，不在本 crate 内）         │
//! │      list · pin · delete · mark_sensitive · paste_entry   │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            引擎 (Rust)                           │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  ├─ db ───────── SQLite (rusqlite) 条目存储              │
//! │  │   ├─ schema      建表 + 版本迁移                       │
//! │  │   ├─ history     条目 CRUD + 统计                      │
//! │  │   └─ retention   未置顶条目数量上限                    │
//! │  │                                                       │
//! │  ├─ sensitivity  敏感标记 · 别名 · 展示文本              │
//! │  ├─ clipboard ── 来源抽象 + 自写标记                     │
//! │  │   └─ watcher     tokio 轮询监控                        │
//! │  ├─ input        写剪贴板 + 模拟粘贴按键                 │
//! │  ├─ backup       启动备份 · 轮转 · 恢复                  │
//! │  └─ settings     JSON 设置                               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`db`] | `EntryStore`：条目持久化、排序、置顶、删除、统计、保留策略 |
//! | [`sensitivity`] | 敏感标记与别名，展示文本和粘贴文本的选择 |
//! | [`clipboard`] | 剪贴板来源、自写标记、轮询监控 |
//! | [`input`] | 把条目真实内容粘贴到前台应用 |
//! | [`backup`] | 启动时复制数据库并只保留最近若干份 |
//! | [`settings`] | 设置文件加载、归一化与保存 |

pub mod error;
pub mod backup;
pub mod clipboard;
pub mod db;
pub mod input;
pub mod sensitivity;
pub mod settings;
