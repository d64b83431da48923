//! 剪贴板管理模块
//!
//! # 设计思路
//!
//! 引擎只依赖抽象的“剪贴板来源”能力，不直接绑定操作系统：
//! - **来源**：[`ClipboardSource`] 读取当前文本，读不到或不是文本时返回 `None`
//! - **自写标记**：[`SelfWriteMarker`] 记录本应用自己写入剪贴板的文本，
//!   避免粘贴历史条目时被监控器当作新内容再次采集
//! - **监控**：[`watcher`] 周期采样来源并写入存储
//!
//! # 实现思路
//!
//! - 默认实现 [`ArboardClipboard`] 每次读取时新建 `arboard::Clipboard`，
//!   不跨线程持有平台句柄。
//! - 自写标记采用 `Arc<Mutex<Option<String>>>`，粘贴方与监控器共享同一份。
//! - 标记只在剪贴板仍等于该文本时生效，一旦读到不同的值立即失效。

pub mod watcher;

use std::sync::{Arc, Mutex};

use crate::error::AppError;

pub use watcher::{ClipboardWatcher, SampleOutcome, WatcherHandle, WatcherState};

// ============================================================================
// 剪贴板来源
// ============================================================================

/// 外部剪贴板来源
pub trait ClipboardSource: Send + Sync {
    /// 读取当前文本；剪贴板为空或不是文本时返回 `Ok(None)`
    fn read_text(&self) -> Result<Option<String>, AppError>;
}

impl<T: ClipboardSource + ?Sized> ClipboardSource for Arc<T> {
    fn read_text(&self) -> Result<Option<String>, AppError> {
        (**self).read_text()
    }
}

/// 基于 `arboard` 的系统剪贴板来源
#[derive(Debug, Default, Clone, Copy)]
pub struct ArboardClipboard;

impl ArboardClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl ClipboardSource for ArboardClipboard {
    fn read_text(&self) -> Result<Option<String>, AppError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| AppError::Clipboard(format!("打开剪贴板失败: {}", e)))?;
        match clipboard.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(AppError::Clipboard(format!("读取剪贴板文本失败: {}", e))),
        }
    }
}

/// 将文本写入系统剪贴板，并登记为自写内容
pub fn write_text(marker: &SelfWriteMarker, text: &str) -> Result<(), AppError> {
    marker.mark(text);
    let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| AppError::Clipboard(format!("打开剪贴板失败: {}", e)))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| AppError::Clipboard(format!("写入剪贴板失败: {}", e)))
}

// ============================================================================
// 自写标记
// ============================================================================

/// 本应用最近一次写入剪贴板的文本
#[derive(Debug, Default, Clone)]
pub struct SelfWriteMarker {
    last_written: Arc<Mutex<Option<String>>>,
}

impl SelfWriteMarker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在写入剪贴板之前调用
    pub fn mark(&self, text: &str) {
        let mut slot = match self.last_written.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("自写标记锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        };
        *slot = Some(text.to_string());
        log::debug!("🚫 已登记自写内容（{} 字节），剪贴板保持不变期间不会采集", text.len());
    }

    /// 监控器读到 `text` 时调用
    ///
    /// 与登记内容相同返回 `true`（应跳过）；不同则清除标记并返回 `false`。
    pub fn observe(&self, text: &str) -> bool {
        let mut slot = match self.last_written.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("自写标记锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        };
        match slot.as_deref() {
            Some(written) if written == text => true,
            Some(_) => {
                *slot = None;
                false
            }
            None => false,
        }
    }
}
