//! 粘贴输出模块
//!
//! # 设计思路
//!
//! 引擎核心从不主动粘贴；展示层选中条目后通过 [`paste_entry`] 把
//! `sensitivity::paste_text` 的结果交给一个 [`PasteSink`]。
//! 这样敏感条目在粘贴时一定使用真实内容，而不会误用别名。
//!
//! # 实现思路
//!
//! - 默认实现 [`EnigoPasteSink`]：先用 `arboard` 写入剪贴板（同时登记自写标记），
//!   等待剪贴板生效，再用 `enigo` 模拟粘贴快捷键。
//! - macOS 使用 Cmd+V，其余平台使用 Ctrl+V。

use std::thread;
use std::time::Duration;

use enigo::{
    Direction::{Click, Press, Release},
    Enigo, Key, Keyboard, Settings,
};

use crate::clipboard::{self, SelfWriteMarker};
use crate::db::EntryStore;
use crate::error::AppError;
use crate::sensitivity::paste_text;

const CLIPBOARD_SETTLE_DELAY: Duration = Duration::from_millis(100);

fn send_paste_shortcut(enigo: &mut Enigo) -> Result<(), AppError> {
    #[cfg(target_os = "macos")]
    {
        enigo
            .key(Key::Meta, Press)
            .and_then(|_| enigo.key(Key::Unicode('v'), Click))
            .and_then(|_| enigo.key(Key::Meta, Release))
            .map_err(|e| AppError::Input(format!("模拟粘贴按键失败: {}", e)))?;
    }
    #[cfg(not(target_os = "macos"))]
    {
        enigo
            .key(Key::Control, Press)
            .and_then(|_| enigo.key(Key::Unicode('v'), Click))
            .and_then(|_| enigo.key(Key::Control, Release))
            .map_err(|e| AppError::Input(format!("模拟粘贴按键失败: {}", e)))?;
    }
    Ok(())
}

/// 粘贴输出端
pub trait PasteSink {
    fn paste(&self, text: &str) -> Result<(), AppError>;
}

/// 把指定条目的真实内容交给粘贴输出端
pub fn paste_entry(store: &EntryStore, id: i64, sink: &dyn PasteSink) -> Result<(), AppError> {
    let entry = store.get(id)?;
    sink.paste(paste_text(&entry))
}

/// 写剪贴板 + 模拟按键的系统粘贴实现
#[derive(Debug, Clone, Default)]
pub struct EnigoPasteSink {
    self_writes: SelfWriteMarker,
}

impl EnigoPasteSink {
    /// `self_writes` 应与监控器共享，避免粘贴内容被再次采集
    pub fn new(self_writes: SelfWriteMarker) -> Self {
        Self { self_writes }
    }
}

impl PasteSink for EnigoPasteSink {
    fn paste(&self, text: &str) -> Result<(), AppError> {
        clipboard::write_text(&self.self_writes, text)?;
        thread::sleep(CLIPBOARD_SETTLE_DELAY);

        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| AppError::Input(format!("初始化输入模拟失败: {}", e)))?;

        send_paste_shortcut(&mut enigo)?;

        log::debug!("已粘贴 {} 字节", text.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::{paste_entry, PasteSink};
    use crate::db::EntryStore;
    use crate::error::AppError;
    use crate::sensitivity::mark_sensitive;

    #[derive(Default)]
    struct RecordingSink {
        pasted: RefCell<Vec<String>>,
    }

    impl PasteSink for RecordingSink {
        fn paste(&self, text: &str) -> Result<(), AppError> {
            self.pasted.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn sensitive_entry_pastes_real_content() {
        let store = EntryStore::open_in_memory().expect("open store");
        let entry = store.insert("s3cr3t").expect("insert");
        mark_sensitive(&store, entry.id, "Gmail PW").expect("mark");

        let sink = RecordingSink::default();
        paste_entry(&store, entry.id, &sink).expect("paste");

        assert_eq!(sink.pasted.borrow().as_slice(), ["s3cr3t".to_string()]);
    }

    #[test]
    fn unknown_entry_is_not_pasted() {
        let store = EntryStore::open_in_memory().expect("open store");
        let sink = RecordingSink::default();

        assert!(matches!(paste_entry(&store, 1, &sink), Err(AppError::NotFound(1))));
        assert!(sink.pasted.borrow().is_empty());
    }
}
