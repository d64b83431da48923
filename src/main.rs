//! # Pastey 剪贴板历史引擎 — 应用入口
//!
//! 本文件仅负责启动顺序：日志 → 设置 → 备份 → 存储 → 监控。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;

use pastey::backup;
use pastey::clipboard::{ArboardClipboard, ClipboardWatcher, SelfWriteMarker};
use pastey::db::EntryStore;
use pastey::settings::{Settings, DEFAULT_SETTINGS_FILE};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let settings = Settings::load_from_path(&settings_path);
    log::info!("startup: settings loaded from {}", settings_path.display());

    // 备份必须在打开存储之前完成
    let db_path = settings.db_path();
    if db_path.exists() {
        backup::rotate_on_startup(&settings, &db_path);
    } else {
        log::info!("startup: 数据库尚不存在，跳过备份");
    }

    let store = match EntryStore::open(&db_path) {
        Ok(store) => store,
        Err(err) => {
            log::error!("startup: 数据库初始化失败: {err}");
            std::process::exit(1);
        }
    };
    log::info!("startup: store opened at {}", db_path.display());

    let self_writes = SelfWriteMarker::new();
    let handle = ClipboardWatcher::new(
        ArboardClipboard::new(),
        store,
        settings.retention_policy(),
        settings.poll_interval(),
    )
    .with_self_writes(self_writes)
    .spawn();

    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("监听退出信号失败: {err}");
    }

    log::info!("收到退出信号，正在停止监控...");
    handle.shutdown().await;
}
