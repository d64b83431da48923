//! 剪贴板轮询监控
//!
//! # 设计思路
//!
//! 固定间隔采样剪贴板来源，只在内容与最新条目不同时写入存储。
//! 来源读取失败按“没有新内容”处理，存储失败只记录日志，下个周期继续。
//!
//! # 实现思路
//!
//! - 采样逻辑是同步的 [`ClipboardWatcher::sample_once`]，不依赖运行时即可测试。
//! - 运行时中每个周期把采样放到 `spawn_blocking` 执行，SQLite I/O 不占用异步工作线程。
//! - 停止信号经 `watch` 通道传递，只在两次采样之间检查。

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::db::{Entry, EntryStore, RetentionPolicy};

use super::{ClipboardSource, SelfWriteMarker};

pub const POLL_INTERVAL_DEFAULT_MS: u64 = 500;
pub const POLL_INTERVAL_MIN_MS: u64 = 50;
pub const POLL_INTERVAL_MAX_MS: u64 = 60_000;

pub fn normalize_poll_interval_ms(value_ms: u64) -> u64 {
    value_ms.clamp(POLL_INTERVAL_MIN_MS, POLL_INTERVAL_MAX_MS)
}

/// 监控器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// 等待下一次轮询
    Idle,
    /// 正在读取来源并比较
    Sampling,
}

/// 单次采样结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleOutcome {
    /// 来源不可读或不是文本，视为“没有新内容”
    Unreadable,
    /// 空文本或仅含空白
    Empty,
    /// 与最新条目内容逐字节相同
    Duplicate,
    /// 本应用自己写入的内容
    SelfWrite,
    /// 已写入新条目
    Captured(Entry),
    /// 存储失败，已记录日志，下个周期继续
    Failed,
}

/// 剪贴板轮询监控器
///
/// 每个周期执行一次 `Idle → Sampling → Idle`。存储错误不会中断监控。
pub struct ClipboardWatcher<S> {
    source: S,
    store: EntryStore,
    policy: RetentionPolicy,
    poll_interval: Duration,
    self_writes: SelfWriteMarker,
    state: WatcherState,
}

impl<S> ClipboardWatcher<S>
where
    S: ClipboardSource + 'static,
{
    pub fn new(source: S, store: EntryStore, policy: RetentionPolicy, poll_interval: Duration) -> Self {
        Self {
            source,
            store,
            policy,
            // interval 不接受零周期
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            self_writes: SelfWriteMarker::new(),
            state: WatcherState::Idle,
        }
    }

    /// 与粘贴方共享自写标记
    pub fn with_self_writes(mut self, marker: SelfWriteMarker) -> Self {
        self.self_writes = marker;
        self
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// 执行一次完整采样
    pub fn sample_once(&mut self) -> SampleOutcome {
        self.state = WatcherState::Sampling;
        let outcome = self.sample();
        self.state = WatcherState::Idle;
        outcome
    }

    fn sample(&self) -> SampleOutcome {
        let text = match self.source.read_text() {
            Ok(Some(text)) => text,
            Ok(None) => return SampleOutcome::Unreadable,
            Err(err) => {
                log::debug!("读取剪贴板失败，按无新内容处理: {}", err);
                return SampleOutcome::Unreadable;
            }
        };

        if text.trim().is_empty() {
            return SampleOutcome::Empty;
        }

        if self.self_writes.observe(&text) {
            return SampleOutcome::SelfWrite;
        }

        match self.store.most_recent_content() {
            Ok(Some(recent)) if recent == text => return SampleOutcome::Duplicate,
            Ok(_) => {}
            Err(err) => {
                log::error!("📋 去重查询失败，本次跳过: {}", err);
                return SampleOutcome::Failed;
            }
        }

        match self.store.capture(&text, &self.policy) {
            Ok(entry) => {
                log::debug!("📋 已采集新条目 id={} ({} 字节)", entry.id, entry.content.len());
                SampleOutcome::Captured(entry)
            }
            Err(err) => {
                log::error!("📋 保存剪贴板内容失败，下个周期继续: {}", err);
                SampleOutcome::Failed
            }
        }
    }

    /// 在 tokio 运行时中启动轮询任务
    pub fn spawn(self) -> WatcherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        WatcherHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!("📋 剪贴板监控已启动，轮询间隔 {}ms", self.poll_interval.as_millis());

        let mut watcher = self;
        loop {
            // 停止信号只在两次采样之间检查，采样本身不会被打断
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    let sampled = tokio::task::spawn_blocking(move || {
                        watcher.sample_once();
                        watcher
                    })
                    .await;
                    watcher = match sampled {
                        Ok(watcher) => watcher,
                        Err(err) => {
                            log::error!("📋 采样任务异常退出，监控停止: {err}");
                            return;
                        }
                    };
                }
            }
        }

        log::info!("📋 剪贴板监控已停止");
    }
}

/// 运行中监控任务的句柄
pub struct WatcherHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WatcherHandle {
    /// 发送停止信号并等待当前采样结束
    pub async fn shutdown(self) {
        if let Err(err) = self.shutdown_tx.send(true) {
            log::warn!("发送监控停止信号失败（任务可能已退出）: {err}");
        }
        if let Err(err) = self.join.await {
            log::error!("剪贴板监控任务异常退出: {err}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
