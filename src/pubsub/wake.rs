use std::{path::Path, time::Duration};

use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::mpsc,
    time::{interval, Interval, MissedTickBehavior},
};
use tracing::{debug, warn};

/// Как сканер узнаёт, что пора снова просмотреть почтовый ящик.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Просмотр по таймеру.
    #[default]
    Poll,
    /// События файловой системы; таймер остаётся страховкой на случай
    /// потерянных событий.
    Watch,
}

/// Источник пробуждений сканера.
#[async_trait]
pub trait WakeSource: Send {
    /// Ждёт следующего повода просмотреть ящик.
    async fn wait(&mut self);
}

/// Пробуждение по таймеру.
pub struct PollWake {
    ticker: Interval,
}

/// Пробуждение по событиям каталога с таймером в качестве страховки.
pub struct WatchWake {
    events: mpsc::Receiver<()>,
    fallback: Interval,
    _watcher: RecommendedWatcher,
}

impl PollWake {
    pub fn new(period: Duration) -> Self {
        Self {
            ticker: ticker(period),
        }
    }
}

impl WatchWake {
    /// Начинает наблюдение за каталогом `root` (без вложенных каталогов).
    pub fn new(
        root: &Path,
        fallback: Duration,
    ) -> notify::Result<Self> {
        let (wake_tx, events) = mpsc::channel::<()>(1);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if res.is_ok() {
                let _ = wake_tx.try_send(());
            }
        })?;
        watcher.watch(root, RecursiveMode::NonRecursive)?;

        Ok(Self {
            events,
            fallback: ticker(fallback),
            _watcher: watcher,
        })
    }
}

#[async_trait]
impl WakeSource for PollWake {
    async fn wait(&mut self) {
        self.ticker.tick().await;
    }
}

#[async_trait]
impl WakeSource for WatchWake {
    async fn wait(&mut self) {
        tokio::select! {
            Some(()) = self.events.recv() => {}
            _ = self.fallback.tick() => {}
        }
    }
}

/// Строит источник пробуждений для выбранного режима.
///
/// Если наблюдение невозможно (ящик не файловый или платформа не даёт
/// событий), используется таймер.
pub fn wake_source(
    mode: DiscoveryMode,
    period: Duration,
    root: Option<&Path>,
) -> Box<dyn WakeSource> {
    match (mode, root) {
        (DiscoveryMode::Watch, Some(root)) => match WatchWake::new(root, period) {
            Ok(watch) => {
                debug!(root = %root.display(), "mailbox discovery via filesystem events");
                Box::new(watch)
            }
            Err(err) => {
                warn!(error = %err, "filesystem watch unavailable, falling back to polling");
                Box::new(PollWake::new(period))
            }
        },
        (DiscoveryMode::Watch, None) => {
            warn!("mailbox has no directory to watch, falling back to polling");
            Box::new(PollWake::new(period))
        }
        (DiscoveryMode::Poll, _) => Box::new(PollWake::new(period)),
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
