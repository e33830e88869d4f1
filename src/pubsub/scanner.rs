use std::sync::Arc;

use aura_error::StatusCode;
use tokio::sync::watch;
use tracing::{debug, error, trace, warn};

use super::{broker::BrokerShared, stats::BrokerCounters, wake::WakeSource};
use crate::mailbox::RecordHandle;

/// Итог одного прохода сканера.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Записей в ящике на момент просмотра.
    pub discovered: usize,
    /// Записей, разосланных подпискам этого процесса.
    pub dispatched: usize,
    /// Записей, опубликованных этим процессом и уже разосланных.
    pub skipped_local: usize,
    /// Битых записей, удалённых без доставки.
    pub corrupt: usize,
    /// Записей, которые исчезли до чтения или удаления (их забрал другой
    /// процесс).
    pub vanished: usize,
}

/// Один проход: прочитать, разослать и удалить каждую найденную запись.
///
/// Запись удаляется после того, как попала в очереди, а не после
/// обработки. Если два процесса нашли одну запись одновременно, её могут
/// получить оба: доставка «хотя бы один раз».
pub(crate) fn scan_once(shared: &BrokerShared) -> ScanReport {
    let _pass = shared.scan_lock.lock();
    let mut report = ScanReport::default();
    let mailbox = shared.mailbox.as_ref();

    let handles = match mailbox.list_pending() {
        Ok(handles) => handles,
        Err(err) => {
            // каталог мог пропасть или стать недоступным; попробуем на
            // следующем тике
            warn!(error = %err, retryable = err.status_code().is_retryable(), "mailbox listing failed");
            return report;
        }
    };
    report.discovered = handles.len();

    for handle in handles {
        let record = match mailbox.load(&handle) {
            Ok(record) => record,
            Err(err) if err.is(StatusCode::NotFound) => {
                report.vanished += 1;
                continue;
            }
            Err(err) if err.is(StatusCode::CorruptedData) => {
                error!(record = %handle, error = %err, "dropping unreadable record");
                BrokerCounters::bump(&shared.counters.corrupt_records, 1);
                report.corrupt += 1;
                remove(shared, &handle);
                continue;
            }
            Err(err) => {
                warn!(record = %handle, error = %err, "record read failed, will retry");
                continue;
            }
        };

        if shared.seen.take(record.message_id) {
            report.skipped_local += 1;
        } else {
            let reached = shared.dispatcher.fan_out(Arc::new(record));
            trace!(record = %handle, reached, "record dispatched");
            report.dispatched += 1;
        }
        remove(shared, &handle);
    }

    let pruned = shared.seen.prune();
    if pruned > 0 {
        debug!(pruned, "expired local publish marks");
    }
    BrokerCounters::bump(&shared.counters.scans, 1);
    report
}

fn remove(
    shared: &BrokerShared,
    handle: &RecordHandle,
) {
    match shared.mailbox.delete(handle) {
        Ok(true) => {}
        Ok(false) => trace!(record = %handle, "record already removed by another scanner"),
        Err(err) => warn!(record = %handle, error = %err, "failed to remove record"),
    }
}

/// Фоновый цикл сканера. Завершается, когда `shutdown` становится `true`
/// или его отправитель удалён.
pub(crate) async fn run(
    shared: Arc<BrokerShared>,
    mut wake: Box<dyn WakeSource>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("mailbox scanner started");
    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = wake.wait() => {}
        }

        let pass = shared.clone();
        match tokio::task::spawn_blocking(move || scan_once(&pass)).await {
            Ok(report) if report.discovered > 0 => debug!(?report, "mailbox scan finished"),
            Ok(_) => {}
            Err(err) => error!(error = %err, "mailbox scan task failed"),
        }
    }
    debug!("mailbox scanner stopped");
}
