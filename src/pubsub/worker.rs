use std::sync::Arc;

use tokio::{
    runtime::Handle,
    sync::broadcast::{error::RecvError, Receiver},
    task::JoinHandle,
};
use tracing::{debug, error, info_span, warn, Instrument};

use super::{
    message::{Envelope, Message},
    stats::BrokerCounters,
    MessageHandler,
};
use crate::mailbox::MessageRecord;

/// Всё, что нужно воркеру одной подписки.
pub(crate) struct WorkerContext {
    pub id: u64,
    pub pattern: Arc<str>,
    pub owner: Arc<str>,
    pub handler: Arc<dyn MessageHandler>,
    pub counters: Arc<BrokerCounters>,
}

/// Запускает воркер подписки на переданном рантайме.
///
/// Воркер читает личную очередь по порядку и вызывает обработчик для каждого
/// сообщения. Завершается по `Envelope::Stop` или когда очередь закрыта.
pub(crate) fn spawn(
    runtime: &Handle,
    ctx: WorkerContext,
    rx: Receiver<Envelope>,
) -> JoinHandle<()> {
    let span = info_span!(
        "subscription",
        id = ctx.id,
        pattern = %ctx.pattern,
        owner = %ctx.owner
    );
    runtime.spawn(run(ctx, rx).instrument(span))
}

async fn run(
    ctx: WorkerContext,
    mut rx: Receiver<Envelope>,
) {
    debug!("subscription worker started");
    loop {
        match rx.recv().await {
            Ok(Envelope::Record(record)) => deliver(&ctx, &record).await,
            Ok(Envelope::Stop) => break,
            Err(RecvError::Lagged(skipped)) => {
                let skipped = usize::try_from(skipped).unwrap_or(usize::MAX);
                BrokerCounters::bump(&ctx.counters.dropped, skipped);
                warn!(skipped, "subscription queue overflowed, oldest messages dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("subscription worker stopped");
}

/// Вызывает обработчик в отдельной задаче, чтобы паника не убила воркер.
async fn deliver(
    ctx: &WorkerContext,
    record: &MessageRecord,
) {
    let message = Message::from_record(record, ctx.pattern.clone());
    let message_id = message.id;
    let handler = ctx.handler.clone();

    match tokio::spawn(async move { handler.handle(message).await }).await {
        Ok(Ok(())) => BrokerCounters::bump(&ctx.counters.delivered, 1),
        Ok(Err(err)) => {
            BrokerCounters::bump(&ctx.counters.callback_failures, 1);
            warn!(%message_id, topic = %record.topic, error = %format!("{err:#}"), "subscriber callback failed");
        }
        Err(join_err) => {
            BrokerCounters::bump(&ctx.counters.callback_failures, 1);
            error!(
                %message_id,
                topic = %record.topic,
                panicked = join_err.is_panic(),
                "subscriber callback aborted"
            );
        }
    }
}
