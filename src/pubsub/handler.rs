use async_trait::async_trait;

use super::Message;

/// Обработчик сообщений подписки.
///
/// Вызывается воркером подписки по одному сообщению за раз. Ошибка или
/// паника обработчика записывается в лог и не останавливает воркер.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(
        &self,
        message: Message,
    ) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> MessageHandler for F
where
    F: Fn(Message) -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn handle(
        &self,
        message: Message,
    ) -> anyhow::Result<()> {
        (self)(message)
    }
}
