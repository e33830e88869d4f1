//! Интеграционные тесты брокера в одном процессе поверх файлового ящика.

use std::{sync::Arc, time::Duration};

use aura_bus::{Broker, BrokerConfig, Message, Token};
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;
use tokio::{sync::mpsc, time::timeout};

fn open(dir: &TempDir) -> Broker {
    let config = BrokerConfig {
        poll_interval_ms: 10,
        ..BrokerConfig::in_dir(dir.path())
    };
    Broker::open(config).expect("broker opens on temp dir")
}

fn collector() -> (
    impl Fn(Message) -> anyhow::Result<()> + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Message>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = move |m: Message| -> anyhow::Result<()> {
        tx.send(m)?;
        Ok(())
    };
    (handler, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("message arrives in time")
        .expect("channel open")
}

async fn wait_until_empty(broker: &Broker) {
    for _ in 0..300 {
        if broker.pending().unwrap().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("mailbox was not drained");
}

/// Тест проверяет сквозной сценарий: два агента, права по топикам,
/// подписка по шаблону и доставка JSON-нагрузки.
#[tokio::test]
async fn test_tasks_flow_between_agents() {
    let dir = TempDir::new().unwrap();
    let broker = open(&dir);

    let planner = broker
        .create_token("planner", ["publish:tasks/*"])
        .unwrap();
    let worker = broker
        .create_token("worker", ["subscribe:tasks/+", "unsubscribe:tasks/+"])
        .unwrap();

    let (handler, mut rx) = collector();
    assert!(broker.subscribe(&worker, "tasks/+", handler));
    assert!(broker.publish_json(&planner, "tasks/new", &json!({"task": 1})));

    let msg = next(&mut rx).await;
    assert_eq!(&*msg.topic, "tasks/new");
    assert_eq!(&*msg.publisher, "planner");
    assert_eq!(msg.json::<serde_json::Value>().unwrap(), json!({"task": 1}));
    assert_eq!(msg.envelope()["data"], json!({"task": 1}));

    wait_until_empty(&broker).await;
    assert!(broker.unsubscribe(&worker, "tasks/+"));
    broker.shutdown().await;
}

/// Тест проверяет, что сообщение доставляется ровно один раз, а запись
/// после этого удалена.
#[tokio::test]
async fn test_single_delivery_and_cleanup() {
    let dir = TempDir::new().unwrap();
    let broker = open(&dir);
    let token = broker.create_token("agent", ["*"]).unwrap();

    let (handler, mut rx) = collector();
    assert!(broker.subscribe(&token, "x", handler));
    assert!(broker.publish(&token, "x", "M"));

    let msg = next(&mut rx).await;
    assert_eq!(msg.text(), Some("M"));

    wait_until_empty(&broker).await;
    // несколько тиков сканера: повторной доставки быть не должно
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(broker.stats().delivered, 1);

    broker.shutdown().await;
}

/// Тест проверяет идемпотентность подписки: второй вызов не создаёт
/// второго воркера и не удваивает доставку.
#[tokio::test]
async fn test_idempotent_subscribe() {
    let dir = TempDir::new().unwrap();
    let broker = open(&dir);
    let token = broker.create_token("agent", ["*"]).unwrap();

    let (first, mut rx) = collector();
    let (second, mut rx_second) = collector();
    assert!(broker.subscribe(&token, "x", first));
    assert!(broker.subscribe(&token, "x", second));
    assert_eq!(broker.subscription_count(), 1);

    assert!(broker.publish(&token, "x", "M"));
    next(&mut rx).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
    // обработчик второго вызова отброшен вместе с отправителем
    assert!(rx_second.recv().await.is_none());

    broker.shutdown().await;
}

/// Тест проверяет, что сообщения одного издателя приходят подписчику в
/// порядке публикации.
#[tokio::test]
async fn test_local_ordering() {
    let dir = TempDir::new().unwrap();
    let broker = open(&dir);
    let token = broker.create_token("agent", ["*"]).unwrap();

    let (handler, mut rx) = collector();
    broker.subscribe(&token, "seq/#", handler);

    for i in 0..50u32 {
        assert!(broker.publish(&token, "seq/n", i.to_string()));
    }
    for i in 0..50u32 {
        let msg = next(&mut rx).await;
        assert_eq!(msg.text(), Some(i.to_string().as_str()));
    }

    broker.shutdown().await;
}

/// Тест проверяет маршрутизацию по шаблонам и отсутствие лишних доставок.
#[tokio::test]
async fn test_wildcard_routing() {
    let dir = TempDir::new().unwrap();
    let broker = open(&dir);
    let token = broker.create_token("agent", ["*"]).unwrap();

    let (alerts, mut alerts_rx) = collector();
    let (single, mut single_rx) = collector();
    broker.subscribe(&token, "alerts/#", alerts);
    broker.subscribe(&token, "alerts/+", single);

    broker.publish(&token, "alerts/cpu/high", "1");
    broker.publish(&token, "alerts/disk", "2");
    broker.publish(&token, "metrics/cpu", "3");

    assert_eq!(next(&mut alerts_rx).await.text(), Some("1"));
    assert_eq!(next(&mut alerts_rx).await.text(), Some("2"));
    assert_eq!(next(&mut single_rx).await.text(), Some("2"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(alerts_rx.try_recv().is_err());
    assert!(single_rx.try_recv().is_err());

    broker.shutdown().await;
}

/// Тест проверяет, что одна публикация в `a/b` доходит до подписок
/// `a/+`, `a/#` и `a/b` одновременно, по одному разу каждой.
#[tokio::test]
async fn test_fan_out_to_three_patterns() {
    let dir = TempDir::new().unwrap();
    let broker = open(&dir);
    let token = broker.create_token("agent", ["*"]).unwrap();

    let mut receivers = Vec::new();
    for pattern in ["a/+", "a/#", "a/b"] {
        let (handler, rx) = collector();
        assert!(broker.subscribe(&token, pattern, handler));
        receivers.push(rx);
    }
    assert_eq!(broker.subscription_count(), 3);

    assert!(broker.publish(&token, "a/b", "fan"));

    let mut got = Vec::new();
    for rx in &mut receivers {
        let msg = next(rx).await;
        assert_eq!(msg.text(), Some("fan"));
        got.push(msg.subscription.to_string());
    }
    got.sort();
    assert_eq!(got, ["a/#", "a/+", "a/b"]);

    wait_until_empty(&broker).await;
    for rx in &mut receivers {
        assert!(rx.try_recv().is_err());
    }
    broker.shutdown().await;
}

/// Тест проверяет отказы: неизвестный токен, чужой топик, расширение
/// шаблона. Ничего не записывается в ящик.
#[tokio::test]
async fn test_denials_leave_no_records() {
    let dir = TempDir::new().unwrap();
    let broker = open(&dir);
    let limited = broker
        .create_token("agent", ["publish:orders/*", "subscribe:orders/+"])
        .unwrap();

    assert!(!broker.publish(&limited, "billing/new", "x"));
    assert!(!broker.publish(&Token::from("not-a-token"), "orders/new", "x"));
    assert!(!broker.subscribe(&limited, "orders/#", |_m: Message| -> anyhow::Result<()> { Ok(()) }));
    assert!(!broker.unsubscribe(&limited, "orders/+"));

    assert!(broker.pending().unwrap().is_empty());
    assert_eq!(broker.stats().denied, 4);
    assert!(broker.publish(&limited, "orders/new", "ok"));

    broker.shutdown().await;
}

/// Тест проверяет, что ошибка и паника в обработчике не мешают следующим
/// сообщениям.
#[tokio::test]
async fn test_failing_callback_isolated() {
    let dir = TempDir::new().unwrap();
    let broker = open(&dir);
    let token = broker.create_token("agent", ["*"]).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    broker.subscribe(&token, "jobs", move |m: Message| -> anyhow::Result<()> {
        match m.text() {
            Some("fail") => anyhow::bail!("rejected job"),
            Some("panic") => panic!("job handler crashed"),
            other => {
                sink.lock().push(other.unwrap_or_default().to_string());
                Ok(())
            }
        }
    });

    for payload in ["fail", "panic", "ok"] {
        broker.publish(&token, "jobs", payload);
    }

    for _ in 0..300 {
        if !seen.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(*seen.lock(), vec!["ok".to_string()]);
    assert_eq!(broker.stats().callback_failures, 2);

    broker.shutdown().await;
}

/// Тест проверяет, что после отписки сообщения больше не приходят.
#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let dir = TempDir::new().unwrap();
    let broker = open(&dir);
    let token = broker.create_token("agent", ["*"]).unwrap();

    let (handler, mut rx) = collector();
    broker.subscribe(&token, "news", handler);
    broker.publish(&token, "news", "first");
    assert_eq!(next(&mut rx).await.text(), Some("first"));

    assert!(broker.unsubscribe(&token, "news"));
    broker.publish(&token, "news", "second");
    assert!(rx.recv().await.is_none());

    wait_until_empty(&broker).await;
    broker.shutdown().await;
}
