//! Два брокера на одном каталоге ведут себя как два процесса: у каждого
//! свой реестр подписок, своя таблица токенов в памяти и свой сканер.

use std::{fs, time::Duration};

use aura_bus::{Broker, BrokerConfig, DiscoveryMode, Message};
use tempfile::TempDir;
use tokio::{sync::mpsc, time::timeout};

fn open(
    dir: &TempDir,
    discovery: DiscoveryMode,
) -> Broker {
    let config = BrokerConfig {
        poll_interval_ms: 10,
        discovery,
        ..BrokerConfig::in_dir(dir.path())
    };
    Broker::open(config).unwrap()
}

fn collector() -> (
    impl Fn(Message) -> anyhow::Result<()> + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Message>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |m: Message| -> anyhow::Result<()> {
            tx.send(m)?;
            Ok(())
        },
        rx,
    )
}

/// Тест проверяет, что токен, выпущенный одним брокером, принимается
/// другим брокером на том же каталоге.
#[tokio::test]
async fn test_token_shared_through_directory() {
    let dir = TempDir::new().unwrap();
    let a = open(&dir, DiscoveryMode::Poll);
    let b = open(&dir, DiscoveryMode::Poll);

    let token = a.create_token("agentA", ["publish:*"]).unwrap();
    assert!(b.publish(&token, "anything", "x"));
    assert_eq!(b.tokens().owner(&token).as_deref(), Some("agentA"));

    a.shutdown().await;
    b.shutdown().await;
}

/// Тест проверяет доставку из одного брокера в другой через ящик.
///
/// Сканер издателя остановлен: иначе он может первым забрать и удалить
/// собственную запись, и до подписчика она не дойдёт.
#[tokio::test]
async fn test_message_crosses_brokers() {
    for discovery in [DiscoveryMode::Poll, DiscoveryMode::Watch] {
        let dir = TempDir::new().unwrap();
        let publisher = open(&dir, discovery);
        let subscriber = open(&dir, discovery);
        publisher.shutdown().await;

        let token = publisher.create_token("agentA", ["*"]).unwrap();
        let (handler, mut rx) = collector();
        assert!(subscriber.subscribe(&token, "tasks/+", handler));

        assert!(publisher.publish(&token, "tasks/new", "{\"task\":1}"));

        let msg = timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("remote delivery in time")
            .unwrap();
        assert_eq!(&*msg.topic, "tasks/new");
        assert_eq!(&*msg.publisher, "agentA");
        assert_eq!(&*msg.subscription, "tasks/+");

        for _ in 0..300 {
            if publisher.pending().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(publisher.pending().unwrap().is_empty());

        subscriber.shutdown().await;
    }
}

/// Тест проверяет, что сканер издателя не рассылает собственную запись
/// повторно, но убирает её из ящика.
#[tokio::test]
async fn test_own_records_not_redelivered() {
    let dir = TempDir::new().unwrap();
    let broker = open(&dir, DiscoveryMode::Poll);
    broker.shutdown().await;

    let token = broker.create_token("agentA", ["*"]).unwrap();
    let (handler, mut rx) = collector();
    assert!(broker.subscribe(&token, "x", handler));
    assert!(broker.publish(&token, "x", "once"));

    let report = broker.scan_once();
    assert_eq!(report.skipped_local, 1);
    assert_eq!(report.dispatched, 0);
    assert!(broker.pending().unwrap().is_empty());

    let first = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.text(), Some("once"));
    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
}

/// Тест проверяет, что брокер без подписок тоже забирает записи из
/// ящика.
#[tokio::test]
async fn test_scanner_without_subscribers_drains_records() {
    let dir = TempDir::new().unwrap();
    let a = open(&dir, DiscoveryMode::Poll);
    let b = open(&dir, DiscoveryMode::Poll);
    a.shutdown().await;

    let token = a.create_token("agentA", ["*"]).unwrap();
    for i in 0..5 {
        assert!(a.publish(&token, "orphans", i.to_string()));
    }

    for _ in 0..300 {
        if b.pending().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(b.pending().unwrap().is_empty());
    b.shutdown().await;
}

/// Тест проверяет, что битый файл записи удаляется, учитывается и не
/// мешает остальным записям того же прохода.
#[tokio::test]
async fn test_corrupt_record_is_dropped() {
    let dir = TempDir::new().unwrap();
    let publisher = open(&dir, DiscoveryMode::Poll);
    let reader = open(&dir, DiscoveryMode::Poll);
    publisher.shutdown().await;
    reader.shutdown().await;

    let token = publisher.create_token("agentA", ["*"]).unwrap();
    let (handler, mut rx) = collector();
    // подписка на остановленном брокере регистрируется, а воркер работает
    // на рантайме теста
    assert!(reader.subscribe(&token, "x", handler));

    fs::write(
        dir.path()
            .join("msg_00000000-0000-4000-8000-000000000000.rec"),
        b"definitely not a record",
    )
    .unwrap();
    assert!(publisher.publish(&token, "x", "good"));

    let report = reader.scan_once();
    assert_eq!(report.discovered, 2);
    assert_eq!(report.corrupt, 1);
    assert_eq!(report.dispatched, 1);
    assert_eq!(reader.stats().corrupt_records, 1);
    assert!(reader.pending().unwrap().is_empty());

    let msg = timeout(Duration::from_secs(3), rx.recv()).await.unwrap().unwrap();
    assert_eq!(msg.text(), Some("good"));
}

/// Тест проверяет, что файлы, не являющиеся записями, остаются на месте.
#[tokio::test]
async fn test_foreign_files_untouched() {
    let dir = TempDir::new().unwrap();
    let broker = open(&dir, DiscoveryMode::Poll);
    broker.shutdown().await;

    fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();
    let report = broker.scan_once();

    assert_eq!(report.discovered, 0);
    assert!(dir.path().join("notes.txt").exists());
}

/// Тест проверяет, что брокер без сканера только перечисляет записи:
/// они остаются в ящике для других процессов.
#[tokio::test]
async fn test_listing_without_scanner_keeps_records() {
    let dir = TempDir::new().unwrap();
    let config = BrokerConfig {
        poll_interval_ms: 10,
        ..BrokerConfig::in_dir(dir.path())
    };
    let publisher = Broker::open(config.clone().without_scanner()).unwrap();
    let token = publisher.create_token("agentA", ["publish:*"]).unwrap();
    for i in 0..3 {
        assert!(publisher.publish(&token, "jobs/new", i.to_string()));
    }

    let lister = Broker::open(config.without_scanner()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(lister.pending().unwrap().len(), 3);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(lister.pending().unwrap().len(), 3);
    assert_eq!(lister.stats().scans, 0);

    let records = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("msg_"))
        .count();
    assert_eq!(records, 3);

    publisher.shutdown().await;
    lister.shutdown().await;
}
