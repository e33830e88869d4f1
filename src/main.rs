//! CLI брокера Aura
//!
//! Выпуск токенов, публикация и прослушивание топиков в общем каталоге
//! почтового ящика. Каждый запуск является отдельным процессом брокера,
//! поэтому `listen` в одном терминале получает то, что `publish`
//! отправляет из другого. Сканер ящика запускает только `listen`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use aura_bus::{init_logging, Broker, DiscoveryMode, Message, Settings, Token};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("AURA_GIT_COMMIT"),
    ", built ",
    env!("AURA_BUILD_TIME"),
    ")"
);

/// Аргументы командной строки.
#[derive(Parser)]
#[command(name = "aura-bus")]
#[command(author = "Aura Contributors")]
#[command(version = VERSION)]
#[command(about = "Topic-based publish/subscribe over a shared mailbox directory", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Каталог почтового ящика
    #[arg(
        short,
        long,
        env = "AURA_MAILBOX_DIR",
        help = "Общий каталог почтового ящика (по умолчанию <tmp>/aura_pubsub)"
    )]
    dir: Option<PathBuf>,
    /// Файл конфигурации
    #[arg(
        short,
        long,
        help = "Файл конфигурации (toml/yaml/json); иначе AURA_CONFIG или ./aura-bus.*"
    )]
    config: Option<PathBuf>,
    /// Обнаружение новых записей через события файловой системы
    #[arg(long, help = "Следить за каталогом вместо опроса по таймеру")]
    watch: bool,
    /// Подробный вывод
    #[arg(short, long, help = "Включить подробный вывод для отладки")]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Операции с токенами
    #[command(subcommand)]
    Token(TokenCommands),
    /// Опубликовать сообщение
    #[command(alias = "pub")]
    Publish {
        #[arg(short, long, env = "AURA_TOKEN", help = "Токен с правом publish")]
        token: String,
        #[arg(long, help = "Конкретный топик, например tasks/new")]
        topic: String,
        #[arg(long, conflicts_with = "text", help = "Нагрузка в виде JSON")]
        data: Option<String>,
        #[arg(long, help = "Нагрузка в виде строки")]
        text: Option<String>,
    },
    /// Подписаться и печатать сообщения до Ctrl+C
    #[command(alias = "sub")]
    Listen {
        #[arg(short, long, env = "AURA_TOKEN", help = "Токен с правом subscribe")]
        token: String,
        #[arg(long, help = "Шаблон подписки, например tasks/+ или alerts/#")]
        pattern: String,
    },
    /// Показать записи, ожидающие доставки
    Pending,
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Выпустить токен
    Create {
        #[arg(long, help = "Владелец токена")]
        owner: String,
        #[arg(
            short,
            long = "perm",
            required = true,
            help = "Право: '*', '<action>:*' или '<action>:<pattern>' (можно несколько)"
        )]
        permissions: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(Some(path.as_path())),
        None => Settings::load(),
    }
    .context("failed to load configuration")?;
    if let Some(dir) = &cli.dir {
        settings.broker.mailbox_dir = dir.clone();
    }
    if cli.watch {
        settings.broker.discovery = DiscoveryMode::Watch;
    }
    if cli.verbose {
        settings.logging.level = "debug".to_string();
    }

    let logging = init_logging(settings.logging.clone())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    // принимать сообщения нужно только `listen`; остальные команды не
    // должны забирать записи, ждущие других процессов
    let broker_config = match cli.command {
        Commands::Listen { .. } => settings.broker.clone(),
        _ => settings.broker.clone().without_scanner(),
    };
    let broker = Broker::open(broker_config).context("failed to open broker")?;
    let outcome = run(&broker, cli.command).await;

    broker.shutdown().await;
    logging.shutdown();
    outcome
}

async fn run(
    broker: &Broker,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Token(TokenCommands::Create { owner, permissions }) => {
            let token = broker.create_token(&owner, &permissions)?;
            println!("{token}");
        }
        Commands::Publish {
            token,
            topic,
            data,
            text,
        } => {
            let token = Token::from(token);
            let published = match (data, text) {
                (Some(json), _) => {
                    let value: serde_json::Value =
                        serde_json::from_str(&json).context("--data is not valid JSON")?;
                    broker.publish_json(&token, &topic, &value)
                }
                (None, Some(text)) => broker.publish(&token, &topic, text),
                (None, None) => broker.publish(&token, &topic, bytes::Bytes::new()),
            };
            if !published {
                bail!("publish to '{topic}' was rejected (see log for the reason)");
            }
            println!("published to {topic}");
        }
        Commands::Listen { token, pattern } => listen(broker, Token::from(token), &pattern).await?,
        Commands::Pending => {
            let pending = broker.pending()?;
            for handle in &pending {
                println!("{handle}");
            }
            eprintln!("{} pending record(s) in {}", pending.len(), broker.config().mailbox_dir.display());
        }
    }
    Ok(())
}

async fn listen(
    broker: &Broker,
    token: Token,
    pattern: &str,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let handler = move |message: Message| -> anyhow::Result<()> {
        tx.send(message)?;
        Ok(())
    };
    if !broker.subscribe(&token, pattern, handler) {
        bail!("subscribe to '{pattern}' was rejected (see log for the reason)");
    }
    eprintln!("listening on {pattern}, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            message = rx.recv() => match message {
                Some(message) => println!("{}", message.envelope()),
                None => break,
            },
        }
    }
    Ok(())
}
