use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::signal;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod mappings;
mod services;
mod utils;

use config::Config;
use services::{create_keyboard_listener, create_platform, HotkeyEngine};

#[derive(Parser, Debug)]
#[command(name = "ahk-tiler")]
#[command(about = "Горячие клавиши для раскладки окон, вкладок и громкости с разбором tap/hold")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "ahk.toml")]
    config: String,

    /// Режим сухого запуска: окна и ввод симулируются, события читаются из stdin
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (по умолчанию из конфигурации)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Arc::new(Config::load(&args.config)?);

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;

    info!("Запуск AHK Tiler v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - реальные действия отключены");
    } else {
        utils::permissions::check_permissions()?;
    }

    let platform = create_platform(&config, args.dry_run)?;
    let passthrough = platform.keys.clone();
    let engine = Arc::new(HotkeyEngine::new(&config, platform, Handle::current()));
    let keyboard_listener =
        create_keyboard_listener(config.clone(), engine.clone(), passthrough, args.dry_run)?;

    info!("Все компоненты инициализированы");

    let mut keyboard_handle = tokio::spawn(async move {
        if let Err(e) = keyboard_listener.run().await {
            error!("Ошибка в KeyboardListener: {}", e);
        }
    });

    let listener_finished = tokio::select! {
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
                Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
            }
            false
        }
        _ = &mut keyboard_handle => {
            warn!("Источник событий клавиатуры завершился");
            true
        }
    };

    info!("Завершение работы...");

    // Таймеры удержания останавливаются раньше, чем закроется виртуальная клавиатура
    engine.shutdown();

    if !listener_finished {
        keyboard_handle.abort();
        let shutdown_timeout = tokio::time::Duration::from_secs(5);
        match tokio::time::timeout(shutdown_timeout, keyboard_handle).await {
            Ok(_) => info!("Все сервисы завершили работу корректно"),
            Err(_) => warn!("Таймаут при завершении сервисов"),
        }
    }

    info!("AHK Tiler завершил работу");
    Ok(())
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let registry = tracing_subscriber::registry().with(filter);

    if format == "pretty" {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}
