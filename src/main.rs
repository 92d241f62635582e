use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use dagsched_core::{init_logging, AppConfig, LogFormat, LogLevel};

mod app;
mod shutdown;

use app::Application;
use shutdown::{wait_for_shutdown_signal, ShutdownManager};

/// 基于DAG的周期性任务调度器
#[derive(Debug, Parser)]
#[command(name = "dagsched", version, about)]
struct Cli {
    /// 配置文件路径, 缺省时尝试 config/scheduler.toml 与 scheduler.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 日志级别, 覆盖配置文件
    #[arg(short = 'l', long, value_name = "LEVEL",
          value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式, 覆盖配置文件
    #[arg(long, value_name = "FORMAT", value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => {
            AppConfig::load(Some(path)).with_context(|| format!("加载配置文件失败: {path}"))?
        }
        None => AppConfig::load(None).context("加载配置失败")?,
    };

    let level: LogLevel = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level)
        .parse()?;
    let format: LogFormat = cli
        .log_format
        .as_deref()
        .unwrap_or(&config.observability.log_format)
        .parse()?;
    init_logging(level, format)?;

    info!("启动DAG调度器");
    info!(
        "作业定义: {}, 选择策略: {}",
        config.store.definitions_path, config.dispatcher.selection_strategy
    );

    let app = Arc::new(Application::new(config).await?);
    let shutdown_manager = ShutdownManager::new();

    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    tokio::select! {
        _ = wait_for_shutdown_signal() => {}
        result = &mut app_handle => {
            if let Err(e) = result {
                error!("应用异常退出: {e}");
            }
            anyhow::bail!("应用在收到关闭信号前退出");
        }
    }
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("DAG调度器已退出");
    Ok(())
}
