use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};

use bulkpost_core::config::BulkpostConfig;
use bulkpost_daemon::cli::DaemonCli;
use bulkpost_daemon::runner::Runner;
use bulkpost_daemon::sinks::DaemonSink;
use bulkpost_daemon::{logging, metrics_server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드: 파일 -> 환경변수 -> CLI 플래그
    let mut config = BulkpostConfig::from_file(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    config.apply_env_overrides();
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "bulkpost-daemon starting");

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    let sink = DaemonSink::from_config(&config.sink)
        .map_err(|e| anyhow::anyhow!("failed to create sink: {}", e))?;
    tracing::info!(sink = sink.kind(), "sink ready");

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if cli.reads_stdin() {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(&cli.input)
            .await
            .map_err(|e| anyhow::anyhow!("failed to open input '{}': {}", cli.input, e))?;
        Box::new(BufReader::new(file))
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let summary = Runner::new(&config, sink)?.run(reader, shutdown).await?;
    if !summary.termination.is_clean() {
        tracing::warn!(
            batches_left = summary.termination.batches_left,
            "some batches were not delivered before shutdown timeout"
        );
    }

    tracing::info!("bulkpost-daemon shut down");
    Ok(())
}
