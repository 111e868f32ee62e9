use clap::Parser;
use tn_bench::cli::{build_run_config, Cli};
use tn_bench::logging::{default_logs_path, LogCollector};
use tn_bench::{batch, coordinator, persistence};
use tokio::sync::watch;

fn spawn_signal_forwarder(cancel_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    log::warn!("failed to install SIGTERM handler: {e}");
                    let _ = ctrl_c.await;
                    let _ = cancel_tx.send(true);
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        log::warn!(target: "parsed", "interrupt received, cancelling run");
        let _ = cancel_tx.send(true);
    });
}

#[tokio::main]
async fn main() -> tn_bench::Result<()> {
    let cli = Cli::parse();

    let log_dir = default_logs_path()?;
    let log_collector = LogCollector::new(log_dir)?;
    if let Err(e) = log::set_boxed_logger(Box::new(log_collector.clone()))
        .map(|()| log::set_max_level(log::LevelFilter::Info))
    {
        eprintln!("warning: failed to install logger: {e}");
    }

    log::info!(target: "parsed", "tn-bench starting");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    spawn_signal_forwarder(cancel_tx);

    let result = if let Some(batch_path) = &cli.batch {
        if !cli.confirm {
            return Err(tn_bench::error::ConfigError::MissingConfirmation.into());
        }
        let batch_config = batch::load_batch_config(batch_path)?;
        let output = cli.output.clone();
        batch::run_batch(&batch_config, &output, cancel_rx).await.map(|summary| {
            log::info!(
                target: "parsed",
                "batch complete: {} succeeded, {} failed",
                summary.successful,
                summary.failed
            );
        })
    } else {
        let config = build_run_config(&cli)?;
        let output_path = config.output_path.clone();
        coordinator::run_benchmark(&config, cancel_rx).await.and_then(|record| {
            persistence::write_results(record, &output_path)?;
            log::info!(target: "parsed", "results written to {}", output_path.display());
            Ok(())
        })
    };

    if let Err(e) = &result {
        eprintln!("{}", e.user_message());
    }

    if let Err(e) = log_collector.wait_for_empty() {
        eprintln!("warning: failed to flush logs: {e}");
    }

    result
}
