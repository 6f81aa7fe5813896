mod api;
mod config;
mod error;
mod logging;
mod monitor;
mod notify;
mod peg;

use api::coingecko::CoinGeckoClient;
use config::Config;
use error::PegWatchError;
use log::{error, info};
use monitor::Monitor;
use notify::SmtpNotifier;
use std::error::Error;
use std::future::Future;
use std::io;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    logging::init(&config::log_file()).map_err(PegWatchError::from)?;

    info!("Starting pegwatch...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(PegWatchError::from(e).into());
        }
    };
    info!("Loaded configuration: {:?}", config);

    let source = CoinGeckoClient::new(
        config.price_api_url.as_str(),
        config.quote_currency.as_str(),
        config.request_timeout,
    )
    .map_err(PegWatchError::from)?;
    let notifier = SmtpNotifier::new(config.notifier.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let report = Monitor::new(config, source, notifier).run(shutdown_rx).await;

    info!(
        "Shutdown complete after {} cycles: {} alerts sent, {} skipped, {} failed, {} fetch failures, {} faulted cycles",
        report.cycles,
        report.alerts_sent,
        report.alerts_skipped,
        report.alerts_failed,
        report.fetch_failures,
        report.faulted_cycles
    );
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    let name = {
        use tokio::signal::unix::{signal, SignalKind};

        let sigterm = async {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => stream.recv().await.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::Other, "SIGTERM stream closed")
                }),
                Err(e) => Err(e),
            }
        };

        tokio::select! {
            name = signal_or_pending("SIGINT/Ctrl+C", tokio::signal::ctrl_c()) => name,
            name = signal_or_pending("SIGTERM", sigterm) => name,
        }
    };
    #[cfg(not(unix))]
    let name = signal_or_pending("SIGINT/Ctrl+C", tokio::signal::ctrl_c()).await;

    info!("Shutdown signal received ({})", name);
}

/// Resolves with `name` once the signal fires. A listener that fails is
/// logged and never resolves, so it cannot stop the monitor.
async fn signal_or_pending<F>(name: &'static str, listener: F) -> &'static str
where
    F: Future<Output = io::Result<()>>,
{
    match listener.await {
        Ok(()) => name,
        Err(e) => {
            error!("Failed to listen for {}: {}", name, e);
            std::future::pending().await
        }
    }
}
