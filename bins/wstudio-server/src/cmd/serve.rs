use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use wstudio_api::{EventStore, KeyScheme};
use wstudio_api_server::{ApiOptions, AppState};
use wstudio_store::{MemoryEventStore, RedisEventStore};

use crate::config::{ServeArgs, Settings, StoreKind};
use crate::error::ServerError;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("wstudio-server starting");

    // --- Load config ---
    let settings = Settings::load(&args)?;
    settings.log();

    // --- Open store ---
    let store = open_store(&settings).await?;

    // --- API server ---
    let token = CancellationToken::new();
    let state = AppState::new(
        store.clone(),
        ApiOptions {
            strict_errors: settings.strict_errors,
        },
    );
    let mut api = tokio::spawn(wstudio_api_server::run(settings.port, state, token.clone()));
    tracing::info!(port = settings.port, "server ready");

    // --- Wait for a signal, or for the server to die on its own ---
    let early_exit = tokio::select! {
        signal = shutdown_signal() => {
            signal?;
            tracing::info!("shutting down...");
            None
        }
        joined = &mut api => Some(joined),
    };

    let served = match early_exit {
        Some(joined) => flatten(joined),
        None => {
            token.cancel();
            match tokio::time::timeout(DRAIN_TIMEOUT, &mut api).await {
                Ok(joined) => flatten(joined),
                Err(_) => {
                    tracing::warn!(
                        timeout = ?DRAIN_TIMEOUT,
                        "drain timed out, aborting api server"
                    );
                    api.abort();
                    Ok(())
                }
            }
        }
    };

    // --- Close store after the last request is done ---
    if let Err(e) = store.close().await {
        tracing::error!(error = %e, "store close error");
    }

    served?;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn EventStore>, ServerError> {
    let scheme = KeyScheme::new(&settings.events_prefix, &settings.resource_prefix);
    match settings.store {
        StoreKind::Redis => {
            tracing::info!(redis = %settings.target.masked_url(), "connecting to store");
            let store =
                RedisEventStore::connect(&settings.target, scheme, settings.connect_timeout).await?;
            Ok(Arc::new(store))
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory store, events are lost on exit");
            Ok(Arc::new(MemoryEventStore::new(scheme)))
        }
    }
}

fn flatten(
    joined: Result<Result<(), String>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ServerError::Api(e)),
        Err(e) => Err(ServerError::Api(format!("api task: {e}"))),
    }
}

/// Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() -> Result<(), ServerError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = term.recv() => {}
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(())
    }
}
