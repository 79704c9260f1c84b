#![allow(clippy::cognitive_complexity)]
use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow};

mod stdio;

use config::StagingConfig;
use staging_core::{
    Server,
    config::{
        cli::{self, Parser},
        trace,
    },
    tokio::{
        self,
        io::{self, BufReader},
        runtime::Builder,
        signal,
        task::JoinHandle,
    },
    tracing::*,
    transport,
};
use tokio_util::sync::CancellationToken;

/// stdin reads run on a blocking thread that cannot be interrupted
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    // parses from cli or environment var
    let config = cli::Config::parse();
    let trace_config = trace::Config::parse(&config.serverbot_log)?;
    debug!(?config, ?trace_config);
    if let Err(err) = dotenv::dotenv() {
        debug!(?err, ".env file not loaded");
    }

    let mut builder = Builder::new_multi_thread();
    // configure thread name & enable IO/time
    builder.thread_name(&config.thread_name).enable_all();
    // default num threads will be num logical CPUs
    // if we have a configured value here, set it
    if let Some(num) = config.threads {
        builder.worker_threads(num);
    }
    // build the runtime
    let rt = builder.build()?;

    rt.block_on(async move {
        match tokio::spawn(async move { start(config).await }).await {
            Err(err) => error!(?err, "failed to start server"),
            Ok(Err(err)) => error!(?err, "exited with error"),
            Ok(_) => debug!("exiting..."),
        }
    });
    rt.shutdown_timeout(SHUTDOWN_TIMEOUT);

    Ok(())
}

async fn start(config: cli::Config) -> Result<()> {
    debug!(path = ?config.config_path, "parsing server catalog");
    let cfg = Arc::new(StagingConfig::parse(&config.config_path)?);
    info!(
        servers = cfg.catalog().len(),
        default_hours = %cfg.default_lease_hours(),
        "loaded server catalog"
    );

    let (transport, handle) = transport::channel(config.channel_size);
    let reader = tokio::spawn(stdio::read_inbound(
        BufReader::new(io::stdin()),
        handle.inbound,
    ));
    let writer = tokio::spawn(stdio::write_outbound(io::stdout(), handle.outbound));

    let token = CancellationToken::new();
    let signal_task = tokio::spawn(shutdown_signal(token.clone()));

    let server_result = Server::new(cfg, transport).run(token).await;
    signal_task.abort();
    reader.abort();
    // the server owned the only outbound sender, so the writer drains and stops
    if let Err(err) = flatten(writer).await {
        error!(?err, "error flushing outbound messages");
    }
    server_result
}

async fn flatten<T>(handle: JoinHandle<Result<T, anyhow::Error>>) -> Result<T, anyhow::Error> {
    match handle.await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => Err(err),
        Err(err) => Err(anyhow!(err)),
    }
}

async fn shutdown_signal(token: CancellationToken) -> Result<()> {
    let ret = signal::ctrl_c().await.map_err(|err| anyhow!(err));
    token.cancel();
    ret
}
