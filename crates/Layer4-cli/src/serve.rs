//! Line-delimited JSON serving
//!
//! One request per input line, one response per output line. Requests run
//! concurrently, so a waiting `start` does not hold up a `status` sent after
//! it; responses carry the request `id` for matching.

use std::sync::Arc;
use tether_foundation::TetherConfig;
use tether_task::{
    AllowAll, Authorizer, Dispatcher, Response, TaskManager, TaskManagerConfig, TmuxConfig,
    TmuxSessions, TokenAuthorizer,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Build the dispatcher for a config
pub fn dispatcher(config: &TetherConfig) -> Dispatcher {
    let sessions = Arc::new(TmuxSessions::new(TmuxConfig::from(config)));
    let manager = TaskManager::new(TaskManagerConfig::from(config), sessions);

    let authorizer: Arc<dyn Authorizer> = match &config.auth_token {
        Some(token) => Arc::new(TokenAuthorizer::new(token.clone())),
        None => Arc::new(AllowAll),
    };
    Dispatcher::with_authorizer(manager, authorizer)
}

/// Serve on stdin/stdout until EOF or Ctrl-C
pub async fn run(config: TetherConfig) -> anyhow::Result<()> {
    let probe = TmuxSessions::new(TmuxConfig::from(&config));
    match probe.detect().await {
        Some(version) => info!("Using {}", version),
        None => warn!("tmux not found; every start will fail"),
    }

    let dispatcher = Arc::new(dispatcher(&config));
    info!(
        "Serving on stdin/stdout (auth {})",
        if config.auth_token.is_some() { "on" } else { "off" }
    );

    tokio::select! {
        result = serve_lines(dispatcher, tokio::io::stdin(), tokio::io::stdout()) => {
            result?;
            info!("Input closed, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down; running sessions are left alive");
        }
    }
    Ok(())
}

/// Read requests from `input`, write responses to `output`.
///
/// Returns once the input is exhausted and every in-flight request has been
/// answered.
pub async fn serve_lines<R, W>(dispatcher: Arc<Dispatcher>, input: R, output: W) -> anyhow::Result<W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Response>(100);

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(response) = rx.recv().await {
            let line = match serde_json::to_string(&response) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to encode response: {}", e);
                    continue;
                }
            };
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok::<W, std::io::Error>(output)
    });

    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Request: {}", line);

        let dispatcher = Arc::clone(&dispatcher);
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = dispatcher.dispatch_json(&line).await;
            if tx.send(response).await.is_err() {
                warn!("Response dropped: writer closed");
            }
        });
    }
    drop(tx);

    Ok(writer.await??)
}
