//! NDJSON plugin loop.
//!
//! Each input line is a frame: `{"kind":"call","id":1,"request":{..}}` or
//! `{"kind":"stop"}`. Calls run concurrently; replies are written one per
//! line as `{"id":1,"response":{..}}` in completion order. `stop` cancels
//! everything in flight and ends the loop once those calls have answered.

use std::sync::Arc;

use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use snowform::protocol::{ProviderServer, Request, Response};
use snowform::remote::CallContext;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Frame {
    Call { id: u64, request: Box<Request> },
    Stop,
}

#[derive(Debug, Serialize)]
struct Reply {
    id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn serve<R, W>(
    server: Arc<dyn ProviderServer>,
    input: R,
    output: W,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Reply>();
    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(reply) = rx.recv().await {
            let mut line = serde_json::to_vec(&reply)?;
            line.push(b'\n');
            output.write_all(&line).await?;
            output.flush().await?;
        }
        Ok::<_, color_eyre::eyre::Report>(())
    });

    let mut lines = BufReader::new(input).lines();
    let mut calls = JoinSet::new();
    while let Some(line) = lines.next_line().await? {
        while let Some(done) = calls.try_join_next() {
            if let Err(e) = done {
                tracing::error!(error = %e, "request task failed");
            }
        }
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Frame>(&line) {
            Ok(Frame::Stop) => {
                tracing::info!(in_flight = calls.len(), "stop requested");
                cancel.cancel();
                break;
            }
            Ok(Frame::Call { id, request }) => {
                let span = tracing::info_span!(
                    "request",
                    id,
                    op = request.op(),
                    type_name = request.type_name().unwrap_or_default()
                );
                let server = server.clone();
                let tx = tx.clone();
                let ctx = CallContext::new(cancel.child_token());
                calls.spawn(
                    async move {
                        let response = server.call(*request, &ctx).await;
                        if response.diagnostics().has_errors() {
                            let errors = response.diagnostics().errors().count();
                            tracing::warn!(errors, "request failed");
                        }
                        let _ = tx.send(Reply {
                            id: Some(id),
                            response: Some(response),
                            error: None,
                        });
                    }
                    .instrument(span),
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed frame");
                let _ = tx.send(Reply {
                    id: None,
                    response: None,
                    error: Some(format!("malformed frame: {e}")),
                });
            }
        }
    }

    while let Some(joined) = calls.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "request task failed");
        }
    }
    drop(tx);
    writer.await??;
    Ok(())
}
