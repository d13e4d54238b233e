// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! HTTP exposition of the metric registry.

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{Error, server_error};

/// Builds a router serving `registry` in text exposition format at `path`.
pub fn router(registry: Registry, path: &str,) -> Router
{
    Router::new().route(path, get(render_metrics,),).with_state(registry,)
}

async fn render_metrics(State(registry,): State<Registry,>,) -> Response
{
    let mut buffer = Vec::new();
    match TextEncoder::new().encode(&registry.gather(), &mut buffer,) {
        Ok((),) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT,)], buffer,).into_response(),
        Err(source,) => {
            error!("Failed to encode metrics: {}", source);
            (StatusCode::INTERNAL_SERVER_ERROR, source.to_string(),).into_response()
        }
    }
}

/// Binds the exposition listener.
///
/// # Errors
///
/// Returns [`Error::Server`] when the address cannot be bound.
pub async fn bind(address: &str,) -> Result<TcpListener, Error,>
{
    TcpListener::bind(address,).await.map_err(|source| server_error(address, source,),)
}

/// Serves `registry` on `listener` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns [`Error::Server`] when the server fails while accepting
/// connections.
pub async fn serve(
    listener: TcpListener,
    registry: Registry,
    path: &str,
    shutdown: CancellationToken,
) -> Result<(), Error,>
{
    let address = listener.local_addr().map(|address| address.to_string(),).unwrap_or_default();
    info!("Serving metrics on http://{}{}", address, path);

    axum::serve(listener, router(registry, path,),)
        .with_graceful_shutdown(async move { shutdown.cancelled().await },)
        .await
        .map_err(|source| server_error(address.clone(), source,),)?;

    info!("Metrics server stopped");
    Ok((),)
}
