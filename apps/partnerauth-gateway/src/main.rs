//! PartnerAuth Gateway - example server for PartnerAuth signed HTTP.
//!
//! Hosts an echo endpoint behind the PartnerAuth interceptor: requests must be
//! signed by a known partner, and every answer to a signed request carries an
//! `X-SignedResponse` header.
//!
//! # Usage
//!
//! ```text
//! PARTNERAUTH_KEY_PROVIDER=env PARTNERAUTH_KEYS=bob.1=secret partnerauth-gateway
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//! | `PARTNERAUTH_VALIDITY_WINDOW_SECS` | `300` | Accepted clock skew |
//! | `PARTNERAUTH_SIGNED_RESPONSE_HEADERS` | `Content-Type` | Response headers to sign |
//! | `PARTNERAUTH_KEY_PROVIDER` | `properties` | Key backend (`properties` or `env`) |
//! | `PARTNERAUTH_KEYS_FILE` | `partnerauth-keys.properties` | Key file of the `properties` backend |
//! | `PARTNERAUTH_KEYS` | *(unset)* | `partner.key=secret` list of the `env` backend |

mod handler;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use http::Request;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use partnerauth_core::{KeyProviderRegistry, PartnerAuthConfig};
use partnerauth_server::{AuthComponents, AuthHandler, AuthInterceptor, RequestBody};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::handler::EchoHandler;

/// Server version reported at start-up.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Put the echo handler behind the PartnerAuth interceptor.
fn build_service(components: &AuthComponents) -> AuthInterceptor<impl AuthHandler<Incoming>> {
    let handler = Arc::new(EchoHandler::new(Arc::clone(&components.verifier)));
    components.interceptor(move |req: Request<RequestBody<Incoming>>| {
        let handler = Arc::clone(&handler);
        async move { handler.handle(req).await }
    })
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve<H>(listener: TcpListener, service: AuthInterceptor<H>) -> Result<()>
where
    H: AuthHandler<Incoming>,
{
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = PartnerAuthConfig::from_env();
    init_tracing(&config.log_level)?;

    let components = AuthComponents::from_config(&config, &KeyProviderRegistry::default())
        .with_context(|| format!("failed to load keys with provider {}", config.key_provider))?;
    let service = build_service(&components);

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        key_provider = %config.key_provider,
        version = VERSION,
        "starting PartnerAuth Gateway",
    );

    serve(listener, service).await
}
