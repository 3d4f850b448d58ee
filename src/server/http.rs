//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling; one task per
//! connection, method/path dispatch below.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::MongoClient;
use crate::routes;
use crate::types::{CaselogError, Result};

type FullBody = Full<Bytes>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    pub jwt: JwtValidator,
    pub started_at: Instant,
}

impl AppState {
    /// Create AppState, building the JWT validator from configuration
    pub fn new(args: Args, mongo: Option<MongoClient>) -> Result<Self> {
        let jwt = match &args.jwt_secret {
            Some(secret) if !args.dev_mode => {
                JwtValidator::new(secret.clone(), args.jwt_expiry_seconds)?
            }
            Some(secret) => JwtValidator::new(secret.clone(), args.jwt_expiry_seconds)
                .unwrap_or_else(|_| JwtValidator::new_dev()),
            None => JwtValidator::new_dev(),
        };

        Ok(Self {
            args,
            mongo,
            jwt,
            started_at: Instant::now(),
        })
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Caselog listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - using insecure default JWT secret");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<FullBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Liveness probe - returns 200 if caselog is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Readiness probe - returns 200 only if MongoDB answers
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state)).await
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        // Activity feed API
        (_, p) if p.starts_with("/activities") => {
            routes::handle_activities_request(req, Arc::clone(&state), addr, &path).await
        }

        _ => crate::routes::envelope::failure(&CaselogError::NotFound(format!(
            "No route for {}",
            path
        ))),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response() -> Response<FullBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        )
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        )
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}
