//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build session stores and the in-memory manager from configuration
//! - Create Axum Router with the dispatch fallback
//! - Wire up middleware (tracing, limits, timeout, request ID)
//! - Dispatch requests through the route table into handler lifecycles
//! - Own the session sweep for the lifetime of the server

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header::X_CONTENT_TYPE_OPTIONS, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{AppConfig, SessionsConfig};
use crate::http::context::{Context, Services, COOKIE_STORE, FILESYSTEM_STORE};
use crate::http::handler::{run_lifecycle, HandlerFactory};
use crate::http::request::{request_id, UuidRequestId, X_REQUEST_ID};
use crate::memory::SessionManager;
use crate::observability::metrics;
use crate::routing::RouteTable;
use crate::session::codec::CodecError;
use crate::session::cookie_store::CookieStore;
use crate::session::filesystem::FilesystemStore;
use crate::session::store::Store;

/// Routes handled by the server.
pub type Routes = RouteTable<HandlerFactory>;

/// Body returned when no route matches.
pub const NOT_FOUND_BODY: &str = "404 page not found\n";

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{store} store keys: {message}")]
    Keys { store: &'static str, message: String },

    #[error("{store} store: {source}")]
    Codec {
        store: &'static str,
        #[source]
        source: CodecError,
    },
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<Routes>,
    pub services: Arc<Services>,
    pub max_body_bytes: usize,
}

/// The dispatching HTTP server.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and routes.
    pub fn new(config: AppConfig, routes: Routes) -> Result<Self, StartupError> {
        let services = Arc::new(build_services(&config.sessions)?);
        let state = AppState {
            routes: Arc::new(routes),
            services,
            max_body_bytes: config.timeouts.max_body_bytes,
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.timeouts.max_body_bytes))
            .layer(SetResponseHeaderLayer::if_not_present(
                X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), UuidRequestId))
    }

    /// The router, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared services (stores and the in-memory manager).
    pub fn services(&self) -> Arc<Services> {
        self.state.services.clone()
    }

    /// The route table.
    pub fn routes(&self) -> Arc<Routes> {
        self.state.routes.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.state.routes.len(),
            "HTTP server starting"
        );

        let sweep = self.state.services.memory.as_ref().map(|m| m.start_gc());

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        if let Some(task) = sweep {
            task.stop().await;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Build the enabled stores and the in-memory manager.
pub fn build_services(config: &SessionsConfig) -> Result<Services, StartupError> {
    let mut stores: HashMap<String, Arc<dyn Store>> = HashMap::new();

    if config.cookie.enabled {
        warn_on_ephemeral_keys(COOKIE_STORE, config.cookie.keys.is_empty());
        let keys = config
            .cookie
            .key_pairs()
            .map_err(|message| StartupError::Keys {
                store: COOKIE_STORE,
                message,
            })?;
        let store = CookieStore::new(&keys)
            .map_err(|source| StartupError::Codec {
                store: COOKIE_STORE,
                source,
            })?
            .with_options(config.cookie.options());
        stores.insert(COOKIE_STORE.to_string(), Arc::new(store));
    }

    if config.filesystem.enabled {
        warn_on_ephemeral_keys(FILESYSTEM_STORE, config.filesystem.keys.is_empty());
        let keys = config
            .filesystem
            .key_pairs()
            .map_err(|message| StartupError::Keys {
                store: FILESYSTEM_STORE,
                message,
            })?;
        let store = FilesystemStore::new(&config.filesystem.directory, &keys)
            .map_err(|source| StartupError::Codec {
                store: FILESYSTEM_STORE,
                source,
            })?
            .with_options(config.filesystem.options());
        tracing::info!(directory = %store.directory().display(), "Filesystem session store ready");
        stores.insert(FILESYSTEM_STORE.to_string(), Arc::new(store));
    }

    let memory = config.memory.enabled.then(|| {
        Arc::new(SessionManager::new(
            config.memory.cookie_name.clone(),
            config.memory.max_lifetime(),
        ))
    });

    Ok(Services { stores, memory })
}

fn warn_on_ephemeral_keys(store: &str, ephemeral: bool) {
    if ephemeral {
        tracing::warn!(
            store,
            "No session keys configured; using a random key, sessions will not survive a restart"
        );
    }
}

/// Resolve the route and run the handler lifecycle.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().clone();
    let method_str = method.to_string();
    let path = request.uri().path().to_string();
    let raw_query = request.uri().query().map(str::to_string);

    let (route, factory, params, query) =
        match state.routes.dispatch(&path, raw_query.as_deref()) {
            Some(matched) => (
                matched.route.pattern().as_str().to_string(),
                matched.route.target().clone(),
                matched.params,
                matched.query,
            ),
            None => {
                tracing::debug!(request_id = %request_id, path = %path, "No route matched");
                metrics::record_route_miss();
                metrics::record_request(&method_str, 404, "none", start_time);
                return (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response();
            }
        };

    tracing::debug!(
        request_id = %request_id,
        route = %route,
        handler = factory.name(),
        "Dispatching request"
    );

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_request(&method_str, 413, &route, start_time);
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large\n").into_response();
        }
    };

    let ctx = Context::new(
        method,
        path,
        params,
        query,
        parts.headers,
        body,
        request_id.clone(),
        state.services.clone(),
    );

    // Session stores do blocking file and lock work.
    let outcome = tokio::task::spawn_blocking(move || {
        let mut ctx = ctx;
        let mut handler = factory.build();
        let result = run_lifecycle(handler.as_mut(), &mut ctx, factory.name());
        (ctx, result)
    })
    .await;

    let response = match outcome {
        Ok((ctx, Ok(()))) => ctx.reply.into_response(),
        Ok((_, Err(e))) => {
            let status = e.status();
            if status.is_server_error() {
                tracing::error!(request_id = %request_id, route = %route, error = %e, "Handler failed");
            } else {
                tracing::debug!(request_id = %request_id, route = %route, error = %e, "Handler rejected request");
            }
            (status, format!("{}\n", e)).into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, route = %route, error = %e, "Handler task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error\n").into_response()
        }
    };

    metrics::record_request(&method_str, response.status().as_u16(), &route, start_time);
    response
}

#[cfg(test)]
mod tests {
    use axum::http::header::SET_COOKIE;
    use tower::ServiceExt;

    use super::*;
    use crate::http::handler::{Handler, HandlerResult};

    #[derive(Default)]
    struct Echo;

    impl Handler for Echo {
        fn get(&mut self, ctx: &mut Context) -> HandlerResult {
            let id = ctx.param("id").unwrap_or("-").to_string();
            let visits = {
                let resolved = ctx.session(COOKIE_STORE, "visits")?;
                let mut session = resolved.session.lock();
                let n = session.get("n").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
                session.insert("n", n);
                n
            };
            ctx.save_sessions()?;
            ctx.reply.text(format!("{} {}", id, visits));
            Ok(())
        }
    }

    fn server() -> HttpServer {
        let routes = Routes::new()
            .with_route("/items/:id([0-9]+)", HandlerFactory::of::<Echo>())
            .unwrap();
        HttpServer::new(AppConfig::default(), routes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_unmatched_path_is_404() {
        let response = server()
            .router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(&X_REQUEST_ID));
        assert_eq!(body_text(response).await, NOT_FOUND_BODY);
    }

    #[tokio::test]
    async fn test_dispatch_runs_handler_and_sets_cookie() {
        let response = server()
            .router()
            .oneshot(Request::get("/items/7").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_some());
        assert_eq!(
            response.headers().get(X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
        assert_eq!(body_text(response).await, "7 1");
    }

    #[tokio::test]
    async fn test_unsupported_method_is_405() {
        let response = server()
            .router()
            .oneshot(Request::post("/items/7").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_client_request_id_is_propagated() {
        let response = server()
            .router()
            .oneshot(
                Request::get("/items/1")
                    .header("x-request-id", "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers().get(&X_REQUEST_ID).unwrap(), "req-123");
    }

    #[test]
    fn test_build_services_honours_enabled_flags() {
        let mut config = SessionsConfig::default();
        let services = build_services(&config).unwrap();
        assert!(services.store(COOKIE_STORE).is_some());
        assert!(services.store(FILESYSTEM_STORE).is_none());
        assert!(services.memory.is_some());

        config.cookie.enabled = false;
        config.memory.enabled = false;
        let services = build_services(&config).unwrap();
        assert!(services.stores.is_empty());
        assert!(services.memory.is_none());
    }
}
