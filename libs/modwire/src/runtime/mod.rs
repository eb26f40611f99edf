//! Bootstrap orchestration.
//!
//! Phase order: **instances → module graph → controllers → route table →
//! OpenAPI**. Every phase is synchronous and finishes before the HTTP listener
//! is bound; any failure aborts bootstrap with a [`BootstrapError`].

mod runner;

pub use runner::{serve, serve_listener, ShutdownOptions};

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::routing::get;
use axum::Json;
use modwire_bootstrap::{OpenApiConfig, RouterConfig};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::field::Empty;
use utoipa::openapi::OpenApi;

use crate::api::OpenApiGenerator;
use crate::context::AppContext;
use crate::descriptor::Instance;
use crate::errors::{AppExceptionFilter, ErrorFilter};
use crate::loader::{BootstrapError, ModuleLoader};
use crate::metadata::MetadataRegistry;
use crate::router::dispatch::Dispatcher;
use crate::router::{normalize_path, RouteTable};
use crate::token::Token;

pub const DEBUG_ROUTES_PATH: &str = "/debug/routes";

pub struct ApplicationBuilder {
    registry: MetadataRegistry,
    instances: Vec<(Token, Instance)>,
    router: RouterConfig,
    openapi: OpenApiConfig,
    filter: Arc<dyn ErrorFilter>,
}

impl ApplicationBuilder {
    /// Register an externally constructed singleton before module traversal.
    pub fn instance<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.instances.push((Token::of::<T>(), value));
        self
    }

    pub fn router_config(mut self, config: RouterConfig) -> Self {
        self.router = config;
        self
    }

    pub fn openapi_config(mut self, config: OpenApiConfig) -> Self {
        self.openapi = config;
        self
    }

    pub fn error_filter(mut self, filter: impl ErrorFilter + 'static) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn bootstrap<M: 'static>(self) -> Result<Application, BootstrapError> {
        self.bootstrap_root(Token::of::<M>())
    }

    pub fn bootstrap_root(mut self, root: Token) -> Result<Application, BootstrapError> {
        if !self.router.docs_path.is_empty() {
            let docs_path = normalize_path(&self.router.docs_path);
            if self.router.debug_routes && docs_path == DEBUG_ROUTES_PATH {
                return Err(BootstrapError::ReservedPath { path: docs_path });
            }
            self.router.docs_path = docs_path;
        }

        tracing::info!(root = %root, "Phase: instances");
        let mut loader = ModuleLoader::new(Arc::new(self.registry));
        for (token, value) in self.instances {
            loader = loader.with_instance_dyn(token, value)?;
        }

        tracing::info!("Phase: modules");
        loader.load(root)?;

        tracing::info!("Phase: controllers");
        let ctx = Arc::new(loader.finish()?);

        tracing::info!(ordering = ?self.router.ordering, "Phase: routes");
        let routes = Arc::new(RouteTable::build(&ctx, self.router.ordering)?);

        tracing::info!("Phase: openapi");
        let openapi = Arc::new(OpenApiGenerator::new(&self.openapi).generate(&ctx));

        tracing::info!(
            controllers = ctx.controllers().len(),
            routes = routes.len(),
            "Bootstrap complete"
        );
        Ok(Application {
            ctx,
            routes,
            openapi,
            router: self.router,
            filter: self.filter,
        })
    }
}

/// A fully bootstrapped application: loaded modules, route table and the
/// generated OpenAPI document.
pub struct Application {
    ctx: Arc<AppContext>,
    routes: Arc<RouteTable>,
    openapi: Arc<OpenApi>,
    router: RouterConfig,
    filter: Arc<dyn ErrorFilter>,
}

impl Application {
    pub fn builder(registry: MetadataRegistry) -> ApplicationBuilder {
        ApplicationBuilder {
            registry,
            instances: Vec::new(),
            router: RouterConfig::default(),
            openapi: OpenApiConfig::default(),
            filter: Arc::new(AppExceptionFilter),
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn openapi(&self) -> &OpenApi {
        &self.openapi
    }

    /// `{ message, routes: [{method, path, handler}], totalRoutes }`, sorted by path.
    pub fn route_listing(&self) -> Value {
        let mut routes: Vec<_> = self
            .routes
            .entries()
            .iter()
            .map(|e| {
                json!({
                    "method": e.method.as_str(),
                    "path": e.path,
                    "controller": e.controller.token().name(),
                    "handler": e.handler,
                })
            })
            .collect();
        routes.sort_by(|a, b| a["path"].as_str().cmp(&b["path"].as_str()));
        json!({
            "message": "Registered routes",
            "totalRoutes": routes.len(),
            "routes": routes,
        })
    }

    /// The axum router: table dispatch as fallback, plus the docs endpoint
    /// and, when enabled, the route listing. Every request goes through the
    /// access-log trace layer; CORS is answered when `cors_enabled` is set.
    pub fn into_router(self) -> axum::Router {
        let dispatcher = Dispatcher::new(
            self.ctx.clone(),
            self.routes.clone(),
            self.filter.clone(),
            &self.router,
        );
        let mut router = dispatcher.into_router();

        if !self.router.docs_path.is_empty() {
            let doc = self.openapi.clone();
            router = router.route(
                &self.router.docs_path,
                get(move || {
                    let doc = doc.clone();
                    async move { Json((*doc).clone()) }
                }),
            );
            tracing::info!(path = %self.router.docs_path, "OpenAPI document served");
        }

        if self.router.debug_routes {
            let listing = Arc::new(self.route_listing());
            router = router.route(
                DEBUG_ROUTES_PATH,
                get(move || {
                    let listing = listing.clone();
                    async move { Json((*listing).clone()) }
                }),
            );
        }

        router = router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &http::Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri().path(),
                        version = ?req.version(),
                        status = Empty,
                        latency_ms = Empty,
                    )
                })
                .on_response(
                    |res: &http::Response<Body>, latency: Duration, span: &tracing::Span| {
                        let status = res.status().as_u16();
                        let latency_ms = (latency.as_secs_f64() * 1000.0) as u64;
                        span.record("status", status);
                        span.record("latency_ms", latency_ms);
                        tracing::info!(status, latency_ms, "request completed");
                    },
                ),
        );

        if self.router.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        router
    }
}
