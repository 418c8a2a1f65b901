//! HTTP backend for the basket UI
//!
//! Exposes basket listing, creation, claiming and owned deletion plus the
//! captured requests of a basket. Capturing requests is not served here.

pub mod handlers;
pub mod models;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use basketbin_store::AccessLayer;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

/// Application state shared across handlers
pub struct AppState {
    pub access: Arc<AccessLayer>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Basketbin API",
        version = "0.1.0",
        description = "REST API for request baskets and their captured requests"
    ),
    paths(
        handlers::health_check,
        handlers::list_baskets,
        handlers::create_basket,
        handlers::validate_baskets,
        handlers::get_basket,
        handlers::list_requests,
        handlers::claim_basket,
        handlers::delete_basket,
    ),
    components(
        schemas(
            models::HealthResponse,
            models::ErrorResponse,
            models::CreateBasketRequest,
            models::Basket,
            models::BasketList,
            models::ValidateBasketsRequest,
            models::ValidateBasketsResponse,
            models::ClaimResponse,
            models::BodyEncoding,
            models::CapturedRequest,
            models::CapturedRequestList,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "baskets", description = "Basket management endpoints"),
        (name = "requests", description = "Captured request inspection endpoints"),
        (name = "system", description = "System health and info endpoints")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable CORS (for development)
    pub enable_cors: bool,
    /// Allowed CORS origins (if None, allows localhost origins)
    pub cors_origins: Option<Vec<String>>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_cors: true,
            cors_origins: None,
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, access: Arc<AccessLayer>) -> Self {
        Self {
            config,
            state: Arc::new(AppState { access }),
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let api_router = Router::new()
            .route("/api/health", get(handlers::health_check))
            .route(
                "/api/baskets",
                get(handlers::list_baskets).post(handlers::create_basket),
            )
            .route("/api/baskets/validate", post(handlers::validate_baskets))
            .route(
                "/api/baskets/{name}",
                get(handlers::get_basket).delete(handlers::delete_basket),
            )
            .route("/api/baskets/{name}/requests", get(handlers::list_requests))
            .route("/api/baskets/{name}/token", post(handlers::claim_basket))
            .with_state(self.state.clone());

        let router = Router::new()
            .route("/api/openapi.json", get(openapi_json))
            .merge(api_router);

        let mut router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(self.cors_layer());
        }

        router
    }

    fn cors_layer(&self) -> CorsLayer {
        let allow_origin = match &self.config.cors_origins {
            Some(origins) => {
                let parsed: Vec<HeaderValue> = origins
                    .iter()
                    .filter_map(|origin| match HeaderValue::from_str(origin) {
                        Ok(value) => Some(value),
                        Err(_) => {
                            warn!("Ignoring invalid CORS origin {}", origin);
                            None
                        }
                    })
                    .collect();
                AllowOrigin::list(parsed)
            }
            None => AllowOrigin::predicate(|origin: &HeaderValue, _| {
                let origin_str = origin.to_str().unwrap_or("");
                origin_str.starts_with("http://localhost:")
                    || origin_str.starts_with("http://127.0.0.1:")
                    || origin_str.starts_with("https://localhost:")
                    || origin_str.starts_with("https://127.0.0.1:")
            }),
        };

        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_origin(allow_origin)
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        self.start_with_shutdown(std::future::pending()).await
    }

    /// Start the API server, draining connections once `shutdown` resolves
    pub async fn start_with_shutdown<F>(self, shutdown: F) -> Result<(), anyhow::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI document: http://{}/api/openapi.json",
            self.config.bind_addr
        );

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        info!("API server stopped");
        Ok(())
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/baskets/{name}"));
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer")));
    }

    #[test]
    fn test_default_config() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.enable_cors);
    }
}
