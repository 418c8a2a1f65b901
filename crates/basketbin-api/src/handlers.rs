use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use basketbin_store::{NormalizedRequest, StoreError, Token, TokenGenerator};
use tracing::{debug, error, info, warn};

use crate::models::*;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: Some(code.to_string()),
        }),
    )
}

/// Map a store failure onto an HTTP status
fn store_error(e: StoreError) -> ApiError {
    let status = match &e {
        StoreError::Conflict(_) | StoreError::AlreadyClaimed(_) => StatusCode::CONFLICT,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        StoreError::InvalidName(_) => StatusCode::BAD_REQUEST,
        StoreError::TokenCollision
        | StoreError::Persistence { .. }
        | StoreError::Internal { .. } => {
            error!("Storage failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    api_error(status, e.to_string(), e.code())
}

fn not_found(name: &str) -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        format!("Basket not found: {}", name),
        "NOT_FOUND",
    )
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            api_error(
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header",
                "UNAUTHORIZED",
            )
        })?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            api_error(
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header format. Expected 'Bearer <token>'",
                "UNAUTHORIZED",
            )
        })?;

    // Malformed tokens can never match; reject them without a lookup.
    if let Err(e) = TokenGenerator::validate_format(&Token::new(token.to_string())) {
        debug!("Rejected malformed bearer token: {}", e);
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Malformed basket token",
            "INVALID_TOKEN",
        ));
    }

    Ok(token)
}

fn to_view(request: NormalizedRequest) -> CapturedRequest {
    let (request_body, request_body_encoding) = match request.request_body {
        Some(body) => match std::str::from_utf8(&body) {
            Ok(text) => (Some(text.to_string()), Some(BodyEncoding::Utf8)),
            Err(_) => (Some(STANDARD.encode(&body)), Some(BodyEncoding::Base64)),
        },
        None => (None, None),
    };

    CapturedRequest {
        id: request.id,
        basket_name: request.basket_name,
        sent_at: request.sent_at,
        method: request.method,
        headers: request.headers,
        request_body_content_type: request.request_body_content_type,
        request_body,
        request_body_encoding,
    }
}

/// Health check
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List all baskets
#[utoipa::path(
    get,
    path = "/api/baskets",
    responses(
        (status = 200, description = "List of baskets", body = BasketList),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "baskets"
)]
pub async fn list_baskets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BasketList>, ApiError> {
    debug!("Listing baskets");

    let baskets: Vec<Basket> = state
        .access
        .list_baskets()
        .await
        .map_err(store_error)?
        .into_iter()
        .map(|b| Basket {
            claimed: b.token.is_some(),
            name: b.name,
        })
        .collect();

    let total = baskets.len();
    Ok(Json(BasketList { baskets, total }))
}

/// Create a basket
#[utoipa::path(
    post,
    path = "/api/baskets",
    request_body = CreateBasketRequest,
    responses(
        (status = 201, description = "Basket created", body = Basket),
        (status = 400, description = "Invalid basket name", body = ErrorResponse),
        (status = 409, description = "Basket already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "baskets"
)]
pub async fn create_basket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBasketRequest>,
) -> Result<(StatusCode, Json<Basket>), ApiError> {
    let basket = state
        .access
        .create_basket(&req.name)
        .await
        .map_err(store_error)?;

    info!("Created basket {}", basket.name);

    Ok((
        StatusCode::CREATED,
        Json(Basket {
            claimed: basket.token.is_some(),
            name: basket.name,
        }),
    ))
}

/// Keep only the submitted basket names that still exist
#[utoipa::path(
    post,
    path = "/api/baskets/validate",
    request_body = ValidateBasketsRequest,
    responses(
        (status = 200, description = "Existing basket names", body = ValidateBasketsResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "baskets"
)]
pub async fn validate_baskets(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateBasketsRequest>,
) -> Result<Json<ValidateBasketsResponse>, ApiError> {
    let candidates: HashSet<String> = req.names.into_iter().collect();

    let mut names: Vec<String> = state
        .access
        .validate_local_baskets(&candidates)
        .await
        .map_err(store_error)?
        .into_iter()
        .collect();
    names.sort();

    Ok(Json(ValidateBasketsResponse { names }))
}

/// Get a single basket
#[utoipa::path(
    get,
    path = "/api/baskets/{name}",
    params(
        ("name" = String, Path, description = "Basket name")
    ),
    responses(
        (status = 200, description = "Basket information", body = Basket),
        (status = 404, description = "Basket not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "baskets"
)]
pub async fn get_basket(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Basket>, ApiError> {
    let basket = state
        .access
        .get_basket(&name)
        .await
        .map_err(store_error)?
        .ok_or_else(|| not_found(&name))?;

    Ok(Json(Basket {
        claimed: basket.token.is_some(),
        name: basket.name,
    }))
}

/// Captured requests of a basket, bodies attached
#[utoipa::path(
    get,
    path = "/api/baskets/{name}/requests",
    params(
        ("name" = String, Path, description = "Basket name")
    ),
    responses(
        (status = 200, description = "Captured requests, oldest first", body = CapturedRequestList),
        (status = 404, description = "Basket not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "requests"
)]
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CapturedRequestList>, ApiError> {
    debug!("Listing requests of basket {}", name);

    if !state
        .access
        .basket_exists(&name)
        .await
        .map_err(store_error)?
    {
        return Err(not_found(&name));
    }

    let requests: Vec<CapturedRequest> = state
        .access
        .get_basket_contents(&name)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(to_view)
        .collect();

    let total = requests.len();
    Ok(Json(CapturedRequestList { requests, total }))
}

/// Issue the ownership token of a basket
#[utoipa::path(
    post,
    path = "/api/baskets/{name}/token",
    params(
        ("name" = String, Path, description = "Basket name")
    ),
    responses(
        (status = 201, description = "Token issued", body = ClaimResponse),
        (status = 404, description = "Basket not found", body = ErrorResponse),
        (status = 409, description = "Basket already claimed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "baskets"
)]
pub async fn claim_basket(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<ClaimResponse>), ApiError> {
    let token = state
        .access
        .claim_basket(&name)
        .await
        .map_err(store_error)?;

    Ok((
        StatusCode::CREATED,
        Json(ClaimResponse {
            name,
            token: token.into_string(),
        }),
    ))
}

/// Delete a basket with its requests and bodies
#[utoipa::path(
    delete,
    path = "/api/baskets/{name}",
    params(
        ("name" = String, Path, description = "Basket name")
    ),
    responses(
        (status = 204, description = "Basket deleted"),
        (status = 401, description = "Missing or malformed bearer token", body = ErrorResponse),
        (status = 403, description = "Token does not own the basket", body = ErrorResponse),
        (status = 404, description = "Basket not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "baskets"
)]
pub async fn delete_basket(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers)?;

    let report = state
        .access
        .delete_basket_owned(&name, token)
        .await
        .map_err(store_error)?;

    if !report.is_success() {
        let cause = report
            .basket
            .cause()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "basket delete did not run".to_string());
        error!("Delete of basket {} failed: {}", name, cause);
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to delete basket {}: {}", name, cause),
            "DELETE_FAILED",
        ));
    }

    if !report.is_complete() {
        warn!(
            "Basket {} deleted; {} blobs left for a later cleanup pass",
            name,
            report.blobs_failed.len()
        );
    }

    Ok(StatusCode::NO_CONTENT)
}
