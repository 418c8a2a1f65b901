use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Request to create a basket
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateBasketRequest {
    /// Basket name, used as a public path segment
    pub name: String,
}

/// Basket as shown to the UI. The ownership token is never exposed here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Basket {
    pub name: String,
    /// Whether an ownership token has been issued
    pub claimed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BasketList {
    pub baskets: Vec<Basket>,
    pub total: usize,
}

/// Client-side basket names to check against the store
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidateBasketsRequest {
    pub names: Vec<String>,
}

/// Subset of the submitted names that still exist, sorted
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidateBasketsResponse {
    pub names: Vec<String>,
}

/// Ownership token issued by a claim; shown exactly once
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClaimResponse {
    pub name: String,
    pub token: String,
}

/// How `requestBody` is encoded in a captured request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// Body is valid UTF-8 and returned verbatim
    Utf8,
    /// Body is binary, standard base64
    Base64,
}

/// A captured request with its body attached
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    pub id: i32,
    pub basket_name: String,
    pub sent_at: DateTime<Utc>,
    pub method: String,
    /// Raw header block, newline-delimited
    pub headers: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body_content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body_encoding: Option<BodyEncoding>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CapturedRequestList {
    pub requests: Vec<CapturedRequest>,
    pub total: usize,
}
