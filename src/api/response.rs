//! Response envelope shared by every boundary operation

use crate::HiveError;
use serde::Serialize;
use serde_json::Value;

/// Machine-readable failure description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&HiveError> for ApiError {
    fn from(error: &HiveError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            details: error.details(),
        }
    }
}

/// `{ success, data, error }` envelope
///
/// # Example
///
/// ```
/// use hivecrawl::{ApiResponse, HiveError};
///
/// let response: ApiResponse<()> =
///     ApiResponse::from_result(Err(HiveError::MissingParameter("URL is required".into())));
/// assert!(!response.success);
/// assert_eq!(response.status(), 400);
/// assert_eq!(response.error.unwrap().code, "MISSING_PARAMETER");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
    #[serde(skip)]
    status: u16,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status: 200,
        }
    }

    pub fn failure(error: &HiveError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError::from(error)),
            status: error.http_status(),
        }
    }

    pub fn from_result(result: crate::Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::failure(&e),
        }
    }

    /// HTTP status for this response
    pub fn status(&self) -> u16 {
        self.status
    }
}
