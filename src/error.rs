//! Error types for vsphere-exporter
//!
//! This module defines the error types used throughout the application.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::resource::ResourceKind;

/// vSphere SOAP 클라이언트 에러 타입
#[derive(Error, Debug)]
pub enum VsphereError {
    /// HTTP 클라이언트 초기화 실패
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClientInit(#[source] reqwest::Error),

    /// HTTP 요청 실패
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[source] reqwest::Error),

    /// HTTP 응답 읽기 실패
    #[error("Failed to read HTTP response: {0}")]
    HttpResponse(#[source] reqwest::Error),

    /// HTTP 상태 코드 에러
    #[error("HTTP error status: {0}")]
    HttpStatus(u16),

    /// 타임아웃
    /// The value is the configured timeout in milliseconds, if known.
    #[error("Request timed out{}", .0.map(|ms| format!(" after {}ms", ms)).unwrap_or_default())]
    Timeout(Option<u64>),

    /// 연결 실패
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// SOAP Fault 응답
    #[error("vSphere fault {code}: {message}")]
    Fault { code: String, message: String },

    /// XML 파싱 에러
    #[error("XML parse error: {0}")]
    Xml(String),

    /// 응답에 필요한 요소가 없음
    #[error("Missing element in vSphere response: {0}")]
    MissingElement(String),
}

impl VsphereError {
    /// Fault 코드 추출
    pub fn fault_code(&self) -> Option<&str> {
        match self {
            VsphereError::Fault { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for VsphereError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured timeout duration.
            VsphereError::Timeout(None)
        } else if err.is_connect() {
            VsphereError::ConnectionFailed(err.to_string())
        } else if err.is_request() {
            VsphereError::HttpRequest(err)
        } else {
            VsphereError::HttpResponse(err)
        }
    }
}

/// Session manager errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// The stored session is absent or failed its liveness probe
    #[error("vSphere session is invalid: {0}")]
    Invalid(String),

    /// Building or authenticating a new connection failed
    #[error("Unable to connect to vSphere: {0}")]
    Connection(#[source] VsphereError),
}

/// One-time counter discovery failed; the kind stays disabled for the process lifetime
#[derive(Error, Debug, Clone)]
#[error("Counter catalog for {kind} is unavailable: {reason}")]
pub struct CatalogUnavailable {
    pub kind: ResourceKind,
    pub reason: String,
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream connection could not be established or re-established
    #[error("Connection error: {0}")]
    Connection(#[from] SessionError),

    /// Datacenter or resource lookup miss
    #[error("Unable to find {object} '{name}'")]
    NotFound {
        object: &'static str,
        name: String,
        #[source]
        source: Option<VsphereError>,
    },

    /// Property set or performance sample retrieval failed
    #[error("Unable to get properties of {object} '{name}': {source}")]
    PropertyFetch {
        object: &'static str,
        name: String,
        #[source]
        source: VsphereError,
    },

    /// Counter catalog for the requested kind was never resolved
    #[error("{0}")]
    CatalogUnavailable(#[from] CatalogUnavailable),
}

impl AppError {
    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Connection(_) | AppError::NotFound { .. } => StatusCode::GONE,
            AppError::PropertyFetch { .. } => StatusCode::BAD_REQUEST,
            AppError::CatalogUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Connection(_) => "Unable to connect to the vCenter Server".to_string(),
            AppError::NotFound { object, .. } => format!("Unable to find the {}", object),
            AppError::PropertyFetch { object, .. } => {
                format!("Unable to get the {} properties", object)
            }
            AppError::CatalogUnavailable(e) => {
                format!("Metrics for {} are unavailable", e.kind)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let public_message = self.public_message();

        match &self {
            // Logged once at startup; repeating it per scrape only adds noise.
            AppError::CatalogUnavailable(e) => {
                tracing::debug!(status = %status, error = %e, "Request rejected")
            }
            _ => tracing::error!(status = %status, error = %self, "Request failed"),
        }

        (status, public_message).into_response()
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;
