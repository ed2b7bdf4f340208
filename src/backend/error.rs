// ABOUTME: Remote API error type shared by every backend trait.
// ABOUTME: Holds the one classification point that retry and fallback decisions read.

use std::fmt;

/// Canonical Google API status codes (the gRPC code space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl ApiCode {
    /// Parse the `status` string of a Google error body.
    pub fn from_status(status: &str) -> Option<Self> {
        Some(match status {
            "CANCELLED" => ApiCode::Cancelled,
            "UNKNOWN" => ApiCode::Unknown,
            "INVALID_ARGUMENT" => ApiCode::InvalidArgument,
            "DEADLINE_EXCEEDED" => ApiCode::DeadlineExceeded,
            "NOT_FOUND" => ApiCode::NotFound,
            "ALREADY_EXISTS" => ApiCode::AlreadyExists,
            "PERMISSION_DENIED" => ApiCode::PermissionDenied,
            "RESOURCE_EXHAUSTED" => ApiCode::ResourceExhausted,
            "FAILED_PRECONDITION" => ApiCode::FailedPrecondition,
            "ABORTED" => ApiCode::Aborted,
            "OUT_OF_RANGE" => ApiCode::OutOfRange,
            "UNIMPLEMENTED" => ApiCode::Unimplemented,
            "INTERNAL" => ApiCode::Internal,
            "UNAVAILABLE" => ApiCode::Unavailable,
            "DATA_LOSS" => ApiCode::DataLoss,
            "UNAUTHENTICATED" => ApiCode::Unauthenticated,
            _ => return None,
        })
    }

    /// Map the numeric gRPC code carried by long-running operation errors.
    pub fn from_grpc(code: i32) -> Self {
        match code {
            1 => ApiCode::Cancelled,
            3 => ApiCode::InvalidArgument,
            4 => ApiCode::DeadlineExceeded,
            5 => ApiCode::NotFound,
            6 => ApiCode::AlreadyExists,
            7 => ApiCode::PermissionDenied,
            8 => ApiCode::ResourceExhausted,
            9 => ApiCode::FailedPrecondition,
            10 => ApiCode::Aborted,
            11 => ApiCode::OutOfRange,
            12 => ApiCode::Unimplemented,
            13 => ApiCode::Internal,
            14 => ApiCode::Unavailable,
            15 => ApiCode::DataLoss,
            16 => ApiCode::Unauthenticated,
            _ => ApiCode::Unknown,
        }
    }

    /// Best-effort mapping for bodies that carry only an HTTP status.
    pub fn from_http(status: u16) -> Self {
        match status {
            400 => ApiCode::InvalidArgument,
            401 => ApiCode::Unauthenticated,
            403 => ApiCode::PermissionDenied,
            404 => ApiCode::NotFound,
            409 => ApiCode::AlreadyExists,
            412 => ApiCode::FailedPrecondition,
            429 => ApiCode::ResourceExhausted,
            499 => ApiCode::Cancelled,
            501 => ApiCode::Unimplemented,
            503 => ApiCode::Unavailable,
            504 => ApiCode::DeadlineExceeded,
            500..=599 => ApiCode::Internal,
            _ => ApiCode::Unknown,
        }
    }
}

impl fmt::Display for ApiCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How the pipeline should react to a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Access denied while IAM changes propagate. Retried with backoff.
    PermissionPropagating,
    /// Access denied for a reason waiting will not fix (billing, disabled project).
    PermissionDenied,
    NotFound,
    InvalidArgument,
    Other,
}

/// Phrases in a permission error that mark it as permanent.
const PERMANENT_DENIAL_MARKERS: &[&str] = &[
    "billing",
    "BILLING_DISABLED",
    "has been suspended",
    "USER_PROJECT_DENIED",
];

/// An error returned by a backend API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ApiCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ApiCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiCode::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ApiCode::PermissionDenied, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ApiCode::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiCode::Internal, message)
    }

    /// Classify this error for retry decisions.
    pub fn class(&self) -> ErrorClass {
        match self.code {
            ApiCode::PermissionDenied
                if PERMANENT_DENIAL_MARKERS
                    .iter()
                    .any(|marker| self.message.contains(marker)) =>
            {
                ErrorClass::PermissionDenied
            }
            ApiCode::PermissionDenied => ErrorClass::PermissionPropagating,
            ApiCode::NotFound => ErrorClass::NotFound,
            ApiCode::InvalidArgument => ErrorClass::InvalidArgument,
            _ => ErrorClass::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }
}

/// Errors the retry executor can inspect.
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

impl Classify for ApiError {
    fn class(&self) -> ErrorClass {
        ApiError::class(self)
    }
}

/// Outcome of inspecting a failed validate-only service mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DryRunRejection {
    /// The backend refused the invoker IAM bypass flag (org policy or missing permission).
    InvokerFlagRejected,
    Other,
}

/// Decide whether a dry-run failure was the backend rejecting the invoker bypass flag.
///
/// Matches when the code is `INVALID_ARGUMENT`, or the message names
/// `invokerIamDisabled`, or the message mentions `Invoker IAM`. The checks are
/// independent; any one of them is enough.
pub fn classify_dry_run_rejection(error: &ApiError) -> DryRunRejection {
    if error.code == ApiCode::InvalidArgument
        || error.message.contains("invokerIamDisabled")
        || error.message.contains("Invoker IAM")
    {
        DryRunRejection::InvokerFlagRejected
    } else {
        DryRunRejection::Other
    }
}
