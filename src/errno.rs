//! Client-facing error identities and the decoder that resolves them.
//!
//! Every failure that reaches a client is an [`ApiError`]. Before anything is
//! written, [`decode`] turns it into a [`DecodedError`]: an HTTP status plus
//! the `code` / `message` pair that ends up in the JSON body.
//!
//! | Kind | Status | Code |
//! |---|---|---|
//! | [`ApiError::InternalServerError`] | 500 | `InternalError` |
//! | [`ApiError::PageNotFound`] | 404 | `ResourceNotFound.PageNotFound` |
//! | [`ApiError::Bind`] | 400 | `InvalidParameter.BindError` |
//! | [`ApiError::InvalidParameter`] | 400 | `InvalidParameter` |
//! | [`ApiError::BodyTooLarge`] | 413 | `InvalidParameter.BodyTooLarge` |
//! | [`ApiError::Business`] | declared | declared |
//! | [`ApiError::Unknown`] | 500 | `InternalError` |

use std::borrow::Cow;
use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

const INTERNAL_ERROR_CODE: &str = "InternalError";
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error.";

// ── Errno ─────────────────────────────────────────────────────────────────────

/// A business error declared by application code: status, code and a message
/// that is safe to show to the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Errno {
    status: StatusCode,
    code: Cow<'static, str>,
    message: Cow<'static, str>,
}

impl Errno {
    pub fn new(
        status: StatusCode,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self { status, code: code.into(), message: message.into() }
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn code(&self) -> &str { &self.code }
    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

// ── ApiError ──────────────────────────────────────────────────────────────────

/// Any error a handler or middleware can hand to the response envelope.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Internal server error.")]
    InternalServerError,

    #[error("Page not found.")]
    PageNotFound,

    #[error("Error occurred while binding the request body to the struct.")]
    Bind,

    #[error("Parameter verification failed.")]
    InvalidParameter,

    #[error("Request body is too large.")]
    BodyTooLarge,

    #[error("{0}")]
    Business(Errno),

    /// An error with no business identity. Its text becomes the message.
    #[error("{0}")]
    Unknown(String),
}

impl ApiError {
    /// Wraps an arbitrary error as [`ApiError::Unknown`].
    pub fn unknown(err: impl fmt::Display) -> Self {
        Self::Unknown(err.to_string())
    }

    /// Shorthand for [`decode`].
    pub fn decode(&self) -> DecodedError {
        decode(self)
    }
}

impl From<Errno> for ApiError {
    fn from(errno: Errno) -> Self {
        Self::Business(errno)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::unknown(e)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Self::unknown(e)
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// The serialized failure body: `{"code": "...", "message": "..."}`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// A fully resolved error, ready to be written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl DecodedError {
    pub fn info(&self) -> ErrorInfo {
        ErrorInfo { code: self.code.clone(), message: self.message.clone() }
    }
}

/// Resolves `err` into its status / code / message triple. Never fails.
///
/// A business error declaring a status outside `100..=599` is reported as 500
/// with its own code and message.
pub fn decode(err: &ApiError) -> DecodedError {
    let (status, code) = match err {
        ApiError::InternalServerError => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_CODE),
        ApiError::PageNotFound => (StatusCode::NOT_FOUND, "ResourceNotFound.PageNotFound"),
        ApiError::Bind => (StatusCode::BAD_REQUEST, "InvalidParameter.BindError"),
        ApiError::InvalidParameter => (StatusCode::BAD_REQUEST, "InvalidParameter"),
        ApiError::BodyTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "InvalidParameter.BodyTooLarge"),
        ApiError::Business(errno) => {
            let status = if (100..=599).contains(&errno.status.as_u16()) {
                errno.status
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            return DecodedError {
                status,
                code: errno.code.to_string(),
                message: errno.message.to_string(),
            };
        }
        ApiError::Unknown(text) if text.trim().is_empty() => {
            return DecodedError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: INTERNAL_ERROR_CODE.to_owned(),
                message: INTERNAL_ERROR_MESSAGE.to_owned(),
            };
        }
        ApiError::Unknown(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_CODE),
    };

    DecodedError { status, code: code.to_owned(), message: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_kinds() -> Vec<ApiError> {
        vec![
            ApiError::InternalServerError,
            ApiError::PageNotFound,
            ApiError::Bind,
            ApiError::InvalidParameter,
            ApiError::BodyTooLarge,
            ApiError::Business(Errno::new(StatusCode::CONFLICT, "UserAlreadyExist", "User already exists.")),
            ApiError::Business(Errno::new(
                StatusCode::from_u16(799).unwrap(),
                "Weird",
                "out of range",
            )),
            ApiError::Unknown(String::new()),
            ApiError::Unknown("  ".into()),
            ApiError::unknown("disk on fire"),
        ]
    }

    #[test]
    fn decode_is_total_and_in_range() {
        for err in all_kinds() {
            let decoded = decode(&err);
            let status = decoded.status.as_u16();
            assert!((100..=599).contains(&status), "{err:?} decoded to {status}");
            assert!(!decoded.code.is_empty(), "{err:?} decoded to an empty code");
            assert!(!decoded.message.trim().is_empty(), "{err:?} decoded to an empty message");
        }
    }

    #[test]
    fn blank_unknown_error_gets_generic_message() {
        let decoded = decode(&ApiError::Unknown(String::new()));
        assert_eq!(decoded.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(decoded.code, "InternalError");
        assert_eq!(decoded.message, "Internal server error.");
    }

    #[test]
    fn oversized_body() {
        let decoded = ApiError::BodyTooLarge.decode();
        assert_eq!(decoded.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(decoded.code, "InvalidParameter.BodyTooLarge");
    }

    #[test]
    fn page_not_found() {
        let decoded = ApiError::PageNotFound.decode();
        assert_eq!(decoded.status, StatusCode::NOT_FOUND);
        assert_eq!(decoded.code, "ResourceNotFound.PageNotFound");
        assert_eq!(decoded.message, "Page not found.");
    }

    #[test]
    fn business_error_is_surfaced_unchanged() {
        let errno = Errno::new(StatusCode::CONFLICT, "UserAlreadyExist", "User already exists.");
        let decoded = decode(&errno.into());
        assert_eq!(decoded.status, StatusCode::CONFLICT);
        assert_eq!(decoded.code, "UserAlreadyExist");
        assert_eq!(decoded.message, "User already exists.");
    }

    #[test]
    fn business_error_with_bogus_status_falls_back_to_500() {
        let errno = Errno::new(StatusCode::from_u16(799).unwrap(), "Weird", "out of range");
        let decoded = decode(&errno.into());
        assert_eq!(decoded.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(decoded.code, "Weird");
    }

    #[test]
    fn unknown_error_keeps_its_text() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let decoded = decode(&ApiError::from(io));
        assert_eq!(decoded.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(decoded.code, "InternalError");
        assert_eq!(decoded.message, "connection reset");
    }

    #[test]
    fn info_carries_code_and_message() {
        let info = ApiError::Bind.decode().info();
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            serde_json::json!({
                "code": "InvalidParameter.BindError",
                "message": "Error occurred while binding the request body to the struct."
            })
        );
    }
}
