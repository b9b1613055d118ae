use thiserror::Error;

/// Failure while framing or decoding a line off the wire.
///
/// Per spec, these never get a reply: the dispatcher logs and closes the
/// connection (§7 "Protocol errors").
#[derive(Debug, Error)]
pub enum WireError {
    #[error("i/o error reading frame: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
}

/// The wire response code a `HandlerError` maps to.
///
/// Mirrors the HTTP-ish numbering in spec.md §4.1 without implying this is
/// HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 200,
    BadRequest = 400,
    Forbidden = 403,
    Internal = 500,
}

/// Failure raised by a request handler, translated into a response code at
/// the dispatcher boundary (§4.4, §7).
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("missing or unknown session key")]
    Unauthenticated,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Unauthenticated => StatusCode::Forbidden,
            HandlerError::BadRequest(_) => StatusCode::BadRequest,
            HandlerError::Store(_) => StatusCode::Internal,
        }
    }
}
