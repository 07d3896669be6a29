use std::io::Cursor;
use std::sync::Arc;

use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use thiserror::Error;
use tracing::error;

/// Failure modes when decoding an image token back into its origin URL.
///
/// Decoding never yields a partial URL: any shape, encoding or
/// authentication problem surfaces here and the caller gets nothing.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("token does not have the nonce:payload shape")]
    Shape,

    #[error("token nonce is not valid hex")]
    Nonce(#[from] hex::FromHexError),

    #[error("token nonce has the wrong length")]
    NonceLength,

    #[error("token payload is not valid base64")]
    Payload(#[from] base64::DecodeError),

    #[error("token failed authenticated decryption")]
    Decrypt,

    #[error("decrypted payload is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Sealing a URL into a token failed. Practically unreachable with a
/// well-formed key, but propagated rather than masked.
#[derive(Debug, Error)]
#[error("failed to seal origin URL into a token")]
pub struct EncodeError;

/// Failure of a call to the text-rewrite backend.
///
/// Callers with a fallback value (the assembler) recover from these
/// locally; nothing in this enum is meant to reach a client verbatim.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("rewrite request failed")]
    Transport(#[source] reqwest::Error),

    #[error("rewrite request timed out")]
    Timeout,

    #[error("rewrite backend returned status {status}")]
    Api { status: u16, body: String },

    #[error("rewrite backend returned a malformed response")]
    Malformed(#[source] reqwest::Error),

    #[error("rewrite backend returned no content")]
    EmptyCompletion,
}

/// Failure fetching base data from the upstream feed or the article
/// summarization collaborator. Distinguishes "unreachable" from
/// "responded badly" from "sent something we cannot decode" so tests and
/// logs can tell an outage from a schema change.
#[derive(Debug, Error)]
pub enum UpstreamFetchError {
    #[error("upstream request failed")]
    Transport(#[source] reqwest::Error),

    #[error("upstream responded with status {0}")]
    Status(u16),

    #[error("upstream returned an undecodable body")]
    Malformed(#[source] reqwest::Error),
}

/// Failure while relaying an image through the token indirection.
///
/// Display strings deliberately never contain the decoded origin URL;
/// these messages are what a client may end up seeing.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("origin fetch failed")]
    Fetch(#[source] reqwest::Error),

    #[error("origin responded with status {0}")]
    Status(u16),
}

/// Client-facing request failure. Maps the domain errors onto the HTTP
/// surface: missing fields are 400 plain text, everything else is a
/// generic 500 with no internal detail.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("failed to assemble news batch")]
    Upstream(Arc<UpstreamFetchError>),

    #[error("image relay failed")]
    Relay(#[from] RelayError),
}

impl From<UpstreamFetchError> for ApiError {
    fn from(e: UpstreamFetchError) -> Self {
        ApiError::Upstream(Arc::new(e))
    }
}

impl From<Arc<UpstreamFetchError>> for ApiError {
    fn from(e: Arc<UpstreamFetchError>) -> Self {
        ApiError::Upstream(e)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'static> {
        let (status, content_type, body) = match &self {
            ApiError::MissingField(_) => {
                (Status::BadRequest, ContentType::Plain, self.to_string())
            }
            ApiError::Upstream(inner) => {
                error!(cause = %inner, "news batch assembly failed");
                let payload = serde_json::json!({ "error": self.to_string() });
                (Status::InternalServerError, ContentType::JSON, payload.to_string())
            }
            // Plain text, and never the decoded origin URL.
            ApiError::Relay(inner) => {
                error!(cause = %inner, "image relay failed");
                (Status::InternalServerError, ContentType::Plain, self.to_string())
            }
        };

        Response::build()
            .status(status)
            .header(content_type)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
