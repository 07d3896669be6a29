use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::TryStreamExt;
use rocket::http::ContentType;
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use tokio_util::io::StreamReader;

use crate::error::RelayError;
use crate::token::TokenCodec;

/// Build the client used for origin image fetches. Only the connection
/// attempt is bounded; a total-request timeout would cut long streams
/// mid-body.
pub fn relay_client(connect_timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .user_agent("Newsveil/0.1.0")
        .build()
        .context("failed to build relay client")
}

/// Origin resource ready to stream back to the client with its original
/// content type.
pub struct RelayedImage {
    content_type: Option<ContentType>,
    response: reqwest::Response,
}

/// Decode a token and open a streaming fetch of the origin resource.
///
/// The decoded URL stays server-side: every error from here on renders
/// without it.
pub async fn relay(
    client: &reqwest::Client,
    codec: &TokenCodec,
    token: &str,
) -> Result<RelayedImage, RelayError> {
    let origin = codec.decode(token)?;

    let response = client
        .get(&origin)
        .send()
        .await
        .map_err(RelayError::Fetch)?;

    let status = response.status();
    if !status.is_success() {
        return Err(RelayError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(ContentType::parse_flexible);

    Ok(RelayedImage {
        content_type,
        response,
    })
}

impl<'r> Responder<'r, 'static> for RelayedImage {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'static> {
        // Bytes pass through without buffering the payload. Dropping the
        // reader on client disconnect releases the origin connection.
        let reader = StreamReader::new(
            self.response
                .bytes_stream()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
        );

        let mut builder = Response::build();
        if let Some(ct) = self.content_type {
            builder.header(ct);
        }
        builder.streamed_body(reader);
        Ok(builder.finalize())
    }
}
