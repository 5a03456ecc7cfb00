use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to build HTTP client: {source}"))]
    BuildClient { source: reqwest::Error },

    #[snafu(display("Invalid URL: {source}"))]
    InvalidUrl { source: url::ParseError },

    #[snafu(display("Failed to send request: {source}"))]
    Request { source: reqwest::Error },

    #[snafu(display("Explorer answered HTTP {status}: {body}"))]
    Status { status: u16, body: String },

    #[snafu(display("Failed to parse response: {source}"))]
    ParseResponse {
        source: serde_json::Error,
        body: String,
    },

    #[snafu(display("Explorer rejected the request: {message}"))]
    Api { message: String, raw: String },

    #[snafu(display("Unknown explorer method {method:?}"))]
    UnknownMethod { method: String },
}

impl Error {
    /// Raw response body attached to the error, when the explorer answered.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Status { body, .. } | Error::ParseResponse { body, .. } => Some(body),
            Error::Api { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
