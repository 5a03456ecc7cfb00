use std::time::Duration;

use common::{retry_with_backoff, RetryError};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::error::{
    ApiSnafu, BuildClientSnafu, Error, ParseResponseSnafu, RequestSnafu, Result, StatusSnafu,
};

/// Transport settings shared by every explorer client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Upper bound for a single HTTP exchange
    pub timeout: Duration,
    /// First delay between retries of a transient failure
    pub initial_backoff: Duration,
    /// Retrying stops once this much time has passed since the first attempt
    pub max_retry_elapsed: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            initial_backoff: Duration::from_millis(500),
            max_retry_elapsed: Duration::from_secs(30),
        }
    }
}

/// How an explorer-level JSON answer should be treated.
pub(crate) enum Verdict {
    Accept,
    Retry(String),
    Reject(String),
}

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: Client,
    options: ClientOptions,
}

impl HttpClient {
    pub(crate) fn new(options: ClientOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .context(BuildClientSnafu)?;

        Ok(Self { client, options })
    }

    /// GET `url` and parse the body as JSON, letting `verdict` decide whether
    /// the explorer accepted the request.
    pub(crate) async fn get_json<F>(&self, url: &Url, verdict: F) -> Result<Value>
    where
        F: Fn(&Value) -> Verdict,
    {
        debug!(path = url.path(), "explorer GET");
        self.with_retry(|| async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(transport_error)?;
            let body = read_body(response).await?;

            let value: Value = serde_json::from_str(&body)
                .context(ParseResponseSnafu { body: body.clone() })
                .map_err(RetryError::permanent)?;

            match verdict(&value) {
                Verdict::Accept => Ok(value),
                Verdict::Retry(message) => {
                    warn!(path = url.path(), %message, "explorer asked to retry");
                    Err(RetryError::transient(
                        ApiSnafu { message, raw: body }.build(),
                    ))
                }
                Verdict::Reject(message) => Err(RetryError::permanent(
                    ApiSnafu { message, raw: body }.build(),
                )),
            }
        })
        .await
    }

    /// POST a plain-text body and return the plain-text answer.
    pub(crate) async fn post_text(&self, url: &Url, body: String) -> Result<String> {
        debug!(path = url.path(), "explorer POST");
        self.with_retry(|| async {
            let response = self
                .client
                .post(url.clone())
                .body(body.clone())
                .send()
                .await
                .map_err(transport_error)?;
            read_body(response).await
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, RetryError<Error>>>,
    {
        retry_with_backoff(
            self.options.initial_backoff,
            self.options.max_retry_elapsed,
            operation,
        )
        .await
    }
}

fn transport_error(error: reqwest::Error) -> RetryError<Error> {
    let retryable = error.is_timeout() || error.is_connect() || error.is_request();
    let error = Error::Request { source: error };
    if retryable {
        RetryError::transient(error)
    } else {
        RetryError::permanent(error)
    }
}

/// Read the body of a response, classifying HTTP failures. Rate limiting and
/// server errors are transient, other non-success codes are permanent.
async fn read_body(response: reqwest::Response) -> Result<String, RetryError<Error>> {
    let status = response.status();
    let body = response
        .text()
        .await
        .context(RequestSnafu)
        .map_err(RetryError::transient)?;

    if status.is_success() {
        return Ok(body);
    }

    let error = StatusSnafu {
        status: status.as_u16(),
        body,
    }
    .build();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(RetryError::transient(error))
    } else {
        Err(RetryError::permanent(error))
    }
}
