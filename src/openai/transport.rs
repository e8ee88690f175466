use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::{GenerationError, Result};
use crate::openai::request::SerializedRequest;

/// One shared HTTP client for every run of a pipeline. Cheap to clone.
#[derive(Clone)]
pub struct TransportClient {
    http: reqwest::Client,
}

impl TransportClient {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        Ok(Self { http })
    }

    /// POST the serialized generation request. Resolves to the raw status
    /// and body; never retries. Dropping the in-flight future on
    /// cancellation aborts the underlying connection.
    pub async fn send(
        &self,
        request: &SerializedRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(u16, Vec<u8>)> {
        let mut builder = self
            .http
            .post(&request.url)
            .timeout(timeout)
            .body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let exchange = async {
            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(map_reqwest_error)?;
            Ok((status, body.to_vec()))
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(GenerationError::Cancelled),
            result = exchange => result,
        }
    }

    /// GET image bytes from the URL a generation response pointed at.
    /// The download is read in chunks so the byte cap is enforced before
    /// the whole body is in memory.
    pub async fn fetch_image(
        &self,
        url: &str,
        timeout: Duration,
        max_bytes: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let request = self.http.get(url).timeout(timeout);

        let download = async {
            let response = request.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(GenerationError::HttpStatus(status.as_u16()));
            }
            if let Some(length) = response.content_length() {
                if length as usize > max_bytes {
                    return Err(over_cap(max_bytes));
                }
            }

            let mut bytes = Vec::new();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(map_reqwest_error)?;
                if bytes.len() + chunk.len() > max_bytes {
                    return Err(over_cap(max_bytes));
                }
                bytes.extend_from_slice(&chunk);
            }
            Ok(bytes)
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(GenerationError::Cancelled),
            result = download => result,
        }
    }
}

fn map_reqwest_error(error: reqwest::Error) -> GenerationError {
    if error.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Network(error.to_string())
    }
}

fn over_cap(max_bytes: usize) -> GenerationError {
    GenerationError::Decode(format!(
        "image exceeds the {} byte download cap",
        max_bytes
    ))
}
