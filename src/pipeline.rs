use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::decoder;
use crate::error::{GenerationError, Result};
use crate::logger;
use crate::models::{
    GenerationOutput, GenerationRequest, ImageSource, Stage, DEFAULT_IMAGE_MODEL,
};
use crate::openai::{self, ParsedResponse, SerializedRequest, TransportClient};

/// The caller-side view of one run: identity, progress, cancellation and
/// the single terminal result.
pub struct RequestHandle {
    id: Uuid,
    cancel: CancellationToken,
    stage: watch::Receiver<Stage>,
    result: oneshot::Receiver<Result<GenerationOutput>>,
}

impl RequestHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        *self.stage.borrow()
    }

    /// Subscribe to stage transitions; the last observed value is `Done`.
    pub fn stage_updates(&self) -> watch::Receiver<Stage> {
        self.stage.clone()
    }

    /// Request cancellation. A no-op once the run has reached `Done`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Await the terminal result. Consumes the handle so the result is
    /// delivered exactly once.
    pub async fn result(self) -> Result<GenerationOutput> {
        self.result.await.unwrap_or(Err(GenerationError::Cancelled))
    }
}

// Owned by the pipeline; callers only ever see the handle.
struct InFlightRequest {
    cancel: CancellationToken,
    created_at: DateTime<Utc>,
    stage: watch::Receiver<Stage>,
}

pub struct GenerationPipeline {
    config: Arc<Config>,
    transport: TransportClient,
    in_flight: Arc<Mutex<HashMap<Uuid, InFlightRequest>>>,
}

impl GenerationPipeline {
    pub fn new(config: Config) -> Result<Self> {
        let transport = TransportClient::new(&config.pipeline)?;
        Ok(Self {
            config: Arc::new(config),
            transport,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Kick off one generation run. Validation failures and the in-flight
    /// bound reject synchronously; everything after that is reported
    /// through the returned handle.
    pub fn start(&self, request: GenerationRequest) -> Result<RequestHandle> {
        let serialized = openai::build(&request, &self.config)?;

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (stage_tx, stage_rx) = watch::channel(Stage::Idle);
        let (result_tx, result_rx) = oneshot::channel();

        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let limit = self.config.pipeline.max_in_flight;
            if in_flight.len() >= limit {
                log::warn!("Rejecting generation start, {} request(s) already in flight", limit);
                return Err(GenerationError::Overloaded(limit));
            }
            in_flight.insert(
                id,
                InFlightRequest {
                    cancel: cancel.clone(),
                    created_at: Utc::now(),
                    stage: stage_rx.clone(),
                },
            );
        }

        log::info!(
            "Starting generation {} ({} image(s) at {})",
            id,
            request.count,
            request.size.as_str()
        );

        let worker = Worker {
            id,
            config: Arc::clone(&self.config),
            transport: self.transport.clone(),
            request,
            serialized,
            cancel: cancel.clone(),
            stage: stage_tx,
        };
        let registry = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let timer = logger::timer(&format!("generation {}", worker.id));
            let result = worker.execute().await;
            timer.stop();

            registry.lock().unwrap().remove(&worker.id);
            let _ = worker.stage.send(Stage::Done);

            match &result {
                Ok(output) => log::info!(
                    "Generation {} finished with {} image(s)",
                    worker.id,
                    output.images.len()
                ),
                Err(e) => log::warn!("Generation {} failed ({}): {}", worker.id, e.kind(), e),
            }
            let _ = result_tx.send(result);
        });

        Ok(RequestHandle {
            id,
            cancel,
            stage: stage_rx,
            result: result_rx,
        })
    }

    pub fn cancel(&self, handle: &RequestHandle) {
        log::info!("Cancelling generation {}", handle.id());
        handle.cancel();
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Snapshot of the active runs as (id, stage, created-at) rows.
    pub fn active_requests(&self) -> Vec<(Uuid, Stage, DateTime<Utc>)> {
        self.in_flight
            .lock()
            .unwrap()
            .iter()
            .map(|(id, entry)| (*id, *entry.stage.borrow(), entry.created_at))
            .collect()
    }

    /// Cancel every active run, e.g. when the hosting panel closes.
    pub fn cancel_all(&self) {
        for entry in self.in_flight.lock().unwrap().values() {
            entry.cancel.cancel();
        }
    }
}

struct Worker {
    id: Uuid,
    config: Arc<Config>,
    transport: TransportClient,
    request: GenerationRequest,
    serialized: SerializedRequest,
    cancel: CancellationToken,
    stage: watch::Sender<Stage>,
}

impl Worker {
    async fn execute(&self) -> Result<GenerationOutput> {
        if self.cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        let _ = self.stage.send(Stage::Submitting);
        let limits = &self.config.pipeline;

        let _ = self.stage.send(Stage::AwaitingResponse);
        let (status, body) = self
            .transport
            .send(&self.serialized, limits.request_timeout, &self.cancel)
            .await?;
        log::debug!(
            "Generation {} got status {} ({} byte body)",
            self.id,
            status,
            body.len()
        );

        let (sources, created, revised_prompts) = match openai::parse(status, &body)? {
            ParsedResponse::Images {
                sources,
                created,
                revised_prompts,
            } => (sources, created, revised_prompts),
            ParsedResponse::ProviderError { code, message } => {
                return Err(GenerationError::Provider { code, message });
            }
        };

        if sources.len() != self.request.count as usize {
            log::warn!(
                "Generation {}: provider returned {} image(s), {} requested",
                self.id,
                sources.len(),
                self.request.count
            );
        }

        let mut payloads = Vec::with_capacity(sources.len());
        for source in sources {
            match source {
                ImageSource::Bytes(bytes) => payloads.push(bytes),
                ImageSource::Url(url) => {
                    let _ = self.stage.send(Stage::FetchingImage);
                    log::debug!("Generation {} downloading image from provider URL", self.id);
                    let bytes = self
                        .transport
                        .fetch_image(
                            &url,
                            limits.download_timeout,
                            limits.max_download_bytes,
                            &self.cancel,
                        )
                        .await?;
                    payloads.push(bytes);
                }
            }
        }

        // Decoding never suspends, so honor a cancellation that landed
        // during the network stages before burning CPU on it.
        if self.cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        let _ = self.stage.send(Stage::Decoding);
        let mut images = Vec::with_capacity(payloads.len());
        for bytes in payloads {
            let decoded = tokio::task::spawn_blocking(move || decoder::decode(&bytes))
                .await
                .map_err(|e| GenerationError::Decode(e.to_string()))??;
            images.push(decoded);
        }

        let model = self
            .request
            .model
            .as_deref()
            .or(self.config.provider.model.as_deref())
            .unwrap_or(DEFAULT_IMAGE_MODEL)
            .to_string();

        Ok(GenerationOutput {
            images,
            model,
            created,
            revised_prompts,
        })
    }
}
