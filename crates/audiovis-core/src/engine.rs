//! Transform engine - a bounded job queue feeding a pool of worker lanes.
//!
//! Each lane takes one job at a time, runs it on the blocking thread pool and
//! sends the response to the job's reply channel before taking the next one.
//! Jobs carry everything they need; lanes share no mutable state, so responses
//! for concurrent requests may complete in any order and are matched by
//! request id.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::config::EngineConfig;
use crate::protocol::{decode_request, encode_response, TransformProcessor, TransformRequest, TransformResponse};
use crate::{Error, Result};

struct Job {
    request: TransformRequest,
    reply: mpsc::Sender<TransformResponse>,
}

type JobQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Handle to a running pool of transform lanes.
pub struct TransformEngine {
    queue: mpsc::Sender<Job>,
    lanes: Vec<JoinHandle<()>>,
}

impl TransformEngine {
    /// Spawn the lanes. Must be called from within a tokio runtime.
    pub fn start(config: &EngineConfig) -> Self {
        let (queue, jobs) = mpsc::channel(config.queue_capacity.max(1));
        let jobs: JobQueue = Arc::new(Mutex::new(jobs));
        let processor = TransformProcessor::new(config.fft_size);
        let lane_count = config.lane_count();

        let lanes = (0..lane_count)
            .map(|lane| tokio::spawn(run_lane(lane, jobs.clone(), processor.clone())))
            .collect();

        info!(
            lanes = lane_count,
            queue_capacity = config.queue_capacity,
            fft_size = config.fft_size,
            "Transform engine started"
        );

        Self { queue, lanes }
    }

    /// Number of worker lanes.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Queue a request; its response is delivered on `reply`.
    ///
    /// Waits while the queue is full.
    pub async fn submit(
        &self,
        request: TransformRequest,
        reply: mpsc::Sender<TransformResponse>,
    ) -> Result<()> {
        self.queue
            .send(Job { request, reply })
            .await
            .map_err(|_| Error::EngineClosed)
    }

    /// Queue a request and wait for its response.
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub async fn transform(&self, request: TransformRequest) -> Result<TransformResponse> {
        let (reply, mut response) = mpsc::channel(1);
        self.submit(request, reply).await?;
        response.recv().await.ok_or(Error::EngineClosed)
    }

    /// Handle one JSON wire message and return the JSON response.
    pub async fn transform_message(&self, message: &str) -> Result<String> {
        let response = match decode_request(message) {
            Ok(request) => self.transform(request).await?,
            Err(rejection) => rejection,
        };
        Ok(encode_response(&response))
    }

    /// Stop accepting work, let queued jobs drain, and wait for the lanes.
    pub async fn shutdown(self) {
        let TransformEngine { queue, lanes } = self;
        drop(queue);
        for lane in lanes {
            if let Err(e) = lane.await {
                error!(error = %e, "Transform lane terminated abnormally");
            }
        }
        info!("Transform engine stopped");
    }
}

async fn run_lane(lane: usize, jobs: JobQueue, processor: TransformProcessor) {
    debug!(lane, "Lane ready");

    loop {
        let job = { jobs.lock().await.recv().await };
        let Some(Job { request, reply }) = job else {
            break;
        };

        let request_id = request.request_id.clone();
        let worker = processor.clone();
        let response = match tokio::task::spawn_blocking(move || worker.process(&request)).await {
            Ok(response) => response,
            Err(e) => {
                error!(lane, request_id = %request_id, error = %e, "Transform task failed");
                TransformResponse::Error {
                    request_id,
                    error: "transform task failed".to_string(),
                }
            }
        };

        if reply.send(response).await.is_err() {
            debug!(lane, "Caller went away before the response was delivered");
        }
    }

    debug!(lane, "Lane stopped");
}
