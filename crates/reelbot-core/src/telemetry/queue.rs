use std::sync::Arc;

use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        Mutex,
    },
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::sink::{TelemetryEvent, TelemetrySink};

/// Bounded fire-and-forget queue in front of a [`TelemetrySink`].
///
/// `record` never waits and never fails: when the queue is full the event is dropped
/// with a warning. A single background worker delivers events in order.
pub struct TelemetryQueue {
    tx: mpsc::Sender<TelemetryEvent>,
    sink: Arc<dyn TelemetrySink>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn start(sink: Arc<dyn TelemetrySink>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(rx, sink.clone(), cancel.clone()));

        Self {
            tx,
            sink,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn record(&self, event: TelemetryEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(ev)) => {
                tracing::warn!(event = ?kind(&ev), "telemetry queue full, dropping event");
            }
            Err(TrySendError::Closed(ev)) => {
                tracing::warn!(event = ?kind(&ev), "telemetry worker stopped, dropping event");
            }
        }
    }

    /// The sink behind the queue, for read-side queries such as `/stats`.
    pub fn sink(&self) -> Arc<dyn TelemetrySink> {
        self.sink.clone()
    }

    /// Stop accepting work, deliver what is already queued, and wait for the worker.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("telemetry worker ended abnormally: {e}");
            }
        }
    }
}

fn kind(ev: &TelemetryEvent) -> &'static str {
    match ev {
        TelemetryEvent::Success(_) => "success",
        TelemetryEvent::Error { .. } => "error",
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<TelemetryEvent>,
    sink: Arc<dyn TelemetrySink>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
          ev = rx.recv() => {
            let Some(ev) = ev else { break; };
            deliver(&sink, ev).await;
          }
          _ = cancel.cancelled() => {
            rx.close();
            while let Some(ev) = rx.recv().await {
              deliver(&sink, ev).await;
            }
            break;
          }
        }
    }
    tracing::debug!("telemetry worker stopped");
}

/// Deliver one event in its own task so a panicking sink cannot take the worker down.
async fn deliver(sink: &Arc<dyn TelemetrySink>, ev: TelemetryEvent) {
    let label = kind(&ev);
    let sink = sink.clone();
    let task = tokio::spawn(async move {
        match &ev {
            TelemetryEvent::Success(event) => sink.log_success(event).await,
            TelemetryEvent::Error {
                event,
                error_message,
            } => sink.log_error(event, error_message).await,
        }
    });

    match task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(event = label, "failed to record telemetry: {e}"),
        Err(e) => tracing::error!(event = label, "telemetry sink task failed: {e}"),
    }
}
