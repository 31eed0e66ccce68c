//! HTTP transport thread backing the `fetch` binding.
//!
//! Network I/O never runs on the isolate thread. A dedicated thread owns a
//! single-threaded async runtime and an HTTP client; jobs arrive over a
//! channel and each finished request reports back through its
//! [`CompletionHandle`].

use crate::runtime::error::HostError;
use crate::runtime::tasks::CompletionHandle;
use serde::Serialize;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One queued HTTP request and the reporter for its outcome.
#[derive(Debug)]
pub struct FetchJob {
    pub url: String,
    pub done: CompletionHandle,
}

/// Successful response, as handed back to script.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Owner of the transport thread. Dropping (or calling
/// [`shutdown`](Self::shutdown)) closes the job channel and joins the
/// thread; jobs already queued still run to completion first.
pub struct TransportHandle {
    jobs: Option<UnboundedSender<FetchJob>>,
    thread: Option<JoinHandle<()>>,
}

impl TransportHandle {
    pub(crate) fn sender(&self) -> UnboundedSender<FetchJob> {
        self.jobs
            .as_ref()
            .expect("transport handle already shut down")
            .clone()
    }

    pub fn shutdown(&mut self) {
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("transport thread panicked");
            }
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start the transport thread and wait for it to come up.
pub(crate) fn spawn() -> Result<TransportHandle, HostError> {
    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel::<FetchJob>();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

    let thread = std::thread::Builder::new()
        .name("balus-transport".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = ready_tx.send(Err(err.to_string()));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));
            runtime.block_on(serve(jobs_rx));
        })
        .map_err(|err| HostError::Transport(format!("cannot spawn transport thread: {err}")))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(TransportHandle {
            jobs: Some(jobs_tx),
            thread: Some(thread),
        }),
        Ok(Err(err)) => Err(HostError::Transport(format!(
            "cannot start transport runtime: {err}"
        ))),
        Err(_) => Err(HostError::Transport(
            "transport thread exited during startup".to_string(),
        )),
    }
}

async fn serve(mut jobs: mpsc::UnboundedReceiver<FetchJob>) {
    let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(err) => {
            // Without a client every job can only fail; drain and reject.
            let reason = format!("cannot build http client: {err}");
            error!("{reason}");
            while let Some(job) = jobs.recv().await {
                job.done.reject(reason.clone());
            }
            return;
        }
    };

    // Outcomes must be reported even when the job channel closes mid-flight,
    // so in-flight requests are drained before the runtime goes away.
    let mut inflight = tokio::task::JoinSet::new();
    while let Some(job) = jobs.recv().await {
        debug!(url = %job.url, "fetch started");
        let client = client.clone();
        inflight.spawn(async move {
            match send_request(&client, &job.url).await {
                Ok(response) => job.done.resolve(response),
                Err(reason) => job.done.reject(reason),
            }
        });
    }
    while inflight.join_next().await.is_some() {}
    debug!("transport thread shutting down");
}

async fn send_request(client: &reqwest::Client, url: &str) -> Result<FetchResponse, String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| format!("Error: {err}"))?;
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .map_err(|err| format!("Error: {err}"))?;
    Ok(FetchResponse { url, status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::tasks::Completion;

    #[test]
    fn test_unreachable_host_rejects_job() {
        let transport = spawn().unwrap();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let done = crate::runtime::tasks::test_handle(7, done_tx);

        transport
            .sender()
            .send(FetchJob {
                // Port 1 is reserved and nothing listens on it.
                url: "http://127.0.0.1:1/".to_string(),
                done,
            })
            .unwrap();

        let completion = done_rx.blocking_recv().unwrap();
        assert_eq!(completion.id, 7);
        let reason = completion.outcome.unwrap_err();
        assert!(reason.starts_with("Error:"), "reason: {reason}");
    }

    #[test]
    fn test_shutdown_waits_for_inflight_jobs() {
        let transport = spawn().unwrap();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let done = crate::runtime::tasks::test_handle(3, done_tx);

        transport
            .sender()
            .send(FetchJob {
                url: "http://127.0.0.1:1/".to_string(),
                done,
            })
            .unwrap();
        drop(transport);

        // The join in shutdown happens after the outcome is reported, so the
        // completion is already in the channel.
        let completion = done_rx.try_recv().unwrap();
        assert_eq!(completion.id, 3);
        assert!(completion.outcome.is_err());
    }

    #[test]
    fn test_shutdown_joins_thread() {
        let mut transport = spawn().unwrap();
        transport.shutdown();
        // A second shutdown and the drop are both no-ops.
        transport.shutdown();
    }
}
