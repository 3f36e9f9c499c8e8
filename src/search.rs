//! Submit → poll → fetch for a single search job.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::api::SearchTransport;
use crate::error::{SearchError, SearchOutcome};
use crate::job::{decide, Decision};
use crate::markup::{parse_dispatch_state, parse_job_handle};
use crate::models::splunk::SearchOptions;
use crate::records::parse_results;

/// Stand-in deadline for timeouts too large to represent as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Drives one search job per `search` call over a shared transport.
///
/// The orchestrator holds no per-job state, so a single instance (or clones of
/// it) can run any number of searches concurrently.
#[derive(Clone)]
pub struct SearchOrchestrator<T> {
    transport: T,
}

impl<T: SearchTransport> SearchOrchestrator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> SearchOutcome {
        self.search_with_cancel(query, options, &CancellationToken::new())
            .await
    }

    /// Like [`search`](Self::search), but also stops when `cancel` fires.
    ///
    /// Cancellation is observed before submitting, before every poll, during
    /// the wait between polls and before fetching; no request is sent once it
    /// has been seen.
    ///
    /// The deadline is only checked before polls. A job observed as `DONE`
    /// is fetched even if the deadline passes while that poll was in flight.
    pub async fn search_with_cancel(
        &self,
        query: &str,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> SearchOutcome {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let submitted = self.transport.submit(query).await?;
        let handle = parse_job_handle(&submitted)?;
        info!("Job created successfully: {}", handle);

        let started = Instant::now();
        let deadline = started
            .checked_add(options.timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let mut polls: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                info!("Job {} abandoned: cancelled after {} polls", handle, polls);
                return Err(SearchError::Cancelled);
            }
            if Instant::now() >= deadline {
                let elapsed = started.elapsed();
                warn!("Job {} timed out after {:?} ({} polls)", handle, elapsed, polls);
                return Err(SearchError::Timeout { elapsed });
            }

            let status = self.transport.poll_status(&handle).await?;
            let state = parse_dispatch_state(&status)?;
            polls += 1;
            debug!("Job {} dispatch state {} (poll {})", handle, state, polls);

            match decide(state) {
                Decision::Succeed => break,
                Decision::Fail(state) => {
                    warn!("Job {} ended in state {}", handle, state);
                    return Err(SearchError::JobFailed(state));
                }
                Decision::Continue => {
                    let wake = Instant::now()
                        .checked_add(options.poll_interval)
                        .map_or(deadline, |wake| wake.min(deadline));
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sleep_until(wake) => {}
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            info!("Job {} done but cancelled before fetching results", handle);
            return Err(SearchError::Cancelled);
        }

        let raw = self
            .transport
            .fetch_results(&handle, &options.fields, options.max_results)
            .await?;
        let rows = parse_results(&raw)?;
        info!(
            "Job {} finished in {:?}: {} results",
            handle,
            started.elapsed(),
            rows.len()
        );
        Ok(rows)
    }
}
