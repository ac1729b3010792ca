//! Bounded, cancellable dispatch of annotation requests.
//!
//! # Responsibility
//! - Run word annotation requests on a small worker pool.
//! - Hand every outcome back to the calling thread, one at a time.
//!
//! # Invariants
//! - At most `BatchOptions::concurrency` requests are in flight.
//! - Each worker waits `BatchOptions::pacing` between two of its requests.
//! - Once cancelled, no new request starts; queued jobs are returned as
//!   cancelled.
//! - Failures never stop the batch and are never retried.

use crate::client::{AnnotateRequest, AnnotateResponse, AnnotationService};
use crate::config::BatchOptions;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Shared flag that stops a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One queued request, keyed by normalized word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub key: String,
    pub request: AnnotateRequest,
}

/// Outcome of one dispatched job.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub key: String,
    pub response: AnnotateResponse,
}

/// Runs `jobs` against `service` and feeds each outcome to `on_outcome`.
///
/// Returns the keys of jobs that never started because of cancellation.
pub fn dispatch<S, F>(
    service: &S,
    jobs: Vec<BatchJob>,
    options: &BatchOptions,
    cancel: &CancelToken,
    mut on_outcome: F,
) -> Vec<String>
where
    S: AnnotationService,
    F: FnMut(BatchOutcome),
{
    if jobs.is_empty() {
        return Vec::new();
    }

    let worker_count = options.concurrency.clamp(1, jobs.len());
    let queue = Mutex::new(jobs.into_iter().collect::<VecDeque<_>>());
    let (sender, receiver) = mpsc::channel::<BatchOutcome>();

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let sender = sender.clone();
            let queue = &queue;
            scope.spawn(move || {
                let mut first = true;
                loop {
                    if !first && !sleep_unless_cancelled(options.pacing, cancel) {
                        break;
                    }
                    if cancel.is_cancelled() {
                        break;
                    }
                    let job = match queue.lock() {
                        Ok(mut pending) => pending.pop_front(),
                        Err(_) => None,
                    };
                    let Some(job) = job else {
                        break;
                    };
                    first = false;

                    let response = service.annotate_word(&job.request);
                    if sender
                        .send(BatchOutcome {
                            key: job.key,
                            response,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            });
        }
        drop(sender);

        for outcome in receiver {
            on_outcome(outcome);
        }
    });

    match queue.into_inner() {
        Ok(remaining) => remaining.into_iter().map(|job| job.key).collect(),
        Err(poisoned) => poisoned
            .into_inner()
            .into_iter()
            .map(|job| job.key)
            .collect(),
    }
}

/// Sleeps for `duration` in short slices. Returns `false` if cancelled.
fn sleep_unless_cancelled(duration: Duration, cancel: &CancelToken) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(CANCEL_POLL_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::{dispatch, BatchJob, CancelToken};
    use crate::client::{
        AnnotateRequest, AnnotateResponse, AnnotationService, PhraseAnnotateResponse,
        PhraseRequest,
    };
    use crate::config::BatchOptions;
    use crate::model::word::Level;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingService {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        cancel_after: Option<(usize, CancelToken)>,
    }

    impl CountingService {
        fn new(cancel_after: Option<(usize, CancelToken)>) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                cancel_after,
            }
        }
    }

    impl AnnotationService for CountingService {
        fn annotate_word(&self, request: &AnnotateRequest) -> AnnotateResponse {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, token)) = &self.cancel_after {
                if calls >= *limit {
                    token.cancel();
                }
            }
            AnnotateResponse::failure(format!("no backend for {}", request.word))
        }

        fn annotate_phrase(&self, _request: &PhraseRequest) -> PhraseAnnotateResponse {
            PhraseAnnotateResponse::failure("unsupported")
        }
    }

    fn jobs(count: usize) -> Vec<BatchJob> {
        (0..count)
            .map(|index| {
                let key = format!("word{index}");
                BatchJob {
                    request: AnnotateRequest::new(key.clone(), Level::B2, None),
                    key,
                }
            })
            .collect()
    }

    #[test]
    fn never_exceeds_configured_concurrency() {
        let service = CountingService::new(None);
        let options = BatchOptions::new(2, Duration::ZERO);
        let mut seen = 0;
        let cancelled = dispatch(&service, jobs(8), &options, &CancelToken::new(), |_| seen += 1);
        assert_eq!(seen, 8);
        assert!(cancelled.is_empty());
        assert!(service.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn cancellation_stops_new_requests() {
        let token = CancelToken::new();
        let service = CountingService::new(Some((2, token.clone())));
        let options = BatchOptions::new(1, Duration::from_millis(10));
        let mut seen = 0;
        let cancelled = dispatch(&service, jobs(6), &options, &token, |_| seen += 1);
        assert_eq!(seen, 2);
        assert_eq!(cancelled.len(), 4);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn pre_cancelled_batch_dispatches_nothing() {
        let token = CancelToken::new();
        token.cancel();
        let service = CountingService::new(None);
        let cancelled = dispatch(&service, jobs(3), &BatchOptions::default(), &token, |_| {});
        assert_eq!(cancelled, vec!["word0", "word1", "word2"]);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }
}
