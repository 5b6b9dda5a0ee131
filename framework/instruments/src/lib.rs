mod report;
mod stats;
mod store;

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

pub use report::{ReportCollector, ReportConfig, Reporter};
pub use stats::{percentile, summarise, summarise_with_latencies};
pub use store::MetricStore;

/// Why a sample counts as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A response was received but the status was not the one the group expects.
    UnexpectedStatus,
    /// The request could not be completed, for example the connection was refused.
    Network,
    /// The request was still outstanding when the graceful stop budget ran out and was abandoned.
    Timeout,
}

/// One completed (or abandoned) request.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Shared with the request group, so recording a sample does not copy the name.
    pub group: Arc<str>,
    pub vu_id: usize,
    pub iteration: u64,
    pub latency: Duration,
    /// The response status, if a response was received.
    pub status: Option<u16>,
    pub failure: Option<FailureKind>,
    /// When the request was sent.
    pub timestamp: SystemTime,
}

impl Sample {
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Tracks a request from the moment it is sent until it is turned into a [Sample].
#[derive(Debug)]
pub struct OperationRecord {
    group: Arc<str>,
    vu_id: usize,
    iteration: u64,
    timestamp: SystemTime,
    started: Instant,
}

impl OperationRecord {
    pub fn new(group: impl Into<Arc<str>>, vu_id: usize, iteration: u64) -> Self {
        Self {
            group: group.into(),
            vu_id,
            iteration,
            timestamp: SystemTime::now(),
            started: Instant::now(),
        }
    }

    /// A response was received, check it against the expected status.
    pub fn response(self, status: u16, expected_status: u16) -> Sample {
        let failure = (status != expected_status).then_some(FailureKind::UnexpectedStatus);
        self.finish(Some(status), failure)
    }

    pub fn network_error(self) -> Sample {
        self.finish(None, Some(FailureKind::Network))
    }

    pub fn timed_out(self) -> Sample {
        self.finish(None, Some(FailureKind::Timeout))
    }

    fn finish(self, status: Option<u16>, failure: Option<FailureKind>) -> Sample {
        Sample {
            group: self.group,
            vu_id: self.vu_id,
            iteration: self.iteration,
            latency: self.started.elapsed(),
            status,
            failure,
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_status_is_a_failure() {
        let ok = OperationRecord::new("login", 0, 1).response(200, 200);
        assert!(!ok.is_failure());
        assert_eq!(Some(200), ok.status);

        let bad = OperationRecord::new("login", 0, 1).response(401, 200);
        assert_eq!(Some(FailureKind::UnexpectedStatus), bad.failure);
        assert_eq!(Some(401), bad.status);
    }

    #[test]
    fn abandoned_requests_have_no_status() {
        let sample = OperationRecord::new("contact", 3, 7).timed_out();
        assert_eq!(None, sample.status);
        assert_eq!(Some(FailureKind::Timeout), sample.failure);
        assert_eq!(3, sample.vu_id);
        assert_eq!(7, sample.iteration);
    }

    #[test]
    fn samples_share_the_group_name() {
        let name: Arc<str> = Arc::from("login");
        let first = OperationRecord::new(name.clone(), 0, 1).response(200, 200);
        let second = OperationRecord::new(name.clone(), 1, 1).network_error();

        assert!(Arc::ptr_eq(&name, &first.group));
        assert!(Arc::ptr_eq(&first.group, &second.group));
    }
}
