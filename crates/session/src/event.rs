//! Call-event records: ambient bookkeeping emitted on session teardown for
//! an external subsystem to persist — not a billing engine, just
//! start/answer/release/cause/duration.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEventRecord {
    pub call_ref: Option<u16>,
    pub cic: Option<u16>,
    pub sip_call_id: Option<String>,
    pub started_at: Instant,
    pub answered_at: Option<Instant>,
    pub released_at: Instant,
    pub cause: Option<u8>,
}

impl CallEventRecord {
    /// Time from session creation to release, regardless of whether the
    /// call was ever answered.
    pub fn duration(&self) -> Duration {
        self.released_at.saturating_duration_since(self.started_at)
    }

    /// Time spent in the answered (talking) state, if the call was ever
    /// answered; `None` for calls that cleared before answer.
    pub fn talk_time(&self) -> Option<Duration> {
        self.answered_at.map(|a| self.released_at.saturating_duration_since(a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_measures_start_to_release() {
        let start = Instant::now();
        let record = CallEventRecord {
            call_ref: Some(1),
            cic: None,
            sip_call_id: None,
            started_at: start,
            answered_at: None,
            released_at: start + Duration::from_secs(5),
            cause: Some(16),
        };
        assert_eq!(record.duration(), Duration::from_secs(5));
        assert_eq!(record.talk_time(), None);
    }

    #[test]
    fn talk_time_measures_answer_to_release() {
        let start = Instant::now();
        let record = CallEventRecord {
            call_ref: Some(1),
            cic: None,
            sip_call_id: None,
            started_at: start,
            answered_at: Some(start + Duration::from_secs(2)),
            released_at: start + Duration::from_secs(10),
            cause: Some(16),
        };
        assert_eq!(record.talk_time(), Some(Duration::from_secs(8)));
    }
}
