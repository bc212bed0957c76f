use std::time::Duration;

use chrono::{DateTime, Utc};
use hosh_config::PublisherConfig;
use hosh_primitives::Target;

/// Thresholds driving the fresh/in-flight/due decision.
#[derive(Clone, Debug)]
pub struct StalenessPolicy {
    /// Recheck window for scheduled targets.
    pub refresh_interval: Duration,
    /// How long a queued-but-unanswered request blocks re-queueing.
    pub in_flight_ttl: Duration,
    /// Recheck window for user-submitted targets.
    pub user_recheck_window: Duration,
}

impl StalenessPolicy {
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            refresh_interval: Duration::from_secs(config.refresh_interval),
            in_flight_ttl: Duration::from_secs(config.in_flight_ttl),
            user_recheck_window: Duration::from_secs(config.user_recheck_window),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Staleness {
    /// Checked recently enough; nothing to do.
    Fresh,
    /// A request is out and its ttl has not lapsed.
    InFlight,
    /// Needs a check this cycle.
    Due,
}

/// Classifies one target at `now`.
///
/// User-submitted targets swap the refresh window for the much shorter
/// user-recheck window, which is what makes them land near the front of the
/// queue after a submission.
pub fn evaluate(policy: &StalenessPolicy, target: &Target, now: DateTime<Utc>) -> Staleness {
    let window = if target.user_submitted {
        policy.user_recheck_window
    } else {
        policy.refresh_interval
    };

    if let Some(checked) = target.last_checked_at {
        match (now - checked).to_std() {
            Ok(age) if age < window => return Staleness::Fresh,
            // A check stamped in the future is clock skew; don't requeue.
            Err(_) => return Staleness::Fresh,
            Ok(_) => {}
        }
    }

    if let Some(queued) = target.last_queued_at {
        let still_unanswered = target
            .last_checked_at
            .map_or(true, |checked| queued > checked);
        if still_unanswered {
            let age = (now - queued).to_std().unwrap_or_default();
            if age < policy.in_flight_ttl {
                return Staleness::InFlight;
            }
        }
    }

    Staleness::Due
}
