//! Retry policy and the submission state machine.
//!
//! [`RetryPolicy`] decides how many attempts a logical request gets, which
//! HTTP statuses are worth another try, and how long to wait in between.
//! [`SubmitState`] is the explicit lifecycle the executor walks through:
//!
//! ```text
//! Pending ──► Attempting(1) ──► Succeeded
//!                 │   ▲    └──► Failed      (non-retryable status)
//!                 ▼   │
//!             Retrying{k+1} ──► ... ──► Exhausted
//! ```

use std::time::Duration;

/// Retry configuration for one logical request.
///
/// # Example
///
/// ```
/// use heat_analysis_client::transport::backoff::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::standard();
/// assert_eq!(policy.delay_before(1), Duration::ZERO);
/// assert_eq!(policy.delay_before(2), Duration::from_secs(1));
/// assert_eq!(policy.delay_before(3), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Must be at least 1.
    pub max_attempts: u32,

    /// Delay before the second attempt. Default: 1 second.
    pub base_delay: Duration,

    /// Growth factor applied per further attempt. Default: 2.0.
    pub multiplier: f64,

    /// Optional upper bound on a single delay.
    pub max_delay: Option<Duration>,

    /// Jitter strategy. Default: None, so delays are exact.
    pub jitter: JitterStrategy,

    /// HTTP statuses that trigger a retry.
    /// Default: `[408, 429, 500, 502, 503, 504]`.
    pub retryable_statuses: Vec<u16>,
}

/// Jitter applied on top of the computed backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// Delay is exactly the computed value.
    None,
    /// Random value in `[0, delay]`.
    Full,
    /// `delay/2 + random in [0, delay/2]`.
    Equal,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::standard()
        }
    }

    /// 3 attempts, 1s base delay, ×2 backoff, retry on 408/429/5xx gateway codes.
    pub fn standard() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: None,
            jitter: JitterStrategy::None,
            retryable_statuses: vec![408, 429, 500, 502, 503, 504],
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait before 1-indexed `attempt`.
    ///
    /// Zero before attempt 1, `base_delay * multiplier^(attempt - 2)` after
    /// that, capped at `max_delay` when set.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(i32::MAX as u32) as i32;
        let mut secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if let Some(cap) = self.max_delay {
            secs = secs.min(cap.as_secs_f64());
        }
        if !secs.is_finite() || secs < 0.0 {
            secs = self.max_delay.map(|d| d.as_secs_f64()).unwrap_or(0.0);
        }

        let jittered = match self.jitter {
            JitterStrategy::None => secs,
            JitterStrategy::Full => fastrand::f64() * secs,
            JitterStrategy::Equal => secs / 2.0 + fastrand::f64() * (secs / 2.0),
        };

        Duration::try_from_secs_f64(jittered)
            .unwrap_or_else(|_| self.max_delay.unwrap_or(Duration::MAX))
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// How a single attempt ended, as far as the state machine cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 2xx response.
    Success,
    /// Non-2xx status listed in the retryable set.
    RetryableStatus(u16),
    /// Any other non-2xx status.
    FatalStatus(u16),
    /// No response: connection failure or deadline exceeded.
    TransportError,
}

/// Inputs that drive [`SubmitState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitEvent {
    Begin,
    Completed(AttemptOutcome),
    BackoffElapsed,
}

/// Lifecycle of one logical request under a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Pending,
    /// 1-indexed attempt in flight.
    Attempting(u32),
    /// Waiting `delay` before `next_attempt`.
    Retrying { next_attempt: u32, delay: Duration },
    Succeeded,
    /// Stopped on a non-retryable status.
    Failed,
    /// Retryable failures used up every attempt.
    Exhausted,
}

impl SubmitState {
    /// Pure transition function. Events that make no sense in the current
    /// state leave it unchanged.
    pub fn transition(self, event: SubmitEvent, policy: &RetryPolicy) -> SubmitState {
        match (self, event) {
            (SubmitState::Pending, SubmitEvent::Begin) => SubmitState::Attempting(1),
            (SubmitState::Attempting(_), SubmitEvent::Completed(AttemptOutcome::Success)) => {
                SubmitState::Succeeded
            }
            (SubmitState::Attempting(_), SubmitEvent::Completed(AttemptOutcome::FatalStatus(_))) => {
                SubmitState::Failed
            }
            (SubmitState::Attempting(k), SubmitEvent::Completed(_)) => {
                if k < policy.max_attempts.max(1) {
                    SubmitState::Retrying {
                        next_attempt: k + 1,
                        delay: policy.delay_before(k + 1),
                    }
                } else {
                    SubmitState::Exhausted
                }
            }
            (SubmitState::Retrying { next_attempt, .. }, SubmitEvent::BackoffElapsed) => {
                SubmitState::Attempting(next_attempt)
            }
            (state, _) => state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmitState::Succeeded | SubmitState::Failed | SubmitState::Exhausted
        )
    }
}
