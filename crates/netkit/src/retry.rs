//! Backoff for API calls that fail on throttling or on eventual-consistency lag.
//!
//! Only errors whose category is [`Transient`](crate::ErrorCategory::Transient)
//! are retried; a duplicate, a missing group or a permission failure is
//! returned on the first attempt.

use crate::error::{Error, Result};
use crate::types::RetryConfig;
use std::thread;

/// Observer told about every retry before the backoff sleep.
pub trait RetryCallback: Send + Sync {
    /// `attempt` is the 1-based attempt that just failed; `delay_ms` is the
    /// wait before the next one.
    fn on_retry(&self, operation: &str, attempt: u32, max_attempts: u32, error: &Error, delay_ms: u128);
}

/// Stays silent.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _: &str, _: u32, _: u32, _: &Error, _: u128) {}
}

/// Logs each retry as a warning.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, operation: &str, attempt: u32, max_attempts: u32, error: &Error, delay_ms: u128) {
        log::warn!("{operation}: attempt {attempt}/{max_attempts} failed ({error}), retrying in {delay_ms}ms");
    }
}

/// Run `call` until it succeeds, fails permanently, or uses up
/// `config.max_attempts` (at least one call is always made).
///
/// The error of the last attempt is returned when every attempt failed.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    operation: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match call() {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if !error.is_retryable() || attempt >= max_attempts {
            return Err(error);
        }

        let delay = config.delay_for_attempt(attempt - 1);
        if let Some(cb) = callback {
            cb.on_retry(operation, attempt, max_attempts, &error, delay.as_millis());
        }
        thread::sleep(delay);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn three_quick_attempts() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    fn throttled() -> Error {
        Error::Throttled {
            message: "Rate exceeded".to_string(),
        }
    }

    #[test]
    fn test_first_success_is_returned() {
        let result = with_retry(&RetryConfig::no_retry(), None, "list", || Ok::<_, Error>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_permission_error_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(&three_quick_attempts(), None, "authorize", || {
            calls.set(calls.get() + 1);
            Err(Error::Permission {
                message: "UnauthorizedOperation".to_string(),
            })
        });

        assert!(matches!(result, Err(Error::Permission { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_duplicate_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(&three_quick_attempts(), None, "create", || {
            calls.set(calls.get() + 1);
            Err(Error::DuplicateGroup {
                name: "web".to_string(),
            })
        });

        assert!(result.unwrap_err().is_ignorable());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_throttling_clears_before_the_limit() {
        let calls = Cell::new(0);
        let result = with_retry(&three_quick_attempts(), None, "create", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(throttled()) } else { Ok("sg-1") }
        });

        assert_eq!(result.unwrap(), "sg-1");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_last_error_returned_when_attempts_run_out() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(&three_quick_attempts(), None, "list", || {
            calls.set(calls.get() + 1);
            Err(Error::Network {
                message: format!("timeout #{}", calls.get()),
            })
        });

        assert_eq!(result.unwrap_err().to_string(), "network error: timeout #3");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_zero_attempts_still_calls_once() {
        let config = RetryConfig {
            max_attempts: 0,
            ..three_quick_attempts()
        };
        let calls = Cell::new(0);
        let _: Result<()> = with_retry(&config, None, "list", || {
            calls.set(calls.get() + 1);
            Err(throttled())
        });
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_callback_sees_each_retry() {
        struct Recorder(AtomicU32);
        impl RetryCallback for Recorder {
            fn on_retry(&self, operation: &str, attempt: u32, max_attempts: u32, _: &Error, _: u128) {
                assert_eq!(operation, "list");
                assert_eq!(max_attempts, 3);
                self.0.fetch_add(attempt, Ordering::SeqCst);
            }
        }

        let recorder = Recorder(AtomicU32::new(0));
        let _: Result<()> = with_retry(&three_quick_attempts(), Some(&recorder), "list", || Err(throttled()));

        // attempts 1 and 2 are retried, attempt 3 is final
        assert_eq!(recorder.0.load(Ordering::SeqCst), 1 + 2);
    }
}
