//! # netkit
//!
//! Pure Rust adapter for cloud security group APIs.
//!
//! This crate provides:
//! - A narrow [`Backend`](backend::Backend) trait: list groups, create a
//!   group, authorize an ingress grant
//! - In-memory, JSON state-file and HTTP backends
//! - Error categories that separate transient failures from permanent ones
//! - A [`Client`] that retries transient failures with exponential backoff
//!
//! ## Example
//!
//! ```
//! use netkit::backend::memory::MemoryBackend;
//! use netkit::backend::Backend;
//! use netkit::{Client, Grant, RetryConfig, Scope};
//!
//! let client = Client::with_backend(Box::new(MemoryBackend::new()))
//!     .retry_config(RetryConfig::no_retry());
//!
//! let id = client.create_group("web", "web tier", Some("vpc-123")).unwrap();
//! client
//!     .authorize(&id, "tcp", 443, 443, &Grant::Cidr("0.0.0.0/0".into()))
//!     .unwrap();
//!
//! let groups = client.list_groups(&Scope::All).unwrap();
//! assert_eq!(groups[0].vpc_id.as_deref(), Some("vpc-123"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod retry;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{Grant, IpPermission, RetryConfig, Scope, SecurityGroup};

use backend::Backend;
use retry::{LogCallback, RetryCallback};

/// High-level client wrapping a backend with retry logic.
///
/// The client itself implements [`Backend`], so the reconciler can use it
/// anywhere a plain backend is accepted.
pub struct Client {
    backend: Box<dyn Backend>,
    retry: RetryConfig,
    callback: Box<dyn RetryCallback>,
}

impl Client {
    /// Create a client around a backend, with default retry settings.
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
            callback: Box::new(LogCallback),
        }
    }

    /// Replace the retry configuration.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Replace the retry callback.
    pub fn retry_callback(mut self, callback: Box<dyn RetryCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// The active retry configuration.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

impl Backend for Client {
    fn list_groups(&self, scope: &Scope) -> Result<Vec<SecurityGroup>> {
        retry::with_retry(&self.retry, Some(self.callback.as_ref()), "list_groups", || {
            self.backend.list_groups(scope)
        })
    }

    fn create_group(&self, name: &str, description: &str, vpc_id: Option<&str>) -> Result<String> {
        retry::with_retry(&self.retry, Some(self.callback.as_ref()), "create_group", || {
            self.backend.create_group(name, description, vpc_id)
        })
    }

    fn authorize(
        &self,
        group_id: &str,
        protocol: &str,
        from_port: u16,
        to_port: u16,
        grant: &Grant,
    ) -> Result<()> {
        retry::with_retry(&self.retry, Some(self.callback.as_ref()), "authorize", || {
            self.backend
                .authorize(group_id, protocol, from_port, to_port, grant)
        })
    }

    fn name(&self) -> &'static str {
        self.backend.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Backend that throttles a fixed number of calls before succeeding.
    struct Flaky {
        remaining_failures: Mutex<u32>,
    }

    impl Backend for Flaky {
        fn list_groups(&self, _scope: &Scope) -> Result<Vec<SecurityGroup>> {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Throttled {
                    message: "Rate exceeded".into(),
                });
            }
            Ok(Vec::new())
        }

        fn create_group(&self, _: &str, _: &str, _: Option<&str>) -> Result<String> {
            Err(Error::Permission {
                message: "denied".into(),
            })
        }

        fn authorize(&self, _: &str, _: &str, _: u16, _: u16, _: &Grant) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::new(3, Duration::from_millis(1), 1.0)
    }

    #[test]
    fn test_client_retries_transient_errors() {
        let client = Client::with_backend(Box::new(Flaky {
            remaining_failures: Mutex::new(2),
        }))
        .retry_config(fast_retry());

        assert!(client.list_groups(&Scope::All).is_ok());
    }

    #[test]
    fn test_client_gives_up_after_max_attempts() {
        let client = Client::with_backend(Box::new(Flaky {
            remaining_failures: Mutex::new(5),
        }))
        .retry_config(fast_retry());

        let err = client.list_groups(&Scope::All).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_does_not_retry_permanent_errors() {
        let client = Client::with_backend(Box::new(Flaky {
            remaining_failures: Mutex::new(0),
        }))
        .retry_config(fast_retry());

        let err = client.create_group("web", "web", None).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Permission);
        assert_eq!(client.name(), "flaky");
    }
}
