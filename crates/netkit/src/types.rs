//! Wire types for the security group API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A security group as reported by the networking API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    /// Remote identifier (e.g., "sg-0a1b2c3d")
    pub id: String,
    /// Group name, unique within its VPC
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// VPC the group belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    /// Authorized ingress permissions
    #[serde(default)]
    pub permissions: Vec<IpPermission>,
}

impl SecurityGroup {
    /// Create an empty group.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        vpc_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            vpc_id,
            permissions: Vec::new(),
        }
    }

    /// Check whether a single grant is already authorized.
    pub fn has_grant(&self, protocol: &str, from_port: u16, to_port: u16, grant: &Grant) -> bool {
        self.permissions.iter().any(|p| {
            p.protocol == protocol
                && p.from_port == from_port
                && p.to_port == to_port
                && p.grants.contains(grant)
        })
    }

    /// Add a grant, merging into an existing permission with the same
    /// protocol and port range.
    pub fn add_grant(&mut self, protocol: &str, from_port: u16, to_port: u16, grant: Grant) {
        if let Some(existing) = self.permissions.iter_mut().find(|p| {
            p.protocol == protocol && p.from_port == from_port && p.to_port == to_port
        }) {
            existing.grants.push(grant);
            return;
        }
        self.permissions.push(IpPermission {
            protocol: protocol.to_string(),
            from_port,
            to_port,
            grants: vec![grant],
        });
    }
}

/// One ingress permission: a protocol and port range opened to a list of grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpPermission {
    /// Protocol name ("tcp", "udp", "icmp", or "-1" for all traffic)
    pub protocol: String,
    /// First port of the range
    pub from_port: u16,
    /// Last port of the range (inclusive)
    pub to_port: u16,
    /// Sources allowed through
    #[serde(default)]
    pub grants: Vec<Grant>,
}

/// The source side of a permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    /// An address block in CIDR notation
    Cidr(String),
    /// Another security group, by remote identifier
    SourceGroup(String),
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::Cidr(cidr) => write!(f, "{cidr}"),
            Grant::SourceGroup(id) => write!(f, "{id}"),
        }
    }
}

/// Which groups a listing should return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Scope {
    /// Every group visible to the credentials
    #[default]
    All,
    /// Only groups in these VPCs
    Vpcs(Vec<String>),
}

impl Scope {
    /// Check if a group with the given VPC falls inside this scope.
    pub fn contains(&self, vpc_id: Option<&str>) -> bool {
        match self {
            Scope::All => true,
            Scope::Vpcs(vpcs) => vpc_id.is_some_and(|v| vpcs.iter().any(|s| s == v)),
        }
    }
}

/// Configuration for retry logic.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}
