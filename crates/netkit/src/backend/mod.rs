//! Backend abstraction for security group APIs.
//!
//! The [`Backend`] trait is the narrow capability set the reconciler needs:
//! list groups, create a group, authorize one ingress grant. Implementations:
//!
//! - [`memory::MemoryBackend`] keeps everything in process (tests, rehearsals)
//! - [`file::FileBackend`] persists groups to a JSON state file
//! - [`http::HttpBackend`] talks JSON over HTTP to a networking API
//!
//! # Testing
//!
//! ```
//! use netkit::backend::{Backend, memory::MemoryBackend};
//! use netkit::{Grant, Scope};
//!
//! let backend = MemoryBackend::new();
//! let id = backend.create_group("web", "web tier", None).unwrap();
//! backend
//!     .authorize(&id, "tcp", 80, 80, &Grant::Cidr("0.0.0.0/0".into()))
//!     .unwrap();
//!
//! let groups = backend.list_groups(&Scope::All).unwrap();
//! assert_eq!(groups.len(), 1);
//! ```

pub mod file;
pub mod http;
pub mod memory;

use crate::error::Result;
use crate::types::{Grant, Scope, SecurityGroup};

/// Backend trait for security group operations.
pub trait Backend: Send + Sync {
    /// List every group visible in the scope, with its authorized permissions.
    fn list_groups(&self, scope: &Scope) -> Result<Vec<SecurityGroup>>;

    /// Create a group and return its remote identifier.
    fn create_group(&self, name: &str, description: &str, vpc_id: Option<&str>) -> Result<String>;

    /// Authorize a single ingress grant on a group.
    fn authorize(
        &self,
        group_id: &str,
        protocol: &str,
        from_port: u16,
        to_port: u16,
        grant: &Grant,
    ) -> Result<()>;

    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn list_groups(&self, scope: &Scope) -> Result<Vec<SecurityGroup>> {
        (**self).list_groups(scope)
    }

    fn create_group(&self, name: &str, description: &str, vpc_id: Option<&str>) -> Result<String> {
        (**self).create_group(name, description, vpc_id)
    }

    fn authorize(
        &self,
        group_id: &str,
        protocol: &str,
        from_port: u16,
        to_port: u16,
        grant: &Grant,
    ) -> Result<()> {
        (**self).authorize(group_id, protocol, from_port, to_port, grant)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
