//! HTTP/JSON backend.
//!
//! Talks to a networking API exposing three endpoints:
//!
//! - `GET  {base}/security-groups[?vpc_id=..][&next_token=..]`
//! - `POST {base}/security-groups` with `{name, description, vpc_id}`
//! - `POST {base}/security-groups/{id}/ingress` with one grant
//!
//! Listings are paginated through `next_token`. Requests carry a bearer
//! token when one is configured. Retries are not done here; wrap the
//! backend in a [`crate::Client`] for that.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Grant, Scope, SecurityGroup};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on listing pages, guards against a server that never stops paging.
const MAX_PAGES: usize = 1000;

/// HTTP backend.
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    security_groups: Vec<SecurityGroup>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vpc_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct IngressRequest<'a> {
    protocol: &'a str,
    from_port: u16,
    to_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    cidr: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_group_id: Option<&'a str>,
}

impl HttpBackend {
    /// Create a backend for the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a backend with a custom global request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn groups_url(&self) -> String {
        format!("{}/security-groups", self.base_url)
    }

    fn ingress_url(&self, group_id: &str) -> String {
        format!("{}/security-groups/{}/ingress", self.base_url, group_id)
    }

    fn auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {t}"))
    }
}

impl Backend for HttpBackend {
    fn list_groups(&self, scope: &Scope) -> Result<Vec<SecurityGroup>> {
        let mut groups = Vec::new();
        let mut next_token: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut request = self
                .agent
                .get(&self.groups_url())
                .header("Accept", "application/json");
            if let Some(auth) = self.auth_header() {
                request = request.header("Authorization", &auth);
            }
            if let Scope::Vpcs(vpcs) = scope {
                for vpc in vpcs {
                    request = request.query("vpc_id", vpc);
                }
            }
            if let Some(token) = &next_token {
                request = request.query("next_token", token);
            }

            let response: ListResponse = request.call()?.body_mut().read_json()?;
            log::debug!(
                "Listed page {} with {} groups from {}",
                page + 1,
                response.security_groups.len(),
                self.base_url
            );
            groups.extend(
                response
                    .security_groups
                    .into_iter()
                    .filter(|g| scope.contains(g.vpc_id.as_deref())),
            );

            match response.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => return Ok(groups),
            }
        }

        log::warn!("Stopped listing after {MAX_PAGES} pages");
        Ok(groups)
    }

    fn create_group(&self, name: &str, description: &str, vpc_id: Option<&str>) -> Result<String> {
        let mut request = self
            .agent
            .post(&self.groups_url())
            .header("Accept", "application/json");
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }

        let response: CreateResponse = request
            .send_json(&CreateRequest {
                name,
                description,
                vpc_id,
            })
            .map_err(|e| match Error::from(e) {
                Error::DuplicateRule { .. } => Error::DuplicateGroup {
                    name: name.to_string(),
                },
                other => other,
            })?
            .body_mut()
            .read_json()?;
        Ok(response.id)
    }

    fn authorize(
        &self,
        group_id: &str,
        protocol: &str,
        from_port: u16,
        to_port: u16,
        grant: &Grant,
    ) -> Result<()> {
        let mut request = self
            .agent
            .post(&self.ingress_url(group_id))
            .header("Accept", "application/json");
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }

        let (cidr, source_group_id) = match grant {
            Grant::Cidr(cidr) => (Some(cidr.as_str()), None),
            Grant::SourceGroup(id) => (None, Some(id.as_str())),
        };
        request
            .send_json(&IngressRequest {
                protocol,
                from_port,
                to_port,
                cidr,
                source_group_id,
            })
            .map_err(|e| Error::from(e).for_group(group_id))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
