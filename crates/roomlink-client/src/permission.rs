//! Permission collaborator.
//!
//! Consulted with the permission address before every connection attempt. An
//! error is treated as a denial.

use async_trait::async_trait;
use url::Url;

use crate::error::PermissionError;

/// Decides whether an address may be reached.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Check `address` (already rewritten per the configured
    /// [`roomlink_core::PermissionScheme`]).
    async fn check(&self, address: &str) -> Result<bool, PermissionError>;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PermissionGate for AllowAll {
    async fn check(&self, _address: &str) -> Result<bool, PermissionError> {
        Ok(true)
    }
}

/// Grants addresses whose host is on a fixed list.
///
/// Hosts compare case-insensitively. An empty list denies everything.
#[derive(Debug, Clone, Default)]
pub struct HostAllowlist {
    hosts: Vec<String>,
}

impl HostAllowlist {
    /// Create an allowlist.
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { hosts }
    }

    /// Allowed hosts, lowercased.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }
}

#[async_trait]
impl PermissionGate for HostAllowlist {
    async fn check(&self, address: &str) -> Result<bool, PermissionError> {
        let url = Url::parse(address).map_err(|e| PermissionError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        let Some(host) = url.host_str() else {
            return Err(PermissionError::InvalidAddress {
                address: address.to_string(),
                reason: "no host".to_string(),
            });
        };
        let host = host.to_ascii_lowercase();
        let granted = self.hosts.iter().any(|allowed| *allowed == host);
        if !granted {
            tracing::debug!("Host {host} not on allowlist");
        }
        Ok(granted)
    }
}
