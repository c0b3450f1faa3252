use std::collections::HashSet;

use super::AcmeError;
use crate::security::tls::normalize_host;

/// Decides which hosts the ACME manager may obtain certificates for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPolicy {
    allowed: HashSet<String>,
}

impl HostPolicy {
    /// Allow exactly the listed hosts (case-insensitive, trailing dot ignored).
    pub fn whitelist<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = hosts
            .into_iter()
            .map(|host| normalize_host(host.as_ref()))
            .filter(|host| !host.is_empty())
            .collect();
        Self { allowed }
    }

    pub fn check(&self, host: &str) -> Result<(), AcmeError> {
        if self.allowed.contains(&normalize_host(host)) {
            Ok(())
        } else {
            Err(AcmeError::HostNotAllowed(host.to_string()))
        }
    }

    /// Every allowed host, sorted.
    #[must_use]
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.allowed.iter().cloned().collect();
        hosts.sort_unstable();
        hosts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_matches_case_insensitively() {
        let policy = HostPolicy::whitelist(["Example.com", "api.example.com."]);
        assert!(policy.check("example.com").is_ok());
        assert!(policy.check("EXAMPLE.COM.").is_ok());
        assert!(policy.check("api.example.com").is_ok());
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.hosts(), vec!["api.example.com", "example.com"]);
    }

    #[test]
    fn unlisted_host_is_rejected() {
        let policy = HostPolicy::whitelist(["example.com"]);
        let err = policy.check("evil.example.com").expect_err("not listed");
        assert!(matches!(err, AcmeError::HostNotAllowed(host) if host == "evil.example.com"));
    }

    #[test]
    fn blank_entries_are_dropped() {
        let policy = HostPolicy::whitelist(["", "  "]);
        assert!(policy.is_empty());
    }
}
