//! Device identity resolution
//!
//! The device id is derived once at startup, either from an explicit name or
//! from the OS host name, and is immutable afterwards.

use thiserror::Error;

/// Identity resolution errors. Both are fatal at startup.
#[derive(Debug, Error, PartialEq)]
pub enum IdentityError {
    #[error("Failed to get system hostname")]
    HostnameUnavailable,
    #[error("Invalid hostname: '{0}' normalizes to an empty device id")]
    EmptyDeviceId(String),
}

/// Raw and normalized name of the device this agent represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    raw_hostname: String,
    normalized_id: String,
}

impl DeviceIdentity {
    /// Build an identity from a raw name, rejecting names that normalize to nothing
    pub fn from_raw(raw: &str) -> Result<Self, IdentityError> {
        let normalized_id = normalize_device_name(raw);
        if normalized_id.is_empty() {
            return Err(IdentityError::EmptyDeviceId(raw.to_string()));
        }

        Ok(Self {
            raw_hostname: raw.to_string(),
            normalized_id,
        })
    }

    /// Resolve from an explicit override, falling back to `lookup` for the host name
    pub fn resolve<F>(device_name: Option<&str>, lookup: F) -> Result<Self, IdentityError>
    where
        F: FnOnce() -> Result<String, IdentityError>,
    {
        match device_name {
            Some(name) => Self::from_raw(name),
            None => Self::from_raw(&lookup()?),
        }
    }

    pub fn raw_hostname(&self) -> &str {
        &self.raw_hostname
    }

    pub fn normalized_id(&self) -> &str {
        &self.normalized_id
    }
}

/// Normalize a host or device name into a topic-safe identifier.
///
/// ASCII alphanumerics, `-` and `_` are kept (lowercased), spaces and dots
/// become `-`, anything else is dropped.
pub fn normalize_device_name(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => {
                Some(c.to_ascii_lowercase())
            }
            ' ' | '.' => Some('-'),
            _ => None,
        })
        .collect()
}

/// Host name as reported by the operating system
pub fn system_hostname() -> Result<String, IdentityError> {
    sysinfo::System::host_name()
        .filter(|name| !name.trim().is_empty())
        .ok_or(IdentityError::HostnameUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn normalize_is_idempotent(name in ".*") {
            let once = normalize_device_name(&name);
            let twice = normalize_device_name(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn normalize_output_is_topic_safe(name in ".*") {
            let result = normalize_device_name(&name);
            prop_assert!(
                result.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'),
                "unexpected character in {}", result
            );
        }
    }

    #[test]
    fn test_normalize_examples() {
        assert_eq!(normalize_device_name("Gaming-PC"), "gaming-pc");
        assert_eq!(normalize_device_name("office pc.local"), "office-pc-local");
        assert_eq!(normalize_device_name("DESKTOP_01"), "desktop_01");
        assert_eq!(normalize_device_name("wörk/station#1"), "wrkstation1");
        assert_eq!(normalize_device_name(""), "");
    }

    #[test]
    fn test_empty_identity_is_rejected() {
        assert_eq!(
            DeviceIdentity::from_raw("#$%"),
            Err(IdentityError::EmptyDeviceId("#$%".to_string()))
        );
        assert!(DeviceIdentity::from_raw("").is_err());
    }

    #[test]
    fn test_resolve_prefers_override() {
        let identity = DeviceIdentity::resolve(Some("Living Room"), || {
            panic!("lookup must not run when a name is given")
        })
        .unwrap();
        assert_eq!(identity.raw_hostname(), "Living Room");
        assert_eq!(identity.normalized_id(), "living-room");
    }

    #[test]
    fn test_resolve_falls_back_to_lookup() {
        let identity = DeviceIdentity::resolve(None, || Ok("HTPC".to_string())).unwrap();
        assert_eq!(identity.normalized_id(), "htpc");

        let failed = DeviceIdentity::resolve(None, || Err(IdentityError::HostnameUnavailable));
        assert_eq!(failed, Err(IdentityError::HostnameUnavailable));
    }
}
