//! Node version parsing and compatibility policy.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// A `MAJOR.MINOR.PATCH` node version, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Development builds report `*-SNAPSHOT`; treat them as the newest major.
pub const SNAPSHOT_VERSION: Version = Version::new(4, 0, 0);

fn version_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*v?(\d+)(?:\.(\d+))?(?:\.(\d+))?").ok())
        .as_ref()
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the leading numeric components of a version string.
    ///
    /// Missing minor/patch default to 0 and trailing pre-release text is
    /// ignored, so `"3.7"` is `3.7.0` and `"4.0.8-rc.1"` is `4.0.8`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.ends_with("-SNAPSHOT") {
            return Ok(SNAPSHOT_VERSION);
        }

        let invalid = || Error::IncompatibleVersion {
            found: raw.to_owned(),
            required: VersionPolicy::default().minimum.to_string(),
        };

        let caps = version_re()
            .and_then(|re| re.captures(raw))
            .ok_or_else(invalid)?;
        let part = |i: usize| -> Result<u32> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().map_err(|_| invalid()),
                None => Ok(0),
            }
        };

        Ok(Self::new(part(1)?, part(2)?, part(3)?))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Supported,
    /// Usable, but older than the recommended protocol.
    BelowRecommended,
}

#[derive(Debug, Clone, Copy)]
pub struct VersionPolicy {
    pub minimum: Version,
    pub recommended: Version,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self {
            minimum: Version::new(3, 7, 0),
            recommended: Version::new(4, 0, 0),
        }
    }
}

impl VersionPolicy {
    pub fn check(&self, version: Version) -> Result<Compatibility> {
        if version < self.minimum {
            return Err(Error::IncompatibleVersion {
                found: version.to_string(),
                required: self.minimum.to_string(),
            });
        }
        if version < self.recommended {
            return Ok(Compatibility::BelowRecommended);
        }
        Ok(Compatibility::Supported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_version() {
        assert_eq!(Version::parse("4.0.8").unwrap(), Version::new(4, 0, 8));
    }

    #[test]
    fn missing_parts_default_to_zero() {
        assert_eq!(Version::parse("3").unwrap(), Version::new(3, 0, 0));
        assert_eq!(Version::parse("3.7").unwrap(), Version::new(3, 7, 0));
    }

    #[test]
    fn trailing_text_is_ignored() {
        assert_eq!(Version::parse("4.1.0-rc.2").unwrap(), Version::new(4, 1, 0));
        assert_eq!(Version::parse("3.7.11_hotfix").unwrap(), Version::new(3, 7, 11));
    }

    #[test]
    fn snapshot_is_latest_major() {
        let v = Version::parse("4.0.0-SNAPSHOT").unwrap();
        assert_eq!(v.major, 4);
        let v = Version::parse("a1b2c3d-SNAPSHOT").unwrap();
        assert_eq!(v, SNAPSHOT_VERSION);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            Version::parse("unknown"),
            Err(Error::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(Version::new(3, 7, 11) < Version::new(4, 0, 0));
        assert!(Version::new(4, 0, 10) > Version::new(4, 0, 9));
        assert!(Version::new(3, 10, 0) > Version::new(3, 9, 99));
    }

    #[test]
    fn policy_rejects_below_minimum() {
        let policy = VersionPolicy::default();
        assert!(policy.check(Version::new(3, 6, 9)).is_err());
        assert_eq!(
            policy.check(Version::new(3, 7, 0)).unwrap(),
            Compatibility::BelowRecommended
        );
        assert_eq!(
            policy.check(Version::new(4, 0, 0)).unwrap(),
            Compatibility::Supported
        );
    }
}
