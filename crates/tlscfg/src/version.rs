//! Protocol version names and range resolution

use crate::error::{Result, TlsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TLS protocol version, ordered from oldest to newest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TlsVersion {
    /// TLS 1.0
    #[serde(rename = "1.0")]
    Tls10,
    /// TLS 1.1
    #[serde(rename = "1.1")]
    Tls11,
    /// TLS 1.2
    #[serde(rename = "1.2")]
    Tls12,
    /// TLS 1.3
    #[serde(rename = "1.3")]
    Tls13,
}

/// A version string that names no known TLS version
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tls version \"{0}\"")]
pub struct UnknownVersion(pub String);

impl TlsVersion {
    /// Every known version, oldest first
    pub const ALL: [TlsVersion; 4] = [
        TlsVersion::Tls10,
        TlsVersion::Tls11,
        TlsVersion::Tls12,
        TlsVersion::Tls13,
    ];

    /// Version name as written in options, e.g. `"1.2"`
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "1.0",
            TlsVersion::Tls11 => "1.1",
            TlsVersion::Tls12 => "1.2",
            TlsVersion::Tls13 => "1.3",
        }
    }

    /// Wire constant for this version
    pub fn protocol_version(&self) -> rustls::ProtocolVersion {
        match self {
            TlsVersion::Tls10 => rustls::ProtocolVersion::TLSv1_0,
            TlsVersion::Tls11 => rustls::ProtocolVersion::TLSv1_1,
            TlsVersion::Tls12 => rustls::ProtocolVersion::TLSv1_2,
            TlsVersion::Tls13 => rustls::ProtocolVersion::TLSv1_3,
        }
    }

    /// The engine's version handle, if rustls can negotiate this version
    pub fn supported(&self) -> Option<&'static rustls::SupportedProtocolVersion> {
        match self {
            TlsVersion::Tls12 => Some(&rustls::version::TLS12),
            TlsVersion::Tls13 => Some(&rustls::version::TLS13),
            TlsVersion::Tls10 | TlsVersion::Tls11 => None,
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TlsVersion {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TlsVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVersion(s.to_string()))
    }
}

/// Resolved `[min, max]` bounds. `None` leaves that side unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionRange {
    /// Lowest version to negotiate
    pub min: Option<TlsVersion>,
    /// Highest version to negotiate
    pub max: Option<TlsVersion>,
}

impl VersionRange {
    /// Resolve both bounds from their option strings.
    ///
    /// Empty or absent strings are unset. Each bound is parsed on its own
    /// before the ordering check runs.
    pub fn resolve(min: Option<&str>, max: Option<&str>) -> Result<Self> {
        let min = parse_bound(min).map_err(TlsError::MinVersion)?;
        let max = parse_bound(max).map_err(TlsError::MaxVersion)?;

        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(TlsError::VersionRange { min, max });
            }
        }

        Ok(Self { min, max })
    }

    /// Check whether `version` lies inside the range
    pub fn contains(&self, version: TlsVersion) -> bool {
        self.min.map_or(true, |min| version >= min) && self.max.map_or(true, |max| version <= max)
    }

    /// Engine versions inside the range, oldest first
    pub fn protocol_versions(&self) -> Result<Vec<&'static rustls::SupportedProtocolVersion>> {
        let versions: Vec<_> = TlsVersion::ALL
            .into_iter()
            .filter(|v| self.contains(*v))
            .filter_map(|v| v.supported())
            .collect();

        if versions.is_empty() {
            return Err(TlsError::NoSupportedVersion {
                min: self.min,
                max: self.max,
            });
        }

        Ok(versions)
    }
}

fn parse_bound(name: Option<&str>) -> std::result::Result<Option<TlsVersion>, UnknownVersion> {
    match name {
        None | Some("") => Ok(None),
        Some(name) => name.parse().map(Some),
    }
}
