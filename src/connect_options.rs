//! Public, engine-agnostic connection parameters.
//!
//! This type intentionally contains no engine-specific concepts (e.g.
//! rumqttc's `MqttOptions`). Engines are responsible for interpreting these
//! parameters into concrete connection settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Error, Result};

/// MQTT protocol version selector.
///
/// The numeric values match the protocol's own version enumeration, so
/// configuration files can carry the bare number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProtocolVersion {
    /// Let the engine pick (3.1.1 for every bundled engine).
    #[default]
    Default,
    /// MQTT 3.1
    V3_1,
    /// MQTT 3.1.1
    V3_1_1,
    /// MQTT 5.0
    V5,
}

impl From<ProtocolVersion> for u8 {
    fn from(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::Default => 0,
            ProtocolVersion::V3_1 => 3,
            ProtocolVersion::V3_1_1 => 4,
            ProtocolVersion::V5 => 5,
        }
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Default),
            3 => Ok(Self::V3_1),
            4 => Ok(Self::V3_1_1),
            5 => Ok(Self::V5),
            other => Err(Error::UnsupportedProtocol(other)),
        }
    }
}

/// Connection parameters for a single connect attempt.
///
/// All fields have defaults, so partial configuration files deserialize
/// cleanly:
///
/// ```
/// use mom_mqtt::{ConnectOptions, ProtocolVersion};
///
/// let options = ConnectOptions::default()
///     .with_keep_alive_secs(30)
///     .with_credentials("sensor", "s3cret")
///     .with_protocol(ProtocolVersion::V3_1_1);
///
/// assert_eq!(options.keep_alive_secs, 30);
/// assert_eq!(options.connect_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    // ---
    /// Keep-alive interval in seconds (0 to disable).
    pub keep_alive_secs: u16,

    /// Optional username. An empty string is treated as absent.
    pub username: Option<String>,

    /// Optional password. An empty string is treated as absent, and a
    /// password without a username is never sent.
    pub password: Option<String>,

    /// Upper bound on a connect attempt in seconds (0 = engine default).
    pub connect_timeout_secs: u32,

    /// Pause between reconnect polls after a broker disconnect, in seconds
    /// (0 = engine default).
    pub retry_interval_secs: u32,

    /// Protocol version selector.
    pub protocol: ProtocolVersion,
}

impl Default for ConnectOptions {
    /// - `keep_alive_secs`: 60
    /// - `connect_timeout_secs`: 30
    /// - `retry_interval_secs`: 0
    /// - `protocol`: `ProtocolVersion::Default`
    fn default() -> Self {
        Self {
            keep_alive_secs: 60,
            username: None,
            password: None,
            connect_timeout_secs: 30,
            retry_interval_secs: 0,
            protocol: ProtocolVersion::Default,
        }
    }
}

impl ConnectOptions {
    /// Set the keep-alive interval.
    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Set username and password.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout_secs(mut self, secs: u32) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Set the reconnect pause.
    pub fn with_retry_interval_secs(mut self, secs: u32) -> Self {
        self.retry_interval_secs = secs;
        self
    }

    /// Set the protocol version selector.
    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive_secs))
    }

    /// `None` when no adapter-side deadline applies.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(u64::from(self.connect_timeout_secs)))
    }

    pub fn retry_interval(&self) -> Option<Duration> {
        (self.retry_interval_secs > 0).then(|| Duration::from_secs(u64::from(self.retry_interval_secs)))
    }

    /// Username to send, if any.
    pub fn effective_username(&self) -> Option<&str> {
        self.username.as_deref().filter(|u| !u.is_empty())
    }

    /// Password to send, if any. Only meaningful alongside a username.
    pub fn effective_password(&self) -> Option<&str> {
        self.effective_username()?;
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_defaults() {
        // ---
        let options = ConnectOptions::default();
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
        assert_eq!(options.connect_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(options.retry_interval(), None);
        assert_eq!(options.protocol, ProtocolVersion::Default);
        assert!(options.effective_username().is_none());
    }

    #[test]
    fn test_zero_timeout_means_no_deadline() {
        // ---
        let options = ConnectOptions::default().with_connect_timeout_secs(0);
        assert_eq!(options.connect_timeout(), None);
    }

    #[test]
    fn test_empty_credentials_are_absent() {
        // ---
        let options = ConnectOptions::default().with_credentials("", "pw");
        assert_eq!(options.effective_username(), None);
        assert_eq!(options.effective_password(), None);

        let options = ConnectOptions::default().with_credentials("user", "");
        assert_eq!(options.effective_username(), Some("user"));
        assert_eq!(options.effective_password(), None);
    }

    #[test]
    fn test_protocol_selector_conversion() {
        // ---
        assert_eq!(ProtocolVersion::try_from(0).unwrap(), ProtocolVersion::Default);
        assert_eq!(ProtocolVersion::try_from(3).unwrap(), ProtocolVersion::V3_1);
        assert_eq!(ProtocolVersion::try_from(4).unwrap(), ProtocolVersion::V3_1_1);
        assert_eq!(ProtocolVersion::try_from(5).unwrap(), ProtocolVersion::V5);
        assert!(matches!(
            ProtocolVersion::try_from(7),
            Err(Error::UnsupportedProtocol(7))
        ));
        assert_eq!(u8::from(ProtocolVersion::V5), 5);
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        // ---
        let options: ConnectOptions =
            serde_json::from_str(r#"{ "keep_alive_secs": 15, "protocol": 4 }"#).unwrap();

        assert_eq!(options.keep_alive_secs, 15);
        assert_eq!(options.protocol, ProtocolVersion::V3_1_1);
        assert_eq!(options.connect_timeout_secs, 30);
        assert_eq!(options.username, None);
    }

    #[test]
    fn test_unknown_protocol_rejected_on_deserialize() {
        // ---
        let result: std::result::Result<ConnectOptions, _> =
            serde_json::from_str(r#"{ "protocol": 9 }"#);
        assert!(result.is_err());
    }
}
