//! Client configuration and credential loading

use crate::{
    constants::{
        DEFAULT_AMI_PORT, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HANDSHAKE_TIMEOUT_MS,
        DEFAULT_LISTENER_IDLE_MS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SWEEP_INTERVAL_MS,
        DEFAULT_TERMINAL_EVENT, DEFAULT_VARIABLE_SEPARATOR, MAX_EVENT_QUEUE_SIZE,
    },
    error::{AmiError, AmiResult},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Durations as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Connection and lifecycle settings for [`AmiClient`](crate::AmiClient).
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// # use asterisk_ami_tokio::AmiConfig;
/// # use std::time::Duration;
/// let config = AmiConfig {
///     host: "pbx.example.com".into(),
///     username: "dialer".into(),
///     secret: "s3cret".into(),
///     listener_idle_timeout: Duration::from_secs(600),
///     ..Default::default()
/// };
/// assert_eq!(config.port, 5038);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmiConfig {
    /// Server host name or address.
    pub host: String,
    /// Manager port. Default: 5038.
    pub port: u16,
    /// Manager user (`manager.conf` section name).
    pub username: String,
    /// Manager secret. Never serialized.
    #[serde(skip_serializing)]
    pub secret: String,
    /// TCP connect timeout. Default: 2s.
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Wait for the greeting and for the login reply. Default: 5s.
    #[serde(with = "duration_ms")]
    pub handshake_timeout: Duration,
    /// Response wait used by originate when the caller passes a zero timeout. Default: 5s.
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
    /// Session listeners with no matching event for this long are closed. Default: 30min.
    #[serde(with = "duration_ms")]
    pub listener_idle_timeout: Duration,
    /// How often idle listeners are swept. Default: 30min.
    #[serde(with = "duration_ms")]
    pub sweep_interval: Duration,
    /// Separator between pairs on the `Variable` line. `,` for current
    /// servers, `|` for 1.4 and older.
    pub variable_separator: char,
    /// Event names that end a session listener. Default: `["Hangup"]`.
    pub terminal_events: Vec<String>,
    /// Capacity of the global event stream. Default: 1000.
    pub event_queue_size: usize,
}

impl Default for AmiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_AMI_PORT,
            username: String::new(),
            secret: String::new(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            listener_idle_timeout: Duration::from_millis(DEFAULT_LISTENER_IDLE_MS),
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
            variable_separator: DEFAULT_VARIABLE_SEPARATOR,
            terminal_events: vec![DEFAULT_TERMINAL_EVENT.to_string()],
            event_queue_size: MAX_EVENT_QUEUE_SIZE,
        }
    }
}

impl std::fmt::Debug for AmiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .field("connect_timeout", &self.connect_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("listener_idle_timeout", &self.listener_idle_timeout)
            .field("sweep_interval", &self.sweep_interval)
            .field("variable_separator", &self.variable_separator)
            .field("terminal_events", &self.terminal_events)
            .field("event_queue_size", &self.event_queue_size)
            .finish()
    }
}

impl AmiConfig {
    /// Config for `host:port` with the given credentials and default timings.
    pub fn new(host: &str, port: u16, username: &str, secret: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            secret: secret.to_string(),
            ..Default::default()
        }
    }

    /// Parse `host[:port]<sep>username<sep>secret`.
    ///
    /// Missing trailing fields are left empty; surrounding whitespace is
    /// trimmed from each part. IPv6 hosts are written `[addr]` or `[addr]:port`,
    /// with a separator that does not occur in the address.
    ///
    /// ```
    /// # use asterisk_ami_tokio::AmiConfig;
    /// let config = AmiConfig::from_split_str("10.0.0.5:5039::admin::pw\n", "::").unwrap();
    /// assert_eq!(config.host, "10.0.0.5");
    /// assert_eq!(config.port, 5039);
    /// assert_eq!(config.username, "admin");
    /// assert_eq!(config.secret, "pw");
    /// ```
    pub fn from_split_str(text: &str, separator: &str) -> AmiResult<Self> {
        if separator.is_empty() {
            return Err(AmiError::invalid_config("separator must not be empty"));
        }
        let mut parts = text
            .trim()
            .split(separator)
            .map(str::trim);
        let address = parts
            .next()
            .unwrap_or_default();
        let username = parts
            .next()
            .unwrap_or_default();
        let secret = parts
            .next()
            .unwrap_or_default();

        let (host, port) = split_host_port(address)?;
        Ok(Self::new(host, port, username, secret))
    }

    /// Read a credentials file in the [`from_split_str`](Self::from_split_str) format.
    pub fn from_split_file(path: impl AsRef<Path>, separator: &str) -> AmiResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_split_str(&text, separator)
    }

    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> AmiResult<()> {
        if self
            .host
            .is_empty()
        {
            return Err(AmiError::invalid_config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(AmiError::invalid_config("port must not be 0"));
        }
        if self
            .sweep_interval
            .is_zero()
        {
            return Err(AmiError::invalid_config("sweep_interval must be non-zero"));
        }
        if matches!(self.variable_separator, '=' | '\r' | '\n') {
            return Err(AmiError::invalid_config(format!(
                "variable_separator {:?} is not usable",
                self.variable_separator
            )));
        }
        Ok(())
    }

    pub(crate) fn is_terminal_event(&self, name: &str) -> bool {
        self.terminal_events
            .iter()
            .any(|t| t == name)
    }
}

fn parse_port(port: &str) -> AmiResult<u16> {
    port.parse::<u16>()
        .map_err(|_| AmiError::invalid_config(format!("invalid port '{}'", port)))
}

/// `host`, `host:port`, `[v6]`, `[v6]:port` or a bare IPv6 literal.
fn split_host_port(address: &str) -> AmiResult<(&str, u16)> {
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| AmiError::invalid_config(format!("unterminated '[' in '{}'", address)))?;
        return match tail {
            "" => Ok((host, DEFAULT_AMI_PORT)),
            _ => match tail.strip_prefix(':') {
                Some(port) => Ok((host, parse_port(port)?)),
                None => Err(AmiError::invalid_config(format!("unexpected '{}' after ']'", tail))),
            },
        };
    }
    match address.rsplit_once(':') {
        // More than one colon: an IPv6 literal without a port.
        Some((host, _)) if host.contains(':') => Ok((address, DEFAULT_AMI_PORT)),
        Some((host, port)) => Ok((host, parse_port(port)?)),
        None => Ok((address, DEFAULT_AMI_PORT)),
    }
}
