//! Connection settings.

use std::time::Duration;

use crate::error::{Category, Origin, Result};

/// Default acceptor host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default acceptor port.
pub const DEFAULT_PORT: u16 = 25;
/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default per-read/per-write timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_CLIENT_HOSTNAME: &str = "localhost";

/// Username and password used for `AUTH`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how to reach the acceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    credentials: Option<Credentials>,
    client_hostname: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            credentials: None,
            client_hostname: DEFAULT_CLIENT_HOSTNAME.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Starts a builder with the defaults.
    #[must_use]
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Reads process-level defaults from `PMTA_SERVER`, `PMTA_PORT`,
    /// `PMTA_USERNAME` and `PMTA_PASSWORD`. Empty variables count as unset.
    ///
    /// # Errors
    ///
    /// Returns an [`Category::IllegalArgument`] error if `PMTA_PORT` is not
    /// a valid port number.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let mut builder = Self::builder();

        if let Some(host) = var("PMTA_SERVER") {
            builder = builder.host(host);
        }
        if let Some(port) = var("PMTA_PORT") {
            let port = port.trim().parse::<u16>().map_err(|_| {
                Origin::Connection.error(
                    Category::IllegalArgument,
                    format!("PMTA_PORT is not a valid port: {port:?}"),
                )
            })?;
            builder = builder.port(port);
        }
        if let (Some(username), Some(password)) = (var("PMTA_USERNAME"), var("PMTA_PASSWORD")) {
            builder = builder.credentials(username, password);
        }

        Ok(builder.build())
    }

    /// Returns the acceptor host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the acceptor port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the credentials, if any.
    #[must_use]
    pub const fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Returns the name sent with `EHLO`.
    #[must_use]
    pub fn client_hostname(&self) -> &str {
        &self.client_hostname
    }

    /// Returns the TCP connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the per-operation I/O timeout.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Checks what goes on the wire verbatim. The client hostname ends up in
    /// the `EHLO` line, so whitespace and control characters are refused.
    pub(crate) fn validate(&self) -> Result<()> {
        let name = &self.client_hostname;
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Origin::Connection.error(
                Category::IllegalArgument,
                format!("client hostname {name:?} cannot be sent with EHLO"),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Sets the acceptor host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the acceptor port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the `AUTH` credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the name sent with `EHLO`.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.client_hostname = hostname.into();
        self
    }

    /// Sets the TCP connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the per-operation I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.port(), 25);
        assert!(config.credentials().is_none());
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.io_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn builder_overrides() {
        let config = ConnectionConfig::builder()
            .host("mta.example.com")
            .port(2525)
            .credentials("user", "secret")
            .client_hostname("client.example.com")
            .io_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.host(), "mta.example.com");
        assert_eq!(config.port(), 2525);
        assert_eq!(config.credentials().unwrap().username(), "user");
        assert_eq!(config.client_hostname(), "client.example.com");
        assert_eq!(config.io_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn client_hostname_must_be_a_single_token() {
        assert!(ConnectionConfig::default().validate().is_ok());

        for bad in ["", "client\r\nQUIT", "two words", "tab\there"] {
            let config = ConnectionConfig::builder().client_hostname(bad).build();
            let err = config.validate().unwrap_err();
            assert!(err.is_connection());
            assert_eq!(err.category(), Category::IllegalArgument);
        }
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("user", "hunter2");
        let printed = format!("{creds:?}");
        assert!(printed.contains("user"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn env_overrides_defaults() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("PMTA_SERVER", "10.0.0.5"),
            ("PMTA_PORT", "2525"),
            ("PMTA_USERNAME", "u"),
            ("PMTA_PASSWORD", "p"),
        ]))
        .unwrap();
        assert_eq!(config.host(), "10.0.0.5");
        assert_eq!(config.port(), 2525);
        assert_eq!(config.credentials(), Some(&Credentials::new("u", "p")));
    }

    #[test]
    fn env_empty_values_are_unset() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("PMTA_SERVER", ""),
            ("PMTA_PORT", ""),
        ]))
        .unwrap();
        assert_eq!(config, ConnectionConfig::default());
    }

    #[test]
    fn env_credentials_need_both_halves() {
        let config = ConnectionConfig::from_lookup(lookup(&[("PMTA_USERNAME", "u")])).unwrap();
        assert!(config.credentials().is_none());
    }

    #[test]
    fn env_bad_port_is_rejected() {
        let err = ConnectionConfig::from_lookup(lookup(&[("PMTA_PORT", "smtp")])).unwrap_err();
        assert!(err.is_connection());
        assert_eq!(err.category(), Category::IllegalArgument);
    }
}
