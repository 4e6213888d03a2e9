use std::{
    net::{IpAddr, Ipv4Addr},
    path::Path,
    time::Duration,
};

use serde::Deserialize;

use crate::{CfClient, Error, Result};

/// Configuration for [`CfClient`].
///
/// # Examples
/// ```
/// # use std::time::Duration;
/// # use ff_wrapper::ClientConfig;
/// let config = ClientConfig::new()
///     .config_url("http://localhost:3000/api/1.0")
///     .poll_interval(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) config_url: String,
    pub(crate) event_url: String,
    pub(crate) poll_interval: Duration,
    pub(crate) stream_enabled: bool,
    pub(crate) connection_timeout: Duration,
    pub(crate) read_timeout: Duration,
}

impl ClientConfig {
    /// Default URL of the flag configuration service.
    pub const DEFAULT_CONFIG_URL: &'static str = "https://config.ff.harness.io/api/1.0";

    /// Default URL of the events service.
    pub const DEFAULT_EVENT_URL: &'static str = "https://events.ff.harness.io/api/1.0";

    /// Default interval between configuration polls.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

    /// Default timeout for establishing a connection to the flag service.
    pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default timeout for reading a response from the flag service.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a configuration with default settings.
    pub fn new() -> Self {
        ClientConfig::default()
    }

    /// Override URL of the flag configuration service.
    pub fn config_url(mut self, config_url: impl Into<String>) -> Self {
        self.config_url = config_url.into();
        self
    }

    /// Override URL of the events service.
    ///
    /// The client does not publish analytics, the URL is only validated and logged.
    pub fn event_url(mut self, event_url: impl Into<String>) -> Self {
        self.event_url = event_url.into();
        self
    }

    /// Set interval between configuration polls.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Request streaming updates.
    ///
    /// Streaming is not supported by this client. When enabled, a warning is logged and the client
    /// keeps polling.
    pub fn stream_enabled(mut self, stream_enabled: bool) -> Self {
        self.stream_enabled = stream_enabled;
        self
    }

    /// Set connection timeout for requests to the flag service.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set read timeout for requests to the flag service.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Create a new [`CfClient`] and start fetching configuration in the background.
    pub fn to_client(self, api_key: impl Into<String>) -> Result<CfClient> {
        CfClient::new(api_key, self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            config_url: ClientConfig::DEFAULT_CONFIG_URL.to_owned(),
            event_url: ClientConfig::DEFAULT_EVENT_URL.to_owned(),
            poll_interval: ClientConfig::DEFAULT_POLL_INTERVAL,
            stream_enabled: true,
            connection_timeout: ClientConfig::DEFAULT_CONNECTION_TIMEOUT,
            read_timeout: ClientConfig::DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Configuration for [`WrapperServer`](crate::WrapperServer).
///
/// ```
/// # use ff_wrapper::{ClientConfig, ServerConfig};
/// let config = ServerConfig::new(4000, "sdk-key")
///     .client_config(ClientConfig::new().config_url("http://localhost:3000/api/1.0"));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub(crate) bind_address: IpAddr,
    pub(crate) port: u16,
    pub(crate) api_key: String,
    pub(crate) startup_timeout: Duration,
    pub(crate) client: ClientConfig,
}

impl ServerConfig {
    /// Address the server listens on unless overridden.
    pub const DEFAULT_BIND_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

    /// How long `start()` waits for the client to become ready.
    pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a configuration listening on all interfaces at `port`.
    pub fn new(port: u16, api_key: impl Into<String>) -> Self {
        ServerConfig {
            bind_address: ServerConfig::DEFAULT_BIND_ADDRESS,
            port,
            api_key: api_key.into(),
            startup_timeout: ServerConfig::DEFAULT_STARTUP_TIMEOUT,
            client: ClientConfig::default(),
        }
    }

    /// Override the listen address.
    pub fn bind_address(mut self, bind_address: IpAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    /// Override the readiness timeout of `start()`.
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Set settings of the wrapped flag client.
    pub fn client_config(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// SDK key the wrapped client authenticates with.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Settings of the wrapped flag client.
    pub fn client(&self) -> &ClientConfig {
        &self.client
    }
}

/// Where the wrapper binary writes its log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerType {
    /// Standard error.
    #[default]
    Default,
    /// A log file in the working directory.
    Filesystem,
}

/// Contents of the `wrapper.json` file read by the wrapper binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapperConfig {
    /// Run the built-in checks against the started server and exit.
    #[serde(default = "default_self_test")]
    pub self_test: bool,
    /// Port the server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// SDK key used to initialize the client.
    #[serde(default)]
    pub sdk_key: String,
    /// Logger the binary installs.
    #[serde(default)]
    pub logger: LoggerType,
}

fn default_self_test() -> bool {
    true
}

fn default_port() -> u16 {
    4000
}

impl WrapperConfig {
    /// Name of the configuration file looked up by the binary.
    pub const CONFIGURATION_FILE: &'static str = "wrapper.json";

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        WrapperConfig::from_json(&content)
    }

    /// Override `port` and `sdk_key` from `WRAPPER_PORT` and `FF_API_KEY` as returned by `lookup`.
    pub fn override_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(port) = lookup("WRAPPER_PORT") {
            self.port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid WRAPPER_PORT: {port}")))?;
        }
        if let Some(sdk_key) = lookup("FF_API_KEY") {
            self.sdk_key = sdk_key;
        }
        Ok(self)
    }

    /// Build a server configuration, failing if no SDK key has been provided.
    pub fn to_server_config(&self, client: ClientConfig) -> Result<ServerConfig> {
        if self.sdk_key.trim().is_empty() {
            return Err(Error::Config("sdkKey is not set".to_owned()));
        }
        Ok(ServerConfig::new(self.port, self.sdk_key.clone()).client_config(client))
    }
}

impl Default for WrapperConfig {
    fn default() -> Self {
        WrapperConfig {
            self_test: default_self_test(),
            port: default_port(),
            sdk_key: String::new(),
            logger: LoggerType::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientConfig, LoggerType, WrapperConfig};

    #[test]
    fn parses_wrapper_config_with_defaults() {
        let config = WrapperConfig::from_json(r#"{"sdkKey": "key"}"#).unwrap();
        assert_eq!(
            config,
            WrapperConfig {
                self_test: true,
                port: 4000,
                sdk_key: "key".to_owned(),
                logger: LoggerType::Default,
            }
        );
    }

    #[test]
    fn parses_filesystem_logger() {
        let config = WrapperConfig::from_json(
            r#"{"selfTest": false, "port": 4001, "sdkKey": "key", "logger": "filesystem"}"#,
        )
        .unwrap();
        assert!(!config.self_test);
        assert_eq!(config.port, 4001);
        assert_eq!(config.logger, LoggerType::Filesystem);
    }

    #[test]
    fn environment_overrides_file() {
        let env = |name: &str| match name {
            "WRAPPER_PORT" => Some("4100".to_owned()),
            "FF_API_KEY" => Some("env-key".to_owned()),
            _ => None,
        };
        let config = WrapperConfig::from_json(r#"{"sdkKey": "file-key"}"#)
            .unwrap()
            .override_from(env)
            .unwrap();
        assert_eq!(config.port, 4100);
        assert_eq!(config.sdk_key, "env-key");

        let config = WrapperConfig::default().override_from(|_| None).unwrap();
        assert_eq!(config, WrapperConfig::default());
    }

    #[test]
    fn rejects_invalid_port_override() {
        let result = WrapperConfig::default()
            .override_from(|name| (name == "WRAPPER_PORT").then(|| "http".to_owned()));
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn rejects_missing_sdk_key() {
        let config = WrapperConfig::default();
        assert!(config.to_server_config(ClientConfig::new()).is_err());
    }
}
