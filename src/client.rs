use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use url::Url;

use crate::{
    configuration_store::ConfigurationStore,
    connector::ConnectorConfig,
    eval::Evaluator,
    models::{FeatureKind, Variation},
    poller::{PollerThread, PollerThreadConfig, Readiness},
    sharder::Murmur3Sharder,
    ClientConfig, Error, Result,
};

/// An identity against which flags are evaluated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Target {
    /// Unique identifier of the target.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Whether the target is anonymous.
    pub anonymous: bool,
    /// Custom attributes usable in targeting rules.
    pub attributes: HashMap<String, serde_json::Value>,
    /// Private targets are not reported to the flag service.
    pub is_private: bool,
}

impl Target {
    /// Start building a target with the given identifier.
    ///
    /// ```
    /// # use ff_wrapper::Target;
    /// let target = Target::builder("test").name("Test").build();
    /// assert_eq!(target.identifier, "test");
    /// ```
    pub fn builder(identifier: impl Into<String>) -> TargetBuilder {
        TargetBuilder {
            target: Target {
                identifier: identifier.into(),
                ..Target::default()
            },
        }
    }

    /// Look up an attribute by name. `identifier` and `name` resolve to the corresponding fields,
    /// everything else to custom attributes.
    pub(crate) fn get_attribute(&self, attribute: &str) -> Option<String> {
        match attribute {
            "" => None,
            "identifier" => Some(self.identifier.clone()),
            "name" => Some(self.name.clone()),
            "anonymous" => Some(self.anonymous.to_string()),
            _ => self.attributes.get(attribute).map(|value| match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }
}

/// Builder for [`Target`].
pub struct TargetBuilder {
    target: Target,
}

impl TargetBuilder {
    /// Set display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.target.name = name.into();
        self
    }

    /// Mark the target as anonymous.
    pub fn anonymous(mut self, anonymous: bool) -> Self {
        self.target.anonymous = anonymous;
        self
    }

    /// Mark the target as private.
    pub fn is_private(mut self, is_private: bool) -> Self {
        self.target.is_private = is_private;
        self
    }

    /// Add a custom attribute.
    pub fn attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.target.attributes.insert(key.into(), value.into());
        self
    }

    /// Finish building.
    pub fn build(self) -> Target {
        self.target
    }
}

/// Contract of a flag evaluation client, as consumed by the wrapper server.
///
/// Typed variation calls never fail: when a flag cannot be evaluated, the supplied default is
/// returned.
pub trait FlagClient: Send + Sync {
    /// Whether the client has completed its initial fetch and can serve evaluations.
    fn is_initialized(&self) -> bool;

    /// Block until the client is initialized or `timeout` elapses. Returns
    /// [`is_initialized()`](FlagClient::is_initialized) at that point.
    fn wait_for_initialization(&self, timeout: Duration) -> bool;

    /// Release resources held by the client. The client is not initialized afterwards.
    fn destroy(&self);

    /// Evaluate a boolean flag.
    fn bool_variation(&self, flag_key: &str, target: &Target, default: bool) -> bool;

    /// Evaluate a numeric flag.
    fn number_variation(&self, flag_key: &str, target: &Target, default: f64) -> f64;

    /// Evaluate a string flag.
    fn string_variation(&self, flag_key: &str, target: &Target, default: &str) -> String;

    /// Evaluate a JSON flag.
    fn json_variation(
        &self,
        flag_key: &str,
        target: &Target,
        default: serde_json::Value,
    ) -> serde_json::Value;
}

/// A client for the flag service.
///
/// Creating a client starts a poller thread that authenticates, fetches flags and segments, and
/// refreshes them periodically. Until the first fetch completes, all evaluations return the
/// supplied defaults.
///
/// # Examples
/// ```no_run
/// # use std::time::Duration;
/// # use ff_wrapper::{CfClient, ClientConfig, FlagClient, Target};
/// let client = CfClient::new("sdk-key", ClientConfig::new()).unwrap();
/// client.wait_for_initialization(Duration::from_secs(30));
/// let value = client.bool_variation("flag1", &Target::builder("test").build(), false);
/// client.destroy();
/// ```
pub struct CfClient {
    configuration_store: Arc<ConfigurationStore>,
    readiness: Readiness,
    poller: Mutex<Option<PollerThread>>,
}

impl CfClient {
    /// Create a client and start fetching configuration in the background.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingSdkKey`] if `api_key` is empty.
    /// - [`Error::InvalidBaseUrl`] if one of the configured URLs cannot be parsed.
    /// - [`Error::Io`] if the poller thread cannot be spawned.
    pub fn new(api_key: impl Into<String>, config: ClientConfig) -> Result<CfClient> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            log::error!(target: "ff_wrapper", "SDK key cannot be empty");
            return Err(Error::MissingSdkKey);
        }
        Url::parse(&config.config_url).map_err(Error::InvalidBaseUrl)?;
        Url::parse(&config.event_url).map_err(Error::InvalidBaseUrl)?;
        if config.stream_enabled {
            log::warn!(target: "ff_wrapper", "streaming is not supported, falling back to polling");
        }

        log::info!(target: "ff_wrapper",
            config_url = config.config_url.as_str(),
            poll_interval_secs = config.poll_interval.as_secs();
            "initializing client");

        let configuration_store = Arc::new(ConfigurationStore::new());
        let poller = PollerThread::start(PollerThreadConfig {
            store: configuration_store.clone(),
            connector: ConnectorConfig {
                api_key,
                config_url: config.config_url.clone(),
                connection_timeout: config.connection_timeout,
                read_timeout: config.read_timeout,
            },
            interval: config.poll_interval,
            jitter: config.poll_interval / 10,
        })?;

        Ok(CfClient {
            configuration_store,
            readiness: poller.readiness(),
            poller: Mutex::new(Some(poller)),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_with_configuration_store(
        configuration_store: Arc<ConfigurationStore>,
    ) -> CfClient {
        CfClient {
            configuration_store,
            readiness: Readiness::ready(),
            poller: Mutex::new(None),
        }
    }

    fn evaluate<T>(
        &self,
        flag_key: &str,
        target: &Target,
        kind: FeatureKind,
        convert: impl FnOnce(&Variation) -> Option<T>,
    ) -> Option<T> {
        let Some(configuration) = self.configuration_store.snapshot() else {
            log::warn!(target: "ff_wrapper", flag_key; "evaluating a flag before configuration has been fetched");
            return None;
        };

        let variation = Evaluator::new(&configuration, &Murmur3Sharder).evaluate(
            flag_key, target, kind,
        )?;
        let value = convert(variation);
        if value.is_none() {
            log::warn!(target: "ff_wrapper",
                flag_key,
                variation = variation.identifier.as_str();
                "variation value does not match flag kind {:?}", kind);
        }
        value
    }
}

impl FlagClient for CfClient {
    fn is_initialized(&self) -> bool {
        self.configuration_store.snapshot().is_some()
    }

    fn wait_for_initialization(&self, timeout: Duration) -> bool {
        match self.readiness.wait(timeout) {
            Ok(ready) => ready && self.is_initialized(),
            Err(err) => {
                log::error!(target: "ff_wrapper", "client failed to initialize: {}", err);
                false
            }
        }
    }

    fn destroy(&self) {
        let poller = match self.poller.lock() {
            Ok(mut poller) => poller.take(),
            Err(_) => None,
        };
        if let Some(poller) = poller {
            if let Err(err) = poller.shutdown() {
                log::warn!(target: "ff_wrapper", "error while stopping poller thread: {}", err);
            }
        }
        self.configuration_store.clear();
        log::info!(target: "ff_wrapper", "client destroyed");
    }

    fn bool_variation(&self, flag_key: &str, target: &Target, default: bool) -> bool {
        self.evaluate(flag_key, target, FeatureKind::Boolean, |v| {
            v.value.parse().ok()
        })
        .unwrap_or(default)
    }

    fn number_variation(&self, flag_key: &str, target: &Target, default: f64) -> f64 {
        self.evaluate(flag_key, target, FeatureKind::Int, |v| v.value.parse().ok())
            .unwrap_or(default)
    }

    fn string_variation(&self, flag_key: &str, target: &Target, default: &str) -> String {
        self.evaluate(flag_key, target, FeatureKind::String, |v| {
            Some(v.value.clone())
        })
        .unwrap_or_else(|| default.to_owned())
    }

    fn json_variation(
        &self,
        flag_key: &str,
        target: &Target,
        default: serde_json::Value,
    ) -> serde_json::Value {
        self.evaluate(flag_key, target, FeatureKind::Json, |v| {
            serde_json::from_str(&v.value).ok()
        })
        .unwrap_or(default)
    }
}

impl Drop for CfClient {
    fn drop(&mut self) {
        if let Ok(poller) = self.poller.get_mut() {
            if let Some(poller) = poller.as_ref() {
                poller.stop();
            }
        }
    }
}
