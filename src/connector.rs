//! An HTTP client that authenticates against the flag service and fetches flags and segments.
use std::time::Duration;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::{
    models::{
        AuthenticationRequest, AuthenticationResponse, Claims, Configuration, FeatureConfig,
        Segment, TryParse,
    },
    Error, Result,
};

const AUTH_ENDPOINT: &str = "/client/auth";

// Tokens are unpadded base64url, but some issuers pad them. Accept both.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone)]
pub(crate) struct ConnectorConfig {
    pub api_key: String,
    pub config_url: String,
    pub connection_timeout: Duration,
    pub read_timeout: Duration,
}

struct Session {
    token: String,
    claims: Claims,
}

/// A client that fetches flag configuration from the server.
pub(crate) struct Connector {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    config: ConnectorConfig,
    session: Option<Session>,
    /// If authentication is rejected, the SDK key is not valid. We cache this error so we don't
    /// issue additional requests to the server.
    unauthorized: bool,
}

impl Connector {
    pub fn new(config: ConnectorConfig) -> Result<Connector> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(config.connection_timeout)
            .timeout(config.read_timeout)
            .user_agent(concat!("ff-test-wrapper/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Connector {
            client,
            config,
            session: None,
            unauthorized: false,
        })
    }

    pub fn fetch_configuration(&mut self) -> Result<Configuration> {
        if self.unauthorized {
            return Err(Error::Unauthorized);
        }
        if self.session.is_none() {
            self.authenticate()?;
        }

        let environment = self.environment();
        let flags: Vec<TryParse<FeatureConfig>> =
            self.get(&format!("/client/env/{environment}/feature-configs"), &[])?;
        let segments: Vec<TryParse<Segment>> = self.get(
            &format!("/client/env/{environment}/target-segments"),
            &[("rules", "v2")],
        )?;

        let configuration = Configuration::from_server_response(flags, segments);
        log::debug!(target: "ff_wrapper",
            flags = configuration.flags.len(),
            segments = configuration.segments.len();
            "successfully fetched configuration");

        Ok(configuration)
    }

    fn authenticate(&mut self) -> Result<()> {
        let url = self.url(AUTH_ENDPOINT, &[])?;

        log::debug!(target: "ff_wrapper", "authenticating");
        let response = self
            .client
            .post(url)
            .json(&AuthenticationRequest {
                api_key: self.config.api_key.clone(),
            })
            .send()?;

        match response.status() {
            status if status.is_success() => {}
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                log::error!(target: "ff_wrapper",
                    "HTTP error code {} returned for authentication endpoint. Check SDK key. SDK will serve default values",
                    status.as_u16());
                self.unauthorized = true;
                return Err(Error::Unauthorized);
            }
            status => {
                log::warn!(target: "ff_wrapper", "failed to get auth token: {:?}", status);
                return Err(Error::UnexpectedStatus(status.as_u16()));
            }
        }

        let AuthenticationResponse { auth_token } = response.json()?;
        let claims = decode_claims(&auth_token)?;
        log::info!(target: "ff_wrapper",
            environment = claims.environment.as_str(),
            cluster = claims.cluster_identifier.as_deref().unwrap_or("");
            "successfully authenticated");

        self.session = Some(Session {
            token: auth_token,
            claims,
        });
        Ok(())
    }

    fn environment(&self) -> String {
        self.session
            .as_ref()
            .map(|session| session.claims.environment.clone())
            .unwrap_or_default()
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.config.config_url, path))
            .map_err(Error::InvalidBaseUrl)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    fn get<T: DeserializeOwned>(&mut self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let Some(session) = &self.session else {
            return Err(Error::Unauthorized);
        };

        let mut params = params.to_vec();
        if let Some(cluster) = session.claims.cluster_identifier.as_deref() {
            params.push(("cluster", cluster));
        }
        let url = self.url(path, &params)?;

        let mut request = self.client.get(url).bearer_auth(&session.token);
        if let Some(environment) = session
            .claims
            .environment_identifier
            .as_deref()
            .filter(|it| !it.trim().is_empty())
            .or(Some(session.claims.environment.as_str()).filter(|it| !it.is_empty()))
        {
            request = request.header("Harness-EnvironmentID", environment);
        }
        if let Some(account) = session
            .claims
            .account_id
            .as_deref()
            .filter(|it| !it.trim().is_empty())
        {
            request = request.header("Harness-AccountID", account);
        }

        let response = request.send()?;
        match response.status() {
            status if status.is_success() => Ok(response.json()?),
            StatusCode::FORBIDDEN => {
                // The token has likely expired. Authenticate again on the next attempt.
                log::warn!(target: "ff_wrapper", "received 403 for {}, re-authenticating on next poll", path);
                self.session = None;
                Err(Error::UnexpectedStatus(StatusCode::FORBIDDEN.as_u16()))
            }
            status => {
                log::warn!(target: "ff_wrapper", "received non-200 response while fetching {}: {:?}", path, status);
                Err(Error::UnexpectedStatus(status.as_u16()))
            }
        }
    }
}

/// Decode claims from the payload part of a JWT without verifying the signature.
pub(crate) fn decode_claims(token: &str) -> Result<Claims> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::InvalidToken("token has no payload".to_owned()))?;
    let normalized = payload.replace('+', "-").replace('/', "_");
    let bytes = TOKEN_ENGINE
        .decode(normalized)
        .map_err(|err| Error::InvalidToken(err.to_string()))?;
    let claims: Claims =
        serde_json::from_slice(&bytes).map_err(|err| Error::InvalidToken(err.to_string()))?;
    if claims.environment.is_empty() {
        return Err(Error::InvalidToken("token has no environment".to_owned()));
    }
    Ok(claims)
}
