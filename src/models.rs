//! Wire model of the flag service.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TryParse<T> {
    Parsed(T),
    ParseFailed(serde_json::Value),
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    pub auth_token: String,
}

/// Claims carried in the payload of the authentication token.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub cluster_identifier: Option<String>,
    #[serde(default, rename = "accountID")]
    pub account_id: Option<String>,
    #[serde(default)]
    pub environment_identifier: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Boolean,
    Int,
    String,
    Json,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeatureState {
    On,
    Off,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureConfig {
    pub feature: String,
    pub kind: FeatureKind,
    pub state: FeatureState,
    pub variations: Vec<Variation>,
    pub off_variation: String,
    pub default_serve: Serve,
    #[serde(default)]
    pub rules: Vec<ServingRule>,
    #[serde(default)]
    pub variation_to_target_map: Vec<VariationMap>,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    pub identifier: String,
    pub value: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Serve {
    #[serde(default)]
    pub variation: Option<String>,
    #[serde(default)]
    pub distribution: Option<Distribution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub bucket_by: String,
    pub variations: Vec<WeightedVariation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedVariation {
    pub variation: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServingRule {
    #[serde(default)]
    pub rule_id: Option<String>,
    pub priority: i32,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    pub serve: Serve,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    #[serde(default)]
    pub attribute: String,
    pub op: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationMap {
    pub variation: String,
    #[serde(default)]
    pub targets: Vec<TargetMap>,
    #[serde(default)]
    pub target_segments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetMap {
    pub identifier: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prerequisite {
    pub feature: String,
    #[serde(default)]
    pub variations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub identifier: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub included: Vec<TargetMap>,
    #[serde(default)]
    pub excluded: Vec<TargetMap>,
    #[serde(default)]
    pub rules: Vec<Clause>,
    #[serde(default)]
    pub version: i64,
}

/// Flags and segments indexed by identifier.
#[derive(Debug, Default)]
pub struct Configuration {
    pub flags: HashMap<String, FeatureConfig>,
    pub segments: HashMap<String, Segment>,
}

impl Configuration {
    /// Build a configuration from server responses, skipping entries that failed to parse.
    pub fn from_server_response(
        flags: Vec<TryParse<FeatureConfig>>,
        segments: Vec<TryParse<Segment>>,
    ) -> Configuration {
        let flags = flags
            .into_iter()
            .filter_map(|flag| match flag {
                TryParse::Parsed(flag) => Some((flag.feature.clone(), flag)),
                TryParse::ParseFailed(value) => {
                    log::warn!(target: "ff_wrapper", "skipping flag that failed to parse: {}", value);
                    None
                }
            })
            .collect();
        let segments = segments
            .into_iter()
            .filter_map(Option::from)
            .map(|segment: Segment| (segment.identifier.clone(), segment))
            .collect();
        Configuration { flags, segments }
    }
}
