use std::{net::SocketAddr, time::Duration};

use reqwest::{blocking::Client, StatusCode};

use super::{FlagCheckResponse, SDK_VERSION};
use crate::{Error, Result};

/// Drive the endpoints of a running server at `addr` and check their responses.
///
/// Must not be called from within an async runtime.
pub fn run_self_test(addr: SocketAddr, flag_key: &str) -> Result<()> {
    let base = format!("http://{addr}");
    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

    let version: serde_json::Value = client
        .get(format!("{base}/sdk/version"))
        .send()?
        .error_for_status()?
        .json()?;
    ensure("/sdk/version", version == serde_json::json!({ "version": SDK_VERSION }))?;

    let pong: serde_json::Value = client
        .get(format!("{base}/api/1.0/ping"))
        .send()?
        .error_for_status()?
        .json()?;
    ensure("/api/1.0/ping", pong == serde_json::json!({ "ok": true }))?;

    let not_found = client.get(format!("{base}/api/1.0/unknown")).send()?;
    ensure(
        "unknown path",
        not_found.status() == StatusCode::NOT_FOUND && not_found.text()? == "Not found",
    )?;

    let response: FlagCheckResponse = client
        .post(format!("{base}/api/1.0/check_flag"))
        .json(&serde_json::json!({
            "flag_kind": "boolean",
            "flag_key": flag_key,
            "target": {"target_identifier": "test", "target_name": "test"}
        }))
        .send()?
        .error_for_status()?
        .json()?;
    log::info!(target: "ff_wrapper",
        flag_key = response.flag_key.as_str(),
        flag_value = response.flag_value.as_str();
        "self test evaluated flag");
    ensure(
        "/api/1.0/check_flag",
        response.flag_key == flag_key && response.flag_value.parse::<bool>().is_ok(),
    )?;

    log::info!(target: "ff_wrapper", "self test passed");
    Ok(())
}

fn ensure(check: &str, passed: bool) -> Result<()> {
    if passed {
        Ok(())
    } else {
        Err(Error::SelfTest(check.to_owned()))
    }
}
