use std::{
    env,
    net::{Ipv4Addr, SocketAddr},
    process::ExitCode,
};

use ff_wrapper::{
    logging, server::run_self_test, ClientConfig, Result, WrapperConfig, WrapperServer,
};

/// Flag evaluated by the self test.
const SELF_TEST_FLAG: &str = "flag1";

fn main() -> ExitCode {
    let config = load_config();

    let logger = config.as_ref().map(|config| config.logger).unwrap_or_default();
    if let Err(err) = logging::init(logger) {
        eprintln!("failed to initialize logging: {err}");
    }

    match config.and_then(run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!(target: "ff_wrapper", "{}", err);
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> Result<WrapperConfig> {
    let path = env::var("WRAPPER_CONFIG")
        .unwrap_or_else(|_| format!("./{}", WrapperConfig::CONFIGURATION_FILE));
    WrapperConfig::from_file(path)?.override_from(|name| env::var(name).ok())
}

fn client_config() -> ClientConfig {
    let mut config = ClientConfig::new();
    if let Ok(url) = env::var("FF_CONFIG_URL") {
        config = config.config_url(url);
    }
    if let Ok(url) = env::var("FF_EVENT_URL") {
        config = config.event_url(url);
    }
    config
}

fn run(config: WrapperConfig) -> Result<()> {
    let mut server = WrapperServer::new(config.to_server_config(client_config())?);

    if !server.start()? {
        log::warn!(target: "ff_wrapper", "serving before the client is ready");
    }

    if config.self_test {
        let port = server.local_addr().map_or(config.port, |addr| addr.port());
        let result = run_self_test(
            SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            SELF_TEST_FLAG,
        );
        stop(&mut server);
        return result;
    }

    server.wait_for_shutdown_signal()?;
    stop(&mut server);
    Ok(())
}

fn stop(server: &mut WrapperServer) {
    if !server.stop() {
        log::warn!(target: "ff_wrapper", "client is still active after stopping the server");
    }
}
