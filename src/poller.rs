//! A background poller thread that periodically requests flags and segments from the server and
//! stores them in a configuration store.
use std::{
    sync::{mpsc::RecvTimeoutError, Arc, Condvar, Mutex},
    time::Duration,
};

use rand::{thread_rng, Rng};

use crate::{
    configuration_store::ConfigurationStore,
    connector::{Connector, ConnectorConfig},
    Error, Result,
};

pub(crate) struct PollerThreadConfig {
    pub store: Arc<ConfigurationStore>,
    pub connector: ConnectorConfig,
    pub interval: Duration,
    pub jitter: Duration,
}

/// Holds `None` if configuration hasn't been fetched yet. Holds `Some(Ok(()))` if configuration
/// has been fetched successfully. Holds `Some(Err(...))` if there was an unrecoverable error
/// fetching the first configuration.
#[derive(Clone)]
pub(crate) struct Readiness(Arc<ReadinessState>);

struct ReadinessState {
    result: Mutex<Option<Result<()>>>,
    condvar: Condvar,
}

impl Readiness {
    fn new() -> Readiness {
        Readiness(Arc::new(ReadinessState {
            result: Mutex::new(None),
            condvar: Condvar::new(),
        }))
    }

    #[cfg(test)]
    pub fn ready() -> Readiness {
        let readiness = Readiness::new();
        readiness.update(Ok(()));
        readiness
    }

    fn update(&self, value: Result<()>) {
        if let Ok(mut slot) = self.0.result.lock() {
            // Keep the first successful result. Later failures do not revoke readiness.
            if !matches!(*slot, Some(Ok(()))) {
                *slot = Some(value);
            }
        }
        self.0.condvar.notify_all();
    }

    /// Block until the first configuration is fetched, an unrecoverable error occurs, or `timeout`
    /// elapses. Returns `Ok(false)` on timeout.
    pub fn wait(&self, timeout: Duration) -> Result<bool> {
        let lock = self
            .0
            .result
            .lock()
            .map_err(|_| Error::PollerThreadPanicked)?;
        let (lock, _timeout_result) = self
            .0
            .condvar
            .wait_timeout_while(lock, timeout, |result| result.is_none())
            .map_err(|_| Error::PollerThreadPanicked)?;
        match &*lock {
            Some(result) => result.clone().map(|()| true),
            None => Ok(false),
        }
    }
}

/// A configuration poller thread.
pub(crate) struct PollerThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to send a stop command to the poller thread.
    stop_sender: std::sync::mpsc::SyncSender<()>,

    readiness: Readiness,
}

impl PollerThread {
    pub fn start(config: PollerThreadConfig) -> Result<PollerThread> {
        // Buffer size of 1 is enough: a second stop command can be dropped.
        let (stop_sender, stop_receiver) = std::sync::mpsc::sync_channel::<()>(1);

        let readiness = Readiness::new();

        let join_handle = {
            let readiness = readiness.clone();
            let PollerThreadConfig {
                store,
                connector,
                interval,
                jitter: max_jitter,
            } = config;

            std::thread::Builder::new()
                .name("ff-poller".to_owned())
                .spawn(move || {
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        // The blocking HTTP client must be created outside of any async runtime,
                        // so it lives on this thread.
                        let mut connector = match Connector::new(connector) {
                            Ok(connector) => connector,
                            Err(err) => {
                                log::error!(target: "ff_wrapper", "failed to create HTTP client: {}", err);
                                readiness.update(Err(err));
                                return;
                            }
                        };

                        loop {
                            log::debug!(target: "ff_wrapper", "fetching new configuration");
                            match connector.fetch_configuration() {
                                Ok(configuration) => {
                                    store.publish(configuration);
                                    readiness.update(Ok(()));
                                }
                                Err(err @ (Error::Unauthorized | Error::InvalidBaseUrl(_))) => {
                                    // Unrecoverable errors
                                    log::error!(target: "ff_wrapper", "stopping poller: {}", err);
                                    readiness.update(Err(err));
                                    return;
                                }
                                Err(err) => {
                                    // Other errors are retriable.
                                    log::warn!(target: "ff_wrapper", "error while fetching new configuration: {}", err);
                                }
                            };

                            let timeout = jitter(interval, max_jitter);
                            match stop_receiver.recv_timeout(timeout) {
                                Err(RecvTimeoutError::Timeout) => {
                                    // Timed out. Loop back to fetch a new configuration.
                                }
                                Ok(()) => {
                                    log::debug!(target: "ff_wrapper", "poller thread received stop command");
                                    return;
                                }
                                Err(RecvTimeoutError::Disconnected) => {
                                    log::debug!(target: "ff_wrapper", "poller thread received disconnected");
                                    return;
                                }
                            }
                        }
                    }));

                    if result.is_err() {
                        readiness.update(Err(Error::PollerThreadPanicked));
                    }
                })?
        };

        Ok(PollerThread {
            join_handle,
            stop_sender,
            readiness,
        })
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Stop the poller thread.
    ///
    /// This function does not wait for the thread to actually stop.
    pub fn stop(&self) {
        // Error means that the receiver was dropped (thread exited) or the buffer is full (stop
        // command already sent). Both can be ignored.
        let _ = self.stop_sender.try_send(());
    }

    /// Stop the poller thread and block waiting for it to exit.
    pub fn shutdown(self) -> Result<()> {
        self.stop();

        self.join_handle
            .join()
            .map_err(|_| Error::PollerThreadPanicked)?;

        Ok(())
    }
}

/// Apply randomized `jitter` to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{jitter, Readiness};
    use crate::Error;

    #[test]
    fn jitter_is_bounded() {
        let interval = Duration::from_secs(30);
        let max = Duration::from_secs(3);
        for _ in 0..100 {
            let result = jitter(interval, max);
            assert!(result <= interval && result >= interval - max);
        }
    }

    #[test]
    fn jitter_saturates() {
        assert!(jitter(Duration::from_secs(1), Duration::from_secs(10)) <= Duration::from_secs(1));
    }

    #[test]
    fn readiness_times_out() {
        let readiness = Readiness::new();
        assert!(!readiness.wait(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn readiness_is_signalled_from_another_thread() {
        let readiness = Readiness::new();
        {
            let readiness = readiness.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                readiness.update(Ok(()));
            });
        }
        assert!(readiness.wait(Duration::from_secs(5)).unwrap());
    }

    #[test]
    fn readiness_reports_unrecoverable_error() {
        let readiness = Readiness::new();
        readiness.update(Err(Error::Unauthorized));
        assert!(matches!(
            readiness.wait(Duration::from_secs(1)),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn readiness_keeps_first_success() {
        let readiness = Readiness::new();
        readiness.update(Ok(()));
        readiness.update(Err(Error::PollerThreadPanicked));
        assert!(readiness.wait(Duration::ZERO).unwrap());
    }
}
