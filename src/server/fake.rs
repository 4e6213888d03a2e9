use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use serde_json::json;

use crate::{FlagClient, Target};

/// Fixed-answer client for handler tests. Records every evaluated target.
pub(crate) struct FakeClient {
    initialized: AtomicBool,
    survives_destroy: bool,
    pub targets: Mutex<Vec<Target>>,
}

impl FakeClient {
    pub fn new(initialized: bool) -> FakeClient {
        FakeClient {
            initialized: AtomicBool::new(initialized),
            survives_destroy: false,
            targets: Mutex::new(Vec::new()),
        }
    }

    /// A ready client that stays initialized after `destroy`.
    pub fn survives_destroy() -> FakeClient {
        FakeClient {
            survives_destroy: true,
            ..FakeClient::new(true)
        }
    }

    fn record(&self, target: &Target) {
        self.targets.lock().unwrap().push(target.clone());
    }
}

impl FlagClient for FakeClient {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn wait_for_initialization(&self, _timeout: Duration) -> bool {
        self.is_initialized()
    }

    fn destroy(&self) {
        if !self.survives_destroy {
            self.initialized.store(false, Ordering::SeqCst);
        }
    }

    fn bool_variation(&self, flag_key: &str, target: &Target, default: bool) -> bool {
        self.record(target);
        match flag_key {
            "flag1" => true,
            _ => default,
        }
    }

    fn number_variation(&self, flag_key: &str, target: &Target, default: f64) -> f64 {
        self.record(target);
        match flag_key {
            "count" => 42.0,
            "ratio" => 0.5,
            _ => default,
        }
    }

    fn string_variation(&self, flag_key: &str, target: &Target, default: &str) -> String {
        self.record(target);
        match flag_key {
            "color" => "blue".to_owned(),
            _ => default.to_owned(),
        }
    }

    fn json_variation(
        &self,
        flag_key: &str,
        target: &Target,
        default: serde_json::Value,
    ) -> serde_json::Value {
        self.record(target);
        match flag_key {
            "settings" => json!({"theme": "dark"}),
            _ => default,
        }
    }
}
