//! Test helpers shared by the tns-submit integration tests

pub mod fake_services;

pub use fake_services::{feedback_reply, FakeServices, RecordedRequest, REPORT_ID};

use std::time::Duration;
use tns_submit::config::{HttpTimeouts, RegistrySettings, RelaySettings, SubmitSettings};
use tns_submit::services::{MeasurementMapping, PollPolicy};

/// Direct-mode settings pointing at a fake server root
pub fn registry_settings(root: &str) -> SubmitSettings {
    SubmitSettings {
        registry: RegistrySettings {
            base_url: format!("{}/api", root),
            bot_id: Some(1234),
            bot_name: Some("test_bot".to_string()),
            api_key: Some("registry-key".to_string()),
            group_names: Vec::new(),
            default_authors: None,
            mapping: MeasurementMapping::default(),
            timeouts: HttpTimeouts::default(),
        },
        relay: None,
        polling: PollPolicy {
            max_attempts: 10,
            interval: Duration::from_millis(5),
        },
    }
}

/// Relay-mode settings pointing at the same fake server
pub fn relay_settings(root: &str) -> SubmitSettings {
    let mut settings = registry_settings(root);
    settings.relay = Some(RelaySettings {
        enable: true,
        base_url: Some(format!("{}/", root)),
        api_key: Some("relay-key".to_string()),
        default_authors: Some("Relay Team".to_string()),
        mapping: MeasurementMapping::default(),
    });
    settings
}
