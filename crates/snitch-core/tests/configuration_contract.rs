//! Architectural Contract Test: Configuration Validation
//!
//! This test verifies that the snitch refuses to start without a placement.
//!
//! Constraints verified:
//! - Missing or blank dc/rack is a configuration error
//! - The check does not depend on prefer_local or the static table
//! - Configuration errors are the only fatal ones
//!
//! If this test fails, someone has:
//! - Defaulted the local placement instead of failing
//! - Made the check depend on optional collaborators

mod common;

use common::*;
use snitch_core::{Error, GossipingSnitch, SnitchConfig};

fn incomplete_configs() -> Vec<SnitchConfig> {
    vec![
        SnitchConfig {
            dc: None,
            rack: Some("r1".into()),
            ..SnitchConfig::default()
        },
        SnitchConfig {
            dc: Some("dc1".into()),
            rack: None,
            ..SnitchConfig::default()
        },
        SnitchConfig::default(),
        SnitchConfig {
            dc: Some("  ".into()),
            rack: Some("r1".into()),
            ..SnitchConfig::default()
        },
        SnitchConfig {
            dc: Some("dc1".into()),
            rack: Some("".into()),
            ..SnitchConfig::default()
        },
    ]
}

#[tokio::test]
async fn missing_placement_fails_in_every_mode() {
    for with_static in [false, true] {
        for prefer_local in [false, true] {
            for config in incomplete_configs() {
                let harness = if with_static {
                    Harness::new().with_static_topology("dc9", "r9")
                } else {
                    Harness::new()
                };
                let config = config.with_prefer_local(prefer_local);

                let result = GossipingSnitch::new(&config, harness.collaborators());

                match result {
                    Err(e) => {
                        assert!(matches!(e, Error::Config(_)), "unexpected error: {}", e);
                        assert!(e.is_fatal());
                    }
                    Ok(_) => panic!(
                        "accepted {:?} (static={}, prefer_local={})",
                        config, with_static, prefer_local
                    ),
                }
            }
        }
    }
}

#[tokio::test]
async fn placement_values_are_trimmed() {
    let harness = Harness::new();
    let config = SnitchConfig::new(" dc1 ", "r1\t");

    let snitch = harness.snitch_with(&config);

    assert_eq!(snitch.identity().datacenter, "dc1");
    assert_eq!(snitch.identity().rack, "r1");
}

#[tokio::test]
async fn properties_file_drives_construction() {
    let config = SnitchConfig::from_properties(
        "# local placement\ndc=dc1\nrack=r1\nprefer_local=true\n",
    )
    .unwrap();
    let harness = Harness::new();

    let snitch = harness.snitch_with(&config);

    assert!(snitch.identity().prefer_local);
}
