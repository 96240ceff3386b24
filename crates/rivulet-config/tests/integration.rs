//! Integration tests for rivulet-config.
//!
//! File round trips and error reporting across modules.

use rivulet_config::{
    ChannelConfig, ConfigError, ElementKind, GraphConfig, NodeConfig, PoolConfig, ResetPolicy,
    RuntimeConfig, SubscriptionConfig, TtlClock, ValidationError, builtin,
};
use tempfile::TempDir;

fn sample() -> RuntimeConfig {
    RuntimeConfig::new()
        .with_pools(PoolConfig {
            event_pool: 32,
            buffer_pool: 8,
            lock_pool: 8,
        })
        .with_graph(
            GraphConfig::new("appa")
                .with_description("capture")
                .with_channel(ChannelConfig::new("frames", 16).with_element(ElementKind::I16))
                .with_node(NodeConfig::new(0, "simulated_capture").with_output("frames"))
                .with_node(
                    NodeConfig::new(1, "tensor_publisher")
                        .with_input("frames")
                        .with_param("ttl", 10),
                )
                .with_node(NodeConfig::new(2, "event_logger").with_param("label", "a"))
                .with_subscription(SubscriptionConfig::new(1, 2).with_ports(0, 1))
                .with_schedule([0, 1])
                .with_channel_reset(ResetPolicy::Keep)
                .with_ttl_clock(TtlClock::Millis),
        )
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("graphs.toml");

    let config = sample();
    config.save(&path).unwrap();
    assert!(path.exists());

    let loaded = RuntimeConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.graph("appa").unwrap().ttl_clock, TtlClock::Millis);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_load_missing_file_is_read_error() {
    let dir = TempDir::new().unwrap();
    let err = RuntimeConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
}

#[test]
fn test_validation_error_converts_to_config_error() {
    let mut config = sample();
    config.graphs[0].schedule.push(7);
    let err: ConfigError = config.validate().unwrap_err().into();
    assert!(matches!(
        err,
        ConfigError::Validation(ValidationError::UnknownScheduledNode { id: 7, .. })
    ));
    assert!(err.to_string().starts_with("validation failed"));
}

#[test]
fn test_builtin_saved_copy_matches() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("switching.toml");
    let config = builtin("switching").unwrap();
    config.save(&path).unwrap();
    assert_eq!(RuntimeConfig::load(&path).unwrap(), config);
}

#[test]
fn test_spec_style_document() {
    let text = r#"
        [runtime]
        event_pool = 20
        buffer_pool = 20
        lock_pool = 20

        [[graphs]]
        name = "appa"
        schedule = [0, 1, 2]
        channel_reset = "cursors"
        ttl_clock = "cycles"

        [[graphs.channels]]
        name = "raw"
        element = "f32"
        capacity = 4

        [[graphs.nodes]]
        id = 0
        kind = "ramp_source"
        outputs = ["raw"]
        [graphs.nodes.params]
        block = 4

        [[graphs.nodes]]
        id = 1
        kind = "level_meter"
        inputs = ["raw"]

        [[graphs.nodes]]
        id = 2
        kind = "event_logger"

        [[graphs.nodes]]
        id = 3
        kind = "event_logger"

        [[graphs.subscriptions]]
        from = 1
        output = 0
        to = 3
        input = 0
    "#;
    let config = RuntimeConfig::from_toml(text).unwrap();
    config.validate().unwrap();
    let g = config.graph("appa").unwrap();
    assert_eq!(g.node(0).unwrap().param_usize("block").unwrap(), Some(4));
    assert_eq!(g.subscriptions, [SubscriptionConfig::new(1, 3)]);
}
