//! Graphs built from configuration, run by the scheduler and by the
//! threaded runtime.

use std::time::Duration;

use rivulet_config::{
    ChannelConfig, GraphConfig, NodeConfig, RuntimeConfig, SubscriptionConfig, TtlClock, builtin,
};
use rivulet_core::{
    EventOutput, ExitReason, GraphBuilder, NodeError, NodeId, PoolSizes, Progress,
    RuntimeState, ScheduleSignal, Scheduler,
};
use rivulet_nodes::{
    CollectSink, EventLogger, FactoryError, Gain, LevelMeter, NodeRegistry, RampSource,
    SimulatedCapture,
};
use rivulet_runtime::{Report, Runtime};

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn source_gain_sink_doubles_and_skips_when_sink_lags() {
    let state = RuntimeState::default();
    let mut b = GraphBuilder::new("normal", &state);
    let raw = b.channel::<f32>("raw", 4);
    let scaled = b.channel::<f32>("scaled", 4);
    let (sink, collected) = CollectSink::new(scaled.clone(), 4, 8);
    b.add_node(0, RampSource::new(raw.clone(), 4).with_start(1.0))
        .unwrap();
    b.add_node(1, Gain::new(raw, scaled, 4).with_factor(2.0))
        .unwrap();
    b.add_node(2, sink).unwrap();
    b.schedule(&[0, 1, 2]);
    let graph = b.build().unwrap();
    graph.activate();

    let exit = Scheduler::new(&graph).max_cycles(2).run(&ScheduleSignal::new());
    assert_eq!(exit.cycles, 2);
    assert_eq!(exit.skips, 0);
    assert_eq!(
        *collected.lock(),
        [2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0]
    );

    // The sink is full; upstream fills and then skips instead of overwriting.
    let exit = Scheduler::new(&graph).max_cycles(3).run(&ScheduleSignal::new());
    assert_eq!(exit.reason, ExitReason::Completed);
    assert!(exit.skips > 0);
    assert_eq!(collected.lock().len(), 8);
    let slot = graph.node(NodeId::new(0)).unwrap();
    assert_eq!(slot.lock().run(), Ok(Progress::Skip));
    graph.teardown();
}

#[test]
fn meter_peaks_reach_logger_through_the_queue() {
    let state = RuntimeState::default();
    let mut b = GraphBuilder::new("meter", &state);
    let raw = b.channel::<f32>("raw", 4);
    let meter = LevelMeter::new(raw.clone(), 4, EventOutput::new(b.queue().clone())).with_every(2);
    let meter_stats = meter.stats();
    let logger = EventLogger::new("peaks");
    let logger_stats = logger.stats();
    b.add_node(0, RampSource::new(raw, 4)).unwrap();
    b.add_node(1, meter).unwrap();
    b.add_node(2, logger).unwrap();
    b.subscribe(1, 0, 2, 0).schedule(&[0, 1]);
    let graph = b.build().unwrap();
    graph.activate();

    Scheduler::new(&graph).max_cycles(4).run(&ScheduleSignal::new());
    assert_eq!(meter_stats.published(), 2);
    assert_eq!(graph.queue().dispatch_pending(), 2);
    assert_eq!(logger_stats.values(), 2);
    // Second report covers samples 8..=15.
    assert_eq!(logger_stats.last_value(), 15.0);
    graph.teardown();
}

#[test]
fn every_builtin_builds_and_runs() {
    let registry = NodeRegistry::new();
    for name in rivulet_config::BUILTIN_NAMES {
        let config = builtin(name).unwrap();
        let state = RuntimeState::new(config.pool_sizes());
        for graph_config in &config.graphs {
            let graph = registry.build_graph(graph_config, &state).unwrap();
            graph.activate();
            let exit = Scheduler::new(&graph).max_cycles(600).run(&ScheduleSignal::new());
            assert_eq!(exit.reason, ExitReason::Completed, "{name}/{}", graph.name());
            graph.queue().dispatch_pending();
            graph.teardown();
        }
        assert!(state.teardown());
    }
}

#[test]
fn capture_fault_terminates_the_cycle() {
    let config = GraphConfig::new("faulty")
        .with_channel(ChannelConfig::new("frames", 8))
        .with_node(
            NodeConfig::new(0, "simulated_capture")
                .with_output("frames")
                .with_param("block", 4)
                .with_param("fail_after", 3),
        )
        .with_node(NodeConfig::new(1, "null_sink").with_input("frames"))
        .with_schedule([0, 1]);
    let state = RuntimeState::default();
    let graph = NodeRegistry::new().build_graph(&config, &state).unwrap();
    graph.activate();

    let exit = Scheduler::new(&graph).run(&ScheduleSignal::new());
    assert_eq!(exit.cycles, 3);
    assert_eq!(
        exit.reason,
        ExitReason::Failed {
            node: NodeId::new(0),
            error: NodeError::Os
        }
    );
    assert!(exit.is_failure());
    graph.teardown();
}

#[test]
fn capture_driver_follows_graph_pause_and_resume() {
    let state = RuntimeState::default();
    let mut b = GraphBuilder::new("capture", &state);
    let frames = b.channel::<f32>("frames", 8);
    let capture = SimulatedCapture::new(frames, 4);
    let stats = capture.stats();
    b.add_node(0, capture).unwrap();
    b.schedule(&[0]);
    let graph = b.build().unwrap();
    assert_eq!(stats.starts(), 0, "driver idle until the graph is resumed");

    graph.activate();
    assert_eq!(stats.starts(), 1);
    graph.deactivate();
    assert_eq!(stats.stops(), 1);
    assert!(!stats.is_running());

    // Pausing a paused graph must not stop the driver again.
    graph.deactivate();
    assert_eq!(stats.stops(), 1);

    graph.activate();
    graph.activate();
    assert_eq!(stats.starts(), 2);
    assert!(stats.is_running());
    graph.teardown();
}

#[test]
fn only_the_active_graph_runs_its_capture_driver() {
    let state = RuntimeState::default();
    let mut drivers = Vec::new();
    let mut graphs = Vec::new();
    for name in ["appa", "appb"] {
        let mut b = GraphBuilder::new(name, &state);
        let frames = b.channel::<f32>("frames", 8);
        let capture = SimulatedCapture::new(frames, 4);
        drivers.push(capture.stats());
        b.add_node(0, capture).unwrap();
        b.schedule(&[0]);
        graphs.push(b.build().unwrap());
    }
    let (a, b) = (&graphs[0], &graphs[1]);
    let (da, db) = (&drivers[0], &drivers[1]);
    assert!(!da.is_running() && !db.is_running());

    a.activate();
    assert!(da.is_running());
    assert!(!db.is_running(), "an idle graph's driver must stay stopped");

    // switch to a graph that has never been scheduled
    a.deactivate();
    b.activate();
    assert!(!da.is_running());
    assert!(db.is_running());
    assert_eq!((da.starts(), da.stops()), (1, 1));
    assert_eq!((db.starts(), db.stops()), (1, 0));

    for g in &graphs {
        g.teardown();
    }
}

#[test]
fn millis_ttl_clock_builds() {
    let config = GraphConfig::new("wall")
        .with_ttl_clock(TtlClock::Millis)
        .with_channel(ChannelConfig::new("raw", 4))
        .with_node(NodeConfig::new(0, "ramp_source").with_output("raw"))
        .with_node(
            NodeConfig::new(1, "level_meter")
                .with_input("raw")
                .with_param("ttl", 1000)
                .with_param("priority", "high"),
        )
        .with_node(NodeConfig::new(2, "event_logger"))
        .with_subscription(SubscriptionConfig::new(1, 2))
        .with_schedule([0, 1]);
    let state = RuntimeState::default();
    let graph = NodeRegistry::new().build_graph(&config, &state).unwrap();
    graph.activate();
    Scheduler::new(&graph).max_cycles(3).run(&ScheduleSignal::new());
    assert_eq!(graph.queue().dispatch_pending(), 3);
    graph.teardown();
}

#[test]
fn bad_parameter_is_reported_with_node() {
    let config = GraphConfig::new("bad")
        .with_channel(ChannelConfig::new("raw", 4))
        .with_node(
            NodeConfig::new(0, "ramp_source")
                .with_output("raw")
                .with_param("block", 8),
        );
    let state = RuntimeState::default();
    let err = NodeRegistry::new().build_graph(&config, &state).unwrap_err();
    assert!(matches!(err, FactoryError::InvalidNode { node: 0, .. }));
    assert!(err.to_string().contains("capacity 4"));
}

#[test]
fn switching_config_runs_on_the_threaded_runtime() {
    let config = builtin("switching").unwrap();
    let mut rt = Runtime::new(config.pool_sizes());
    let graphs = NodeRegistry::new().load_into(&config, &mut rt).unwrap();
    assert_eq!(graphs.len(), 2);
    assert_eq!(rt.graph_names(), ["appa", "appb"]);

    rt.start("appa").unwrap();
    let mut switched = Vec::new();
    while switched.len() < 3 {
        match rt.reports().recv_timeout(TIMEOUT).unwrap() {
            Report::Switched { from, to, paused, .. } => {
                if from.as_deref() == Some("appa") {
                    // Only the capture node can be paused.
                    assert_eq!(paused.switched, 1);
                }
                switched.push(to);
                if switched.len() < 3 {
                    std::thread::sleep(Duration::from_millis(20));
                    rt.handle().switch_next();
                }
            }
            report => assert!(!report.is_failure(), "{report:?}"),
        }
    }
    rt.stop().unwrap();
    assert_eq!(switched, ["appa", "appb", "appa"]);
}

#[test]
fn load_into_rejects_invalid_config() {
    let mut rt = Runtime::new(PoolSizes::default());
    let err = NodeRegistry::new()
        .load_into(&RuntimeConfig::new(), &mut rt)
        .unwrap_err();
    assert!(matches!(err, FactoryError::Validation(_)));
}
