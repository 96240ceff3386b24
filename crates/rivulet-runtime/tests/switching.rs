//! Threaded graph switching: two graphs with context-switch capable nodes
//! time-share the runtime threads.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use rivulet_core::{
    Capabilities, ContextSwitch, Event, EventId, Graph, GraphBuilder, Node, NodeError, NodeId,
    Payload, PoolSizes, Port, Progress, RunResult, RuntimeState,
};
use rivulet_runtime::{Report, Runtime, flags};

type Journal = Arc<StdMutex<Vec<String>>>;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Driver {
    label: String,
    journal: Journal,
}

impl ContextSwitch for Driver {
    fn pause(&mut self) -> Result<(), NodeError> {
        self.journal.lock().unwrap().push(format!("{} pause", self.label));
        Ok(())
    }

    fn resume(&mut self) -> Result<(), NodeError> {
        // slow resume widens the window in which an early event could slip through
        std::thread::sleep(Duration::from_millis(5));
        self.journal.lock().unwrap().push(format!("{} resume", self.label));
        Ok(())
    }
}

struct Device(Driver);

impl Node for Device {
    fn capabilities(&self) -> Capabilities {
        Capabilities::RUN
            .union(Capabilities::EVENTS)
            .union(Capabilities::CONTEXT_SWITCH)
    }

    fn run(&mut self) -> RunResult {
        std::thread::yield_now();
        Ok(Progress::Done)
    }

    fn process_event(&mut self, _port: Port, event: Event) {
        let v = event.payload.as_int().unwrap_or(-1);
        self.0
            .journal
            .lock()
            .unwrap()
            .push(format!("{} event {v}", self.0.label));
    }

    fn context_switch(&mut self) -> Option<&mut dyn ContextSwitch> {
        Some(&mut self.0)
    }
}

fn device_graph(state: &RuntimeState, name: &str, journal: &Journal) -> Graph {
    let mut b = GraphBuilder::new(name, state);
    for id in 0..3u16 {
        let driver = Driver {
            label: format!("{name}:{id}"),
            journal: journal.clone(),
        };
        b.add_node(id, Device(driver)).unwrap();
    }
    b.schedule(&[0, 1, 2]);
    b.build().unwrap()
}

fn wait_switched(rt: &Runtime, target: &str) {
    loop {
        match rt.reports().recv_timeout(TIMEOUT).unwrap() {
            Report::Switched { to, .. } if to == target => return,
            _ => {}
        }
    }
}

#[test]
fn switch_between_graphs_pauses_then_resumes_in_id_order() {
    let journal: Journal = Arc::default();
    let mut rt = Runtime::new(PoolSizes::default());
    let a = device_graph(rt.state(), "a", &journal);
    let b = device_graph(rt.state(), "b", &journal);
    let a = rt.add_graph(a).unwrap();
    rt.add_graph(b).unwrap();

    rt.start("a").unwrap();
    wait_switched(&rt, "a");
    assert_eq!(rt.handle().active().as_deref(), Some("a"));

    rt.switch_to("b").unwrap();
    wait_switched(&rt, "b");
    rt.switch_to("a").unwrap();
    wait_switched(&rt, "a");
    assert!(a.is_delivering());

    let dst = a.destination(NodeId::new(1), 0).unwrap();
    let ev = Event::new(EventId::VALUE).with_payload(Payload::Int(7));
    a.queue().push(dst, ev).unwrap();

    let deadline = Instant::now() + TIMEOUT;
    while !journal.lock().unwrap().iter().any(|l| l == "a:1 event 7") {
        assert!(Instant::now() < deadline, "event never delivered");
        std::thread::sleep(Duration::from_millis(2));
    }
    rt.stop().unwrap();

    let log = journal.lock().unwrap().clone();
    let switch: Vec<&str> = log
        .iter()
        .map(String::as_str)
        .filter(|l| !l.contains("event"))
        .take(15)
        .collect();
    assert_eq!(
        switch,
        [
            "a:0 resume",
            "a:1 resume",
            "a:2 resume",
            "a:0 pause",
            "a:1 pause",
            "a:2 pause",
            "b:0 resume",
            "b:1 resume",
            "b:2 resume",
            "b:0 pause",
            "b:1 pause",
            "b:2 pause",
            "a:0 resume",
            "a:1 resume",
            "a:2 resume",
        ]
    );
}

#[test]
fn event_pushed_while_resuming_waits_for_resume() {
    let journal: Journal = Arc::default();
    let mut rt = Runtime::new(PoolSizes::default());
    let a = device_graph(rt.state(), "a", &journal);
    let b = device_graph(rt.state(), "b", &journal);
    rt.add_graph(a).unwrap();
    let b = rt.add_graph(b).unwrap();

    // leave b with paused drivers so the next switch has to resume them
    rt.start("b").unwrap();
    wait_switched(&rt, "b");
    rt.switch_to("a").unwrap();
    wait_switched(&rt, "a");
    assert!(!b.queue().is_open());

    let injector = {
        let b = b.clone();
        std::thread::spawn(move || {
            let dst = b.destination(NodeId::new(0), 0).unwrap();
            let mut pending = Some(Event::new(EventId::VALUE).with_payload(Payload::Int(3)));
            while let Some(ev) = pending.take() {
                if let Err(err) = b.queue().push(dst.clone(), ev) {
                    pending = Some(err.into_event());
                    std::thread::yield_now();
                }
            }
        })
    };
    rt.switch_to("b").unwrap();
    injector.join().unwrap();
    wait_switched(&rt, "b");

    let deadline = Instant::now() + TIMEOUT;
    while !journal.lock().unwrap().iter().any(|l| l == "b:0 event 3") {
        assert!(Instant::now() < deadline, "event never delivered");
        std::thread::sleep(Duration::from_millis(2));
    }
    rt.stop().unwrap();

    let log = journal.lock().unwrap().clone();
    let event_at = log.iter().position(|l| l == "b:0 event 3").unwrap();
    let resumed_at = log.iter().rposition(|l| l == "b:2 resume").unwrap();
    assert!(event_at > resumed_at);
}

#[test]
fn switch_flag_rotates_through_graphs() {
    let journal: Journal = Arc::default();
    let mut rt = Runtime::new(PoolSizes::default());
    for name in ["a", "b", "c"] {
        let g = device_graph(rt.state(), name, &journal);
        rt.add_graph(g).unwrap();
    }
    rt.start("a").unwrap();
    wait_switched(&rt, "a");

    let handle = rt.handle();
    handle.flags().post(flags::SWITCH);
    wait_switched(&rt, "b");
    handle.switch_next();
    wait_switched(&rt, "c");
    handle.switch_next();
    wait_switched(&rt, "a");
    assert_eq!(handle.active().as_deref(), Some("a"));

    handle.stop();
    loop {
        if let Report::Stopped { graph, .. } = rt.reports().recv_timeout(TIMEOUT).unwrap() {
            assert_eq!(graph.as_deref(), Some("a"));
            break;
        }
    }
    rt.stop().unwrap();

    // resumed when first scheduled and again on the way back
    let log = journal.lock().unwrap();
    assert_eq!(log.iter().filter(|l| *l == "a:0 pause").count(), 2);
    assert_eq!(log.iter().filter(|l| *l == "a:0 resume").count(), 2);
    // b and c were each scheduled once
    assert_eq!(log.iter().filter(|l| *l == "b:0 resume").count(), 1);
    assert_eq!(log.iter().filter(|l| *l == "c:0 resume").count(), 1);
}

#[test]
fn restart_after_stop_resumes_paused_nodes() {
    let journal: Journal = Arc::default();
    let mut rt = Runtime::new(PoolSizes::default());
    let a = device_graph(rt.state(), "a", &journal);
    rt.add_graph(a).unwrap();

    rt.start("a").unwrap();
    wait_switched(&rt, "a");
    rt.stop().unwrap();
    rt.start("a").unwrap();
    wait_switched(&rt, "a");
    rt.stop().unwrap();

    let log = journal.lock().unwrap();
    assert_eq!(
        log.iter().filter(|l| l.starts_with("a:0")).cloned().collect::<Vec<_>>(),
        ["a:0 resume", "a:0 pause", "a:0 resume", "a:0 pause"]
    );
}

#[test]
fn first_switch_to_an_idle_graph_resumes_its_nodes() {
    let journal: Journal = Arc::default();
    let mut rt = Runtime::new(PoolSizes::default());
    for name in ["a", "b"] {
        let g = device_graph(rt.state(), name, &journal);
        rt.add_graph(g).unwrap();
    }
    rt.start("a").unwrap();
    wait_switched(&rt, "a");
    // b has never been scheduled
    assert!(journal.lock().unwrap().iter().all(|l| !l.starts_with("b:")));

    rt.switch_to("b").unwrap();
    loop {
        match rt.reports().recv_timeout(TIMEOUT).unwrap() {
            Report::Switched { to, paused, resumed, .. } if to == "b" => {
                assert_eq!(paused.switched, 3);
                assert_eq!(resumed.switched, 3);
                break;
            }
            _ => {}
        }
    }
    rt.stop().unwrap();

    let log = journal.lock().unwrap();
    let b: Vec<&str> = log
        .iter()
        .map(String::as_str)
        .filter(|l| l.starts_with("b:"))
        .collect();
    assert_eq!(
        b,
        ["b:0 resume", "b:1 resume", "b:2 resume", "b:0 pause", "b:1 pause", "b:2 pause"]
    );
}

#[test]
fn no_event_reaches_a_node_between_its_pause_and_resume() {
    let journal: Journal = Arc::default();
    let mut rt = Runtime::new(PoolSizes::default());
    let a = device_graph(rt.state(), "a", &journal);
    let b = device_graph(rt.state(), "b", &journal);
    let a = rt.add_graph(a).unwrap();
    rt.add_graph(b).unwrap();
    rt.start("a").unwrap();
    wait_switched(&rt, "a");

    let flooding = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let flooder = {
        let a = a.clone();
        let flooding = flooding.clone();
        std::thread::spawn(move || {
            let mut n = 0;
            while flooding.load(std::sync::atomic::Ordering::Relaxed) {
                let dst = a.destination(NodeId::new(n % 3), 0).unwrap();
                let ev = Event::new(EventId::VALUE).with_payload(Payload::Int(n as i32));
                if a.queue().push(dst, ev).is_err() {
                    std::thread::yield_now();
                }
                n = n.wrapping_add(1);
            }
        })
    };

    for target in ["b", "a", "b", "a", "b", "a"] {
        std::thread::sleep(Duration::from_millis(10));
        rt.switch_to(target).unwrap();
        wait_switched(&rt, target);
    }
    flooding.store(false, std::sync::atomic::Ordering::Relaxed);
    flooder.join().unwrap();
    rt.stop().unwrap();

    let log = journal.lock().unwrap();
    for id in 0..3 {
        let prefix = format!("a:{id} ");
        let mut paused = false;
        let mut delivered = 0;
        for line in log.iter().filter(|l| l.starts_with(&prefix)) {
            match &line[prefix.len()..] {
                "pause" => paused = true,
                "resume" => paused = false,
                _ => {
                    assert!(!paused, "a:{id} got an event while paused");
                    delivered += 1;
                }
            }
        }
        assert!(delivered > 0, "a:{id} never got an event");
    }
}
