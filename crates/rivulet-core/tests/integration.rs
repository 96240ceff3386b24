//! End-to-end scenarios for rivulet-core: data-flow cycles, event ordering and
//! expiry, tensors crossing the event queue, and the graph switch protocol.

use std::sync::{Arc, Mutex as StdMutex};

use rivulet_core::{
    Block, BlockPool, BufferHandle, Capabilities, Channel, ContextSwitch, Destination, Event,
    EventId, EventOutput, ExitReason, Graph, GraphBuilder, Node, NodeError, NodeId, Payload, Port,
    Priority, Progress, PushError, RunResult, RuntimeState, ScheduleSignal, Scheduler, Ttl,
};

const BLOCK: usize = 4;

// ---------------------------------------------------------------------------
// Data-flow nodes
// ---------------------------------------------------------------------------

struct Ramp {
    out: Channel<f32>,
    next: f32,
}

impl Node for Ramp {
    fn prepare(&mut self) -> bool {
        !self.out.will_overflow_with(BLOCK)
    }

    fn run(&mut self) -> RunResult {
        let mut v = self.next;
        self.out.write_with(BLOCK, |w| {
            for s in w {
                *s = v;
                v += 1.0;
            }
        });
        self.next = v;
        Ok(Progress::Done)
    }
}

struct Gain {
    input: Channel<f32>,
    out: Channel<f32>,
}

impl Node for Gain {
    fn prepare(&mut self) -> bool {
        !self.input.will_underflow_with(BLOCK) && !self.out.will_overflow_with(BLOCK)
    }

    fn run(&mut self) -> RunResult {
        let mut block = [0.0f32; BLOCK];
        self.input.read_with(BLOCK, |r| block.copy_from_slice(r));
        self.out.write_with(BLOCK, |w| {
            for (o, i) in w.iter_mut().zip(block) {
                *o = i * 2.0;
            }
        });
        Ok(Progress::Done)
    }
}

struct Sink {
    input: Channel<f32>,
    seen: Arc<StdMutex<Vec<f32>>>,
    lag: u32,
    calls: u32,
}

impl Node for Sink {
    fn run(&mut self) -> RunResult {
        self.calls += 1;
        if self.lag > 0 && self.calls % self.lag != 0 {
            return Ok(Progress::Skip);
        }
        if self.input.will_underflow_with(BLOCK) {
            return Ok(Progress::Skip);
        }
        let seen = self.seen.clone();
        self.input
            .read_with(BLOCK, |r| seen.lock().unwrap().extend_from_slice(r));
        Ok(Progress::Done)
    }
}

fn pipeline(state: &RuntimeState, lag: u32) -> (Graph, Arc<StdMutex<Vec<f32>>>) {
    let seen = Arc::new(StdMutex::new(Vec::new()));
    let mut b = GraphBuilder::new("pipeline", state);
    let raw = b.channel::<f32>("raw", 4);
    let doubled = b.channel::<f32>("doubled", 4);
    b.add_node(0, Ramp { out: raw.clone(), next: 0.0 }).unwrap();
    b.add_node(1, Gain { input: raw, out: doubled.clone() }).unwrap();
    b.add_node(
        2,
        Sink {
            input: doubled,
            seen: seen.clone(),
            lag,
            calls: 0,
        },
    )
    .unwrap();
    b.schedule(&[0, 1, 2]);
    (b.build().unwrap(), seen)
}

#[test]
fn normal_cycle_doubles_every_sample() {
    let state = RuntimeState::default();
    let (graph, seen) = pipeline(&state, 0);
    graph.activate();
    let exit = Scheduler::new(&graph).max_cycles(3).run(&ScheduleSignal::new());
    assert_eq!(exit.reason, ExitReason::Completed);
    assert_eq!(exit.skips, 0);
    let expected: Vec<f32> = (0..12).map(|i| i as f32 * 2.0).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
}

#[test]
fn lagging_sink_causes_skips_not_corruption() {
    let state = RuntimeState::default();
    let (graph, seen) = pipeline(&state, 3);
    graph.activate();
    let exit = Scheduler::new(&graph).max_cycles(30).run(&ScheduleSignal::new());
    assert_eq!(exit.reason, ExitReason::Completed);
    assert!(exit.skips > 0);
    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    for (i, v) in seen.iter().enumerate() {
        assert_eq!(*v, i as f32 * 2.0, "sample {i} corrupted");
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Listener {
    log: Arc<StdMutex<Vec<i32>>>,
}

impl Node for Listener {
    fn capabilities(&self) -> Capabilities {
        Capabilities::EVENTS
    }

    fn process_event(&mut self, _port: Port, event: Event) {
        self.log.lock().unwrap().push(event.payload.as_int().unwrap_or(-1));
    }
}

fn listener_graph(state: &RuntimeState) -> (Graph, Arc<StdMutex<Vec<i32>>>) {
    let log = Arc::new(StdMutex::new(Vec::new()));
    let mut b = GraphBuilder::new("events", state);
    b.add_node(0, Listener { log: log.clone() }).unwrap();
    let g = b.build().unwrap();
    g.activate();
    (g, log)
}

fn int_event(v: i32, priority: Priority) -> Event {
    Event::new(EventId::VALUE)
        .with_priority(priority)
        .with_payload(Payload::Int(v))
}

#[test]
fn higher_priority_first_then_fifo() {
    let state = RuntimeState::default();
    let (g, log) = listener_graph(&state);
    let dst = g.destination(NodeId::new(0), 0).unwrap();
    g.queue().push(dst.clone(), int_event(1, Priority::High)).unwrap();
    g.queue().push(dst.clone(), int_event(2, Priority::Normal)).unwrap();
    g.queue().push(dst, int_event(3, Priority::High)).unwrap();
    g.queue().dispatch_pending();
    assert_eq!(*log.lock().unwrap(), vec![1, 3, 2]);
}

#[test]
fn expired_event_is_never_delivered() {
    let state = RuntimeState::default();
    let (g, log) = listener_graph(&state);
    let dst = g.destination(NodeId::new(0), 0).unwrap();
    g.queue()
        .push(dst, int_event(9, Priority::Normal).with_ttl(Ttl::Ticks(5)))
        .unwrap();
    for _ in 0..6 {
        g.clock().advance();
    }
    assert_eq!(g.queue().dispatch_pending(), 0);
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(g.queue().stats().expired, 1);
}

#[test]
fn event_within_ttl_is_delivered() {
    let state = RuntimeState::default();
    let (g, log) = listener_graph(&state);
    let dst = g.destination(NodeId::new(0), 0).unwrap();
    g.queue()
        .push(dst, int_event(9, Priority::Normal).with_ttl(Ttl::Ticks(5)))
        .unwrap();
    for _ in 0..5 {
        g.clock().advance();
    }
    assert_eq!(g.queue().dispatch_pending(), 1);
    assert_eq!(*log.lock().unwrap(), vec![9]);
}

#[test]
fn exhausted_pool_is_backpressure() {
    let state = RuntimeState::new(rivulet_core::PoolSizes {
        events: 2,
        buffers: 2,
        locks: 2,
    });
    let (g, _log) = listener_graph(&state);
    let dst = g.destination(NodeId::new(0), 0).unwrap();
    g.queue().push(dst.clone(), int_event(1, Priority::Low)).unwrap();
    g.queue().push(dst.clone(), int_event(2, Priority::Low)).unwrap();
    let refused = g.queue().push(dst, int_event(3, Priority::High)).unwrap_err();
    assert!(matches!(refused, PushError::Exhausted(_)));
    assert_eq!(state.usage().events, 2);
    g.queue().dispatch_pending();
    assert_eq!(state.usage().events, 0);
}

// A producer that publishes a pooled tensor to every subscriber.
struct Publisher {
    out: EventOutput,
    blocks: Arc<BlockPool<f32>>,
    state: Arc<RuntimeState>,
    sent: u32,
}

impl Node for Publisher {
    fn capabilities(&self) -> Capabilities {
        Capabilities::RUN.union(Capabilities::PUBLISH)
    }

    fn subscribe(&mut self, output: Port, destination: Destination) -> bool {
        if output != 0 {
            return false;
        }
        self.out.subscribe(destination);
        true
    }

    fn run(&mut self) -> RunResult {
        let Some(mut block) = Block::from_pool(&self.blocks) else {
            return Ok(Progress::Skip);
        };
        block.fill(self.sent as f32);
        let tensor = BufferHandle::create_with(self.state.tensors(), 1, &[2], block)
            .map_err(|_| NodeError::MemoryAllocation)?;
        let event = Event::new(EventId::VALUE).with_payload(Payload::tensor(tensor));
        if self.out.send_async(event) {
            self.sent += 1;
        }
        Ok(Progress::Done)
    }
}

struct TensorReader {
    sums: Arc<StdMutex<Vec<f32>>>,
}

impl Node for TensorReader {
    fn process_event(&mut self, _port: Port, event: Event) {
        if let Ok(tensor) = event.payload.take_tensor::<f32>() {
            let sum = tensor.lock_shared(|d| d.iter().sum::<f32>()).unwrap();
            self.sums.lock().unwrap().push(sum);
        }
    }
}

#[test]
fn tensor_fan_out_returns_block_once() {
    let state = Arc::new(RuntimeState::default());
    let blocks = BlockPool::<f32>::new(1, 2);
    let sums = Arc::new(StdMutex::new(Vec::new()));

    let mut b = GraphBuilder::new("tensors", &state);
    let out = EventOutput::new(b.queue().clone());
    b.add_node(
        0,
        Publisher {
            out,
            blocks: blocks.clone(),
            state: state.clone(),
            sent: 0,
        },
    )
    .unwrap();
    b.add_node(1, TensorReader { sums: sums.clone() }).unwrap();
    b.add_node(2, TensorReader { sums: sums.clone() }).unwrap();
    b.subscribe(0, 0, 1, 0).subscribe(0, 0, 2, 0);
    b.schedule(&[0]);
    let g = b.build().unwrap();
    g.activate();

    let exit = Scheduler::new(&g).max_cycles(1).run(&ScheduleSignal::new());
    assert_eq!(exit.skips, 0);
    assert_eq!(blocks.available(), 0);
    assert_eq!(state.usage().buffers, 1);

    g.queue().dispatch_pending();
    assert_eq!(*sums.lock().unwrap(), vec![0.0, 0.0]);
    assert_eq!(blocks.available(), 1);
    assert_eq!(state.usage().buffers, 0);
    assert_eq!(state.usage().locks, 0);
}

#[test]
fn pause_discards_pending_tensors() {
    let state = Arc::new(RuntimeState::default());
    let blocks = BlockPool::<f32>::new(1, 2);
    let mut b = GraphBuilder::new("tensors", &state);
    let out = EventOutput::new(b.queue().clone());
    b.add_node(
        0,
        Publisher {
            out,
            blocks: blocks.clone(),
            state: state.clone(),
            sent: 0,
        },
    )
    .unwrap();
    b.add_node(1, TensorReader { sums: Arc::default() }).unwrap();
    b.subscribe(0, 0, 1, 0);
    b.schedule(&[0]);
    let g = b.build().unwrap();
    g.activate();
    Scheduler::new(&g).max_cycles(1).run(&ScheduleSignal::new());
    assert_eq!(blocks.available(), 0);

    let report = g.deactivate();
    assert_eq!(report.discarded, 1);
    assert_eq!(blocks.available(), 1);
    assert_eq!(state.usage().events, 0);
}

// ---------------------------------------------------------------------------
// Graph switch
// ---------------------------------------------------------------------------

type Journal = Arc<StdMutex<Vec<String>>>;

struct Peripheral {
    graph: &'static str,
    id: u16,
    journal: Journal,
    started: bool,
}

impl ContextSwitch for Peripheral {
    fn pause(&mut self) -> Result<(), NodeError> {
        if self.started {
            self.started = false;
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{} stop", self.graph, self.id));
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<(), NodeError> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{} resume", self.graph, self.id));
        Ok(())
    }
}

struct Device(Peripheral);

impl Node for Device {
    fn capabilities(&self) -> Capabilities {
        Capabilities::RUN
            .union(Capabilities::CONTEXT_SWITCH)
            .union(Capabilities::EVENTS)
    }

    fn run(&mut self) -> RunResult {
        if !self.0.started {
            self.0.started = true;
            self.0
                .journal
                .lock()
                .unwrap()
                .push(format!("{}:{} start", self.0.graph, self.0.id));
        }
        Ok(Progress::Done)
    }

    fn process_event(&mut self, _port: Port, event: Event) {
        self.0.journal.lock().unwrap().push(format!(
            "{}:{} event {}",
            self.0.graph,
            self.0.id,
            event.payload.as_int().unwrap_or(-1)
        ));
    }

    fn context_switch(&mut self) -> Option<&mut dyn ContextSwitch> {
        Some(&mut self.0)
    }
}

fn device_graph(state: &RuntimeState, name: &'static str, journal: &Journal) -> Graph {
    let mut b = GraphBuilder::new(name, state);
    // added out of order on purpose
    for id in [2u16, 0, 1] {
        b.add_node(
            id,
            Device(Peripheral {
                graph: name,
                id,
                journal: journal.clone(),
                started: false,
            }),
        )
        .unwrap();
    }
    b.schedule(&[1, 2, 0]);
    b.build().unwrap()
}

#[test]
fn switch_pauses_and_resumes_in_id_order() {
    let state = RuntimeState::default();
    let journal: Journal = Arc::default();
    let a = device_graph(&state, "A", &journal);
    let b = device_graph(&state, "B", &journal);

    a.activate();
    Scheduler::new(&a).max_cycles(1).run(&ScheduleSignal::new());
    journal.lock().unwrap().clear();

    // A -> B
    let signal = ScheduleSignal::new();
    assert!(a.begin_pause());
    signal.request_pause();
    assert_eq!(Scheduler::new(&a).run(&signal).reason, ExitReason::Paused);
    a.complete_pause();

    let dst = b.destination(NodeId::new(1), 0).unwrap();
    assert!(matches!(
        b.queue().push(dst.clone(), int_event(5, Priority::High)),
        Err(PushError::Closed(_))
    ));
    b.begin_resume();
    b.queue().push(dst, int_event(6, Priority::High)).unwrap();
    // the event thread only drains a delivering graph
    assert!(!b.is_delivering());
    b.complete_resume();
    assert!(b.is_delivering());
    b.queue().dispatch_pending();

    let journal = journal.lock().unwrap();
    assert_eq!(
        *journal,
        vec![
            "A:0 stop", "A:1 stop", "A:2 stop", "B:0 resume", "B:1 resume", "B:2 resume",
            "B:1 event 6",
        ]
    );
}

#[test]
fn pause_of_never_started_driver_is_idempotent() {
    let state = RuntimeState::default();
    let journal: Journal = Arc::default();
    let a = device_graph(&state, "A", &journal);
    a.activate();
    a.deactivate();
    a.deactivate();
    a.activate();
    a.activate();
    let journal = journal.lock().unwrap();
    // never ran, so never stopped; resumed once per activation
    assert_eq!(
        *journal,
        vec![
            "A:0 resume", "A:1 resume", "A:2 resume", "A:0 resume", "A:1 resume", "A:2 resume",
        ]
    );
}
