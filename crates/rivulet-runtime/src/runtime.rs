//! Threaded host for one or more graphs.
//!
//! A started [`Runtime`] owns three threads:
//!
//! - **data-flow**: waits for `RUN`, then drives the active graph's
//!   [`Scheduler`] until it pauses, stops, fails or runs out of cycles;
//! - **events**: drains the active graph's queue while that graph is
//!   delivering, sleeping on the `EVENTS` flag in between;
//! - **control**: waits on the runtime's [`EventFlags`] for `SWITCH` and
//!   `STOP` and walks graphs through the pause/resume protocol.
//!
//! The active graph is published through an `ArcSwapOption`, so the event
//! thread reads it without taking a lock. Everything the application needs
//! to hear about arrives as a [`Report`] on a crossbeam channel.
//!
//! ```rust,no_run
//! use rivulet_core::{GraphBuilder, Node, PoolSizes};
//! use rivulet_runtime::Runtime;
//!
//! struct Idle;
//! impl Node for Idle {}
//!
//! let mut runtime = Runtime::new(PoolSizes::default());
//! let mut builder = GraphBuilder::new("appa", runtime.state());
//! builder.add_node(0, Idle).unwrap();
//! builder.schedule(&[0]);
//! let graph = builder.build().unwrap();
//! runtime.add_graph(graph).unwrap();
//!
//! runtime.start("appa").unwrap();
//! // ... switch_to(), reports() ...
//! runtime.stop().unwrap();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, RwLock};
use rivulet_core::{Graph, PoolSizes, RuntimeState, ScheduleSignal, Scheduler, SwitchReport};

use crate::error::RuntimeError;
use crate::flags::{self, EventFlags};
use crate::report::Report;
use crate::spawn::{Spawner, StdSpawner, TaskHandle};

/// How long the event thread sleeps when nothing wakes it.
pub const DEFAULT_EVENT_POLL: Duration = Duration::from_millis(5);

const IDLE_POLL: Duration = Duration::from_millis(2);

/// State shared by the runtime, its threads and every [`RuntimeHandle`].
struct Shared {
    graphs: RwLock<Vec<Arc<Graph>>>,
    active: ArcSwapOption<Graph>,
    pending: Mutex<Option<usize>>,
    signal: ScheduleSignal,
    control: EventFlags,
    dataflow: EventFlags,
    events: Arc<EventFlags>,
    busy: AtomicBool,
    // held by the event thread around each delivery
    delivery: Mutex<()>,
    shutdown: AtomicBool,
    max_cycles: Option<u32>,
    event_poll: Duration,
    reports: Sender<Report>,
}

impl Shared {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.graphs.read().iter().position(|g| g.name() == name)
    }

    /// Requested graph, or the one after the active graph.
    fn target(&self) -> Option<Arc<Graph>> {
        let graphs = self.graphs.read();
        if graphs.is_empty() {
            return None;
        }
        let index = match self.pending.lock().take() {
            Some(index) => index,
            None => {
                let current = self.active.load_full();
                current
                    .and_then(|c| graphs.iter().position(|g| Arc::ptr_eq(g, &c)))
                    .map_or(0, |pos| (pos + 1) % graphs.len())
            }
        };
        graphs.get(index).cloned()
    }

    fn switch(&self) {
        let Some(next) = self.target() else {
            return;
        };
        let current = self.active.load_full();
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, &next)) {
            tracing::debug!(graph = next.name(), "switch target already active");
            return;
        }

        let (from, paused) = match current {
            Some(graph) => (Some(graph.name().to_owned()), self.pause(&graph, false)),
            None => (None, SwitchReport::default()),
        };

        next.begin_resume();
        self.active.store(Some(next.clone()));
        let resumed = next.complete_resume();
        tracing::info!(from = ?from, to = next.name(), "graph switched");
        let _ = self.reports.send(Report::Switched {
            from,
            to: next.name().to_owned(),
            paused,
            resumed,
        });

        // events accepted while resuming are now deliverable
        self.events.post(flags::EVENTS);
        self.busy.store(true, Ordering::Release);
        self.dataflow.post(flags::RUN);
    }

    /// Stops the scheduler on `graph` and completes its pause.
    fn pause(&self, graph: &Graph, stop: bool) -> SwitchReport {
        graph.begin_pause();
        if stop {
            self.signal.request_stop();
        } else {
            self.signal.request_pause();
        }
        while self.busy.load(Ordering::Acquire) {
            self.control.wait_timeout(flags::IDLE, IDLE_POLL);
        }
        self.signal.clear();
        // No longer delivering: once the event thread lets go of the lock it
        // cannot start another delivery to this graph.
        let _delivery = self.delivery.lock();
        graph.complete_pause()
    }

    fn shutdown(&self) {
        let (graph, paused) = match self.active.load_full() {
            Some(current) => (
                Some(current.name().to_owned()),
                self.pause(&current, true),
            ),
            None => (None, SwitchReport::default()),
        };
        self.active.store(None);
        self.shutdown.store(true, Ordering::Release);
        self.events.post(flags::EVENTS);
        self.dataflow.post(flags::QUIT);
        tracing::info!(graph = ?graph, "runtime stopped");
        let _ = self.reports.send(Report::Stopped { graph, paused });
    }

    fn idle(&self) {
        self.busy.store(false, Ordering::Release);
        self.control.post(flags::IDLE);
    }
}

fn control_loop(shared: &Shared) {
    loop {
        let bits = shared.control.wait(flags::SWITCH | flags::STOP);
        if bits & flags::STOP != 0 {
            shared.shutdown();
            return;
        }
        if bits & flags::SWITCH != 0 {
            shared.switch();
        }
    }
}

fn dataflow_loop(shared: &Shared) {
    loop {
        let bits = shared.dataflow.wait(flags::RUN | flags::QUIT);
        if bits & flags::QUIT != 0 {
            return;
        }
        let Some(graph) = shared.active.load_full() else {
            shared.idle();
            continue;
        };
        let mut scheduler = Scheduler::new(&graph);
        if let Some(cycles) = shared.max_cycles {
            scheduler = scheduler.max_cycles(cycles);
        }
        let exit = scheduler.run(&shared.signal);
        if exit.is_failure() {
            tracing::warn!(graph = graph.name(), ?exit, "scheduler failed");
        } else {
            tracing::debug!(graph = graph.name(), ?exit, "scheduler returned");
        }
        let _ = shared.reports.send(Report::Exited {
            graph: graph.name().to_owned(),
            exit,
        });
        shared.idle();
    }
}

fn event_loop(shared: &Shared) {
    while !shared.shutdown.load(Ordering::Acquire) {
        if let Some(graph) = shared.active.load_full() {
            loop {
                let _delivery = shared.delivery.lock();
                if !graph.is_delivering() || !graph.queue().dispatch_one() {
                    break;
                }
            }
        }
        shared.events.wait_timeout(flags::EVENTS, shared.event_poll);
    }
}

/// Configures a [`Runtime`].
pub struct RuntimeBuilder {
    sizes: PoolSizes,
    spawner: Arc<dyn Spawner>,
    max_cycles: Option<u32>,
    event_poll: Duration,
}

impl RuntimeBuilder {
    /// Pool sizes for the runtime state.
    pub fn pools(mut self, sizes: PoolSizes) -> Self {
        self.sizes = sizes;
        self
    }

    /// Thread creation capability. Defaults to [`StdSpawner`].
    pub fn spawner(mut self, spawner: impl Spawner + 'static) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    /// Bounds every activation of a graph to `cycles` scheduler cycles.
    pub fn max_cycles(mut self, cycles: u32) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Event thread sleep when not woken.
    pub fn event_poll(mut self, poll: Duration) -> Self {
        self.event_poll = poll;
        self
    }

    /// Creates the runtime. No threads are started yet.
    pub fn build(self) -> Runtime {
        let (tx, rx) = unbounded();
        let shared = Arc::new(Shared {
            graphs: RwLock::new(Vec::new()),
            active: ArcSwapOption::empty(),
            pending: Mutex::new(None),
            signal: ScheduleSignal::new(),
            control: EventFlags::new(),
            dataflow: EventFlags::new(),
            events: Arc::new(EventFlags::new()),
            busy: AtomicBool::new(false),
            delivery: Mutex::new(()),
            shutdown: AtomicBool::new(false),
            max_cycles: self.max_cycles,
            event_poll: self.event_poll,
            reports: tx,
        });
        Runtime {
            state: RuntimeState::new(self.sizes),
            shared,
            spawner: self.spawner,
            threads: Vec::new(),
            reports: rx,
        }
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self {
            sizes: PoolSizes::default(),
            spawner: Arc::new(StdSpawner::new()),
            max_cycles: None,
            event_poll: DEFAULT_EVENT_POLL,
        }
    }
}

/// Owns the runtime state, the registered graphs and the runtime threads.
pub struct Runtime {
    state: RuntimeState,
    shared: Arc<Shared>,
    spawner: Arc<dyn Spawner>,
    threads: Vec<TaskHandle>,
    reports: Receiver<Report>,
}

impl Runtime {
    /// Runtime with the given pools and default settings.
    pub fn new(sizes: PoolSizes) -> Self {
        Self::builder().pools(sizes).build()
    }

    /// Starts configuring a runtime.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// Pools shared by every graph; pass this to `GraphBuilder`.
    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// Registers a built graph. Graphs are switched to in registration order
    /// when no target is named.
    pub fn add_graph(&mut self, graph: Graph) -> Result<Arc<Graph>, RuntimeError> {
        if self.is_running() {
            return Err(RuntimeError::AlreadyRunning);
        }
        let mut graphs = self.shared.graphs.write();
        if graphs.iter().any(|g| g.name() == graph.name()) {
            return Err(RuntimeError::DuplicateGraph(graph.name().to_owned()));
        }
        graph.queue().set_waker(self.shared.events.clone());
        let graph = Arc::new(graph);
        graphs.push(graph.clone());
        tracing::debug!(graph = graph.name(), "graph registered");
        Ok(graph)
    }

    /// Registered graph by name.
    pub fn graph(&self, name: &str) -> Option<Arc<Graph>> {
        self.shared
            .graphs
            .read()
            .iter()
            .find(|g| g.name() == name)
            .cloned()
    }

    /// Names in registration order.
    pub fn graph_names(&self) -> Vec<String> {
        self.shared
            .graphs
            .read()
            .iter()
            .map(|g| g.name().to_owned())
            .collect()
    }

    /// `true` between [`start`](Self::start) and [`stop`](Self::stop).
    pub fn is_running(&self) -> bool {
        !self.threads.is_empty()
    }

    /// Cloneable handle for switching and stopping from other threads.
    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            shared: self.shared.clone(),
        }
    }

    /// Reports from the runtime threads.
    pub fn reports(&self) -> &Receiver<Report> {
        &self.reports
    }

    /// Spawns the runtime threads and activates `initial`.
    pub fn start(&mut self, initial: &str) -> Result<(), RuntimeError> {
        if self.is_running() {
            return Err(RuntimeError::AlreadyRunning);
        }
        if self.shared.graphs.read().is_empty() {
            return Err(RuntimeError::NoGraphs);
        }
        let index = self
            .shared
            .index_of(initial)
            .ok_or_else(|| RuntimeError::UnknownGraph(initial.to_owned()))?;

        self.shared.shutdown.store(false, Ordering::Release);
        self.shared.busy.store(false, Ordering::Release);
        self.shared.signal.clear();
        for flags in [&self.shared.control, &self.shared.dataflow] {
            flags.clear(u32::MAX);
        }

        type Entry = fn(&Shared);
        let entries: [(&str, Entry); 3] = [
            ("rivulet-dataflow", dataflow_loop),
            ("rivulet-events", event_loop),
            ("rivulet-control", control_loop),
        ];
        for (name, entry) in entries {
            let shared = self.shared.clone();
            match self.spawner.spawn(name, Box::new(move || entry(&shared))) {
                Ok(handle) => self.threads.push(handle),
                Err(err) => {
                    let _ = self.stop();
                    return Err(err);
                }
            }
        }

        tracing::info!(graph = initial, "runtime started");
        *self.shared.pending.lock() = Some(index);
        self.shared.control.post(flags::SWITCH);
        Ok(())
    }

    /// Requests a switch to `name`. Completion is reported as
    /// [`Report::Switched`].
    pub fn switch_to(&self, name: &str) -> Result<(), RuntimeError> {
        if !self.is_running() {
            return Err(RuntimeError::NotRunning);
        }
        self.handle().switch_to(name)
    }

    /// Pauses the active graph and joins every runtime thread.
    ///
    /// Graphs stay registered and can be started again.
    pub fn stop(&mut self) -> Result<(), RuntimeError> {
        if !self.is_running() {
            return Err(RuntimeError::NotRunning);
        }
        self.shared.control.post(flags::STOP);
        // a control thread that never started cannot relay the shutdown
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.events.post(flags::EVENTS);
        if self.threads.len() < 3 {
            self.shared.dataflow.post(flags::QUIT);
        }
        let mut result = Ok(());
        for handle in self.threads.drain(..) {
            if let Err(err) = handle.join() {
                tracing::warn!(%err, "runtime thread failed");
                result = result.and(Err(err));
            }
        }
        result
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(err) = self.stop() {
                tracing::warn!(%err, "runtime stop failed");
            }
        }
        for graph in self.shared.graphs.read().iter() {
            graph.teardown();
        }
        self.state.teardown();
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("graphs", &self.graph_names())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Cloneable control surface of a [`Runtime`].
#[derive(Clone)]
pub struct RuntimeHandle {
    shared: Arc<Shared>,
}

impl RuntimeHandle {
    /// Requests a switch to `name`.
    pub fn switch_to(&self, name: &str) -> Result<(), RuntimeError> {
        let index = self
            .shared
            .index_of(name)
            .ok_or_else(|| RuntimeError::UnknownGraph(name.to_owned()))?;
        *self.shared.pending.lock() = Some(index);
        self.shared.control.post(flags::SWITCH);
        Ok(())
    }

    /// Requests a switch to the graph registered after the active one.
    pub fn switch_next(&self) {
        self.shared.control.post(flags::SWITCH);
    }

    /// Requests shutdown. [`Runtime::stop`] joins the threads.
    pub fn stop(&self) {
        self.shared.control.post(flags::STOP);
    }

    /// Name of the active graph.
    pub fn active(&self) -> Option<String> {
        self.shared
            .active
            .load()
            .as_ref()
            .map(|g| g.name().to_owned())
    }

    /// The runtime's event flags, for interrupt or driver callbacks that
    /// post `SWITCH` or `STOP`.
    pub fn flags(&self) -> &EventFlags {
        &self.shared.control
    }
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("active", &self.active())
            .finish()
    }
}
