use crate::agent::{AgentHandle, AgentId, AgentWorker, Kind};
use crate::config::SimParams;
use crate::vecmath::Vec2;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

/// Current arena extent. Bounds may change between ticks (the drawing
/// surface can be resized); reflection simply uses whatever is current.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

/// The shared, concurrently-accessed collections of live agents.
///
/// The two population sets are the only shared mutable structures in
/// the simulation. Their locks guard structural mutation and
/// copy-on-read snapshots; per-agent kinematic state has its own lock
/// on each [`AgentHandle`], so unrelated agents never serialize with
/// each other.
pub struct Registry {
    params: SimParams,
    bounds: Mutex<Bounds>,
    prey: Mutex<Vec<Arc<AgentHandle>>>,
    predators: Mutex<Vec<Arc<AgentHandle>>>,
    /// Join handles of running agent threads, reaped at shutdown.
    threads: Mutex<HashMap<AgentId, JoinHandle<()>>>,
    /// Workers awaiting an external harness when autostart is off.
    pending: Mutex<Vec<AgentWorker>>,
    autostart: bool,
    next_id: AtomicU64,
    conversions: AtomicU64,
    infection_tx: Sender<AgentId>,
    infection_rx: Receiver<AgentId>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Population vectors and bounds are valid at every lock release, so
    // a poisoned lock carries no torn state worth aborting over.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registry {
    /// Creates a registry whose spawned agents each run on their own
    /// thread.
    pub fn new(params: SimParams) -> Self {
        Self::build(params, true)
    }

    /// Creates a registry for a harness that drives agent ticks itself:
    /// spawned workers are parked and handed out via
    /// [`Registry::take_pending_workers`] instead of being started.
    pub fn new_manual(params: SimParams) -> Self {
        Self::build(params, false)
    }

    fn build(params: SimParams, autostart: bool) -> Self {
        let (infection_tx, infection_rx) = unbounded();
        let bounds = Bounds {
            width: params.arena_width,
            height: params.arena_height,
        };
        Self {
            params,
            bounds: Mutex::new(bounds),
            prey: Mutex::new(Vec::new()),
            predators: Mutex::new(Vec::new()),
            threads: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            autostart,
            next_id: AtomicU64::new(0),
            conversions: AtomicU64::new(0),
            infection_tx,
            infection_rx,
        }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn bounds(&self) -> Bounds {
        *lock(&self.bounds)
    }

    /// Replaces the arena bounds. Degenerate dimensions are ignored so
    /// a transient zero-sized surface cannot wedge the reflection math.
    pub fn set_bounds(&self, width: f32, height: f32) {
        if width <= 0.0 || height <= 0.0 {
            warn!("ignoring degenerate arena bounds {}x{}", width, height);
            return;
        }
        *lock(&self.bounds) = Bounds { width, height };
    }

    fn set_of(&self, kind: Kind) -> &Mutex<Vec<Arc<AgentHandle>>> {
        match kind {
            Kind::Prey => &self.prey,
            Kind::Predator => &self.predators,
        }
    }

    /// Creates and registers a new agent and starts its tick loop (or
    /// parks the worker, in manual mode). Returns the new identity.
    pub fn spawn(self: &Arc<Self>, kind: Kind, x: f32, y: f32) -> AgentId {
        let id = AgentId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = Arc::new(AgentHandle::new(id, kind, Vec2::new(x, y), self.params.size));
        // The worker draws the initial velocity before the handle is
        // published, so no scan ever observes a resting agent.
        let worker = AgentWorker::new(handle.clone(), self.clone());
        lock(self.set_of(kind)).push(handle);
        debug!("spawned {:?} {} at ({:.1}, {:.1})", kind, id, x, y);

        if self.autostart {
            let join = std::thread::spawn(move || worker.run());
            lock(&self.threads).insert(id, join);
        } else {
            lock(&self.pending).push(worker);
        }
        id
    }

    pub fn spawn_prey(self: &Arc<Self>, x: f32, y: f32) -> AgentId {
        self.spawn(Kind::Prey, x, y)
    }

    pub fn spawn_predator(self: &Arc<Self>, x: f32, y: f32) -> AgentId {
        self.spawn(Kind::Predator, x, y)
    }

    /// Hands out workers spawned since the last call, for a harness
    /// that runs ticks itself. Empty when agents autostart.
    pub fn take_pending_workers(&self) -> Vec<AgentWorker> {
        std::mem::take(&mut *lock(&self.pending))
    }

    /// Read-consistent view of one population. The returned handles
    /// stay valid while the underlying set is mutated concurrently.
    pub fn snapshot_of_kind(&self, kind: Kind) -> Vec<Arc<AgentHandle>> {
        lock(self.set_of(kind)).clone()
    }

    pub fn prey_count(&self) -> usize {
        lock(&self.prey).len()
    }

    pub fn predator_count(&self) -> usize {
        lock(&self.predators).len()
    }

    /// Total number of promotions performed so far.
    pub fn conversions(&self) -> u64 {
        self.conversions.load(Ordering::Relaxed)
    }

    /// Queues a claimed prey for promotion at the driver's next poll.
    pub(crate) fn report_infection(&self, id: AgentId) {
        // Best effort; the registry holds a receiver, so this only
        // fails once everything is being torn down.
        let _ = self.infection_tx.send(id);
    }

    /// Receiver half of the infection-event queue, drained by the driver.
    pub fn infection_events(&self) -> Receiver<AgentId> {
        self.infection_rx.clone()
    }

    /// Removes `id` from the prey set and spawns a new predator at its
    /// last position. Exactly one of any number of concurrent calls for
    /// the same id performs the promotion; the rest find the id absent
    /// and return `false`.
    pub fn promote(self: &Arc<Self>, id: AgentId) -> bool {
        let pos = {
            let mut prey = lock(&self.prey);
            let Some(idx) = prey.iter().position(|a| a.id() == id) else {
                return false;
            };
            let handle = prey.swap_remove(idx);
            handle.request_stop();
            handle.position()
        };
        self.conversions.fetch_add(1, Ordering::Relaxed);
        let new_id = self.spawn(Kind::Predator, pos.x, pos.y);
        info!(
            "prey {} promoted to predator {} at ({:.1}, {:.1})",
            id, new_id, pos.x, pos.y
        );
        true
    }

    /// Removes an agent from the simulation and stops its tick loop at
    /// the top of its next iteration. Returns whether `id` was present.
    pub fn terminate(&self, id: AgentId) -> bool {
        for kind in [Kind::Prey, Kind::Predator] {
            let mut set = lock(self.set_of(kind));
            if let Some(idx) = set.iter().position(|a| a.id() == id) {
                let handle = set.swap_remove(idx);
                handle.request_stop();
                debug!("terminated {:?} {}", kind, id);
                return true;
            }
        }
        false
    }

    /// Stops every agent and joins their threads.
    pub fn shutdown(&self) {
        for kind in [Kind::Prey, Kind::Predator] {
            for handle in lock(self.set_of(kind)).iter() {
                handle.request_stop();
            }
        }
        let threads = std::mem::take(&mut *lock(&self.threads));
        for (id, join) in threads {
            if join.join().is_err() {
                warn!("agent {} thread panicked before shutdown", id);
            }
        }
    }
}
