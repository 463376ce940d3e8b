use crate::registry::{Bounds, Registry};
use crate::steering::{self, Steering};
use crate::vecmath::Vec2;
use log::{debug, trace};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Stable identity of an agent, unique for the lifetime of the process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Population an agent belongs to. Selects its steering strategy,
/// speed cap and sight radius.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    Prey,
    Predator,
}

impl Kind {
    /// Speed cap for this kind. Predators move at half the prey speed.
    pub fn max_speed(self, params: &crate::config::SimParams) -> f32 {
        match self {
            Kind::Prey => params.prey_speed,
            Kind::Predator => params.predator_speed,
        }
    }

    /// Sight threshold compared against Euclidean distances during steering.
    ///
    /// The prey value is a quarter of the arena *area*, not a circular
    /// radius. The mismatched units are deliberate; both thresholds are
    /// effectively "sees everything" in any reasonably sized arena.
    pub fn sight_radius(self, bounds: Bounds) -> f32 {
        let area = bounds.width * bounds.height;
        match self {
            Kind::Prey => 0.25 * area,
            Kind::Predator => area,
        }
    }
}

const LIVENESS_ALIVE: u8 = 0;
const LIVENESS_TRANSITIONING: u8 = 1;

/// Lifecycle state of an agent. `Transitioning` is entered exactly once,
/// when a prey is caught, and never left.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Transitioning,
}

/// Kinematic state. Published as one unit so observers never see a
/// half-updated position.
#[derive(Copy, Clone, Debug)]
pub struct Motion {
    pub pos: Vec2,
    pub vel: Vec2,
}

/// The shared face of an agent: what other threads (steering scans,
/// the driver, a renderer) may read, plus the two cross-thread writes
/// the protocol allows — a velocity overwrite and the transition claim.
///
/// Everything else an agent owns (its RNG, its step budget) lives on
/// [`AgentWorker`] and is private to the agent's own thread.
pub struct AgentHandle {
    id: AgentId,
    kind: Kind,
    size: f32,
    motion: Mutex<Motion>,
    liveness: AtomicU8,
    stop: AtomicBool,
}

impl AgentHandle {
    pub(crate) fn new(id: AgentId, kind: Kind, pos: Vec2, size: f32) -> Self {
        Self {
            id,
            kind,
            size,
            motion: Mutex::new(Motion { pos, vel: Vec2::zero() }),
            liveness: AtomicU8::new(LIVENESS_ALIVE),
            stop: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Collision radius, identical for every agent. Doubles as the
    /// wall-reflection margin.
    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn position(&self) -> Vec2 {
        self.lock_motion().pos
    }

    pub fn velocity(&self) -> Vec2 {
        self.lock_motion().vel
    }

    pub fn liveness(&self) -> Liveness {
        if self.liveness.load(Ordering::Acquire) == LIVENESS_TRANSITIONING {
            Liveness::Transitioning
        } else {
            Liveness::Alive
        }
    }

    /// Overwrites this agent's velocity from another agent's thread.
    /// Goes through the motion lock, never a torn write.
    pub(crate) fn set_velocity(&self, vel: Vec2) {
        self.lock_motion().vel = vel;
    }

    /// Claims this agent for promotion. Only the first caller succeeds;
    /// a successful claim also parks the agent's thread so it holds its
    /// last position until the driver promotes it.
    pub(crate) fn begin_transition(&self) -> bool {
        let claimed = self
            .liveness
            .compare_exchange(
                LIVENESS_ALIVE,
                LIVENESS_TRANSITIONING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if claimed {
            self.request_stop();
        }
        claimed
    }

    /// Cooperative cancellation: the agent's loop observes this at the
    /// top of its next tick. In-flight work is never interrupted.
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn lock_motion(&self) -> MutexGuard<'_, Motion> {
        // A poisoned motion lock only means some thread panicked mid-tick;
        // the kinematic state itself is always a valid pair.
        self.motion.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Thread-owned half of an agent: runs the advance loop and holds the
/// state no other thread may touch.
pub struct AgentWorker {
    handle: Arc<AgentHandle>,
    registry: Arc<Registry>,
    steering: Box<dyn Steering>,
    rng: StdRng,
    /// Ticks to travel in the current heading before re-steering.
    total_steps: u32,
    steps_taken: u32,
    pace: Duration,
}

impl AgentWorker {
    pub(crate) fn new(handle: Arc<AgentHandle>, registry: Arc<Registry>) -> Self {
        let params = registry.params();
        let mut rng = StdRng::seed_from_u64(
            params.seed ^ handle.id().0.wrapping_mul(0x9E37_79B9_7F4A_7C15),
        );
        let max_speed = handle.kind().max_speed(params);
        handle.set_velocity(steering::random_velocity(&mut rng, max_speed));
        let total_steps = roll_step_budget(&mut rng, params.min_steps, params.max_steps);
        let steering = steering::for_kind(handle.kind(), max_speed);
        let pace = Duration::from_millis(params.pace_ms);
        Self {
            handle,
            registry,
            steering,
            rng,
            total_steps,
            steps_taken: 0,
            pace,
        }
    }

    pub fn id(&self) -> AgentId {
        self.handle.id()
    }

    pub fn handle(&self) -> &Arc<AgentHandle> {
        &self.handle
    }

    /// Unbounded tick loop. Exits when the stop flag is observed.
    pub fn run(mut self) {
        trace!("agent {} ({:?}) loop started", self.handle.id(), self.handle.kind());
        while !self.handle.stop_requested() {
            self.advance();
            if !self.pace.is_zero() {
                // Pacing only; an early wakeup is harmless.
                std::thread::sleep(self.pace);
            }
        }
        trace!("agent {} loop stopped", self.handle.id());
    }

    /// One simulation tick. Harnesses may call this directly, without
    /// the thread loop or its pacing sleep.
    pub fn advance(&mut self) {
        if self.handle.kind() == Kind::Predator {
            self.check_contact();
        }

        let bounds = self.registry.bounds();
        {
            let mut m = self.handle.lock_motion();
            reflect_at_walls(&mut m, self.handle.size(), bounds);

            if self.steps_taken >= self.total_steps {
                m.vel = self.steering.steer(m.pos, &self.registry, &mut self.rng);
                let params = self.registry.params();
                self.total_steps = roll_step_budget(&mut self.rng, params.min_steps, params.max_steps);
                self.steps_taken = 0;
            }

            // Integrate unconditionally, even on a re-steer tick.
            m.pos = m.pos.add(m.vel);
        }
        self.steps_taken += 1;
    }

    /// Scans the prey population for contact and claims the first prey
    /// found within collision distance. At most one contact is resolved
    /// per tick; which prey that is follows snapshot iteration order.
    fn check_contact(&mut self) {
        let my_pos = self.handle.position();
        let size = self.handle.size();
        for target in self.registry.snapshot_of_kind(Kind::Prey) {
            if my_pos.distance(target.position()) <= size {
                if target.begin_transition() {
                    self.registry.report_infection(target.id());
                    debug!("predator {} caught prey {}", self.handle.id(), target.id());
                }
                break;
            }
        }
    }
}

/// Per-axis wall reflection. Each check looks one tick ahead, so an
/// agent reverses before it would overlap the wall, and checks both
/// walls of an axis in sequence against the possibly already flipped
/// component.
fn reflect_at_walls(m: &mut Motion, size: f32, bounds: Bounds) {
    if m.pos.y - size + m.vel.y <= 0.0 {
        m.vel.y = -m.vel.y;
    }
    if m.pos.y + size + m.vel.y >= bounds.height {
        m.vel.y = -m.vel.y;
    }
    if m.pos.x - size + m.vel.x <= 0.0 {
        m.vel.x = -m.vel.x;
    }
    if m.pos.x + size + m.vel.x >= bounds.width {
        m.vel.x = -m.vel.x;
    }
}

/// Draws a fresh step budget, uniform in `[min_steps, max_steps)`.
fn roll_step_budget(rng: &mut StdRng, min_steps: u32, max_steps: u32) -> u32 {
    rng.random_range(min_steps..max_steps)
}
