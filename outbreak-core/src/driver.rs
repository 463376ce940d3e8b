use crate::agent::{AgentId, Kind};
use crate::registry::Registry;
use crate::snapshot::Snapshot;
use crossbeam_channel::Receiver;
use log::{debug, trace};
use std::sync::Arc;
use std::time::Instant;

/// Owns the external tick of the simulation: on each poll it promotes
/// the prey claimed since the previous poll. This is the only place,
/// besides `spawn`, where population membership changes size. The
/// driver performs no physics.
pub struct Driver {
    registry: Arc<Registry>,
    events: Receiver<AgentId>,
    started: Instant,
    snapshots: Vec<Snapshot>,
}

impl Driver {
    pub fn new(registry: Arc<Registry>) -> Self {
        let events = registry.infection_events();
        Self {
            registry,
            events,
            started: Instant::now(),
            snapshots: Vec::new(),
        }
    }

    /// Drains the infection queue and promotes each claimed prey.
    /// Returns the number of promotions performed.
    pub fn poll(&mut self) -> usize {
        let mut promoted = 0;
        while let Ok(prey_id) = self.events.try_recv() {
            if self.registry.promote(prey_id) {
                promoted += 1;
            } else {
                // A competing event already resolved this prey.
                debug!("stale infection event for prey {}", prey_id);
            }
        }
        if promoted > 0 {
            trace!("poll promoted {} prey", promoted);
        }
        promoted
    }

    /// Records the current population counts, optionally with raw
    /// positions for replay tooling.
    pub fn record_snapshot(&mut self, include_positions: bool) {
        let positions = |kind: Kind| {
            self.registry
                .snapshot_of_kind(kind)
                .iter()
                .map(|a| {
                    let pos = a.position();
                    (pos.x, pos.y)
                })
                .collect::<Vec<_>>()
        };

        let snapshot = Snapshot {
            time_s: self.started.elapsed().as_secs_f32(),
            prey_count: self.registry.prey_count() as u32,
            predator_count: self.registry.predator_count() as u32,
            conversions_total: self.registry.conversions(),
            prey_positions: include_positions.then(|| positions(Kind::Prey)),
            predator_positions: include_positions.then(|| positions(Kind::Predator)),
        };
        self.snapshots.push(snapshot);
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimParams;

    #[test]
    fn poll_with_no_events_promotes_nothing() {
        let registry = Arc::new(Registry::new_manual(SimParams::with_arena(500.0, 500.0)));
        registry.spawn_prey(100.0, 100.0);
        let mut driver = Driver::new(registry.clone());
        assert_eq!(driver.poll(), 0);
        assert_eq!(registry.prey_count(), 1);
    }

    #[test]
    fn snapshot_positions_follow_the_flag() {
        let registry = Arc::new(Registry::new_manual(SimParams::with_arena(500.0, 500.0)));
        registry.spawn_prey(100.0, 100.0);
        registry.spawn_predator(300.0, 300.0);
        let mut driver = Driver::new(registry);

        driver.record_snapshot(false);
        driver.record_snapshot(true);

        assert!(driver.snapshots()[0].prey_positions.is_none());
        let with_positions = &driver.snapshots()[1];
        assert_eq!(with_positions.prey_count, 1);
        assert_eq!(
            with_positions.prey_positions.as_deref(),
            Some(&[(100.0, 100.0)][..])
        );
        assert_eq!(with_positions.predator_count, 1);
    }
}
