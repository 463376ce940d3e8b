use crate::agent::Kind;
use crate::registry::Registry;
use crate::vecmath::Vec2;
use rand::prelude::*;

/// Rule an agent applies to pick a new heading once its step budget is
/// exhausted. `pos` is the steering agent's own position; the registry
/// supplies whatever population scan the rule needs.
pub trait Steering: Send {
    fn steer(&mut self, pos: Vec2, registry: &Registry, rng: &mut StdRng) -> Vec2;
}

pub(crate) fn for_kind(kind: Kind, max_speed: f32) -> Box<dyn Steering> {
    match kind {
        Kind::Prey => Box::new(RandomWander { max_speed }),
        Kind::Predator => Box::new(PursueNearest { max_speed }),
    }
}

/// Default prey behavior: wander in a fresh random direction.
pub struct RandomWander {
    pub max_speed: f32,
}

impl Steering for RandomWander {
    fn steer(&mut self, _pos: Vec2, _registry: &Registry, rng: &mut StdRng) -> Vec2 {
        random_velocity(rng, self.max_speed)
    }
}

/// Predator behavior: head straight for the nearest prey, falling back
/// to a random wander when no prey exist.
pub struct PursueNearest {
    pub max_speed: f32,
}

impl Steering for PursueNearest {
    fn steer(&mut self, pos: Vec2, registry: &Registry, rng: &mut StdRng) -> Vec2 {
        let prey = registry.snapshot_of_kind(Kind::Prey);

        // Linear scan for the minimum Euclidean distance. Ties keep the
        // first candidate in snapshot order; which one that is carries
        // no meaning.
        let mut nearest: Option<(usize, f32, Vec2)> = None;
        for (idx, target) in prey.iter().enumerate() {
            let target_pos = target.position();
            let dist = pos.distance(target_pos);
            match nearest {
                Some((_, best, _)) if dist >= best => {}
                _ => nearest = Some((idx, dist, target_pos)),
            }
        }

        let Some((idx, dist, target_pos)) = nearest else {
            return random_velocity(rng, self.max_speed);
        };

        let dir = target_pos.sub(pos).normalize_or_zero();
        if dir == Vec2::zero() {
            // Sitting exactly on the target; any heading works.
            return random_velocity(rng, self.max_speed);
        }
        let vel = dir.scale(self.max_speed);

        if dist < Kind::Predator.sight_radius(registry.bounds()) {
            // The sighted prey is redirected onto the pursuer's own
            // heading, not the reverse of it.
            prey[idx].set_velocity(vel);
        }
        vel
    }
}

/// Draws each component uniformly from the non-zero integers in
/// `[-max_speed, max_speed]`, so an agent can never come to rest.
pub fn random_velocity(rng: &mut StdRng, max_speed: f32) -> Vec2 {
    Vec2::new(
        random_component(rng, max_speed),
        random_component(rng, max_speed),
    )
}

fn random_component(rng: &mut StdRng, max_speed: f32) -> f32 {
    let max = (max_speed.abs().floor() as i32).max(1);
    loop {
        let component = rng.random_range(-max..=max);
        if component != 0 {
            return component as f32;
        }
    }
}
