//! Reusable composer slots for strategy trials.

use mixall_composer::Composer;

/// A fixed set of composer buffers addressed by slot index.
///
/// Trials are reset from a template with `clone_from`, which reuses the
/// slot's allocations, and promoted by swapping slot indices. Each slot has
/// exactly one owner, the arena, so discarding a losing trial is just
/// overwriting its slot on the next reset.
#[derive(Debug)]
pub struct TrialArena {
    slots: Vec<Composer>,
}

impl TrialArena {
    /// Creates `n_slot` copies of `template`.
    pub fn new(template: &Composer, n_slot: usize) -> Self {
        Self {
            slots: (0..n_slot).map(|_| template.clone()).collect(),
        }
    }

    /// Overwrites `slot` with a copy of `template`.
    pub fn reset(&mut self, slot: usize, template: &Composer) {
        self.slots[slot].clone_from(template);
    }

    /// Exchanges the contents of two slots.
    pub fn swap(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
    }

    /// The composer in `slot`, mutably.
    pub fn get_mut(&mut self, slot: usize) -> &mut Composer {
        &mut self.slots[slot]
    }

    /// Copies `slot` into `target`, reusing `target`'s allocations.
    pub fn store(&self, slot: usize, target: &mut Composer) {
        target.clone_from(&self.slots[slot]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixall_components::{Component, ModelName};
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn template() -> Composer {
        let data = Array2::from_shape_fn((30, 1), |(i, _)| if i < 15 { i as f64 } else { 50.0 + i as f64 });
        let name: ModelName = "gaussian_sk".parse().unwrap();
        Composer::new(vec![Component::new(name, data, 2).unwrap()], 2).unwrap()
    }

    #[test]
    fn swap_and_reset() {
        let t = template();
        let mut arena = TrialArena::new(&t, 2);

        let mut rng = StdRng::seed_from_u64(1);
        let m = arena.get_mut(0);
        m.initialize_step();
        m.random_param_init(&mut rng).unwrap();
        let ln = m.ln_likelihood();
        assert!(ln.is_finite());

        arena.swap(0, 1);
        assert_eq!(arena.get_mut(1).ln_likelihood(), ln);
        assert_eq!(arena.get_mut(0).ln_likelihood(), f64::NEG_INFINITY);

        arena.reset(1, &t);
        assert_eq!(arena.get_mut(1).ln_likelihood(), f64::NEG_INFINITY);
    }

    #[test]
    fn store_copies_into_target() {
        let t = template();
        let mut arena = TrialArena::new(&t, 1);
        let mut rng = StdRng::seed_from_u64(2);
        arena.get_mut(0).initialize_step();
        arena.get_mut(0).random_class_init(&mut rng).unwrap();

        let mut target = template();
        arena.store(0, &mut target);
        let stored = arena.get_mut(0);
        assert_eq!(target.ln_likelihood(), stored.ln_likelihood());
        assert_eq!(target.tik(), stored.tik());
    }
}
