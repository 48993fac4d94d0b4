//! Eased transitions between layouts, advanced once per rendering tick.

use crate::config::AnimationConfig;
use crate::layout::LayoutStore;

/// Ease-out cubic: fast start, decelerating into the target.
pub fn ease_out_cubic(t: f32) -> f32 {
    let inv = 1.0 - t.clamp(0.0, 1.0);
    1.0 - inv * inv * inv
}

/// Whether a tick changed the displayed positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to animate.
    Idle,
    /// Positions moved; more ticks follow.
    Advanced,
    /// Positions reached the current layout on this tick.
    Settled,
}

/// Advances the layout store's transition progress.
#[derive(Debug, Clone)]
pub struct TransitionAnimator {
    step: f32,
}

impl Default for TransitionAnimator {
    fn default() -> Self {
        Self::new(&AnimationConfig::default())
    }
}

impl TransitionAnimator {
    /// Steps outside `(0, 1]` fall back to the default so every transition
    /// settles.
    pub fn new(config: &AnimationConfig) -> Self {
        let step = if config.step.is_finite() && config.step > 0.0 {
            config.step.min(1.0)
        } else {
            AnimationConfig::default().step
        };
        Self { step }
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Advance one frame and write interpolated positions into the store.
    ///
    /// No-op when settled, when there is no previous layout, or when the
    /// layouts do not both hold exactly `document_count` points.
    pub fn tick(&self, store: &mut LayoutStore, document_count: usize) -> TickOutcome {
        if store.is_settled() {
            return TickOutcome::Idle;
        }
        let Some((previous, current, displayed, progress)) =
            store.transition_parts(document_count)
        else {
            return TickOutcome::Idle;
        };

        let mut next = (*progress + self.step).min(1.0);
        // Snap accumulated float error so the last tick lands exactly on 1.
        if next > 1.0 - self.step * 1e-3 {
            next = 1.0;
        }
        *progress = next;

        let eased = ease_out_cubic(next);
        for ((out, from), to) in displayed.iter_mut().zip(previous).zip(current) {
            for axis in 0..3 {
                out[axis] = from[axis] + (to[axis] - from[axis]) * eased;
            }
        }

        if next >= 1.0 {
            displayed.copy_from_slice(current);
            TickOutcome::Settled
        } else {
            TickOutcome::Advanced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transitioning_store() -> LayoutStore {
        let mut store = LayoutStore::new();
        store.install(vec![[0.0; 3], [10.0, 0.0, 0.0]]);
        store.install(vec![[10.0; 3], [0.0, 0.0, 0.0]]);
        store
    }

    #[test]
    fn test_ease_out_cubic_shape() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!((ease_out_cubic(0.5) - 0.875).abs() < 1e-6);
        assert!(ease_out_cubic(0.1) > 0.1);
    }

    #[test]
    fn test_progress_is_monotonic_and_settles_in_fifty_ticks() {
        let animator = TransitionAnimator::default();
        let mut store = transitioning_store();
        let mut last = store.progress();

        for tick in 1..=50 {
            let outcome = animator.tick(&mut store, 2);
            assert!(store.progress() >= last);
            last = store.progress();
            if tick < 50 {
                assert_eq!(outcome, TickOutcome::Advanced, "tick {tick}");
            } else {
                assert_eq!(outcome, TickOutcome::Settled);
            }
        }

        assert_eq!(store.progress(), 1.0);
        assert_eq!(store.displayed(), &[[10.0; 3], [0.0, 0.0, 0.0]]);
        assert_eq!(animator.tick(&mut store, 2), TickOutcome::Idle);
        assert_eq!(store.progress(), 1.0);
    }

    #[test]
    fn test_interpolates_with_easing() {
        let animator = TransitionAnimator::new(&AnimationConfig::default().with_step(0.5));
        let mut store = transitioning_store();

        animator.tick(&mut store, 2);
        let expected = 10.0 * ease_out_cubic(0.5);
        assert!((store.displayed()[0][0] - expected).abs() < 1e-5);
        assert!((store.displayed()[1][0] - (10.0 - expected)).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_step_still_settles() {
        for step in [0.0, -0.5, f32::NAN] {
            let animator = TransitionAnimator::new(&AnimationConfig::default().with_step(step));
            assert!((animator.step() - 0.02).abs() < 1e-6);

            let mut store = transitioning_store();
            let mut ticks = 0;
            while !store.is_settled() {
                animator.tick(&mut store, 2);
                ticks += 1;
                assert!(ticks <= 50, "step {step} never settled");
            }
        }
        let animator = TransitionAnimator::new(&AnimationConfig::default().with_step(3.0));
        assert_eq!(animator.step(), 1.0);
    }

    #[test]
    fn test_document_count_mismatch_is_noop() {
        let animator = TransitionAnimator::default();
        let mut store = transitioning_store();

        assert_eq!(animator.tick(&mut store, 3), TickOutcome::Idle);
        assert_eq!(store.progress(), 0.0);
    }

    #[test]
    fn test_settled_store_is_noop() {
        let animator = TransitionAnimator::default();
        let mut store = LayoutStore::new();
        store.install(vec![[1.0; 3]]);
        assert_eq!(animator.tick(&mut store, 1), TickOutcome::Idle);
    }
}
