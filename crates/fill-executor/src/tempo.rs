//! Injectable delay strategy.
//!
//! Uniform machine timing is itself an automation signature, so every
//! interaction draws its pause from a configured range. The strategy is a
//! seam: production uses [`HumanTempo`], tests substitute [`ZeroDelay`]
//! for determinism.

use std::ops::Range;
use std::time::Duration;

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// What kind of pause is being drawn.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DelayKind {
    /// Between two field fills.
    BetweenFields,
    /// Before any click/check/focus interaction.
    BeforeAction,
    /// Between two keystrokes while typing.
    Keystroke,
    /// Letting the page settle before validation scans.
    Settle,
}

/// Delay seam.
pub trait DelayStrategy: Send + Sync {
    fn delay(&self, kind: DelayKind) -> Duration;
}

/// Millisecond ranges per pause kind.
#[derive(Clone, Debug)]
pub struct TempoPlan {
    pub between_fields_ms: Range<u64>,
    pub before_action_ms: Range<u64>,
    pub keystroke_ms: Range<u64>,
    pub settle_ms: Range<u64>,
}

impl Default for TempoPlan {
    fn default() -> Self {
        Self {
            between_fields_ms: 300..1200,
            before_action_ms: 150..600,
            keystroke_ms: 40..140,
            settle_ms: 800..1600,
        }
    }
}

impl TempoPlan {
    /// Faster profile for low-risk targets.
    pub fn brisk() -> Self {
        Self {
            between_fields_ms: 120..400,
            before_action_ms: 60..200,
            keystroke_ms: 15..60,
            settle_ms: 400..800,
        }
    }
}

/// Randomized human-plausible pacing. A fixed seed makes the draw
/// sequence reproducible.
pub struct HumanTempo {
    plan: TempoPlan,
    rng: Mutex<StdRng>,
}

impl HumanTempo {
    pub fn new(plan: TempoPlan) -> Self {
        Self {
            plan,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(plan: TempoPlan, seed: u64) -> Self {
        Self {
            plan,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl DelayStrategy for HumanTempo {
    fn delay(&self, kind: DelayKind) -> Duration {
        let range = match kind {
            DelayKind::BetweenFields => self.plan.between_fields_ms.clone(),
            DelayKind::BeforeAction => self.plan.before_action_ms.clone(),
            DelayKind::Keystroke => self.plan.keystroke_ms.clone(),
            DelayKind::Settle => self.plan.settle_ms.clone(),
        };
        let ms = if range.is_empty() {
            range.start
        } else {
            self.rng.lock().gen_range(range)
        };
        Duration::from_millis(ms)
    }
}

/// Zero-delay strategy for deterministic tests.
#[derive(Default)]
pub struct ZeroDelay;

impl DelayStrategy for ZeroDelay {
    fn delay(&self, _kind: DelayKind) -> Duration {
        Duration::ZERO
    }
}

/// Sleep for the strategy's draw; no-op when it returns zero.
pub async fn pause(strategy: &dyn DelayStrategy, kind: DelayKind) {
    let duration = strategy.delay(kind);
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_stay_within_the_configured_range() {
        let tempo = HumanTempo::seeded(TempoPlan::default(), 7);
        for _ in 0..50 {
            let d = tempo.delay(DelayKind::Keystroke);
            assert!(d >= Duration::from_millis(40) && d < Duration::from_millis(140));
        }
    }

    #[test]
    fn seeded_tempo_is_reproducible() {
        let a = HumanTempo::seeded(TempoPlan::default(), 42);
        let b = HumanTempo::seeded(TempoPlan::default(), 42);
        let draws_a: Vec<_> = (0..10).map(|_| a.delay(DelayKind::BetweenFields)).collect();
        let draws_b: Vec<_> = (0..10).map(|_| b.delay(DelayKind::BetweenFields)).collect();
        assert_eq!(draws_a, draws_b);
    }

    #[test]
    fn zero_delay_never_sleeps() {
        assert_eq!(ZeroDelay.delay(DelayKind::Settle), Duration::ZERO);
    }
}
