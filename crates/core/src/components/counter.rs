//! Shared 2-bit saturating counter, used by every bimodal-style predictor in
//! the standard library (§9: "BimodalPredictor vs BimodalCounter duplication
//! consolidated into a single `SaturatingCounter2`").

/// A classic 2-bit saturating counter: four states, strongly/weakly
/// not-taken and weakly/strongly taken. Saturates at both ends instead of
/// wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaturatingCounter2(u8);

impl SaturatingCounter2 {
    const MAX: u8 = 3;
    /// Weakly-not-taken, the conventional reset state.
    const WEAK_NOT_TAKEN: u8 = 1;

    /// A fresh counter in the weakly-not-taken state.
    #[must_use]
    pub fn new() -> Self {
        Self(Self::WEAK_NOT_TAKEN)
    }

    /// Moves the counter one step toward `taken`, saturating at the rails.
    pub fn update(&mut self, taken: bool) {
        if taken {
            self.0 = self.0.saturating_add(1).min(Self::MAX);
        } else {
            self.0 = self.0.saturating_sub(1);
        }
    }

    /// `true` in either of the two "taken" states (counter value `>= 2`).
    #[must_use]
    pub fn predicts_taken(self) -> bool {
        self.0 >= 2
    }
}

impl Default for SaturatingCounter2 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturates_at_both_rails() {
        let mut c = SaturatingCounter2::new();
        assert!(!c.predicts_taken());
        c.update(false);
        c.update(false);
        c.update(false);
        assert!(!c.predicts_taken());
        for _ in 0..4 {
            c.update(true);
        }
        assert!(c.predicts_taken());
    }

    #[test]
    fn crosses_to_taken_after_one_update_from_reset() {
        let mut c = SaturatingCounter2::new();
        c.update(true);
        assert!(c.predicts_taken());
    }
}
