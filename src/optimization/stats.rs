use std::ops::AddAssign;

/// Clipping statistics of a parameter update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    clipped: usize,
    total: usize,
}

impl StepStats {
    /// Creates a new `StepStats`.
    ///
    /// # Arguments
    /// * `clipped` - Amount of gradient entries that were clipped.
    /// * `total` - Amount of gradient entries that were visited.
    pub fn new(clipped: usize, total: usize) -> Self {
        Self { clipped, total }
    }

    pub fn clipped(&self) -> usize {
        self.clipped
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the fraction of clipped entries, zero if nothing was visited.
    pub fn ratio(&self) -> f32 {
        if self.total == 0 {
            return 0.;
        }

        self.clipped as f32 / self.total as f32
    }
}

impl AddAssign for StepStats {
    fn add_assign(&mut self, rhs: Self) {
        self.clipped += rhs.clipped;
        self.total += rhs.total;
    }
}
