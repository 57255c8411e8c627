//! Summary statistics
use num_traits::{real::Real, Zero};

/// Online mean of a stream of values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct OnlineMean<T> {
    mean: T,
    count: u64,
}

impl<T: Zero> Default for OnlineMean<T> {
    fn default() -> Self {
        Self {
            mean: T::zero(),
            count: 0,
        }
    }
}

impl<T> OnlineMean<T> {
    /// Number of accumulated values.
    pub const fn count(&self) -> u64 {
        self.count
    }
}

impl<T: Copy> OnlineMean<T> {
    /// The mean of all accumulated values. `None` if nothing has been accumulated.
    pub fn mean(&self) -> Option<T> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean)
        }
    }
}

impl<T: Real> OnlineMean<T> {
    /// Add a new value to the calculation.
    pub fn push(&mut self, value: T) {
        self.count += 1;
        // u64 -> float conversions cannot fail for the float types implementing Real
        let n = T::from(self.count).unwrap_or_else(T::max_value);
        self.mean = self.mean + (value - self.mean) / n;
    }
}
