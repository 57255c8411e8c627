//! Command-line interface
mod options;

pub use options::{EmptyWindowArg, Options};

/// Update a configuration from command-line values.
pub trait Update<T> {
    fn update(&mut self, source: T);
}

/// Apply an update and return the result.
pub trait WithUpdate<T> {
    fn with_update(self, source: T) -> Self;
}

impl<T, U: Update<T>> WithUpdate<T> for U {
    fn with_update(mut self, source: T) -> Self {
        self.update(source);
        self
    }
}
