use std::num::NonZero;

/// Buffer capacity of a channel receiver. Zero converts to `Unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Unbounded,
    Bounded(NonZero<usize>),
}

impl From<usize> for Capacity {
    fn from(value: usize) -> Self {
        match NonZero::new(value) {
            Some(n) => Capacity::Bounded(n),
            None => Capacity::Unbounded,
        }
    }
}
