mod buffer;
mod channel;

pub use channel::*;
