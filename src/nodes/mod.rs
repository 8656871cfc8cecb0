mod executor;
mod node;

pub use executor::ThreadedExecutor;
pub use node::{Error, Node, NodeContext, NodeManager, ShutdownToken, StepResult};
