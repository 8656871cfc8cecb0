use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use thiserror::Error;

use crate::{parameters::ParameterMap, telemetry::TelemetryService};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error instantiating node '{name}'")]
    NodeInstantiation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub enum StepResult {
    Continue,
    Stop,
}

/// A unit of work driven repeatedly by an executor. `step` blocks at most
/// briefly (one receive timeout or one tick period) so stop requests are
/// observed promptly.
pub trait Node {
    fn step(&mut self) -> anyhow::Result<StepResult>;
}

/// Cooperative stop flag shared by the executor and every node.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Owns the bus, the parameters and the node list, and hands each node a
/// [`NodeContext`] at construction time.
pub struct NodeManager {
    telemetry: TelemetryService,
    parameters: Arc<ParameterMap>,
    shutdown: ShutdownToken,
    nodes: Vec<(String, Box<dyn Node + Send>)>,
}

impl NodeManager {
    pub fn new(telemetry: TelemetryService, parameters: ParameterMap) -> Self {
        NodeManager {
            telemetry,
            parameters: Arc::new(parameters),
            shutdown: ShutdownToken::default(),
            nodes: vec![],
        }
    }

    pub fn add_node<F>(&mut self, name: &str, creator: F) -> Result<(), Error>
    where
        F: FnOnce(
            NodeContext,
        )
            -> Result<Box<dyn Node + Send>, Box<dyn std::error::Error + Send + Sync>>,
    {
        let context = NodeContext::new(
            self.telemetry.clone(),
            self.parameters.clone(),
            self.shutdown.clone(),
        );

        let node = creator(context).map_err(|source| Error::NodeInstantiation {
            name: name.to_string(),
            source,
        })?;

        self.nodes.push((name.to_string(), node));

        Ok(())
    }

    pub fn telemetry(&self) -> &TelemetryService {
        &self.telemetry
    }

    pub fn parameters(&self) -> Arc<ParameterMap> {
        self.parameters.clone()
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    pub(crate) fn into_parts(self) -> (ShutdownToken, Vec<(String, Box<dyn Node + Send>)>) {
        (self.shutdown, self.nodes)
    }
}

#[derive(Clone)]
pub struct NodeContext {
    telemetry: TelemetryService,
    parameters: Arc<ParameterMap>,
    shutdown: ShutdownToken,
}

impl NodeContext {
    fn new(
        telemetry: TelemetryService,
        parameters: Arc<ParameterMap>,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            telemetry,
            parameters,
            shutdown,
        }
    }

    pub fn telemetry(&self) -> &TelemetryService {
        &self.telemetry
    }

    pub fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    pub fn shutdown(&self) -> &ShutdownToken {
        &self.shutdown
    }
}
