use std::{
    sync::mpsc::{Receiver, channel},
    thread::JoinHandle,
};

use anyhow::Result;
use log::{debug, error, info};

use super::{NodeManager, ShutdownToken, StepResult};

/// Runs every node of a [`NodeManager`] on its own thread, stepping it until
/// it stops, fails, or a stop is requested. A failing node wakes `join`
/// immediately; the remaining nodes are then stopped cooperatively.
pub struct ThreadedExecutor {
    shutdown: ShutdownToken,
    handles: Vec<JoinHandle<Result<()>>>,
    fail_receiver: Receiver<()>,
}

impl ThreadedExecutor {
    pub fn run(node_mgr: NodeManager) -> ThreadedExecutor {
        let (fail_s, fail_r) = channel::<()>();
        let (shutdown, nodes) = node_mgr.into_parts();

        let mut exec = ThreadedExecutor {
            shutdown: shutdown.clone(),
            handles: vec![],
            fail_receiver: fail_r,
        };

        for (name, mut n) in nodes.into_iter() {
            let fail_s = fail_s.clone();
            let shutdown = shutdown.clone();

            let handle = std::thread::Builder::new()
                .name(name.clone())
                .spawn(move || -> Result<()> {
                    info!("Node '{name}' started");

                    while !shutdown.is_stop_requested() {
                        match n.step() {
                            Ok(StepResult::Continue) => {}
                            Ok(StepResult::Stop) => {
                                debug!("Node '{name}' stopped");
                                break;
                            }
                            Err(e) => {
                                error!("Node '{name}' failed: {e:#}");
                                let _ = fail_s.send(());
                                return Err(e);
                            }
                        }
                    }

                    Ok(())
                })
                .expect("Failed to spawn node thread");

            exec.handles.push(handle);
        }

        exec
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Block until a node fails or every handle finishes after a stop
    /// request, then collect the first error.
    pub fn join(self) -> Result<()> {
        // Returns on failure, or with Err(Disconnected) once all node
        // threads have exited and dropped their fail senders.
        let _ = self.fail_receiver.recv();

        self.shutdown.request_stop();

        let mut res = Ok(());
        for h in self.handles {
            if let Err(e) = h.join().expect("Node thread panicked") {
                res = Err(e);
            }
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Node, NodeManager};
    use crate::parameters::ParameterMap;
    use crate::telemetry::TelemetryService;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use std::time::Duration;

    struct Counter {
        count: Arc<AtomicUsize>,
        limit: usize,
    }

    impl Node for Counter {
        fn step(&mut self) -> Result<StepResult> {
            if self.count.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
                Ok(StepResult::Stop)
            } else {
                Ok(StepResult::Continue)
            }
        }
    }

    struct Failing;

    impl Node for Failing {
        fn step(&mut self) -> Result<StepResult> {
            anyhow::bail!("boom")
        }
    }

    struct Idle;

    impl Node for Idle {
        fn step(&mut self) -> Result<StepResult> {
            std::thread::sleep(Duration::from_millis(1));
            Ok(StepResult::Continue)
        }
    }

    #[test]
    fn nodes_step_until_stop() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut nm = NodeManager::new(TelemetryService::default(), ParameterMap::default());

        let c = count.clone();
        nm.add_node("counter", move |_| {
            Ok(Box::new(Counter { count: c, limit: 5 }))
        })
        .unwrap();

        ThreadedExecutor::run(nm).join().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn failing_node_surfaces_error() {
        let mut nm = NodeManager::new(TelemetryService::default(), ParameterMap::default());
        nm.add_node("failing", |_| Ok(Box::new(Failing))).unwrap();
        nm.add_node("idle", |_| Ok(Box::new(Idle))).unwrap();

        let res = ThreadedExecutor::run(nm).join();

        assert!(res.is_err());
    }

    #[test]
    fn stop_request_ends_idle_nodes() {
        let mut nm = NodeManager::new(TelemetryService::default(), ParameterMap::default());
        nm.add_node("idle", |_| Ok(Box::new(Idle))).unwrap();

        let exec = ThreadedExecutor::run(nm);
        let token = exec.shutdown_token();

        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            token.request_stop();
        });

        exec.join().unwrap();
    }
}
