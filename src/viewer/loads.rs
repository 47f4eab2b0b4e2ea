use crate::assets::{LoadError, LoadFuture};
use std::sync::mpsc::{self, Receiver, Sender};
use tokio::runtime::Handle;

/// Monotonic issuance counter. Only the latest issued generation is current.
#[derive(Debug, Default, Clone, Copy)]
pub struct Generation {
    latest: u64,
}

impl Generation {
    pub fn next(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.latest
    }
}

/// A completed load belonging to the latest issued generation.
#[derive(Debug)]
pub struct Completion<T> {
    pub generation: u64,
    pub result: Result<T, LoadError>,
}

/// Runs load futures on a background runtime and hands back only current completions.
pub struct BackgroundLoads<T> {
    label: &'static str,
    runtime: Handle,
    sender: Sender<(u64, Result<T, LoadError>)>,
    receiver: Receiver<(u64, Result<T, LoadError>)>,
    generation: Generation,
    in_flight: usize,
}

impl<T: Send + 'static> BackgroundLoads<T> {
    pub fn new(label: &'static str, runtime: Handle) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            label,
            runtime,
            sender,
            receiver,
            generation: Generation::default(),
            in_flight: 0,
        }
    }

    /// Spawn a load, superseding every load issued before it.
    pub fn issue(&mut self, future: LoadFuture<T>) -> u64 {
        let generation = self.generation.next();
        let sender = self.sender.clone();
        self.in_flight += 1;
        self.runtime.spawn(async move {
            let result = future.await;
            // Receiver is gone only when the viewer is shutting down.
            let _ = sender.send((generation, result));
        });
        generation
    }

    /// Drain finished loads, discarding stale ones, until a current one is found.
    pub fn poll_current(&mut self) -> Option<Completion<T>> {
        while let Ok((generation, result)) = self.receiver.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            if self.generation.is_current(generation) {
                return Some(Completion { generation, result });
            }
            log::debug!(
                "discarding stale {} load (generation {}, latest {})",
                self.label,
                generation,
                self.generation.latest()
            );
        }
        None
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tokio::sync::oneshot;

    fn gated(rx: oneshot::Receiver<u32>) -> LoadFuture<u32> {
        Box::pin(async move {
            rx.await.map_err(|_| LoadError::Abandoned {
                path: "gate".into(),
            })
        })
    }

    fn wait_idle(loads: &mut BackgroundLoads<u32>) -> Vec<Completion<u32>> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut completions = Vec::new();
        while loads.in_flight() > 0 && Instant::now() < deadline {
            completions.extend(loads.poll_current());
            std::thread::sleep(Duration::from_millis(1));
        }
        completions
    }

    #[test]
    fn generations_increase() {
        let mut generation = Generation::default();
        assert_eq!(generation.next(), 1);
        assert_eq!(generation.next(), 2);
        assert!(generation.is_current(2));
        assert!(!generation.is_current(1));
    }

    #[test]
    fn stale_completion_is_discarded() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let mut loads = BackgroundLoads::new("test", runtime.handle().clone());
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        loads.issue(gated(first_rx));
        let second = loads.issue(gated(second_rx));
        assert_eq!(loads.in_flight(), 2);

        second_tx.send(2).unwrap();
        first_tx.send(1).unwrap();
        let completions = wait_idle(&mut loads);

        assert_eq!(loads.in_flight(), 0);
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].generation, second);
        assert_eq!(completions[0].result.as_ref().ok(), Some(&2));
    }
}
