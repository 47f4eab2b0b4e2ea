use super::state::RenderState;
use std::sync::mpsc::{self, Receiver, Sender};

/// Fan-out to every live receiver. Receivers that hung up are dropped on the next send.
#[derive(Debug)]
pub struct Broadcast<T> {
    subscribers: Vec<Sender<T>>,
}

impl<T> Default for Broadcast<T> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<T: Clone> Broadcast<T> {
    pub fn subscribe(&mut self) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn send(&mut self, value: T) {
        self.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// A computation that mutates render state and reports what it did.
pub trait Producer {
    type Output: Clone;

    /// Next output, or `None` once nothing more is ready this tick.
    fn produce(&mut self, state: &mut RenderState) -> Option<Self::Output>;
}

/// Shares one producer among any number of subscribers.
///
/// The producer only runs once `connect` has been called. Each emission runs
/// the producer once and every subscriber receives a copy; subscribers that
/// join later see subsequent emissions only.
pub struct Multicast<P: Producer> {
    producer: P,
    outputs: Broadcast<P::Output>,
    connected: bool,
}

impl<P: Producer> Multicast<P> {
    pub fn new(producer: P) -> Self {
        Self {
            producer,
            outputs: Broadcast::default(),
            connected: false,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<P::Output> {
        self.outputs.subscribe()
    }

    pub fn connect(&mut self) {
        if !self.connected {
            log::debug!(
                "multicast connected with {} subscriber(s)",
                self.outputs.subscriber_count()
            );
        }
        self.connected = true;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Run the producer until it is idle. Returns the number of emissions.
    pub fn pump(&mut self, state: &mut RenderState) -> usize {
        if !self.connected {
            return 0;
        }
        let mut emitted = 0;
        while let Some(output) = self.producer.produce(state) {
            self.outputs.send(output);
            emitted += 1;
        }
        emitted
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn producer_mut(&mut self) -> &mut P {
        &mut self.producer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits queued numbers and counts how often it ran.
    #[derive(Default)]
    struct Queue {
        pending: Vec<u32>,
        runs: usize,
    }

    impl Producer for Queue {
        type Output = u32;

        fn produce(&mut self, state: &mut RenderState) -> Option<u32> {
            let value = self.pending.pop()?;
            self.runs += 1;
            state.scene_index = value as usize;
            Some(value)
        }
    }

    #[test]
    fn nothing_runs_before_connect() {
        let mut state = RenderState::default();
        let mut multicast = Multicast::new(Queue {
            pending: vec![7],
            runs: 0,
        });
        let rx = multicast.subscribe();
        assert_eq!(multicast.pump(&mut state), 0);
        assert_eq!(multicast.producer().runs, 0);
        assert!(rx.try_recv().is_err());

        multicast.connect();
        assert_eq!(multicast.pump(&mut state), 1);
        assert_eq!(rx.try_recv(), Ok(7));
        assert_eq!(state.scene_index, 7);
    }

    #[test]
    fn two_subscribers_share_one_run() {
        let mut state = RenderState::default();
        let mut multicast = Multicast::new(Queue {
            pending: vec![3],
            runs: 0,
        });
        let first = multicast.subscribe();
        let second = multicast.subscribe();
        multicast.connect();
        multicast.pump(&mut state);

        assert_eq!(multicast.producer().runs, 1);
        assert_eq!(first.try_recv(), Ok(3));
        assert_eq!(second.try_recv(), Ok(3));
    }

    #[test]
    fn late_subscriber_sees_only_later_emissions() {
        let mut state = RenderState::default();
        let mut multicast = Multicast::new(Queue::default());
        let early = multicast.subscribe();
        multicast.connect();

        multicast.producer_mut().pending.push(1);
        multicast.pump(&mut state);
        let late = multicast.subscribe();
        multicast.producer_mut().pending.push(2);
        multicast.pump(&mut state);

        assert_eq!(early.try_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(late.try_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut broadcast = Broadcast::default();
        let kept = broadcast.subscribe();
        drop(broadcast.subscribe());
        broadcast.send(5u8);
        assert_eq!(broadcast.subscriber_count(), 1);
        assert_eq!(kept.try_recv(), Ok(5));
    }
}
