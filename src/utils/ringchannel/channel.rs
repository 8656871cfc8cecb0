use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use thiserror::Error;

use super::buffer::Buffer;
use crate::utils::capacity::Capacity;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("The channel was closed (no sender)")]
    Closed,

    #[error("No data available in channel")]
    Empty,

    #[error("Timed out waiting for data")]
    TimedOut,
}

/// Single-producer broadcast channel. Every receiver gets its own ring
/// buffer, so a slow receiver only ever loses its own oldest messages and
/// never blocks the sender or its siblings.
#[derive(Debug)]
pub struct Channel<T> {
    inner: Mutex<ChannelInner<T>>,
}

#[derive(Debug)]
struct ChannelInner<T> {
    receivers: Vec<(usize, Arc<ReceiverShared<T>>)>,
    counter: usize,
    is_closed: bool,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(ChannelInner {
                receivers: vec![],
                counter: 0usize,
                is_closed: false,
            }),
        }
    }
}

impl<T: Clone> Channel<T> {
    fn write(&self, data: T) {
        let receivers = &self.inner.lock().unwrap().receivers;

        for (_, receiver) in receivers.iter() {
            receiver.write(data.clone());
        }
    }
}

impl<T> Channel<T> {
    pub fn add_receiver(capacity: Capacity, this: &Arc<Channel<T>>) -> Receiver<T> {
        let mut inner = this.inner.lock().unwrap();

        let index = inner.counter;
        inner.counter += 1;

        let shared = Arc::new(ReceiverShared::<T>::new(capacity, inner.is_closed));

        inner.receivers.push((index, shared.clone()));

        Receiver {
            shared,
            channel_index: index,
            capacity,
            channel: this.clone(),
        }
    }

    fn remove_receiver(&self, index: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.receivers.retain(|(i, _)| *i != index);
    }

    fn close(&self) {
        let mut inner = self.inner.lock().unwrap();

        inner.is_closed = true;

        for (_, recv) in inner.receivers.iter() {
            recv.inner.lock().unwrap().closed = true;
            recv.cv.notify_all();
        }
    }
}

#[derive(Debug)]
struct ReceiverShared<T> {
    inner: Mutex<ReceiverInner<T>>,
    cv: Condvar,
}

#[derive(Debug)]
struct ReceiverInner<T> {
    buf: Buffer<T>,
    closed: bool,
}

impl<T> ReceiverShared<T> {
    fn new(capacity: Capacity, closed: bool) -> Self {
        Self {
            inner: Mutex::new(ReceiverInner {
                buf: Buffer::new(capacity),
                closed,
            }),
            cv: Condvar::default(),
        }
    }

    fn write(&self, data: T) {
        let mut inner = self.inner.lock().unwrap();
        inner.buf.push(data);

        self.cv.notify_one();
    }
}

#[derive(Debug)]
pub struct Receiver<T> {
    shared: Arc<ReceiverShared<T>>,
    channel_index: usize,
    capacity: Capacity,
    channel: Arc<Channel<T>>,
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.channel.remove_receiver(self.channel_index);
    }
}

impl<T> Receiver<T> {
    /// Block until a message is available or the channel closes.
    pub fn recv(&self) -> Result<T, ChannelError> {
        let inner = self.shared.inner.lock().unwrap();

        let mut inner = self
            .shared
            .cv
            .wait_while(inner, |inner| inner.buf.is_empty() && !inner.closed)
            .unwrap();

        if inner.buf.is_empty() {
            Err(ChannelError::Closed)
        } else {
            Ok(inner.buf.dequeue().unwrap())
        }
    }

    /// Block until a message is available, the channel closes, or `timeout`
    /// elapses. The timeout is what lets a listener loop observe an external
    /// stop request while idle.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, ChannelError> {
        let inner = self.shared.inner.lock().unwrap();

        let (mut inner, result) = self
            .shared
            .cv
            .wait_timeout_while(inner, timeout, |inner| {
                inner.buf.is_empty() && !inner.closed
            })
            .unwrap();

        if let Some(value) = inner.buf.dequeue() {
            Ok(value)
        } else if inner.closed {
            Err(ChannelError::Closed)
        } else {
            debug_assert!(result.timed_out());
            Err(ChannelError::TimedOut)
        }
    }

    pub fn try_recv(&self) -> Result<T, ChannelError> {
        let mut inner = self.shared.inner.lock().unwrap();

        if let Some(value) = inner.buf.dequeue() {
            Ok(value)
        } else if inner.closed {
            Err(ChannelError::Closed)
        } else {
            Err(ChannelError::Empty)
        }
    }

    pub fn len(&self) -> usize {
        self.shared.inner.lock().unwrap().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.inner.lock().unwrap().buf.is_empty()
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn clone_with_capacity(&self, capacity: Capacity) -> Self {
        Channel::<T>::add_receiver(capacity, &self.channel)
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.clone_with_capacity(self.capacity)
    }
}

#[derive(Debug)]
pub struct Sender<T> {
    channel: Arc<Channel<T>>,
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.channel.close();
    }
}

impl<T: Clone> Sender<T> {
    pub fn send(&self, value: T) {
        self.channel.write(value);
    }
}

impl<T> Sender<T> {
    pub fn get_channel(&self) -> Arc<Channel<T>> {
        self.channel.clone()
    }
}

/// Create a channel, returning its sender and a first receiver.
pub fn channel<T>(capacity: Capacity) -> (Sender<T>, Receiver<T>) {
    let ch = Arc::new(Channel::<T>::default());

    let receiver = Channel::add_receiver(capacity, &ch);
    let sender = Sender { channel: ch };

    (sender, receiver)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn send_recv_fifo() {
        let (tx, rx) = channel::<i32>(Capacity::Unbounded);

        tx.send(1);
        tx.send(2);
        tx.send(3);

        assert_eq!(rx.try_recv(), Ok(1));
        assert_eq!(rx.try_recv(), Ok(2));
        assert_eq!(rx.try_recv(), Ok(3));
        assert_eq!(rx.try_recv(), Err(ChannelError::Empty));
    }

    #[test]
    fn bounded_overwrites_oldest() {
        let (tx, rx) = channel::<i32>(2usize.into());

        tx.send(1);
        tx.send(2);
        tx.send(3);

        assert_eq!(rx.try_recv(), Ok(2));
        assert_eq!(rx.try_recv(), Ok(3));
        assert_eq!(rx.try_recv(), Err(ChannelError::Empty));
    }

    #[test]
    fn every_receiver_gets_a_copy() {
        let (tx, rx1) = channel::<i32>(Capacity::Unbounded);
        let rx2 = rx1.clone();

        tx.send(7);

        assert_eq!(rx1.try_recv(), Ok(7));
        assert_eq!(rx2.try_recv(), Ok(7));
    }

    #[test]
    fn sender_drop_closes() {
        let (tx, rx) = channel::<i32>(Capacity::Unbounded);

        tx.send(1);
        drop(tx);

        // Buffered data is still delivered before the close is reported.
        assert_eq!(rx.try_recv(), Ok(1));
        assert_eq!(rx.try_recv(), Err(ChannelError::Closed));
        assert_eq!(rx.recv(), Err(ChannelError::Closed));
    }

    #[test]
    fn recv_timeout_times_out() {
        let (_tx, rx) = channel::<i32>(Capacity::Unbounded);

        let res = rx.recv_timeout(Duration::from_millis(10));
        assert_eq!(res, Err(ChannelError::TimedOut));
    }

    #[test]
    fn recv_blocks_until_data() {
        let (tx, rx) = channel::<i32>(Capacity::Unbounded);

        let handle = thread::spawn(move || rx.recv());

        thread::sleep(Duration::from_millis(20));
        tx.send(42);

        assert_eq!(handle.join().unwrap(), Ok(42));
    }
}
