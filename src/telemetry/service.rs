use std::{
    any::{Any, type_name},
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use thiserror::Error;

use crate::{
    core::time::UtcInstant,
    utils::{
        capacity::Capacity,
        ringchannel::{Channel, ChannelError, Receiver, Sender, channel},
    },
};

#[derive(PartialEq, Eq, Error, Debug)]
pub enum TelemetryError {
    #[error("Requested channel type '{requested}', but channel is a '{expected}'")]
    WrongChannelType { requested: String, expected: String },

    #[error("Trying to read from an empty channel")]
    EmptyChannel,

    #[error("Trying to read from a closed channel")]
    ClosedChannel,

    #[error("Timed out waiting for channel data")]
    Timeout,

    #[error("Cannot create more than one producer for a channel")]
    AlreadyHasProducer,
}

/// Bus envelope: the instant is emission metadata stamped by the sender, not
/// part of the message payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Timestamped<T>(pub UtcInstant, pub T);

#[derive(Debug)]
pub struct TelemetrySender<T> {
    sender: Sender<Timestamped<T>>,
}

impl<T: 'static + Clone> TelemetrySender<T> {
    pub fn send(&self, timestamp: UtcInstant, value: T) {
        self.sender.send(Timestamped(timestamp, value));
    }
}

#[derive(Debug)]
pub struct TelemetryReceiver<T> {
    receiver: Receiver<Timestamped<T>>,
}

impl<T> TelemetryReceiver<T> {
    pub fn recv(&self) -> Result<Timestamped<T>, TelemetryError> {
        self.receiver.recv().map_err(map_channel_error)
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Timestamped<T>, TelemetryError> {
        self.receiver.recv_timeout(timeout).map_err(map_channel_error)
    }

    pub fn try_recv(&self) -> Result<Timestamped<T>, TelemetryError> {
        self.receiver.try_recv().map_err(map_channel_error)
    }
}

fn map_channel_error(e: ChannelError) -> TelemetryError {
    match e {
        ChannelError::Closed => TelemetryError::ClosedChannel,
        ChannelError::Empty => TelemetryError::EmptyChannel,
        ChannelError::TimedOut => TelemetryError::Timeout,
    }
}

#[derive(Debug)]
struct TelemetryChannel {
    #[allow(dead_code)]
    name: String,

    typename: String,

    channel: Box<dyn Any + Send>, // Box<TelemetryChannelTransport<T>>
}

struct TelemetryChannelTransport<T> {
    channel: Weak<Channel<Timestamped<T>>>,
    sender: Option<Sender<Timestamped<T>>>,
}

impl TelemetryChannel {
    fn new<T: 'static + Send>(name: &str) -> Self {
        let (sender, _) = channel::<Timestamped<T>>(Capacity::Unbounded);

        let transport = TelemetryChannelTransport::<T> {
            channel: Arc::downgrade(&sender.get_channel()),
            sender: Some(sender),
        };

        Self {
            name: name.to_string(),
            typename: type_name::<T>().to_string(),
            channel: Box::new(transport),
        }
    }

    fn take_producer<T: 'static>(&mut self) -> Result<TelemetrySender<T>, TelemetryError> {
        let channel = self.downcast_mut::<T>()?;

        Ok(TelemetrySender {
            sender: channel
                .sender
                .take()
                .ok_or(TelemetryError::AlreadyHasProducer)?,
        })
    }

    fn add_subscriber<T: 'static>(
        &mut self,
        capacity: Capacity,
    ) -> Result<TelemetryReceiver<T>, TelemetryError> {
        let channel = self.downcast_mut::<T>()?;

        let ch = Weak::upgrade(&channel.channel).ok_or(TelemetryError::ClosedChannel)?;

        Ok(TelemetryReceiver {
            receiver: Channel::<Timestamped<T>>::add_receiver(capacity, &ch),
        })
    }

    fn downcast_mut<T: 'static>(
        &mut self,
    ) -> Result<&mut TelemetryChannelTransport<T>, TelemetryError> {
        self.channel
            .downcast_mut::<TelemetryChannelTransport<T>>()
            .ok_or(TelemetryError::WrongChannelType {
                requested: type_name::<T>().to_string(),
                expected: self.typename.clone(),
            })
    }
}

/// Typed, named pub/sub bus. Channels are created lazily on first publish or
/// subscribe; each channel has exactly one producer and any number of
/// subscribers. Clones share the same bus.
#[derive(Debug, Default, Clone)]
pub struct TelemetryService {
    inner: Arc<Mutex<TelemetryServiceInner>>,
}

#[derive(Debug, Default)]
struct TelemetryServiceInner {
    remap: HashMap<String, String>,
    channels: HashMap<String, TelemetryChannel>,
}

impl TelemetryService {
    /// A bus whose producers are redirected through `remap` (old name -> new
    /// name). Subscribers always use the name as given.
    pub fn new(remap: HashMap<String, String>) -> Self {
        TelemetryService {
            inner: Arc::new(Mutex::new(TelemetryServiceInner {
                remap,
                channels: HashMap::new(),
            })),
        }
    }

    pub fn publish<T: 'static + Send>(
        &self,
        channel_name: &str,
    ) -> Result<TelemetrySender<T>, TelemetryError> {
        let mut inner = self.inner.lock().unwrap();

        let channel_name = inner
            .remap
            .get(channel_name)
            .cloned()
            .unwrap_or_else(|| channel_name.to_string());

        let channel = inner.get_channel::<T>(channel_name.as_str());

        channel.take_producer()
    }

    pub fn subscribe<T: 'static + Send>(
        &self,
        channel_name: &str,
        capacity: Capacity,
    ) -> Result<TelemetryReceiver<T>, TelemetryError> {
        let mut inner = self.inner.lock().unwrap();
        let channel = inner.get_channel::<T>(channel_name);

        channel.add_subscriber(capacity)
    }
}

impl TelemetryServiceInner {
    fn get_channel<'a, T: 'static + Send>(
        &'a mut self,
        channel_name: &str,
    ) -> &'a mut TelemetryChannel {
        self.channels
            .entry(channel_name.to_string())
            .or_insert_with(|| TelemetryChannel::new::<T>(channel_name))
    }
}
