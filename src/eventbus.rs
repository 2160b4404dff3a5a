//! Fan-out of polled input.
//!
//! Two kinds of consumers hang off the bus:
//! - synchronous [`InputListener`]s receive diffed [`InputEvent`]s inline on the
//!   poll loop (logging, UI mirrors). They must not block;
//! - async subscribers (the [input-wait detector](crate::detector)) receive
//!   whole [`DeviceSample`]s through a [`SampleFeed`]. A subscription lives
//!   exactly as long as its receiver; dropping the receiver unsubscribes.

use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::event::{InputEvent, InputKind};
use crate::snapshot::DeviceSample;

/// Default number of samples buffered per async subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Trait for reacting to input events from any device.
pub trait InputListener: Send {
    fn on_input(&mut self, event: &InputEvent);
}

/// Determines which kinds of events a listener wants to receive.
#[derive(Debug, Clone, Copy)]
pub enum EventFilter {
    All,
    AxisOnly,
    ButtonsOnly,
    HatsOnly,
    /// Connect / disconnect notifications only.
    ConnectionOnly,
    Custom(fn(&InputEvent) -> bool),
}

impl EventFilter {
    fn accepts(&self, event: &InputEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::AxisOnly => matches!(event.kind, InputKind::AxisMoved { .. }),
            EventFilter::ButtonsOnly => matches!(
                event.kind,
                InputKind::ButtonPressed { .. } | InputKind::ButtonReleased { .. }
            ),
            EventFilter::HatsOnly => matches!(event.kind, InputKind::HatChanged { .. }),
            EventFilter::ConnectionOnly => matches!(
                event.kind,
                InputKind::Connected { .. } | InputKind::Disconnected
            ),
            EventFilter::Custom(f) => f(event),
        }
    }
}

/// Metadata-wrapped listener with filters and control flags.
struct ListenerEntry {
    listener: Box<dyn InputListener>,
    enabled: bool,
    filter: EventFilter,
    /// Only deliver events from this device id.
    tag: Option<String>,
}

/// A sample as delivered to feed subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    /// When the sample was published, not when it was received.
    pub published: Instant,
    pub sample: DeviceSample,
}

/// Broadcast channel of raw per-device samples.
#[derive(Clone, Debug)]
pub struct SampleFeed {
    tx: broadcast::Sender<FeedItem>,
}

impl SampleFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Start receiving samples published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedItem> {
        self.tx.subscribe()
    }

    /// Publish a sample stamped with the current time. Returns how many
    /// subscribers it reached.
    pub fn publish(&self, sample: DeviceSample) -> usize {
        let item = FeedItem {
            published: Instant::now(),
            sample,
        };
        // No subscribers is the normal idle case.
        self.tx.send(item).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SampleFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

pub struct InputEventBus {
    next_id: u64,
    listeners: HashMap<u64, ListenerEntry>,
    feed: SampleFeed,
}

impl Default for InputEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InputEventBus {
    pub fn new() -> Self {
        Self::with_feed(SampleFeed::default())
    }

    pub fn with_feed(feed: SampleFeed) -> Self {
        Self {
            next_id: 0,
            listeners: HashMap::new(),
            feed,
        }
    }

    /// Handle for async subscribers.
    pub fn feed(&self) -> SampleFeed {
        self.feed.clone()
    }

    /// Registers a listener with optional filtering and device tag.
    pub fn add_listener(
        &mut self,
        listener: impl InputListener + 'static,
        filter: EventFilter,
        tag: Option<String>,
    ) -> u64 {
        let id = self.next_id;
        self.listeners.insert(
            id,
            ListenerEntry {
                listener: Box::new(listener),
                enabled: true,
                filter,
                tag,
            },
        );
        self.next_id += 1;
        id
    }

    /// Enables a previously registered listener.
    pub fn enable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = true;
        }
    }

    /// Disables (mutes) a listener without removing it.
    pub fn disable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = false;
        }
    }

    /// Unregisters a listener entirely.
    pub fn remove_listener(&mut self, id: u64) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Emits one event to all active and matching listeners.
    fn emit(&mut self, event: &InputEvent) {
        for entry in self.listeners.values_mut() {
            if !entry.enabled {
                continue;
            }
            if let Some(ref wanted_id) = entry.tag {
                if event.device_id != *wanted_id {
                    continue;
                }
            }
            if entry.filter.accepts(event) {
                entry.listener.on_input(event);
            }
        }
    }

    /// Emits a batch of events to matching listeners.
    pub fn emit_all(&mut self, events: &[InputEvent]) {
        for event in events {
            self.emit(event);
        }
    }

    /// Forwards samples to async subscribers.
    pub fn publish_samples(&self, samples: impl IntoIterator<Item = DeviceSample>) {
        for sample in samples {
            self.feed.publish(sample);
        }
    }
}
