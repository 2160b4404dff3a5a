//! "Press the control you want to bind" capture.
//!
//! A [`DetectSession`] subscribes to the [`SampleFeed`] when it starts and
//! drops the subscription when it resolves. The session:
//! 1. ignores everything inside the settle window, so a control still moving
//!    from the click that opened the dialog is not captured;
//! 2. takes the first sample per device after the window as that device's rest
//!    state;
//! 3. resolves to the first control that departs from rest: an axis whose
//!    distance from its rest value exceeds the threshold, a button that goes
//!    down, a hat that leaves neutral.
//!
//! Timeouts and cancellation resolve without a capture. A closed feed counts as
//! cancellation. The settle window is judged by when a sample was published, so
//! a press made during the window is ignored even if `wait` starts late.
//!
//! Every session owns its state. The detector reports the state of the most
//! recently started session; a session dropped before it resolves goes back
//! to `Idle`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::binding::{InputSource, InputType};
use crate::config::DetectorConfig;
use crate::eventbus::{FeedItem, SampleFeed};
use crate::snapshot::{DeviceSample, DeviceSnapshot, HAT_NEUTRAL};

/// Which controls a session listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectFilter {
    Axes,
    Buttons,
    Hats,
}

impl DetectFilter {
    pub fn input_type(self) -> InputType {
        match self {
            DetectFilter::Axes => InputType::Axis,
            DetectFilter::Buttons => InputType::Button,
            DetectFilter::Hats => InputType::Hat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DetectState {
    #[default]
    Idle,
    Listening,
    Captured,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectOutcome {
    Captured(InputSource),
    TimedOut,
    Cancelled,
}

impl DetectOutcome {
    pub fn input(&self) -> Option<&InputSource> {
        match self {
            DetectOutcome::Captured(input) => Some(input),
            _ => None,
        }
    }

    fn state(&self) -> DetectState {
        match self {
            DetectOutcome::Captured(_) => DetectState::Captured,
            DetectOutcome::TimedOut => DetectState::TimedOut,
            DetectOutcome::Cancelled => DetectState::Cancelled,
        }
    }
}

type SharedState = Arc<Mutex<DetectState>>;

fn set_state(shared: &SharedState, state: DetectState) {
    *shared.lock().unwrap_or_else(PoisonError::into_inner) = state;
}

fn get_state(shared: &SharedState) -> DetectState {
    *shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancels a running session from any thread or task.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
    state: SharedState,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// State of the session this handle belongs to.
    pub fn state(&self) -> DetectState {
        get_state(&self.state)
    }
}

/// Starts capture sessions against one sample feed.
#[derive(Debug, Clone)]
pub struct InputWaitDetector {
    feed: SampleFeed,
    config: DetectorConfig,
    latest: Arc<Mutex<SharedState>>,
}

impl InputWaitDetector {
    pub fn new(feed: SampleFeed, config: DetectorConfig) -> Self {
        Self {
            feed,
            config,
            latest: Arc::default(),
        }
    }

    /// State of the most recent session; `Idle` before the first one.
    pub fn state(&self) -> DetectState {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner).clone();
        get_state(&latest)
    }

    /// Subscribe and start listening. The settle window starts now.
    pub fn start(&self, filter: DetectFilter) -> DetectSession {
        let state = Arc::new(Mutex::new(DetectState::Listening));
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = state.clone();
        debug!(?filter, "input detection started");
        DetectSession {
            rx: self.feed.subscribe(),
            filter,
            threshold: self.config.axis_threshold,
            settle: self.config.settle(),
            timeout: self.config.timeout(),
            started: Instant::now(),
            token: CancellationToken::new(),
            state,
            baselines: HashMap::new(),
        }
    }

    /// Start a session with the configured threshold and timeout and wait for it.
    pub async fn wait(&self, filter: DetectFilter) -> DetectOutcome {
        self.start(filter).wait().await
    }
}

struct Baseline {
    rest: DeviceSnapshot,
    last: DeviceSnapshot,
}

/// One capture attempt. Resolve it with [`wait`](Self::wait).
///
/// Dropping an unresolved session returns its state to `Idle`.
pub struct DetectSession {
    rx: broadcast::Receiver<FeedItem>,
    filter: DetectFilter,
    threshold: f32,
    settle: Duration,
    timeout: Duration,
    started: Instant,
    token: CancellationToken,
    state: SharedState,
    baselines: HashMap<String, Baseline>,
}

impl DetectSession {
    /// Override the axis threshold for this session.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Override the timeout, measured from session start.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.token.clone(),
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> DetectState {
        get_state(&self.state)
    }

    /// Listen until capture, timeout or cancellation.
    ///
    /// Consumes the session; the feed subscription ends with it.
    pub async fn wait(mut self) -> DetectOutcome {
        let deadline = self.started + self.timeout;
        let settled_at = self.started + self.settle;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break DetectOutcome::Cancelled,
                _ = tokio::time::sleep_until(deadline) => break DetectOutcome::TimedOut,
                received = self.rx.recv() => match received {
                    Ok(item) => {
                        if item.published < settled_at {
                            continue;
                        }
                        if let Some(input) = self.inspect(item.sample) {
                            break DetectOutcome::Captured(input);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "input detection lagged");
                    }
                    Err(RecvError::Closed) => break DetectOutcome::Cancelled,
                },
            }
        };

        set_state(&self.state, outcome.state());
        match &outcome {
            DetectOutcome::Captured(input) => info!(
                device = %input.device_id,
                kind = ?input.kind,
                index = input.index,
                "input captured"
            ),
            other => info!(outcome = ?other, "input detection ended"),
        }
        outcome
    }

    /// Compare a post-settle sample against its device's rest state.
    fn inspect(&mut self, sample: DeviceSample) -> Option<InputSource> {
        let DeviceSample {
            device_id,
            device_name,
            state,
            ..
        } = sample;

        if !self.baselines.contains_key(&device_id) {
            self.baselines.insert(
                device_id,
                Baseline {
                    rest: state.clone(),
                    last: state,
                },
            );
            return None;
        }
        let base = self.baselines.get_mut(&device_id)?;

        let found = match self.filter {
            DetectFilter::Axes => state.axes.iter().enumerate().find_map(|(i, v)| {
                let rest = base.rest.axes.get(i).copied().unwrap_or(0.0);
                ((v - rest).abs() > self.threshold).then_some(i)
            }),
            DetectFilter::Buttons => state
                .buttons
                .iter()
                .enumerate()
                .find_map(|(i, down)| (*down && !base.last.button(i as u16)).then_some(i)),
            DetectFilter::Hats => state.hats.iter().enumerate().find_map(|(i, h)| {
                (*h != HAT_NEUTRAL && base.last.hat(i as u16) == HAT_NEUTRAL).then_some(i)
            }),
        };
        base.last = state;

        found.map(|i| InputSource::new(device_id, device_name, self.filter.input_type(), i as u16))
    }
}

impl Drop for DetectSession {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == DetectState::Listening {
            *state = DetectState::Idle;
            debug!(filter = ?self.filter, "input detection abandoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn sample(axes: Vec<f32>, buttons: Vec<bool>, hats: Vec<i16>) -> DeviceSample {
        DeviceSample {
            device_id: "stick".into(),
            device_name: "Stick".into(),
            state: DeviceSnapshot { axes, buttons, hats },
        }
    }

    fn detector(feed: &SampleFeed) -> InputWaitDetector {
        InputWaitDetector::new(feed.clone(), DetectorConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_captured_after_settle() {
        let feed = SampleFeed::new(16);
        let det = detector(&feed);
        assert_eq!(det.state(), DetectState::Idle);
        let session = det.start(DetectFilter::Buttons);
        assert_eq!(feed.subscriber_count(), 1);

        let publisher = feed.clone();
        tokio::spawn(async move {
            // Pressed during the settle window: ignored.
            publisher.publish(sample(vec![], vec![true, false], vec![]));
            tokio::time::sleep(ms(250)).await;
            publisher.publish(sample(vec![], vec![false, false], vec![]));
            tokio::time::sleep(ms(10)).await;
            publisher.publish(sample(vec![], vec![false, true], vec![]));
        });

        let outcome = session.wait().await;
        assert_eq!(outcome, DetectOutcome::Captured(InputSource::button("stick", 1)));
        assert_eq!(outcome.input().map(|i| i.device_name.as_str()), Some("Stick"));
        assert_eq!(det.state(), DetectState::Captured);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_during_settle_ignored_when_wait_starts_late() {
        let feed = SampleFeed::new(16);
        let det = detector(&feed);
        let session = det.start(DetectFilter::Buttons).with_timeout(ms(500));

        // Tapped while the window is open, but only read after it closes.
        feed.publish(sample(vec![], vec![false], vec![]));
        feed.publish(sample(vec![], vec![true], vec![]));
        feed.publish(sample(vec![], vec![false], vec![]));
        tokio::time::sleep(ms(300)).await;

        assert_eq!(session.wait().await, DetectOutcome::TimedOut);
        assert_eq!(det.state(), DetectState::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_axis_deviation_measured_from_rest() {
        let feed = SampleFeed::new(16);
        let det = detector(&feed);
        let session = det.start(DetectFilter::Axes);

        let publisher = feed.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ms(300)).await;
            // Throttle parked at the idle end.
            publisher.publish(sample(vec![0.0, -1.0], vec![], vec![]));
            tokio::time::sleep(ms(10)).await;
            publisher.publish(sample(vec![0.1, -0.6], vec![], vec![]));
            tokio::time::sleep(ms(10)).await;
            publisher.publish(sample(vec![0.1, 0.0], vec![], vec![]));
        });

        let outcome = session.wait().await;
        assert_eq!(outcome.input(), Some(&InputSource::axis("stick", 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hat_leaving_neutral() {
        let feed = SampleFeed::new(16);
        let det = detector(&feed);
        let session = det.start(DetectFilter::Hats);

        let publisher = feed.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ms(300)).await;
            publisher.publish(sample(vec![], vec![true], vec![HAT_NEUTRAL]));
            tokio::time::sleep(ms(10)).await;
            publisher.publish(sample(vec![], vec![false], vec![2]));
        });

        assert_eq!(session.wait().await.input(), Some(&InputSource::hat("stick", 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let feed = SampleFeed::new(16);
        let det = detector(&feed);
        let start = Instant::now();
        let outcome = det.start(DetectFilter::Buttons).with_timeout(ms(500)).wait().await;
        assert_eq!(outcome, DetectOutcome::TimedOut);
        assert_eq!(Instant::now() - start, ms(500));
        assert_eq!(det.state(), DetectState::TimedOut);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_from_other_task() {
        let feed = SampleFeed::new(16);
        let det = detector(&feed);
        let session = det.start(DetectFilter::Axes);
        let handle = session.cancel_handle();
        assert_eq!(handle.state(), DetectState::Listening);

        let canceller = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ms(50)).await;
            canceller.cancel();
        });

        assert_eq!(session.wait().await, DetectOutcome::Cancelled);
        assert!(handle.is_cancelled());
        assert_eq!(handle.state(), DetectState::Cancelled);
    }

    #[test]
    fn test_dropped_session_returns_to_idle() {
        let feed = SampleFeed::new(16);
        let det = detector(&feed);
        let session = det.start(DetectFilter::Buttons);
        let handle = session.cancel_handle();
        assert_eq!(det.state(), DetectState::Listening);

        drop(session);
        assert_eq!(det.state(), DetectState::Idle);
        assert_eq!(handle.state(), DetectState::Idle);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_keep_their_own_state() {
        let feed = SampleFeed::new(16);
        let det = detector(&feed);
        let first = det.start(DetectFilter::Buttons);
        let first_handle = first.cancel_handle();
        let second = det.start(DetectFilter::Axes);
        let second_handle = second.cancel_handle();

        first_handle.cancel();
        assert_eq!(first.wait().await, DetectOutcome::Cancelled);
        assert_eq!(first_handle.state(), DetectState::Cancelled);
        assert_eq!(second_handle.state(), DetectState::Listening);
        assert_eq!(det.state(), DetectState::Listening);

        drop(second);
        assert_eq!(det.state(), DetectState::Idle);
        assert_eq!(first_handle.state(), DetectState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_feed_is_cancellation() {
        let feed = SampleFeed::new(16);
        let session = detector(&feed).start(DetectFilter::Buttons);
        drop(feed);
        assert_eq!(session.wait().await, DetectOutcome::Cancelled);
    }
}
