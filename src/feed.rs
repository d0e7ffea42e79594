use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::FeedError;
use crate::models::Event;

pub const DEFAULT_FAILURE_RATE: f64 = 0.05;
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(250);

/// Remote source of the event catalog.
#[async_trait]
pub trait EventFeed: Send + Sync {
    async fn fetch_remote_event_list(&self) -> Result<Vec<Event>, FeedError>;
}

/// Serves a fixed catalog after an artificial delay, failing at random.
#[derive(Debug, Clone)]
pub struct SimulatedEventFeed {
    events: Vec<Event>,
    latency: Duration,
    failure_rate: f64,
}

impl SimulatedEventFeed {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            latency: DEFAULT_LATENCY,
            failure_rate: DEFAULT_FAILURE_RATE,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Clamped to `0.0..=1.0`.
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        self
    }
}

#[async_trait]
impl EventFeed for SimulatedEventFeed {
    async fn fetch_remote_event_list(&self) -> Result<Vec<Event>, FeedError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failed = rand::thread_rng().gen_bool(self.failure_rate);
        if failed {
            return Err(FeedError::transient("simulated network error"));
        }

        Ok(self.events.clone())
    }
}
