use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::mock;

/// Categories pushed on every tick, in order.
pub const CATEGORIES: &[&str] = &["waterQuality", "healthStats", "weather", "marketPrices"];

/// One pushed payload.
#[derive(Debug, Clone, Serialize)]
pub struct Update {
    pub category: &'static str,
    pub payload: Value,
}

impl Update {
    pub fn to_event(&self) -> Result<Event, axum::Error> {
        Event::default().event(self.category).json_data(&self.payload)
    }
}

fn generate(category: &'static str) -> Update {
    let payload = match category {
        "waterQuality" => mock::water_quality(),
        "healthStats" => mock::health_stats(),
        "weather" => mock::climate_forecast(),
        "marketPrices" => mock::crop_prices(),
        _ => Value::Null,
    };
    Update { category, payload }
}

/// Fresh payload for every category.
pub fn snapshot() -> Vec<Update> {
    CATEGORIES.iter().copied().map(generate).collect()
}

/// Periodic fan-out of fresh mock data to every subscriber.
///
/// Best effort: slow subscribers that fall behind the channel capacity lose
/// the oldest updates.
pub struct Broadcaster {
    tx: broadcast::Sender<Update>,
    interval: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Broadcaster {
    pub fn new(interval: Duration, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            interval,
            ticker: Mutex::new(None),
        }
    }

    /// Starts the timer. Calling it while running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            return;
        }
        let this = Arc::clone(self);
        *ticker = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(this.interval);
            // The first tick fires immediately; subscribers already got a snapshot.
            tick.tick().await;
            loop {
                tick.tick().await;
                let sent = this.publish_round();
                debug!(subscribers = sent, "realtime round published");
            }
        }));
        info!(interval_ms = self.interval.as_millis() as u64, "realtime broadcaster started");
    }

    /// Stops the timer. Existing subscribers stay connected but receive nothing new.
    pub async fn stop(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
            info!("realtime broadcaster stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    /// Generates and sends one update per category. Returns the subscriber count.
    pub fn publish_round(&self) -> usize {
        let subscribers = self.tx.receiver_count();
        for category in CATEGORIES {
            // Fails only when nobody is listening.
            let _ = self.tx.send(generate(*category));
        }
        subscribers
    }

    /// Subscribes, returning the initial snapshot and the live receiver.
    pub fn subscribe(&self) -> (Vec<Update>, broadcast::Receiver<Update>) {
        let rx = self.tx.subscribe();
        (snapshot(), rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_gets_snapshot_then_rounds() {
        let b = Broadcaster::new(Duration::from_secs(60), 16);
        let (snap, mut rx) = b.subscribe();
        let categories: Vec<_> = snap.iter().map(|u| u.category).collect();
        assert_eq!(categories, CATEGORIES);

        assert_eq!(b.publish_round(), 1);
        for expected in CATEGORIES {
            let update = rx.recv().await.unwrap();
            assert_eq!(update.category, *expected);
        }
    }

    #[tokio::test]
    async fn every_subscriber_receives_each_round() {
        let b = Broadcaster::new(Duration::from_secs(60), 16);
        let (_, mut a) = b.subscribe();
        let (_, mut c) = b.subscribe();
        assert_eq!(b.publish_round(), 2);
        assert_eq!(a.recv().await.unwrap().category, CATEGORIES[0]);
        assert_eq!(c.recv().await.unwrap().category, CATEGORIES[0]);
    }

    #[tokio::test]
    async fn timer_publishes_until_stopped() {
        let b = Arc::new(Broadcaster::new(Duration::from_millis(20), 64));
        let (_, mut rx) = b.subscribe();

        b.start().await;
        b.start().await;
        assert!(b.is_running().await);

        let update = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timer should publish")
            .unwrap();
        assert_eq!(update.category, CATEGORIES[0]);

        b.stop().await;
        assert!(!b.is_running().await);
    }

    #[test]
    fn update_renders_as_sse_event() {
        let update = generate("healthStats");
        assert!(update.payload.get("activeCases").is_some());
        assert!(update.to_event().is_ok());
    }
}
