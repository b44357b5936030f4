//! Broadcast hub for real-time price fan-out
//!
//! The hub keeps a registry of stream subscribers. Each subscriber carries
//! a mutable topic set, an optional country filter, and an unbounded sender
//! feeding its connection task. A failed send means the connection is gone;
//! the subscriber is pruned, not retried, and the rest of the fan-out is
//! unaffected.

use chrono::{DateTime, Utc};
use common::{Country, Currency};
use observability::PriceMetrics;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use uuid::Uuid;

/// Topic carried by every price table push
pub const PRICE_UPDATE_TOPIC: &str = "price_update";

/// Opaque identifier handed to each stream client
pub type SubscriberId = Uuid;

/// A price table push, one per country per refresh tick
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub country: Country,
    /// Purity label ("24K", "22K", ...) to per-gram price, rounded
    pub prices: BTreeMap<String, f64>,
    pub currency: Currency,
    pub spot_price_usd: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct TaggedUpdate<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    update: &'a PriceUpdate,
}

struct Subscriber {
    topics: HashSet<String>,
    country: Option<Country>,
    sender: UnboundedSender<Message>,
}

/// Concurrent subscriber registry with topic and country filtering
#[derive(Default)]
pub struct BroadcastHub {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its id.
    ///
    /// New subscribers start with the price update topic so a client that
    /// never sends a control frame still receives pushes.
    pub fn register(&self, sender: UnboundedSender<Message>) -> SubscriberId {
        let id = Uuid::new_v4();
        let mut topics = HashSet::new();
        topics.insert(PRICE_UPDATE_TOPIC.to_string());

        self.subscribers.write().insert(
            id,
            Subscriber {
                topics,
                country: None,
                sender,
            },
        );
        self.record_subscriber_count();
        id
    }

    /// Remove a subscriber. No-op if already pruned.
    pub fn unregister(&self, id: SubscriberId) {
        self.subscribers.write().remove(&id);
        self.record_subscriber_count();
    }

    /// Add topics to a subscriber's set
    pub fn subscribe(&self, id: SubscriberId, topics: &[String]) {
        if let Some(sub) = self.subscribers.write().get_mut(&id) {
            sub.topics.extend(topics.iter().cloned());
        }
    }

    /// Remove topics from a subscriber's set
    pub fn unsubscribe(&self, id: SubscriberId, topics: &[String]) {
        if let Some(sub) = self.subscribers.write().get_mut(&id) {
            for topic in topics {
                sub.topics.remove(topic);
            }
        }
    }

    /// Set or clear a subscriber's country filter
    pub fn set_country(&self, id: SubscriberId, country: Option<Country>) {
        if let Some(sub) = self.subscribers.write().get_mut(&id) {
            sub.country = country;
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Serialize and fan out a price update. Returns the delivery count.
    pub fn broadcast_price_update(&self, update: &PriceUpdate) -> usize {
        let frame = TaggedUpdate {
            kind: PRICE_UPDATE_TOPIC,
            update,
        };
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                warn!(%e, country = %update.country, "Failed to serialize price update");
                return 0;
            }
        };
        self.broadcast(PRICE_UPDATE_TOPIC, update.country, Message::Text(text))
    }

    /// Deliver a message to every subscriber whose topic set contains
    /// `topic` and whose country filter is unset or matches `country`.
    ///
    /// Subscribers with a closed channel are pruned in the same pass.
    pub fn broadcast(&self, topic: &str, country: Country, message: Message) -> usize {
        let mut delivered = 0usize;
        let mut dead: Vec<SubscriberId> = Vec::new();

        {
            let subscribers = self.subscribers.read();
            for (id, sub) in subscribers.iter() {
                if !sub.topics.contains(topic) {
                    continue;
                }
                if sub.country.is_some_and(|c| c != country) {
                    continue;
                }
                if sub.sender.send(message.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in &dead {
                subscribers.remove(id);
                PriceMetrics::broadcast_pruned();
                debug!(subscriber = %id, "Pruned dead stream subscriber");
            }
            drop(subscribers);
            self.record_subscriber_count();
        }

        PriceMetrics::broadcast_delivered(delivered as u64);
        delivered
    }

    fn record_subscriber_count(&self) {
        PriceMetrics::set_subscribers(self.subscribers.read().len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn sample_update(country: Country) -> PriceUpdate {
        let mut prices = BTreeMap::new();
        prices.insert("24K".to_string(), 7000.0);
        prices.insert("22K".to_string(), 6416.9);
        PriceUpdate {
            country,
            prices,
            currency: country.currency(),
            spot_price_usd: 2400.0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_default_topic() {
        let hub = BroadcastHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register(tx);

        let delivered = hub.broadcast_price_update(&sample_update(Country::IN));
        assert_eq!(delivered, 1);

        let msg = rx.try_recv().unwrap();
        let text = msg.into_text().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "price_update");
        assert_eq!(value["country"], "IN");
        assert_eq!(value["currency"], "INR");
        assert_eq!(value["prices"]["24K"], 7000.0);
        assert!(value["spotPriceUsd"].is_f64());
    }

    #[tokio::test]
    async fn test_country_filter_scopes_delivery() {
        let hub = BroadcastHub::new();

        let (tx_in, mut rx_in) = mpsc::unbounded_channel();
        let in_id = hub.register(tx_in);
        hub.set_country(in_id, Some(Country::IN));

        let (tx_uk, mut rx_uk) = mpsc::unbounded_channel();
        let uk_id = hub.register(tx_uk);
        hub.set_country(uk_id, Some(Country::UK));

        let (tx_all, mut rx_all) = mpsc::unbounded_channel();
        hub.register(tx_all);

        let delivered = hub.broadcast_price_update(&sample_update(Country::IN));

        // India-filtered and unfiltered subscribers, not the UK one
        assert_eq!(delivered, 2);
        assert!(rx_in.try_recv().is_ok());
        assert!(rx_uk.try_recv().is_err());
        assert!(rx_all.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_unsubscribed_topic_not_delivered() {
        let hub = BroadcastHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.register(tx);

        hub.unsubscribe(id, &[PRICE_UPDATE_TOPIC.to_string()]);
        let delivered = hub.broadcast_price_update(&sample_update(Country::AE));
        assert_eq!(delivered, 0);
        assert!(rx.try_recv().is_err());

        hub.subscribe(id, &[PRICE_UPDATE_TOPIC.to_string()]);
        let delivered = hub.broadcast_price_update(&sample_update(Country::AE));
        assert_eq!(delivered, 1);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_dead_subscriber_pruned_without_blocking_others() {
        let hub = BroadcastHub::new();

        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        hub.register(tx_dead);
        drop(rx_dead);

        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        hub.register(tx_live);

        assert_eq!(hub.subscriber_count(), 2);

        let delivered = hub.broadcast_price_update(&sample_update(Country::IN));
        assert_eq!(delivered, 1);
        assert!(rx_live.try_recv().is_ok());
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let hub = BroadcastHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register(tx);

        hub.unregister(id);
        hub.unregister(id);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
