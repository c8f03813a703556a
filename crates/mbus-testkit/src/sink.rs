use serde_json::Value;

use mbus_catchup::ports::DeliverySink;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub channel: String,
    pub payload: String,
}

/// Sink that keeps every delivery in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub deliveries: Vec<Delivery>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    pub fn channels(&self) -> Vec<&str> {
        self.deliveries.iter().map(|d| d.channel.as_str()).collect()
    }

    /// Payloads decoded as JSON; undecodable payloads become `Value::Null`.
    pub fn payloads_json(&self) -> Vec<Value> {
        self.deliveries
            .iter()
            .map(|d| serde_json::from_str(&d.payload).unwrap_or(Value::Null))
            .collect()
    }

    pub fn clear(&mut self) {
        self.deliveries.clear();
    }
}

impl DeliverySink for RecordingSink {
    fn deliver(&mut self, channel: &str, payload: &str) {
        self.deliveries.push(Delivery {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
    }
}
