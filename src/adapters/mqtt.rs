//! MQTT adapter over `esp_idf_svc::mqtt::client`.
//!
//! Implements [`MessagePublisher`].  The client's event callback runs on
//! the ESP-IDF MQTT task; it only flips the connection flag and queues
//! inbound messages.  The main loop calls [`MqttAdapter::poll`] to
//! (re)subscribe after a connect and drains commands with
//! [`MqttAdapter::next_message`].
//!
//! Reconnection is left to the ESP-IDF client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};

use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
};
use esp_idf_svc::sys::EspError;
use heapless::{String, Vec};
use log::{debug, info, warn};

use crate::app::ports::MessagePublisher;
use crate::telemetry::topic::{TOPIC_CAP, Topic, validate_subscribe_filter};

/// Longest command payload worth keeping.
pub const INBOUND_PAYLOAD_CAP: usize = 32;

/// One received message.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub topic: Topic,
    pub payload: Vec<u8, INBOUND_PAYLOAD_CAP>,
}

pub struct MqttAdapter {
    client: EspMqttClient<'static>,
    connected: Arc<AtomicBool>,
    resubscribe: Arc<AtomicBool>,
    inbound: Receiver<Inbound>,
    filters: Vec<Topic, 4>,
}

fn qos_of(qos: u8) -> QoS {
    if qos == 0 {
        QoS::AtMostOnce
    } else {
        QoS::AtLeastOnce
    }
}

impl MqttAdapter {
    /// Start the client.  `filters` are subscribed on every connect.
    pub fn connect(url: &str, client_id: &str, filters: &[Topic]) -> Result<Self, EspError> {
        let connected = Arc::new(AtomicBool::new(false));
        let resubscribe = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<Inbound>();

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            ..Default::default()
        };

        let cb_connected = connected.clone();
        let cb_resubscribe = resubscribe.clone();
        let client = EspMqttClient::new_cb(url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => {
                cb_connected.store(true, Ordering::Release);
                cb_resubscribe.store(true, Ordering::Release);
            }
            EventPayload::Disconnected => {
                cb_connected.store(false, Ordering::Release);
            }
            EventPayload::Received {
                topic: Some(topic),
                data,
                details: Details::Complete,
                ..
            } => {
                let mut t: String<TOPIC_CAP> = String::new();
                let mut p: Vec<u8, INBOUND_PAYLOAD_CAP> = Vec::new();
                if t.push_str(topic).is_err() || p.extend_from_slice(data).is_err() {
                    return;
                }
                let _ = tx.send(Inbound { topic: t, payload: p });
            }
            _ => {}
        })?;

        info!("MQTT | client started for {}", url);
        let mut kept = Vec::new();
        for f in filters {
            if !validate_subscribe_filter(f) {
                warn!("MQTT | invalid filter {} ignored", f);
            } else if kept.push(f.clone()).is_err() {
                warn!("MQTT | dropping filter {}", f);
            }
        }
        Ok(Self {
            client,
            connected,
            resubscribe,
            inbound: rx,
            filters: kept,
        })
    }

    /// Subscribe after a fresh connect.  Call once per loop.
    pub fn poll(&mut self) {
        if !self.resubscribe.swap(false, Ordering::AcqRel) {
            return;
        }
        for f in &self.filters {
            match self.client.subscribe(f, QoS::AtMostOnce) {
                Ok(_) => info!("MQTT | subscribed {}", f),
                Err(e) => {
                    warn!("MQTT | subscribe {} failed: {}", f, e);
                    self.resubscribe.store(true, Ordering::Release);
                }
            }
        }
    }

    /// Next queued inbound message, if any.
    pub fn next_message(&mut self) -> Option<Inbound> {
        match self.inbound.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl MessagePublisher for MqttAdapter {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool, qos: u8) -> bool {
        if !self.connected() {
            return false;
        }
        match self
            .client
            .publish(topic, qos_of(qos), retain, payload.as_bytes())
        {
            Ok(_) => true,
            Err(e) => {
                debug!("MQTT | publish {} failed: {}", topic, e);
                false
            }
        }
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
