//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one line per [`NodeEvent`] to the
//! ESP-IDF logger (UART / USB-CDC in production).  Lines carry a short
//! category prefix so the serial console can be grepped.

use log::{info, warn};

use crate::app::events::{NodeEvent, SensorKind};
use crate::app::ports::EventSink;

/// Adapter that logs every [`NodeEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn ok_str(ok: bool) -> &'static str {
    if ok { "OK" } else { "FAIL" }
}

fn sensor_name(kind: SensorKind) -> &'static str {
    match kind {
        SensorKind::Angle => "ALS31300",
        SensorKind::Range => "VL6180X",
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NodeEvent) {
        match event {
            NodeEvent::Started(h) => {
                info!(
                    "STATE | started | angle={} range={}",
                    ok_str(h.angle),
                    ok_str(h.range)
                );
            }
            NodeEvent::BusRecovered { freed: true } => info!("BUS | recovery released SDA"),
            NodeEvent::BusRecovered { freed: false } => warn!("BUS | SDA still held low"),
            NodeEvent::BusScanned {
                devices,
                angle_found,
            } => {
                info!(
                    "BUS | scan found {} device(s) | angle sensor {}",
                    devices,
                    if *angle_found { "found" } else { "missing" }
                );
            }
            NodeEvent::SensorStatus {
                sensor,
                ok: true,
                ..
            } => info!("SENSOR | {} recovered", sensor_name(*sensor)),
            NodeEvent::SensorStatus {
                sensor,
                ok: false,
                code,
            } => warn!("SENSOR | {} error, status={}", sensor_name(*sensor), code),
            NodeEvent::HeadingPublished { deg, ok } => {
                info!("MQTT | heading {} deg | {}", deg, ok_str(*ok));
            }
            NodeEvent::RangeMoved { mm } => info!("SENSOR | range {} mm", mm),
            NodeEvent::Button { pressed } => {
                info!(
                    "BUTTON | {}",
                    if *pressed { "pressed" } else { "released" }
                );
            }
            NodeEvent::Cannon { event, ok } => {
                info!("MQTT | {} | {}", event.leaf(), ok_str(*ok));
            }
            NodeEvent::SensorsReset(h) => {
                info!(
                    "STATE | sensors reset | angle={} range={}",
                    ok_str(h.angle),
                    ok_str(h.range)
                );
            }
            NodeEvent::Reported { report, ok: true } => {
                info!("MQTT | {} report | OK", report.name());
            }
            NodeEvent::Reported { report, ok: false } => {
                warn!("MQTT | {} report | FAIL", report.name());
            }
            NodeEvent::Status(s) => {
                info!(
                    "STATUS | mqtt={} angle={} range={} | heading={:.1} deg | dist={} mm",
                    ok_str(s.connected),
                    ok_str(s.health.angle),
                    ok_str(s.health.range),
                    s.heading_deg,
                    s.range_mm,
                );
            }
        }
    }
}
