//! Node service: the hexagonal core.
//!
//! [`NodeService`] owns the loop filters, the state tracker, the change
//! view and the publish throttles.  All I/O flows through port traits
//! injected at call sites, so the whole pipeline runs against mocks.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ MessagePublisher
//!                 │          NodeService          │
//!                 │ filters · tracker · view ·    │ ──▶ EventSink
//!                 │ throttles                     │
//!                 └──────────────────────────────┘
//! ```
//!
//! One [`tick`](NodeService::tick) is one sampling cycle:
//! button → range → angle → tracker → view → publish.

use core::fmt::Write;

use heapless::String;
use log::{debug, info, warn};

use crate::config::NodeConfig;
use crate::drivers::i2c_bus::DeviceAddress;
use crate::error::{EncodeError, Result};
use crate::sensors::als31300::ADDRESS_RANGE;
use crate::sensors::heading::HeadingFilter;
use crate::sensors::range::{QUIET_STATUS_CODES, RANGE_ADDRESS, RangeFilter, STATUS_OK};
use crate::state::{ChangeMask, ChangeView, StateTracker, ViewChanges};
use crate::telemetry::topic::{Topic, publish_topic};
use crate::telemetry::{CannonEvent, CannonTelemetry, StatePublisher, TelemetryPolicy};

use super::commands::NodeCommand;
use super::events::{NodeEvent, Report, SensorKind, StatusLine};
use super::ports::{EventSink, MessagePublisher, SensorHealth, SensorPort};

/// Range status recorded when the range finder could not be read at all.
pub const RANGE_UNREADABLE: u8 = u8::MAX;

const SENSORS_LEAF: &str = "sensors";
const DIAGNOSTICS_LEAF: &str = "diagnostics";
const SCAN_LEAF: &str = "i2c";

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService {
    unit_id: u8,
    unit_base: String<64>,
    status_interval_ms: u32,

    tracker: StateTracker,
    view: ChangeView,
    heading_filter: HeadingFilter,
    range_filter: RangeFilter,
    policy: TelemetryPolicy,
    state_pub: StatePublisher,
    cannon: CannonTelemetry,

    /// Sensors that came up at the last init.
    health: SensorHealth,
    /// Result of the last angle read.
    angle_ok: bool,
    /// Status of the last range read.
    range_status: u8,
    last_button: bool,
    last_status_ms: u32,
    tick_count: u64,
    /// A full snapshot goes out instead of the next delta.
    snapshot_due: bool,
    was_connected: bool,
}

impl NodeService {
    /// Construct the service from a validated configuration.
    pub fn new(cfg: &NodeConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            unit_id: cfg.unit_id,
            unit_base: cfg.unit_base(),
            status_interval_ms: cfg.status_interval_ms,
            tracker: StateTracker::from_config(cfg),
            view: ChangeView::new(),
            heading_filter: HeadingFilter::new(cfg.heading_filter_alpha, cfg.max_heading_jump_deg),
            range_filter: RangeFilter::new(cfg.range_filter_alpha),
            policy: TelemetryPolicy::from_config(cfg),
            state_pub: StatePublisher::new(cfg)?,
            cannon: CannonTelemetry::new(&cfg.base_topic),
            health: SensorHealth::default(),
            angle_ok: false,
            range_status: STATUS_OK,
            last_button: false,
            last_status_ms: 0,
            tick_count: 0,
            snapshot_due: true,
            was_connected: false,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Boot sequence: recover the bus, scan it, bring the sensors up and
    /// announce status.  Sensors that fail stay marked unavailable and the
    /// node carries on without them.
    ///
    /// The retained snapshot waits for the first tick, when there are
    /// readings to put in it.
    pub fn startup(
        &mut self,
        hw: &mut impl SensorPort,
        client: &mut impl MessagePublisher,
        sink: &mut impl EventSink,
        now_ms: u32,
    ) {
        let freed = hw.recover_bus();
        sink.emit(&NodeEvent::BusRecovered { freed });

        self.report_scan(hw, client, sink);

        self.health = hw.init_sensors();
        self.angle_ok = self.health.angle;
        self.range_status = STATUS_OK;

        self.publish_status(hw, client, sink);

        self.snapshot_due = true;
        self.was_connected = client.connected();
        self.last_status_ms = now_ms;
        sink.emit(&NodeEvent::Started(self.health));
        info!("NodeService started for {}", self.unit_base);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one sampling cycle and return the tracker's change mask.
    pub fn tick(
        &mut self,
        hw: &mut impl SensorPort,
        client: &mut impl MessagePublisher,
        sink: &mut impl EventSink,
        now_ms: u32,
    ) -> ChangeMask {
        self.tick_count += 1;

        // 1. Button
        let pressed = hw.poll_button(now_ms);

        // 2. Range
        let range_valid = self.sample_range(hw, sink);

        // 3. Angle
        self.sample_angle(hw, sink);

        // 4. Aggregate
        let mask = self.tracker.update(
            now_ms,
            self.heading_filter.value(),
            pressed,
            self.range_filter.value_mm(),
            range_valid,
        );
        let changes = self.view.update(&self.tracker);

        // 5. Heading
        if changes.contains(ViewChanges::HEADING) {
            let deg = self.view.quantized_heading();
            if self.policy.heading_due(deg) {
                let ok = self.log_publish(
                    "heading",
                    self.cannon.publish_heading(client, self.unit_id, self.view.heading_deg()),
                );
                sink.emit(&NodeEvent::HeadingPublished { deg, ok });
            }
        }

        // 6. Range moves are logged, not published.
        let mm = self.range_filter.value_mm();
        if range_valid && self.policy.range_due(mm) {
            sink.emit(&NodeEvent::RangeMoved { mm });
        }

        // 7. Button level
        if pressed != self.last_button {
            self.last_button = pressed;
            sink.emit(&NodeEvent::Button { pressed });
        }

        // 8. Edges
        for (flag, event) in [
            (ViewChanges::LOADED, CannonEvent::Loaded),
            (ViewChanges::FIRED, CannonEvent::Fired),
        ] {
            if changes.contains(flag) {
                let ok = self.log_publish(
                    event.leaf(),
                    self.cannon.publish_event(client, self.unit_id, event),
                );
                sink.emit(&NodeEvent::Cannon { event, ok });
            }
        }

        // 9. State record: the full snapshot when due, otherwise the delta.
        let connected = client.connected();
        if connected && !self.was_connected {
            self.snapshot_due = true;
        }
        self.was_connected = connected;
        if connected {
            if self.snapshot_due {
                self.publish_snapshot(client, sink);
            } else if let Err(e) = self.state_pub.publish_deltas(&self.tracker, client) {
                debug!("delta publish failed: {}", e);
            }
        }

        // 10. Periodic status line
        if now_ms.wrapping_sub(self.last_status_ms) >= self.status_interval_ms {
            self.last_status_ms = now_ms;
            sink.emit(&NodeEvent::Status(self.status_line(&*client)));
        }

        mask
    }

    // ── Command handling ──────────────────────────────────────

    /// Map an inbound message and act on it.  Returns the command if the
    /// message was one.
    pub fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        hw: &mut impl SensorPort,
        client: &mut impl MessagePublisher,
        sink: &mut impl EventSink,
    ) -> Option<NodeCommand> {
        let cmd = NodeCommand::parse(topic, payload, &self.unit_base)?;
        self.handle_command(cmd, hw, client, sink);
        Some(cmd)
    }

    pub fn handle_command(
        &mut self,
        cmd: NodeCommand,
        hw: &mut impl SensorPort,
        client: &mut impl MessagePublisher,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            NodeCommand::ResetSensors => {
                info!("sensor reset requested for Cannon{}", self.unit_id);
                let health = hw.init_sensors();
                self.health = health;
                self.angle_ok = health.angle;
                self.range_status = STATUS_OK;
                self.heading_filter.reset();
                self.range_filter.reset();
                self.view.reset();
                self.snapshot_due = true;

                if client.connected() {
                    let result = self.publish_reset_results(health, client);
                    self.finish_report(Report::SensorReset, result, sink);
                }
                sink.emit(&NodeEvent::SensorsReset(health));
                self.publish_status(hw, client, sink);
            }
            NodeCommand::StatusRequest => {
                info!("status requested for Cannon{}", self.unit_id);
                self.publish_status(hw, client, sink);
                if self.tick_count > 0 && client.connected() {
                    self.publish_snapshot(client, sink);
                }
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    pub fn view(&self) -> &ChangeView {
        &self.view
    }

    pub fn policy(&self) -> &TelemetryPolicy {
        &self.policy
    }

    pub fn health(&self) -> SensorHealth {
        self.health
    }

    pub fn unit_base(&self) -> &str {
        &self.unit_base
    }

    /// Sampling cycles executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Topics to subscribe to for inbound commands.
    pub fn command_topics(&self) -> Result<[Topic; 2]> {
        let [a, b] = NodeCommand::SUBSCRIPTIONS;
        Ok([self.unit_topic(a)?, self.unit_topic(b)?])
    }

    // ── Internal ──────────────────────────────────────────────

    fn unit_topic(&self, leaf: &str) -> core::result::Result<Topic, EncodeError> {
        publish_topic(&[self.unit_base.as_str(), leaf])
    }

    fn sample_range(&mut self, hw: &mut impl SensorPort, sink: &mut impl EventSink) -> bool {
        if !self.health.range {
            return false;
        }
        let status = match hw.read_range() {
            Ok(sample) => {
                self.range_filter.push(sample);
                sample.status
            }
            Err(e) => {
                debug!("range read failed: {}", e);
                RANGE_UNREADABLE
            }
        };
        if status != self.range_status {
            self.range_status = status;
            if !QUIET_STATUS_CODES.contains(&status) {
                sink.emit(&NodeEvent::SensorStatus {
                    sensor: SensorKind::Range,
                    ok: status == STATUS_OK,
                    code: status,
                });
            }
        }
        status == STATUS_OK
    }

    fn sample_angle(&mut self, hw: &mut impl SensorPort, sink: &mut impl EventSink) {
        if !self.health.angle {
            return;
        }
        let ok = match hw.read_angle() {
            Ok(deg) => {
                if !self.heading_filter.push(deg) {
                    debug!("heading jump rejected: {:.1}", deg);
                }
                true
            }
            Err(e) => {
                debug!("angle read failed: {}", e);
                false
            }
        };
        if ok != self.angle_ok {
            self.angle_ok = ok;
            sink.emit(&NodeEvent::SensorStatus {
                sensor: SensorKind::Angle,
                ok,
                code: 0,
            });
        }
    }

    fn log_publish(&self, what: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("{} publish for Cannon{} dropped: {}", what, self.unit_id, e);
                false
            }
        }
    }

    /// Publish one report message under the unit topic.  Refusals are
    /// logged and reported as `false`.
    fn send(
        &self,
        client: &mut impl MessagePublisher,
        leaf: &str,
        payload: &str,
        retain: bool,
    ) -> Result<bool> {
        let topic = self.unit_topic(leaf)?;
        let ok = client.publish(&topic, payload, retain, 0);
        if !ok {
            warn!("publish to {} refused", topic);
        }
        Ok(ok)
    }

    fn finish_report(&self, report: Report, result: Result<bool>, sink: &mut impl EventSink) {
        let ok = match result {
            Ok(ok) => ok,
            Err(e) => {
                warn!("{} report for Cannon{} failed: {}", report.name(), self.unit_id, e);
                false
            }
        };
        sink.emit(&NodeEvent::Reported { report, ok });
    }

    fn publish_snapshot(&mut self, client: &mut impl MessagePublisher, sink: &mut impl EventSink) {
        let ok = self.log_publish(
            Report::Snapshot.name(),
            self.state_pub.publish_snapshot(&self.tracker, client),
        );
        if ok {
            self.snapshot_due = false;
        }
        sink.emit(&NodeEvent::Reported {
            report: Report::Snapshot,
            ok,
        });
    }

    fn status_line(&self, client: &impl MessagePublisher) -> StatusLine {
        StatusLine {
            health: SensorHealth {
                angle: self.health.angle && self.angle_ok,
                range: self.health.range && self.range_status == STATUS_OK,
            },
            connected: client.connected(),
            heading_deg: self.heading_filter.value(),
            range_mm: self.range_filter.value_mm(),
        }
    }

    fn report_scan(
        &self,
        hw: &mut impl SensorPort,
        client: &mut impl MessagePublisher,
        sink: &mut impl EventSink,
    ) {
        let found = hw.scan_bus();
        let angle_found = found.iter().any(|a| ADDRESS_RANGE.contains(&a.raw()));
        sink.emit(&NodeEvent::BusScanned {
            devices: found.len(),
            angle_found,
        });
        if !client.connected() {
            return;
        }
        let result = self.publish_scan(&found, angle_found, client);
        self.finish_report(Report::Scan, result, sink);
    }

    fn publish_scan(
        &self,
        found: &[DeviceAddress],
        angle_found: bool,
        client: &mut impl MessagePublisher,
    ) -> Result<bool> {
        let mut ok = true;
        let mut msg: String<96> = String::new();
        for addr in found {
            msg.clear();
            write!(msg, "I2C device found at address {addr}").map_err(EncodeError::from)?;
            if *addr == RANGE_ADDRESS {
                msg.push_str(" (VL6180X)").map_err(|_| EncodeError::Overflow)?;
            } else if ADDRESS_RANGE.contains(&addr.raw()) {
                msg.push_str(" (ALS31300)").map_err(|_| EncodeError::Overflow)?;
            }
            ok &= self.send(client, SCAN_LEAF, &msg, false)?;
        }
        msg.clear();
        if found.is_empty() {
            write!(msg, "No I2C devices found! Check wiring.").map_err(EncodeError::from)?;
        } else {
            write!(
                msg,
                "Found {} I2C device(s){}",
                found.len(),
                if angle_found { " - ALS31300 detected" } else { "" }
            )
            .map_err(EncodeError::from)?;
        }
        ok &= self.send(client, SCAN_LEAF, &msg, false)?;
        Ok(ok)
    }

    fn publish_reset_results(
        &self,
        health: SensorHealth,
        client: &mut impl MessagePublisher,
    ) -> Result<bool> {
        let range = if health.range { "VL6180X reset OK" } else { "VL6180X reset failed" };
        let angle = if health.angle { "ALS31300 reset OK" } else { "ALS31300 reset failed" };
        let mut ok = self.send(client, SENSORS_LEAF, range, false)?;
        ok &= self.send(client, SENSORS_LEAF, angle, false)?;
        ok &= self.send(client, super::commands::RESET_LEAF, "complete", false)?;
        Ok(ok)
    }

    /// Log the status line and publish it retained with its detail
    /// record.  Publishing is skipped while the client is disconnected.
    fn publish_status(
        &self,
        hw: &mut impl SensorPort,
        client: &mut impl MessagePublisher,
        sink: &mut impl EventSink,
    ) {
        let connected = client.connected();
        let (status, detail) = match self.status_report(hw, connected) {
            Ok(report) => report,
            Err(e) => {
                warn!("status report for Cannon{} failed: {}", self.unit_id, e);
                return;
            }
        };
        info!("{}", status);
        if !connected {
            info!("status not published: client disconnected");
            return;
        }
        let result = self
            .send(client, super::commands::STATUS_LEAF, &status, true)
            .and_then(|status_ok| {
                let detail_ok = self.send(client, DIAGNOSTICS_LEAF, &detail, true)?;
                Ok(status_ok && detail_ok)
            });
        self.finish_report(Report::Status, result, sink);
    }

    fn status_report(
        &self,
        hw: &mut impl SensorPort,
        connected: bool,
    ) -> Result<(String<160>, String<256>)> {
        let health = self.health;

        let mut status: String<160> = String::new();
        let mut detail: String<256> = String::new();
        let mark = |ok: bool| if ok { "\u{2713}" } else { "\u{2717}" };

        write!(
            status,
            "Cannon{} online - MQTT {} Distance {} Angle {} - {}",
            self.unit_id,
            mark(connected),
            mark(health.range),
            mark(health.angle),
            if connected && health.all_ok() { "Ready to fire!" } else { "Issues detected" },
        )
        .map_err(EncodeError::from)?;

        write!(
            detail,
            "MQTT: {} | ",
            if connected { "Connected and subscribed" } else { "Disconnected" }
        )
        .map_err(EncodeError::from)?;
        if health.range {
            write!(detail, "VL6180X: Online at {RANGE_ADDRESS} | ").map_err(EncodeError::from)?;
        } else if hw.range_responds() {
            write!(detail, "VL6180X: I2C OK but init failed | ").map_err(EncodeError::from)?;
        } else {
            write!(detail, "VL6180X: Not responding on I2C - Check wiring | ")
                .map_err(EncodeError::from)?;
        }
        match (health.angle, hw.angle_address()) {
            (true, Some(addr)) => write!(detail, "ALS31300: Online at {addr} | "),
            (false, Some(_)) => write!(detail, "ALS31300: Detected but not responding | "),
            (_, None) => write!(detail, "ALS31300: No device detected | "),
        }
        .map_err(EncodeError::from)?;
        Ok((status, detail))
    }
}
