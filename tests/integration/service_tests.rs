//! Integration tests for the SensorPort → NodeService → MessagePublisher
//! pipeline.
//!
//! These run on the host and drive the service tick by tick against
//! scripted readings, asserting on the exact topics and payloads the node
//! hands to the transport.

use crate::mock_hw::{CaptureSink, MockHardware, MockPublisher};

use cannon_node::app::commands::NodeCommand;
use cannon_node::app::events::{NodeEvent, Report, SensorKind};
use cannon_node::app::ports::SensorHealth;
use cannon_node::app::service::NodeService;
use cannon_node::config::NodeConfig;
use cannon_node::error::SensorError;
use cannon_node::sensors::range::RangeSample;
use cannon_node::state::ChangeMask;
use cannon_node::state::encode::SnapshotRecord;
use cannon_node::telemetry::CannonEvent;

const UNIT: &str = "MermaidsTale/Cannon2";

fn topic(leaf: &str) -> String {
    format!("{UNIT}/{leaf}")
}

fn started(
    hw: &mut MockHardware,
    client: &mut MockPublisher,
) -> (NodeService, CaptureSink) {
    let mut svc = NodeService::new(&NodeConfig::default()).unwrap();
    let mut sink = CaptureSink::new();
    svc.startup(hw, client, &mut sink, 0);
    (svc, sink)
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn startup_recovers_scans_and_announces_status() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (svc, sink) = started(&mut hw, &mut client);

    assert_eq!(hw.recover_calls, 1);
    assert_eq!(hw.init_calls, 1);
    assert!(svc.health().all_ok());

    assert_eq!(
        client.on(&topic("i2c")),
        vec![
            "I2C device found at address 0x29 (VL6180X)",
            "I2C device found at address 0x65 (ALS31300)",
            "Found 2 I2C device(s) - ALS31300 detected",
        ]
    );

    let status = client.last_on(&topic("status")).unwrap();
    assert_eq!(
        status.payload,
        "Cannon2 online - MQTT \u{2713} Distance \u{2713} Angle \u{2713} - Ready to fire!"
    );
    assert!(status.retain);

    let diag = client.last_on(&topic("diagnostics")).unwrap();
    assert!(diag.payload.contains("VL6180X: Online at 0x29"));
    assert!(diag.payload.contains("ALS31300: Online at 0x65"));

    // No readings yet, so no snapshot.
    assert!(client.on(&topic("state")).is_empty());
    for report in [Report::Scan, Report::Status] {
        assert!(sink.events.contains(&NodeEvent::Reported { report, ok: true }));
    }

    assert!(matches!(sink.events.first(), Some(NodeEvent::BusRecovered { freed: true })));
    assert_eq!(
        sink.events.last(),
        Some(&NodeEvent::Started(SensorHealth {
            angle: true,
            range: true
        }))
    );
}

#[test]
fn empty_bus_starts_degraded_and_keeps_looping() {
    let mut hw = MockHardware::empty();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);

    assert_eq!(client.on(&topic("i2c")), vec!["No I2C devices found! Check wiring."]);
    let status = client.last_on(&topic("status")).unwrap();
    assert!(status.payload.ends_with("Issues detected"));
    let diag = client.last_on(&topic("diagnostics")).unwrap();
    assert!(diag.payload.contains("VL6180X: Not responding on I2C - Check wiring"));
    assert!(diag.payload.contains("ALS31300: No device detected"));

    sink.clear();
    for t in 1..=10 {
        svc.tick(&mut hw, &mut client, &mut sink, t * 50);
    }
    assert_eq!(svc.tick_count(), 10);
    assert_eq!(hw.angle_reads, 0, "unavailable sensors are not polled");
    assert_eq!(hw.range_reads, 0);
}

#[test]
fn offline_startup_publishes_nothing() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::offline();
    let (svc, sink) = started(&mut hw, &mut client);
    assert!(client.sent.is_empty());
    assert!(svc.health().all_ok());
    assert!(matches!(sink.events.last(), Some(NodeEvent::Started(_))));
}

// ── Heading ───────────────────────────────────────────────────

#[test]
fn heading_published_once_per_whole_degree() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    let hor = topic("Hor");

    hw.angle = Ok(10.0);
    svc.tick(&mut hw, &mut client, &mut sink, 50);
    svc.tick(&mut hw, &mut client, &mut sink, 100);
    assert_eq!(client.on(&hor), vec!["pre_10"]);

    // Filtered 10.0 -> 10.6 rounds to 11.
    hw.angle = Ok(12.0);
    svc.tick(&mut hw, &mut client, &mut sink, 150);
    assert_eq!(client.on(&hor), vec!["pre_10", "pre_11"]);

    // 10.6 -> 11.02 still rounds to 11.
    svc.tick(&mut hw, &mut client, &mut sink, 200);
    assert_eq!(client.on(&hor).len(), 2);
    assert_eq!(svc.policy().last_heading(), Some(11));

    assert_eq!(
        sink.count(|e| matches!(e, NodeEvent::HeadingPublished { ok: true, .. })),
        2
    );
}

#[test]
fn refused_heading_publish_is_not_retried() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);

    client.connected = false;
    hw.angle = Ok(42.0);
    svc.tick(&mut hw, &mut client, &mut sink, 50);
    assert!(sink.events.contains(&NodeEvent::HeadingPublished { deg: 42, ok: false }));

    client.connected = true;
    client.clear();
    svc.tick(&mut hw, &mut client, &mut sink, 100);
    assert!(client.on(&topic("Hor")).is_empty());
}

#[test]
fn heading_jump_is_rejected_by_loop_filter() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);

    hw.angle = Ok(90.0);
    svc.tick(&mut hw, &mut client, &mut sink, 50);
    hw.angle = Ok(180.0);
    svc.tick(&mut hw, &mut client, &mut sink, 100);
    assert_eq!(client.on(&topic("Hor")), vec!["pre_90"]);
    assert!((svc.tracker().current().heading_deg - 90.0).abs() < 1e-3);
}

// ── Loaded / Fired ────────────────────────────────────────────

#[test]
fn loaded_published_once_per_presence_edge() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    let loaded = topic("Loaded");

    svc.tick(&mut hw, &mut client, &mut sink, 50);
    assert!(client.on(&loaded).is_empty());

    hw.range = Ok(RangeSample::ok(80));
    for t in 2..6 {
        svc.tick(&mut hw, &mut client, &mut sink, t * 50);
    }
    assert_eq!(client.on(&loaded), vec!["triggered"]);
    assert!(svc.tracker().current().target_present);
    assert_eq!(
        sink.count(|e| matches!(e, NodeEvent::Cannon { event: CannonEvent::Loaded, ok: true })),
        1
    );
}

#[test]
fn fired_published_on_each_press() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    let fired = topic("Fired");

    let presses = [false, true, true, false, true, false];
    for (i, &level) in presses.iter().enumerate() {
        hw.button = level;
        svc.tick(&mut hw, &mut client, &mut sink, (i as u32 + 1) * 50);
    }
    assert_eq!(client.on(&fired), vec!["triggered", "triggered"]);
    assert_eq!(sink.count(|e| matches!(e, NodeEvent::Button { .. })), 4);
}

// ── Deltas ────────────────────────────────────────────────────

#[test]
fn button_change_produces_delta_record() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    let changes = topic("changes");

    svc.tick(&mut hw, &mut client, &mut sink, 50);
    assert!(client.on(&changes).is_empty());

    hw.button = true;
    let mask = svc.tick(&mut hw, &mut client, &mut sink, 100);
    assert!(mask.contains(ChangeMask::BUTTON));
    assert_eq!(client.on(&changes), vec![r#"{"t":100,"btn":1}"#]);
    assert!(!client.last_on(&changes).unwrap().retain);
}

#[test]
fn quiet_node_sends_heartbeat_deltas() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);

    svc.tick(&mut hw, &mut client, &mut sink, 1000);
    let mask = svc.tick(&mut hw, &mut client, &mut sink, 2000);
    assert_eq!(mask, ChangeMask::HEARTBEAT);
    assert_eq!(client.on(&topic("changes")), vec![r#"{"t":2000}"#]);
}

// ── Retained state ────────────────────────────────────────────

fn last_snapshot(client: &MockPublisher) -> SnapshotRecord {
    let published = client.last_on(&topic("state")).expect("no snapshot published");
    assert!(published.retain);
    SnapshotRecord::parse(&published.payload).unwrap()
}

fn assert_snapshot_matches(svc: &NodeService, record: &SnapshotRecord) {
    let current = svc.tracker().current();
    assert_eq!(record.t, current.ts_ms);
    assert!((record.ang.unwrap() - current.heading_deg).abs() < 0.01);
    assert_eq!(record.btn, Some(u8::from(current.button_pressed)));
    assert_eq!(record.dist, Some(current.range_mm));
    assert_eq!(record.prs, Some(u8::from(current.target_present)));
}

#[test]
fn first_tick_publishes_snapshot_with_real_readings() {
    let mut hw = MockHardware::healthy();
    hw.angle = Ok(90.0);
    hw.range = Ok(RangeSample::ok(50));
    hw.button = true;
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);

    svc.tick(&mut hw, &mut client, &mut sink, 50);
    assert_eq!(client.on(&topic("state")).len(), 1);
    let record = last_snapshot(&client);
    assert_snapshot_matches(&svc, &record);
    assert!((record.ang.unwrap() - 90.0).abs() < 0.01);
    // The snapshot stands in for the first delta.
    assert!(client.on(&topic("changes")).is_empty());

    for t in 2..=200 {
        svc.tick(&mut hw, &mut client, &mut sink, t * 50);
    }
    assert_eq!(client.on(&topic("state")).len(), 1, "snapshot is not repeated");
    assert!(sink.events.contains(&NodeEvent::Reported {
        report: Report::Snapshot,
        ok: true
    }));
}

#[test]
fn status_request_republishes_current_snapshot() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);

    // Before any tick there is nothing worth retaining.
    svc.handle_message(&topic("status"), b"request", &mut hw, &mut client, &mut sink);
    assert!(client.on(&topic("state")).is_empty());

    hw.angle = Ok(90.0);
    hw.range = Ok(RangeSample::ok(50));
    hw.button = true;
    for t in 1..=200 {
        svc.tick(&mut hw, &mut client, &mut sink, t * 50);
    }
    client.clear();

    svc.handle_message(&topic("status"), b"request", &mut hw, &mut client, &mut sink);
    assert_eq!(client.on(&topic("state")).len(), 1);
    let record = last_snapshot(&client);
    assert_snapshot_matches(&svc, &record);
    assert_eq!(record.t, 10_000);
    assert_eq!((record.btn, record.dist, record.prs), (Some(1), Some(50), Some(1)));
}

#[test]
fn reconnect_republishes_snapshot() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    svc.tick(&mut hw, &mut client, &mut sink, 50);

    client.connected = false;
    hw.angle = Ok(5.0);
    svc.tick(&mut hw, &mut client, &mut sink, 100);
    client.connected = true;
    svc.tick(&mut hw, &mut client, &mut sink, 150);

    assert_eq!(client.on(&topic("state")).len(), 2);
    assert_snapshot_matches(&svc, &last_snapshot(&client));
}

#[test]
fn offline_start_defers_snapshot_until_connected() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::offline();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    hw.angle = Ok(33.0);
    svc.tick(&mut hw, &mut client, &mut sink, 50);
    assert!(client.sent.is_empty());

    client.connected = true;
    svc.tick(&mut hw, &mut client, &mut sink, 100);
    let record = last_snapshot(&client);
    assert_snapshot_matches(&svc, &record);
    assert_eq!(record.t, 100);
}

#[test]
fn refused_snapshot_is_sent_on_a_later_tick() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);

    client.refusing = true;
    svc.tick(&mut hw, &mut client, &mut sink, 50);
    assert!(sink.events.contains(&NodeEvent::Reported {
        report: Report::Snapshot,
        ok: false
    }));

    client.refusing = false;
    svc.tick(&mut hw, &mut client, &mut sink, 100);
    assert_eq!(last_snapshot(&client).t, 100);
}

#[test]
fn refused_status_publish_is_reported() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    sink.clear();

    client.refusing = true;
    svc.handle_message(&topic("status"), b"request", &mut hw, &mut client, &mut sink);
    assert!(client.sent.is_empty());
    assert_eq!(
        sink.events,
        vec![NodeEvent::Reported {
            report: Report::Status,
            ok: false
        }]
    );
}

#[test]
fn refused_reset_results_are_reported() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);

    client.refusing = true;
    svc.handle_message(&topic("reset"), b"true", &mut hw, &mut client, &mut sink);
    assert!(sink.events.contains(&NodeEvent::Reported {
        report: Report::SensorReset,
        ok: false
    }));
    assert!(sink.events.contains(&NodeEvent::Reported {
        report: Report::Status,
        ok: false
    }));
}

// ── Sensor status ─────────────────────────────────────────────

#[test]
fn range_status_transitions_are_reported_once() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    sink.clear();

    hw.range = Ok(RangeSample { mm: 0, status: 7 });
    svc.tick(&mut hw, &mut client, &mut sink, 50);
    svc.tick(&mut hw, &mut client, &mut sink, 100);
    hw.range = Ok(RangeSample::ok(300));
    svc.tick(&mut hw, &mut client, &mut sink, 150);

    let range_events: Vec<_> = sink
        .events
        .iter()
        .filter(|e| matches!(e, NodeEvent::SensorStatus { sensor: SensorKind::Range, .. }))
        .collect();
    assert_eq!(
        range_events,
        vec![
            &NodeEvent::SensorStatus {
                sensor: SensorKind::Range,
                ok: false,
                code: 7
            },
            &NodeEvent::SensorStatus {
                sensor: SensorKind::Range,
                ok: true,
                code: 0
            },
        ]
    );
}

#[test]
fn routine_range_codes_stay_quiet() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    sink.clear();

    for (t, status) in [(50, 11), (100, 6), (150, 11)] {
        hw.range = Ok(RangeSample { mm: 255, status });
        svc.tick(&mut hw, &mut client, &mut sink, t);
    }
    assert_eq!(sink.count(|e| matches!(e, NodeEvent::SensorStatus { .. })), 0);
}

#[test]
fn angle_read_failure_and_recovery_are_reported() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    sink.clear();

    hw.angle = Err(SensorError::Bus(cannon_node::error::BusError::Nack));
    svc.tick(&mut hw, &mut client, &mut sink, 50);
    svc.tick(&mut hw, &mut client, &mut sink, 100);
    hw.angle = Ok(5.0);
    svc.tick(&mut hw, &mut client, &mut sink, 150);

    let angle_ok: Vec<bool> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            NodeEvent::SensorStatus {
                sensor: SensorKind::Angle,
                ok,
                ..
            } => Some(*ok),
            _ => None,
        })
        .collect();
    assert_eq!(angle_ok, vec![false, true]);
}

#[test]
fn status_line_every_interval() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);

    let mut t = 0;
    while t < 10_000 {
        t += 50;
        svc.tick(&mut hw, &mut client, &mut sink, t);
    }
    assert_eq!(sink.count(|e| matches!(e, NodeEvent::Status(_))), 2);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn reset_command_reinitialises_and_reports() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    client.clear();

    hw.health.angle = false;
    let cmd = svc.handle_message(&topic("reset"), b"true", &mut hw, &mut client, &mut sink);
    assert_eq!(cmd, Some(NodeCommand::ResetSensors));
    assert_eq!(hw.init_calls, 2);

    assert_eq!(
        client.on(&topic("sensors")),
        vec!["VL6180X reset OK", "ALS31300 reset failed"]
    );
    assert_eq!(client.on(&topic("reset")), vec!["complete"]);
    assert!(client.last_on(&topic("status")).unwrap().payload.ends_with("Issues detected"));
    assert!(
        client
            .last_on(&topic("diagnostics"))
            .unwrap()
            .payload
            .contains("ALS31300: Detected but not responding")
    );
    assert!(sink.events.contains(&NodeEvent::SensorsReset(SensorHealth {
        angle: false,
        range: true
    })));
    assert!(!svc.health().angle);
}

#[test]
fn status_request_republishes_status() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    client.clear();

    let cmd = svc.handle_message(&topic("status"), b"request", &mut hw, &mut client, &mut sink);
    assert_eq!(cmd, Some(NodeCommand::StatusRequest));
    assert_eq!(client.on(&topic("status")).len(), 1);
    assert_eq!(client.on(&topic("diagnostics")).len(), 1);
    assert_eq!(hw.init_calls, 1);
}

#[test]
fn own_retained_status_is_not_a_command() {
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let (mut svc, mut sink) = started(&mut hw, &mut client);
    let echo = client.last_on(&topic("status")).unwrap().payload.clone();
    client.clear();

    let cmd = svc.handle_message(&topic("status"), echo.as_bytes(), &mut hw, &mut client, &mut sink);
    assert_eq!(cmd, None);
    assert!(client.sent.is_empty());
}

#[test]
fn command_topics_cover_reset_and_status() {
    let svc = NodeService::new(&NodeConfig::default()).unwrap();
    let [a, b] = svc.command_topics().unwrap();
    assert_eq!(a.as_str(), "MermaidsTale/Cannon2/reset");
    assert_eq!(b.as_str(), "MermaidsTale/Cannon2/status");
}
