//! End-to-end scenarios for the change-detection layers.

use crate::mock_hw::{CaptureSink, MockHardware, MockPublisher};

use cannon_node::app::events::NodeEvent;
use cannon_node::app::service::NodeService;
use cannon_node::config::NodeConfig;
use cannon_node::drivers::button::Debouncer;
use cannon_node::sensors::range::RangeSample;
use cannon_node::state::{ChangeMask, StateTracker};

// ── A: cumulative heading drift ───────────────────────────────

#[test]
fn slow_drift_reported_once_it_exceeds_epsilon() {
    let mut t = StateTracker::new();
    t.set_angle_epsilon(0.25);
    t.set_heartbeat_ms(0);

    let masks: Vec<bool> = [10.0, 10.1, 10.3]
        .iter()
        .enumerate()
        .map(|(i, &h)| {
            t.update(i as u32 * 50, h, false, 0, false)
                .contains(ChangeMask::HEADING)
        })
        .collect();
    assert_eq!(masks, vec![false, false, true]);
}

#[test]
fn wraparound_measures_the_short_way() {
    let mut t = StateTracker::new();
    t.set_heartbeat_ms(0);
    t.set_angle_epsilon(0.25);
    t.update(0, 359.9, false, 0, false);
    // 0.2 degrees apart, below epsilon.
    assert!(!t.update(50, 0.1, false, 0, false).contains(ChangeMask::HEADING));

    let mut t = StateTracker::new();
    t.set_heartbeat_ms(0);
    t.set_angle_epsilon(0.1);
    t.update(0, 359.9, false, 0, false);
    assert!(t.update(50, 0.1, false, 0, false).contains(ChangeMask::HEADING));
}

// ── B: trigger debounce ───────────────────────────────────────

#[test]
fn bounce_inside_window_then_clean_press() {
    let mut d = Debouncer::new(30);
    d.begin(false, 0);

    let mut edges = 0;
    for (t, raw) in [(100, false), (102, true), (104, false)] {
        edges += u32::from(d.update(raw, t));
    }
    for t in (110..=200).step_by(10) {
        edges += u32::from(d.update(false, t));
    }
    assert_eq!(edges, 0);

    let mut rose = 0;
    for t in (300..=340).step_by(5) {
        if d.update(true, t) && d.rose() {
            rose += 1;
        }
    }
    assert_eq!(rose, 1);
}

// ── C: range reporting threshold ──────────────────────────────

fn range_moves(readings: &[u16]) -> Vec<u16> {
    let cfg = NodeConfig {
        range_filter_alpha: 1.0,
        ..NodeConfig::default()
    };
    let mut svc = NodeService::new(&cfg).unwrap();
    let mut hw = MockHardware::healthy();
    let mut client = MockPublisher::connected();
    let mut sink = CaptureSink::new();
    svc.startup(&mut hw, &mut client, &mut sink, 0);

    for (i, &mm) in readings.iter().enumerate() {
        hw.range = Ok(RangeSample::ok(mm));
        svc.tick(&mut hw, &mut client, &mut sink, (i as u32 + 1) * 50);
    }
    sink.events
        .iter()
        .filter_map(|e| match e {
            NodeEvent::RangeMoved { mm } => Some(*mm),
            _ => None,
        })
        .collect()
}

#[test]
fn range_move_of_three_is_reported() {
    assert_eq!(range_moves(&[50, 53]), vec![50, 53]);
}

#[test]
fn range_move_of_one_is_suppressed() {
    assert_eq!(range_moves(&[50, 51]), vec![50]);
}
