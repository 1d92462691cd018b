//! Fuzz target: `SnapshotRecord::parse`
//!
//! Arbitrary text must either be rejected as malformed or parse into a
//! record whose fields re-encode into a bounded delta.
//!
//! cargo fuzz run fuzz_record_parse

#![no_main]

use cannon_node::state::encode::{RECORD_CAP, SnapshotRecord, write_delta};
use cannon_node::state::Snapshot;
use heapless::String;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(rec) = SnapshotRecord::parse(text) else {
        return;
    };

    let snap = Snapshot {
        ts_ms: rec.t,
        heading_deg: rec.ang.unwrap_or(0.0),
        button_pressed: rec.btn.unwrap_or(0) != 0,
        range_mm: rec.dist.unwrap_or(0),
        target_present: rec.prs.unwrap_or(0) != 0,
    };
    let mut out: String<RECORD_CAP> = String::new();
    // Non-finite or huge headings may not fit; that must surface as an
    // error, never a panic.
    if write_delta(&snap, rec.fields(), &mut out).is_ok() {
        assert!(out.starts_with("{\"t\":"));
        assert!(out.ends_with('}'));
    }
});
