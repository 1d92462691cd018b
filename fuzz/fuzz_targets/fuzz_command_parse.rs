//! Fuzz target: `NodeCommand::parse`
//!
//! Splits the input into a topic and a payload and checks that inbound
//! message mapping never panics and only ever accepts the two exact
//! command messages.
//!
//! cargo fuzz run fuzz_command_parse

#![no_main]

use cannon_node::app::commands::NodeCommand;
use libfuzzer_sys::fuzz_target;

const UNIT: &str = "MermaidsTale/Cannon2";

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let cut = (split as usize).min(rest.len());
    let (topic_bytes, payload) = rest.split_at(cut);
    let Ok(topic) = core::str::from_utf8(topic_bytes) else {
        return;
    };

    match NodeCommand::parse(topic, payload, UNIT) {
        Some(NodeCommand::ResetSensors) => {
            assert_eq!(topic, "MermaidsTale/Cannon2/reset");
            assert_eq!(core::str::from_utf8(payload).map(str::trim), Ok("true"));
        }
        Some(NodeCommand::StatusRequest) => {
            assert_eq!(topic, "MermaidsTale/Cannon2/status");
            assert_eq!(core::str::from_utf8(payload).map(str::trim), Ok("request"));
        }
        None => {}
    }
});
