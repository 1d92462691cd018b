//! Bounded MQTT topic building and validation.
//!
//! Publish topics must not contain `+` or `#`.  In subscribe filters `+`
//! must fill a whole level and `#` must be the final level.

use heapless::String;

use crate::error::EncodeError;

pub const SEPARATOR: char = '/';

/// Capacity of every topic the node builds.
pub const TOPIC_CAP: usize = 128;

pub type Topic = String<TOPIC_CAP>;

/// Append one level.  An empty `out` takes the segment without a leading
/// separator.
pub fn append<const N: usize>(out: &mut String<N>, segment: &str) -> Result<(), EncodeError> {
    if !out.is_empty() {
        out.push(SEPARATOR).map_err(|_| EncodeError::Overflow)?;
    }
    out.push_str(segment).map_err(|_| EncodeError::Overflow)
}

/// Join levels into a fresh topic.
pub fn join(segments: &[&str]) -> Result<Topic, EncodeError> {
    let mut out = Topic::new();
    for seg in segments {
        append(&mut out, seg)?;
    }
    Ok(out)
}

/// Join levels and check the result is publishable.
pub fn publish_topic(segments: &[&str]) -> Result<Topic, EncodeError> {
    let t = join(segments)?;
    if validate_publish_topic(&t) {
        Ok(t)
    } else {
        Err(EncodeError::InvalidTopic)
    }
}

pub fn validate_publish_topic(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(['+', '#'])
}

pub fn validate_subscribe_filter(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }
    let mut levels = filter.split(SEPARATOR).peekable();
    while let Some(level) = levels.next() {
        let last = levels.peek().is_none();
        match level {
            "#" if last => return true,
            "+" => {}
            l if l.contains(['+', '#']) => return false,
            _ => {}
        }
    }
    true
}
