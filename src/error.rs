//! Unified error types for the cannon node firmware.
//!
//! Every subsystem has its own small `Copy` error enum; all of them convert
//! into the top-level [`Error`] so the sampling loop can log any failure
//! uniformly and carry on.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A bus transaction or bus recovery failed.
    Bus(BusError),
    /// A sensor could not be read or configured.
    Sensor(SensorError),
    /// A payload or topic did not fit its buffer.
    Encode(EncodeError),
    /// Configuration is invalid.
    Config(ConfigError),
    /// The message client refused a publish.
    Publish,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Encode(e) => write!(f, "encode: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Publish => write!(f, "publish refused"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

/// Transient two-wire bus failures.  Callers own the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Address or data byte was not acknowledged.
    Nack,
    /// Another controller won arbitration.
    ArbitrationLoss,
    /// Misplaced START/STOP or similar line-level fault.
    Bus,
    /// Receive data was not consumed in time.
    Overrun,
    /// The transaction did not complete within the bus timeout.
    Timeout,
    /// The controller could not be (re)attached.
    NotInitialised,
    /// Controller-specific failure.
    Other,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nack => write!(f, "no acknowledge"),
            Self::ArbitrationLoss => write!(f, "arbitration lost"),
            Self::Bus => write!(f, "bus error"),
            Self::Overrun => write!(f, "overrun"),
            Self::Timeout => write!(f, "timeout"),
            Self::NotInitialised => write!(f, "controller not attached"),
            Self::Other => write!(f, "controller error"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Underlying bus transaction failed; last good value still applies.
    Bus(BusError),
    /// Sensor did not answer at its address.
    NotDetected,
    /// Range finder reported a non-zero status code.
    RangeStatus(u8),
    /// Address programming failed; the device must be re-detected.
    ConfigurationFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::NotDetected => write!(f, "not detected"),
            Self::RangeStatus(code) => write!(f, "range status {code}"),
            Self::ConfigurationFailed => write!(f, "configuration failed"),
        }
    }
}

impl From<BusError> for SensorError {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Encoding errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// Output would exceed the caller's buffer.  Bytes written so far must
    /// not be used.
    Overflow,
    /// Topic contains wildcards or empty levels.
    InvalidTopic,
    /// Inbound record could not be parsed.
    Malformed,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => write!(f, "buffer overflow"),
            Self::InvalidTopic => write!(f, "invalid topic"),
            Self::Malformed => write!(f, "malformed record"),
        }
    }
}

impl From<core::fmt::Error> for EncodeError {
    fn from(_: core::fmt::Error) -> Self {
        Self::Overflow
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        Self::Encode(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation; the message names the field.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "invalid: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
