//! Two-rate three-color marker (trTCM) primitives.
//!
//! This crate is the metering arithmetic consumed by `flowmark-lib`: token
//! bucket profiles derived from `{CIR, PIR, CBS, PBS}`, the per-flow bucket
//! state with its fixed 32-byte little-endian image, and the color-aware
//! check that classifies each packet as Green, Yellow or Red.
//!
//! The marker is packet-length driven; byte accounting is the caller's
//! concern. Timestamps are plain `u64` ticks so callers choose their own
//! clock; [`MeterClock`] provides a monotonic nanosecond one.
#![forbid(unsafe_code)]

pub mod clock;
pub mod error;
pub mod trtcm;

pub use clock::MeterClock;
pub use error::MeterError;
pub use trtcm::{Color, TrtcmParams, TrtcmProfile, TrtcmState};
