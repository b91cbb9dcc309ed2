//! Two-rate three-color marker per RFC 2698, color-aware mode.
//!
//! A profile folds the configured rates into token-bucket `(period,
//! bytes_per_period)` pairs once, so the per-packet check is two divisions,
//! two clamps and a comparison chain. State is four `u64` words with a fixed
//! little-endian memory image so callers can embed it in packed table-entry
//! data.

use serde::Deserialize;

use crate::error::MeterError;

/// Packet color produced by a three-color marker.
///
/// Encoded as 0/1/2 in the low two bits of packed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Green = 0,
    Yellow = 1,
    Red = 2,
}

impl Color {
    /// Decode the two-bit wire encoding. The value 3 is unused.
    pub fn from_bits(v: u64) -> Option<Self> {
        match v & 3 {
            0 => Some(Color::Green),
            1 => Some(Color::Yellow),
            2 => Some(Color::Red),
            _ => None,
        }
    }
}

/// trTCM configuration. Rates are bytes per second, burst sizes are bytes.
///
/// A zero rate configures a bucket that never refills: with `cir = pir = 0`
/// and zero bursts the marker is permanently Red.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TrtcmParams {
    /// Committed information rate.
    pub cir: u64,
    /// Peak information rate. Must be >= `cir`.
    pub pir: u64,
    /// Committed burst size.
    pub cbs: u64,
    /// Peak burst size.
    pub pbs: u64,
}

/// Below this many ticks per byte, token grants are batched so each bucket
/// update credits more than one byte.
const TB_PERIOD_MIN: u64 = 100;

/// Derive the token-bucket update pair for one rate.
///
/// Rate zero yields a bucket that never refills (the period saturates so the
/// elapsed-periods division always returns zero).
fn tb_params(rate: u64, hz: u64) -> (u64, u64) {
    if rate == 0 {
        return (u64::MAX, 0);
    }

    let period = hz / rate;
    if period >= TB_PERIOD_MIN {
        return (period, 1);
    }

    let bytes = (u128::from(rate) * u128::from(TB_PERIOD_MIN)).div_ceil(u128::from(hz)) as u64;
    let period = (u128::from(hz) * u128::from(bytes) / u128::from(rate)) as u64;
    (period, bytes)
}

/// Immutable trTCM profile: rates pre-folded into bucket update terms.
///
/// The default profile never grants a token and holds zero burst, so any
/// packet metered against it comes out Red. Stale references to a torn-down
/// profile therefore degrade to always-Red instead of reading garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrtcmProfile {
    cbs: u64,
    pbs: u64,
    cir_period: u64,
    cir_bytes_per_period: u64,
    pir_period: u64,
    pir_bytes_per_period: u64,
}

impl Default for TrtcmProfile {
    fn default() -> Self {
        Self {
            cbs: 0,
            pbs: 0,
            cir_period: u64::MAX,
            cir_bytes_per_period: 0,
            pir_period: u64::MAX,
            pir_bytes_per_period: 0,
        }
    }
}

impl TrtcmProfile {
    /// Build a profile for a timer running at `hz` ticks per second.
    pub fn new(params: &TrtcmParams, hz: u64) -> Result<Self, MeterError> {
        if hz == 0 {
            return Err(MeterError::ZeroFrequency);
        }
        if params.pir < params.cir {
            return Err(MeterError::PeakBelowCommitted);
        }

        let (cir_period, cir_bytes_per_period) = tb_params(params.cir, hz);
        let (pir_period, pir_bytes_per_period) = tb_params(params.pir, hz);

        Ok(Self {
            cbs: params.cbs,
            pbs: params.pbs,
            cir_period,
            cir_bytes_per_period,
            pir_period,
            pir_bytes_per_period,
        })
    }

    pub(crate) fn cbs(&self) -> u64 {
        self.cbs
    }

    pub(crate) fn pbs(&self) -> u64 {
        self.pbs
    }

    /// Meter one packet of `pkt_len` bytes arriving at `time`.
    ///
    /// Color-aware: the input color is a floor, the marker only downgrades.
    /// Buckets are refilled lazily by whole elapsed periods, clamped to the
    /// burst size, then drained according to the resolved color: Red drains
    /// nothing, Yellow drains the peak bucket, Green drains both.
    pub fn color_aware_check(
        &self,
        state: &mut TrtcmState,
        time: u64,
        pkt_len: u32,
        color_in: Color,
    ) -> Color {
        let len = u64::from(pkt_len);

        let n_periods_c = time.saturating_sub(state.time_c) / self.cir_period;
        let n_periods_p = time.saturating_sub(state.time_p) / self.pir_period;
        state.time_c += n_periods_c * self.cir_period;
        state.time_p += n_periods_p * self.pir_period;

        let mut tc = state
            .tc
            .saturating_add(n_periods_c.saturating_mul(self.cir_bytes_per_period))
            .min(self.cbs);
        let mut tp = state
            .tp
            .saturating_add(n_periods_p.saturating_mul(self.pir_bytes_per_period))
            .min(self.pbs);

        let color = if color_in == Color::Red || tp < len {
            Color::Red
        } else if color_in == Color::Yellow || tc < len {
            tp -= len;
            Color::Yellow
        } else {
            tp -= len;
            tc -= len;
            Color::Green
        };

        state.tc = tc;
        state.tp = tp;
        color
    }
}

/// Runtime bucket state of one trTCM instance.
///
/// Memory image (little-endian, [`TrtcmState::SIZE`] bytes):
///
/// ```text
/// offset  0: time_c  u64  (tick of last committed-bucket update)
/// offset  8: time_p  u64  (tick of last peak-bucket update)
/// offset 16: tc      u64  (bytes available in the committed bucket)
/// offset 24: tp      u64  (bytes available in the peak bucket)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrtcmState {
    pub time_c: u64,
    pub time_p: u64,
    pub tc: u64,
    pub tp: u64,
}

fn u64_at(bytes: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[off..off + 8]);
    u64::from_le_bytes(b)
}

impl TrtcmState {
    pub const SIZE: usize = 32;

    /// Fresh state: buckets full, both timestamps at `time`.
    pub fn new(profile: &TrtcmProfile, time: u64) -> Self {
        Self { time_c: time, time_p: time, tc: profile.cbs(), tp: profile.pbs() }
    }

    /// Decode from the first [`TrtcmState::SIZE`] bytes of `bytes`.
    pub fn read_le(bytes: &[u8]) -> Self {
        Self {
            time_c: u64_at(bytes, 0),
            time_p: u64_at(bytes, 8),
            tc: u64_at(bytes, 16),
            tp: u64_at(bytes, 24),
        }
    }

    /// Encode into the first [`TrtcmState::SIZE`] bytes of `bytes`.
    pub fn write_le(&self, bytes: &mut [u8]) {
        bytes[0..8].copy_from_slice(&self.time_c.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.time_p.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.tc.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.tp.to_le_bytes());
    }
}
