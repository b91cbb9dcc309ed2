//! MTR action: per-entry trTCM state with stats and policer policy
//! multiplexed into three 64-bit color words.

use flowmark_meter::{Color, TrtcmState};

use crate::action::dscp::DscpTable;
use crate::action::meter_profile::{MeterProfileTable, METER_PROFILES_MAX};
use crate::config::types::{MtrConfig, PolicerAction};
use crate::error::{ActionError, Result};
use crate::pipeline::PacketMeta;

/// Maximum traffic classes per entry.
pub const TC_MAX: usize = 4;

/// Per-traffic-class slot size: the 32-byte trTCM bucket image followed by
/// one 64-bit word per color.
///
/// Color word layout (little-endian):
///
/// ```text
/// bits [1:0]   policer recolor target when acting on this color
/// bit  [2]     policer drop flag for this color
/// bits [7:3]   meter-profile slot index (Green word only)
/// bits [63:8]  packet counter for this color (wraps modulo 2^56)
/// ```
pub(crate) const TC_DATA_SIZE: usize = TrtcmState::SIZE + 3 * 8;

const WORDS_OFFSET: usize = TrtcmState::SIZE;
const RECOLOR_MASK: u64 = 0x3;
const DROP_FLAG_MASK: u64 = 0x4;
const PROFILE_INDEX_MASK: u64 = 0xF8;
const STATS_SHIFT: u32 = 8;

/// Scheduler-word color field: bits [5:4].
const SCHED_COLOR_MASK: u64 = 0x30;

/// Merge a policer color into the scheduler word, preserving every other
/// bit.
pub(crate) fn sched_with_color(sched: u64, color: Color) -> u64 {
    (sched & !SCHED_COLOR_MASK) | ((color as u64) << 4)
}

pub(crate) fn len2mask(n: u32) -> u64 {
    (1u64 << n) - 1
}

/// View over one traffic class's slot inside an entry's MTR region.
pub(crate) struct MtrTcSlot<'a> {
    bytes: &'a mut [u8],
}

impl<'a> MtrTcSlot<'a> {
    pub fn new(mtr_data: &'a mut [u8], tc: usize) -> Self {
        let start = tc * TC_DATA_SIZE;
        Self { bytes: &mut mtr_data[start..start + TC_DATA_SIZE] }
    }

    pub fn state(&self) -> TrtcmState {
        TrtcmState::read_le(self.bytes)
    }

    pub fn set_state(&mut self, state: &TrtcmState) {
        state.write_le(self.bytes);
    }

    fn word(&self, color: Color) -> u64 {
        let off = WORDS_OFFSET + color as usize * 8;
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.bytes[off..off + 8]);
        u64::from_le_bytes(b)
    }

    fn set_word(&mut self, color: Color, v: u64) {
        let off = WORDS_OFFSET + color as usize * 8;
        self.bytes[off..off + 8].copy_from_slice(&v.to_le_bytes());
    }

    pub fn reset(&mut self) {
        self.bytes.fill(0);
    }

    /// Meter-profile slot index, bits [7:3] of the Green word.
    pub fn profile_index(&self) -> usize {
        ((self.word(Color::Green) & PROFILE_INDEX_MASK) >> 3) as usize
    }

    pub fn set_profile_index(&mut self, index: usize) {
        let mut w = self.word(Color::Green);
        w &= !PROFILE_INDEX_MASK;
        w |= ((index % METER_PROFILES_MAX) as u64) << 3;
        self.set_word(Color::Green, w);
    }

    /// Encode the policer verdict for `color`: the drop flag, or the
    /// recolor target in the low two bits.
    pub fn set_policer(&mut self, color: Color, action: PolicerAction) {
        let mut w = self.word(color);
        if action == PolicerAction::Drop {
            w |= DROP_FLAG_MASK;
        } else {
            w &= !(DROP_FLAG_MASK | RECOLOR_MASK);
            w |= action as u64 & RECOLOR_MASK;
        }
        self.set_word(color, w);
    }

    pub fn drop_flag(&self, color: Color) -> u64 {
        (self.word(color) & DROP_FLAG_MASK) >> 2
    }

    pub fn recolor(&self, color: Color) -> Color {
        Color::from_bits(self.word(color)).unwrap_or(Color::Red)
    }

    /// Packet counter for `color`.
    pub fn packets(&self, color: Color) -> u64 {
        self.word(color) >> STATS_SHIFT
    }

    pub fn inc_stats(&mut self, color: Color) {
        // A full 56-bit counter wraps to zero; the policer and profile bits
        // below bit 8 are arithmetically unreachable from the carry.
        self.set_word(color, self.word(color).wrapping_add(1 << STATS_SHIFT));
    }

    pub fn clear_stats(&mut self, color: Color) {
        self.set_word(color, self.word(color) & 0xFF);
    }
}

/// Per-TC parameters for an MTR apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct MtrTcParams {
    pub meter_profile_id: u32,
    /// Policer verdict per meter output color, indexed Green/Yellow/Red.
    pub policer: [PolicerAction; 3],
}

/// MTR apply parameters: which TCs to (re)initialize and with what.
#[derive(Debug, Clone, Copy, Default)]
pub struct MtrParams {
    /// Bit i selects TC i.
    pub tc_mask: u32,
    pub mtr: [MtrTcParams; TC_MAX],
}

/// Per-(TC, color) counters reported by `meter_read`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MtrCounterSet {
    /// Packets per color, indexed Green/Yellow/Red.
    pub n_packets: [u64; 3],
    pub n_packets_valid: bool,
    /// Byte counters are not maintained; always zero.
    pub n_bytes: [u64; 3],
    pub n_bytes_valid: bool,
}

/// Counters for up to [`TC_MAX`] traffic classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MtrCounters {
    pub tc_mask: u32,
    pub stats: [MtrCounterSet; TC_MAX],
}

/// Write the selected TC slots of an entry's MTR region.
///
/// Validate-then-write: every referenced meter profile is resolved before
/// the first byte is touched, so a failed apply leaves the entry unchanged.
pub(crate) fn apply(
    mtr_data: &mut [u8],
    params: &MtrParams,
    cfg: &MtrConfig,
    profiles: &MeterProfileTable,
    time: u64,
) -> Result<()> {
    if u64::from(params.tc_mask) > len2mask(cfg.n_tc) {
        return Err(ActionError::Invalid("tc_mask selects traffic classes beyond n_tc"));
    }

    let mut resolved = [0usize; TC_MAX];
    for i in 0..TC_MAX {
        if params.tc_mask & (1 << i) == 0 {
            continue;
        }
        resolved[i] = profiles
            .find(params.mtr[i].meter_profile_id)
            .ok_or(ActionError::Invalid("unknown meter profile id"))?;
    }

    for i in 0..TC_MAX {
        if params.tc_mask & (1 << i) == 0 {
            continue;
        }
        let tc_params = &params.mtr[i];
        let slot_index = resolved[i];
        let profile = &profiles.slot(slot_index).profile;

        let mut slot = MtrTcSlot::new(mtr_data, i);
        slot.reset();
        slot.set_state(&TrtcmState::new(profile, time));
        slot.set_profile_index(slot_index);
        slot.set_policer(Color::Green, tc_params.policer[Color::Green as usize]);
        slot.set_policer(Color::Yellow, tc_params.policer[Color::Yellow as usize]);
        slot.set_policer(Color::Red, tc_params.policer[Color::Red as usize]);
    }

    Ok(())
}

/// Read and/or clear packet counters. Clearing preserves the policer and
/// profile-index bits in the low byte of each word.
pub(crate) fn read(
    mtr_data: &mut [u8],
    tc_mask: u32,
    stats: Option<&mut MtrCounters>,
    clear: bool,
) {
    if let Some(stats) = stats {
        for i in 0..TC_MAX {
            if tc_mask & (1 << i) == 0 {
                continue;
            }
            let slot = MtrTcSlot::new(mtr_data, i);
            stats.stats[i] = MtrCounterSet {
                n_packets: [
                    slot.packets(Color::Green),
                    slot.packets(Color::Yellow),
                    slot.packets(Color::Red),
                ],
                n_packets_valid: true,
                n_bytes: [0; 3],
                n_bytes_valid: false,
            };
        }
        stats.tc_mask = tc_mask;
    }

    if clear {
        for i in 0..TC_MAX {
            if tc_mask & (1 << i) == 0 {
                continue;
            }
            let mut slot = MtrTcSlot::new(mtr_data, i);
            slot.clear_stats(Color::Green);
            slot.clear_stats(Color::Yellow);
            slot.clear_stats(Color::Red);
        }
    }
}

/// Meter one packet against its entry's MTR region. Returns 1 when the
/// policer verdict for the meter output color is drop, else 0.
pub(crate) fn pkt_work_mtr<P: PacketMeta>(
    pkt: &mut P,
    mtr_data: &mut [u8],
    dscp_table: &DscpTable,
    profiles: &MeterProfileTable,
    time: u64,
    dscp: u32,
    total_length: u16,
) -> u64 {
    let entry = dscp_table.entry(dscp);
    let mut slot = MtrTcSlot::new(mtr_data, entry.tc as usize);

    let profile = &profiles.slot(slot.profile_index()).profile;
    let mut state = slot.state();
    let color = profile.color_aware_check(&mut state, time, u32::from(total_length), entry.color);
    slot.set_state(&state);

    slot.inc_stats(color);

    let drop = slot.drop_flag(color);
    let recolor = slot.recolor(color);
    pkt.set_sched(sched_with_color(pkt.sched(), recolor));
    drop
}
