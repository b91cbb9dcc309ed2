//! DSCP classification table: 64 rows mapping a codepoint to its traffic
//! class, input color and precomputed scheduler tag.

use flowmark_meter::Color;
use serde::Deserialize;

pub const DSCP_TABLE_SIZE: usize = 64;

/// One row as supplied by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct DscpParams {
    /// Input color handed to the color-aware marker.
    pub color: Color,
    /// Traffic class, 0..3.
    pub tc_id: u8,
    /// Queue within the traffic class, 0..3.
    pub tc_queue_id: u8,
}

/// Stored row: the update-time inputs plus the packed scheduler tag, so the
/// hot path never re-packs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DscpEntry {
    pub color: Color,
    pub tc: u8,
    pub queue_tc_color: u16,
}

/// Scheduler tag layout: `queue[1:0] | tc[1:0] << 2 | color[1:0] << 4`.
pub fn pack_queue_tc_color(queue: u8, tc: u8, color: Color) -> u16 {
    u16::from(queue & 3) | (u16::from(tc & 3) << 2) | ((color as u16 & 3) << 4)
}

/// The 64-entry table. Published as one immutable snapshot per update, so
/// the hot path always sees a coherent `{color, tc, tag}` triple.
#[derive(Debug, Clone)]
pub struct DscpTable {
    entries: [DscpEntry; DSCP_TABLE_SIZE],
}

impl Default for DscpTable {
    fn default() -> Self {
        Self { entries: [DscpEntry::default(); DSCP_TABLE_SIZE] }
    }
}

impl DscpTable {
    /// Row for a parsed codepoint. The index is masked into the table, so a
    /// malformed header can never read out of bounds.
    pub(crate) fn entry(&self, dscp: u32) -> &DscpEntry {
        &self.entries[dscp as usize & (DSCP_TABLE_SIZE - 1)]
    }

    /// Overwrite the rows selected by `dscp_mask` from `table`.
    pub(crate) fn update(&mut self, dscp_mask: u64, table: &[DscpParams; DSCP_TABLE_SIZE]) {
        for (i, params) in table.iter().enumerate() {
            if dscp_mask & (1 << i) == 0 {
                continue;
            }
            self.entries[i] = DscpEntry {
                color: params.color,
                tc: params.tc_id,
                queue_tc_color: pack_queue_tc_color(params.tc_queue_id, params.tc_id, params.color),
            };
        }
    }
}
