//! Batched hot path: the hit handler the pipeline invokes per lookup batch.
//!
//! No allocation, no blocking, no logging; one table snapshot and at most
//! one timestamp per batch. Runs to completion on every call.

use crate::action::dscp::DscpTable;
use crate::action::meter_profile::MeterProfileTable;
use crate::action::{mtr, tm, TableAction};
use crate::config::types::ActionType;
use crate::net::{self, L3Info};
use crate::pipeline::{EntrySet, PacketMeta};

/// Process one batch of matched packets.
///
/// `pkts_mask` bit i marks packet i valid. A dense-prefix mask (`mask &
/// (mask + 1) == 0`) takes the 4-wide kernel plus a scalar tail; any other
/// mask walks its set bits. Returns the drop mask, with bits only inside
/// `pkts_mask`, for the pipeline's packet-drop primitive.
pub fn run_batch<P: PacketMeta>(
    action: &TableAction,
    pkts: &mut [P],
    pkts_mask: u64,
    entries: &mut EntrySet<'_>,
) -> u64 {
    let time = if action.enabled(ActionType::Mtr) { action.clock().now() } else { 0 };
    let dscp_guard = action.dscp_snapshot();
    let dscp_table: &DscpTable = &dscp_guard;
    let profile_guard = action.meter_profile_snapshot();
    let profiles: &MeterProfileTable = &profile_guard;

    let mut drop_mask = 0u64;

    if pkts_mask & pkts_mask.wrapping_add(1) == 0 {
        let n_pkts = pkts_mask.count_ones() as usize;
        let mut i = 0;

        while i + 4 <= n_pkts {
            drop_mask |= pkt4_work(action, pkts, entries, i, time, dscp_table, profiles) << i;
            i += 4;
        }
        while i < n_pkts {
            drop_mask |=
                pkt_work(action, &mut pkts[i], entries.entry_mut(i), time, dscp_table, profiles)
                    << i;
            i += 1;
        }
    } else {
        let mut mask = pkts_mask;
        while mask != 0 {
            let pos = mask.trailing_zeros() as usize;
            mask &= mask - 1;
            drop_mask |= pkt_work(
                action,
                &mut pkts[pos],
                entries.entry_mut(pos),
                time,
                dscp_table,
                profiles,
            ) << pos;
        }
    }

    drop_mask
}

/// Run the enabled actions over one parsed packet. Shared by the scalar and
/// 4-wide kernels so both produce bit-identical results.
fn apply_actions<P: PacketMeta>(
    action: &TableAction,
    pkt: &mut P,
    entry: &mut [u8],
    l3: L3Info,
    time: u64,
    dscp_table: &DscpTable,
    profiles: &MeterProfileTable,
) -> u64 {
    let mut drop_mask = 0;

    if let Some(offset) = action.offset(ActionType::Mtr) {
        drop_mask |= mtr::pkt_work_mtr(
            pkt,
            &mut entry[offset..],
            dscp_table,
            profiles,
            time,
            l3.dscp,
            l3.total_length,
        );
    }

    if let Some(offset) = action.offset(ActionType::Tm) {
        tm::pkt_work_tm(pkt, &entry[offset..], dscp_table, l3.dscp);
    }

    drop_mask
}

fn pkt_work<P: PacketMeta>(
    action: &TableAction,
    pkt: &mut P,
    entry: &mut [u8],
    time: u64,
    dscp_table: &DscpTable,
    profiles: &MeterProfileTable,
) -> u64 {
    let l3 = net::parse_l3(pkt, action.common());
    apply_actions(action, pkt, entry, l3, time, dscp_table, profiles)
}

/// Four packets per call: all four headers are parsed up front, then each
/// packet runs the same per-packet kernel. Returns a 4-bit drop mask.
fn pkt4_work<P: PacketMeta>(
    action: &TableAction,
    pkts: &mut [P],
    entries: &mut EntrySet<'_>,
    base: usize,
    time: u64,
    dscp_table: &DscpTable,
    profiles: &MeterProfileTable,
) -> u64 {
    let common = action.common();
    let l3: [L3Info; 4] = core::array::from_fn(|j| net::parse_l3(&pkts[base + j], common));

    let mut drop_mask = 0;
    for (j, l3) in l3.into_iter().enumerate() {
        drop_mask |= apply_actions(
            action,
            &mut pkts[base + j],
            entries.entry_mut(base + j),
            l3,
            time,
            dscp_table,
            profiles,
        ) << j;
    }
    drop_mask
}
