//! TM action: hierarchical-scheduler tag written into the packet's
//! scheduler word.

use crate::action::dscp::DscpTable;
use crate::config::types::TmConfig;
use crate::error::{ActionError, Result};
use crate::pipeline::PacketMeta;

/// Encoded record: `{queue_tc_color: u16, subport: u16, pipe: u32}`,
/// little-endian. Written whole into the scheduler word.
pub(crate) const TM_DATA_SIZE: usize = 8;

/// TM apply parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TmParams {
    pub subport_id: u32,
    pub pipe_id: u32,
}

/// Write the entry's TM record. `queue_tc_color` starts at zero and is
/// refreshed from the DSCP table on every packet.
pub(crate) fn apply(tm_data: &mut [u8], params: &TmParams, cfg: &TmConfig) -> Result<()> {
    if params.subport_id >= cfg.n_subports_per_port {
        return Err(ActionError::Invalid("subport_id out of range"));
    }
    if params.pipe_id >= cfg.n_pipes_per_subport {
        return Err(ActionError::Invalid("pipe_id out of range"));
    }

    tm_data[0..2].copy_from_slice(&0u16.to_le_bytes());
    tm_data[2..4].copy_from_slice(&(params.subport_id as u16).to_le_bytes());
    tm_data[4..8].copy_from_slice(&params.pipe_id.to_le_bytes());
    Ok(())
}

/// Stamp the scheduler word: the entry's subport/pipe verbatim, the DSCP
/// row's queue/tc/color tag, one store.
pub(crate) fn pkt_work_tm<P: PacketMeta>(
    pkt: &mut P,
    tm_data: &[u8],
    dscp_table: &DscpTable,
    dscp: u32,
) {
    let entry = dscp_table.entry(dscp);
    let mut b = [0u8; TM_DATA_SIZE];
    b.copy_from_slice(&tm_data[..TM_DATA_SIZE]);
    b[0..2].copy_from_slice(&entry.queue_tc_color.to_le_bytes());
    pkt.set_sched(u64::from_le_bytes(b));
}
