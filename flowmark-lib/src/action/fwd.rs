//! FWD action: the pipeline dispatch record at the head of per-entry data.

/// Pipeline dispatch decision installed by the FWD action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FwdTarget {
    /// Drop the packet.
    Drop,
    /// Send to output port `id`.
    Port(u32),
    /// Continue the lookup at table `id`.
    Table(u32),
    /// Park the packet until the pipeline releases it.
    Stall,
}

/// Size of the encoded dispatch record: `kind: u32, id: u32`, little-endian.
///
/// This record doubles as the pipeline's own entry header, which is why it
/// always sits at offset zero and why `action_data_size` excludes it.
pub(crate) const FWD_DATA_SIZE: usize = 8;

const KIND_DROP: u32 = 0;
const KIND_PORT: u32 = 1;
const KIND_TABLE: u32 = 2;
const KIND_STALL: u32 = 3;

pub(crate) fn apply(data: &mut [u8], target: FwdTarget) {
    let (kind, id) = match target {
        FwdTarget::Drop => (KIND_DROP, 0),
        FwdTarget::Port(id) => (KIND_PORT, id),
        FwdTarget::Table(id) => (KIND_TABLE, id),
        FwdTarget::Stall => (KIND_STALL, 0),
    };
    data[0..4].copy_from_slice(&kind.to_le_bytes());
    data[4..8].copy_from_slice(&id.to_le_bytes());
}

#[cfg(test)]
pub(crate) fn decode(data: &[u8]) -> Option<FwdTarget> {
    let kind = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let id = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    match kind {
        KIND_DROP => Some(FwdTarget::Drop),
        KIND_PORT => Some(FwdTarget::Port(id)),
        KIND_TABLE => Some(FwdTarget::Table(id)),
        KIND_STALL => Some(FwdTarget::Stall),
        _ => None,
    }
}
