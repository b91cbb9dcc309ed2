//! Seam to the surrounding pipeline runtime.
//!
//! The pipeline owns packet buffers and table-entry storage; this module
//! defines the minimal view the action engine needs of both.

use crate::action::TableAction;

/// Minimal packet-buffer view: the metadata bytes holding the L3 header and
/// the 64-bit scheduler word the engine writes.
pub trait PacketMeta {
    /// Packet metadata; the L3 header sits at the profile's `ip_offset`.
    fn metadata(&self) -> &[u8];
    /// Current scheduler word.
    fn sched(&self) -> u64;
    /// Overwrite the scheduler word.
    fn set_sched(&mut self, sched: u64);
}

/// Owned packet buffer for embedders, tests and benches that do not bring
/// their own buffer type.
#[derive(Debug, Clone, Default)]
pub struct PacketBuf {
    metadata: Vec<u8>,
    sched: u64,
}

impl PacketBuf {
    pub fn new(metadata: Vec<u8>) -> Self {
        Self { metadata, sched: 0 }
    }
}

impl PacketMeta for PacketBuf {
    fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    fn sched(&self) -> u64 {
        self.sched
    }

    fn set_sched(&mut self, sched: u64) {
        self.sched = sched;
    }
}

/// Per-batch view of the table entries matched by each packet.
///
/// Entry bytes live in one backing store owned by the pipeline's table;
/// `offsets[i]` locates packet i's entry within it. Offsets may repeat when
/// several packets of one batch hit the same entry.
pub struct EntrySet<'a> {
    store: &'a mut [u8],
    offsets: &'a [usize],
}

impl<'a> EntrySet<'a> {
    pub fn new(store: &'a mut [u8], offsets: &'a [usize]) -> Self {
        Self { store, offsets }
    }

    /// Entry slice for packet `i`.
    pub fn entry_mut(&mut self, i: usize) -> &mut [u8] {
        &mut self.store[self.offsets[i]..]
    }
}

/// Hit handler installed into the pipeline's table parameters.
///
/// Arguments mirror the pipeline's hit callback: the action instance, the
/// packet batch, the valid-packet bitmask, and the matched entries. The
/// return value is the drop mask the pipeline feeds to its packet-drop
/// primitive.
pub type HitHandlerFn<P> = fn(&TableAction, &mut [P], u64, &mut EntrySet<'_>) -> u64;

/// Everything the pipeline needs to set up a table running an action.
pub struct TableParams<P> {
    /// `None` when only FWD is enabled: the pipeline dispatches natively and
    /// no handler runs.
    pub hit_handler: Option<HitHandlerFn<P>>,
    /// Per-entry action bytes past the pipeline's own entry header.
    pub action_data_size: usize,
}
