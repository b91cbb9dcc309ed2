//! Runtime action instance: configuration snapshot, shared tables, and the
//! control-plane entry points.

pub mod dscp;
pub mod fwd;
pub mod meter_profile;
pub mod mtr;
pub mod tm;

use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use flowmark_meter::{MeterClock, TrtcmParams, TrtcmProfile};
use tracing::debug;

use crate::action::dscp::{DscpParams, DscpTable, DSCP_TABLE_SIZE};
use crate::action::meter_profile::MeterProfileTable;
use crate::config::types::{ActionType, CommonConfig};
use crate::error::{ActionError, Result};
use crate::pipeline::{PacketMeta, TableParams};
use crate::profile::{ActionProfile, ApConfig, ApData};

/// Parameters for [`TableAction::apply`], one variant per action type.
#[derive(Debug, Clone, Copy)]
pub enum ActionParams {
    Fwd(fwd::FwdTarget),
    Mtr(mtr::MtrParams),
    Tm(tm::TmParams),
}

impl ActionParams {
    fn action_type(&self) -> ActionType {
        match self {
            ActionParams::Fwd(_) => ActionType::Fwd,
            ActionParams::Mtr(_) => ActionType::Mtr,
            ActionParams::Tm(_) => ActionType::Tm,
        }
    }
}

/// Meter profile registration payload.
#[derive(Debug, Clone, Copy)]
pub enum MeterProfileParams {
    /// Single-rate TCM. Not supported; `meter_profile_add` rejects it.
    SrTcm { cir: u64, cbs: u64, ebs: u64 },
    TrTcm(TrtcmParams),
}

/// Runtime action instance created from a frozen profile.
///
/// The instance owns the DSCP and meter-profile tables; per-entry action
/// data is owned by the caller's table and reached through the offset map.
///
/// A control thread may update the shared tables while one data-plane worker
/// runs the hot path: updates are published as immutable snapshots the hot
/// path loads once per batch. Control-plane writes and data-plane reads of
/// the *same entry's* bytes must still not race (single-writer /
/// single-reader contract). Running the hot path of one instance on several
/// workers concurrently is not supported.
pub struct TableAction {
    cfg: ApConfig,
    data: ApData,
    dscp_table: ArcSwap<DscpTable>,
    meter_profiles: ArcSwap<MeterProfileTable>,
    clock: MeterClock,
}

impl TableAction {
    /// Create from a frozen profile. Both tables start empty.
    pub fn new(profile: &ActionProfile) -> Result<Self> {
        if !profile.is_frozen() {
            return Err(ActionError::NotFrozen);
        }
        Ok(Self {
            cfg: profile.cfg().clone(),
            data: profile.data().clone(),
            dscp_table: ArcSwap::from_pointee(DscpTable::default()),
            meter_profiles: ArcSwap::from_pointee(MeterProfileTable::default()),
            clock: MeterClock::new(),
        })
    }

    pub fn enabled(&self, ty: ActionType) -> bool {
        self.cfg.enabled(ty)
    }

    /// Byte offset of `ty`'s slice within per-entry data, when enabled.
    pub fn offset(&self, ty: ActionType) -> Option<usize> {
        self.enabled(ty).then(|| self.data.offset[ty.index()])
    }

    pub(crate) fn common(&self) -> &CommonConfig {
        &self.cfg.common
    }

    pub(crate) fn clock(&self) -> &MeterClock {
        &self.clock
    }

    pub(crate) fn dscp_snapshot(&self) -> Guard<Arc<DscpTable>> {
        self.dscp_table.load()
    }

    pub(crate) fn meter_profile_snapshot(&self) -> Guard<Arc<MeterProfileTable>> {
        self.meter_profiles.load()
    }

    /// Write one action's slice of a matched entry's data.
    ///
    /// MTR resolves every referenced meter profile before writing, so a
    /// failed apply leaves the entry unchanged.
    pub fn apply(&self, entry: &mut [u8], params: &ActionParams) -> Result<()> {
        let ty = params.action_type();
        if !self.enabled(ty) {
            return Err(ActionError::Invalid("action type not enabled in profile"));
        }
        if entry.len() < self.data.total_size {
            return Err(ActionError::Invalid("entry data shorter than the profile layout"));
        }
        let data = &mut entry[self.data.offset[ty.index()]..];

        match params {
            ActionParams::Fwd(target) => {
                fwd::apply(data, *target);
                Ok(())
            }
            ActionParams::Mtr(p) => {
                let Some(cfg) = self.cfg.mtr else {
                    return Err(ActionError::Invalid("action type not enabled in profile"));
                };
                let profiles = self.meter_profiles.load();
                mtr::apply(data, p, &cfg, &profiles, self.clock.now())
            }
            ActionParams::Tm(p) => {
                let Some(cfg) = self.cfg.tm else {
                    return Err(ActionError::Invalid("action type not enabled in profile"));
                };
                tm::apply(data, p, &cfg)
            }
        }
    }

    /// Install a trTCM meter profile under a caller-chosen id.
    pub fn meter_profile_add(&self, profile_id: u32, params: &MeterProfileParams) -> Result<()> {
        if !self.enabled(ActionType::Mtr) {
            return Err(ActionError::Invalid("MTR is not enabled in profile"));
        }
        let MeterProfileParams::TrTcm(trtcm) = params else {
            return Err(ActionError::Unsupported("only trTCM meter profiles are supported"));
        };

        let current = self.meter_profiles.load_full();
        if current.find(profile_id).is_some() {
            return Err(ActionError::Exists(profile_id));
        }
        let slot_index = current.find_unused().ok_or(ActionError::NoSpace)?;

        let profile = TrtcmProfile::new(trtcm, MeterClock::hz())?;

        let mut next = MeterProfileTable::clone(&current);
        let slot = next.slot_mut(slot_index);
        slot.profile = profile;
        slot.profile_id = profile_id;
        slot.valid = true;
        self.meter_profiles.store(Arc::new(next));

        debug!(profile_id, slot_index, "meter profile installed");
        Ok(())
    }

    /// Remove a meter profile. A missing id is a no-op.
    ///
    /// Per-entry states referencing the slot are not touched: callers must
    /// drain or re-apply affected entries first. Until they do, those
    /// entries meter against an empty profile and come out Red.
    pub fn meter_profile_delete(&self, profile_id: u32) -> Result<()> {
        if !self.enabled(ActionType::Mtr) {
            return Err(ActionError::Invalid("MTR is not enabled in profile"));
        }
        let current = self.meter_profiles.load_full();
        let Some(slot_index) = current.find(profile_id) else {
            return Ok(());
        };

        let mut next = MeterProfileTable::clone(&current);
        *next.slot_mut(slot_index) = Default::default();
        self.meter_profiles.store(Arc::new(next));

        debug!(profile_id, slot_index, "meter profile removed");
        Ok(())
    }

    /// Overwrite the DSCP rows selected by `dscp_mask`. The new table is
    /// published as one snapshot, so the hot path never observes a torn row.
    ///
    /// Row `tc_id`s are not checked against the profile's `n_tc`: keeping
    /// them in range is the caller's contract. A row pointing past `n_tc`
    /// steers the hot path at a TC slot outside the entry's MTR region and
    /// the resulting metering is undefined.
    pub fn dscp_table_update(
        &self,
        dscp_mask: u64,
        table: &[DscpParams; DSCP_TABLE_SIZE],
    ) -> Result<()> {
        if !self.enabled(ActionType::Mtr) && !self.enabled(ActionType::Tm) {
            return Err(ActionError::Invalid("neither MTR nor TM is enabled in profile"));
        }
        if dscp_mask == 0 {
            return Err(ActionError::Invalid("empty dscp_mask"));
        }

        let mut next = DscpTable::clone(&self.dscp_table.load_full());
        next.update(dscp_mask, table);
        self.dscp_table.store(Arc::new(next));

        debug!(dscp_mask, "dscp table updated");
        Ok(())
    }

    /// Read and/or clear one entry's packet counters.
    ///
    /// Byte counters are never maintained and are always reported invalid.
    /// Counters wrap modulo 2^56; clearing zeroes them while preserving the
    /// policer and profile-index bits.
    pub fn meter_read(
        &self,
        entry: &mut [u8],
        tc_mask: u32,
        stats: Option<&mut mtr::MtrCounters>,
        clear: bool,
    ) -> Result<()> {
        let Some(cfg) = self.cfg.mtr else {
            return Err(ActionError::Invalid("MTR is not enabled in profile"));
        };
        if u64::from(tc_mask) > mtr::len2mask(cfg.n_tc) {
            return Err(ActionError::Invalid("tc_mask selects traffic classes beyond n_tc"));
        }
        if entry.len() < self.data.total_size {
            return Err(ActionError::Invalid("entry data shorter than the profile layout"));
        }

        let offset = self.data.offset[ActionType::Mtr.index()];
        mtr::read(&mut entry[offset..], tc_mask, stats, clear);
        Ok(())
    }

    /// Table parameters for the pipeline: the hit handler to install
    /// (`None` when only FWD is enabled, the pipeline dispatches natively)
    /// and the per-entry action bytes past the pipeline's entry header.
    pub fn table_params<P: PacketMeta>(&self) -> TableParams<P> {
        let fwd_only = self.cfg.action_mask == ActionType::Fwd.bit();
        TableParams {
            hit_handler: if fwd_only { None } else { Some(crate::datapath::run_batch::<P>) },
            action_data_size: self.data.total_size.next_power_of_two() - fwd::FWD_DATA_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::mtr::{MtrParams, MtrTcSlot, TC_DATA_SIZE};
    use crate::config::types::{ActionConfig, IpVersion, MeterAlg, MtrConfig, PolicerAction, TmConfig};
    use crate::pipeline::PacketBuf;
    use flowmark_meter::Color;

    fn common() -> CommonConfig {
        CommonConfig { ip_offset: 0, ip_version: IpVersion::V4 }
    }

    fn mtr_cfg() -> MtrConfig {
        MtrConfig { alg: MeterAlg::TrTcm, n_tc: 4, bytes_enabled: false }
    }

    fn frozen(actions: &[ActionConfig]) -> ActionProfile {
        let mut p = ActionProfile::new(common());
        for a in actions {
            p.register(*a).unwrap_or_else(|e| panic!("register: {e}"));
        }
        p.freeze().unwrap_or_else(|e| panic!("freeze: {e}"));
        p
    }

    fn mtr_action() -> TableAction {
        TableAction::new(&frozen(&[ActionConfig::Mtr(mtr_cfg())]))
            .unwrap_or_else(|e| panic!("create: {e}"))
    }

    fn trtcm(cir: u64) -> MeterProfileParams {
        MeterProfileParams::TrTcm(TrtcmParams { cir, pir: cir, cbs: 1500, pbs: 1500 })
    }

    #[test]
    fn test_create_requires_frozen_profile() {
        let profile = ActionProfile::new(common());
        assert!(matches!(TableAction::new(&profile), Err(ActionError::NotFrozen)));
    }

    #[test]
    fn test_apply_requires_enabled_type() {
        let action = TableAction::new(&frozen(&[])).unwrap_or_else(|e| panic!("create: {e}"));
        let mut entry = vec![0u8; 64];
        let err = action.apply(&mut entry, &ActionParams::Tm(tm::TmParams::default()));
        assert!(matches!(err, Err(ActionError::Invalid(_))));
    }

    #[test]
    fn test_apply_rejects_short_entry() {
        let action = mtr_action();
        let mut entry = vec![0u8; 16];
        let err = action.apply(&mut entry, &ActionParams::Fwd(fwd::FwdTarget::Drop));
        assert!(matches!(err, Err(ActionError::Invalid(_))));
    }

    #[test]
    fn test_mtr_apply_validates_before_writing() {
        let action = mtr_action();
        action.meter_profile_add(1, &trtcm(1000)).unwrap_or_else(|e| panic!("add: {e}"));

        let mut entry = vec![0u8; 512];
        let mut params = MtrParams { tc_mask: 0x3, ..Default::default() };
        params.mtr[0].meter_profile_id = 1;
        params.mtr[1].meter_profile_id = 99; // not installed

        let err = action.apply(&mut entry, &ActionParams::Mtr(params));
        assert!(matches!(err, Err(ActionError::Invalid(_))));
        assert!(entry.iter().all(|&b| b == 0), "failed apply must not write");
    }

    #[test]
    fn test_mtr_apply_rejects_tc_mask_beyond_n_tc() {
        let mut p = ActionProfile::new(common());
        p.register(ActionConfig::Mtr(MtrConfig { alg: MeterAlg::TrTcm, n_tc: 1, bytes_enabled: false }))
            .unwrap_or_else(|e| panic!("register: {e}"));
        p.freeze().unwrap_or_else(|e| panic!("freeze: {e}"));
        let action = TableAction::new(&p).unwrap_or_else(|e| panic!("create: {e}"));
        action.meter_profile_add(1, &trtcm(1000)).unwrap_or_else(|e| panic!("add: {e}"));

        let mut entry = vec![0u8; 512];
        let params = MtrParams { tc_mask: 0x2, ..Default::default() };
        let err = action.apply(&mut entry, &ActionParams::Mtr(params));
        assert!(matches!(err, Err(ActionError::Invalid(_))));
    }

    #[test]
    fn test_mtr_apply_packed_state_integrity() {
        let action = mtr_action();
        // Two profiles: id 10 lands in slot 0, id 20 in slot 1.
        action.meter_profile_add(10, &trtcm(1000)).unwrap_or_else(|e| panic!("add: {e}"));
        action.meter_profile_add(20, &trtcm(2000)).unwrap_or_else(|e| panic!("add: {e}"));

        let mut entry = vec![0u8; 512];
        let mut params = MtrParams { tc_mask: 0x1, ..Default::default() };
        params.mtr[0].meter_profile_id = 20;
        params.mtr[0].policer =
            [PolicerAction::Green, PolicerAction::Drop, PolicerAction::Yellow];
        action.apply(&mut entry, &ActionParams::Mtr(params)).unwrap_or_else(|e| panic!("apply: {e}"));

        let offset = action.offset(ActionType::Mtr).unwrap_or(usize::MAX);
        let slot = MtrTcSlot::new(&mut entry[offset..], 0);
        assert_eq!(slot.profile_index(), 1);
        assert_eq!(slot.drop_flag(Color::Yellow), 1);
        assert_eq!(slot.recolor(Color::Red), Color::Yellow);
        assert_eq!(slot.recolor(Color::Green), Color::Green);
        for color in [Color::Green, Color::Yellow, Color::Red] {
            assert_eq!(slot.packets(color), 0);
        }
    }

    #[test]
    fn test_mtr_apply_leaves_unselected_tcs_alone() {
        let action = mtr_action();
        action.meter_profile_add(1, &trtcm(1000)).unwrap_or_else(|e| panic!("add: {e}"));

        let mut entry = vec![0u8; 512];
        let offset = action.offset(ActionType::Mtr).unwrap_or(usize::MAX);
        entry[offset + TC_DATA_SIZE..offset + 2 * TC_DATA_SIZE].fill(0xAB);

        let mut params = MtrParams { tc_mask: 0x1, ..Default::default() };
        params.mtr[0].meter_profile_id = 1;
        action.apply(&mut entry, &ActionParams::Mtr(params)).unwrap_or_else(|e| panic!("apply: {e}"));

        assert!(entry[offset + TC_DATA_SIZE..offset + 2 * TC_DATA_SIZE].iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_meter_profile_table_exhaustion_and_reuse() {
        let action = mtr_action();
        for id in 0..32 {
            action.meter_profile_add(id, &trtcm(1000)).unwrap_or_else(|e| panic!("add {id}: {e}"));
        }
        assert_eq!(action.meter_profile_add(100, &trtcm(1000)), Err(ActionError::NoSpace));

        action.meter_profile_delete(5).unwrap_or_else(|e| panic!("delete: {e}"));
        action.meter_profile_add(100, &trtcm(1000)).unwrap_or_else(|e| panic!("re-add: {e}"));
    }

    #[test]
    fn test_meter_profile_duplicate_id_rejected() {
        let action = mtr_action();
        action.meter_profile_add(7, &trtcm(1000)).unwrap_or_else(|e| panic!("add: {e}"));
        assert_eq!(action.meter_profile_add(7, &trtcm(2000)), Err(ActionError::Exists(7)));
    }

    #[test]
    fn test_meter_profile_srtcm_rejected() {
        let action = mtr_action();
        let err = action.meter_profile_add(1, &MeterProfileParams::SrTcm { cir: 1, cbs: 1, ebs: 1 });
        assert!(matches!(err, Err(ActionError::Unsupported(_))));
    }

    #[test]
    fn test_meter_profile_delete_missing_is_noop() {
        let action = mtr_action();
        assert_eq!(action.meter_profile_delete(42), Ok(()));
    }

    #[test]
    fn test_meter_profile_requires_mtr() {
        let action = TableAction::new(&frozen(&[])).unwrap_or_else(|e| panic!("create: {e}"));
        assert!(matches!(action.meter_profile_add(1, &trtcm(1000)), Err(ActionError::Invalid(_))));
        assert!(matches!(action.meter_profile_delete(1), Err(ActionError::Invalid(_))));
    }

    #[test]
    fn test_dscp_update_requires_mtr_or_tm() {
        let action = TableAction::new(&frozen(&[])).unwrap_or_else(|e| panic!("create: {e}"));
        let table = [dscp::DscpParams::default(); DSCP_TABLE_SIZE];
        assert!(matches!(action.dscp_table_update(u64::MAX, &table), Err(ActionError::Invalid(_))));

        let tm_only = TableAction::new(&frozen(&[ActionConfig::Tm(TmConfig {
            n_subports_per_port: 4,
            n_pipes_per_subport: 16,
        })]))
        .unwrap_or_else(|e| panic!("create: {e}"));
        assert_eq!(tm_only.dscp_table_update(u64::MAX, &table), Ok(()));
        assert!(matches!(tm_only.dscp_table_update(0, &table), Err(ActionError::Invalid(_))));
    }

    #[test]
    fn test_meter_read_rejects_bad_tc_mask() {
        let action = mtr_action();
        let mut entry = vec![0u8; 512];
        let err = action.meter_read(&mut entry, 0x1F, None, false);
        assert!(matches!(err, Err(ActionError::Invalid(_))));
    }

    #[test]
    fn test_meter_read_without_stats_output_only_clears() {
        let action = mtr_action();
        action.meter_profile_add(1, &trtcm(1000)).unwrap_or_else(|e| panic!("add: {e}"));

        let mut entry = vec![0u8; 512];
        let mut params = MtrParams { tc_mask: 0x1, ..Default::default() };
        params.mtr[0].meter_profile_id = 1;
        action.apply(&mut entry, &ActionParams::Mtr(params)).unwrap_or_else(|e| panic!("apply: {e}"));

        let offset = action.offset(ActionType::Mtr).unwrap_or(usize::MAX);
        {
            let mut slot = MtrTcSlot::new(&mut entry[offset..], 0);
            slot.inc_stats(Color::Green);
        }

        action.meter_read(&mut entry, 0x1, None, true).unwrap_or_else(|e| panic!("read: {e}"));

        let slot = MtrTcSlot::new(&mut entry[offset..], 0);
        assert_eq!(slot.packets(Color::Green), 0);
        assert_eq!(slot.profile_index(), 0);
    }

    #[test]
    fn test_table_params_handler_selection() {
        let fwd_only = TableAction::new(&frozen(&[])).unwrap_or_else(|e| panic!("create: {e}"));
        let params = fwd_only.table_params::<PacketBuf>();
        assert!(params.hit_handler.is_none());
        assert_eq!(params.action_data_size, 0);

        let metered = mtr_action();
        let params = metered.table_params::<PacketBuf>();
        assert!(params.hit_handler.is_some());
        // 8 (FWD) + 4 * 56 (MTR) = 232, rounded up to 256, minus the header.
        assert_eq!(params.action_data_size, 248);
    }
}
