//! Build-time action profile: which actions a table runs, their static
//! configuration, and the per-entry data layout derived from both.

use crate::action::{fwd, mtr, tm};
use crate::config::types::{ActionConfig, ActionType, CommonConfig, MtrConfig, TmConfig};
use crate::config::validator;
use crate::error::{ActionError, Result};

/// Enabled-action set and per-action configuration.
#[derive(Debug, Clone)]
pub(crate) struct ApConfig {
    pub action_mask: u64,
    pub common: CommonConfig,
    pub mtr: Option<MtrConfig>,
    pub tm: Option<TmConfig>,
}

impl ApConfig {
    pub fn enabled(&self, ty: ActionType) -> bool {
        self.action_mask & ty.bit() != 0
    }
}

/// Per-entry data layout: byte offset of each enabled action plus the total
/// size.
#[derive(Debug, Clone, Default)]
pub(crate) struct ApData {
    pub offset: [usize; ActionType::COUNT],
    pub total_size: usize,
}

fn action_data_size(ty: ActionType, cfg: &ApConfig) -> usize {
    match ty {
        ActionType::Fwd => fwd::FWD_DATA_SIZE,
        ActionType::Mtr => cfg.mtr.map_or(0, |m| m.n_tc as usize * mtr::TC_DATA_SIZE),
        ActionType::Tm => tm::TM_DATA_SIZE,
    }
}

impl ApData {
    /// Pack enabled actions back to back, walking types in ascending order.
    /// The layout is a function of the enabled set and the configs alone,
    /// never of registration order.
    fn compute(cfg: &ApConfig) -> Self {
        let mut data = ApData::default();
        let mut running = 0;
        for ty in ActionType::ALL {
            if cfg.enabled(ty) {
                data.offset[ty.index()] = running;
                running += action_data_size(ty, cfg);
            }
        }
        data.total_size = running;
        data
    }
}

/// Mutable profile builder. Register the actions a table should run, then
/// freeze; the frozen profile is the immutable input to
/// [`crate::TableAction::new`].
pub struct ActionProfile {
    cfg: ApConfig,
    data: ApData,
    frozen: bool,
}

impl ActionProfile {
    pub fn new(common: CommonConfig) -> Self {
        Self {
            cfg: ApConfig { action_mask: 0, common, mtr: None, tm: None },
            data: ApData::default(),
            frozen: false,
        }
    }

    /// Enable one action type. Each type registers at most once, and only
    /// before [`freeze`](Self::freeze).
    pub fn register(&mut self, action: ActionConfig) -> Result<()> {
        if self.frozen {
            return Err(ActionError::Frozen);
        }
        let ty = action.action_type();
        if self.cfg.enabled(ty) {
            return Err(ActionError::Invalid("action type already registered"));
        }

        match action {
            ActionConfig::Fwd => {}
            ActionConfig::Mtr(cfg) => {
                validator::validate_mtr(&cfg)?;
                self.cfg.mtr = Some(cfg);
            }
            ActionConfig::Tm(cfg) => {
                validator::validate_tm(&cfg)?;
                self.cfg.tm = Some(cfg);
            }
        }
        self.cfg.action_mask |= ty.bit();
        Ok(())
    }

    /// Seal the profile: FWD is enabled implicitly, offsets are assigned in
    /// ascending action-type order, and the layout becomes immutable.
    pub fn freeze(&mut self) -> Result<()> {
        if self.frozen {
            return Err(ActionError::Frozen);
        }
        self.cfg.action_mask |= ActionType::Fwd.bit();
        self.data = ApData::compute(&self.cfg);
        self.frozen = true;
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Byte offset of `ty`'s slice within per-entry data. `None` until
    /// frozen, or when `ty` is not enabled.
    pub fn offset_of(&self, ty: ActionType) -> Option<usize> {
        (self.frozen && self.cfg.enabled(ty)).then(|| self.data.offset[ty.index()])
    }

    /// Total per-entry data size. Zero until frozen.
    pub fn total_size(&self) -> usize {
        self.data.total_size
    }

    pub(crate) fn cfg(&self) -> &ApConfig {
        &self.cfg
    }

    pub(crate) fn data(&self) -> &ApData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{IpVersion, MeterAlg};

    fn common() -> CommonConfig {
        CommonConfig { ip_offset: 128, ip_version: IpVersion::V4 }
    }

    fn mtr_cfg(n_tc: u32) -> MtrConfig {
        MtrConfig { alg: MeterAlg::TrTcm, n_tc, bytes_enabled: false }
    }

    fn tm_cfg() -> TmConfig {
        TmConfig { n_subports_per_port: 4, n_pipes_per_subport: 16 }
    }

    fn frozen(actions: &[ActionConfig]) -> ActionProfile {
        let mut p = ActionProfile::new(common());
        for a in actions {
            p.register(*a).unwrap_or_else(|e| panic!("register: {e}"));
        }
        p.freeze().unwrap_or_else(|e| panic!("freeze: {e}"));
        p
    }

    #[test]
    fn test_layout_independent_of_registration_order() {
        let a = frozen(&[ActionConfig::Mtr(mtr_cfg(4)), ActionConfig::Tm(tm_cfg())]);
        let b = frozen(&[ActionConfig::Tm(tm_cfg()), ActionConfig::Mtr(mtr_cfg(4))]);

        for ty in ActionType::ALL {
            assert_eq!(a.offset_of(ty), b.offset_of(ty), "{ty:?}");
        }
        assert_eq!(a.total_size(), b.total_size());
    }

    #[test]
    fn test_offsets_follow_action_type_order() {
        let p = frozen(&[ActionConfig::Tm(tm_cfg()), ActionConfig::Mtr(mtr_cfg(4))]);

        let fwd = p.offset_of(ActionType::Fwd).unwrap_or(usize::MAX);
        let mtr = p.offset_of(ActionType::Mtr).unwrap_or(usize::MAX);
        let tm = p.offset_of(ActionType::Tm).unwrap_or(usize::MAX);

        assert_eq!(fwd, 0);
        assert!(fwd < mtr);
        assert!(mtr < tm);
        assert_eq!(p.total_size(), tm + super::tm::TM_DATA_SIZE);
    }

    #[test]
    fn test_fwd_enabled_implicitly_on_freeze() {
        let p = frozen(&[]);
        assert_eq!(p.offset_of(ActionType::Fwd), Some(0));
        assert_eq!(p.total_size(), super::fwd::FWD_DATA_SIZE);
    }

    #[test]
    fn test_mtr_size_scales_with_tc_count() {
        let one = frozen(&[ActionConfig::Mtr(mtr_cfg(1))]);
        let four = frozen(&[ActionConfig::Mtr(mtr_cfg(4))]);

        let per_tc = super::mtr::TC_DATA_SIZE;
        assert_eq!(one.total_size(), super::fwd::FWD_DATA_SIZE + per_tc);
        assert_eq!(four.total_size(), super::fwd::FWD_DATA_SIZE + 4 * per_tc);
    }

    #[test]
    fn test_register_after_freeze_rejected() {
        let mut p = frozen(&[]);
        let err = p.register(ActionConfig::Tm(tm_cfg()));
        assert_eq!(err, Err(ActionError::Frozen));
    }

    #[test]
    fn test_double_register_rejected() {
        let mut p = ActionProfile::new(common());
        p.register(ActionConfig::Tm(tm_cfg())).unwrap_or_else(|e| panic!("register: {e}"));
        let err = p.register(ActionConfig::Tm(tm_cfg()));
        assert!(matches!(err, Err(ActionError::Invalid(_))));
    }

    #[test]
    fn test_double_freeze_rejected() {
        let mut p = frozen(&[]);
        assert_eq!(p.freeze(), Err(ActionError::Frozen));
    }

    #[test]
    fn test_offsets_hidden_until_freeze() {
        let mut p = ActionProfile::new(common());
        p.register(ActionConfig::Mtr(mtr_cfg(4))).unwrap_or_else(|e| panic!("register: {e}"));
        assert_eq!(p.offset_of(ActionType::Mtr), None);
        p.freeze().unwrap_or_else(|e| panic!("freeze: {e}"));
        assert!(p.offset_of(ActionType::Mtr).is_some());
    }

    #[test]
    fn test_unsupported_config_leaves_profile_unchanged() {
        let mut p = ActionProfile::new(common());
        let err = p.register(ActionConfig::Mtr(MtrConfig {
            alg: MeterAlg::TrTcm,
            n_tc: 2,
            bytes_enabled: false,
        }));
        assert!(matches!(err, Err(ActionError::Unsupported(_))));

        p.freeze().unwrap_or_else(|e| panic!("freeze: {e}"));
        assert_eq!(p.offset_of(ActionType::Mtr), None);
    }
}
