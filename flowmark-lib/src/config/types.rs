use serde::Deserialize;

/// IP version the engine expects at the configured metadata offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

/// Configuration shared by every action of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CommonConfig {
    /// Byte offset of the L3 header within each packet's metadata.
    pub ip_offset: u32,
    /// Which header the hot path parses at that offset.
    pub ip_version: IpVersion,
}

/// Metering algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterAlg {
    /// Single-rate three-color marker. Not supported.
    SrTcm,
    /// Two-rate three-color marker.
    TrTcm,
}

/// MTR action configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MtrConfig {
    pub alg: MeterAlg,
    /// Traffic classes per entry. Must be 1 or 4.
    pub n_tc: u32,
    /// Byte counters per (TC, color). Not supported; must stay off.
    #[serde(default)]
    pub bytes_enabled: bool,
}

/// TM action configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TmConfig {
    /// Power of two, at most 65535 (the subport field is 16 bits wide).
    pub n_subports_per_port: u32,
    /// Power of two.
    pub n_pipes_per_subport: u32,
}

/// Action types, in per-entry data layout order.
///
/// The discriminant ordering is part of the layout contract: freeze assigns
/// offsets by walking types in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionType {
    Fwd = 0,
    Mtr = 1,
    Tm = 2,
}

impl ActionType {
    pub(crate) const COUNT: usize = 3;
    pub(crate) const ALL: [ActionType; ActionType::COUNT] =
        [ActionType::Fwd, ActionType::Mtr, ActionType::Tm];

    pub(crate) fn bit(self) -> u64 {
        1 << self as u32
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Registration payload for one action type.
///
/// FWD carries no configuration; MTR and TM require theirs. The enum makes
/// the cfg-presence rule unrepresentable to violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionConfig {
    Fwd,
    Mtr(MtrConfig),
    Tm(TmConfig),
}

impl ActionConfig {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionConfig::Fwd => ActionType::Fwd,
            ActionConfig::Mtr(_) => ActionType::Mtr,
            ActionConfig::Tm(_) => ActionType::Tm,
        }
    }
}

/// Post-meter policer verdict for one meter output color.
///
/// The non-drop variants name the recolor target written into the packet's
/// scheduler word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicerAction {
    #[default]
    Green = 0,
    Yellow = 1,
    Red = 2,
    Drop = 3,
}
