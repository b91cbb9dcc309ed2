use crate::config::types::{MeterAlg, MtrConfig, TmConfig};
use crate::error::{ActionError, Result};

/// MTR support envelope: trTCM only, 1 or 4 traffic classes, packet-length
/// metering only.
pub fn validate_mtr(cfg: &MtrConfig) -> Result<()> {
    if cfg.alg != MeterAlg::TrTcm {
        return Err(ActionError::Unsupported("only trTCM metering is supported"));
    }
    if cfg.n_tc != 1 && cfg.n_tc != 4 {
        return Err(ActionError::Unsupported("n_tc must be 1 or 4"));
    }
    if cfg.bytes_enabled {
        return Err(ActionError::Unsupported("byte metering is not supported"));
    }
    Ok(())
}

/// TM support envelope: power-of-two subport and pipe counts, subports
/// bounded by the 16-bit field in the scheduler word.
pub fn validate_tm(cfg: &TmConfig) -> Result<()> {
    if cfg.n_subports_per_port == 0
        || !cfg.n_subports_per_port.is_power_of_two()
        || cfg.n_subports_per_port > u32::from(u16::MAX)
    {
        return Err(ActionError::Unsupported(
            "n_subports_per_port must be a power of two no larger than 65535",
        ));
    }
    if cfg.n_pipes_per_subport == 0 || !cfg.n_pipes_per_subport.is_power_of_two() {
        return Err(ActionError::Unsupported("n_pipes_per_subport must be a power of two"));
    }
    Ok(())
}
