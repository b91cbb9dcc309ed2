use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::types::{ActionConfig, CommonConfig, MtrConfig, TmConfig};
use crate::error::{ActionError, Result};
use crate::profile::ActionProfile;

/// On-disk profile document.
///
/// `[common]` is required; `[mtr]` and `[tm]` enable the respective actions.
/// FWD needs no section, freeze enables it implicitly.
#[derive(Debug, Deserialize)]
struct ProfileFile {
    common: CommonConfig,
    #[serde(default)]
    mtr: Option<MtrConfig>,
    #[serde(default)]
    tm: Option<TmConfig>,
}

/// Load a TOML profile document, register the sections it carries and
/// freeze, yielding a profile ready for [`crate::TableAction::new`].
pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<ActionProfile> {
    let txt = fs::read_to_string(p)
        .map_err(|e| ActionError::Config(format!("Failed to read profile file: {e}")))?;
    let file: ProfileFile = toml::from_str(&txt)
        .map_err(|e| ActionError::Config(format!("Failed to parse profile: {e}")))?;

    let mut profile = ActionProfile::new(file.common);
    if let Some(mtr) = file.mtr {
        profile.register(ActionConfig::Mtr(mtr))?;
    }
    if let Some(tm) = file.tm {
        profile.register(ActionConfig::Tm(tm))?;
    }
    profile.freeze()?;
    Ok(profile)
}
