pub mod loader;
pub mod types;
pub mod validator;

pub use loader::load_from_path;
pub use types::{
    ActionConfig, ActionType, CommonConfig, IpVersion, MeterAlg, MtrConfig, PolicerAction,
    TmConfig,
};
