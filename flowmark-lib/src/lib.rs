//! Pipeline table-action engine: per-entry actions executed when a packet
//! matches a classification table entry.
//!
//! A frozen [`ActionProfile`] describes which actions a table runs and fixes
//! the per-entry data layout; a [`TableAction`] owns the runtime state (DSCP
//! table, meter profiles) and the batched hot path the pipeline installs as
//! its hit handler. Three actions are supported: FWD (pipeline dispatch),
//! MTR (trTCM metering with policing) and TM (scheduler tagging).
#![forbid(unsafe_code)]

pub mod action;
pub mod config;
pub mod datapath;
pub mod error;
mod net;
pub mod pipeline;
pub mod profile;
pub mod telemetry;

pub use action::dscp::{pack_queue_tc_color, DscpParams, DSCP_TABLE_SIZE};
pub use action::fwd::FwdTarget;
pub use action::mtr::{MtrCounterSet, MtrCounters, MtrParams, MtrTcParams, TC_MAX};
pub use action::tm::TmParams;
pub use action::{ActionParams, MeterProfileParams, TableAction};
pub use config::{
    load_from_path, ActionConfig, ActionType, CommonConfig, IpVersion, MeterAlg, MtrConfig,
    PolicerAction, TmConfig,
};
pub use datapath::run_batch;
pub use error::{ActionError, Result};
pub use pipeline::{EntrySet, HitHandlerFn, PacketBuf, PacketMeta, TableParams};
pub use profile::ActionProfile;

// Metering vocabulary shared with flowmark-meter.
pub use flowmark_meter::{Color, TrtcmParams};
