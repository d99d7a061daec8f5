pub mod config;
pub mod dispatch;
pub mod engine;
pub mod feeder;
#[cfg(feature = "libcue")]
pub mod libcue;
pub mod logging;
pub mod replay;
pub mod shim;
pub mod target;

pub use config::SluiceConfig;
pub use dispatch::{Bootstrap, DefaultBootstrap, Dispatch, Dispatcher, Invocation};
pub use engine::{CommandEngine, EngineError, FuzzerMain};
pub use feeder::{InputFeeder, TrialStatus};
pub use replay::{ReplayError, ReplayReport, replay_file};
pub use shim::{LinkedTarget, UnlinkedTarget, linked_feeder};
pub use target::{HandleGuard, Target, TerminatedCopy};
