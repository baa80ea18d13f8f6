//! AC power flow equations: one pass creation from a network and
//! incremental maintenance as the network changes.
pub mod context;
pub mod creator;
pub(crate) mod distribution;
pub mod initializer;
pub mod parameters;
pub mod updater;

pub use context::AcPowerFlowContext;
pub use creator::AcEquationSystemCreator;
pub use initializer::{
    PreviousValueVoltageInitializer, UniformValueVoltageInitializer, VoltageInitializer,
    initial_state,
};
pub use parameters::AcEquationSystemCreationParameters;
pub use updater::AcEquationSystemUpdater;
