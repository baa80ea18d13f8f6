mod basic;
pub mod testcases;
pub mod prelude {
    use crate::basic;
    pub use basic::*;

    pub use ac::{AcEquationSystemCreationParameters, AcEquationSystemCreator, AcPowerFlowContext};
    pub use equations::{EquationSystem, EquationType, VariableType};
    pub use error::{CreationError, NetworkError};
    pub use network::{Network, NetworkBuilder, NetworkEvent, NetworkListener};
}
