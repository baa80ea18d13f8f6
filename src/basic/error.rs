use thiserror::Error;

/// Errors raised while assembling a network model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("{element} '{name}' references unknown bus {bus}")]
    UnknownBus {
        element: &'static str,
        name: String,
        bus: usize,
    },

    #[error("{control} control references unknown {element} {num}")]
    UnknownElement {
        control: &'static str,
        element: &'static str,
        num: usize,
    },

    #[error("network has no bus")]
    Empty,

    #[error("event references unknown {element} {num}")]
    UnknownEventTarget { element: &'static str, num: usize },

    #[error("{event} is a notification and cannot be applied")]
    NotACommand { event: &'static str },
}

/// Configuration errors that make the equation system impossible to build.
///
/// These are fatal for the scenario being assembled: the creator refuses to
/// produce a system instead of silently dropping a constraint.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CreationError {
    #[error("network has no slack bus")]
    NoSlackBus,

    #[error("network has {count} reference buses, expected exactly one")]
    InvalidReferenceBus { count: usize },

    #[error("{count} slack buses configured but distributed slack is not enabled")]
    MultipleSlackBuses { count: usize },

    #[error("branch '{branch}' has both voltage and phase control")]
    VoltageAndPhaseControl { branch: String },

    #[error("branch '{branch}' has both voltage and reactive power control")]
    VoltageAndReactivePowerControl { branch: String },

    #[error("phase control on branch '{branch}' in current unit is not supported")]
    UnsupportedPhaseControlUnit { branch: String },

    #[error("bus '{bus}' controls both voltage and reactive power")]
    VoltageAndReactivePowerBusControl { bus: String },

    #[error("branch '{branch}' is the target of more than one {what} control")]
    DuplicateBranchTarget { branch: String, what: &'static str },

    #[error("{element} '{name}' controls more than one {what} control")]
    DuplicateController {
        element: &'static str,
        name: String,
        what: &'static str,
    },

    #[error("zero impedance branch '{branch}' cannot be a controller")]
    ZeroImpedanceController { branch: String },

    #[error("{element} '{name}' cannot act as controller: {reason}")]
    InvalidController {
        element: &'static str,
        name: String,
        reason: &'static str,
    },

    #[error(transparent)]
    Network(#[from] NetworkError),
}
