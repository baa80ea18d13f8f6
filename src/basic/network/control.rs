use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::elements::Side;

/// Kind of element regulating a bus voltage. Declaration order is priority order.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VoltageControlKind {
    Generator,
    Transformer,
    Shunt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MergeStatus {
    Main,
    /// Absorbed by another control through a zero impedance path.
    Hidden,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoltageControl {
    pub kind: VoltageControlKind,
    pub controlled_bus: usize,
    /// Bus, branch or shunt numbers depending on `kind`.
    pub controllers: Vec<usize>,
    pub target_v: f64,
    pub merge_status: MergeStatus,
    /// Hidden controls whose controllers are regulated by this one.
    pub merged: Vec<usize>,
}

impl VoltageControl {
    pub fn new(
        kind: VoltageControlKind,
        controlled_bus: usize,
        controllers: Vec<usize>,
        target_v: f64,
    ) -> Self {
        Self {
            kind,
            controlled_bus,
            controllers,
            target_v,
            merge_status: MergeStatus::Main,
            merged: Vec::new(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.kind == VoltageControlKind::Generator
            && self.merged.is_empty()
            && self.controllers == [self.controlled_bus]
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseControlMode {
    Controller,
    Limiter,
    Off,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseControlUnit {
    ActivePower,
    Current,
}

/// Phase shifter regulating the active flow of a branch side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseControl {
    pub controller_branch: usize,
    pub controlled_branch: usize,
    pub controlled_side: Side,
    pub mode: PhaseControlMode,
    pub unit: PhaseControlUnit,
    pub target_value: f64,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactivePowerControlKind {
    Generator,
    Transformer,
}

/// Regulation of the reactive flow at one side of a branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactivePowerControl {
    pub kind: ReactivePowerControlKind,
    pub controlled_branch: usize,
    pub controlled_side: Side,
    /// Bus numbers for generators, branch numbers for transformers.
    pub controllers: Vec<usize>,
    pub target_q: f64,
}

/// A controller element with the control family it takes part in.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerRef {
    #[display("generator voltage control of bus {_0}")]
    GeneratorVoltage(usize),
    #[display("transformer voltage control of branch {_0}")]
    TransformerVoltage(usize),
    #[display("shunt voltage control of shunt {_0}")]
    ShuntVoltage(usize),
    #[display("generator reactive power control of bus {_0}")]
    GeneratorReactivePower(usize),
    #[display("transformer reactive power control of branch {_0}")]
    TransformerReactivePower(usize),
    #[display("phase control of branch {_0}")]
    PhaseShifter(usize),
}
