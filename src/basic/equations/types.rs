use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

/// Kind of network element an equation or a variable belongs to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Bus,
    Branch,
    Shunt,
    Hvdc,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VariableType {
    #[display("BUS_V")]
    BusV,
    #[display("BUS_PHI")]
    BusPhi,
    #[display("SHUNT_B")]
    ShuntB,
    #[display("BRANCH_ALPHA1")]
    BranchAlpha1,
    #[display("BRANCH_RHO1")]
    BranchRho1,
    #[display("DUMMY_P")]
    DummyP,
    #[display("DUMMY_Q")]
    DummyQ,
}

impl VariableType {
    pub const COUNT: usize = 7;
    pub const ALL: [VariableType; Self::COUNT] = [
        VariableType::BusV,
        VariableType::BusPhi,
        VariableType::ShuntB,
        VariableType::BranchAlpha1,
        VariableType::BranchRho1,
        VariableType::DummyP,
        VariableType::DummyQ,
    ];

    pub fn element_type(self) -> ElementType {
        match self {
            VariableType::BusV | VariableType::BusPhi => ElementType::Bus,
            VariableType::ShuntB => ElementType::Shunt,
            VariableType::BranchAlpha1
            | VariableType::BranchRho1
            | VariableType::DummyP
            | VariableType::DummyQ => ElementType::Branch,
        }
    }

    pub(crate) fn idx(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EquationType {
    #[display("BUS_TARGET_P")]
    BusTargetP,
    #[display("BUS_TARGET_Q")]
    BusTargetQ,
    #[display("BUS_TARGET_V")]
    BusTargetV,
    #[display("BUS_TARGET_PHI")]
    BusTargetPhi,
    /// Slack active power sharing between several slack buses.
    #[display("BUS_DISTR_SLACK_P")]
    BusDistrSlackP,
    #[display("SHUNT_TARGET_B")]
    ShuntTargetB,
    #[display("BRANCH_TARGET_P")]
    BranchTargetP,
    #[display("BRANCH_TARGET_Q")]
    BranchTargetQ,
    #[display("BRANCH_TARGET_ALPHA1")]
    BranchTargetAlpha1,
    #[display("BRANCH_TARGET_RHO1")]
    BranchTargetRho1,
    #[display("DISTR_Q")]
    DistrQ,
    #[display("DISTR_RHO")]
    DistrRho,
    #[display("DISTR_SHUNT_B")]
    DistrShuntB,
    #[display("ZERO_V")]
    ZeroV,
    #[display("ZERO_PHI")]
    ZeroPhi,
    #[display("DUMMY_TARGET_P")]
    DummyTargetP,
    #[display("DUMMY_TARGET_Q")]
    DummyTargetQ,
}

impl EquationType {
    pub const COUNT: usize = 17;

    pub fn element_type(self) -> ElementType {
        use EquationType::*;
        match self {
            BusTargetP | BusTargetQ | BusTargetV | BusTargetPhi | BusDistrSlackP | DistrQ => {
                ElementType::Bus
            }
            ShuntTargetB | DistrShuntB => ElementType::Shunt,
            BranchTargetP | BranchTargetQ | BranchTargetAlpha1 | BranchTargetRho1 | DistrRho
            | ZeroV | ZeroPhi | DummyTargetP | DummyTargetQ => ElementType::Branch,
        }
    }

    pub(crate) fn idx(self) -> usize {
        self as usize
    }
}

/// Dense index of a variable, also its position in the state vector.
#[derive(
    Debug,
    Display,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deref,
    From,
    Serialize,
    Deserialize,
)]
pub struct VariableId(pub usize);

#[derive(
    Debug,
    Display,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deref,
    From,
    Serialize,
    Deserialize,
)]
pub struct EquationId(pub usize);

#[derive(
    Debug,
    Display,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deref,
    From,
    Serialize,
    Deserialize,
)]
pub struct TermId(pub usize);
