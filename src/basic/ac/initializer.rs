//! Starting point of a Newton iteration over an equation system.
use nalgebra::DVector;

use crate::basic::equations::{EquationSystem, VariableType};
use crate::basic::network::Network;

/// Source of the initial bus voltages.
pub trait VoltageInitializer {
    fn magnitude(&self, network: &Network, bus: usize) -> f64;
    fn angle(&self, network: &Network, bus: usize) -> f64;
}

/// Flat start, every bus at the same magnitude and angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformValueVoltageInitializer {
    pub v: f64,
    pub angle: f64,
}

impl Default for UniformValueVoltageInitializer {
    fn default() -> Self {
        Self { v: 1.0, angle: 0.0 }
    }
}

impl VoltageInitializer for UniformValueVoltageInitializer {
    fn magnitude(&self, _network: &Network, _bus: usize) -> f64 {
        self.v
    }
    fn angle(&self, _network: &Network, _bus: usize) -> f64 {
        self.angle
    }
}

/// Warm start from the values stored on the buses.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviousValueVoltageInitializer;

impl VoltageInitializer for PreviousValueVoltageInitializer {
    fn magnitude(&self, network: &Network, bus: usize) -> f64 {
        network.bus(bus).initial_v
    }
    fn angle(&self, network: &Network, bus: usize) -> f64 {
        network.bus(bus).initial_angle
    }
}

/// State vector indexed by variable id. Control variables start at their
/// network values and pass-through flows at zero.
pub fn initial_state(
    sys: &EquationSystem,
    network: &Network,
    init: &impl VoltageInitializer,
) -> DVector<f64> {
    DVector::from_iterator(
        sys.variable_count(),
        sys.variables().iter().map(|var| {
            let num = var.element_num;
            match var.ty {
                VariableType::BusV => init.magnitude(network, num),
                VariableType::BusPhi => init.angle(network, num),
                VariableType::BranchAlpha1 => network.branch(num).pi.a1,
                VariableType::BranchRho1 => network.branch(num).pi.r1,
                VariableType::ShuntB => network.shunt(num).b,
                VariableType::DummyP | VariableType::DummyQ => 0.0,
            }
        }),
    )
}
