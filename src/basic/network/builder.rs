use serde::{Deserialize, Serialize};
use tracing::warn;

use super::*;
use crate::basic::error::NetworkError;

/// Serializable description of a network, validated into a [`Network`] by
/// [`NetworkBuilder::build`].
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkBuilder {
    pub parameters: NetworkParameters,
    pub buses: Vec<Bus>,
    pub branches: Vec<Branch>,
    pub shunts: Vec<Shunt>,
    pub hvdcs: Vec<Hvdc>,
    pub voltage_controls: Vec<VoltageControl>,
    pub phase_controls: Vec<PhaseControl>,
    pub reactive_power_controls: Vec<ReactivePowerControl>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn add_bus(&mut self, name: impl Into<String>) -> &mut Bus {
        let num = self.buses.len();
        self.buses.push(Bus::new(num, name));
        &mut self.buses[num]
    }

    pub fn add_branch(
        &mut self,
        name: impl Into<String>,
        bus1: usize,
        bus2: usize,
        pi: PiModel,
    ) -> &mut Branch {
        let num = self.branches.len();
        self.branches.push(Branch::new(num, name, bus1, bus2, pi));
        &mut self.branches[num]
    }

    pub fn add_shunt(&mut self, name: impl Into<String>, bus: usize, g: f64, b: f64) -> &mut Shunt {
        let num = self.shunts.len();
        self.shunts.push(Shunt::new(num, name, bus, g, b));
        &mut self.shunts[num]
    }

    pub fn add_hvdc(
        &mut self,
        name: impl Into<String>,
        bus1: usize,
        bus2: usize,
        p0: f64,
        k: f64,
    ) -> &mut Hvdc {
        let num = self.hvdcs.len();
        self.hvdcs.push(Hvdc::new(num, name, bus1, bus2, p0, k));
        &mut self.hvdcs[num]
    }

    pub fn add_voltage_control(&mut self, control: VoltageControl) -> usize {
        self.voltage_controls.push(control);
        self.voltage_controls.len() - 1
    }

    pub fn add_phase_control(&mut self, control: PhaseControl) -> usize {
        self.phase_controls.push(control);
        self.phase_controls.len() - 1
    }

    pub fn add_reactive_power_control(&mut self, control: ReactivePowerControl) -> usize {
        self.reactive_power_controls.push(control);
        self.reactive_power_controls.len() - 1
    }

    /// Checks every cross reference and computes the derived topology.
    pub fn build(mut self) -> Result<Network, NetworkError> {
        if self.buses.is_empty() {
            return Err(NetworkError::Empty);
        }
        for (i, bus) in self.buses.iter_mut().enumerate() {
            bus.num = i;
        }
        let nb = self.buses.len();
        let check_bus = |element: &'static str, name: &str, bus: usize| {
            if bus < nb {
                Ok(())
            } else {
                Err(NetworkError::UnknownBus {
                    element,
                    name: name.to_owned(),
                    bus,
                })
            }
        };
        for (i, br) in self.branches.iter_mut().enumerate() {
            br.num = i;
            for bus in [br.bus1, br.bus2].into_iter().flatten() {
                check_bus("branch", &br.name, bus)?;
            }
        }
        for (i, sh) in self.shunts.iter_mut().enumerate() {
            sh.num = i;
            check_bus("shunt", &sh.name, sh.bus)?;
        }
        for (i, h) in self.hvdcs.iter_mut().enumerate() {
            h.num = i;
            check_bus("hvdc", &h.name, h.bus1)?;
            check_bus("hvdc", &h.name, h.bus2)?;
        }

        let check = |control: &'static str, element: &'static str, num: usize, len: usize| {
            if num < len {
                Ok(())
            } else {
                Err(NetworkError::UnknownElement { control, element, num })
            }
        };
        let (nbr, ns, nvc) = (self.branches.len(), self.shunts.len(), self.voltage_controls.len());
        for vc in &self.voltage_controls {
            check("voltage", "bus", vc.controlled_bus, nb)?;
            let (element, len) = match vc.kind {
                VoltageControlKind::Generator => ("bus", nb),
                VoltageControlKind::Transformer => ("branch", nbr),
                VoltageControlKind::Shunt => ("shunt", ns),
            };
            for &c in &vc.controllers {
                check("voltage", element, c, len)?;
            }
            for &m in &vc.merged {
                check("voltage", "voltage control", m, nvc)?;
            }
        }
        for pc in &self.phase_controls {
            check("phase", "branch", pc.controller_branch, nbr)?;
            check("phase", "branch", pc.controlled_branch, nbr)?;
        }
        for rpc in &self.reactive_power_controls {
            check("reactive power", "branch", rpc.controlled_branch, nbr)?;
            let (element, len) = match rpc.kind {
                ReactivePowerControlKind::Generator => ("bus", nb),
                ReactivePowerControlKind::Transformer => ("branch", nbr),
            };
            for &c in &rpc.controllers {
                check("reactive power", element, c, len)?;
            }
        }

        if !self.buses.iter().any(|b| b.reference) {
            if let Some(slack) = self.buses.iter_mut().find(|b| b.slack) {
                warn!(bus = %slack.name, "no reference bus, using the first slack bus");
                slack.reference = true;
            }
        }

        Ok(Network::from_parts(
            self.parameters,
            self.buses,
            self.branches,
            self.shunts,
            self.hvdcs,
            self.voltage_controls,
            self.phase_controls,
            self.reactive_power_controls,
        ))
    }
}
