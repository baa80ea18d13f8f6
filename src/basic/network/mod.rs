//! In-memory network model queried by the equation system creator and updater.
//!
//! The model only stores what the equation engine needs: electrical parameters,
//! connectivity, control relations, and the derived topology state (isolated
//! buses and the zero impedance spanning forest).
pub mod builder;
pub mod control;
pub mod elements;
pub mod events;
pub mod zero_impedance;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub use builder::NetworkBuilder;
pub use control::*;
pub use elements::*;
pub use events::{NetworkEvent, NetworkListener};

/// Per unit impedance below which a branch is treated as a zero impedance link.
pub const LOW_IMPEDANCE_THRESHOLD_DEFAULT: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkParameters {
    pub low_impedance_threshold: f64,
}

impl Default for NetworkParameters {
    fn default() -> Self {
        Self {
            low_impedance_threshold: LOW_IMPEDANCE_THRESHOLD_DEFAULT,
        }
    }
}

/// Lookup tables from elements to the control relations they take part in.
#[derive(Debug, Default, Clone)]
pub(crate) struct ControlIndex {
    pub(crate) branches_of_bus: Vec<Vec<usize>>,
    pub(crate) shunts_of_bus: Vec<Vec<usize>>,
    pub(crate) hvdcs_of_bus: Vec<Vec<usize>>,
    /// Voltage controls by controlled bus.
    pub(crate) voltage_controls_of_bus: Vec<Vec<usize>>,
    /// Main voltage control regulated by a controller, per family.
    pub(crate) generator_vc_of_bus: Vec<Option<usize>>,
    pub(crate) transformer_vc_of_branch: Vec<Option<usize>>,
    pub(crate) shunt_vc_of_shunt: Vec<Option<usize>>,
    pub(crate) generator_rpc_of_bus: Vec<Option<usize>>,
    pub(crate) transformer_rpc_of_branch: Vec<Option<usize>>,
    pub(crate) rpc_of_controlled_branch: Vec<Vec<usize>>,
    pub(crate) phase_control_of_controller: Vec<Option<usize>>,
    pub(crate) phase_controls_of_controlled: Vec<Vec<usize>>,
}

#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) parameters: NetworkParameters,
    pub(crate) buses: Vec<Bus>,
    pub(crate) branches: Vec<Branch>,
    pub(crate) shunts: Vec<Shunt>,
    pub(crate) hvdcs: Vec<Hvdc>,
    pub(crate) voltage_controls: Vec<VoltageControl>,
    pub(crate) phase_controls: Vec<PhaseControl>,
    pub(crate) reactive_power_controls: Vec<ReactivePowerControl>,
    pub(crate) index: ControlIndex,
    isolated: Vec<bool>,
    spanning: Vec<bool>,
}

impl Network {
    pub(crate) fn from_parts(
        parameters: NetworkParameters,
        buses: Vec<Bus>,
        branches: Vec<Branch>,
        shunts: Vec<Shunt>,
        hvdcs: Vec<Hvdc>,
        voltage_controls: Vec<VoltageControl>,
        phase_controls: Vec<PhaseControl>,
        reactive_power_controls: Vec<ReactivePowerControl>,
    ) -> Self {
        let mut network = Network {
            parameters,
            isolated: vec![false; buses.len()],
            spanning: vec![false; branches.len()],
            buses,
            branches,
            shunts,
            hvdcs,
            voltage_controls,
            phase_controls,
            reactive_power_controls,
            index: ControlIndex::default(),
        };
        network.rebuild_index();
        network.update_topology();
        network
    }

    pub fn parameters(&self) -> &NetworkParameters {
        &self.parameters
    }
    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }
    pub fn shunts(&self) -> &[Shunt] {
        &self.shunts
    }
    pub fn hvdcs(&self) -> &[Hvdc] {
        &self.hvdcs
    }
    pub fn voltage_controls(&self) -> &[VoltageControl] {
        &self.voltage_controls
    }
    pub fn phase_controls(&self) -> &[PhaseControl] {
        &self.phase_controls
    }
    pub fn reactive_power_controls(&self) -> &[ReactivePowerControl] {
        &self.reactive_power_controls
    }
    pub fn bus(&self, num: usize) -> &Bus {
        &self.buses[num]
    }
    pub fn branch(&self, num: usize) -> &Branch {
        &self.branches[num]
    }
    pub fn shunt(&self, num: usize) -> &Shunt {
        &self.shunts[num]
    }
    pub fn hvdc(&self, num: usize) -> &Hvdc {
        &self.hvdcs[num]
    }

    pub fn branches_of_bus(&self, bus: usize) -> &[usize] {
        &self.index.branches_of_bus[bus]
    }
    pub fn shunts_of_bus(&self, bus: usize) -> &[usize] {
        &self.index.shunts_of_bus[bus]
    }
    pub fn hvdcs_of_bus(&self, bus: usize) -> &[usize] {
        &self.index.hvdcs_of_bus[bus]
    }

    /// Slack buses in bus order; the first one is the primary slack.
    pub fn slack_buses(&self) -> Vec<usize> {
        self.buses.iter().filter(|b| b.slack).map(|b| b.num).collect()
    }

    pub fn reference_bus(&self) -> Option<usize> {
        self.buses.iter().find(|b| b.reference).map(|b| b.num)
    }

    /// User disabled or cut from the reference bus.
    pub fn is_bus_disabled(&self, bus: usize) -> bool {
        self.buses[bus].disabled || self.isolated[bus]
    }

    pub fn is_bus_isolated(&self, bus: usize) -> bool {
        self.isolated[bus]
    }

    /// Breaker closed and bus present and energized on that side.
    pub fn is_side_connected(&self, branch: usize, side: Side) -> bool {
        let b = &self.branches[branch];
        b.connected[side.idx()] && b.bus(side).is_some_and(|bus| !self.is_bus_disabled(bus))
    }

    /// Energized on both sides.
    pub fn is_branch_in_operation(&self, branch: usize) -> bool {
        !self.branches[branch].disabled
            && self.is_side_connected(branch, Side::One)
            && self.is_side_connected(branch, Side::Two)
    }

    pub fn is_zero_impedance(&self, branch: usize) -> bool {
        self.branches[branch].is_zero_impedance(self.parameters.low_impedance_threshold)
    }

    pub fn is_spanning_tree_edge(&self, branch: usize) -> bool {
        self.spanning[branch]
    }

    pub fn is_shunt_disabled(&self, shunt: usize) -> bool {
        let s = &self.shunts[shunt];
        s.disabled || self.is_bus_disabled(s.bus)
    }

    pub fn is_hvdc_emulating(&self, hvdc: usize) -> bool {
        let h = &self.hvdcs[hvdc];
        h.ac_emulation
            && !h.disabled
            && !self.is_bus_disabled(h.bus1)
            && !self.is_bus_disabled(h.bus2)
    }

    /// Voltage controls regulating `bus`, in priority order.
    pub fn voltage_controls_of_bus(&self, bus: usize) -> &[usize] {
        &self.index.voltage_controls_of_bus[bus]
    }

    /// Controllers of a control including those of the hidden controls merged into it.
    pub fn merged_controllers(&self, control: usize) -> Vec<usize> {
        let vc = &self.voltage_controls[control];
        let mut controllers = vc.controllers.clone();
        for &hidden in &vc.merged {
            for &c in &self.voltage_controls[hidden].controllers {
                if !controllers.contains(&c) {
                    controllers.push(c);
                }
            }
        }
        controllers
    }

    pub fn generator_voltage_control_of(&self, bus: usize) -> Option<usize> {
        self.index.generator_vc_of_bus[bus]
    }
    pub fn transformer_voltage_control_of(&self, branch: usize) -> Option<usize> {
        self.index.transformer_vc_of_branch[branch]
    }
    pub fn shunt_voltage_control_of(&self, shunt: usize) -> Option<usize> {
        self.index.shunt_vc_of_shunt[shunt]
    }
    pub fn generator_reactive_power_control_of(&self, bus: usize) -> Option<usize> {
        self.index.generator_rpc_of_bus[bus]
    }
    pub fn transformer_reactive_power_control_of(&self, branch: usize) -> Option<usize> {
        self.index.transformer_rpc_of_branch[branch]
    }
    pub fn reactive_power_controls_of_controlled(&self, branch: usize) -> &[usize] {
        &self.index.rpc_of_controlled_branch[branch]
    }
    pub fn phase_control_of(&self, branch: usize) -> Option<usize> {
        self.index.phase_control_of_controller[branch]
    }
    pub fn phase_controls_of_controlled(&self, branch: usize) -> &[usize] {
        &self.index.phase_controls_of_controlled[branch]
    }

    /// Branch whose side-1 alpha is an unknown.
    pub fn is_phase_controller(&self, branch: usize) -> bool {
        self.phase_control_of(branch).is_some()
    }

    /// Listed as controller of a voltage control of `kind`, main or hidden.
    pub fn is_voltage_controller(&self, kind: VoltageControlKind, num: usize) -> bool {
        self.voltage_controls
            .iter()
            .any(|vc| vc.kind == kind && vc.controllers.contains(&num))
    }

    /// Branch whose side-1 ratio is an unknown. Merging never changes the answer.
    pub fn is_ratio_controller(&self, branch: usize) -> bool {
        self.is_voltage_controller(VoltageControlKind::Transformer, branch)
            || self.transformer_reactive_power_control_of(branch).is_some()
    }

    /// Shunt whose susceptance is an unknown.
    pub fn is_susceptance_controller(&self, shunt: usize) -> bool {
        self.is_voltage_controller(VoltageControlKind::Shunt, shunt)
    }

    pub(crate) fn rebuild_index(&mut self) {
        let (nb, nbr, ns) = (self.buses.len(), self.branches.len(), self.shunts.len());
        let mut index = ControlIndex {
            branches_of_bus: vec![Vec::new(); nb],
            shunts_of_bus: vec![Vec::new(); nb],
            hvdcs_of_bus: vec![Vec::new(); nb],
            voltage_controls_of_bus: vec![Vec::new(); nb],
            generator_vc_of_bus: vec![None; nb],
            transformer_vc_of_branch: vec![None; nbr],
            shunt_vc_of_shunt: vec![None; ns],
            generator_rpc_of_bus: vec![None; nb],
            transformer_rpc_of_branch: vec![None; nbr],
            rpc_of_controlled_branch: vec![Vec::new(); nbr],
            phase_control_of_controller: vec![None; nbr],
            phase_controls_of_controlled: vec![Vec::new(); nbr],
        };
        for branch in &self.branches {
            for bus in [branch.bus1, branch.bus2].into_iter().flatten() {
                index.branches_of_bus[bus].push(branch.num);
            }
        }
        for shunt in &self.shunts {
            index.shunts_of_bus[shunt.bus].push(shunt.num);
        }
        for hvdc in &self.hvdcs {
            index.hvdcs_of_bus[hvdc.bus1].push(hvdc.num);
            index.hvdcs_of_bus[hvdc.bus2].push(hvdc.num);
        }

        let mut vcs: Vec<usize> = (0..self.voltage_controls.len()).collect();
        vcs.sort_by_key(|&i| self.voltage_controls[i].kind);
        for i in vcs {
            let vc = &self.voltage_controls[i];
            index.voltage_controls_of_bus[vc.controlled_bus].push(i);
            if vc.merge_status == MergeStatus::Hidden {
                continue;
            }
            for c in self.merged_controllers(i) {
                let slot = match vc.kind {
                    VoltageControlKind::Generator => &mut index.generator_vc_of_bus[c],
                    VoltageControlKind::Transformer => &mut index.transformer_vc_of_branch[c],
                    VoltageControlKind::Shunt => &mut index.shunt_vc_of_shunt[c],
                };
                slot.get_or_insert(i);
            }
        }
        for (i, rpc) in self.reactive_power_controls.iter().enumerate() {
            index.rpc_of_controlled_branch[rpc.controlled_branch].push(i);
            for &c in &rpc.controllers {
                let slot = match rpc.kind {
                    ReactivePowerControlKind::Generator => &mut index.generator_rpc_of_bus[c],
                    ReactivePowerControlKind::Transformer => {
                        &mut index.transformer_rpc_of_branch[c]
                    }
                };
                slot.get_or_insert(i);
            }
        }
        for (i, pc) in self.phase_controls.iter().enumerate() {
            index.phase_control_of_controller[pc.controller_branch].get_or_insert(i);
            index.phase_controls_of_controlled[pc.controlled_branch].push(i);
        }
        self.index = index;
    }

    /// Recomputes isolated buses and the zero impedance spanning forest.
    ///
    /// Returns the buses whose isolation changed.
    pub(crate) fn update_topology(&mut self) -> Vec<usize> {
        let isolated = self.find_isolated_buses();
        let changed: Vec<usize> = (0..self.buses.len())
            .filter(|&b| isolated[b] != self.isolated[b])
            .collect();
        self.isolated = isolated;

        let edges: Vec<(usize, usize, usize)> = self
            .branches
            .iter()
            .filter(|br| self.is_zero_impedance(br.num) && self.is_branch_in_operation(br.num))
            .filter_map(|br| Some((br.num, br.bus1?, br.bus2?)))
            .collect();
        self.spanning =
            zero_impedance::spanning_forest(self.buses.len(), self.branches.len(), edges);
        changed
    }

    fn find_isolated_buses(&self) -> Vec<bool> {
        let mut isolated = vec![true; self.buses.len()];
        let Some(reference) = self.reference_bus() else {
            return isolated;
        };
        if self.buses[reference].disabled {
            return isolated;
        }
        let mut queue = VecDeque::from([reference]);
        isolated[reference] = false;
        while let Some(bus) = queue.pop_front() {
            for &br in &self.index.branches_of_bus[bus] {
                let branch = &self.branches[br];
                if branch.disabled || !branch.connected[0] || !branch.connected[1] {
                    continue;
                }
                let (Some(b1), Some(b2)) = (branch.bus1, branch.bus2) else {
                    continue;
                };
                let other = if b1 == bus { b2 } else { b1 };
                if isolated[other] && !self.buses[other].disabled {
                    isolated[other] = false;
                    queue.push_back(other);
                }
            }
        }
        isolated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases;

    #[test]
    fn test_isolation_follows_breakers() {
        let mut net = testcases::two_bus();
        assert!(!net.is_bus_disabled(1));
        net.apply(&NetworkEvent::BranchSideConnectivityChanged {
            branch: 0,
            side: Side::Two,
            connected: false,
        })
        .unwrap();
        assert!(net.is_bus_isolated(1));
        assert!(net.is_side_connected(0, Side::One));
        assert!(!net.is_side_connected(0, Side::Two));
        assert!(!net.is_branch_in_operation(0));
    }

    #[test]
    fn test_merged_controllers_keep_order() {
        let net = testcases::shared_generator_voltage_control(3);
        let vc = net.generator_voltage_control_of(1).unwrap();
        assert_eq!(net.merged_controllers(vc), vec![1, 2, 3]);
        assert_eq!(net.voltage_controls_of_bus(0), &[vc]);
    }
}
