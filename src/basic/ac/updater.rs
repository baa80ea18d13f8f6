//! Keeps the activity of equations and terms in line with the network state.
//!
//! Each refresh below recomputes the flags it owns from the network alone, so
//! applying it twice, or in any order with the others, gives the same
//! system. An event only selects which refreshes to run. The zero impedance
//! refresh reads the activity of bus equations and always runs last.
use tracing::{debug, trace};

use super::distribution::{Contribution, ControllerState, SharedControl};
use crate::basic::equations::{
    BranchVariant, DistributionLayout, ElementType, EquationSystem, EquationTerm, EquationType,
    TermOrigin, VariableType,
};
use crate::basic::network::*;

/// Whether a term with the given origin contributes in the current network state.
pub(crate) fn is_term_active(network: &Network, origin: TermOrigin) -> bool {
    match origin {
        TermOrigin::Fixed => true,
        TermOrigin::Branch { num, side, variant } => {
            let connected = network.is_side_connected(num, side);
            let other_connected = network.is_side_connected(num, side.other());
            !network.branch(num).disabled
                && connected
                && match variant {
                    BranchVariant::Closed => other_connected,
                    BranchVariant::Open => !other_connected,
                }
        }
        TermOrigin::Shunt(num) => !network.is_shunt_disabled(num),
        TermOrigin::Hvdc(num) => network.is_hvdc_emulating(num),
        TermOrigin::Load(num) => !network.is_bus_disabled(num),
    }
}

/// Droop of a bus whose only voltage control is its own generator.
pub(crate) fn generator_slope(network: &Network, bus: usize) -> Option<f64> {
    match network.voltage_controls_of_bus(bus) {
        [vc] if network.voltage_controls()[*vc].is_local() => {
            network.bus(bus).generator_slope.filter(|&s| s != 0.0)
        }
        _ => None,
    }
}

/// Owner of an AC equation system, updated from network notifications.
#[derive(Debug, Clone)]
pub struct AcEquationSystemUpdater {
    system: EquationSystem,
}

impl AcEquationSystemUpdater {
    pub fn new(system: EquationSystem) -> Self {
        Self { system }
    }

    pub fn system(&self) -> &EquationSystem {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut EquationSystem {
        &mut self.system
    }

    pub fn into_system(self) -> EquationSystem {
        self.system
    }

    /// Recomputes every flag from scratch.
    pub fn refresh_all(&mut self, network: &Network) {
        for bus in 0..network.buses().len() {
            self.refresh_bus(network, bus);
            self.refresh_terms(network, ElementType::Bus, bus);
            self.refresh_voltage_controls(network, bus);
        }
        for branch in 0..network.branches().len() {
            self.refresh_terms(network, ElementType::Branch, branch);
        }
        for shunt in 0..network.shunts().len() {
            self.refresh_terms(network, ElementType::Shunt, shunt);
        }
        for hvdc in 0..network.hvdcs().len() {
            self.refresh_terms(network, ElementType::Hvdc, hvdc);
        }
        self.refresh_unowned_controllers(network);
        for control in 0..network.reactive_power_controls().len() {
            self.refresh_reactive_power_control(network, control);
        }
        for control in 0..network.phase_controls().len() {
            self.refresh_phase_control(network, control);
        }
        self.refresh_slack_distribution(network);
        self.refresh_zero_impedance(network);
        debug!(
            equations = self.system.active_equations().count(),
            variables = self.system.active_variables().len(),
            "equation system refreshed"
        );
    }

    fn refresh_bus(&mut self, network: &Network, bus: usize) {
        let disabled = network.is_bus_disabled(bus);
        let sys = &mut self.system;
        let p = sys.expect_equation(bus, EquationType::BusTargetP);
        sys.set_active(p, !disabled && !network.bus(bus).slack);
        let controller = network.generator_voltage_control_of(bus).is_some()
            || network.generator_reactive_power_control_of(bus).is_some();
        if !controller {
            let q = sys.expect_equation(bus, EquationType::BusTargetQ);
            sys.set_active(q, !disabled);
            // left over from a group the bus no longer belongs to
            if let Some(distr) = sys.equation_id(bus, EquationType::DistrQ) {
                sys.set_active(distr, false);
            }
        }
        if let Some(phi) = sys.equation_id(bus, EquationType::BusTargetPhi) {
            sys.set_active(phi, !disabled);
        }
    }

    fn refresh_terms(&mut self, network: &Network, element_type: ElementType, num: usize) {
        let ids = self.system.terms_of_element(element_type, num).to_vec();
        for id in ids {
            let active = is_term_active(network, self.system.term(id).origin);
            if self.system.set_term_active(id, active) {
                trace!(term = *id, active, "term toggled");
            }
        }
    }

    /// Voltage controls of a controlled bus. At most one of them, the visible
    /// one, drives the bus voltage equation.
    fn refresh_voltage_controls(&mut self, network: &Network, bus: usize) {
        let controls = network.voltage_controls_of_bus(bus);
        if controls.is_empty() {
            return;
        }
        let shared: Vec<(usize, SharedControl)> = controls
            .iter()
            .filter(|&&vc| network.voltage_controls()[vc].merge_status == MergeStatus::Main)
            .map(|&vc| (vc, voltage_shared_control(network, vc)))
            .collect();
        let visible = shared
            .iter()
            .find(|(_, s)| s.controllers.iter().any(|c| c.active))
            .or(shared.first())
            .map(|(vc, _)| *vc);

        let v = self.system.expect_equation(bus, EquationType::BusTargetV);
        match visible {
            Some(vc) => {
                let droop = generator_slope(network, bus)
                    .map_or(0.0, |slope| slope * network.bus(bus).target_q());
                self.system
                    .set_rhs(v, Some(network.voltage_controls()[vc].target_v + droop));
            }
            None => {
                self.system.set_active(v, false);
            }
        }
        let bus_enabled = !network.is_bus_disabled(bus);
        for (vc, mut control) in shared {
            if Some(vc) == visible {
                control.target = Some(v);
                control.on = bus_enabled && control.controllers.iter().any(|c| c.active);
            }
            control.apply(&mut self.system, network);
        }
    }

    /// Controllers of hidden controls that no main control took over keep
    /// their value. Generator buses are handled by [`Self::refresh_bus`].
    fn refresh_unowned_controllers(&mut self, network: &Network) {
        let hidden = network
            .voltage_controls()
            .iter()
            .filter(|vc| vc.merge_status == MergeStatus::Hidden);
        for vc in hidden {
            for &c in &vc.controllers {
                let (hold, distribution) = match vc.kind {
                    VoltageControlKind::Transformer
                        if network.transformer_voltage_control_of(c).is_none()
                            && network.transformer_reactive_power_control_of(c).is_none() =>
                    {
                        (EquationType::BranchTargetRho1, EquationType::DistrRho)
                    }
                    VoltageControlKind::Shunt if network.shunt_voltage_control_of(c).is_none() => {
                        (EquationType::ShuntTargetB, EquationType::DistrShuntB)
                    }
                    _ => continue,
                };
                if let Some(eq) = self.system.equation_id(c, hold) {
                    self.system.set_active(eq, true);
                }
                if let Some(eq) = self.system.equation_id(c, distribution) {
                    self.system.set_active(eq, false);
                }
            }
        }
    }

    fn refresh_reactive_power_control(&mut self, network: &Network, control: usize) {
        let rpc = &network.reactive_power_controls()[control];
        let controllers: Vec<ControllerState> = rpc
            .controllers
            .iter()
            .map(|&c| match rpc.kind {
                ReactivePowerControlKind::Generator => generator_state(
                    network,
                    c,
                    network.bus(c).generator_reactive_power_control_enabled,
                ),
                ReactivePowerControlKind::Transformer => {
                    transformer_state(network, c, network.branch(c).reactive_power_control_enabled)
                }
            })
            .collect();
        let (hold, distribution, contribution) = match rpc.kind {
            ReactivePowerControlKind::Generator => generator_equations(),
            ReactivePowerControlKind::Transformer => transformer_equations(),
        };
        let target = self
            .system
            .expect_equation(rpc.controlled_branch, EquationType::BranchTargetQ);
        let on = network.is_branch_in_operation(rpc.controlled_branch)
            && controllers.iter().any(|c| c.active);
        SharedControl {
            target: Some(target),
            on,
            controllers,
            hold,
            distribution,
            contribution,
        }
        .apply(&mut self.system, network);
    }

    fn refresh_phase_control(&mut self, network: &Network, control: usize) {
        let pc = &network.phase_controls()[control];
        let controlling = pc.mode == PhaseControlMode::Controller
            && pc.unit == PhaseControlUnit::ActivePower
            && network.branch(pc.controller_branch).phase_control_enabled
            && network.is_branch_in_operation(pc.controller_branch)
            && network.is_branch_in_operation(pc.controlled_branch);
        let sys = &mut self.system;
        if let Some(target) = sys.equation_id(pc.controlled_branch, EquationType::BranchTargetP) {
            sys.set_active(target, controlling);
        }
        let hold = sys.expect_equation(pc.controller_branch, EquationType::BranchTargetAlpha1);
        sys.set_active(hold, !controlling);
    }

    /// Non primary slack buses share the active power mismatch with the
    /// primary one, the first enabled slack bus.
    fn refresh_slack_distribution(&mut self, network: &Network) {
        let slacks = network.slack_buses();
        if slacks.len() < 2 {
            return;
        }
        let primary = slacks.iter().copied().find(|&b| !network.is_bus_disabled(b));
        let layout = DistributionLayout {
            controllers: primary.into_iter().collect(),
            keys: Vec::new(),
        };
        for &bus in &slacks {
            let eq = self.system.expect_equation(bus, EquationType::BusDistrSlackP);
            if self.system.equation(eq).layout() != Some(&layout) {
                let mut terms = Vec::new();
                let mut rhs = 0.0;
                if let Some(primary) = primary.filter(|&p| p != bus) {
                    terms.extend(self.copy_terms(network, primary, EquationType::BusTargetP, 1.0));
                    terms.extend(self.copy_terms(network, bus, EquationType::BusTargetP, -1.0));
                    rhs = network.bus(primary).target_p() - network.bus(bus).target_p();
                }
                self.system.replace_terms(eq, terms);
                self.system.set_rhs(eq, Some(rhs));
                self.system.set_layout(eq, Some(layout.clone()));
            }
            let active = primary.is_some_and(|p| p != bus) && !network.is_bus_disabled(bus);
            self.system.set_active(eq, active);
        }
    }

    fn copy_terms(
        &self,
        network: &Network,
        bus: usize,
        ty: EquationType,
        scale: f64,
    ) -> Vec<EquationTerm> {
        let eq = self.system.expect_equation(bus, ty);
        self.system
            .equation(eq)
            .terms()
            .iter()
            .map(|&t| {
                let mut term = self.system.term(t).clone().scaled(scale);
                term.active = is_term_active(network, term.origin);
                term
            })
            .collect()
    }

    /// Coupling equations hold on spanning tree edges whose pass-through
    /// variable is used by a balance; other edges force it to zero.
    fn refresh_zero_impedance(&mut self, network: &Network) {
        let pairs = [
            (VariableType::DummyP, EquationType::ZeroPhi, EquationType::DummyTargetP),
            (VariableType::DummyQ, EquationType::ZeroV, EquationType::DummyTargetQ),
        ];
        for branch in 0..network.branches().len() {
            let spanning = network.is_spanning_tree_edge(branch);
            for (var, coupling, target) in pairs {
                let (Some(v), Some(coupling), Some(target_eq)) = (
                    self.system.get_variable(branch, var),
                    self.system.equation_id(branch, coupling),
                    self.system.equation_id(branch, target),
                ) else {
                    continue;
                };
                let used = self.system.is_variable_used(v, target);
                self.system.set_active(coupling, spanning && used);
                self.system.set_active(target_eq, !spanning);
            }
        }
    }

    fn refresh_around_branch(&mut self, network: &Network, branch: usize) {
        self.refresh_terms(network, ElementType::Branch, branch);
        if let Some(vc) = network.transformer_voltage_control_of(branch) {
            self.refresh_voltage_controls(network, network.voltage_controls()[vc].controlled_bus);
        }
        let rpcs = network
            .transformer_reactive_power_control_of(branch)
            .into_iter()
            .chain(network.reactive_power_controls_of_controlled(branch).iter().copied());
        for rpc in rpcs.collect::<Vec<_>>() {
            self.refresh_reactive_power_control(network, rpc);
        }
        let pcs = network
            .phase_control_of(branch)
            .into_iter()
            .chain(network.phase_controls_of_controlled(branch).iter().copied());
        for pc in pcs.collect::<Vec<_>>() {
            self.refresh_phase_control(network, pc);
        }
    }

    fn refresh_around_bus(&mut self, network: &Network, bus: usize) {
        self.refresh_bus(network, bus);
        self.refresh_terms(network, ElementType::Bus, bus);
        self.refresh_voltage_controls(network, bus);
        if let Some(vc) = network.generator_voltage_control_of(bus) {
            self.refresh_voltage_controls(network, network.voltage_controls()[vc].controlled_bus);
        }
        if let Some(rpc) = network.generator_reactive_power_control_of(bus) {
            self.refresh_reactive_power_control(network, rpc);
        }
        for &shunt in network.shunts_of_bus(bus) {
            self.refresh_shunt(network, shunt);
        }
        for &hvdc in network.hvdcs_of_bus(bus) {
            self.refresh_terms(network, ElementType::Hvdc, hvdc);
        }
        for &branch in network.branches_of_bus(bus) {
            self.refresh_around_branch(network, branch);
        }
        if network.bus(bus).slack {
            self.refresh_slack_distribution(network);
        }
    }

    fn refresh_shunt(&mut self, network: &Network, shunt: usize) {
        self.refresh_terms(network, ElementType::Shunt, shunt);
        if let Some(vc) = network.shunt_voltage_control_of(shunt) {
            self.refresh_voltage_controls(network, network.voltage_controls()[vc].controlled_bus);
        }
    }

    fn refresh_controller(&mut self, network: &Network, controller: ControllerRef) {
        let voltage_control = match controller {
            ControllerRef::GeneratorVoltage(bus) => network.generator_voltage_control_of(bus),
            ControllerRef::TransformerVoltage(branch) => {
                network.transformer_voltage_control_of(branch)
            }
            ControllerRef::ShuntVoltage(shunt) => network.shunt_voltage_control_of(shunt),
            ControllerRef::GeneratorReactivePower(bus) => {
                if let Some(rpc) = network.generator_reactive_power_control_of(bus) {
                    self.refresh_reactive_power_control(network, rpc);
                }
                None
            }
            ControllerRef::TransformerReactivePower(branch) => {
                if let Some(rpc) = network.transformer_reactive_power_control_of(branch) {
                    self.refresh_reactive_power_control(network, rpc);
                }
                None
            }
            ControllerRef::PhaseShifter(branch) => {
                if let Some(pc) = network.phase_control_of(branch) {
                    self.refresh_phase_control(network, pc);
                }
                None
            }
        };
        if let Some(vc) = voltage_control {
            self.refresh_voltage_controls(network, network.voltage_controls()[vc].controlled_bus);
        }
    }
}

impl NetworkListener for AcEquationSystemUpdater {
    fn on_network_event(&mut self, network: &Network, event: &NetworkEvent) {
        debug!(?event, "updating equation system");
        match *event {
            NetworkEvent::BusDisabled { bus, .. }
            | NetworkEvent::BusIsolationChanged { bus, .. } => {
                self.refresh_around_bus(network, bus)
            }
            NetworkEvent::BranchDisabled { branch, .. }
            | NetworkEvent::BranchSideConnectivityChanged { branch, .. } => {
                self.refresh_around_branch(network, branch)
            }
            NetworkEvent::ShuntDisabled { shunt, .. } => self.refresh_shunt(network, shunt),
            NetworkEvent::HvdcDisabled { hvdc, .. } => {
                self.refresh_terms(network, ElementType::Hvdc, hvdc)
            }
            NetworkEvent::ControllerEnabledChanged { controller, .. } => {
                self.refresh_controller(network, controller)
            }
            NetworkEvent::PhaseControlModeChanged { control, .. } => {
                self.refresh_phase_control(network, control)
            }
            NetworkEvent::VoltageControlMergeChanged { .. } => {
                // controllers may have moved between groups
                for bus in 0..network.buses().len() {
                    self.refresh_bus(network, bus);
                    self.refresh_voltage_controls(network, bus);
                }
                self.refresh_unowned_controllers(network);
            }
            NetworkEvent::SpanningTreeChanged { .. } => {}
        }
        self.refresh_zero_impedance(network);
    }
}

fn generator_state(network: &Network, bus: usize, enabled: bool) -> ControllerState {
    let enabled_bus = !network.is_bus_disabled(bus);
    ControllerState {
        num: bus,
        active: enabled && enabled_bus,
        key: network.bus(bus).reactive_key,
        hold_allowed: enabled_bus,
    }
}

fn transformer_state(network: &Network, branch: usize, enabled: bool) -> ControllerState {
    ControllerState {
        num: branch,
        active: enabled && network.is_branch_in_operation(branch),
        key: 1.0,
        hold_allowed: true,
    }
}

fn generator_equations() -> (EquationType, EquationType, Contribution) {
    (EquationType::BusTargetQ, EquationType::DistrQ, Contribution::Reactive)
}

fn transformer_equations() -> (EquationType, EquationType, Contribution) {
    (
        EquationType::BranchTargetRho1,
        EquationType::DistrRho,
        Contribution::Variable(VariableType::BranchRho1),
    )
}

/// Shared control of a main voltage control, switched off until it is found visible.
fn voltage_shared_control(network: &Network, vc: usize) -> SharedControl {
    let control = &network.voltage_controls()[vc];
    let controllers = network.merged_controllers(vc).into_iter();
    let (controllers, (hold, distribution, contribution)): (Vec<ControllerState>, _) =
        match control.kind {
            VoltageControlKind::Generator => (
                controllers
                    .map(|b| {
                        let enabled = network.bus(b).generator_voltage_control_enabled;
                        generator_state(network, b, enabled)
                    })
                    .collect(),
                generator_equations(),
            ),
            VoltageControlKind::Transformer => (
                controllers
                    .map(|br| {
                        let enabled = network.branch(br).voltage_control_enabled;
                        transformer_state(network, br, enabled)
                    })
                    .collect(),
                transformer_equations(),
            ),
            VoltageControlKind::Shunt => (
                controllers
                    .map(|s| ControllerState {
                        num: s,
                        active: network.shunt(s).voltage_control_enabled
                            && !network.is_shunt_disabled(s),
                        key: 1.0,
                        hold_allowed: true,
                    })
                    .collect(),
                (
                    EquationType::ShuntTargetB,
                    EquationType::DistrShuntB,
                    Contribution::Variable(VariableType::ShuntB),
                ),
            ),
        };
    SharedControl {
        target: None,
        on: false,
        controllers,
        hold,
        distribution,
        contribution,
    }
}
