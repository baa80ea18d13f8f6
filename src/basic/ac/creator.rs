//! One pass assembly of the AC equation system of a network.
use tracing::{debug, info};

use super::parameters::AcEquationSystemCreationParameters;
use super::updater::{AcEquationSystemUpdater, generator_slope};
use crate::basic::equations::term::{
    BranchQuantity, BranchVariables, ClosedBranchTerm, HvdcTerm, LoadTerm, OpenBranchTerm,
    ShuntQuantity, ShuntTerm,
};
use crate::basic::equations::{
    BranchVariant, EquationId, EquationSystem, EquationTerm, EquationType, TermKind, TermOrigin,
    VariableId, VariableType,
};
use crate::basic::error::CreationError;
use crate::basic::network::*;

pub struct AcEquationSystemCreator<'a> {
    network: &'a Network,
    parameters: AcEquationSystemCreationParameters,
}

impl<'a> AcEquationSystemCreator<'a> {
    pub fn new(network: &'a Network, parameters: AcEquationSystemCreationParameters) -> Self {
        Self { network, parameters }
    }

    /// Builds the system and brings its activity flags in line with the network.
    pub fn create(&self) -> Result<EquationSystem, CreationError> {
        Ok(self.create_updater()?.into_system())
    }

    pub fn create_updater(&self) -> Result<AcEquationSystemUpdater, CreationError> {
        self.check()?;
        let mut sys = EquationSystem::new();
        self.create_buses(&mut sys);
        self.create_shunts(&mut sys);
        for branch in self.network.branches() {
            self.create_branch(&mut sys, branch);
        }
        self.create_hvdcs(&mut sys);
        self.create_slack_distribution(&mut sys);
        self.create_generator_slopes(&mut sys);
        info!(
            variables = sys.variable_count(),
            equations = sys.equation_count(),
            "ac equation system created"
        );

        let mut updater = AcEquationSystemUpdater::new(sys);
        updater.refresh_all(self.network);
        Ok(updater)
    }

    /// Rejects control combinations the system cannot represent.
    fn check(&self) -> Result<(), CreationError> {
        let net = self.network;
        let slacks = net.slack_buses();
        if slacks.is_empty() {
            return Err(CreationError::NoSlackBus);
        }
        let references = net.buses().iter().filter(|b| b.reference).count();
        if references != 1 {
            return Err(CreationError::InvalidReferenceBus { count: references });
        }
        if slacks.len() > 1 && !self.parameters.distributed_slack {
            return Err(CreationError::MultipleSlackBuses { count: slacks.len() });
        }

        for bus in net.buses() {
            if net.generator_voltage_control_of(bus.num).is_some()
                && net.generator_reactive_power_control_of(bus.num).is_some()
            {
                return Err(CreationError::VoltageAndReactivePowerBusControl {
                    bus: bus.name.clone(),
                });
            }
        }
        for branch in net.branches() {
            let name = || branch.name.clone();
            let voltage = net.transformer_voltage_control_of(branch.num).is_some();
            let reactive = net.transformer_reactive_power_control_of(branch.num).is_some();
            let phase = net.phase_control_of(branch.num).is_some();
            if voltage && phase {
                return Err(CreationError::VoltageAndPhaseControl { branch: name() });
            }
            if voltage && reactive {
                return Err(CreationError::VoltageAndReactivePowerControl { branch: name() });
            }
            if (voltage || reactive || phase) && net.is_zero_impedance(branch.num) {
                return Err(CreationError::ZeroImpedanceController { branch: name() });
            }
            if (voltage || reactive || phase) && (branch.bus1.is_none() || branch.bus2.is_none()) {
                return Err(CreationError::InvalidController {
                    element: "branch",
                    name: name(),
                    reason: "it is not attached at both ends",
                });
            }
            let controlled = !net.reactive_power_controls_of_controlled(branch.num).is_empty()
                || !net.phase_controls_of_controlled(branch.num).is_empty();
            if controlled && (branch.bus1.is_none() || branch.bus2.is_none()) {
                return Err(CreationError::InvalidController {
                    element: "branch",
                    name: name(),
                    reason: "its controlled flow is on a branch not attached at both ends",
                });
            }
            if net.reactive_power_controls_of_controlled(branch.num).len() > 1 {
                return Err(CreationError::DuplicateBranchTarget {
                    branch: name(),
                    what: "reactive power",
                });
            }
            if net.phase_controls_of_controlled(branch.num).len() > 1 {
                return Err(CreationError::DuplicateBranchTarget {
                    branch: name(),
                    what: "phase",
                });
            }
        }
        for pc in net.phase_controls() {
            if pc.mode == PhaseControlMode::Controller && pc.unit == PhaseControlUnit::Current {
                return Err(CreationError::UnsupportedPhaseControlUnit {
                    branch: net.branch(pc.controller_branch).name.clone(),
                });
            }
        }
        self.check_unique_controllers()
    }

    /// An element controls at most one control of each family.
    fn check_unique_controllers(&self) -> Result<(), CreationError> {
        let net = self.network;
        let mut seen = std::collections::HashSet::new();
        let mut claim = |family: &'static str, element: &'static str, num: usize, name: &str| {
            if seen.insert((family, num)) {
                Ok(())
            } else {
                Err(CreationError::DuplicateController {
                    element,
                    name: name.to_owned(),
                    what: family,
                })
            }
        };
        for (i, vc) in net.voltage_controls().iter().enumerate() {
            if vc.merge_status == MergeStatus::Hidden {
                continue;
            }
            for c in net.merged_controllers(i) {
                match vc.kind {
                    VoltageControlKind::Generator => {
                        claim("generator voltage", "bus", c, &net.bus(c).name)?
                    }
                    VoltageControlKind::Transformer => {
                        claim("transformer voltage", "branch", c, &net.branch(c).name)?
                    }
                    VoltageControlKind::Shunt => {
                        claim("shunt voltage", "shunt", c, &net.shunt(c).name)?
                    }
                }
            }
        }
        for rpc in net.reactive_power_controls() {
            for &c in &rpc.controllers {
                match rpc.kind {
                    ReactivePowerControlKind::Generator => {
                        claim("generator reactive power", "bus", c, &net.bus(c).name)?
                    }
                    ReactivePowerControlKind::Transformer => {
                        claim("transformer reactive power", "branch", c, &net.branch(c).name)?
                    }
                }
            }
        }
        for pc in net.phase_controls() {
            let c = pc.controller_branch;
            claim("phase", "branch", c, &net.branch(c).name)?;
        }
        Ok(())
    }

    fn create_buses(&self, sys: &mut EquationSystem) {
        for bus in self.network.buses() {
            let v = sys.create_variable(bus.num, VariableType::BusV);
            let phi = sys.create_variable(bus.num, VariableType::BusPhi);

            let p = sys.create_equation(bus.num, EquationType::BusTargetP);
            sys.set_rhs(p, Some(bus.target_p()));
            let q = sys.create_equation(bus.num, EquationType::BusTargetQ);
            sys.set_rhs(q, Some(bus.target_q()));
            if let Some(model) = &bus.load_model {
                let origin = TermOrigin::Load(bus.num);
                let load_p = LoadTerm::new(model.p0, model.p_terms.clone(), v);
                let load_q = LoadTerm::new(model.q0, model.q_terms.clone(), v);
                sys.add_term(p, EquationTerm::new(TermKind::Load(load_p), origin));
                sys.add_term(q, EquationTerm::new(TermKind::Load(load_q), origin));
            }

            // placeholder, switched on by a voltage control
            let v_eq = sys.create_equation(bus.num, EquationType::BusTargetV);
            sys.add_term(v_eq, EquationTerm::variable(v));
            sys.set_active(v_eq, false);

            if bus.reference {
                let phi_eq = sys.create_equation(bus.num, EquationType::BusTargetPhi);
                sys.add_term(phi_eq, EquationTerm::variable(phi));
                sys.set_rhs(phi_eq, Some(bus.initial_angle));
            }
        }
    }

    fn create_shunts(&self, sys: &mut EquationSystem) {
        for shunt in self.network.shunts() {
            let v = self.bus_variable(sys, shunt.bus, VariableType::BusV);
            let b = self.network.is_susceptance_controller(shunt.num).then(|| {
                let b = sys.create_variable(shunt.num, VariableType::ShuntB);
                let hold = sys.create_equation(shunt.num, EquationType::ShuntTargetB);
                sys.add_term(hold, EquationTerm::variable(b));
                sys.set_rhs(hold, Some(shunt.b));
                b
            });
            let origin = TermOrigin::Shunt(shunt.num);
            for (quantity, ty) in [
                (ShuntQuantity::P, EquationType::BusTargetP),
                (ShuntQuantity::Q, EquationType::BusTargetQ),
            ] {
                let term = ShuntTerm::new(quantity, shunt.g, shunt.b, v, b);
                let eq = sys.expect_equation(shunt.bus, ty);
                sys.add_term(eq, EquationTerm::new(TermKind::Shunt(term), origin));
            }
        }
    }

    fn create_branch(&self, sys: &mut EquationSystem, branch: &Branch) {
        if self.network.is_zero_impedance(branch.num) {
            self.create_zero_impedance_branch(sys, branch);
            return;
        }
        let net = self.network;
        let a1 = (net.is_phase_controller(branch.num) || self.parameters.force_a1_var).then(|| {
            let a1 = sys.create_variable(branch.num, VariableType::BranchAlpha1);
            let hold = sys.create_equation(branch.num, EquationType::BranchTargetAlpha1);
            sys.add_term(hold, EquationTerm::variable(a1));
            sys.set_rhs(hold, Some(branch.pi.a1));
            a1
        });
        let r1 = net.is_ratio_controller(branch.num).then(|| {
            let r1 = sys.create_variable(branch.num, VariableType::BranchRho1);
            let hold = sys.create_equation(branch.num, EquationType::BranchTargetRho1);
            sys.add_term(hold, EquationTerm::variable(r1));
            sys.set_rhs(hold, Some(branch.pi.r1));
            r1
        });

        let quantities = [
            (BranchQuantity::P, EquationType::BusTargetP),
            (BranchQuantity::Q, EquationType::BusTargetQ),
        ];
        match (branch.bus1, branch.bus2) {
            (Some(bus1), Some(bus2)) => {
                let vars = BranchVariables {
                    v1: self.bus_variable(sys, bus1, VariableType::BusV),
                    v2: self.bus_variable(sys, bus2, VariableType::BusV),
                    ph1: self.bus_variable(sys, bus1, VariableType::BusPhi),
                    ph2: self.bus_variable(sys, bus2, VariableType::BusPhi),
                    a1,
                    r1,
                };
                for side in [Side::One, Side::Two] {
                    let bus = if side == Side::One { bus1 } else { bus2 };
                    let origin = branch_origin(branch, side, BranchVariant::Closed);
                    for (quantity, ty) in quantities {
                        let term = ClosedBranchTerm::new(side, quantity, branch.pi, vars);
                        let eq = sys.expect_equation(bus, ty);
                        sys.add_term(eq, EquationTerm::new(TermKind::ClosedBranch(term), origin));
                    }
                    if branch.disconnection_allowed[side.other().idx()] {
                        self.create_open_terms(sys, branch, side, r1);
                    }
                    if self.parameters.monitor_current {
                        let term = ClosedBranchTerm::new(side, BranchQuantity::I, branch.pi, vars);
                        sys.attach(EquationTerm::new(TermKind::ClosedBranch(term), origin));
                    }
                }
                self.create_branch_targets(sys, branch, |side, quantity| {
                    let term = ClosedBranchTerm::new(side, quantity, branch.pi, vars);
                    EquationTerm::new(
                        TermKind::ClosedBranch(term),
                        branch_origin(branch, side, BranchVariant::Closed),
                    )
                });
            }
            (Some(_), None) => self.create_open_terms(sys, branch, Side::One, r1),
            (None, Some(_)) => self.create_open_terms(sys, branch, Side::Two, r1),
            (None, None) => {}
        }
    }

    /// Terms of `side` while the other side is open.
    fn create_open_terms(
        &self,
        sys: &mut EquationSystem,
        branch: &Branch,
        side: Side,
        r1: Option<VariableId>,
    ) {
        let Some(bus) = branch.bus(side) else {
            return;
        };
        let v = self.bus_variable(sys, bus, VariableType::BusV);
        let origin = branch_origin(branch, side, BranchVariant::Open);
        for (quantity, ty) in [
            (BranchQuantity::P, EquationType::BusTargetP),
            (BranchQuantity::Q, EquationType::BusTargetQ),
        ] {
            let term = OpenBranchTerm::new(side, quantity, branch.pi, v, r1);
            let eq = sys.expect_equation(bus, ty);
            sys.add_term(eq, EquationTerm::new(TermKind::OpenBranch(term), origin));
        }
        if self.parameters.monitor_current {
            let term = OpenBranchTerm::new(side, BranchQuantity::I, branch.pi, v, r1);
            sys.attach(EquationTerm::new(TermKind::OpenBranch(term), origin));
        }
    }

    /// Flow targets of the phase and reactive power controls regulating `branch`.
    fn create_branch_targets(
        &self,
        sys: &mut EquationSystem,
        branch: &Branch,
        flow: impl Fn(Side, BranchQuantity) -> EquationTerm,
    ) {
        let net = self.network;
        for &pc in net.phase_controls_of_controlled(branch.num) {
            let pc = &net.phase_controls()[pc];
            let eq = sys.create_equation(branch.num, EquationType::BranchTargetP);
            sys.add_term(eq, flow(pc.controlled_side, BranchQuantity::P));
            sys.set_rhs(eq, Some(pc.target_value));
        }
        for &rpc in net.reactive_power_controls_of_controlled(branch.num) {
            let rpc = &net.reactive_power_controls()[rpc];
            let eq = sys.create_equation(branch.num, EquationType::BranchTargetQ);
            sys.add_term(eq, flow(rpc.controlled_side, BranchQuantity::Q));
            sys.set_rhs(eq, Some(rpc.target_q));
        }
    }

    /// A zero impedance branch couples the voltages of its buses and carries
    /// its flows through two pass-through variables.
    fn create_zero_impedance_branch(&self, sys: &mut EquationSystem, branch: &Branch) {
        let (Some(bus1), Some(bus2)) = (branch.bus1, branch.bus2) else {
            return;
        };
        let dummy_p = sys.create_variable(branch.num, VariableType::DummyP);
        let dummy_q = sys.create_variable(branch.num, VariableType::DummyQ);
        for (dummy, ty) in [
            (dummy_p, EquationType::BusTargetP),
            (dummy_q, EquationType::BusTargetQ),
        ] {
            let eq1 = sys.expect_equation(bus1, ty);
            sys.add_term(eq1, EquationTerm::variable(dummy));
            let eq2 = sys.expect_equation(bus2, ty);
            sys.add_term(eq2, EquationTerm::variable(dummy).scaled(-1.0));
        }

        let v1 = self.bus_variable(sys, bus1, VariableType::BusV);
        let v2 = self.bus_variable(sys, bus2, VariableType::BusV);
        let ph1 = self.bus_variable(sys, bus1, VariableType::BusPhi);
        let ph2 = self.bus_variable(sys, bus2, VariableType::BusPhi);

        let zero_phi = sys.create_equation(branch.num, EquationType::ZeroPhi);
        sys.add_term(zero_phi, EquationTerm::variable(ph1));
        sys.add_term(zero_phi, EquationTerm::variable(ph2).scaled(-1.0));
        sys.set_rhs(zero_phi, Some(-branch.pi.a1));

        let zero_v = sys.create_equation(branch.num, EquationType::ZeroV);
        sys.add_term(zero_v, EquationTerm::variable(v1));
        sys.add_term(zero_v, EquationTerm::variable(v2).scaled(-1.0 / branch.pi.r1));
        sys.set_rhs(zero_v, Some(0.0));

        for (dummy, ty) in [
            (dummy_p, EquationType::DummyTargetP),
            (dummy_q, EquationType::DummyTargetQ),
        ] {
            let eq = sys.create_equation(branch.num, ty);
            sys.add_term(eq, EquationTerm::variable(dummy));
            sys.set_rhs(eq, Some(0.0));
        }

        // the flow through the branch is the pass-through variable, seen from side 1
        self.create_branch_targets(sys, branch, |side, quantity| {
            let dummy = if quantity == BranchQuantity::P { dummy_p } else { dummy_q };
            let sign = if side == Side::One { 1.0 } else { -1.0 };
            EquationTerm::variable(dummy).scaled(sign)
        });
    }

    fn create_hvdcs(&self, sys: &mut EquationSystem) {
        for hvdc in self.network.hvdcs().iter().filter(|h| h.ac_emulation) {
            let ph1 = self.bus_variable(sys, hvdc.bus1, VariableType::BusPhi);
            let ph2 = self.bus_variable(sys, hvdc.bus2, VariableType::BusPhi);
            for (side, bus) in [(Side::One, hvdc.bus1), (Side::Two, hvdc.bus2)] {
                let term = HvdcTerm::new(side, hvdc, ph1, ph2);
                let eq = sys.expect_equation(bus, EquationType::BusTargetP);
                let origin = TermOrigin::Hvdc(hvdc.num);
                sys.add_term(eq, EquationTerm::new(TermKind::Hvdc(term), origin));
            }
        }
    }

    /// Slack buses beyond the first get an equation sharing the mismatch,
    /// its terms are filled by the updater once the primary slack is known.
    fn create_slack_distribution(&self, sys: &mut EquationSystem) {
        let slacks = self.network.slack_buses();
        if slacks.len() > 1 {
            debug!(?slacks, "distributing slack power");
            for bus in slacks {
                sys.create_equation(bus, EquationType::BusDistrSlackP);
            }
        }
    }

    /// `v + slope * q = target_v` for generators regulating their own bus with a droop.
    fn create_generator_slopes(&self, sys: &mut EquationSystem) {
        for bus in self.network.buses() {
            let Some(slope) = generator_slope(self.network, bus.num) else {
                continue;
            };
            let q = sys.expect_equation(bus.num, EquationType::BusTargetQ);
            let terms: Vec<EquationTerm> = sys
                .equation(q)
                .terms()
                .iter()
                .map(|&t| sys.term(t).clone().scaled(slope))
                .collect();
            let v_eq: EquationId = sys.expect_equation(bus.num, EquationType::BusTargetV);
            for term in terms {
                sys.add_term(v_eq, term);
            }
        }
    }

    fn bus_variable(&self, sys: &EquationSystem, bus: usize, ty: VariableType) -> VariableId {
        match sys.get_variable(bus, ty) {
            Some(v) => v,
            None => panic!("bus {bus} has no {ty} variable"),
        }
    }
}

fn branch_origin(branch: &Branch, side: Side, variant: BranchVariant) -> TermOrigin {
    TermOrigin::Branch {
        num: branch.num,
        side,
        variant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn create(net: &Network) -> EquationSystem {
        AcEquationSystemCreator::new(net, Default::default()).create().unwrap()
    }

    fn active_types(sys: &EquationSystem) -> Vec<(usize, EquationType)> {
        sys.active_equations().map(|e| (e.element_num, e.ty)).collect()
    }

    #[test]
    fn test_two_bus_network() {
        let net = testcases::two_bus();
        let sys = create(&net);
        assert_eq!(
            active_types(&sys),
            vec![
                (0, EquationType::BusTargetV),
                (0, EquationType::BusTargetPhi),
                (1, EquationType::BusTargetP),
                (1, EquationType::BusTargetQ),
            ]
        );
        assert_eq!(sys.active_variables().len(), 4);
        assert!(sys.is_balanced());

        // flat start: no flow, the residuals are the load targets
        let x = DVector::from_vec(vec![1.0, 0.0, 1.0, 0.0]);
        let eval = sys.evaluate(&x);
        assert_relative_eq!(eval.residuals[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(eval.residuals[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(eval.residuals[2], 1.0, epsilon = 1e-12);
        assert_relative_eq!(eval.residuals[3], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_two_bus_branch_flow() {
        let net = testcases::two_bus();
        let sys = create(&net);
        let pi = net.branch(0).pi;
        let (y, ksi) = (pi.y(), pi.ksi());
        // power entering the branch at side 2
        let flow = |v1: f64, ph1: f64, v2: f64, ph2: f64| {
            let theta = ksi + ph1 - ph2;
            (
                v2 * (pi.g2 * v2 - y * v1 * theta.sin() + y * v2 * ksi.sin()),
                v2 * (-pi.b2 * v2 - y * v1 * theta.cos() + y * v2 * ksi.cos()),
            )
        };

        let p2 = sys.expect_equation(1, EquationType::BusTargetP);
        let q2 = sys.expect_equation(1, EquationType::BusTargetQ);
        for (v2, ph2) in [(1.0, 0.0), (0.95, -0.05)] {
            let x = DVector::from_vec(vec![1.0, 0.0, v2, ph2]);
            let (p, q) = flow(1.0, 0.0, v2, ph2);
            assert_relative_eq!(sys.equation_value(p2, &x), p, epsilon = 1e-12);
            assert_relative_eq!(sys.equation_value(q2, &x), q, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_configuration_errors() {
        let mut b = testcases::two_bus_builder();
        b.buses[1].slack = true;
        let net = b.build().unwrap();
        assert_eq!(
            AcEquationSystemCreator::new(&net, Default::default()).create().unwrap_err(),
            CreationError::MultipleSlackBuses { count: 2 }
        );

        let mut b = testcases::two_bus_builder();
        b.buses[0].slack = false;
        let net = b.build().unwrap();
        assert_eq!(create_err(&net), CreationError::NoSlackBus);

        let mut b = testcases::two_bus_builder();
        b.buses[1].reference = true;
        let net = b.build().unwrap();
        assert_eq!(create_err(&net), CreationError::InvalidReferenceBus { count: 2 });

        let mut b = testcases::phase_shifter_builder();
        b.phase_controls[0].unit = PhaseControlUnit::Current;
        let net = b.build().unwrap();
        assert!(matches!(create_err(&net), CreationError::UnsupportedPhaseControlUnit { .. }));

        let mut b = testcases::phase_shifter_builder();
        b.add_voltage_control(VoltageControl::new(
            VoltageControlKind::Transformer,
            2,
            vec![1],
            1.0,
        ));
        let net = b.build().unwrap();
        assert_eq!(
            create_err(&net),
            CreationError::VoltageAndPhaseControl {
                branch: "ps".into()
            }
        );

        let mut b = testcases::transformer_voltage_control_builder();
        b.add_reactive_power_control(ReactivePowerControl {
            kind: ReactivePowerControlKind::Transformer,
            controlled_branch: 0,
            controlled_side: Side::One,
            controllers: vec![1],
            target_q: 0.1,
        });
        let net = b.build().unwrap();
        assert!(matches!(
            create_err(&net),
            CreationError::VoltageAndReactivePowerControl { .. }
        ));

        let mut b = testcases::two_bus_builder();
        b.add_reactive_power_control(ReactivePowerControl {
            kind: ReactivePowerControlKind::Generator,
            controlled_branch: 0,
            controlled_side: Side::Two,
            controllers: vec![0],
            target_q: 0.1,
        });
        let net = b.build().unwrap();
        assert_eq!(
            create_err(&net),
            CreationError::VoltageAndReactivePowerBusControl { bus: "slack".into() }
        );
    }

    fn create_err(net: &Network) -> CreationError {
        AcEquationSystemCreator::new(net, Default::default())
            .create()
            .unwrap_err()
    }

    #[test]
    fn test_zero_impedance_controller_is_rejected() {
        let mut b = testcases::zero_impedance_ring_builder();
        b.add_voltage_control(VoltageControl::new(
            VoltageControlKind::Transformer,
            2,
            vec![1],
            1.0,
        ));
        let net = b.build().unwrap();
        assert!(matches!(create_err(&net), CreationError::ZeroImpedanceController { .. }));
    }

    #[test]
    fn test_duplicate_controller_is_rejected() {
        let mut b = testcases::shared_generator_voltage_control_builder(2);
        b.add_voltage_control(VoltageControl::new(VoltageControlKind::Generator, 1, vec![1], 1.0));
        let net = b.build().unwrap();
        assert!(matches!(create_err(&net), CreationError::DuplicateController { .. }));
    }

    #[test]
    fn test_current_terms_are_attached() {
        let net = testcases::two_bus();
        let params = AcEquationSystemCreationParameters {
            monitor_current: true,
            ..Default::default()
        };
        let sys = AcEquationSystemCreator::new(&net, params).create().unwrap();
        // closed and open terms on both sides
        assert_eq!(sys.attached_terms().len(), 4);
        assert!(sys.is_balanced());
        let x = DVector::from_vec(vec![1.0, 0.0, 0.95, -0.05]);
        let find = |variant| {
            let origin = TermOrigin::Branch {
                num: 0,
                side: Side::One,
                variant,
            };
            let mut attached = sys.attached_terms().iter().copied();
            attached.find(|&t| sys.term(t).origin == origin).unwrap()
        };
        let closed = find(BranchVariant::Closed);
        assert!(matches!(sys.term(closed).kind, TermKind::ClosedBranch(_)));
        assert!(sys.term(closed).active);
        assert!(sys.term_value(closed, &x) > 0.0);
        // no shunt admittance, an open line carries no current
        let open = find(BranchVariant::Open);
        assert!(matches!(sys.term(open).kind, TermKind::OpenBranch(_)));
        assert!(!sys.term(open).active);
        assert_relative_eq!(sys.term_value(open, &x), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_forced_alpha_is_held() {
        let net = testcases::two_bus();
        let params = AcEquationSystemCreationParameters {
            force_a1_var: true,
            ..Default::default()
        };
        let sys = AcEquationSystemCreator::new(&net, params).create().unwrap();
        let hold = sys.expect_equation(0, EquationType::BranchTargetAlpha1);
        assert!(sys.is_active(hold));
        assert_eq!(sys.variable_count(), 5);
        assert!(sys.is_balanced());
    }

    #[test]
    fn test_generator_slope() {
        let mut b = testcases::two_bus_builder();
        b.buses[0].generator_slope = Some(0.02);
        b.buses[0].generation_target_q = 0.1;
        let net = b.build().unwrap();
        let sys = create(&net);
        let v = sys.expect_equation(0, EquationType::BusTargetV);
        assert!(sys.is_active(v));
        assert_relative_eq!(sys.equation(v).rhs().unwrap(), 1.0 + 0.02 * 0.1, epsilon = 1e-12);
        // voltage variable plus the scaled reactive balance of the bus
        assert!(sys.equation(v).terms().len() > 1);
        assert!(sys.is_balanced());
    }
}
