use tracing::debug;

use super::creator::AcEquationSystemCreator;
use super::parameters::AcEquationSystemCreationParameters;
use super::updater::AcEquationSystemUpdater;
use crate::basic::equations::EquationSystem;
use crate::basic::error::{CreationError, NetworkError};
use crate::basic::network::{Network, NetworkEvent, NetworkListener};

/// A network together with the equation system kept in sync with it.
///
/// Every change goes through [`AcPowerFlowContext::apply`], which updates the
/// network and forwards each resulting notification to the equation system
/// first, then to the registered listeners.
pub struct AcPowerFlowContext {
    network: Network,
    parameters: AcEquationSystemCreationParameters,
    updater: AcEquationSystemUpdater,
    listeners: Vec<Box<dyn NetworkListener>>,
}

impl AcPowerFlowContext {
    pub fn new(
        network: Network,
        parameters: AcEquationSystemCreationParameters,
    ) -> Result<Self, CreationError> {
        let updater = AcEquationSystemCreator::new(&network, parameters).create_updater()?;
        Ok(Self {
            network,
            parameters,
            updater,
            listeners: Vec::new(),
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn parameters(&self) -> &AcEquationSystemCreationParameters {
        &self.parameters
    }

    pub fn system(&self) -> &EquationSystem {
        self.updater.system()
    }

    pub fn add_listener(&mut self, listener: Box<dyn NetworkListener>) {
        self.listeners.push(listener);
    }

    /// Applies a network change and returns the notifications it produced.
    pub fn apply(&mut self, event: NetworkEvent) -> Result<Vec<NetworkEvent>, NetworkError> {
        let notifications = self.network.apply(&event)?;
        for n in &notifications {
            debug!(event = ?n, "dispatching");
            self.updater.on_network_event(&self.network, n);
            for listener in &mut self.listeners {
                listener.on_network_event(&self.network, n);
            }
        }
        Ok(notifications)
    }

    /// Assembles a fresh system from the current network state.
    pub fn recreate(&self) -> Result<EquationSystem, CreationError> {
        AcEquationSystemCreator::new(&self.network, self.parameters).create()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use proptest::prelude::*;

    use super::*;
    use crate::basic::ac::initializer::{UniformValueVoltageInitializer, initial_state};
    use crate::basic::equations::{ElementType, EquationType, VariableType};
    use crate::basic::network::{ControllerRef, MergeStatus, PhaseControlMode, PiModel, Side};
    use crate::testcases;

    type Key = (ElementType, usize, EquationType);

    fn context(network: Network) -> AcPowerFlowContext {
        AcPowerFlowContext::new(network, Default::default()).unwrap()
    }

    fn is_active(sys: &EquationSystem, num: usize, ty: EquationType) -> bool {
        sys.is_active(sys.expect_equation(num, ty))
    }

    /// Residuals of the active equations, keyed by what they model.
    fn active_residuals(sys: &EquationSystem, x: &DVector<f64>) -> Vec<(Key, f64)> {
        let eval = sys.evaluate(x);
        let mut v: Vec<(Key, f64)> = eval
            .rows
            .iter()
            .zip(eval.residuals.iter())
            .map(|(&id, &r)| {
                let e = sys.equation(id);
                ((e.element_type(), e.element_num, e.ty), r)
            })
            .collect();
        v.sort_by(|a, b| a.0.cmp(&b.0));
        v
    }

    /// The incrementally updated system must behave like a fresh one built
    /// from the current network.
    fn assert_matches_fresh(ctx: &AcPowerFlowContext) {
        let fresh = ctx.recreate().unwrap();
        let init = UniformValueVoltageInitializer { v: 1.02, angle: 0.01 };
        let x = initial_state(&fresh, ctx.network(), &init);
        let current = active_residuals(ctx.system(), &x);
        let expected = active_residuals(&fresh, &x);
        let keys = |v: &[(Key, f64)]| v.iter().map(|e| e.0).collect::<Vec<_>>();
        assert_eq!(keys(&current), keys(&expected));
        for ((key, r), (_, f)) in current.iter().zip(&expected) {
            assert!((r - f).abs() < 1e-9, "{key:?}: {r} != {f}");
        }
        assert_eq!(ctx.system().active_variables(), fresh.active_variables());
    }

    #[derive(Default)]
    struct Recorder(Rc<RefCell<Vec<NetworkEvent>>>);

    impl NetworkListener for Recorder {
        fn on_network_event(&mut self, _network: &Network, event: &NetworkEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn test_listeners_receive_notifications() {
        let mut ctx = context(testcases::three_bus_chain());
        let seen = Rc::new(RefCell::new(Vec::new()));
        ctx.add_listener(Box::new(Recorder(seen.clone())));

        let disable = NetworkEvent::BusDisabled { bus: 1, disabled: true };
        let notifications = ctx.apply(disable.clone()).unwrap();
        assert_eq!(notifications[0], disable);
        assert!(notifications.contains(&NetworkEvent::BusIsolationChanged {
            bus: 2,
            isolated: true
        }));
        assert_eq!(*seen.borrow(), notifications);

        // no change, no notification
        assert!(ctx.apply(disable).unwrap().is_empty());
        assert_eq!(seen.borrow().len(), notifications.len());
    }

    #[test]
    fn test_isolated_bus_equations_are_inactive() {
        let mut ctx = context(testcases::three_bus_chain());
        ctx.apply(NetworkEvent::BusDisabled { bus: 1, disabled: true }).unwrap();
        let sys = ctx.system();
        for bus in [1, 2] {
            for ty in [EquationType::BusTargetP, EquationType::BusTargetQ] {
                assert!(!is_active(sys, bus, ty), "{ty} of bus {bus}");
            }
        }
        assert!(sys.is_balanced());
        assert_matches_fresh(&ctx);

        ctx.apply(NetworkEvent::BusDisabled { bus: 1, disabled: false }).unwrap();
        assert!(is_active(ctx.system(), 2, EquationType::BusTargetP));
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_open_and_closed_terms_are_exclusive() {
        // a parallel line keeps bus 1 energized
        let mut b = testcases::two_bus_builder();
        b.add_branch("parallel", 0, 1, PiModel::line(0.01, 0.1, 0.0));
        let mut ctx = AcPowerFlowContext::new(b.build().unwrap(), Default::default()).unwrap();
        let branch_terms = |ctx: &AcPowerFlowContext| {
            let sys = ctx.system();
            sys.terms_of_element(ElementType::Branch, 0)
                .iter()
                .map(|&t| sys.term(t))
                .filter(|t| t.active)
                .map(|t| t.origin)
                .collect::<Vec<_>>()
        };
        let closed = branch_terms(&ctx);
        assert_eq!(closed.len(), 4);

        ctx.apply(NetworkEvent::BranchSideConnectivityChanged {
            branch: 0,
            side: Side::One,
            connected: false,
        })
        .unwrap();
        let open = branch_terms(&ctx);
        // only the open terms at side 2 remain
        assert_eq!(open.len(), 2);
        assert!(open.iter().all(|o| !closed.contains(o)));
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let net = testcases::mixed();
        let mut updater = AcEquationSystemCreator::new(&net, Default::default())
            .create_updater()
            .unwrap();
        let activity = |sys: &EquationSystem| {
            sys.equations()
                .iter()
                .map(|e| (e.is_active(), e.rhs()))
                .collect::<Vec<_>>()
        };
        let before = activity(updater.system());
        let terms_before: Vec<bool> = updater.system().terms().iter().map(|t| t.active).collect();
        updater.refresh_all(&net);
        updater.refresh_all(&net);
        assert_eq!(activity(updater.system()), before);
        let terms_after: Vec<bool> = updater.system().terms().iter().map(|t| t.active).collect();
        assert_eq!(terms_after, terms_before);
    }

    #[test]
    fn test_shared_voltage_control_distribution() {
        let mut b = testcases::shared_generator_voltage_control_builder(3);
        for (bus, key) in [(1, 9.0), (2, 10.0), (3, 11.0)] {
            b.buses[bus].reactive_key = key;
        }
        let net = b.build().unwrap();
        let ctx = AcPowerFlowContext::new(net, Default::default()).unwrap();
        let sys = ctx.system();

        let v = sys.expect_equation(0, EquationType::BusTargetV);
        assert!(sys.is_active(v));
        for bus in 1..=3 {
            assert!(!is_active(sys, bus, EquationType::BusTargetQ));
        }
        // the first controller is the reference
        let distr: Vec<bool> = (1..=3)
            .map(|bus| is_active(sys, bus, EquationType::DistrQ))
            .collect();
        assert_eq!(distr, vec![false, true, true]);
        assert!(sys.is_balanced());

        // every controller has a reactive target of 10 and at flat start no
        // reactive power flows, the residual is the share error 10 - key
        let x = initial_state(sys, ctx.network(), &UniformValueVoltageInitializer::default());
        for (bus, key) in [(2, 10.0), (3, 11.0)] {
            let eq = sys.expect_equation(bus, EquationType::DistrQ);
            let residual = sys.equation_value(eq, &x) - sys.equation(eq).rhs().unwrap();
            assert_relative_eq!(residual, 10.0 - key, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_equal_keys_give_zero_distribution_residual() {
        let net = testcases::shared_generator_voltage_control(3);
        let ctx = AcPowerFlowContext::new(net, Default::default()).unwrap();
        let sys = ctx.system();
        let x = initial_state(sys, ctx.network(), &UniformValueVoltageInitializer::default());
        for bus in 2..=3 {
            let eq = sys.expect_equation(bus, EquationType::DistrQ);
            let residual = sys.equation_value(eq, &x) - sys.equation(eq).rhs().unwrap();
            assert_relative_eq!(residual, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_reference_controller_moves_when_disabled() {
        let mut ctx = context(testcases::shared_generator_voltage_control(3));
        ctx.apply(NetworkEvent::ControllerEnabledChanged {
            controller: ControllerRef::GeneratorVoltage(1),
            enabled: false,
        })
        .unwrap();
        let sys = ctx.system();
        assert!(is_active(sys, 1, EquationType::BusTargetQ));
        assert!(!is_active(sys, 1, EquationType::DistrQ));
        assert!(!is_active(sys, 2, EquationType::DistrQ));
        assert!(is_active(sys, 3, EquationType::DistrQ));
        assert!(sys.is_balanced());
        assert_matches_fresh(&ctx);

        // re-enabling restores the first reference
        ctx.apply(NetworkEvent::ControllerEnabledChanged {
            controller: ControllerRef::GeneratorVoltage(1),
            enabled: true,
        })
        .unwrap();
        let sys = ctx.system();
        assert!(!is_active(sys, 1, EquationType::DistrQ));
        assert!(is_active(sys, 2, EquationType::DistrQ));
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_disabling_the_only_controller_releases_the_voltage() {
        let mut ctx = context(testcases::two_bus());
        ctx.apply(NetworkEvent::ControllerEnabledChanged {
            controller: ControllerRef::GeneratorVoltage(0),
            enabled: false,
        })
        .unwrap();
        let sys = ctx.system();
        assert!(!is_active(sys, 0, EquationType::BusTargetV));
        assert!(is_active(sys, 0, EquationType::BusTargetQ));
        assert!(sys.is_balanced());
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_phase_control_mode() {
        let mut ctx = context(testcases::phase_shifter());
        let ps = testcases::PHASE_SHIFTER;
        let active = |ctx: &AcPowerFlowContext, ty| is_active(ctx.system(), ps, ty);
        assert!(active(&ctx, EquationType::BranchTargetP));
        assert!(!active(&ctx, EquationType::BranchTargetAlpha1));
        assert!(ctx.system().is_balanced());

        ctx.apply(NetworkEvent::PhaseControlModeChanged {
            control: 0,
            mode: PhaseControlMode::Off,
        })
        .unwrap();
        assert!(!active(&ctx, EquationType::BranchTargetP));
        assert!(active(&ctx, EquationType::BranchTargetAlpha1));
        assert!(ctx.system().is_balanced());
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_zero_impedance_ring() {
        let mut ctx = context(testcases::zero_impedance_ring());
        let sys = ctx.system();
        let spanning: Vec<bool> = (0..3)
            .map(|br| ctx.network().is_spanning_tree_edge(br))
            .collect();
        assert_eq!(spanning.iter().filter(|&&s| s).count(), 2);
        for br in 0..3 {
            let target = sys.expect_equation(br, EquationType::DummyTargetP);
            assert_eq!(sys.is_active(target), !spanning[br]);
        }
        assert!(sys.is_balanced());

        let cut = spanning.iter().position(|&s| s).unwrap();
        ctx.apply(NetworkEvent::BranchDisabled {
            branch: cut,
            disabled: true,
        })
        .unwrap();
        assert!(ctx.system().is_balanced());
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_distributed_slack() {
        let params = AcEquationSystemCreationParameters {
            distributed_slack: true,
            ..Default::default()
        };
        let mut ctx = AcPowerFlowContext::new(testcases::multi_slack(), params).unwrap();
        let sys = ctx.system();
        let distr = |sys: &EquationSystem, bus| is_active(sys, bus, EquationType::BusDistrSlackP);
        assert!(!distr(sys, 0));
        assert!(distr(sys, 1));
        assert!(sys.is_balanced());

        ctx.apply(NetworkEvent::BusDisabled { bus: 0, disabled: true }).unwrap();
        let sys = ctx.system();
        // bus 1 becomes the primary slack
        assert!(!distr(sys, 1));
        assert!(sys.is_balanced());
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_hvdc_terms_follow_the_link() {
        let mut ctx = context(testcases::hvdc());
        let active = |ctx: &AcPowerFlowContext| {
            let sys = ctx.system();
            sys.terms_of_element(ElementType::Hvdc, 0)
                .iter()
                .filter(|&&t| sys.term(t).active)
                .count()
        };
        assert_eq!(active(&ctx), 2);
        ctx.apply(NetworkEvent::HvdcDisabled { hvdc: 0, disabled: true }).unwrap();
        assert_eq!(active(&ctx), 0);
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_transformer_voltage_control() {
        let mut ctx = context(testcases::transformer_voltage_control());
        let sys = ctx.system();
        let rho = sys.get_variable(testcases::TRANSFORMER, VariableType::BranchRho1);
        assert!(rho.is_some());
        assert!(!is_active(sys, testcases::TRANSFORMER, EquationType::BranchTargetRho1));
        assert!(sys.is_balanced());

        ctx.apply(NetworkEvent::ControllerEnabledChanged {
            controller: ControllerRef::TransformerVoltage(testcases::TRANSFORMER),
            enabled: false,
        })
        .unwrap();
        let sys = ctx.system();
        assert!(is_active(sys, testcases::TRANSFORMER, EquationType::BranchTargetRho1));
        assert!(sys.is_balanced());
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_merging_voltage_controls() {
        let mut ctx = context(testcases::mergeable_voltage_controls());
        assert!(ctx.system().is_balanced());
        ctx.apply(NetworkEvent::VoltageControlMergeChanged {
            control: 1,
            status: MergeStatus::Hidden,
            merged: Vec::new(),
        })
        .unwrap();
        ctx.apply(NetworkEvent::VoltageControlMergeChanged {
            control: 0,
            status: MergeStatus::Main,
            merged: vec![1],
        })
        .unwrap();
        let sys = ctx.system();
        assert!(sys.is_balanced());
        // both generators now share the voltage of the controlled bus
        assert!(is_active(sys, testcases::MERGED_BUS, EquationType::BusTargetV));
        assert!(!is_active(sys, 2, EquationType::BusTargetQ));
        assert!(is_active(sys, 2, EquationType::DistrQ));
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_controller_toggles_reuse_term_slots() {
        let mut ctx = context(testcases::shared_generator_voltage_control(3));
        let toggle = |enabled| NetworkEvent::ControllerEnabledChanged {
            controller: ControllerRef::GeneratorVoltage(1),
            enabled,
        };
        ctx.apply(toggle(false)).unwrap();
        ctx.apply(toggle(true)).unwrap();
        let bound = ctx.system().terms().len();
        for _ in 0..100 {
            ctx.apply(toggle(false)).unwrap();
            ctx.apply(toggle(true)).unwrap();
        }
        assert_eq!(ctx.system().terms().len(), bound);
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_hidden_transformer_control_holds_ratio() {
        let mut ctx = context(testcases::transformer_voltage_control());
        let hide = |status| NetworkEvent::VoltageControlMergeChanged {
            control: 1,
            status,
            merged: Vec::new(),
        };
        ctx.apply(hide(MergeStatus::Hidden)).unwrap();
        let sys = ctx.system();
        // no main control owns the transformer, its ratio is frozen
        assert!(is_active(sys, testcases::TRANSFORMER, EquationType::BranchTargetRho1));
        assert!(!is_active(sys, 2, EquationType::BusTargetV));
        assert!(is_active(sys, 2, EquationType::BusTargetQ));
        assert!(sys.is_balanced());
        assert_matches_fresh(&ctx);

        ctx.apply(hide(MergeStatus::Main)).unwrap();
        let sys = ctx.system();
        assert!(!is_active(sys, testcases::TRANSFORMER, EquationType::BranchTargetRho1));
        assert!(is_active(sys, 2, EquationType::BusTargetV));
        assert!(sys.is_balanced());
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_hidden_shunt_control_holds_susceptance() {
        let mut ctx = context(testcases::mixed());
        let svc = 0;
        assert!(!is_active(ctx.system(), svc, EquationType::ShuntTargetB));
        ctx.apply(NetworkEvent::VoltageControlMergeChanged {
            control: 2,
            status: MergeStatus::Hidden,
            merged: Vec::new(),
        })
        .unwrap();
        let sys = ctx.system();
        assert!(is_active(sys, svc, EquationType::ShuntTargetB));
        assert!(sys.is_balanced());
        assert_matches_fresh(&ctx);
    }

    #[test]
    fn test_reactive_power_control() {
        let mut ctx = context(testcases::mixed());
        let target = |ctx: &AcPowerFlowContext| {
            let sys = ctx.system();
            is_active(sys, testcases::MIXED_Q_CONTROLLED, EquationType::BranchTargetQ)
        };
        let active = |ctx: &AcPowerFlowContext, bus, ty| is_active(ctx.system(), bus, ty);

        // bus 8 is the reference controller, bus 9 shares through its distribution equation
        assert!(target(&ctx));
        assert!(!active(&ctx, 8, EquationType::BusTargetQ));
        assert!(!active(&ctx, 9, EquationType::BusTargetQ));
        assert!(!active(&ctx, 8, EquationType::DistrQ));
        assert!(active(&ctx, 9, EquationType::DistrQ));
        assert!(ctx.system().is_balanced());

        ctx.apply(NetworkEvent::ControllerEnabledChanged {
            controller: ControllerRef::GeneratorReactivePower(8),
            enabled: false,
        })
        .unwrap();
        assert!(target(&ctx));
        assert!(active(&ctx, 8, EquationType::BusTargetQ));
        assert!(!active(&ctx, 9, EquationType::BusTargetQ));
        assert!(!active(&ctx, 9, EquationType::DistrQ));
        assert!(ctx.system().is_balanced());
        assert_matches_fresh(&ctx);

        // the regulated flow disappears with the branch
        ctx.apply(NetworkEvent::BranchSideConnectivityChanged {
            branch: testcases::MIXED_Q_CONTROLLED,
            side: Side::Two,
            connected: false,
        })
        .unwrap();
        assert!(!target(&ctx));
        assert!(active(&ctx, 8, EquationType::BusTargetQ));
        assert!(active(&ctx, 9, EquationType::BusTargetQ));
        assert!(ctx.system().is_balanced());
        assert_matches_fresh(&ctx);
    }

    fn event_strategy() -> impl Strategy<Value = NetworkEvent> {
        let n = testcases::MIXED_SIZES;
        prop_oneof![
            (1..n.buses, any::<bool>())
                .prop_map(|(bus, disabled)| NetworkEvent::BusDisabled { bus, disabled }),
            (0..n.branches, any::<bool>())
                .prop_map(|(branch, disabled)| NetworkEvent::BranchDisabled { branch, disabled }),
            (0..n.branches, any::<bool>(), any::<bool>()).prop_map(|(branch, one, connected)| {
                NetworkEvent::BranchSideConnectivityChanged {
                    branch,
                    side: if one { Side::One } else { Side::Two },
                    connected,
                }
            }),
            (0..n.shunts, any::<bool>())
                .prop_map(|(shunt, disabled)| NetworkEvent::ShuntDisabled { shunt, disabled }),
            (0..n.hvdcs, any::<bool>())
                .prop_map(|(hvdc, disabled)| NetworkEvent::HvdcDisabled { hvdc, disabled }),
            (prop::sample::select(testcases::mixed_controllers()), any::<bool>())
                .prop_map(|(controller, enabled)| NetworkEvent::ControllerEnabledChanged {
                    controller,
                    enabled
                }),
            (0..n.voltage_controls, any::<bool>()).prop_map(|(control, hidden)| {
                NetworkEvent::VoltageControlMergeChanged {
                    control,
                    status: if hidden { MergeStatus::Hidden } else { MergeStatus::Main },
                    merged: Vec::new(),
                }
            }),
            any::<bool>().prop_map(|on| NetworkEvent::PhaseControlModeChanged {
                control: 0,
                mode: if on { PhaseControlMode::Controller } else { PhaseControlMode::Off },
            }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_incremental_updates_match_fresh_creation(
            events in prop::collection::vec(event_strategy(), 1..12)
        ) {
            let mut ctx = context(testcases::mixed());
            for event in events {
                ctx.apply(event.clone()).unwrap();
                prop_assert!(ctx.system().is_balanced(), "unbalanced after {:?}", event);
            }
            assert_matches_fresh(&ctx);
        }
    }
}
