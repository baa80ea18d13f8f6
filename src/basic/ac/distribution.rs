//! Sharing of one regulated quantity between several controllers.
//!
//! Every controller owns a hold equation, freezing its own quantity, and, in
//! groups of more than one controller, a distribution equation tying its
//! contribution to the total. The first active controller is the reference:
//! its distribution equation stays inactive and the target equation of the
//! control takes its place.
use tracing::{debug, warn};

use super::updater::is_term_active;
use crate::basic::equations::{
    DistributionLayout, EquationId, EquationSystem, EquationTerm, EquationType, VariableType,
};
use crate::basic::network::Network;

/// What a controller adds to the shared quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Contribution {
    /// Reactive injection of the controller bus, read from its reactive balance terms.
    Reactive,
    /// A control variable of the controller element.
    Variable(VariableType),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ControllerState {
    pub(crate) num: usize,
    pub(crate) active: bool,
    pub(crate) key: f64,
    /// The hold equation may be active at all, false for disabled buses.
    pub(crate) hold_allowed: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SharedControl {
    /// `None` when another control owns the target equation.
    pub(crate) target: Option<EquationId>,
    pub(crate) on: bool,
    pub(crate) controllers: Vec<ControllerState>,
    pub(crate) hold: EquationType,
    pub(crate) distribution: EquationType,
    pub(crate) contribution: Contribution,
}

impl SharedControl {
    /// Brings every equation of the control in line with its state.
    pub(crate) fn apply(&self, sys: &mut EquationSystem, network: &Network) {
        if let Some(target) = self.target {
            sys.set_active(target, self.on);
        }
        for c in &self.controllers {
            let hold = sys.expect_equation(c.num, self.hold);
            sys.set_active(hold, !(self.on && c.active) && c.hold_allowed);
        }

        let grouped = self.controllers.len() > 1;
        let active: Vec<&ControllerState> = self.controllers.iter().filter(|c| c.active).collect();
        let reference = active.first().map(|c| c.num);
        let layout = DistributionLayout {
            controllers: active.iter().map(|c| c.num).collect(),
            keys: active.iter().map(|c| c.key).collect(),
        };
        for c in &self.controllers {
            let eq = if grouped {
                Some(sys.create_equation(c.num, self.distribution))
            } else {
                sys.equation_id(c.num, self.distribution)
            };
            let Some(eq) = eq else {
                continue;
            };
            if sys.equation(eq).layout() != Some(&layout) {
                self.rebuild(sys, network, eq, c, &layout);
            }
            sys.set_active(eq, self.on && c.active && Some(c.num) != reference);
        }
    }

    fn rebuild(
        &self,
        sys: &mut EquationSystem,
        network: &Network,
        eq: EquationId,
        controller: &ControllerState,
        layout: &DistributionLayout,
    ) {
        debug!(
            equation = %sys.equation(eq),
            controllers = ?layout.controllers,
            "rebuilding distribution terms"
        );
        let mut terms = Vec::new();
        let mut rhs = 0.0;
        if controller.active {
            let mut total: f64 = layout.keys.iter().sum();
            let equal_keys = total <= 0.0;
            if equal_keys {
                warn!(
                    controllers = ?layout.controllers,
                    "participation keys sum to zero, sharing equally"
                );
                total = layout.keys.len() as f64;
            }
            let share = |key: f64| (if equal_keys { 1.0 } else { key }) / total;
            let k = share(controller.key);
            let mut total_target = 0.0;
            for &j in &layout.controllers {
                let coefficient = if j == controller.num { k - 1.0 } else { k };
                terms.extend(
                    self.contribution_terms(sys, network, j)
                        .into_iter()
                        .map(|t| t.scaled(coefficient)),
                );
                total_target += self.fixed_target(network, j);
            }
            rhs = k * total_target - self.fixed_target(network, controller.num);
        }
        sys.replace_terms(eq, terms);
        sys.set_rhs(eq, Some(rhs));
        sys.set_layout(eq, Some(layout.clone()));
    }

    fn contribution_terms(
        &self,
        sys: &EquationSystem,
        network: &Network,
        num: usize,
    ) -> Vec<EquationTerm> {
        match self.contribution {
            Contribution::Reactive => {
                let q = sys.expect_equation(num, EquationType::BusTargetQ);
                sys.equation(q)
                    .terms()
                    .iter()
                    .map(|&t| {
                        let mut term = sys.term(t).clone();
                        term.active = is_term_active(network, term.origin);
                        term
                    })
                    .collect()
            }
            Contribution::Variable(ty) => match sys.get_variable(num, ty) {
                Some(v) => vec![EquationTerm::variable(v)],
                None => panic!("controller {num} has no {ty} variable"),
            },
        }
    }

    /// Part of the controller quantity that is not a term of the system.
    fn fixed_target(&self, network: &Network, num: usize) -> f64 {
        match self.contribution {
            Contribution::Reactive => network.bus(num).target_q(),
            Contribution::Variable(_) => 0.0,
        }
    }
}
