//! Nonlinear contributions to equations.
//!
//! Every family implements [`TermFormula`]; [`TermKind`] is the closed set of
//! families an [`EquationTerm`] can hold.
pub mod branch;
pub mod hvdc;
pub mod load;
pub mod shunt;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

pub use branch::{BranchQuantity, BranchVariables, ClosedBranchTerm, OpenBranchTerm};
pub use hvdc::HvdcTerm;
pub use load::LoadTerm;
pub use shunt::{ShuntQuantity, ShuntTerm};

use super::types::{EquationId, VariableId};
use crate::basic::network::Side;

/// Scalar function of the state vector with closed form partial derivatives.
pub trait TermFormula {
    /// Variables the value depends on, in a fixed order.
    fn variables(&self) -> &[VariableId];

    fn eval(&self, x: &DVector<f64>) -> f64;

    /// Partial derivative with respect to `v`.
    ///
    /// # Panics
    /// If `v` is not one of [`TermFormula::variables`].
    fn der(&self, x: &DVector<f64>, v: VariableId) -> f64;

    fn name(&self) -> &'static str;
}

#[track_caller]
pub(crate) fn undeclared_variable(term: &str, v: VariableId) -> ! {
    panic!("{term} term does not depend on variable {v}")
}

/// Identity on one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableTerm {
    var: [VariableId; 1],
}

impl VariableTerm {
    pub fn new(var: VariableId) -> Self {
        Self { var: [var] }
    }
}

impl TermFormula for VariableTerm {
    fn variables(&self) -> &[VariableId] {
        &self.var
    }

    fn eval(&self, x: &DVector<f64>) -> f64 {
        x[*self.var[0]]
    }

    fn der(&self, _x: &DVector<f64>, v: VariableId) -> f64 {
        if v != self.var[0] {
            undeclared_variable(self.name(), v);
        }
        1.0
    }

    fn name(&self) -> &'static str {
        "variable"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermKind {
    Variable(VariableTerm),
    ClosedBranch(ClosedBranchTerm),
    OpenBranch(OpenBranchTerm),
    Shunt(ShuntTerm),
    Hvdc(HvdcTerm),
    Load(LoadTerm),
}

macro_rules! dispatch {
    ($self:ident, $t:ident => $e:expr) => {
        match $self {
            TermKind::Variable($t) => $e,
            TermKind::ClosedBranch($t) => $e,
            TermKind::OpenBranch($t) => $e,
            TermKind::Shunt($t) => $e,
            TermKind::Hvdc($t) => $e,
            TermKind::Load($t) => $e,
        }
    };
}

impl TermFormula for TermKind {
    fn variables(&self) -> &[VariableId] {
        dispatch!(self, t => t.variables())
    }

    fn eval(&self, x: &DVector<f64>) -> f64 {
        dispatch!(self, t => t.eval(x))
    }

    fn der(&self, x: &DVector<f64>, v: VariableId) -> f64 {
        dispatch!(self, t => t.der(x, v))
    }

    fn name(&self) -> &'static str {
        dispatch!(self, t => t.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchVariant {
    /// Both ends connected.
    Closed,
    /// Measured side connected, other side open.
    Open,
}

/// Network element whose state decides whether a term is summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermOrigin {
    /// Always active, e.g. a variable in a control equation.
    Fixed,
    Branch {
        num: usize,
        side: Side,
        variant: BranchVariant,
    },
    Shunt(usize),
    Hvdc(usize),
    /// Voltage dependent load of a bus.
    Load(usize),
}

/// A formula with a constant factor, an activity flag and the element it comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct EquationTerm {
    pub kind: TermKind,
    pub scale: f64,
    pub active: bool,
    pub origin: TermOrigin,
    /// Equation summing this term, `None` for attached terms.
    pub(crate) equation: Option<EquationId>,
}

impl EquationTerm {
    pub fn new(kind: TermKind, origin: TermOrigin) -> Self {
        Self {
            kind,
            scale: 1.0,
            active: true,
            origin,
            equation: None,
        }
    }

    pub fn variable(var: VariableId) -> Self {
        Self::new(TermKind::Variable(VariableTerm::new(var)), TermOrigin::Fixed)
    }

    pub fn scaled(mut self, scale: f64) -> Self {
        self.scale *= scale;
        self
    }

    pub fn equation(&self) -> Option<EquationId> {
        self.equation
    }

    pub fn variables(&self) -> &[VariableId] {
        self.kind.variables()
    }

    pub fn value(&self, x: &DVector<f64>) -> f64 {
        self.scale * self.kind.eval(x)
    }

    pub fn derivative(&self, x: &DVector<f64>, v: VariableId) -> f64 {
        self.scale * self.kind.der(x, v)
    }
}

/// Shared helper for the finite difference checks of the term families.
#[cfg(test)]
pub(crate) fn assert_derivatives<T: TermFormula>(term: &T, x: &DVector<f64>) {
    use approx::assert_relative_eq;
    let h = 1e-7;
    for &v in term.variables() {
        let mut xp = x.clone();
        let mut xm = x.clone();
        xp[*v] += h;
        xm[*v] -= h;
        let numeric = (term.eval(&xp) - term.eval(&xm)) / (2.0 * h);
        assert_relative_eq!(term.der(x, v), numeric, epsilon = 1e-6, max_relative = 1e-5);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_term_scaled() {
        let x = DVector::from_vec(vec![0.5, 2.0]);
        let t = EquationTerm::variable(VariableId(1)).scaled(-3.0);
        assert_eq!(t.value(&x), -6.0);
        assert_eq!(t.derivative(&x, VariableId(1)), -3.0);
        assert_eq!(t.variables(), &[VariableId(1)]);
    }

    #[test]
    #[should_panic(expected = "does not depend on variable")]
    fn test_undeclared_variable_panics() {
        let x = DVector::from_vec(vec![0.5, 2.0]);
        EquationTerm::variable(VariableId(1)).derivative(&x, VariableId(0));
    }
}
