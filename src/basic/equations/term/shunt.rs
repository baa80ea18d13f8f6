use nalgebra::DVector;

use super::{TermFormula, undeclared_variable};
use crate::basic::equations::types::VariableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShuntQuantity {
    P,
    Q,
}

/// Power flowing from a bus into a shunt admittance, `p = g v²` and `q = -b v²`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShuntTerm {
    quantity: ShuntQuantity,
    g: f64,
    b: f64,
    v: VariableId,
    b_var: Option<VariableId>,
    list: Vec<VariableId>,
}

impl ShuntTerm {
    /// With `b_var` the susceptance is read from the state vector.
    pub fn new(
        quantity: ShuntQuantity,
        g: f64,
        b: f64,
        v: VariableId,
        b_var: Option<VariableId>,
    ) -> Self {
        let b_var = b_var.filter(|_| quantity == ShuntQuantity::Q);
        let mut list = vec![v];
        list.extend(b_var);
        Self {
            quantity,
            g,
            b,
            v,
            b_var,
            list,
        }
    }

    fn susceptance(&self, x: &DVector<f64>) -> f64 {
        self.b_var.map_or(self.b, |b| x[*b])
    }
}

impl TermFormula for ShuntTerm {
    fn variables(&self) -> &[VariableId] {
        &self.list
    }

    fn eval(&self, x: &DVector<f64>) -> f64 {
        let v = x[*self.v];
        match self.quantity {
            ShuntQuantity::P => self.g * v * v,
            ShuntQuantity::Q => -self.susceptance(x) * v * v,
        }
    }

    fn der(&self, x: &DVector<f64>, var: VariableId) -> f64 {
        let v = x[*self.v];
        if var == self.v {
            match self.quantity {
                ShuntQuantity::P => 2.0 * self.g * v,
                ShuntQuantity::Q => -2.0 * self.susceptance(x) * v,
            }
        } else if Some(var) == self.b_var {
            -v * v
        } else {
            undeclared_variable(self.name(), var)
        }
    }

    fn name(&self) -> &'static str {
        match self.quantity {
            ShuntQuantity::P => "shunt active power",
            ShuntQuantity::Q => "shunt reactive power",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::equations::term::assert_derivatives;

    #[test]
    fn test_shunt_values() {
        let x = DVector::from_vec(vec![1.1, 0.3]);
        let p = ShuntTerm::new(ShuntQuantity::P, 0.01, 0.2, VariableId(0), None);
        let q = ShuntTerm::new(ShuntQuantity::Q, 0.01, 0.2, VariableId(0), None);
        let q_var = ShuntTerm::new(ShuntQuantity::Q, 0.01, 0.2, VariableId(0), Some(VariableId(1)));
        approx::assert_relative_eq!(p.eval(&x), 0.01 * 1.21, epsilon = 1e-12);
        approx::assert_relative_eq!(q.eval(&x), -0.2 * 1.21, epsilon = 1e-12);
        approx::assert_relative_eq!(q_var.eval(&x), -0.3 * 1.21, epsilon = 1e-12);
        approx::assert_relative_eq!(q_var.der(&x, VariableId(1)), -1.21, epsilon = 1e-12);
    }

    #[test]
    fn test_shunt_derivatives() {
        let x = DVector::from_vec(vec![0.98, 0.25]);
        assert_derivatives(&ShuntTerm::new(ShuntQuantity::P, 0.02, 0.1, VariableId(0), None), &x);
        assert_derivatives(
            &ShuntTerm::new(ShuntQuantity::Q, 0.02, 0.1, VariableId(0), Some(VariableId(1))),
            &x,
        );
    }

    #[test]
    fn test_active_term_ignores_susceptance_variable() {
        let p = ShuntTerm::new(ShuntQuantity::P, 0.02, 0.1, VariableId(0), Some(VariableId(1)));
        assert_eq!(p.variables(), &[VariableId(0)]);
    }
}
