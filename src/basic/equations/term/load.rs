use nalgebra::DVector;

use super::{TermFormula, undeclared_variable};
use crate::basic::equations::types::VariableId;

/// Voltage dependent consumption `target * Σ c v^n`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTerm {
    target: f64,
    terms: Vec<(f64, f64)>,
    v: [VariableId; 1],
}

impl LoadTerm {
    pub fn new(target: f64, terms: Vec<(f64, f64)>, v: VariableId) -> Self {
        Self { target, terms, v: [v] }
    }
}

impl TermFormula for LoadTerm {
    fn variables(&self) -> &[VariableId] {
        &self.v
    }

    fn eval(&self, x: &DVector<f64>) -> f64 {
        let v = x[*self.v[0]];
        self.target * self.terms.iter().map(|&(c, n)| c * v.powf(n)).sum::<f64>()
    }

    fn der(&self, x: &DVector<f64>, var: VariableId) -> f64 {
        if var != self.v[0] {
            undeclared_variable(self.name(), var);
        }
        let v = x[*self.v[0]];
        self.target
            * self
                .terms
                .iter()
                .filter(|&&(_, n)| n != 0.0)
                .map(|&(c, n)| c * n * v.powf(n - 1.0))
                .sum::<f64>()
    }

    fn name(&self) -> &'static str {
        "load model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::equations::term::assert_derivatives;
    use crate::basic::network::LoadModel;
    use approx::assert_relative_eq;

    #[test]
    fn test_zip_load() {
        let model = LoadModel::zip(0.5, 0.2, 0.3, 0.3, 0.4);
        let t = LoadTerm::new(model.p0, model.p_terms, VariableId(0));
        let x = DVector::from_vec(vec![1.0]);
        // shares sum to one at nominal voltage
        assert_relative_eq!(t.eval(&x), 0.5, epsilon = 1e-12);
        let x = DVector::from_vec(vec![0.9]);
        assert_relative_eq!(t.eval(&x), 0.5 * (0.3 * 0.81 + 0.3 * 0.9 + 0.4), epsilon = 1e-12);
        assert_relative_eq!(t.der(&x, VariableId(0)), 0.5 * (0.6 * 0.9 + 0.3), epsilon = 1e-12);
        assert_derivatives(&t, &x);
    }

    #[test]
    fn test_exponential_load() {
        let model = LoadModel::exponential(1.0, 0.4, 1.5, 2.5);
        let t = LoadTerm::new(model.q0, model.q_terms, VariableId(0));
        let x = DVector::from_vec(vec![1.05]);
        assert_relative_eq!(t.eval(&x), 0.4 * 1.05f64.powf(2.5), epsilon = 1e-12);
        assert_derivatives(&t, &x);
    }
}
