use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use super::system::EquationSystem;
use super::types::{EquationId, TermId, VariableId};

/// Residuals and Jacobian of the active part of the system at one state.
///
/// Row `i` is `rows[i]`, column `j` is `columns[j]`; both follow id order.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub rows: Vec<EquationId>,
    pub columns: Vec<VariableId>,
    pub residuals: DVector<f64>,
    pub jacobian: CscMatrix<f64>,
}

impl EquationSystem {
    /// Sum of the active terms of an equation, without the right hand side.
    pub fn equation_value(&self, id: EquationId, x: &DVector<f64>) -> f64 {
        self.equation(id)
            .terms()
            .iter()
            .map(|&t| self.term(t))
            .filter(|t| t.active)
            .map(|t| t.value(x))
            .sum()
    }

    /// Value of a term regardless of its activity, typically an attached one.
    pub fn term_value(&self, id: TermId, x: &DVector<f64>) -> f64 {
        self.term(id).value(x)
    }

    /// Evaluates active equations over the state vector `x`, indexed by variable id.
    ///
    /// # Panics
    /// If `x` does not hold one value per variable.
    pub fn evaluate(&self, x: &DVector<f64>) -> Evaluation {
        assert_eq!(
            x.len(),
            self.variable_count(),
            "state vector size does not match the variable count"
        );
        let columns = self.active_variables();
        let mut column_of = vec![None; self.variable_count()];
        for (j, v) in columns.iter().enumerate() {
            column_of[**v] = Some(j);
        }
        let rows: Vec<EquationId> = self.active_equations().map(|e| e.id).collect();

        let mut residuals = DVector::zeros(rows.len());
        let mut coo = CooMatrix::new(rows.len(), columns.len());
        for (i, &eq) in rows.iter().enumerate() {
            let equation = self.equation(eq);
            let mut value = -equation.rhs().unwrap_or(0.0);
            for &t in equation.terms() {
                let term = self.term(t);
                if !term.active {
                    continue;
                }
                value += term.value(x);
                for &v in term.variables() {
                    // every variable of an active term has a column
                    if let Some(j) = column_of[*v] {
                        coo.push(i, j, term.derivative(x, v));
                    }
                }
            }
            residuals[i] = value;
        }
        Evaluation {
            rows,
            columns,
            residuals,
            jacobian: CscMatrix::from(&coo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::equations::term::EquationTerm;
    use crate::basic::equations::types::{EquationType, VariableType};
    use approx::assert_relative_eq;

    #[test]
    fn test_evaluate_skips_inactive_parts() {
        let mut sys = EquationSystem::new();
        let v0 = sys.create_variable(0, VariableType::BusV);
        let v1 = sys.create_variable(1, VariableType::BusV);
        let phi = sys.create_variable(0, VariableType::BusPhi);

        let e0 = sys.create_equation(0, EquationType::BusTargetV);
        sys.add_term(e0, EquationTerm::variable(v0));
        sys.add_term(e0, EquationTerm::variable(v1).scaled(-2.0));
        sys.set_rhs(e0, Some(0.5));
        let e1 = sys.create_equation(1, EquationType::BusTargetV);
        sys.add_term(e1, EquationTerm::variable(v1));
        let skipped = sys.add_term(e1, EquationTerm::variable(phi));
        sys.set_term_active(skipped, false);
        let e2 = sys.create_equation(0, EquationType::BusTargetPhi);
        sys.add_term(e2, EquationTerm::variable(phi));
        sys.set_active(e2, false);

        let x = DVector::from_vec(vec![1.1, 0.9, 0.3]);
        let eval = sys.evaluate(&x);
        assert_eq!(eval.rows, vec![e0, e1]);
        assert_eq!(eval.columns, vec![v0, v1]);
        assert_relative_eq!(eval.residuals[0], 1.1 - 1.8 - 0.5, epsilon = 1e-12);
        assert_relative_eq!(eval.residuals[1], 0.9, epsilon = 1e-12);

        let dense = nalgebra::DMatrix::from(&eval.jacobian);
        assert_eq!(dense, nalgebra::dmatrix![1.0, -2.0; 0.0, 1.0]);
        assert!(sys.is_balanced());
    }

    #[test]
    fn test_duplicate_entries_are_summed() {
        let mut sys = EquationSystem::new();
        let v = sys.create_variable(0, VariableType::BusV);
        let e = sys.create_equation(0, EquationType::BusTargetV);
        sys.add_term(e, EquationTerm::variable(v));
        sys.add_term(e, EquationTerm::variable(v).scaled(2.0));
        let eval = sys.evaluate(&DVector::from_vec(vec![1.0]));
        assert_relative_eq!(eval.residuals[0], 3.0);
        assert_eq!(nalgebra::DMatrix::from(&eval.jacobian)[(0, 0)], 3.0);
    }
}
