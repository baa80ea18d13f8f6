use std::fmt;

use nalgebra::DVector;
use tabled::{Table, Tabled, settings::Style};

use super::system::EquationSystem;

/// A float printed with a fixed number of decimals.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub(crate) struct FloatWrapper {
    pub(crate) value: f64,
    pub(crate) precision: usize,
}

impl FloatWrapper {
    pub fn new(value: f64, precision: usize) -> Self {
        FloatWrapper { value, precision }
    }
}

impl fmt::Display for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

impl fmt::Debug for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| FloatWrapper::new(v, 6).to_string())
}

/// Table row describing one equation.
#[derive(Debug, Tabled)]
struct EquationRow {
    id: usize,
    equation: String,
    active: bool,
    terms: String,
    rhs: String,
    residual: String,
}

impl EquationSystem {
    /// Markdown table of every equation, with residuals when a state is given.
    pub fn to_table(&self, x: Option<&DVector<f64>>) -> String {
        let rows = self.equations().iter().map(|eq| {
            let active_terms = eq.terms().iter().filter(|&&t| self.term(t).active).count();
            let residual = x.map(|x| self.equation_value(eq.id, x) - eq.rhs().unwrap_or(0.0));
            EquationRow {
                id: *eq.id,
                equation: eq.to_string(),
                active: eq.is_active(),
                terms: format!("{active_terms}/{}", eq.terms().len()),
                rhs: optional(eq.rhs()),
                residual: optional(residual),
            }
        });
        Table::new(rows).with(Style::markdown()).to_string()
    }
}

impl fmt::Display for EquationSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.active_equations().count();
        writeln!(
            f,
            "{} equations ({active} active), {} variables ({} active)",
            self.equation_count(),
            self.variable_count(),
            self.active_variables().len()
        )?;
        write!(f, "{}", self.to_table(None))
    }
}
