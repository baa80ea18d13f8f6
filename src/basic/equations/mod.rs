//! Variables, terms and equations of a nonlinear system, independent of how
//! the network maps onto them.
pub mod display;
pub mod equation;
pub mod evaluate;
pub mod system;
pub mod term;
pub mod types;
pub mod variable;

pub use equation::{DistributionLayout, Equation};
pub use evaluate::Evaluation;
pub use system::EquationSystem;
pub use term::{BranchVariant, EquationTerm, TermFormula, TermKind, TermOrigin};
pub use types::{ElementType, EquationId, EquationType, TermId, VariableId, VariableType};
pub use variable::{Variable, VariableSet};
