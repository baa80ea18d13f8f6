use derive_more::Display;

use super::types::{ElementType, EquationId, EquationType, TermId};

/// Controllers and participation keys a distribution equation was built for.
///
/// The updater compares layouts to decide whether the terms must be rebuilt.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DistributionLayout {
    /// Active controllers in control order.
    pub controllers: Vec<usize>,
    pub keys: Vec<f64>,
}

/// Sum of terms equal to an optional right hand side, over one element.
#[derive(Debug, Display, Clone, PartialEq)]
#[display("{ty}#{element_num}")]
pub struct Equation {
    pub id: EquationId,
    pub element_num: usize,
    pub ty: EquationType,
    pub(crate) terms: Vec<TermId>,
    pub(crate) active: bool,
    pub(crate) rhs: Option<f64>,
    pub(crate) layout: Option<DistributionLayout>,
}

impl Equation {
    pub(crate) fn new(id: EquationId, element_num: usize, ty: EquationType) -> Self {
        Self {
            id,
            element_num,
            ty,
            terms: Vec::new(),
            active: true,
            rhs: None,
            layout: None,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.ty.element_type()
    }

    pub fn terms(&self) -> &[TermId] {
        &self.terms
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn rhs(&self) -> Option<f64> {
        self.rhs
    }

    pub fn layout(&self) -> Option<&DistributionLayout> {
        self.layout.as_ref()
    }
}
