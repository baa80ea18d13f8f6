use std::collections::BTreeSet;

use tracing::trace;

use super::equation::{DistributionLayout, Equation};
use super::term::{EquationTerm, TermFormula, TermOrigin};
use super::types::{ElementType, EquationId, EquationType, TermId, VariableId, VariableType};
use super::variable::VariableSet;

const ELEMENT_TYPES: usize = 4;

fn element_slot(ty: ElementType) -> usize {
    match ty {
        ElementType::Bus => 0,
        ElementType::Branch => 1,
        ElementType::Shunt => 2,
        ElementType::Hvdc => 3,
    }
}

fn origin_key(origin: TermOrigin) -> Option<(ElementType, usize)> {
    match origin {
        TermOrigin::Fixed => None,
        TermOrigin::Branch { num, .. } => Some((ElementType::Branch, num)),
        TermOrigin::Shunt(num) => Some((ElementType::Shunt, num)),
        TermOrigin::Hvdc(num) => Some((ElementType::Hvdc, num)),
        TermOrigin::Load(num) => Some((ElementType::Bus, num)),
    }
}

fn push_slot<T: Clone>(slots: &mut Vec<Vec<T>>, num: usize, value: T) {
    if slots.len() <= num {
        slots.resize(num + 1, Vec::new());
    }
    slots[num].push(value);
}

/// Variables, equations and the terms wiring them together.
///
/// Equations are looked up by `(element, type)` through dense per type slots.
/// Terms live in an arena and are indexed by the element whose state decides
/// their activity, so the updater can reach them without scanning equations.
/// Slots of removed terms are reused, live term ids never move.
#[derive(Debug, Default, Clone)]
pub struct EquationSystem {
    variables: VariableSet,
    equations: Vec<Equation>,
    equation_slots: [Vec<Option<EquationId>>; EquationType::COUNT],
    equations_by_element: [Vec<Vec<EquationId>>; ELEMENT_TYPES],
    terms: Vec<EquationTerm>,
    terms_by_element: [Vec<Vec<TermId>>; ELEMENT_TYPES],
    terms_by_variable: Vec<Vec<TermId>>,
    free_terms: Vec<TermId>,
    attached: Vec<TermId>,
}

impl EquationSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn equation_count(&self) -> usize {
        self.equations.len()
    }

    pub fn create_variable(&mut self, element_num: usize, ty: VariableType) -> VariableId {
        self.variables.get_or_create(element_num, ty)
    }

    pub fn get_variable(&self, element_num: usize, ty: VariableType) -> Option<VariableId> {
        self.variables.get(element_num, ty)
    }

    /// Returns the existing equation or creates an active, empty one.
    pub fn create_equation(&mut self, element_num: usize, ty: EquationType) -> EquationId {
        if let Some(id) = self.equation_id(element_num, ty) {
            return id;
        }
        let id = EquationId(self.equations.len());
        self.equations.push(Equation::new(id, element_num, ty));
        let slots = &mut self.equation_slots[ty.idx()];
        if slots.len() <= element_num {
            slots.resize(element_num + 1, None);
        }
        slots[element_num] = Some(id);
        push_slot(
            &mut self.equations_by_element[element_slot(ty.element_type())],
            element_num,
            id,
        );
        id
    }

    pub fn equation_id(&self, element_num: usize, ty: EquationType) -> Option<EquationId> {
        self.equation_slots[ty.idx()].get(element_num).copied().flatten()
    }

    /// Id of an equation the assembly guarantees to exist.
    ///
    /// # Panics
    /// If the equation was never created.
    #[track_caller]
    pub fn expect_equation(&self, element_num: usize, ty: EquationType) -> EquationId {
        match self.equation_id(element_num, ty) {
            Some(id) => id,
            None => panic!("equation {ty}#{element_num} is missing from the system"),
        }
    }

    pub fn equation(&self, id: EquationId) -> &Equation {
        &self.equations[*id]
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn equations_for(&self, element_type: ElementType, num: usize) -> Vec<&Equation> {
        self.equations_by_element[element_slot(element_type)]
            .get(num)
            .map(|ids| ids.iter().map(|&id| &self.equations[*id]).collect())
            .unwrap_or_default()
    }

    pub fn is_active(&self, id: EquationId) -> bool {
        self.equations[*id].active
    }

    /// Returns whether the flag changed.
    pub fn set_active(&mut self, id: EquationId, active: bool) -> bool {
        let eq = &mut self.equations[*id];
        if eq.active == active {
            return false;
        }
        eq.active = active;
        trace!(equation = %eq, active, "equation toggled");
        true
    }

    pub fn set_rhs(&mut self, id: EquationId, rhs: Option<f64>) {
        self.equations[*id].rhs = rhs;
    }

    pub(crate) fn set_layout(&mut self, id: EquationId, layout: Option<DistributionLayout>) {
        self.equations[*id].layout = layout;
    }

    pub fn term(&self, id: TermId) -> &EquationTerm {
        &self.terms[*id]
    }

    /// The term arena. Free slots hold inactive terms of no equation.
    pub fn terms(&self) -> &[EquationTerm] {
        &self.terms
    }

    /// Terms whose activity follows the given element.
    pub fn terms_of_element(&self, element_type: ElementType, num: usize) -> &[TermId] {
        self.terms_by_element[element_slot(element_type)]
            .get(num)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Terms depending on a variable, attached ones included.
    pub fn terms_of_variable(&self, v: VariableId) -> &[TermId] {
        self.terms_by_variable.get(*v).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether an active term of an active equation, other than those of
    /// `excluded` type, depends on `v`.
    pub fn is_variable_used(&self, v: VariableId, excluded: EquationType) -> bool {
        self.terms_of_variable(v).iter().any(|&t| {
            let term = &self.terms[*t];
            term.active
                && term.equation.is_some_and(|eq| {
                    let eq = &self.equations[*eq];
                    eq.active && eq.ty != excluded
                })
        })
    }

    fn insert_term(&mut self, term: EquationTerm) -> TermId {
        for &v in term.variables() {
            assert!(
                *v < self.variables.len(),
                "{} term references unknown variable {v}",
                term.kind.name()
            );
        }
        let id = self.free_terms.pop().unwrap_or(TermId(self.terms.len()));
        if let Some((ty, num)) = origin_key(term.origin) {
            push_slot(&mut self.terms_by_element[element_slot(ty)], num, id);
        }
        for &v in term.variables() {
            push_slot(&mut self.terms_by_variable, *v, id);
        }
        if *id == self.terms.len() {
            self.terms.push(term);
        } else {
            self.terms[*id] = term;
        }
        id
    }

    fn unindex_term(&mut self, id: TermId) {
        if let Some((ty, num)) = origin_key(self.terms[*id].origin) {
            if let Some(ids) = self.terms_by_element[element_slot(ty)].get_mut(num) {
                ids.retain(|&t| t != id);
            }
        }
        for &v in self.terms[*id].variables() {
            self.terms_by_variable[*v].retain(|&t| t != id);
        }
        let term = &mut self.terms[*id];
        term.equation = None;
        term.active = false;
        self.free_terms.push(id);
    }

    /// Appends a term to the sum of an equation.
    ///
    /// # Panics
    /// If the term depends on a variable that does not exist.
    pub fn add_term(&mut self, eq: EquationId, mut term: EquationTerm) -> TermId {
        term.equation = Some(eq);
        let id = self.insert_term(term);
        self.equations[*eq].terms.push(id);
        id
    }

    /// Replaces all terms of an equation. Replaced terms leave every index
    /// and their slots go to the new ones.
    pub fn replace_terms(&mut self, eq: EquationId, terms: Vec<EquationTerm>) -> Vec<TermId> {
        for old in std::mem::take(&mut self.equations[*eq].terms) {
            self.unindex_term(old);
        }
        terms.into_iter().map(|t| self.add_term(eq, t)).collect()
    }

    /// Returns whether the flag changed.
    pub fn set_term_active(&mut self, id: TermId, active: bool) -> bool {
        let term = &mut self.terms[*id];
        if term.active == active {
            return false;
        }
        term.active = active;
        true
    }

    /// Registers an evaluable term that belongs to no equation.
    pub fn attach(&mut self, term: EquationTerm) -> TermId {
        let id = self.insert_term(term);
        self.attached.push(id);
        id
    }

    pub fn detach(&mut self, id: TermId) {
        let before = self.attached.len();
        self.attached.retain(|&t| t != id);
        if self.attached.len() != before {
            self.unindex_term(id);
        }
    }

    pub fn attached_terms(&self) -> &[TermId] {
        &self.attached
    }

    pub fn active_equations(&self) -> impl Iterator<Item = &Equation> {
        self.equations.iter().filter(|e| e.active)
    }

    /// Variables referenced by an active term of an active equation, sorted by id.
    pub fn active_variables(&self) -> Vec<VariableId> {
        let mut set = BTreeSet::new();
        for eq in self.active_equations() {
            for &t in &eq.terms {
                let term = &self.terms[*t];
                if term.active {
                    set.extend(term.variables().iter().copied());
                }
            }
        }
        set.into_iter().collect()
    }

    /// One active equation per active variable.
    pub fn is_balanced(&self) -> bool {
        self.active_equations().count() == self.active_variables().len()
    }
}
