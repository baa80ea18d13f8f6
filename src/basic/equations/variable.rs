use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::types::{ElementType, VariableId, VariableType};

/// An unknown of the system, identified by its element and type.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display("{ty}#{element_num}")]
pub struct Variable {
    pub id: VariableId,
    pub element_num: usize,
    pub ty: VariableType,
}

impl Variable {
    pub fn element_type(&self) -> ElementType {
        self.ty.element_type()
    }
}

/// Registry of variables. Requesting the same `(element, type)` pair twice
/// returns the same id, and ids follow creation order.
#[derive(Debug, Default, Clone)]
pub struct VariableSet {
    variables: Vec<Variable>,
    slots: [Vec<Option<VariableId>>; VariableType::COUNT],
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, element_num: usize, ty: VariableType) -> VariableId {
        if let Some(id) = self.get(element_num, ty) {
            return id;
        }
        let id = VariableId(self.variables.len());
        self.variables.push(Variable { id, element_num, ty });
        let slots = &mut self.slots[ty.idx()];
        if slots.len() <= element_num {
            slots.resize(element_num + 1, None);
        }
        slots[element_num] = Some(id);
        id
    }

    pub fn get(&self, element_num: usize, ty: VariableType) -> Option<VariableId> {
        self.slots[ty.idx()].get(element_num).copied().flatten()
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[*id]
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }
}
