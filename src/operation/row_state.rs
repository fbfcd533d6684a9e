use crate::binder::PreviousValues;
use crate::model::EntityRef;

/// Mutable per-row record of one entity operation.
#[derive(Debug, Clone)]
pub struct EntityRowState {
    pub entity: EntityRef,
    /// Pre-call values of bindings that need them, keyed by binding position.
    pub previous: PreviousValues,
    /// A pre-event listener rejected the row.
    pub vetoed: bool,
    pub rows_updated: u64,
}

impl EntityRowState {
    pub fn new(entity: EntityRef) -> Self {
        Self {
            entity,
            previous: PreviousValues::new(),
            vetoed: false,
            rows_updated: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.vetoed
    }
}
