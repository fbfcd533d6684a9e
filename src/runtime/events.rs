use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{Level, event};
use crate::core::{Result, Value};
use crate::model::{AutoPopulated, EntityRef, PersistentEntity};
use super::AutoPopulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    PrePersist,
    PostPersist,
    PreUpdate,
    PostUpdate,
    PreRemove,
    PostRemove,
    PostLoad,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PrePersist => "PRE_PERSIST",
            Self::PostPersist => "POST_PERSIST",
            Self::PreUpdate => "PRE_UPDATE",
            Self::PostUpdate => "POST_UPDATE",
            Self::PreRemove => "PRE_REMOVE",
            Self::PostRemove => "POST_REMOVE",
            Self::PostLoad => "POST_LOAD",
        };
        write!(f, "{}", name)
    }
}

/// Result of a pre-event hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Continue,
    /// Skip the row: no statement, no cascade, zero affected rows.
    Veto,
}

/// Hooks around entity writes and loads.
///
/// Every hook defaults to a no-op, so a listener only implements what it
/// cares about. Pre hooks may mutate the entity before it is bound.
pub trait EntityEventListener: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, _entity: &PersistentEntity, _event: EventType) -> bool {
        true
    }

    fn pre_persist(&self, _entity: &EntityRef) -> Result<EventOutcome> {
        Ok(EventOutcome::Continue)
    }

    fn post_persist(&self, _entity: &EntityRef) -> Result<()> {
        Ok(())
    }

    fn pre_update(&self, _entity: &EntityRef) -> Result<EventOutcome> {
        Ok(EventOutcome::Continue)
    }

    fn post_update(&self, _entity: &EntityRef) -> Result<()> {
        Ok(())
    }

    fn pre_remove(&self, _entity: &EntityRef) -> Result<EventOutcome> {
        Ok(EventOutcome::Continue)
    }

    fn post_remove(&self, _entity: &EntityRef) -> Result<()> {
        Ok(())
    }

    fn post_load(&self, _entity: &EntityRef) -> Result<()> {
        Ok(())
    }
}

/// Ordered listeners: global ones first, then those registered for the entity.
#[derive(Default)]
pub struct EventListenerRegistry {
    global: Vec<Arc<dyn EntityEventListener>>,
    per_entity: HashMap<String, Vec<Arc<dyn EntityEventListener>>>,
}

impl EventListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in auto-population listener.
    pub fn with_auto_population(populator: Arc<dyn AutoPopulator>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AutoPopulatedListener::new(populator)));
        registry
    }

    pub fn register(&mut self, listener: Arc<dyn EntityEventListener>) {
        event!(Level::DEBUG, listener = listener.name(), "registered entity listener");
        self.global.push(listener);
    }

    pub fn register_for(&mut self, entity: impl Into<String>, listener: Arc<dyn EntityEventListener>) {
        let entity = entity.into();
        event!(Level::DEBUG, listener = listener.name(), entity = %entity, "registered entity listener");
        self.per_entity.entry(entity).or_default().push(listener);
    }

    /// Appends `other`'s listeners after the ones already registered.
    pub fn extend(&mut self, other: EventListenerRegistry) {
        self.global.extend(other.global);
        for (entity, listeners) in other.per_entity {
            self.per_entity.entry(entity).or_default().extend(listeners);
        }
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.per_entity.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn listeners<'a>(
        &'a self,
        entity: &'a PersistentEntity,
        event_type: EventType,
    ) -> impl Iterator<Item = &'a Arc<dyn EntityEventListener>> + 'a {
        self.global
            .iter()
            .chain(self.per_entity.get(entity.name()).into_iter().flatten())
            .filter(move |listener| listener.supports(entity, event_type))
    }

    /// Runs pre hooks in order, stopping at the first veto.
    pub fn fire_pre(&self, event_type: EventType, entity: &EntityRef) -> Result<EventOutcome> {
        for listener in self.listeners(entity.entity(), event_type) {
            let outcome = match event_type {
                EventType::PrePersist => listener.pre_persist(entity)?,
                EventType::PreUpdate => listener.pre_update(entity)?,
                EventType::PreRemove => listener.pre_remove(entity)?,
                _ => EventOutcome::Continue,
            };
            if outcome == EventOutcome::Veto {
                event!(
                    Level::DEBUG,
                    listener = listener.name(),
                    entity = %entity,
                    event = %event_type,
                    "row vetoed"
                );
                return Ok(EventOutcome::Veto);
            }
        }
        Ok(EventOutcome::Continue)
    }

    pub fn fire_post(&self, event_type: EventType, entity: &EntityRef) -> Result<()> {
        for listener in self.listeners(entity.entity(), event_type) {
            match event_type {
                EventType::PostPersist => listener.post_persist(entity)?,
                EventType::PostUpdate => listener.post_update(entity)?,
                EventType::PostRemove => listener.post_remove(entity)?,
                EventType::PostLoad => listener.post_load(entity)?,
                _ => {}
            }
        }
        Ok(())
    }
}

/// Fills auto-populated properties before a row is bound.
///
/// On persist: dates are set, null UUIDs generated, a null version starts
/// at 0. On update: date-updated is refreshed and the version incremented.
pub struct AutoPopulatedListener {
    populator: Arc<dyn AutoPopulator>,
}

impl AutoPopulatedListener {
    pub fn new(populator: Arc<dyn AutoPopulator>) -> Self {
        Self { populator }
    }
}

impl EntityEventListener for AutoPopulatedListener {
    fn name(&self) -> &'static str {
        "auto-populated"
    }

    fn supports(&self, entity: &PersistentEntity, event_type: EventType) -> bool {
        matches!(event_type, EventType::PrePersist | EventType::PreUpdate)
            && entity.auto_populated_properties().next().is_some()
    }

    fn pre_persist(&self, entity: &EntityRef) -> Result<EventOutcome> {
        let metadata = Arc::clone(entity.entity());
        for property in metadata.auto_populated_properties() {
            let current = entity.get(&property.name);
            let fill = match property.auto_populated {
                Some(AutoPopulated::DateCreated | AutoPopulated::DateUpdated) => true,
                Some(AutoPopulated::Uuid | AutoPopulated::Version) => current.is_null(),
                None => false,
            };
            if fill {
                let value = self.populator.populate(property, &Value::Null)?;
                entity.set(&property.name, value);
            }
        }
        Ok(EventOutcome::Continue)
    }

    fn pre_update(&self, entity: &EntityRef) -> Result<EventOutcome> {
        let metadata = Arc::clone(entity.entity());
        for property in metadata.auto_populated_properties() {
            match property.auto_populated {
                Some(AutoPopulated::DateUpdated) => {
                    let value = self.populator.populate(property, &Value::Null)?;
                    entity.set(&property.name, value);
                }
                Some(AutoPopulated::Version) => {
                    let previous = entity.get(&property.name);
                    let value = self.populator.populate(property, &previous)?;
                    entity.set(&property.name, value);
                }
                _ => {}
            }
        }
        Ok(EventOutcome::Continue)
    }
}
