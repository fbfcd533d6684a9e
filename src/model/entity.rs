use crate::core::DataType;
use super::Association;

/// How the runtime fills a property without the caller supplying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoPopulated {
    DateCreated,
    DateUpdated,
    Uuid,
    /// Optimistic-lock version counter.
    Version,
}

/// Describes a single persistent column of an entity.
#[derive(Debug, Clone)]
pub struct PersistentProperty {
    pub name: String,
    pub column: String,
    pub data_type: DataType,
    /// Value assigned by the database (identity columns).
    pub generated: bool,
    pub auto_populated: Option<AutoPopulated>,
    pub updatable: bool,
}

impl PersistentProperty {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            data_type,
            generated: false,
            auto_populated: None,
            updatable: true,
        }
    }

    /// Set the column name
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Mark the value as generated by the database
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    /// Mark the value as auto-populated by the runtime
    ///
    /// Date-created columns are never rewritten by updates.
    pub fn auto_populated(mut self, kind: AutoPopulated) -> Self {
        self.auto_populated = Some(kind);
        if kind == AutoPopulated::DateCreated {
            self.updatable = false;
        }
        self
    }

    pub fn not_updatable(mut self) -> Self {
        self.updatable = false;
        self
    }

    pub fn is_version(&self) -> bool {
        self.auto_populated == Some(AutoPopulated::Version)
    }
}

/// Metadata of a persistent entity type.
#[derive(Debug, Clone)]
pub struct PersistentEntity {
    name: String,
    table: String,
    identity: Option<PersistentProperty>,
    properties: Vec<PersistentProperty>,
    associations: Vec<Association>,
}

impl PersistentEntity {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            identity: None,
            properties: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn with_identity(mut self, identity: PersistentProperty) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_property(mut self, property: PersistentProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn identity(&self) -> Option<&PersistentProperty> {
        self.identity.as_ref()
    }

    /// Non-identity properties in declaration order.
    pub fn properties(&self) -> &[PersistentProperty] {
        &self.properties
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn has_generated_identity(&self) -> bool {
        self.identity.as_ref().is_some_and(|id| id.generated)
    }

    pub fn version(&self) -> Option<&PersistentProperty> {
        self.properties.iter().find(|p| p.is_version())
    }

    /// Identity first, then the remaining properties.
    pub fn all_properties(&self) -> impl Iterator<Item = &PersistentProperty> {
        self.identity.iter().chain(self.properties.iter())
    }

    pub fn auto_populated_properties(&self) -> impl Iterator<Item = &PersistentProperty> {
        self.all_properties().filter(|p| p.auto_populated.is_some())
    }

    pub fn property(&self, name: &str) -> Option<&PersistentProperty> {
        self.all_properties().find(|p| p.name == name)
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.property(name).is_some() || self.association(name).is_some()
    }

    /// Column backing a property or an owning association.
    pub fn column_for(&self, name: &str) -> Option<&str> {
        if let Some(property) = self.property(name) {
            return Some(&property.column);
        }
        self.association(name)
            .filter(|a| !a.is_foreign_key())
            .map(|a| a.column.as_str())
    }
}
