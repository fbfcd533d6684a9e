use super::PersistentEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    ManyToOne,
    OneToOne,
    OneToMany,
    ManyToMany,
}

/// Write operations propagated from the owner to an association.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cascade {
    pub persist: bool,
    pub update: bool,
}

impl Cascade {
    pub const NONE: Cascade = Cascade { persist: false, update: false };
    pub const PERSIST: Cascade = Cascade { persist: true, update: false };
    pub const UPDATE: Cascade = Cascade { persist: false, update: true };
    pub const ALL: Cascade = Cascade { persist: true, update: true };

    pub fn is_none(&self) -> bool {
        !self.persist && !self.update
    }
}

/// Link table holding (owner id, target id) pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    pub name: String,
    pub owner_column: String,
    pub target_column: String,
}

impl JoinTable {
    pub fn new(
        name: impl Into<String>,
        owner_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            owner_column: owner_column.into(),
            target_column: target_column.into(),
        }
    }
}

/// An association from an owning entity to another entity type.
///
/// `target` names the associated entity; it is resolved through the
/// [`EntityRegistry`](super::EntityRegistry) so metadata may be cyclic.
#[derive(Debug, Clone)]
pub struct Association {
    pub name: String,
    pub kind: Relation,
    pub target: String,
    /// Foreign-key column on the owner's table (owning single-valued side only).
    pub column: String,
    pub mapped_by: Option<String>,
    pub join_table: Option<JoinTable>,
    pub cascade: Cascade,
}

impl Association {
    pub fn new(name: impl Into<String>, kind: Relation, target: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            column: format!("{}_id", name),
            name,
            kind,
            target: target.into(),
            mapped_by: None,
            join_table: None,
            cascade: Cascade::NONE,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Name the property on the target that holds the foreign key back to the owner
    pub fn mapped_by(mut self, property: impl Into<String>) -> Self {
        self.mapped_by = Some(property.into());
        self
    }

    pub fn join_table(mut self, join_table: JoinTable) -> Self {
        self.join_table = Some(join_table);
        self
    }

    pub fn cascade(mut self, cascade: Cascade) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn is_many(&self) -> bool {
        matches!(self.kind, Relation::OneToMany | Relation::ManyToMany)
    }

    /// The association's column lives outside the owner's table.
    pub fn is_foreign_key(&self) -> bool {
        match self.kind {
            Relation::ManyToOne => false,
            Relation::OneToOne => self.mapped_by.is_some(),
            Relation::OneToMany | Relation::ManyToMany => true,
        }
    }

    /// Associated rows must exist before the owner row can be written.
    pub fn cascades_before_owner(&self) -> bool {
        !self.is_foreign_key()
    }

    /// Rows linking owner and target live in a join table written from this side.
    /// The inverse side of a many-to-many leaves them to the owning side.
    pub fn requires_join_table(&self) -> bool {
        match self.kind {
            Relation::ManyToMany | Relation::OneToMany => self.mapped_by.is_none(),
            _ => false,
        }
    }

    /// Explicit join table, or the conventional `<owner>_<target>` one.
    pub fn resolve_join_table(&self, owner: &PersistentEntity, target: &PersistentEntity) -> JoinTable {
        match &self.join_table {
            Some(join_table) => join_table.clone(),
            None => JoinTable::new(
                format!("{}_{}", owner.table(), target.table()),
                format!("{}_id", owner.table()),
                format!("{}_id", target.table()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_key_sides() {
        let author = Association::new("author", Relation::ManyToOne, "Author");
        assert!(!author.is_foreign_key());
        assert!(author.cascades_before_owner());

        let pages = Association::new("pages", Relation::OneToMany, "Page").mapped_by("book");
        assert!(pages.is_foreign_key());
        assert!(!pages.requires_join_table());

        let tags = Association::new("tags", Relation::OneToMany, "Tag");
        assert!(tags.requires_join_table());

        let readers = Association::new("readers", Relation::ManyToMany, "Reader").mapped_by("books");
        assert!(!readers.requires_join_table());

        let profile = Association::new("profile", Relation::OneToOne, "Profile").mapped_by("user");
        assert!(profile.is_foreign_key());
    }

    #[test]
    fn test_default_join_table() {
        let owner = PersistentEntity::new("Book", "book");
        let target = PersistentEntity::new("Genre", "genre");
        let genres = Association::new("genres", Relation::ManyToMany, "Genre");
        let join = genres.resolve_join_table(&owner, &target);
        assert_eq!(join, JoinTable::new("book_genre", "book_id", "genre_id"));
    }
}
