use std::sync::Arc;
use crate::core::{DataType, DbError, Result};
use crate::dialect::{Dialect, PaginationStyle};
use crate::model::{Association, PersistentEntity, PersistentProperty, PropertyPath};
use crate::query::{
    Direction, OperationKind, Pageable, ParameterBindingDescriptor, PreviousValueSource, Sort,
    StoredQuery,
};
use super::SqlBuilder;

/// Builds entity statements with the dialect's quoting and placeholder format.
#[derive(Debug, Clone, Copy)]
pub struct DefaultSqlBuilder {
    dialect: Dialect,
}

impl DefaultSqlBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    fn placeholders(&self, start: usize, count: usize) -> Vec<String> {
        let format = self.dialect.placeholder_format();
        (start..start + count).map(|i| format.render(i)).collect()
    }

    fn identity<'e>(&self, entity: &'e PersistentEntity) -> Result<&'e PersistentProperty> {
        entity.identity().ok_or_else(|| {
            DbError::QueryConstruction(format!("Entity '{}' declares no identity", entity.name()))
        })
    }

    /// `WHERE id = ? [AND version = ?]`, bindings appended to `bindings`.
    fn identity_predicate(
        &self,
        entity: &PersistentEntity,
        bindings: &mut Vec<ParameterBindingDescriptor>,
    ) -> Result<String> {
        let identity = self.identity(entity)?;
        let format = self.dialect.placeholder_format();

        let mut predicate = format!(
            " WHERE {} = {}",
            self.dialect.quote(&identity.column),
            format.render(bindings.len())
        );
        bindings.push(ParameterBindingDescriptor::property(
            &identity.name,
            identity.name.as_str(),
            identity.data_type,
        ));

        if let Some(version) = entity.version() {
            predicate.push_str(&format!(
                " AND {} = {}",
                self.dialect.quote(&version.column),
                format.render(bindings.len())
            ));
            bindings.push(
                ParameterBindingDescriptor::property(&version.name, version.name.as_str(), version.data_type)
                    .with_previous(PreviousValueSource::Property(PropertyPath::parse(&version.name))),
            );
        }
        Ok(predicate)
    }

    fn owning_associations(entity: &PersistentEntity) -> impl Iterator<Item = &Association> {
        entity.associations().iter().filter(|a| !a.is_foreign_key())
    }
}

impl SqlBuilder for DefaultSqlBuilder {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn build_insert(&self, entity: &Arc<PersistentEntity>) -> Result<StoredQuery> {
        let mut columns = Vec::new();
        let mut bindings = Vec::new();

        for property in entity.all_properties().filter(|p| !p.generated) {
            columns.push(self.dialect.quote(&property.column));
            bindings.push(ParameterBindingDescriptor::property(
                &property.name,
                property.name.as_str(),
                property.data_type,
            ));
        }
        for association in Self::owning_associations(entity) {
            columns.push(self.dialect.quote(&association.column));
            bindings.push(ParameterBindingDescriptor::property(
                &association.name,
                association.name.as_str(),
                DataType::Entity,
            ));
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.dialect.quote(entity.table()))
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.dialect.quote(entity.table()),
                columns.join(","),
                self.placeholders(0, bindings.len()).join(",")
            )
        };

        let query = StoredQuery::new(self.dialect, Arc::clone(entity), OperationKind::Insert, sql, bindings)?;
        Ok(match entity.identity().filter(|id| id.generated) {
            Some(identity) => query.generated_key(identity.column.clone()),
            None => query,
        })
    }

    fn build_update(&self, entity: &Arc<PersistentEntity>) -> Result<StoredQuery> {
        let format = self.dialect.placeholder_format();
        let mut assignments = Vec::new();
        let mut bindings = Vec::new();

        for property in entity.properties().iter().filter(|p| p.updatable) {
            assignments.push(format!(
                "{}={}",
                self.dialect.quote(&property.column),
                format.render(bindings.len())
            ));
            bindings.push(ParameterBindingDescriptor::property(
                &property.name,
                property.name.as_str(),
                property.data_type,
            ));
        }
        for association in Self::owning_associations(entity) {
            assignments.push(format!(
                "{}={}",
                self.dialect.quote(&association.column),
                format.render(bindings.len())
            ));
            bindings.push(ParameterBindingDescriptor::property(
                &association.name,
                association.name.as_str(),
                DataType::Entity,
            ));
        }
        if assignments.is_empty() {
            return Err(DbError::QueryConstruction(format!(
                "Entity '{}' has no updatable columns",
                entity.name()
            )));
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.dialect.quote(entity.table()),
            assignments.join(",")
        );
        sql.push_str(&self.identity_predicate(entity, &mut bindings)?);

        Ok(StoredQuery::new(self.dialect, Arc::clone(entity), OperationKind::Update, sql, bindings)?
            .optimistic_lock(entity.version().is_some()))
    }

    fn build_delete(&self, entity: &Arc<PersistentEntity>) -> Result<StoredQuery> {
        let mut bindings = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.dialect.quote(entity.table()));
        sql.push_str(&self.identity_predicate(entity, &mut bindings)?);

        Ok(StoredQuery::new(self.dialect, Arc::clone(entity), OperationKind::Delete, sql, bindings)?
            .optimistic_lock(entity.version().is_some()))
    }

    fn build_join_table_insert(
        &self,
        owner: &Arc<PersistentEntity>,
        association: &Association,
        target: &PersistentEntity,
    ) -> Result<StoredQuery> {
        let join = association.resolve_join_table(owner, target);
        let sql = format!(
            "INSERT INTO {} ({},{}) VALUES ({})",
            self.dialect.quote(&join.name),
            self.dialect.quote(&join.owner_column),
            self.dialect.quote(&join.target_column),
            self.placeholders(0, 2).join(",")
        );
        let bindings = vec![
            ParameterBindingDescriptor::argument(join.owner_column.clone(), 0, DataType::Entity),
            ParameterBindingDescriptor::argument(join.target_column.clone(), 1, DataType::Entity),
        ];
        StoredQuery::new(
            self.dialect,
            Arc::clone(owner),
            OperationKind::JoinInsert(association.name.clone()),
            sql,
            bindings,
        )
    }

    fn build_order_by(&self, entity: &PersistentEntity, sort: &Sort) -> Result<String> {
        let mut clauses = Vec::with_capacity(sort.orders().len());
        for order in sort.orders() {
            let column = entity.column_for(&order.property).ok_or_else(|| {
                DbError::QueryConstruction(format!(
                    "Cannot sort on non-existent property '{}' of entity '{}'",
                    order.property,
                    entity.name()
                ))
            })?;
            let column = self.dialect.quote(column);
            let column = if order.ignore_case {
                format!("LOWER({})", column)
            } else {
                column
            };
            let direction = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            clauses.push(format!("{} {}", column, direction));
        }
        Ok(format!(" ORDER BY {}", clauses.join(",")))
    }

    fn build_pagination(&self, pageable: &Pageable) -> String {
        let Some(size) = pageable.size() else {
            return String::new();
        };
        match self.dialect.pagination_style() {
            PaginationStyle::LimitOffset => format!(" LIMIT {} OFFSET {}", size, pageable.offset()),
            PaginationStyle::OffsetFetch => format!(
                " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                pageable.offset(),
                size
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AutoPopulated, Relation};
    use crate::query::{BindingSource, Order};

    fn book() -> Arc<PersistentEntity> {
        Arc::new(
            PersistentEntity::new("Book", "book")
                .with_identity(PersistentProperty::new("id", DataType::Integer).generated())
                .with_property(PersistentProperty::new("title", DataType::Text))
                .with_property(
                    PersistentProperty::new("created", DataType::Timestamp)
                        .auto_populated(AutoPopulated::DateCreated),
                )
                .with_property(
                    PersistentProperty::new("version", DataType::Integer).auto_populated(AutoPopulated::Version),
                )
                .with_association(Association::new("author", Relation::ManyToOne, "Author"))
                .with_association(Association::new("pages", Relation::OneToMany, "Page").mapped_by("book")),
        )
    }

    #[test]
    fn test_insert_skips_generated_identity_and_inverse_side() {
        let query = DefaultSqlBuilder::new(Dialect::H2).build_insert(&book()).unwrap();
        assert_eq!(
            query.sql(),
            r#"INSERT INTO "book" ("title","created","version","author_id") VALUES (?,?,?,?)"#
        );
        assert_eq!(query.bindings().len(), 4);
        assert_eq!(query.bindings()[3].data_type, DataType::Entity);
        assert_eq!(query.generated_key_column(), Some("id"));
        assert!(!query.is_optimistic_lock());
    }

    #[test]
    fn test_update_with_version_is_optimistic() {
        let query = DefaultSqlBuilder::new(Dialect::Postgres).build_update(&book()).unwrap();
        assert_eq!(
            query.sql(),
            r#"UPDATE "book" SET "title"=$1,"version"=$2,"author_id"=$3 WHERE "id" = $4 AND "version" = $5"#
        );
        assert!(query.is_optimistic_lock());
        let last = query.bindings().last().unwrap();
        assert!(last.requires_previous_populated_value());
        assert!(matches!(last.source, BindingSource::Property { .. }));
    }

    #[test]
    fn test_delete_by_identity() {
        let query = DefaultSqlBuilder::new(Dialect::MySql).build_delete(&book()).unwrap();
        assert_eq!(query.sql(), "DELETE FROM `book` WHERE `id` = ? AND `version` = ?");
    }

    #[test]
    fn test_update_without_identity_fails() {
        let entity = Arc::new(
            PersistentEntity::new("Log", "log").with_property(PersistentProperty::new("line", DataType::Text)),
        );
        let err = DefaultSqlBuilder::new(Dialect::H2).build_update(&entity).unwrap_err();
        assert!(matches!(err, DbError::QueryConstruction(_)));
    }

    #[test]
    fn test_join_table_insert() {
        let owner = book();
        let genre = PersistentEntity::new("Genre", "genre");
        let association = Association::new("genres", Relation::ManyToMany, "Genre");
        let query = DefaultSqlBuilder::new(Dialect::SqlServer)
            .build_join_table_insert(&owner, &association, &genre)
            .unwrap();
        assert_eq!(
            query.sql(),
            "INSERT INTO [book_genre] ([book_id],[genre_id]) VALUES (@p1,@p2)"
        );
        assert_eq!(query.kind(), &OperationKind::JoinInsert("genres".into()));
    }

    #[test]
    fn test_order_by_and_pagination() {
        let builder = DefaultSqlBuilder::new(Dialect::H2);
        let sort = Sort::by(vec![Order::asc("title").ignore_case(), Order::desc("author")]);
        assert_eq!(
            builder.build_order_by(&book(), &sort).unwrap(),
            r#" ORDER BY LOWER("title") ASC,"author_id" DESC"#
        );
        assert!(builder.build_order_by(&book(), &Sort::by(vec![Order::asc("pages")])).is_err());
        assert_eq!(builder.build_pagination(&Pageable::of(1, 5)), " LIMIT 5 OFFSET 5");
        assert_eq!(builder.build_pagination(&Pageable::unpaged()), "");

        let oracle = DefaultSqlBuilder::new(Dialect::Oracle);
        assert_eq!(
            oracle.build_pagination(&Pageable::of(0, 10)),
            " OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"
        );
    }
}
