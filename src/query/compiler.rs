use once_cell::sync::Lazy;
use regex::Regex;
use crate::core::{DbError, Result, Value};
use crate::sql::SqlBuilder;
use super::{Order, Pageable, Sort, StoredQuery};

/// A locking clause closing the statement, with its optional modifiers.
static LOCK_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+FOR\s+(UPDATE|SHARE)(\s+(NOWAIT|SKIP\s+LOCKED|OF\s+[\w.,\s"]+))*\s*$"#).expect("valid regex")
});
static ORDER_BY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bORDER\s+BY\b").expect("valid regex"));

/// Rewrites a stored template into the SQL text of one execution.
pub struct StatementCompiler<'a> {
    builder: &'a dyn SqlBuilder,
}

impl<'a> StatementCompiler<'a> {
    pub fn new(builder: &'a dyn SqlBuilder) -> Self {
        Self { builder }
    }

    /// `resolved` holds one value per binding, before dialect coercion.
    pub fn compile(
        &self,
        stored: &StoredQuery,
        resolved: &[Value],
        pageable: Option<&Pageable>,
        single_result: bool,
    ) -> Result<String> {
        let mut sql = self.expand(stored, resolved)?;

        if let Some(pageable) = pageable.filter(|_| !stored.is_update()) {
            sql = self.paginate(stored, sql, pageable, single_result)?;
        }
        Ok(sql)
    }

    /// Repeats each placeholder once per element of its value.
    fn expand(&self, stored: &StoredQuery, resolved: &[Value]) -> Result<String> {
        if resolved.len() != stored.bindings().len() {
            return Err(DbError::ParameterResolution(format!(
                "Query has {} parameter bindings but {} values were resolved",
                stored.bindings().len(),
                resolved.len()
            )));
        }

        let cardinalities: Vec<usize> = stored
            .bindings()
            .iter()
            .zip(resolved)
            .map(|(binding, value)| binding.cardinality(value))
            .collect();
        if cardinalities.iter().all(|&c| c == 1) {
            return Ok(stored.sql().to_string());
        }

        let fragments = stored.fragments().ok_or_else(|| {
            DbError::QueryConstruction(format!(
                "Collection value bound to a query without expandable parameters: {}",
                stored.sql()
            ))
        })?;

        let format = stored.dialect().placeholder_format();
        let mut sql = String::with_capacity(stored.sql().len() + cardinalities.iter().sum::<usize>() * 3);
        let mut index = 0;
        for (fragment, size) in fragments.iter().zip(&cardinalities) {
            sql.push_str(fragment);
            let placeholders: Vec<String> = (index..index + size).map(|i| format.render(i)).collect();
            sql.push_str(&placeholders.join(","));
            index += size;
        }
        if let Some(tail) = fragments.last() {
            sql.push_str(tail);
        }
        Ok(sql)
    }

    fn paginate(
        &self,
        stored: &StoredQuery,
        sql: String,
        pageable: &Pageable,
        single_result: bool,
    ) -> Result<String> {
        let (mut head, lock_tail) = match LOCK_CLAUSE.find(&sql) {
            Some(found) => (sql[..found.start()].to_string(), sql[found.start()..].to_string()),
            None => (sql, String::new()),
        };

        let entity = stored.entity();
        if pageable.sort().is_sorted() {
            head.push_str(&self.builder.build_order_by(entity, pageable.sort())?);
        } else if !pageable.is_unpaged()
            && stored.dialect().requires_mandatory_order_by()
            && !ORDER_BY.is_match(&head)
        {
            let identity = entity
                .identity()
                .ok_or_else(|| DbError::MissingIdentity(entity.name().to_string()))?;
            let by_identity = Sort::by(vec![Order::asc(identity.name.clone())]);
            head.push_str(&self.builder.build_order_by(entity, &by_identity)?);
        }

        let clamped;
        let pageable = if single_result && pageable.offset() > 0 {
            clamped = pageable.single_row();
            &clamped
        } else {
            pageable
        };
        head.push_str(&self.builder.build_pagination(pageable));
        head.push_str(&lock_tail);
        Ok(head)
    }
}
