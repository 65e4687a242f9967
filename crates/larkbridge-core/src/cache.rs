//! Name → key cache for the four nested metadata namespaces.
//!
//! Tables are scoped by their parent keys: project names are global, type
//! names live under a project key, field names and aliases under a
//! (project, type) pair, option labels under a (project, type, field) triple.
//! Nothing here does I/O and nothing expires; a table stays until it is
//! replaced wholesale or invalidated.

use crate::metadata::FieldDefinition;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// The namespace a lookup belongs to. Used for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Project,
    WorkItemType,
    Field,
    Option,
    WorkItem,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Project => "project",
            Self::WorkItemType => "work item type",
            Self::Field => "field",
            Self::Option => "option",
            Self::WorkItem => "work item",
        };
        f.write_str(name)
    }
}

/// A table identity: namespace plus the parent keys it is scoped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// project name → project key
    Projects,
    /// type name → type key
    Types { project_key: String },
    /// field name → field key
    Fields {
        project_key: String,
        type_key: String,
    },
    /// field alias → field key
    FieldAliases {
        project_key: String,
        type_key: String,
    },
    /// option label → option value
    Options {
        project_key: String,
        type_key: String,
        field_key: String,
    },
}

impl Scope {
    #[must_use]
    pub fn types(project_key: &str) -> Self {
        Self::Types {
            project_key: project_key.to_string(),
        }
    }

    #[must_use]
    pub fn fields(project_key: &str, type_key: &str) -> Self {
        Self::Fields {
            project_key: project_key.to_string(),
            type_key: type_key.to_string(),
        }
    }

    #[must_use]
    pub fn field_aliases(project_key: &str, type_key: &str) -> Self {
        Self::FieldAliases {
            project_key: project_key.to_string(),
            type_key: type_key.to_string(),
        }
    }

    #[must_use]
    pub fn options(project_key: &str, type_key: &str, field_key: &str) -> Self {
        Self::Options {
            project_key: project_key.to_string(),
            type_key: type_key.to_string(),
            field_key: field_key.to_string(),
        }
    }

    /// Namespace this scope belongs to.
    #[must_use]
    pub const fn namespace(&self) -> Namespace {
        match self {
            Self::Projects => Namespace::Project,
            Self::Types { .. } => Namespace::WorkItemType,
            Self::Fields { .. } | Self::FieldAliases { .. } => Namespace::Field,
            Self::Options { .. } => Namespace::Option,
        }
    }

    fn project_key(&self) -> Option<&str> {
        match self {
            Self::Projects => None,
            Self::Types { project_key }
            | Self::Fields { project_key, .. }
            | Self::FieldAliases { project_key, .. }
            | Self::Options { project_key, .. } => Some(project_key),
        }
    }

    fn type_scope(&self) -> Option<(&str, &str)> {
        match self {
            Self::Fields {
                project_key,
                type_key,
            }
            | Self::FieldAliases {
                project_key,
                type_key,
            }
            | Self::Options {
                project_key,
                type_key,
                ..
            } => Some((project_key, type_key)),
            _ => None,
        }
    }
}

type Table = IndexMap<String, String>;

/// In-memory name → key tables.
#[derive(Debug, Default)]
pub struct NameKeyCache {
    tables: HashMap<Scope, Table>,
    definitions: HashMap<(String, String), IndexMap<String, FieldDefinition>>,
}

impl NameKeyCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a name in a table.
    #[must_use]
    pub fn get(&self, scope: &Scope, name: &str) -> Option<&str> {
        self.tables.get(scope)?.get(name).map(String::as_str)
    }

    /// Insert or overwrite a single entry.
    pub fn put(&mut self, scope: Scope, name: impl Into<String>, value: impl Into<String>) {
        self.tables
            .entry(scope)
            .or_default()
            .insert(name.into(), value.into());
    }

    /// Merge entries into a table, creating it (possibly empty) if needed.
    pub fn put_all<I, N, V>(&mut self, scope: Scope, entries: I)
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let table = self.tables.entry(scope).or_default();
        for (name, value) in entries {
            table.insert(name.into(), value.into());
        }
    }

    /// Whether a table has been populated, even if it ended up empty.
    #[must_use]
    pub fn is_populated(&self, scope: &Scope) -> bool {
        self.tables.contains_key(scope)
    }

    /// Whether `value` is one of the keys stored in a table.
    #[must_use]
    pub fn contains_value(&self, scope: &Scope, value: &str) -> bool {
        self.name_for_value(scope, value).is_some()
    }

    /// First name (in insertion order) that maps to `value`.
    #[must_use]
    pub fn name_for_value(&self, scope: &Scope, value: &str) -> Option<&str> {
        self.tables
            .get(scope)?
            .iter()
            .find(|(_, v)| v.as_str() == value)
            .map(|(name, _)| name.as_str())
    }

    /// Whole table, in insertion order.
    #[must_use]
    pub fn entries(&self, scope: &Scope) -> Option<&Table> {
        self.tables.get(scope)
    }

    /// Install the complete field namespace of a (project, type) pair.
    ///
    /// Replaces names, aliases, option tables, and stored definitions for the
    /// pair. Fields without a name or key are skipped, as are options without
    /// a label or value.
    pub fn put_fields(&mut self, project_key: &str, type_key: &str, definitions: Vec<FieldDefinition>) {
        self.remove_type_scope(project_key, type_key);

        let mut names = Table::new();
        let mut aliases = Table::new();
        let mut stored = IndexMap::new();

        for def in definitions {
            if def.field_name.is_empty() || def.field_key.is_empty() {
                continue;
            }
            names.insert(def.field_name.clone(), def.field_key.clone());
            if let Some(alias) = def.field_alias.as_ref().filter(|a| !a.is_empty()) {
                aliases.insert(alias.clone(), def.field_key.clone());
            }

            let options: Table = def
                .options
                .iter()
                .filter(|o| !o.label.is_empty() && !o.value.is_empty())
                .map(|o| (o.label.clone(), o.value.clone()))
                .collect();
            if !options.is_empty() {
                self.tables
                    .insert(Scope::options(project_key, type_key, &def.field_key), options);
            }

            stored.insert(def.field_key.clone(), def);
        }

        debug!(
            type_key = %type_key,
            fields = names.len(),
            aliases = aliases.len(),
            "Cached field namespace"
        );

        self.tables.insert(Scope::fields(project_key, type_key), names);
        self.tables
            .insert(Scope::field_aliases(project_key, type_key), aliases);
        self.definitions
            .insert((project_key.to_string(), type_key.to_string()), stored);
    }

    /// Stored definition of a field.
    #[must_use]
    pub fn field_definition(
        &self,
        project_key: &str,
        type_key: &str,
        field_key: &str,
    ) -> Option<&FieldDefinition> {
        self.definitions
            .get(&(project_key.to_string(), type_key.to_string()))?
            .get(field_key)
    }

    /// Drop a single table. Dropping a field table drops the whole
    /// (project, type) field namespace with it.
    pub fn invalidate(&mut self, scope: &Scope) {
        match scope {
            Scope::Fields {
                project_key,
                type_key,
            }
            | Scope::FieldAliases {
                project_key,
                type_key,
            } => self.remove_type_scope(project_key, type_key),
            other => {
                self.tables.remove(other);
            }
        }
    }

    /// Drop every table scoped under a project key.
    pub fn invalidate_project(&mut self, project_key: &str) {
        self.tables
            .retain(|scope, _| scope.project_key() != Some(project_key));
        self.definitions.retain(|(pk, _), _| pk != project_key);
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.tables.clear();
        self.definitions.clear();
    }

    fn remove_type_scope(&mut self, project_key: &str, type_key: &str) {
        self.tables
            .retain(|scope, _| scope.type_scope() != Some((project_key, type_key)));
        self.definitions
            .remove(&(project_key.to_string(), type_key.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn priority_field() -> FieldDefinition {
        FieldDefinition::new("field_prio", "优先级", "select")
            .with_alias("priority")
            .with_option("P0", "opt_0")
            .with_option("P1", "opt_1")
    }

    #[test]
    fn test_get_and_put() {
        let mut cache = NameKeyCache::new();
        assert_eq!(cache.get(&Scope::Projects, "Widgets"), None);
        assert!(!cache.is_populated(&Scope::Projects));

        cache.put(Scope::Projects, "Widgets", "p1");
        cache.put(Scope::Projects, "Widgets", "p1"); // idempotent
        assert_eq!(cache.get(&Scope::Projects, "Widgets"), Some("p1"));
        assert_eq!(cache.entries(&Scope::Projects).unwrap().len(), 1);
    }

    #[test]
    fn test_scopes_do_not_collide() {
        let mut cache = NameKeyCache::new();
        cache.put(Scope::types("p1"), "Bug", "bug_p1");
        cache.put(Scope::types("p2"), "Bug", "bug_p2");

        assert_eq!(cache.get(&Scope::types("p1"), "Bug"), Some("bug_p1"));
        assert_eq!(cache.get(&Scope::types("p2"), "Bug"), Some("bug_p2"));
    }

    #[test]
    fn test_empty_table_is_populated() {
        let mut cache = NameKeyCache::new();
        cache.put_all(Scope::types("p1"), Vec::<(String, String)>::new());
        assert!(cache.is_populated(&Scope::types("p1")));
        assert_eq!(cache.get(&Scope::types("p1"), "Bug"), None);
    }

    #[test]
    fn test_put_fields_populates_all_tables() {
        let mut cache = NameKeyCache::new();
        cache.put_fields(
            "p1",
            "t1",
            vec![priority_field(), FieldDefinition::new("name", "标题", "text")],
        );

        assert_eq!(cache.get(&Scope::fields("p1", "t1"), "优先级"), Some("field_prio"));
        assert_eq!(
            cache.get(&Scope::field_aliases("p1", "t1"), "priority"),
            Some("field_prio")
        );
        assert!(cache.contains_value(&Scope::fields("p1", "t1"), "field_prio"));
        assert_eq!(
            cache.get(&Scope::options("p1", "t1", "field_prio"), "P1"),
            Some("opt_1")
        );
        assert_eq!(
            cache.name_for_value(&Scope::options("p1", "t1", "field_prio"), "opt_0"),
            Some("P0")
        );
        assert!(!cache.is_populated(&Scope::options("p1", "t1", "name")));
        assert_eq!(
            cache.field_definition("p1", "t1", "field_prio").unwrap().field_type_key,
            "select"
        );
    }

    #[test]
    fn test_put_fields_replaces_wholesale() {
        let mut cache = NameKeyCache::new();
        cache.put_fields("p1", "t1", vec![priority_field()]);
        cache.put_fields("p1", "t1", vec![FieldDefinition::new("name", "标题", "text")]);

        assert_eq!(cache.get(&Scope::fields("p1", "t1"), "优先级"), None);
        assert!(!cache.is_populated(&Scope::options("p1", "t1", "field_prio")));
        assert!(cache.field_definition("p1", "t1", "field_prio").is_none());
    }

    #[test]
    fn test_invalidate() {
        let mut cache = NameKeyCache::new();
        cache.put(Scope::Projects, "Widgets", "p1");
        cache.put(Scope::types("p1"), "Bug", "bug");
        cache.put_fields("p1", "t1", vec![priority_field()]);
        cache.put_fields("p2", "t1", vec![priority_field()]);

        cache.invalidate(&Scope::fields("p1", "t1"));
        assert!(!cache.is_populated(&Scope::fields("p1", "t1")));
        assert!(!cache.is_populated(&Scope::options("p1", "t1", "field_prio")));
        assert!(cache.is_populated(&Scope::fields("p2", "t1")));

        cache.invalidate_project("p2");
        assert!(!cache.is_populated(&Scope::fields("p2", "t1")));
        assert_eq!(cache.get(&Scope::Projects, "Widgets"), Some("p1"));
        assert_eq!(cache.get(&Scope::types("p1"), "Bug"), Some("bug"));

        cache.clear();
        assert!(!cache.is_populated(&Scope::Projects));
    }
}
