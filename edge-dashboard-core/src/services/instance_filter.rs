//! Instance filter
//!
//! Turns the store's instance list into what the dashboard lists: the
//! built-in instance first, each entry annotated with registry metadata, then
//! narrowed by category and free-text search.

use std::sync::Arc;

use crate::services::registry_service::{RegistryLookup, CATEGORY_ALL, CATEGORY_BUILTIN};
use crate::types::{DisplayInstance, ExecutableInstance};

/// Search term plus category selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    pub search: String,
    pub category: String,
}

impl Default for FilterQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            category: CATEGORY_ALL.to_string(),
        }
    }
}

impl FilterQuery {
    #[must_use]
    pub fn new(search: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            category: category.into(),
        }
    }
}

/// Instance filter
pub struct InstanceFilter {
    registry: Arc<RegistryLookup>,
}

impl InstanceFilter {
    #[must_use]
    pub fn new(registry: Arc<RegistryLookup>) -> Self {
        Self { registry }
    }

    /// Annotate every instance, built-in first, without filtering
    pub fn annotate(&self, instances: &[ExecutableInstance]) -> Vec<DisplayInstance> {
        with_builtin(instances)
            .into_iter()
            .map(|instance| {
                let info = self.registry.resolve_display(&instance);
                DisplayInstance {
                    instance,
                    name: info.name,
                    description: info.description,
                    icon: info.icon,
                    category: info.category,
                }
            })
            .collect()
    }

    /// Filtered view, in input order with the built-in instance first
    pub fn apply(
        &self,
        instances: &[ExecutableInstance],
        query: &FilterQuery,
    ) -> Vec<DisplayInstance> {
        let needle = query.search.trim().to_lowercase();
        self.annotate(instances)
            .into_iter()
            .filter(|item| query.category == CATEGORY_ALL || item.category == query.category)
            .filter(|item| needle.is_empty() || matches_search(item, &needle))
            .collect()
    }

    /// Selector entries: `All`, `Built-in`, then each other category once
    pub fn categories(&self, instances: &[ExecutableInstance]) -> Vec<String> {
        let mut categories = vec![CATEGORY_ALL.to_string(), CATEGORY_BUILTIN.to_string()];
        for instance in instances.iter().filter(|i| !i.is_builtin()) {
            let category = self.registry.resolve_display(instance).category;
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        categories
    }
}

/// Drop any built-in entry from `instances` and put a single one in front,
/// keeping its env when the input had one.
fn with_builtin(instances: &[ExecutableInstance]) -> Vec<ExecutableInstance> {
    let builtin = instances
        .iter()
        .find(|i| i.is_builtin())
        .cloned()
        .unwrap_or_else(|| ExecutableInstance::builtin(Default::default()));

    std::iter::once(builtin)
        .chain(instances.iter().filter(|i| !i.is_builtin()).cloned())
        .collect()
}

fn matches_search(item: &DisplayInstance, needle: &str) -> bool {
    item.name.to_lowercase().contains(needle)
        || item.description.to_lowercase().contains(needle)
        || item.instance.server_id.to_lowercase().contains(needle)
}
