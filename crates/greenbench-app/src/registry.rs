//! Workload registry.
//!
//! Tasks and their implementations are registered up front; resolving an
//! unknown identifier is a named, fatal error. No probing for entrypoints.

use std::collections::BTreeMap;

/// A zero-argument benchmark workload. Deterministic by contract: fixed
/// input size and seed, so repeated calls measure the same work.
pub type Workload = Box<dyn FnMut()>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown task `{0}`")]
    UnknownTask(String),

    #[error("task `{task}` has no implementation `{impl_ref}`")]
    UnknownImpl { task: String, impl_ref: String },
}

pub trait WorkloadResolver {
    fn resolve(&self, task_id: &str, impl_ref: &str) -> Result<Workload, RegistryError>;
}

pub trait Validator {
    /// Checks an implementation's output against the task's expectation.
    /// Called once per implementation, never inside a timed section.
    fn validate(&self, task_id: &str, impl_ref: &str) -> Result<bool, RegistryError>;
}

type Factory = Box<dyn Fn() -> Workload>;
type Check = Box<dyn Fn() -> bool>;

struct Entry {
    factory: Factory,
    check: Check,
}

/// Maps (task, implementation) to a workload factory and a validator.
#[derive(Default)]
pub struct WorkloadRegistry {
    tasks: BTreeMap<String, BTreeMap<String, Entry>>,
}

impl WorkloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, V>(
        &mut self,
        task_id: impl Into<String>,
        impl_ref: impl Into<String>,
        factory: F,
        check: V,
    ) where
        F: Fn() -> Workload + 'static,
        V: Fn() -> bool + 'static,
    {
        self.tasks.entry(task_id.into()).or_default().insert(
            impl_ref.into(),
            Entry {
                factory: Box::new(factory),
                check: Box::new(check),
            },
        );
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn impls(&self, task_id: &str) -> impl Iterator<Item = &str> {
        self.tasks
            .get(task_id)
            .into_iter()
            .flat_map(|impls| impls.keys().map(String::as_str))
    }

    fn entry(&self, task_id: &str, impl_ref: &str) -> Result<&Entry, RegistryError> {
        let impls = self
            .tasks
            .get(task_id)
            .ok_or_else(|| RegistryError::UnknownTask(task_id.to_string()))?;
        impls
            .get(impl_ref)
            .ok_or_else(|| RegistryError::UnknownImpl {
                task: task_id.to_string(),
                impl_ref: impl_ref.to_string(),
            })
    }
}

impl WorkloadResolver for WorkloadRegistry {
    fn resolve(&self, task_id: &str, impl_ref: &str) -> Result<Workload, RegistryError> {
        Ok((self.entry(task_id, impl_ref)?.factory)())
    }
}

impl Validator for WorkloadRegistry {
    fn validate(&self, task_id: &str, impl_ref: &str) -> Result<bool, RegistryError> {
        Ok((self.entry(task_id, impl_ref)?.check)())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> WorkloadRegistry {
        let mut registry = WorkloadRegistry::new();
        registry.register("sort", "sort::std", || Box::new(|| {}), || true);
        registry.register("sort", "sort::insertion", || Box::new(|| {}), || true);
        registry.register("logs", "logs::split", || Box::new(|| {}), || false);
        registry
    }

    #[test]
    fn resolves_registered_workloads() {
        let registry = registry();
        let mut workload = registry.resolve("sort", "sort::std").unwrap();
        workload();
        assert!(registry.validate("sort", "sort::std").unwrap());
        assert!(!registry.validate("logs", "logs::split").unwrap());
    }

    #[test]
    fn unknown_task_is_a_named_error() {
        let err = registry().resolve("matrix", "matrix::std").err().unwrap();
        assert_eq!(err.to_string(), "unknown task `matrix`");
    }

    #[test]
    fn unknown_impl_is_distinct_from_unknown_task() {
        let err = registry().resolve("sort", "sort::radix").err().unwrap();
        assert_eq!(
            err.to_string(),
            "task `sort` has no implementation `sort::radix`"
        );
    }

    #[test]
    fn listing_is_sorted_and_complete() {
        let registry = registry();
        let tasks: Vec<&str> = registry.task_ids().collect();
        assert_eq!(tasks, vec!["logs", "sort"]);
        let impls: Vec<&str> = registry.impls("sort").collect();
        assert_eq!(impls, vec!["sort::insertion", "sort::std"]);
        assert_eq!(registry.impls("matrix").count(), 0);
    }
}
