//! The Store owns the id -> template mapping. `spec.md` §4.1. It does
//! not itself enforce link integrity or the ratio invariant; that's
//! `crate::link` / `crate::ratio`'s job, wired together by
//! `crate::facade::Facade`.

use crate::diagnostic::Diagnostic;
use crate::ids::TemplateId;
use crate::model::Template;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

/// Guards mutation with a single exclusive lock and reads with a
/// shared lock, per `spec.md` §5's concurrency contract: any sequence
/// of Facade calls from one thread observes a serial order consistent
/// with program order, and reads never interleave with an in-flight
/// mutation.
#[derive(Debug, Default)]
pub struct Store {
    templates: RwLock<HashMap<TemplateId, Template>>,
}

/// A read-only view over the store, held for the duration of a
/// read-side analysis (flatten, validate, contract-of).
pub struct StoreSnapshot<'a> {
    guard: RwLockReadGuard<'a, HashMap<TemplateId, Template>>,
}

impl<'a> StoreSnapshot<'a> {
    pub fn get(&self, id: &TemplateId) -> Option<&Template> {
        self.guard.get(id)
    }

    pub fn contains(&self, id: &TemplateId) -> bool {
        self.guard.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.guard.values()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &TemplateId) -> Option<Template> {
        self.templates.read().expect("store lock poisoned").get(id).cloned()
    }

    pub fn contains(&self, id: &TemplateId) -> bool {
        self.templates.read().expect("store lock poisoned").contains_key(id)
    }

    pub fn snapshot(&self) -> StoreSnapshot<'_> {
        StoreSnapshot {
            guard: self.templates.read().expect("store lock poisoned"),
        }
    }

    pub fn insert(&self, template: Template) -> Result<(), Diagnostic> {
        let id = template.id().clone();
        let mut guard = self.templates.write().expect("store lock poisoned");
        if guard.contains_key(&id) {
            return Err(Diagnostic::DuplicateId { id });
        }
        guard.insert(id, template);
        log::info!("store: inserted template");
        Ok(())
    }

    pub fn replace(&self, template: Template) -> Result<(), Diagnostic> {
        let id = template.id().clone();
        let mut guard = self.templates.write().expect("store lock poisoned");
        if !guard.contains_key(&id) {
            return Err(Diagnostic::NotFound { id });
        }
        guard.insert(id, template);
        Ok(())
    }

    /// All-or-nothing update of multiple templates in one critical
    /// section: either every template in `batch` lands, or (on a
    /// caller-supplied validation failure upstream) none of them do,
    /// because the caller never reaches `commit` in that case. The
    /// write lock makes the batch atomic with respect to concurrent
    /// readers.
    pub fn commit(&self, batch: Vec<Template>) -> Result<(), Diagnostic> {
        let mut guard = self.templates.write().expect("store lock poisoned");
        for template in batch {
            guard.insert(template.id().clone(), template);
        }
        log::debug!("store: committed batch");
        Ok(())
    }

    pub fn remove(&self, id: &TemplateId) -> Option<Template> {
        self.templates.write().expect("store lock poisoned").remove(id)
    }

    pub fn len(&self) -> usize {
        self.templates.read().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
