//! Named operations that compose the rest of the engine. `spec.md`
//! §4.7, §6.1; the additive operations (`delete-template`,
//! `remove-segment`, `contract-of`) are `SPEC_FULL.md` §6.1.1.
//!
//! Every mutating method here follows the same shape: clone the
//! templates the operation could possibly touch, mutate the clones,
//! re-run `RatioInvariant`/`LinkIntegrity` against them, and only on
//! success ask the [`Store`] to commit (`SPEC_FULL.md` §4.7.1). No
//! invariant is ever checked against data already written to the
//! store. Read-side operations (`validate-container`, `validate-all`,
//! `contract-of`) never fail structurally except on a missing or
//! wrong-kind id — any other problem is reported as a diagnostic
//! alongside a successful payload, per `spec.md` §4.7 "Failure
//! semantics".

use crate::diagnostic::Diagnostic;
use crate::flatten::{self, FlattenOutcome};
use crate::ids::{RelationshipId, TemplateId};
use crate::layout::{self, Distribution};
use crate::ledger_sim;
use crate::link;
use crate::model::{
    ContainerTemplate, Duration, Ledger, Template, TemplateCommon, TemplateKind, TemplateMetadata,
    VariableName,
};
use crate::ratio;
use crate::store::Store;
use crate::vocabulary::VocabularyRules;
use crate::wire::LibraryDocument;
use std::collections::{BTreeSet, HashMap};

/// Every Facade operation that can fail reports every diagnostic it
/// found, not just the first — `spec.md` §6.1's "(failure,
/// diagnostics)" is plural for a reason.
pub type FacadeResult<T> = Result<T, Vec<Diagnostic>>;

fn single<T>(result: Result<T, Diagnostic>) -> FacadeResult<T> {
    result.map_err(|d| vec![d])
}

/// The payload of `validate-container`.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub contract_inputs: Ledger,
    pub contract_outputs: Ledger,
    pub first_atomic: Option<TemplateId>,
    pub last_atomic: Option<TemplateId>,
    pub diagnostics: Vec<Diagnostic>,
}

/// One container's line in `validate-all`'s summary.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub container_id: TemplateId,
    pub is_valid: bool,
    pub diagnostic_count: usize,
}

/// The payload of `validate-all`.
#[derive(Debug, Clone, Default)]
pub struct ValidateAllReport {
    pub containers: Vec<ContainerSummary>,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub total_diagnostics: usize,
}

#[derive(Debug, Clone)]
pub struct CreateAtomicArgs {
    pub id: TemplateId,
    pub intent: String,
    pub duration: Duration,
    pub will_consume: Ledger,
    pub will_produce: Ledger,
    pub author_id: Option<String>,
    pub version: Option<u32>,
}

/// One entry of `create-container`'s `segments` argument: the child to
/// place, its relationship id, and its offset from the container's
/// local origin.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub child_id: TemplateId,
    pub relationship_id: RelationshipId,
    pub offset: Duration,
}

#[derive(Debug, Clone)]
pub struct CreateContainerArgs {
    pub id: TemplateId,
    pub intent: String,
    pub duration: Duration,
    pub segments: Vec<SegmentSpec>,
    pub author_id: Option<String>,
    pub version: Option<u32>,
}

/// `create-atomic`/`create-container` default a caller's omitted
/// `version` to 1 rather than 0, matching the teacher's convention of
/// starting monotonic counters at the first real value.
const DEFAULT_TEMPLATE_VERSION: u32 = 1;

/// Owns the [`Store`] and the [`VocabularyRules`] a library is
/// validated against, and exposes the named operations of `spec.md`
/// §6.1 as methods.
pub struct Facade {
    store: Store,
    vocabulary: VocabularyRules,
}

impl Default for Facade {
    fn default() -> Self {
        Facade {
            store: Store::new(),
            vocabulary: VocabularyRules::default(),
        }
    }
}

impl Facade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vocabulary(vocabulary: VocabularyRules) -> Self {
        Facade {
            store: Store::new(),
            vocabulary,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // -- read-side catalogue operations --------------------------------

    pub fn get_vocabulary(&self) -> Vec<VariableName> {
        let snapshot = self.store.snapshot();
        let mut names: BTreeSet<VariableName> = BTreeSet::new();
        for template in snapshot.iter() {
            if let Template::Atomic(atomic) = template {
                names.extend(atomic.will_consume.keys().cloned());
                names.extend(atomic.will_produce.keys().cloned());
            }
        }
        names.into_iter().collect()
    }

    pub fn list_templates(&self, kind: Option<TemplateKind>) -> Vec<TemplateMetadata> {
        let snapshot = self.store.snapshot();
        let mut metas: Vec<TemplateMetadata> = snapshot
            .iter()
            .filter(|t| kind.map(|k| t.kind() == k).unwrap_or(true))
            .map(TemplateMetadata::from)
            .collect();
        metas.sort_by(|a, b| a.id.cmp(&b.id));
        metas
    }

    pub fn get_template(&self, id: &TemplateId) -> FacadeResult<Template> {
        single(
            self.store
                .get(id)
                .ok_or_else(|| Diagnostic::NotFound { id: id.clone() }),
        )
    }

    pub fn search_intent(&self, query: &str) -> Vec<TemplateMetadata> {
        let needle = query.to_lowercase();
        let snapshot = self.store.snapshot();
        let mut metas: Vec<TemplateMetadata> = snapshot
            .iter()
            .filter(|t| t.common().intent.to_lowercase().contains(&needle))
            .map(TemplateMetadata::from)
            .collect();
        metas.sort_by(|a, b| a.id.cmp(&b.id));
        metas
    }

    // -- creation --------------------------------------------------------

    pub fn create_atomic(&self, args: CreateAtomicArgs) -> FacadeResult<Template> {
        if self.store.contains(&args.id) {
            return Err(vec![Diagnostic::DuplicateId { id: args.id }]);
        }
        if args.duration == 0 {
            return Err(vec![Diagnostic::InvalidDuration {
                value: 0,
                context: format!("create-atomic {}", args.id),
            }]);
        }
        let mut diagnostics = Vec::new();
        if let Err(d) = self.vocabulary.check_ledger(&args.will_consume) {
            diagnostics.push(d);
        }
        if let Err(d) = self.vocabulary.check_ledger(&args.will_produce) {
            diagnostics.push(d);
        }
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let template = Template::Atomic(crate::model::AtomicTemplate {
            common: TemplateCommon {
                id: args.id.clone(),
                intent: args.intent,
                author_id: args.author_id,
                version: args.version.unwrap_or(DEFAULT_TEMPLATE_VERSION),
                estimated_duration: args.duration,
                references: Vec::new(),
            },
            will_consume: args.will_consume,
            will_produce: args.will_produce,
        });
        single(self.store.insert(template.clone()))?;
        log::info!("facade: created atomic {}", args.id);
        Ok(template)
    }

    pub fn create_container(&self, args: CreateContainerArgs) -> FacadeResult<Template> {
        if self.store.contains(&args.id) {
            return Err(vec![Diagnostic::DuplicateId { id: args.id }]);
        }
        if args.duration == 0 {
            return Err(vec![Diagnostic::InvalidDuration {
                value: 0,
                context: format!("create-container {}", args.id),
            }]);
        }

        let mut working = ContainerTemplate {
            common: TemplateCommon {
                id: args.id.clone(),
                intent: args.intent,
                author_id: args.author_id,
                version: args.version.unwrap_or(DEFAULT_TEMPLATE_VERSION),
                estimated_duration: args.duration,
                references: Vec::new(),
            },
            segments: Vec::new(),
        };

        let snapshot = self.store.snapshot();
        let mut diagnostics = Vec::new();
        let mut modified_children: HashMap<TemplateId, Template> = HashMap::new();

        for spec in &args.segments {
            let child = modified_children
                .get(&spec.child_id)
                .cloned()
                .or_else(|| snapshot.get(&spec.child_id).cloned());
            let Some(mut child) = child else {
                diagnostics.push(Diagnostic::MissingTemplate {
                    referenced_id: spec.child_id.clone(),
                    container_id: args.id.clone(),
                });
                continue;
            };

            if let Err(d) = ratio::check_segment(
                &args.id,
                &working.common.intent,
                args.duration,
                &spec.child_id,
                &child.common().intent,
                child.duration(),
            ) {
                diagnostics.push(d);
            }
            if spec.offset + child.duration() > args.duration {
                diagnostics.push(Diagnostic::OffsetOutOfBounds {
                    container_id: args.id.clone(),
                    child_id: spec.child_id.clone(),
                    relationship_id: spec.relationship_id.clone(),
                    offset: spec.offset,
                    child_duration: child.duration(),
                    container_duration: args.duration,
                });
            }
            match link::add_segment(
                &mut working,
                &mut child,
                spec.relationship_id.clone(),
                spec.offset,
            ) {
                Ok(()) => {
                    modified_children.insert(spec.child_id.clone(), child);
                }
                Err(d) => diagnostics.push(d),
            }
        }
        drop(snapshot);

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let template = Template::Container(working);
        single(self.store.insert(template.clone()))?;
        single(self.store.commit(modified_children.into_values().collect()))?;
        log::info!(
            "facade: created container {} with {} segments",
            args.id,
            args.segments.len()
        );
        Ok(template)
    }

    // -- updates -----------------------------------------------------------

    pub fn update_duration(&self, id: &TemplateId, new_duration: Duration) -> FacadeResult<Template> {
        if new_duration == 0 {
            return Err(vec![Diagnostic::InvalidDuration {
                value: 0,
                context: format!("update-duration {id}"),
            }]);
        }
        let snapshot = self.store.snapshot();
        let Some(template) = snapshot.get(id).cloned() else {
            drop(snapshot);
            return Err(vec![Diagnostic::NotFound { id: id.clone() }]);
        };

        let mut diagnostics = Vec::new();
        if let Template::Container(container) = &template {
            diagnostics.extend(ratio::check_container_after_duration_change(
                container,
                new_duration,
                &snapshot,
            ));
        }
        diagnostics.extend(ratio::check_child_after_duration_change(
            &template,
            new_duration,
            &snapshot,
        ));
        drop(snapshot);

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let mut updated = template;
        updated.common_mut().estimated_duration = new_duration;
        single(self.store.replace(updated.clone()))?;
        log::info!("facade: updated duration of {id} to {new_duration}ms");
        Ok(updated)
    }

    pub fn update_intent(&self, id: &TemplateId, new_intent: String) -> FacadeResult<Template> {
        let mut template = single(
            self.store
                .get(id)
                .ok_or_else(|| Diagnostic::NotFound { id: id.clone() }),
        )?;
        template.common_mut().intent = new_intent;
        single(self.store.replace(template.clone()))?;
        Ok(template)
    }

    pub fn update_consume(&self, atomic_id: &TemplateId, will_consume: Ledger) -> FacadeResult<Template> {
        self.update_ledger_field(atomic_id, will_consume, true)
    }

    pub fn update_produce(&self, atomic_id: &TemplateId, will_produce: Ledger) -> FacadeResult<Template> {
        self.update_ledger_field(atomic_id, will_produce, false)
    }

    fn update_ledger_field(
        &self,
        atomic_id: &TemplateId,
        ledger: Ledger,
        is_consume: bool,
    ) -> FacadeResult<Template> {
        let mut template = single(
            self.store
                .get(atomic_id)
                .ok_or_else(|| Diagnostic::NotFound { id: atomic_id.clone() }),
        )?;
        let Template::Atomic(atomic) = &mut template else {
            return Err(vec![Diagnostic::WrongKind {
                id: atomic_id.clone(),
                observed: template.kind(),
                expected: TemplateKind::Atomic,
            }]);
        };
        single(self.vocabulary.check_ledger(&ledger))?;
        if is_consume {
            atomic.will_consume = ledger;
        } else {
            atomic.will_produce = ledger;
        }
        single(self.store.replace(template.clone()))?;
        Ok(template)
    }

    // -- deletion (SPEC_FULL.md §6.1.1) ------------------------------------

    pub fn delete_template(&self, id: &TemplateId) -> FacadeResult<Template> {
        let template = single(
            self.store
                .get(id)
                .ok_or_else(|| Diagnostic::NotFound { id: id.clone() }),
        )?;
        if !template.references().is_empty() {
            return Err(vec![Diagnostic::DeleteRefused {
                id: id.clone(),
                reason: "still referenced by a parent container".to_string(),
            }]);
        }
        if let Template::Container(container) = &template {
            if !container.segments.is_empty() {
                return Err(vec![Diagnostic::DeleteRefused {
                    id: id.clone(),
                    reason: "container still has segments; remove them first".to_string(),
                }]);
            }
        }
        self.store.remove(id);
        log::info!("facade: deleted {id}");
        Ok(template)
    }

    pub fn remove_segment(
        &self,
        container_id: &TemplateId,
        relationship_id: RelationshipId,
    ) -> FacadeResult<Template> {
        let container_template = single(
            self.store
                .get(container_id)
                .ok_or_else(|| Diagnostic::NotFound { id: container_id.clone() }),
        )?;
        let Template::Container(mut container) = container_template else {
            return Err(vec![Diagnostic::WrongKind {
                id: container_id.clone(),
                observed: TemplateKind::Atomic,
                expected: TemplateKind::Container,
            }]);
        };
        let Some(segment) = container
            .segments
            .iter()
            .find(|s| s.relationship_id == relationship_id)
            .cloned()
        else {
            return Err(vec![Diagnostic::LinkIntegrity {
                parent_id: container_id.clone(),
                child_id: container_id.clone(),
                relationship_id,
                observed: "no such segment on container".to_string(),
            }]);
        };
        let mut child = single(self.store.get(&segment.template_id).ok_or_else(|| {
            Diagnostic::MissingTemplate {
                referenced_id: segment.template_id.clone(),
                container_id: container_id.clone(),
            }
        }))?;
        single(link::remove_segment(&mut container, &mut child, relationship_id))?;
        let updated = Template::Container(container);
        single(self.store.commit(vec![updated.clone(), child]))?;
        log::info!("facade: removed segment from {container_id}");
        Ok(updated)
    }

    // -- validation and contract -------------------------------------------

    pub fn validate_container(&self, container_id: &TemplateId) -> ValidationReport {
        let snapshot = self.store.snapshot();
        let flattened: FlattenOutcome = flatten::flatten(container_id, &snapshot);
        let simulated = ledger_sim::simulate(container_id, &flattened);
        drop(snapshot);

        let mut diagnostics = flattened.diagnostics;
        diagnostics.extend(simulated.diagnostics);
        let is_valid = diagnostics.is_empty();
        if !is_valid {
            log::warn!(
                "validate-container {container_id}: {} diagnostics",
                diagnostics.len()
            );
        }

        ValidationReport {
            is_valid,
            contract_inputs: simulated.contract_inputs,
            contract_outputs: simulated.contract_outputs,
            first_atomic: flattened.first_atomic,
            last_atomic: flattened.last_atomic,
            diagnostics,
        }
    }

    pub fn validate_all(&self) -> ValidateAllReport {
        let container_ids: Vec<TemplateId> = {
            let snapshot = self.store.snapshot();
            snapshot
                .iter()
                .filter(|t| t.kind() == TemplateKind::Container)
                .map(|t| t.id().clone())
                .collect()
        };

        let mut report = ValidateAllReport::default();
        for container_id in container_ids {
            let validation = self.validate_container(&container_id);
            report.total_diagnostics += validation.diagnostics.len();
            if validation.is_valid {
                report.valid_count += 1;
            } else {
                report.invalid_count += 1;
            }
            report.containers.push(ContainerSummary {
                container_id,
                is_valid: validation.is_valid,
                diagnostic_count: validation.diagnostics.len(),
            });
        }
        report
    }

    /// A read-only convenience over `validate-container` for a caller
    /// that has already validated and just wants the contract
    /// signature (`SPEC_FULL.md` §6.1.1). Returns the contract even
    /// when the container is invalid; only a missing or wrong-kind id
    /// fails structurally.
    pub fn contract_of(&self, container_id: &TemplateId) -> FacadeResult<(Ledger, Ledger)> {
        let template = single(
            self.store
                .get(container_id)
                .ok_or_else(|| Diagnostic::NotFound { id: container_id.clone() }),
        )?;
        if template.kind() != TemplateKind::Container {
            return Err(vec![Diagnostic::WrongKind {
                id: container_id.clone(),
                observed: template.kind(),
                expected: TemplateKind::Container,
            }]);
        }
        let validation = self.validate_container(container_id);
        Ok((validation.contract_inputs, validation.contract_outputs))
    }

    // -- layout algebra (`spec.md` §4.6) ------------------------------------

    pub fn apply_layout(
        &self,
        container_id: &TemplateId,
        distribution: Distribution,
        gap: Duration,
    ) -> FacadeResult<Template> {
        let mut container = self.load_container(container_id)?;
        let durations = self.resolve_durations(&container)?;
        single(layout::apply_layout(&mut container, distribution, gap, &durations))?;
        let offset_diagnostics = check_offset_bounds(&container, &durations);
        if !offset_diagnostics.is_empty() {
            return Err(offset_diagnostics);
        }
        self.commit_container(container)
    }

    pub fn pack(&self, container_id: &TemplateId) -> FacadeResult<Template> {
        self.apply_layout(container_id, Distribution::Start, 0)
    }

    pub fn equally_distribute(&self, container_id: &TemplateId) -> FacadeResult<Template> {
        self.apply_layout(container_id, Distribution::SpaceBetween, 0)
    }

    pub fn distribute_by_interval(
        &self,
        container_id: &TemplateId,
        interval: Duration,
    ) -> FacadeResult<Template> {
        let mut container = self.load_container(container_id)?;
        let durations = self.resolve_durations(&container)?;
        single(layout::distribute_by_interval(&mut container, interval, &durations))?;
        let offset_diagnostics = check_offset_bounds(&container, &durations);
        if !offset_diagnostics.is_empty() {
            return Err(offset_diagnostics);
        }
        self.commit_container(container)
    }

    /// Sets `container.duration := offset(last) + duration(last)`,
    /// then re-checks `RatioInvariant` on every direct child and on
    /// every parent of `container` (`spec.md` §4.6). A child whose
    /// duration now equals the shrunk container duration fails the
    /// strict upper bound; the caller must resize the child or choose
    /// a different fit target (`spec.md` §9 Open Questions).
    pub fn fit_to_last(&self, container_id: &TemplateId) -> FacadeResult<Template> {
        let mut container = self.load_container(container_id)?;
        let durations = self.resolve_durations(&container)?;
        let new_duration = layout::fit_to_last(&mut container, &durations);

        let snapshot = self.store.snapshot();
        let mut diagnostics =
            ratio::check_container_after_duration_change(&container, new_duration, &snapshot);
        diagnostics.extend(ratio::check_child_after_duration_change(
            &Template::Container(container.clone()),
            new_duration,
            &snapshot,
        ));
        drop(snapshot);

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        self.commit_container(container)
    }

    pub fn insert_gap(
        &self,
        container_id: &TemplateId,
        before_index: usize,
        gap_duration: Duration,
    ) -> FacadeResult<Template> {
        let mut container = self.load_container(container_id)?;
        let durations = self.resolve_durations(&container)?;
        single(layout::insert_gap(&mut container, before_index, gap_duration))?;
        let offset_diagnostics = check_offset_bounds(&container, &durations);
        if !offset_diagnostics.is_empty() {
            return Err(offset_diagnostics);
        }
        self.commit_container(container)
    }

    pub fn add_to_end(
        &self,
        container_id: &TemplateId,
        child_id: &TemplateId,
        relationship_id: RelationshipId,
    ) -> FacadeResult<Template> {
        let mut container = self.load_container(container_id)?;
        let durations = self.resolve_durations(&container)?;
        let mut child = single(
            self.store
                .get(child_id)
                .ok_or_else(|| Diagnostic::NotFound { id: child_id.clone() }),
        )?;
        single(ratio::check_segment(
            container_id,
            &container.common.intent,
            container.common.estimated_duration,
            child_id,
            &child.common().intent,
            child.duration(),
        ))?;
        let by_id = duration_map(child_id, child.duration(), &container, &durations);
        single(layout::add_to_end(
            &mut container,
            &durations,
            &mut child,
            relationship_id,
        ))?;

        let offset_diagnostics = check_offset_bounds_by_id(&container, &by_id);
        if !offset_diagnostics.is_empty() {
            return Err(offset_diagnostics);
        }
        self.commit_layout_with_child(container, child)
    }

    pub fn push_to_start(
        &self,
        container_id: &TemplateId,
        child_id: &TemplateId,
        relationship_id: RelationshipId,
    ) -> FacadeResult<Template> {
        let mut container = self.load_container(container_id)?;
        let durations = self.resolve_durations(&container)?;
        let mut child = single(
            self.store
                .get(child_id)
                .ok_or_else(|| Diagnostic::NotFound { id: child_id.clone() }),
        )?;
        single(ratio::check_segment(
            container_id,
            &container.common.intent,
            container.common.estimated_duration,
            child_id,
            &child.common().intent,
            child.duration(),
        ))?;
        let child_duration = child.duration();
        let by_id = duration_map(child_id, child_duration, &container, &durations);
        single(layout::push_to_start(
            &mut container,
            &mut child,
            relationship_id,
            child_duration,
        ))?;

        let offset_diagnostics = check_offset_bounds_by_id(&container, &by_id);
        if !offset_diagnostics.is_empty() {
            return Err(offset_diagnostics);
        }
        self.commit_layout_with_child(container, child)
    }

    pub fn insert_at(
        &self,
        container_id: &TemplateId,
        child_id: &TemplateId,
        offset: Duration,
        relationship_id: RelationshipId,
    ) -> FacadeResult<Template> {
        let mut container = self.load_container(container_id)?;
        let durations = self.resolve_durations(&container)?;
        let mut child = single(
            self.store
                .get(child_id)
                .ok_or_else(|| Diagnostic::NotFound { id: child_id.clone() }),
        )?;
        single(ratio::check_segment(
            container_id,
            &container.common.intent,
            container.common.estimated_duration,
            child_id,
            &child.common().intent,
            child.duration(),
        ))?;
        let child_duration = child.duration();
        let by_id = duration_map(child_id, child_duration, &container, &durations);
        single(layout::insert_at(
            &mut container,
            &mut child,
            relationship_id,
            offset,
            child_duration,
        ))?;

        let offset_diagnostics = check_offset_bounds_by_id(&container, &by_id);
        if !offset_diagnostics.is_empty() {
            return Err(offset_diagnostics);
        }
        self.commit_layout_with_child(container, child)
    }

    // -- shared helpers ------------------------------------------------------

    fn load_container(&self, container_id: &TemplateId) -> FacadeResult<ContainerTemplate> {
        let template = single(
            self.store
                .get(container_id)
                .ok_or_else(|| Diagnostic::NotFound { id: container_id.clone() }),
        )?;
        match template {
            Template::Container(container) => Ok(container),
            Template::Atomic(_) => Err(vec![Diagnostic::WrongKind {
                id: container_id.clone(),
                observed: TemplateKind::Atomic,
                expected: TemplateKind::Container,
            }]),
        }
    }

    fn resolve_durations(&self, container: &ContainerTemplate) -> FacadeResult<Vec<Duration>> {
        let snapshot = self.store.snapshot();
        single(layout::child_durations(container, |id| {
            snapshot.get(id).map(Template::duration)
        }))
    }

    fn commit_container(&self, container: ContainerTemplate) -> FacadeResult<Template> {
        let updated = Template::Container(container);
        single(self.store.replace(updated.clone()))?;
        log::info!("facade: committed layout mutation on {}", updated.id());
        Ok(updated)
    }

    fn commit_layout_with_child(
        &self,
        container: ContainerTemplate,
        child: Template,
    ) -> FacadeResult<Template> {
        let updated = Template::Container(container);
        single(self.store.commit(vec![updated.clone(), child]))?;
        log::info!("facade: committed layout mutation on {}", updated.id());
        Ok(updated)
    }

    // -- wire format (`spec.md` §6.3) ----------------------------------------

    pub fn export(&self) -> LibraryDocument {
        let snapshot = self.store.snapshot();
        LibraryDocument::new(snapshot.iter().cloned().collect())
    }

    pub fn import(&self, document: LibraryDocument) -> FacadeResult<()> {
        let mut diagnostics = Vec::new();
        for template in document.templates {
            if let Err(d) = self.store.insert(template) {
                diagnostics.push(d);
            }
        }
        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(diagnostics)
        }
    }

    /// `export()` then serialize to the stable wire form's JSON text —
    /// what a host actually writes to disk or sends over the wire.
    pub fn export_json(&self) -> String {
        self.export().to_json()
    }

    /// Parse the stable wire form's JSON text, then `import()` it. A
    /// malformed document is reported as a `Diagnostic` rather than a
    /// panic, since `json` crosses a process boundary and is not
    /// trusted input.
    pub fn import_json(&self, json: &str) -> FacadeResult<()> {
        let document = LibraryDocument::from_json(json).map_err(|e| {
            vec![Diagnostic::MalformedDocument {
                reason: e.to_string(),
            }]
        })?;
        self.import(document)
    }
}

/// Checks invariant 5 (offset bound) for every segment, assuming
/// `container.segments` and `durations` are positionally aligned
/// (true whenever an operation preserves segment-list order).
fn check_offset_bounds(container: &ContainerTemplate, durations: &[Duration]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (segment, duration) in container.segments.iter().zip(durations) {
        if segment.offset + duration > container.common.estimated_duration {
            diagnostics.push(Diagnostic::OffsetOutOfBounds {
                container_id: container.common.id.clone(),
                child_id: segment.template_id.clone(),
                relationship_id: segment.relationship_id.clone(),
                offset: segment.offset,
                child_duration: *duration,
                container_duration: container.common.estimated_duration,
            });
        }
    }
    diagnostics
}

/// Builds a template-id -> duration lookup for operations that insert
/// a new segment and therefore can't rely on positional alignment
/// between `durations` and the post-mutation segment list. Must be
/// built from `container` *before* the insertion mutates it, while
/// `container.segments` and `durations` are still positionally
/// aligned; lookups against the post-mutation segment list then work
/// by id regardless of where the new segment landed.
fn duration_map(
    new_child_id: &TemplateId,
    new_child_duration: Duration,
    container: &ContainerTemplate,
    durations: &[Duration],
) -> HashMap<TemplateId, Duration> {
    let mut by_id: HashMap<TemplateId, Duration> = container
        .segments
        .iter()
        .map(|s| s.template_id.clone())
        .zip(durations.iter().copied())
        .collect();
    by_id.insert(new_child_id.clone(), new_child_duration);
    by_id
}

fn check_offset_bounds_by_id(
    container: &ContainerTemplate,
    by_id: &HashMap<TemplateId, Duration>,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for segment in &container.segments {
        let Some(duration) = by_id.get(&segment.template_id) else {
            continue;
        };
        if segment.offset + duration > container.common.estimated_duration {
            diagnostics.push(Diagnostic::OffsetOutOfBounds {
                container_id: container.common.id.clone(),
                child_id: segment.template_id.clone(),
                relationship_id: segment.relationship_id.clone(),
                offset: segment.offset,
                child_duration: *duration,
                container_duration: container.common.estimated_duration,
            });
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ledger_from;

    fn atomic_args(id: &str, duration: Duration) -> CreateAtomicArgs {
        CreateAtomicArgs {
            id: TemplateId::from(id),
            intent: format!("atomic {id}"),
            duration,
            will_consume: Ledger::new(),
            will_produce: Ledger::new(),
            author_id: None,
            version: Some(1),
        }
    }

    #[test]
    fn two_atom_container_produces_balanced_contract() {
        let facade = Facade::new();
        facade
            .create_atomic(CreateAtomicArgs {
                will_consume: ledger_from([("x", 1.0)]),
                will_produce: ledger_from([("y", 1.0)]),
                ..atomic_args("A", 400)
            })
            .unwrap();
        facade
            .create_atomic(CreateAtomicArgs {
                will_consume: ledger_from([("y", 1.0)]),
                will_produce: ledger_from([("z", 1.0)]),
                ..atomic_args("B", 400)
            })
            .unwrap();
        facade
            .create_container(CreateContainerArgs {
                id: TemplateId::from("C"),
                intent: "two steps".into(),
                duration: 1000,
                segments: vec![
                    SegmentSpec {
                        child_id: TemplateId::from("A"),
                        relationship_id: RelationshipId::from("r1"),
                        offset: 0,
                    },
                    SegmentSpec {
                        child_id: TemplateId::from("B"),
                        relationship_id: RelationshipId::from("r2"),
                        offset: 400,
                    },
                ],
                author_id: None,
                version: Some(1),
            })
            .unwrap();

        let report = facade.validate_container(&TemplateId::from("C"));
        assert!(report.is_valid);
        assert_eq!(
            report.contract_inputs.get(&VariableName::from("x")).unwrap().0,
            1.0
        );
        assert_eq!(
            report.contract_outputs.get(&VariableName::from("z")).unwrap().0,
            1.0
        );
        assert_eq!(report.first_atomic, Some(TemplateId::from("A")));
        assert_eq!(report.last_atomic, Some(TemplateId::from("B")));
    }

    #[test]
    fn create_container_rejects_child_below_ratio_floor() {
        let facade = Facade::new();
        facade.create_atomic(atomic_args("tiny", 50)).unwrap();
        let err = facade
            .create_container(CreateContainerArgs {
                id: TemplateId::from("C"),
                intent: "c".into(),
                duration: 1000,
                segments: vec![SegmentSpec {
                    child_id: TemplateId::from("tiny"),
                    relationship_id: RelationshipId::from("r1"),
                    offset: 0,
                }],
                author_id: None,
                version: Some(1),
            })
            .unwrap_err();
        assert!(matches!(err[0], Diagnostic::RatioTooSmall { required_minimum: 100, .. }));
    }

    #[test]
    fn create_container_adds_back_references_for_repeated_child() {
        let facade = Facade::new();
        facade.create_atomic(atomic_args("A", 400)).unwrap();
        facade
            .create_container(CreateContainerArgs {
                id: TemplateId::from("P"),
                intent: "p".into(),
                duration: 1000,
                segments: vec![
                    SegmentSpec {
                        child_id: TemplateId::from("A"),
                        relationship_id: RelationshipId::from("r1"),
                        offset: 0,
                    },
                    SegmentSpec {
                        child_id: TemplateId::from("A"),
                        relationship_id: RelationshipId::from("r2"),
                        offset: 500,
                    },
                ],
                author_id: None,
                version: Some(1),
            })
            .unwrap();

        let a = facade.get_template(&TemplateId::from("A")).unwrap();
        assert_eq!(a.references().len(), 2);
    }

    #[test]
    fn update_duration_cascades_upward_through_parent_chain() {
        let facade = Facade::new();
        facade.create_atomic(atomic_args("A", 100)).unwrap();
        facade
            .create_container(CreateContainerArgs {
                id: TemplateId::from("Mid"),
                intent: "mid".into(),
                duration: 500,
                segments: vec![SegmentSpec {
                    child_id: TemplateId::from("A"),
                    relationship_id: RelationshipId::from("r1"),
                    offset: 0,
                }],
                author_id: None,
                version: Some(1),
            })
            .unwrap();
        facade
            .create_container(CreateContainerArgs {
                id: TemplateId::from("Top"),
                intent: "top".into(),
                duration: 2000,
                segments: vec![SegmentSpec {
                    child_id: TemplateId::from("Mid"),
                    relationship_id: RelationshipId::from("r2"),
                    offset: 0,
                }],
                author_id: None,
                version: Some(1),
            })
            .unwrap();

        // shrinking Mid to 90 breaks the 90/2000 >= 200 floor against Top
        let err = facade
            .update_duration(&TemplateId::from("Mid"), 90)
            .unwrap_err();
        assert!(err.iter().any(|d| matches!(d, Diagnostic::RatioTooSmall { .. })));
    }

    #[test]
    fn pack_is_idempotent_through_the_facade() {
        let facade = Facade::new();
        facade.create_atomic(atomic_args("A", 100)).unwrap();
        facade.create_atomic(atomic_args("B", 100)).unwrap();
        facade
            .create_container(CreateContainerArgs {
                id: TemplateId::from("C"),
                intent: "c".into(),
                duration: 1000,
                segments: vec![
                    SegmentSpec {
                        child_id: TemplateId::from("A"),
                        relationship_id: RelationshipId::from("r1"),
                        offset: 500,
                    },
                    SegmentSpec {
                        child_id: TemplateId::from("B"),
                        relationship_id: RelationshipId::from("r2"),
                        offset: 0,
                    },
                ],
                author_id: None,
                version: Some(1),
            })
            .unwrap();

        let first = facade.pack(&TemplateId::from("C")).unwrap();
        let second = facade.pack(&TemplateId::from("C")).unwrap();
        assert_eq!(first.as_container().unwrap().segments, second.as_container().unwrap().segments);
    }

    #[test]
    fn add_to_end_then_remove_segment_restores_prior_state() {
        let facade = Facade::new();
        facade.create_atomic(atomic_args("A", 400)).unwrap();
        facade.create_atomic(atomic_args("B", 400)).unwrap();
        facade
            .create_container(CreateContainerArgs {
                id: TemplateId::from("C"),
                intent: "c".into(),
                duration: 1000,
                segments: vec![SegmentSpec {
                    child_id: TemplateId::from("A"),
                    relationship_id: RelationshipId::from("r1"),
                    offset: 0,
                }],
                author_id: None,
                version: Some(1),
            })
            .unwrap();

        let before = facade.get_template(&TemplateId::from("C")).unwrap();
        facade
            .add_to_end(&TemplateId::from("C"), &TemplateId::from("B"), RelationshipId::from("r2"))
            .unwrap();
        facade
            .remove_segment(&TemplateId::from("C"), RelationshipId::from("r2"))
            .unwrap();
        let after = facade.get_template(&TemplateId::from("C")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn insert_at_shifts_segments_by_offset_regardless_of_list_order() {
        let facade = Facade::new();
        facade.create_atomic(atomic_args("A", 100)).unwrap();
        facade.create_atomic(atomic_args("B", 100)).unwrap();
        facade.create_atomic(atomic_args("X", 200)).unwrap();
        facade
            .create_container(CreateContainerArgs {
                id: TemplateId::from("C"),
                intent: "c".into(),
                duration: 1000,
                // "B" (starts at 600) is listed before "A" (starts at 0),
                // so list position must not stand in for start offset.
                segments: vec![
                    SegmentSpec {
                        child_id: TemplateId::from("B"),
                        relationship_id: RelationshipId::from("rb"),
                        offset: 600,
                    },
                    SegmentSpec {
                        child_id: TemplateId::from("A"),
                        relationship_id: RelationshipId::from("ra"),
                        offset: 0,
                    },
                ],
                author_id: None,
                version: Some(1),
            })
            .unwrap();

        facade
            .insert_at(&TemplateId::from("C"), &TemplateId::from("X"), 300, RelationshipId::from("rx"))
            .unwrap();

        let container = facade.get_template(&TemplateId::from("C")).unwrap();
        let segments = &container.as_container().unwrap().segments;
        let offset_of = |id: &str| {
            segments
                .iter()
                .find(|s| s.template_id == TemplateId::from(id))
                .unwrap()
                .offset
        };
        assert_eq!(offset_of("A"), 0, "A starts before the insertion point and must stay put");
        assert_eq!(offset_of("B"), 800, "B starts at/after the insertion point and must shift");
        assert_eq!(offset_of("X"), 300);
    }

    #[test]
    fn delete_template_refuses_when_still_referenced() {
        let facade = Facade::new();
        facade.create_atomic(atomic_args("A", 400)).unwrap();
        facade
            .create_container(CreateContainerArgs {
                id: TemplateId::from("C"),
                intent: "c".into(),
                duration: 1000,
                segments: vec![SegmentSpec {
                    child_id: TemplateId::from("A"),
                    relationship_id: RelationshipId::from("r1"),
                    offset: 0,
                }],
                author_id: None,
                version: Some(1),
            })
            .unwrap();
        let err = facade.delete_template(&TemplateId::from("A")).unwrap_err();
        assert!(matches!(err[0], Diagnostic::DeleteRefused { .. }));
    }

    #[test]
    fn export_then_import_round_trips_into_a_fresh_facade() {
        let facade = Facade::new();
        facade.create_atomic(atomic_args("A", 400)).unwrap();
        let document = facade.export();

        let other = Facade::new();
        other.import(document).unwrap();
        assert!(other.get_template(&TemplateId::from("A")).is_ok());
    }

    #[test]
    fn export_json_then_import_json_round_trips_into_a_fresh_facade() {
        let facade = Facade::new();
        facade.create_atomic(atomic_args("A", 400)).unwrap();
        let json = facade.export_json();

        let other = Facade::new();
        other.import_json(&json).unwrap();
        let restored = other.get_template(&TemplateId::from("A")).unwrap();
        assert_eq!(restored, facade.get_template(&TemplateId::from("A")).unwrap());
    }

    #[test]
    fn import_json_reports_malformed_input_as_a_diagnostic() {
        let facade = Facade::new();
        let err = facade.import_json("not json").unwrap_err();
        assert!(matches!(err[0], Diagnostic::MalformedDocument { .. }));
    }
}
