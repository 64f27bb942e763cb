//! Runs a flattened schedule through a variable-quantity ledger and
//! emits the container's input/output contract plus every violation.
//! `spec.md` §4.5.

use crate::diagnostic::Diagnostic;
use crate::flatten::FlattenOutcome;
use crate::ids::TemplateId;
use crate::model::{Ledger, Quantity, VariableName};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct SimulationOutcome {
    pub contract_inputs: Ledger,
    pub contract_outputs: Ledger,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn simulate(container_id: &TemplateId, flattened: &FlattenOutcome) -> SimulationOutcome {
    if flattened.items.is_empty() {
        return SimulationOutcome {
            diagnostics: vec![Diagnostic::EmptyContainer {
                container_id: container_id.clone(),
            }],
            ..Default::default()
        };
    }

    let mut diagnostics = Vec::new();
    let mut ledger: Ledger = Ledger::new();
    let mut all_produced: Ledger = Ledger::new();
    let mut all_consumed: Ledger = Ledger::new();
    let mut contract_inputs: Ledger = Ledger::new();
    let mut contract_outputs: Ledger = Ledger::new();
    let mut last_producer: HashMap<VariableName, (TemplateId, String)> = HashMap::new();

    for item in &flattened.items {
        let atomic = &item.atomic;
        let is_first = flattened.first_atomic.as_ref() == Some(&atomic.common.id);

        for (variable, required) in &atomic.will_consume {
            let available = *ledger.get(variable).unwrap_or(&Quantity::ZERO);
            if available.0 < required.0 {
                let deficit = Quantity::new(required.0 - available.0);
                if is_first {
                    *contract_inputs.entry(variable.clone()).or_insert(Quantity::ZERO) += deficit;
                } else {
                    diagnostics.push(Diagnostic::UnsatisfiedConsume {
                        atomic_id: atomic.common.id.clone(),
                        atomic_intent: atomic.common.intent.clone(),
                        variable: variable.to_string(),
                        required: required.0,
                        available: available.0,
                        absolute_offset: item.absolute_offset,
                    });
                }
            }
            ledger.insert(variable.clone(), available - *required);
            *all_consumed.entry(variable.clone()).or_insert(Quantity::ZERO) += *required;
        }

        for (variable, produced) in &atomic.will_produce {
            *ledger.entry(variable.clone()).or_insert(Quantity::ZERO) += *produced;
            *all_produced.entry(variable.clone()).or_insert(Quantity::ZERO) += *produced;
            last_producer.insert(
                variable.clone(),
                (atomic.common.id.clone(), atomic.common.intent.clone()),
            );
        }
    }

    for (variable, produced) in &all_produced {
        let consumed = *all_consumed.get(variable).unwrap_or(&Quantity::ZERO);
        // `Quantity::new` clamps a negative (net-consumed) difference to
        // zero, and `is_zero` absorbs float round-off noise around that
        // boundary so a production/consumption pair that nets out to an
        // epsilon-sized dust doesn't surface as a spurious contract
        // output or an `unsatisfied-produce` diagnostic.
        let remaining = Quantity::new(produced.0 - consumed.0);
        if !remaining.is_zero() {
            let (producer_id, producer_intent) = last_producer
                .get(variable)
                .cloned()
                .expect("a variable in all_produced always has a last producer");
            if flattened.last_atomic.as_ref() == Some(&producer_id) {
                *contract_outputs.entry(variable.clone()).or_insert(Quantity::ZERO) += remaining;
            } else {
                diagnostics.push(Diagnostic::UnsatisfiedProduce {
                    producer_id,
                    producer_intent,
                    variable: variable.to_string(),
                    produced: produced.0,
                    consumed: consumed.0,
                });
            }
        }
    }

    diagnostics.extend(overlaps(flattened));

    log::debug!(
        "simulated {} ({} contract inputs, {} contract outputs, {} diagnostics)",
        container_id,
        contract_inputs.len(),
        contract_outputs.len(),
        diagnostics.len()
    );

    SimulationOutcome {
        contract_inputs,
        contract_outputs,
        diagnostics,
    }
}

/// Any two atomics whose half-open `[start, end)` intervals intersect
/// yield one diagnostic per pair. Independent of the ledger walk — both
/// an overlap and an unsatisfied-consume can be reported for the same
/// container.
fn overlaps(flattened: &FlattenOutcome) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let items = &flattened.items;
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let a = &items[i];
            let b = &items[j];
            let a_end = a.absolute_offset + a.atomic.common.estimated_duration;
            let b_end = b.absolute_offset + b.atomic.common.estimated_duration;
            let start = a.absolute_offset.max(b.absolute_offset);
            let end = a_end.min(b_end);
            if start < end {
                diagnostics.push(Diagnostic::Overlap {
                    a_id: a.atomic.common.id.clone(),
                    a_intent: a.atomic.common.intent.clone(),
                    b_id: b.atomic.common.id.clone(),
                    b_intent: b.atomic.common.intent.clone(),
                    overlap_start: start,
                    overlap_end: end,
                });
            }
        }
    }
    diagnostics
}
