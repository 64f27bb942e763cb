//! The value types the rest of the engine operates on. `spec.md` §3.

pub mod ledger;
pub mod template;

pub use ledger::{ledger_from, Ledger, Quantity, VariableName};
pub use template::{
    AtomicTemplate, ContainerTemplate, Duration, ParentRef, Segment, Template, TemplateCommon,
    TemplateKind, TemplateMetadata,
};
