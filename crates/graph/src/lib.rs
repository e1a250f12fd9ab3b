//! # DOM Graph
//!
//! Consolidates partial WebIDL fragments into one interface graph.
//!
//! ## Features
//!
//! - **Typed graph model** - interfaces, mixins, dictionaries, enums, typedefs, callbacks
//! - **Policy-driven merge** - strict, standard, additive and override rules per level
//! - **Template pruning** - removal templates shaped like the graph
//! - **Exposure resolution** - inherited and forced execution contexts
//!
//! ## Architecture
//!
//! ```text
//! Fragment[] + baseline WebIdl
//!     │
//!     ├──> Integrator (fixed phase order)
//!     │      ├─ stamp deprecated fragments
//!     │      ├─ merge standard definitions        (MergePolicy::STANDARD)
//!     │      ├─ fold partials and includes        (MergePolicy::OVERRIDE)
//!     │      ├─ prune removed types               (Template)
//!     │      ├─ merge added types                 (MergePolicy::ADDITIVE)
//!     │      ├─ merge overriding types, comments  (MergePolicy::OVERRIDE)
//!     │      └─ force override-exposed            (ExposureMode::Force)
//!     │
//!     └──> Integrated { graph, report }
//! ```

mod error;
mod exposure;
mod integrator;
mod merge;
mod prune;
mod types;

pub use error::{GraphError, Result};
pub use exposure::{effective_exposure, resolve_exposure, ExposureMode};
pub use integrator::{
    apply_exposure_overrides, fold_includes, fold_partials, locate, merge_additions,
    merge_comments, merge_overrides, merge_standard, stamp_deprecated, Collection, Fragment,
    Include, Integrated, IntegrationReport, Integrator, IntegratorOptions, Templates, Unresolved,
    PARTIAL_INTERFACE_TARGETS, PARTIAL_MIXIN_TARGETS,
};
pub use merge::{
    merge, merge_dictionary_members, merge_members, Identified, Merge, MergeCx, MergePolicy,
    Policy,
};
pub use prune::{prune, prune_value, Template};
pub use types::{
    CallbackFunction, CallbackFunctions, CallbackInterfaces, Constant, Constants, Constructor,
    Dictionaries, Dictionary, Enum, Enums, Exposure, Extra, Interface, Interfaces, IteratorDecl,
    Member, Members, Method, Methods, Mixins, Param, Properties, Property, Signature, Subtype,
    TypeDef, TypeDefs, TypeName, Typed, WebIdl,
};
