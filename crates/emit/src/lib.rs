//! # DOM Emit
//!
//! Turns a finished interface graph into TypeScript declaration files.
//!
//! ```text
//! WebIdl (integrated)
//!     │
//!     ├──> exposed_types(graph, "Window", known.window) ──> emit(Flavor::Web)
//!     ├──> exposed_types(graph, "Worker", known.worker) ──> emit(Flavor::Worker)
//!     └──> graph as is ─────────────────────────────────> emit(Flavor::Iterators)
//! ```

mod emitter;
mod error;
mod expose;

pub use emitter::{emit, ts_type, Flavor};
pub use error::{EmitError, Result};
pub use expose::{exposed_types, is_exposed_in, KnownTypes, DEFAULT_CONTEXT};
