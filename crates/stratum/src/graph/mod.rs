//! The in-memory dependency graph and the algorithms run over it.
//!
//! One [`Graph`] is built per run by the [`GraphBuilder`], then handed by
//! value through cycle detection ([`detect_cycles`]) and layered ordering
//! ([`topological_order`]). Nothing here is shared between runs.

mod builder;
mod cycles;
mod model;
mod order;
mod types;

pub use builder::{BuildOutput, DEFAULT_READ_CONCURRENCY, GraphBuilder};
pub use cycles::{CycleInfo, CycleReport, detect_cycles};
pub use model::{EdgeInsert, Graph};
pub use order::{TopologicalOrder, topological_order};
pub use types::{EdgeKind, Layer, Node, NodeKey, NodeType, UNORDERED};
