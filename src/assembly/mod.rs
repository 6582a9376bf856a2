mod driver;
mod group;
mod readiness;
mod sort;
mod stitch;

pub use driver::{
    Assembly, AssemblyError, AssemblyFailure, AssemblyStats, StreamAssembler,
    DEFAULT_READY_THRESHOLD,
};
pub use group::{analyze_groups, group_by_backend, suppress, BackendGroup};
pub use readiness::{classify, partition, ClassifierState, Partition, Readiness};
pub use sort::{sort_stream, SortKeys};
pub use stitch::stitch;
