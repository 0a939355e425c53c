/// Area assembly from multipolygon relations and closed ways.
///
/// [`MultipolygonPolicy`] specializes the relation collector for areas; the
/// geometry itself is built by an [`Assembler`], and results are buffered in
/// an [`OutputBuffer`] that flushes to a downstream callback.
mod assembler;
mod multipolygon;
mod output;

pub use assembler::{Assembler, AssemblerConfig, RoleAssembler};
pub use multipolygon::{AreaStats, MultipolygonCollector, MultipolygonPolicy};
pub use output::{FlushCallback, OutputBuffer};
