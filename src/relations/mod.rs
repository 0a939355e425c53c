/// Relation member collection.
///
/// A two-pass resolver that registers relations on the first pass over the
/// input and collects their members on the second, handing every completed
/// relation to a [`CollectorPolicy`].
mod collector;
mod meta;
mod policy;

pub use collector::{Collector, CollectorStats, FirstPass, Phase, SecondPass};
pub use meta::{equal_range, MemberMeta, RelationMeta};
pub use policy::CollectorPolicy;
