use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::assembler::Assembler;
use super::output::OutputBuffer;
use crate::buffer::Buffer;
use crate::config::CollectorConfig;
use crate::errors::Result;
use crate::relations::{Collector, CollectorPolicy};
use crate::types::{Item, ItemType, ObjectId, Relation, RelationMember};

/// Counters describing the areas produced by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaStats {
    /// Assembler invocations for ways not referenced by any relation.
    pub ways_assembled: usize,
    /// Assembler invocations for completed relations.
    pub relations_assembled: usize,
    /// Relations reported as missing members.
    pub relations_incomplete: usize,
}

/// Policy collecting the member ways of relations whose `type` tag is one of
/// the configured relation types and assembling them into areas.
pub struct MultipolygonPolicy<A: Assembler> {
    assembler_config: A::Config,
    config: CollectorConfig,
    output: OutputBuffer,
    stats: AreaStats,
    incomplete: Vec<ObjectId>,
    _assembler: PhantomData<fn() -> A>,
}

impl<A: Assembler> MultipolygonPolicy<A> {
    pub fn new(assembler_config: A::Config, config: &CollectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            assembler_config,
            config: config.clone(),
            output: OutputBuffer::from_config(config),
            stats: AreaStats::default(),
            incomplete: Vec::new(),
            _assembler: PhantomData,
        })
    }

    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputBuffer {
        &mut self.output
    }

    pub fn stats(&self) -> &AreaStats {
        &self.stats
    }

    /// Relations reported as incomplete so far.
    pub fn incomplete(&self) -> &[ObjectId] {
        &self.incomplete
    }
}

impl<A: Assembler> CollectorPolicy for MultipolygonPolicy<A> {
    fn keep_relation(&self, relation: &Relation) -> bool {
        relation
            .tags
            .get_value_by_key("type")
            .is_some_and(|t| self.config.is_area_relation_type(t))
    }

    fn keep_member(&self, _relation: &Relation, member: &RelationMember) -> bool {
        member.member_type == ItemType::Way
    }

    fn collects(&self, item_type: ItemType) -> bool {
        item_type == ItemType::Way
    }

    fn member_not_in_any_relation(&mut self, item: &Item) -> Result<()> {
        let Item::Way(way) = item else {
            return Ok(());
        };
        if way.ends_have_same_location() && way.nodes.len() > self.config.min_ring_nodes {
            let mut assembler = A::new(&self.assembler_config);
            assembler.assemble_way(way, self.output.buffer_mut())?;
            self.stats.ways_assembled += 1;
            self.output.maybe_flush()?;
        }
        Ok(())
    }

    fn complete_relation(
        &mut self,
        relation: &Relation,
        offsets: &[usize],
        members: &Buffer,
    ) -> Result<()> {
        let mut assembler = A::new(&self.assembler_config);
        assembler.assemble_relation(relation, offsets, members, self.output.buffer_mut())?;
        self.stats.relations_assembled += 1;
        self.output.maybe_flush()
    }

    fn incomplete_relations(&mut self, relation_ids: &[ObjectId]) {
        let ids: Vec<String> = relation_ids.iter().map(|id| id.to_string()).collect();
        warn!(
            count = relation_ids.len(),
            "some member ways missing for these multipolygon relations: {}",
            ids.join(" ")
        );
        self.stats.relations_incomplete += relation_ids.len();
        self.incomplete.extend_from_slice(relation_ids);
    }
}

/// Collector assembling multipolygon and boundary relations.
pub type MultipolygonCollector<A> = Collector<MultipolygonPolicy<A>>;

impl<A: Assembler> Collector<MultipolygonPolicy<A>> {
    /// Creates a multipolygon collector from an assembler configuration and
    /// a collector configuration.
    pub fn multipolygon(assembler_config: A::Config, config: &CollectorConfig) -> Result<Self> {
        let policy = MultipolygonPolicy::new(assembler_config, config)?;
        Ok(Collector::new(policy, config))
    }

    /// Installs the downstream consumer for flushed areas.
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Buffer) -> Result<()> + 'static,
    {
        self.policy_mut().output_mut().set_callback(callback);
    }

    /// Flushes the output buffer to the callback regardless of its size.
    pub fn flush(&mut self) -> Result<()> {
        self.policy_mut().output_mut().flush()
    }

    /// Returns the collected output, leaving an empty buffer behind.
    pub fn take(&mut self) -> Buffer {
        self.policy_mut().output_mut().take()
    }
}
