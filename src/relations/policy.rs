use crate::buffer::Buffer;
use crate::errors::Result;
use crate::types::{Item, ItemType, ObjectId, Relation, RelationMember};

/// Hooks that specialize a [`Collector`](super::Collector) for one task.
///
/// The collector owns all bookkeeping; the policy only decides what is
/// interesting and what to do once a relation has everything it needs.
pub trait CollectorPolicy {
    /// Pass 1 filter: should this relation be tracked at all?
    fn keep_relation(&self, relation: &Relation) -> bool;

    /// Pass 1 filter: should this member of a kept relation be waited for?
    fn keep_member(&self, relation: &Relation, member: &RelationMember) -> bool;

    /// Whether items of this type are looked up during pass 2.
    fn collects(&self, item_type: ItemType) -> bool;

    /// Called during pass 2 for a collected item no kept relation references.
    fn member_not_in_any_relation(&mut self, _item: &Item) -> Result<()> {
        Ok(())
    }

    /// Called exactly once per kept relation when its last member arrived.
    ///
    /// `offsets` holds the members-buffer offsets of all tracked members in
    /// their original order.
    fn complete_relation(
        &mut self,
        relation: &Relation,
        offsets: &[usize],
        members: &Buffer,
    ) -> Result<()>;

    /// Called once at end of input with the ids of relations that never
    /// received all of their members. Not called if there are none.
    fn incomplete_relations(&mut self, _relation_ids: &[ObjectId]) {}
}
