use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::meta::{equal_range, MemberMeta, RelationMeta};
use super::policy::CollectorPolicy;
use crate::buffer::Buffer;
use crate::config::CollectorConfig;
use crate::errors::{CollectorError, Result};
use crate::handler::{self, Handler};
use crate::types::{Item, ItemType, ObjectId, Relation, RelationMember, NO_REF};

/// Number of member types that can be tracked (node, way, relation).
const MEMBER_TYPES: usize = 3;

/// Which pass the collector is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Pass 1: relations are being registered.
    Registering,
    /// Pass 2: members are being matched against the sorted index.
    Matching,
    /// End of input has been processed; all state is released.
    Finished,
}

/// Counters describing a collector run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorStats {
    pub relations_kept: usize,
    pub relations_completed: usize,
    pub relations_incomplete: usize,
    pub members_stored: usize,
    pub members_evicted: usize,
    pub purges: usize,
}

/// Two-pass resolver collecting the members of relations.
///
/// Pass 1 registers every relation the policy keeps and records one pending
/// entry per tracked member. Pass 2 matches incoming objects against those
/// entries; as soon as a relation has all of its members the policy's
/// completion hook runs, after which members no other relation is waiting
/// for are marked deleted in the members buffer.
pub struct Collector<P: CollectorPolicy> {
    policy: P,
    phase: Phase,
    /// Copies of all kept relations, addressed by `RelationMeta::relation_offset`.
    relations_buffer: Buffer,
    /// Copies of all matched members, addressed by `MemberMeta::buffer_offset`.
    members_buffer: Buffer,
    relations: Vec<RelationMeta>,
    /// Pending entries per member type; sorted by member id once pass 2 starts.
    member_meta: [Vec<MemberMeta>; MEMBER_TYPES],
    /// Every id that had a pending entry when pass 1 ended, sorted and
    /// deduplicated. Unlike `member_meta` this does not shrink on completion.
    referenced: [Vec<ObjectId>; MEMBER_TYPES],
    purge_interval: usize,
    completed_since_purge: usize,
    stats: CollectorStats,
}

impl<P: CollectorPolicy> Collector<P> {
    /// Creates a collector with buffers sized from `config`.
    pub fn new(policy: P, config: &CollectorConfig) -> Self {
        Self {
            policy,
            phase: Phase::Registering,
            relations_buffer: Buffer::new(config.initial_relation_buffer_size, config.auto_grow),
            members_buffer: Buffer::new(config.initial_member_buffer_size, config.auto_grow),
            relations: Vec::new(),
            member_meta: Default::default(),
            referenced: Default::default(),
            purge_interval: config.purge_interval,
            completed_since_purge: 0,
            stats: CollectorStats::default(),
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    pub fn into_policy(self) -> P {
        self.policy
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }

    /// Buffer holding the matched members.
    pub fn members_buffer(&self) -> &Buffer {
        &self.members_buffer
    }

    /// Number of kept relations still waiting for members.
    pub fn active_relations(&self) -> usize {
        self.relations.iter().filter(|r| !r.is_completed()).count()
    }

    /// Number of pending member entries of the given type.
    pub fn pending_members(&self, item_type: ItemType) -> usize {
        item_type
            .member_index()
            .map(|idx| self.member_meta[idx].len())
            .unwrap_or(0)
    }

    /// Pass 1 entry point.
    ///
    /// Returns whether the relation was kept. A kept relation without any
    /// tracked member completes immediately.
    pub fn register_relation(&mut self, relation: &Relation) -> Result<bool> {
        if self.phase != Phase::Registering {
            return Err(CollectorError::Phase {
                message: format!("relation {} registered after pass 1 ended", relation.id),
            });
        }

        if !self.policy.keep_relation(relation) {
            return Ok(false);
        }

        let relation_pos = self.relations.len();
        let mut stored = relation.clone();
        let mut pending: Vec<(usize, MemberMeta)> = Vec::new();

        for (n, member) in stored.members.iter_mut().enumerate() {
            let index = member.member_type.member_index();
            match index {
                Some(idx)
                    if member.member_ref != NO_REF
                        && self.policy.keep_member(relation, member) =>
                {
                    pending.push((idx, MemberMeta::new(member.member_ref, relation_pos, n)));
                }
                // Untracked members are stored with the sentinel ref.
                _ => member.member_ref = NO_REF,
            }
        }

        let offset = self.relations_buffer.append(&Item::Relation(stored))?;
        self.relations_buffer.commit();

        let mut relation_meta = RelationMeta::new(offset);
        for (idx, member_meta) in pending {
            self.member_meta[idx].push(member_meta);
            relation_meta.increment_need_members();
        }
        self.relations.push(relation_meta);
        self.stats.relations_kept += 1;

        if relation_meta.has_all_members() {
            trace!(relation_id = relation.id, "relation has no tracked members");
            self.complete_relation(relation_pos)?;
        }

        Ok(true)
    }

    /// Ends pass 1 by sorting the pending-member index.
    pub fn prepare_for_lookup(&mut self) -> Result<()> {
        match self.phase {
            Phase::Registering => {
                for (metas, ids) in self.member_meta.iter_mut().zip(&mut self.referenced) {
                    metas.sort();
                    *ids = metas.iter().map(|m| m.member_id()).collect();
                    ids.dedup();
                }
                self.phase = Phase::Matching;
                debug!(
                    relations = self.relations.len(),
                    active = self.active_relations(),
                    pending_ways = self.member_meta[1].len(),
                    "pass 1 complete"
                );
                Ok(())
            }
            Phase::Matching => Ok(()),
            Phase::Finished => Err(CollectorError::Phase {
                message: "collector already finished".to_string(),
            }),
        }
    }

    /// Pass 2 entry point.
    ///
    /// Returns `true` if a kept relation references this item, even one that
    /// has already completed. Items nobody references are passed to the
    /// policy's unreferenced-member hook.
    pub fn match_member(&mut self, item: &Item) -> Result<bool> {
        match self.phase {
            Phase::Registering => self.prepare_for_lookup()?,
            Phase::Matching => {}
            Phase::Finished => {
                return Err(CollectorError::Phase {
                    message: format!(
                        "{} {} matched after end of input",
                        item.item_type().as_str(),
                        item.id()
                    ),
                })
            }
        }

        let item_type = item.item_type();
        let Some(idx) = item_type.member_index() else {
            return Ok(false);
        };
        if !self.policy.collects(item_type) {
            return Ok(false);
        }

        let range = equal_range(&self.member_meta[idx], item.id());
        if range.is_empty() {
            if self.referenced[idx].binary_search(&item.id()).is_ok() {
                debug!(
                    item_type = item_type.as_str(),
                    id = item.id(),
                    "ignoring member of an already completed relation"
                );
                return Ok(true);
            }
            self.policy.member_not_in_any_relation(item)?;
            return Ok(false);
        }

        if self.member_meta[idx][range.clone()]
            .iter()
            .all(|m| m.buffer_offset().is_some())
        {
            debug!(
                item_type = item_type.as_str(),
                id = item.id(),
                "ignoring duplicate member"
            );
            return Ok(true);
        }

        let offset = self.members_buffer.append(item)?;
        self.members_buffer.commit();
        self.stats.members_stored += 1;

        let mut positions = Vec::with_capacity(range.len());
        for member_meta in &mut self.member_meta[idx][range] {
            member_meta.set_buffer_offset(offset);
            positions.push(member_meta.relation_pos());
        }

        for pos in positions {
            if !self.relations[pos].got_one_member() {
                return Err(CollectorError::Invariant {
                    message: "member matched for a relation that needs no more members"
                        .to_string(),
                    relation_id: self.relation_id(pos)?,
                    member_id: Some(item.id()),
                });
            }
            if self.relations[pos].has_all_members() {
                self.complete_relation(pos)?;
            }
        }

        self.maybe_purge()?;
        Ok(true)
    }

    /// Finishes pass 2.
    ///
    /// Returns the ids of all kept relations that never received all of
    /// their members, in registration order, after handing them to the
    /// policy. All bookkeeping is released afterwards.
    pub fn end_of_input(&mut self) -> Result<Vec<ObjectId>> {
        if self.phase == Phase::Registering {
            self.prepare_for_lookup()?;
        }

        let mut incomplete = Vec::new();
        for pos in 0..self.relations.len() {
            if !self.relations[pos].is_completed() {
                incomplete.push(self.relation_id(pos)?);
            }
        }

        self.stats.relations_incomplete += incomplete.len();
        if !incomplete.is_empty() {
            self.policy.incomplete_relations(&incomplete);
        }

        self.relations.clear();
        for metas in &mut self.member_meta {
            metas.clear();
        }
        for ids in &mut self.referenced {
            ids.clear();
        }
        self.relations_buffer.clear();
        self.members_buffer.clear();
        self.phase = Phase::Finished;

        debug!(
            completed = self.stats.relations_completed,
            incomplete = incomplete.len(),
            "pass 2 complete"
        );
        Ok(incomplete)
    }

    /// Handler that registers relations; its `flush` ends pass 1.
    pub fn first_pass(&mut self) -> FirstPass<'_, P> {
        FirstPass { collector: self }
    }

    /// Handler that matches members against the index.
    pub fn second_pass(&mut self) -> SecondPass<'_, P> {
        SecondPass { collector: self }
    }

    /// Runs both passes and end-of-input processing.
    ///
    /// `first` and `second` must yield the same items in the same order.
    pub fn run<I1, I2>(&mut self, first: I1, second: I2) -> Result<Vec<ObjectId>>
    where
        I1: IntoIterator<Item = Result<Item>>,
        I2: IntoIterator<Item = Result<Item>>,
    {
        handler::apply(first, &mut self.first_pass())?;
        handler::apply(second, &mut self.second_pass())?;
        self.end_of_input()
    }

    /// Compacts the members and relations buffers, dropping deleted items.
    ///
    /// Returns the number of bytes reclaimed.
    pub fn purge(&mut self) -> Result<usize> {
        let mut moved_members: HashMap<usize, usize> = HashMap::new();
        let mut reclaimed = self
            .members_buffer
            .purge_deleted(|old, new| {
                moved_members.insert(old, new);
            })?;
        if !moved_members.is_empty() {
            for member_meta in self.member_meta.iter_mut().flatten() {
                if let Some(new) = member_meta
                    .buffer_offset()
                    .and_then(|old| moved_members.get(&old))
                {
                    member_meta.set_buffer_offset(*new);
                }
            }
        }

        let mut moved_relations: HashMap<usize, usize> = HashMap::new();
        reclaimed += self.relations_buffer.purge_deleted(|old, new| {
            moved_relations.insert(old, new);
        })?;
        for relation_meta in self.relations.iter_mut().filter(|r| !r.is_completed()) {
            if let Some(new) = moved_relations.get(&relation_meta.relation_offset()) {
                relation_meta.set_relation_offset(*new);
            }
        }

        self.completed_since_purge = 0;
        self.stats.purges += 1;
        debug!(
            reclaimed,
            moved_members = moved_members.len(),
            moved_relations = moved_relations.len(),
            "purged collector buffers"
        );
        Ok(reclaimed)
    }

    fn maybe_purge(&mut self) -> Result<()> {
        if self.purge_interval > 0 && self.completed_since_purge >= self.purge_interval {
            self.purge()?;
        }
        Ok(())
    }

    fn load_relation(&self, pos: usize) -> Result<Relation> {
        let offset = self.relations[pos].relation_offset();
        match self.relations_buffer.get(offset)? {
            Item::Relation(relation) => Ok(relation),
            other => Err(CollectorError::Buffer {
                message: format!("expected a relation, found a {}", other.item_type().as_str()),
                offset,
            }),
        }
    }

    fn relation_id(&self, pos: usize) -> Result<ObjectId> {
        Ok(self.load_relation(pos)?.id)
    }

    /// Runs the completion hook for the relation at `pos`, then releases its
    /// pending entries and evicts members nobody else is waiting for.
    fn complete_relation(&mut self, pos: usize) -> Result<()> {
        let relation = self.load_relation(pos)?;

        let mut offsets = Vec::new();
        for (n, member) in tracked_members(&relation) {
            let idx = Self::tracked_index(&relation, member.member_type)?;
            let metas = &self.member_meta[idx];
            let offset = equal_range(metas, member.member_ref)
                .map(|i| &metas[i])
                .find(|m| m.relation_pos() == pos && m.member_pos() == n)
                .and_then(|m| m.buffer_offset())
                .ok_or_else(|| CollectorError::Invariant {
                    message: "relation complete but member has no resolved offset".to_string(),
                    relation_id: relation.id,
                    member_id: Some(member.member_ref),
                })?;
            offsets.push(offset);
        }

        self.policy
            .complete_relation(&relation, &offsets, &self.members_buffer)?;

        for (n, member) in tracked_members(&relation) {
            let idx = Self::tracked_index(&relation, member.member_type)?;
            let metas = &mut self.member_meta[idx];
            let range = equal_range(metas, member.member_ref);
            let missing = || CollectorError::Invariant {
                message: "no pending entry for member at completion".to_string(),
                relation_id: relation.id,
                member_id: Some(member.member_ref),
            };
            if range.is_empty() {
                return Err(missing());
            }
            let only_entry = range.len() == 1;
            let found = range
                .clone()
                .find(|&i| metas[i].relation_pos() == pos && metas[i].member_pos() == n)
                .ok_or_else(missing)?;

            if only_entry {
                if let Some(offset) = metas[found].buffer_offset() {
                    self.members_buffer.set_deleted(offset, true)?;
                    self.stats.members_evicted += 1;
                }
            }
            metas.remove(found);
        }

        let relation_meta = &mut self.relations[pos];
        relation_meta.mark_completed();
        self.relations_buffer
            .set_deleted(relation_meta.relation_offset(), true)?;
        self.stats.relations_completed += 1;
        self.completed_since_purge += 1;

        trace!(relation_id = relation.id, members = offsets.len(), "relation complete");
        Ok(())
    }

    fn tracked_index(relation: &Relation, member_type: ItemType) -> Result<usize> {
        member_type
            .member_index()
            .ok_or_else(|| CollectorError::Invariant {
                message: format!("{} stored as a tracked member", member_type.as_str()),
                relation_id: relation.id,
                member_id: None,
            })
    }
}

/// Members of a stored relation that have a pending entry, with their
/// position in the member list.
fn tracked_members(relation: &Relation) -> impl Iterator<Item = (usize, &RelationMember)> {
    relation
        .members
        .iter()
        .enumerate()
        .filter(|(_, m)| m.member_ref != NO_REF)
}

/// Pass 1 adapter returned by [`Collector::first_pass`].
pub struct FirstPass<'a, P: CollectorPolicy> {
    collector: &'a mut Collector<P>,
}

impl<P: CollectorPolicy> Handler for FirstPass<'_, P> {
    fn relation(&mut self, relation: &Relation) -> Result<()> {
        self.collector.register_relation(relation)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.collector.prepare_for_lookup()
    }
}

/// Pass 2 adapter returned by [`Collector::second_pass`].
pub struct SecondPass<'a, P: CollectorPolicy> {
    collector: &'a mut Collector<P>,
}

impl<P: CollectorPolicy> Handler for SecondPass<'_, P> {
    fn item(&mut self, item: &Item) -> Result<()> {
        self.collector.match_member(item)?;
        Ok(())
    }
}
