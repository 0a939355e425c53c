use std::cmp::Ordering;

use crate::types::ObjectId;

/// Pending reference from a kept relation to one of its members.
///
/// Ordered by member id only, so that a sorted vector of these keeps all
/// entries for the same member contiguous.
#[derive(Debug, Clone, Copy)]
pub struct MemberMeta {
    member_id: ObjectId,
    relation_pos: usize,
    member_pos: usize,
    buffer_offset: Option<usize>,
}

impl MemberMeta {
    pub fn new(member_id: ObjectId, relation_pos: usize, member_pos: usize) -> Self {
        Self {
            member_id,
            relation_pos,
            member_pos,
            buffer_offset: None,
        }
    }

    pub fn member_id(&self) -> ObjectId {
        self.member_id
    }

    /// Position of the owning relation in the collector's relation table.
    pub fn relation_pos(&self) -> usize {
        self.relation_pos
    }

    /// Position of the member within the relation's member list.
    pub fn member_pos(&self) -> usize {
        self.member_pos
    }

    /// Offset of the matched member in the members buffer, once matched.
    pub fn buffer_offset(&self) -> Option<usize> {
        self.buffer_offset
    }

    pub(crate) fn set_buffer_offset(&mut self, offset: usize) {
        self.buffer_offset = Some(offset);
    }
}

impl PartialEq for MemberMeta {
    fn eq(&self, other: &Self) -> bool {
        self.member_id == other.member_id
    }
}

impl Eq for MemberMeta {}

impl PartialOrd for MemberMeta {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemberMeta {
    fn cmp(&self, other: &Self) -> Ordering {
        self.member_id.cmp(&other.member_id)
    }
}

/// Bookkeeping for one kept relation.
#[derive(Debug, Clone, Copy)]
pub struct RelationMeta {
    relation_offset: usize,
    need_members: usize,
    completed: bool,
}

impl RelationMeta {
    pub fn new(relation_offset: usize) -> Self {
        Self {
            relation_offset,
            need_members: 0,
            completed: false,
        }
    }

    /// Offset of the stored relation in the relations buffer.
    pub fn relation_offset(&self) -> usize {
        self.relation_offset
    }

    /// Number of members still missing.
    pub fn need_members(&self) -> usize {
        self.need_members
    }

    pub fn has_all_members(&self) -> bool {
        self.need_members == 0
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn set_relation_offset(&mut self, offset: usize) {
        self.relation_offset = offset;
    }

    pub(crate) fn increment_need_members(&mut self) {
        self.need_members += 1;
    }

    /// Records one matched member. Returns `false` if nothing was missing.
    pub(crate) fn got_one_member(&mut self) -> bool {
        match self.need_members.checked_sub(1) {
            Some(n) => {
                self.need_members = n;
                true
            }
            None => false,
        }
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }
}

/// Returns the index range of all entries for `member_id` in a sorted slice.
pub fn equal_range(metas: &[MemberMeta], member_id: ObjectId) -> std::ops::Range<usize> {
    let start = metas.partition_point(|m| m.member_id < member_id);
    let end = start + metas[start..].partition_point(|m| m.member_id == member_id);
    start..end
}
