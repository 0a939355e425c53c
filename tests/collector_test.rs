use areacollect::buffer::Buffer;
use areacollect::config::CollectorConfig;
use areacollect::errors::{CollectorError, Result};
use areacollect::relations::*;
use areacollect::types::*;

/// Policy that tracks members of the given types in every relation tagged
/// `type=test`, recording what it is handed.
#[derive(Default)]
struct RecordingPolicy {
    member_types: Vec<ItemType>,
    completed: Vec<(ObjectId, Vec<ObjectId>)>,
    unreferenced: Vec<(ItemType, ObjectId)>,
    incomplete: Vec<ObjectId>,
}

impl RecordingPolicy {
    fn tracking(member_types: &[ItemType]) -> Self {
        Self {
            member_types: member_types.to_vec(),
            ..Default::default()
        }
    }
}

impl CollectorPolicy for RecordingPolicy {
    fn keep_relation(&self, relation: &Relation) -> bool {
        relation.tags.get_value_by_key("type") == Some("test")
    }

    fn keep_member(&self, _relation: &Relation, member: &RelationMember) -> bool {
        self.member_types.contains(&member.member_type)
    }

    fn collects(&self, item_type: ItemType) -> bool {
        self.member_types.contains(&item_type)
    }

    fn member_not_in_any_relation(&mut self, item: &Item) -> Result<()> {
        self.unreferenced.push((item.item_type(), item.id()));
        Ok(())
    }

    fn complete_relation(
        &mut self,
        relation: &Relation,
        offsets: &[usize],
        members: &Buffer,
    ) -> Result<()> {
        let mut ids = Vec::new();
        for &offset in offsets {
            assert!(!members.is_deleted(offset)?, "member evicted too early");
            ids.push(members.get(offset)?.id());
        }
        self.completed.push((relation.id, ids));
        Ok(())
    }

    fn incomplete_relations(&mut self, relation_ids: &[ObjectId]) {
        self.incomplete.extend_from_slice(relation_ids);
    }
}

fn relation(id: ObjectId, members: Vec<RelationMember>) -> Relation {
    Relation {
        id,
        tags: TagList::from_pairs([("type", "test")]),
        members,
    }
}

fn way(id: ObjectId) -> Item {
    Item::Way(Way {
        id,
        tags: TagList::new(),
        nodes: vec![
            WayNode::new(id * 10, Location::new(0.0, 0.0)),
            WayNode::new(id * 10 + 1, Location::new(0.0, 1.0)),
        ],
    })
}

fn node(id: ObjectId) -> Item {
    Item::Node(Node {
        id,
        location: Some(Location::new(1.0, 1.0)),
        tags: TagList::new(),
    })
}

fn ways_collector() -> Collector<RecordingPolicy> {
    Collector::new(
        RecordingPolicy::tracking(&[ItemType::Way]),
        &CollectorConfig::default(),
    )
}

#[test]
fn relation_filter_is_applied() {
    let mut collector = ways_collector();
    let ignored = Relation {
        id: 1,
        tags: TagList::from_pairs([("type", "route")]),
        members: vec![RelationMember::way(10, "")],
    };
    let untagged = Relation {
        id: 2,
        tags: TagList::new(),
        members: vec![RelationMember::way(10, "")],
    };

    assert!(!collector.register_relation(&ignored).unwrap());
    assert!(!collector.register_relation(&untagged).unwrap());
    assert_eq!(collector.stats().relations_kept, 0);
    assert_eq!(collector.pending_members(ItemType::Way), 0);
}

#[test]
fn completion_happens_once_with_members_in_order() {
    let mut collector = ways_collector();
    collector
        .register_relation(&relation(
            1,
            vec![
                RelationMember::way(30, "outer"),
                RelationMember::way(10, "outer"),
                RelationMember::way(20, "inner"),
            ],
        ))
        .unwrap();

    // Members arrive in id order, not member order.
    assert!(collector.match_member(&way(10)).unwrap());
    assert!(collector.match_member(&way(20)).unwrap());
    assert!(collector.policy().completed.is_empty());
    assert!(collector.match_member(&way(30)).unwrap());

    assert_eq!(collector.policy().completed, vec![(1, vec![30, 10, 20])]);
    assert_eq!(collector.active_relations(), 0);
    assert!(collector.end_of_input().unwrap().is_empty());
    assert_eq!(collector.policy().completed.len(), 1);
}

#[test]
fn untracked_members_are_not_counted() {
    let mut collector = ways_collector();
    collector
        .register_relation(&relation(
            1,
            vec![
                RelationMember::new(ItemType::Node, 5, "label"),
                RelationMember::way(10, "outer"),
                RelationMember::new(ItemType::Relation, 7, "subarea"),
            ],
        ))
        .unwrap();

    assert_eq!(collector.pending_members(ItemType::Way), 1);
    assert_eq!(collector.pending_members(ItemType::Node), 0);

    // Nodes are not collected by this policy, so they are not even reported.
    assert!(!collector.match_member(&node(5)).unwrap());
    assert!(collector.policy().unreferenced.is_empty());

    collector.match_member(&way(10)).unwrap();
    assert_eq!(collector.policy().completed, vec![(1, vec![10])]);
}

#[test]
fn unreferenced_members_reach_the_hook() {
    let mut collector = ways_collector();
    collector
        .register_relation(&relation(1, vec![RelationMember::way(10, "")]))
        .unwrap();

    assert!(!collector.match_member(&way(99)).unwrap());
    assert_eq!(collector.policy().unreferenced, vec![(ItemType::Way, 99)]);
    assert_eq!(collector.stats().members_stored, 0);
}

#[test]
fn relation_without_tracked_members_completes_at_registration() {
    let mut collector = ways_collector();
    collector
        .register_relation(&relation(
            5,
            vec![RelationMember::way(NO_REF, "outer"), RelationMember::way(NO_REF, "inner")],
        ))
        .unwrap();

    assert_eq!(collector.phase(), Phase::Registering);
    assert_eq!(collector.policy().completed, vec![(5, vec![])]);
    assert_eq!(collector.active_relations(), 0);
}

#[test]
fn missing_members_are_reported_at_end_of_input() {
    let mut collector = ways_collector();
    collector
        .register_relation(&relation(1, vec![RelationMember::way(10, "")]))
        .unwrap();
    collector
        .register_relation(&relation(
            2,
            vec![RelationMember::way(10, ""), RelationMember::way(20, "")],
        ))
        .unwrap();
    collector
        .register_relation(&relation(3, vec![RelationMember::way(30, "")]))
        .unwrap();

    collector.match_member(&way(10)).unwrap();
    let incomplete = collector.end_of_input().unwrap();

    assert_eq!(incomplete, vec![2, 3]);
    assert_eq!(collector.policy().incomplete, vec![2, 3]);
    assert_eq!(collector.policy().completed, vec![(1, vec![10])]);
    assert_eq!(collector.stats().relations_incomplete, 2);
    assert_eq!(collector.phase(), Phase::Finished);
    assert!(collector.members_buffer().is_empty());
}

#[test]
fn shared_member_is_evicted_after_last_relation() {
    let mut collector = ways_collector();
    collector
        .register_relation(&relation(1, vec![RelationMember::way(10, "")]))
        .unwrap();
    collector
        .register_relation(&relation(
            2,
            vec![RelationMember::way(10, ""), RelationMember::way(20, "")],
        ))
        .unwrap();

    collector.match_member(&way(10)).unwrap();
    let stored: Vec<_> = collector.members_buffer().iter().collect();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].deleted(), "way still needed by relation 2");
    assert_eq!(collector.stats().members_evicted, 0);

    collector.match_member(&way(20)).unwrap();
    assert!(collector.members_buffer().iter().all(|v| v.deleted()));
    assert_eq!(collector.stats().members_evicted, 2);
}

#[test]
fn member_listed_twice_in_one_relation() {
    let mut collector = ways_collector();
    collector
        .register_relation(&relation(
            1,
            vec![RelationMember::way(10, "outer"), RelationMember::way(10, "outer")],
        ))
        .unwrap();

    collector.match_member(&way(10)).unwrap();

    assert_eq!(collector.policy().completed, vec![(1, vec![10, 10])]);
    assert_eq!(collector.stats().members_stored, 1);
    assert_eq!(collector.stats().members_evicted, 1);
}

#[test]
fn duplicate_member_in_stream_is_ignored() {
    let mut collector = ways_collector();
    collector
        .register_relation(&relation(
            1,
            vec![RelationMember::way(10, ""), RelationMember::way(20, "")],
        ))
        .unwrap();

    collector.match_member(&way(10)).unwrap();
    collector.match_member(&way(10)).unwrap();
    assert!(collector.policy().completed.is_empty());
    assert_eq!(collector.stats().members_stored, 1);

    collector.match_member(&way(20)).unwrap();
    assert_eq!(collector.policy().completed, vec![(1, vec![10, 20])]);
}

#[test]
fn member_seen_after_completion_is_not_unreferenced() {
    let mut collector = ways_collector();
    collector
        .register_relation(&relation(1, vec![RelationMember::way(10, "")]))
        .unwrap();

    assert!(collector.match_member(&way(10)).unwrap());
    assert_eq!(collector.pending_members(ItemType::Way), 0);
    assert!(collector.match_member(&way(10)).unwrap());
    assert!(!collector.match_member(&way(11)).unwrap());

    assert_eq!(collector.policy().completed, vec![(1, vec![10])]);
    assert_eq!(collector.policy().unreferenced, vec![(ItemType::Way, 11)]);
    assert_eq!(collector.stats().members_stored, 1);
}

#[test]
fn nodes_can_be_collected_too() {
    let mut collector = Collector::new(
        RecordingPolicy::tracking(&[ItemType::Node, ItemType::Way]),
        &CollectorConfig::default(),
    );
    collector
        .register_relation(&relation(
            1,
            vec![
                RelationMember::new(ItemType::Node, 10, "admin_centre"),
                RelationMember::way(10, "outer"),
            ],
        ))
        .unwrap();

    collector.match_member(&node(10)).unwrap();
    collector.match_member(&way(10)).unwrap();

    assert_eq!(collector.policy().completed, vec![(1, vec![10, 10])]);
}

#[test]
fn registering_after_matching_started_is_an_error() {
    let mut collector = ways_collector();
    collector.match_member(&way(1)).unwrap();
    assert_eq!(collector.phase(), Phase::Matching);

    let err = collector
        .register_relation(&relation(1, vec![RelationMember::way(10, "")]))
        .unwrap_err();
    assert!(matches!(err, CollectorError::Phase { .. }));
}

#[test]
fn matching_after_end_of_input_is_an_error() {
    let mut collector = ways_collector();
    collector.end_of_input().unwrap();
    assert!(matches!(
        collector.match_member(&way(1)),
        Err(CollectorError::Phase { .. })
    ));
}

#[test]
fn purge_keeps_pending_offsets_valid() {
    let config = CollectorConfig {
        purge_interval: 1,
        ..CollectorConfig::default()
    };
    let mut collector = Collector::new(RecordingPolicy::tracking(&[ItemType::Way]), &config);
    collector
        .register_relation(&relation(
            1,
            vec![RelationMember::way(1, ""), RelationMember::way(3, "")],
        ))
        .unwrap();
    collector
        .register_relation(&relation(
            2,
            vec![RelationMember::way(2, ""), RelationMember::way(4, "")],
        ))
        .unwrap();

    for id in 1..=4 {
        collector.match_member(&way(id)).unwrap();
    }

    assert!(collector.stats().purges >= 1);
    assert_eq!(
        collector.policy().completed,
        vec![(1, vec![1, 3]), (2, vec![2, 4])]
    );
}

#[test]
fn run_drives_both_passes() {
    let items = vec![
        way(10),
        Item::Relation(relation(1, vec![RelationMember::way(10, "")])),
        way(11),
        Item::Relation(relation(2, vec![RelationMember::way(12, "")])),
    ];

    let mut collector = ways_collector();
    let incomplete = collector
        .run(
            items.clone().into_iter().map(Ok),
            items.into_iter().map(Ok),
        )
        .unwrap();

    assert_eq!(incomplete, vec![2]);
    assert_eq!(collector.policy().completed, vec![(1, vec![10])]);
    assert_eq!(collector.policy().unreferenced, vec![(ItemType::Way, 11)]);
    assert_eq!(collector.stats().relations_kept, 2);
    assert_eq!(collector.stats().relations_completed, 1);
}
