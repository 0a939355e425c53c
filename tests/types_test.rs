use areacollect::errors::CollectorError;
use areacollect::types::*;

#[test]
fn item_type_as_str_roundtrip() {
    let types = vec![
        ItemType::Node,
        ItemType::Way,
        ItemType::Relation,
        ItemType::Area,
    ];

    for item_type in types {
        let s = item_type.as_str();
        let parsed = ItemType::from_str(s)
            .unwrap_or_else(|| panic!("failed to parse ItemType from '{}'", s));
        assert_eq!(item_type, parsed, "roundtrip failed for ItemType::{}", s);
        assert_eq!(ItemType::from_char(item_type.as_char()), Some(item_type));
    }
}

#[test]
fn item_type_from_str_unknown_returns_none() {
    assert!(ItemType::from_str("changeset").is_none());
    assert!(ItemType::from_str("").is_none());
    assert!(ItemType::from_char('x').is_none());
}

#[test]
fn tag_lookup_returns_first_value() {
    let tags = TagList::from_pairs([("type", "multipolygon"), ("name", "Lake"), ("type", "x")]);
    assert_eq!(tags.get_value_by_key("type"), Some("multipolygon"));
    assert_eq!(tags.get_value_by_key("missing"), None);
    assert!(tags.has_key("name"));
    assert_eq!(tags.without_key("type").len(), 1);
}

#[test]
fn way_closedness() {
    let a = Location::new(13.4, 52.5);
    let b = Location::new(13.5, 52.5);
    let closed = Way {
        id: 1,
        tags: TagList::new(),
        nodes: vec![WayNode::new(1, a), WayNode::new(2, b), WayNode::new(1, a)],
    };
    assert!(closed.is_closed());
    assert!(closed.ends_have_same_location());

    let open = Way {
        id: 2,
        tags: TagList::new(),
        nodes: vec![WayNode::new(1, a), WayNode::new(2, b)],
    };
    assert!(!open.is_closed());
    assert!(!open.ends_have_same_location());

    let empty = Way {
        id: 3,
        tags: TagList::new(),
        nodes: Vec::new(),
    };
    assert!(!empty.ends_have_same_location());
}

#[test]
fn ends_without_locations_do_not_match() {
    let way = Way {
        id: 1,
        tags: TagList::new(),
        nodes: vec![
            WayNode {
                node_ref: 1,
                location: None,
            },
            WayNode {
                node_ref: 1,
                location: None,
            },
        ],
    };
    assert!(way.is_closed());
    assert!(!way.ends_have_same_location());
}

#[test]
fn location_fixed_point() {
    let loc = Location::new(-122.4194155, 37.7749295);
    assert_eq!(loc.x, -1_224_194_155);
    assert!((loc.lat() - 37.7749295).abs() < 1e-7);
    assert!(loc.valid());
    assert!(!Location::new(0.0, 95.0).valid());
}

#[test]
fn area_ids_encode_origin() {
    let from_way = Area::id_from_way(17).unwrap();
    let from_relation = Area::id_from_relation(17).unwrap();
    assert_eq!(from_way, 34);
    assert_eq!(from_relation, 35);
    assert_eq!(Area::id_from_relation(-4).unwrap(), -9);

    let area = Area {
        id: from_relation,
        tags: TagList::new(),
        outer_rings: Vec::new(),
        inner_rings: Vec::new(),
    };
    assert!(!area.from_way());
    assert_eq!(area.orig_id(), 17);
}

#[test]
fn area_ids_out_of_range_are_errors() {
    let too_large = (1 << 62) + 1;
    assert!(matches!(
        Area::id_from_way(too_large),
        Err(CollectorError::Assembler { object_id, .. }) if object_id == too_large
    ));
    assert!(Area::id_from_relation(-too_large).is_err());
    assert!(Area::id_from_relation(1 << 62).is_err());
    assert_eq!(Area::id_from_relation(ObjectId::MAX / 2).unwrap(), ObjectId::MAX);
    assert_eq!(Area::id_from_way(ObjectId::MAX / 2).unwrap(), ObjectId::MAX - 1);
}

#[test]
fn item_json_is_tagged_by_type() {
    let json = r#"{"type":"relation","id":5,"tags":[{"key":"type","value":"boundary"}],"members":[{"type":"way","ref":7,"role":"outer"}]}"#;
    let item: Item = serde_json::from_str(json).unwrap();

    assert_eq!(item.item_type(), ItemType::Relation);
    assert_eq!(item.id(), 5);
    assert_eq!(item.tags().get_value_by_key("type"), Some("boundary"));
    match item {
        Item::Relation(relation) => {
            assert_eq!(relation.members, vec![RelationMember::way(7, "outer")]);
        }
        other => panic!("expected a relation, got {:?}", other),
    }
}
