//! Integration tests for lazy access, repetition handling and removal

use octofhir_hl7_structure::{
    CustomStructureFactory, EngineConfig, NodeId, SchemaRegistry, Segment, StructureError,
    StructureErrorKind, StructureNode, StructureTree, StructureTypeBuilder,
};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use serde_json::json;
use std::sync::Arc;

/// `ABC` with A exactly-one, B zero-or-more, C one-or-more
#[fixture]
fn registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    registry.declare_segments(["A", "B", "C"]).unwrap();
    StructureTypeBuilder::message("ABC")
        .required("A")
        .optional_repeating("B")
        .repeating("C")
        .declare(&registry)
        .unwrap();
    Arc::new(registry)
}

#[fixture]
fn tree(registry: Arc<SchemaRegistry>) -> StructureTree {
    StructureTree::with_defaults("ABC", registry).unwrap()
}

#[rstest]
fn test_declared_slot_scenario(mut tree: StructureTree) {
    let a = tree.get("A").unwrap();
    assert_eq!(a.type_name(), "A");
    assert!(a.is_segment());
    assert_eq!(tree.count("A").unwrap(), 1);

    assert_eq!(tree.count("B").unwrap(), 0);

    tree.add("C").unwrap();
    tree.add("C").unwrap();
    assert_eq!(tree.count("C").unwrap(), 2);

    let err = tree.get("D").unwrap_err();
    assert_eq!(err.kind(), StructureErrorKind::UndeclaredSlot);
    assert_eq!(err.to_string(), "'D' is not a declared child of ABC");
}

#[rstest]
fn test_remove_foreign_node_leaves_tree_unchanged(
    mut tree: StructureTree,
    registry: Arc<SchemaRegistry>,
) {
    tree.add("B").unwrap();
    tree.add("B").unwrap();

    // A B segment that belongs to a different tree
    let mut other = StructureTree::with_defaults("ABC", registry).unwrap();
    let foreign = other.add("B").unwrap().id();

    let err = tree.remove("B", foreign).unwrap_err();
    assert_eq!(err.kind(), StructureErrorKind::NotFound);
    assert_eq!(tree.count("B").unwrap(), 2);
    assert_eq!(other.count("B").unwrap(), 1);
}

#[rstest]
#[case("A")]
#[case("B")]
#[case("C")]
fn test_get_is_idempotent(mut tree: StructureTree, #[case] slot: &str) {
    let first = tree.get(slot).unwrap().id();
    let second = tree.get(slot).unwrap().id();
    assert_eq!(first, second);
    assert_eq!(tree.count(slot).unwrap(), 1);
}

#[rstest]
#[case("B", 0)]
#[case("B", 3)]
#[case("C", 1)]
#[case("C", 5)]
fn test_get_at_count_appends_once(
    mut tree: StructureTree,
    #[case] slot: &str,
    #[case] existing: usize,
) {
    for _ in 0..existing {
        tree.add(slot).unwrap();
    }

    let err = tree.get_rep(slot, existing + 1).unwrap_err();
    assert_eq!(err.kind(), StructureErrorKind::IndexOutOfSequence);
    assert_eq!(tree.count(slot).unwrap(), existing);

    tree.get_rep(slot, existing).unwrap();
    assert_eq!(tree.count(slot).unwrap(), existing + 1);

    // The same index now reads the node that was just appended
    tree.get_rep(slot, existing).unwrap();
    assert_eq!(tree.count(slot).unwrap(), existing + 1);
}

#[rstest]
fn test_non_repeating_add_twice(mut tree: StructureTree) {
    tree.add("A").unwrap();
    let err = tree.add("A").unwrap_err();
    assert_eq!(err.kind(), StructureErrorKind::CardinalityViolation);
    assert_eq!(tree.count("A").unwrap(), 1);

    let err = tree.get_rep("A", 1).unwrap_err();
    assert_eq!(err.kind(), StructureErrorKind::CardinalityViolation);
    assert_eq!(tree.count("A").unwrap(), 1);
}

#[rstest]
#[case(0)]
#[case(2)]
#[case(4)]
fn test_remove_at_compacts(mut tree: StructureTree, #[case] removed: usize) {
    let ids: Vec<NodeId> = (0..5).map(|_| tree.add("C").unwrap().id()).collect();

    let taken = tree.remove_at("C", removed).unwrap();
    assert_eq!(taken.id(), ids[removed]);
    assert_eq!(tree.count("C").unwrap(), 4);

    for j in 0..4 {
        let expected = if j >= removed { ids[j + 1] } else { ids[j] };
        assert_eq!(tree.get_rep("C", j).unwrap().id(), expected);
    }
}

#[rstest]
fn test_remove_by_identity_then_reindex(mut tree: StructureTree) {
    let ids: Vec<NodeId> = (0..3).map(|_| tree.add("B").unwrap().id()).collect();

    let removed = tree.remove("B", ids[1]).unwrap();
    assert_eq!(removed.id(), ids[1]);

    let remaining: Vec<NodeId> = tree.iter("B").unwrap().map(StructureNode::id).collect();
    assert_eq!(remaining, vec![ids[0], ids[2]]);

    // Removing the same node again finds nothing
    let err = tree.remove("B", ids[1]).unwrap_err();
    assert_eq!(err.kind(), StructureErrorKind::NotFound);
}

#[rstest]
fn test_remove_at_out_of_range(mut tree: StructureTree) {
    tree.add("B").unwrap();
    let err = tree.remove_at("B", 1).unwrap_err();
    assert_eq!(err.kind(), StructureErrorKind::IndexOutOfSequence);
    assert_eq!(tree.count("B").unwrap(), 1);
}

#[rstest]
fn test_iter_does_not_create(tree: StructureTree) {
    assert_eq!(tree.iter("C").unwrap().count(), 0);
    assert_eq!(tree.peek("A").unwrap().map(StructureNode::id), None);
    assert_eq!(tree.count("C").unwrap(), 0);
}

#[rstest]
fn test_payloads_survive_sibling_changes(mut tree: StructureTree) {
    for note in ["first", "second", "third"] {
        tree.add("B")
            .unwrap()
            .as_segment_mut()
            .unwrap()
            .set_payload(note);
    }
    tree.remove_at("B", 0).unwrap();

    let payloads: Vec<_> = tree
        .iter("B")
        .unwrap()
        .filter_map(StructureNode::as_segment)
        .map(|segment| segment.payload().clone())
        .collect();
    assert_eq!(payloads, vec![json!("second"), json!("third")]);
}

#[rstest]
fn test_max_repetitions_applies_to_every_repeating_slot(registry: Arc<SchemaRegistry>) {
    let factory = Arc::new(CustomStructureFactory::over_registry(registry));
    let mut tree = StructureTree::new("ABC", factory, EngineConfig::new(Some(2), false)).unwrap();

    tree.add("B").unwrap();
    tree.add("B").unwrap();
    let err = tree.get_rep("B", 2).unwrap_err();
    assert_eq!(err.kind(), StructureErrorKind::CardinalityViolation);
    assert_eq!(tree.count("B").unwrap(), 2);

    tree.add("C").unwrap();
    tree.add("C").unwrap();
    assert!(tree.add("C").is_err());
}

#[rstest]
fn test_failed_construction_leaves_no_node(registry: Arc<SchemaRegistry>) {
    let factory = CustomStructureFactory::over_registry(registry)
        .with_constructor("C", |_context| Err(StructureError::unknown_type("C")));
    let mut tree = StructureTree::new("ABC", Arc::new(factory), EngineConfig::default()).unwrap();

    let err = tree.add("C").unwrap_err();
    assert_eq!(err.kind(), StructureErrorKind::UnknownType);
    assert_eq!(tree.count("C").unwrap(), 0);

    let err = tree.get("C").unwrap_err();
    assert_eq!(err.kind(), StructureErrorKind::UnknownType);
    assert_eq!(tree.count("C").unwrap(), 0);
}

#[rstest]
fn test_custom_constructor_prefills_segment(registry: Arc<SchemaRegistry>) {
    let lookup = registry.clone();
    let factory =
        CustomStructureFactory::over_registry(registry).with_constructor("A", move |_context| {
            let mut segment = Segment::new(lookup.lookup("A")?)?;
            segment.set_payload(json!({"1": "prefilled"}));
            Ok(StructureNode::Segment(segment))
        });
    let mut tree = StructureTree::new("ABC", Arc::new(factory), EngineConfig::default()).unwrap();

    let a = tree.get("A").unwrap().as_segment().unwrap();
    assert_eq!(a.payload(), &json!({"1": "prefilled"}));
    assert!(!tree.is_empty());
}

#[rstest]
fn test_unknown_message_type(registry: Arc<SchemaRegistry>) {
    let err = StructureTree::with_defaults("ZZZ", registry).unwrap_err();
    assert_eq!(err.kind(), StructureErrorKind::UnknownType);
}
