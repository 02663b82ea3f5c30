//! Tests for link collections, ONE slots and cascades
//!
//! These tests verify that:
//! - Links are visible from both sides and removed from both sides
//! - The payload lives on the master side only
//! - Cardinality, required, readonly and unchangeable rules hold
//! - Deleting a target cascades to sources whose required link pointed at it

mod graph_harness;

use graph_harness::*;
use resource_graph::prelude::*;

mod many_tests {
    use super::*;

    #[tokio::test]
    async fn test_link_visible_from_both_sides_then_removed() {
        let (registry, _) = setup(many_to_many());
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        let target = create(&entry, "Target", 1).await;

        let targets = source.links().many("targets").unwrap();
        targets.create(&link_to(1)).await.unwrap();
        let sources = target.links().many("sources").unwrap();
        assert_eq!(targets.count().await.unwrap(), 1);
        assert_eq!(sources.count().await.unwrap(), 1);
        assert_eq!(sources.serialize().await.unwrap(), vec![json!(1)]);

        targets.get(&json!(1)).await.unwrap().delete().await.unwrap();
        assert_eq!(targets.count().await.unwrap(), 0);
        assert_eq!(sources.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_payload_is_stored_at_master() {
        let (registry, storage) = setup(many_to_many());
        let entry = anonymous(&registry);
        create(&entry, "Source", 1).await;
        let target = create(&entry, "Target", 1).await;

        // created from the slave side
        target
            .links()
            .many("sources")
            .unwrap()
            .create(&json!({"@target": 1, "weight": 5}))
            .await
            .unwrap();

        let master = storage
            .get(&Namespace::link(Key::Integer(1), "Source:targets"), &Key::Integer(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(master.get("weight"), Some(&FieldValue::Integer(5)));
        let marker = storage
            .get(&Namespace::link(Key::Integer(1), "Target:sources"), &Key::Integer(1))
            .await
            .unwrap()
            .unwrap();
        assert!(marker.is_empty());

        let from_slave = target.links().many("sources").unwrap().get(&json!(1)).await.unwrap();
        assert_eq!(from_slave.serialize().await.unwrap(), json!({"weight": 5}));
    }

    #[tokio::test]
    async fn test_update_goes_to_master() {
        let (registry, _) = setup(many_to_many());
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        let target = create(&entry, "Target", 1).await;
        source
            .links()
            .many("targets")
            .unwrap()
            .create(&json!({"@target": 1, "weight": 1}))
            .await
            .unwrap();

        let edge = target.links().many("sources").unwrap().get(&json!(1)).await.unwrap();
        edge.update(&json!({"weight": 9})).await.unwrap();

        let from_master = source.links().many("targets").unwrap().get(&json!(1)).await.unwrap();
        assert_eq!(from_master.serialize().await.unwrap(), json!({"weight": 9}));
        assert!(edge.update(&json!({"colour": "red"})).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_link_conflicts() {
        let (registry, _) = setup(many_to_many());
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        create(&entry, "Target", 1).await;

        let targets = source.links().many("targets").unwrap();
        targets.create(&link_to(1)).await.unwrap();
        let err = targets.create(&link_to(1)).await.unwrap_err();
        assert!(matches!(err, GraphError::Conflict(_)));
        assert_eq!(err.to_string(), "Link already exists");
    }

    #[tokio::test]
    async fn test_bad_payloads() {
        let (registry, _) = setup(many_to_many());
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        let targets = source.links().many("targets").unwrap();

        let err = targets.create(&json!([1])).await.unwrap_err();
        assert_eq!(err.to_string(), "Has to be a dict");

        let err = targets.create(&json!({"weight": 1})).await.unwrap_err();
        assert_eq!(err.to_string(), "Target is not defined");

        let err = targets.create(&link_to(99)).await.unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
        assert_eq!(err.to_string(), "Target: Target 99 not found");
    }

    #[tokio::test]
    async fn test_missing_edge_is_not_found() {
        let (registry, _) = setup(many_to_many());
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        create(&entry, "Target", 1).await;

        let err = source
            .links()
            .many("targets")
            .unwrap()
            .get(&json!(1))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Link not found");
    }

    #[tokio::test]
    async fn test_filter_on_payload() {
        let (registry, _) = setup(pair(
            LinkDeclaration::to_many("targets", "Target")
                .related_name("sources")
                .master()
                .schema(schema! { "weight" => Field::integer() })
                .query_schema(schema! { "weight" => Field::integer().optional() }),
            LinkDeclaration::to_many("sources", "Source").related_name("targets"),
        ));
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        let targets = source.links().many("targets").unwrap();
        for (pk, weight) in [(1, 5), (2, 3), (3, 5)] {
            create(&entry, "Target", pk).await;
            targets
                .create(&json!({"@target": pk, "weight": weight}))
                .await
                .unwrap();
        }

        let heavy = targets.filter(&json!({"weight": "5"})).await.unwrap();
        assert_eq!(heavy.count().await.unwrap(), 2);
        assert_eq!(heavy.keys().await.unwrap(), &[Key::Integer(1), Key::Integer(3)]);
    }

    #[tokio::test]
    async fn test_one_to_many_from_many_side_is_forbidden() {
        let (registry, _) = setup(required_one());
        let entry = anonymous(&registry);
        let target = create(&entry, "Target", 1).await;
        create(&entry, "Target", 2).await;
        create_with_links(&entry, "Source", 1, json!({"target": link_to(2)}))
            .await
            .unwrap();

        let err = target
            .links()
            .many("sources")
            .unwrap()
            .create(&link_to(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Forbidden(_)));
        assert_eq!(
            err.to_string(),
            "Creating one to many links from the many side is forbidden, use Source:target"
        );
    }
}

mod one_tests {
    use super::*;

    fn one_to_one() -> Vec<ResourceDeclaration> {
        pair(
            LinkDeclaration::to_one("partner", "Target")
                .related_name("partner")
                .master(),
            LinkDeclaration::to_one("partner", "Source").related_name("partner"),
        )
    }

    #[tokio::test]
    async fn test_set_get_and_clear() {
        let (registry, _) = setup(one_to_one());
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        create(&entry, "Target", 1).await;

        let partner = source.links().one("partner").unwrap();
        assert!(partner.item().await.unwrap().is_none());
        let err = partner.get().await.unwrap_err();
        assert_eq!(err.to_string(), "Link partner is not set");

        partner.set(&link_to(1)).await.unwrap();
        let edge = partner.get().await.unwrap();
        assert_eq!(edge.serialized_target(), json!(1));
        assert_eq!(edge.target().await.unwrap().key(), &Key::Integer(1));

        partner.delete().await.unwrap();
        assert_eq!(partner.current().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_replaces_previous_target() {
        let (registry, _) = setup(one_to_one());
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        let first = create(&entry, "Target", 1).await;
        let second = create(&entry, "Target", 2).await;

        let partner = source.links().one("partner").unwrap();
        partner.set(&link_to(1)).await.unwrap();
        partner.set(&link_to(2)).await.unwrap();
        // setting the same target again is a rewrite, not a conflict
        partner.set(&link_to(2)).await.unwrap();

        assert_eq!(partner.current().await.unwrap(), Some(Key::Integer(2)));
        assert!(first.links().one("partner").unwrap().item().await.unwrap().is_none());
        assert_eq!(
            second.links().one("partner").unwrap().current().await.unwrap(),
            Some(Key::Integer(1))
        );
    }

    #[tokio::test]
    async fn test_target_already_taken() {
        let (registry, _) = setup(one_to_one());
        let entry = anonymous(&registry);
        let first = create(&entry, "Source", 1).await;
        let second = create(&entry, "Source", 2).await;
        create(&entry, "Target", 1).await;

        first.links().one("partner").unwrap().set(&link_to(1)).await.unwrap();
        let err = second
            .links()
            .one("partner")
            .unwrap()
            .set(&link_to(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Conflict(_)));
        assert_eq!(err.to_string(), "Target 1 is already linked through Target:partner");
    }

    #[tokio::test]
    async fn test_corrupted_slot_reports_multiple_found() {
        let (registry, storage) = setup(one_to_one());
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        let namespace = Namespace::link(Key::Integer(1), "Source:partner");
        storage.put(&namespace, &Key::Integer(1), Document::new()).await.unwrap();
        storage.put(&namespace, &Key::Integer(2), Document::new()).await.unwrap();

        let err = source.links().one("partner").unwrap().current().await.unwrap_err();
        assert!(matches!(err, GraphError::MultipleFound(_)));
        assert_eq!(err.to_string(), "2 links found for Source:partner of 1");
    }

    #[tokio::test]
    async fn test_wrong_accessor_kind() {
        let (registry, _) = setup(one_to_one());
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;

        assert!(matches!(source.links().many("partner"), Err(GraphError::NotFound(_))));
        assert!(matches!(source.links().get("nothing"), Err(GraphError::NotFound(_))));
        assert_eq!(source.links().names(), vec!["partner"]);
    }
}

mod required_tests {
    use super::*;

    #[tokio::test]
    async fn test_required_link_must_be_given() {
        let (registry, _) = setup(required_one());
        let entry = anonymous(&registry);
        create(&entry, "Target", 1).await;

        let err = create_with_links(&entry, "Source", 1, Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
        assert_eq!(err.to_string(), "Required links are missing: target");
        assert_eq!(entry.resource("Source").unwrap().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_required_link_can_not_be_removed() {
        let (registry, _) = setup(required_one());
        let entry = anonymous(&registry);
        let target = create(&entry, "Target", 1).await;
        let source = create_with_links(&entry, "Source", 1, json!({"target": link_to(1)}))
            .await
            .unwrap();

        let err = source.links().one("target").unwrap().delete().await.unwrap_err();
        assert!(matches!(err, GraphError::Forbidden(_)));
        assert_eq!(err.to_string(), "It is forbidden to remove required links");

        let edge = target.links().many("sources").unwrap().get(&json!(1)).await.unwrap();
        assert!(matches!(edge.delete().await, Err(GraphError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_required_link_can_be_replaced() {
        let (registry, _) = setup(required_one());
        let entry = anonymous(&registry);
        let first = create(&entry, "Target", 1).await;
        create(&entry, "Target", 2).await;
        let source = create_with_links(&entry, "Source", 1, json!({"target": link_to(1)}))
            .await
            .unwrap();

        source.links().one("target").unwrap().set(&link_to(2)).await.unwrap();
        assert_eq!(first.links().many("sources").unwrap().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deleting_target_cascades() {
        let (registry, storage) = setup(required_one());
        let entry = anonymous(&registry);
        let target = create(&entry, "Target", 1).await;
        let kept = create(&entry, "Target", 2).await;
        for pk in [1, 2] {
            create_with_links(&entry, "Source", pk, json!({"target": link_to(1)}))
                .await
                .unwrap();
        }
        create_with_links(&entry, "Source", 3, json!({"target": link_to(2)}))
            .await
            .unwrap();

        target.delete().await.unwrap();

        let sources = entry.resource("Source").unwrap();
        assert_eq!(sources.keys().await.unwrap(), vec![Key::Integer(3)]);
        assert!(!storage.contains(&Namespace::link(Key::Integer(1), "Source:target"), &Key::Integer(1)));
        assert_eq!(kept.links().many("sources").unwrap().count().await.unwrap(), 1);
    }

    /// City <- Street <- House, with House also pointing at City directly
    fn city_map() -> Vec<ResourceDeclaration> {
        vec![
            keyed("City")
                .link(LinkDeclaration::to_many("streets", "Street").related_name("city").master())
                .link(LinkDeclaration::to_many("houses", "House").related_name("city").master()),
            keyed("Street")
                .link(LinkDeclaration::to_one("city", "City").related_name("streets").required())
                .link(LinkDeclaration::to_many("houses", "House").related_name("street").master()),
            keyed("House")
                .link(LinkDeclaration::to_one("street", "Street").related_name("houses").required())
                .link(LinkDeclaration::to_one("city", "City").related_name("houses").required()),
        ]
    }

    #[tokio::test]
    async fn test_cascade_follows_required_chains() {
        let (registry, _) = setup(city_map());
        let entry = anonymous(&registry);
        let doomed = create(&entry, "City", 1).await;
        let kept = create(&entry, "City", 2).await;
        for (street, city) in [(1, 1), (2, 2)] {
            create_with_links(&entry, "Street", street, json!({"city": link_to(city)}))
                .await
                .unwrap();
        }
        for (house, street, city) in [(1, 1, 1), (2, 2, 1), (3, 2, 2)] {
            create_with_links(
                &entry,
                "House",
                house,
                json!({"street": link_to(street), "city": link_to(city)}),
            )
            .await
            .unwrap();
        }

        doomed.delete().await.unwrap();

        let streets = entry.resource("Street").unwrap();
        let houses = entry.resource("House").unwrap();
        assert_eq!(streets.keys().await.unwrap(), vec![Key::Integer(2)]);
        assert_eq!(houses.keys().await.unwrap(), vec![Key::Integer(3)]);

        let street = streets.get(&json!(2)).await.unwrap();
        assert_eq!(street.links().many("houses").unwrap().serialize().await.unwrap(), vec![json!(3)]);
        assert_eq!(kept.links().many("streets").unwrap().count().await.unwrap(), 1);
        assert_eq!(kept.links().many("houses").unwrap().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleting_source_only_detaches() {
        let (registry, _) = setup(required_one());
        let entry = anonymous(&registry);
        let target = create(&entry, "Target", 1).await;
        let source = create_with_links(&entry, "Source", 1, json!({"target": link_to(1)}))
            .await
            .unwrap();

        source.delete().await.unwrap();
        assert!(target.data().await.is_ok());
        assert_eq!(target.links().many("sources").unwrap().count().await.unwrap(), 0);
    }
}

mod creation_with_links_tests {
    use super::*;

    #[tokio::test]
    async fn test_links_are_attached_on_create() {
        let (registry, _) = setup(many_to_many());
        let entry = anonymous(&registry);
        create(&entry, "Target", 1).await;
        create(&entry, "Target", 2).await;

        let source = create_with_links(
            &entry,
            "Source",
            1,
            json!({"targets": [{"@target": 1, "weight": 3}, link_to(2)]}),
        )
        .await
        .unwrap();

        let targets = source.links().many("targets").unwrap();
        assert_eq!(targets.serialize().await.unwrap(), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_link_errors_are_scoped() {
        let (registry, _) = setup(many_to_many());
        let entry = anonymous(&registry);
        create(&entry, "Target", 1).await;

        let err = create_with_links(&entry, "Source", 1, json!({"targets": link_to(1)}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "@Link targets: Has to be a list");

        let err = create_with_links(&entry, "Source", 1, json!({"targets": [link_to(1), link_to(9)]}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("@Link targets"));
        assert!(err.to_string().contains("@Element 1"));

        let err = create_with_links(&entry, "Source", 1, json!({"targets": [link_to(1), link_to(1)]}))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Conflict(_)));

        let err = create_with_links(&entry, "Source", 1, json!({"owners": []}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "@Link owners: Link is not defined");

        assert_eq!(entry.resource("Source").unwrap().count().await.unwrap(), 0);
    }
}

mod gate_tests {
    use super::*;

    #[tokio::test]
    async fn test_readonly_link_blocks_everything() {
        let (registry, _) = setup(vec![
            keyed("Source").link(LinkDeclaration::to_many("tags", "Target").one_way().readonly()),
            keyed("Target"),
        ]);
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        create(&entry, "Target", 1).await;

        let err = source
            .links()
            .many("tags")
            .unwrap()
            .create(&link_to(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Forbidden(_)));
        assert_eq!(
            err.to_string(),
            "Link Source:tags can not be modified (forward link is readonly)"
        );
    }

    #[tokio::test]
    async fn test_readonly_mirror_blocks_the_other_side() {
        let (registry, _) = setup(pair(
            LinkDeclaration::to_many("targets", "Target")
                .related_name("sources")
                .master(),
            LinkDeclaration::to_many("sources", "Source")
                .related_name("targets")
                .readonly(),
        ));
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        create(&entry, "Target", 1).await;

        let err = source
            .links()
            .many("targets")
            .unwrap()
            .create(&link_to(1))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Link Source:targets can not be modified (backward link is readonly)"
        );
    }

    #[tokio::test]
    async fn test_unchangeable_link_is_created_once() {
        let (registry, _) = setup(vec![
            keyed("Source").link(
                LinkDeclaration::to_many("tags", "Target")
                    .one_way()
                    .unchangeable()
                    .schema(schema! { "note" => Field::string().optional() }),
            ),
            keyed("Target"),
        ]);
        let entry = anonymous(&registry);
        let source = create(&entry, "Source", 1).await;
        create(&entry, "Target", 1).await;

        let tags = source.links().many("tags").unwrap();
        let edge = tags.create(&link_to(1)).await.unwrap();

        let err = edge.update(&json!({"note": "x"})).await.unwrap_err();
        assert!(matches!(err, GraphError::Forbidden(_)));
        let err = edge.delete().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Link Source:tags can not be modified (forward link is unchangeable)"
        );
        assert_eq!(tags.count().await.unwrap(), 1);
    }
}
