//! Tests for resource collections and instances
//!
//! These tests verify that:
//! - Created instances can be read back and listed
//! - Schema validation rejects bad payloads with field-level errors
//! - Readonly, unchangeable and pk fields are protected on update
//! - Filters use the query schema and ignore unknown parameters

mod graph_harness;

use graph_harness::*;
use resource_graph::prelude::*;

fn people() -> Vec<ResourceDeclaration> {
    vec![
        resource!("Person", {
            "pk" => Field::integer().pk(),
            "name" => Field::string().max_length(16),
            "city" => Field::string().default("Paris"),
            "badge" => Field::string().unchangeable().optional(),
            "score" => Field::integer().readonly(),
        })
        .query_schema(schema! {
            "city" => Field::string().optional(),
        }),
    ]
}

mod crud_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_roundtrip() {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);
        let people = entry.resource("Person").unwrap();

        let created = people
            .create(&json!({"pk": 1, "name": "Ann"}), &Value::Null)
            .await
            .unwrap();
        assert_eq!(created.key(), &Key::Integer(1));
        assert_eq!(created.serialized_key(), json!(1));

        let fetched = people.get(&json!(1)).await.unwrap();
        assert_eq!(
            fetched.serialize().await.unwrap(),
            json!({"pk": 1, "name": "Ann", "city": "Paris"})
        );
    }

    #[tokio::test]
    async fn test_keys_accept_digit_strings() {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);
        create(&entry, "Person", 7).await;

        let fetched = entry.resource("Person").unwrap().get(&json!("7")).await.unwrap();
        assert_eq!(fetched.key(), &Key::Integer(7));
    }

    #[tokio::test]
    async fn test_undecodable_key_is_not_found() {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);

        let err = entry.resource("Person").unwrap().get(&json!("abc")).await.unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
        assert!(err.to_string().starts_with("PK validation failed"));
    }

    #[tokio::test]
    async fn test_duplicate_key_conflicts() {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);
        create(&entry, "Person", 1).await;

        let err = entry
            .resource("Person")
            .unwrap()
            .create(&json!({"pk": 1, "name": "Again"}), &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Conflict(_)));
        assert_eq!(err.to_string(), "Person with key 1 already exists");
    }

    #[tokio::test]
    async fn test_delete_removes_instance() {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);
        let person = create(&entry, "Person", 1).await;
        let people = entry.resource("Person").unwrap();
        assert_eq!(people.count().await.unwrap(), 1);

        person.delete().await.unwrap();
        assert_eq!(people.count().await.unwrap(), 0);
        assert!(matches!(
            people.get(&json!(1)).await,
            Err(GraphError::NotFound(_))
        ));
        assert!(matches!(person.data().await, Err(GraphError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_generated_keys() {
        let (registry, _) = setup(vec![
            resource!("Note", { "text" => Field::string() }).key_policy(GeneratedKeyPolicy),
        ]);
        let entry = anonymous(&registry);
        let notes = entry.resource("Note").unwrap();

        let first = notes.create(&json!({"text": "a"}), &Value::Null).await.unwrap();
        let second = notes.create(&json!({"text": "b"}), &Value::Null).await.unwrap();
        assert_ne!(first.key(), second.key());

        let fetched = notes.get(&first.serialized_key()).await.unwrap();
        assert_eq!(fetched.serialize().await.unwrap(), json!({"text": "a"}));
    }

    #[tokio::test]
    async fn test_omitted_uuid_pk_is_generated_and_stored() {
        let (registry, _) = setup(vec![resource!("Note", {
            "id" => Field::uuid().pk().optional(),
            "text" => Field::string(),
        })]);
        let entry = anonymous(&registry);
        let notes = entry.resource("Note").unwrap();

        let created = notes.create(&json!({"text": "a"}), &Value::Null).await.unwrap();
        assert!(matches!(created.key(), Key::Uuid(_)));

        let fetched = notes.get(&created.serialized_key()).await.unwrap();
        assert_eq!(fetched.key(), created.key());
        assert_eq!(
            fetched.serialize().await.unwrap(),
            json!({"id": created.serialized_key(), "text": "a"})
        );
        assert_eq!(notes.keys().await.unwrap(), vec![created.key().clone()]);
    }

    #[test]
    fn test_optional_non_uuid_pk_is_rejected() {
        use resource_graph::core::error::DeclarationRule;

        let mut registry = Registry::new(InMemoryStorage::new());
        let err = registry
            .register(resource!("Note", {
                "pk" => Field::integer().pk().optional(),
                "text" => Field::string(),
            }))
            .unwrap_err();
        assert_eq!(err.rule(), Some(DeclarationRule::KeyPolicy));
        assert!(err.to_string().contains("uuid"));
    }
}

mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_and_unknown_fields() {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);

        let err = entry
            .resource("Person")
            .unwrap()
            .create(&json!({"pk": 1, "nickname": "x"}), &Value::Null)
            .await
            .unwrap_err();
        let GraphError::Validation(validation) = err else {
            panic!("expected a validation error");
        };
        assert!(validation.field_errors("name").unwrap()[0].mentions("Required field is missing"));
        assert!(validation.mentions("Field 'nickname' is not defined"));
    }

    #[tokio::test]
    async fn test_constraint_violation() {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);

        let err = entry
            .resource("Person")
            .unwrap()
            .create(&json!({"pk": 1, "name": "a name that is far too long"}), &Value::Null)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Length is too big"));
        assert_eq!(entry.resource("Person").unwrap().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_readonly_fields_can_not_be_set() {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);

        let err = entry
            .resource("Person")
            .unwrap()
            .create(&json!({"pk": 1, "name": "Ann", "score": 3}), &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
        assert_eq!(err.to_string(), "Readonly fields can not be set: score");
    }
}

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_partial_update_merges() {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);
        let person = entry
            .resource("Person")
            .unwrap()
            .create(&json!({"pk": 1, "name": "Ann", "city": "Lyon"}), &Value::Null)
            .await
            .unwrap();

        person.update(&json!({"name": "Anna"})).await.unwrap();
        assert_eq!(
            person.serialize().await.unwrap(),
            json!({"pk": 1, "name": "Anna", "city": "Lyon"})
        );
    }

    #[tokio::test]
    async fn test_protected_fields() {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);
        let person = entry
            .resource("Person")
            .unwrap()
            .create(&json!({"pk": 1, "name": "Ann", "badge": "b-1"}), &Value::Null)
            .await
            .unwrap();

        for (payload, field) in [
            (json!({"pk": 2}), "pk"),
            (json!({"badge": "b-2"}), "badge"),
            (json!({"score": 10}), "score"),
        ] {
            let err = person.update(&payload).await.unwrap_err();
            assert_eq!(err.to_string(), format!("Unchangeable fields: {field}"));
        }
        assert_eq!(person.data().await.unwrap()["badge"], FieldValue::from("b-1"));
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_data_untouched() {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);
        let person = create(&entry, "Person", 1).await;

        assert!(person.update(&json!({"name": 42})).await.is_err());
        assert_eq!(
            person.serialize().await.unwrap()["name"],
            json!("Person 1")
        );
    }
}

mod filter_tests {
    use super::*;

    async fn seeded() -> EntryPoint {
        let (registry, _) = setup(people());
        let entry = anonymous(&registry);
        let people = entry.resource("Person").unwrap();
        for (pk, city) in [(1, "Paris"), (2, "Lyon"), (3, "Paris")] {
            people
                .create(&json!({"pk": pk, "name": "x", "city": city}), &Value::Null)
                .await
                .unwrap();
        }
        entry
    }

    #[tokio::test]
    async fn test_filter_by_query_field() {
        let entry = seeded().await;
        let paris = entry
            .resource("Person")
            .unwrap()
            .filter(&json!({"city": "Paris"}))
            .await
            .unwrap();

        assert_eq!(paris.count().await.unwrap(), 2);
        assert_eq!(paris.serialize().await.unwrap(), vec![json!(1), json!(3)]);
    }

    #[tokio::test]
    async fn test_unknown_parameters_are_ignored() {
        let entry = seeded().await;
        let all = entry
            .resource("Person")
            .unwrap()
            .filter(&json!({"name": "x", "colour": "red"}))
            .await
            .unwrap();

        assert!(all.filter_params().is_empty());
        assert_eq!(all.keys().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_keys_are_listed_in_creation_order() {
        let entry = seeded().await;
        let keys = entry.resource("Person").unwrap().keys().await.unwrap();
        assert_eq!(keys, vec![Key::Integer(1), Key::Integer(2), Key::Integer(3)]);
    }
}
