// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

#[cfg(test)]
mod session_integration_tests {
    use extfs::memory::MemoryDataSource;
    use extfs::{
        ExternalNode, ExternalProvider, Node, NodeTypeDef, PropertyType, PropertyValue,
        ProviderConfig, Record, Session, TypeRegistry,
    };
    use std::sync::Arc;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn registry() -> TypeRegistry {
        TypeRegistry::with_builtins()
            .node_type(
                NodeTypeDef::new("jnt:doc")
                    .supertype("nt:base")
                    .property("title", PropertyType::String)
                    .property("size", PropertyType::Long)
                    .i18n_property("label", PropertyType::String)
                    .residual_property()
                    .residual_child(&["nt:base"]),
            )
            .build()
            .expect("registry")
    }

    fn source() -> MemoryDataSource {
        MemoryDataSource::new()
            .with_record(Record::new("root", "/", "jnt:doc"))
            .with_record(
                Record::new("d1", "/d1", "jnt:doc")
                    .with_property("title", "Doc")
                    .with_property("size", "12")
                    .with_lazy_property("body")
                    .with_i18n("fr", "label", vec!["Étiquette".to_string()])
                    .with_lazy_i18n("de", "label"),
            )
            .with_record(Record::new("d2", "/d1/d2", "jnt:doc").with_property("title", "Two"))
            .with_record(Record::new("d3", "/d1/d3", "jnt:doc"))
            .with_lazy_value("d1", "body", vec!["lazy body".to_string()])
            .with_lazy_i18n_value("d1", "de", "label", vec!["Etikett".to_string()])
    }

    fn provider(source: Arc<MemoryDataSource>) -> ExternalProvider {
        ExternalProvider::builder(
            ProviderConfig::new("docs", "/mounts/docs"),
            source,
            Arc::new(registry()),
        )
        .build()
        .expect("provider")
    }

    async fn external(session: &Session, p: &str) -> Result<ExternalNode, Box<dyn std::error::Error>> {
        Ok(session.get_node(p).await?.into_external()?)
    }

    async fn identifier_of(session: &Session, p: &str) -> Result<String, Box<dyn std::error::Error>> {
        Ok(external(session, p).await?.identifier().await?)
    }

    fn names(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(|n| n.name().to_string()).collect()
    }

    #[tokio::test]
    async fn test_lazy_value_is_fetched_once() -> TestResult {
        let src = Arc::new(source());
        let session = provider(src.clone()).login();
        let d1 = external(&session, "/d1").await?;

        assert_eq!(src.fetch_count("body").await, 0);
        assert_eq!(d1.get_property("body").await?.get_string()?, "lazy body");
        assert_eq!(d1.get_property("body").await?.get_string()?, "lazy body");
        let listed = d1.get_properties(Some("body")).await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(src.fetch_count("body").await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_lazy_i18n_value_through_translation_child() -> TestResult {
        let src = Arc::new(source());
        let session = provider(src.clone()).login();
        let de = external(&session, "/d1/j:translation_de").await?;

        assert_eq!(de.primary_type(), "jnt:translation");
        assert_eq!(de.get_property("jcr:language").await?.get_string()?, "de");
        assert_eq!(de.get_property("label").await?.get_string()?, "Etikett");
        let _ = de.get_property("label").await?;
        assert_eq!(src.fetch_count("label").await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_writing_the_current_value_is_a_no_op() -> TestResult {
        let src = Arc::new(source().writable(true));
        let session = provider(src.clone()).login();
        let d1 = external(&session, "/d1").await?;

        let _ = d1.set_property("title", Some(PropertyValue::from("Doc"))).await?;
        let _ = d1.set_property("size", Some(PropertyValue::from(12i64))).await?;
        assert!(!session.has_pending_changes().await);

        let _ = d1.set_property("title", Some(PropertyValue::from("Renamed"))).await?;
        session.save().await?;
        let _ = d1.set_property("title", Some(PropertyValue::from("Renamed"))).await?;
        assert!(!session.has_pending_changes().await);
        assert_eq!(src.saved_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_the_buffer() -> TestResult {
        let src = Arc::new(source().writable(true));
        let session = provider(src.clone()).login();
        let d1 = external(&session, "/d1").await?;
        let _ = d1.set_property("title", Some(PropertyValue::from("New"))).await?;
        external(&session, "/d1/d3").await?.remove().await?;

        let before = session.pending_changes().await;
        src.set_fail_saves(true).await;
        assert!(session.save().await.is_err());
        assert_eq!(session.pending_changes().await, before);
        assert!(src.record("/d1/d3").await.is_some());

        src.set_fail_saves(false).await;
        session.save().await?;
        assert!(!session.has_pending_changes().await);
        let stored = src.record("/d1").await.expect("d1 stored");
        assert_eq!(stored.properties()["title"], vec!["New".to_string()]);
        assert!(src.record("/d1/d3").await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_order_before_and_to_end() -> TestResult {
        let src = Arc::new(
            source()
                .writable(true)
                .with_record(Record::new("d4", "/d1/d4", "jnt:doc")),
        );
        let session = provider(src.clone()).login();
        let d1 = external(&session, "/d1").await?;

        d1.order_before("d4", Some("d2")).await?;
        assert_eq!(names(&d1.get_nodes(Some("d*")).await?), ["d4", "d2", "d3"]);

        d1.order_before("d4", None).await?;
        assert_eq!(names(&d1.get_nodes(Some("d*")).await?), ["d2", "d3", "d4"]);

        d1.order_before("d3", Some("d2")).await?;
        assert!(d1.order_before("nope", None).await.unwrap_err().is_not_found());

        session.save().await?;
        assert_eq!(src.children_of("/d1").await, ["d3", "d2", "d4"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_added_children_are_listed_before_save() -> TestResult {
        let src = Arc::new(source().writable(true));
        let session = provider(src.clone()).login();
        let d1 = external(&session, "/d1").await?;

        let _ = d1.add_node("d9", "jnt:doc").await?;
        assert_eq!(names(&d1.get_nodes(Some("d*")).await?), ["d2", "d3", "d9"]);
        assert!(src.record("/d1/d9").await.is_none());

        session.save().await?;
        let stored = src.record("/d1/d9").await.expect("child stored");
        assert_eq!(stored.id(), "d1/d9");
        Ok(())
    }

    #[tokio::test]
    async fn test_translation_round_trip() -> TestResult {
        let src = Arc::new(source().writable(true));
        let p = provider(src.clone());
        let session = p.login();

        let fr = external(&session, "/d1/j:translation_fr").await?;
        assert_eq!(fr.get_property("label").await?.get_string()?, "Étiquette");
        let _ = fr.set_property("label", Some(PropertyValue::from("Libellé"))).await?;
        session.save().await?;

        let stored = src.record("/d1").await.expect("d1 stored");
        assert_eq!(stored.i18n_properties()["fr"]["label"], vec!["Libellé".to_string()]);
        assert!(!stored.properties().contains_key("jcr:language"));
        assert!(src.record("/d1/j:translation_fr").await.is_none());

        let fresh = p.login();
        let fr = external(&fresh, "/d1/j:translation_fr").await?;
        assert_eq!(fr.get_property("label").await?.get_string()?, "Libellé");
        Ok(())
    }

    #[tokio::test]
    async fn test_removed_translation_drops_language() -> TestResult {
        let src = Arc::new(source().writable(true));
        let p = provider(src.clone());
        let session = p.login();

        external(&session, "/d1/j:translation_fr").await?.remove().await?;
        assert!(!session.node_exists("/d1/j:translation_fr").await?);
        session.save().await?;

        let stored = src.record("/d1").await.expect("d1 stored");
        assert!(!stored.languages().contains("fr"));
        assert!(stored.languages().contains("de"));
        assert!(!p.login().node_exists("/d1/j:translation_fr").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_translation_child_gets_no_children_from_writes() -> TestResult {
        let src = Arc::new(source().writable(true));
        let session = provider(src.clone()).login();
        let fr = external(&session, "/d1/j:translation_fr").await?;
        let _ = fr.set_property("label", Some(PropertyValue::from("Libellé"))).await?;

        assert!(fr.get_nodes(None).await?.is_empty());
        assert!(!session.node_exists("/d1/j:translation_fr/j:translation_fr").await?);
        let d1 = external(&session, "/d1").await?;
        assert_eq!(
            names(&d1.get_nodes(Some("j:translation_*")).await?),
            ["j:translation_de", "j:translation_fr"]
        );

        session.save().await?;
        let stored = src.record("/d1").await.expect("d1 stored");
        assert_eq!(stored.i18n_properties()["fr"]["label"], vec!["Libellé".to_string()]);
        assert_eq!(stored.languages().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_handles_on_one_path_share_pending_writes() -> TestResult {
        let src = Arc::new(source().writable(true));
        let session = provider(src.clone()).login();
        let early = external(&session, "/d1").await?;
        let a = external(&session, "/d1").await?;

        let _ = a.set_property("title", Some(PropertyValue::from("T1"))).await?;
        let b = external(&session, "/d1").await?;
        let _ = a.set_property("x", Some(PropertyValue::from("X"))).await?;
        let _ = b.set_property("y", Some(PropertyValue::from("Y"))).await?;

        assert_eq!(b.get_property("x").await?.get_string()?, "X");
        assert_eq!(a.get_property("y").await?.get_string()?, "Y");
        assert_eq!(early.get_property("title").await?.get_string()?, "T1");

        session.save().await?;
        let stored = src.record("/d1").await.expect("d1 stored");
        for (name, value) in [("title", "T1"), ("x", "X"), ("y", "Y")] {
            assert_eq!(stored.properties()[name], vec![value.to_string()], "{name}");
        }
        assert_eq!(stored.properties()["size"], vec!["12".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_identifiers_are_stable_across_sessions() -> TestResult {
        let p = provider(Arc::new(source()));
        let one = p.login();
        let two = p.login();
        let (a, b) = tokio::join!(identifier_of(&one, "/d1"), identifier_of(&two, "/d1"));
        let (a, b) = (a?, b?);
        assert_eq!(a, b);
        assert_ne!(a, "d1");

        let found = p.login().node_by_identifier(&a).await?;
        assert_eq!(found.path(), "/d1");

        let fr = external(&one, "/d1/j:translation_fr").await?;
        let fr_id = fr.identifier().await?;
        assert_ne!(fr_id, a);
        assert_eq!(two.node_by_identifier(&fr_id).await?.path(), "/d1/j:translation_fr");
        Ok(())
    }

    #[tokio::test]
    async fn test_native_identifiers_pass_through() -> TestResult {
        let p = provider(Arc::new(source().supports_uuid(true)));
        let session = p.login();
        let d1 = external(&session, "/d1").await?;
        assert_eq!(d1.identifier().await?, "d1");
        assert_eq!(d1.get_property("jcr:uuid").await?.get_string()?, "d1");
        assert_eq!(session.node_by_identifier("d2").await?.path(), "/d1/d2");

        let fr = external(&session, "/d1/j:translation_fr").await?;
        assert_ne!(fr.identifier().await?, "translation:fr:d1");
        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_items_are_invisible() -> TestResult {
        let src = Arc::new(source().writable(true));
        let p = provider(src.clone());
        let session = p.login();
        let d2 = external(&session, "/d1/d2").await?;
        let id = d2.identifier().await?;

        d2.remove().await?;
        assert!(!session.item_exists("/d1/d2").await?);
        assert!(!session.item_exists("/d1/d2/title").await?);
        assert!(session.node_by_identifier(&id).await.unwrap_err().is_not_found());
        let d1 = external(&session, "/d1").await?;
        assert_eq!(names(&d1.get_nodes(Some("d*")).await?), ["d3"]);

        session.save().await?;
        assert!(src.record("/d1/d2").await.is_none());
        let fresh = p.login();
        assert!(fresh.node_by_identifier(&id).await.unwrap_err().is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn test_re_adding_cancels_deletion() -> TestResult {
        let src = Arc::new(source().writable(true));
        let session = provider(src.clone()).login();
        external(&session, "/d1/d3").await?.remove().await?;

        let d1 = external(&session, "/d1").await?;
        let _ = d1.add_node("d3", "jnt:doc").await?;
        assert!(session.node_exists("/d1/d3").await?);
        session.save().await?;
        assert!(src.record("/d1/d3").await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_item_exists_matches_get_item() -> TestResult {
        let session = provider(Arc::new(source())).login();
        for p in ["/", "/d1", "/d1/title", "/d1/body", "/d1/j:translation_fr"] {
            assert!(session.item_exists(p).await?, "{p} should exist");
            assert!(session.get_item(p).await.is_ok());
        }
        for p in ["/nope", "/d1/nope", "/d1/j:translation_it"] {
            assert!(!session.item_exists(p).await?, "{p} should not exist");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_read_only_provider_rejects_writes() -> TestResult {
        let p = provider(Arc::new(source()));
        assert!(!p.is_writable());
        let session = p.login();
        let d1 = external(&session, "/d1").await?;
        let err = d1
            .set_property("title", Some(PropertyValue::from("x")))
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
        assert!(d1.remove().await.unwrap_err().is_unsupported());
        assert!(!session.has_pending_changes().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_workspace_exposes_move_only() -> TestResult {
        let src = Arc::new(source().writable(true));
        let session = provider(src.clone()).login();
        let workspace = session.workspace();
        assert_eq!(workspace.name(), "default");
        assert!(workspace.copy("/d1", "/d5").await.unwrap_err().is_unsupported());

        workspace.move_item("/d1/d3", "/d3").await?;
        assert!(session.node_exists("/d3").await?);
        assert!(!session.node_exists("/d1/d3").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_config_from_yaml_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("provider.yaml");
        std::fs::write(
            &path,
            "provider_key: docs\nmount_point: /mounts/docs\noverridable_items:\n  jnt:doc: [size]\n",
        )?;
        let config = ProviderConfig::load(&path)?;
        let p = ExternalProvider::builder(config, Arc::new(source()), Arc::new(registry())).build()?;
        assert_eq!(p.config().workspace, "default");
        assert_eq!(p.config().overridable_items["jnt:doc"], vec!["size".to_string()]);
        Ok(())
    }
}
