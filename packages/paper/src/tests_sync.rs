/// Node synchronization tests
/// Identity preservation, churn avoidance and attribute application
use crate::*;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[cfg(test)]
mod sync_tests {
    use super::*;

    fn setup() -> (Scene<MemoryDocument>, Rc<MemoryStore>, System) {
        let store = Rc::new(MemoryStore::new());
        let sys: System = store.clone();
        let scene = Scene::new(MemoryDocument::new(), SceneConfig::server());
        (scene, store, sys)
    }

    fn node_of(scene: &Scene<MemoryDocument>, uuid: &str) -> NodeId {
        *scene.node(uuid).expect("node should be materialized")
    }

    #[test]
    fn test_second_pass_is_churn_free() {
        let (mut scene, store, sys) = setup();
        let entity = store.insert(Entity::new(
            "/card",
            Paper::new("section")
                .with_content("Hello")
                .with_classes("card wide")
                .with_css(Css::Text("color: red".into()))
                .with_prop("title", "greeting"),
        ));

        scene.evaluate(&sys, &entity, "/").unwrap();
        let node = node_of(&scene, "/card");
        let mutations = scene.document().mutations();

        scene.evaluate(&sys, &entity, "/").unwrap();

        assert_eq!(scene.document().mutations(), mutations);
        assert_eq!(node_of(&scene, "/card"), node);
        assert_eq!(scene.document().class_name(&node), "card wide");
        assert_eq!(scene.document().inner_html(&node), "Hello");
    }

    #[test]
    fn test_kind_change_recreates_node() {
        let (mut scene, store, sys) = setup();
        let entity = store.insert(Entity::new("/box", Paper::new("div").with_content("x")));

        scene.evaluate(&sys, &entity, "/").unwrap();
        let old = node_of(&scene, "/box");

        entity.borrow_mut().paper.as_mut().unwrap().kind = Some("article".into());
        scene.evaluate(&sys, &entity, "/").unwrap();
        let new = node_of(&scene, "/box");

        let doc = scene.document();
        assert_ne!(old, new);
        assert_eq!(doc.node_name(&new), "article");
        assert_eq!(doc.id(&new).as_deref(), Some("/box"));
        assert!(!doc.is_attached(&old));
        assert!(doc.is_attached(&new));
        assert_eq!(doc.children(&doc.body()), vec![new]);
        assert_eq!(doc.get_element_by_id("/box"), Some(new));
    }

    #[test]
    fn test_content_changes_are_ignored_without_identity_change() {
        let (mut scene, store, sys) = setup();
        let entity = store.insert(Entity::new("/t", Paper::new("p").with_content("first")));

        scene.evaluate(&sys, &entity, "/").unwrap();
        entity.borrow_mut().paper.as_mut().unwrap().content = Some("second".into());
        scene.evaluate(&sys, &entity, "/").unwrap();

        let node = node_of(&scene, "/t");
        assert_eq!(scene.document().inner_html(&node), "first");
    }

    #[test]
    fn test_disabled_updates_without_resync() {
        let (mut scene, store, sys) = setup();
        let mut paper = Paper::new("button").with_content("Go");
        paper.disabled = Some(false);
        let entity = store.insert(Entity::new("/go", paper));

        scene.evaluate(&sys, &entity, "/").unwrap();
        let node = node_of(&scene, "/go");
        assert_eq!(scene.document().property(&node, "disabled"), Some(Value::Bool(false)));

        entity.borrow_mut().paper.as_mut().unwrap().disabled = Some(true);
        scene.evaluate(&sys, &entity, "/").unwrap();

        assert_eq!(node_of(&scene, "/go"), node);
        assert_eq!(scene.document().property(&node, "disabled"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_link_forces_anchor() {
        let (mut scene, store, sys) = setup();
        let entity = store.insert(Entity::new("/nav", Paper::default().with_link("/docs")));

        scene.evaluate(&sys, &entity, "/").unwrap();

        let node = node_of(&scene, "/nav");
        let doc = scene.document();
        assert_eq!(doc.node_name(&node), "a");
        assert_eq!(doc.property(&node, "href"), Some(Value::String("/docs".into())));
        assert_eq!(doc.inner_html(&node), "/docs");
    }

    #[test]
    fn test_unset_kind_defaults_to_container() {
        let (mut scene, store, sys) = setup();
        let entity = store.insert(Entity::new("/plain", Paper::default()));

        scene.evaluate(&sys, &entity, "/").unwrap();

        let node = node_of(&scene, "/plain");
        assert_eq!(scene.document().node_name(&node), "div");
    }

    #[test]
    fn test_markdown_content() {
        let (mut scene, store, sys) = setup();
        let entity = store.insert(Entity::new(
            "/doc",
            Paper::new("article").with_markdown("  # Title\n\nBody  "),
        ));

        scene.evaluate(&sys, &entity, "/").unwrap();

        let node = node_of(&scene, "/doc");
        assert_eq!(
            scene.document().inner_html(&node),
            "<h1>Title</h1>\n<p>Body</p>\n"
        );
    }

    #[test]
    fn test_css_properties_apply_individually() {
        let (mut scene, store, sys) = setup();
        let css = Css::Properties(
            [("color", "red"), ("margin", "0 auto")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        let entity = store.insert(Entity::new("/styled", Paper::new("div").with_css(css)));

        scene.evaluate(&sys, &entity, "/").unwrap();

        let node = node_of(&scene, "/styled");
        assert_eq!(scene.document().style(&node, "color"), Some("red"));
        assert_eq!(scene.document().style(&node, "margin"), Some("0 auto"));
    }

    #[test]
    fn test_scavenged_node_is_resynced_with_class_diff() {
        let (mut scene, store, sys) = setup();
        let body = scene.document().body();
        let existing = {
            let doc = scene.document_mut();
            let node = doc.create_element("div").unwrap();
            doc.set_id(&node, "/ssr").unwrap();
            doc.add_class(&node, "stale").unwrap();
            doc.add_class(&node, "keep").unwrap();
            doc.append_child(&body, &node).unwrap();
            node
        };
        let entity = store.insert(Entity::new(
            "/ssr",
            Paper::new("div").with_classes("keep fresh").with_content("hydrated"),
        ));

        scene.evaluate(&sys, &entity, "/").unwrap();

        let doc = scene.document();
        assert_eq!(node_of(&scene, "/ssr"), existing);
        assert_eq!(doc.class_name(&existing), "keep fresh");
        assert_eq!(doc.inner_html(&existing), "hydrated");
        assert_eq!(doc.children(&body), vec![existing]);
    }

    #[test]
    fn test_callbacks_receive_descriptor_and_system() {
        let (mut scene, store, sys) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let entity = store.insert(Entity::new(
            "/input",
            Paper::new("input")
                .on_change(move |event, paper, system| {
                    system.resolve(Request::Load("/typed/".into()));
                    log.borrow_mut().push((
                        event.value.clone(),
                        paper.uuid.clone(),
                    ));
                })
                .on_return(|_, _, system| system.resolve(Request::Load("/submitted/".into()))),
        ));
        {
            let mut entity = entity.borrow_mut();
            entity.paper.as_mut().unwrap().placeholder = Some("Search".into());
        }

        scene.evaluate(&sys, &entity, "/").unwrap();
        let node = node_of(&scene, "/input");
        let doc = scene.document();

        assert!(doc.dispatch(&node, HandlerKind::Change, &DomEvent::new("change").with_value("abc")));
        assert!(doc.dispatch(&node, HandlerKind::Return, &DomEvent::new("keydown").with_key("Enter")));
        assert!(!doc.dispatch(&node, HandlerKind::Click, &DomEvent::new("click")));

        assert_eq!(
            *seen.borrow(),
            vec![(Some("abc".to_string()), Some("/input".to_string()))]
        );
        assert_eq!(
            store.requests(),
            vec![
                Request::Load("/typed/".into()),
                Request::Load("/submitted/".into())
            ]
        );
        assert_eq!(
            doc.property(&node, "placeholder"),
            Some(Value::String("Search".into()))
        );
    }

    #[test]
    fn test_effect_hook_runs_before_content() {
        let store = Rc::new(MemoryStore::new());
        let sys: System = store.clone();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut scene = Scene::new(MemoryDocument::new(), SceneConfig::server()).with_effect(
            move |paper: &mut Paper| {
                counter.set(counter.get() + 1);
                paper.content = Some("<svg></svg>".into());
            },
        );
        let mut paper = Paper::new("div");
        paper.logo = Some(Value::Bool(true));
        let entity = store.insert(Entity::new("/logo", paper));
        let plain = store.insert(Entity::new("/plain", Paper::new("div")));

        scene.evaluate(&sys, &entity, "/").unwrap();
        scene.evaluate(&sys, &entity, "/").unwrap();
        scene.evaluate(&sys, &plain, "/").unwrap();

        assert_eq!(calls.get(), 1);
        let node = node_of(&scene, "/logo");
        assert_eq!(scene.document().inner_html(&node), "<svg></svg>");
    }
}
