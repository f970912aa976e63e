/// Scene evaluation tests
/// Visibility, child promotion, parent resolution and orchestration
use crate::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[cfg(test)]
mod scene_tests {
    use super::*;

    fn setup(config: SceneConfig) -> (Scene<MemoryDocument>, Rc<MemoryStore>, System) {
        let store = Rc::new(MemoryStore::new());
        let sys: System = store.clone();
        (Scene::new(MemoryDocument::new(), config), store, sys)
    }

    fn body_ids(scene: &Scene<MemoryDocument>) -> Vec<String> {
        let doc = scene.document();
        doc.child_ids(&doc.body())
    }

    #[test]
    fn test_visibility_transition() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        let entity = store.insert(Entity::new(
            "/only-a",
            Paper::new("div").with_match(Match::parse("/a").unwrap()),
        ));

        assert_eq!(scene.evaluate(&sys, &entity, "/a").unwrap(), Visibility::Visible);
        let node = *scene.node("/only-a").unwrap();
        assert!(scene.document().is_attached(&node));
        assert!(scene.attached_parent("/only-a").is_some());

        assert_eq!(scene.evaluate(&sys, &entity, "/b").unwrap(), Visibility::Hidden);
        assert!(!scene.document().is_attached(&node));
        assert!(scene.attached_parent("/only-a").is_none());

        // Comes back without being recreated
        scene.evaluate(&sys, &entity, "/a").unwrap();
        assert_eq!(*scene.node("/only-a").unwrap(), node);
        assert!(scene.document().is_attached(&node));
    }

    #[test]
    fn test_hidden_first_pass_creates_nothing() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        let entity = store.insert(Entity::new(
            "/docs-only",
            Paper::new("div").with_match(Match::parse("/docs/*").unwrap()),
        ));

        scene.evaluate(&sys, &entity, "/other").unwrap();

        assert!(scene.node("/docs-only").is_none());
        assert_eq!(scene.document().mutations(), 0);
    }

    #[test]
    fn test_child_promotion() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        let entity = store.insert(Entity::new(
            "/list",
            Paper::new("ul")
                .with_child(Paper::new("li").with_content("one"))
                .with_child(Paper::new("li").with_content("two")),
        ));

        scene.evaluate(&sys, &entity, "/").unwrap();

        let entity = entity.borrow();
        let paper = entity.paper.as_ref().unwrap();
        let children: Vec<(Option<String>, Option<String>)> = paper
            .children
            .iter()
            .map(|child| match child {
                Child::Paper(p) => (p.uuid.clone(), p.parent.clone()),
                Child::Entity(_) => panic!("Expected inline child"),
            })
            .collect();
        assert_eq!(
            children,
            vec![
                (Some("/list/1".to_string()), Some("/list".to_string())),
                (Some("/list/2".to_string()), Some("/list".to_string())),
            ]
        );

        let list = *scene.node("/list").unwrap();
        assert_eq!(scene.document().child_ids(&list), vec!["/list/1", "/list/2"]);
    }

    #[test]
    fn test_anonymous_child_uuid_uses_position_among_all_children() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        let entity = store.insert(Entity::new(
            "/nav",
            Paper::new("nav")
                .with_child(Paper::new("a").with_uuid("/nav/home"))
                .with_child(Paper::new("a")),
        ));

        scene.evaluate(&sys, &entity, "/").unwrap();

        let nav = *scene.node("/nav").unwrap();
        assert_eq!(scene.document().child_ids(&nav), vec!["/nav/home", "/nav/2"]);
    }

    #[test]
    fn test_child_entity_is_promoted() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        let footer = Entity::new("/footer", Paper::new("footer")).into_ref();
        let page = store.insert(Entity::new(
            "/page",
            Paper::new("main").with_child_entity(footer.clone()),
        ));

        scene.evaluate(&sys, &page, "/").unwrap();

        assert_eq!(
            footer.borrow().paper.as_ref().unwrap().parent.as_deref(),
            Some("/page")
        );
        let main = *scene.node("/page").unwrap();
        assert_eq!(scene.document().child_ids(&main), vec!["/footer"]);
    }

    #[test]
    fn test_self_referencing_child_entity_is_skipped() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        let entity = store.insert(Entity::new("/loop", Paper::new("div")));
        let child = entity.clone();
        entity
            .borrow_mut()
            .paper
            .as_mut()
            .unwrap()
            .children
            .push(Child::Entity(child));

        assert_eq!(scene.evaluate(&sys, &entity, "/").unwrap(), Visibility::Visible);
        // Break the cycle so the test does not leak
        entity.borrow_mut().paper.as_mut().unwrap().children.clear();
    }

    #[test]
    fn test_invisible_parent_skips_children() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        let entity = store.insert(Entity::new(
            "/panel",
            Paper::new("div")
                .with_match(Match::parse("/panel").unwrap())
                .with_child(Paper::new("p")),
        ));

        scene.evaluate(&sys, &entity, "/elsewhere").unwrap();

        assert!(scene.node("/panel/1").is_none());
        let entity = entity.borrow();
        match &entity.paper.as_ref().unwrap().children[0] {
            Child::Paper(child) => assert!(child.uuid.is_none()),
            Child::Entity(_) => unreachable!(),
        }
    }

    #[test]
    fn test_missing_parent_fails_only_that_subtree() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        store.insert(Entity::new(
            "/orphan",
            Paper::new("div")
                .with_parent("/nowhere")
                .with_child(Paper::new("span")),
        ));
        store.insert(Entity::new("/fine", Paper::new("div")));

        let err = scene
            .evaluate(&sys, &store.get("/orphan").unwrap(), "/")
            .unwrap_err();
        assert!(matches!(err, PaperError::ParentMissing { ref uuid, .. } if uuid == "/orphan"));
        assert!(scene.node("/orphan/1").is_none());

        scene.page_change(&sys, "/").unwrap();
        assert_eq!(body_ids(&scene), vec!["/fine"]);
    }

    #[test]
    fn test_parent_uuid_places_node_under_parent() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        store.insert(Entity::new("/layout", Paper::new("main")));
        store.insert(Entity::new("/widget", Paper::new("aside").with_parent("/layout")));

        scene.page_change(&sys, "/").unwrap();

        let layout = *scene.node("/layout").unwrap();
        assert_eq!(body_ids(&scene), vec!["/layout"]);
        assert_eq!(scene.document().child_ids(&layout), vec!["/widget"]);
    }

    #[test]
    fn test_reparenting_moves_node() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        store.insert(Entity::new("/left", Paper::new("div")));
        store.insert(Entity::new("/right", Paper::new("div")));
        let item = store.insert(Entity::new("/item", Paper::new("p").with_parent("/left")));

        scene.page_change(&sys, "/").unwrap();
        let node = *scene.node("/item").unwrap();

        item.borrow_mut().paper.as_mut().unwrap().parent = Some("/right".into());
        scene.page_change(&sys, "/").unwrap();

        let doc = scene.document();
        let left = *scene.node("/left").unwrap();
        let right = *scene.node("/right").unwrap();
        assert!(doc.children(&left).is_empty());
        assert_eq!(doc.children(&right), vec![node]);
        assert_eq!(scene.attached_parent("/item"), Some(&right));
    }

    #[test]
    fn test_onevent_fires_on_every_visible_pass() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        let shows = Rc::new(Cell::new(0));
        let counter = shows.clone();
        let entity = store.insert(Entity::new(
            "/watched",
            Paper::new("div")
                .with_match(Match::parse("/w").unwrap())
                .on_event(move |event| {
                    assert_eq!(event.event, SceneEventKind::Show);
                    assert_eq!(event.paper.uuid.as_deref(), Some("/watched"));
                    event.system.resolve(Request::Load("/shown/".into()));
                    counter.set(counter.get() + 1);
                }),
        ));

        scene.evaluate(&sys, &entity, "/w").unwrap();
        scene.evaluate(&sys, &entity, "/w").unwrap();
        scene.evaluate(&sys, &entity, "/x").unwrap();

        assert_eq!(shows.get(), 2);
        assert_eq!(store.requests().len(), 2);
    }

    #[test]
    fn test_page_change_renders_path_scene() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        store.insert(Entity::new("/header", Paper::new("header").with_order(-1.0)));
        store.insert(Entity::new(
            "/home",
            Paper::new("div").with_match(Match::parse("/").unwrap()),
        ));
        store.insert(Entity::new(
            "/docs",
            Paper::new("div").with_match(Match::parse("/docs/*").unwrap()),
        ));

        scene.page_change(&sys, "/").unwrap();
        assert_eq!(body_ids(&scene), vec!["/header", "/home"]);

        scene.page_change(&sys, "/docs/intro").unwrap();
        assert_eq!(body_ids(&scene), vec!["/header", "/docs"]);
    }

    #[test]
    fn test_fragment_assembly_matches_direct() {
        let populate = |store: &MemoryStore| {
            store.insert(Entity::new("/c", Paper::new("div").with_order(3.0)));
            store.insert(Entity::new("/a", Paper::new("div").with_order(1.0)));
            store.insert(Entity::new(
                "/b",
                Paper::new("div")
                    .with_order(2.0)
                    .with_child(Paper::new("span")),
            ));
        };

        let (mut direct, direct_store, direct_sys) = setup(SceneConfig::server());
        populate(&direct_store);
        direct.page_change(&direct_sys, "/").unwrap();

        let (mut framed, framed_store, framed_sys) =
            setup(SceneConfig::server().with_assembly(Assembly::Fragment));
        populate(&framed_store);
        framed.page_change(&framed_sys, "/").unwrap();
        framed.page_change(&framed_sys, "/").unwrap();

        assert_eq!(body_ids(&framed), vec!["/a", "/b", "/c"]);
        assert_eq!(framed.document().to_html(), direct.document().to_html());
    }

    #[test]
    fn test_navigate_extracts_path_and_probes() {
        let (mut scene, store, sys) =
            setup(SceneConfig::server().with_anchor("/site"));
        store.insert(Entity::new(
            "/guide",
            Paper::new("div").with_match(Match::parse("/guide/*").unwrap()),
        ));

        scene
            .navigate(&sys, "https://example.com/site/guide/first%20steps")
            .unwrap();

        assert_eq!(scene.current_path(), "/guide/first steps");
        assert_eq!(body_ids(&scene), vec!["/guide"]);
        assert_eq!(
            store.requests(),
            vec![Request::Load("/guide/first steps/".into())]
        );
    }

    #[test]
    fn test_observer_installs_router_once() {
        let store = Rc::new(MemoryStore::new());
        let sys: System = store.clone();
        let router = Rc::new(MemoryRouter::new("http://host/a"));
        let scene = Scene::new(MemoryDocument::new(), SceneConfig::browser());
        let mut observer = PaperObserver::new(scene, Some(router.clone() as Rc<dyn Router>));

        let a = store.insert(Entity::new(
            "/a",
            Paper::new("div").with_match(Match::parse("/a").unwrap()),
        ));
        let b = store.insert(Entity::new(
            "/b",
            Paper::new("div").with_match(Match::parse("/b").unwrap()),
        ));

        observer.resolve(&sys, &Notice::Tick).unwrap();
        assert!(!observer.is_listening());

        observer.resolve(&sys, &Notice::Changed(a.clone())).unwrap();
        assert!(observer.is_listening());
        {
            let scene = observer.shared().scene();
            assert_eq!(scene.current_path(), "/a");
            assert_eq!(body_ids(&scene), vec!["/a"]);
        }

        router.navigate("http://host/b");
        {
            let scene = observer.shared().scene();
            assert_eq!(body_ids(&scene), vec!["/b"]);
        }

        // Once listening, a change only re-evaluates that entity
        b.borrow_mut().paper.as_mut().unwrap().matcher = Some(Match::parse("/*").unwrap());
        a.borrow_mut().paper.as_mut().unwrap().matcher = None;
        observer.resolve(&sys, &Notice::Changed(a.clone())).unwrap();
        let scene = observer.shared().scene();
        assert_eq!(body_ids(&scene), vec!["/b", "/a"]);
    }

    #[test]
    fn test_server_observer_evaluates_directly() {
        let store = Rc::new(MemoryStore::new());
        let sys: System = store.clone();
        let scene = Scene::new(MemoryDocument::new(), SceneConfig::server());
        let mut observer = PaperObserver::new(scene, None);
        let entity = store.insert(Entity::new(
            "/page",
            Paper::new("div").with_match(Match::parse("/page").unwrap()),
        ));

        observer.resolve(&sys, &Notice::Changed(entity.clone())).unwrap();
        assert!(observer.shared().scene().node("/page").is_none());

        assert_eq!(
            observer.evaluate_at(&sys, &entity, "/page").unwrap(),
            Visibility::Visible
        );
        assert!(!observer.is_listening());
        assert_eq!(observer.shared().scene().current_path(), "/page");
    }

    #[test]
    fn test_navigation_during_evaluation_is_queued() {
        let store = Rc::new(MemoryStore::new());
        let sys: System = store.clone();
        let router = Rc::new(MemoryRouter::new("http://host/first"));
        let scene = Scene::new(MemoryDocument::new(), SceneConfig::browser());
        let mut observer = PaperObserver::new(scene, Some(router.clone() as Rc<dyn Router>));

        let visits = Rc::new(RefCell::new(Vec::new()));
        let log = visits.clone();
        let redirect = router.clone();
        let entity = store.insert(Entity::new(
            "/any",
            Paper::new("div").on_event(move |event| {
                let path = event.paper.uuid.clone().unwrap_or_default();
                log.borrow_mut().push(path);
                // Redirect once, from inside the in-flight evaluation
                if redirect.current_url().ends_with("/first") {
                    redirect.navigate("http://host/second");
                }
            }),
        ));

        observer.resolve(&sys, &Notice::Changed(entity)).unwrap();

        assert_eq!(visits.borrow().len(), 2);
        assert_eq!(observer.shared().scene().current_path(), "/second");
    }

    #[test]
    fn test_redirect_during_single_entity_evaluation_runs() {
        let store = Rc::new(MemoryStore::new());
        let sys: System = store.clone();
        let router = Rc::new(MemoryRouter::new("http://host/first"));
        let scene = Scene::new(MemoryDocument::new(), SceneConfig::browser());
        let mut observer = PaperObserver::new(scene, Some(router.clone() as Rc<dyn Router>));

        let frame = store.insert(Entity::new("/frame", Paper::new("main")));
        observer.resolve(&sys, &Notice::Changed(frame)).unwrap();
        assert!(observer.is_listening());

        let redirect = router.clone();
        let entity = store.insert(Entity::new(
            "/gate",
            Paper::new("div").on_event(move |_| {
                if redirect.current_url().ends_with("/first") {
                    redirect.navigate("http://host/second");
                }
            }),
        ));

        // Router already listening, so only this entity is evaluated
        observer.resolve(&sys, &Notice::Changed(entity)).unwrap();

        assert_eq!(router.current_url(), "http://host/second");
        assert_eq!(observer.shared().scene().current_path(), "/second");
    }

    #[test]
    fn test_scene_is_busy_during_evaluation() {
        let store = Rc::new(MemoryStore::new());
        let sys: System = store.clone();
        let observer = PaperObserver::new(
            Scene::new(MemoryDocument::new(), SceneConfig::server()),
            None,
        );
        let shared = observer.shared().clone();
        let busy = Rc::new(Cell::new(None));
        let seen = busy.clone();
        let entity = store.insert(Entity::new(
            "/busy",
            Paper::new("div").on_event(move |_| {
                let read = matches!(shared.try_scene(), Err(PaperError::SceneBusy));
                let write = matches!(shared.try_scene_mut(), Err(PaperError::SceneBusy));
                seen.set(Some(read && write));
            }),
        ));

        observer.evaluate_at(&sys, &entity, "/").unwrap();

        assert_eq!(busy.get(), Some(true));
        assert!(observer.shared().try_scene().is_ok());
        // Break the observer <-> descriptor cycle
        entity.borrow_mut().paper.as_mut().unwrap().onevent = None;
    }

    #[test]
    fn test_self_parenting_fails_only_that_subtree() {
        let (mut scene, store, sys) = setup(SceneConfig::server());
        let looped = store.insert(Entity::new(
            "/x",
            Paper::new("div").with_child(Paper::new("span")),
        ));
        store.insert(Entity::new("/y", Paper::new("div")));
        scene.page_change(&sys, "/").unwrap();
        let x = *scene.node("/x").unwrap();

        looped.borrow_mut().paper.as_mut().unwrap().parent = Some("/x".into());
        let err = scene.evaluate(&sys, &looped, "/").unwrap_err();
        assert!(matches!(err, PaperError::Surface { .. }));

        scene.page_change(&sys, "/").unwrap();

        let doc = scene.document();
        assert_eq!(doc.parent(&x), Some(doc.body()));
        assert_eq!(body_ids(&scene), vec!["/x", "/y"]);
        assert_eq!(doc.child_ids(&x), vec!["/x/1"]);
        assert!(doc.to_html().starts_with("<body><div id=\"/x\">"));
    }
}
