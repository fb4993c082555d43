use http::Method;
use std::sync::Arc;
use waypoint_core::{GraphDocument, LinkResolver, RequestContext};

fn fixture() -> GraphDocument {
    GraphDocument::load(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/twins.toml")).unwrap()
}

#[test]
fn test_twins_notes_resolve_two_links() {
    let doc = fixture();
    let graph = Arc::new(doc.build_graph().unwrap());
    let notes = graph.state("Tst_Twins-notes").unwrap();

    let ctx = RequestContext::new(doc.engine.base_uri.clone(), Method::GET, "/notes");
    let links: Vec<_> = LinkResolver::new(graph.clone())
        .resolve(&notes, None, &ctx)
        .into_iter()
        .filter(|link| !link.is_self())
        .collect();

    assert_eq!(links.len(), 2);
    let first = links[0].transition.as_ref().unwrap();
    let second = links[1].transition.as_ref().unwrap();
    assert_eq!(first.target.to_string(), ".Tst_Twins-Page1");
    assert_eq!(second.target.to_string(), ".Tst_Twins-Page2");
    assert_eq!(first.source.to_string(), "Note.notes");
    assert_eq!(second.source.to_string(), "Note.notes");
    assert_eq!(links[0].name, "Note.notes>.Tst_Twins-Page1");
    assert_eq!(links[1].href, "http://localhost:8080/twins/page2");
}

#[test]
fn test_unknown_state_is_not_found() {
    let graph = fixture().build_graph().unwrap();
    assert!(graph.state("Tst_Invalid-notes").is_none());
    assert!(graph.state("Tst_Invalid-notes").is_none());
}

#[test]
fn test_pages_accept_only_get() {
    let graph = fixture().build_graph().unwrap();
    let page = graph.resolve(&Method::GET, "/twins/page1").unwrap().unwrap();
    assert_eq!(page.name, "Tst_Twins-Page1");

    let err = graph.resolve(&Method::PUT, "/twins/page1").unwrap_err();
    assert_eq!(err.allow_header().as_deref(), Some("GET, HEAD, OPTIONS"));
}
