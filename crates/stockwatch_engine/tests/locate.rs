use pretty_assertions::assert_eq;
use scraper::Html;
use stockwatch_engine::{locate, ElementPath, LocateError};

fn path(entries: &[&str]) -> ElementPath {
    let entries: Vec<String> = entries.iter().map(|s| s.to_string()).collect();
    ElementPath::parse(&entries).expect("valid path")
}

fn found_texts(html: &str, entries: &[&str], text: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    locate(&document, &path(entries), text)
        .iter()
        .map(|element| element.html())
        .collect()
}

#[test]
fn finds_marker_inside_nested_path() {
    let html = "<html><body><div><button>Add to Cart</button></div></body></html>";
    assert_eq!(
        found_texts(html, &["div", "button"], "Add to Cart"),
        vec!["<button>Add to Cart</button>"]
    );
}

#[test]
fn missing_marker_yields_empty_result() {
    let html = "<div><button>Sold out</button></div>";
    assert!(found_texts(html, &["div", "button"], "Add to Cart").is_empty());
}

#[test]
fn text_must_match_exactly() {
    let html = "<div><button> Add to Cart </button><button>Add to Cart now</button></div>";
    assert!(found_texts(html, &["div", "button"], "Add to Cart").is_empty());
}

#[test]
fn marker_outside_parent_path_is_ignored() {
    let html = "<section><button>Add to Cart</button></section><div><span>x</span></div>";
    assert!(found_texts(html, &["div", "button"], "Add to Cart").is_empty());
}

#[test]
fn missing_intermediate_level_short_circuits() {
    let html = "<div><button>Add to Cart</button></div>";
    assert!(found_texts(html, &["form", "div", "button"], "Add to Cart").is_empty());
}

#[test]
fn single_entry_path_searches_whole_document() {
    let html = "<main><p><button>Add to Cart</button></p></main><button>Add to Cart</button>";
    assert_eq!(found_texts(html, &["button"], "Add to Cart").len(), 2);
}

#[test]
fn nested_candidates_report_shared_descendants_per_candidate() {
    // Both divs are candidates and both contain the button.
    let html = "<div id='outer'><div id='inner'><button>Add to Cart</button></div></div>";
    assert_eq!(found_texts(html, &["div", "button"], "Add to Cart").len(), 2);
}

#[test]
fn text_spanning_child_elements_is_concatenated() {
    let html = "<div><button><span>Add to</span> Cart</button></div>";
    assert_eq!(found_texts(html, &["div", "button"], "Add to Cart").len(), 1);
}

#[test]
fn selectors_may_use_css_syntax() {
    let html = r#"<div class="buy"><button>Add to Cart</button></div><div class="ad"><button>Add to Cart</button></div>"#;
    assert_eq!(found_texts(html, &["div.buy", "button"], "Add to Cart").len(), 1);
}

#[test]
fn results_follow_document_order() {
    let html = r#"<ul><li><a id="first">Buy</a></li><li><a id="skip">Skip</a></li><li><a id="last">Buy</a></li></ul>"#;
    let document = Html::parse_document(html);
    let ids: Vec<_> = locate(&document, &path(&["ul", "a"]), "Buy")
        .iter()
        .filter_map(|element| element.value().attr("id"))
        .collect();
    assert_eq!(ids, vec!["first", "last"]);
}

#[test]
fn malformed_markup_is_tolerated() {
    let html = "<div><button>Add to Cart</div><p><span>unclosed";
    assert_eq!(found_texts(html, &["div", "button"], "Add to Cart").len(), 1);
}

#[test]
fn empty_and_invalid_paths_are_rejected() {
    assert_eq!(ElementPath::parse(&[]).unwrap_err(), LocateError::EmptyPath);
    let err = ElementPath::parse(&["div".to_string(), "[[".to_string()]).unwrap_err();
    assert!(matches!(err, LocateError::InvalidSelector { index: 1, .. }));
}
