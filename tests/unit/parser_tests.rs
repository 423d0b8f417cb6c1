//! Tree parser and query engine, exercised on whole pages

use html_audit::parser::{self, Element};
use html_audit::query::{self, find_all, find_first};

const PAGE: &str = r##"<!DOCTYPE html>
<html lang="it">
<head>
<!-- <meta name="author" content="Commented Out"> -->
<meta name="author" content="Mario Rossi">
<title>Blog</title>
</head>
<body>
<div id="main" class="container">
    <h1 id="top">Posts</h1>
    <ul class="posts">
        <li><a href="first.html">First</a></li>
        <li><a href='second.html#intro'>Second</a></li>
        <li><a href="#top">Back</a></li>
    </ul>
    <div class="container"><p>Nested <b>bold</b></p></div>
</div>
<section id="footer"><div class="container"><address>Mario Rossi</address></div></section>
</body>
</html>
"##;

fn html_root(forest: &[Element]) -> &Element {
    find_first(forest, "html", &[])
}

#[test]
fn test_page_structure() {
    let forest = parser::parse(PAGE);
    let html = html_root(&forest);

    assert_eq!(html.attr("lang"), Some("it"));
    let tags: Vec<&str> = html.children.iter().map(|c| c.tag.as_str()).collect();
    assert_eq!(tags, vec!["head", "body"]);
}

#[test]
fn test_comments_do_not_reach_the_tree() {
    let forest = parser::parse(PAGE);

    let authors = find_all(&forest, "meta", &[("name", "author")]);
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].attr("content"), Some("Mario Rossi"));
}

#[test]
fn test_every_element_reparses_to_itself() {
    let forest = parser::parse(PAGE);

    for element in query::walk(&forest) {
        if element.content.is_empty() {
            continue;
        }
        let reparsed = parser::parse(&element.raw_text);
        assert_eq!(reparsed.len(), 1, "reparsing {}", element.tag);
        assert_eq!(&reparsed[0], element);
    }
}

#[test]
fn test_find_all_is_a_preorder_subsequence() {
    let forest = parser::parse(PAGE);
    let preorder: Vec<&Element> = query::walk(&forest).collect();

    let containers = find_all(&forest, "", &[("class", "container")]);
    assert_eq!(containers.len(), 3);

    let mut cursor = 0;
    for found in &containers {
        let offset = preorder[cursor..]
            .iter()
            .position(|e| std::ptr::eq(*e, *found))
            .expect("result missing from the pre-order walk");
        cursor += offset + 1;
    }

    // the outer container comes before the containers it holds
    assert_eq!(containers[0].attr("id"), Some("main"));
}

#[test]
fn test_attribute_presence_and_quote_styles() {
    let forest = parser::parse(PAGE);

    let links = find_all(&forest, "a", &[("href", "")]);
    let targets: Vec<&str> = links.iter().filter_map(|a| a.attr("href")).collect();
    assert_eq!(targets, vec!["first.html", "second.html#intro", "#top"]);
}

#[test]
fn test_find_first_without_match_is_empty() {
    let forest = parser::parse(PAGE);

    let missing = find_first(&forest, "table", &[]);
    assert!(missing.is_empty());
    assert_eq!(missing.tag, "");
    assert!(missing.children.is_empty());

    let nested = find_first(&missing.children, "tr", &[]);
    assert!(nested.is_empty());
}

#[test]
fn test_footer_path_query() {
    let forest = parser::parse(PAGE);

    let footer = find_first(&forest, "section", &[("id", "footer")]);
    let container = find_first(&footer.children, "div", &[("class", "container")]);
    let address = find_first(&container.children, "address", &[]);

    assert_eq!(address.content, "Mario Rossi");
}
