use scraper::{Html, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Text,
    Unsupported,
}

pub fn detect_content_kind(mime_type: &str) -> ContentKind {
    let mime = mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    match mime.as_str() {
        "text/html" | "application/xhtml+xml" => ContentKind::Html,
        "text/plain" => ContentKind::Text,
        _ => ContentKind::Unsupported,
    }
}

const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript", "form", "iframe",
];

/// Readability-style extraction: drop boilerplate tags wholesale, then prefer an
/// `<article>`/`<main>` container if present, falling back to `<body>`. Text nodes are
/// joined with single newlines and collapsed; this is deliberately simpler than a full
/// density-scoring readability algorithm since feed articles are short-form news prose,
/// not long interactive pages.
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let container_selector = Selector::parse("article, main, body").unwrap();
    let Some(container) = document.select(&container_selector).next() else {
        return String::new();
    };

    let boilerplate_selectors: Vec<Selector> = BOILERPLATE_TAGS
        .iter()
        .filter_map(|tag| Selector::parse(tag).ok())
        .collect();
    let boilerplate_ids: std::collections::HashSet<_> = boilerplate_selectors
        .iter()
        .flat_map(|sel| container.select(sel))
        .map(|el| el.id())
        .collect();

    let mut paragraphs = Vec::new();
    for descendant in container.descendants() {
        let Some(element) = descendant.value().as_element() else {
            continue;
        };
        if element.name() != "p" {
            continue;
        }
        let Some(node_ref) = scraper::ElementRef::wrap(descendant) else {
            continue;
        };
        if node_ref
            .ancestors()
            .any(|ancestor| boilerplate_ids.contains(&ancestor.id()))
        {
            continue;
        }
        let text: String = node_ref.text().collect::<Vec<_>>().join(" ");
        let text = collapse_whitespace(&text);
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }

    if paragraphs.is_empty() {
        let text: String = container.text().collect::<Vec<_>>().join(" ");
        return collapse_whitespace(&text);
    }

    paragraphs.join("\n\n")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn extract_utf8(bytes: &[u8]) -> Result<String, std::string::FromUtf8Error> {
    String::from_utf8(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_html_content_kind() {
        assert_eq!(detect_content_kind("text/html; charset=utf-8"), ContentKind::Html);
        assert_eq!(detect_content_kind("application/json"), ContentKind::Unsupported);
    }

    #[test]
    fn extracts_article_paragraphs_and_drops_nav() {
        let html = r#"
            <html><body>
              <nav><p>Home | About | Contact</p></nav>
              <article>
                <p>First real paragraph of the story.</p>
                <p>Second paragraph with more detail.</p>
              </article>
              <footer><p>Copyright 2026</p></footer>
            </body></html>
        "#;
        let text = extract_main_text(html);
        assert!(text.contains("First real paragraph"));
        assert!(text.contains("Second paragraph"));
        assert!(!text.contains("Home | About"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn falls_back_to_body_text_when_no_paragraphs() {
        let html = "<html><body><div>Just some plain text, no paragraph tags.</div></body></html>";
        let text = extract_main_text(html);
        assert!(text.contains("Just some plain text"));
    }
}
