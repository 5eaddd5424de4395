use scraper::{Html, Selector};
use url::Url;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub title: Option<String>,
    pub text: String,
    pub links: Vec<Url>,
}

/// Title, visible text and absolute outbound links of an HTML document.
pub fn extract_html(base: &Url, body: &str) -> Extracted {
    let document = Html::parse_document(body);

    let title = Selector::parse("title").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    });

    let text = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(|body| {
            let mut out = String::new();
            for node in body.descendants() {
                let Some(text) = node.value().as_text() else {
                    continue;
                };
                let skipped = node
                    .parent()
                    .and_then(|p| p.value().as_element())
                    .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"));
                if skipped {
                    continue;
                }
                let chunk = collapse_whitespace(text);
                if !chunk.is_empty() {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(&chunk);
                }
            }
            out
        })
        .unwrap_or_default();

    Extracted {
        title,
        text,
        links: extract_links(base, &document),
    }
}

fn extract_links(base: &Url, document: &Html) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("mailto:")
            || href.starts_with("javascript:")
            || href.starts_with("tel:")
        {
            continue;
        }

        let Ok(mut link) = base.join(href) else {
            continue;
        };
        if link.scheme() != "http" && link.scheme() != "https" {
            continue;
        }
        link.set_fragment(None);
        links.push(link);
    }
    links
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn looks_like_html(body: &str) -> bool {
    let trimmed = body.trim_start();
    trimmed.starts_with("<!DOCTYPE html")
        || trimmed.starts_with("<!doctype html")
        || trimmed.starts_with("<html")
        || trimmed.contains("<head")
        || trimmed.contains("<body")
}
