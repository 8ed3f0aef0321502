//! Document shell shared by the demo pages.

use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde::Serialize;

use crate::service::PageError;

/// Stylesheet of the simple.css theme used by the counter and reports pages.
pub const SIMPLE_CSS: &str = "https://cdn.jsdelivr.net/npm/simpledotcss@2.2.0/simple.min.css";

/// Stylesheet of the TodoMVC theme.
pub const TODOMVC_CSS: &str = "https://cdn.jsdelivr.net/npm/todomvc-app-css@2.4.2/index.min.css";

/// Renders `var <name> = <json>;` for embedding in a `<script>` element.
///
/// # Errors
///
/// Returns a [`PageError`] if `value` does not serialize.
pub fn script_var<T: Serialize>(name: &str, value: &T) -> Result<Markup, PageError> {
    let json = serde_json::to_string(value)?;
    // `</script>` inside a string literal would end the element early.
    let json = json.replace('<', "\\u003c");
    Ok(PreEscaped(format!("var {name} = {json};")))
}

/// Wraps page content into a full document that loads the client bundle.
///
/// `preamble` is a script evaluated before the bundle; the bundle reads
/// the initial client state and stream subscription from it.
pub fn document(
    title: &str,
    stylesheet: &str,
    content: Markup,
    footer: Markup,
    preamble: Option<Markup>,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                link rel="stylesheet" href=(stylesheet);
                link rel="stylesheet" href="/dist/bundle.css";
            }
            body {
                (content)
                (footer)
                div id="error-box" {}
                @if let Some(preamble) = preamble {
                    script { (preamble) }
                }
                script src="/dist/bundle.js" {}
            }
        }
    }
}

/// Links between the three demos.
pub fn nav_links() -> Markup {
    html! {
        hr;
        p class="biglink" { a href="/" { "TodoMVC Example" } }
        p class="biglink" { a href="/counter" { "Counter Example" } }
        p class="biglink" { a href="/reports" { "Reports Example" } }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn script_var_escapes_closing_tags() {
        let Ok(markup) = script_var("state", &json!({"text": "</script><b>"})) else {
            panic!("serialization failed");
        };
        let rendered = markup.into_string();
        assert!(!rendered.contains("</script>"));
        assert!(rendered.starts_with("var state = {"));
    }

    #[test]
    fn document_loads_bundle_after_preamble() {
        let page = document(
            "t",
            SIMPLE_CSS,
            html! { main id="page" { "hi" } },
            nav_links(),
            Some(PreEscaped("var stream = null;".to_string())),
        )
        .into_string();
        let (Some(preamble), Some(bundle)) = (
            page.find("var stream = null;"),
            page.find("/dist/bundle.js"),
        ) else {
            panic!("missing scripts");
        };
        assert!(preamble < bundle);
        assert!(page.starts_with("<!DOCTYPE html>"));
    }
}
