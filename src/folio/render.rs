//! HTML shell for CMS pages.
//!
//! Handlers describe a page as a template id, a title and a JSON data
//! mapping. The shell embeds that mapping in a `page-data` script element;
//! the client-side templates under `/assets` render it.

use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::error;

#[derive(Debug, Clone)]
pub struct Page {
    template: &'static str,
    title: String,
    data: Map<String, Value>,
}

impl Page {
    pub fn new(template: &'static str, title: impl Into<String>) -> Self {
        Self {
            template,
            title: title.into(),
            data: Map::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or_else(|err| {
            error!("Failed to serialize page data {key}: {err}");
            Value::Null
        });
        self.data.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn render(&self) -> String {
        let payload = json!({
            "template": self.template,
            "title": self.title,
            "data": self.data,
        });
        format!(
            concat!(
                "<!DOCTYPE html>\n",
                "<html lang=\"en\">\n",
                "<head>\n",
                "<meta charset=\"utf-8\">\n",
                "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
                "<title>{title} | CMS</title>\n",
                "<link rel=\"stylesheet\" href=\"/assets/css/cms.css\">\n",
                "</head>\n",
                "<body data-template=\"{template}\">\n",
                "<main id=\"app\"></main>\n",
                "<script id=\"page-data\" type=\"application/json\">{payload}</script>\n",
                "<script src=\"/assets/js/cms.js\"></script>\n",
                "</body>\n",
                "</html>\n"
            ),
            title = escape_html(&self.title),
            template = escape_html(self.template),
            payload = escape_script_json(&payload.to_string()),
        )
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        Html(self.render()).into_response()
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Keep serialized JSON from closing the surrounding script element.
fn escape_script_json(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

/// Extract the JSON payload of a rendered page.
#[must_use]
pub fn page_payload(html: &str) -> Option<Value> {
    let start_tag = "<script id=\"page-data\" type=\"application/json\">";
    let start = html.find(start_tag)? + start_tag.len();
    let end = html[start..].find("</script>")? + start;
    serde_json::from_str(&html[start..end]).ok()
}
