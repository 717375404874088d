//! Pretty-printing of response bodies for display.
//!
//! Pure functions: JSON is re-indented with two spaces, XML is re-indented
//! with `quick-xml`, anything else is shown as received.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::io::Cursor;

use crate::types::ResponseBody;

/// How a body should be rendered, derived from its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Xml,
    Html,
    Text,
}

impl BodyKind {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return BodyKind::Text;
        };
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("json") {
            BodyKind::Json
        } else if content_type.contains("html") {
            BodyKind::Html
        } else if content_type.contains("xml") {
            BodyKind::Xml
        } else {
            BodyKind::Text
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyKind::Json => "json",
            BodyKind::Xml => "xml",
            BodyKind::Html => "html",
            BodyKind::Text => "text",
        }
    }
}

/// Re-indent a JSON document with two spaces.
pub fn format_json(input: &str) -> Result<String, String> {
    if input.trim().is_empty() {
        return Err("Empty input".to_string());
    }
    let value: serde_json::Value =
        serde_json::from_str(input).map_err(|e| format!("JSON parse error: {}", e))?;
    serde_json::to_string_pretty(&value).map_err(|e| format!("JSON format error: {}", e))
}

/// Feed every event of `input` to `sink`, stopping at the first read error.
fn walk_xml<F>(input: &str, mut sink: F) -> Result<(), String>
where
    F: FnMut(Event<'_>) -> Result<(), String>,
{
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return Ok(()),
            Ok(event) => sink(event)?,
            Err(e) => {
                return Err(format!(
                    "Invalid XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
        }
    }
}

/// Re-indent an XML document with two spaces.
pub fn format_xml(input: &str) -> Result<String, String> {
    if input.trim().is_empty() {
        return Err("Empty input".to_string());
    }
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    walk_xml(input, |event| {
        writer
            .write_event(event)
            .map_err(|e| format!("XML write error: {}", e))
    })?;
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| format!("XML is not UTF-8: {}", e))
}

/// Blank input counts as valid.
pub fn validate_xml(input: &str) -> Result<(), String> {
    if input.trim().is_empty() {
        return Ok(());
    }
    walk_xml(input, |_| Ok(()))
}

/// Display text for a response body. Falls back to the raw text whenever
/// formatting fails.
pub fn pretty_body(body: &ResponseBody, content_type: Option<&str>) -> String {
    match body {
        ResponseBody::Json(_) => body.to_display_string(),
        ResponseBody::Text(text) => match BodyKind::from_content_type(content_type) {
            BodyKind::Xml => match validate_xml(text).and_then(|_| format_xml(text)) {
                Ok(pretty) => pretty,
                Err(e) => {
                    log::debug!("showing raw XML body: {}", e);
                    text.clone()
                }
            },
            // JSON that was not parsed as such (e.g. `text/json` variants)
            BodyKind::Json => format_json(text).unwrap_or_else(|_| text.clone()),
            BodyKind::Html | BodyKind::Text => text.clone(),
        },
    }
}
