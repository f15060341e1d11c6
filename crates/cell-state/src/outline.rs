//! Outline extraction from rendered output.
//!
//! An outline is the list of headings found in a cell's output, used by the
//! frontend's table of contents. It is a pure function of the output and is
//! recomputed after every message, so it can never disagree with `output`.

use std::sync::OnceLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::output::{CellOutput, OutputData, HTML_MIMETYPE, MARKDOWN_MIMETYPE};

/// Deepest heading level recognised by default (`<h6>`).
pub const DEFAULT_MAX_OUTLINE_LEVEL: u8 = 6;

/// How the frontend locates a heading inside the rendered output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OutlineTarget {
    /// The heading element carries an `id` attribute.
    Id(String),
    /// XPath-style locator, used when the heading has no id.
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OutlineItem {
    pub name: String,
    pub level: u8,
    pub by: OutlineTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Outline {
    pub items: Vec<OutlineItem>,
}

/// Derives an outline from a cell's output.
///
/// Must be pure: the same output always yields the same outline, and an
/// absent output yields `None`.
pub trait OutlineExtractor {
    fn extract(&self, output: Option<&CellOutput>) -> Option<Outline>;
}

/// Collects HTML (`<h1>`..`<h6>`) and markdown (`#`..`######`) headings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadingOutline {
    pub max_level: u8,
}

impl Default for HeadingOutline {
    fn default() -> Self {
        Self {
            max_level: DEFAULT_MAX_OUTLINE_LEVEL,
        }
    }
}

impl HeadingOutline {
    pub fn new(max_level: u8) -> Self {
        Self { max_level }
    }

    fn push(&self, items: &mut Vec<OutlineItem>, level: u8, name: String, id: Option<String>) {
        if level > self.max_level || name.is_empty() {
            return;
        }
        let by = match id {
            Some(id) if !id.is_empty() => OutlineTarget::Id(id),
            _ => OutlineTarget::Path(format!(
                "//h{}[contains(., {})]",
                level,
                xpath_literal(&name)
            )),
        };
        items.push(OutlineItem { name, level, by });
    }

    fn html_headings(&self, html: &str) -> Vec<OutlineItem> {
        let mut items = Vec::new();
        for caps in html_heading_re().captures_iter(html) {
            let level: u8 = caps[1].parse().unwrap_or(u8::MAX);
            let id = id_attr_re()
                .captures(&caps[2])
                .map(|id| decode_entities(&id[1]));
            let text = tag_re().replace_all(&caps[3], "");
            self.push(&mut items, level, normalize(&decode_entities(&text)), id);
        }
        items
    }

    /// Headings as a CommonMark renderer sees them, so `#` lines inside
    /// fenced or indented code are not headings.
    fn markdown_headings(&self, markdown: &str) -> Vec<OutlineItem> {
        let mut items = Vec::new();
        let mut current: Option<(u8, Option<String>, String)> = None;

        for event in Parser::new_ext(markdown, Options::ENABLE_HEADING_ATTRIBUTES) {
            match event {
                Event::Start(Tag::Heading { level, id, .. }) => {
                    current = Some((level as u8, id.map(|id| id.to_string()), String::new()));
                }
                Event::Text(text) | Event::Code(text) => {
                    if let Some((_, _, name)) = current.as_mut() {
                        name.push_str(&text);
                    }
                }
                Event::SoftBreak | Event::HardBreak => {
                    if let Some((_, _, name)) = current.as_mut() {
                        name.push(' ');
                    }
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some((level, id, name)) = current.take() {
                        self.push(&mut items, level, normalize(&name), id);
                    }
                }
                _ => {}
            }
        }
        items
    }
}

impl OutlineExtractor for HeadingOutline {
    fn extract(&self, output: Option<&CellOutput>) -> Option<Outline> {
        let output = output?;
        let OutputData::Text(text) = &output.data else {
            return None;
        };

        let items = match output.mimetype.as_str() {
            HTML_MIMETYPE => self.html_headings(text),
            MARKDOWN_MIMETYPE => self.markdown_headings(text),
            _ => return None,
        };

        if items.is_empty() {
            None
        } else {
            Some(Outline { items })
        }
    }
}

fn html_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<h([1-6])\b([^>]*)>(.*?)</h[1-6]\s*>").expect("valid heading regex")
    })
}

fn id_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\bid\s*=\s*["']([^"']*)["']"#).expect("valid id regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Quote `text` as an XPath 1.0 string literal. XPath has no escapes, so a
/// name holding both quote kinds is spliced together with `concat()`.
fn xpath_literal(text: &str) -> String {
    if !text.contains('"') {
        return format!("\"{}\"", text);
    }
    if !text.contains('\'') {
        return format!("'{}'", text);
    }
    let mut parts = Vec::new();
    for (i, piece) in text.split('"').enumerate() {
        if i > 0 {
            parts.push("'\"'".to_string());
        }
        if !piece.is_empty() {
            parts.push(format!("\"{}\"", piece));
        }
    }
    format!("concat({})", parts.join(", "))
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputChannel;

    fn markdown(text: &str) -> CellOutput {
        CellOutput {
            channel: OutputChannel::Output,
            mimetype: MARKDOWN_MIMETYPE.to_string(),
            data: OutputData::Text(text.to_string()),
            timestamp: None,
        }
    }

    #[test]
    fn test_absent_output_has_no_outline() {
        assert_eq!(HeadingOutline::default().extract(None), None);
    }

    #[test]
    fn test_html_headings() {
        let output = CellOutput::html(
            r#"<h1 id="intro">Intro</h1><p>text</p><h2>Data &amp; <em>Methods</em></h2>"#,
        );
        let outline = HeadingOutline::default().extract(Some(&output)).unwrap();

        assert_eq!(
            outline.items,
            vec![
                OutlineItem {
                    name: "Intro".into(),
                    level: 1,
                    by: OutlineTarget::Id("intro".into()),
                },
                OutlineItem {
                    name: "Data & Methods".into(),
                    level: 2,
                    by: OutlineTarget::Path("//h2[contains(., \"Data & Methods\")]".into()),
                },
            ]
        );
    }

    #[test]
    fn test_html_without_headings() {
        let output = CellOutput::html("<p>no headings</p>");
        assert_eq!(HeadingOutline::default().extract(Some(&output)), None);
    }

    #[test]
    fn test_markdown_headings() {
        let output = markdown("# Title\nbody\n### Sub section ###\n#nope\n");
        let outline = HeadingOutline::default().extract(Some(&output)).unwrap();
        let names: Vec<_> = outline.items.iter().map(|i| (i.name.as_str(), i.level)).collect();
        assert_eq!(names, vec![("Title", 1), ("Sub section", 3)]);
    }

    #[test]
    fn test_markdown_code_fence_comments_are_not_headings() {
        let output = markdown("# Title\n\n```python\n# just a comment\nx = 1\n```\n");
        let outline = HeadingOutline::default().extract(Some(&output)).unwrap();
        let names: Vec<_> = outline.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Title"]);
    }

    #[test]
    fn test_markdown_heading_id_and_inline_code() {
        let output = markdown("## Using `df.head()` {#usage}\n\nSetext\n======\n");
        let outline = HeadingOutline::default().extract(Some(&output)).unwrap();
        assert_eq!(
            outline.items,
            vec![
                OutlineItem {
                    name: "Using df.head()".into(),
                    level: 2,
                    by: OutlineTarget::Id("usage".into()),
                },
                OutlineItem {
                    name: "Setext".into(),
                    level: 1,
                    by: OutlineTarget::Path("//h1[contains(., \"Setext\")]".into()),
                },
            ]
        );
    }

    #[test]
    fn test_path_target_quotes_heading_text() {
        let output = CellOutput::html(r#"<h2>Say "hi"</h2><h3>It's "done"</h3><h4>It's</h4>"#);
        let outline = HeadingOutline::default().extract(Some(&output)).unwrap();
        let targets: Vec<_> = outline.items.into_iter().map(|i| i.by).collect();
        assert_eq!(
            targets,
            vec![
                OutlineTarget::Path(r#"//h2[contains(., 'Say "hi"')]"#.into()),
                OutlineTarget::Path(r#"//h3[contains(., concat("It's ", '"', "done", '"'))]"#.into()),
                OutlineTarget::Path(r#"//h4[contains(., "It's")]"#.into()),
            ]
        );
    }

    #[test]
    fn test_max_level() {
        let output = CellOutput::html("<h1>A</h1><h3>B</h3>");
        let outline = HeadingOutline::new(2).extract(Some(&output)).unwrap();
        assert_eq!(outline.items.len(), 1);
        assert_eq!(outline.items[0].name, "A");
    }

    #[test]
    fn test_plain_text_is_ignored() {
        let output = CellOutput::text(OutputChannel::Output, "<h1>not html</h1>");
        assert_eq!(HeadingOutline::default().extract(Some(&output)), None);
    }

    #[test]
    fn test_target_serde() {
        let value = serde_json::to_value(OutlineTarget::Id("x".into())).unwrap();
        assert_eq!(value, serde_json::json!({"id": "x"}));
    }
}
