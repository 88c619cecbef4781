//! Template segments to abstract widgets
//!
//! A [`SegmentRegistry`] is built once per session and handed to whatever
//! builds activation surfaces. Unknown segment types are skipped.

use overlay_core::ActivationDocument;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Renderer-independent description of a piece of activation content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Widget {
    Text { content: String },
    Image { url: String },
    Button { label: String, url: Option<String> },
    Row { children: Vec<Widget> },
    Column { children: Vec<Widget> },
}

/// Turns one segment of a given type into a widget
pub trait SegmentProcessor {
    /// The `type` field this processor handles
    fn segment_type(&self) -> &str;

    /// Builds the widget, or `None` if the segment is unusable. Containers
    /// render their children through `registry`.
    fn process(&self, segment: &Value, registry: &SegmentRegistry) -> Option<Widget>;
}

fn content(segment: &Value) -> Option<String> {
    segment.get("content").and_then(Value::as_str).map(str::to_string)
}

fn attribute(segment: &Value, name: &str) -> Option<String> {
    segment
        .get("attributes")
        .and_then(|a| a.get(name))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn children(segment: &Value, registry: &SegmentRegistry) -> Vec<Widget> {
    segment
        .get("children")
        .and_then(Value::as_array)
        .map(|c| registry.render_all(c))
        .unwrap_or_default()
}

struct TextProcessor;

impl SegmentProcessor for TextProcessor {
    fn segment_type(&self) -> &str {
        "text"
    }

    fn process(&self, segment: &Value, _: &SegmentRegistry) -> Option<Widget> {
        content(segment).map(|content| Widget::Text { content })
    }
}

struct ImageProcessor;

impl SegmentProcessor for ImageProcessor {
    fn segment_type(&self) -> &str {
        "image"
    }

    fn process(&self, segment: &Value, _: &SegmentRegistry) -> Option<Widget> {
        content(segment)
            .or_else(|| attribute(segment, "src"))
            .map(|url| Widget::Image { url })
    }
}

struct ButtonProcessor;

impl SegmentProcessor for ButtonProcessor {
    fn segment_type(&self) -> &str {
        "button"
    }

    fn process(&self, segment: &Value, _: &SegmentRegistry) -> Option<Widget> {
        let label = content(segment)?;
        Some(Widget::Button {
            label,
            url: attribute(segment, "url"),
        })
    }
}

struct RowProcessor;

impl SegmentProcessor for RowProcessor {
    fn segment_type(&self) -> &str {
        "row"
    }

    fn process(&self, segment: &Value, registry: &SegmentRegistry) -> Option<Widget> {
        Some(Widget::Row {
            children: children(segment, registry),
        })
    }
}

struct ColumnProcessor;

impl SegmentProcessor for ColumnProcessor {
    fn segment_type(&self) -> &str {
        "column"
    }

    fn process(&self, segment: &Value, registry: &SegmentRegistry) -> Option<Widget> {
        Some(Widget::Column {
            children: children(segment, registry),
        })
    }
}

/// Lookup table from segment type to processor
pub struct SegmentRegistry {
    processors: HashMap<String, Box<dyn SegmentProcessor>>,
}

impl Default for SegmentRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(TextProcessor));
        registry.register(Box::new(ImageProcessor));
        registry.register(Box::new(ButtonProcessor));
        registry.register(Box::new(RowProcessor));
        registry.register(Box::new(ColumnProcessor));
        registry
    }
}

impl SegmentRegistry {
    /// A registry with no processors
    pub fn empty() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// Adds a processor, returning the one it replaced
    pub fn register(
        &mut self,
        processor: Box<dyn SegmentProcessor>,
    ) -> Option<Box<dyn SegmentProcessor>> {
        self.processors
            .insert(processor.segment_type().to_string(), processor)
    }

    pub fn has_processor(&self, segment_type: &str) -> bool {
        self.processors.contains_key(segment_type)
    }

    /// Renders one segment
    pub fn render(&self, segment: &Value) -> Option<Widget> {
        let segment_type = segment.get("type").and_then(Value::as_str)?;
        match self.processors.get(segment_type) {
            Some(processor) => processor.process(segment, self),
            None => {
                warn!("No processor found for segment type: {}", segment_type);
                None
            }
        }
    }

    /// Renders segments in order, skipping the ones that produce nothing
    pub fn render_all<'a>(&self, segments: impl IntoIterator<Item = &'a Value>) -> Vec<Widget> {
        segments.into_iter().filter_map(|s| self.render(s)).collect()
    }

    /// Content of an activation's preview surface: the preview template when
    /// there is one, otherwise its title and subtitle
    pub fn preview_content(&self, doc: &ActivationDocument) -> Vec<Widget> {
        let Some(preview) = doc.preview_settings() else {
            return Vec::new();
        };

        if let Some(template) = preview.get("template").and_then(Value::as_array) {
            return self.render_all(overlay_core::activation::native_segments(template));
        }

        ["title", "subtitle"]
            .iter()
            .filter_map(|key| preview.get(*key).and_then(Value::as_str))
            .map(|text| Widget::Text {
                content: text.to_string(),
            })
            .collect()
    }

    /// Content of an activation's detail surface
    pub fn detail_content(&self, doc: &ActivationDocument) -> Vec<Widget> {
        self.render_all(doc.native_segments())
    }
}
