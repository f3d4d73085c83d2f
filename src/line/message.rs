//! Outbound message types for the reply API, including the Flex layout
//! subset the card renderer uses.

use serde::Serialize;

/// A message in a reply request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Text {
        text: String,
    },
    Flex {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: FlexCarousel,
    },
}

impl Message {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    #[must_use]
    pub fn flex(alt_text: impl Into<String>, contents: FlexCarousel) -> Self {
        Self::Flex {
            alt_text: alt_text.into(),
            contents,
        }
    }
}

/// Horizontally swipeable sequence of bubbles.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "type", rename = "carousel")]
pub struct FlexCarousel {
    pub contents: Vec<FlexBubble>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BubbleSize {
    Giga,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "bubble")]
pub struct FlexBubble {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<BubbleSize>,
    pub body: FlexBox,
}

/// Any component that can sit inside a box.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlexComponent {
    Box(FlexBox),
    Image(FlexImage),
    Text(FlexText),
}

impl From<FlexBox> for FlexComponent {
    fn from(b: FlexBox) -> Self {
        Self::Box(b)
    }
}

impl From<FlexImage> for FlexComponent {
    fn from(i: FlexImage) -> Self {
        Self::Image(i)
    }
}

impl From<FlexText> for FlexComponent {
    fn from(t: FlexText) -> Self {
        Self::Text(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxLayout {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "box")]
pub struct FlexBox {
    pub layout: BoxLayout,
    pub contents: Vec<FlexComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flex: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing: Option<String>,
}

impl FlexBox {
    #[must_use]
    pub fn new(layout: BoxLayout, contents: Vec<FlexComponent>) -> Self {
        Self {
            layout,
            contents,
            flex: None,
            spacing: None,
        }
    }

    #[must_use]
    pub fn flex(mut self, flex: u32) -> Self {
        self.flex = Some(flex);
        self
    }

    #[must_use]
    pub fn spacing(mut self, spacing: impl Into<String>) -> Self {
        self.spacing = Some(spacing.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "image", rename_all = "camelCase")]
pub struct FlexImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flex: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "type", rename = "text")]
pub struct FlexText {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl FlexText {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    #[must_use]
    pub fn bold(mut self) -> Self {
        self.weight = Some("bold".to_string());
        self
    }

    #[must_use]
    pub fn align(mut self, align: impl Into<String>) -> Self {
        self.align = Some(align.into());
        self
    }

    #[must_use]
    pub fn margin(mut self, margin: impl Into<String>) -> Self {
        self.margin = Some(margin.into());
        self
    }

    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.action = Some(Action::Uri { uri: uri.into() });
        self
    }
}

/// Tap action on a component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Uri { uri: String },
}
