//! Provider-neutral conversation types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Author of a conversation turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One piece of a multi-part message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// An image as a `data:` URL (or any URL the provider can fetch).
    Image { url: String },
}

/// A single turn handed to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct InputItem {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl InputItem {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// A user turn carrying an optional caption followed by an image.
    pub fn user_image(caption: Option<&str>, image_url: impl Into<String>) -> Self {
        let mut content = Vec::with_capacity(2);
        if let Some(caption) = caption {
            content.push(ContentPart::Text(caption.to_owned()));
        }
        content.push(ContentPart::Image {
            url: image_url.into(),
        });
        Self {
            role: Role::User,
            content,
        }
    }

    pub fn has_images(&self) -> bool {
        self.content
            .iter()
            .any(|p| matches!(p, ContentPart::Image { .. }))
    }

    /// Concatenated text parts; images are skipped.
    pub fn plain_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A stroke on the shared drawing canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Line {
    /// Flattened `[x0, y0, x1, y1, ...]` canvas coordinates.
    pub points: Vec<f32>,
    /// CSS colour string, e.g. `"#ff0000"`.
    pub color: String,
    /// Stroke width in canvas pixels.
    pub size: f32,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
}

/// Object wrapper around a stroke list; structured replies must be objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CanvasLines {
    pub lines: Vec<Line>,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_strum() {
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::from_str("user").ok(), Some(Role::User));
        assert!(Role::from_str("tool").is_err());
    }

    #[test]
    fn plain_text_skips_images() {
        let item = InputItem::user_image(Some("look"), "data:image/png;base64,AAAA");
        assert!(item.has_images());
        assert_eq!(item.plain_text(), "look");
    }
}
