//! Media items as delivered in the queue payload.

use serde::{Deserialize, Serialize};

/// One media file within a post.
///
/// The wire format carries a `type` discriminator (`IMAGE` / `VIDEO`); each
/// variant keeps only the fields that apply to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MediaItem {
    #[serde(rename = "IMAGE")]
    Image(ImageItem),
    #[serde(rename = "VIDEO")]
    Video(VideoItem),
}

/// An image item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    /// Media ID, unique within the post
    #[serde(rename = "id")]
    pub media_id: String,
    /// Basename used for the input key and output naming
    pub filename: String,
    /// Caller-supplied display name, passed through to the result
    pub original_name: String,
    /// Source height; present on the wire but not used for images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// A video item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    /// Media ID, unique within the post
    #[serde(rename = "id")]
    pub media_id: String,
    /// Basename used for the input key and output naming
    pub filename: String,
    /// Caller-supplied display name, passed through to the result
    pub original_name: String,
    /// Source vertical resolution; caps the rendition ladder
    pub height: u32,
}

impl MediaItem {
    pub fn media_id(&self) -> &str {
        match self {
            MediaItem::Image(i) => &i.media_id,
            MediaItem::Video(v) => &v.media_id,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            MediaItem::Image(i) => &i.filename,
            MediaItem::Video(v) => &v.filename,
        }
    }

    pub fn original_name(&self) -> &str {
        match self {
            MediaItem::Image(i) => &i.original_name,
            MediaItem::Video(v) => &v.original_name,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaItem::Video(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_item_wire_format() {
        let json = r#"{"id":"m1","type":"VIDEO","filename":"a.mp4","originalName":"a.mp4","height":720}"#;
        let item: MediaItem = serde_json::from_str(json).unwrap();
        match &item {
            MediaItem::Video(v) => {
                assert_eq!(v.media_id, "m1");
                assert_eq!(v.height, 720);
            }
            _ => panic!("expected a video item"),
        }

        let out = serde_json::to_string(&item).unwrap();
        assert!(out.contains("\"type\":\"VIDEO\""));
        assert!(out.contains("\"id\":\"m1\""));
        assert!(out.contains("\"originalName\":\"a.mp4\""));
    }

    #[test]
    fn test_image_item_height_optional() {
        let json = r#"{"id":"m2","type":"IMAGE","filename":"pic.jpg","originalName":"pic.jpg"}"#;
        let item: MediaItem = serde_json::from_str(json).unwrap();
        match item {
            MediaItem::Image(i) => assert_eq!(i.height, None),
            _ => panic!("expected an image item"),
        }
    }
}
