use atelier_agent::Line;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageReturn {
    /// Upload path, relative to the uploads root.
    #[schema(example = "0b6e.../9f86d081884c7d65.png")]
    pub filename: String,
    /// Size of the uploaded file in bytes.
    #[schema(example = 28632)]
    pub size: u64,
    /// Message the critique was stored as.
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrawRequest {
    /// Strokes currently on the canvas.
    #[schema(value_type = Vec<LineSchema>)]
    pub lines: Vec<Line>,
}

/// Documentation shape of one canvas stroke.
#[derive(Debug, ToSchema)]
#[schema(as = Line)]
pub struct LineSchema {
    /// Flattened `[x0, y0, x1, y1, ...]` coordinates.
    pub points: Vec<f32>,
    #[schema(example = "#ff0000")]
    pub color: String,
    pub size: f32,
    pub opacity: f32,
}

/// `multipart/form-data` body with one image in field `file`.
#[derive(Debug, ToSchema)]
pub struct ImageUpload {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
