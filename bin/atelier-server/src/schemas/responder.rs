use crate::studio::ModelType;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PromptRequest {
    #[schema(example = "Are ghosts real?")]
    pub prompt: String,
    /// `"1"` local model (default), `"2"` hosted model.
    #[serde(default)]
    pub model_type: Option<ModelType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PromptReturn {
    /// Response text from the model.
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TranscriptionReturn {
    /// Transcription of the audio file.
    #[schema(example = "This is a sample transcription of the audio file.")]
    pub transcription: String,
}

/// `multipart/form-data` body with one audio clip in field `file`.
#[derive(Debug, ToSchema)]
pub struct AudioUpload {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
