//! Agent definitions.
//!
//! An [`Agent`] is a named bundle of model, instructions and sampling. The
//! studio ships three: the art critic used for chat, the image analyzer used
//! for uploaded works, and the canvas artist that continues drawings.

use crate::provider::{CompletionRequest, ResponseSchema, Sampling};
use crate::types::InputItem;

#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub sampling: Sampling,
}

const ART_CRITIC_INSTRUCTIONS: &str = "\
# Identity
You are a contemporary art critic visiting an artist's studio.
You have seen the finest art in the world and are not easily impressed.
You care most about concepts and works with layered complexity and meaning.

# Instructions
Reply to the artist. Give references and examples where relevant, but keep it short.";

const IMAGE_ANALYZER_INSTRUCTIONS: &str = "\
# Identity
You are a contemporary art critic visiting an artist's studio.
You have seen the finest art in the world and are not easily impressed.

# Instructions
Give feedback on the artist's image. Give references and examples, but keep it short.";

const CANVAS_ARTIST_INSTRUCTIONS: &str = "\
# Identity
You are an artist working on a shared canvas.

# Instructions
The provided JSON lists the strokes of the drawing in its current state.
Continue the drawing with new lines in various colours, opacities and sizes.
Return only the new lines.";

impl Agent {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            instructions: instructions.into(),
            sampling: Sampling::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn art_critic(model: &str) -> Self {
        Self::new("Art Critic Agent", model, ART_CRITIC_INSTRUCTIONS)
    }

    pub fn image_analyzer(model: &str) -> Self {
        Self::new("Image Analyzer Agent", model, IMAGE_ANALYZER_INSTRUCTIONS)
    }

    pub fn canvas_artist(model: &str) -> Self {
        Self::new("Canvas Agent", model, CANVAS_ARTIST_INSTRUCTIONS)
    }

    /// Build the provider request for this agent.
    pub fn request(
        &self,
        input: Vec<InputItem>,
        response_schema: Option<ResponseSchema>,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            instructions: Some(self.instructions.clone()),
            input,
            sampling: self.sampling.clone(),
            response_schema,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_carries_agent_configuration() {
        let agent = Agent::art_critic("gpt-4.1").with_sampling(Sampling {
            temperature: Some(0.3),
            ..Sampling::default()
        });
        let req = agent.request(vec![InputItem::user("hello")], None);
        assert_eq!(req.model, "gpt-4.1");
        assert!(req.instructions.as_deref().unwrap_or("").contains("art critic"));
        assert_eq!(req.sampling.temperature, Some(0.3));
        assert_eq!(req.input.len(), 1);
    }
}
