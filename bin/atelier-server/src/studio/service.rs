//! The studio's agents: chat with the critic, critique an uploaded image and
//! continue a drawing.

use atelier_agent::{Agent, AgentError, CanvasLines, InputItem, Line, Role, Runner, TokenStream};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::info;

use crate::entities::MessageRecord;

const CRITIQUE_PROMPT: &str = "Here is my latest work. What do you think?";

#[derive(Debug, Clone)]
pub struct Studio {
    runner: Runner,
    critic: Agent,
    analyzer: Agent,
    canvas: Agent,
}

impl Studio {
    pub fn new(runner: Runner, model: &str) -> Self {
        Self {
            runner,
            critic: Agent::art_critic(model),
            analyzer: Agent::image_analyzer(model),
            canvas: Agent::canvas_artist(model),
        }
    }

    /// Prior user/assistant turns (oldest first) followed by `prompt`.
    pub fn conversation(history: &[MessageRecord], prompt: &str) -> Vec<InputItem> {
        history
            .iter()
            .filter_map(|m| match m.role.parse::<Role>() {
                Ok(role @ (Role::User | Role::Assistant)) => Some(InputItem::text(role, m.content.clone())),
                _ => None,
            })
            .chain(std::iter::once(InputItem::user(prompt)))
            .collect()
    }

    pub async fn chat(&self, input: Vec<InputItem>) -> Result<TokenStream, AgentError> {
        self.runner.run_streamed(&self.critic, input).await
    }

    /// Stream a critique of a PNG image.
    pub async fn critique(&self, png: &[u8]) -> Result<TokenStream, AgentError> {
        let url = format!("data:image/png;base64,{}", STANDARD.encode(png));
        let input = vec![InputItem::user_image(Some(CRITIQUE_PROMPT), url)];
        self.runner.run_streamed(&self.analyzer, input).await
    }

    /// Ask the canvas agent for new strokes continuing `lines`.
    pub async fn draw(&self, lines: Vec<Line>) -> Result<Vec<Line>, AgentError> {
        let current = serde_json::to_string(&CanvasLines { lines })
            .map_err(|e| AgentError::Decode(e.to_string()))?;
        let input = vec![InputItem::user(format!("Current drawing (JSON):\n{current}"))];
        let reply: CanvasLines = self.runner.run_structured(&self.canvas, input).await?;
        info!(new_lines = reply.lines.len(), "canvas agent replied");
        Ok(reply.lines)
    }
}
