// Scene Generation Client - Turns a free-text request into a scene descriptor
// Talks to a text-generation proxy; a few requests are answered locally without a call

use log::{debug, info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;
use crate::scenario::SceneDescriptor;
use crate::scene::KNOWN_TEXTURES;

const GENERATE_PATH: &str = "/api/gemini";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request text is empty")]
    EmptyRequest,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generation proxy returned status {0}")]
    Status(StatusCode),
    #[error("response carries no generated text")]
    MissingText,
    #[error("generated text is not a scene descriptor: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("scene descriptor has no scenarioType")]
    MissingScenarioType,
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationRequest<'a> {
    user_input: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Option<Vec<Part>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: Option<String>,
}

impl GenerationResponse {
    /// `candidates[0].content.parts[0].text`
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .as_ref()?
            .first()?
            .text
            .as_deref()
    }
}

// =============================================================================
// PROMPT & PARSING
// =============================================================================

/// Requests about an asteroid and the Earth skip the network entirely
pub fn local_rule(text: &str) -> Option<SceneDescriptor> {
    let lower = text.to_lowercase();
    let asteroid = lower.contains("asteroid") || text.contains("소행성");
    let earth = lower.contains("earth") || text.contains("지구");

    if asteroid && earth {
        Some(SceneDescriptor::new("asteroid_impact", Vec::new()))
    } else {
        None
    }
}

pub fn build_prompt(user_input: &str) -> String {
    format!(
        r#"You are an expert in 3D astrophysics simulation.
Pick exactly one scenario for the user's request and answer with its JSON scene data.

Scenario types (scenarioType):
- "collision": two planets rushing at each other from opposite sides.
- "orbit": planets orbiting a resting sun at the origin with initial velocities.
- "solar_eclipse": Sun, Moon, Earth in a line on the X axis (y = 0, z = 0).
- "lunar_eclipse": Sun, Earth, Moon in a line on the X axis (y = 0, z = 0).
- "planet_birth": a tiny proto-planet near the origin that barely moves.
- "asteroid_impact": Sun at the origin, Earth on its orbit, an asteroid from x >= 250 on a course crossing Earth's.

Output rules:
- Plain JSON only, no Markdown fences.
- Shape: {{ "scenarioType": "...", "objects": [{{ "name", "textureKey", "size", "mass", "position": {{"x","y","z"}}, "velocity": {{"x","y","z"}} }}] }}
- textureKey is one of: {textures}

User request: "{user_input}"
JSON:"#,
        textures = KNOWN_TEXTURES.join(", "),
        user_input = user_input,
    )
}

/// Drop Markdown code fences the model sometimes wraps around JSON
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

pub fn parse_descriptor(text: &str) -> Result<SceneDescriptor, ClientError> {
    let descriptor: SceneDescriptor = serde_json::from_str(&strip_code_fences(text))?;
    let has_kind = descriptor
        .scenario_type
        .as_deref()
        .map_or(false, |s| !s.trim().is_empty());
    if !has_kind {
        return Err(ClientError::MissingScenarioType);
    }
    Ok(descriptor)
}

pub fn parse_generation_response(response: &GenerationResponse) -> Result<SceneDescriptor, ClientError> {
    let text = response.first_text().ok_or(ClientError::MissingText)?;
    parse_descriptor(text)
}

// =============================================================================
// API CLIENT
// =============================================================================

#[allow(async_fn_in_trait)]
pub trait SceneGenerator {
    async fn generate(&self, text: &str) -> Result<SceneDescriptor, ClientError>;
}

pub struct GenerationClient {
    api_base: String,
    client: reqwest::Client,
}

impl GenerationClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.api_base.clone())
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

impl SceneGenerator for GenerationClient {
    async fn generate(&self, text: &str) -> Result<SceneDescriptor, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyRequest);
        }

        if let Some(descriptor) = local_rule(text) {
            info!("answered locally: asteroid_impact");
            return Ok(descriptor);
        }

        let url = format!("{}{}", self.api_base, GENERATE_PATH);
        let prompt = build_prompt(text);
        debug!("POST {} ({} prompt bytes)", url, prompt.len());

        let response = self
            .client
            .post(&url)
            .json(&GenerationRequest { user_input: &prompt })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }

        let body: GenerationResponse = response.json().await?;
        parse_generation_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_rule_matches_both_languages() {
        let english = local_rule("show an asteroid hitting the Earth").unwrap();
        assert_eq!(english.scenario_type.as_deref(), Some("asteroid_impact"));
        assert!(english.objects.is_empty());

        assert!(local_rule("지구와 충돌하는 소행성").is_some());
        assert!(local_rule("an asteroid flyby of Mars").is_none());
        assert!(local_rule("lunar eclipse").is_none());
    }

    #[test]
    fn test_strip_code_fences() {
        let fenced = "```json\n{\"scenarioType\":\"orbit\"}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"scenarioType\":\"orbit\"}");
    }

    #[test]
    fn test_parse_captured_response() {
        let body = r#"{
            "candidates": [{
                "content": {
                    "parts": [{
                        "text": "```json\n{\"scenarioType\":\"collision\",\"objects\":[{\"name\":\"A\",\"textureKey\":\"Mars\",\"size\":2,\"mass\":10,\"position\":{\"x\":-40,\"y\":0,\"z\":0},\"velocity\":{\"x\":12,\"y\":0,\"z\":0}}]}\n```"
                    }]
                }
            }]
        }"#;
        let response: GenerationResponse = serde_json::from_str(body).unwrap();
        let descriptor = parse_generation_response(&response).unwrap();
        assert_eq!(descriptor.scenario_type.as_deref(), Some("collision"));
        assert_eq!(descriptor.objects.len(), 1);
        assert_eq!(descriptor.objects[0].texture_key, "Mars");
    }

    #[test]
    fn test_rejects_missing_text_and_kind() {
        let empty: GenerationResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(parse_generation_response(&empty), Err(ClientError::MissingText)));

        assert!(matches!(
            parse_descriptor(r#"{"objects": []}"#),
            Err(ClientError::MissingScenarioType)
        ));
        assert!(matches!(parse_descriptor("not json"), Err(ClientError::Malformed(_))));
    }

    #[test]
    fn test_prompt_lists_textures_and_request() {
        let prompt = build_prompt("two planets colliding");
        assert!(prompt.contains("\"two planets colliding\""));
        assert!(prompt.contains("Neptune"));
        assert!(prompt.contains("\"scenarioType\""));
    }

    #[tokio::test]
    async fn test_generate_without_network() {
        // Unroutable base: any attempted call would fail with Transport
        let client = GenerationClient::new("http://127.0.0.1:9/");
        assert_eq!(client.api_base(), "http://127.0.0.1:9");

        assert!(matches!(client.generate("   ").await, Err(ClientError::EmptyRequest)));
        let local = client.generate("asteroid vs earth").await.unwrap();
        assert_eq!(local.scenario_type.as_deref(), Some("asteroid_impact"));
    }
}
