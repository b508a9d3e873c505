//! Ollama text generation client
//!
//! Serves both sentence correction and story critique against a single
//! `/api/generate` endpoint. The endpoint streams newline-delimited JSON
//! chunks by default; a single JSON object (non-streaming mode) is the
//! one-chunk case of the same format.

use super::{Correction, LlmError, StoryCritic, StoryCritique, TextCorrector};
use async_trait::async_trait;
use inkwell_common::config::LlmConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = "inkwell/0.1.0";

/// Feedback used when the reply carries no usable feedback section
pub const NO_FEEDBACK: &str = "No feedback provided";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// One streamed chunk of a generate reply
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

/// JSON form of a correction reply
#[derive(Debug, Deserialize)]
struct JsonCorrection {
    corrected: String,
    #[serde(default)]
    feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonCritique {
    analysis: String,
    tips: Vec<String>,
    performance_score: f64,
}

/// Ollama API client
pub struct OllamaClient {
    http_client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(url: String, model: String, timeout: Duration) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            url,
            model,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(
            config.url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Send one prompt and return the concatenated reply text
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Sending generate request");

        let response = self
            .http_client
            .post(&self.url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
            })
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Api(status.as_u16(), body));
        }

        let text = aggregate_stream(&body)?;
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(text)
    }
}

#[async_trait]
impl TextCorrector for OllamaClient {
    async fn correct(&self, text: &str) -> Result<Correction, LlmError> {
        let reply = self.generate(&correction_prompt(text)).await?;
        Ok(parse_correction(text, &reply))
    }
}

#[async_trait]
impl StoryCritic for OllamaClient {
    async fn critique(&self, content: &str) -> Result<StoryCritique, LlmError> {
        let reply = self.generate(&analysis_prompt(content)).await?;
        parse_critique(&reply)
    }
}

pub fn correction_prompt(sentence: &str) -> String {
    format!(
        "Please correct the following sentence if needed and provide feedback in the format \
         'Corrected: <corrected sentence> Feedback: <feedback message>': {}",
        sentence
    )
}

pub fn analysis_prompt(content: &str) -> String {
    format!(
        r#"Please analyze the following story for structure, style, and common errors.
Return your response as JSON in the following format:
{{
    "analysis": "Your analysis text",
    "tips": ["Tip 1", "Tip 2"],
    "performance_score": 0
}}
performance_score is an integer from 0 to 100.
Story Content:
{}"#,
        content
    )
}

/// Concatenate the `response` fields of newline-delimited chunks
fn aggregate_stream(body: &str) -> Result<String, LlmError> {
    let mut text = String::new();

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let chunk: GenerateChunk = serde_json::from_str(line)
            .map_err(|e| LlmError::Parse(format!("invalid chunk: {}", e)))?;

        if let Some(error) = chunk.error {
            return Err(LlmError::Service(error));
        }

        text.push_str(&chunk.response);

        if chunk.done {
            break;
        }
    }

    Ok(text)
}

/// Interpret a correction reply
///
/// JSON `{corrected, feedback}` first, then the tagged
/// `Corrected: .. Feedback: ..` text. Anything else keeps the sentence as
/// written with [`NO_FEEDBACK`].
pub fn parse_correction(original: &str, reply: &str) -> Correction {
    if let Some(parsed) = extract_json_object(reply)
        .and_then(|json| serde_json::from_str::<JsonCorrection>(json).ok())
    {
        let corrected = parsed.corrected.trim();
        if !corrected.is_empty() {
            return Correction {
                corrected: corrected.to_string(),
                feedback: parsed
                    .feedback
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .unwrap_or_else(|| NO_FEEDBACK.to_string()),
            };
        }
    }

    let (corrected_part, feedback) = match reply.split_once("Feedback:") {
        Some((before, after)) => (before, after.trim().to_string()),
        None if reply.contains("Corrected:") => (reply, String::new()),
        None => {
            return Correction {
                corrected: original.to_string(),
                feedback: NO_FEEDBACK.to_string(),
            }
        }
    };

    let corrected = match corrected_part.split_once("Corrected:") {
        Some((_, after)) => after,
        None => corrected_part,
    };
    let corrected = corrected.trim().trim_matches('"').trim();

    Correction {
        corrected: if corrected.is_empty() {
            original.to_string()
        } else {
            corrected.to_string()
        },
        feedback: if feedback.is_empty() {
            NO_FEEDBACK.to_string()
        } else {
            feedback
        },
    }
}

/// Interpret a critique reply; anything short of the full shape is an error
pub fn parse_critique(reply: &str) -> Result<StoryCritique, LlmError> {
    let json = extract_json_object(reply)
        .ok_or_else(|| LlmError::Parse("no JSON object in analysis reply".to_string()))?;

    let parsed: JsonCritique = serde_json::from_str(json)
        .map_err(|e| LlmError::Parse(format!("analysis reply: {}", e)))?;

    let analysis = parsed.analysis.trim().to_string();
    if analysis.is_empty() {
        return Err(LlmError::Parse("analysis text is empty".to_string()));
    }
    if !parsed.performance_score.is_finite() {
        return Err(LlmError::Parse("performance_score is not a number".to_string()));
    }

    let tips = parsed
        .tips
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    Ok(StoryCritique {
        analysis,
        tips,
        performance_score: parsed.performance_score.round().clamp(0.0, 100.0) as i64,
    })
}

/// Outermost `{...}` span, skipping prose or markdown fences around it
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    #[test]
    fn test_aggregate_streamed_chunks() {
        let body = concat!(
            r#"{"model":"mistral","response":"Corrected: The cat ","done":false}"#,
            "\n",
            r#"{"model":"mistral","response":"sat. Feedback: Good.","done":false}"#,
            "\n",
            r#"{"model":"mistral","response":"","done":true}"#,
            "\n"
        );
        assert_eq!(
            aggregate_stream(body).unwrap(),
            "Corrected: The cat sat. Feedback: Good."
        );
    }

    #[test]
    fn test_aggregate_single_object() {
        let body = r#"{"response":"hello","done":true}"#;
        assert_eq!(aggregate_stream(body).unwrap(), "hello");
    }

    #[test]
    fn test_aggregate_reports_service_error() {
        let body = r#"{"error":"model 'mistral' not found"}"#;
        assert!(matches!(aggregate_stream(body), Err(LlmError::Service(_))));
    }

    #[test]
    fn test_aggregate_rejects_garbage() {
        assert!(matches!(aggregate_stream("not json"), Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_parse_tagged_correction() {
        let c = parse_correction(
            "the dog run fast",
            "Corrected: The dog runs fast. Feedback: Subject-verb agreement.",
        );
        assert_eq!(c.corrected, "The dog runs fast.");
        assert_eq!(c.feedback, "Subject-verb agreement.");
    }

    #[test]
    fn test_parse_json_correction() {
        let c = parse_correction(
            "i am here",
            "```json\n{\"corrected\": \"I am here.\", \"feedback\": \"Capitalize I.\"}\n```",
        );
        assert_eq!(c.corrected, "I am here.");
        assert_eq!(c.feedback, "Capitalize I.");
    }

    #[test]
    fn test_parse_correction_without_tags_keeps_original() {
        let c = parse_correction("Fine as is.", "Looks great to me!");
        assert_eq!(c.corrected, "Fine as is.");
        assert_eq!(c.feedback, NO_FEEDBACK);
    }

    #[test]
    fn test_parse_correction_without_feedback_section() {
        let c = parse_correction("teh end", "Corrected: The end.");
        assert_eq!(c.corrected, "The end.");
        assert_eq!(c.feedback, NO_FEEDBACK);
    }

    #[test]
    fn test_parse_critique_with_fences() {
        let reply = "Here you go:\n```json\n{\"analysis\": \"Clear arc.\", \"tips\": [\"Use dialogue\", \" \"], \"performance_score\": 82.6}\n```";
        let critique = parse_critique(reply).unwrap();
        assert_eq!(critique.analysis, "Clear arc.");
        assert_eq!(critique.tips, vec!["Use dialogue"]);
        assert_eq!(critique.performance_score, 83);
    }

    #[test]
    fn test_parse_critique_clamps_score() {
        let reply = r#"{"analysis": "x", "tips": [], "performance_score": 140}"#;
        assert_eq!(parse_critique(reply).unwrap().performance_score, 100);
    }

    #[test]
    fn test_parse_critique_rejects_missing_fields() {
        assert!(parse_critique(r#"{"analysis": "only"}"#).is_err());
        assert!(parse_critique(r#"{"analysis": "", "tips": [], "performance_score": 1}"#).is_err());
        assert!(parse_critique("I liked it a lot").is_err());
        assert!(
            parse_critique(r#"{"analysis": "x", "tips": "one", "performance_score": 1}"#).is_err()
        );
    }

    #[test]
    fn test_prompts_embed_input() {
        assert!(correction_prompt("abc").ends_with(": abc"));
        let prompt = analysis_prompt("Once upon a time.");
        assert!(prompt.contains("\"tips\""));
        assert!(prompt.ends_with("Once upon a time."));
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/generate", addr)
    }

    #[tokio::test]
    async fn test_correct_against_local_server() {
        let router = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["model"], "mistral");
                concat!(
                    r#"{"response":"Corrected: Hello there. ","done":false}"#,
                    "\n",
                    r#"{"response":"Feedback: Added punctuation.","done":true}"#
                )
            }),
        );
        let url = serve(router).await;

        let client = OllamaClient::new(url, "mistral".into(), Duration::from_secs(5)).unwrap();
        let correction = client.correct("hello there").await.unwrap();

        assert_eq!(correction.corrected, "Hello there.");
        assert_eq!(correction.feedback, "Added punctuation.");
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        );
        let url = serve(router).await;

        let client = OllamaClient::new(url, "mistral".into(), Duration::from_secs(5)).unwrap();
        match client.critique("story").await {
            Err(LlmError::Api(503, body)) => assert_eq!(body, "busy"),
            other => panic!("expected API error, got {:?}", other),
        }
    }
}
