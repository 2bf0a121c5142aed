//! Blocking client for the local Ollama text-generation endpoint.
//!
//! - Blocking client using `ureq` (no async); callers run it off the runtime.
//! - One request shape: `{model, prompt, stream: false}` -> `{response}`.
//! - Failures never escape as errors: they come back as text starting with
//!   `# ERROR`, which callers check with [`is_error_text`].

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;

use crate::config::Config;

pub const ERROR_MARKER: &str = "# ERROR";
const MISSING_RESPONSE_TEXT: &str = "# Error: No se obtuvo respuesta de Ollama";
const NO_SUGGESTIONS_TEXT: &str = "IA: No se detectaron sugerencias específicas.";

/// What the caller wants from the model.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AssistProfile {
    /// Answer is a drop-in replacement for the submitted source.
    Optimize,
    /// Answer is a bullet list, one suggestion per line.
    Suggest,
}

impl AssistProfile {
    pub fn prompt(self, code: &str) -> String {
        match self {
            AssistProfile::Optimize => format!(
                "Optimiza el siguiente código Python para eficiencia energética y bajo consumo de recursos. \
                 Responde *solo* con el código optimizado, sin explicaciones, comentarios de 'antes y después', \
                 o markdown. El código debe ser funcional.\n\nCÓDIGO:\n{}",
                code
            ),
            AssistProfile::Suggest => format!(
                "Analiza el siguiente código Python y dame una lista de sugerencias de optimización para \
                 eficiencia energética. Responde *solo* con una lista de sugerencias en viñetas (usando '-'). \
                 No incluyas nada más que las viñetas.\n\nCÓDIGO:\n{}",
                code
            ),
        }
    }
}

/// Prompt-in/text-out generative service.
pub trait Assistant: Send + Sync {
    fn complete(&self, prompt: &str, profile: AssistProfile) -> String;
}

pub fn is_error_text(text: &str) -> bool {
    text.contains(ERROR_MARKER)
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug)]
pub enum OllamaClientError {
    Connect(String),
    Timeout,
    Http { status: u16 },
    Transport(String),
    Json(String),
}

impl core::fmt::Display for OllamaClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OllamaClientError::Connect(s) => write!(f, "connection failed: {}", s),
            OllamaClientError::Timeout => write!(f, "request timed out"),
            OllamaClientError::Http { status } => write!(f, "http {}", status),
            OllamaClientError::Transport(s) => write!(f, "transport error: {}", s),
            OllamaClientError::Json(s) => write!(f, "json error: {}", s),
        }
    }
}

impl std::error::Error for OllamaClientError {}

impl From<ureq::Error> for OllamaClientError {
    fn from(value: ureq::Error) -> Self {
        match value {
            ureq::Error::Timeout(_) => OllamaClientError::Timeout,
            ureq::Error::StatusCode(status) => OllamaClientError::Http { status },
            ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
                OllamaClientError::Connect(value.to_string())
            }
            ureq::Error::Io(ref e) if is_connect_io(e) => OllamaClientError::Connect(e.to_string()),
            ureq::Error::Io(ref e) if e.kind() == io::ErrorKind::TimedOut => OllamaClientError::Timeout,
            ureq::Error::Json(e) => OllamaClientError::Json(e.to_string()),
            other => OllamaClientError::Transport(other.to_string()),
        }
    }
}

fn is_connect_io(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}

pub struct OllamaClient {
    agent: ureq::Agent,
    url: String,
    optimize_model: String,
    suggest_model: String,
}

impl OllamaClient {
    pub fn new(url: impl Into<String>, timeout: Duration, optimize_model: impl Into<String>, suggest_model: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder().timeout_global(Some(timeout)).build();
        OllamaClient {
            agent: ureq::Agent::new_with_config(config),
            url: url.into(),
            optimize_model: optimize_model.into(),
            suggest_model: suggest_model.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.ollama_url.clone(),
            cfg.ollama_timeout,
            cfg.optimize_model.clone(),
            cfg.suggest_model.clone(),
        )
    }

    fn model_for(&self, profile: AssistProfile) -> &str {
        match profile {
            AssistProfile::Optimize => &self.optimize_model,
            AssistProfile::Suggest => &self.suggest_model,
        }
    }

    /// Base address shown to operators when the service is unreachable.
    fn base_url(&self) -> &str {
        self.url
            .find("/api/")
            .map(|idx| &self.url[..idx])
            .unwrap_or(self.url.as_str())
    }

    pub fn generate(&self, model: &str, prompt: &str) -> Result<Option<String>, OllamaClientError> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let mut res = self.agent.post(&self.url).send_json(&body)?;
        let parsed: GenerateResponse = res.body_mut().read_json()?;
        Ok(parsed.response)
    }
}

impl Assistant for OllamaClient {
    fn complete(&self, prompt: &str, profile: AssistProfile) -> String {
        let model = self.model_for(profile);
        debug!("Assistant: sending {:?} prompt to model {}", profile, model);
        match self.generate(model, prompt) {
            Ok(Some(text)) => text,
            Ok(None) => MISSING_RESPONSE_TEXT.to_string(),
            Err(OllamaClientError::Connect(e)) => {
                warn!("Assistant: could not connect to Ollama at {}: {}", self.url, e);
                format!(
                    "{}: No se pudo conectar a Ollama. (¿Está corriendo en {}?)",
                    ERROR_MARKER,
                    self.base_url()
                )
            }
            Err(OllamaClientError::Timeout) => {
                warn!("Assistant: timed out waiting for model {}", model);
                format!(
                    "{}: Timeout de Ollama. El modelo puede estar tardando mucho.",
                    ERROR_MARKER
                )
            }
            Err(e) => {
                warn!("Assistant: call failed: {}", e);
                format!("{}: {}", ERROR_MARKER, e)
            }
        }
    }
}

/// Splits a bullet-list answer into suggestions. Blank lines are dropped and
/// `-`/space characters are trimmed from both ends of each line.
pub fn parse_suggestions(answer: &str) -> Vec<String> {
    if is_error_text(answer) {
        return vec![answer.to_string()];
    }
    let suggestions: Vec<String> = answer
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim_matches(|c| c == '-' || c == ' ').to_string())
        .collect();
    if suggestions.is_empty() {
        vec![NO_SUGGESTIONS_TEXT.to_string()]
    } else {
        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_bullets_and_strips_markup() {
        let answer = "- Usa comprensiones de listas\n\n  - Evita bucles anidados -\n   \nCachea resultados";
        assert_eq!(
            parse_suggestions(answer),
            vec![
                "Usa comprensiones de listas".to_string(),
                "Evita bucles anidados".to_string(),
                "Cachea resultados".to_string(),
            ]
        );
    }

    #[test]
    fn error_answer_becomes_single_suggestion() {
        let answer = "# ERROR: Timeout de Ollama. El modelo puede estar tardando mucho.";
        assert_eq!(parse_suggestions(answer), vec![answer.to_string()]);
    }

    #[test]
    fn empty_answer_yields_placeholder() {
        assert_eq!(parse_suggestions("\n  \n"), vec![NO_SUGGESTIONS_TEXT.to_string()]);
    }

    #[test]
    fn missing_response_text_is_not_an_error_marker() {
        assert!(!is_error_text(MISSING_RESPONSE_TEXT));
        assert!(is_error_text("# ERROR: boom"));
    }

    #[test]
    fn unreachable_service_returns_sentinel() {
        // Port 9 (discard) on loopback is closed on any sane test host.
        let client = OllamaClient::new(
            "http://127.0.0.1:9/api/generate",
            Duration::from_secs(2),
            "codellama",
            "codellama",
        );
        let text = client.complete("print(1)", AssistProfile::Optimize);
        assert!(text.starts_with(ERROR_MARKER), "unexpected answer: {}", text);
    }

    #[test]
    fn base_url_strips_api_path() {
        let client = OllamaClient::new(
            "http://localhost:11434/api/generate",
            Duration::from_secs(1),
            "a",
            "b",
        );
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.model_for(AssistProfile::Suggest), "b");
    }

    #[test]
    fn prompts_embed_code() {
        assert!(AssistProfile::Optimize.prompt("x = 1").ends_with("CÓDIGO:\nx = 1"));
        assert!(AssistProfile::Suggest.prompt("y").contains("viñetas"));
    }
}
