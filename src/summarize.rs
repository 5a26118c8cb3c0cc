//! Summarizer: turns one day's commits into a structured summary.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::collect::CommitRecord;
use crate::config::LlmConfig;
use crate::llm::{self, LlmClient, LlmError, Message};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(alias = "summary")]
    pub summary_text: String,
    #[serde(default)]
    pub categories: BTreeMap<String, u32>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummarizeError {
    /// Worth retrying: rate limits, timeouts, unreachable endpoint.
    #[error("Transient summarizer failure: {0}")]
    Transient(String),
    #[error("Summarizer failure: {0}")]
    Fatal(String),
}

impl SummarizeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SummarizeError::Transient(_))
    }
}

impl From<LlmError> for SummarizeError {
    fn from(e: LlmError) -> Self {
        if e.is_transient() {
            SummarizeError::Transient(e.to_string())
        } else {
            SummarizeError::Fatal(e.to_string())
        }
    }
}

const TRANSIENT_KEYWORDS: &[&str] = &["api", "rate limit", "quota", "network", "timeout", "connection"];

/// Keyword fallback for errors that only carry a message: true when it looks retryable.
pub fn classify_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        commits: &[CommitRecord],
        date: NaiveDate,
    ) -> Result<Summary, SummarizeError>;
}

const SYSTEM_PROMPT: &str = "You summarize a developer's git commits for one day into a work log. \
Reply with a single JSON object and nothing else: \
{\"summary\": string, \"categories\": {category: commit count}, \"highlights\": [string]}. \
Use short lowercase category names such as feature, fix, refactor, docs, test, chore.";

pub struct LlmSummarizer {
    client: Box<dyn LlmClient>,
}

impl LlmSummarizer {
    pub fn new(client: Box<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        commits: &[CommitRecord],
        date: NaiveDate,
    ) -> Result<Summary, SummarizeError> {
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(build_prompt(commits, date)),
        ];
        let reply = self.client.chat(messages).await?;
        parse_summary(&reply)
    }
}

/// Stands in when no working summarizer could be configured, so the failure
/// only surfaces for days that actually have commits.
pub struct UnavailableSummarizer {
    error: SummarizeError,
}

impl UnavailableSummarizer {
    pub fn new(error: SummarizeError) -> Self {
        Self { error }
    }
}

#[async_trait::async_trait]
impl Summarizer for UnavailableSummarizer {
    async fn summarize(
        &self,
        _commits: &[CommitRecord],
        _date: NaiveDate,
    ) -> Result<Summary, SummarizeError> {
        Err(self.error.clone())
    }
}

/// Build the configured summarizer. Missing credentials are a fatal error.
pub fn create_summarizer(config: &LlmConfig) -> Result<LlmSummarizer, SummarizeError> {
    Ok(LlmSummarizer::new(llm::create_client(config)?))
}

/// The summarizer for an optional `[llm]` section. Configuration problems are
/// deferred to the first day that has commits to summarize.
pub fn from_config(config: Option<&LlmConfig>) -> Arc<dyn Summarizer> {
    let error = match config.map(create_summarizer) {
        Some(Ok(summarizer)) => return Arc::new(summarizer),
        Some(Err(e)) => e,
        None => SummarizeError::Fatal("No [llm] section in config".to_string()),
    };
    tracing::warn!("Summarizer unavailable: {error}");
    Arc::new(UnavailableSummarizer::new(error))
}

fn build_prompt(commits: &[CommitRecord], date: NaiveDate) -> String {
    let mut prompt = format!("Commits for {date} ({} total):\n", commits.len());
    for c in commits {
        prompt.push_str(&format!(
            "- [{}] {} {} (repo: {}, +{} -{}, {} file(s))\n",
            c.timestamp.format("%H:%M"),
            c.short_hash(),
            c.subject(),
            if c.repo_name.is_empty() { "-" } else { &c.repo_name },
            c.insertions,
            c.deletions,
            c.files_changed.len()
        ));
    }
    prompt
}

/// Parse the model's reply, tolerating a surrounding Markdown code fence.
pub fn parse_summary(reply: &str) -> Result<Summary, SummarizeError> {
    let body = strip_code_fence(reply);
    serde_json::from_str::<Summary>(body)
        .map_err(|e| SummarizeError::Fatal(format!("Unparsable summary ({e}): {}", truncate(body, 200))))
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "json") on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::testing::commit;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_classify_message_keywords() {
        for msg in [
            "Rate limit exceeded",
            "quota exhausted",
            "Network unreachable",
            "request TIMEOUT",
            "connection reset by peer",
            "API failure",
        ] {
            assert!(classify_message(msg), "{msg}");
        }
        for msg in ["invalid JSON in reply", "disk full", ""] {
            assert!(!classify_message(msg), "{msg}");
        }
    }

    #[test]
    fn test_parse_summary_plain_and_fenced() {
        let plain = r#"{"summary": "Built X", "categories": {"feature": 2}, "highlights": ["X"]}"#;
        let s = parse_summary(plain).unwrap();
        assert_eq!(s.summary_text, "Built X");
        assert_eq!(s.categories["feature"], 2);

        let fenced = format!("```json\n{plain}\n```\n");
        assert_eq!(parse_summary(&fenced).unwrap(), s);
        let bare_fence = format!("```\n{plain}\n```");
        assert_eq!(parse_summary(&bare_fence).unwrap(), s);
    }

    #[test]
    fn test_parse_summary_defaults_missing_fields() {
        let s = parse_summary(r#"{"summary": "only text"}"#).unwrap();
        assert!(s.categories.is_empty());
        assert!(s.highlights.is_empty());
    }

    #[test]
    fn test_parse_summary_garbage_is_fatal() {
        let err = parse_summary("Sure! Here is your summary.").unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_build_prompt_lists_commits() {
        let mut c = commit("abcdef123", "2025-06-10T14:30:00+00:00", "feat: export\n\nbody");
        c.repo_name = "api".into();
        let prompt = build_prompt(&[c], NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        assert!(prompt.starts_with("Commits for 2025-06-10 (1 total)"));
        assert!(prompt.contains("- [14:30] abcdef1 feat: export (repo: api, +10 -2, 1 file(s))"));
    }

    async fn summarize_against(server: &MockServer) -> Result<Summary, SummarizeError> {
        let cfg = crate::llm::test_config("openai", &server.uri());
        let summarizer = create_summarizer(&cfg).unwrap();
        let commits = [commit("a1", "2025-06-10T10:00:00+00:00", "fix: bug")];
        summarizer
            .summarize(&commits, NaiveDate::from_ymd_opt(2025, 6, 10).unwrap())
            .await
    }

    #[tokio::test]
    async fn test_http_429_maps_to_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        assert!(summarize_against(&server).await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn test_http_400_maps_to_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("unknown model"))
            .mount(&server)
            .await;
        let err = summarize_against(&server).await.unwrap_err();
        assert!(matches!(err, SummarizeError::Fatal(ref m) if m.contains("unknown model")));
    }

    #[tokio::test]
    async fn test_fenced_reply_is_parsed() {
        let server = MockServer::start().await;
        let reply = "```json\n{\"summary\": \"Fixed a bug\", \"categories\": {\"fix\": 1}, \"highlights\": []}\n```";
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": reply}}]
            })))
            .mount(&server)
            .await;
        let summary = summarize_against(&server).await.unwrap();
        assert_eq!(summary.summary_text, "Fixed a bug");
        assert_eq!(summary.categories["fix"], 1);
    }

    #[tokio::test]
    async fn test_unavailable_summarizer_repeats_its_error() {
        let s = UnavailableSummarizer::new(SummarizeError::Fatal("No [llm] section".into()));
        let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let err = s.summarize(&[], date).await.unwrap_err();
        assert_eq!(err, SummarizeError::Fatal("No [llm] section".into()));
    }

    #[tokio::test]
    async fn test_from_config_without_llm_section() {
        let s = from_config(None);
        let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let commits = [commit("a1", "2025-06-10T10:00:00+00:00", "fix: bug")];
        let err = s.summarize(&commits, date).await.unwrap_err();
        assert!(err.to_string().contains("No [llm] section"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let mut cfg = crate::llm::test_config("openai", "http://localhost:1");
        cfg.api_key = None;
        let err = create_summarizer(&cfg).err().unwrap();
        assert!(!err.is_transient());
    }
}
