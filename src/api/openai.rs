use crate::config::Config;
use crate::{logi, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";
const MAX_PROMPT_CHARS: usize = 60_000;
const REQUEST_TIMEOUT_S: u64 = 180;

/// One chat turn pair sent to the Responses API.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub json_mode: bool,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

fn trim_copy_utf8_safe(input: &str, max_bytes: usize) -> String {
    if input.len() <= max_bytes {
        return input.to_string();
    }

    let mut cut = max_bytes.min(input.len());
    while cut > 0 && !input.is_char_boundary(cut) {
        cut -= 1;
    }
    input[..cut].to_string()
}

pub(crate) fn openai_extract_output_text(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;

    if let Some(err) = root.get("error").filter(|e| !e.is_null()) {
        if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error message: {}", msg));
        }
        if let Some(code) = err.get("code").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error code: {}", code));
        }
        return None;
    }

    let output = root.get("output")?.as_array()?;
    let mut text = String::new();
    for item in output {
        let Some(content) = item.get("content").and_then(|v| v.as_array()) else {
            continue;
        };
        for entry in content {
            if entry.get("type").and_then(|v| v.as_str()) == Some("output_text") {
                if let Some(part) = entry.get("text").and_then(|v| v.as_str()) {
                    text.push_str(part);
                }
            }
        }
    }

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Returns `Ok(None)` when the key is missing or the API answered with
/// no usable text; callers fall back to templates.
pub async fn openai_complete(
    client: &Client,
    cfg: &Config,
    request: &CompletionRequest<'_>,
) -> Result<Option<String>> {
    if !cfg.has_openai() {
        return Ok(None);
    }

    let user = trim_copy_utf8_safe(request.user, MAX_PROMPT_CHARS);
    let mut body = json!({
        "model": cfg.api.openai_model,
        "input": [
            {"role": "system", "content": request.system},
            {"role": "user", "content": user},
        ],
        "max_output_tokens": request.max_output_tokens,
        "temperature": request.temperature,
    });
    if request.json_mode {
        body["text"] = json!({"format": {"type": "json_object"}});
    }

    let resp = client
        .post(RESPONSES_URL)
        .bearer_auth(&cfg.api.openai_api_key)
        .json(&body)
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_S))
        .send()
        .await
        .context("OpenAI request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        logw(format!("OpenAI HTTP {}", status.as_u16()));
        if !raw.is_empty() {
            let snippet = raw.chars().take(800).collect::<String>();
            logw(format!("OpenAI raw body: {}", snippet));
        }
        return Ok(None);
    }

    match openai_extract_output_text(&raw) {
        Some(text) => {
            logi(format!("OpenAI reply received ({} chars)", text.chars().count()));
            Ok(Some(text))
        }
        None => {
            logw("OpenAI response parse failed.");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_text_parts_are_joined() {
        let raw = r#"{"output":[
            {"type":"reasoning","content":[]},
            {"type":"message","content":[
                {"type":"output_text","text":"{\"sections\":"},
                {"type":"output_text","text":"[]}"}
            ]}
        ]}"#;
        assert_eq!(
            openai_extract_output_text(raw).as_deref(),
            Some("{\"sections\":[]}")
        );
    }

    #[test]
    fn error_payload_yields_none() {
        let raw = r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#;
        assert!(openai_extract_output_text(raw).is_none());
        assert!(openai_extract_output_text("not json").is_none());
    }

    #[test]
    fn null_error_field_is_ignored() {
        let raw = r#"{"error":null,"output":[{"content":[{"type":"output_text","text":"hola"}]}]}"#;
        assert_eq!(openai_extract_output_text(raw).as_deref(), Some("hola"));
    }

    #[test]
    fn trimming_respects_char_boundaries() {
        let s = "añoñ";
        let cut = trim_copy_utf8_safe(s, 2);
        assert_eq!(cut, "a");
        assert_eq!(trim_copy_utf8_safe(s, 100), s);
    }

    #[tokio::test]
    async fn missing_key_short_circuits() {
        let cfg = Config::default();
        let client = Client::new();
        let req = CompletionRequest {
            system: "s",
            user: "u",
            json_mode: false,
            max_output_tokens: 10,
            temperature: 0.7,
        };
        assert!(openai_complete(&client, &cfg, &req).await.unwrap().is_none());
    }
}
