use crate::config::StoryConfig;
use crate::story_plan::StoryPlan;
use crate::{logi, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;

const MIN_PARAGRAPHS: usize = 5;
const MAX_PARAGRAPHS: usize = 8;

fn openai_extract_output_text(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;

    if let Some(err) = root.get("error") {
        if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error message: {}", msg));
        }
        if let Some(typ) = err.get("type").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error type: {}", typ));
        }
        if let Some(code) = err.get("code").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error code: {}", code));
        }
        return None;
    }

    let output = root.get("output")?.as_array()?;
    for item in output {
        let content = item.get("content").and_then(|v| v.as_array());
        if let Some(content) = content {
            for entry in content {
                let typ = entry.get("type").and_then(|v| v.as_str());
                let text = entry.get("text").and_then(|v| v.as_str());
                if typ == Some("output_text") {
                    if let Some(text) = text {
                        return Some(text.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Ask the model for a complete short story. Soft failures (HTTP error,
/// unparseable body) log the response and return an empty plan so the
/// caller decides whether to abort the job.
pub async fn openai_write_story(client: &Client, cfg: &StoryConfig) -> Result<StoryPlan> {
    let prompt = format!(
        "Write a short narrated story about: {}.\n\nRULES:\n- The story is read aloud over stock images, so keep the language vivid and concrete.\n- Split the story into {}-{} paragraphs of 2-4 sentences each; each paragraph must stand alone as one narrated scene.\n- Give it a short, catchy title (under 60 characters, no quotes).\n- Return STRICT JSON with this shape ONLY:\n  {{\"title\":\"...\",\"paragraphs\":[\"...\", ...]}}\n",
        cfg.topic, MIN_PARAGRAPHS, MAX_PARAGRAPHS
    );

    let body = json!({
        "model": cfg.model,
        "input": [
            {"role": "system", "content": "You are a helpful assistant designed to output JSON."},
            {"role": "user", "content": prompt},
        ],
        "text": {"format": {"type": "json_object"}},
    });

    let resp = client
        .post("https://api.openai.com/v1/responses")
        .bearer_auth(&cfg.api_key)
        .json(&body)
        .timeout(std::time::Duration::from_secs(600))
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
        return Ok(StoryPlan::default());
    }

    let out_text = match openai_extract_output_text(&raw) {
        Some(text) => text,
        None => {
            logw("OpenAI response parse failed.".to_string());
            if !raw.is_empty() {
                let snippet = raw.chars().take(800).collect::<String>();
                logw(format!("OpenAI raw body: {}", snippet));
            }
            return Ok(StoryPlan::default());
        }
    };

    let plan = StoryPlan::from_json(&out_text)?;
    logi(format!(
        "OpenAI story received: \"{}\" ({} paragraphs)",
        plan.title,
        plan.paragraphs.len()
    ));
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_output_text() {
        let raw = r#"{"output":[{"content":[{"type":"output_text","text":"{\"title\":\"T\",\"paragraphs\":[\"a\"]}"}]}]}"#;
        let text = openai_extract_output_text(raw).unwrap();
        let plan = StoryPlan::from_json(&text).unwrap();
        assert_eq!(plan.title, "T");
    }

    #[test]
    fn error_body_yields_none() {
        let raw = r#"{"error":{"message":"quota exceeded","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        assert!(openai_extract_output_text(raw).is_none());
    }
}
