use anyhow::{bail, Result};
use serde_json::json;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";

/// Minimal client for an OpenAI-compatible completions server running in
/// front of the same model, for comparing against in-process output. The
/// server is launched separately; this program only talks to it.
#[tokio::main]
async fn main() -> Result<()> {
    let base_url =
        std::env::var("COMPLETIONS_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let model = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string());
    let prompt = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "The capital of France is".to_string());

    let body = json!({
        "model": model,
        "prompt": prompt,
        "max_tokens": 64,
        "temperature": 0.8,
        "top_p": 0.95,
    });

    let client = reqwest::Client::new();
    let mut request = client.post(format!("{}/completions", base_url)).json(&body);
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        request = request.bearer_auth(key);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        bail!("server returned {}", response.status());
    }
    let payload: serde_json::Value = response.json().await?;
    let text = payload["choices"][0]["text"].as_str().unwrap_or_default();

    println!("Prompt: {}", prompt);
    println!("{}", "-".repeat(40));
    println!("{}", text.trim());
    Ok(())
}
