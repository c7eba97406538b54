//! Manual smoke test against a running relay server.
//!
//! Posts a "ping" message to `/chat` and prints the streamed reply plus
//! the usage tail. Pass a model name as the first argument to override
//! the server default:
//!
//! ```bash
//! cargo run -p colloquy-api --example ping -- gpt-4o-mini
//! ```

use futures::StreamExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let model = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "gpt-4o-mini".to_string());

    let body = serde_json::json!({
        "messages": [
            {"role": "user", "content": "ping"}
        ],
        "model": model,
    });

    let response = reqwest::Client::new()
        .post("http://localhost:8000/chat")
        .json(&body)
        .send()
        .await?
        .error_for_status()?;

    let mut full_response = String::new();
    let mut usage_data: Option<serde_json::Value> = None;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let text = String::from_utf8_lossy(&chunk?).to_string();

        // The final chunk is the usage object; everything else is reply text
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) if value.get("type").and_then(|t| t.as_str()) == Some("usage") => {
                usage_data = Some(value);
            }
            _ => full_response.push_str(&text),
        }
    }

    println!("Response from /chat endpoint:");
    println!("{}", full_response.chars().take(100).collect::<String>());

    match usage_data {
        Some(data) => {
            println!("\n--- Usage ---");
            println!(
                "Cost: ${:.6}",
                data["usage"]["cost"].as_f64().unwrap_or(0.0)
            );
            println!("Total Tokens: {}", data["usage"]["total_tokens"]);
        }
        None => println!("\nUsage data not found in response."),
    }

    Ok(())
}
