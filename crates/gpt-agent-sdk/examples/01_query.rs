use anyhow::Result;
use futures::StreamExt;
use gpt_agent_sdk::{query, AgentOptions, ContentBlock, Message};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = AgentOptions::new()
        .with_model("gpt-5-codex")
        .with_system_prompt("You are a concise assistant.")
        .with_max_output_tokens(400);

    let mut stream = query("Explain Rust's ownership model in three sentences.", options).await?;

    while let Some(message) = stream.next().await {
        match message? {
            Message::Assistant(reply) => {
                for block in &reply.content {
                    match block {
                        ContentBlock::Thinking { thinking, .. } => println!("[REASONING]\n{}\n", thinking),
                        ContentBlock::Text { text } => println!("{}", text),
                        _ => {}
                    }
                }
            }
            Message::Result(result) => {
                println!("\nDone in {} ms", result.duration_ms);
                if let Some(usage) = result.usage {
                    println!(
                        "Tokens: input={:?} output={:?}",
                        usage.input_tokens, usage.output_tokens
                    );
                }
            }
            Message::Error(error) => eprintln!("Stream error: {}", error.message),
            Message::System(_) => {}
        }
    }

    Ok(())
}
