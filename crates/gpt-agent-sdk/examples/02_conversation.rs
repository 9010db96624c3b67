use anyhow::Result;
use futures::StreamExt;
use gpt_agent_sdk::{AgentOptions, ConversationClient, Message};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = AgentOptions::new().with_model("gpt-5-codex");
    let mut client = ConversationClient::open(options).await?;

    let prompts = [
        "Pick a number between 1 and 10 and remember it.",
        "Multiply the number you picked by 7.",
        "What number did you pick originally?",
    ];

    for prompt in prompts {
        println!("> {}", prompt);
        client.query(prompt).await?;

        let mut response = client.receive_response()?;
        while let Some(message) = response.next().await {
            match message? {
                Message::Assistant(reply) => println!("{}", reply.text()),
                Message::Error(error) => eprintln!("Stream error: {}", error.message),
                _ => {}
            }
        }
        println!();
    }

    println!("History holds {} turns", client.history().len());
    client.close().await?;

    Ok(())
}
