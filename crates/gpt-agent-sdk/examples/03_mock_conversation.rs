use anyhow::Result;
use futures::StreamExt;
use gpt_agent_sdk::{AgentOptions, ConversationClient, Message, MockReply, MockTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Echoes the prompt back along with how much history was replayed
    let transport = MockTransport::from_fn(|request| {
        MockReply::text(format!(
            "You said '{}' ({} turns sent)",
            request.prompt().unwrap_or_default(),
            request.turns.len()
        ))
    });

    let mut client =
        ConversationClient::open_with_transport(AgentOptions::new(), transport.clone()).await?;

    for prompt in ["hello", "how are you?", "bye"] {
        client.query(prompt).await?;

        let mut response = client.receive_response()?;
        while let Some(message) = response.next().await {
            if let Message::Assistant(reply) = message? {
                println!("{}", reply.text());
            }
        }
    }

    client.close().await?;
    println!("Requests sent: {}", transport.requests().len());

    Ok(())
}
