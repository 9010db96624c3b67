use futures::StreamExt;
use gpt_agent_sdk::{
    query, AgentError, AgentOptions, ContentBlock, ConversationClient, Message, OpenAITransport,
    Transport, TransportRequest, Turn,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const HELLO_STREAM: &str = concat!(
    "event: response.created\n",
    "data: {\"type\":\"response.created\",\"sequence_number\":0,\"response\":{\"id\":\"resp_1\",\"object\":\"response\",\"status\":\"in_progress\",\"model\":\"gpt-5-codex\",\"usage\":null}}\n\n",
    "event: response.output_item.added\n",
    "data: {\"type\":\"response.output_item.added\",\"output_index\":0,\"item\":{\"type\":\"message\",\"id\":\"msg_1\",\"role\":\"assistant\",\"content\":[]}}\n\n",
    "data: {\"type\":\"response.content_part.added\",\"item_id\":\"msg_1\",\"output_index\":0,\"content_index\":0,\"part\":{\"type\":\"output_text\",\"text\":\"\"}}\n\n",
    ": keep-alive\n\n",
    "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"msg_1\",\"output_index\":0,\"content_index\":0,\"delta\":\"Hello\"}\n\n",
    "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"msg_1\",\"output_index\":0,\"content_index\":0,\"delta\":\" there\"}\n\n",
    "data: {\"type\":\"response.output_text.done\",\"item_id\":\"msg_1\",\"output_index\":0,\"content_index\":0,\"text\":\"Hello there\"}\n\n",
    "data: {\"type\":\"response.content_part.done\",\"item_id\":\"msg_1\",\"output_index\":0,\"content_index\":0}\n\n",
    "data: {\"type\":\"response.output_item.done\",\"output_index\":0,\"item\":{\"type\":\"message\",\"id\":\"msg_1\",\"role\":\"assistant\",\"content\":[]}}\n\n",
    "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"resp_1\",\"status\":\"completed\",\"model\":\"gpt-5-codex\",\"usage\":{\"input_tokens\":5,\"output_tokens\":2,\"total_tokens\":7}}}\n\n",
    "data: [DONE]\n\n",
);

fn options(server: &ServerGuard) -> AgentOptions {
    AgentOptions::new()
        .with_api_key("sk-test")
        .with_base_url(server.url())
}

async fn sse_mock(server: &mut ServerGuard, body: &str) -> mockito::Mock {
    server
        .mock("POST", "/responses")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await
}

async fn error_mock(server: &mut ServerGuard, status: usize, body: &str) -> mockito::Mock {
    server
        .mock("POST", "/responses")
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_header("retry-after", "7")
        .with_body(body)
        .create_async()
        .await
}

async fn send_hi(options: AgentOptions) -> gpt_agent_sdk::Result<Vec<Message>> {
    let mut stream = query("hi", options).await?;
    let mut messages = Vec::new();
    while let Some(message) = stream.next().await {
        messages.push(message?);
    }
    Ok(messages)
}

#[tokio::test]
async fn test_streamed_response_is_decoded() {
    let mut server = Server::new_async().await;
    let mock = sse_mock(&mut server, HELLO_STREAM).await;

    let messages = send_hi(options(&server)).await.unwrap();

    mock.assert_async().await;
    assert_eq!(messages.len(), 3);
    assert!(matches!(messages[0], Message::System(_)));
    assert_eq!(
        messages[1].as_assistant().unwrap().content,
        vec![ContentBlock::text("Hello there")]
    );

    let result = messages[2].as_result().unwrap();
    assert_eq!(result.session_id.as_deref(), Some("resp_1"));
    let usage = result.usage.as_ref().unwrap();
    assert_eq!(usage.input_tokens, Some(5));
    assert_eq!(usage.total_tokens, Some(7));
}

#[tokio::test]
async fn test_request_headers_and_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/responses")
        .match_header("authorization", "Bearer sk-test")
        .match_header("accept", "text/event-stream")
        .match_header("openai-organization", "org-1")
        .match_header("x-trace", "abc")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-5-codex",
            "stream": true,
            "temperature": 0.4,
            "input": [
                { "role": "system", "content": [{ "type": "input_text", "text": "Be brief." }] },
                { "role": "user", "content": [{ "type": "input_text", "text": "hi" }] }
            ],
            "text": { "format": { "type": "text" } }
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(HELLO_STREAM)
        .create_async()
        .await;

    let options = options(&server)
        .with_organization("org-1")
        .with_header("x-trace", "abc")
        .with_temperature(0.4)
        .with_system_prompt("Be brief.")
        .with_response_format("text");

    send_hi(options).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication_error() {
    let mut server = Server::new_async().await;
    let _mock = error_mock(&mut server, 401, r#"{"error":{"message":"Incorrect API key"}}"#).await;

    let error = send_hi(options(&server)).await.unwrap_err();

    assert!(error.is_authentication());
    assert!(error.to_string().contains("Incorrect API key"));
}

#[tokio::test]
async fn test_throttling_maps_to_rate_limit_error() {
    let mut server = Server::new_async().await;
    let _mock = error_mock(&mut server, 429, r#"{"error":{"message":"Rate limit reached"}}"#).await;

    match send_hi(options(&server)).await.unwrap_err() {
        AgentError::RateLimit {
            message,
            retry_after,
        } => {
            assert!(message.contains("Rate limit reached"));
            assert_eq!(retry_after, Some(Duration::from_secs(7)));
        }
        other => panic!("Expected RateLimit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_maps_to_api_error() {
    let mut server = Server::new_async().await;
    let _mock = error_mock(&mut server, 500, "upstream failure").await;

    let error = send_hi(options(&server)).await.unwrap_err();

    assert!(error.is_transport());
    assert!(matches!(error, AgentError::Api { status: 500, .. }));
}

#[tokio::test]
async fn test_unknown_event_ends_stream_with_error_message() {
    let mut server = Server::new_async().await;
    let body = concat!(
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hi\"}\n\n",
        "data: {\"type\":\"response.audio.delta\",\"delta\":\"AAAA\"}\n\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"status\":\"completed\"}}\n\n",
    );
    let _mock = sse_mock(&mut server, body).await;

    let messages = send_hi(options(&server)).await.unwrap();

    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].as_error().unwrap().code.as_deref(),
        Some("unrecognized_event")
    );
}

#[tokio::test]
async fn test_truncated_body_reports_incomplete_stream() {
    let mut server = Server::new_async().await;
    let _mock = sse_mock(
        &mut server,
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hi\"}\n\n",
    )
    .await;

    let messages = send_hi(options(&server)).await.unwrap();

    assert_eq!(
        messages.last().unwrap().as_error().unwrap().code.as_deref(),
        Some("incomplete_stream")
    );
}

#[tokio::test]
async fn test_conversation_over_http() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/responses")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::Regex("input_text".to_string()))
        .with_status(200)
        .with_body(HELLO_STREAM)
        .expect(2)
        .create_async()
        .await;

    let mut client = ConversationClient::open(options(&server)).await.unwrap();
    for prompt in ["hi", "again"] {
        client.query(prompt).await.unwrap();
        let mut response = client.receive_response().unwrap();
        while let Some(message) = response.next().await {
            message.unwrap();
        }
    }
    client.close().await.unwrap();

    mock.assert_async().await;
    assert_eq!(client.history().len(), 4);
    assert_eq!(client.history().turns()[3].text(), "Hello there");
}

/// Accepts one connection, sends the headers and a single SSE event, then
/// keeps the socket open without writing anything else.
async fn stalling_server() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 16 * 1024];
        let _ = socket.read(&mut request).await;

        let event = "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hi\"}\n\n";
        let head = format!(
            concat!(
                "HTTP/1.1 200 OK\r\n",
                "content-type: text/event-stream\r\n",
                "transfer-encoding: chunked\r\n\r\n",
                "{:x}\r\n{}\r\n"
            ),
            event.len(),
            event
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn test_stalled_stream_times_out_as_transport_error() {
    let (base_url, server) = stalling_server().await;
    let options = AgentOptions::new()
        .with_api_key("sk-test")
        .with_base_url(base_url)
        .with_request_timeout_ms(300);
    let mut transport = OpenAITransport::new(Arc::new(options.clone()));
    transport.connect().await.unwrap();

    let request = TransportRequest::new(Arc::new(options), vec![Turn::user("hi")]);
    let events: Vec<_> = transport.send(request).await.unwrap().collect().await;
    server.abort();

    assert_eq!(events.len(), 2);
    assert!(events[0].is_ok());
    let error = events[1].as_ref().unwrap_err();
    assert!(
        matches!(error, AgentError::Transport(message) if message.contains("timed out")),
        "Expected a timeout, got {:?}",
        error
    );
}
