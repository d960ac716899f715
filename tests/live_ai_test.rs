//! Tests against the real Anthropic API
//!
//! Run with `cargo test --features test-live-ai` and `ANTHROPIC_API_KEY` set.
#![cfg(feature = "test-live-ai")]

use std::sync::Arc;

use anchorchat::internal::{
    ai::{
        ChatStreamOrchestrator, MemoryAnchorDistiller, TitleGenerator,
        anchor::MAX_ANCHOR_WORDS,
        providers::anthropic::{AnthropicBackend, CLAUDE_HAIKU_4_5, Client},
        title::FALLBACK_TITLE,
    },
    session::Message,
};
use futures::StreamExt;

fn backend() -> Arc<AnthropicBackend> {
    let client = Client::from_env().expect("ANTHROPIC_API_KEY must be set");
    Arc::new(AnthropicBackend::new(client))
}

#[tokio::test]
async fn test_live_stream() {
    let orchestrator = ChatStreamOrchestrator::new(backend());
    let mut stream = orchestrator.stream(
        &[Message::user("Reply with the single word: pong")],
        CLAUDE_HAIKU_4_5,
        "",
        None,
    );

    let mut reply = String::new();
    while let Some(fragment) = stream.next().await {
        reply.push_str(&fragment.unwrap());
    }
    assert!(reply.to_lowercase().contains("pong"), "reply: {reply}");
}

#[tokio::test]
async fn test_live_title_and_anchor() {
    let backend = backend();
    let title = TitleGenerator::new(backend.clone())
        .generate_title("Help me plan a three day trip to Kyoto in April")
        .await;
    assert_ne!(title, FALLBACK_TITLE);
    assert!(!title.contains('"'));

    let anchor = MemoryAnchorDistiller::new(backend)
        .update_anchor(
            None,
            &[
                Message::user("I want to build a CLI chat client in Rust"),
                Message::assistant("Start with clap for arguments and tokio for async I/O."),
            ],
        )
        .await;
    assert!(!anchor.is_empty());
    assert!(anchor.split_whitespace().count() <= MAX_ANCHOR_WORDS);
}
