//! Streams an assistant reply for a conversation.

use std::sync::Arc;

use futures::{Stream, StreamExt, stream::BoxStream};

use super::completion::{ChatMessage, ChatRequest, ModelBackend, ModelError};
use crate::internal::session::Message;

/// Text fragments of a reply, ended early by a [`ModelError`] item on failure.
pub type FragmentStream = BoxStream<'static, Result<String, ModelError>>;

/// System instruction with the memory anchor appended as a delimited block.
///
/// Returns `None` when the result would be blank.
pub fn effective_system(system_prompt: &str, memory_anchor: Option<&str>) -> Option<String> {
    let mut system = system_prompt.to_string();
    if let Some(anchor) = memory_anchor
        && !anchor.trim().is_empty()
    {
        system.push_str("\n\n=== PERSISTENT CONTEXT ANCHOR ===\n");
        system.push_str(anchor);
        system.push_str("\n=================================");
    }
    (!system.trim().is_empty()).then_some(system)
}

/// Formats history for the model and relays its streamed output.
#[derive(Clone)]
pub struct ChatStreamOrchestrator {
    backend: Arc<dyn ModelBackend>,
}

impl ChatStreamOrchestrator {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    /// Stream the reply to `history`.
    ///
    /// Nothing is sent until the stream is first polled. Empty fragments are
    /// dropped. Dropping the stream stops reading but does not abort the
    /// remote call.
    pub fn stream(
        &self,
        history: &[Message],
        model: &str,
        system_prompt: &str,
        memory_anchor: Option<&str>,
    ) -> FragmentStream {
        let request = ChatRequest::new(model, history.iter().map(ChatMessage::from).collect())
            .with_system(effective_system(system_prompt, memory_anchor))
            .streaming();
        fragments(Arc::clone(&self.backend), request).boxed()
    }
}

fn fragments(
    backend: Arc<dyn ModelBackend>,
    request: ChatRequest,
) -> impl Stream<Item = Result<String, ModelError>> + Send + 'static {
    async_stream::try_stream! {
        let mut parts = backend.chat_stream(request).await?;
        while let Some(part) = parts.next().await {
            match part?.text {
                Some(text) if !text.is_empty() => {
                    yield text;
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        internal::{ai::completion::ChatContent, session::Attachment},
        utils::test::ScriptedModel,
    };

    #[test]
    fn test_effective_system() {
        assert_eq!(effective_system("", None), None);
        assert_eq!(effective_system("  ", Some("")), None);
        assert_eq!(effective_system("Be brief", None).as_deref(), Some("Be brief"));
        assert_eq!(
            effective_system("Be brief", Some("Goal: ship v1")).as_deref(),
            Some(
                "Be brief\n\n=== PERSISTENT CONTEXT ANCHOR ===\nGoal: ship v1\n================================="
            )
        );
        assert_eq!(
            effective_system("", Some("Goal")).as_deref(),
            Some("\n\n=== PERSISTENT CONTEXT ANCHOR ===\nGoal\n=================================")
        );
    }

    #[tokio::test]
    async fn test_fragments_accumulate_in_order() {
        let model = Arc::new(ScriptedModel::new().with_fragments(["Hel", "", "lo", " world"]));
        let orchestrator = ChatStreamOrchestrator::new(model.clone());

        let fragments: Vec<_> = orchestrator
            .stream(&[Message::user("Hi")], "claude-sonnet-4-5", "", None)
            .collect()
            .await;

        let fragments: Vec<String> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(fragments, ["Hel", "lo", " world"]);
        assert_eq!(fragments.concat(), "Hello world");
    }

    #[tokio::test]
    async fn test_model_is_called_lazily() {
        let model = Arc::new(ScriptedModel::new().with_fragments(["x"]));
        let orchestrator = ChatStreamOrchestrator::new(model.clone());

        let mut stream = orchestrator.stream(&[Message::user("Hi")], "m", "", None);
        assert_eq!(model.stream_calls(), 0);

        assert_eq!(stream.next().await.unwrap().unwrap(), "x");
        assert_eq!(model.stream_calls(), 1);
    }

    #[tokio::test]
    async fn test_request_carries_system_and_file_parts() {
        let model = Arc::new(ScriptedModel::new().with_fragments(["ok"]));
        let orchestrator = ChatStreamOrchestrator::new(model.clone());
        let history = vec![Message::user("look").with_attachments(vec![Attachment {
            name: "a.png".into(),
            mime_type: "image/png".into(),
            remote_locator: "~/up/1_a.png".into(),
            size: 1,
        }])];

        let _: Vec<_> = orchestrator
            .stream(&history, "claude-opus-4-5", "Be kind", Some("Goal: x"))
            .collect()
            .await;

        let request = model.requests().pop().unwrap();
        assert!(request.stream);
        assert_eq!(request.model, "claude-opus-4-5");
        assert!(request.system.unwrap().contains("=== PERSISTENT CONTEXT ANCHOR ===\nGoal: x"));
        assert!(matches!(&request.messages[0].content, ChatContent::Parts(parts) if parts.len() == 2));
    }

    #[tokio::test]
    async fn test_failure_to_start_is_single_error_item() {
        let model = Arc::new(ScriptedModel::new().failing_stream());
        let orchestrator = ChatStreamOrchestrator::new(model);

        let items: Vec<_> = orchestrator
            .stream(&[Message::user("Hi")], "m", "", None)
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn test_midstream_failure_ends_sequence() {
        let model = Arc::new(
            ScriptedModel::new()
                .with_fragments(["par", "tial"])
                .failing_after_fragments(),
        );
        let orchestrator = ChatStreamOrchestrator::new(model);

        let items: Vec<_> = orchestrator
            .stream(&[Message::user("Hi")], "m", "", None)
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), "par");
        assert!(items[2].is_err());
    }
}
