//! Stream Renderer: folds fragments into the accumulated report and refreshes
//! the display after every textual fragment.

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::agent::{AgentError, StreamFragment};

/// Something that shows the report as it grows.
#[async_trait]
pub trait OutputDisplay: Send {
    /// Called with the whole accumulated text, never just the delta.
    /// Rendering waits for it, so a slow display slows the stream down.
    async fn refresh(&mut self, accumulated: &str);
}

/// Pulls `fragments` to exhaustion and returns the final text.
///
/// Textual fragments are appended verbatim, in arrival order, and each one
/// triggers exactly one `refresh`. Other fragments are skipped. An `Err`
/// aborts the render; whatever was already displayed stays displayed.
pub async fn render<S, D>(fragments: S, display: &mut D) -> Result<String, AgentError>
where
    S: Stream<Item = Result<StreamFragment, AgentError>>,
    D: OutputDisplay + ?Sized,
{
    let mut fragments = std::pin::pin!(fragments);
    let mut accumulated = String::new();

    while let Some(fragment) = fragments.next().await {
        if let Some(text) = fragment?.text() {
            accumulated.push_str(text);
            display.refresh(&accumulated).await;
        }
    }

    Ok(accumulated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[derive(Default)]
    struct RecordingDisplay {
        frames: Vec<String>,
    }

    #[async_trait]
    impl OutputDisplay for RecordingDisplay {
        async fn refresh(&mut self, accumulated: &str) {
            self.frames.push(accumulated.to_string());
        }
    }

    fn content(text: &str) -> Result<StreamFragment, AgentError> {
        Ok(StreamFragment::Content(text.to_string()))
    }

    #[tokio::test]
    async fn test_render_accumulates_in_order_with_one_refresh_per_fragment() {
        let mut display = RecordingDisplay::default();
        let fragments = stream::iter(vec![content("Hel"), content("lo "), content("World")]);

        let text = render(fragments, &mut display).await.unwrap();

        assert_eq!(text, "Hello World");
        assert_eq!(display.frames, vec!["Hel", "Hello ", "Hello World"]);
    }

    #[tokio::test]
    async fn test_render_skips_non_textual_fragments() {
        let mut display = RecordingDisplay::default();
        let fragments = stream::iter(vec![
            Ok(StreamFragment::ToolCall {
                name: "github_get_user".to_string(),
            }),
            content("Score: "),
            Ok(StreamFragment::ToolResult {
                name: "github_get_user".to_string(),
            }),
            content("80/100"),
        ]);

        let text = render(fragments, &mut display).await.unwrap();

        assert_eq!(text, "Score: 80/100");
        assert_eq!(display.frames.len(), 2);
    }

    #[tokio::test]
    async fn test_render_empty_stream() {
        let mut display = RecordingDisplay::default();
        let text = render(stream::iter(Vec::new()), &mut display).await.unwrap();
        assert_eq!(text, "");
        assert!(display.frames.is_empty());
    }

    #[tokio::test]
    async fn test_render_aborts_on_failure_and_keeps_displayed_prefix() {
        let mut display = RecordingDisplay::default();
        let fragments = stream::iter(vec![
            content("partial"),
            Err(AgentError::Api {
                status: 401,
                message: "invalid key".to_string(),
            }),
            content(" never shown"),
        ]);

        let err = render(fragments, &mut display).await.unwrap_err();

        assert!(matches!(err, AgentError::Api { status: 401, .. }));
        assert_eq!(display.frames, vec!["partial"]);
    }

    #[tokio::test]
    async fn test_render_preserves_fragment_bytes_verbatim() {
        let mut display = RecordingDisplay::default();
        let fragments = stream::iter(vec![content("  **bold**\n"), content("\t| a | b |\n")]);
        let text = render(fragments, &mut display).await.unwrap();
        assert_eq!(text, "  **bold**\n\t| a | b |\n");
    }
}
