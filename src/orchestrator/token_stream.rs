use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{ChatStream, ChatStreamChunk, ModelClientError};

enum Step {
    Cancelled,
    Next(Option<Result<ChatStreamChunk, ModelClientError>>),
}

/// Text fragments of a streamed reply, in arrival order.
///
/// Forward-only and finite: it ends on the final chunk, on stream
/// closure, after the first error, or when the token is cancelled. Ending
/// drops the underlying response, which closes the connection.
pub struct TokenStream {
    inner: Option<ChatStream>,
    cancel: CancellationToken,
    cancelled: bool,
}

impl TokenStream {
    pub fn new(inner: ChatStream, cancel: CancellationToken) -> Self {
        Self {
            inner: Some(inner),
            cancel,
            cancelled: false,
        }
    }

    /// A stream yielding `text` as its only fragment.
    pub fn from_text(text: impl Into<String>, cancel: CancellationToken) -> Self {
        let chunks: Vec<Result<ChatStreamChunk, ModelClientError>> = vec![
            Ok(ChatStreamChunk::content("", "", text)),
            Ok(ChatStreamChunk::finished("stop")),
        ];
        Self::new(Box::pin(futures::stream::iter(chunks)), cancel)
    }

    pub async fn next_fragment(&mut self) -> Option<Result<String, ModelClientError>> {
        loop {
            let inner = self.inner.as_mut()?;
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Step::Cancelled,
                next = inner.next() => Step::Next(next),
            };

            match step {
                Step::Cancelled => {
                    self.cancelled = true;
                    self.close();
                    return None;
                }
                Step::Next(None) => {
                    self.close();
                    return None;
                }
                Step::Next(Some(Err(e))) => {
                    self.close();
                    return Some(Err(e));
                }
                Step::Next(Some(Ok(chunk))) => {
                    if chunk.done {
                        self.close();
                    }
                    if let Some(text) = chunk.text() {
                        return Some(Ok(text.to_string()));
                    }
                }
            }
        }
    }

    pub fn close(&mut self) {
        self.inner = None;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&str]) -> ChatStream {
        let mut items: Vec<Result<ChatStreamChunk, ModelClientError>> = parts
            .iter()
            .map(|p| Ok(ChatStreamChunk::content("m", "t", *p)))
            .collect();
        items.push(Ok(ChatStreamChunk::finished("stop")));
        Box::pin(stream::iter(items))
    }

    async fn collect(mut s: TokenStream) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(fragment) = s.next_fragment().await {
            out.push(fragment.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn yields_fragments_in_order_and_skips_empty_ones() {
        let s = TokenStream::new(chunks(&["Hel", "", "lo"]), CancellationToken::new());
        assert_eq!(collect(s).await, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn ends_at_done_even_if_more_follows() {
        let items: Vec<Result<ChatStreamChunk, ModelClientError>> = vec![
            Ok(ChatStreamChunk::content("m", "t", "a")),
            Ok(ChatStreamChunk::finished("stop")),
            Ok(ChatStreamChunk::content("m", "t", "late")),
        ];
        let s = TokenStream::new(Box::pin(stream::iter(items)), CancellationToken::new());
        assert_eq!(collect(s).await, vec!["a"]);
    }

    #[tokio::test]
    async fn closure_without_done_is_a_normal_end() {
        let items: Vec<Result<ChatStreamChunk, ModelClientError>> =
            vec![Ok(ChatStreamChunk::content("m", "t", "x"))];
        let s = TokenStream::new(Box::pin(stream::iter(items)), CancellationToken::new());
        assert_eq!(collect(s).await, vec!["x"]);
    }

    #[tokio::test]
    async fn error_is_reported_once_then_stream_ends() {
        let items: Vec<Result<ChatStreamChunk, ModelClientError>> = vec![
            Ok(ChatStreamChunk::content("m", "t", "x")),
            Err(ModelClientError::Request("reset".into())),
            Ok(ChatStreamChunk::content("m", "t", "y")),
        ];
        let mut s = TokenStream::new(Box::pin(stream::iter(items)), CancellationToken::new());
        assert_eq!(s.next_fragment().await.unwrap().unwrap(), "x");
        assert!(s.next_fragment().await.unwrap().is_err());
        assert!(s.next_fragment().await.is_none());
        assert!(s.is_closed());
    }

    #[tokio::test]
    async fn cancellation_closes_a_pending_stream() {
        let token = CancellationToken::new();
        let mut s = TokenStream::new(Box::pin(stream::pending::<Result<ChatStreamChunk, ModelClientError>>()), token.clone());

        let canceller = token.clone();
        tokio::spawn(async move { canceller.cancel() });

        assert!(s.next_fragment().await.is_none());
        assert!(s.is_cancelled());
        assert!(s.is_closed());
    }

    #[tokio::test]
    async fn from_text_is_a_single_fragment() {
        let s = TokenStream::from_text("whole answer", CancellationToken::new());
        assert_eq!(collect(s).await, vec!["whole answer"]);
    }
}
