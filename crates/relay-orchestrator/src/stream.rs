//! Pull-based stream of orchestration progress.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, Stream, StreamExt};

use crate::error::{OrchestratorError, Result};
use crate::event::{EngineResult, IntermediateEvent, Step};

type BoxedSteps<'a> = Pin<Box<dyn Stream<Item = Result<Step>> + Send + 'a>>;

/// Everything a run produced, gathered by [`MessageStream::collect`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Intermediate events in emission order.
    pub events: Vec<IntermediateEvent>,
    /// The terminal result.
    pub result: EngineResult,
}

/// Live view of one `handle_message` run.
///
/// Yields [`Step::Event`] items as they happen and ends with exactly one
/// [`Step::Finished`], or with an error. Nothing runs unless the stream is
/// polled. Dropping it early leaves the engine as of its last committed step.
#[must_use = "streams do nothing unless polled"]
pub struct MessageStream<'a> {
    inner: BoxedSteps<'a>,
    done: bool,
}

impl<'a> MessageStream<'a> {
    pub(crate) fn new(inner: impl Stream<Item = Result<Step>> + Send + 'a) -> Self {
        Self {
            inner: Box::pin(inner),
            done: false,
        }
    }

    pub(crate) fn failed(error: OrchestratorError) -> Self {
        Self::new(stream::iter(vec![Err(error)]))
    }

    /// Pulls the next step. Returns `None` once the run is over.
    pub async fn next_step(&mut self) -> Option<Result<Step>> {
        self.next().await
    }

    /// Drains the remaining events and returns the terminal result.
    pub async fn finish(mut self) -> Result<EngineResult> {
        while let Some(step) = self.next().await {
            if let Step::Finished(result) = step? {
                return Ok(result);
            }
        }
        Err(OrchestratorError::StreamExhausted)
    }

    /// Runs to completion, keeping every event.
    pub async fn collect(mut self) -> Result<RunSummary> {
        let mut events = Vec::new();
        while let Some(step) = self.next().await {
            match step? {
                Step::Event(event) => events.push(event),
                Step::Finished(result) => return Ok(RunSummary { events, result }),
            }
        }
        Err(OrchestratorError::StreamExhausted)
    }
}

impl Stream for MessageStream<'_> {
    type Item = Result<Step>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        let polled = self.inner.as_mut().poll_next(cx);
        if let Poll::Ready(item) = &polled {
            if matches!(item, None | Some(Err(_)) | Some(Ok(Step::Finished(_)))) {
                self.done = true;
            }
        }
        polled
    }
}

impl std::fmt::Debug for MessageStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
