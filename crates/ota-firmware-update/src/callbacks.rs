//! Callbacks into the transport and status reporting layers.

use std::fmt;

use crate::status::FirmwareState;

/// Publishes a request for the given chunk. `false` when it could not be sent.
pub type RequestChunkFn = Box<dyn FnMut(u32) -> bool + Send>;

/// Reports a firmware state with an optional human-readable detail.
pub type ReportStatusFn = Box<dyn FnMut(FirmwareState, Option<&str>) -> bool + Send>;

/// Called once after the outcome of an update has been delivered.
pub type FinishFn = Box<dyn FnMut() -> bool + Send>;

/// Callbacks bound to an update handler for its lifetime.
///
/// An unset callback makes every update fail at start.
#[derive(Default)]
pub struct HandlerCallbacks {
    request_chunk: Option<RequestChunkFn>,
    report_status: Option<ReportStatusFn>,
    finish: Option<FinishFn>,
}

impl HandlerCallbacks {
    /// Create a callbacks builder.
    #[must_use]
    pub fn builder() -> HandlerCallbacksBuilder {
        HandlerCallbacksBuilder::default()
    }

    /// Name of the first unset callback.
    #[must_use]
    pub fn missing(&self) -> Option<&'static str> {
        if self.request_chunk.is_none() {
            Some("request_chunk")
        } else if self.report_status.is_none() {
            Some("report_status")
        } else if self.finish.is_none() {
            Some("finish")
        } else {
            None
        }
    }

    pub(crate) fn request_chunk(&mut self, chunk: u32) -> bool {
        self.request_chunk.as_mut().is_some_and(|f| f(chunk))
    }

    pub(crate) fn report_status(&mut self, state: FirmwareState, detail: Option<&str>) -> bool {
        self.report_status
            .as_mut()
            .is_some_and(|f| f(state, detail))
    }

    pub(crate) fn finish(&mut self) -> bool {
        self.finish.as_mut().is_some_and(|f| f())
    }
}

impl fmt::Debug for HandlerCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerCallbacks")
            .field("request_chunk", &self.request_chunk.is_some())
            .field("report_status", &self.report_status.is_some())
            .field("finish", &self.finish.is_some())
            .finish()
    }
}

/// Builder for `HandlerCallbacks`.
#[derive(Default)]
pub struct HandlerCallbacksBuilder {
    callbacks: HandlerCallbacks,
}

impl HandlerCallbacksBuilder {
    /// Set the chunk request callback.
    #[must_use]
    pub fn request_chunk(mut self, callback: impl FnMut(u32) -> bool + Send + 'static) -> Self {
        self.callbacks.request_chunk = Some(Box::new(callback));
        self
    }

    /// Set the status report callback.
    #[must_use]
    pub fn report_status(
        mut self,
        callback: impl FnMut(FirmwareState, Option<&str>) -> bool + Send + 'static,
    ) -> Self {
        self.callbacks.report_status = Some(Box::new(callback));
        self
    }

    /// Set the finish callback.
    #[must_use]
    pub fn finish(mut self, callback: impl FnMut() -> bool + Send + 'static) -> Self {
        self.callbacks.finish = Some(Box::new(callback));
        self
    }

    /// Finish the callbacks.
    #[must_use]
    pub fn build(self) -> HandlerCallbacks {
        self.callbacks
    }
}

impl fmt::Debug for HandlerCallbacksBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.callbacks.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reports_first_unset() {
        assert_eq!(HandlerCallbacks::default().missing(), Some("request_chunk"));

        let callbacks = HandlerCallbacks::builder()
            .request_chunk(|_| true)
            .report_status(|_, _| true)
            .build();
        assert_eq!(callbacks.missing(), Some("finish"));

        let callbacks = HandlerCallbacks::builder()
            .request_chunk(|_| true)
            .report_status(|_, _| true)
            .finish(|| true)
            .build();
        assert_eq!(callbacks.missing(), None);
    }

    #[test]
    fn test_unset_callbacks_report_failure() {
        let mut callbacks = HandlerCallbacks::default();
        assert!(!callbacks.request_chunk(0));
        assert!(!callbacks.report_status(FirmwareState::Failed, None));
        assert!(!callbacks.finish());
    }
}
