//! Error log records.

use std::time::SystemTime;

use opentelemetry::logs::{AnyValue, LogRecord, Logger, Severity};
use opentelemetry::Context;

use super::semconv::{EVENT_NAME, EXCEPTION_MESSAGE, EXCEPTION_TYPE};
use super::TelemetryHandler;
use crate::core::{HandlerError, Request};

/// `event.name` of the emitted records.
pub const REQUEST_ERROR_EVENT: &str = "http.server.request.error";

/// Emits one ERROR record per failed request, correlated with the request's
/// span. Successful requests produce nothing.
pub struct Logs<L> {
    logger: L,
}

impl<L: Logger> Logs<L> {
    pub fn new(logger: L) -> Self {
        Self { logger }
    }
}

impl<L> TelemetryHandler for Logs<L>
where
    L: Logger + Send + Sync,
{
    fn name(&self) -> &'static str {
        "logs"
    }

    fn on_error(&self, error: &HandlerError, _request: &Request, context: &Context) {
        let message = error.to_string();
        let now = SystemTime::now();

        let mut record = self.logger.create_log_record();
        record.set_timestamp(now);
        record.set_observed_timestamp(now);
        record.set_severity_number(Severity::Error);
        record.set_severity_text("ERROR");
        record.set_body(AnyValue::from(message.clone()));
        record.add_attribute(EVENT_NAME, REQUEST_ERROR_EVENT);
        record.add_attribute(EXCEPTION_TYPE, error.type_name());
        record.add_attribute(EXCEPTION_MESSAGE, message);

        // The SDK stamps the record with the span of the current context.
        let _guard = context.clone().attach();
        self.logger.emit(record);
    }
}
