//! Bodiless GET strategy.

use crate::log_record::LogRecord;

use super::{Endpoint, Method, RequestDescription};

const JSON_MEDIA_TYPE: &str = "application/json";

/// Issues a GET to the configured URL for every record.
///
/// The record content is ignored, which suits ping-style notifications.
#[derive(Clone, Debug)]
pub struct GetRequestBuilder {
    endpoint: Endpoint,
}

impl GetRequestBuilder {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn build(&self, _record: &LogRecord) -> RequestDescription {
        self.endpoint
            .request(Method::Get)
            .with_header("Content-Type", JSON_MEDIA_TYPE)
            .with_header("Accept", JSON_MEDIA_TYPE)
    }
}
