//! JSON-POST strategy.

use serde_json::Value;

use crate::{config::JsonPostConfig, log_record::LogRecord};

use super::{BuildError, Endpoint, Method, RequestBody, RequestDescription};

/// Posts a JSON object assembled from static fields and, optionally, the
/// record message.
#[derive(Clone, Debug)]
pub struct JsonPostBuilder {
    endpoint: Endpoint,
    config: JsonPostConfig,
}

impl JsonPostBuilder {
    pub fn new(endpoint: Endpoint, config: JsonPostConfig) -> Self {
        Self { endpoint, config }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Serialize the body for `record`.
    ///
    /// A configured `message_field` overrides a static field of the same
    /// name.
    pub fn build(&self, record: &LogRecord) -> Result<RequestDescription, BuildError> {
        let mut body = self.config.fields.clone();
        if let Some(key) = &self.config.message_field {
            body.insert(key.clone(), Value::String(record.message.clone()));
        }
        let data = serde_json::to_string(&Value::Object(body))?;
        Ok(self
            .endpoint
            .request(Method::Post)
            .with_header("Accept", "application/json")
            .with_body(RequestBody::Text {
                content_type: self.config.content_type.clone(),
                data,
            }))
    }
}
