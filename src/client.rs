//! Blocking HTTP client used by the delivery worker.
//!
//! Wraps a `ureq::Agent` for connection pooling. Every response body is
//! drained (up to a bound) before the response is dropped so the connection
//! returns to the pool, and generated attachments are removed after each
//! send whatever the outcome.

use std::io::{self, Read};
use std::time::Duration;

use thiserror::Error;
use ureq::{Agent, AgentBuilder};

use crate::{
    config::ConfigError,
    diagnostics::Diagnostics,
    request::{RequestBody, RequestDescription},
};

/// Upper bound on response bytes read back before a response is dropped.
const MAX_DRAIN_BYTES: u64 = 64 * 1024;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Inclusive range of HTTP status codes counted as delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusRange {
    pub min: u16,
    pub max: u16,
}

impl Default for StatusRange {
    fn default() -> Self {
        Self { min: 200, max: 299 }
    }
}

impl StatusRange {
    pub fn contains(&self, status: u16) -> bool {
        (self.min..=self.max).contains(&status)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::invalid(
                "success_status",
                format!("min {} exceeds max {}", self.min, self.max),
            ));
        }
        Ok(())
    }
}

/// Socket timeouts applied to every request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_TIMEOUT,
            read: DEFAULT_TIMEOUT,
            write: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientTimeouts {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("connect_timeout", self.connect),
            ("read_timeout", self.read),
            ("write_timeout", self.write),
        ] {
            if value.is_zero() {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        Ok(())
    }
}

/// Why a single delivery failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The server answered with a status outside the success range.
    #[error("unexpected status {code} {reason}")]
    Status { code: u16, reason: String },
    /// No usable response: connection failure, timeout or a malformed
    /// status line.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The request body could not be assembled.
    #[error("failed to read request body: {0}")]
    Body(#[from] io::Error),
}

/// Executes [`RequestDescription`]s and classifies the responses.
pub struct DeliveryClient {
    agent: Agent,
    success: StatusRange,
    diagnostics: Diagnostics,
}

impl DeliveryClient {
    pub fn new(timeouts: ClientTimeouts, success: StatusRange, diagnostics: Diagnostics) -> Self {
        let agent = AgentBuilder::new()
            .timeout_connect(timeouts.connect)
            .timeout_read(timeouts.read)
            .timeout_write(timeouts.write)
            .build();
        Self {
            agent,
            success,
            diagnostics,
        }
    }

    pub fn success_range(&self) -> StatusRange {
        self.success
    }

    /// Send `request`, returning the status code on success.
    ///
    /// Attachments are released before returning, on every path.
    pub fn send(&self, request: RequestDescription) -> Result<u16, DeliveryError> {
        let result = self.execute(&request);
        request.release(&self.diagnostics);
        result
    }

    fn execute(&self, request: &RequestDescription) -> Result<u16, DeliveryError> {
        let mut req = self.agent.request(request.method.as_str(), &request.url);
        for (key, value) in &request.headers {
            req = req.set(key, value);
        }
        let outcome = match &request.body {
            RequestBody::Empty => req.call(),
            RequestBody::Text { content_type, data } => {
                req.set("Content-Type", content_type).send_string(data)
            }
            RequestBody::Multipart(form) => {
                let bytes = form.encode()?;
                req.set("Content-Type", &form.content_type())
                    .send_bytes(&bytes)
            }
        };
        let response = match outcome {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                return Err(DeliveryError::Transport(err.to_string()));
            }
        };
        let code = response.status();
        let reason = response.status_text().to_owned();
        self.drain(response);
        if self.success.contains(code) {
            Ok(code)
        } else {
            Err(DeliveryError::Status { code, reason })
        }
    }

    fn drain(&self, response: ureq::Response) {
        let mut reader = response.into_reader().take(MAX_DRAIN_BYTES);
        if let Err(err) = io::copy(&mut reader, &mut io::sink()) {
            self.diagnostics
                .debug(format_args!("failed to drain response body: {err}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(199, false)]
    #[case(200, true)]
    #[case(204, true)]
    #[case(299, true)]
    #[case(300, false)]
    #[case(503, false)]
    fn default_range_is_2xx(#[case] status: u16, #[case] expected: bool) {
        assert_eq!(StatusRange::default().contains(status), expected);
    }

    #[test]
    fn single_status_range_is_valid() {
        let range = StatusRange { min: 204, max: 204 };
        assert!(range.validate().is_ok());
        assert!(range.contains(204));
        assert!(!range.contains(200));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = StatusRange { min: 300, max: 200 }
            .validate()
            .expect_err("inverted");
        assert!(err.to_string().contains("min 300 exceeds max 200"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let timeouts = ClientTimeouts {
            read: Duration::ZERO,
            ..ClientTimeouts::default()
        };
        let err = timeouts.validate().expect_err("zero read timeout");
        assert!(err.to_string().contains("read_timeout"));
    }

    #[test]
    fn unreachable_host_is_a_transport_failure() {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let client = DeliveryClient::new(
            ClientTimeouts {
                connect: Duration::from_millis(500),
                ..ClientTimeouts::default()
            },
            StatusRange::default(),
            Diagnostics::default(),
        );
        let request = RequestDescription::new(crate::request::Method::Get, format!("http://{addr}/"));
        assert!(matches!(
            client.send(request),
            Err(DeliveryError::Transport(_))
        ));
    }
}
