use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, instrument};

use super::{Engine, EngineCommand, Scenario};
use crate::state::RawState;
use crate::transport::{HttpTransport, TransportError};

/// Headless engine server reached over HTTP.
///
/// - `POST /api/reset` with the scenario options as JSON
/// - `POST /api/step` with a command line as plain text
///
/// Both answer with the next snapshot.
#[derive(Debug)]
pub struct HttpEngine {
    transport: HttpTransport,
    timeout: Duration,
    live: bool,
}

impl HttpEngine {
    pub const RESET_ENDPOINT: &'static str = "/api/reset";
    pub const STEP_ENDPOINT: &'static str = "/api/step";
    const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<HttpEngine, TransportError> {
        Ok(HttpEngine {
            transport: HttpTransport::new(base_url)?,
            timeout,
            live: false,
        })
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }
}

impl Engine for HttpEngine {
    #[instrument(skip_all, fields(url = %self.transport.base_url()))]
    fn reset(&mut self, scenario: Option<&Scenario>) -> Result<RawState, TransportError> {
        let body = scenario.map_or_else(|| json!({}), Scenario::to_json);
        let value = self
            .transport
            .post_json(Self::RESET_ENDPOINT, &body, self.timeout)?;
        if !value.as_object().is_some_and(|fields| !fields.is_empty()) {
            return Err(TransportError::Parse(format!("no game state in reset answer: {value}")));
        }
        self.live = true;
        info!("game started");
        Ok(RawState::new(value))
    }

    fn submit(&mut self, command: EngineCommand) -> Result<RawState, TransportError> {
        let value = self
            .transport
            .post_text(Self::STEP_ENDPOINT, &command.to_string(), self.timeout)?;
        Ok(RawState::new(value))
    }

    fn shutdown(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        let concede = EngineCommand::Concede.to_string();
        match self
            .transport
            .post_text(Self::STEP_ENDPOINT, &concede, Self::SHUTDOWN_TIMEOUT)
        {
            Ok(_) => debug!("engine acknowledged concede"),
            Err(e) => debug!("concede not acknowledged: {e}"),
        }
    }
}
