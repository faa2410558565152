use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument};

use super::{describe_actions, DecisionContext, DecisionSource, OperatorAbort};
use crate::observation::decision_payload;
use crate::transport::{warn_fallback, HttpTransport, TransportError};

/// Policy server reached over HTTP.
///
/// Each decision posts a [`DecisionPayload`](crate::observation::DecisionPayload) to the
/// server root and reads an action index back. Any failure is logged as a fallback and the
/// first action is played instead, so an episode never stalls on the policy.
#[derive(Debug, Clone)]
pub struct RemotePolicy {
    transport: HttpTransport,
    timeout: Duration,
}

impl RemotePolicy {
    pub const DEFAULT_URL: &'static str = "http://localhost:5005";
    /// Inference can be slow, the default is generous.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<RemotePolicy, TransportError> {
        Ok(RemotePolicy {
            transport: HttpTransport::new(url)?,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        self.transport.base_url()
    }

    #[instrument(skip_all, fields(url = %self.transport.base_url(), actions = ctx.actions.len()))]
    fn request_index(&self, ctx: &DecisionContext<'_>) -> Result<i64, TransportError> {
        let payload = decision_payload(ctx.state, ctx.actions, ctx.seat);
        let body = serde_json::to_value(&payload)?;
        debug!("available actions:\n{}", describe_actions(ctx.actions));

        let answer = self.transport.post_json("", &body, self.timeout)?;
        let index = parse_policy_answer(&answer)?;
        debug!(index, "policy answered");
        Ok(index)
    }
}

impl DecisionSource for RemotePolicy {
    fn choose(&mut self, ctx: &DecisionContext<'_>) -> Result<i64, OperatorAbort> {
        match self.request_index(ctx) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn_fallback("policy request failed", &e, "action index 0");
                Ok(0)
            }
        }
    }
}

/// Read an action index out of a policy answer.
///
/// Accepted shapes: a bare integer, a numeric string, or an object with `action_index` (or
/// `index`) holding one of those. Anything else, `null` included, is a parse error.
pub fn parse_policy_answer(answer: &Value) -> Result<i64, TransportError> {
    let value = match answer {
        Value::Object(obj) => obj
            .get("action_index")
            .or_else(|| obj.get("index"))
            .ok_or_else(|| TransportError::Parse("answer has no action index".to_string()))?,
        other => other,
    };

    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .ok_or_else(|| TransportError::Parse(format!("index {n} out of range"))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| TransportError::Parse(format!("index {s:?} is not an integer"))),
        Value::Null => Err(TransportError::Parse("policy returned null".to_string())),
        other => Err(TransportError::Parse(format!("unexpected answer {other}"))),
    }
}
