#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use forge_gym::prelude::*;
use forge_gym::transport::TransportError;
use serde_json::{json, Value};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Debug output of the crate on the test's stdout, captured by the harness unless a test fails.
pub fn init_test_logger() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .without_time()
        .with_ansi(false)
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// A snapshot in the engine's format.
pub fn snapshot(turn: i64, life: [i64; 2], actions: &[(&str, Option<&str>)]) -> Value {
    let actions = actions
        .iter()
        .map(|(kind, card)| match card {
            Some(card) => json!({"type": kind, "card_name": card}),
            None => json!({"type": kind}),
        })
        .collect::<Vec<_>>();
    json!({
        "turn": turn,
        "phase": "MAIN1",
        "game_over": life[0] <= 0 || life[1] <= 0,
        "players": [
            {"name": "Agent", "life": life[0], "hand": []},
            {"name": "AI", "life": life[1], "hand": []},
        ],
        "possible_actions": {"actions": actions},
    })
}

pub const ATTACK_OR_PASS: &[(&str, Option<&str>)] =
    &[("attack", Some("Bear")), ("pass_priority", None)];

/// In-memory engine replaying canned snapshots.
///
/// When the script runs out it either repeats the last snapshot (`repeat_last`) or behaves like
/// a dead engine.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    pub initial: Option<Value>,
    pub replies: VecDeque<Value>,
    pub repeat_last: bool,
    pub sent: Vec<EngineCommand>,
    pub scenarios: Vec<Option<Scenario>>,
    pub shutdowns: Rc<Cell<usize>>,
    last: Option<Value>,
}

impl ScriptedEngine {
    pub fn new(initial: Value, replies: Vec<Value>) -> ScriptedEngine {
        ScriptedEngine {
            initial: Some(initial),
            replies: replies.into(),
            ..ScriptedEngine::default()
        }
    }

    pub fn endless(state: Value) -> ScriptedEngine {
        ScriptedEngine {
            initial: Some(state.clone()),
            repeat_last: true,
            last: Some(state),
            ..ScriptedEngine::default()
        }
    }
}

impl Engine for ScriptedEngine {
    fn reset(&mut self, scenario: Option<&Scenario>) -> Result<RawState, TransportError> {
        self.scenarios.push(scenario.cloned());
        self.initial
            .clone()
            .map(RawState::new)
            .ok_or_else(|| TransportError::Connect("connection refused".to_string()))
    }

    fn submit(&mut self, command: EngineCommand) -> Result<RawState, TransportError> {
        self.sent.push(command);
        match self.replies.pop_front() {
            Some(reply) => {
                self.last = Some(reply.clone());
                Ok(RawState::new(reply))
            }
            None if self.repeat_last => self
                .last
                .clone()
                .map(RawState::new)
                .ok_or(TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    fn shutdown(&mut self) {
        self.shutdowns.set(self.shutdowns.get() + 1);
    }
}

/// One request seen by a [`StubServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Minimal HTTP/1.1 server answering one canned response per connection, in order.
pub struct StubServer {
    url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    pub fn start(responses: Vec<(u16, String)>) -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(vec![]));

        let seen = requests.clone();
        thread::spawn(move || {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                if let Some(request) = read_request(&mut stream) {
                    seen.lock().unwrap().push(request);
                }
                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes());
                let _ = stream.flush();
            }
        });

        StubServer { url, requests }
    }

    /// Answers every request with 200 and the given JSON values, in order.
    pub fn json(values: Vec<Value>) -> StubServer {
        StubServer::start(values.into_iter().map(|v| (200, v.to_string())).collect())
    }

    /// Accepts connections but never answers.
    pub fn silent() -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        thread::spawn(move || {
            let mut open = vec![];
            while let Ok((stream, _)) = listener.accept() {
                open.push(stream);
            }
        });
        StubServer {
            url,
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

/// A URL nothing listens on.
pub fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok()?;
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut content_length = 0;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).ok()?;
    Some(Recorded {
        method,
        path,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// Returns the given indices in order, then 0.
pub struct Sequence(pub VecDeque<i64>);

impl DecisionSource for Sequence {
    fn choose(&mut self, _ctx: &DecisionContext<'_>) -> Result<i64, OperatorAbort> {
        Ok(self.0.pop_front().unwrap_or(0))
    }
}

/// Quits at the n-th decision.
pub struct QuitAfter(pub usize);

impl DecisionSource for QuitAfter {
    fn choose(&mut self, _ctx: &DecisionContext<'_>) -> Result<i64, OperatorAbort> {
        if self.0 == 0 {
            return Err(OperatorAbort);
        }
        self.0 -= 1;
        Ok(0)
    }
}
