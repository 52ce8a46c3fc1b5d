//! Scripted transport for exercising the client and session without a server.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::api::{ApiError, FormParams, Result, Transport};

#[derive(Debug, Clone)]
enum Outcome {
    Reply(String),
    Fail(String),
}

/// One recorded request
#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub keys: Vec<&'static str>,
    params: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn endpoint(&self) -> &str {
        // Everything after "https://host:port/"
        self.url.splitn(4, '/').nth(3).unwrap_or("")
    }
}

/// Replies are queued per endpoint; the last queued reply repeats.
#[derive(Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<HashMap<String, VecDeque<Outcome>>>,
    fallback: Option<String>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body returned for endpoints with nothing queued
    pub fn fallback(mut self, body: &str) -> Self {
        self.fallback = Some(body.to_string());
        self
    }

    pub fn reply(&self, endpoint: &str, body: &str) {
        self.push(endpoint, Outcome::Reply(body.to_string()));
    }

    pub fn fail(&self, endpoint: &str, message: &str) {
        self.push(endpoint, Outcome::Fail(message.to_string()));
    }

    fn push(&self, endpoint: &str, outcome: Outcome) {
        self.outcomes
            .lock()
            .unwrap()
            .entry(endpoint.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls().iter().filter(|c| c.endpoint() == endpoint).count()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, url: &str, form: &FormParams) -> Result<String> {
        let call = Call {
            url: url.to_string(),
            keys: form.keys().collect(),
            params: form
                .as_pairs()
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        };
        let endpoint = call.endpoint().to_string();
        self.calls.lock().unwrap().push(call);

        let outcome = {
            let mut outcomes = self.outcomes.lock().unwrap();
            match outcomes.get_mut(&endpoint) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match outcome {
            Some(Outcome::Reply(body)) => Ok(body),
            Some(Outcome::Fail(message)) => Err(ApiError::Transport(message.into())),
            None => match &self.fallback {
                Some(body) => Ok(body.clone()),
                None => Err(ApiError::Transport(
                    format!("no scripted reply for {}", endpoint).into(),
                )),
            },
        }
    }
}
