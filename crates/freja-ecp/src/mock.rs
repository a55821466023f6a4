// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::transport::EcpTransport;

/// Deterministic in-process transport for tests.
///
/// Responses are scripted per method; every request is recorded so tests can
/// assert on the exact method/params the core sent.  Unscripted methods
/// return `{}` so a test only has to script what it asserts on.
#[derive(Default)]
pub struct MockEcp {
    responses: Mutex<HashMap<String, Vec<Value>>>,
    calls: Mutex<Vec<(String, Value)>>,
    fail_methods: Mutex<Vec<String>>,
}

impl MockEcp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `method`.  Multiple responses for the same
    /// method are consumed in FIFO order; the last one is sticky.
    pub fn script(&self, method: &str, response: Value) {
        self.responses
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push(response);
    }

    /// Make every future request to `method` fail at the transport level.
    pub fn fail(&self, method: &str) {
        self.fail_methods.lock().unwrap().push(method.to_string());
    }

    /// All `(method, params)` pairs seen so far, in call order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// Params of the most recent call to `method`, if any.
    pub fn last_params(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl EcpTransport for MockEcp {
    async fn request(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        if self.fail_methods.lock().unwrap().iter().any(|m| m == method) {
            anyhow::bail!("ECP transport error: {method} unavailable");
        }

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(method) {
            Some(queue) if queue.len() > 1 => Ok(queue.remove(0)),
            Some(queue) if queue.len() == 1 => Ok(queue[0].clone()),
            _ => Ok(json!({})),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
