use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{parse_level, BacklightTool, SetValue, ToolError};

/// Ways in which the mock can misbehave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// The tool runs but exits with a non-zero status.
    Exit,
    /// The tool prints something which isn't a level.
    Garbage(String),
}

#[derive(Debug)]
struct MockState {
    raw: u64,
    max: u64,
    failure: Option<MockFailure>,
    writes: Vec<SetValue>,
}

/// A mock [BacklightTool] backed by an in-memory device.
///
/// Clones share the device, so a test can keep one clone to inspect and
/// manipulate what the controller under test sees.
#[derive(Clone)]
pub struct MockBacklightTool {
    state: Arc<Mutex<MockState>>,
    written: Arc<Notify>,
}

impl MockBacklightTool {
    pub fn new(raw: u64, max: u64) -> MockBacklightTool {
        MockBacklightTool {
            state: Arc::new(Mutex::new(MockState {
                raw,
                max,
                failure: None,
                writes: Vec::new(),
            })),
            written: Arc::new(Notify::new()),
        }
    }

    /// Changes the level behind the controller's back, like a hotkey would.
    pub fn set_raw(&self, raw: u64) {
        self.state.lock().unwrap().raw = raw;
    }

    pub fn raw(&self) -> u64 {
        self.state.lock().unwrap().raw
    }

    pub fn set_failure(&self, failure: Option<MockFailure>) {
        self.state.lock().unwrap().failure = failure;
    }

    /// Every value the set mode was invoked with, including failed attempts.
    pub fn writes(&self) -> Vec<SetValue> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Waits until the set mode has been invoked at least `count` times.
    pub async fn wait_for_writes(&self, count: usize) {
        loop {
            let notified = self.written.notified();
            if self.state.lock().unwrap().writes.len() >= count {
                return;
            }
            notified.await;
        }
    }

    fn fail(failure: &MockFailure) -> ToolError {
        match failure {
            MockFailure::Exit => ToolError::Exit {
                code: Some(1),
                stderr: "Mock backlight tool is failing".to_owned(),
            },
            MockFailure::Garbage(output) => match parse_level(output) {
                Err(e) => e,
                Ok(_) => ToolError::Parse {
                    output: output.clone(),
                },
            },
        }
    }

    fn query(&self, pick: impl FnOnce(&MockState) -> u64) -> Result<u64, ToolError> {
        let state = self.state.lock().unwrap();
        match &state.failure {
            Some(failure) => Err(Self::fail(failure)),
            None => Ok(pick(&*state)),
        }
    }
}

#[async_trait]
impl BacklightTool for MockBacklightTool {
    async fn max_level(&self) -> Result<u64, ToolError> {
        self.query(|state| state.max)
    }

    async fn current_level(&self) -> Result<u64, ToolError> {
        self.query(|state| state.raw)
    }

    async fn set_level(&self, value: SetValue) -> Result<(), ToolError> {
        let result = {
            let mut state = self.state.lock().unwrap();
            state.writes.push(value);
            if let Some(failure) = &state.failure {
                Err(Self::fail(failure))
            } else {
                let max = state.max;
                state.raw = match value {
                    SetValue::Raw(raw) => raw.min(max),
                    SetValue::Percent(percent) => {
                        (max as f64 * f64::from(percent.min(100)) / 100.0).round() as u64
                    }
                };
                Ok(())
            }
        };
        self.written.notify_waiters();
        result
    }
}
