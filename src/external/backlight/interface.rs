use async_trait::async_trait;
use std::{fmt, time::Duration};
use thiserror::Error;

/// A trait giving access to a backlight through some external control tool.
///
/// Levels are in the device's raw units. Implementations are cloned into
/// background tasks, so clones must address the same device.
#[async_trait]
pub trait BacklightTool: Clone + Send + Sync + 'static {
    async fn max_level(&self) -> Result<u64, ToolError>;
    async fn current_level(&self) -> Result<u64, ToolError>;
    async fn set_level(&self, value: SetValue) -> Result<(), ToolError>;
}

/// A value accepted by the tool's set mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetValue {
    Raw(u64),
    Percent(u8),
}

impl fmt::Display for SetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetValue::Raw(value) => write!(f, "{}", value),
            SetValue::Percent(percent) => write!(f, "{}%", percent),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("couldn't launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tool exited with {}: {stderr}", describe_exit(.code))]
    Exit { code: Option<i32>, stderr: String },

    #[error("unexpected tool output {output:?}")]
    Parse { output: String },

    #[error("tool didn't finish within {0:?}")]
    TimedOut(Duration),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_owned(),
    }
}

/// Parses a level printed by the tool, a single non-negative integer.
pub fn parse_level(output: &str) -> Result<u64, ToolError> {
    output.trim().parse().map_err(|_| ToolError::Parse {
        output: output.to_owned(),
    })
}
