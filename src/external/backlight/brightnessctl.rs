use super::{parse_level, BacklightTool, SetValue, ToolError};
use crate::config::ToolConfig;
use async_trait::async_trait;
use std::{process::Stdio, time::Duration};
use tokio::process::Command;

/// A [BacklightTool] driving the `brightnessctl` command line utility.
///
/// Every operation spawns one process. The command may be prefixed by extra
/// arguments, which allows wrapping it (for example `flatpak-spawn --host
/// brightnessctl`).
#[derive(Debug, Clone)]
pub struct BrightnessCtl {
    program: String,
    prefix_args: Vec<String>,
    device: Option<String>,
    timeout: Option<Duration>,
}

impl BrightnessCtl {
    pub fn new(program: impl Into<String>) -> BrightnessCtl {
        BrightnessCtl {
            program: program.into(),
            prefix_args: Vec::new(),
            device: None,
            timeout: None,
        }
    }

    pub fn from_config(config: &ToolConfig) -> BrightnessCtl {
        let mut tool =
            BrightnessCtl::new(config.command.as_str()).with_prefix_args(config.args.clone());
        if let Some(device) = &config.device {
            tool = tool.with_device(device.as_str());
        }
        if let Some(timeout) = config.timeout() {
            tool = tool.with_timeout(timeout);
        }
        tool
    }

    pub fn with_prefix_args(mut self, args: Vec<String>) -> BrightnessCtl {
        self.prefix_args = args;
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> BrightnessCtl {
        self.device = Some(device.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> BrightnessCtl {
        self.timeout = Some(timeout);
        self
    }

    /// Arguments for one invocation: the prefix, the operation and the device
    /// selection.
    fn arguments(&self, operation: &[String]) -> Vec<String> {
        let mut args = self.prefix_args.clone();
        args.extend_from_slice(operation);
        if let Some(device) = &self.device {
            args.push("--device".to_owned());
            args.push(device.clone());
        }
        args
    }

    async fn run(&self, operation: &[String]) -> Result<String, ToolError> {
        let args = self.arguments(operation);
        log::trace!("Running {} {:?}", self.program, args);
        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, command.output())
                .await
                .map_err(|_| ToolError::TimedOut(timeout))?,
            None => command.output().await,
        }
        .map_err(|source| ToolError::Launch {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ToolError::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn query(&self, mode: &str) -> Result<u64, ToolError> {
        let output = self.run(&[mode.to_owned()]).await?;
        parse_level(&output)
    }
}

#[async_trait]
impl BacklightTool for BrightnessCtl {
    async fn max_level(&self) -> Result<u64, ToolError> {
        self.query("max").await
    }

    async fn current_level(&self) -> Result<u64, ToolError> {
        self.query("get").await
    }

    async fn set_level(&self, value: SetValue) -> Result<(), ToolError> {
        self.run(&["set".to_owned(), value.to_string()])
            .await
            .map(|_| ())
    }
}
