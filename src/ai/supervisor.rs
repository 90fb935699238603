//! Lifecycle of the local inference server.
//!
//! ```text
//! NotRunning --probe ok--------------------------> Running (not owned)
//! NotRunning --probe fails--> Starting --grace---> Running (owned) --teardown--> Stopped
//! ```
//!
//! Only a server launched by this supervisor is ever stopped, and only through
//! the child handle returned by the launch.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::config::InferenceConfig;
use crate::error::{AppError, Result};

use super::ollama::OllamaClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    NotRunning,
    Starting,
    Running,
    Stopped,
}

pub struct InferenceSupervisor {
    client: OllamaClient,
    program: String,
    args: Vec<String>,
    startup_grace: Duration,
    state: SupervisorState,
    child: Option<Child>,
}

impl InferenceSupervisor {
    pub fn new(
        client: OllamaClient,
        program: impl Into<String>,
        args: Vec<String>,
        startup_grace: Duration,
    ) -> Self {
        Self {
            client,
            program: program.into(),
            args,
            startup_grace,
            state: SupervisorState::NotRunning,
            child: None,
        }
    }

    pub fn from_config(config: &InferenceConfig) -> Result<Self> {
        Ok(Self::new(
            OllamaClient::new(config)?,
            config.program.clone(),
            config.args.clone(),
            Duration::from_millis(config.startup_grace_ms),
        ))
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Whether this supervisor launched the server and may therefore stop it.
    pub fn owns_process(&self) -> bool {
        self.child.is_some()
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    /// Probe the server and launch it if nothing answers.
    ///
    /// After a launch the grace period is waited out and the server is assumed
    /// up; there is no second probe.
    pub async fn ensure_running(&mut self) -> Result<()> {
        if self.state == SupervisorState::Running {
            return Ok(());
        }

        if self.client.probe().await {
            tracing::info!(
                "Inference service already running at {}",
                self.client.base_url()
            );
            self.state = SupervisorState::Running;
            return Ok(());
        }

        tracing::info!("Starting inference service: {} {:?}", self.program, self.args);
        self.state = SupervisorState::Starting;
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(source) => {
                self.state = SupervisorState::NotRunning;
                return Err(AppError::InferenceLaunch {
                    program: self.program.clone(),
                    source,
                });
            }
        };
        self.child = Some(child);

        tokio::time::sleep(self.startup_grace).await;
        self.state = SupervisorState::Running;
        Ok(())
    }

    /// Stop the server if, and only if, this supervisor launched it.
    pub async fn teardown(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            if self.state == SupervisorState::Running {
                tracing::info!("Leaving inference service running; it was not started here");
            }
            return Ok(());
        };

        tracing::info!("Stopping inference service (pid {:?})", child.id());
        if child.try_wait()?.is_none() {
            child.kill().await?;
        }
        self.state = SupervisorState::Stopped;
        Ok(())
    }
}
