//! Debounced light control submission.
//!
//! Slider drags and color scrubs arrive as bursts of values per light group.
//! The commander updates the desired state immediately (the optimistic
//! render), debounces the outbound command per group, and on failure snaps
//! the desired state back to the last confirmed value and records a notice.
//! A failed user write is never retried automatically: retrying could
//! toggle a physical device twice.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use manor_backend::{BackendClient, LightGroup};
use manor_poll::{BoxError, Debouncer};

use crate::state::{LightsState, Notice, push_notice};

/// One change to a light group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "lowercase")]
pub enum LightAction {
    /// Turn the group on or off.
    Power(bool),
    /// Set brightness percentage, 0-100.
    Brightness(u8),
    /// Set hex color ("#rrggbb").
    Color(String),
}

impl LightAction {
    /// The control this action belongs to; debounce keys include it so a
    /// power toggle cannot cancel a pending brightness write.
    pub fn kind(&self) -> &'static str {
        match self {
            LightAction::Power(_) => "power",
            LightAction::Brightness(_) => "brightness",
            LightAction::Color(_) => "color",
        }
    }
}

/// A command addressed to one light group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightCommand {
    /// Target group id.
    pub group_id: i64,
    /// The change to apply.
    #[serde(flatten)]
    pub action: LightAction,
}

/// Where outbound light commands go.
///
/// The real sink is the serverless control function; tests inject a mock.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Deliver one command. Errors surface to the resident; they are not
    /// retried.
    async fn send(&self, command: &LightCommand) -> Result<(), BoxError>;
}

/// Sends commands through the configured serverless control function.
pub struct FunctionSink {
    client: BackendClient,
    function: String,
}

impl FunctionSink {
    /// Create a sink invoking `function` on the backend.
    pub fn new(client: BackendClient, function: String) -> Self {
        Self { client, function }
    }
}

#[async_trait]
impl CommandSink for FunctionSink {
    async fn send(&self, command: &LightCommand) -> Result<(), BoxError> {
        self.client
            .invoke_function(&self.function, command)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }
}

/// Debounced light command submission with optimistic reversion.
pub struct LightCommander {
    sink: Arc<dyn CommandSink>,
    debouncer: Debouncer<(i64, &'static str)>,
    lights: Arc<RwLock<LightsState>>,
    notices: Arc<RwLock<Vec<Notice>>>,
}

impl LightCommander {
    /// Create a commander submitting through `sink` after `quiet_period`.
    pub fn new(
        sink: Arc<dyn CommandSink>,
        quiet_period: Duration,
        lights: Arc<RwLock<LightsState>>,
        notices: Arc<RwLock<Vec<Notice>>>,
    ) -> Self {
        Self {
            sink,
            debouncer: Debouncer::new(quiet_period),
            lights,
            notices,
        }
    }

    /// Apply a control input optimistically and schedule the debounced write.
    ///
    /// Returns `false` if the group is unknown. Each call for a control
    /// (group id + action kind) replaces any pending command for it; only
    /// the final value of a burst is submitted.
    pub async fn apply(&mut self, group_id: i64, action: LightAction) -> bool {
        {
            let mut lights = self.lights.write().await;
            let Some(group) = lights.desired.get_mut(&group_id) else {
                return false;
            };
            apply_action(group, &action);
        }

        let sink = Arc::clone(&self.sink);
        let lights = Arc::clone(&self.lights);
        let notices = Arc::clone(&self.notices);
        let command = LightCommand { group_id, action };
        let key = (group_id, command.action.kind());

        self.debouncer.submit(key, command, move |command| async move {
            match sink.send(&command).await {
                Ok(()) => {
                    let mut lights = lights.write().await;
                    if let Some(confirmed) = lights.confirmed.get_mut(&command.group_id) {
                        apply_action(confirmed, &command.action);
                    }
                    info!(group = command.group_id, "Light command applied");
                }
                Err(e) => {
                    // Snap the control back to its last known-good value.
                    let mut lights = lights.write().await;
                    if let Some(confirmed) = lights.confirmed.get(&command.group_id).cloned() {
                        lights.desired.insert(command.group_id, confirmed);
                    }
                    drop(lights);

                    warn!(group = command.group_id, "Light command failed: {}", e);
                    push_notice(
                        &notices,
                        format!("Light command for group {} failed: {e}", command.group_id),
                    )
                    .await;
                }
            }
        });

        true
    }

    /// Cancel every pending command (agent shutdown).
    pub fn cancel_all(&mut self) {
        self.debouncer.cancel_all();
    }
}

fn apply_action(group: &mut LightGroup, action: &LightAction) {
    match action {
        LightAction::Power(on) => group.power = *on,
        LightAction::Brightness(level) => group.brightness = *level,
        LightAction::Color(color) => group.color = Some(color.clone()),
    }
}
