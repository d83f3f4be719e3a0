//! The device boundary.
//!
//! An [`Actuator`] turns validated [`Action`]s into physical behaviour.  The
//! real robot protocol lives outside this crate; the binary and the tests use
//! [`SimulatedActuator`], which logs every action, keeps a transcript and
//! reports completion after the action's estimated duration.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::command::{Action, SoundSource};
use crate::tasks::{completion_pair, Completion, CompletionNotifier};

/// Failure reported by the device side.  The message is shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ActuatorError(pub String);

impl ActuatorError {
    pub fn new(msg: impl Into<String>) -> Self {
        ActuatorError(msg.into())
    }
}

/// External collaborator that executes device actions.
pub trait Actuator: Send {
    fn connect(&mut self) -> Result<(), ActuatorError>;

    fn is_connected(&self) -> bool;

    /// Start `action`.  Returns a completion handle for actions that keep
    /// running on the device after this call returns.
    fn perform(&mut self, action: &Action) -> Result<Option<Completion>, ActuatorError>;

    fn disconnect(&mut self);
}

// ── SimulatedActuator ─────────────────────────────────────────────────────────

/// When the simulator reports device-side completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// After [`Action::estimate`], on a spawned tokio task.
    #[default]
    Timed,
    /// Immediately.
    Instant,
    /// Only when the test calls [`SimulatedActuator::complete_pending`].
    Manual,
    /// Never; the notifier is kept alive until the simulator is dropped.
    Never,
}

/// In-process stand-in for the robot.
#[derive(Debug, Default)]
pub struct SimulatedActuator {
    connected: bool,
    mode: CompletionMode,
    transcript: Vec<Action>,
    connects: usize,
    fail_connect: Option<String>,
    failures: HashMap<&'static str, String>,
    pending: Vec<CompletionNotifier>,
}

impl SimulatedActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: CompletionMode) -> Self {
        SimulatedActuator { mode, ..Self::default() }
    }

    /// Make every `command` action fail with `message`.
    pub fn fail_on(mut self, command: &'static str, message: impl Into<String>) -> Self {
        self.failures.insert(command, message.into());
        self
    }

    /// Make `connect` fail with `message`.
    pub fn fail_connect(mut self, message: impl Into<String>) -> Self {
        self.fail_connect = Some(message.into());
        self
    }

    /// Every action performed so far, in order.
    pub fn transcript(&self) -> &[Action] {
        &self.transcript
    }

    /// Names of performed actions, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.transcript.iter().map(Action::name).collect()
    }

    pub fn connect_count(&self) -> usize {
        self.connects
    }

    /// Signal completion of every action held back in
    /// [`CompletionMode::Manual`].  Returns how many were released.
    pub fn complete_pending(&mut self) -> usize {
        let n = self.pending.len();
        for notifier in self.pending.drain(..) {
            notifier.complete();
        }
        n
    }

    fn completion_for(&mut self, action: &Action) -> Option<Completion> {
        let estimate = action.estimate()?;
        let (notifier, completion) = completion_pair();
        match self.mode {
            CompletionMode::Instant => notifier.complete(),
            CompletionMode::Manual | CompletionMode::Never => self.pending.push(notifier),
            CompletionMode::Timed => {
                tokio::spawn(async move {
                    tokio::time::sleep(estimate).await;
                    notifier.complete();
                });
            }
        }
        Some(completion)
    }
}

impl Actuator for SimulatedActuator {
    fn connect(&mut self) -> Result<(), ActuatorError> {
        if let Some(msg) = &self.fail_connect {
            return Err(ActuatorError::new(msg.clone()));
        }
        self.connects += 1;
        self.connected = true;
        log::info!("[sim] connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn perform(&mut self, action: &Action) -> Result<Option<Completion>, ActuatorError> {
        if let Some(msg) = self.failures.get(action.name()) {
            return Err(ActuatorError::new(msg.clone()));
        }
        if !action.is_offline() && !self.connected {
            return Err(ActuatorError::new("not connected"));
        }
        if let Action::PlaySound { source: SoundSource::File(path) } = action {
            if !Path::new(path).is_file() {
                return Err(ActuatorError::new(format!(
                    "sound file not found: {}",
                    path.display()
                )));
            }
        }
        log::info!("[sim] {action:?}");
        self.transcript.push(action.clone());
        Ok(self.completion_for(action))
    }

    fn disconnect(&mut self) {
        if self.connected {
            log::info!("[sim] disconnected");
        }
        self.connected = false;
        if self.mode != CompletionMode::Never {
            self.pending.clear();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::LedColor;

    fn say(text: &str) -> Action {
        Action::Say {
            text: text.into(),
            volume: 65535,
            voice: "en-us".into(),
            speed: 150,
            pitch: 50,
            amplitude: 100,
        }
    }

    #[test]
    fn requires_connection_except_offline() {
        let mut sim = SimulatedActuator::with_mode(CompletionMode::Instant);
        let err = sim.perform(&Action::Status).unwrap_err();
        assert_eq!(err.to_string(), "not connected");
        assert!(sim.perform(&Action::ListSounds { search: None }).is_ok());
        sim.connect().unwrap();
        assert!(sim.perform(&Action::Status).unwrap().is_none());
        assert_eq!(sim.names(), vec!["list-sounds", "status"]);
        assert_eq!(sim.connect_count(), 1);
    }

    #[test]
    fn only_timed_actions_get_handles() {
        let mut sim = SimulatedActuator::with_mode(CompletionMode::Instant);
        sim.connect().unwrap();
        assert!(sim.perform(&Action::Lights { colors: vec![LedColor::Red] }).unwrap().is_none());
        let handle = sim.perform(&say("hi")).unwrap().unwrap();
        assert!(handle.is_done());
    }

    #[test]
    fn manual_completion() {
        let mut sim = SimulatedActuator::with_mode(CompletionMode::Manual);
        sim.connect().unwrap();
        let h = sim.perform(&Action::Animate { name: "anim_bored_01".into() }).unwrap().unwrap();
        assert!(!h.is_done());
        assert_eq!(sim.complete_pending(), 1);
        assert!(h.is_done());
    }

    #[test]
    fn injected_failures() {
        let mut sim = SimulatedActuator::new().fail_on("move", "motor stalled");
        sim.connect().unwrap();
        let err = sim.perform(&Action::Move { distance_mm: 10.0, speed_mmps: 100.0 }).unwrap_err();
        assert_eq!(err, ActuatorError::new("motor stalled"));
        assert!(sim.transcript().is_empty());

        let mut sim = SimulatedActuator::new().fail_connect("no robot found");
        assert_eq!(sim.connect().unwrap_err().to_string(), "no robot found");
        assert!(!sim.is_connected());
    }

    #[test]
    fn missing_sound_file() {
        let mut sim = SimulatedActuator::with_mode(CompletionMode::Instant);
        sim.connect().unwrap();
        let action = Action::PlaySound { source: SoundSource::File("/no/such/file.mp3".into()) };
        assert!(sim.perform(&action).unwrap_err().0.contains("not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_completion_follows_estimate() {
        let mut sim = SimulatedActuator::new();
        sim.connect().unwrap();
        let start = tokio::time::Instant::now();
        let mut h = sim.perform(&Action::Turn { degrees: 180.0 }).unwrap().unwrap();
        h.wait().await;
        assert_eq!(start.elapsed(), std::time::Duration::from_secs(2));
    }
}
