//! Per-group session state tracked by the controller.

use crate::models::{Group, PlaybackMode};
use crate::timeline::effective_mode;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayoutPhase {
    #[default]
    Stopped,
    Playing,
    /// Manual single-shot advance through a sequential group.
    Stepping,
}

impl PlayoutPhase {
    pub fn is_running(self) -> bool {
        !matches!(self, PlayoutPhase::Stopped)
    }

    /// Whether this phase may be entered for `group` at all.
    pub fn allowed_for(self, group: &Group) -> bool {
        match self {
            PlayoutPhase::Stopped | PlayoutPhase::Playing => true,
            PlayoutPhase::Stepping => {
                !group.transparent
                    && matches!(
                        effective_mode(group),
                        PlaybackMode::Sequential {
                            auto_play: false,
                            ..
                        }
                    )
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepDirection {
    Next,
    Previous,
}

/// Bookkeeping the controller keeps next to each group.
#[derive(Clone, Debug, Default)]
pub(crate) struct GroupSession {
    pub phase: PlayoutPhase,
    /// Consecutive samples that found the group not playing.
    pub missed_samples: u32,
    /// Set once auto-stop fired; cleared by the next start.
    pub auto_stop_latched: bool,
}

impl GroupSession {
    pub fn enter(&mut self, phase: PlayoutPhase) {
        self.phase = phase;
        self.missed_samples = 0;
        if phase.is_running() {
            self.auto_stop_latched = false;
        }
    }
}
