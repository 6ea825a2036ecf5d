//! Navigation state machine: which screen the flow is on.

use rand::Rng;

use crate::error::FlowError;

use super::model::{END_TARGET, OnboardingConfig, Variant};

/// Where the flow currently is.
///
/// One state per screen id, plus the terminal `Finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavState {
    Screen(String),
    Finished,
}

impl NavState {
    /// Whether this state is terminal (flow is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    pub fn screen_id(&self) -> Option<&str> {
        match self {
            Self::Screen(id) => Some(id),
            Self::Finished => None,
        }
    }
}

impl std::fmt::Display for NavState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Screen(id) => write!(f, "screen:{id}"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Result of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Moved to an existing screen.
    Moved { from: String, to: String },
    /// Target does not exist; current screen unchanged.
    Stayed { target: String },
    /// Target was the `"end"` sentinel; the caller must finish the flow.
    End,
}

/// Pick an A/B variant by weight. Zero-weight variants are never chosen.
pub fn select_variant<'a, R: Rng + ?Sized>(
    variants: &'a [Variant],
    rng: &mut R,
) -> Option<&'a Variant> {
    let total: u64 = variants.iter().map(|v| u64::from(v.effective_weight())).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for variant in variants {
        let weight = u64::from(variant.effective_weight());
        if roll < weight {
            return Some(variant);
        }
        roll -= weight;
    }
    None
}

/// The variant's start screen if it names an existing screen, else the first
/// screen in document order.
pub fn initial_screen<'a>(config: &'a OnboardingConfig, variant: Option<&Variant>) -> Option<&'a str> {
    variant
        .and_then(|v| v.start_screen.as_deref())
        .and_then(|start| config.screen(start))
        .or_else(|| config.screens.first())
        .map(|screen| screen.id.as_str())
}

/// Tracks the current screen. History lives in the event log only.
#[derive(Debug, Clone)]
pub struct Navigator {
    state: NavState,
}

impl Navigator {
    pub fn start(config: &OnboardingConfig, variant: Option<&Variant>) -> Result<Self, FlowError> {
        let first = initial_screen(config, variant).ok_or(FlowError::NoScreens)?;
        Ok(Self {
            state: NavState::Screen(first.to_string()),
        })
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    pub fn current(&self) -> Option<&str> {
        self.state.screen_id()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `target` if it exists. Unknown targets leave the state alone.
    pub fn go(&mut self, config: &OnboardingConfig, target: &str) -> Result<Transition, FlowError> {
        let NavState::Screen(current) = &self.state else {
            return Err(FlowError::AlreadyFinished);
        };
        if target == END_TARGET {
            return Ok(Transition::End);
        }
        if !config.has_screen(target) {
            tracing::warn!(from = %current, target = %target, "Navigation target does not exist");
            return Ok(Transition::Stayed {
                target: target.to_string(),
            });
        }
        let from = current.clone();
        self.state = NavState::Screen(target.to_string());
        tracing::debug!(from = %from, to = %target, "Navigated");
        Ok(Transition::Moved {
            from,
            to: target.to_string(),
        })
    }

    /// Enter the terminal state. Returns `false` if already finished.
    pub fn finish(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = NavState::Finished;
        true
    }
}
