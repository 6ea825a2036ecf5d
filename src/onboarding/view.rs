//! What a host should show: loading, an error with retry, an empty state,
//! the current screen, or nothing once the flow is done.

use crate::query::QueryState;

use super::flow::Flow;
use super::render::{FlowProgress, RenderedScreen};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Error { message: String, retry: bool },
    /// The config loaded but has no screens.
    Empty,
    /// Data is available; the host may start a flow.
    Ready,
    Screen {
        screen: RenderedScreen,
        progress: Option<FlowProgress>,
    },
    Finished,
}

impl ViewState {
    pub fn for_query(state: &QueryState) -> Self {
        if state.loading {
            return Self::Loading;
        }
        if let Some(error) = &state.error {
            return Self::Error {
                message: error.message.clone(),
                retry: true,
            };
        }
        match &state.data {
            Some(data) if data.screens.is_empty() => Self::Empty,
            Some(_) => Self::Ready,
            None => Self::Loading,
        }
    }

    pub fn for_flow(flow: &Flow) -> Self {
        match flow.rendered() {
            Some(screen) => Self::Screen {
                screen,
                progress: flow.progress(),
            },
            None => Self::Finished,
        }
    }

    /// Status line for non-screen states.
    pub fn headline(&self) -> Option<String> {
        match self {
            Self::Loading => Some("Loading onboarding...".to_string()),
            Self::Error { message, .. } => Some(format!("Error: {message}")),
            Self::Empty => Some("No onboarding screens available".to_string()),
            Self::Finished => Some("Onboarding complete".to_string()),
            Self::Ready | Self::Screen { .. } => None,
        }
    }
}
