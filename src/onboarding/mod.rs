//! Onboarding flow engine: document model, navigation, action
//! interpretation, rendering and collected data.
//!
//! A [`Flow`] is started from a loaded [`OnboardingConfig`]. The host feeds
//! it input and presses, draws [`Flow::rendered`], and receives the
//! [`CollectedData`] exactly once through [`FlowHost::on_finish`].

pub mod actions;
pub mod collected;
pub mod flow;
pub mod model;
pub mod render;
pub mod state;
pub mod view;

pub use actions::{
    ActionContext, ActionOutcome, ApiCall, ApiExecutor, ApiReply, FilePicker, FlowHost,
    HttpApiExecutor, PickedFile,
};
pub use collected::{CollectedData, FlowEvent};
pub use flow::{Flow, FlowBuilder};
pub use model::{Action, Element, ElementKind, OnboardingConfig, Screen};
pub use render::{FlowProgress, RenderedScreen, Widget, render_element, render_screen};
pub use state::{NavState, Navigator, Transition};
pub use view::ViewState;
