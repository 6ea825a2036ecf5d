//! A running onboarding flow.
//!
//! `Flow` is the single writer of its navigation state and collected data:
//! every mutating entry point takes `&mut self`. Once the flow finishes,
//! all of them return [`FlowError::AlreadyFinished`].

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};

use crate::error::FlowError;
use crate::template::TemplateVars;

use super::actions::{
    ActionContext, ActionOutcome, ApiExecutor, FilePicker, FlowHost, HttpApiExecutor, PickedFile,
};
use super::collected::{CollectedData, FlowEvent, events};
use super::model::{ElementKind, OnboardingConfig, Screen};
use super::render::{FlowProgress, RenderedScreen, render_screen};
use super::state::{NavState, Navigator, select_variant};

/// Configures and starts a [`Flow`].
pub struct FlowBuilder {
    config: OnboardingConfig,
    host: Arc<dyn FlowHost>,
    api: Option<Arc<dyn ApiExecutor>>,
    picker: Option<Arc<dyn FilePicker>>,
    base_url: String,
    variant: Option<String>,
}

impl FlowBuilder {
    pub fn api_executor(mut self, api: Arc<dyn ApiExecutor>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn file_picker(mut self, picker: Arc<dyn FilePicker>) -> Self {
        self.picker = Some(picker);
        self
    }

    /// Value of `{{baseUrl}}` in api action URLs.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Force an A/B variant instead of a weighted random pick.
    pub fn variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant = Some(variant_id.into());
        self
    }

    pub fn start(self) -> Result<Flow, FlowError> {
        let variant = match &self.variant {
            Some(id) => {
                let found = self.config.variant(id);
                if found.is_none() {
                    tracing::warn!(variant = %id, "Requested variant not in config");
                }
                found
            }
            None => select_variant(&self.config.variants, &mut rand::thread_rng()),
        };
        let navigator = Navigator::start(&self.config, variant)?;

        let mut collected = CollectedData::new(self.config.app_id.clone());
        collected.variant = variant.map(|v| v.id.clone());

        tracing::info!(
            app_id = %self.config.app_id,
            flow_id = %collected.flow_id,
            variant = ?collected.variant,
            state = %navigator.state(),
            "Onboarding flow started"
        );

        let vars = TemplateVars::new(self.base_url, self.config.app_id.clone());
        Ok(Flow {
            config: self.config,
            navigator,
            collected,
            vars,
            host: self.host,
            api: self
                .api
                .unwrap_or_else(|| Arc::new(HttpApiExecutor::default())),
            picker: self.picker,
        })
    }
}

pub struct Flow {
    config: OnboardingConfig,
    navigator: Navigator,
    collected: CollectedData,
    vars: TemplateVars,
    host: Arc<dyn FlowHost>,
    api: Arc<dyn ApiExecutor>,
    picker: Option<Arc<dyn FilePicker>>,
}

impl Flow {
    pub fn builder(config: OnboardingConfig, host: Arc<dyn FlowHost>) -> FlowBuilder {
        FlowBuilder {
            config,
            host,
            api: None,
            picker: None,
            base_url: String::new(),
            variant: None,
        }
    }

    pub fn config(&self) -> &OnboardingConfig {
        &self.config
    }

    pub fn state(&self) -> &NavState {
        self.navigator.state()
    }

    pub fn is_finished(&self) -> bool {
        self.navigator.is_finished()
    }

    pub fn collected(&self) -> &CollectedData {
        &self.collected
    }

    pub fn current_screen(&self) -> Option<&Screen> {
        self.navigator
            .current()
            .and_then(|id| self.config.screen(id))
    }

    pub fn progress(&self) -> Option<FlowProgress> {
        FlowProgress::of(&self.config, self.navigator.current()?)
    }

    /// The current screen rendered against the collected values.
    pub fn rendered(&self) -> Option<RenderedScreen> {
        self.current_screen()
            .map(|screen| render_screen(&self.config, screen, &self.collected.values))
    }

    /// Write an input-like element's field.
    pub fn set_value(&mut self, element_id: &str, value: Value) -> Result<(), FlowError> {
        let screen = self.active_screen()?;
        let element = screen
            .element(element_id)
            .ok_or_else(|| element_not_found(screen, element_id))?;
        let name = element
            .kind
            .field_name()
            .ok_or_else(|| unsupported(element_id, "set_value"))?
            .to_string();
        self.collected.set_value(&name, value);
        Ok(())
    }

    /// Write a field directly by name.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), FlowError> {
        self.active_screen()?;
        self.collected.set_value(name, value);
        Ok(())
    }

    /// Toggle one option of a multi-select. Returns whether it is now selected.
    pub fn toggle_option(&mut self, element_id: &str, option: &str) -> Result<bool, FlowError> {
        let screen = self.active_screen()?;
        let element = screen
            .element(element_id)
            .ok_or_else(|| element_not_found(screen, element_id))?;
        let ElementKind::MultiSelect(props) = &element.kind else {
            return Err(unsupported(element_id, "toggle_option"));
        };
        if !props.options.iter().any(|o| o == option) {
            return Err(unsupported(element_id, &format!("toggle_option({option})")));
        }
        let name = props.name.clone();

        let mut selected: Vec<String> = match self.collected.value(&name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        let now_selected = match selected.iter().position(|s| s == option) {
            Some(index) => {
                selected.remove(index);
                false
            }
            None => {
                selected.push(option.to_string());
                true
            }
        };
        self.collected.set_value(&name, json!(selected));
        Ok(now_selected)
    }

    /// Activate an element: run its actions, then follow a button `target`
    /// if the flow is still running.
    pub async fn press(&mut self, element_id: &str) -> Result<ActionOutcome, FlowError> {
        let screen = self.active_screen()?;
        let element = screen
            .element(element_id)
            .ok_or_else(|| element_not_found(screen, element_id))?;
        let screen_id = screen.id.clone();
        let actions = element.actions.clone();
        let target = match &element.kind {
            ElementKind::Button(props) => props.target.clone(),
            _ => None,
        };

        tracing::debug!(screen_id = %screen_id, element_id = %element_id, actions = actions.len(), "Element pressed");
        let mut ctx = self.context();
        let mut outcome = ctx.run(&screen_id, Some(element_id), &actions).await?;
        if !outcome.finished
            && let Some(target) = target
        {
            outcome.finished = ctx.navigate(&screen_id, Some(element_id), &target).await?;
        }
        Ok(outcome)
    }

    /// Press the `index`th button of a legacy screen. The press is stored
    /// under the screen id, then the button's target is followed.
    pub async fn press_legacy(&mut self, index: usize) -> Result<ActionOutcome, FlowError> {
        let screen = self.active_screen()?;
        let button = screen
            .actions
            .get(index)
            .ok_or_else(|| element_not_found(screen, &format!("#{index}")))?;
        let screen_id = screen.id.clone();
        let target = button.target.clone();

        let mut entry = json!({
            "screenId": screen_id,
            "actionClicked": button.label,
            "timestamp": Utc::now().to_rfc3339(),
        });
        if let Some(file) = self
            .collected
            .value(&screen_id)
            .and_then(|v| v.get("fileUploaded"))
        {
            entry["fileUploaded"] = file.clone();
        }
        self.collected.set_value(&screen_id, entry);

        let finished = self.context().navigate(&screen_id, None, &target).await?;
        Ok(ActionOutcome {
            executed: 1,
            finished,
        })
    }

    /// Ask the host picker for a file for a `fileUpload` element, or for
    /// the picker of a legacy `fileUpload` screen. Cancelling leaves values
    /// untouched.
    pub async fn pick_file(&mut self, element_id: &str) -> Result<Option<PickedFile>, FlowError> {
        let screen = self.active_screen()?;
        let screen_id = screen.id.clone();

        let (field, accept, legacy) = match screen.element(element_id).map(|e| &e.kind) {
            Some(ElementKind::FileUpload(props)) => (props.name.clone(), props.accept.clone(), false),
            Some(_) => return Err(unsupported(element_id, "pick_file")),
            None if screen.is_legacy()
                && screen.kind.as_deref() == Some("fileUpload")
                && (element_id == screen.id || element_id == format!("{}.file", screen.id)) =>
            {
                (screen.id.clone(), Vec::new(), true)
            }
            None => return Err(element_not_found(screen, element_id)),
        };

        let Some(picker) = self.picker.clone() else {
            tracing::warn!(element_id = %element_id, "No file picker configured");
            return Ok(None);
        };
        let Some(file) = picker.pick(&accept).await else {
            tracing::debug!(element_id = %element_id, "File pick cancelled");
            return Ok(None);
        };

        // The flow may have finished while the picker was open.
        self.active_screen()?;
        let value = if legacy {
            json!({ "fileUploaded": file.name })
        } else {
            serde_json::to_value(&file).unwrap_or(Value::Null)
        };
        self.collected.set_value(&field, value);
        self.collected.record(
            FlowEvent::new(screen_id, events::FILE_SELECTED)
                .with_element(Some(element_id))
                .with_meta(json!({ "name": file.name })),
        );
        Ok(Some(file))
    }

    /// End the flow from outside (e.g. a skip control).
    pub async fn finish(&mut self) -> Result<(), FlowError> {
        let screen_id = self.active_screen()?.id.clone();
        self.context().complete(&screen_id, None).await?;
        Ok(())
    }

    fn active_screen(&self) -> Result<&Screen, FlowError> {
        let id = self.navigator.current().ok_or(FlowError::AlreadyFinished)?;
        self.config.screen(id).ok_or(FlowError::NoScreens)
    }

    fn context(&mut self) -> ActionContext<'_> {
        ActionContext {
            config: &self.config,
            navigator: &mut self.navigator,
            collected: &mut self.collected,
            vars: &self.vars,
            host: self.host.as_ref(),
            api: self.api.as_ref(),
        }
    }
}

fn element_not_found(screen: &Screen, element_id: &str) -> FlowError {
    FlowError::ElementNotFound {
        screen_id: screen.id.clone(),
        element_id: element_id.to_string(),
    }
}

fn unsupported(element_id: &str, operation: &str) -> FlowError {
    FlowError::UnsupportedOperation {
        element_id: element_id.to_string(),
        operation: operation.to_string(),
    }
}
