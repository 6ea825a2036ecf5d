//! Onboarding document model: config, screens, elements and actions.
//!
//! The document is camelCase JSON. Elements and actions are closed tagged
//! variants keyed on `type`; unrecognised tags deserialize to an `Unknown`
//! variant that keeps the raw payload, so a newer config never fails to load
//! on an older renderer.

use std::collections::{BTreeMap, HashSet};

use serde::de::Error as _;
use serde::ser::{Error as _, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Sentinel navigation target that terminates the flow.
pub const END_TARGET: &str = "end";

/// Root onboarding document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingConfig {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    /// A/B variants; each may pick a different start screen.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<Variant>,
    pub screens: Vec<Screen>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(rename = "__v", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
}

impl OnboardingConfig {
    /// Look up a screen by id.
    pub fn screen(&self, id: &str) -> Option<&Screen> {
        self.screens.iter().find(|s| s.id == id)
    }

    pub fn has_screen(&self, id: &str) -> bool {
        self.screen(id).is_some()
    }

    /// Zero-based position of a screen in document order.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.screens.iter().position(|s| s.id == id)
    }

    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// Check structural invariants: unique screen ids and resolvable
    /// navigation targets. Problems are reported, never fatal.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        for screen in &self.screens {
            if !seen.insert(screen.id.as_str()) {
                issues.push(ConfigIssue::DuplicateScreenId(screen.id.clone()));
            }
        }

        let resolves = |target: &str| target == END_TARGET || self.has_screen(target);

        for screen in &self.screens {
            for button in &screen.actions {
                if !resolves(&button.target) {
                    issues.push(ConfigIssue::DanglingTarget {
                        screen_id: screen.id.clone(),
                        element_id: None,
                        target: button.target.clone(),
                    });
                }
            }
            for element in &screen.elements {
                let mut targets: Vec<&str> = Vec::new();
                if let ElementKind::Button(props) = &element.kind
                    && let Some(target) = props.target.as_deref()
                {
                    targets.push(target);
                }
                for action in &element.actions {
                    action.collect_targets(&mut targets);
                }
                for target in targets {
                    if !resolves(target) {
                        issues.push(ConfigIssue::DanglingTarget {
                            screen_id: screen.id.clone(),
                            element_id: Some(element.id.clone()),
                            target: target.to_string(),
                        });
                    }
                }
            }
        }

        for variant in &self.variants {
            if let Some(start) = variant.start_screen.as_deref()
                && !self.has_screen(start)
            {
                issues.push(ConfigIssue::UnknownStartScreen {
                    variant_id: variant.id.clone(),
                    start_screen: start.to_string(),
                });
            }
        }

        issues
    }
}

/// A structural problem found by [`OnboardingConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    DuplicateScreenId(String),
    DanglingTarget {
        screen_id: String,
        element_id: Option<String>,
        target: String,
    },
    UnknownStartScreen {
        variant_id: String,
        start_screen: String,
    },
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateScreenId(id) => write!(f, "duplicate screen id {id}"),
            Self::DanglingTarget {
                screen_id,
                element_id: Some(element_id),
                target,
            } => write!(f, "{screen_id}/{element_id} targets unknown screen {target}"),
            Self::DanglingTarget {
                screen_id, target, ..
            } => write!(f, "{screen_id} targets unknown screen {target}"),
            Self::UnknownStartScreen {
                variant_id,
                start_screen,
            } => write!(f, "variant {variant_id} starts at unknown screen {start_screen}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<ThemeColors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeColors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One arm of an A/B test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    /// Relative weight; defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_screen: Option<String>,
}

impl Variant {
    pub fn effective_weight(&self) -> u32 {
        self.weight.unwrap_or(1)
    }
}

/// A single screen. Either element-based, or a legacy typed screen with
/// `content` and button `actions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screen {
    pub id: String,
    /// Legacy screen type (`text`, `fileUpload`, `banner`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<LegacyContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<LegacyButton>,
}

impl Screen {
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Whether this screen is rendered from its legacy `type`/`content`.
    pub fn is_legacy(&self) -> bool {
        self.elements.is_empty() && self.kind.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default)]
    pub scroll: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Background {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Title block of a legacy screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyContent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub background: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Legacy screen button: navigates to `target`, or finishes on `"end"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyButton {
    #[serde(rename = "type", default = "default_button_kind")]
    pub kind: String,
    pub label: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub background: String,
    pub target: String,
}

fn default_button_kind() -> String {
    "button".to_string()
}

// ── Elements ─────────────────────────────────────────────────────────

/// A declarative UI unit within a screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    /// Actions run, in order, when the element is activated.
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Text(TextProps),
    Image(ImageProps),
    Button(ButtonProps),
    Input(InputProps),
    FileUpload(FileUploadProps),
    MultiSelect(MultiSelectProps),
    Progress(ProgressProps),
    Carousel(CarouselProps),
    PermissionList(PermissionListProps),
    Banner(BannerProps),
    /// Unrecognised `type`; `props` is kept verbatim.
    Unknown { type_name: String, props: Value },
}

impl ElementKind {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Button(_) => "button",
            Self::Input(_) => "input",
            Self::FileUpload(_) => "fileUpload",
            Self::MultiSelect(_) => "multiSelect",
            Self::Progress(_) => "progress",
            Self::Carousel(_) => "carousel",
            Self::PermissionList(_) => "permissionList",
            Self::Banner(_) => "banner",
            Self::Unknown { type_name, .. } => type_name,
        }
    }

    /// Name of the `values` field this element writes, if any.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::Input(p) => Some(&p.name),
            Self::FileUpload(p) => Some(&p.name),
            Self::MultiSelect(p) => Some(&p.name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProps {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProps {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonProps {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Legacy-style navigation target, applied after the element's actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputProps {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard_type: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadProps {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accept: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSelectProps {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressProps {
    /// Dotted path into the collected `values`.
    pub value_expr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarouselProps {
    #[serde(default)]
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionListProps {
    #[serde(default)]
    pub items: Vec<PermissionItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionItem {
    pub permission: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BannerProps {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

/// Wire shape of an element before its `props` are typed.
#[derive(Deserialize)]
struct RawElement {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    props: Value,
    #[serde(default)]
    actions: Vec<Action>,
}

fn props_from<T: serde::de::DeserializeOwned>(props: Value) -> Result<T, serde_json::Error> {
    // Elements with all-optional props may omit `props` entirely.
    let props = if props.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        props
    };
    serde_json::from_value(props)
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawElement::deserialize(deserializer)?;
        let props = raw.props;
        let typed = match raw.kind.as_str() {
            "text" => props_from(props.clone()).map(ElementKind::Text),
            "image" => props_from(props.clone()).map(ElementKind::Image),
            "button" => props_from(props.clone()).map(ElementKind::Button),
            "input" => props_from(props.clone()).map(ElementKind::Input),
            "fileUpload" => props_from(props.clone()).map(ElementKind::FileUpload),
            "multiSelect" => props_from(props.clone()).map(ElementKind::MultiSelect),
            "progress" => props_from(props.clone()).map(ElementKind::Progress),
            "carousel" => props_from(props.clone()).map(ElementKind::Carousel),
            "permissionList" => props_from(props.clone()).map(ElementKind::PermissionList),
            "banner" => props_from(props.clone()).map(ElementKind::Banner),
            other => Ok(ElementKind::Unknown {
                type_name: other.to_string(),
                props: props.clone(),
            }),
        };
        // Bad props only cost this element, never the whole document.
        let kind = typed.unwrap_or_else(|e| {
            tracing::warn!(element_id = %raw.id, element_type = %raw.kind, error = %e, "Malformed element props");
            ElementKind::Unknown {
                type_name: raw.kind.clone(),
                props,
            }
        });

        Ok(Self {
            id: raw.id,
            kind,
            actions: raw.actions,
        })
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let field_count = if self.actions.is_empty() { 3 } else { 4 };
        let mut state = serializer.serialize_struct("Element", field_count)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("type", self.kind.type_name())?;
        match &self.kind {
            ElementKind::Text(p) => state.serialize_field("props", p)?,
            ElementKind::Image(p) => state.serialize_field("props", p)?,
            ElementKind::Button(p) => state.serialize_field("props", p)?,
            ElementKind::Input(p) => state.serialize_field("props", p)?,
            ElementKind::FileUpload(p) => state.serialize_field("props", p)?,
            ElementKind::MultiSelect(p) => state.serialize_field("props", p)?,
            ElementKind::Progress(p) => state.serialize_field("props", p)?,
            ElementKind::Carousel(p) => state.serialize_field("props", p)?,
            ElementKind::PermissionList(p) => state.serialize_field("props", p)?,
            ElementKind::Banner(p) => state.serialize_field("props", p)?,
            ElementKind::Unknown { props, .. } => state.serialize_field("props", props)?,
        }
        if !self.actions.is_empty() {
            state.serialize_field("actions", &self.actions)?;
        }
        state.end()
    }
}

// ── Actions ──────────────────────────────────────────────────────────

/// A declarative side effect triggered by element interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Navigate(NavigateAction),
    Validate(ValidateAction),
    Analytics(AnalyticsAction),
    Api(ApiAction),
    Toast(ToastAction),
    RequestPermission(RequestPermissionAction),
    Finish,
    /// Unrecognised `type`; the raw object is kept verbatim.
    Unknown { type_name: String, raw: Value },
}

impl Action {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Navigate(_) => "navigate",
            Self::Validate(_) => "validate",
            Self::Analytics(_) => "analytics",
            Self::Api(_) => "api",
            Self::Toast(_) => "toast",
            Self::RequestPermission(_) => "requestPermission",
            Self::Finish => "finish",
            Self::Unknown { type_name, .. } => type_name,
        }
    }

    fn collect_targets<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Navigate(nav) => out.push(&nav.target),
            Self::Api(api) => {
                for sub in [&api.on_success, &api.on_error].into_iter().flatten() {
                    sub.collect_targets(out);
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigateAction {
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateAction {
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsAction {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAction {
    pub request: ApiRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<Box<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<Box<Action>>,
}

/// Request template for an `api` action. `url` may contain `{{baseUrl}}`
/// and `{{appId}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToastAction {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestPermissionAction {
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let type_name = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| D::Error::custom("action is missing a string `type`"))?
            .to_string();

        let action = match type_name.as_str() {
            "navigate" => serde_json::from_value(raw).map(Self::Navigate),
            "validate" => serde_json::from_value(raw).map(Self::Validate),
            "analytics" => serde_json::from_value(raw).map(Self::Analytics),
            "api" => serde_json::from_value(raw).map(Self::Api),
            "toast" => serde_json::from_value(raw).map(Self::Toast),
            "requestPermission" => serde_json::from_value(raw).map(Self::RequestPermission),
            "finish" => Ok(Self::Finish),
            other => Ok(Self::Unknown {
                type_name: other.to_string(),
                raw,
            }),
        };
        action.map_err(D::Error::custom)
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let payload = match self {
            Self::Navigate(a) => serde_json::to_value(a),
            Self::Validate(a) => serde_json::to_value(a),
            Self::Analytics(a) => serde_json::to_value(a),
            Self::Api(a) => serde_json::to_value(a),
            Self::Toast(a) => serde_json::to_value(a),
            Self::RequestPermission(a) => serde_json::to_value(a),
            Self::Finish => Ok(Value::Object(serde_json::Map::new())),
            Self::Unknown { raw, .. } => return raw.serialize(serializer),
        }
        .map_err(S::Error::custom)?;

        let mut object = match payload {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        object.insert("type".to_string(), Value::String(self.type_name().to_string()));
        Value::Object(object).serialize(serializer)
    }
}
