//! Element renderer. Maps screens and elements to presentation-neutral
//! widgets with defaults resolved. Rendering never fails: anything
//! unrecognised becomes [`Widget::Unknown`].

use serde::Serialize;
use serde_json::{Map, Value};

use super::model::{
    ElementKind, Element, LegacyButton, OnboardingConfig, PermissionItem, Screen, Slide,
};

pub const DEFAULT_BACKGROUND: &str = "#FFFFFF";
pub const DEFAULT_PADDING: f64 = 16.0;
pub const DEFAULT_ALIGN: &str = "stretch";

const DEFAULT_TEXT_VARIANT: &str = "body";
const DEFAULT_TEXT_COLOR: &str = "#222222";
const DEFAULT_TEXT_ALIGN: &str = "left";
const DEFAULT_IMAGE_HEIGHT: f64 = 180.0;
const DEFAULT_RESIZE_MODE: &str = "contain";
const DEFAULT_BUTTON_BACKGROUND: &str = "#007AFF";
const DEFAULT_BUTTON_COLOR: &str = "#ffffff";
const DEFAULT_BUTTON_SIZE: &str = "md";
const DEFAULT_KEYBOARD: &str = "default";
const DEFAULT_FILE_LABEL: &str = "Choose File";
const DEFAULT_PROGRESS_MAX: f64 = 100.0;

/// A drawable unit with every default filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Widget {
    Text {
        id: String,
        text: String,
        variant: String,
        color: String,
        align: String,
    },
    Image {
        id: String,
        uri: String,
        height: f64,
        resize_mode: String,
    },
    Button {
        id: String,
        label: String,
        background: String,
        color: String,
        size: String,
    },
    Input {
        id: String,
        name: String,
        label: Option<String>,
        placeholder: Option<String>,
        keyboard_type: String,
        required: bool,
        value: String,
    },
    FileUpload {
        id: String,
        name: String,
        label: String,
        accept: Vec<String>,
        /// Display name of the picked file, if any.
        selected: Option<String>,
    },
    MultiSelect {
        id: String,
        name: String,
        label: Option<String>,
        options: Vec<SelectOption>,
    },
    Progress {
        id: String,
        value: f64,
        max: f64,
        fraction: f64,
    },
    Carousel {
        id: String,
        slide: Option<Slide>,
        slide_count: usize,
    },
    PermissionList {
        id: String,
        items: Vec<PermissionItem>,
    },
    Banner {
        id: String,
        title: String,
        subtitle: Option<String>,
        color: Option<String>,
        background: Option<String>,
    },
    /// Button of a legacy screen, addressed by position.
    LegacyButton {
        index: usize,
        label: String,
        color: String,
        background: String,
        target: String,
    },
    Unknown {
        id: String,
        type_name: String,
    },
}

impl Widget {
    /// Placeholder text shown for an unrecognised type.
    pub fn unknown_message(type_name: &str) -> String {
        format!("Unknown type: {type_name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLayout {
    pub scroll: bool,
    pub padding: f64,
    pub align: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedScreen {
    pub screen_id: String,
    pub background: String,
    pub layout: ResolvedLayout,
    pub widgets: Vec<Widget>,
}

/// "n of total" position of the current screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlowProgress {
    /// One-based.
    pub position: usize,
    pub total: usize,
}

impl FlowProgress {
    pub fn of(config: &OnboardingConfig, screen_id: &str) -> Option<Self> {
        config.position_of(screen_id).map(|index| Self {
            position: index + 1,
            total: config.screens.len(),
        })
    }
}

impl std::fmt::Display for FlowProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {}", self.position, self.total)
    }
}

pub fn render_screen(
    config: &OnboardingConfig,
    screen: &Screen,
    values: &Map<String, Value>,
) -> RenderedScreen {
    let background = screen
        .background
        .as_ref()
        .and_then(|b| b.color.clone())
        .or_else(|| {
            config
                .theme
                .as_ref()
                .and_then(|t| t.colors.as_ref())
                .and_then(|c| c.background.clone())
        })
        .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string());

    let layout = screen.layout.clone().unwrap_or_default();
    let layout = ResolvedLayout {
        scroll: layout.scroll,
        padding: layout.padding.unwrap_or(DEFAULT_PADDING),
        align: layout.align.unwrap_or_else(|| DEFAULT_ALIGN.to_string()),
    };

    let widgets = if screen.is_legacy() {
        render_legacy(screen, values)
    } else {
        screen
            .elements
            .iter()
            .map(|element| render_element(element, values))
            .collect()
    };

    RenderedScreen {
        screen_id: screen.id.clone(),
        background,
        layout,
        widgets,
    }
}

pub fn render_element(element: &Element, values: &Map<String, Value>) -> Widget {
    let id = element.id.clone();
    match &element.kind {
        ElementKind::Text(p) => Widget::Text {
            id,
            text: p.text.clone(),
            variant: or_default(&p.variant, DEFAULT_TEXT_VARIANT),
            color: or_default(&p.color, DEFAULT_TEXT_COLOR),
            align: or_default(&p.align, DEFAULT_TEXT_ALIGN),
        },
        ElementKind::Image(p) => Widget::Image {
            id,
            uri: p.uri.clone(),
            height: p.height.unwrap_or(DEFAULT_IMAGE_HEIGHT),
            resize_mode: or_default(&p.resize_mode, DEFAULT_RESIZE_MODE),
        },
        ElementKind::Button(p) => Widget::Button {
            id,
            label: p.label.clone(),
            background: or_default(&p.background, DEFAULT_BUTTON_BACKGROUND),
            color: or_default(&p.color, DEFAULT_BUTTON_COLOR),
            size: or_default(&p.size, DEFAULT_BUTTON_SIZE),
        },
        ElementKind::Input(p) => Widget::Input {
            id,
            name: p.name.clone(),
            label: p.label.clone(),
            placeholder: p.placeholder.clone(),
            keyboard_type: or_default(&p.keyboard_type, DEFAULT_KEYBOARD),
            required: p.required,
            value: text_value(values.get(&p.name)),
        },
        ElementKind::FileUpload(p) => Widget::FileUpload {
            id,
            name: p.name.clone(),
            label: or_default(&p.label, DEFAULT_FILE_LABEL),
            accept: p.accept.clone(),
            selected: file_name(values.get(&p.name)),
        },
        ElementKind::MultiSelect(p) => {
            let selected = selected_options(values.get(&p.name));
            Widget::MultiSelect {
                id,
                name: p.name.clone(),
                label: p.label.clone(),
                options: p
                    .options
                    .iter()
                    .map(|opt| SelectOption {
                        label: opt.clone(),
                        selected: selected.iter().any(|s| s == opt),
                    })
                    .collect(),
            }
        }
        ElementKind::Progress(p) => {
            let value = resolve_number(&p.value_expr, values).unwrap_or(0.0);
            let max = p.max.unwrap_or(DEFAULT_PROGRESS_MAX);
            Widget::Progress {
                id,
                value,
                max,
                fraction: progress_fraction(value, max),
            }
        }
        ElementKind::Carousel(p) => Widget::Carousel {
            id,
            slide: p.slides.first().cloned(),
            slide_count: p.slides.len(),
        },
        ElementKind::PermissionList(p) => Widget::PermissionList {
            id,
            items: p.items.clone(),
        },
        ElementKind::Banner(p) => Widget::Banner {
            id,
            title: p.title.clone(),
            subtitle: p.subtitle.clone(),
            color: p.color.clone(),
            background: p.background.clone(),
        },
        ElementKind::Unknown { type_name, .. } => {
            tracing::debug!(element_id = %element.id, type_name = %type_name, "Rendering unknown element type");
            Widget::Unknown {
                id,
                type_name: type_name.clone(),
            }
        }
    }
}

/// Legacy screens: title and subtitle, a file picker for `fileUpload`, then
/// the screen's buttons.
fn render_legacy(screen: &Screen, values: &Map<String, Value>) -> Vec<Widget> {
    let kind = screen.kind.as_deref().unwrap_or_default();
    if !matches!(kind, "text" | "fileUpload" | "banner") {
        return vec![Widget::Unknown {
            id: screen.id.clone(),
            type_name: kind.to_string(),
        }];
    }

    let mut widgets = Vec::new();
    if let Some(content) = &screen.content {
        let color = Some(content.color.clone()).filter(|c| !c.is_empty());
        if kind == "banner" {
            widgets.push(Widget::Banner {
                id: format!("{}.banner", screen.id),
                title: content.title.clone(),
                subtitle: content.subtitle.clone(),
                color,
                background: Some(content.background.clone()).filter(|c| !c.is_empty()),
            });
        } else {
            widgets.push(Widget::Text {
                id: format!("{}.title", screen.id),
                text: content.title.clone(),
                variant: "h1".to_string(),
                color: color.clone().unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
                align: "center".to_string(),
            });
            if let Some(subtitle) = &content.subtitle {
                widgets.push(Widget::Text {
                    id: format!("{}.subtitle", screen.id),
                    text: subtitle.clone(),
                    variant: DEFAULT_TEXT_VARIANT.to_string(),
                    color: color.unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
                    align: "center".to_string(),
                });
            }
        }
    }

    if kind == "fileUpload" {
        widgets.push(Widget::FileUpload {
            id: format!("{}.file", screen.id),
            name: screen.id.clone(),
            label: DEFAULT_FILE_LABEL.to_string(),
            accept: Vec::new(),
            selected: legacy_file_name(values.get(&screen.id)),
        });
    }

    widgets.extend(
        screen
            .actions
            .iter()
            .enumerate()
            .map(|(index, button)| legacy_button(index, button)),
    );
    widgets
}

fn legacy_button(index: usize, button: &LegacyButton) -> Widget {
    Widget::LegacyButton {
        index,
        label: button.label.clone(),
        color: button.color.clone(),
        background: button.background.clone(),
        target: button.target.clone(),
    }
}

/// Follow a dotted path (`profile.step`) into `values`. Numbers and numeric
/// strings resolve; anything else is `None`.
pub fn resolve_number(expr: &str, values: &Map<String, Value>) -> Option<f64> {
    let mut parts = expr.split('.');
    let mut current = values.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// `value / max` clamped to `[0, 1]`. A non-positive max yields 0.
pub fn progress_fraction(value: f64, max: f64) -> f64 {
    if max <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / max).clamp(0.0, 1.0)
}

fn or_default(value: &Option<String>, default: &str) -> String {
    value.clone().unwrap_or_else(|| default.to_string())
}

fn text_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn file_name(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn legacy_file_name(value: Option<&Value>) -> Option<String> {
    value?
        .get("fileUploaded")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn selected_options(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> OnboardingConfig {
        serde_json::from_value(value).unwrap()
    }

    fn values(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn screen_defaults() {
        let config = config(json!({
            "appId": "a",
            "screens": [{ "id": "s1", "elements": [] }]
        }));
        let rendered = render_screen(&config, &config.screens[0], &Map::new());
        assert_eq!(rendered.background, "#FFFFFF");
        assert_eq!(rendered.layout.padding, 16.0);
        assert_eq!(rendered.layout.align, "stretch");
        assert!(!rendered.layout.scroll);
        assert!(rendered.widgets.is_empty());
    }

    #[test]
    fn background_prefers_screen_then_theme() {
        let config = config(json!({
            "appId": "a",
            "theme": { "colors": { "background": "#000000" } },
            "screens": [
                { "id": "own", "background": { "color": "#abcdef" }, "elements": [] },
                { "id": "themed", "layout": { "scroll": true, "padding": 4 }, "elements": [] }
            ]
        }));
        let own = render_screen(&config, &config.screens[0], &Map::new());
        assert_eq!(own.background, "#abcdef");
        let themed = render_screen(&config, &config.screens[1], &Map::new());
        assert_eq!(themed.background, "#000000");
        assert_eq!(themed.layout.padding, 4.0);
        assert!(themed.layout.scroll);
    }

    #[test]
    fn element_defaults_are_filled() {
        let config = config(json!({
            "appId": "a",
            "screens": [{ "id": "s", "elements": [
                { "id": "t", "type": "text", "props": { "text": "Hi" } },
                { "id": "i", "type": "image", "props": { "uri": "https://img.test/a.png" } },
                { "id": "b", "type": "button", "props": { "label": "Go" } },
                { "id": "f", "type": "fileUpload", "props": { "name": "doc" } }
            ] }]
        }));
        let widgets = render_screen(&config, &config.screens[0], &Map::new()).widgets;
        assert_eq!(
            widgets[0],
            Widget::Text {
                id: "t".into(),
                text: "Hi".into(),
                variant: "body".into(),
                color: "#222222".into(),
                align: "left".into(),
            }
        );
        assert!(matches!(&widgets[1], Widget::Image { height, resize_mode, .. }
            if *height == 180.0 && resize_mode == "contain"));
        assert!(matches!(&widgets[2], Widget::Button { background, color, size, .. }
            if background == "#007AFF" && color == "#ffffff" && size == "md"));
        assert!(matches!(&widgets[3], Widget::FileUpload { label, selected: None, .. }
            if label == "Choose File"));
    }

    #[test]
    fn inputs_read_current_values() {
        let config = config(json!({
            "appId": "a",
            "screens": [{ "id": "s", "elements": [
                { "id": "n", "type": "input", "props": { "name": "name", "required": true } },
                { "id": "m", "type": "multiSelect", "props": { "name": "topics", "options": ["rust", "go"] } },
                { "id": "f", "type": "fileUpload", "props": { "name": "doc" } }
            ] }]
        }));
        let values = values(json!({
            "name": "Ada",
            "topics": ["go"],
            "doc": { "name": "cv.pdf", "uri": "file:///tmp/cv.pdf" }
        }));
        let widgets = render_screen(&config, &config.screens[0], &values).widgets;
        assert!(matches!(&widgets[0], Widget::Input { value, required: true, .. } if value == "Ada"));
        let Widget::MultiSelect { options, .. } = &widgets[1] else {
            panic!("expected multi select");
        };
        assert_eq!(
            options.iter().map(|o| o.selected).collect::<Vec<_>>(),
            [false, true]
        );
        assert!(matches!(&widgets[2], Widget::FileUpload { selected: Some(n), .. } if n == "cv.pdf"));
    }

    #[test]
    fn progress_resolves_dotted_paths() {
        let values = values(json!({
            "profile": { "step": 30, "label": "45" },
            "list": [ { "n": 3 } ]
        }));
        assert_eq!(resolve_number("profile.step", &values), Some(30.0));
        assert_eq!(resolve_number("profile.label", &values), Some(45.0));
        assert_eq!(resolve_number("list.0.n", &values), Some(3.0));
        assert_eq!(resolve_number("profile.missing", &values), None);
        assert_eq!(resolve_number("profile", &values), None);

        assert_eq!(progress_fraction(30.0, 100.0), 0.3);
        assert_eq!(progress_fraction(250.0, 100.0), 1.0);
        assert_eq!(progress_fraction(-5.0, 100.0), 0.0);
        assert_eq!(progress_fraction(5.0, 0.0), 0.0);
    }

    #[test]
    fn progress_widget_missing_value_is_zero() {
        let config = config(json!({
            "appId": "a",
            "screens": [{ "id": "s", "elements": [
                { "id": "p", "type": "progress", "props": { "valueExpr": "steps.done", "max": 4 } }
            ] }]
        }));
        let widgets = render_screen(&config, &config.screens[0], &Map::new()).widgets;
        assert_eq!(
            widgets[0],
            Widget::Progress {
                id: "p".into(),
                value: 0.0,
                max: 4.0,
                fraction: 0.0
            }
        );
    }

    #[test]
    fn carousel_shows_first_slide() {
        let config = config(json!({
            "appId": "a",
            "screens": [{ "id": "s", "elements": [
                { "id": "c", "type": "carousel", "props": { "slides": [
                    { "caption": "one" }, { "caption": "two" }
                ] } }
            ] }]
        }));
        let widgets = render_screen(&config, &config.screens[0], &Map::new()).widgets;
        let Widget::Carousel { slide, slide_count, .. } = &widgets[0] else {
            panic!("expected carousel");
        };
        assert_eq!(slide.as_ref().and_then(|s| s.caption.as_deref()), Some("one"));
        assert_eq!(*slide_count, 2);
    }

    #[test]
    fn unknown_element_renders_placeholder() {
        let config = config(json!({
            "appId": "a",
            "screens": [{ "id": "s", "elements": [
                { "id": "v", "type": "video", "props": { "src": "x" } }
            ] }]
        }));
        let widgets = render_screen(&config, &config.screens[0], &Map::new()).widgets;
        assert_eq!(
            widgets[0],
            Widget::Unknown {
                id: "v".into(),
                type_name: "video".into()
            }
        );
        assert_eq!(Widget::unknown_message("video"), "Unknown type: video");
    }

    #[test]
    fn legacy_file_upload_screen() {
        let config = config(json!({
            "appId": "a",
            "screens": [{
                "id": "upload",
                "type": "fileUpload",
                "content": { "title": "Upload", "subtitle": "Your ID", "color": "#111", "background": "#eee" },
                "actions": [
                    { "type": "button", "label": "Back", "color": "#000", "background": "#fff", "target": "intro" },
                    { "type": "button", "label": "Done", "color": "#fff", "background": "#000", "target": "end" }
                ]
            }]
        }));
        let values = values(json!({ "upload": { "fileUploaded": "id.png" } }));
        let widgets = render_screen(&config, &config.screens[0], &values).widgets;
        assert_eq!(widgets.len(), 5);
        assert!(matches!(&widgets[0], Widget::Text { text, .. } if text == "Upload"));
        assert!(matches!(&widgets[1], Widget::Text { text, .. } if text == "Your ID"));
        assert!(matches!(&widgets[2], Widget::FileUpload { name, selected: Some(f), .. }
            if name == "upload" && f == "id.png"));
        assert!(matches!(&widgets[4], Widget::LegacyButton { index: 1, target, .. } if target == "end"));
    }

    #[test]
    fn legacy_unknown_screen_type() {
        let config = config(json!({
            "appId": "a",
            "screens": [{ "id": "q", "type": "quiz", "content": { "title": "?" } }]
        }));
        let widgets = render_screen(&config, &config.screens[0], &Map::new()).widgets;
        assert_eq!(
            widgets,
            [Widget::Unknown {
                id: "q".into(),
                type_name: "quiz".into()
            }]
        );
    }

    #[test]
    fn flow_progress() {
        let config = config(json!({
            "appId": "a",
            "screens": [{ "id": "a" }, { "id": "b" }, { "id": "c" }]
        }));
        let progress = FlowProgress::of(&config, "b").unwrap();
        assert_eq!(progress, FlowProgress { position: 2, total: 3 });
        assert_eq!(progress.to_string(), "2 of 3");
        assert!(FlowProgress::of(&config, "zzz").is_none());
    }

    #[test]
    fn widgets_serialize_tagged() {
        let widget = Widget::Unknown {
            id: "v".into(),
            type_name: "video".into(),
        };
        let json = serde_json::to_value(&widget).unwrap();
        assert_eq!(json["type"], "unknown");
        assert_eq!(json["typeName"], "video");
    }
}
