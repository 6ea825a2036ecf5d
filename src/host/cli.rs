//! CLI host: drives a flow over stdin/stdout for local testing.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Mutex;

use crate::onboarding::{
    CollectedData, FilePicker, Flow, FlowHost, FlowProgress, PickedFile, RenderedScreen, Widget,
};

/// Prints toasts and permission requests, and keeps the finished payload.
#[derive(Default)]
pub struct CliHost {
    finished: Mutex<Option<CollectedData>>,
}

impl CliHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected data, once the flow has finished.
    pub async fn take(&self) -> Option<CollectedData> {
        self.finished.lock().await.take()
    }
}

#[async_trait]
impl FlowHost for CliHost {
    async fn on_finish(&self, data: CollectedData) {
        *self.finished.lock().await = Some(data);
    }

    async fn show_toast(&self, message: &str) {
        eprintln!("💬 {}", message);
    }

    async fn request_permissions(&self, permissions: &[String]) {
        eprintln!("🔐 Permissions requested: {}", permissions.join(", "));
    }
}

/// Picker that hands out a path queued by the `file` command.
#[derive(Default)]
pub struct PathFilePicker {
    pending: Mutex<Option<PathBuf>>,
}

impl PathFilePicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn queue(&self, path: PathBuf) {
        *self.pending.lock().await = Some(path);
    }
}

#[async_trait]
impl FilePicker for PathFilePicker {
    async fn pick(&self, _accept: &[String]) -> Option<PickedFile> {
        let path = self.pending.lock().await.take()?;
        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => Some(meta.len()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Picked file is not readable");
                return None;
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Selected file".to_string());
        Some(PickedFile {
            name,
            mime_type: None,
            size,
            uri: Some(format!("file://{}", path.display())),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Press(String),
    Legacy(usize),
    Set { element_id: String, value: Value },
    Toggle { element_id: String, option: String },
    File { element_id: String, path: PathBuf },
    Finish,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  press <element>            activate an element
  <n>                        press button n of a classic screen
  set <element> <value>      set an input (JSON or plain text)
  toggle <element> <option>  toggle a multi-select option
  file <element> <path>      pick a file for an upload element
  finish                     end the flow now
  show                       redraw the current screen
  quit                       exit without finishing";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if let Ok(index) = line.parse::<usize>() {
        return Ok(Command::Legacy(index));
    }
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let (arg, tail) = rest.split_once(' ').unwrap_or((rest, ""));
    let tail = tail.trim();

    let need = |what: &str| format!("usage: {verb} {what}");
    match verb {
        "press" | "tap" if !arg.is_empty() => Ok(Command::Press(arg.to_string())),
        "set" if !arg.is_empty() => Ok(Command::Set {
            element_id: arg.to_string(),
            value: serde_json::from_str(tail).unwrap_or_else(|_| Value::String(tail.to_string())),
        }),
        "toggle" if !arg.is_empty() && !tail.is_empty() => Ok(Command::Toggle {
            element_id: arg.to_string(),
            option: tail.to_string(),
        }),
        "file" if !arg.is_empty() && !tail.is_empty() => Ok(Command::File {
            element_id: arg.to_string(),
            path: PathBuf::from(tail),
        }),
        "press" | "tap" => Err(need("<element>")),
        "set" => Err(need("<element> <value>")),
        "toggle" => Err(need("<element> <option>")),
        "file" => Err(need("<element> <path>")),
        "finish" => Ok(Command::Finish),
        "show" => Ok(Command::Show),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "/quit" => Ok(Command::Quit),
        other => Err(format!("unknown command: {other} (try `help`)")),
    }
}

/// Plain-text rendering of a screen.
pub fn render_text(screen: &RenderedScreen, progress: Option<FlowProgress>) -> String {
    let mut out = String::new();
    match progress {
        Some(p) => out.push_str(&format!("── {} ({}) ──\n", screen.screen_id, p)),
        None => out.push_str(&format!("── {} ──\n", screen.screen_id)),
    }
    for widget in &screen.widgets {
        let line = match widget {
            Widget::Text { text, variant, .. } if variant.starts_with('h') => text.to_uppercase(),
            Widget::Text { text, .. } => text.clone(),
            Widget::Image { uri, .. } => format!("[image {uri}]"),
            Widget::Button { id, label, .. } => format!("[{label}] (press {id})"),
            Widget::Input {
                id,
                label,
                placeholder,
                value,
                required,
                ..
            } => {
                let label = label.as_deref().unwrap_or(id);
                let marker = if *required { "*" } else { "" };
                let shown = if value.is_empty() {
                    placeholder.clone().unwrap_or_default()
                } else {
                    value.clone()
                };
                format!("{label}{marker}: {shown} (set {id})")
            }
            Widget::FileUpload {
                id,
                label,
                selected,
                ..
            } => match selected {
                Some(name) => format!("✓ {name} (file {id})"),
                None => format!("📁 {label} (file {id})"),
            },
            Widget::MultiSelect {
                id,
                label,
                options,
                ..
            } => {
                let choices: Vec<String> = options
                    .iter()
                    .map(|o| {
                        let mark = if o.selected { "x" } else { " " };
                        format!("[{mark}] {}", o.label)
                    })
                    .collect();
                format!(
                    "{}: {} (toggle {id})",
                    label.as_deref().unwrap_or(id),
                    choices.join("  ")
                )
            }
            Widget::Progress { fraction, .. } => {
                let filled = (fraction * 20.0).round() as usize;
                format!("[{}{}] {:.0}%", "#".repeat(filled), "-".repeat(20 - filled), fraction * 100.0)
            }
            Widget::Carousel {
                slide, slide_count, ..
            } => {
                let caption = slide
                    .as_ref()
                    .and_then(|s| s.caption.as_deref())
                    .unwrap_or("");
                format!("<{caption}> (1/{slide_count})")
            }
            Widget::PermissionList { items, .. } => items
                .iter()
                .map(|item| match &item.subtitle {
                    Some(sub) => format!("• {}: {}", item.title, sub),
                    None => format!("• {}", item.title),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Widget::Banner {
                title, subtitle, ..
            } => match subtitle {
                Some(sub) => format!("== {title} ==\n{sub}"),
                None => format!("== {title} =="),
            },
            Widget::LegacyButton { index, label, .. } => format!("[{label}] (press {index})"),
            Widget::Unknown { type_name, .. } => Widget::unknown_message(type_name),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Run the REPL until the flow finishes, input ends, or the user quits.
pub async fn run<R>(flow: &mut Flow, picker: &PathFilePicker, input: R) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    show(flow);

    while !flow.is_finished() {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };

        let result = match command {
            Command::Quit => break,
            Command::Help => {
                eprintln!("{HELP}");
                continue;
            }
            Command::Show => {
                show(flow);
                continue;
            }
            Command::Press(id) => flow.press(&id).await.map(|_| ()),
            Command::Legacy(index) => flow.press_legacy(index).await.map(|_| ()),
            Command::Set { element_id, value } => flow.set_value(&element_id, value),
            Command::Toggle { element_id, option } => {
                flow.toggle_option(&element_id, &option).map(|_| ())
            }
            Command::File { element_id, path } => {
                picker.queue(path).await;
                flow.pick_file(&element_id).await.map(|_| ())
            }
            Command::Finish => flow.finish().await,
        };

        match result {
            Ok(()) if !flow.is_finished() => show(flow),
            Ok(()) => {}
            Err(e) => eprintln!("⚠️  {}", e),
        }
    }
    Ok(())
}

fn show(flow: &Flow) {
    if let Some(screen) = flow.rendered() {
        println!("\n{}", render_text(&screen, flow.progress()));
    }
}
