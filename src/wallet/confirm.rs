use crate::error::Result;
use crate::i18n::LanguageStore;
use async_trait::async_trait;
use base64::Engine;
use log::{info, warn};
use std::io::Write;

/// A dialog: a title, body lines and optional button labels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prompt {
    pub title: String,
    pub lines: Vec<String>,
    pub confirm_label: Option<String>,
    pub cancel_label: Option<String>,
}

impl Prompt {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn buttons(mut self, confirm: impl Into<String>, cancel: impl Into<String>) -> Self {
        self.confirm_label = Some(confirm.into());
        self.cancel_label = Some(cancel.into());
        self
    }

    /// Builds a notice from a `modals.*` block with `title`, `lines`/`items`, `ok`.
    pub fn from_modal(store: &LanguageStore, modal: &str) -> Self {
        let mut lines = store.list(&format!("{}.lines", modal));
        if lines.is_empty() {
            lines = store.list(&format!("{}.items", modal));
        }
        let mut prompt = Prompt::new(store.t(&format!("{}.title", modal))).lines(lines);
        prompt.confirm_label = Some(store.t(&format!("{}.ok", modal)));
        prompt
    }

    pub fn render(&self) -> String {
        let mut text = self.title.clone();
        for line in &self.lines {
            text.push('\n');
            text.push_str(line);
        }
        text
    }
}

/// Where yes/no questions and notices go; the core flows never touch a UI directly.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, prompt: &Prompt) -> bool;
    async fn notify(&self, notice: &Prompt);
}

/// Reads `y`/`n` answers from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleConfirmer;

#[async_trait]
impl Confirmer for ConsoleConfirmer {
    async fn confirm(&self, prompt: &Prompt) -> bool {
        let question = format!("{}\n[y/N] ", prompt.render());
        let answer = tokio::task::spawn_blocking(move || {
            print!("\n{}", question);
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
            Ok(Err(e)) => {
                warn!("Failed to read confirmation: {}", e);
                false
            }
            Err(e) => {
                warn!("Confirmation task failed: {}", e);
                false
            }
        }
    }

    async fn notify(&self, notice: &Prompt) {
        println!("\n{}", notice.render());
    }
}

/// Accepts everything; notices go to the log. Used for `--yes` and headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirmer;

#[async_trait]
impl Confirmer for AutoConfirmer {
    async fn confirm(&self, prompt: &Prompt) -> bool {
        info!("Auto-confirmed: {}", prompt.title);
        true
    }

    async fn notify(&self, notice: &Prompt) {
        info!("{}", notice.render().replace('\n', " | "));
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}

/// Sets the terminal clipboard with an OSC 52 escape sequence.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalClipboard;

impl Clipboard for TerminalClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(text);
        let mut stdout = std::io::stdout();
        write!(stdout, "\x1b]52;c;{}\x07", encoded)?;
        stdout.flush()?;
        Ok(())
    }
}
