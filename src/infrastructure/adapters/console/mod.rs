//! Console adapter - line-based operator console

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

/// Reads operator commands line by line and prints replies
pub struct ConsoleAdapter<R = BufReader<Stdin>> {
    lines: Lines<R>,
    prompt: String,
    open: bool,
}

impl ConsoleAdapter {
    /// Console on the process' standard input
    pub fn stdin(prompt: impl Into<String>) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), prompt)
    }
}

impl<R: AsyncBufRead + Unpin> ConsoleAdapter<R> {
    pub fn new(reader: R, prompt: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            prompt: prompt.into(),
            open: true,
        }
    }

    /// Whether input is still available
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Next trimmed input line; `None` once input is closed
    pub async fn read_line(&mut self) -> Option<String> {
        if !self.open {
            return None;
        }

        if !self.prompt.is_empty() {
            print!("{}", self.prompt);
            let _ = std::io::stdout().flush();
        }

        match self.lines.next_line().await {
            Ok(Some(line)) => Some(line.trim().to_string()),
            Ok(None) => {
                self.open = false;
                None
            }
            Err(e) => {
                tracing::warn!("Console input failed: {}", e);
                self.open = false;
                None
            }
        }
    }

    pub fn send(&self, text: &str) {
        println!("{}", text.trim_end());
    }
}
