//! Terminal implementation of [`UserPrompt`].

use super::{NoticeLevel, UserPrompt};
use colored::Colorize;
use futures::future::BoxFuture;
use std::io::{self, IsTerminal, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Asks questions on stdin/stdout.
///
/// A preset answer (from `--yes` / `--no`) short-circuits every question. Without one, a
/// non-interactive stdin declines.
#[derive(Debug, Default, Clone)]
pub struct TerminalPrompt {
    preset: Option<bool>,
}

impl TerminalPrompt {
    #[must_use]
    pub const fn new(preset: Option<bool>) -> Self {
        Self {
            preset,
        }
    }
}

impl UserPrompt for TerminalPrompt {
    fn confirm<'a>(&'a self, title: &'a str, message: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            println!("{} {}", format!("[{title}]").bold(), message);

            if let Some(answer) = self.preset {
                println!("{}", if answer { "yes" } else { "no" }.dimmed());
                return answer;
            }

            if !io::stdin().is_terminal() {
                println!("{}", "Non-interactive terminal, answering no.".yellow());
                return false;
            }

            print!("{} ", "[y/N]:".green());
            if io::stdout().flush().is_err() {
                return false;
            }

            let mut reader = BufReader::new(tokio::io::stdin());
            let mut response = String::new();
            if reader.read_line(&mut response).await.is_err() {
                return false;
            }

            matches!(response.trim().to_lowercase().as_str(), "y" | "yes")
        })
    }

    fn notify<'a>(
        &'a self,
        title: &'a str,
        message: &'a str,
        level: NoticeLevel,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match level {
                NoticeLevel::Info => println!("{} {}", format!("[{title}]").bold(), message.green()),
                NoticeLevel::Error => {
                    eprintln!("{} {}", format!("[{title}]").bold(), message.red());
                }
            }
        })
    }
}
