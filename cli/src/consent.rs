//! Install consent from a human at the terminal.

use std::io::{BufRead, IsTerminal, Write};

use async_trait::async_trait;
use tokentrim::InstallConsent;

/// Asks `[y/N]` on stderr and reads the answer from stdin. Declines when
/// stdin is not a terminal, so piped input is never taken as an answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsent;

#[async_trait]
impl InstallConsent for TerminalConsent {
    async fn confirm(&self, prompt: &str) -> bool {
        if !std::io::stdin().is_terminal() {
            tracing::info!("stdin is not a terminal; install declined (pass --yes to allow)");
            return false;
        }
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || ask(&prompt))
            .await
            .unwrap_or(false)
    }
}

fn ask(prompt: &str) -> bool {
    let mut stderr = std::io::stderr();
    if write!(stderr, "{} [y/N] ", prompt).and_then(|_| stderr.flush()).is_err() {
        return false;
    }
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => parse_answer(&line),
        Err(_) => false,
    }
}

fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_yes_accepts() {
        assert!(parse_answer("y\n"));
        assert!(parse_answer(" YES "));
        assert!(!parse_answer("\n"));
        assert!(!parse_answer("n"));
        assert!(!parse_answer("sure"));
    }
}
