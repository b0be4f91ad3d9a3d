use std::io::Write;

/// Receives the plain rendering once per dirty poll cycle.
pub trait ConsoleSink: Send {
    fn emit(&mut self, text: &str);
}

/// Prints each rendering to stdout followed by a blank line.
#[derive(Debug, Default)]
pub struct StdoutConsole;

impl ConsoleSink for StdoutConsole {
    fn emit(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{text}\n");
        let _ = out.flush();
    }
}
