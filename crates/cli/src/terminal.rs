use std::io::{self, Write};

use chrono::Local;
use turnstream_chat::{ConversationStore, Message, TurnUpdate};

/// Line-oriented renderer for a conversation streaming into a terminal.
///
/// Only the unseen suffix of the provisional reply is written on each
/// fragment, so output grows with the reply instead of being redrawn.
pub struct TerminalView<W> {
    out: W,
    printed: usize,
    streaming: bool,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            streaming: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// A new send replaced the turn that was still streaming.
    pub fn on_superseded(&mut self) -> io::Result<()> {
        self.notice("[superseded]")
    }

    /// Prints a one-line status note on its own line.
    pub fn notice(&mut self, note: &str) -> io::Result<()> {
        if self.streaming {
            writeln!(self.out)?;
        }
        writeln!(self.out, "{note}")?;
        self.reset();
        self.out.flush()
    }

    pub fn on_update(&mut self, update: &TurnUpdate, store: &ConversationStore) -> io::Result<()> {
        match update {
            TurnUpdate::Ignored => return Ok(()),
            TurnUpdate::Fragment { .. } => {
                let Some(reply) = store.provisional() else {
                    return Ok(());
                };
                if !self.streaming {
                    write!(self.out, "{} ", header(reply))?;
                    self.streaming = true;
                }
                if let Some(suffix) = reply.text.get(self.printed..) {
                    self.out.write_all(suffix.as_bytes())?;
                }
                self.printed = reply.text.len();
            }
            TurnUpdate::Completed { message, .. } => {
                if self.streaming {
                    writeln!(self.out)?;
                } else if message.is_none() {
                    writeln!(self.out, "[no reply]")?;
                }
                self.reset();
            }
            TurnUpdate::Failed { reason, .. } => {
                return self.notice(&format!("[interrupted: {reason}]"));
            }
        }
        self.out.flush()
    }

    fn reset(&mut self) {
        self.printed = 0;
        self.streaming = false;
    }
}

fn header(message: &Message) -> String {
    format!(
        "{} • {} >",
        message.role,
        message.at.with_timezone(&Local).format("%H:%M:%S")
    )
}
