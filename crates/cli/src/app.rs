use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use turnstream_chat::{ChatTransport, ControllerStatus, StreamController};

/// Input line that ends the session.
pub const QUIT_COMMAND: &str = "/quit";

/// Drives `controller` from `input` lines until `/quit` or end of input.
///
/// Stdin and the live turn are multiplexed on the current task, so every
/// store mutation happens here one at a time. On end of input the loop keeps
/// draining the turn in flight before it returns. The controller is disposed
/// on exit.
pub async fn run<T, R, W>(
    controller: &mut StreamController<T>,
    input: R,
    view: &mut crate::TerminalView<W>,
) -> io::Result<()>
where
    T: ChatTransport,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut input_open = true;

    let result = loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        tracing::debug!("input closed, draining live turn");
                        input_open = false;
                        continue;
                    }
                    Err(error) => break Err(error),
                };

                let command = line.trim();
                if command == QUIT_COMMAND {
                    break Ok(());
                }
                if command.is_empty() {
                    continue;
                }

                if matches!(controller.status(), ControllerStatus::Streaming(_)) {
                    if let Err(error) = view.on_superseded() {
                        break Err(error);
                    }
                }
                if let Some(turn) = controller.send(&line) {
                    if controller.status() == ControllerStatus::Idle {
                        tracing::debug!(turn = %turn, "turn did not start");
                        if let Err(error) = view.notice("[interrupted: could not open stream]") {
                            break Err(error);
                        }
                    }
                }
            }
            Some(event) = controller.next_event() => {
                let update = controller.handle_event(event);
                if let Err(error) = view.on_update(&update, controller.store()) {
                    break Err(error);
                }
            }
            else => break Ok(()),
        }
    };

    controller.dispose();
    result
}
