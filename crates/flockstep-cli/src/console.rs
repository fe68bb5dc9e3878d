//! Interactive operator console on stdin.

use flockstep_core::{Intent, IntentRouter};
use flockstep_proto::OutboundMessage;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Starts the console thread.
pub fn spawn(router: IntentRouter, running: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            if let Err(e) = run(&router, &running, stdin.lock(), std::io::stdout()) {
                warn!(error = %e, "Console stopped");
            }
        })
}

/// Reads commands until EOF or shutdown.
fn run<R, W>(router: &IntentRouter, running: &AtomicBool, input: R, mut output: W) -> std::io::Result<()>
where
    R: BufRead,
    W: Write,
{
    write!(output, "> ")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        if !running.load(Ordering::Acquire) {
            break;
        }

        match Intent::parse_console(&line) {
            Ok(Some(intent)) => {
                if let Some(reply) = router.dispatch(intent) {
                    print_reply(&mut output, &reply)?;
                }
            }
            Ok(None) => {}
            Err(e) => writeln!(output, "{e}")?,
        }

        write!(output, "> ")?;
        output.flush()?;
    }

    debug!("Console input closed");
    Ok(())
}

fn print_reply<W: Write>(output: &mut W, reply: &OutboundMessage) -> std::io::Result<()> {
    match reply {
        OutboundMessage::ListReply { files } if files.is_empty() => writeln!(output, "No shows found"),
        OutboundMessage::ListReply { files } => {
            for file in files {
                writeln!(output, "  {file}")?;
            }
            Ok(())
        }
        OutboundMessage::Error { message } => writeln!(output, "{message}"),
        OutboundMessage::Status(_) => Ok(()),
    }
}
