//! Transform that pipes bytes through an external program.

use std::ffi::OsString;
use std::io;
use std::pin::pin;
use std::process::Stdio;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::Transform;
use crate::store::ReaderChunks;
use crate::types::ChunkStream;
use crate::{CachineError, Result};

/// Chunks buffered between the child's stdout and the consumer.
const OUTPUT_BUFFER: usize = 16;

/// Runs a program with the input on stdin and yields its stdout.
///
/// The program is spawned when the output stream is first driven (inside a
/// tokio task) and killed if the output stream is dropped early. A spawn
/// failure or a non-zero exit status is reported as
/// [`CachineError::Transform`] carrying the program's stderr. An error on
/// the input stream is passed through unchanged.
///
/// # Panics
///
/// [`apply`](Transform::apply) requires a tokio runtime context.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandTransform {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    fn display_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    async fn run(self, input: ChunkStream, tx: &mpsc::Sender<Result<Bytes>>) -> Result<()> {
        let name = self.display_name();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CachineError::Transform(format!("failed to spawn {name}: {e}")))?;
        debug!(program = %name, pid = ?child.id(), "spawned transform");

        let (Some(mut stdin), Some(stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(CachineError::Transform(format!("{name}: stdio not captured")));
        };

        let feed = async move {
            let mut input = input;
            while let Some(chunk) = input.next().await {
                let chunk = chunk?;
                match stdin.write_all(&chunk).await {
                    Ok(()) => {}
                    // The program stopped reading; its exit status decides.
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
                    Err(e) => return Err(pipe_error(&name, "stdin", e)),
                }
            }
            // Dropping stdin signals end of input.
            Ok(())
        };

        let drain = async {
            let mut chunks = pin!(ReaderChunks::new(stdout, self.display_name()));
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk.map_err(|e| CachineError::Transform(e.to_string()))?;
                if tx.send(Ok(chunk)).await.is_err() {
                    return Err(CachineError::Transform("output stream dropped".into()));
                }
            }
            Ok(())
        };

        let collect_stderr = async {
            let mut buf = Vec::new();
            stderr
                .read_to_end(&mut buf)
                .await
                .map_err(|e| pipe_error(&self.display_name(), "stderr", e))?;
            Ok::<_, CachineError>(buf)
        };

        let ((), (), stderr) = tokio::try_join!(feed, drain, collect_stderr)?;

        let status = child
            .wait()
            .await
            .map_err(|e| CachineError::Transform(format!("{}: {e}", self.display_name())))?;
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(CachineError::Transform(format!(
                "{} exited with {status}: {}",
                self.display_name(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn pipe_error(program: &str, pipe: &str, e: io::Error) -> CachineError {
    CachineError::Transform(format!("{program} {pipe}: {e}"))
}

impl Transform for CommandTransform {
    fn apply(self: Box<Self>, input: ChunkStream) -> ChunkStream {
        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
        let this = *self;

        tokio::spawn(async move {
            if let Err(e) = this.run(input, &tx).await {
                let _ = tx.send(Err(e)).await; // receiver may be gone
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}
