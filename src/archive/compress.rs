//! The compression pipe.
//!
//! Raw tar bytes go into an external compressor's stdin from a producer
//! thread while the compressor writes into a temp file next to the target.
//! The producer and the child run concurrently so a large archive can't
//! deadlock against a full pipe buffer. Only when both have finished cleanly
//! is the temp file renamed onto the final path.

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use tempfile::NamedTempFile;

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::cancel::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Pipe `raw` through `argv` into `output`.
///
/// A pre-existing `output` short-circuits the whole operation. On any failure
/// the temp file is removed and nothing appears at `output`.
pub fn compress(
    raw: Vec<u8>,
    argv: &[String],
    output: &Path,
    cancel: &CancellationToken,
) -> ArchiveResult<()> {
    if output.exists() {
        tracing::debug!(path = %output.display(), "archive already present, skipping compression");
        return Ok(());
    }

    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ArchiveError::EmptyCompressor(output.display().to_string()))?;
    let dir = output
        .parent()
        .ok_or_else(|| ArchiveError::InvalidPath(output.to_path_buf()))?;

    let temp = NamedTempFile::new_in(dir)?;
    let sink = temp.as_file().try_clone()?;

    tracing::debug!(
        program = %program,
        bytes = raw.len(),
        temp = %temp.path().display(),
        "spawning compressor"
    );

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::from(sink))
        .stderr(Stdio::piped())
        .spawn()?;

    let stdin = child.stdin.take();
    let producer = thread::spawn(move || -> io::Result<()> {
        // dropping stdin at the end closes the pipe and lets the child finish
        let mut stdin = stdin.ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "compressor stdin unavailable"))?;
        stdin.write_all(&raw)?;
        stdin.flush()
    });

    let stderr = child.stderr.take();
    let stderr_reader = thread::spawn(move || {
        let mut message = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut message);
        }
        message
    });

    let waited = wait_for(&mut child, cancel);
    let produced = producer
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("archive producer panicked")));
    let stderr = stderr_reader.join().unwrap_or_default();

    let status = waited?;
    if !status.success() {
        tracing::warn!(program = %program, %status, stderr = %stderr.trim(), "compressor failed");
        return Err(ArchiveError::CompressorFailed {
            program: program.clone(),
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }
    produced?;

    temp.as_file().sync_all()?;
    temp.persist(output).map_err(|e| e.error)?;
    Ok(())
}

/// Wait for the compressor, killing it if the job gets cancelled.
fn wait_for(child: &mut Child, cancel: &CancellationToken) -> ArchiveResult<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if cancel.is_cancelled() {
            tracing::debug!(pid = child.id(), "cancelling compressor");
            let _ = child.kill();
            let _ = child.wait();
            return Err(ArchiveError::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
