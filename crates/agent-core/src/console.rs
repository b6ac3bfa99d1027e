//! Shared Terminal
//!
//! Standard input and output are one resource: a prompt and the line that
//! answers it must not interleave with another prompt or with streamed text.
//! Every operation takes the lock for exactly one write or prompt-and-read
//! cycle and drops it on return, error included.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

struct Io {
    reader: Reader,
    writer: Writer,
}

/// Line-oriented terminal shared by the turn loop and the confirmation gate
pub struct Console {
    io: Mutex<Io>,
}

impl Console {
    pub fn new(
        reader: impl AsyncBufRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            io: Mutex::new(Io {
                reader: Box::new(reader),
                writer: Box::new(writer),
            }),
        }
    }

    /// Process stdin/stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }

    /// Write `prompt`, then read one line. `None` on end of input.
    pub async fn read_line(&self, prompt: &str) -> std::io::Result<Option<String>> {
        let mut io = self.io.lock().await;
        io.writer.write_all(prompt.as_bytes()).await?;
        io.writer.flush().await?;

        // Bytes, not `read_line`: stray non-UTF-8 input is replaced, never fatal.
        let mut buf = Vec::new();
        if io.reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    /// Write a fragment and flush it immediately
    pub async fn write(&self, text: &str) -> std::io::Result<()> {
        let mut io = self.io.lock().await;
        io.writer.write_all(text.as_bytes()).await?;
        io.writer.flush().await
    }
}
