//! Operator prompts on stdin.
//!
//! A read that is abandoned because of an interrupt keeps its blocking
//! thread, so the next prompt picks up that same read instead of starting
//! a second one that would never see the operator's answer.

use std::io;
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type LineReader = Arc<dyn Fn() -> io::Result<String> + Send + Sync>;

pub struct Console {
    read: LineReader,
    pending: Option<JoinHandle<io::Result<String>>>,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("pending", &self.pending.is_some())
            .finish_non_exhaustive()
    }
}

impl Console {
    pub fn stdin() -> Self {
        Self::with_reader(|| {
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            Ok(line)
        })
    }

    pub fn with_reader(read: impl Fn() -> io::Result<String> + Send + Sync + 'static) -> Self {
        Self {
            read: Arc::new(read),
            pending: None,
        }
    }

    /// Next line of input. With a token, returns `None` as soon as it is
    /// cancelled; the read stays pending for the next call.
    pub async fn read_line(&mut self, cancel: Option<&CancellationToken>) -> anyhow::Result<Option<String>> {
        let mut read = match self.pending.take() {
            Some(read) => read,
            None => {
                let reader = Arc::clone(&self.read);
                tokio::task::spawn_blocking(move || reader())
            }
        };

        let Some(cancel) = cancel else {
            let line = read.await.context("stdin reader stopped")?;
            return Ok(Some(line.context("failed to read from stdin")?));
        };
        tokio::select! {
            line = &mut read => {
                let line = line.context("stdin reader stopped")?;
                Ok(Some(line.context("failed to read from stdin")?))
            }
            _ = cancel.cancelled() => {
                self.pending = Some(read);
                Ok(None)
            }
        }
    }

    /// Print `message` and wait for a line, or `None` on interrupt.
    pub async fn prompt(&mut self, message: &str, cancel: &CancellationToken) -> anyhow::Result<Option<String>> {
        println!("{message}");
        self.read_line(Some(cancel)).await
    }
}
