//! Ctrl+C, SIGTERM and SIGHUP handling.
//!
//! The first signal cancels the token handed out by
//! [`install_signal_handler`]. Waits observe it, the album being worked on
//! is recorded as failed, and the browser is still closed. A second signal
//! ends the process on the spot.

use tokio_util::sync::CancellationToken;

/// Exit status for a run stopped by the operator.
pub(crate) const INTERRUPTED_EXIT_CODE: i32 = 130;

/// The termination signals the process reacts to.
struct Signals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl Signals {
    #[cfg(unix)]
    fn register() -> Self {
        use tokio::signal::unix::{signal, SignalKind};
        Self {
            terminate: signal(SignalKind::terminate()).expect("failed to register SIGTERM handler"),
            hangup: signal(SignalKind::hangup()).expect("failed to register SIGHUP handler"),
        }
    }

    #[cfg(not(unix))]
    fn register() -> Self {
        Self {}
    }

    async fn next(&mut self) {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = self.terminate.recv() => {}
                _ = self.hangup.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for Ctrl+C");
        }
    }
}

pub(crate) fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let stop = token.clone();

    tokio::spawn(async move {
        let mut signals = Signals::register();

        signals.next().await;
        tracing::info!("Interrupted, finishing the current step (press Ctrl+C again to quit now)");
        stop.cancel();

        signals.next().await;
        tracing::warn!("Second interrupt, exiting immediately");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    });

    token
}
