//! Stop an upload run on SIGINT (Ctrl+C), SIGTERM or SIGHUP.
//!
//! The first signal cancels the run's [`CancellationToken`]: discovery stops
//! queueing files and no new upload attempt starts, while an attempt already
//! on the wire is allowed to finish and land in `uploaded_files.txt`. Files
//! left unrecorded are picked up again by the next run. A second signal
//! abandons the in-flight uploads and exits with status 130.

use tokio_util::sync::CancellationToken;

/// What a received signal does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalAction {
    /// Stop handing out work and let in-flight uploads record.
    Drain,
    /// Give up on in-flight uploads.
    Abandon,
}

fn action_for(signals_seen: u32) -> SignalAction {
    if signals_seen <= 1 {
        SignalAction::Drain
    } else {
        SignalAction::Abandon
    }
}

/// Signal listeners registered once for the lifetime of the run.
struct Signals {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sighup: tokio::signal::unix::Signal,
}

impl Signals {
    fn register() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let sigterm =
                signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
            let sighup = signal(SignalKind::hangup()).expect("failed to register SIGHUP handler");
            Self { sigterm, sighup }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    #[cfg(unix)]
    async fn next(&mut self) -> &'static str {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sighup.recv() => "SIGHUP",
        }
    }

    #[cfg(not(unix))]
    async fn next(&mut self) -> &'static str {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for Ctrl+C");
        "Ctrl+C"
    }
}

/// Register the signal listeners and return the token they cancel.
pub(crate) fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let mut signals = Signals::register();

    let handler_token = token.clone();
    tokio::spawn(async move {
        let mut seen = 0u32;
        loop {
            let name = signals.next().await;
            seen += 1;
            match action_for(seen) {
                SignalAction::Drain => {
                    tracing::info!(
                        signal = name,
                        "Stopping: no new uploads will start, in-flight uploads will be recorded"
                    );
                    tracing::info!("Press Ctrl+C again to abandon in-flight uploads");
                    handler_token.cancel();
                }
                SignalAction::Abandon => {
                    tracing::warn!(
                        signal = name,
                        "Abandoning in-flight uploads; they will be re-sent next run"
                    );
                    std::process::exit(130);
                }
            }
        }
    });

    token
}
