//! Fail-fast termination.
//!
//! The launch result is matched exactly once, here. A failure is reported in
//! full, a short grace delay lets log output drain, and the caller then exits
//! the process through [`abort`]. No cleanup runs after a fatal failure; an
//! external supervisor is expected to restart the node.

use std::error::Error as _;
use std::io::Write;
use std::time::Duration;

use crate::lifecycle::error::LaunchFailure;
use crate::observability::metrics;

/// Exit status for every fatal failure.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Terminal state of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    NormalExit,
    FatalExit(i32),
}

impl ExitOutcome {
    pub fn code(&self) -> i32 {
        match self {
            ExitOutcome::NormalExit => 0,
            ExitOutcome::FatalExit(code) => *code,
        }
    }
}

/// The single top-level failure handler.
pub struct FailFast<W: Write> {
    sink: W,
    grace: Duration,
}

impl<W: Write> FailFast<W> {
    /// Report to `sink` and wait `grace` before declaring a fatal exit.
    pub fn new(sink: W, grace: Duration) -> Self {
        Self { sink, grace }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Turn the launch result into the process outcome.
    pub async fn handle(&mut self, result: Result<(), LaunchFailure>) -> ExitOutcome {
        let failure = match result {
            Ok(()) => return ExitOutcome::NormalExit,
            Err(failure) => failure,
        };

        metrics::record_fatal(failure.kind().as_str());
        self.report(&failure);

        tracing::error!(
            grace_ms = self.grace.as_millis() as u64,
            exit_code = FATAL_EXIT_CODE,
            "Terminating process after grace period"
        );
        tokio::time::sleep(self.grace).await;
        ExitOutcome::FatalExit(FATAL_EXIT_CODE)
    }

    fn report(&mut self, failure: &LaunchFailure) {
        tracing::error!(
            kind = failure.kind().as_str(),
            stage = %failure.stage(),
            error = %failure,
            "Fatal launch failure"
        );

        // The sink is the last line of defence; nothing else to do if it fails.
        let _ = write_report(&mut self.sink, failure);
        let _ = self.sink.flush();
    }

    pub fn into_sink(self) -> W {
        self.sink
    }
}

fn write_report(sink: &mut impl Write, failure: &LaunchFailure) -> std::io::Result<()> {
    writeln!(sink, "[swarm-launcher] Caught {} failure:", failure.kind().as_str())?;
    writeln!(sink, "error: {}", failure)?;

    let mut previous = failure.to_string();
    let mut source = failure.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !previous.contains(&text) {
            writeln!(sink, "  caused by: {}", text)?;
        }
        previous = text;
        source = cause.source();
    }

    writeln!(sink, "details: {:#?}", failure.error())?;
    if let Some(backtrace) = failure.backtrace() {
        writeln!(sink, "backtrace:\n{}", backtrace)?;
    }
    Ok(())
}

/// Exit immediately with `code`, skipping destructors and pending work.
///
/// Only `main` calls this, after [`FailFast::handle`] returned a fatal outcome.
pub fn abort(code: i32) -> ! {
    std::process::exit(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::error::{LaunchError, StartupError};
    use crate::lifecycle::supervisor::Stage;
    use crate::net::NetError;
    use crate::rendezvous::RendezvousError;
    use crate::workload::{BuildError, WorkloadError};
    use tokio::time::Instant;

    fn startup() -> LaunchFailure {
        let err = RendezvousError::Transport(NetError::Unreachable { attempted: 2 });
        LaunchFailure::new(LaunchError::from(StartupError::from(err)), Stage::BackendBound)
    }

    fn build() -> LaunchFailure {
        let err = BuildError::MissingField {
            target: "swarm.rounds".into(),
            field: "max_rounds".into(),
        };
        LaunchFailure::new(LaunchError::from(err), Stage::RendezvousReady)
    }

    fn runtime() -> LaunchFailure {
        let err = WorkloadError::RoundFailed {
            round: 7,
            reason: "peer vanished".into(),
        };
        LaunchFailure::new(LaunchError::from(err), Stage::Running)
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_kind_is_fatal_after_grace() {
        for (failure, needle) in [
            (startup(), "no initial peer reachable"),
            (build(), "missing required field 'max_rounds'"),
            (runtime(), "round 7 failed: peer vanished"),
        ] {
            let mut handler = FailFast::new(Vec::new(), Duration::from_secs(3));
            let started = Instant::now();
            let outcome = handler.handle(Err(failure)).await;

            assert_eq!(outcome, ExitOutcome::FatalExit(1));
            assert_eq!(outcome.code(), FATAL_EXIT_CODE);
            assert!(started.elapsed() >= Duration::from_secs(3));

            let report = String::from_utf8(handler.into_sink()).unwrap();
            assert!(report.starts_with("[swarm-launcher] Caught"));
            assert!(report.contains(needle), "report missing {needle:?}:\n{report}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_silent_and_immediate() {
        let mut handler = FailFast::new(Vec::new(), Duration::from_secs(3));
        let started = Instant::now();
        let outcome = handler.handle(Ok(())).await;

        assert_eq!(outcome, ExitOutcome::NormalExit);
        assert_eq!(outcome.code(), 0);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(handler.into_sink().is_empty());
    }

    #[test]
    fn test_report_skips_causes_already_shown() {
        let mut sink = Vec::new();
        write_report(&mut sink, &startup()).unwrap();
        let report = String::from_utf8(sink).unwrap();
        assert_eq!(report.matches("no initial peer reachable").count(), 1, "{report}");
        assert!(!report.contains("caused by"));
        assert!(report.contains("[stage: backend-bound]"));
        assert!(report.contains("details:"));
    }
}
