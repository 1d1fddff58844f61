//! Live snapshot follower.
//!
//! Drives a `TripSnapshotSubscription` and prints every new snapshot to
//! stdout. Connection transitions and non-fatal errors go to stderr.

use std::sync::Arc;

use owo_colors::OwoColorize;

use fleetwatch_core::{
    ConnectionState, SnapshotState, SnapshotStream, SubscriptionError, TripId, TripSnapshot,
    TripSnapshotSubscription,
};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::snapshot;

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut config = config::build_subscription_config(global)?;
    config::apply_watch_overrides(&mut config, args);
    tracing::debug!(policy = ?config.reconnect, "reconnect policy");

    let mut sub = TripSnapshotSubscription::from_config(&config);
    let mut states = sub.watch();

    sub.set_target(Some(TripId::from(args.trip_id.as_str()))).await;
    sub.enable().await;

    let mut follower = Follower::new(args, global);
    let result = follower.run(&mut states).await;

    sub.dispose().await;
    result
}

// ── Follow loop ─────────────────────────────────────────────────────

struct Follower<'a> {
    args: &'a WatchArgs,
    global: &'a GlobalOpts,
    color: bool,
    printed: usize,
    last_snapshot: Option<Arc<TripSnapshot>>,
    last_error: Option<SubscriptionError>,
    last_connection: ConnectionState,
    was_connected: bool,
}

/// What the loop should do after observing one state.
enum Step {
    Continue,
    Done,
}

impl<'a> Follower<'a> {
    fn new(args: &'a WatchArgs, global: &'a GlobalOpts) -> Self {
        Self {
            args,
            global,
            color: output::should_color(global.color),
            printed: 0,
            last_snapshot: None,
            last_error: None,
            last_connection: ConnectionState::Disconnected,
            was_connected: false,
        }
    }

    async fn run(&mut self, states: &mut SnapshotStream) -> Result<(), CliError> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            let state = tokio::select! {
                biased;
                _ = &mut ctrl_c => {
                    self.status("interrupted");
                    return Ok(());
                }
                next = states.changed() => match next {
                    Some(state) => state,
                    None => return Ok(()),
                },
            };

            if let Step::Done = self.observe(&state)? {
                return Ok(());
            }
        }
    }

    fn observe(&mut self, state: &SnapshotState) -> Result<Step, CliError> {
        let connection_changed = state.connection != self.last_connection;
        if connection_changed {
            self.last_connection = state.connection;
            self.status(&state.connection.to_string());
            if state.connection == ConnectionState::Connected {
                self.was_connected = true;
            }
        }

        if let Some(ref snapshot) = state.snapshot {
            let fresh = self
                .last_snapshot
                .as_ref()
                .is_none_or(|last| !Arc::ptr_eq(last, snapshot));
            if fresh {
                self.last_snapshot = Some(Arc::clone(snapshot));
                self.print_snapshot(snapshot)?;
                if self.args.count.is_some_and(|n| self.printed >= n) {
                    return Ok(Step::Done);
                }
            }
        }

        if state.error != self.last_error {
            self.last_error.clone_from(&state.error);
            match state.error {
                Some(SubscriptionError::ReconnectExhausted { attempts }) => {
                    return Err(CliError::LiveUpdatesUnavailable { attempts });
                }
                Some(SubscriptionError::Config(ref reason)) => {
                    return Err(CliError::Validation {
                        field: "api_url".into(),
                        reason: reason.clone(),
                    });
                }
                Some(ref err) => self.warn(err),
                None => {}
            }
        }

        // The server completed the stream with a normal close. Terminal
        // errors have already returned above.
        if connection_changed
            && state.connection == ConnectionState::Disconnected
            && self.was_connected
        {
            return Ok(Step::Done);
        }

        Ok(Step::Continue)
    }

    fn print_snapshot(&mut self, snapshot: &TripSnapshot) -> Result<(), CliError> {
        let out = snapshot::render(self.global.output, &self.args.trip_id, snapshot)?;
        output::print_output(&out, self.global.quiet);
        self.printed += 1;
        Ok(())
    }

    fn status(&self, text: &str) {
        if self.global.quiet {
            return;
        }
        if self.color {
            eprintln!("{} {}", "●".cyan(), text.bold());
        } else {
            eprintln!("* {text}");
        }
    }

    fn warn(&self, err: &SubscriptionError) {
        if self.global.quiet {
            return;
        }
        if self.color {
            eprintln!("{} {err}", "!".yellow().bold());
        } else {
            eprintln!("! {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::{ColorMode, OutputFormat};

    use super::*;

    fn global() -> GlobalOpts {
        GlobalOpts {
            profile: None,
            config: None,
            api_url: None,
            token: None,
            output: OutputFormat::Plain,
            color: ColorMode::Never,
            verbose: 0,
            quiet: true,
            insecure: false,
            timeout: None,
        }
    }

    fn args() -> WatchArgs {
        WatchArgs {
            trip_id: "trip-42".into(),
            max_attempts: None,
            base_delay_ms: None,
            max_delay_ms: None,
            count: None,
        }
    }

    fn state(connection: ConnectionState, error: Option<SubscriptionError>) -> SnapshotState {
        let mut state = SnapshotState::default();
        state.connection = connection;
        state.error = error;
        state
    }

    #[test]
    fn normal_close_after_error_frame_ends_watch() {
        let (args, global) = (args(), global());
        let mut follower = Follower::new(&args, &global);

        assert!(matches!(
            follower.observe(&state(ConnectionState::Connected, None)),
            Ok(Step::Continue)
        ));
        let locked = Some(SubscriptionError::Protocol("trip locked".into()));
        assert!(matches!(
            follower.observe(&state(ConnectionState::Connected, locked.clone())),
            Ok(Step::Continue)
        ));
        assert!(matches!(
            follower.observe(&state(ConnectionState::Disconnected, locked)),
            Ok(Step::Done)
        ));
    }

    #[test]
    fn exhaustion_is_an_error_not_a_clean_exit() {
        let (args, global) = (args(), global());
        let mut follower = Follower::new(&args, &global);

        assert!(matches!(
            follower.observe(&state(ConnectionState::Connected, None)),
            Ok(Step::Continue)
        ));
        let result = follower.observe(&state(
            ConnectionState::Failed,
            Some(SubscriptionError::ReconnectExhausted { attempts: 5 }),
        ));
        assert!(matches!(
            result,
            Err(CliError::LiveUpdatesUnavailable { attempts: 5 })
        ));
    }
}
