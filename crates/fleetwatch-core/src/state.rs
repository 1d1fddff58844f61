// ── Connection state machine ──
//
// Pure transition logic for one subscription session. The session task
// feeds it typed events and acts on the returned directive; no I/O here.

use std::time::Duration;

use fleetwatch_api::websocket::NORMAL_CLOSURE;
use thiserror::Error;

use crate::reconnect::ReconnectPolicy;

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    #[strum(to_string = "reconnecting (attempt {attempt})")]
    Reconnecting { attempt: u32 },
    Failed,
}

/// Socket and lifecycle events that drive the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Consumer enabled the subscription.
    Enable,
    /// The socket opened; `connection_init` is about to go out.
    Opened,
    /// Server sent `connection_ack`.
    Acknowledged,
    /// The socket closed or failed. Connect failures report 1006.
    Closed { code: u16 },
    /// The pending reconnect timer fired.
    RetryElapsed,
    /// Consumer disabled the subscription or changed target.
    Disable,
}

/// What the session should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Keep going; nothing to schedule.
    Continue,
    /// Open a socket now.
    Connect,
    /// Arm the retry timer.
    Retry { attempt: u32, delay: Duration },
    /// Attempts exhausted; live updates are off.
    GiveUp { attempts: u32 },
    /// Tear down; no reconnection.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transition: {event:?} while {state}")]
pub struct IllegalTransition {
    pub state: ConnectionState,
    pub event: ConnectionEvent,
}

/// Connection lifecycle plus the bounded reconnect attempt counter.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Failed reconnection cycles since the last acknowledged connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Apply one event. Illegal events leave the machine untouched.
    pub fn apply(&mut self, event: ConnectionEvent) -> Result<Directive, IllegalTransition> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        let illegal = IllegalTransition {
            state: self.state,
            event,
        };

        let directive = match (self.state, event) {
            (_, E::Disable) => {
                self.state = S::Disconnected;
                self.attempts = 0;
                Directive::Stop
            }
            (S::Disconnected | S::Failed, E::Enable) => {
                self.state = S::Connecting;
                self.attempts = 0;
                Directive::Connect
            }
            (S::Connecting | S::Reconnecting { .. }, E::Opened) => Directive::Continue,
            (S::Connecting | S::Reconnecting { .. }, E::Acknowledged) => {
                self.state = S::Connected;
                self.attempts = 0;
                Directive::Continue
            }
            (S::Connecting | S::Connected | S::Reconnecting { .. }, E::Closed { code }) => {
                if code == NORMAL_CLOSURE {
                    self.state = S::Disconnected;
                    Directive::Stop
                } else if self.policy.allows(self.attempts) {
                    let delay = self.policy.delay_for(self.attempts);
                    self.attempts += 1;
                    self.state = S::Reconnecting {
                        attempt: self.attempts,
                    };
                    Directive::Retry {
                        attempt: self.attempts,
                        delay,
                    }
                } else {
                    self.state = S::Failed;
                    Directive::GiveUp {
                        attempts: self.attempts,
                    }
                }
            }
            (S::Reconnecting { .. }, E::RetryElapsed) => Directive::Connect,
            _ => return Err(illegal),
        };

        Ok(directive)
    }
}
