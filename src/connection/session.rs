//! Per-Connection Authentication State
//!
//! ```text
//!   accept ──> UNAUTHENTICATED ──AUTH ok──> AUTHENTICATED
//!                   │    ▲                        │
//!                   │    └── bad AUTH / other ────┘ (no transition)
//!                   ▼                             ▼
//!                 CLOSED <──── socket closed ─────┘
//! ```
//!
//! A failed `AUTH`, or any other command sent before authenticating, leaves the
//! session unauthenticated. There is no attempt limit. `CLOSED` is terminal.

use crate::error::{StoreError, StoreResult};
use crate::protocol::{parse_command, Command};
use std::time::Instant;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Closed,
}

/// State owned by one connection.
#[derive(Debug)]
pub struct Session {
    id: u64,
    state: SessionState,
    last_access: Instant,
    failed_attempts: u32,
}

impl Session {
    /// Creates a session in the `Unauthenticated` state.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: SessionState::Unauthenticated,
            last_access: Instant::now(),
            failed_attempts: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn last_access(&self) -> Instant {
        self.last_access
    }

    /// Number of `AUTH` lines with a wrong password.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Records activity on the connection.
    pub fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    /// Moves the session to `Closed`.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Handles one line while unauthenticated.
    ///
    /// Only `AUTH <password>` with an exact password match succeeds; every
    /// other line yields a `Protocol` error and leaves the state unchanged.
    pub fn authenticate(&mut self, line: &str, password: &str) -> StoreResult<()> {
        if self.state != SessionState::Unauthenticated {
            return Err(StoreError::protocol("session is not awaiting authentication"));
        }

        match parse_command(line) {
            Ok(Command::Auth { password: given }) if given == password => {
                self.state = SessionState::Authenticated;
                Ok(())
            }
            Ok(Command::Auth { .. }) => {
                self.failed_attempts += 1;
                Err(StoreError::protocol("Invalid password"))
            }
            _ => Err(StoreError::protocol("Authentication required")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unauthenticated() {
        let session = Session::new(7);
        assert_eq!(session.id(), 7);
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_successful_auth() {
        let mut session = Session::new(1);
        session.authenticate("AUTH testpass", "testpass").unwrap();
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_auth_verb_is_case_insensitive() {
        let mut session = Session::new(1);
        session.authenticate("auth testpass", "testpass").unwrap();
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_bad_password_stays_unauthenticated() {
        let mut session = Session::new(1);
        let err = session.authenticate("AUTH wrong", "testpass").unwrap_err();
        assert_eq!(err.to_string(), "Invalid password");
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.failed_attempts(), 1);

        // No attempt limit
        for _ in 0..10 {
            assert!(session.authenticate("AUTH wrong", "testpass").is_err());
        }
        session.authenticate("AUTH testpass", "testpass").unwrap();
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_other_commands_rejected() {
        let mut session = Session::new(1);
        for line in ["PING", "GET k", "SET k v", "AUTH", "AUTH a b", "nonsense"] {
            let err = session.authenticate(line, "testpass").unwrap_err();
            assert_eq!(err.to_string(), "Authentication required", "line: {}", line);
            assert_eq!(session.state(), SessionState::Unauthenticated);
        }
        assert_eq!(session.failed_attempts(), 0);
    }

    #[test]
    fn test_password_is_exact_match() {
        let mut session = Session::new(1);
        assert!(session.authenticate("AUTH TESTPASS", "testpass").is_err());
        assert!(session.authenticate("AUTH testpass2", "testpass").is_err());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut session = Session::new(1);
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.authenticate("AUTH testpass", "testpass").is_err());
        assert_eq!(session.state(), SessionState::Closed);
    }
}
