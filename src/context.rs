use crate::clock::{format_timestamp, Clock};
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// What happens to a student's grades in a subject when they are unenrolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UnenrollPolicy {
    /// Grades stay as historical records.
    #[default]
    Retain,
    /// Grades on the subject's quizzes are deleted with the enrollment.
    Purge,
}

/// Everything an engine operation needs: the store, the clock and policy.
#[derive(Clone, Copy)]
pub struct EngineContext<'a> {
    pub conn: &'a Connection,
    pub clock: &'a dyn Clock,
    pub unenroll_policy: UnenrollPolicy,
}

impl<'a> EngineContext<'a> {
    pub fn new(conn: &'a Connection, clock: &'a dyn Clock) -> Self {
        Self {
            conn,
            clock,
            unenroll_policy: UnenrollPolicy::default(),
        }
    }

    pub fn now_text(&self) -> String {
        format_timestamp(self.clock.now())
    }

    /// Opens the check-then-write transaction. IMMEDIATE takes the write lock
    /// up front so validation reads cannot go stale before the write lands.
    pub fn begin_immediate(&self) -> rusqlite::Result<Transaction<'a>> {
        Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
    }
}
