use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;

use crate::clock::{parse_timestamp, Clock, FixedClock, SystemClock};
use crate::context::UnenrollPolicy;

/// Gradebook daemon: answers JSON-lines requests on stdin/stdout.
#[derive(Debug, Parser, Clone)]
#[command(name = "gradebookd", version)]
pub struct Config {
    /// Workspace directory to open at start-up.
    #[arg(long, env = "GRADEBOOK_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[arg(long, env = "GRADEBOOK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// What unenrolling does to the student's grades in that subject.
    #[arg(long, env = "GRADEBOOK_UNENROLL_GRADES", value_enum, default_value = "retain")]
    pub unenroll_grades: UnenrollPolicy,

    /// Pin the clock to an RFC3339 instant.
    #[arg(long, env = "GRADEBOOK_FIXED_NOW", value_parser = parse_fixed_now)]
    pub fixed_now: Option<DateTime<Utc>>,
}

fn parse_fixed_now(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw).ok_or_else(|| format!("not an RFC3339 timestamp: {raw}"))
}

impl Config {
    pub fn clock(&self) -> Box<dyn Clock> {
        match self.fixed_now {
            Some(now) => Box::new(FixedClock(now)),
            None => Box::new(SystemClock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_retain_and_system_clock() {
        let cfg = Config::try_parse_from(["gradebookd"]).expect("parse");
        assert_eq!(cfg.unenroll_grades, UnenrollPolicy::Retain);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.fixed_now.is_none());
        assert!(cfg.workspace.is_none());
    }

    #[test]
    fn parses_purge_and_fixed_now() {
        let cfg = Config::try_parse_from([
            "gradebookd",
            "--unenroll-grades",
            "purge",
            "--fixed-now",
            "2024-03-15T12:00:00Z",
        ])
        .expect("parse");
        assert_eq!(cfg.unenroll_grades, UnenrollPolicy::Purge);
        let now = cfg.clock().now();
        assert_eq!(now.to_rfc3339(), "2024-03-15T12:00:00+00:00");
    }

    #[test]
    fn rejects_malformed_fixed_now() {
        assert!(Config::try_parse_from(["gradebookd", "--fixed-now", "yesterday"]).is_err());
    }
}
