//! Durable command/response transcripts
//!
//! Two append-only streams, opened once per session and flushed after
//! every write so the transcript survives a crash of the compiler
//! process: a human-readable communication log, and a `.mos` script that
//! replays the whole session when fed back to the compiler.

use chrono::Local;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const COMMUNICATION_LOG_FILE: &str = "omcproxy_communication.log";
pub const COMMANDS_MOS_FILE: &str = "omcproxy_commands.mos";

/// Prefix of cache-hit lines in the communication log
pub const CACHE_HIT_PREFIX: &str = "Using the cached command :: ";

pub struct Transcript {
    communication: BufWriter<File>,
    commands: BufWriter<File>,
    communication_path: PathBuf,
    commands_path: PathBuf,
}

impl Transcript {
    /// Open both transcript files inside `dir`, truncating prior content
    pub fn open(dir: &Path) -> io::Result<Self> {
        let communication_path = dir.join(COMMUNICATION_LOG_FILE);
        let commands_path = dir.join(COMMANDS_MOS_FILE);
        Ok(Self {
            communication: BufWriter::new(File::create(&communication_path)?),
            commands: BufWriter::new(File::create(&commands_path)?),
            communication_path,
            commands_path,
        })
    }

    pub fn communication_path(&self) -> &Path {
        &self.communication_path
    }

    pub fn commands_path(&self) -> &Path {
        &self.commands_path
    }

    fn timestamp() -> String {
        Local::now().format("%H:%M:%S%.3f").to_string()
    }

    /// Record an outgoing command with its wall-clock send time
    pub fn log_command(&mut self, expression: &str) {
        let _ = writeln!(self.communication, "{} {}", expression, Self::timestamp());
        let _ = self.communication.flush();
    }

    /// Record a command satisfied from the cache (no live round trip)
    pub fn log_cache_hit(&mut self, expression: &str) {
        let _ = writeln!(
            self.communication,
            "{}{} {}",
            CACHE_HIT_PREFIX,
            expression,
            Self::timestamp()
        );
        let _ = self.communication.flush();
    }

    /// Record the reply along with the elapsed round-trip time
    pub fn log_response(&mut self, result: &str, started: Instant) {
        let _ = writeln!(self.communication, "{} {}", result, Self::timestamp());
        let _ = writeln!(
            self.communication,
            "Elapsed Time :: {:.3} secs\n",
            started.elapsed().as_secs_f64()
        );
        let _ = self.communication.flush();
    }

    /// Append the command to the replayable `.mos` script
    ///
    /// Every line carries a trailing diagnostics fetch so a replay shows
    /// the same error stream, except the terminating `quit()`.
    pub fn log_mos(&mut self, expression: &str) {
        if expression == "quit()" {
            let _ = writeln!(self.commands, "{};", expression);
        } else {
            let _ = writeln!(self.commands, "{}; getErrorString();", expression);
        }
        let _ = self.commands.flush();
    }
}
