//! Command facade over the compiler RPC channel
//!
//! [`OmcProxy`] owns the whole session: the supervised server process,
//! the channel worker, the single result slot, the per-class command
//! cache, and the transcripts. Callers go through `send_command` (raw)
//! or the typed operations in [`api`]. Compiler-reported problems never
//! become `Err` values; they are decoded into [`Diagnostic`]s and pushed
//! to the [`MessageSink`]. Only a failed startup or a lost transport
//! crosses the boundary as [`ProxyError`].

pub mod api;

use crate::cache::CommandCache;
use crate::channel::{Channel, ChannelWorker};
use crate::config::Settings;
use crate::error::{ProxyError, TransportError};
use crate::parser::{contains_ci, unquote};
use crate::supervisor::{self, Server};
use crate::transcript::Transcript;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Instant;

/// One compiler message, decoded from the structured error stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file_name: String,
    pub read_only: bool,
    pub line_start: i64,
    pub column_start: i64,
    pub line_end: i64,
    pub column_end: i64,
    pub message: String,
    pub kind: String,
    pub level: String,
    pub id: i64,
}

/// Receives decoded compiler diagnostics
///
/// The facade never decides how messages are displayed; it hands each
/// one to the sink the proxy was constructed with.
pub trait MessageSink {
    fn push(&mut self, diagnostic: Diagnostic);
}

/// Sink that prints each diagnostic to stderr
#[derive(Debug, Default)]
pub struct StderrSink;

impl MessageSink for StderrSink {
    fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.file_name.is_empty() {
            eprintln!("[{}] {}", diagnostic.level, diagnostic.message);
        } else {
            eprintln!(
                "[{}] {}:{}:{}: {}",
                diagnostic.level,
                diagnostic.file_name,
                diagnostic.line_start,
                diagnostic.column_start,
                diagnostic.message
            );
        }
    }
}

/// Sink that keeps every diagnostic, for tests and batch consumers
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl MessageSink for CollectingSink {
    fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Lets a caller keep a handle on the sink it hands to the proxy
impl<S: MessageSink> MessageSink for std::rc::Rc<std::cell::RefCell<S>> {
    fn push(&mut self, diagnostic: Diagnostic) {
        self.borrow_mut().push(diagnostic);
    }
}

/// The class restrictions the compiler distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Model,
    Class,
    Connector,
    ExpandableConnector,
    Record,
    Block,
    Function,
    Package,
    Type,
    Operator,
    OperatorRecord,
    OperatorFunction,
    Optimization,
    Enumeration,
}

/// Restriction names ordered so that compound names match before their
/// suffixes ("operator record" before "record" and "operator").
const RESTRICTIONS: [(&str, ClassKind); 14] = [
    ("expandable connector", ClassKind::ExpandableConnector),
    ("operator function", ClassKind::OperatorFunction),
    ("operator record", ClassKind::OperatorRecord),
    ("optimization", ClassKind::Optimization),
    ("enumeration", ClassKind::Enumeration),
    ("connector", ClassKind::Connector),
    ("operator", ClassKind::Operator),
    ("function", ClassKind::Function),
    ("package", ClassKind::Package),
    ("record", ClassKind::Record),
    ("model", ClassKind::Model),
    ("block", ClassKind::Block),
    ("class", ClassKind::Class),
    ("type", ClassKind::Type),
];

impl ClassKind {
    /// Capitalized name used in predicate commands (`is<Kind>(...)`)
    pub fn command_name(&self) -> &'static str {
        match self {
            ClassKind::Model => "Model",
            ClassKind::Class => "Class",
            ClassKind::Connector => "Connector",
            ClassKind::ExpandableConnector => "ExpandableConnector",
            ClassKind::Record => "Record",
            ClassKind::Block => "Block",
            ClassKind::Function => "Function",
            ClassKind::Package => "Package",
            ClassKind::Type => "Type",
            ClassKind::Operator => "Operator",
            ClassKind::OperatorRecord => "OperatorRecord",
            ClassKind::OperatorFunction => "OperatorFunction",
            ClassKind::Optimization => "Optimization",
            ClassKind::Enumeration => "Enumeration",
        }
    }

    /// Restriction name as the compiler reports it
    pub fn restriction_name(&self) -> &'static str {
        match self {
            ClassKind::Model => "model",
            ClassKind::Class => "class",
            ClassKind::Connector => "connector",
            ClassKind::ExpandableConnector => "expandable connector",
            ClassKind::Record => "record",
            ClassKind::Block => "block",
            ClassKind::Function => "function",
            ClassKind::Package => "package",
            ClassKind::Type => "type",
            ClassKind::Operator => "operator",
            ClassKind::OperatorRecord => "operator record",
            ClassKind::OperatorFunction => "operator function",
            ClassKind::Optimization => "optimization",
            ClassKind::Enumeration => "enumeration",
        }
    }

    /// Map a reported restriction string back to a kind
    pub fn from_restriction(text: &str) -> Option<ClassKind> {
        RESTRICTIONS
            .iter()
            .find(|(name, _)| contains_ci(text, name))
            .map(|(_, kind)| *kind)
    }
}

/// A proxied compiler session
pub struct OmcProxy {
    settings: Settings,
    server: Option<Server>,
    worker: Option<ChannelWorker>,
    result: String,
    cache: CommandCache,
    transcript: Option<Transcript>,
    sink: Box<dyn MessageSink>,
    progress: Option<Box<dyn FnMut()>>,
    quit_sent: bool,
}

impl OmcProxy {
    /// A proxy that spawns and supervises its own compiler server
    ///
    /// The server process starts lazily on the first command.
    pub fn new(settings: Settings, sink: Box<dyn MessageSink>) -> Self {
        Self {
            settings,
            server: None,
            worker: None,
            result: String::new(),
            cache: CommandCache::new(),
            transcript: None,
            sink,
            progress: None,
            quit_sent: false,
        }
    }

    /// A proxy over a caller-supplied channel (embedded mode, tests)
    pub fn with_channel(
        settings: Settings,
        channel: Box<dyn Channel>,
        sink: Box<dyn MessageSink>,
    ) -> Self {
        let mut proxy = Self::new(settings, sink);
        proxy.worker = Some(ChannelWorker::spawn(channel));
        proxy
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Callback invoked periodically while a command is in flight
    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: FnMut() + 'static,
    {
        self.progress = Some(Box::new(callback));
    }

    /// The last reply, trimmed of surrounding whitespace
    pub fn result(&self) -> &str {
        self.result.trim()
    }

    /// Push a diagnostic to the configured message sink
    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.sink.push(diagnostic);
    }

    /// Drop every cached result for a class
    pub fn invalidate_cached_class(&mut self, class_name: &str) {
        self.cache.invalidate(class_name);
    }

    fn ensure_started(&mut self) -> Result<(), ProxyError> {
        if self.worker.is_none() {
            let (server, channel) = supervisor::start(&self.settings)?;
            self.server = Some(server);
            self.worker = Some(ChannelWorker::spawn(Box::new(channel)));
        }
        if self.transcript.is_none() {
            // transcripts are best effort, a read-only temp dir is not fatal
            let _ = fs::create_dir_all(&self.settings.temp_dir);
            self.transcript = Transcript::open(&self.settings.temp_dir).ok();
        }
        Ok(())
    }

    /// Send a raw expression, no caching
    pub fn send_command(&mut self, expression: &str) -> Result<(), ProxyError> {
        self.send_command_with(expression, false, "", false)
    }

    /// Send a raw expression with cache control
    ///
    /// With `cache` set the reply is stored under `class_name` and later
    /// identical commands are served from the store without a round
    /// trip; `skip_cache` forces a live call while still storing the
    /// fresh reply. An empty cached result counts as a miss.
    pub fn send_command_with(
        &mut self,
        expression: &str,
        cache: bool,
        class_name: &str,
        skip_cache: bool,
    ) -> Result<(), ProxyError> {
        self.ensure_started()?;

        if cache && !skip_cache {
            let hit = self
                .cache
                .get(class_name, expression)
                .filter(|result| !result.is_empty())
                .map(str::to_string);
            if let Some(result) = hit {
                self.result = result;
                if let Some(transcript) = self.transcript.as_mut() {
                    transcript.log_cache_hit(expression);
                }
                return Ok(());
            }
        }

        if let Some(transcript) = self.transcript.as_mut() {
            transcript.log_command(expression);
            transcript.log_mos(expression);
        }
        if expression == "quit()" {
            self.quit_sent = true;
        }

        let started = Instant::now();
        let worker = match self.worker.as_ref() {
            Some(worker) => worker,
            None => return Err(ProxyError::ConnectionLost(TransportError::Closed)),
        };
        let progress = self
            .progress
            .as_mut()
            .map(|callback| &mut **callback as &mut dyn FnMut());

        match worker.send(expression, progress) {
            Ok(reply) => {
                self.result = reply;
                if let Some(transcript) = self.transcript.as_mut() {
                    transcript.log_response(self.result.trim(), started);
                }
                if cache {
                    let result = self.result.trim().to_string();
                    self.cache.put(class_name, expression, &result);
                }
                Ok(())
            }
            Err(error) => {
                self.result.clear();
                // quit() races process exit against the reply, not an error
                if expression == "quit()" {
                    return Ok(());
                }
                self.connection_lost();
                Err(ProxyError::ConnectionLost(error))
            }
        }
    }

    fn connection_lost(&mut self) {
        if let Some(server) = self.server.as_ref() {
            server.remove_handle_file();
        }
        self.worker.take();
        self.server.take();
    }

    /// Ask the compiler to exit and tear the session down
    ///
    /// Transport failures while sending `quit()` are expected and
    /// swallowed; the process is terminated regardless.
    pub fn quit(&mut self) {
        // skip the resend when the caller already issued quit() itself
        if self.worker.is_some() && !self.quit_sent {
            let _ = self.send_command("quit()");
        }
        self.worker.take();
        // dropping the writers flushes and closes both transcript files
        self.transcript.take();
        if let Some(mut server) = self.server.take() {
            server.terminate();
        }
    }

    /// Fetch and clear the plain error buffer
    pub fn error_string(&mut self) -> Result<String, ProxyError> {
        self.send_command("getErrorString()")?;
        Ok(unquote(self.result()).to_string())
    }

    /// Drain the structured error stream into the message sink
    ///
    /// Protocol: bind the message array, ask for its size, then pull
    /// each element field by field.
    pub fn collect_diagnostics(&mut self) -> Result<usize, ProxyError> {
        self.send_command("errors:=getMessagesStringInternal()")?;
        self.send_command("size(errors,1)")?;
        let count = self.result().parse::<i64>().unwrap_or(0).max(0);

        for index in 1..=count {
            self.send_command(&format!("currentError:=errors[{}]", index))?;
            let diagnostic = Diagnostic {
                file_name: self.field_string("currentError.info.filename")?,
                read_only: self.field_bool("currentError.info.readonly")?,
                line_start: self.field_int("currentError.info.lineStart")?,
                column_start: self.field_int("currentError.info.columnStart")?,
                line_end: self.field_int("currentError.info.lineEnd")?,
                column_end: self.field_int("currentError.info.columnEnd")?,
                message: self.field_string("currentError.message")?,
                kind: self.field_string("currentError.kind")?,
                level: self.field_string("currentError.level")?,
                id: self.field_int("currentError.id")?,
            };
            self.sink.push(diagnostic);
        }
        Ok(count as usize)
    }

    fn field_string(&mut self, field: &str) -> Result<String, ProxyError> {
        self.send_command(field)?;
        Ok(unquote(self.result()).to_string())
    }

    fn field_bool(&mut self, field: &str) -> Result<bool, ProxyError> {
        self.send_command(field)?;
        Ok(contains_ci(self.result(), "true"))
    }

    fn field_int(&mut self, field: &str) -> Result<i64, ProxyError> {
        self.send_command(field)?;
        Ok(self.result().parse().unwrap_or(0))
    }
}

impl Drop for OmcProxy {
    fn drop(&mut self) {
        self.quit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LocalChannel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_settings() -> (tempfile::TempDir, Settings) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            temp_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };
        (dir, settings)
    }

    fn scripted_proxy<F>(handler: F) -> (tempfile::TempDir, OmcProxy)
    where
        F: FnMut(&str) -> String + Send + 'static,
    {
        let (dir, settings) = test_settings();
        let proxy = OmcProxy::with_channel(
            settings,
            Box::new(LocalChannel::new(handler)),
            Box::new(CollectingSink::default()),
        );
        (dir, proxy)
    }

    #[test]
    fn test_send_command_sets_trimmed_result() {
        let (_dir, mut proxy) = scripted_proxy(|_| "  true\n".to_string());
        proxy.send_command("isPackage(Modelica)").unwrap();
        assert_eq!(proxy.result(), "true");
    }

    #[test]
    fn test_cached_command_skips_round_trip() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (_dir, mut proxy) = scripted_proxy(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            "{x,y}".to_string()
        });

        proxy
            .send_command_with("getClassNames(A)", true, "A", false)
            .unwrap();
        proxy
            .send_command_with("getClassNames(A)", true, "A", false)
            .unwrap();

        assert_eq!(proxy.result(), "{x,y}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_skip_cache_forces_live_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (_dir, mut proxy) = scripted_proxy(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            "reply".to_string()
        });

        proxy.send_command_with("list(A)", true, "A", false).unwrap();
        proxy.send_command_with("list(A)", true, "A", true).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_cached_result_is_a_miss() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (_dir, mut proxy) = scripted_proxy(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                String::new()
            } else {
                "real answer".to_string()
            }
        });

        proxy.send_command_with("list(A)", true, "A", false).unwrap();
        assert_eq!(proxy.result(), "");
        proxy.send_command_with("list(A)", true, "A", false).unwrap();
        assert_eq!(proxy.result(), "real answer");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_reissues_live_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (_dir, mut proxy) = scripted_proxy(move |_| {
            format!("reply {}", counter.fetch_add(1, Ordering::SeqCst))
        });

        proxy.send_command_with("list(A)", true, "A", false).unwrap();
        proxy.invalidate_cached_class("A");
        proxy.send_command_with("list(A)", true, "A", false).unwrap();
        assert_eq!(proxy.result(), "reply 1");
    }

    #[test]
    fn test_collect_diagnostics() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let (_dir, settings) = test_settings();
        let sink = Rc::new(RefCell::new(CollectingSink::default()));
        let mut proxy = OmcProxy::with_channel(
            settings,
            Box::new(LocalChannel::new(|expr: &str| {
                match expr {
                    "errors:=getMessagesStringInternal()" => "".to_string(),
                    "size(errors,1)" => "1".to_string(),
                    "currentError:=errors[1]" => "".to_string(),
                    "currentError.info.filename" => "\"a.mo\"".to_string(),
                    "currentError.info.readonly" => "false".to_string(),
                    "currentError.info.lineStart" => "3".to_string(),
                    "currentError.info.columnStart" => "1".to_string(),
                    "currentError.info.lineEnd" => "3".to_string(),
                    "currentError.info.columnEnd" => "10".to_string(),
                    "currentError.message" => "\"Variable x not found\"".to_string(),
                    "currentError.kind" => "translation".to_string(),
                    "currentError.level" => "error".to_string(),
                    "currentError.id" => "7".to_string(),
                    "quit()" => String::new(),
                    other => panic!("unexpected command {}", other),
                }
            })),
            Box::new(sink.clone()),
        );

        let count = proxy.collect_diagnostics().unwrap();
        assert_eq!(count, 1);

        let collected = sink.borrow();
        let diagnostic = &collected.diagnostics[0];
        assert_eq!(diagnostic.file_name, "a.mo");
        assert!(!diagnostic.read_only);
        assert_eq!(diagnostic.line_start, 3);
        assert_eq!(diagnostic.column_end, 10);
        assert_eq!(diagnostic.message, "Variable x not found");
        assert_eq!(diagnostic.kind, "translation");
        assert_eq!(diagnostic.level, "error");
        assert_eq!(diagnostic.id, 7);
    }

    #[test]
    fn test_class_kind_tables() {
        assert_eq!(ClassKind::Package.command_name(), "Package");
        assert_eq!(
            ClassKind::ExpandableConnector.restriction_name(),
            "expandable connector"
        );
        assert_eq!(
            ClassKind::from_restriction("expandable connector"),
            Some(ClassKind::ExpandableConnector)
        );
        assert_eq!(
            ClassKind::from_restriction("operator record"),
            Some(ClassKind::OperatorRecord)
        );
        assert_eq!(ClassKind::from_restriction("record"), Some(ClassKind::Record));
        assert_eq!(ClassKind::from_restriction("Model"), Some(ClassKind::Model));
        assert_eq!(ClassKind::from_restriction("widget"), None);
    }

    #[test]
    fn test_quit_is_sent_once_per_session() {
        let (_dir, settings) = test_settings();
        let commands = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = commands.clone();
        let mut proxy = OmcProxy::with_channel(
            settings,
            Box::new(LocalChannel::new(move |expr: &str| {
                log.lock().unwrap().push(expr.to_string());
                String::new()
            })),
            Box::new(CollectingSink::default()),
        );

        // caller issues the terminating command itself, teardown follows
        proxy.send_command("quit()").unwrap();
        proxy.quit();
        drop(proxy);

        let sent: Vec<String> = commands.lock().unwrap().clone();
        assert_eq!(sent.iter().filter(|c| c.as_str() == "quit()").count(), 1);
    }

    #[test]
    fn test_quit_transport_failure_is_swallowed() {
        let (_dir, settings) = test_settings();
        struct DeadChannel;
        impl Channel for DeadChannel {
            fn send(&mut self, _expression: &str) -> Result<String, TransportError> {
                Err(TransportError::Closed)
            }
        }
        let mut proxy = OmcProxy::with_channel(
            settings,
            Box::new(DeadChannel),
            Box::new(CollectingSink::default()),
        );
        // must not panic or surface an error
        proxy.quit();
    }

    #[test]
    fn test_transport_failure_surfaces_connection_lost() {
        let (_dir, settings) = test_settings();
        struct DeadChannel;
        impl Channel for DeadChannel {
            fn send(&mut self, _expression: &str) -> Result<String, TransportError> {
                Err(TransportError::Closed)
            }
        }
        let mut proxy = OmcProxy::with_channel(
            settings,
            Box::new(DeadChannel),
            Box::new(CollectingSink::default()),
        );
        let error = proxy.send_command("getVersion()").unwrap_err();
        assert!(matches!(error, ProxyError::ConnectionLost(_)));
    }
}
