// Log sink setup

//! Logger initialization and transition logging
//!
//! Records go through `env_logger` with a custom formatter that renders the
//! record's key/value fields either as one JSON object per line or as
//! `key=value` text. Lines are written to stdout, to the local syslog socket,
//! or appended to a file.
//!
//! `env_logger` drops write errors, so every target is wrapped in a
//! tracking writer that keeps the first failure for [`LogSink`] to report.

use crate::scheduler::EventSink;
use crate::types::{Config, LogFormat, TransitionEvent};
use anyhow::{Context, Result};
use env_logger::{Env, Target, WriteStyle};
use log::kv::{self, Key, Source, Value, VisitSource};
use log::{Level, Record};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Tag in syslog messages
const SYSLOG_IDENT: &str = "wirelogd";

/// Syslog facility `daemon`
const SYSLOG_FACILITY_DAEMON: u8 = 3;

/// Local syslog sockets, in lookup order
const SYSLOG_SOCKETS: [&str; 3] = ["/dev/log", "/var/run/syslog", "/var/run/log"];

/// Where log records are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// Standard output
    Stdout,
    /// Local syslog daemon
    Syslog,
    /// Appended to a file
    File(PathBuf),
}

impl LogDestination {
    /// `stdout` and `syslog` are keywords, anything else is a file path
    pub fn parse(value: &str) -> Self {
        match value {
            "stdout" => LogDestination::Stdout,
            "syslog" => LogDestination::Syslog,
            path => LogDestination::File(PathBuf::from(path)),
        }
    }
}

/// Initialize the global logger from the resolved configuration.
///
/// Returns the sink that logs transitions through it.
pub fn init(config: &Config) -> Result<LogSink> {
    let level = if config.general.debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(level));

    let errors = WriteErrors::default();
    let destination = LogDestination::parse(&config.log.destination);
    let syslog = destination == LogDestination::Syslog;
    let writer: Box<dyn Write + Send> = match destination {
        LogDestination::Stdout => Box::new(TrackedWriter::new(io::stdout(), errors.clone())),
        LogDestination::Syslog => {
            Box::new(TrackedWriter::new(SyslogWriter::connect()?, errors.clone()))
        }
        LogDestination::File(path) => {
            Box::new(TrackedWriter::new(open_log_file(&path)?, errors.clone()))
        }
    };
    builder
        .target(Target::Pipe(writer))
        .write_style(WriteStyle::Never);

    let format = config.log.format;
    builder.format(move |buf, record| {
        let fields = collect_fields(record);
        let message = record.args().to_string();
        if syslog {
            // syslog stamps the time itself
            let line = render(format, None, record.level(), &message, &fields);
            writeln!(buf, "{}{}", syslog_prefix(record.level()), line)
        } else {
            let time = buf.timestamp().to_string();
            let line = render(format, Some(&time), record.level(), &message, &fields);
            writeln!(buf, "{}", line)
        }
    });

    builder.try_init().context("Failed to initialize logger")?;
    Ok(LogSink { errors })
}

/// First write error seen by the logger, shared with the sink
#[derive(Debug, Clone, Default)]
struct WriteErrors(Arc<Mutex<Option<io::Error>>>);

impl WriteErrors {
    fn record(&self, err: &io::Error) {
        let mut slot = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_none() {
            *slot = Some(io::Error::new(err.kind(), err.to_string()));
        }
    }

    fn take(&self) -> Option<io::Error> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// Passes writes through and records any error before returning it
struct TrackedWriter<W> {
    inner: W,
    errors: WriteErrors,
}

impl<W: Write> TrackedWriter<W> {
    fn new(inner: W, errors: WriteErrors) -> Self {
        Self { inner, errors }
    }

    fn track<T>(&self, result: io::Result<T>) -> io::Result<T> {
        if let Err(err) = &result {
            self.errors.record(err);
        }
        result
    }
}

impl<W: Write> Write for TrackedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        self.track(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.track(result)
    }
}

/// Logs every transition as an `info` record with the peer fields.
///
/// A record the logger failed to write fails the emit.
#[derive(Debug, Default)]
pub struct LogSink {
    errors: WriteErrors,
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &TransitionEvent) -> Result<()> {
        let peer = &event.peer;
        let endpoint = peer.endpoint_display();
        let allowed_ips = peer.allowed_ips.join(",");

        match peer.name.as_deref() {
            Some(name) => log::info!(
                interface = peer.identity.interface.as_str(),
                public_key = peer.identity.public_key.as_str(),
                name = name,
                endpoint = endpoint.as_str(),
                allowed_ips = allowed_ips.as_str(),
                latest_handshake = peer.latest_handshake,
                state = event.state.as_str();
                "peer {}", event.state
            ),
            None => log::info!(
                interface = peer.identity.interface.as_str(),
                public_key = peer.identity.public_key.as_str(),
                endpoint = endpoint.as_str(),
                allowed_ips = allowed_ips.as_str(),
                latest_handshake = peer.latest_handshake,
                state = event.state.as_str();
                "peer {}", event.state
            ),
        }

        match self.errors.take() {
            Some(err) => Err(err).context("Failed to write log record"),
            None => Ok(()),
        }
    }
}

/// Open a log file for appending, creating it with mode 0644
fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o644)
        .open(path)
        .with_context(|| format!("Failed to open log file {:?}", path))
}

/// Value of a structured log field
#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl From<&FieldValue> for serde_json::Value {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Int(n) => serde_json::Value::from(*n),
            FieldValue::Bool(b) => serde_json::Value::from(*b),
            FieldValue::Str(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

#[derive(Default)]
struct FieldCollector(Vec<(String, FieldValue)>);

impl<'kvs> VisitSource<'kvs> for FieldCollector {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
        let value = if let Some(b) = value.to_bool() {
            FieldValue::Bool(b)
        } else if let Some(n) = value.to_i64() {
            FieldValue::Int(n)
        } else {
            FieldValue::Str(value.to_string())
        };
        self.0.push((key.as_str().to_string(), value));
        Ok(())
    }
}

fn collect_fields(record: &Record) -> Vec<(String, FieldValue)> {
    let mut collector = FieldCollector::default();
    // The collector itself never fails
    let _ = record.key_values().visit(&mut collector);
    collector.0
}

/// Render one record without the trailing newline
fn render(
    format: LogFormat,
    time: Option<&str>,
    level: Level,
    message: &str,
    fields: &[(String, FieldValue)],
) -> String {
    match format {
        LogFormat::Json => {
            let mut object = serde_json::Map::new();
            if let Some(time) = time {
                object.insert("time".to_string(), time.into());
            }
            object.insert("level".to_string(), level.as_str().into());
            object.insert("msg".to_string(), message.into());
            for (key, value) in fields {
                object.insert(key.clone(), value.into());
            }
            serde_json::Value::Object(object).to_string()
        }
        LogFormat::Text => {
            let mut parts = Vec::with_capacity(fields.len() + 3);
            if let Some(time) = time {
                parts.push(time.to_string());
            }
            parts.push(level.as_str().to_string());
            parts.push(message.to_string());
            for (key, value) in fields {
                let value = match value {
                    FieldValue::Int(n) => n.to_string(),
                    FieldValue::Bool(b) => b.to_string(),
                    FieldValue::Str(s) => quote_text_value(s),
                };
                parts.push(format!("{}={}", key, value));
            }
            parts.join(" ")
        }
    }
}

fn quote_text_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '=' || c == '"');
    if needs_quotes {
        format!("{:?}", value)
    } else {
        value.to_string()
    }
}

/// `<PRI>ident[pid]: ` header for the daemon facility
fn syslog_prefix(level: Level) -> String {
    let severity = match level {
        Level::Error => 3,
        Level::Warn => 4,
        Level::Info => 6,
        Level::Debug | Level::Trace => 7,
    };
    let priority = SYSLOG_FACILITY_DAEMON * 8 + severity;
    format!("<{}>{}[{}]: ", priority, SYSLOG_IDENT, std::process::id())
}

/// Sends each formatted record as one datagram to the local syslog daemon
struct SyslogWriter {
    socket: UnixDatagram,
    path: PathBuf,
}

impl SyslogWriter {
    fn connect() -> Result<Self> {
        for path in SYSLOG_SOCKETS {
            if let Ok(writer) = Self::connect_to(Path::new(path)) {
                return Ok(writer);
            }
        }
        anyhow::bail!(
            "Failed to connect to syslog, tried {}",
            SYSLOG_SOCKETS.join(", ")
        )
    }

    fn connect_to(path: &Path) -> Result<Self> {
        let socket = open_syslog_socket(path)
            .with_context(|| format!("Failed to connect to syslog socket {:?}", path))?;
        Ok(Self {
            socket,
            path: path.to_path_buf(),
        })
    }
}

fn open_syslog_socket(path: &Path) -> io::Result<UnixDatagram> {
    let socket = UnixDatagram::unbound()?;
    socket.connect(path)?;
    Ok(socket)
}

impl Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let message = buf.strip_suffix(b"\n").unwrap_or(buf);
        if self.socket.send(message).is_err() {
            // A restarted syslog daemon binds a new socket at the same path
            self.socket = open_syslog_socket(&self.path)?;
            self.socket.send(message)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
