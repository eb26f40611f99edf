use crate::config::{LoggingConfig, Section};
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Keep a guard for non-blocking console to avoid being dropped.
static CONSOLE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const DEFAULT_SECTION: &str = "default";

fn parse_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

/// `target == prefix` or `target` starts with `prefix::`.
fn matches_crate_prefix(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// ================= rotating writers =================

#[derive(Clone)]
struct RotWriter(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl RotWriter {
    fn open(path: &Path, section: &Section) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // MaxFiles wins over age-based retention when both are set.
        let limit = match section.max_backups {
            Some(n) => FileLimit::MaxFiles(n),
            None => FileLimit::Age(chrono::Duration::days(
                section.max_age_days.unwrap_or(1) as i64,
            )),
        };
        let max_bytes = section.max_size_mb.unwrap_or(100) as usize * 1024 * 1024;

        let rot = FileRotate::new(
            path,
            AppendTimestamp::default(limit),
            ContentLimit::BytesSurpassed(max_bytes),
            Compression::None,
            None,
        );
        Ok(Self(Arc::new(Mutex::new(rot))))
    }
}

/// Writer handle that drops writes when no file is configured for a target.
struct SinkHandle(Option<RotWriter>);

impl Write for SinkHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(w) => w.0.lock().write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(w) => w.0.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Routes records to per-subsystem files by target prefix, falling back to
/// the default file.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<RotWriter>,
    by_prefix: Vec<(String, RotWriter)>,
}

impl FileRouter {
    fn build(cfg: &LoggingConfig, base_dir: &Path) -> Self {
        let mut router = FileRouter::default();
        for (name, section) in cfg {
            let Some(path) = file_path(section, base_dir) else {
                continue;
            };
            match RotWriter::open(&path, section) {
                Ok(writer) if name == DEFAULT_SECTION => router.default = Some(writer),
                Ok(writer) => router.by_prefix.push((name.clone(), writer)),
                Err(e) => eprintln!(
                    "Failed to init log file for '{}': {} ({})",
                    name,
                    path.display(),
                    e
                ),
            }
        }
        // Longest prefix first so nested subsystems win over their parents.
        router
            .by_prefix
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        router
    }

    fn resolve_for(&self, target: &str) -> Option<RotWriter> {
        self.by_prefix
            .iter()
            .find(|(prefix, _)| matches_crate_prefix(target, prefix))
            .map(|(_, w)| w.clone())
            .or_else(|| self.default.clone())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = SinkHandle;

    fn make_writer(&'a self) -> Self::Writer {
        SinkHandle(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        SinkHandle(self.resolve_for(meta.target()))
    }
}

fn file_path(section: &Section, base_dir: &Path) -> Option<PathBuf> {
    let file = section.file.trim();
    if file.is_empty() {
        return None;
    }
    let p = Path::new(file);
    Some(if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    })
}

// ================= targets =================

#[derive(Clone, Copy)]
enum Sink {
    Console,
    File,
}

impl Sink {
    fn level_of(self, section: &Section) -> Option<LevelFilter> {
        let raw = match self {
            Sink::Console => &section.console_level,
            Sink::File => &section.file_level,
        };
        parse_level(raw).map(LevelFilter::from_level)
    }
}

fn build_targets(cfg: &LoggingConfig, sink: Sink, fallback: LevelFilter) -> Targets {
    let default_level = cfg
        .get(DEFAULT_SECTION)
        .map(|s| sink.level_of(s).unwrap_or(LevelFilter::OFF))
        .unwrap_or(fallback);

    let mut targets = Targets::new().with_default(default_level);
    for (name, section) in cfg {
        if name == DEFAULT_SECTION {
            continue;
        }
        // A subsystem without its own file has no file sink to filter.
        if matches!(sink, Sink::File) && section.file.trim().is_empty() {
            continue;
        }
        if let Some(level) = sink.level_of(section) {
            targets = targets.with_target(name.clone(), level);
        }
    }
    targets
}

// ================= public init =================

/// Install the global subscriber: human-readable console output on stderr plus
/// JSON records written to rotating files. `RUST_LOG`, when set, caps both.
pub fn init_logging(cfg: &LoggingConfig, base_dir: &Path) {
    // Bridge `log` → `tracing` before installing the subscriber.
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    let env = EnvFilter::try_from_default_env().ok();

    if cfg.is_empty() {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339());
        let _ = tracing_subscriber::registry()
            .with(env)
            .with(fmt_layer)
            .try_init();
        return;
    }

    let files = FileRouter::build(cfg, base_dir);
    let console_targets = build_targets(cfg, Sink::Console, LevelFilter::INFO);
    let file_targets = build_targets(
        cfg,
        Sink::File,
        if files.default.is_some() {
            LevelFilter::INFO
        } else {
            LevelFilter::OFF
        },
    );

    let (nb_stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console_layer = fmt::layer()
        .with_writer(nb_stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_targets);

    let file_layer = (!files.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(files)
            .with_filter(file_targets)
    });

    let _ = tracing_subscriber::registry()
        .with(env)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
