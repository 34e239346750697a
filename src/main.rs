//! Purpose: `wtscope` CLI entry point: argument parsing, logging, and error emission.
//! Role: Binary crate root; parses args, opens the session, delegates to command dispatch.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Logs go to stderr so stdout stays a clean data stream.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod color;
mod command_dispatch;
mod report_view;

use color::{Color, colorize_json, paint};
use wtscope::api::{Error, ErrorKind, to_exit_code};
use wtscope::notice::{Notice, notice_json};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                return Ok(RunOutcome::ok());
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `wtscope --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    let command = cli.command.unwrap_or(Command::List {
        json: false,
        user_only: false,
    });

    command_dispatch::dispatch_command(command, cli.dbpath, color_mode)
        .map_err(add_connection_hint)
        .map_err(add_not_found_hint)
        .map_err(add_decode_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "wtscope",
    version,
    about = "Inspect a document database's storage catalog: sizes, utilization, and record dumps",
    long_about = None,
    after_help = r#"EXAMPLES
  $ wtscope --dbpath /data/db                      # list namespaces with sizes
  $ wtscope --dbpath /data/db list --json --user-only
  $ wtscope --dbpath /data/db table _mdb_catalog --pretty
  $ wtscope --dbpath /data/db export test.foo > test.foo.json
  $ wtscope --dbpath /data/db export-all --out-dir ./dump"#
)]
struct Cli {
    #[arg(
        long,
        env = "WTSCOPE_DBPATH",
        default_value = ".",
        help = "Database directory holding the catalog and table files",
        value_hint = ValueHint::DirPath
    )]
    dbpath: PathBuf,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize listings, pretty documents, and diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "List catalog namespaces with file sizes, utilization, and indexes (default)")]
    List {
        #[arg(long, help = "Emit a JSON envelope instead of the human listing")]
        json: bool,
        #[arg(long, help = "Hide admin, local, and config namespaces")]
        user_only: bool,
    },
    #[command(about = "Dump every record of a table")]
    Table {
        #[arg(help = "Table name, e.g. _mdb_catalog or collection-7--123")]
        name: String,
        #[arg(long, help = "Print undecoded value bytes")]
        raw: bool,
        #[arg(long, help = "Print one labeled block per record")]
        pretty: bool,
    },
    #[command(about = "Print a namespace as line-delimited extended JSON")]
    Export {
        #[arg(help = "Namespace, e.g. test.foo")]
        namespace: String,
    },
    #[command(about = "Write <namespace>.json for every namespace whose collection file exists")]
    ExportAll {
        #[arg(long, default_value = ".", value_hint = ValueHint::DirPath, help = "Directory for export artifacts")]
        out_dir: PathBuf,
    },
    #[command(about = "Insert five demo records into a table inside a transaction, then roll back")]
    DemoInsert {
        #[arg(help = "Table name")]
        table: String,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info")]
    Version,
}

fn add_connection_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Connection || err.hint().is_some() {
        return err;
    }
    err.with_hint("Point --dbpath (or WTSCOPE_DBPATH) at an existing database directory.")
}

fn add_not_found_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::NotFound || err.hint().is_some() {
        return err;
    }
    if err.key().is_some() {
        return err.with_hint("Run `wtscope list` to see the namespaces in the catalog.");
    }
    err.with_hint("Check the table name and --dbpath; table files are named <name>.wt.")
}

fn add_decode_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Decode || err.hint().is_some() {
        return err;
    }
    err.with_hint("Stored data is malformed. Inspect it with `wtscope table <name> --raw`.")
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => {
            err.with_hint("Permission denied. Check file and directory permissions.")
        }
        ErrorKind::Busy => {
            err.with_hint("Table is locked by another process. Retry once it finishes.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and disk space."),
        _ => err,
    }
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint("Unexpected internal failure. Retry with RUST_LOG=debug and share the output.")
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let json = if is_tty || use_color {
        colorize_json(&value, use_color)
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

fn emit_version_output(color_mode: ColorMode) {
    if io::stdout().is_terminal() {
        println!("wtscope {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(
            json!({
                "name": "wtscope",
                "version": env!("CARGO_PKG_VERSION"),
            }),
            color_mode,
        );
    }
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

fn emit_notice(notice: Notice, color_mode: ColorMode) {
    let notice = notice.with_time(notice_time_now());
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = paint("notice:", Color::Yellow, color_mode.use_color(is_tty));
        match &notice.target {
            Some(target) => eprintln!("{label} {} ({target})", notice.message),
            None => eprintln!("{label} {}", notice.message),
        }
        return;
    }
    let json = serde_json::to_string(&notice_json(&notice)).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn write_stdout(text: &str) -> Result<(), Error> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output")
                .with_source(err)
        })
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Connection => "cannot open database".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Busy => "resource is busy".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Decode => "malformed data".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(key) = err.key() {
        inner.insert("key".to_string(), json!(key));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        paint("error:", Color::Red, use_color),
        error_message(err)
    )];
    if let Some(hint) = err.hint() {
        lines.push(format!("{} {hint}", paint("hint:", Color::Yellow, use_color)));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            paint("path:", Color::Yellow, use_color),
            path.display()
        ));
    }
    if let Some(key) = err.key() {
        lines.push(format!("{} {key}", paint("key:", Color::Yellow, use_color)));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!(
            "{} {cause}",
            paint("caused by:", Color::Yellow, use_color)
        ));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, add_not_found_hint, error_json, error_text};
    use clap::Parser;
    use wtscope::api::{Error, ErrorKind};

    #[test]
    fn no_subcommand_defaults_to_list() {
        let cli = Cli::try_parse_from(["wtscope", "--dbpath", "/data/db"]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.dbpath, std::path::PathBuf::from("/data/db"));
    }

    #[test]
    fn table_flags_parse() {
        let cli = Cli::try_parse_from(["wtscope", "table", "_mdb_catalog", "--raw", "--pretty"])
            .expect("parse");
        match cli.command {
            Some(Command::Table { name, raw, pretty }) => {
                assert_eq!(name, "_mdb_catalog");
                assert!(raw && pretty);
            }
            _ => panic!("expected table command"),
        }
    }

    #[test]
    fn error_json_includes_key_and_hint() {
        let err = add_not_found_hint(
            Error::new(ErrorKind::NotFound)
                .with_message("namespace `x.y` is not in the catalog")
                .with_key("x.y"),
        );
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "NotFound");
        assert_eq!(value["error"]["key"], "x.y");
        assert!(value["error"]["hint"].as_str().expect("hint").contains("wtscope list"));
    }

    #[test]
    fn error_text_respects_color_flag() {
        let err = Error::new(ErrorKind::Decode).with_message("bad document");
        assert_eq!(error_text(&err, false), "error: bad document");
        assert!(error_text(&err, true).contains("\u{1b}[31merror:\u{1b}[0m"));
    }
}
