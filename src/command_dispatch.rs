//! Purpose: Hold top-level CLI command dispatch for `wtscope`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap; one session per invocation lives here.
//! Invariants: The session is closed after every command that opens one.
//! Invariants: Skipped namespaces and failed records surface as notices, not errors.

use std::path::Path;

use wtscope::api::{
    DumpMode, DumpOptions, RecordOutput, Session, SessionOptions, demo_insert, export_all,
    export_one, report, write_to,
};

use super::*;
use crate::report_view::{report_json, report_text};

pub(super) fn dispatch_command(
    command: Command,
    dbpath: PathBuf,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "wtscope", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output(color_mode);
            Ok(RunOutcome::ok())
        }
        command => with_session(&dbpath, |session| run_session_command(session, command, color_mode)),
    }
}

fn with_session<F>(dbpath: &Path, run: F) -> Result<RunOutcome, Error>
where
    F: FnOnce(&Session) -> Result<RunOutcome, Error>,
{
    let session = Session::open(dbpath, SessionOptions::new())?;
    let outcome = run(&session)?;
    session.close()?;
    Ok(outcome)
}

fn run_session_command(
    session: &Session,
    command: Command,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::List { json, user_only } => {
            let mut reports = report(session)?;
            if user_only {
                reports.retain(|report| !report.is_internal());
            }
            if json {
                let values = reports.iter().map(report_json).collect::<Vec<_>>();
                emit_json(json!({ "namespaces": values }), color_mode);
            } else {
                let use_color = color_mode.use_color(io::stdout().is_terminal());
                let mut text = String::new();
                for report in &reports {
                    text.push_str(&report_text(report, use_color));
                    text.push_str("\n\n");
                }
                write_stdout(&text)?;
            }
            Ok(RunOutcome::ok())
        }
        Command::Table { name, raw, pretty } => {
            let mut options = DumpOptions::new(DumpMode::from_flags(raw, pretty));
            if color_mode.use_color(io::stdout().is_terminal()) {
                options = options.with_pretty_renderer(colored_pretty);
            }
            let mut stdout = io::stdout().lock();
            let summary = write_to(session, &name, &options, &mut stdout)?;
            if summary.failed > 0 {
                emit_notice(
                    Notice::new(
                        "decode_failed",
                        "table",
                        format!("{} of {} records failed to decode", summary.failed, summary.records),
                    )
                    .with_target(name)
                    .with_detail("failed_count", summary.failed),
                    color_mode,
                );
            }
            Ok(RunOutcome::ok())
        }
        Command::Export { namespace } => {
            let outputs = export_one(session, &namespace)?;
            let mut text = String::new();
            let mut failed = 0usize;
            for output in &outputs {
                match output {
                    RecordOutput::Rendered { text: line, .. } => {
                        text.push_str(line);
                        text.push('\n');
                    }
                    RecordOutput::Failed { .. } => failed += 1,
                }
            }
            write_stdout(&text)?;
            if failed > 0 {
                emit_notice(
                    Notice::new(
                        "decode_failed",
                        "export",
                        format!("skipped {failed} records that failed to decode"),
                    )
                    .with_target(namespace)
                    .with_detail("failed_count", failed),
                    color_mode,
                );
            }
            Ok(RunOutcome::ok())
        }
        Command::ExportAll { out_dir } => {
            let summary = export_all(session, &out_dir)?;
            for skipped in &summary.skipped {
                let reason = serde_json::to_value(skipped.reason).unwrap_or(Value::Null);
                emit_notice(
                    Notice::new("skip", "export-all", "namespace not exported")
                        .with_target(skipped.namespace.clone())
                        .with_detail("reason", reason),
                    color_mode,
                );
            }
            let value = serde_json::to_value(&summary).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode export summary")
                    .with_source(err)
            })?;
            emit_json(
                json!({ "exported_count": summary.exported_count(), "summary": value }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::DemoInsert { table } => {
            let inserted = demo_insert(session, &table)?;
            emit_json(
                json!({ "table": table, "inserted": inserted, "rolled_back": true }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Completion { .. } | Command::Version => Err(Error::new(ErrorKind::Internal)
            .with_message("command does not use a session")),
    }
}

fn colored_pretty(value: &Value) -> String {
    colorize_json(value, true)
}
