#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Command-line frontend: argument parsing, wiring, and the end-of-run
//! summary. The comparison engine itself never touches process arguments,
//! stdout, or exit codes; everything process-facing lives here.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use engine::{DiffContext, DiffSettings, Item, ItemVisitor, Reporter, RunStats, WorkManager, WorkQueue};
use report::{JsonReporter, TeamCityReporter};
use vtree::TreeNode;

/// Compares two build distribution trees and reports every difference.
#[derive(Debug, Parser)]
#[command(name = "distdiff", version, about)]
struct Args {
    /// Baseline tree.
    expected: PathBuf,
    /// Candidate tree.
    actual: PathBuf,
    /// Report directory (defaults to a fresh temp directory).
    report_dir: Option<PathBuf>,
    /// Emit TeamCity service messages on stdout instead of the JSON report.
    #[arg(long)]
    teamcity: bool,
    /// Skip diff computation; classify statuses only.
    #[arg(long = "no-diff")]
    no_diff: bool,
    /// Preserve raw contents for every compared pair, whatever its status.
    #[arg(long = "save-contents")]
    save_contents: bool,
    /// Brief class disassembly (strip only the source-path comment).
    #[arg(long = "class-brief")]
    class_brief: bool,
}

#[derive(Debug)]
enum CliError {
    Usage(String),
    Fatal(String),
}

/// Parses arguments, runs the comparison, and prints the summary.
pub fn run_with<I, O, E>(args: I, stdout: &mut O, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    O: Write,
    E: Write,
{
    match execute(args, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(message)) => {
            let _ = writeln!(stderr, "{message}");
            ExitCode::from(2)
        }
        Err(CliError::Fatal(message)) => {
            let _ = writeln!(stderr, "{message}");
            ExitCode::FAILURE
        }
    }
}

fn execute<I, O>(args: I, stdout: &mut O) -> Result<(), CliError>
where
    I: IntoIterator<Item = OsString>,
    O: Write,
{
    let args = Args::try_parse_from(args)
        .map_err(|error| CliError::Usage(error.render().to_string()))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    // Invalid roots are fatal before any work begins.
    require_dir(&args.expected)?;
    require_dir(&args.actual)?;

    let settings = Arc::new(settings_from(&args)?);
    let manager = WorkManager::new(settings.show_progress);
    let stats = Arc::new(RunStats::new());
    let visitor = ItemVisitor::new();

    let reporter: Arc<dyn Reporter> = if settings.team_city {
        Arc::new(TeamCityReporter::new(
            manager.clone() as Arc<dyn WorkQueue>,
            Arc::clone(&stats),
            settings.report_matched,
        ))
    } else {
        let report_dir = settings
            .report_dir
            .clone()
            .ok_or_else(|| CliError::Fatal("report directory was not resolved".to_string()))?;
        let _ = writeln!(
            stdout,
            "Comparing `{}` vs `{}` to `{}`",
            settings.expected.display(),
            settings.actual.display(),
            report_dir.display()
        );
        let json = JsonReporter::new(
            &report_dir,
            manager.clone() as Arc<dyn WorkQueue>,
            Arc::clone(&stats),
        )
        .map_err(|error| CliError::Fatal(error.to_string()))?;
        Arc::new(json)
    };

    let expected_root = TreeNode::fs(&settings.expected)
        .map_err(|error| CliError::Fatal(error.to_string()))?;
    let actual_root =
        TreeNode::fs(&settings.actual).map_err(|error| CliError::Fatal(error.to_string()))?;

    let ctx = DiffContext::new(
        Arc::clone(&settings),
        manager.clone() as Arc<dyn WorkQueue>,
        Arc::clone(&reporter),
        Arc::clone(&stats),
    );

    reporter.begin_report();
    visitor.visit(&ctx, Item::root(), Some(expected_root), Some(actual_root));
    manager.wait_done();
    reporter.close();

    if !settings.team_city {
        let _ = print_summary(stdout, &stats, &visitor);
    }
    Ok(())
}

fn settings_from(args: &Args) -> Result<DiffSettings, CliError> {
    let mut settings = DiffSettings::new(&args.expected, &args.actual);
    settings.team_city = args.teamcity;
    settings.run_diff = !args.teamcity && !args.no_diff;
    settings.save_expected_and_actual = !settings.run_diff || args.save_contents;
    settings.save_matched_contents = args.save_contents;
    settings.class_verbose = !args.class_brief;
    settings.show_progress = !args.teamcity;
    settings.report_dir = if args.teamcity {
        None
    } else {
        Some(match &args.report_dir {
            Some(dir) => dir.clone(),
            None => temp_report_dir()?,
        })
    };
    Ok(settings)
}

fn temp_report_dir() -> Result<PathBuf, CliError> {
    tempfile::Builder::new()
        .prefix("distdiff-")
        .tempdir()
        .map(tempfile::TempDir::keep)
        .map_err(|error| CliError::Fatal(format!("cannot create report directory: {error}")))
}

fn require_dir(path: &std::path::Path) -> Result<(), CliError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(CliError::Fatal(format!(
            "{} is not a directory",
            path.display()
        )))
    }
}

fn print_summary<O: Write>(
    stdout: &mut O,
    stats: &RunStats,
    visitor: &ItemVisitor,
) -> std::io::Result<()> {
    writeln!(stdout, "{}", visitor.stats_line())?;
    writeln!(stdout, "total: {}", stats.total_items())?;

    for (key, bucket) in stats.top_status_buckets(10) {
        if bucket.diffs > 0 {
            writeln!(stdout, "{key}: {} items / {} diffs", bucket.items, bucket.diffs)?;
        } else {
            writeln!(stdout, "{key}: {} items", bucket.items)?;
        }
    }

    writeln!(stdout, "Top mismatches (10 of {}):", stats.delta_kinds())?;
    for (id, count) in stats.top_deltas(10) {
        writeln!(stdout, "- {id} ({count})")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn missing_root_is_fatal_before_any_work() {
        let temp = tempfile::tempdir().expect("tempdir");
        let actual = temp.path().join("actual");
        fs::create_dir(&actual).expect("actual dir");

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        run_with(
            os_args(&[
                "distdiff",
                temp.path().join("missing").to_str().expect("utf8 path"),
                actual.to_str().expect("utf8 path"),
            ]),
            &mut stdout,
            &mut stderr,
        );

        let stderr = String::from_utf8(stderr).expect("stderr utf8");
        assert!(stderr.contains("is not a directory"));
        assert!(stdout.is_empty());
    }

    #[test]
    fn flags_map_onto_settings() {
        let args = Args::try_parse_from(os_args(&[
            "distdiff",
            "/tmp/expected",
            "/tmp/actual",
            "--no-diff",
            "--class-brief",
        ]))
        .expect("parse");
        let settings = settings_from(&args).expect("settings");

        assert!(!settings.run_diff);
        assert!(settings.save_expected_and_actual);
        assert!(!settings.save_matched_contents);
        assert!(!settings.class_verbose);
        assert!(!settings.team_city);
    }

    #[test]
    fn teamcity_mode_disables_diffs_and_progress() {
        let args = Args::try_parse_from(os_args(&[
            "distdiff",
            "/tmp/expected",
            "/tmp/actual",
            "--teamcity",
        ]))
        .expect("parse");
        let settings = settings_from(&args).expect("settings");

        assert!(settings.team_city);
        assert!(!settings.run_diff);
        assert!(settings.save_expected_and_actual);
        assert!(!settings.show_progress);
        assert!(settings.report_dir.is_none());
    }

    #[test]
    fn end_to_end_json_run_writes_report_and_summary() {
        let temp = tempfile::tempdir().expect("tempdir");
        let expected = temp.path().join("expected");
        let actual = temp.path().join("actual");
        let report = temp.path().join("report");
        fs::create_dir_all(expected.join("a")).expect("expected tree");
        fs::create_dir_all(actual.join("a")).expect("actual tree");
        fs::write(expected.join("a/same.txt"), "x\n").expect("write");
        fs::write(actual.join("a/same.txt"), "x\n").expect("write");
        fs::write(expected.join("a/changed.txt"), "x\ny\n").expect("write");
        fs::write(actual.join("a/changed.txt"), "x\nz\n").expect("write");
        fs::write(expected.join("a/gone.txt"), "bye\n").expect("write");

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        run_with(
            os_args(&[
                "distdiff",
                expected.to_str().expect("utf8 path"),
                actual.to_str().expect("utf8 path"),
                report.to_str().expect("utf8 path"),
            ]),
            &mut stdout,
            &mut stderr,
        );

        let data = fs::read_to_string(report.join("diff/data.json")).expect("data.json");
        let records: serde_json::Value = serde_json::from_str(&data).expect("valid json");
        assert_eq!(records.as_array().expect("array").len(), 3);
        assert!(report.join("diff/a/changed.txt.patch").exists());

        let stdout = String::from_utf8(stdout).expect("stdout utf8");
        assert!(stdout.contains("total: 3"));
        assert!(stdout.contains("txt.MISMATCHED: 1 items / 1 diffs"));
        assert!(stdout.contains("Top mismatches (10 of 1):"));
    }
}
