//! Implementation of the `kiln compile` command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use kiln_compiler::{
    CompilationListener, Compiler, FileAction, FilterRegistry, ListenerSet, RepEnded, RepOutcome,
};
use kiln_model::ItemRep;

use crate::data_source::{self, CliResult};
use crate::diff::{OutputDiff, DIFF_FILE};
use crate::{CompileArgs, GlobalArgs};

/// Prints one line per output file.
struct FileActionPrinter {
    output_dir: PathBuf,
    quiet: bool,
    verbose: bool,
}

impl FileActionPrinter {
    fn line(&self, path: &Path, action: FileAction) -> Option<String> {
        if self.quiet || (action == FileAction::Identical && !self.verbose) {
            return None;
        }
        Some(format!(
            "{:>12}  {}",
            action.label(),
            self.output_dir.join(path).display()
        ))
    }
}

impl CompilationListener for FileActionPrinter {
    fn file_written(&mut self, _rep: &ItemRep, path: &Path, action: FileAction) {
        if let Some(line) = self.line(path, action) {
            println!("{line}");
        }
    }
}

/// Collects per-rep timings and the run duration.
#[derive(Default)]
struct TimingRecorder {
    compiled: Vec<(ItemRep, Duration)>,
    reused: usize,
    elapsed: Duration,
}

impl TimingRecorder {
    /// The slowest compiled reps, slowest first.
    fn slowest(&self, n: usize) -> Vec<&(ItemRep, Duration)> {
        let mut sorted: Vec<_> = self.compiled.iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted.truncate(n);
        sorted
    }
}

impl CompilationListener for TimingRecorder {
    fn rep_ended(&mut self, event: &RepEnded<'_>) {
        match event.outcome {
            RepOutcome::Reused => self.reused += 1,
            RepOutcome::Compiled => self.compiled.push((event.rep.clone(), event.duration)),
        }
    }

    fn run_ended(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }
}

/// Runs `kiln compile`.
pub fn run(global: &GlobalArgs, args: &CompileArgs) -> CliResult<i32> {
    let dir = data_source::resolve_site_dir(global)?;
    let loaded = data_source::load(&dir)?;
    let cache = loaded.open_cache();
    let mut compiler = Compiler::new(
        &loaded.site,
        loaded.rules,
        FilterRegistry::with_builtins(),
        cache,
    );

    let output_dir = loaded.site.config.output_dir();
    let shown_dir = output_dir
        .strip_prefix(&dir)
        .map(Path::to_path_buf)
        .unwrap_or(output_dir.clone());
    let mut printer = FileActionPrinter {
        output_dir: shown_dir.clone(),
        quiet: global.quiet,
        verbose: global.verbose,
    };
    let mut timing = TimingRecorder::default();

    let diff_path = dir.join(DIFF_FILE);
    let mut diff = if args.diff {
        if diff_path.is_file() {
            std::fs::remove_file(&diff_path)?;
        }
        Some(OutputDiff::new(output_dir, shown_dir))
    } else {
        None
    };

    {
        let mut listeners = ListenerSet::new().with(&mut printer).with(&mut timing);
        if let Some(diff) = diff.as_mut() {
            listeners = listeners.with(diff);
        }
        compiler.run_all(&mut listeners)?;
    }
    if let Some(diff) = &diff {
        diff.write_to(&diff_path)?;
    }

    if !global.quiet {
        if global.verbose {
            println!(
                "\n{} reps compiled, {} reused.",
                timing.compiled.len(),
                timing.reused
            );
            for (rep, duration) in timing.slowest(5) {
                println!("  {:>8.3}s  {rep}", duration.as_secs_f64());
            }
        }
        println!("\nSite compiled in {:.2}s.", timing.elapsed.as_secs_f64());
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Identifier;
    use kiln_outdated::Reason;

    fn rep(id: &str) -> ItemRep {
        ItemRep::default_of(Identifier::new(id).unwrap())
    }

    #[test]
    fn printer_hides_identical_unless_verbose() {
        let mut printer = FileActionPrinter {
            output_dir: PathBuf::from("output"),
            quiet: false,
            verbose: false,
        };
        let path = Path::new("index.html");
        assert_eq!(
            printer.line(path, FileAction::Created).as_deref(),
            Some("      create  output/index.html")
        );
        assert_eq!(printer.line(path, FileAction::Identical), None);
        printer.verbose = true;
        assert_eq!(
            printer.line(path, FileAction::Identical).as_deref(),
            Some("   identical  output/index.html")
        );
        printer.quiet = true;
        assert_eq!(printer.line(path, FileAction::Updated), None);
    }

    #[test]
    fn diff_flag_records_changed_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("kiln.toml"), "").unwrap();
        std::fs::write(
            root.join("rules.toml"),
            "[[compile]]\npattern = \"/**/*\"\nwrite = { ext = \"html\" }\n",
        )
        .unwrap();
        std::fs::create_dir_all(root.join("content")).unwrap();
        std::fs::write(root.join("content/a.md"), "one\ntwo\n").unwrap();

        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            site: Some(root.to_path_buf()),
        };
        assert_eq!(run(&global, &CompileArgs { diff: true }).unwrap(), 0);
        assert!(!root.join(DIFF_FILE).exists());

        std::fs::write(root.join("content/a.md"), "one\n2\n").unwrap();
        run(&global, &CompileArgs { diff: true }).unwrap();
        assert_eq!(
            std::fs::read_to_string(root.join(DIFF_FILE)).unwrap(),
            "--- a/output/a.html\n+++ b/output/a.html\n@@ -1,2 +1,2 @@\n one\n-two\n+2\n"
        );

        run(&global, &CompileArgs::default()).unwrap();
        assert!(root.join(DIFF_FILE).exists());
        run(&global, &CompileArgs { diff: true }).unwrap();
        assert!(!root.join(DIFF_FILE).exists());
    }

    #[test]
    fn timing_orders_slowest_first() {
        let mut timing = TimingRecorder::default();
        let (a, b) = (rep("/a.md"), rep("/b.md"));
        let reasons: [Reason; 0] = [];
        for (rep, ms, outcome) in [
            (&a, 5, RepOutcome::Compiled),
            (&b, 50, RepOutcome::Compiled),
            (&a, 0, RepOutcome::Reused),
        ] {
            timing.rep_ended(&RepEnded {
                rep,
                duration: Duration::from_millis(ms),
                reasons: &reasons,
                outcome,
            });
        }
        assert_eq!(timing.reused, 1);
        let slowest: Vec<&ItemRep> = timing.slowest(1).into_iter().map(|(r, _)| r).collect();
        assert_eq!(slowest, vec![&b]);
    }
}
