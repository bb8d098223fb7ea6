//! `kiln compile --diff`: unified diffs of every output file a run changes.
//!
//! The diffs of one run are collected in `output.diff` in the site
//! directory. Binary outputs and newly created files are not diffed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_compiler::{CompilationListener, FileAction};
use kiln_model::{Content, ItemRep};

/// Name of the diff file, relative to the site directory.
pub const DIFF_FILE: &str = "output.diff";

/// Unchanged lines shown around each change.
const CONTEXT: usize = 3;

/// Collects a diff for each output file that is updated.
pub struct OutputDiff {
    output_dir: PathBuf,
    label_dir: PathBuf,
    pending: BTreeMap<PathBuf, (String, String)>,
    diffs: Vec<String>,
}

impl OutputDiff {
    /// Diffs files under `output_dir`, naming them under `label_dir` in the
    /// diff headers.
    pub fn new(output_dir: PathBuf, label_dir: PathBuf) -> Self {
        Self {
            output_dir,
            label_dir,
            pending: BTreeMap::new(),
            diffs: Vec::new(),
        }
    }

    /// Writes the collected diffs to `path`. A run that changed nothing
    /// writes no file.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if self.diffs.is_empty() {
            return Ok(());
        }
        std::fs::write(path, self.diffs.concat())?;
        tracing::info!(path = %path.display(), files = self.diffs.len(), "wrote output diff");
        Ok(())
    }
}

impl CompilationListener for OutputDiff {
    fn file_writing(&mut self, _rep: &ItemRep, path: &Path, content: &Content) {
        let Some(new) = content.as_text() else {
            return;
        };
        let Ok(old) = std::fs::read_to_string(self.output_dir.join(path)) else {
            return;
        };
        if old != new {
            self.pending
                .insert(path.to_path_buf(), (old, new.to_string()));
        }
    }

    fn file_written(&mut self, _rep: &ItemRep, path: &Path, action: FileAction) {
        let Some((old, new)) = self.pending.remove(path) else {
            return;
        };
        if action == FileAction::Updated {
            let label = self.label_dir.join(path);
            self.diffs
                .push(unified_diff(&label.to_string_lossy(), &old, &new));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Same,
    Removed,
    Added,
}

/// Line-level edit script from `old` to `new`, following a longest common
/// subsequence. Removals come before additions within a change.
fn edit_script<'t>(old: &[&'t str], new: &[&'t str]) -> Vec<(Line, &'t str)> {
    let (n, m) = (old.len(), new.len());
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut script = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            script.push((Line::Same, old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            script.push((Line::Removed, old[i]));
            i += 1;
        } else {
            script.push((Line::Added, new[j]));
            j += 1;
        }
    }
    script.extend(old[i..].iter().map(|l| (Line::Removed, *l)));
    script.extend(new[j..].iter().map(|l| (Line::Added, *l)));
    script
}

/// `start,count` of a hunk side, where `before` lines precede the hunk.
fn hunk_range(before: usize, count: usize) -> String {
    match count {
        0 => format!("{before},0"),
        1 => format!("{}", before + 1),
        _ => format!("{},{count}", before + 1),
    }
}

/// Renders a unified diff of `old` and `new` with `label` in both headers.
pub fn unified_diff(label: &str, old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let script = edit_script(&old_lines, &new_lines);

    let changes: Vec<usize> = script
        .iter()
        .enumerate()
        .filter(|(_, (kind, _))| *kind != Line::Same)
        .map(|(i, _)| i)
        .collect();

    // Group changes whose unchanged gap fits in the context of both.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    for &at in &changes {
        match groups.last_mut() {
            Some((_, last)) if at - *last <= 2 * CONTEXT + 1 => *last = at,
            _ => groups.push((at, at)),
        }
    }

    let mut out = format!("--- a/{label}\n+++ b/{label}\n");
    for (first, last) in groups {
        let start = first.saturating_sub(CONTEXT);
        let end = (last + 1 + CONTEXT).min(script.len());
        let old_before = script[..start]
            .iter()
            .filter(|(kind, _)| *kind != Line::Added)
            .count();
        let new_before = script[..start]
            .iter()
            .filter(|(kind, _)| *kind != Line::Removed)
            .count();
        let hunk = &script[start..end];
        let old_count = hunk.iter().filter(|(kind, _)| *kind != Line::Added).count();
        let new_count = hunk.iter().filter(|(kind, _)| *kind != Line::Removed).count();

        out.push_str(&format!(
            "@@ -{} +{} @@\n",
            hunk_range(old_before, old_count),
            hunk_range(new_before, new_count)
        ));
        for (kind, text) in hunk {
            let marker = match kind {
                Line::Same => ' ',
                Line::Removed => '-',
                Line::Added => '+',
            };
            out.push(marker);
            out.push_str(text);
            out.push('\n');
        }
    }
    out
}
