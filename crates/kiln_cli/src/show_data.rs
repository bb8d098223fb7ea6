//! Implementation of the `kiln show-data` command: prints what the previous
//! run recorded and what the next run would recompile, without compiling.

use std::fmt::Write;

use kiln_compiler::Compiler;
use kiln_deps::Dependent;
use kiln_model::Site;
use kiln_outdated::{Outdatable, Reason};

use crate::data_source::{self, CliResult};
use crate::GlobalArgs;

const LEGEND: &str = "\
Legend:
  r = dependency on raw content
  a = dependency on attributes
  c = dependency on compiled content
  p = dependency on the path
";

/// Runs `kiln show-data`.
pub fn run(global: &GlobalArgs) -> CliResult<i32> {
    let dir = data_source::resolve_site_dir(global)?;
    let loaded = data_source::load(&dir)?;
    let cache = loaded.open_cache();
    let mut compiler = Compiler::new(
        &loaded.site,
        loaded.rules,
        kiln_compiler::FilterRegistry::with_builtins(),
        cache,
    );
    compiler.run_until_reps_built()?;
    print!("{}", render(&loaded.site, &compiler)?);
    Ok(0)
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title} {}\n", "=".repeat(78 - title.len()));
}

fn outdatedness(out: &mut String, reasons: &[Reason]) {
    if reasons.is_empty() {
        out.push_str("  is not outdated\n");
        return;
    }
    out.push_str("  is outdated:\n");
    for reason in reasons {
        let _ = writeln!(out, "    - {}", reason.message());
    }
}

/// Renders the item dependencies, rep outdatedness and layout outdatedness
/// sections.
fn render(site: &Site, compiler: &Compiler<'_>) -> CliResult<String> {
    let mut out = String::new();

    heading(&mut out, "Item dependencies");
    out.push_str(LEGEND);
    for id in site.items.identifiers() {
        let _ = writeln!(out, "\nitem {id} depends on:");
        let edges = compiler
            .dependency_store()
            .raw_dependencies_of(&Dependent::Item(id.clone()));
        if edges.is_empty() {
            out.push_str("  (nothing)\n");
        }
        for edge in edges {
            let _ = writeln!(out, "  {edge}");
        }
    }

    let checker = compiler.checker();
    out.push('\n');
    heading(&mut out, "Item reps");
    for rep in compiler.reps() {
        let _ = writeln!(out, "{rep}:");
        outdatedness(&mut out, &checker.outdatedness_reasons_for(Outdatable::Rep(rep))?);
        out.push('\n');
    }

    heading(&mut out, "Layouts");
    for id in site.layouts.identifiers() {
        let _ = writeln!(out, "layout {id}:");
        outdatedness(&mut out, &checker.outdatedness_reasons_for(Outdatable::Layout(id))?);
        out.push('\n');
    }
    Ok(out)
}
