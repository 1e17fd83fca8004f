//! Experience command dispatch.
//!
//! The entry points behind the engine's `exp`, `defrag`, `merge`, and
//! import commands. The UCI loop tokenizes its input line and hands the
//! remainder here; diagnostics flow through the store's info sink, and
//! any direct output (the `exp` table) comes back as the return value.
//! Commands never terminate the process; failures are reported and the
//! call returns.

use std::sync::Arc;

use crate::cpgn::{import_cpgn, ImportOptions};
use crate::options::ExperienceOptions;
use crate::oracle::GameOracle;
use crate::show::render_experience;
use crate::sink::InfoSink;
use crate::store::{self, ExperienceStore};
use crate::types::Value;

/// Dispatch one experience command. `None` means the command name is
/// not ours and the caller should fall through to its own handling;
/// `Some(output)` is handled, with any direct (non-info) output.
pub fn handle_command<O: GameOracle>(
    store: &mut ExperienceStore,
    oracle: &mut O,
    options: &ExperienceOptions,
    line: &str,
) -> Option<String> {
    let mut tokens = split_args(line);
    if tokens.is_empty() {
        return None;
    }

    let command = tokens.remove(0);
    let sink = Arc::clone(store.sink());

    match command.as_str() {
        "exp" => {
            store.wait_for_loading_finished();
            Some(render_experience(store, oracle, options.eval_importance(), false))
        }

        "expex" => {
            store.wait_for_loading_finished();
            Some(render_experience(store, oracle, options.eval_importance(), true))
        }

        "defrag" => {
            store.wait_for_loading_finished();

            // Without an argument the configured experience file is
            // defragmented.
            let path = match tokens.len() {
                0 => options.file.clone(),
                1 => tokens.remove(0),
                _ => {
                    sink.info("Syntax: defrag [filename]");
                    return Some(String::new());
                }
            };

            store::defrag(&path, sink);
            Some(String::new())
        }

        "merge" => {
            store.wait_for_loading_finished();

            // One argument merges into the configured file; otherwise
            // the first name is the target.
            let (target, sources) = match tokens.len() {
                0 => {
                    sink.info("Syntax: merge <target.exp> <file1.exp> [file2.exp] ...");
                    return Some(String::new());
                }
                1 => (options.file.clone(), tokens),
                _ => {
                    let target = tokens.remove(0);
                    (target, tokens)
                }
            };

            store::merge(&target, &sources, sink);
            Some(String::new())
        }

        "import_cpgn" => {
            store.wait_for_loading_finished();

            if tokens.len() != 1 {
                sink.info("Syntax: import_cpgn <source.cpgn>");
                return Some(String::new());
            }
            if options.file.is_empty() {
                sink.info(
                    "No Experience File set. Use: setoption name Experience File value <dest.exp>",
                );
                return Some(String::new());
            }

            run_import(oracle, &tokens[0], &options.file, &[], sink);
            Some(String::new())
        }

        "cpgn_to_exp" => {
            store.wait_for_loading_finished();

            if tokens.len() < 2 {
                sink.info("Syntax: cpgn_to_exp <source.cpgn> <dest.exp> [max_ply] [max_value] [min_depth] [max_depth]");
                return Some(String::new());
            }

            let source = tokens.remove(0);
            let dest = tokens.remove(0);
            run_import(oracle, &source, &dest, &tokens, sink);
            Some(String::new())
        }

        "import_pgn" => {
            sink.info("Syntax: import_pgn <source.pgn>");
            sink.info(
                "import_pgn not supported in this build. Convert PGN -> CPGN upstream, then use import_cpgn.",
            );
            Some(String::new())
        }

        "pgn_to_exp" => {
            sink.info("Syntax: pgn_to_exp <source.pgn> <dest.exp>");
            sink.info(
                "pgn_to_exp not supported in this build. Convert PGN -> CPGN upstream, then use cpgn_to_exp.",
            );
            Some(String::new())
        }

        _ => None,
    }
}

fn run_import<O: GameOracle>(
    oracle: &mut O,
    source: &str,
    dest: &str,
    extra: &[String],
    sink: Arc<dyn InfoSink>,
) {
    let mut import_options = ImportOptions::default();

    // Optional trailing numeric filters, positional.
    if let Some(v) = extra.first().and_then(|t| t.parse().ok()) {
        import_options.max_ply = v;
    }
    if let Some(v) = extra.get(1).and_then(|t| t.parse().ok()) {
        import_options.max_value = Value::new(v);
    }
    if let Some(v) = extra.get(2).and_then(|t| t.parse().ok()) {
        import_options.min_depth = v;
    }
    if let Some(v) = extra.get(3).and_then(|t| t.parse().ok()) {
        import_options.max_depth = v;
    }

    if let Err(e) = import_cpgn(oracle, source, dest, &import_options, Arc::clone(&sink)) {
        sink.info(&format!("Could not import [{source}]: {e}"));
    }
}

/// Split command arguments, honoring double-quoted filenames with
/// spaces.
fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}
