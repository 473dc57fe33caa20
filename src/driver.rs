//! The conversion driver: a two-pass orchestration from one input file
//! (plus an optional SAS catalog) to an output module.
//!
//! Pass 1 installs only the label-side handlers (`info`, `value_label`,
//! `fweight`) and runs over the catalog when one is given, otherwise over
//! the input itself. Pass 2 installs `info`, `variable`, and `value` and
//! runs over the input. Both passes forward events to the selected output
//! module; the passes share no parser state. Everything carried forward
//! lives in the driver context: pass 1 accumulates a [`LabelSnapshot`]
//! (value-label sets plus the frequency-weight index) which is frozen and
//! handed to pass 2 read-only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser as ClapParser;
use log::debug;

use crate::error::{Error, Result};
use crate::io::FileSource;
use crate::output::{self, OutputModule};
use crate::parser::{Flow, Handler, InputFormat, Parser};
use crate::value::{FileMetadata, MissingTag, Value, Variable};

/// Owned key of a value-label entry collected during pass 1.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelKey {
    /// Numeric key.
    Num(f64),
    /// Character key.
    Str(String),
    /// Missing-value key.
    Missing(MissingTag),
}

impl From<&Value<'_>> for LabelKey {
    fn from(value: &Value<'_>) -> Self {
        if let Some(tag) = value.tag() {
            Self::Missing(tag)
        } else if let Some(s) = value.as_str() {
            Self::Str(s.to_string())
        } else {
            Self::Num(value.as_f64().unwrap_or_default())
        }
    }
}

/// Pass-1 accumulation: value-label sets and the frequency-weight
/// designation. Frozen after pass 1 and handed to pass 2 read-only.
#[derive(Debug, Clone, Default)]
pub struct LabelSnapshot {
    /// Value-label sets by name, entries in arrival order.
    pub label_sets: BTreeMap<String, Vec<(LabelKey, String)>>,
    /// Index of the frequency-weight variable, when one is designated.
    pub fweight_index: Option<usize>,
}

#[derive(Debug, ClapParser)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    /// Print the version banner and exit.
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Print usage and exit.
    #[arg(short = 'h', long = "help")]
    help: bool,

    /// input [catalog] output
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
}

fn print_version() {
    eprintln!("bdatrs version {}", env!("CARGO_PKG_VERSION"));
}

fn print_usage(cmd: &str) {
    print_version();
    eprintln!();
    eprintln!("  Standard usage:");
    eprintln!();
    eprintln!("     {cmd} input.(dta|por|sav|sas7bdat) output.(csv|sas7bdat)");
    eprintln!();
    eprintln!("  Usage if your value labels are stored in a separate SAS catalog file:");
    eprintln!();
    eprintln!("     {cmd} input.sas7bdat catalog.sas7bcat output.(csv|sas7bdat)");
    eprintln!();
}

/// Shared state across both passes.
struct DriverContext<'a> {
    module: &'a mut dyn OutputModule,
    labels: LabelSnapshot,
    row_count: u64,
    var_count: u64,
    failure: Option<Error>,
}

impl DriverContext<'_> {
    fn forward(&mut self, result: Result<()>) -> Flow {
        match result {
            Ok(()) => Flow::Continue,
            Err(err) => {
                self.failure = Some(err);
                Flow::Abort
            }
        }
    }

    /// Swap a module failure back in for the parser's abort status.
    fn resolve(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Err(Error::UserAbort) => match self.failure.take() {
                Some(err) => Err(err),
                None => Err(Error::UserAbort),
            },
            other => other,
        }
    }
}

/// Pass 1: value labels and the frequency-weight designation.
struct LabelPass<'a, 'b> {
    ctx: &'a mut DriverContext<'b>,
}

impl Handler for LabelPass<'_, '_> {
    fn info(&mut self, obs_count: i64, var_count: i64) -> Flow {
        let result = self.ctx.module.info(obs_count, var_count);
        self.ctx.forward(result)
    }

    fn value_label(&mut self, set: &str, key: &Value<'_>, label: &str) -> Flow {
        self.ctx
            .labels
            .label_sets
            .entry(set.to_string())
            .or_default()
            .push((LabelKey::from(key), label.to_string()));
        let result = self.ctx.module.value_label(set, key, label);
        self.ctx.forward(result)
    }

    fn fweight(&mut self, var_index: usize) -> Flow {
        self.ctx.labels.fweight_index = Some(var_index);
        let result = self.ctx.module.fweight(var_index);
        self.ctx.forward(result)
    }

    fn error(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// Pass 2: variables and row data, with read-only access to the pass-1
/// snapshot.
struct DataPass<'a, 'b, 'c> {
    ctx: &'a mut DriverContext<'b>,
    labels: &'c LabelSnapshot,
}

impl Handler for DataPass<'_, '_, '_> {
    fn info(&mut self, obs_count: i64, var_count: i64) -> Flow {
        let result = self.ctx.module.info(obs_count, var_count);
        self.ctx.forward(result)
    }

    fn metadata(&mut self, meta: &FileMetadata) -> Flow {
        debug!(
            "input metadata: label {:?}, version {}",
            meta.file_label, meta.format_version
        );
        Flow::Continue
    }

    fn variable(&mut self, _index: usize, variable: &Variable, label_set: Option<&str>) -> Flow {
        if let Some(set) = label_set {
            match self.labels.label_sets.get(set) {
                Some(entries) => debug!(
                    "variable {} uses label set {set} ({} entries)",
                    variable.name,
                    entries.len()
                ),
                None => debug!(
                    "variable {} references label set {set} not collected in pass 1",
                    variable.name
                ),
            }
        }
        let result = self.ctx.module.variable(variable, label_set);
        self.ctx.forward(result)
    }

    fn value(&mut self, obs_index: usize, var_index: usize, value: &Value<'_>) -> Flow {
        if var_index == 0 {
            self.ctx.row_count += 1;
        }
        if obs_index == 0 {
            self.ctx.var_count += 1;
        }
        let result = self.ctx.module.value(obs_index, var_index, value);
        self.ctx.forward(result)
    }

    fn error(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

fn run_passes(input: &Path, catalog: Option<&Path>, ctx: &mut DriverContext<'_>) -> Result<()> {
    // Pass 1: collect fweight and value labels.
    let mut pass1 = Parser::new(FileSource::new());
    let pass1_target = catalog.unwrap_or(input);
    let result = pass1.parse_path(pass1_target, &mut LabelPass { ctx: &mut *ctx });
    ctx.resolve(result)?;

    // Freeze the pass-1 accumulation; pass 2 only reads it.
    let labels = std::mem::take(&mut ctx.labels);
    debug!(
        "pass 1 collected {} value-label sets, fweight {:?}",
        labels.label_sets.len(),
        labels.fweight_index
    );

    // Pass 2: full parse.
    let mut pass2 = Parser::new(FileSource::new());
    let result = pass2.parse_path(
        input,
        &mut DataPass {
            ctx: &mut *ctx,
            labels: &labels,
        },
    );
    ctx.resolve(result)
}

fn convert(
    input: &Path,
    catalog: Option<&Path>,
    output: &Path,
    module: &mut dyn OutputModule,
) -> Result<(u64, u64)> {
    module.init(output)?;

    let mut ctx = DriverContext {
        module,
        labels: LabelSnapshot::default(),
        row_count: 0,
        var_count: 0,
        failure: None,
    };

    let passes = run_passes(input, catalog, &mut ctx);
    // Teardown runs whenever init succeeded, even after a failed pass; a
    // teardown failure must not mask the pass error.
    let finish = ctx.module.finish();
    passes?;
    finish?;
    Ok((ctx.var_count, ctx.row_count))
}

/// Run the driver with `argv` (program name first); returns the process
/// exit code.
#[must_use]
pub fn run(argv: Vec<String>) -> i32 {
    let cmd = argv
        .first()
        .map_or_else(|| "bdatrs".to_string(), Clone::clone);

    let cli = match Cli::try_parse_from(&argv) {
        Ok(cli) => cli,
        Err(_) => {
            print_usage(&cmd);
            return 1;
        }
    };

    if cli.version {
        print_version();
        return 0;
    }
    if cli.help {
        print_usage(&cmd);
        return 0;
    }

    let mut modules = output::default_modules();

    let (input, catalog, output_path) = match cli.files.as_slice() {
        [input, output_path] => (input.clone(), None, output_path.clone()),
        [input, catalog, output_path] => {
            (input.clone(), Some(catalog.clone()), output_path.clone())
        }
        _ => {
            print_usage(&cmd);
            return 1;
        }
    };

    let input_ok = InputFormat::from_path(&input).is_some();
    let catalog_ok = catalog
        .as_deref()
        .is_none_or(|c| InputFormat::from_path(c).is_some_and(InputFormat::is_catalog));
    let output_ok = output::module_for_path(&mut modules, &output_path).is_some();
    if !input_ok || !catalog_ok || !output_ok {
        print_usage(&cmd);
        return 1;
    }

    let start = Instant::now();
    let result = {
        let Some(module) = output::module_for_path(&mut modules, &output_path) else {
            print_usage(&cmd);
            return 1;
        };
        convert(&input, catalog.as_deref(), &output_path, module.as_mut())
    };

    match result {
        Ok((var_count, row_count)) => {
            eprintln!(
                "Converted {} variables and {} rows in {:.2} seconds",
                var_count,
                row_count,
                start.elapsed().as_secs_f64()
            );
            0
        }
        Err(err) => {
            eprintln!("{err}");
            let _ = std::fs::remove_file(&output_path);
            1
        }
    }
}
