//! CLI: config(s) → (solidity | ops)
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::info;
use rayon::prelude::*;

use template_json::builtins::Builtins;
use template_json::codegen::Codegen;
use template_json::config::Config;
use template_json::library::{Library, compile_library};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile JSON templates over typed structs into Solidity encoding libraries
#[derive(Parser, Debug)]
#[command(name = "template-json", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile each config and emit its Solidity library
    Solidity(SolidityOut),
    /// compile each config and print the per-function operation streams as JSON
    Ops(OpsOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more config files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct SolidityOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .sol file (stdout if omitted); a directory when there are several inputs
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// pipe the result through `forge fmt` (always on with --out)
    #[arg(long)]
    format: bool,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct OpsOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted); a directory when there are several inputs
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Compile every input in parallel. Results come back in input order.
    fn load_process(&self) -> anyhow::Result<Vec<(PathBuf, anyhow::Result<Library>)>> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let builtins = Builtins::standard();
        Ok(source_paths
            .into_par_iter()
            .map(|source_path| {
                let library = compile_path(&source_path, &builtins);
                (source_path, library)
            })
            .collect())
    }
}

fn compile_path(source_path: &Path, builtins: &Builtins) -> anyhow::Result<Library> {
    info!("loading {}", source_path.display());
    let config = Config::load(source_path)?;
    compile_library(&config, builtins).map_err(|error| anyhow!(error.report()))
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Solidity(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let format = target.format || target.out.is_some();
                let results = target.input_settings.load_process()?;
                let multiple = results.len() > 1;
                emit_all(results, |source_path, library| {
                    let mut cg = Codegen::new();
                    cg.emit(&library);
                    let mut src = cg.into_string();
                    if format {
                        src = template_json::fmt::format_solidity(&src)
                            .with_context(|| format!("failed to format output for {}", source_path.display()))?;
                    }
                    write_output(target.out.as_deref(), multiple, source_path, "sol", &src)
                })
            }
            Command::Ops(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let results = target.input_settings.load_process()?;
                let multiple = results.len() > 1;
                emit_all(results, |source_path, library| {
                    let json = serde_json::to_string_pretty(&library).context("failed to serialize operations")?;
                    write_output(target.out.as_deref(), multiple, source_path, "json", &json)
                })
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Report every failing config; fail the run if any did.
fn emit_all(
    results: Vec<(PathBuf, anyhow::Result<Library>)>,
    mut apply: impl FnMut(&Path, Library) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let total = results.len();
    let mut failed = 0;
    for (source_path, library) in results {
        let outcome = library.and_then(|library| apply(&source_path, library));
        if let Err(error) = outcome {
            failed += 1;
            eprintln!("{} {}: {error:#}", "✗".red().bold(), source_path.display().to_string().red());
        }
    }
    if failed > 0 {
        bail!("{failed} of {total} config(s) failed");
    }
    Ok(())
}

fn write_output(out: Option<&Path>, multiple: bool, source_path: &Path, ext: &str, contents: &str) -> anyhow::Result<()> {
    let Some(out) = out else {
        println!("{contents}");
        return Ok(());
    };
    let target = if multiple {
        let stem = source_path.file_stem().context("input path has no file name")?;
        out.join(stem).with_extension(ext)
    } else {
        out.to_path_buf()
    };
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(&target, contents).with_context(|| format!("failed to write {}", target.display()))?;
    eprintln!("{} {}", "wrote".green(), target.display());
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
