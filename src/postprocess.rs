#![deny(
    clippy::correctness,
    unused_lifetimes,
    unused_unsafe,
    single_use_lifetimes,
    missing_debug_implementations
)]

use mimalloc::MiMalloc;
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use clap::{Arg, ArgAction, Command};
use glob::glob;
use log::{error, info, warn};

use glslsmith::{
    error::HarnessError,
    generator::{GenerationContext, ProgramSnapshot},
    harness::HarnessKind,
    ir::printer::print_unit,
    passes::{wrappers::TRACE_BUFFER, Extent, WrapperMode},
    Error, Pipeline, RunConfig,
};

/// Reapplies the pipeline to the program stored next to `src` and writes
/// the resulting harness to `dest`.
fn process_harness(pipeline: &Pipeline, src: &Path, dest: &Path) -> Result<(), Error> {
    let kind = src
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(HarnessKind::from_extension)
        .ok_or_else(|| HarnessError::UnknownFormat(src.display().to_string()))?;
    let harness = kind.build();

    let sidecar = fs::read_to_string(src.with_extension("ron"))?;
    let snapshot: ProgramSnapshot = ron::from_str(&sidecar)?;
    let ctx = pipeline.run(GenerationContext::from_snapshot(snapshot.clone()))?;

    let text = fs::read_to_string(src)?;
    let rewritten = if harness.buffers(&text)?.len() == ctx.buffers().len() {
        harness.change_shader(&text, &print_unit(&ctx.unit))?
    } else {
        harness.print_harness(&ctx)
    };
    fs::write(dest, rewritten)?;
    if dest != src {
        let sidecar = ron::ser::to_string_pretty(&snapshot, ron::ser::PrettyConfig::default())?;
        fs::write(dest.with_extension("ron"), sidecar)?;
    }
    Ok(())
}

/// Every harness below `dir`, in path order.
fn harnesses_in(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut pattern = dir.to_path_buf();
    pattern.push("**/*");
    let pattern = pattern.to_string_lossy();
    let mut found: Vec<PathBuf> = glob(&pattern)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?
        .filter_map(Result::ok)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .and_then(HarnessKind::from_extension)
                .is_some()
        })
        .collect();
    found.sort();
    Ok(found)
}

/// Where the rewritten `file` from the batch rooted at `src` goes.
fn destination(src: &Path, dest: Option<&PathBuf>, file: &Path) -> PathBuf {
    match dest {
        None => file.to_path_buf(),
        Some(dest) if src.is_dir() => dest.join(file.strip_prefix(src).unwrap_or(file)),
        Some(dest) => dest.clone(),
    }
}

fn wrapper_mode(res: &clap::ArgMatches) -> Result<WrapperMode, Error> {
    if let Some(ids) = res.get_one::<PathBuf>("reduce_wrappers") {
        let text = fs::read_to_string(ids)?;
        let values = text.trim_start();
        let values = values.strip_prefix(TRACE_BUFFER).unwrap_or(values);
        return Ok(WrapperMode::reduced_from_trace(values)?);
    }
    if res.get_flag("id_wrappers") {
        return Ok(WrapperMode::Traced);
    }
    Ok(WrapperMode::Plain)
}

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let res = Command::new("glslsmith-post")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reapplies the rewrite pipeline to emitted harnesses")
        .arg(
            Arg::new("src")
                .long("src")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("A harness file or a directory of harnesses"),
        )
        .arg(
            Arg::new("dest")
                .long("dest")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Where to write the result; rewrites in place if absent"),
        )
        .arg(
            Arg::new("id_wrappers")
                .long("id_wrappers")
                .help("Give every wrapper call site an id and trace the branch it takes")
                .action(ArgAction::SetTrue)
                .conflicts_with("reduce_wrappers"),
        )
        .arg(
            Arg::new("reduce_wrappers")
                .long("reduce_wrappers")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Dumped trace buffer; keeps wrappers only where the fallback ran"),
        )
        .arg(
            Arg::new("extent")
                .long("extent")
                .value_parser(clap::value_parser!(Extent))
                .help("Pipeline stages to apply"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(clap::value_parser!(PathBuf))
                .help("The .yaml pipeline config file"),
        )
        .get_matches();

    let config = match res.get_one::<PathBuf>("config") {
        Some(path) => RunConfig::load(path),
        None => Ok(RunConfig::default()),
    };
    let mode = wrapper_mode(&res);
    let (config, mode) = match (config, mode) {
        (Ok(config), Ok(mode)) => (config, mode),
        (Err(err), _) | (_, Err(err)) => {
            error!("{err}");
            process::exit(1);
        }
    };
    let mut pipeline = Pipeline::new(config.pipeline).with_wrapper_mode(mode);
    if let Some(extent) = res.get_one::<Extent>("extent") {
        pipeline = pipeline.with_extent(*extent);
    }

    let Some(src) = res.get_one::<PathBuf>("src") else {
        process::exit(1);
    };
    let dest = res.get_one::<PathBuf>("dest");
    let files = if src.is_dir() {
        match harnesses_in(src) {
            Ok(files) => files,
            Err(err) => {
                error!("Cannot traverse {}: {err}", src.display());
                process::exit(1);
            }
        }
    } else {
        vec![src.clone()]
    };

    let mut failures = 0;
    for file in &files {
        let target = destination(src, dest, file);
        if let Some(parent) = target.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!("skipping {}: {err}", file.display());
                failures += 1;
                continue;
            }
        }
        match process_harness(&pipeline, file, &target) {
            Ok(()) => info!("{} -> {}", file.display(), target.display()),
            Err(err) => {
                failures += 1;
                warn!("skipping {}: {err}", file.display());
            }
        }
    }
    info!("{} of {} harnesses rewritten", files.len() - failures, files.len());
    if failures > 0 && failures == files.len() {
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_destinations_mirror_the_source_tree() {
        let src = std::env::temp_dir();
        let file = src.join("nested/test_0.amber");
        let dest = PathBuf::from("/out");
        assert_eq!(
            destination(&src, Some(&dest), &file),
            PathBuf::from("/out/nested/test_0.amber")
        );
        assert_eq!(destination(&src, None, &file), file);
    }
}
