#![deny(
    clippy::correctness,
    clippy::cast_possible_wrap,
    unused_lifetimes,
    unused_unsafe,
    single_use_lifetimes,
    missing_debug_implementations
)]

use mimalloc::MiMalloc;
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::{fs, path::PathBuf, process};

use clap::{Arg, ArgAction, Command};
use libafl_bolts::current_nanos;
use log::{error, info, warn};

use glslsmith::{
    harness::{Harness, HarnessKind},
    ir::printer::print_unit,
    passes::validate::validate_glsl,
    randomext::RandomGeneratorKind,
    Error, Pipeline, ProgramGenerator, RunConfig,
};

struct Session {
    generator: ProgramGenerator,
    pipeline: Pipeline,
    random: RandomGeneratorKind,
    harness: Box<dyn Harness>,
    out_dir: PathBuf,
    validate: bool,
}

impl Session {
    /// Generates, rewrites and writes shader `index`, returning the harness
    /// path. The raw program is stored next to it for the post-processor.
    fn emit(&self, index: u64, seed: u64) -> Result<PathBuf, Error> {
        let mut rng = self.random.build(seed);
        let ctx = self.generator.generate(rng.as_mut())?;
        let snapshot = ctx.snapshot();
        let ctx = self.pipeline.run(ctx)?;
        if self.validate {
            validate_glsl(&print_unit(&ctx.unit))?;
        }

        let stem = self.out_dir.join(format!("test_{index}"));
        let harness_path = stem.with_extension(self.harness.extension());
        fs::write(&harness_path, self.harness.print_harness(&ctx))?;
        let sidecar = ron::ser::to_string_pretty(&snapshot, ron::ser::PrettyConfig::default())?;
        fs::write(stem.with_extension("ron"), sidecar)?;
        Ok(harness_path)
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<RunConfig, Error> {
    match path {
        Some(path) => RunConfig::load(path),
        None => Ok(RunConfig::default()),
    }
}

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let res = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about("Random GLSL compute shader generator")
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("Seed of the first shader; shader i uses seed + i")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("shader-count")
                .long("shader-count")
                .help("Number of shaders to generate")
                .value_parser(clap::value_parser!(u64))
                .default_value("1"),
        )
        .arg(
            Arg::new("random-generator")
                .long("random-generator")
                .help("Distribution of the random source")
                .value_parser(clap::value_parser!(RandomGeneratorKind))
                .default_value("multiplerange"),
        )
        .arg(
            Arg::new("output-directory")
                .long("output-directory")
                .help("The directory to place harnesses in")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("."),
        )
        .arg(
            Arg::new("printer-format")
                .long("printer-format")
                .help("Harness format")
                .value_parser(clap::value_parser!(HarnessKind))
                .default_value("shadertrap"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(clap::value_parser!(PathBuf))
                .help("The .yaml generator and pipeline config file"),
        )
        .arg(
            Arg::new("validate")
                .long("validate")
                .help("Reject shaders naga does not accept")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config = match load_config(res.get_one::<PathBuf>("config")) {
        Ok(config) => config,
        Err(err) => {
            error!("Cannot load config: {err}");
            process::exit(1);
        }
    };

    let out_dir: PathBuf = res
        .get_one::<PathBuf>("output-directory")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    if let Err(err) = fs::create_dir_all(&out_dir) {
        error!("Cannot create output directory {}: {err}", out_dir.display());
        process::exit(1);
    }

    let seed = res.get_one::<u64>("seed").copied().unwrap_or_else(current_nanos);
    let count = res.get_one::<u64>("shader-count").copied().unwrap_or(1);
    let session = Session {
        generator: ProgramGenerator::new(config.generator),
        pipeline: Pipeline::new(config.pipeline),
        random: res
            .get_one::<RandomGeneratorKind>("random-generator")
            .copied()
            .unwrap_or(RandomGeneratorKind::MultipleRange),
        harness: res
            .get_one::<HarnessKind>("printer-format")
            .copied()
            .unwrap_or_default()
            .build(),
        out_dir,
        validate: res.get_flag("validate"),
    };

    let mut failures = 0;
    for index in 0..count {
        let shader_seed = seed.wrapping_add(index);
        match session.emit(index, shader_seed) {
            Ok(path) => info!("shader {index} (seed {shader_seed}) -> {}", path.display()),
            Err(err) => {
                failures += 1;
                warn!("skipping shader {index} (seed {shader_seed}): {err}");
            }
        }
    }
    info!("{} of {count} shaders written", count - failures);
    if failures == count && count > 0 {
        process::exit(1);
    }
}
