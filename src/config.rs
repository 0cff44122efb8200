use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::layout::Layout;

/// Generate the list of freedom-metal driver sources for a devicetree
#[derive(Parser, Debug)]
#[command(name = "metal-depend", version, about, long_about = None)]
pub struct Args {
    /// The path to the devicetree for the target
    #[arg(short, long)]
    pub dts: PathBuf,

    /// The path to the freedom-metal source tree
    #[arg(short, long)]
    pub metal: PathBuf,

    /// Feature to enable, may be repeated
    #[arg(short, long = "feature")]
    pub features: Vec<String>,

    /// The path of the source list file to output, stdout if absent
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Emit a source list in make format (the default)
    #[arg(long, conflicts_with = "meson")]
    pub make: bool,

    /// Emit a source list in meson format
    #[arg(long)]
    pub meson: bool,

    /// Extra directory searched for devicetree includes, may be repeated
    #[arg(short = 'I', long = "include-dir")]
    pub include_dirs: Vec<PathBuf>,

    /// Directory holding make.mk and meson.mk templates to use instead of the built-in ones
    #[arg(short, long)]
    pub templates: Option<PathBuf>,

    /// Also write the merged devicetree as JSON to this path
    #[arg(long)]
    pub dump_tree: Option<PathBuf>,

    /// More diagnostics on stderr, may be repeated
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only warnings and errors on stderr
    #[arg(short, long)]
    pub quiet: bool,
}

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub dts: PathBuf,
    pub metal: PathBuf,
    pub features: Vec<String>,
    pub output: Option<PathBuf>,
    pub layout: Layout,
    pub include_dirs: Vec<PathBuf>,
    pub templates: Option<PathBuf>,
    pub dump_tree: Option<PathBuf>,
    pub log_level: LevelFilter,
}

impl Config {
    /// A config with defaults for everything but the two required paths.
    pub fn new(dts: impl Into<PathBuf>, metal: impl Into<PathBuf>) -> Self {
        Self {
            dts: dts.into(),
            metal: metal.into(),
            features: Vec::new(),
            output: None,
            layout: Layout::default(),
            include_dirs: Vec::new(),
            templates: None,
            dump_tree: None,
            log_level: LevelFilter::Info,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let log_level = match (args.quiet, args.verbose) {
            (true, _) => LevelFilter::Warn,
            (false, 0) => LevelFilter::Info,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        };
        Self {
            layout: Layout::from_flags(args.make, args.meson),
            features: args.features,
            output: args.output,
            include_dirs: args.include_dirs,
            templates: args.templates,
            dump_tree: args.dump_tree,
            log_level,
            ..Config::new(args.dts, args.metal)
        }
    }
}
