use crate::types::UNSPECIFIED;
use crate::validate::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // If there's a git tag at HEAD, use just the tag (release build)
    if let Some(tag) = option_env!("QTDL_GIT_TAG") {
        return tag;
    }

    // Not on a tag - include commit hash and branch (dev build)
    let commit = option_env!("QTDL_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("QTDL_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup to get a 'static str for clap
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser, Debug)]
#[command(name = "qtdl")]
#[command(about = "Discover and install Qt kits from the Qt online repository")]
#[command(version = get_version())]
#[command(
    after_help = "Leave a level out (or pass 'unspecified') to list what is available there.\n\nExamples:\n  qtdl                                   list OS types\n  qtdl linux desktop                     list versions for linux desktop\n  qtdl auto desktop latest               list toolchains for the newest version\n  qtdl linux desktop 5.15.2 gcc_64 --accept-license -m qtbase,qtsvg"
)]
pub struct Cli {
    /// OS type (e.g. linux, mac, windows), or 'auto' for this host
    #[arg(default_value = UNSPECIFIED)]
    pub os: String,

    /// Target platform (e.g. desktop, android, ios)
    #[arg(default_value = UNSPECIFIED)]
    pub target: String,

    /// Qt version (e.g. 5.15.2), or 'latest'
    #[arg(value_name = "VERSION", default_value = UNSPECIFIED)]
    pub qt_version: String,

    /// Toolchain (e.g. gcc_64, win64_msvc2019_64)
    #[arg(default_value = UNSPECIFIED)]
    pub toolchain: String,

    /// List every level below the last given one instead of stopping at the next
    #[arg(short = 'a', long)]
    pub expand_all: bool,

    /// Only install these modules (e.g. -m qtbase,qtsvg or -m qtbase -m qtsvg); default is all
    #[arg(short, long, value_delimiter = ',')]
    pub modules: Vec<String>,

    /// Directory to install into
    #[arg(short = 'O', long = "outputdir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Accept the open source license and mark the installed kit accordingly
    #[arg(long)]
    pub accept_license: bool,

    /// Also install the OpenSSL bundle matching the kit
    #[arg(long)]
    pub openssl: bool,

    /// Also install the MinGW compiler matching the kit (Windows only)
    #[arg(long)]
    pub mingw: bool,

    /// Output format for discovery results
    #[arg(long, value_enum, default_value = "plain")]
    pub format: OutputFormat,

    /// Repository root to use instead of the configured one
    #[arg(long)]
    pub base_url: Option<String>,

    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long)]
    pub quiet: bool,
}
