mod cli;
mod config;
mod download;
mod error;
mod install;
mod locate;
mod platform;
mod remote;
mod resolver;
mod types;
mod validate;
mod version;


use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::Cli;
use config::{load_settings, with_trailing_slash, QtdlSettings};
use error::{find_qtdl_error, QtdlError};
use install::{InstallOptions, Installer, Interrupt};
use locate::{LocatedPackage, PackageLocator, COMPILER_TOOL, CRYPTO_TOOL};
use platform::get_system_info;
use remote::{user_agent, HttpRemote};
use resolver::HierarchyResolver;
use types::{Kit, Selection};
use validate::{render_catalog, validate};
use version::VersionIdentifier;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli)?;

    let host = get_system_info();
    tracing::debug!("Host platform: {} {}", host.os, host.arch);

    let settings = load_settings()?;

    if let Err(err) = run(&cli, &settings).await {
        std::process::exit(report_failure(&err, settings.strict_exit));
    }

    Ok(())
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

async fn run(cli: &Cli, settings: &QtdlSettings) -> Result<()> {
    let selection = Selection::from_args(&cli.os, &cli.target, &cli.qt_version, &cli.toolchain)?;
    let base_url = cli
        .base_url
        .as_deref()
        .map(with_trailing_slash)
        .unwrap_or_else(|| settings.base_url.clone());

    let client = reqwest::Client::builder()
        .user_agent(user_agent())
        .build()
        .context("Failed to build HTTP client")?;
    let remote = HttpRemote::new(client.clone());

    let resolver = HierarchyResolver::new(&remote, &base_url, &settings.version_index_url);
    let resolution = resolver.resolve(&selection, cli.expand_all).await?;

    let Some(kit) = validate(&resolution.catalog, &resolution.selection)? else {
        print!("{}", render_catalog(&resolution.catalog, cli.format)?);
        return Ok(());
    };

    let locator = PackageLocator::new(&remote, &base_url);
    install_kit(cli, settings, client, &locator, &kit).await
}

async fn install_kit(
    cli: &Cli,
    settings: &QtdlSettings,
    client: reqwest::Client,
    locator: &PackageLocator<'_, HttpRemote>,
    kit: &Kit,
) -> Result<()> {
    // Shared by every phase below.
    let interrupt = Interrupt::on_ctrl_c();

    // Located before anything is downloaded so a bad kit fails fast.
    let package = interrupt.guard(locator.locate_kit(kit)).await?;

    let options = InstallOptions {
        output_dir: cli.output_dir.clone(),
        staging_dir: std::env::current_dir().context("Could not determine working directory")?,
        modules: cli.modules.clone(),
        archive_tool: settings.archive_tool.clone(),
    };
    let companions = Installer::new(
        client.clone(),
        InstallOptions {
            modules: Vec::new(),
            ..options.clone()
        },
    );
    let installer = Installer::new(client, options);

    eprintln!("Installing {} into {}...", kit, cli.output_dir.display());
    let report = installer.install(&package, &interrupt).await?;
    installer.post_install(kit, cli.accept_license)?;
    interrupt.check()?;
    println!(
        "Installed {} ({} archive(s), {} skipped)",
        kit,
        report.installed.len(),
        report.skipped.len()
    );

    if cli.openssl {
        let located = interrupt.guard(locator.locate_crypto_tool(kit)).await;
        install_companion(&companions, CRYPTO_TOOL, located, &interrupt).await?;
    }
    if cli.mingw {
        let located = interrupt.guard(locator.locate_compiler_tool(kit)).await;
        install_companion(&companions, COMPILER_TOOL, located, &interrupt).await?;
    }

    Ok(())
}

/// Companions are optional: a package or listing that is missing upstream
/// is only a warning.
async fn install_companion(
    installer: &Installer,
    tool: &str,
    located: Result<LocatedPackage>,
    interrupt: &Interrupt,
) -> Result<()> {
    match located {
        Ok(package) => {
            let report = installer.install(&package, interrupt).await?;
            println!(
                "Installed {} {} ({} archive(s))",
                tool,
                package.record.version,
                report.installed.len()
            );
            Ok(())
        }
        Err(err) if is_missing_upstream(&err) => {
            tracing::warn!("Skipping {}: {}", tool, err);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn is_missing_upstream(err: &anyhow::Error) -> bool {
    matches!(
        find_qtdl_error(err),
        Some(QtdlError::PackageNotFound { .. }) | Some(QtdlError::NotFound { .. })
    )
}

/// Print a failure and pick the exit code for it.
fn report_failure(err: &anyhow::Error, strict_exit: bool) -> i32 {
    eprintln!("Error: {:#}", err);

    match find_qtdl_error(err) {
        Some(QtdlError::MalformedVersion(raw)) => {
            if let Ok(dotted) = VersionIdentifier::decode(raw) {
                eprintln!("Hint: did you mean '{}'?", dotted);
            }
            eprintln!();
            let _ = Cli::command().print_help();
            1
        }
        Some(QtdlError::NotFound { .. }) | Some(QtdlError::RequestFailed { .. }) | None => {
            if strict_exit {
                1
            } else {
                tracing::warn!("strict_exit is disabled; exiting with status 0");
                0
            }
        }
        Some(typed) => typed.exit_code(),
    }
}
