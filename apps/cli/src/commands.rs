//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use tracing::{info, warn};

use agent_context_core::{
    ContextIndex, UpdateConfig, install_all_context, install_package_context, update_document,
};
use agent_context_discovery::{ContextDiscovery, DirectorySource};
use agent_context_shared::{AppConfig, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// agent-context: package-provided context for AI agents.
#[derive(Parser)]
#[command(
    name = "agent-context",
    version,
    about = "Install agent context shipped by packages and merge it into AGENT.md.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Installation root for package context (defaults to `.context`).
    #[arg(long, global = true, env = "AGENT_CONTEXT_PATH")]
    pub context_path: Option<PathBuf>,

    /// Extra package root to scan (can be specified multiple times).
    #[arg(long = "package-root", global = true)]
    pub package_roots: Vec<PathBuf>,

    /// Config file to use instead of the default lookup.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// List packages that ship context, or the files of one package.
    List {
        /// Package whose context files to list.
        package: Option<String>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print one context file of a package.
    Show {
        /// Package name.
        package: String,

        /// File name, with or without its `.md`/`.mdc` extension.
        file: String,
    },

    /// Install context from all packages, or only the named ones.
    Install {
        /// Packages to install (defaults to all with context).
        packages: Vec<String>,
    },

    /// Write the standalone context index.
    Index {
        /// Output path (defaults to `<context-path>/agent.md`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge installed context into the target document.
    Update {
        /// Target document (defaults to `AGENT.md`).
        #[arg(short, long)]
        target: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "agent_context=info",
        1 => "agent_context=debug",
        _ => "agent_context=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Config file values with CLI overrides applied.
struct Settings {
    config: AppConfig,
    context_path: PathBuf,
    package_roots: Vec<PathBuf>,
}

impl Settings {
    fn resolve(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };

        let context_path = cli
            .context_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.defaults.context_path));

        let package_roots = config
            .discovery
            .package_roots
            .iter()
            .map(PathBuf::from)
            .chain(cli.package_roots.iter().cloned())
            .collect();

        Ok(Self {
            config,
            context_path,
            package_roots,
        })
    }

    fn discovery(&self) -> ContextDiscovery<DirectorySource> {
        let mut source = DirectorySource::new(self.package_roots.clone());
        if self.config.discovery.include_cargo_registry {
            source = source.with_cargo_registry();
        }
        ContextDiscovery::new(source).with_context_dir_name(&self.config.defaults.context_dir_name)
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let settings = || Settings::resolve(&cli);

    match &cli.command {
        Command::List { package, json } => cmd_list(&settings()?, package.as_deref(), *json),
        Command::Show { package, file } => cmd_show(&settings()?, package, file),
        Command::Install { packages } => cmd_install(&settings()?, packages),
        Command::Index { output } => cmd_index(&settings()?, output.as_deref()),
        Command::Update { target } => cmd_update(&settings()?, target.clone()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&settings()?),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_list(settings: &Settings, package: Option<&str>, json: bool) -> Result<()> {
    let discovery = settings.discovery();

    let Some(name) = package else {
        let packages = discovery.find_packages_with_context()?;
        info!(count = packages.len(), "listing packages with context");

        if json {
            println!("{}", serde_json::to_string_pretty(&packages)?);
        } else if packages.is_empty() {
            println!("No packages with context found.");
        } else {
            println!("Packages with context:");
            for info in &packages {
                println!("  {} ({})", info.name, info.version);
            }
        }
        return Ok(());
    };

    let files = discovery
        .list_context_files(name)?
        .ok_or_else(|| eyre!("package '{name}' not found or has no context"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
    } else {
        println!("Context files for {name}:");
        for file in &files {
            println!("  {}", file.display());
        }
    }
    Ok(())
}

fn cmd_show(settings: &Settings, package: &str, file: &str) -> Result<()> {
    let content = settings
        .discovery()
        .show_context_file(package, file)?
        .ok_or_else(|| eyre!("context file '{file}' not found in package '{package}'"))?;
    print!("{content}");
    Ok(())
}

fn cmd_install(settings: &Settings, packages: &[String]) -> Result<()> {
    let discovery = settings.discovery();
    let root = &settings.context_path;

    let installed = if packages.is_empty() {
        install_all_context(&discovery, root)?
    } else {
        let mut installed = Vec::new();
        for name in packages {
            if install_package_context(&discovery, name, root)? {
                installed.push(name.clone());
            } else {
                warn!(package = %name, "package not found or has no context");
            }
        }
        installed
    };

    if installed.is_empty() {
        println!("No package context installed.");
    } else {
        println!("Installed context into {}:", root.display());
        for name in &installed {
            println!("  {name}");
        }
    }
    Ok(())
}

fn cmd_index(settings: &Settings, output: Option<&Path>) -> Result<()> {
    let index = ContextIndex::new(
        &settings.context_path,
        settings.config.defaults.extensions.clone(),
    );
    let path = index.write_to_file(output)?;
    println!("Generated context index: {}", path.display());
    Ok(())
}

fn cmd_update(settings: &Settings, target: Option<PathBuf>) -> Result<()> {
    let config = UpdateConfig {
        target: target.unwrap_or_else(|| PathBuf::from(&settings.config.defaults.target)),
        context_path: settings.context_path.clone(),
        spec: settings.config.section_spec(),
        extensions: settings.config.defaults.extensions.clone(),
    };

    info!(target = %config.target.display(), "updating document");
    let result = update_document(&config)?;

    let status = match (result.created, result.changed) {
        (true, _) => "created",
        (false, true) => "updated",
        (false, false) => "unchanged",
    };
    println!(
        "{} {} ({} packages, {} files)",
        result.target.display(),
        status,
        result.packages,
        result.fragments
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(settings: &Settings) -> Result<()> {
    let toml_str = toml::to_string_pretty(&settings.config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "agent-context",
            "install",
            "serde",
            "tokio",
            "--package-root",
            "/a",
            "--package-root",
            "/b",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.package_roots, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        match cli.command {
            Command::Install { packages } => assert_eq!(packages, vec!["serde", "tokio"]),
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn settings_apply_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("agent-context.toml");
        std::fs::write(
            &config_path,
            "[defaults]\ncontext_path = \"ctx\"\n\n[discovery]\npackage_roots = [\"/from/config\"]\ninclude_cargo_registry = false\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "agent-context",
            "--config",
            config_path.to_str().unwrap(),
            "--package-root",
            "/from/cli",
            "update",
        ])
        .unwrap();
        let settings = Settings::resolve(&cli).unwrap();

        assert_eq!(settings.context_path, PathBuf::from("ctx"));
        assert_eq!(
            settings.package_roots,
            vec![PathBuf::from("/from/config"), PathBuf::from("/from/cli")]
        );
        assert_eq!(settings.discovery().source().roots().len(), 2);
    }
}
