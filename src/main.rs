use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dotshim::prelude::*;

/// dotshim - proxy-module and binding-redirect generation for managed executables
#[derive(Debug, Parser)]
#[command(name = "dotshim", version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a proxy module and redirect manifest for an executable target.
    Generate {
        /// Path to the executable target.
        #[arg(value_name = "TARGET")]
        target: PathBuf,

        /// Additional directories to probe for installed shared modules.
        #[arg(long, value_name = "DIR")]
        search_path: Vec<PathBuf>,

        /// Refuse to proxy strongly-signed dependencies instead of emitting
        /// a full binding redirect for them.
        #[arg(long)]
        reject_signed: bool,
    },

    /// Inject the load-time hook into a single module, without resolution
    /// or a manifest.
    Hook {
        /// Path to the module file.
        #[arg(value_name = "MODULE")]
        module: PathBuf,

        /// Also hollow out every method body before injecting the hook.
        #[arg(long)]
        strip: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Show dotshim info+ on stderr; --verbose enables debug; RUST_LOG overrides
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("dotshim", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let store = ImageStore::new();
    let diagnostics = Diagnostics::new(cli.verbose);

    match cli.command {
        Command::Generate {
            target,
            search_path,
            reject_signed,
        } => {
            let resolver = DirectoryResolver::new(search_path);
            let policy = ResolutionPolicy { reject_signed };
            let generator = ProxyGenerator::new(&store, &resolver, policy, diagnostics);

            let outcome = generator.generate(&target)?;
            println!(
                "Proxied '{}':\n  proxy:    {}\n  manifest: {}",
                outcome.declared.display_name(),
                outcome.proxy_path.display(),
                outcome.manifest_path.display()
            );
        }
        Command::Hook { module, strip } => {
            let resolver = DirectoryResolver::new(vec![]);
            let generator = ProxyGenerator::new(
                &store,
                &resolver,
                ResolutionPolicy::default(),
                diagnostics,
            );

            let out_path = generator.install_hook(&module, strip)?;
            println!("Hooked module written to {}", out_path.display());
        }
    }

    Ok(())
}
