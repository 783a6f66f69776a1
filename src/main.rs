use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use changescope::cli::{Cli, Commands};
use changescope::commands;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    match dispatch(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Extract {
            repo,
            old_ref,
            new_ref,
            output_dir,
            format,
        } => commands::extract::run(&commands::ExtractConfig {
            repo,
            old_ref,
            new_ref,
            output_dir,
            format,
        }),
        Commands::Metrics {
            repo,
            old_ref,
            new_ref,
            path,
            rev_label,
            output_dir,
            format,
        } => commands::metrics::run(&commands::MetricsConfig {
            repo,
            old_ref,
            new_ref,
            path,
            rev_label,
            output_dir,
            format,
        }),
        Commands::Breaking {
            repo,
            old_ref,
            new_ref,
            output_dir,
            max_diff_lines,
            format,
        } => commands::breaking::run(&commands::BreakingConfig {
            repo,
            old_ref,
            new_ref,
            output_dir,
            max_diff_lines,
            format,
        }),
        Commands::Modules {
            input,
            output_dir,
            depth,
            strip_prefixes,
            min_files,
            max_samples,
            format,
        } => commands::modules::run(&commands::ModulesConfig {
            input,
            output_dir,
            depth,
            strip_prefixes,
            min_files,
            max_samples,
            format,
        }),
        Commands::Risks {
            corpus,
            prefix,
            exclude_dirs,
            output_dir,
            format,
        } => commands::risks::run(&commands::RisksConfig {
            corpus,
            prefix,
            exclude_dirs,
            output_dir,
            format,
        }),
        Commands::Refs {
            corpus,
            prefixes,
            exclude_dirs,
            strict,
            output_dir,
            format,
        } => commands::refs::run(&commands::RefsConfig {
            corpus,
            prefixes,
            exclude_dirs,
            strict,
            output_dir,
            format,
        }),
        Commands::Summary {
            repo,
            old_ref,
            new_ref,
            enrich,
            output_dir,
            format,
        } => commands::summary::run(&commands::SummaryConfig {
            repo,
            old_ref,
            new_ref,
            enrich,
            output_dir,
            format,
        }),
        Commands::Align {
            repo,
            old_ref,
            new_ref,
            summary,
            refs_report,
            docs,
            output_dir,
            fail_on_mismatch,
            format,
        } => commands::align::run(&commands::AlignConfig {
            repo,
            old_ref,
            new_ref,
            summary,
            refs_report,
            docs,
            output_dir,
            fail_on_mismatch,
            format,
        }),
    }
}
