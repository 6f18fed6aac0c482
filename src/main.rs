use clap::Parser;
use screen_discovery::cli::commands::{ExploreArgs, cmd_dump, cmd_explore, cmd_reconcile};
use screen_discovery::cli::config::{Cli, Commands, LimitOverrides, default_log_filter, load_config};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Explore {
            device,
            bundle_id,
            app,
            states,
            max_depth,
            max_screens,
            max_actions,
            output_dir,
            report,
            trace,
            agent,
        } => {
            let args = ExploreArgs {
                device,
                bundle_id,
                app,
                states,
                limits: LimitOverrides {
                    max_depth,
                    max_screens,
                    max_actions,
                },
                output_dir,
                report,
                trace,
                agent,
            };
            let all_passed = cmd_explore(args, &config)?;
            if !all_passed {
                std::process::exit(1);
            }
        }
        Commands::Dump {
            device,
            bundle_id,
            app,
            states,
            output,
            agent,
        } => {
            cmd_dump(
                &device,
                &bundle_id,
                app.as_deref(),
                states.as_deref(),
                output.as_deref(),
                agent,
                &config,
            )?;
        }
        Commands::Reconcile {
            expected,
            observations,
            output,
        } => {
            let all_reachable = cmd_reconcile(&expected, &observations, output.as_deref())?;
            if !all_reachable {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
