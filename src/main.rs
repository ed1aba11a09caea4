//! Dice Tray command line
//!
//! Runs a roll headlessly and prints the result. The browser build uses the
//! library's `platform::web` bindings instead.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::path::PathBuf;
    use std::process;

    use clap::{Parser, Subcommand};

    use dice_tray::platform::entropy_seed;
    use dice_tray::{RollRequest, RollResult, RollSession, RollSettings};

    #[derive(Parser)]
    #[command(
        name = "dice-tray",
        about = "Physically simulated dice rolls",
        version,
        propagate_version = true
    )]
    struct Cli {
        #[command(subcommand)]
        command: Commands,
    }

    #[derive(Subcommand)]
    enum Commands {
        /// Roll a batch of dice and report how many hit the target
        Roll {
            /// Number of dice
            #[arg(short, long)]
            count: usize,

            /// Minimum face value that counts as a hit (1-6)
            #[arg(short, long)]
            target: u8,

            /// Seed for a reproducible roll (random when omitted)
            #[arg(short, long)]
            seed: Option<u64>,

            /// Roll type shown with the result, e.g. "Hit roll"
            #[arg(short, long)]
            label: Option<String>,

            /// Settings JSON file (defaults when omitted)
            #[arg(long)]
            settings: Option<PathBuf>,

            /// Print the outcome as JSON
            #[arg(long)]
            json: bool,
        },

        /// Print the default settings as JSON
        Settings,
    }

    pub fn run() {
        env_logger::init();
        let cli = Cli::parse();

        let result = match cli.command {
            Commands::Roll {
                count,
                target,
                seed,
                label,
                settings,
                json,
            } => roll(count, target, seed, label, settings, json),
            Commands::Settings => RollSettings::default()
                .to_json_pretty()
                .map(|json| println!("{json}")),
        };

        if let Err(e) = result {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }

    fn roll(
        count: usize,
        target: u8,
        seed: Option<u64>,
        label: Option<String>,
        settings: Option<PathBuf>,
        json: bool,
    ) -> RollResult<()> {
        let settings = match settings {
            Some(path) => RollSettings::load_file(path)?,
            None => RollSettings::default(),
        };
        let seed = seed.unwrap_or_else(entropy_seed);

        let mut request = RollRequest::new(count, target);
        request.label = label;

        let mut session = RollSession::new(settings, seed)?;
        session.start_seeded(request, seed)?;
        let outcome = session.run_to_completion()?;

        if json {
            println!("{}", serde_json::to_string_pretty(outcome)?);
        } else {
            let faces: Vec<String> = outcome.face_values.iter().map(u8::to_string).collect();
            println!("{}", outcome.summary());
            println!("  faces: {}", faces.join(" "));
            println!("  seed:  {} ({} ms simulated)", outcome.seed, outcome.elapsed_ms);
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    cli::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry points live in dice_tray::platform::web
}
