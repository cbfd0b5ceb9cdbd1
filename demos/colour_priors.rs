//! Colour-priors session runner with a simulated observer.
//!
//! Runs each requested experiment for one subject, printing trials to the
//! terminal and answering them with a noisy synthetic observer. Sessions are
//! saved after every trial, so interrupting the run (Ctrl-C) and starting it
//! again with the same subject picks up on the same trial.
//!
//! ```text
//! cargo run --example colour_priors -- -s s01 -p pilot
//! RUST_LOG=expctl=debug cargo run --example colour_priors -- -e "colour-priors colour-priors"
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use expctl::config::{Config, RunOptions};
use expctl::control::Design;
use expctl::controller::{Advance, ChainRule, ParameterRange, SessionController};
use expctl::experiment::{
    ContentProvider, ExperimentDefinition, FsContentProvider, Instructions, Presenter,
};
use expctl::session::FileSessionStore;
use expctl::trial::{AcceptanceWindow, ResponseScoring, TrialDescriptor};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Run colour-priors sessions with a simulated observer")]
struct Args {
    /// Subject ID (the configured test subject is never saved)
    #[arg(short = 's', long)]
    subject: Option<String>,
    /// Experiment names, or a batch file with one name per line
    #[arg(short = 'e', long, default_value = "colour-priors")]
    experiments: String,
    /// Project the data belongs to
    #[arg(short = 'p', long)]
    project: Option<String>,
    /// Testing language
    #[arg(short = 'l', long)]
    lang: Option<String>,
    /// Experimenter/user running the session
    #[arg(short = 'u', long)]
    user: Option<String>,
    /// Configuration file
    #[arg(short = 'c', long, default_value = "expctl.toml")]
    config: PathBuf,
    /// Repetitions per condition for new sessions
    #[arg(long, default_value_t = 2)]
    reps: usize,
    /// Seed for the simulated observer
    #[arg(long)]
    seed: Option<u64>,
}

/// Sample a hue, then reproduce it on a dial. Telephone trials show the
/// previous response for the same stimulus and chain.
struct ColourPriors {
    reps: usize,
}

impl ExperimentDefinition for ColourPriors {
    fn name(&self) -> &str {
        "colour-priors"
    }

    fn design(&self) -> Design {
        Design::builder(self.reps)
            .factor("mode", ["random", "telephone"])
            .factor("stim", ["banana.png", "tree.png", "strawberry.png"])
            .factor("dur", [0.1, 0.2, 0.3])
            .factor("chain", [0])
            .build()
    }

    fn scoring(&self) -> ResponseScoring {
        ResponseScoring::circular("hue", AcceptanceWindow::default())
    }

    fn chain_rule(&self) -> Option<ChainRule> {
        Some(ChainRule::new("hue", ParameterRange::degrees()))
    }

    fn on_trial(&mut self, trial: &mut TrialDescriptor, rng: &mut dyn RngCore) {
        // Dial starts at a random position so it never hints at the target.
        if trial.annotation("dial_start").is_none() {
            trial.annotate("dial_start", rng.gen_range(0..360));
        }
    }
}

/// What the terminal is currently showing.
enum Screen {
    Blank,
    Message,
    Trial(TrialDescriptor),
}

struct ConsolePresenter {
    screen: Screen,
}

impl Presenter for ConsolePresenter {
    fn show_trial(&mut self, trial: &TrialDescriptor) {
        println!(
            "  trial: mode={} stim={} hue={}",
            trial.get("mode").map_or_else(String::new, ToString::to_string),
            trial.get("stim").map_or_else(String::new, ToString::to_string),
            trial.get("hue").map_or_else(String::new, ToString::to_string),
        );
        self.screen = Screen::Trial(trial.clone());
    }

    fn show_message(&mut self, content: &str) {
        println!("{content}");
        self.screen = Screen::Message;
    }
}

/// Noisy observer: reproduces the hue with a few degrees of error and
/// occasionally answers too fast or too slow.
fn observe(trial: &TrialDescriptor, rng: &mut StdRng) -> (f64, f64) {
    let target = trial.get_f64("hue").unwrap_or(0.0);
    let noise: f64 = (0..3).map(|_| rng.gen_range(-15.0_f64..15.0)).sum();
    let response = (target + noise).rem_euclid(360.0).round();
    let reaction_ms = rng.gen_range(150.0..2500.0);
    (response, reaction_ms)
}

fn fallback_instructions() -> Instructions {
    Instructions::from([
        (
            "intro".to_string(),
            "Remember the colour of the picture, then turn the dial to match it.".to_string(),
        ),
        (
            "done".to_string(),
            "Colour priors complete. Thank you!".to_string(),
        ),
    ])
}

fn run_experiment(
    name: &str,
    args: &Args,
    config: &Config,
    options: &RunOptions,
    observer: &mut StdRng,
) -> Result<()> {
    let experiment = match name {
        "colour-priors" => ColourPriors { reps: args.reps },
        other => bail!("unknown experiment '{other}'"),
    };

    let store = FileSessionStore::new(config).with_project(options.project_id.as_deref());
    let mut session = SessionController::open(store, experiment, options)
        .with_context(|| format!("opening session for '{}' in '{name}'", options.subject_id))?;

    if session.record().is_done() {
        info!(experiment = name, "session already complete, skipping");
        return Ok(());
    }

    let fs_content = FsContentProvider::new(config);
    let fallback = fallback_instructions();
    let content: &dyn ContentProvider = if config.instructions_dir.join(name).is_dir() {
        &fs_content
    } else {
        warn!(experiment = name, "no instruction files, using built-in text");
        &fallback
    };

    let mut presenter = ConsolePresenter {
        screen: Screen::Blank,
    };
    session.begin(content, &mut presenter)?;

    loop {
        let step = match std::mem::replace(&mut presenter.screen, Screen::Blank) {
            Screen::Trial(trial) => {
                let (response, reaction_ms) = observe(&trial, observer);
                session.on_response(response, reaction_ms, &mut presenter)?
            }
            Screen::Message | Screen::Blank => session.on_continue(&mut presenter)?,
        };
        if step == Advance::Done {
            break;
        }
    }

    let record = session.record();
    info!(
        experiment = name,
        completed = record.completed().len(),
        accepted = record.accepted_count(),
        "session finished"
    );
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("expctl=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let experiments = RunOptions::parse_experiment_list(&args.experiments)?;
    let mut options = RunOptions::new(&config, experiments);
    if let Some(subject) = &args.subject {
        options.subject_id.clone_from(subject);
    }
    options.project_id.clone_from(&args.project);
    if let Some(lang) = &args.lang {
        options.language.clone_from(lang);
    }
    if let Some(user) = &args.user {
        options.user_id.clone_from(user);
    }

    if options.is_dry_run(&config) {
        warn!(subject = %options.subject_id, "test subject: nothing will be saved");
    }

    let mut observer = args
        .seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

    for name in &options.experiments {
        run_experiment(name, &args, &config, &options, &mut observer)?;
    }
    Ok(())
}
