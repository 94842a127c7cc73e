use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use medchain::settings::Settings;
use medchain::{Address, Authority, Doctor, HealthLedger, Miner, Patient, SealedRound};
use medchain_crypto::AuthorityKeyPair;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "medchain")]
#[command(about = "Medchain medical event ledger", long_about = None)]
struct Cli {
    /// Settings file (YAML, TOML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Number of miners racing each round
    #[arg(long, global = true)]
    miners: Option<usize>,

    /// Leading hex zeros required of a proof
    #[arg(long, global = true)]
    difficulty: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reference scenario and log wallets and histories
    Simulate,

    /// Run the scenario, then print the ledger as JSON with its verification report
    Verify,
}

const MULLER: &str = "Doctor Muller";
const JOHANNES: &str = "Doctor Johannes";
const BLACK: &str = "Mr. Black";
const GREEN: &str = "Mr. Green";
const WHITE: &str = "Mr. White";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(miners) = cli.miners {
        settings.miners = miners;
    }
    if let Some(difficulty) = cli.difficulty {
        settings.consensus.difficulty = difficulty;
    }
    if settings.miners == 0 {
        bail!("at least one miner is required");
    }

    let (ledger, miners) = simulate(&settings)?;

    match cli.command {
        Commands::Simulate => {
            let report = ledger.verify();
            info!(valid = report.is_valid(), blocks = report.blocks_checked, "ledger verified");
        }
        Commands::Verify => {
            let chain = ledger.get_chain().to_json().context("serializing ledger")?;
            println!("{chain}");
            let report = serde_json::to_string_pretty(&ledger.verify()).context("serializing report")?;
            println!("{report}");
        }
    }

    for miner in &miners {
        info!(miner = miner.id(), wallet = miner.wallet(), "final wallet");
    }
    Ok(())
}

fn simulate(settings: &Settings) -> Result<(HealthLedger, Vec<Miner>)> {
    let mut ledger = HealthLedger::new(settings.consensus.clone(), Authority::new())
        .context("building consensus engine")?;

    ledger.register_prescription("medicine1", ["illness1", "illness2"])?;
    ledger.register_prescription("medicine2", ["illness1"])?;
    ledger.register_prescription("medicine3", ["illness2", "illness3"])?;
    for illness in ["illness1", "illness2", "illness3"] {
        ledger.register_disease(illness)?;
    }

    let muller = ledger.register_doctor(Doctor::new(MULLER))?;
    let johannes = ledger.register_doctor(Doctor::new(JOHANNES))?;
    let black = ledger.register_patient(Patient::new(BLACK))?;
    let green = ledger.register_patient(Patient::new(GREEN))?;
    let white = ledger.register_patient(Patient::new(WHITE))?;

    let mut miners = ledger.spawn_miners(settings.miners);

    info!("diagnosis without authorization");
    ledger.submit_diagnosis(&johannes, &black, "illness2", 0.20)?;
    ledger.submit_diagnosis(&johannes, &white, "illness3", 0.20)?;
    ledger.submit_diagnosis(&johannes, &white, "illness1", 0.20)?;
    round(&mut ledger, &mut miners)?;

    info!("authorization");
    ledger.submit_authorization(&muller, 0.50)?;
    round(&mut ledger, &mut miners)?;

    info!("diagnosis with authorization");
    ledger.submit_diagnosis(&muller, &white, "illness1", 0.20)?;
    round(&mut ledger, &mut miners)?;
    log_history(&mut ledger, &white)?;

    info!("prescriptions");
    ledger.submit_prescription(&muller, &white, "medicine3", 0.20)?;
    round(&mut ledger, &mut miners)?;
    ledger.submit_prescription(&muller, &white, "medicine1", 0.20)?;
    round(&mut ledger, &mut miners)?;

    info!("forged authorization");
    let impostor = AuthorityKeyPair::generate();
    let forged = impostor.sign(johannes.as_bytes());
    ledger.submit_authorization_token(&johannes, forged, 0.50)?;
    ledger.submit_diagnosis(&johannes, &black, "illness2", 0.20)?;
    round(&mut ledger, &mut miners)?;

    info!("one-time read");
    let key = ledger
        .patient(&green)
        .map(|p| p.temporary_key().clone())
        .context("patient missing from registry")?;
    let first = ledger.read_history(&green, Some(&key));
    let second = ledger.read_history(&green, Some(&key));
    info!(first = first.is_ok(), second = ?second.err(), "temporary key reuse");

    for patient in [&black, &green, &white] {
        log_history(&mut ledger, patient)?;
    }

    Ok((ledger, miners))
}

fn round(ledger: &mut HealthLedger, miners: &mut [Miner]) -> Result<SealedRound> {
    let sealed = ledger.mine(miners).context("mining round")?;
    for receipt in sealed.rejected() {
        if let Some(reason) = receipt.rejection() {
            warn!(block = sealed.block.index(), "{}: {}", receipt.transaction, reason);
        }
    }
    let wallets: Vec<f64> = miners.iter().map(Miner::wallet).collect();
    info!(
        block = sealed.block.index(),
        winner = %sealed.winner_id,
        reward = sealed.reward,
        ?wallets,
        "round complete"
    );
    Ok(sealed)
}

/// Reads through the gate with the permanent key, as the patient would.
fn log_history(ledger: &mut HealthLedger, patient: &Address) -> Result<()> {
    let key = ledger
        .patient(patient)
        .map(|p| p.permanent_key().clone())
        .context("patient missing from registry")?;
    let history = ledger.read_history(patient, Some(&key))?;
    info!(
        patient = %history.name,
        illnesses = ?history.illnesses,
        prescriptions = ?history.prescriptions,
        "history"
    );
    Ok(())
}
