mod cli;
mod config;
mod error;
mod photo;
mod store;
mod ui;
mod workflow;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use config::TankflowConfig;
use photo::{PhotoHandle, PhotoTray};
use store::{JobStore, JsonFileStore, MemoryStore};
use ui::SessionProgress;
use workflow::{
    Compartment, DeliveryForm, DepotForm, DestinationBranch, DriverJob, DriverWorkflow,
    FuelingForm, Phase, PickupForm, StartTripForm,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = TankflowConfig::load()?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }

    match cli.command {
        Command::Status => status(&config),
        Command::Show { job_id } => show(&config, &job_id),
        Command::Demo => demo(&config, cli.verbose).await,
    }
}

/// List pending internal jobs, newest first.
fn status(config: &TankflowConfig) -> Result<()> {
    let store = JsonFileStore::open(&config.store_path);
    let jobs = store.pending_internal_jobs()?;
    if jobs.is_empty() {
        println!("No pending internal transport jobs.");
        return Ok(());
    }
    for job in jobs {
        println!(
            "{}  {}  {}  {} stop(s)",
            job.id,
            job.transport_number,
            job.status,
            job.destination_branches.len()
        );
    }
    Ok(())
}

/// Dump one job and the phase a session would resume at.
fn show(config: &TankflowConfig, job_id: &str) -> Result<()> {
    let store = JsonFileStore::open(&config.store_path);
    let mut wf = DriverWorkflow::new(store);
    wf.select(job_id)?;
    if let Some(session) = wf.session() {
        println!("resume phase: {}", session.phase);
    }
    println!("{}", serde_json::to_string_pretty(wf.job()?)?);
    Ok(())
}

/// Drive an embedded sample job through every phase against an
/// in-memory store.
async fn demo(config: &TankflowConfig, verbose: bool) -> Result<()> {
    let mut store = MemoryStore::new();
    store.insert_job(demo_job());

    let mut wf = DriverWorkflow::with_rules(store, config.rules());
    let job = wf.select_latest()?;
    let transport_number = job.transport_number.clone();
    let total_stops = job.destination_branches.len();

    let progress = SessionProgress::start(&transport_number);
    let photos = demo_photos().await?;

    wf.commit_start_trip(StartTripForm {
        odometer_km: Some("120000".into()),
        photos: vec![],
        notes: Some("leaving depot".into()),
    })?;

    progress.phase(Phase::PickupConfirm);
    wf.commit_pickup(PickupForm {
        photos: photos.clone(),
        ..Default::default()
    })?;

    progress.phase(Phase::RoutePlanning);
    let mut route = wf.job()?.effective_route();
    route.reverse();
    wf.commit_route(route.clone())?;

    progress.phase(Phase::Delivery);
    let mut odometer = 120_000u32;
    for (index, _) in route.iter().enumerate() {
        wf.commit_arrival()?;

        if verbose && index == 0 {
            // A commit without proof photos is rejected and nothing moves.
            let rejected = wf.commit_delivery(DeliveryForm {
                odometer_km: Some(odometer.to_string()),
                ..Default::default()
            });
            if let Err(err) = rejected {
                progress.validation_failed(&err);
            }
        }

        let branch_name = wf.current_stop()?.branch_name.clone();
        odometer += 40;
        wf.commit_delivery(DeliveryForm {
            odometer_km: Some(odometer.to_string()),
            photos: photos.clone(),
            notes: None,
        })?;
        progress.stop_delivered(&branch_name, index + 1, total_stops);
    }

    progress.phase(Phase::Fueling);
    wf.add_fueling_record(FuelingForm {
        station: Some("Posto Norte".into()),
        quantity_litres: Some("85.5".into()),
        cost: Some("140.25".into()),
        photo: photos.first().cloned(),
    })?;
    wf.proceed_to_depot()?;

    progress.phase(Phase::ArriveDepot);
    odometer += 25;
    wf.commit_depot_return(DepotForm {
        odometer_km: Some(odometer.to_string()),
        fuel_remaining_litres: Some("60".into()),
        ..Default::default()
    })?;

    progress.complete(&wf.summary()?);
    wf.release()?;
    Ok(())
}

/// Sample internal transport job used by the demo.
fn demo_job() -> DriverJob {
    DriverJob::new(
        "TRX-1207",
        "BR-CENTRAL",
        "Central Depot",
        vec![
            Compartment {
                compartment_number: 1,
                oil_type: "diesel".into(),
                quantity_litres: 8000.0,
            },
            Compartment {
                compartment_number: 2,
                oil_type: "premium".into(),
                quantity_litres: 4000.0,
            },
        ],
        vec![
            DestinationBranch::new("BR-HB", "Harborside", "12 Harbour Rd"),
            DestinationBranch::new("BR-HT", "Hilltop", "3 Hill St"),
            DestinationBranch::new("BR-EG", "Eastgate", "77 Main Ave"),
        ],
    )
}

/// Capture two throwaway photo files through the async tray.
async fn demo_photos() -> Result<Vec<PhotoHandle>> {
    let dir = std::env::temp_dir();
    let mut tray = PhotoTray::new();
    let mut paths = Vec::new();
    for name in ["pump.jpg", "seal.jpg"] {
        let path = dir.join(format!("tankflow-demo-{}-{name}", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"demo photo bytes")?;
        tray.capture(&path);
        paths.push(path);
    }
    let photos = tray.collect().await?;
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
    Ok(photos)
}
