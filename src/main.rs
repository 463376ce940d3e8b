use anyhow::Result;
use log::{debug, error, info};
use outbreak_core::{Driver, Kind, Registry, SimulationConfig};
use rand::prelude::*;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Outbreak Engine (headless)...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = SimulationConfig::load(&config_path)?;
    let params = config.get_sim_params();
    debug!("Simulation Parameters: {:#?}", params);

    // --- Initialize Registry & Populations ---
    let registry = Arc::new(Registry::new(params.clone()));
    place_initial_agents(&registry, &config);
    info!(
        "Spawned {} prey and {} predators in a {}x{} arena.",
        registry.prey_count(),
        registry.predator_count(),
        params.arena_width,
        params.arena_height
    );

    // --- Driver Loop ---
    let mut driver = Driver::new(registry.clone());
    let run_time = Duration::from_secs_f32(config.timing.run_time_s);
    let poll_interval = Duration::from_millis(params.poll_ms);
    let record_interval = Duration::from_secs_f32(config.timing.record_interval_s.max(0.01));
    let include_positions = config.output.save_positions_in_snapshot;

    let start_time = Instant::now();
    let mut previous_record_time = start_time;
    let mut previous_print_time = start_time;

    driver.record_snapshot(include_positions);

    while start_time.elapsed() < run_time {
        driver.poll();

        let now = Instant::now();
        if now.duration_since(previous_record_time) >= record_interval {
            driver.record_snapshot(include_positions);
            previous_record_time = now;
        }

        // Print status periodically
        if now.duration_since(previous_print_time).as_secs_f64() >= 5.0 {
            info!(
                "t={:5.1}s | Prey: {:3} | Predators: {:3} | Conversions: {}",
                start_time.elapsed().as_secs_f64(),
                registry.prey_count(),
                registry.predator_count(),
                registry.conversions()
            );
            previous_print_time = now;
        }

        std::thread::sleep(poll_interval);
    }

    // Final drain so no claimed prey is left unpromoted.
    driver.poll();
    driver.record_snapshot(include_positions);

    info!(
        "Run finished after {:.1}s: {} prey, {} predators, {} conversions.",
        start_time.elapsed().as_secs_f64(),
        registry.prey_count(),
        registry.predator_count(),
        registry.conversions()
    );

    // --- Save Recorded Data ---
    if config.output.save_snapshots {
        let filename = format!("{}_snapshots.json", config.output.base_filename);
        match File::create(&filename) {
            Ok(mut file) => match serde_json::to_string(driver.snapshots()) {
                Ok(json_string) => {
                    if let Err(e) = file.write_all(json_string.as_bytes()) {
                        error!("Error writing snapshot JSON to file '{}': {}", filename, e);
                    } else {
                        info!("All snapshots saved to {}", filename);
                    }
                }
                Err(e) => error!("Error serializing snapshots to JSON: {}", e),
            },
            Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
        }
    } else {
        info!("Skipping saving snapshots as per config (save_snapshots is false).");
    }

    if config.output.save_positions {
        let filename = format!("{}_final_positions.csv", config.output.base_filename);
        match csv::Writer::from_path(&filename) {
            Ok(mut writer) => {
                writer.write_record(["kind", "x", "y"])?;
                for kind in [Kind::Prey, Kind::Predator] {
                    for agent in registry.snapshot_of_kind(kind) {
                        let pos = agent.position();
                        writer.write_record([
                            format!("{:?}", kind),
                            format!("{:.4}", pos.x),
                            format!("{:.4}", pos.y),
                        ])?;
                    }
                }
                writer.flush()?;
                info!("Final positions saved to {}", filename);
            }
            Err(e) => error!("Error saving CSV file '{}': {}", filename, e),
        }
    } else {
        info!("Skipping saving final positions as per config.");
    }

    // --- Teardown ---
    registry.shutdown();
    info!("Simulation Complete.");
    Ok(())
}

/// Scatters the initial populations uniformly inside the arena, keeping
/// an agent-sized margin off the walls. Seeded, so a run is repeatable.
fn place_initial_agents(registry: &Arc<Registry>, config: &SimulationConfig) {
    let params = registry.params();
    let mut rng = StdRng::seed_from_u64(config.initial_conditions.seed);
    let margin = params.size;
    let x_range = margin..(params.arena_width - margin);
    let y_range = margin..(params.arena_height - margin);

    for _ in 0..config.initial_conditions.num_prey {
        let x = rng.random_range(x_range.clone());
        let y = rng.random_range(y_range.clone());
        registry.spawn_prey(x, y);
    }
    for _ in 0..config.initial_conditions.num_predators {
        let x = rng.random_range(x_range.clone());
        let y = rng.random_range(y_range.clone());
        registry.spawn_predator(x, y);
    }
}
