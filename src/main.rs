//! Flux Runner diagnostics
//!
//! Sweeps a seed range through validation and repair for every difficulty,
//! then plays one headless run with a simple autopilot.
//!
//! Usage: `flux-runner [seed_start] [count] [tuning.json]`

#[cfg(not(target_arch = "wasm32"))]
use flux_runner::{
    Difficulty, Tuning,
    consts::*,
    sim::{DeathCause, Level, Obstacle, Run, RunEvent, TickInput, tick},
};

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Flux Runner (native) starting...");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let seed_start: u64 = args.first().and_then(|s| s.parse().ok()).unwrap_or(1);
    let count: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(200);
    let tuning = match args.get(2).map(|path| load_tuning(path)).transpose() {
        Ok(tuning) => tuning.unwrap_or_default(),
        Err(e) => {
            log::error!("Failed to load tuning: {}", e);
            std::process::exit(1);
        }
    };

    println!("\nSeed sweep {}..{}", seed_start, seed_start.saturating_add(count));
    let mut broken = 0;
    for difficulty in Difficulty::ALL {
        let raw = Level::test_seeds_with(&tuning, seed_start, count, difficulty);
        let unresolved = Level::self_test_and_repair_with(&tuning, seed_start, count, difficulty);
        println!(
            "  {:<6} {} seeds with violations, {} unresolved after repair",
            difficulty.as_str(),
            raw.len(),
            unresolved.len()
        );
        for report in &unresolved {
            log::warn!("Seed {} still broken: {:?}", report.seed, report.violations);
        }
        broken += unresolved.len();
    }

    match Run::new(seed_start, Difficulty::Medium, &tuning, 1) {
        Ok(mut run) => demo_run(&mut run),
        Err(e) => log::error!("Could not start demo run: {}", e),
    }

    if broken > 0 {
        std::process::exit(2);
    }
    println!("✓ All seeds traversable");
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Library-only on wasm; the host page drives `sim::tick` directly
}

#[cfg(not(target_arch = "wasm32"))]
fn load_tuning(path: &str) -> Result<Tuning, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    Ok(Tuning::from_json(&json)?)
}

/// Play up to a minute of simulated time and print how it went
#[cfg(not(target_arch = "wasm32"))]
fn demo_run(run: &mut Run) {
    let mut death: Option<DeathCause> = None;
    let mut jumps = 0;
    let max_ticks = (60.0 / SIM_DT) as usize;

    for _ in 0..max_ticks {
        let input = autopilot(run);
        tick(run, &input, SIM_DT);
        for event in run.drain_events() {
            match event {
                RunEvent::Jumped { .. } => jumps += 1,
                RunEvent::PlayerDied { cause, .. } => death = Some(cause),
                _ => {}
            }
        }
        if run.is_over() {
            break;
        }
    }

    println!(
        "\nDemo run: {:.1}s, {:.0} units, speed {:.0}, {} jumps, {} coins",
        run.run_time,
        run.camera_x(),
        run.level.speed(),
        jumps,
        run.coins
    );
    match death {
        Some(cause) => println!("  died: {:?}", cause),
        None => println!("  survived"),
    }
}

/// Jump when something that needs clearing is just ahead of the lead player
#[cfg(not(target_arch = "wasm32"))]
fn autopilot(run: &Run) -> TickInput {
    let Some(player) = run.players.first() else {
        return TickInput::default();
    };
    if !player.grounded {
        return TickInput::default();
    }
    let front = player.distance + PLAYER_WIDTH / 2.0;
    let window = front..front + 40.0;
    let feet = player.y + PLAYER_HEIGHT / 2.0;

    let danger = run.level.segments().iter().any(|seg| {
        let ledge = seg.platform_y < feet - LANDING_TOLERANCE && window.contains(&seg.x);
        let gap = seg.gap_spans().any(|(start, _)| window.contains(&start));
        let spike = seg
            .spikes
            .iter()
            .any(|sp| window.contains(&(sp.x - sp.width / 2.0)));
        let pillar = seg.obstacles.iter().any(|ob| match ob {
            Obstacle::Pillar(p) => window.contains(&(p.x - p.width / 2.0)),
            _ => false,
        });
        ledge || gap || spike || pillar
    });

    if danger {
        TickInput::single_jump()
    } else {
        TickInput::default()
    }
}
