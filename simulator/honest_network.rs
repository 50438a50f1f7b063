// Honest Network Baseline Example

mod cheat_sim;

use cheat_sim::{CheatSimConfig, CheatSimRunner};

fn main() {
    println!("╔════════════════════════════════════════════════════════╗");
    println!("║    Honest Network Baseline                             ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    // Nobody cheats. Every probe round should end in NotCheater and
    // the network should finish with all links intact; any exclusion
    // here is a false positive.
    let mut config = CheatSimConfig::quick_increase();
    config.cheaters = Vec::new();
    config.duration_s = 10_000.0;

    println!("Starting simulation...");
    println!("  Peers: {} (none cheating)", config.num_peers);
    println!("  Strategy: increase");
    println!("  Duration: {:.0}s simulated\n", config.duration_s);

    // Run simulation
    let runner = CheatSimRunner::new(config).expect("preset config is valid");
    let result = runner.run();

    // Print results
    result.print_summary();

    if result.exclusions.is_empty() {
        println!("\n✓ Simulation complete! No peer was wrongly excluded.");
    } else {
        println!(
            "\n✗ {} honest peer(s) excluded; consider a wider sample window.",
            result.exclusions.len()
        );
    }
}
