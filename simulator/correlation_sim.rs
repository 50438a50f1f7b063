// Correlation Strategy Simulation Example

mod cheat_sim;

use cheat_sim::{CheatSimConfig, CheatSimRunner};

fn main() {
    println!("╔════════════════════════════════════════════════════════╗");
    println!("║    Correlation Strategy Simulation                     ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    // Seven peers with two independent back-stampers. The correlation
    // strategy draws random delays and convicts when the measured
    // latency moves with them, so it has no fixed delay ceiling to wait
    // out and handles both cheaters with the same probe schedule.
    let mut config = CheatSimConfig::quick_correlation();
    config.num_peers = 7;
    config.cheaters = vec![2, 5];

    // Two exclusion rounds take a while; give the run room for both
    config.duration_s = 40_000.0;

    println!("Starting simulation...");
    println!("  Peers: {} ({} cheating)", config.num_peers, config.cheaters.len());
    println!("  Strategy: correlation");
    println!("  Duration: {:.0}s simulated\n", config.duration_s);

    // Run simulation
    let runner = CheatSimRunner::new(config).expect("preset config is valid");
    let result = runner.run();

    // Print results
    result.print_summary();
    result.print_verdicts();

    println!("\n✓ Simulation complete!");
}
