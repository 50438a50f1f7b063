// Basic Cheat Detection Simulation Example

mod cheat_sim;

use cheat_sim::{CheatSimConfig, CheatSimRunner};

fn main() {
    println!("╔════════════════════════════════════════════════════════╗");
    println!("║    Basic Cheat Detection Simulation                    ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    // Five peers, one of them back-stamping its moves. The increase
    // strategy raises the induced delay until the suspect's latency
    // either tracks it (cheater) or ignores it (honest).
    let mut config = CheatSimConfig::quick_increase();

    // Export the latency series for plotting
    config.output.csv_path = Some("latency_basic.csv".to_string());

    println!("Starting simulation...");
    println!("  Peers: {} ({} cheating)", config.num_peers, config.cheaters.len());
    println!("  Strategy: increase");
    println!("  Duration: {:.0}s simulated", config.duration_s);
    println!("  CSV: {:?}\n", config.output.csv_path);

    // Run simulation
    let runner = CheatSimRunner::new(config).expect("preset config is valid");
    let result = runner.run();

    // Print results
    result.print_summary();

    println!("\n✓ Simulation complete!");
}
