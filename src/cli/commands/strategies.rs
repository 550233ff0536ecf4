//! List strategies command.

use anyhow::Result;
use trading_strategies::StrategyRegistry;

pub async fn run() -> Result<()> {
    let registry = StrategyRegistry::new();

    println!("Available Strategies");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        println!("  {} ", info.name);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        println!();
        for param in &info.parameters {
            println!(
                "    {:<16} {:>8} [{} .. {}, step {}]  {}",
                param.name, param.default, param.min, param.max, param.step, param.description
            );
        }
        println!();
    }

    println!("Use --strategy <name> and --params '{{\"name\": value}}' to select a strategy.");

    Ok(())
}
