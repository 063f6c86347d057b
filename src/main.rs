use sim_bridge::prelude::*;
use sim_bridge::logger;

/// Serve one simulator with a random player.
fn main() -> anyhow::Result<()> {
    let config = Configuration::from_env()?;
    logger::init_from_config(&config)?;

    let mut bridge = Bridge::new(&config)?;
    println!(
        "{} bridge listening on {}",
        bridge.transport_kind(),
        bridge.local_addr()
    );

    let mut policy = RandomPolicy::new();
    for (i, summary) in play_episodes(&mut bridge, &mut policy, config.episodes())?
        .iter()
        .enumerate()
    {
        println!(
            "episode {}: {} steps, total reward {:.3}, {:?}",
            i + 1,
            summary.steps,
            summary.total_reward(),
            summary.duration
        );
    }

    bridge.close()?;
    Ok(())
}
