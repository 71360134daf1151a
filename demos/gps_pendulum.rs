use std::error::Error;

extern crate guided_policy_search;
use guided_policy_search::control::{Activation, Gps, GpsConfig};
use guided_policy_search::data::{save_gaussian_sequence, save_trace};
use guided_policy_search::envs::Pendulum;
use guided_policy_search::utils::plot::{confidence_band, plot_trace};

fn main() -> Result<(), Box<dyn Error>> {
    let config = GpsConfig {
        nb_steps: 150,
        nb_episodes: 25,
        nb_iter: 15,
        kl_bound: 25.0,
        init_action_sigma: 1.0,
        // only punish deviation from upright over the last third
        activation: Activation::Window {
            start: 100,
            end: 151,
        },
        verbose: true,
        ..GpsConfig::default()
    };

    let mut solver: Gps<_, 2, 1> = Gps::new(Pendulum::new(), config);
    let trace = solver.run();

    println!("final mean return: {:.4}", trace.last().unwrap());

    let (lb, ub) = confidence_band(&solver.prop.xdist, 0);
    let terminal = solver.prop.xdist.mu.last().unwrap()[0];
    println!(
        "terminal angle {:.3} rad (band [{:.3}, {:.3}])",
        terminal,
        lb.last().unwrap(),
        ub.last().unwrap()
    );

    std::fs::create_dir_all("./img")?;
    save_trace(&trace, "./img/gps_pendulum_trace.csv")?;
    save_gaussian_sequence(&solver.prop.xdist, "./img/gps_pendulum_states.csv")?;
    save_gaussian_sequence(&solver.prop.udist, "./img/gps_pendulum_actions.csv")?;
    plot_trace(&trace, "./img/gps_pendulum_trace.svg")?;
    Ok(())
}
