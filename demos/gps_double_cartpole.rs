use std::error::Error;

extern crate guided_policy_search;
use guided_policy_search::control::gps::DynamicsFit;
use guided_policy_search::control::{Activation, Gps, GpsConfig};
use guided_policy_search::data::{save_gaussian_sequence, save_trace};
use guided_policy_search::envs::DoubleCartpole;
use guided_policy_search::utils::plot::plot_trace;

fn main() -> Result<(), Box<dyn Error>> {
    let config = GpsConfig {
        nb_steps: 100,
        nb_episodes: 10,
        nb_iter: 10,
        kl_bound: 2.0,
        init_action_sigma: 1.0,
        // the known model is linearized along the mean rollout
        fit: DynamicsFit::Analytical,
        activation: Activation::Sigmoid {
            mult: 1.0,
            shift: 80.0,
        },
        verbose: true,
        ..GpsConfig::default()
    };

    let mut solver: Gps<_, 6, 1> = Gps::new(DoubleCartpole::new(), config);
    let trace = solver.run();

    println!("final mean return: {:.4}", trace.last().unwrap());
    for (iter, err) in &solver.diagnostics {
        println!("iteration {iter}: {err}");
    }

    std::fs::create_dir_all("./img")?;
    save_trace(&trace, "./img/gps_double_cartpole_trace.csv")?;
    save_gaussian_sequence(&solver.prop.xdist, "./img/gps_double_cartpole_states.csv")?;
    save_gaussian_sequence(&solver.prop.udist, "./img/gps_double_cartpole_actions.csv")?;
    plot_trace(&trace, "./img/gps_double_cartpole_trace.svg")?;
    Ok(())
}
