use anyhow::{Context, Result};
use clap::Parser;
use nalgebra::{DVector, Vector3};
use tracing_subscriber::EnvFilter;

use upright_balance::floating_end_effector::FloatingEndEffector;
use upright_balance::kinematic_traits::EndEffectorKinematics;
use upright_balance::penalty::BalancingTerm;
use upright_balance::settings_from_file::BalancingConfiguration;
use upright_balance::utils::{dump_matrix, dump_residuals};

/// Inspect balancing constraints: load a configuration and print the residuals of
/// the end effector at rest and, optionally, under a horizontal acceleration.
#[derive(Parser)]
#[command(name = "upright-balance")]
#[command(about = "Evaluate robust balancing constraints from a YAML configuration", long_about = None)]
#[command(version)]
struct Cli {
    /// Balancing configuration (YAML)
    config: String,

    /// Linear acceleration of the end effector along x, m/s²
    #[arg(long, allow_hyphen_values = true)]
    ax: Option<f64>,

    /// Linear acceleration of the end effector along y, m/s²
    #[arg(long, allow_hyphen_values = true)]
    ay: Option<f64>,

    /// Also print the settings back as YAML
    #[arg(long)]
    yaml: bool,

    /// Print the residual Jacobians with respect to state and input at rest
    #[arg(long)]
    jacobian: bool,
}

/// Usage example.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let configuration = BalancingConfiguration::from_yaml_file(&cli.config)
        .with_context(|| format!("Failed to load balancing configuration from {}", cli.config))?;

    println!("{}", configuration.settings);
    if cli.yaml {
        println!("Reading:\n{}", configuration.settings.to_yaml());
    }

    let term = configuration.balancing_term()?;
    let constraints = term.constraints();
    println!("{} constraints, {}", constraints.num_constraints(),
             if term.is_soft() { "soft (penalty cost)" } else { "hard" });

    let end_effector: &FloatingEndEffector = constraints.kinematics();
    let dims = end_effector.dimensions();
    let mut state = end_effector.state_at_rest(Vector3::zeros());
    let mut input = vec![0.0; dims.u()];

    println!("At rest:");
    let residuals = constraints.value(0.0, &DVector::from_vec(state.clone()), &DVector::from_vec(input.clone()))?;
    dump_residuals(&residuals);
    if cli.jacobian {
        let linear = constraints.linear_approximation(
            0.0, &DVector::from_vec(state.clone()), &DVector::from_vec(input.clone()))?;
        dump_matrix("dh/dx", &linear.dfdx);
        dump_matrix("dh/du", &linear.dfdu);
    }

    if cli.ax.is_some() || cli.ay.is_some() {
        let acceleration = Vector3::new(cli.ax.unwrap_or(0.0), cli.ay.unwrap_or(0.0), 0.0);
        end_effector.set_linear_acceleration(&mut state, &mut input, &acceleration);
        println!("With acceleration [{}, {}, 0]:", acceleration.x, acceleration.y);
        let state = DVector::from_vec(state);
        let input = DVector::from_vec(input);
        dump_residuals(&constraints.value(0.0, &state, &input)?);

        if let BalancingTerm::Soft(soft) = &term {
            println!("Penalty cost: {:.6}", soft.cost(0.0, &state, &input)?);
        }
    }

    if let Some(limits) = configuration.limit_constraint()? {
        println!("State/input limit constraints: {}", limits.num_constraints());
    }
    Ok(())
}
