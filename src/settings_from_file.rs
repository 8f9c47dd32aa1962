//! Supports reading balancing configuration from YAML file (optional)

use std::collections::BTreeMap;
use std::path::Path;

use nalgebra::{DVector, Vector2, Vector3};
use serde::Deserialize;
use tracing::debug;

use crate::balancing_constraints::BoundedBalancingConstraints;
use crate::balancing_error::BalancingError;
use crate::bounded::{BoundedBalancedObject, Interval, SupportArea};
use crate::contact::{ContactBody, ContactPoint};
use crate::floating_end_effector::FloatingEndEffector;
use crate::joint_limits::JointStateInputConstraint;
use crate::kinematic_traits::{Drivetrain, EndEffectorKinematics};
use crate::penalty::{BalancingTerm, PenaltyKind, RelaxedBarrierPenalty, SquaredHingePenalty};
use crate::settings::{BalancingSettings, ConstraintCategories, ConstraintType};

fn default_gravity() -> [f64; 3] { [0.0, 0.0, -9.81] }
fn default_drivetrain() -> String { "double_integrator".to_string() }
fn default_true() -> bool { true }
fn default_constraint_type() -> String { "soft".to_string() }
fn default_mu() -> f64 { 1e-2 }
fn default_delta() -> f64 { 1e-3 }
fn default_normal() -> [f64; 3] { [0.0, 0.0, 1.0] }
fn default_penalty_kind() -> String { "relaxed_barrier".to_string() }

#[derive(Deserialize)]
struct CategoriesConfig {
    #[serde(default = "default_true")]
    normal: bool,
    #[serde(default = "default_true")]
    friction: bool,
    #[serde(default = "default_true")]
    tipping: bool,
}

/// Exactly one of the fields must be given
#[derive(Deserialize)]
struct SupportConfig {
    #[serde(default)]
    polygon: Option<Vec<[f64; 2]>>,
    /// Half extents
    #[serde(default)]
    rectangle: Option<[f64; 2]>,
    /// Side length
    #[serde(default)]
    triangle: Option<f64>,
    /// `[lower, upper]` radius bounds
    #[serde(default)]
    circle: Option<[f64; 2]>,
}

#[derive(Deserialize)]
struct ObjectConfig {
    mass: f64,
    #[serde(default)]
    mass_bounds: Option<[f64; 2]>,
    com: [f64; 3],
    /// Either half extents of a box around `com` ...
    #[serde(default)]
    com_half_extents: Option<[f64; 3]>,
    /// ... or explicit `[lower, upper]` per axis
    #[serde(default)]
    com_bounds: Option<[[f64; 2]; 3]>,
    #[serde(default)]
    radii_of_gyration: Option<[f64; 3]>,
    support: SupportConfig,
}

#[derive(Deserialize)]
struct ContactConfig {
    /// `end_effector` or an object name
    supporting: String,
    supported: String,
    mu: f64,
    #[serde(default = "default_normal")]
    normal: [f64; 3],
    position: [f64; 3],
}

#[derive(Deserialize)]
struct PenaltyConfig {
    #[serde(default = "default_penalty_kind", rename = "type")]
    kind: String,
    #[serde(default)]
    mu: Option<f64>,
    #[serde(default)]
    delta: Option<f64>,
}

#[derive(Deserialize)]
struct BalancingConfig {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    constraints_enabled: Option<CategoriesConfig>,
    #[serde(default = "default_constraint_type")]
    constraint_type: String,
    #[serde(default = "default_mu")]
    mu: f64,
    #[serde(default = "default_delta")]
    delta: f64,
    #[serde(default)]
    penalty: Option<PenaltyConfig>,
    #[serde(default)]
    objects: BTreeMap<String, ObjectConfig>,
    #[serde(default)]
    contacts: Vec<ContactConfig>,
}

#[derive(Deserialize)]
struct LimitsConfig {
    state_lower: Vec<f64>,
    state_upper: Vec<f64>,
    input_lower: Vec<f64>,
    input_upper: Vec<f64>,
}

#[derive(Deserialize)]
struct Root {
    #[serde(default = "default_gravity")]
    gravity: [f64; 3],
    #[serde(default = "default_drivetrain")]
    drivetrain: String,
    balancing: BalancingConfig,
    #[serde(default)]
    limits: Option<LimitsConfig>,
}

/// Bounds on the robot state and input.
#[derive(Debug, Clone, PartialEq)]
pub struct StateInputLimits {
    pub state_lower: DVector<f64>,
    pub state_upper: DVector<f64>,
    pub input_lower: DVector<f64>,
    pub input_upper: DVector<f64>,
}

/// Everything needed to set up balancing for a floating end effector.
#[derive(Debug, Clone, PartialEq)]
pub struct BalancingConfiguration {
    pub settings: BalancingSettings,
    pub gravity: Vector3<f64>,
    pub drivetrain: Drivetrain,
    /// Penalty used when the constraints are soft
    pub penalty: PenaltyKind,
    pub limits: Option<StateInputLimits>,
}

impl BalancingConfiguration {
    /// Read the balancing configuration from YAML file. YAML file like this is supported:
    /// ```yaml
    /// gravity: [0.0, 0.0, -9.81]
    /// drivetrain: triple_integrator
    /// balancing:
    ///   enabled: true
    ///   constraint_type: hard
    ///   constraints_enabled: { normal: true, friction: true, tipping: true }
    ///   mu: 0.01
    ///   delta: 0.001
    ///   objects:
    ///     tray:
    ///       mass: 0.5
    ///       mass_bounds: [0.4, 0.6]
    ///       com: [0.0, 0.0, 0.01]
    ///       com_half_extents: [0.01, 0.01, 0.0]
    ///       support: { rectangle: [0.1, 0.1] }
    ///   contacts:
    ///     - supporting: end_effector
    ///       supported: tray
    ///       mu: 0.5
    ///       position: [0.0, 0.0, 0.0]
    /// ```
    /// Gravity, drivetrain, bounds, radii of gyration, contact normals (+z), the
    /// penalty and the state/input limits are optional. The settings are validated.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, BalancingError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, BalancingError> {
        let root: Root = serde_saphyr::from_str(contents)
            .map_err(|e| BalancingError::ParseError(format!("{}", e)))?;

        let drivetrain = match root.drivetrain.as_str() {
            "double_integrator" => Drivetrain::DoubleIntegrator,
            "triple_integrator" => Drivetrain::TripleIntegrator,
            other => return Err(BalancingError::ParseError(format!(
                "unknown drivetrain '{}' (expected double_integrator or triple_integrator)", other
            ))),
        };

        let balancing = root.balancing;
        let constraint_type = match balancing.constraint_type.as_str() {
            "soft" => ConstraintType::Soft,
            "hard" => ConstraintType::Hard,
            other => return Err(BalancingError::ParseError(format!(
                "unknown constraint_type '{}' (expected soft or hard)", other
            ))),
        };

        let mut constraints_enabled = ConstraintCategories::all();
        if let Some(categories) = &balancing.constraints_enabled {
            constraints_enabled.set(ConstraintCategories::NORMAL, categories.normal);
            constraints_enabled.set(ConstraintCategories::FRICTION, categories.friction);
            constraints_enabled.set(ConstraintCategories::TIPPING, categories.tipping);
        }

        let mut objects = BTreeMap::new();
        for (name, object) in balancing.objects {
            objects.insert(name.clone(), object_from_config(&name, object)?);
        }

        let contacts = balancing.contacts.into_iter()
            .map(|c| {
                let supporting = if c.supporting == "end_effector" {
                    ContactBody::EndEffector
                } else {
                    ContactBody::Object(c.supporting)
                };
                ContactPoint::new(supporting, &c.supported, c.mu,
                                  Vector3::from(c.normal), Vector3::from(c.position))
            })
            .collect();

        let penalty = match &balancing.penalty {
            None => PenaltyKind::RelaxedBarrier(RelaxedBarrierPenalty::new(balancing.mu, balancing.delta)),
            Some(p) => {
                let mu = p.mu.unwrap_or(balancing.mu);
                let delta = p.delta.unwrap_or(balancing.delta);
                if !(mu >= 0.0) || !(delta > 0.0) {
                    return Err(BalancingError::ParseError(format!(
                        "penalty mu must be non-negative and delta positive (got {}, {})", mu, delta
                    )));
                }
                match p.kind.as_str() {
                    "relaxed_barrier" => PenaltyKind::RelaxedBarrier(RelaxedBarrierPenalty::new(mu, delta)),
                    "squared_hinge" => PenaltyKind::SquaredHinge(SquaredHingePenalty::new(mu, delta)),
                    other => return Err(BalancingError::ParseError(format!(
                        "unknown penalty type '{}' (expected relaxed_barrier or squared_hinge)", other
                    ))),
                }
            }
        };

        let limits = root.limits.map(|l| StateInputLimits {
            state_lower: DVector::from_vec(l.state_lower),
            state_upper: DVector::from_vec(l.state_upper),
            input_lower: DVector::from_vec(l.input_lower),
            input_upper: DVector::from_vec(l.input_upper),
        });

        let settings = BalancingSettings {
            enabled: balancing.enabled,
            constraints_enabled,
            objects,
            contacts,
            constraint_type,
            mu: balancing.mu,
            delta: balancing.delta,
        };
        settings.validate()?;
        debug!("Loaded balancing configuration: {} objects, {} contacts",
               settings.objects.len(), settings.contacts.len());

        Ok(BalancingConfiguration {
            settings,
            gravity: Vector3::from(root.gravity),
            drivetrain,
            penalty,
            limits,
        })
    }

    pub fn end_effector(&self) -> FloatingEndEffector {
        FloatingEndEffector::new(self.drivetrain)
    }

    /// Balancing constraints for a floating end effector with this configuration.
    pub fn constraints(&self) -> Result<BoundedBalancingConstraints<FloatingEndEffector>, BalancingError> {
        BoundedBalancingConstraints::new(self.end_effector(), self.settings.clone(), self.gravity)
    }

    /// Constraints wrapped as hard constraints or soft cost, per the configured type.
    pub fn balancing_term(&self) -> Result<BalancingTerm<FloatingEndEffector>, BalancingError> {
        Ok(BalancingTerm::with_penalty(self.constraints()?, self.penalty))
    }

    /// Hard state/input limits, if configured.
    pub fn limit_constraint(&self) -> Result<Option<JointStateInputConstraint>, BalancingError> {
        let Some(limits) = &self.limits else {
            return Ok(None);
        };
        let dims = self.end_effector().dimensions();
        JointStateInputConstraint::new(dims, dims.x(), dims.u(),
                                       &limits.state_lower, &limits.state_upper,
                                       &limits.input_lower, &limits.input_upper).map(Some)
    }
}

fn object_from_config(name: &str, config: ObjectConfig) -> Result<BoundedBalancedObject, BalancingError> {
    let support = config.support;
    let mut areas = Vec::new();
    if let Some(vertices) = support.polygon {
        areas.push(SupportArea::Polygon { vertices: vertices.iter().map(|v| Vector2::new(v[0], v[1])).collect() });
    }
    if let Some([hx, hy]) = support.rectangle {
        areas.push(SupportArea::rectangle(hx, hy));
    }
    if let Some(side) = support.triangle {
        areas.push(SupportArea::equilateral_triangle(side));
    }
    if let Some([lower, upper]) = support.circle {
        areas.push(SupportArea::Circle { radius: Interval::new(lower, upper) });
    }
    if areas.len() != 1 {
        return Err(BalancingError::ParseError(format!(
            "object '{}': support must have exactly one of polygon, rectangle, triangle, circle", name
        )));
    }
    let support_area = areas.swap_remove(0);

    let com = Vector3::from(config.com);
    let mut object = BoundedBalancedObject::new(config.mass, com, support_area);
    if let Some([lower, upper]) = config.mass_bounds {
        object = object.with_mass_bounds(lower, upper);
    }
    match (config.com_half_extents, config.com_bounds) {
        (Some(_), Some(_)) => return Err(BalancingError::ParseError(format!(
            "object '{}': give either com_half_extents or com_bounds, not both", name
        ))),
        (Some(half_extents), None) => object = object.with_com_half_extents(Vector3::from(half_extents)),
        (None, Some(bounds)) => object.com_bounds = bounds.map(|[lower, upper]| Interval::new(lower, upper)),
        (None, None) => {}
    }
    if let Some(radii) = config.radii_of_gyration {
        object = object.with_radii_of_gyration(Vector3::from(radii));
    }
    Ok(object)
}
