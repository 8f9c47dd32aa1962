//! The built form of the balancing constraints.
//!
//! Everything that depends only on the settings is resolved here once: which residual
//! goes where, contact frames, footprint edges, which objects each contact carries and
//! the vertices of their parameter boxes. Evaluation then reduces to straight-line
//! arithmetic over the scalar type. Evaluators share one build through an `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::balancing_error::BalancingError;
use crate::bounded::{Interval, ObjectParameter, ObjectSample, SupportArea};
use crate::kinematic_traits::EndEffectorMotion;
use crate::scalar::{lift, smooth_min, smooth_norm, Scalar};
use crate::settings::{BalancingSettings, ConstraintCategories};

/// Upper limit on uncertain scalar parameters per contact (2^16 vertices).
pub const MAX_UNCERTAIN_PARAMETERS: usize = 16;

static NEXT_BUILD_ID: AtomicU64 = AtomicU64::new(1);

/// Object parameters at one vertex of the parameter box.
#[derive(Debug, Clone, PartialEq)]
struct StackVertex {
    /// One sample per object carried by the contact
    objects: Vec<ObjectSample>,
    /// Radius of the supported object's footprint (disc footprints only)
    support_radius: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum Footprint {
    /// Outward edge normal (end-effector frame) and edge offset
    Polygon(Vec<(Vector3<f64>, f64)>),
    Disc,
}

#[derive(Debug, Clone, PartialEq)]
struct CompiledContact {
    normal: Vector3<f64>,
    tangent1: Vector3<f64>,
    tangent2: Vector3<f64>,
    position: Vector3<f64>,
    mu: f64,
    footprint: Footprint,
    /// Radii of gyration squared, one per carried object
    gyration_squared: Vec<Vector3<f64>>,
    /// Vertices for the normal force and friction residuals (support radius excluded)
    force_vertices: Vec<StackVertex>,
    /// Vertices for the tipping residuals
    tipping_vertices: Vec<StackVertex>,
}

/// Structure of the balancing constraint function, fixed for given settings and gravity.
#[derive(Debug)]
pub struct CompiledBalancing {
    build_id: u64,
    /// Settings this structure was built from
    settings: BalancingSettings,
    categories: ConstraintCategories,
    delta: f64,
    gravity: Vector3<f64>,
    contacts: Vec<CompiledContact>,
    num_constraints: usize,
}

impl CompiledBalancing {
    /// Builds the constraint structure. Settings are validated first.
    pub fn build(settings: &BalancingSettings, gravity: &Vector3<f64>) -> Result<Self, BalancingError> {
        settings.validate()?;

        let build_id = NEXT_BUILD_ID.fetch_add(1, Ordering::Relaxed);
        if !settings.enabled {
            info!("Balancing constraints disabled.");
            return Ok(CompiledBalancing {
                build_id,
                settings: settings.clone(),
                categories: ConstraintCategories::empty(),
                delta: settings.delta,
                gravity: *gravity,
                contacts: Vec::new(),
                num_constraints: 0,
            });
        }

        let parents = settings.support_parents()?;
        for name in settings.objects.keys() {
            if !parents.contains_key(name.as_str()) {
                warn!("Object '{}' has no supporting contact and is not constrained.", name);
            }
        }

        let mut contacts = Vec::with_capacity(settings.contacts.len());
        for (index, contact) in settings.contacts.iter().enumerate() {
            let stack = settings.stack_on(contact)?;
            let objects: Vec<_> = stack.iter().map(|name| &settings.objects[name]).collect();
            let supported = &settings.objects[&contact.supported];

            let (tangent1, tangent2) = contact.tangent_basis();
            let footprint = match &supported.support_area {
                SupportArea::Polygon { .. } => Footprint::Polygon(
                    supported.support_area.edges().into_iter()
                        .map(|(e, offset)| (tangent1 * e.x + tangent2 * e.y, offset))
                        .collect(),
                ),
                SupportArea::Circle { .. } => Footprint::Disc,
            };

            let supported_position = stack.iter().position(|name| *name == contact.supported)
                .ok_or_else(|| BalancingError::UnknownObject { contact: index, name: contact.supported.clone() })?;

            let force_vertices = enumerate_vertices(index, &objects, supported_position, false)?;
            let tipping_vertices = enumerate_vertices(index, &objects, supported_position, true)?;
            debug!("Contact {} ({} -> {}) carries {} object(s), {} force and {} tipping vertices",
                   index, contact.supporting, contact.supported, objects.len(),
                   force_vertices.len(), tipping_vertices.len());

            contacts.push(CompiledContact {
                normal: contact.unit_normal(),
                tangent1,
                tangent2,
                position: contact.position,
                mu: settings.effective_mu(contact),
                footprint,
                gyration_squared: objects.iter().map(|o| o.gyration_squared()).collect(),
                force_vertices,
                tipping_vertices,
            });
        }

        let num_constraints = settings.num_constraints();
        info!("Compiled balancing constraints (build {}): {} contacts, {} constraints, {} mode",
              build_id, contacts.len(), num_constraints, settings.constraint_type);

        Ok(CompiledBalancing {
            build_id,
            settings: settings.clone(),
            categories: settings.constraints_enabled,
            delta: settings.delta,
            gravity: *gravity,
            contacts,
            num_constraints,
        })
    }

    /// Identifies this build. Clones of an evaluator report the same id; only an
    /// explicit rebuild changes it.
    pub fn build_id(&self) -> u64 {
        self.build_id
    }

    pub fn settings(&self) -> &BalancingSettings {
        &self.settings
    }

    pub fn gravity(&self) -> Vector3<f64> {
        self.gravity
    }

    pub fn num_constraints(&self) -> usize {
        self.num_constraints
    }

    /// Total number of parameter vertices evaluated per call
    pub fn num_vertices(&self) -> usize {
        self.contacts.iter()
            .map(|c| c.force_vertices.len() + c.tipping_vertices.len())
            .sum()
    }

    /// Evaluates all residuals for the given end-effector motion.
    ///
    /// Per contact the enabled categories follow in the order normal force, friction,
    /// tipping (one entry per footprint edge, or one for a disc). Each entry is the soft
    /// minimum over the parameter vertices of the contact.
    pub fn evaluate<T: Scalar>(&self, motion: &EndEffectorMotion<T>) -> Vec<T> {
        let mut residuals = Vec::with_capacity(self.num_constraints);
        if self.contacts.is_empty() {
            return residuals;
        }

        // End-effector frame quantities shared by every object
        let c_ew = motion.orientation.transpose();
        let gravity: Vector3<T> = lift(&self.gravity);
        let linear = &c_ew * (motion.linear_acceleration - gravity);
        let omega = &c_ew * motion.angular_velocity;
        let alpha = &c_ew * motion.angular_acceleration;
        let frame = FrameMotion { linear, omega, alpha };

        let delta = self.delta;
        for contact in &self.contacts {
            let normal: Vector3<T> = lift(&contact.normal);

            if self.categories.intersects(ConstraintCategories::NORMAL | ConstraintCategories::FRICTION) {
                let t1: Vector3<T> = lift(&contact.tangent1);
                let t2: Vector3<T> = lift(&contact.tangent2);
                let mu = T::from_f64(contact.mu);
                let margin = T::from_f64(delta * delta);

                let mut normal_forces = Vec::with_capacity(contact.force_vertices.len());
                let mut friction = Vec::with_capacity(contact.force_vertices.len());
                for vertex in &contact.force_vertices {
                    let (force, _) = frame.contact_wrench(contact, vertex, false);
                    let f_n = normal.dot(&force);
                    let f_t1 = t1.dot(&force);
                    let f_t2 = t2.dot(&force);
                    normal_forces.push(f_n);
                    friction.push(mu * f_n - (f_t1 * f_t1 + f_t2 * f_t2 + margin).sqrt());
                }

                if self.categories.contains(ConstraintCategories::NORMAL) {
                    residuals.push(smooth_min(&normal_forces, delta));
                }
                if self.categories.contains(ConstraintCategories::FRICTION) {
                    residuals.push(smooth_min(&friction, delta));
                }
            }

            if self.categories.contains(ConstraintCategories::TIPPING) {
                let edges = match &contact.footprint {
                    Footprint::Polygon(edges) => edges.len(),
                    Footprint::Disc => 1,
                };
                let mut per_edge: Vec<Vec<T>> = vec![Vec::with_capacity(contact.tipping_vertices.len()); edges];
                for vertex in &contact.tipping_vertices {
                    let (force, moment) = frame.contact_wrench(contact, vertex, true);
                    let f_n = normal.dot(&force);
                    // Center of pressure offset times the normal force
                    let pressure_moment = normal.cross(&moment);
                    match &contact.footprint {
                        Footprint::Polygon(polygon) => {
                            for (k, (edge_normal, offset)) in polygon.iter().enumerate() {
                                let e: Vector3<T> = lift(edge_normal);
                                per_edge[k].push(T::from_f64(*offset) * f_n - e.dot(&pressure_moment));
                            }
                        }
                        Footprint::Disc => {
                            per_edge[0].push(
                                T::from_f64(vertex.support_radius) * f_n - smooth_norm(&pressure_moment, delta));
                        }
                    }
                }
                for values in &per_edge {
                    residuals.push(smooth_min(values, delta));
                }
            }
        }
        residuals
    }
}

/// Motion of the end-effector frame, expressed in that frame.
struct FrameMotion<T: Scalar> {
    /// Acceleration of the frame origin minus gravity
    linear: Vector3<T>,
    omega: Vector3<T>,
    alpha: Vector3<T>,
}

impl<T: Scalar> FrameMotion<T> {
    /// Specific force (force per unit mass) the support must supply to a point at `r`
    fn specific_force(&self, r: &Vector3<T>) -> Vector3<T> {
        self.linear + self.alpha.cross(r) + self.omega.cross(&self.omega.cross(r))
    }

    /// Total force and (if requested) moment about the contact point that the contact
    /// must transmit to carry every object at the given vertex.
    fn contact_wrench(&self, contact: &CompiledContact, vertex: &StackVertex,
                      with_moment: bool) -> (Vector3<T>, Vector3<T>) {
        let position: Vector3<T> = lift(&contact.position);
        let mut force = Vector3::<T>::zeros();
        let mut moment = Vector3::<T>::zeros();
        for (sample, gyration_squared) in vertex.objects.iter().zip(&contact.gyration_squared) {
            let mass = T::from_f64(sample.mass);
            let com: Vector3<T> = lift(&sample.com);
            let object_force = self.specific_force(&com) * mass;
            force += object_force;
            if with_moment {
                let inertia: Vector3<T> = lift(gyration_squared);
                let torque = (inertia.component_mul(&self.alpha)
                    + self.omega.cross(&inertia.component_mul(&self.omega))) * mass;
                moment += (com - position).cross(&object_force) + torque;
            }
        }
        (force, moment)
    }
}

/// Enumerates the vertices of the joint parameter box of `objects`. Parameters with
/// zero-width bounds are held at their single value and not enumerated.
fn enumerate_vertices(contact: usize, objects: &[&crate::bounded::BoundedBalancedObject],
                      supported: usize, include_support: bool) -> Result<Vec<StackVertex>, BalancingError> {
    let mut uncertain: Vec<(usize, ObjectParameter, Interval)> = Vec::new();
    for (i, object) in objects.iter().enumerate() {
        let with_support = include_support && i == supported;
        uncertain.extend(object.uncertain_parameters(with_support).into_iter().map(|(p, b)| (i, p, b)));
    }
    if uncertain.len() > MAX_UNCERTAIN_PARAMETERS {
        return Err(BalancingError::TooManyUncertainParameters {
            contact,
            count: uncertain.len(),
            max: MAX_UNCERTAIN_PARAMETERS,
        });
    }

    let nominal: Vec<ObjectSample> = objects.iter().map(|o| o.nominal_sample()).collect();
    let vertices = (0..1usize << uncertain.len())
        .map(|bits| {
            let mut samples = nominal.clone();
            for (k, (object, parameter, bounds)) in uncertain.iter().enumerate() {
                let value = bounds.bound(bits & (1 << k) != 0);
                samples[*object] = samples[*object].with(*parameter, value);
            }
            StackVertex {
                support_radius: samples[supported].support_radius,
                objects: samples,
            }
        })
        .collect();
    Ok(vertices)
}
