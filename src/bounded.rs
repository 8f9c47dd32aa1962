//! Balanced objects whose physical parameters are only known up to interval bounds.
//!
//! Worst-case residuals are found by evaluating at every vertex of the box spanned by
//! the uncertain parameters. This is exact whenever the residual is concave along each
//! uncertain parameter taken separately, which holds for the normal force and friction
//! residuals. See [`crate::compiled`] for where the enumeration happens.

use nalgebra::{Vector2, Vector3};

use crate::balancing_error::BalancingError;

/// Closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn new(lower: f64, upper: f64) -> Self {
        Interval { lower, upper }
    }

    /// Degenerate interval holding exactly one value
    pub fn point(value: f64) -> Self {
        Interval { lower: value, upper: value }
    }

    /// Interval `value ± half_width`
    pub fn centered(value: f64, half_width: f64) -> Self {
        Interval { lower: value - half_width, upper: value + half_width }
    }

    /// Empty if lower bound is above the upper bound. Intervals with NaN bounds are also empty.
    pub fn is_empty(&self) -> bool {
        !(self.lower <= self.upper)
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Zero-width interval; such parameters are not enumerated
    pub fn is_point(&self) -> bool {
        self.width() == 0.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Lower bound if `upper` is false, upper bound otherwise
    pub fn bound(&self, upper: bool) -> f64 {
        if upper { self.upper } else { self.lower }
    }
}

/// Footprint of an object on its supporting surface, in the contact plane.
///
/// Planar coordinates are expressed in the tangent basis of the supporting contact
/// (see [`crate::contact::ContactPoint::tangent_basis`]) with the origin at the contact
/// position.
#[derive(Debug, Clone, PartialEq)]
pub enum SupportArea {
    /// Convex polygon, vertices in counter-clockwise order
    Polygon { vertices: Vec<Vector2<f64>> },

    /// Disc centered at the contact position. The radius may be uncertain.
    Circle { radius: Interval },
}

impl SupportArea {
    /// Rectangle centered at the contact position with the given half extents.
    pub fn rectangle(half_x: f64, half_y: f64) -> Self {
        SupportArea::Polygon {
            vertices: vec![
                Vector2::new(half_x, half_y),
                Vector2::new(-half_x, half_y),
                Vector2::new(-half_x, -half_y),
                Vector2::new(half_x, -half_y),
            ],
        }
    }

    pub fn circle(radius: f64) -> Self {
        SupportArea::Circle { radius: Interval::point(radius) }
    }

    /// Equilateral triangle with the given side length, centroid at the contact position,
    /// one vertex pointing along the first tangent direction.
    pub fn equilateral_triangle(side: f64) -> Self {
        let r = side / 3f64.sqrt(); // circumradius
        let vertices = (0..3)
            .map(|i| {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / 3.0;
                Vector2::new(r * angle.cos(), r * angle.sin())
            })
            .collect();
        SupportArea::Polygon { vertices }
    }

    /// Number of tipping residuals this footprint produces: one per polygon edge, or
    /// one for a disc.
    pub fn num_edges(&self) -> usize {
        match self {
            SupportArea::Polygon { vertices } => vertices.len(),
            SupportArea::Circle { .. } => 1,
        }
    }

    /// Outward unit normal and offset (`normal · z <= offset` inside) of each polygon edge.
    /// Empty for a disc.
    pub fn edges(&self) -> Vec<(Vector2<f64>, f64)> {
        match self {
            SupportArea::Polygon { vertices } => {
                let n = vertices.len();
                (0..n)
                    .map(|i| {
                        let a = vertices[i];
                        let b = vertices[(i + 1) % n];
                        let d = b - a;
                        let normal = Vector2::new(d.y, -d.x).normalize();
                        (normal, normal.dot(&a))
                    })
                    .collect()
            }
            SupportArea::Circle { .. } => Vec::new(),
        }
    }

    fn validate(&self, object: &str) -> Result<(), BalancingError> {
        let degenerate = |reason: String| BalancingError::DegenerateSupportArea {
            object: object.to_string(),
            reason,
        };
        match self {
            SupportArea::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(degenerate(format!("polygon needs at least 3 vertices, got {}", vertices.len())));
                }
                if vertices.iter().any(|v| !v.x.is_finite() || !v.y.is_finite()) {
                    return Err(degenerate("non-finite vertex".to_string()));
                }
                let n = vertices.len();
                let mut winding = 0.0;
                for i in 0..n {
                    let a = vertices[i];
                    let b = vertices[(i + 1) % n];
                    let c = vertices[(i + 2) % n];
                    let turn = (b - a).perp(&(c - b));
                    if !(turn > 0.0) {
                        return Err(degenerate(format!(
                            "polygon must be convex and counter-clockwise (vertex {})", (i + 1) % n
                        )));
                    }
                    winding += turn.atan2((b - a).dot(&(c - b)));
                }
                // Left turns only, but winding more than once: the boundary crosses itself
                if (winding - 2.0 * std::f64::consts::PI).abs() > 1e-9 {
                    return Err(degenerate(format!(
                        "polygon boundary is self-intersecting (turns {:.3} rad in total)", winding
                    )));
                }
                Ok(())
            }
            SupportArea::Circle { radius } => {
                if radius.is_empty() {
                    return Err(BalancingError::EmptyInterval {
                        object: object.to_string(),
                        parameter: "support radius".to_string(),
                        lower: radius.lower,
                        upper: radius.upper,
                    });
                }
                if !(radius.lower > 0.0) || !radius.upper.is_finite() {
                    return Err(degenerate(format!("radius must be positive (got {})", radius.lower)));
                }
                Ok(())
            }
        }
    }
}

/// Scalar parameter of an object that may be uncertain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectParameter {
    Mass,
    ComX,
    ComY,
    ComZ,
    SupportRadius,
}

impl ObjectParameter {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectParameter::Mass => "mass",
            ObjectParameter::ComX => "com.x",
            ObjectParameter::ComY => "com.y",
            ObjectParameter::ComZ => "com.z",
            ObjectParameter::SupportRadius => "support radius",
        }
    }
}

/// One concrete realization of the uncertain parameters of an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectSample {
    pub mass: f64,
    /// Center of mass, end-effector frame
    pub com: Vector3<f64>,
    pub support_radius: f64,
}

impl ObjectSample {
    /// Replaces the given parameter by `value`.
    pub fn with(mut self, parameter: ObjectParameter, value: f64) -> Self {
        match parameter {
            ObjectParameter::Mass => self.mass = value,
            ObjectParameter::ComX => self.com.x = value,
            ObjectParameter::ComY => self.com.y = value,
            ObjectParameter::ComZ => self.com.z = value,
            ObjectParameter::SupportRadius => self.support_radius = value,
        }
        self
    }
}

/// Rigid object balanced on the end effector (or on another object), with mass and
/// center of mass known to lie within bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedBalancedObject {
    /// Nominal mass, kg
    pub mass: f64,
    pub mass_bounds: Interval,

    /// Nominal center of mass in the end-effector frame
    pub com: Vector3<f64>,
    /// Bounds on each center of mass coordinate, end-effector frame
    pub com_bounds: [Interval; 3],

    /// Radii of gyration about the center of mass (principal axes aligned with the
    /// end-effector frame). The inertia is `mass * diag(r²)`.
    pub radii_of_gyration: Vector3<f64>,

    pub support_area: SupportArea,
}

impl BoundedBalancedObject {
    /// Object with exactly known parameters
    pub fn new(mass: f64, com: Vector3<f64>, support_area: SupportArea) -> Self {
        BoundedBalancedObject {
            mass,
            mass_bounds: Interval::point(mass),
            com,
            com_bounds: [Interval::point(com.x), Interval::point(com.y), Interval::point(com.z)],
            radii_of_gyration: Vector3::zeros(),
            support_area,
        }
    }

    /// Builder-style: mass known within `[lower, upper]`.
    pub fn with_mass_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.mass_bounds = Interval::new(lower, upper);
        self
    }

    /// Builder-style: center of mass known within the box `com ± half_extents`.
    pub fn with_com_half_extents(mut self, half_extents: Vector3<f64>) -> Self {
        self.com_bounds = std::array::from_fn(|i| Interval::centered(self.com[i], half_extents[i]));
        self
    }

    pub fn with_radii_of_gyration(mut self, radii: Vector3<f64>) -> Self {
        self.radii_of_gyration = radii;
        self
    }

    pub fn com_interval(&self, parameter: ObjectParameter) -> Option<Interval> {
        match parameter {
            ObjectParameter::ComX => Some(self.com_bounds[0]),
            ObjectParameter::ComY => Some(self.com_bounds[1]),
            ObjectParameter::ComZ => Some(self.com_bounds[2]),
            _ => None,
        }
    }

    /// Bounds of the given parameter, `None` if this object does not have it
    /// (support radius of a polygonal footprint).
    pub fn interval(&self, parameter: ObjectParameter) -> Option<Interval> {
        match parameter {
            ObjectParameter::Mass => Some(self.mass_bounds),
            ObjectParameter::SupportRadius => match self.support_area {
                SupportArea::Circle { radius } => Some(radius),
                SupportArea::Polygon { .. } => None,
            },
            com => self.com_interval(com),
        }
    }

    /// Parameters with non-zero width bounds. With `include_support` false the support
    /// radius is skipped even when uncertain (residuals that do not depend on it).
    pub fn uncertain_parameters(&self, include_support: bool) -> Vec<(ObjectParameter, Interval)> {
        let mut parameters = vec![
            ObjectParameter::Mass,
            ObjectParameter::ComX,
            ObjectParameter::ComY,
            ObjectParameter::ComZ,
        ];
        if include_support {
            parameters.push(ObjectParameter::SupportRadius);
        }
        parameters
            .into_iter()
            .filter_map(|p| self.interval(p).map(|i| (p, i)))
            .filter(|(_, i)| !i.is_point())
            .collect()
    }

    /// Nominal parameters. For a disc footprint the smallest radius is taken.
    pub fn nominal_sample(&self) -> ObjectSample {
        let support_radius = match self.support_area {
            SupportArea::Circle { radius } => radius.lower,
            SupportArea::Polygon { .. } => 0.0,
        };
        ObjectSample { mass: self.mass, com: self.com, support_radius }
    }

    /// Inertia diagonal divided by mass, `r²` per axis
    pub fn gyration_squared(&self) -> Vector3<f64> {
        self.radii_of_gyration.component_mul(&self.radii_of_gyration)
    }

    /// Checks that all bounds are non-empty and the nominal values lie within them.
    pub fn validate(&self, name: &str) -> Result<(), BalancingError> {
        let empty = |parameter: ObjectParameter, i: &Interval| BalancingError::EmptyInterval {
            object: name.to_string(),
            parameter: parameter.name().to_string(),
            lower: i.lower,
            upper: i.upper,
        };
        let outside = |parameter: ObjectParameter, value: f64| BalancingError::NominalOutOfBounds {
            object: name.to_string(),
            parameter: parameter.name().to_string(),
            value,
        };

        if self.mass_bounds.is_empty() {
            return Err(empty(ObjectParameter::Mass, &self.mass_bounds));
        }
        if !(self.mass_bounds.lower > 0.0) || !self.mass_bounds.upper.is_finite() {
            return Err(BalancingError::NonPositiveMass {
                object: name.to_string(),
                lower: self.mass_bounds.lower,
            });
        }
        if !self.mass_bounds.contains(self.mass) {
            return Err(outside(ObjectParameter::Mass, self.mass));
        }

        for (i, parameter) in [ObjectParameter::ComX, ObjectParameter::ComY, ObjectParameter::ComZ]
            .into_iter()
            .enumerate()
        {
            let bounds = &self.com_bounds[i];
            if bounds.is_empty() || !bounds.lower.is_finite() || !bounds.upper.is_finite() {
                return Err(empty(parameter, bounds));
            }
            if !bounds.contains(self.com[i]) {
                return Err(outside(parameter, self.com[i]));
            }
        }

        if self.radii_of_gyration.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(BalancingError::ParseError(format!(
                "radii of gyration of '{}' must be finite and non-negative", name
            )));
        }

        self.support_area.validate(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cup() -> BoundedBalancedObject {
        BoundedBalancedObject::new(0.5, Vector3::new(0.0, 0.0, 0.05), SupportArea::circle(0.03))
    }

    #[test]
    fn test_interval_basics() {
        let i = Interval::centered(1.0, 0.25);
        assert_eq!(i.lower, 0.75);
        assert_eq!(i.upper, 1.25);
        assert_eq!(i.width(), 0.5);
        assert!(i.contains(1.0));
        assert!(!i.is_empty());
        assert!(Interval::new(2.0, 1.0).is_empty());
        assert!(Interval::new(f64::NAN, 1.0).is_empty());
        assert!(Interval::point(3.0).is_point());
    }

    #[test]
    fn test_exact_object_has_no_uncertainty() {
        assert!(cup().uncertain_parameters(true).is_empty());
        assert!(cup().validate("cup").is_ok());
    }

    #[test]
    fn test_uncertain_parameters() {
        let object = cup()
            .with_mass_bounds(0.4, 0.6)
            .with_com_half_extents(Vector3::new(0.01, 0.0, 0.02));
        let parameters: Vec<_> = object.uncertain_parameters(true).into_iter().map(|(p, _)| p).collect();
        assert_eq!(parameters, vec![ObjectParameter::Mass, ObjectParameter::ComX, ObjectParameter::ComZ]);
        assert!(object.validate("cup").is_ok());
    }

    #[test]
    fn test_support_radius_is_uncertain_only_when_requested() {
        let mut object = cup();
        object.support_area = SupportArea::Circle { radius: Interval::new(0.02, 0.03) };
        assert_eq!(object.uncertain_parameters(true).len(), 1);
        assert!(object.uncertain_parameters(false).is_empty());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let object = cup().with_mass_bounds(0.6, 0.4);
        assert!(matches!(object.validate("cup"), Err(BalancingError::EmptyInterval { .. })));
    }

    #[test]
    fn test_nominal_outside_bounds_rejected() {
        let object = cup().with_mass_bounds(0.6, 0.8);
        assert!(matches!(object.validate("cup"), Err(BalancingError::NominalOutOfBounds { .. })));
    }

    #[test]
    fn test_rectangle_edges() {
        let edges = SupportArea::rectangle(0.1, 0.2).edges();
        assert_eq!(edges.len(), 4);
        // First edge runs from (0.1, 0.2) to (-0.1, 0.2): outward normal +y, offset 0.2
        assert!((edges[0].0 - Vector2::new(0.0, 1.0)).norm() < 1e-12);
        assert!((edges[0].1 - 0.2).abs() < 1e-12);
        for (normal, offset) in edges {
            assert!(offset > 0.0);
            assert!((normal.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_clockwise_polygon_rejected() {
        let mut object = cup();
        object.support_area = SupportArea::Polygon {
            vertices: vec![Vector2::new(0.0, 0.0), Vector2::new(0.0, 1.0), Vector2::new(1.0, 0.0)],
        };
        assert!(matches!(object.validate("cup"), Err(BalancingError::DegenerateSupportArea { .. })));
    }

    #[test]
    fn test_self_intersecting_polygon_rejected() {
        // Five-pointed star: every turn is to the left, but the boundary winds twice
        let star = (0..5)
            .map(|k| {
                let angle = (90.0 + 144.0 * k as f64).to_radians();
                Vector2::new(0.05 * angle.cos(), 0.05 * angle.sin())
            })
            .collect();
        let mut object = cup();
        object.support_area = SupportArea::Polygon { vertices: star };
        match object.validate("cup") {
            Err(BalancingError::DegenerateSupportArea { reason, .. }) => assert!(reason.contains("self-intersecting")),
            other => panic!("Expected self-intersecting footprint to be rejected, got {:?}", other),
        }

        // Same points in convex order are fine
        object.support_area = SupportArea::Polygon {
            vertices: (0..5)
                .map(|k| {
                    let angle = (90.0 + 72.0 * k as f64).to_radians();
                    Vector2::new(0.05 * angle.cos(), 0.05 * angle.sin())
                })
                .collect(),
        };
        assert!(object.validate("cup").is_ok());
    }

    #[test]
    fn test_triangle_is_valid() {
        let mut object = cup();
        object.support_area = SupportArea::equilateral_triangle(0.1);
        assert!(object.validate("cup").is_ok());
        assert_eq!(object.support_area.num_edges(), 3);
    }
}
