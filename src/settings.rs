//! Balancing settings: which constraints are active, the objects and their contacts.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bitflags::bitflags;

use crate::balancing_error::BalancingError;
use crate::bounded::{BoundedBalancedObject, SupportArea};
use crate::contact::{ContactBody, ContactPoint};
use crate::utils::{fmt_vector3, is_valid};

bitflags! {
    /// Constraint categories that can be enabled independently. The residual vector
    /// lists, per contact, the enabled categories in the order of these flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ConstraintCategories: u32 {
        /// Contact normal force must be non-negative (no separation)
        const NORMAL =   0b0000_0001;

        /// Tangential force within the friction cone (no slip)
        const FRICTION = 0b0000_0010;

        /// Center of pressure within the support area (no tipping)
        const TIPPING =  0b0000_0100;
    }
}

/// How the solver consumes the balancing residuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    /// Residuals enter a penalty cost
    Soft,
    /// Residuals are inequality constraints
    Hard,
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConstraintType::Soft => write!(f, "soft"),
            ConstraintType::Hard => write!(f, "hard"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalancingSettings {
    pub enabled: bool,
    pub constraints_enabled: ConstraintCategories,

    pub objects: BTreeMap<String, BoundedBalancedObject>,
    pub contacts: Vec<ContactPoint>,

    pub constraint_type: ConstraintType,

    /// Friction coefficient floor: contacts with a smaller coefficient use this one
    pub mu: f64,

    /// Smoothing margin of the friction and disc tipping residuals, also the temperature
    /// of the worst-case soft minimum
    pub delta: f64,
}

impl Default for BalancingSettings {
    fn default() -> Self {
        BalancingSettings {
            enabled: false,
            constraints_enabled: ConstraintCategories::all(),
            objects: BTreeMap::new(),
            contacts: Vec::new(),
            constraint_type: ConstraintType::Soft,
            mu: 1e-2,
            delta: 1e-3,
        }
    }
}

impl BalancingSettings {
    /// Enabled settings with a single object resting on the end effector.
    pub fn single_object(name: &str, object: BoundedBalancedObject, contact: ContactPoint) -> Self {
        let mut objects = BTreeMap::new();
        objects.insert(name.to_string(), object);
        BalancingSettings {
            enabled: true,
            objects,
            contacts: vec![contact],
            ..Default::default()
        }
    }

    /// Friction coefficient used for the given contact.
    pub fn effective_mu(&self, contact: &ContactPoint) -> f64 {
        contact.mu.max(self.mu)
    }

    /// Number of residuals contributed by one contact.
    pub fn constraints_per_contact(&self, contact: &ContactPoint) -> usize {
        let mut count = 0;
        if self.constraints_enabled.contains(ConstraintCategories::NORMAL) {
            count += 1;
        }
        if self.constraints_enabled.contains(ConstraintCategories::FRICTION) {
            count += 1;
        }
        if self.constraints_enabled.contains(ConstraintCategories::TIPPING) {
            count += self.objects.get(&contact.supported)
                .map(|o| o.support_area.num_edges())
                .unwrap_or(0);
        }
        count
    }

    /// Total number of residuals, zero when balancing is disabled.
    pub fn num_constraints(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        self.contacts.iter().map(|c| self.constraints_per_contact(c)).sum()
    }

    /// Checks every contact reference, bound and numerical parameter. Must pass before
    /// the settings are used by an evaluator.
    pub fn validate(&self) -> Result<(), BalancingError> {
        if !(self.mu >= 0.0) || !self.mu.is_finite() {
            return Err(BalancingError::NegativeFriction { contact: None, mu: self.mu });
        }
        if !(self.delta > 0.0) || !self.delta.is_finite() {
            return Err(BalancingError::NonPositiveDelta(self.delta));
        }

        for (name, object) in &self.objects {
            object.validate(name)?;
        }

        for (i, contact) in self.contacts.iter().enumerate() {
            let referenced = std::iter::once(contact.supported.as_str())
                .chain(contact.supporting.object_name());
            for name in referenced {
                if !self.objects.contains_key(name) {
                    return Err(BalancingError::UnknownObject { contact: i, name: name.to_string() });
                }
            }
            if !(contact.mu >= 0.0) || !contact.mu.is_finite() {
                return Err(BalancingError::NegativeFriction { contact: Some(i), mu: contact.mu });
            }
            if !contact.has_valid_normal() || !is_valid(contact.position.as_slice()) {
                return Err(BalancingError::ZeroNormal { contact: i });
            }
        }

        self.support_parents().map(|_| ())
    }

    /// Maps every supported object to the body that carries it. Fails if an object has
    /// more than one supporting contact, or if a support chain never reaches the end
    /// effector (loops, or ends at an object without a contact of its own).
    pub fn support_parents(&self) -> Result<HashMap<&str, &ContactBody>, BalancingError> {
        let mut parents: HashMap<&str, &ContactBody> = HashMap::new();
        for contact in &self.contacts {
            if parents.insert(contact.supported.as_str(), &contact.supporting).is_some() {
                return Err(BalancingError::DuplicateSupport { object: contact.supported.clone() });
            }
        }

        for &start in parents.keys() {
            let mut current: &str = start;
            let mut steps = 0;
            while let Some(ContactBody::Object(parent)) = parents.get(current) {
                current = parent.as_str();
                steps += 1;
                if steps > parents.len() {
                    return Err(BalancingError::SupportCycle { object: start.to_string() });
                }
            }
            if parents.get(current).is_none() {
                return Err(BalancingError::UnsupportedChain {
                    object: start.to_string(),
                    base: current.to_string(),
                });
            }
        }
        Ok(parents)
    }

    /// Names of the objects whose weight a contact carries: the supported object and
    /// everything stacked on top of it, in object map order.
    pub fn stack_on(&self, contact: &ContactPoint) -> Result<Vec<String>, BalancingError> {
        let parents = self.support_parents()?;
        let base = contact.supported.as_str();
        let stack = self.objects.keys()
            .filter(|name| {
                let mut current: &str = name.as_str();
                loop {
                    if current == base {
                        return true;
                    }
                    match parents.get(current) {
                        Some(ContactBody::Object(parent)) => current = parent.as_str(),
                        _ => return false,
                    }
                }
            })
            .cloned()
            .collect();
        Ok(stack)
    }

    /// Convert to string yaml representation (quick viewing, etc).
    pub fn to_yaml(&self) -> String {
        let mut out = String::new();
        out.push_str("balancing:\n");
        out.push_str(&format!("  enabled: {}\n", self.enabled));
        out.push_str(&format!(
            "  constraints_enabled: {{ normal: {}, friction: {}, tipping: {} }}\n",
            self.constraints_enabled.contains(ConstraintCategories::NORMAL),
            self.constraints_enabled.contains(ConstraintCategories::FRICTION),
            self.constraints_enabled.contains(ConstraintCategories::TIPPING),
        ));
        out.push_str(&format!("  constraint_type: {}\n", self.constraint_type));
        out.push_str(&format!("  mu: {}\n  delta: {}\n", self.mu, self.delta));
        out.push_str("  objects:\n");
        for (name, o) in &self.objects {
            out.push_str(&format!("    {}:\n", name));
            out.push_str(&format!("      mass: {}\n", o.mass));
            out.push_str(&format!("      mass_bounds: [{}, {}]\n", o.mass_bounds.lower, o.mass_bounds.upper));
            out.push_str(&format!("      com: {}\n", fmt_vector3(&o.com)));
            out.push_str(&format!(
                "      com_bounds: [{}]\n",
                o.com_bounds.iter()
                    .map(|i| format!("[{}, {}]", i.lower, i.upper))
                    .collect::<Vec<_>>().join(", ")
            ));
            out.push_str(&format!("      radii_of_gyration: {}\n", fmt_vector3(&o.radii_of_gyration)));
            match &o.support_area {
                SupportArea::Polygon { vertices } => out.push_str(&format!(
                    "      support: {{ polygon: [{}] }}\n",
                    vertices.iter()
                        .map(|v| format!("[{}, {}]", v.x, v.y))
                        .collect::<Vec<_>>().join(", ")
                )),
                SupportArea::Circle { radius } => out.push_str(&format!(
                    "      support: {{ circle: [{}, {}] }}\n", radius.lower, radius.upper
                )),
            }
        }
        out.push_str("  contacts:\n");
        for c in &self.contacts {
            out.push_str(&format!("    - supporting: {}\n", c.supporting));
            out.push_str(&format!("      supported: {}\n", c.supported));
            out.push_str(&format!("      mu: {}\n", c.mu));
            out.push_str(&format!("      normal: {}\n", fmt_vector3(&c.normal)));
            out.push_str(&format!("      position: {}\n", fmt_vector3(&c.position)));
        }
        out
    }
}

impl fmt::Display for BalancingSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "BalancingSettings")?;
        writeln!(f, "enabled = {}", self.enabled)?;
        writeln!(f, "normal_enabled = {}", self.constraints_enabled.contains(ConstraintCategories::NORMAL))?;
        writeln!(f, "friction_enabled = {}", self.constraints_enabled.contains(ConstraintCategories::FRICTION))?;
        writeln!(f, "tipping_enabled = {}", self.constraints_enabled.contains(ConstraintCategories::TIPPING))?;
        writeln!(f, "constraint_type = {}", self.constraint_type)?;
        writeln!(f, "mu = {}", self.mu)?;
        writeln!(f, "delta = {}", self.delta)?;
        writeln!(f, "num_objects = {}", self.objects.len())?;
        for (name, o) in &self.objects {
            writeln!(f, "  {}: mass = [{}, {}], com = {}, support edges = {}",
                     name, o.mass_bounds.lower, o.mass_bounds.upper,
                     fmt_vector3(&o.com), o.support_area.num_edges())?;
        }
        writeln!(f, "num_contacts = {}", self.contacts.len())?;
        for c in &self.contacts {
            writeln!(f, "  {} -> {}: mu = {}, normal = {}, position = {}",
                     c.supporting, c.supported, c.mu,
                     fmt_vector3(&c.normal), fmt_vector3(&c.position))?;
        }
        Ok(())
    }
}
