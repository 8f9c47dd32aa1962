#[cfg(test)]
mod tests {
    extern crate rand;

    use std::sync::Arc;

    use nalgebra::{DVector, Vector3};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::balancing_constraints::BoundedBalancingConstraints;
    use crate::balancing_error::BalancingError;
    use crate::bounded::{BoundedBalancedObject, Interval, SupportArea};
    use crate::contact::{ContactBody, ContactPoint};
    use crate::floating_end_effector::FloatingEndEffector;
    use crate::kinematic_traits::Drivetrain;
    use crate::penalty::BalancingTerm;
    use crate::settings::{BalancingSettings, ConstraintCategories, ConstraintType};
    use crate::tests::test_utils::{accelerating, at_rest, build, gravity, random_object, tray_and_cup, G};

    /// 1 kg on the end effector, friction 0.3, normal force and friction only.
    fn one_kilogram() -> BalancingSettings {
        let object = BoundedBalancedObject::new(1.0, Vector3::new(0.0, 0.0, 0.1), SupportArea::rectangle(0.1, 0.1));
        let mut settings = BalancingSettings::single_object(
            "box", object, ContactPoint::on_end_effector("box", 0.3, Vector3::zeros()));
        settings.constraints_enabled = ConstraintCategories::NORMAL | ConstraintCategories::FRICTION;
        settings
    }

    #[test]
    fn test_one_kilogram_at_rest() {
        let constraints = build(one_kilogram(), Drivetrain::DoubleIntegrator);
        let (x, u) = at_rest(&constraints);
        let h = constraints.value(0.0, &x, &u).unwrap();
        assert_eq!(h.len(), 2);
        assert!(h.iter().all(|r| *r >= 0.0));
        assert!((h[0] - G).abs() < 1e-9, "normal force {}", h[0]);
        assert!((h[1] - (0.3 * G - 1e-3)).abs() < 1e-9, "friction {}", h[1]);
    }

    #[test]
    fn test_count_equals_enabled_combinations() {
        let settings = tray_and_cup();
        // tray: normal + friction + 4 edges, cup: normal + friction + disc
        let constraints = build(settings.clone(), Drivetrain::DoubleIntegrator);
        assert_eq!(constraints.num_constraints(), 9);

        for (categories, expected) in [
            (ConstraintCategories::NORMAL, 2),
            (ConstraintCategories::FRICTION | ConstraintCategories::TIPPING, 7),
            (ConstraintCategories::TIPPING, 5),
            (ConstraintCategories::empty(), 0),
        ] {
            let mut s = settings.clone();
            s.constraints_enabled = categories;
            let constraints = build(s, Drivetrain::DoubleIntegrator);
            assert_eq!(constraints.num_constraints(), expected);
            let (x, u) = at_rest(&constraints);
            assert_eq!(constraints.value(0.0, &x, &u).unwrap().len(), expected);
        }

        let disabled = BalancingSettings { enabled: false, ..settings };
        let constraints = build(disabled, Drivetrain::DoubleIntegrator);
        assert_eq!(constraints.num_constraints(), 0);
        let (x, u) = at_rest(&constraints);
        assert_eq!(constraints.value(0.0, &x, &u).unwrap().len(), 0);
    }

    #[test]
    fn test_count_stable_across_calls_and_clones() {
        let constraints = build(tray_and_cup(), Drivetrain::TripleIntegrator);
        let clone = constraints.clone();
        for ax in [0.0, 1.0, -3.0, 20.0] {
            let (x, u) = accelerating(&constraints, Vector3::new(ax, 0.5 * ax, 0.0));
            for time in [0.0, 1.5, 100.0] {
                assert_eq!(constraints.num_constraints_at(time), 9);
                assert_eq!(clone.num_constraints_at(time), 9);
                assert_eq!(constraints.value(time, &x, &u).unwrap().len(), 9);
            }
        }
    }

    #[test]
    fn test_random_objects_feasible_at_rest() {
        let mut rng = StdRng::seed_from_u64(42);
        for case in 0..100 {
            let base = random_object(&mut rng, 0.0);
            // The second object sits centered, so the stack stays within the base footprint
            let mut top = random_object(&mut rng, base.com_bounds[2].upper);
            top.com.x = 0.0;
            top.com.y = 0.0;
            top.com_bounds[0] = Interval::point(0.0);
            top.com_bounds[1] = Interval::point(0.0);
            let mut settings = BalancingSettings::single_object(
                "base", base, ContactPoint::on_end_effector("base", 0.1 + 0.5 * (case as f64) / 100.0, Vector3::zeros()));

            // Every other case stacks a second object on the first
            if case % 2 == 0 {
                let height = settings.objects["base"].com_bounds[2].upper;
                settings.objects.insert("top".to_string(), top);
                settings.contacts.push(ContactPoint::new(
                    ContactBody::Object("base".to_string()), "top", 0.4, Vector3::z(),
                    Vector3::new(0.0, 0.0, height)));
            }

            for drivetrain in [Drivetrain::DoubleIntegrator, Drivetrain::TripleIntegrator] {
                let constraints = build(settings.clone(), drivetrain);
                let (x, u) = at_rest(&constraints);
                let h = constraints.value(0.0, &x, &u).unwrap();
                assert_eq!(h.len(), constraints.num_constraints());
                assert!(h.iter().all(|r| *r >= 0.0), "case {}: {:?}\n{}", case, h.as_slice(), settings);
            }
        }
    }

    #[test]
    fn test_friction_decreases_with_horizontal_acceleration() {
        let constraints = build(one_kilogram(), Drivetrain::DoubleIntegrator);
        let mut previous = f64::INFINITY;
        for step in 0..=20 {
            let a = 0.25 * step as f64;
            let (x, u) = accelerating(&constraints, Vector3::new(a, 0.0, 0.0));
            let friction = constraints.value(0.0, &x, &u).unwrap()[1];
            assert!(friction < previous, "a = {}: {} not below {}", a, friction, previous);
            previous = friction;
        }
        // Beyond mu * g the box slides
        assert!(previous < 0.0);

        // Same in any horizontal direction
        let (x, u) = accelerating(&constraints, Vector3::new(-3.0, -3.0, 0.0));
        assert!(constraints.value(0.0, &x, &u).unwrap()[1] < 0.0);
    }

    #[test]
    fn test_upward_acceleration_helps_and_free_fall_separates() {
        let constraints = build(one_kilogram(), Drivetrain::DoubleIntegrator);
        let (x, u) = accelerating(&constraints, Vector3::new(0.0, 0.0, 2.0));
        let h = constraints.value(0.0, &x, &u).unwrap();
        assert!((h[0] - (G + 2.0)).abs() < 1e-9);

        // Accelerating down faster than gravity pulls the box off the end effector
        let (x, u) = accelerating(&constraints, Vector3::new(0.0, 0.0, -G - 1.0));
        let h = constraints.value(0.0, &x, &u).unwrap();
        assert!(h[0] < 0.0);
    }

    #[test]
    fn test_hand_computed_residuals_under_acceleration() {
        let mut settings = one_kilogram();
        settings.constraints_enabled = ConstraintCategories::all();
        let m = 1.0;
        let h_com = 0.1;
        let constraints = build(settings, Drivetrain::DoubleIntegrator);
        let (ax, ay, az) = (1.5, -0.5, 0.7);
        let (x, u) = accelerating(&constraints, Vector3::new(ax, ay, az));
        let h = constraints.value(0.0, &x, &u).unwrap();

        let f_n = m * (G + az);
        assert!((h[0] - f_n).abs() < 1e-9);
        let f_t = (m * m * (ax * ax + ay * ay) + 1e-6).sqrt();
        assert!((h[1] - (0.3 * f_n - f_t)).abs() < 1e-9);
        // Center of pressure offset is -h * a_t / (g + a_z); edges +y, -x, -y, +x
        let cop = Vector3::new(-h_com * ax, -h_com * ay, 0.0) * (m / f_n);
        let expected = [0.1 - cop.y, 0.1 + cop.x, 0.1 + cop.y, 0.1 - cop.x];
        for (k, e) in expected.iter().enumerate() {
            assert!((h[2 + k] - e * f_n).abs() < 1e-9, "edge {}: {} vs {}", k, h[2 + k], e * f_n);
        }
    }

    /// Level end effector at rest apart from the given world-frame angular velocity
    /// and angular acceleration (double integrator layout).
    fn rotating(constraints: &BoundedBalancingConstraints<FloatingEndEffector>,
                omega: Vector3<f64>, alpha: Vector3<f64>) -> (DVector<f64>, DVector<f64>) {
        let (mut x, mut u) = at_rest(constraints);
        x.rows_mut(9, 3).copy_from(&omega);
        u.rows_mut(3, 3).copy_from(&alpha);
        (x, u)
    }

    fn single_box(mass: f64, com: Vector3<f64>, radii: Vector3<f64>) -> BalancingSettings {
        let object = BoundedBalancedObject::new(mass, com, SupportArea::rectangle(0.1, 0.1))
            .with_radii_of_gyration(radii);
        BalancingSettings::single_object("box", object, ContactPoint::on_end_effector("box", 0.5, Vector3::zeros()))
    }

    #[test]
    fn test_yaw_rate_requires_centripetal_friction() {
        let (m, r_x, h_com, w) = (1.2, 0.03, 0.08, 2.0);
        let settings = single_box(m, Vector3::new(r_x, 0.0, h_com), Vector3::new(0.04, 0.04, 0.05));
        let delta = settings.delta;
        let constraints = build(settings, Drivetrain::DoubleIntegrator);
        let (x, u) = rotating(&constraints, Vector3::new(0.0, 0.0, w), Vector3::zeros());
        let h = constraints.value(0.0, &x, &u).unwrap();

        // Specific force (-w² r_x, 0, g): the support pulls the box toward the axis
        let f_n = m * G;
        let centripetal = m * w * w * r_x;
        assert!((h[0] - f_n).abs() < 1e-9);
        assert!((h[1] - (0.5 * f_n - (centripetal * centripetal + delta * delta).sqrt())).abs() < 1e-9);

        // Spin about the principal z axis adds no torque. The center of pressure moves
        // outward by r_x (g + h w²) / g; edges +y, -x, -y, +x
        let tilt = m * r_x * (G + h_com * w * w);
        let expected = [0.1 * f_n, 0.1 * f_n + tilt, 0.1 * f_n, 0.1 * f_n - tilt];
        for (k, e) in expected.iter().enumerate() {
            assert!((h[2 + k] - e).abs() < 1e-9, "edge {}: {} vs {}", k, h[2 + k], e);
        }
    }

    #[test]
    fn test_angular_acceleration_with_inertia() {
        let (m, h_com, a) = (0.8, 0.06, 3.0);
        let radii = Vector3::new(0.05, 0.04, 0.03);
        let settings = single_box(m, Vector3::new(0.0, 0.0, h_com), radii);
        let delta = settings.delta;
        let constraints = build(settings, Drivetrain::DoubleIntegrator);
        let (x, u) = rotating(&constraints, Vector3::zeros(), Vector3::new(a, 0.0, 0.0));
        let h = constraints.value(0.0, &x, &u).unwrap();

        // α × c = (0, -a h, 0)
        let f_n = m * G;
        let f_t = m * a * h_com;
        assert!((h[0] - f_n).abs() < 1e-9);
        assert!((h[1] - (0.5 * f_n - (f_t * f_t + delta * delta).sqrt())).abs() < 1e-9);

        // Moment about x: m a h² from the offset force plus m kx² a from the rotational
        // inertia. It shifts the center of pressure along +y.
        let moment = m * a * (h_com * h_com + radii.x * radii.x);
        let expected = [0.1 * f_n - moment, 0.1 * f_n, 0.1 * f_n + moment, 0.1 * f_n];
        for (k, e) in expected.iter().enumerate() {
            assert!((h[2 + k] - e).abs() < 1e-9, "edge {}: {} vs {}", k, h[2 + k], e);
        }
    }

    #[test]
    fn test_stacked_object_loads_lower_contact() {
        let (tray_mass, cup_mass, cup_radius) = (0.5, 0.3, 0.035);
        let tray_com = Vector3::new(0.0, 0.0, 0.01);
        let cup_com = Vector3::new(0.02, 0.0, 0.08);
        let cup_contact = Vector3::new(0.02, 0.0, 0.02);
        let tray = BoundedBalancedObject::new(tray_mass, tray_com, SupportArea::rectangle(0.15, 0.1));
        let cup = BoundedBalancedObject::new(cup_mass, cup_com, SupportArea::circle(cup_radius));
        let mut settings = BalancingSettings::single_object(
            "tray", tray, ContactPoint::on_end_effector("tray", 0.5, Vector3::zeros()));
        settings.objects.insert("cup".to_string(), cup);
        settings.contacts.push(ContactPoint::new(
            ContactBody::Object("tray".to_string()), "cup", 0.3, Vector3::z(), cup_contact));
        let delta = settings.delta;

        let constraints = build(settings, Drivetrain::DoubleIntegrator);
        let a = 2.0;
        let (x, u) = accelerating(&constraints, Vector3::new(a, 0.0, 0.0));
        let h = constraints.value(0.0, &x, &u).unwrap();
        assert_eq!(h.len(), 9);

        // Pressure moment along x about a contact point p: Σ m (c_x - p_x) g - (c_z - p_z) a
        let pressure = |p: Vector3<f64>, objects: &[(f64, Vector3<f64>)]| -> f64 {
            objects.iter().map(|(m, c)| m * ((c.x - p.x) * G - (c.z - p.z) * a)).sum()
        };

        // Tray contact carries both objects
        let both = [(tray_mass, tray_com), (cup_mass, cup_com)];
        let f_n = (tray_mass + cup_mass) * G;
        let f_t = (tray_mass + cup_mass) * a;
        let p = pressure(Vector3::zeros(), &both);
        assert!((p - pressure(Vector3::zeros(), &both[..1])).abs() > 1e-3);
        assert!((h[0] - f_n).abs() < 1e-9);
        assert!((h[1] - (0.5 * f_n - (f_t * f_t + delta * delta).sqrt())).abs() < 1e-9);
        let expected = [0.1 * f_n, 0.15 * f_n + p, 0.1 * f_n, 0.15 * f_n - p];
        for (k, e) in expected.iter().enumerate() {
            assert!((h[2 + k] - e).abs() < 1e-9, "tray edge {}: {} vs {}", k, h[2 + k], e);
        }

        // Cup contact carries the cup only
        let f_n = cup_mass * G;
        let p = pressure(cup_contact, &[(cup_mass, cup_com)]);
        assert!((h[6] - f_n).abs() < 1e-9);
        assert!((h[8] - (cup_radius * f_n - (p * p + delta * delta).sqrt())).abs() < 1e-9);
    }

    #[test]
    fn test_zero_width_bounds_equal_point_evaluation() {
        let exact = BoundedBalancedObject::new(0.8, Vector3::new(0.01, -0.02, 0.06), SupportArea::circle(0.04));
        let mut degenerate = exact.clone()
            .with_mass_bounds(0.8, 0.8)
            .with_com_half_extents(Vector3::zeros());
        degenerate.support_area = SupportArea::Circle { radius: Interval::new(0.04, 0.04) };

        let contact = ContactPoint::on_end_effector("cup", 0.4, Vector3::zeros());
        let a = build(BalancingSettings::single_object("cup", exact, contact.clone()), Drivetrain::DoubleIntegrator);
        let b = build(BalancingSettings::single_object("cup", degenerate, contact), Drivetrain::DoubleIntegrator);
        assert_eq!(b.compiled().num_vertices(), 2);

        for acceleration in [Vector3::zeros(), Vector3::new(1.0, 2.0, -1.0), Vector3::new(-4.0, 0.0, 3.0)] {
            let (x, u) = accelerating(&a, acceleration);
            assert_eq!(a.value(0.0, &x, &u).unwrap(), b.value(0.0, &x, &u).unwrap());
        }
    }

    #[test]
    fn test_clone_shares_compiled_and_matches() {
        let constraints = build(tray_and_cup(), Drivetrain::DoubleIntegrator);
        let clone = constraints.clone();
        assert!(Arc::ptr_eq(constraints.compiled(), clone.compiled()));
        assert_eq!(constraints.compiled().build_id(), clone.compiled().build_id());

        let x = DVector::from_vec(vec![0.1, 0.2, 1.0, 0.05, -0.1, 0.3, 0.2, 0.0, -0.1, 0.3, 0.1, -0.2]);
        let u = DVector::from_vec(vec![1.0, -2.0, 0.5, 0.2, 0.1, -0.3]);
        assert_eq!(constraints.value(0.0, &x, &u).unwrap(), clone.value(0.0, &x, &u).unwrap());
        assert_eq!(constraints.linear_approximation(0.0, &x, &u).unwrap(),
                   clone.linear_approximation(0.0, &x, &u).unwrap());

        // A clone of a clone still shares the same build
        let second = clone.clone();
        assert!(Arc::ptr_eq(constraints.compiled(), second.compiled()));
    }

    #[test]
    fn test_construction_failures() {
        let g = gravity();
        let ee = FloatingEndEffector::new(Drivetrain::DoubleIntegrator);
        let check = |settings: BalancingSettings| {
            BoundedBalancingConstraints::new(ee, settings, g).map(|_| ())
        };

        let mut dangling = tray_and_cup();
        dangling.contacts[1].supported = "saucer".to_string();
        assert!(matches!(check(dangling), Err(BalancingError::UnknownObject { contact: 1, .. })));

        let mut floating = tray_and_cup();
        floating.contacts.remove(0);
        assert!(matches!(check(floating), Err(BalancingError::UnsupportedChain { .. })));

        let mut inverted = tray_and_cup();
        if let Some(cup) = inverted.objects.get_mut("cup") {
            cup.com_bounds[2] = Interval::new(0.1, 0.05);
        }
        assert!(matches!(check(inverted), Err(BalancingError::EmptyInterval { .. })));

        let negative_mu = BalancingSettings { mu: -0.01, ..tray_and_cup() };
        assert!(matches!(check(negative_mu), Err(BalancingError::NegativeFriction { contact: None, .. })));

        let zero_delta = BalancingSettings { delta: 0.0, ..tray_and_cup() };
        assert!(matches!(check(zero_delta), Err(BalancingError::NonPositiveDelta(_))));
        let negative_delta = BalancingSettings { delta: -1.0, ..tray_and_cup() };
        assert!(matches!(check(negative_delta), Err(BalancingError::NonPositiveDelta(_))));

        // Disabled settings are validated as well
        let disabled = BalancingSettings { enabled: false, delta: 0.0, ..tray_and_cup() };
        assert!(check(disabled).is_err());
    }

    #[test]
    fn test_balancing_term_follows_constraint_type() {
        let soft = build(tray_and_cup(), Drivetrain::DoubleIntegrator);
        assert!(BalancingTerm::from_settings(soft).is_soft());

        let settings = BalancingSettings { constraint_type: ConstraintType::Hard, ..tray_and_cup() };
        let hard = BalancingTerm::from_settings(build(settings, Drivetrain::DoubleIntegrator));
        assert!(!hard.is_soft());
        assert_eq!(hard.constraints().num_constraints(), 9);
    }

    #[test]
    fn test_soft_cost_grows_when_sliding() {
        let settings = BalancingSettings { mu: 0.05, delta: 0.01, ..one_kilogram() };
        let term = BalancingTerm::from_settings(build(settings, Drivetrain::DoubleIntegrator));
        let BalancingTerm::Soft(soft) = &term else {
            panic!("expected a soft balancing term");
        };
        let (x0, u0) = at_rest(&soft.constraints);
        let (x1, u1) = accelerating(&soft.constraints, Vector3::new(4.0, 0.0, 0.0));
        let resting = soft.cost(0.0, &x0, &u0).unwrap();
        let sliding = soft.cost(0.0, &x1, &u1).unwrap();
        assert!(sliding > resting);

        // Gradient of the penalty pushes the input acceleration back toward zero
        let approximation = soft.cost_approximation(0.0, &x1, &u1).unwrap();
        assert!((approximation.value - sliding).abs() < 1e-12);
        assert!(approximation.dfdu[0] > 0.0);
        assert_eq!(approximation.dfduu.shape(), (6, 6));
    }
}
