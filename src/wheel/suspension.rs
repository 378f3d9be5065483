// ==============================================================================
// suspension.rs — SPRING + DAMPER ALONG THE WHEEL UP AXIS
// ------------------------------------------------------------------------------
// Converts the probe's parametric hit fraction into clamped suspension
// displacement and a spring-damper force magnitude:
//
//   displacement = clamp(ray_len * (1 - fraction), 0, travel)
//   spring       = displacement * k * max(0, dot(ground_normal, wheel_up))
//   damper       = ((displacement - prev) / dt) * c
//   total        = max(0, spring + damper)
//
// The normal/up dot product shrinks the push on near-grazing slope contacts;
// it is clamped at zero so an overturned chassis is never pulled toward the
// surface. The suspension pushes only, it cannot generate suction.
// ==============================================================================

use rapier3d::prelude::Real;

use crate::wheel::types::WheelSpec;

pub struct SuspensionForce {
    /// Force magnitude along the wheel up axis, >= 0.
    pub magnitude: Real,
    /// New clamped displacement, within [0, travel].
    pub displacement: Real,
}

/// `prev_displacement` is `None` on the first tick after regaining contact,
/// which zeroes the damper for that tick instead of producing a spike from a
/// stale displacement.
pub fn compute_suspension_force(
    spec: &WheelSpec,
    fraction: Real,
    prev_displacement: Option<Real>,
    normal_dot_up: Real,
    dt: Real,
) -> SuspensionForce {
    let displacement = (spec.ray_length() * (1.0 - fraction)).clamp(0.0, spec.travel);

    let spring = displacement * spec.spring * normal_dot_up.max(0.0);

    let prev = prev_displacement.unwrap_or(displacement);
    let damper = ((displacement - prev) / dt) * spec.damping;

    SuspensionForce {
        magnitude: (spring + damper).max(0.0),
        displacement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude::point;

    fn spec() -> WheelSpec {
        WheelSpec {
            debug_id: "RL".to_string(),
            mount: point![-0.8, -0.3, 1.5],
            radius: 0.35,
            travel: 0.25,
            spring: 30_000.0,
            damping: 2_500.0,
            side_friction: 3.2,
            forward_friction: 5.0,
            ray_count: 1,
            max_spin: 200.0,
            inertia: 2.5,
            drive: true,
            steer: false,
        }
    }

    const DT: Real = 1.0 / 60.0;

    #[test]
    fn spring_force_grows_with_displacement() {
        let s = spec();
        // Identical ticks, damping zeroed via prev == new; smaller fraction
        // means deeper penetration and must mean strictly more force.
        let shallow = compute_suspension_force(&s, 0.95, None, 1.0, DT);
        let deep = compute_suspension_force(&s, 0.85, None, 1.0, DT);
        assert!(shallow.displacement < deep.displacement);
        assert!(shallow.magnitude < deep.magnitude);
    }

    #[test]
    fn displacement_clamped_to_travel() {
        let s = spec();
        let bottomed = compute_suspension_force(&s, 0.0, None, 1.0, DT);
        assert!((bottomed.displacement - s.travel).abs() < 1e-6);
        assert!((bottomed.magnitude - s.travel * s.spring).abs() < 1e-3);
    }

    #[test]
    fn first_contact_has_no_damping_spike() {
        let s = spec();
        let f = compute_suspension_force(&s, 0.9, None, 1.0, DT);
        // prev == new: pure spring.
        assert!((f.magnitude - f.displacement * s.spring).abs() < 1e-3);
    }

    #[test]
    fn rebound_damping_cannot_turn_into_suction() {
        let s = spec();
        // Fast extension: damper dominates the spring, total clamps to zero.
        let f = compute_suspension_force(&s, 0.99, Some(s.travel), 1.0, DT);
        assert_eq!(f.magnitude, 0.0);
    }

    #[test]
    fn grazing_contact_scales_spring_down() {
        let s = spec();
        let square = compute_suspension_force(&s, 0.9, None, 1.0, DT);
        let grazing = compute_suspension_force(&s, 0.9, None, 0.2, DT);
        assert!(grazing.magnitude < square.magnitude);
        assert!((grazing.magnitude - square.magnitude * 0.2).abs() < 1e-3);
    }

    #[test]
    fn inverted_contact_pushes_nothing() {
        let s = spec();
        // Wheel axis pointing away from the surface: the clamp keeps the
        // spring from flipping into an attractive force.
        let f = compute_suspension_force(&s, 0.9, None, -0.5, DT);
        assert_eq!(f.magnitude, 0.0);
    }

    #[test]
    fn compression_speed_adds_damping() {
        let s = spec();
        let still = compute_suspension_force(&s, 0.9, Some(0.0), 1.0, DT);
        let expected_disp = still.displacement;
        // Compressing from 0 to `expected_disp` in one tick.
        assert!(
            (still.magnitude
                - (expected_disp * s.spring + expected_disp / DT * s.damping))
                .abs()
                < 1e-2
        );
    }
}
