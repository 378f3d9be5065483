// ==============================================================================
// friction.rs — SLIP-CURVE TIRE FRICTION (LATERAL + LONGITUDINAL)
// ------------------------------------------------------------------------------
// Builds an orthonormal ground-relative frame from the contact normal and the
// steered rolling direction, projects the relative contact-point velocity onto
// it, and applies the same three-band slip curve on both axes:
//
//   |v| <  NO_SLIP_VEL             full coefficient
//   NO_SLIP_VEL <= |v| <= SLIP_VEL linear fade from 100% to SLIP_FACTOR
//   |v| >  SLIP_VEL                clamped at SLIP_FACTOR (skid)
//
// Below SMALL_VEL the coefficient additionally scales linearly with |v|, which
// kills the force-sign chatter a Coulomb model produces around standstill.
// The resulting force opposes slip and is proportional to the suspension
// normal load. Longitudinal force feeds a reaction torque back into the wheel
// spin, together with the grip-reference spin the integrator snaps to.
// ==============================================================================

use rapier3d::prelude::{Point, Real, Vector};

/// Slip speed below which the tire is considered gripping, m/s.
const NO_SLIP_VEL: Real = 0.2;
/// Slip speed above which the tire fully skids, m/s.
const SLIP_VEL: Real = 0.4;
/// Fraction of the nominal coefficient left when skidding.
const SLIP_FACTOR: Real = 0.7;
/// Band in which friction fades linearly toward zero, m/s.
const SMALL_VEL: Real = 3.0;

/// World-space velocity of a point rigidly attached to a body:
/// v(p) = v_com + w x (p - com)
#[inline]
pub fn point_velocity(
    linvel: Vector<Real>,
    angvel: Vector<Real>,
    com: Point<Real>,
    p: Point<Real>,
) -> Vector<Real> {
    linvel + angvel.cross(&(p.coords - com.coords))
}

/// Ground-relative frame at the contact: (left, forward). `None` when the
/// rolling direction is parallel to the normal (no tangent plane to act in).
#[inline]
pub fn ground_basis(
    normal: Vector<Real>,
    wheel_fwd: Vector<Real>,
) -> Option<(Vector<Real>, Vector<Real>)> {
    let mut left = normal.cross(&wheel_fwd);
    if left.norm_squared() < 1e-12 {
        return None;
    }
    left.normalize_mut();
    Some((left, left.cross(&normal)))
}

/// Signed, band-attenuated friction coefficient for one axis. The sign
/// opposes `slip_vel`; the caller multiplies by the (negative of the) normal
/// load.
#[inline]
pub fn slip_coefficient(nominal: Real, slip_vel: Real) -> Real {
    let abs = slip_vel.abs();
    let mut friction = nominal;

    if abs > SLIP_VEL {
        friction *= SLIP_FACTOR;
    } else if abs > NO_SLIP_VEL {
        friction *= 1.0 - (1.0 - SLIP_FACTOR) * (abs - NO_SLIP_VEL) / (SLIP_VEL - NO_SLIP_VEL);
    }

    if slip_vel < 0.0 {
        friction = -friction;
    }

    if abs < SMALL_VEL {
        friction *= abs / SMALL_VEL;
    }

    friction
}

pub struct FrictionOutput {
    /// Combined lateral + longitudinal force on the chassis, world space.
    pub force: Vector<Real>,
    /// Reaction torque on the wheel spin from the longitudinal force.
    pub spin_torque: Real,
    /// Spin implied by pure rolling at the hub's ground speed.
    pub grip_spin: Real,
}

/// `rel_vel` is the contact-point velocity of the tire rim relative to
/// whatever it touches (chassis point velocity + rim velocity - contacted
/// body velocity); `hub_vel` the chassis velocity at the wheel center, used
/// for the grip-reference spin.
pub fn compute_tire_friction(
    side_friction: Real,
    forward_friction: Real,
    radius: Real,
    normal: Vector<Real>,
    wheel_fwd: Vector<Real>,
    rel_vel: Vector<Real>,
    hub_vel: Vector<Real>,
    load: Real,
) -> Option<FrictionOutput> {
    let (left, forward) = ground_basis(normal, wheel_fwd)?;

    let side_vel = rel_vel.dot(&left);
    let fwd_vel = rel_vel.dot(&forward);

    let side_force = -slip_coefficient(side_friction, side_vel) * load;
    let fwd_force = -slip_coefficient(forward_friction, fwd_vel) * load;

    Some(FrictionOutput {
        force: side_force * left + fwd_force * forward,
        spin_torque: -fwd_force * radius,
        grip_spin: hub_vel.dot(&forward) / radius,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude::vector;

    #[test]
    fn slip_sign_symmetry() {
        for v in [0.05, 0.15, 0.3, 0.5, 2.0, 10.0] {
            let pos = slip_coefficient(3.2, v);
            let neg = slip_coefficient(3.2, -v);
            assert!((pos + neg).abs() < 1e-6, "asymmetric at {v}");
            assert!(pos > 0.0);
        }
    }

    #[test]
    fn slip_bands() {
        let nominal = 1.0;

        // Full skid, above the small-velocity band: flat SLIP_FACTOR.
        assert!((slip_coefficient(nominal, 10.0) - SLIP_FACTOR).abs() < 1e-6);

        // Mid band at 0.3 m/s: halfway between 1.0 and SLIP_FACTOR, then
        // attenuated by 0.3 / SMALL_VEL.
        let mid = slip_coefficient(nominal, 0.3);
        assert!((mid - 0.85 * (0.3 / SMALL_VEL)).abs() < 1e-6);

        // Grip band at 0.1 m/s: only the small-velocity attenuation.
        let grip = slip_coefficient(nominal, 0.1);
        assert!((grip - 0.1 / SMALL_VEL).abs() < 1e-6);

        // Standstill generates no force at all.
        assert_eq!(slip_coefficient(nominal, 0.0), 0.0);
    }

    #[test]
    fn force_opposes_slip() {
        let normal = vector![0.0, 1.0, 0.0];
        let fwd = vector![0.0, 0.0, -1.0];

        // Sliding purely forward: force must point backward.
        let out = compute_tire_friction(
            3.2,
            5.0,
            0.35,
            normal,
            fwd,
            fwd * 5.0,
            fwd * 5.0,
            1000.0,
        )
        .unwrap();
        assert!(out.force.dot(&fwd) < 0.0);
        assert!(out.force.dot(&normal).abs() < 1e-4);

        // Braking force spins the wheel up toward rolling.
        assert!(out.spin_torque > 0.0);
        assert!((out.grip_spin - 5.0 / 0.35).abs() < 1e-4);
    }

    #[test]
    fn lateral_slide_produces_pure_side_force() {
        let normal = vector![0.0, 1.0, 0.0];
        let fwd = vector![0.0, 0.0, -1.0];
        let (left, _) = ground_basis(normal, fwd).unwrap();

        let out = compute_tire_friction(
            3.2,
            5.0,
            0.35,
            normal,
            fwd,
            left * 4.0,
            vector![0.0, 0.0, 0.0],
            1000.0,
        )
        .unwrap();

        assert!(out.force.dot(&left) < 0.0);
        assert!(out.force.dot(&fwd).abs() < 1e-3);
        assert!(out.spin_torque.abs() < 1e-3);
    }

    #[test]
    fn force_negates_with_slip_direction() {
        let normal = vector![0.0, 1.0, 0.0];
        let fwd = vector![0.0, 0.0, -1.0];

        let ahead = compute_tire_friction(
            3.2, 5.0, 0.35, normal, fwd, fwd * 2.0, fwd * 2.0, 800.0,
        )
        .unwrap();
        let behind = compute_tire_friction(
            3.2, 5.0, 0.35, normal, fwd, fwd * -2.0, fwd * -2.0, 800.0,
        )
        .unwrap();

        assert!((ahead.force + behind.force).norm() < 1e-3);
        assert!((ahead.spin_torque + behind.spin_torque).abs() < 1e-3);
    }

    #[test]
    fn degenerate_basis_is_skipped() {
        // Rolling direction parallel to the normal: no tangent frame.
        let normal = vector![0.0, 1.0, 0.0];
        assert!(ground_basis(normal, normal).is_none());
        assert!(compute_tire_friction(
            3.2,
            5.0,
            0.35,
            normal,
            normal,
            vector![1.0, 0.0, 0.0],
            vector![1.0, 0.0, 0.0],
            1000.0
        )
        .is_none());
    }
}
