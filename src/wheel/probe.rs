// ==============================================================================
// probe.rs — RAY-FAN GROUND PROBE
// ------------------------------------------------------------------------------
// Casts the per-wheel suspension ray fan against the scene and selects the
// authoritative contact:
// - ray_count rays, spread forward along the wheel's rolling direction and
//   lifted along a cosine tire-curvature profile, so the fan approximates
//   contact across the tire circumference instead of a single point under
//   the hub
// - among all hits with parametric fraction <= 1.0 the DEEPEST one (smallest
//   fraction) wins; shallow edge hits must not dominate the spring response
// - the vehicle's own body is excluded from hit candidates
//
// Query state is passed in explicitly via ProbeContext; this module holds no
// ambient state and does not mutate the engine.
// ==============================================================================

use rapier3d::prelude::{
    ColliderSet, Point, QueryFilter, QueryPipeline, Ray, Real, RigidBodyHandle, RigidBodySet,
    Vector,
};

use crate::wheel::types::{ContactSample, WheelSpec};

/// Engine-side read-only query state for one probe call.
pub struct ProbeContext<'a> {
    pub query: &'a QueryPipeline,
    pub bodies: &'a RigidBodySet,
    pub colliders: &'a ColliderSet,
    /// Chassis body, excluded from hit candidates.
    pub exclude: RigidBodyHandle,
}

pub struct ProbeResult {
    pub sample: Option<ContactSample>,
    /// A ray reported a hit on a collider that no longer resolves. The wheel
    /// treats this as airborne; the caller decides whether to log it.
    pub stale_hit: bool,
}

/// Cast the suspension ray fan for one wheel.
///
/// `center` is the hub position in world space, `axis_up` the wheel's vertical
/// axis, `wheel_fwd`/`wheel_up` the steered rolling frame used to spread the
/// fan.
pub fn probe(
    ctx: &ProbeContext<'_>,
    spec: &WheelSpec,
    center: Point<Real>,
    axis_up: Vector<Real>,
    wheel_fwd: Vector<Real>,
    wheel_up: Vector<Real>,
) -> ProbeResult {
    let ray_len = spec.ray_length();

    let ray_end = center - spec.radius * axis_up;
    let ray_origin = ray_end + ray_len * axis_up;
    let dir = -axis_up;

    let filter = QueryFilter::default().exclude_rigid_body(ctx.exclude);

    // Spread rays forward across the tire diameter; the cosine lift keeps
    // each ray's start point on the tire circumference.
    let delta_fwd = 2.0 * spec.radius / (spec.ray_count + 1) as Real;

    let mut deepest: Option<ContactSample> = None;
    let mut stale_hit = false;

    for i in 0..spec.ray_count {
        let dist_fwd = delta_fwd * (i + 1) as Real - spec.radius;
        let lift = spec.radius
            * (1.0 - (core::f64::consts::FRAC_PI_2 as Real * (dist_fwd / spec.radius)).cos());

        let origin = ray_origin + dist_fwd * wheel_fwd + lift * wheel_up;
        let ray = Ray::new(origin, dir);

        let Some((collider_handle, hit)) =
            ctx.query
                .cast_ray_and_get_normal(ctx.bodies, ctx.colliders, &ray, ray_len, true, filter)
        else {
            continue;
        };

        let Some(collider) = ctx.colliders.get(collider_handle) else {
            stale_hit = true;
            continue;
        };

        let fraction = hit.time_of_impact / ray_len;
        if fraction > 1.0 {
            continue;
        }

        if deepest.map_or(true, |best| fraction < best.fraction) {
            deepest = Some(ContactSample {
                fraction,
                point: origin + dir * hit.time_of_impact,
                normal: hit.normal,
                body: collider.parent(),
            });
        }
    }

    ProbeResult { sample: deepest, stale_hit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude::*;

    /// Flat static ground slab with its top face at y = 0, plus a dynamic
    /// chassis body the probe must ignore.
    fn ground_world() -> (RigidBodySet, ColliderSet, QueryPipeline, RigidBodyHandle) {
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        let ground = bodies.insert(RigidBodyBuilder::fixed().translation(vector![0.0, -1.0, 0.0]));
        colliders.insert_with_parent(ColliderBuilder::cuboid(100.0, 1.0, 100.0), ground, &mut bodies);

        let chassis = bodies.insert(
            RigidBodyBuilder::dynamic().translation(vector![0.0, 0.8, 0.0]),
        );
        colliders.insert_with_parent(ColliderBuilder::cuboid(1.0, 0.35, 2.0), chassis, &mut bodies);

        let mut query = QueryPipeline::new();
        query.update(&colliders);

        (bodies, colliders, query, chassis)
    }

    fn spec(ray_count: u32) -> WheelSpec {
        WheelSpec {
            debug_id: "FL".to_string(),
            mount: point![0.0, 0.0, 0.0],
            radius: 0.35,
            travel: 0.25,
            spring: 30_000.0,
            damping: 2_500.0,
            side_friction: 3.2,
            forward_friction: 5.0,
            ray_count,
            max_spin: 200.0,
            inertia: 2.5,
            drive: false,
            steer: false,
        }
    }

    fn frame() -> (Vector<Real>, Vector<Real>, Vector<Real>) {
        let up = vector![0.0, 1.0, 0.0];
        let fwd = vector![0.0, 0.0, -1.0];
        let wheel_up = fwd.cross(&up.cross(&fwd));
        (up, fwd, wheel_up)
    }

    #[test]
    fn hits_flat_ground() {
        let (bodies, colliders, query, chassis) = ground_world();
        let ctx = ProbeContext { query: &query, bodies: &bodies, colliders: &colliders, exclude: chassis };

        let (up, fwd, wheel_up) = frame();
        // Hub at y = 0.25: tire bottom 0.10 below the surface, ray origin at
        // 0.85, so the center ray hits at fraction 0.85 / 0.95.
        let result = probe(&ctx, &spec(1), point![3.0, 0.25, 0.0], up, fwd, wheel_up);
        let sample = result.sample.expect("wheel over flat ground must contact");

        assert!(!result.stale_hit);
        assert!((sample.fraction - 0.85 / 0.95).abs() < 1e-4);
        assert!((sample.normal - vector![0.0, 1.0, 0.0]).norm() < 1e-4);
        assert!(sample.point.y.abs() < 1e-4);
        assert!(sample.body.is_some());
    }

    #[test]
    fn no_ground_is_airborne() {
        let (bodies, colliders, query, chassis) = ground_world();
        let ctx = ProbeContext { query: &query, bodies: &bodies, colliders: &colliders, exclude: chassis };

        let (up, fwd, wheel_up) = frame();
        let result = probe(&ctx, &spec(3), point![3.0, 10.0, 0.0], up, fwd, wheel_up);
        assert!(result.sample.is_none());
    }

    #[test]
    fn own_chassis_is_excluded() {
        let (bodies, colliders, query, chassis) = ground_world();
        let ctx = ProbeContext { query: &query, bodies: &bodies, colliders: &colliders, exclude: chassis };

        let (up, fwd, wheel_up) = frame();
        // The ray origin sits inside the chassis collider; with the exclusion
        // filter the only hit below is the ground, never the chassis box.
        let result = probe(&ctx, &spec(1), point![0.0, 0.25, 0.0], up, fwd, wheel_up);
        let sample = result.sample.expect("ground below the chassis");
        assert!(sample.point.y.abs() < 1e-4);
    }

    #[test]
    fn fan_center_ray_is_deepest_on_flat_ground() {
        let (bodies, colliders, query, chassis) = ground_world();
        let ctx = ProbeContext { query: &query, bodies: &bodies, colliders: &colliders, exclude: chassis };

        let (up, fwd, wheel_up) = frame();
        let single = probe(&ctx, &spec(1), point![3.0, 0.25, 0.0], up, fwd, wheel_up)
            .sample
            .unwrap();
        let fan = probe(&ctx, &spec(5), point![3.0, 0.25, 0.0], up, fwd, wheel_up)
            .sample
            .unwrap();

        // On flat ground the lifted edge rays hit at larger fractions, so the
        // fan's deepest contact matches the single center ray.
        assert!((fan.fraction - single.fraction).abs() < 1e-5);
    }
}
