use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, warn};

use crate::{
    config::{ConfigError, FieldConfig},
    types::{Body, Mode, StepReport, Vec2},
};

/// A usable surface has finite, strictly positive dimensions.
pub fn surface_is_usable(width: f32, height: f32) -> bool {
    width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0
}

/// The ball field simulation. Owns every body for the whole run; bodies are
/// only ever deactivated and reactivated, never added or removed.
pub struct Field {
    config: FieldConfig,
    bodies: Vec<Body>,
    rng: StdRng,
    warned_degenerate_surface: bool,
}

impl Field {
    pub fn new(config: FieldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut field = Self {
            bodies: Vec::with_capacity(config.count),
            config,
            rng,
            warned_degenerate_surface: false,
        };
        field.spawn_initial_bodies();
        Ok(field)
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn active_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.active).count()
    }

    /// Reactivates every body and resamples it onto the spawn disk.
    pub fn respawn_all(&mut self) {
        for idx in 0..self.bodies.len() {
            let pos = self.sample_spawn_position();
            let (vel, depth_vel) = self.sample_spawn_velocity();
            let depth = sample(&mut self.rng, self.config.spawn_depth);
            let body = &mut self.bodies[idx];
            body.active = true;
            body.pos = pos;
            body.depth = depth;
            body.vel = vel;
            body.depth_vel = depth_vel;
        }
        debug!(bodies = self.bodies.len(), "respawned all bodies into the cluster");
    }

    /// Launches every active body away from the cluster center. Directions
    /// are measured in pixel space when the surface has a usable size.
    pub fn kick_to_scatter(&mut self, width: f32, height: f32) {
        let center = self.config.center();
        let pixel_space = surface_is_usable(width, height);
        let [depth_min, depth_max] = self.config.kick_depth_band;

        for body in self.bodies.iter_mut().filter(|b| b.active) {
            let mut offset = body.pos - center;
            if pixel_space {
                offset = offset.scale_by(width, height);
            }
            let dir = if offset != Vec2::ZERO {
                offset.normalize()
            } else {
                let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
                Vec2::new(angle.cos(), angle.sin())
            };

            let depth_factor =
                (1.0 - body.depth * self.config.kick_depth_slope).clamp(depth_min, depth_max);
            let speed = sample(&mut self.rng, self.config.scatter_kick) * depth_factor;
            body.vel = dir * speed;

            let jitter = self.config.kick_depth_jitter;
            body.depth_vel += sample(&mut self.rng, [-jitter, jitter]);
        }
        debug!(active = self.active_count(), "kicked bodies into scatter");
    }

    /// Converts raw elapsed milliseconds into a step multiplier, where 1.0 is
    /// one nominal frame.
    pub fn dt_multiplier(&self, dt_raw_ms: f32) -> f32 {
        let [min, max] = self.config.dt_band;
        if !dt_raw_ms.is_finite() {
            return 1.0_f32.clamp(min, max);
        }
        (dt_raw_ms / self.config.frame_ms).clamp(min, max)
    }

    pub fn step(&mut self, dt_raw_ms: f32, mode: Mode, width: f32, height: f32) -> StepReport {
        if !surface_is_usable(width, height) {
            if !self.warned_degenerate_surface {
                warn!(width, height, "surface has no usable size; skipping physics");
                self.warned_degenerate_surface = true;
            }
            return StepReport {
                active: self.active_count(),
                skipped: true,
            };
        }
        self.warned_degenerate_surface = false;

        let dt = self.dt_multiplier(dt_raw_ms);
        match mode {
            Mode::Cluster => {
                self.integrate_cluster(dt);
                self.resolve_collisions(width, height);
            }
            Mode::Scatter => self.integrate_scatter(dt, width, height),
        }
        StepReport {
            active: self.active_count(),
            skipped: false,
        }
    }

    fn spawn_initial_bodies(&mut self) {
        for id in 0..self.config.count {
            let radius = sample(&mut self.rng, self.config.radius);
            let pos = self.sample_spawn_position();
            let depth = sample(&mut self.rng, self.config.spawn_depth);
            let (vel, depth_vel) = self.sample_spawn_velocity();
            let base_opacity = sample(&mut self.rng, self.config.base_opacity);
            let color = self.config.color_tags[id % self.config.color_tags.len()];
            self.bodies.push(Body {
                id,
                radius,
                pos,
                depth,
                vel,
                depth_vel,
                base_opacity,
                color,
                active: true,
            });
        }
    }

    fn sample_spawn_position(&mut self) -> Vec2 {
        let center = self.config.center();
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let radius = sample(&mut self.rng, [0.0, self.config.spawn_disk_radius()]);
        let [lo, hi] = self.config.spawn_clamp;
        Vec2::new(
            (center.x + angle.cos() * radius).clamp(lo, hi),
            (center.y + angle.sin() * radius).clamp(lo, hi),
        )
    }

    fn sample_spawn_velocity(&mut self) -> (Vec2, f32) {
        let vel = Vec2::new(
            sample(&mut self.rng, self.config.spawn_velocity),
            sample(&mut self.rng, self.config.spawn_velocity),
        );
        let depth_vel = sample(&mut self.rng, self.config.spawn_depth_velocity);
        (vel, depth_vel)
    }

    fn integrate_cluster(&mut self, dt: f32) {
        let cfg = &self.config;
        let center = cfg.center();
        let damping = cfg.damping.powf(dt);
        let depth_damping = cfg.depth_damping.powf(dt);

        for body in self.bodies.iter_mut().filter(|b| b.active) {
            body.vel += (center - body.pos) * (cfg.gravity * dt);
            body.depth_vel += -body.depth * cfg.depth_spring * dt;

            body.vel = body.vel * damping;
            body.depth_vel *= depth_damping;

            body.pos += body.vel * dt;
            body.depth = (body.depth + body.depth_vel * dt).clamp(-1.0, 1.0);

            let offset = body.pos - center;
            let dist = offset.length();
            if dist > cfg.cluster_radius {
                body.pos = center + offset * (cfg.cluster_radius / dist);
                body.vel = body.vel * cfg.boundary_softening;
            }
        }
    }

    fn resolve_collisions(&mut self, width: f32, height: f32) {
        let depth_scale = self.config.depth_scale;
        let restitution = self.config.restitution;
        for i in 0..self.bodies.len() {
            if !self.bodies[i].active {
                continue;
            }
            for j in (i + 1)..self.bodies.len() {
                let (left, right) = self.bodies.split_at_mut(j);
                let a = &mut left[i];
                let b = &mut right[0];
                if !b.active {
                    continue;
                }
                resolve_collision(a, b, width, height, depth_scale, restitution);
            }
        }
    }

    fn integrate_scatter(&mut self, dt: f32, width: f32, height: f32) {
        let cfg = &self.config;
        let accel = cfg.scatter_accel.powf(dt);
        let depth_damping = cfg.scatter_depth_damping.powf(dt);
        let pad = cfg.offscreen_padding_px;

        for body in self.bodies.iter_mut().filter(|b| b.active) {
            body.pos += body.vel * dt;

            body.vel = body.vel * accel;
            let speed = body.vel.length();
            if speed > cfg.max_speed {
                body.vel = body.vel * (cfg.max_speed / speed);
            }

            body.depth += body.depth_vel * dt;
            body.depth_vel *= depth_damping;
            body.depth = body.depth.clamp(-1.0, 1.0);

            let px = body.pos.scale_by(width, height);
            if px.x < -pad || px.x > width + pad || px.y < -pad || px.y > height + pad {
                body.active = false;
                debug!(id = body.id, "body left the surface");
            }
        }
    }
}

/// Elastic collision between two bodies in pixel space.
///
/// Each body's collision radius grows with its depth, and its mass is
/// proportional to the square of that radius. Overlap is removed along the
/// contact normal in inverse proportion to mass; an impulse with the given
/// restitution is applied only while the pair is still approaching.
pub fn resolve_collision(
    a: &mut Body,
    b: &mut Body,
    width: f32,
    height: f32,
    depth_scale: f32,
    restitution: f32,
) {
    let a_px = a.pos.scale_by(width, height);
    let b_px = b.pos.scale_by(width, height);
    let delta = b_px - a_px;
    let dist = delta.length();
    if dist == 0.0 || !dist.is_finite() {
        return;
    }

    let ar = a.radius * (1.0 + a.depth * depth_scale);
    let br = b.radius * (1.0 + b.depth * depth_scale);
    let min_dist = ar + br;
    if dist >= min_dist {
        return;
    }

    let normal = delta * (1.0 / dist);
    let overlap = min_dist - dist;
    let mass_a = ar.max(1e-3).powi(2);
    let mass_b = br.max(1e-3).powi(2);
    let inv_a = 1.0 / mass_a;
    let inv_b = 1.0 / mass_b;
    let inv_sum = inv_a + inv_b;

    let a_px = a_px - normal * (overlap * inv_a / inv_sum);
    let b_px = b_px + normal * (overlap * inv_b / inv_sum);
    a.pos = a_px.scale_by(1.0 / width, 1.0 / height);
    b.pos = b_px.scale_by(1.0 / width, 1.0 / height);

    let a_vel = a.vel.scale_by(width, height);
    let b_vel = b.vel.scale_by(width, height);
    let vel_along_normal = (b_vel - a_vel).dot(normal);
    if vel_along_normal > 0.0 {
        return;
    }

    let impulse = normal * (-(1.0 + restitution) * vel_along_normal / inv_sum);
    a.vel = (a_vel - impulse * inv_a).scale_by(1.0 / width, 1.0 / height);
    b.vel = (b_vel + impulse * inv_b).scale_by(1.0 / width, 1.0 / height);
}

/// Uniform sample from a `[min, max]` pair; a collapsed range yields `min`.
fn sample(rng: &mut StdRng, [min, max]: [f32; 2]) -> f32 {
    if min < max { rng.gen_range(min..max) } else { min }
}
