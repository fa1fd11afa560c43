use tracing::warn;

use crate::{
    config::FieldConfig,
    core::surface_is_usable,
    types::{Body, BodyId, Mode, Vec2},
};

/// Placement of one element on the host surface. `dx`/`dy` locate the top-left
/// corner of the element's unscaled box; scaling is about the box center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElementTransform {
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
    pub scale: f32,
}

/// Whatever owns the visible elements. One element per body, keyed by the
/// body's id.
pub trait HostSurface {
    fn dimensions(&self) -> (f32, f32);
    fn set_element_transform(&mut self, id: BodyId, transform: ElementTransform);
    fn set_element_opacity(&mut self, id: BodyId, opacity: f32);
    fn set_element_visible(&mut self, id: BodyId, visible: bool);
    fn set_element_size(&mut self, id: BodyId, width: f32, height: f32);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub transform: ElementTransform,
    pub opacity: f32,
}

#[derive(Clone, Copy, Debug)]
struct Params {
    center: Vec2,
    depth_scale: f32,
    scale_band: [f32; 2],
    depth_opacity: f32,
    depth_opacity_band: [f32; 2],
    fade_slope: f32,
    fade_floor: f32,
    depth_px: f32,
}

/// Maps body state to element transforms and opacities. Reads bodies, never
/// mutates them.
pub struct Projector {
    params: Params,
    warned_degenerate_surface: bool,
}

impl Projector {
    pub fn new(config: &FieldConfig) -> Self {
        Self {
            params: Params {
                center: config.center(),
                depth_scale: config.depth_scale,
                scale_band: config.scale_band,
                depth_opacity: config.depth_opacity,
                depth_opacity_band: config.depth_opacity_band,
                fade_slope: config.scatter_fade_slope,
                fade_floor: config.scatter_fade_floor,
                depth_px: config.depth_px,
            },
            warned_degenerate_surface: false,
        }
    }

    /// Pose of an active body on a `width`x`height` surface, or `None` for an
    /// inactive body or one whose pose would not be finite.
    pub fn pose(&self, body: &Body, mode: Mode, width: f32, height: f32) -> Option<Pose> {
        if !body.active {
            return None;
        }
        let p = &self.params;
        let px = body.pos.scale_by(width, height);

        let scale = (1.0 + body.depth * p.depth_scale).clamp(p.scale_band[0], p.scale_band[1]);
        let depth_opacity = (body.base_opacity * (1.0 + body.depth * p.depth_opacity))
            .clamp(p.depth_opacity_band[0], p.depth_opacity_band[1]);
        let fade = match mode {
            Mode::Cluster => 1.0,
            Mode::Scatter => {
                let dist = (body.pos - p.center).length();
                (1.0 - dist * p.fade_slope).clamp(p.fade_floor, 1.0)
            }
        };
        let opacity = (depth_opacity * fade).clamp(p.fade_floor, 1.0);

        let transform = ElementTransform {
            dx: px.x - body.radius,
            dy: px.y - body.radius,
            dz: body.depth * p.depth_px,
            scale,
        };
        let finite = [transform.dx, transform.dy, transform.dz, scale, opacity]
            .iter()
            .all(|v| v.is_finite());
        finite.then_some(Pose { transform, opacity })
    }

    /// Sizes every element and gives it an initial pose. Run once when the
    /// surface is first laid out and again after every resize.
    pub fn mount<S: HostSurface>(&mut self, bodies: &[Body], mode: Mode, surface: &mut S) {
        for body in bodies {
            let diameter = body.radius * 2.0;
            surface.set_element_size(body.id, diameter, diameter);
        }
        self.project(bodies, mode, surface);
    }

    /// Pushes the current pose of every body to the surface. Returns how many
    /// elements were left visible.
    pub fn project<S: HostSurface>(&mut self, bodies: &[Body], mode: Mode, surface: &mut S) -> usize {
        let (width, height) = surface.dimensions();
        if !surface_is_usable(width, height) {
            if !self.warned_degenerate_surface {
                warn!(width, height, "surface has no usable size; skipping projection");
                self.warned_degenerate_surface = true;
            }
            return 0;
        }
        self.warned_degenerate_surface = false;

        let mut visible = 0;
        for body in bodies {
            match self.pose(body, mode, width, height) {
                Some(pose) => {
                    surface.set_element_visible(body.id, true);
                    surface.set_element_transform(body.id, pose.transform);
                    surface.set_element_opacity(body.id, pose.opacity);
                    visible += 1;
                }
                None => surface.set_element_visible(body.id, false),
            }
        }
        visible
    }
}
