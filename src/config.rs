use std::{fs::File, io::BufReader, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::types::{ColorTag, Vec2};

pub const SIM_HZ: f32 = 60.0;
pub const RENDER_HZ: f32 = 30.0;

/// Surface pixels covered by one terminal cell.
pub const CELL_PX_W: f32 = 8.0;
pub const CELL_PX_H: f32 = 16.0;

/// Scroll offset (in rows) past which the page asks for scatter, as a share of
/// the viewport height.
pub const SCROLL_THRESHOLD_RATIO: f32 = 0.5;
pub const SCROLL_STEP_ROWS: f32 = 2.0;
pub const SCROLL_PAGE_ROWS: f32 = 12.0;

pub const DEFAULT_LOG_FILE: &str = "ballfield.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("body count must be at least 1")]
    NoBodies,
    #[error("at least one colour tag is required")]
    NoColorTags,
    #[error("{0} must be finite")]
    NonFinite(&'static str),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("{name} must lie within [{min}, {max}], got {value}")]
    OutOfBounds {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("{name} range is inverted ({min} > {max})")]
    InvertedRange {
        name: &'static str,
        min: f32,
        max: f32,
    },
}

/// Construction constants of one ball field. Fixed for the engine's lifetime.
///
/// Ranges are `[min, max]` pairs. Every field has a default, so an override
/// file may name only what it changes:
///
/// ```yaml
/// count: 24
/// seed: 7
/// radius: [12.0, 28.0]
/// cluster_radius: 0.2
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub count: usize,
    pub seed: Option<u64>,
    pub radius: [f32; 2],
    pub color_tags: Vec<ColorTag>,

    pub center: [f32; 2],
    pub cluster_radius: f32,
    /// Spawn disk radius as a share of `cluster_radius`.
    pub spawn_disk_ratio: f32,
    /// Spawned positions are clamped into this band on both axes.
    pub spawn_clamp: [f32; 2],
    pub spawn_depth: [f32; 2],
    pub spawn_velocity: [f32; 2],
    pub spawn_depth_velocity: [f32; 2],
    pub base_opacity: [f32; 2],

    pub gravity: f32,
    pub damping: f32,
    pub depth_spring: f32,
    pub depth_damping: f32,
    pub boundary_softening: f32,
    pub restitution: f32,

    pub depth_scale: f32,
    pub depth_opacity: f32,
    pub scale_band: [f32; 2],
    pub depth_opacity_band: [f32; 2],
    pub scatter_fade_slope: f32,
    pub scatter_fade_floor: f32,
    pub depth_px: f32,

    pub scatter_kick: [f32; 2],
    pub kick_depth_slope: f32,
    pub kick_depth_band: [f32; 2],
    pub kick_depth_jitter: f32,
    pub scatter_accel: f32,
    pub max_speed: f32,
    pub scatter_depth_damping: f32,
    pub offscreen_padding_px: f32,

    pub frame_ms: f32,
    pub dt_band: [f32; 2],
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            count: 40,
            seed: None,
            radius: [18.0, 36.0],
            color_tags: ColorTag::ALL.to_vec(),

            center: [0.5, 0.45],
            cluster_radius: 0.23,
            spawn_disk_ratio: 0.75,
            spawn_clamp: [0.05, 0.95],
            spawn_depth: [-0.7, 0.7],
            spawn_velocity: [-0.003, 0.003],
            spawn_depth_velocity: [-0.002, 0.002],
            base_opacity: [0.65, 0.95],

            gravity: 0.06,
            damping: 0.988,
            depth_spring: 0.03,
            depth_damping: 0.965,
            boundary_softening: 0.85,
            restitution: 0.92,

            depth_scale: 0.7,
            depth_opacity: 0.35,
            scale_band: [0.55, 1.65],
            depth_opacity_band: [0.15, 1.0],
            scatter_fade_slope: 1.25,
            scatter_fade_floor: 0.08,
            depth_px: 320.0,

            scatter_kick: [0.009, 0.022],
            kick_depth_slope: 0.2,
            kick_depth_band: [0.75, 1.25],
            kick_depth_jitter: 0.0015,
            scatter_accel: 1.005,
            max_speed: 0.045,
            scatter_depth_damping: 0.985,
            offscreen_padding_px: 180.0,

            frame_ms: 16.67,
            dt_band: [0.5, 2.0],
        }
    }
}

impl FieldConfig {
    pub fn from_yaml_path(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config: FieldConfig = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.center[0], self.center[1])
    }

    pub fn spawn_disk_radius(&self) -> f32 {
        self.cluster_radius * self.spawn_disk_ratio
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::NoBodies);
        }
        if self.color_tags.is_empty() {
            return Err(ConfigError::NoColorTags);
        }

        let scalars = [
            ("cluster_radius", self.cluster_radius),
            ("spawn_disk_ratio", self.spawn_disk_ratio),
            ("gravity", self.gravity),
            ("damping", self.damping),
            ("depth_spring", self.depth_spring),
            ("depth_damping", self.depth_damping),
            ("boundary_softening", self.boundary_softening),
            ("restitution", self.restitution),
            ("depth_scale", self.depth_scale),
            ("depth_opacity", self.depth_opacity),
            ("scatter_fade_slope", self.scatter_fade_slope),
            ("scatter_fade_floor", self.scatter_fade_floor),
            ("depth_px", self.depth_px),
            ("kick_depth_slope", self.kick_depth_slope),
            ("kick_depth_jitter", self.kick_depth_jitter),
            ("scatter_accel", self.scatter_accel),
            ("max_speed", self.max_speed),
            ("scatter_depth_damping", self.scatter_depth_damping),
            ("offscreen_padding_px", self.offscreen_padding_px),
            ("frame_ms", self.frame_ms),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite(name));
            }
        }
        // Decay bases are raised to fractional powers of dt.
        for (name, value) in [
            ("cluster_radius", self.cluster_radius),
            ("frame_ms", self.frame_ms),
            ("max_speed", self.max_speed),
            ("damping", self.damping),
            ("depth_damping", self.depth_damping),
            ("scatter_accel", self.scatter_accel),
            ("scatter_depth_damping", self.scatter_depth_damping),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::NonPositive(name));
            }
        }

        let ranges = [
            ("radius", self.radius),
            ("spawn_clamp", self.spawn_clamp),
            ("spawn_depth", self.spawn_depth),
            ("spawn_velocity", self.spawn_velocity),
            ("spawn_depth_velocity", self.spawn_depth_velocity),
            ("base_opacity", self.base_opacity),
            ("scale_band", self.scale_band),
            ("depth_opacity_band", self.depth_opacity_band),
            ("scatter_kick", self.scatter_kick),
            ("kick_depth_band", self.kick_depth_band),
            ("dt_band", self.dt_band),
        ];
        for (name, [min, max]) in ranges {
            if !min.is_finite() || !max.is_finite() {
                return Err(ConfigError::NonFinite(name));
            }
            if min > max {
                return Err(ConfigError::InvertedRange { name, min, max });
            }
        }
        if !self.center().is_finite() {
            return Err(ConfigError::NonFinite("center"));
        }
        if self.radius[0] <= 0.0 {
            return Err(ConfigError::NonPositive("radius"));
        }
        if self.dt_band[0] <= 0.0 {
            return Err(ConfigError::NonPositive("dt_band"));
        }

        // Per-frame decay factors and opacity clamp bounds.
        for (name, value) in [
            ("damping", self.damping),
            ("depth_damping", self.depth_damping),
            ("scatter_depth_damping", self.scatter_depth_damping),
            ("boundary_softening", self.boundary_softening),
            ("restitution", self.restitution),
            ("scatter_fade_floor", self.scatter_fade_floor),
            ("depth_opacity_band", self.depth_opacity_band[0]),
            ("depth_opacity_band", self.depth_opacity_band[1]),
        ] {
            check_unit(name, value)?;
        }
        Ok(())
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfBounds {
            name,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod defaults {
        use super::*;

        #[test]
        fn default_config_is_valid() {
            assert!(FieldConfig::default().validate().is_ok());
        }

        #[test]
        fn spawn_disk_is_three_quarters_of_cluster_radius() {
            let config = FieldConfig::default();
            assert!((config.spawn_disk_radius() - 0.1725).abs() < 1e-6);
        }
    }

    mod validate {
        use super::*;

        #[test]
        fn rejects_zero_bodies() {
            let config = FieldConfig {
                count: 0,
                ..FieldConfig::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::NoBodies)));
        }

        #[test]
        fn rejects_inverted_radius_range() {
            let config = FieldConfig {
                radius: [36.0, 18.0],
                ..FieldConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvertedRange { name: "radius", .. })
            ));
        }

        #[test]
        fn rejects_non_finite_gravity() {
            let config = FieldConfig {
                gravity: f32::NAN,
                ..FieldConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::NonFinite("gravity"))
            ));
        }

        #[test]
        fn rejects_missing_colour_tags() {
            let config = FieldConfig {
                color_tags: Vec::new(),
                ..FieldConfig::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::NoColorTags)));
        }

        #[test]
        fn rejects_non_positive_frame_duration() {
            let config = FieldConfig {
                frame_ms: 0.0,
                ..FieldConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::NonPositive("frame_ms"))
            ));
        }

        #[test]
        fn rejects_fade_floor_above_one() {
            let config = FieldConfig {
                scatter_fade_floor: 1.5,
                ..FieldConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::OutOfBounds {
                    name: "scatter_fade_floor",
                    ..
                })
            ));
        }

        #[test]
        fn rejects_opacity_band_past_full_opacity() {
            let config = FieldConfig {
                depth_opacity_band: [0.15, 1.2],
                ..FieldConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::OutOfBounds {
                    name: "depth_opacity_band",
                    ..
                })
            ));
        }

        #[test]
        fn rejects_non_positive_damping_bases() {
            for (name, config) in [
                ("damping", FieldConfig { damping: -0.5, ..FieldConfig::default() }),
                ("depth_damping", FieldConfig { depth_damping: 0.0, ..FieldConfig::default() }),
                ("scatter_accel", FieldConfig { scatter_accel: -1.005, ..FieldConfig::default() }),
                (
                    "scatter_depth_damping",
                    FieldConfig { scatter_depth_damping: -0.2, ..FieldConfig::default() },
                ),
            ] {
                match config.validate() {
                    Err(ConfigError::NonPositive(got)) => assert_eq!(got, name),
                    other => panic!("{name}: expected NonPositive, got {other:?}"),
                }
            }
        }

        #[test]
        fn rejects_damping_and_restitution_above_one() {
            for (name, config) in [
                ("damping", FieldConfig { damping: 1.01, ..FieldConfig::default() }),
                ("depth_damping", FieldConfig { depth_damping: 1.5, ..FieldConfig::default() }),
                (
                    "scatter_depth_damping",
                    FieldConfig { scatter_depth_damping: 2.0, ..FieldConfig::default() },
                ),
                (
                    "boundary_softening",
                    FieldConfig { boundary_softening: 1.1, ..FieldConfig::default() },
                ),
                ("restitution", FieldConfig { restitution: 1.3, ..FieldConfig::default() }),
                ("restitution", FieldConfig { restitution: -0.1, ..FieldConfig::default() }),
            ] {
                match config.validate() {
                    Err(ConfigError::OutOfBounds { name: got, .. }) => assert_eq!(got, name),
                    other => panic!("{name}: expected OutOfBounds, got {other:?}"),
                }
            }
        }

        #[test]
        fn negative_damping_is_rejected_before_the_engine_is_built() {
            let config = FieldConfig {
                damping: -0.5,
                ..FieldConfig::default()
            };
            assert!(crate::core::Field::new(config).is_err());
        }
    }

    mod yaml {
        use super::*;

        #[test]
        fn partial_override_keeps_other_defaults() {
            let config: FieldConfig =
                serde_yaml::from_str("count: 12\nseed: 3\ncolor_tags: [gold, purple]\n")
                    .expect("yaml parses");
            assert_eq!(config.count, 12);
            assert_eq!(config.seed, Some(3));
            assert_eq!(config.color_tags, vec![ColorTag::Gold, ColorTag::Purple]);
            assert_eq!(config.restitution, 0.92);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn missing_file_reports_io_error() {
            let err = FieldConfig::from_yaml_path(Path::new("/nonexistent/ballfield.yaml"))
                .expect_err("file is missing");
            assert!(matches!(err, ConfigError::Io { .. }));
        }
    }
}
