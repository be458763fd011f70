use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glam::{Vec3, Vec4};
use serde::{Deserialize, Deserializer};

use crate::camera::{Camera, MotionSettings};
use crate::error::ConfigError;
use crate::input::{Command, KeyBindings, KeyCode};

/// Runtime settings, loaded from TOML with every field optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectorConfig {
    pub window: WindowConfig,
    pub slides: SlideConfig,
    #[serde(deserialize_with = "viewer_camera")]
    pub viewer: CameraConfig,
    #[serde(deserialize_with = "projector_camera")]
    pub projector: CameraConfig,
    pub wall: WallConfig,
    pub light: LightConfig,
    /// Command name to key name overrides, e.g. `toggle_light = "F1"`.
    pub bindings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlideConfig {
    pub image: PathBuf,
    pub video: PathBuf,
    /// Start by playing `video` instead of showing `image`.
    pub start_with_video: bool,
    /// Slide pixels per world unit of the projector's virtual screen.
    pub pixels_per_unit: f32,
}

/// Camera settings. Fields missing from a `[viewer]` or `[projector]` table keep that
/// camera's own defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub move_step: f32,
    pub rotation_step: f32,
    pub zoom_step: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WallConfig {
    pub size: f32,
    pub color: Vec4,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LightConfig {
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Slide Projector".to_string(),
            width: 1920,
            height: 1080,
        }
    }
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            image: PathBuf::from("samples/slide.png"),
            video: PathBuf::from("samples/clip.gif"),
            start_with_video: false,
            pixels_per_unit: 100.0,
        }
    }
}

impl CameraConfig {
    /// Free-flying viewer that starts out looking at the wall corner.
    pub fn viewer() -> Self {
        let motion = MotionSettings::default();
        Self {
            position: Vec3::new(70.0, 50.0, 90.0),
            target: Vec3::new(0.0, 10.0, 0.0),
            up: Vec3::Y,
            fov_degrees: 45.0,
            near: 1.0,
            far: 500.0,
            move_step: motion.move_step,
            rotation_step: motion.rotation_step,
            zoom_step: motion.zoom_step,
        }
    }

    /// Projector aimed at the origin.
    pub fn projector() -> Self {
        Self {
            position: Vec3::new(40.0, 30.0, 20.0),
            target: Vec3::ZERO,
            fov_degrees: 30.0,
            near: 10.0,
            far: 60.0,
            ..Self::viewer()
        }
    }

    pub fn build(&self) -> Camera {
        let motion = MotionSettings {
            move_step: self.move_step,
            rotation_step: self.rotation_step,
            zoom_step: self.zoom_step,
            ..MotionSettings::default()
        };
        Camera::perspective(
            self.position,
            self.target,
            self.up,
            self.fov_degrees,
            self.near,
            self.far,
        )
        .with_motion(motion)
    }
}

/// One camera table as written in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CameraTable {
    position: Option<Vec3>,
    target: Option<Vec3>,
    up: Option<Vec3>,
    fov_degrees: Option<f32>,
    near: Option<f32>,
    far: Option<f32>,
    move_step: Option<f32>,
    rotation_step: Option<f32>,
    zoom_step: Option<f32>,
}

impl CameraTable {
    fn apply_to(self, base: CameraConfig) -> CameraConfig {
        CameraConfig {
            position: self.position.unwrap_or(base.position),
            target: self.target.unwrap_or(base.target),
            up: self.up.unwrap_or(base.up),
            fov_degrees: self.fov_degrees.unwrap_or(base.fov_degrees),
            near: self.near.unwrap_or(base.near),
            far: self.far.unwrap_or(base.far),
            move_step: self.move_step.unwrap_or(base.move_step),
            rotation_step: self.rotation_step.unwrap_or(base.rotation_step),
            zoom_step: self.zoom_step.unwrap_or(base.zoom_step),
        }
    }
}

fn viewer_camera<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CameraConfig, D::Error> {
    CameraTable::deserialize(deserializer).map(|table| table.apply_to(CameraConfig::viewer()))
}

fn projector_camera<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<CameraConfig, D::Error> {
    CameraTable::deserialize(deserializer).map(|table| table.apply_to(CameraConfig::projector()))
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            size: 30.0,
            color: Vec4::new(0.52, 0.12, 0.15, 1.0),
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            ambient: 0.3,
            diffuse: 0.7,
            specular: 0.9,
        }
    }
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            slides: SlideConfig::default(),
            viewer: CameraConfig::viewer(),
            projector: CameraConfig::projector(),
            wall: WallConfig::default(),
            light: LightConfig::default(),
            bindings: BTreeMap::new(),
        }
    }
}

impl ProjectorConfig {
    /// Reads a TOML file; missing sections keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &contents)
    }

    pub fn from_toml(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        config.key_bindings()?;
        Ok(config)
    }

    /// Default bindings with the configured overrides applied.
    pub fn key_bindings(&self) -> Result<KeyBindings, ConfigError> {
        let mut bindings = KeyBindings::default();
        for (command, key) in &self.bindings {
            let command = Command::from_name(command)
                .ok_or_else(|| ConfigError::UnknownCommand(command.clone()))?;
            let key = KeyCode::from_name(key).ok_or_else(|| ConfigError::UnknownKey(key.clone()))?;
            bindings.bind(key, command);
        }
        Ok(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::NamedTempFile;

    #[test]
    fn defaults_describe_the_projector_scene() {
        let config = ProjectorConfig::default();
        assert_eq!(config.projector.position, Vec3::new(40.0, 30.0, 20.0));
        assert_eq!(config.projector.fov_degrees, 30.0);
        assert_eq!(config.viewer.fov_degrees, 45.0);
        assert_eq!(config.wall.size, 30.0);
        assert_eq!(config.slides.pixels_per_unit, 100.0);
    }

    #[test]
    fn partial_files_keep_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[slides]\nimage = \"poster.png\"\n\n[projector]\nposition = [10.0, 5.0, 10.0]\n\n[bindings]\ntoggle_light = \"F1\""
        )
        .unwrap();

        let config = ProjectorConfig::load(file.path()).unwrap();
        assert_eq!(config.slides.image, PathBuf::from("poster.png"));
        assert_eq!(config.slides.video, SlideConfig::default().video);
        assert_eq!(config.projector.position, Vec3::new(10.0, 5.0, 10.0));
        assert_eq!(config.projector.near, 10.0);

        let bindings = config.key_bindings().unwrap();
        assert_eq!(
            bindings.command_for(KeyCode::Function(1)),
            Some(Command::ToggleLight)
        );
        assert_eq!(
            bindings.command_for(KeyCode::Character('L')),
            Some(Command::ToggleLight)
        );
    }

    #[test]
    fn unknown_commands_are_rejected() {
        let err =
            ProjectorConfig::from_toml(Path::new("inline"), "[bindings]\nteleport = \"T\"").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCommand(name) if name == "teleport"));
    }

    #[test]
    fn malformed_files_report_the_path() {
        let err = ProjectorConfig::from_toml(Path::new("broken.toml"), "[window\nwidth = 3")
            .unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn partial_camera_tables_keep_their_own_defaults() {
        let config = ProjectorConfig::from_toml(
            Path::new("inline"),
            "[projector]\nposition = [10.0, 5.0, 10.0]\n\n[viewer]\nfov_degrees = 60.0",
        )
        .unwrap();

        let projector = &config.projector;
        assert_eq!(projector.position, Vec3::new(10.0, 5.0, 10.0));
        assert_eq!(
            (projector.near, projector.far, projector.fov_degrees),
            (10.0, 60.0, 30.0)
        );
        assert_eq!(projector.target, Vec3::ZERO);

        let viewer = &config.viewer;
        assert_eq!(viewer.fov_degrees, 60.0);
        assert_eq!((viewer.near, viewer.far), (1.0, 500.0));
        assert_eq!(viewer.target, Vec3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn unknown_camera_fields_are_rejected() {
        let err = ProjectorConfig::from_toml(Path::new("inline"), "[projector]\nzoom = 2.0")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn camera_config_builds_matching_camera() {
        let camera = CameraConfig::projector().build();
        assert_eq!(camera.position(), Vec3::new(40.0, 30.0, 20.0));
        assert_eq!(camera.near(), 10.0);
        assert_eq!(camera.far(), 60.0);
    }
}
