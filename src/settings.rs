//! Roll tuning and timing settings
//!
//! Persisted as JSON (a file on native, LocalStorage on web). Every field has a
//! default so partial documents load cleanly.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{RollError, RollResult};

/// Contact and integration parameters for the physics world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Constant gravity (must point downward)
    pub gravity: Vec3,
    /// Die/ground contact pair
    pub ground_friction: f32,
    pub ground_restitution: f32,
    /// Die/die contact pair
    pub die_friction: f32,
    pub die_restitution: f32,
    /// Closing speed below which contacts don't bounce
    pub restitution_threshold: f32,
    /// Fraction of velocity lost per second
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Sequential-impulse iterations per step
    pub solver_iterations: u32,
    /// Contact distance tolerance
    pub contact_slop: f32,
    /// Sanity clamps applied after every step
    pub max_linear_speed: f32,
    pub max_angular_speed: f32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, GRAVITY_Y, 0.0),
            ground_friction: GROUND_FRICTION,
            ground_restitution: GROUND_RESTITUTION,
            die_friction: DIE_FRICTION,
            die_restitution: DIE_RESTITUTION,
            restitution_threshold: 1.0,
            linear_damping: 0.1,
            angular_damping: 0.1,
            solver_iterations: 10,
            contact_slop: 0.01,
            max_linear_speed: MAX_LINEAR_SPEED,
            max_angular_speed: MAX_ANGULAR_SPEED,
        }
    }
}

/// Shape and mass of every die
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DieSettings {
    pub half_extent: f32,
    pub mass: f32,
}

impl Default for DieSettings {
    fn default() -> Self {
        Self {
            half_extent: DIE_SIZE / 2.0,
            mass: DIE_MASS,
        }
    }
}

/// Spawn placement and launch impulses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSettings {
    /// Gap between neighbouring dice on the grid
    pub margin: f32,
    /// Height of each die's centre before jitter
    pub base_height: f32,
    /// Extra random height in [0, elevation_jitter)
    pub elevation_jitter: f32,
    /// Random x/z offset in [-h, h); clamped below half the margin
    pub horizontal_jitter: f32,
    /// Horizontal launch speed bound per axis
    pub max_horizontal_speed: f32,
    /// Upward launch speed range (min must be > 0)
    pub min_upward_speed: f32,
    pub max_upward_speed: f32,
    /// Angular launch speed bound per axis
    pub max_spin: f32,
    /// Start each die in a uniformly random orientation
    pub randomize_orientation: bool,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            margin: DIE_SPACING,
            base_height: DIE_SIZE * 2.0,
            elevation_jitter: 2.0,
            horizontal_jitter: 0.03,
            max_horizontal_speed: 5.0,
            min_upward_speed: 2.0,
            max_upward_speed: 7.0,
            max_spin: 10.0,
            randomize_orientation: true,
        }
    }
}

/// Fixed-step clock and settle-check cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Physics step (seconds)
    pub dt: f32,
    /// Settle-check cadence
    pub check_interval_ms: u32,
    /// No settle checks before this much simulated time
    pub settle_grace_ms: u32,
    /// Give up and report current faces after this much simulated time
    pub max_settle_wait_ms: u32,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            dt: SIM_DT,
            check_interval_ms: CHECK_INTERVAL_MS,
            settle_grace_ms: SETTLE_GRACE_MS,
            max_settle_wait_ms: MAX_SETTLE_WAIT_MS,
        }
    }
}

/// Rest thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleSettings {
    pub linear_epsilon: f32,
    pub angular_epsilon: f32,
}

impl Default for SettleSettings {
    fn default() -> Self {
        Self {
            linear_epsilon: SETTLE_LINEAR_EPS,
            angular_epsilon: SETTLE_ANGULAR_EPS,
        }
    }
}

/// All roll settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollSettings {
    pub physics: PhysicsSettings,
    pub die: DieSettings,
    pub spawn: SpawnSettings,
    pub timing: TimingSettings,
    pub settle: SettleSettings,
    /// Largest accepted dice count
    pub max_dice: usize,
}

impl RollSettings {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "dice_tray_settings";

    /// Parse and validate settings from JSON
    pub fn from_json_str(json: &str) -> RollResult<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize to pretty JSON
    pub fn to_json_pretty(&self) -> RollResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a JSON file
    pub fn load_file(path: impl AsRef<Path>) -> RollResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json_str(&json)?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Write settings to a JSON file
    pub fn save_file(&self, path: impl AsRef<Path>) -> RollResult<()> {
        std::fs::write(path.as_ref(), self.to_json_pretty()?)?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json_str(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring stored settings: {e}"),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Check every value the simulation relies on
    pub fn validate(&self) -> RollResult<()> {
        let p = &self.physics;
        let t = &self.timing;

        if !(t.dt.is_finite() && t.dt > 0.0) {
            return Err(RollError::invalid("timing.dt", "must be a positive number"));
        }
        let dt_ms = t.dt * 1000.0;
        if (t.check_interval_ms as f32) < dt_ms {
            return Err(RollError::invalid(
                "timing.check_interval_ms",
                format!("must be at least one step ({dt_ms:.3} ms)"),
            ));
        }
        if t.max_settle_wait_ms < t.check_interval_ms {
            return Err(RollError::invalid(
                "timing.max_settle_wait_ms",
                "must be at least one check interval",
            ));
        }
        if !(p.gravity.is_finite() && p.gravity.y < 0.0) {
            return Err(RollError::invalid("physics.gravity", "must point downward"));
        }
        for (name, e) in [
            ("physics.ground_restitution", p.ground_restitution),
            ("physics.die_restitution", p.die_restitution),
        ] {
            if !(0.0..=1.0).contains(&e) {
                return Err(RollError::invalid(name, "must be within [0, 1]"));
            }
        }
        for (name, mu) in [
            ("physics.ground_friction", p.ground_friction),
            ("physics.die_friction", p.die_friction),
        ] {
            if !(mu.is_finite() && mu >= 0.0) {
                return Err(RollError::invalid(name, "must be non-negative"));
            }
        }
        if p.solver_iterations == 0 {
            return Err(RollError::invalid("physics.solver_iterations", "must be > 0"));
        }
        if !(p.max_linear_speed > 0.0 && p.max_angular_speed > 0.0) {
            return Err(RollError::invalid("physics.max_*_speed", "must be > 0"));
        }
        if !(self.die.half_extent.is_finite() && self.die.half_extent > 0.0) {
            return Err(RollError::invalid("die.half_extent", "must be > 0"));
        }
        if !(self.die.mass.is_finite() && self.die.mass > 0.0) {
            return Err(RollError::invalid("die.mass", "must be > 0"));
        }
        let s = &self.spawn;
        for (name, value) in [
            ("spawn.margin", s.margin),
            ("spawn.base_height", s.base_height),
            ("spawn.elevation_jitter", s.elevation_jitter),
            ("spawn.horizontal_jitter", s.horizontal_jitter),
            ("spawn.max_horizontal_speed", s.max_horizontal_speed),
            ("spawn.min_upward_speed", s.min_upward_speed),
            ("spawn.max_upward_speed", s.max_upward_speed),
            ("spawn.max_spin", s.max_spin),
        ] {
            if !value.is_finite() {
                return Err(RollError::invalid(name, "must be a finite number"));
            }
        }
        // Symmetric launch ranges span twice the bound
        for (name, bound) in [
            ("spawn.max_horizontal_speed", s.max_horizontal_speed),
            ("spawn.max_spin", s.max_spin),
        ] {
            if !(bound * 2.0).is_finite() {
                return Err(RollError::invalid(name, "too large"));
            }
        }
        if !(s.min_upward_speed > 0.0 && s.max_upward_speed >= s.min_upward_speed) {
            return Err(RollError::invalid(
                "spawn.min_upward_speed",
                "upward speed range must be positive and ordered",
            ));
        }
        if s.margin < 0.0 || s.elevation_jitter < 0.0 || s.horizontal_jitter < 0.0 {
            return Err(RollError::invalid("spawn", "distances must be non-negative"));
        }
        if !(self.settle.linear_epsilon > 0.0 && self.settle.angular_epsilon > 0.0) {
            return Err(RollError::invalid("settle", "thresholds must be > 0"));
        }
        if self.max_dice == 0 {
            return Err(RollError::invalid("max_dice", "must be > 0"));
        }
        Ok(())
    }
}

impl Default for RollSettings {
    fn default() -> Self {
        Self {
            physics: PhysicsSettings::default(),
            die: DieSettings::default(),
            spawn: SpawnSettings::default(),
            timing: TimingSettings::default(),
            settle: SettleSettings::default(),
            max_dice: MAX_DICE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        RollSettings::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "timing": { "max_settle_wait_ms": 4000 }, "max_dice": 12 }"#;
        let settings = RollSettings::from_json_str(json).unwrap();
        assert_eq!(settings.timing.max_settle_wait_ms, 4000);
        assert_eq!(settings.timing.check_interval_ms, CHECK_INTERVAL_MS);
        assert_eq!(settings.max_dice, 12);
        assert_eq!(settings.die, DieSettings::default());
    }

    #[test]
    fn test_rejects_upward_gravity() {
        let json = r#"{ "physics": { "gravity": [0.0, 9.8, 0.0] } }"#;
        let err = RollSettings::from_json_str(json).unwrap_err();
        assert!(matches!(
            err,
            RollError::InvalidArgument { name: "physics.gravity", .. }
        ));
    }

    #[test]
    fn test_rejects_check_interval_shorter_than_step() {
        let mut settings = RollSettings::default();
        settings.timing.check_interval_ms = 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_wait_shorter_than_interval() {
        let mut settings = RollSettings::default();
        settings.timing.max_settle_wait_ms = 100;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_overflowing_spawn_speeds() {
        // 1e39 does not fit in an f32 and reads as infinity
        let json = r#"{ "spawn": { "max_upward_speed": 1e39 } }"#;
        assert!(matches!(
            RollSettings::from_json_str(json),
            Err(RollError::InvalidArgument { name: "spawn.max_upward_speed", .. })
        ));

        // Finite, but the -h..=h launch range is not
        let json = r#"{ "spawn": { "max_horizontal_speed": 3e38 } }"#;
        assert!(matches!(
            RollSettings::from_json_str(json),
            Err(RollError::InvalidArgument { name: "spawn.max_horizontal_speed", .. })
        ));

        let mut settings = RollSettings::default();
        settings.spawn.max_spin = f32::MAX;
        assert!(settings.validate().is_err());
        settings.spawn.max_spin = f32::NAN;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            RollSettings::from_json_str("{ nope"),
            Err(RollError::Json(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("dice_tray_settings_{}.json", std::process::id()));
        let mut settings = RollSettings::default();
        settings.settle.linear_epsilon = 0.05;
        settings.save_file(&path).unwrap();
        let loaded = RollSettings::load_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, settings);
    }
}
