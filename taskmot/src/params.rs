//! Subsystem parameters read from the configuration collaborator.
//!
//! `JOINT_<n>` and `TRAJ` sections are read once per init. Absent keys take
//! the defaults below; present but malformed values fail the init.
//!
//! | Key | Default |
//! |-----|---------|
//! | `TYPE` | `LINEAR` |
//! | `UNITS` | 1.0 |
//! | `BACKLASH` | 0.0 |
//! | `MIN_LIMIT` / `MAX_LIMIT` | -1e99 / 1e99 |
//! | `FERROR` / `MIN_FERROR` | 1.0 / 0.01 |
//! | `HOME_FINAL_VEL` | -1 (use max velocity) |
//! | `HOME_SEQUENCE` | -1 (not sequenced) |
//! | `MAX_VELOCITY` / `MAX_ACCELERATION` | 1.0 / 1.0 |
//! | `COMP_FILE_TYPE` | 0 (absolute) |
//! | `TRAJ` `JOINT_MASK` | low `JOINTS` bits |
//! | `TRAJ` `MAX_ACCELERATION` | 1e99 |

use std::path::PathBuf;

use taskmot_common::config::{ConfigError, ConfigSource};
use taskmot_common::consts::{
    DEFAULT_JOINT_MAX_ACCELERATION, DEFAULT_JOINT_MAX_VELOCITY, DEFAULT_TRAJ_MAX_VELOCITY,
    TRAJ_SECTION, joint_section,
};
use taskmot_common::pose::Pose;
use taskmot_common::status::JointType;
use tracing::debug;

use crate::bridge::MotionBridge;
use crate::channel::MotionChannel;
use crate::comp::CompType;
use crate::encoder::HomingRequest;
use crate::error::BridgeResult;

const UNLIMITED: f64 = 1e99;

fn invalid(section: &str, key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn f64_or(
    source: &dyn ConfigSource,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    Ok(source.find_f64(section, key)?.unwrap_or(default))
}

fn bool_or_false(source: &dyn ConfigSource, section: &str, key: &str) -> Result<bool, ConfigError> {
    Ok(source.find_bool(section, key)?.unwrap_or(false))
}

/// Parameters for one joint.
#[derive(Debug, Clone, PartialEq)]
pub struct JointParams {
    pub joint_type: JointType,
    pub units: f64,
    pub backlash: f64,
    pub min_limit: f64,
    pub max_limit: f64,
    pub max_ferror: f64,
    pub min_ferror: f64,
    pub homing: HomingRequest,
    pub max_velocity: f64,
    pub max_acceleration: f64,
    pub comp: Option<(PathBuf, CompType)>,
}

impl JointParams {
    pub fn from_source(source: &dyn ConfigSource, joint: usize) -> Result<Self, ConfigError> {
        let section = joint_section(joint);
        let s = section.as_str();

        let joint_type = match source.find_string(s, "TYPE") {
            None => JointType::default(),
            Some(raw) => JointType::parse(&raw).ok_or_else(|| invalid(s, "TYPE", &raw))?,
        };

        let homing = HomingRequest {
            home: f64_or(source, s, "HOME", 0.0)?,
            offset: f64_or(source, s, "HOME_OFFSET", 0.0)?,
            final_vel: f64_or(source, s, "HOME_FINAL_VEL", -1.0)?,
            search_vel: f64_or(source, s, "HOME_SEARCH_VEL", 0.0)?,
            latch_vel: f64_or(source, s, "HOME_LATCH_VEL", 0.0)?,
            use_index: bool_or_false(source, s, "HOME_USE_INDEX")?,
            ignore_limits: bool_or_false(source, s, "HOME_IGNORE_LIMITS")?,
            is_shared: bool_or_false(source, s, "HOME_IS_SHARED")?,
            sequence: match source.find_i64(s, "HOME_SEQUENCE")? {
                None => -1,
                Some(v) => i32::try_from(v).map_err(|_| invalid(s, "HOME_SEQUENCE", v))?,
            },
            volatile_home: bool_or_false(source, s, "VOLATILE_HOME")?,
            locking_indexer: bool_or_false(source, s, "LOCKING_INDEXER")?,
        };

        let comp = match source.find_string(s, "COMP_FILE") {
            None => None,
            Some(path) => {
                let comp_type = match source.find_i64(s, "COMP_FILE_TYPE")? {
                    None => CompType::default(),
                    Some(raw) => {
                        CompType::from_raw(raw).ok_or_else(|| invalid(s, "COMP_FILE_TYPE", raw))?
                    }
                };
                Some((PathBuf::from(path.trim()), comp_type))
            }
        };

        Ok(Self {
            joint_type,
            units: f64_or(source, s, "UNITS", 1.0)?,
            backlash: f64_or(source, s, "BACKLASH", 0.0)?,
            min_limit: f64_or(source, s, "MIN_LIMIT", -UNLIMITED)?,
            max_limit: f64_or(source, s, "MAX_LIMIT", UNLIMITED)?,
            max_ferror: f64_or(source, s, "FERROR", 1.0)?,
            min_ferror: f64_or(source, s, "MIN_FERROR", 0.01)?,
            homing,
            max_velocity: f64_or(source, s, "MAX_VELOCITY", DEFAULT_JOINT_MAX_VELOCITY)?,
            max_acceleration: f64_or(
                source,
                s,
                "MAX_ACCELERATION",
                DEFAULT_JOINT_MAX_ACCELERATION,
            )?,
            comp,
        })
    }
}

/// Trajectory planner parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajParams {
    pub joints: usize,
    pub joint_mask: u32,
    pub linear_units: f64,
    pub angular_units: f64,
    pub default_velocity: f64,
    pub max_velocity: f64,
    pub default_acceleration: f64,
    pub max_acceleration: f64,
    pub home: Pose,
}

impl TrajParams {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let s = TRAJ_SECTION;

        let joints = match source.find_i64(s, "JOINTS")? {
            None => None,
            Some(v) => Some(usize::try_from(v).map_err(|_| invalid(s, "JOINTS", v))?),
        };
        let mask = match source.find_i64(s, "JOINT_MASK")? {
            None => None,
            Some(v) => Some(u32::try_from(v).map_err(|_| invalid(s, "JOINT_MASK", v))?),
        };
        let (joints, joint_mask) = match (joints, mask) {
            (Some(j), Some(m)) => (j, m),
            (Some(j), None) => (j, 1u32.checked_shl(j as u32).map_or(u32::MAX, |bit| bit - 1)),
            (None, Some(m)) => (0, m),
            (None, None) => {
                return Err(ConfigError::MissingKey {
                    section: s.to_string(),
                    key: "JOINTS".to_string(),
                });
            }
        };

        let home = match source.find_f64_list(s, "HOME")? {
            None => Pose::default(),
            Some(values) => Pose::from_components(&values)
                .ok_or_else(|| invalid(s, "HOME", format!("{} values", values.len())))?,
        };

        let max_velocity = f64_or(source, s, "MAX_VELOCITY", DEFAULT_TRAJ_MAX_VELOCITY)?;
        let max_acceleration = f64_or(source, s, "MAX_ACCELERATION", UNLIMITED)?;
        Ok(Self {
            joints,
            joint_mask,
            linear_units: f64_or(source, s, "LINEAR_UNITS", 1.0)?,
            angular_units: f64_or(source, s, "ANGULAR_UNITS", 1.0)?,
            default_velocity: f64_or(source, s, "DEFAULT_VELOCITY", max_velocity)?,
            max_velocity,
            default_acceleration: f64_or(source, s, "DEFAULT_ACCELERATION", max_acceleration)?,
            max_acceleration,
            home,
        })
    }
}

impl<C: MotionChannel> MotionBridge<C> {
    /// Send a joint's parameters, then activate it.
    ///
    /// Stops at the first transport or compensation failure.
    pub fn apply_joint_params(&mut self, joint: usize, params: &JointParams) -> BridgeResult<()> {
        self.set_joint_type(joint, params.joint_type);
        self.set_units(joint, params.units);
        self.set_backlash(joint, params.backlash)?;
        self.set_min_position_limit(joint, params.min_limit)?;
        self.set_max_position_limit(joint, params.max_limit)?;
        self.set_max_ferror(joint, params.max_ferror)?;
        self.set_min_ferror(joint, params.min_ferror)?;
        self.set_homing_params(joint, &params.homing)?;
        self.set_max_velocity(joint, params.max_velocity)?;
        self.set_max_acceleration(joint, params.max_acceleration)?;
        if let Some((path, comp_type)) = &params.comp {
            self.joint_load_comp(joint, path, *comp_type)?;
        }
        self.joint_activate(joint)?;
        debug!(
            joint,
            joint_type = ?params.joint_type,
            max_velocity = params.max_velocity,
            "Joint parameters applied"
        );
        Ok(())
    }

    /// Send the trajectory parameters. Limits go before the defaults that
    /// are clamped against them.
    pub fn apply_traj_params(&mut self, params: &TrajParams) -> BridgeResult<()> {
        self.traj_set_joints(params.joints, params.joint_mask)?;
        self.traj_set_units(params.linear_units, params.angular_units)?;
        self.traj_set_max_velocity(params.max_velocity)?;
        self.traj_set_max_acceleration(params.max_acceleration);
        self.traj_set_velocity(params.default_velocity, params.max_velocity)?;
        self.traj_set_acceleration(params.default_acceleration)?;
        self.traj_set_home(params.home)?;
        debug!(
            joints = self.encoder.traj_joints(),
            mask = format_args!("{:#x}", params.joint_mask),
            "Trajectory parameters applied"
        );
        Ok(())
    }
}
