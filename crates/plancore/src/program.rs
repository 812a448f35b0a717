use serde::{Deserialize, Serialize};

/// Manipulator metadata attached to a program or a single instruction.
///
/// Instruction-level fields, when non-empty, override the program-level ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManipulatorInfo {
    pub manipulator: String,
    pub tcp_frame: String,
    pub working_frame: String,
}

impl ManipulatorInfo {
    pub fn new(
        manipulator: impl Into<String>,
        tcp_frame: impl Into<String>,
        working_frame: impl Into<String>,
    ) -> Self {
        Self {
            manipulator: manipulator.into(),
            tcp_frame: tcp_frame.into(),
            working_frame: working_frame.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.manipulator.is_empty() && self.tcp_frame.is_empty() && self.working_frame.is_empty()
    }

    /// Merge with an override: non-empty fields of `other` win.
    pub fn combined(&self, other: &ManipulatorInfo) -> ManipulatorInfo {
        ManipulatorInfo {
            manipulator: if other.manipulator.is_empty() {
                self.manipulator.clone()
            } else {
                other.manipulator.clone()
            },
            tcp_frame: if other.tcp_frame.is_empty() {
                self.tcp_frame.clone()
            } else {
                other.tcp_frame.clone()
            },
            working_frame: if other.working_frame.is_empty() {
                self.working_frame.clone()
            } else {
                other.working_frame.clone()
            },
        }
    }
}

/// Rigid transform as translation + unit quaternion (x, y, z, w).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: [f64; 3],
    pub rotation: [f64; 4],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl Transform {
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            translation: [x, y, z],
            ..Self::default()
        }
    }

    pub fn is_identity(&self) -> bool {
        self == &Self::default()
    }
}

/// Cartesian target with optional per-axis tolerance bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartesianWaypoint {
    pub transform: Transform,
    #[serde(default)]
    pub lower_tolerance: Vec<f64>,
    #[serde(default)]
    pub upper_tolerance: Vec<f64>,
}

impl CartesianWaypoint {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            lower_tolerance: Vec::new(),
            upper_tolerance: Vec::new(),
        }
    }

    pub fn is_toleranced(&self) -> bool {
        !self.lower_tolerance.is_empty() || !self.upper_tolerance.is_empty()
    }
}

/// Joint-space target with optional per-joint tolerance bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointWaypoint {
    pub position: Vec<f64>,
    #[serde(default)]
    pub lower_tolerance: Vec<f64>,
    #[serde(default)]
    pub upper_tolerance: Vec<f64>,
}

impl JointWaypoint {
    pub fn new(position: Vec<f64>) -> Self {
        Self {
            position,
            lower_tolerance: Vec::new(),
            upper_tolerance: Vec::new(),
        }
    }

    pub fn is_toleranced(&self) -> bool {
        !self.lower_tolerance.is_empty() || !self.upper_tolerance.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Waypoint {
    Cartesian(CartesianWaypoint),
    Joint(JointWaypoint),
}

/// One motion target plus per-instruction overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveInstruction {
    pub waypoint: Waypoint,
    /// Profile name override; falls back to the group profile, then DEFAULT.
    #[serde(default)]
    pub profile: Option<String>,
    /// Manipulator override merged over the program-level info.
    #[serde(default)]
    pub manipulator_info: Option<ManipulatorInfo>,
}

impl MoveInstruction {
    pub fn new(waypoint: Waypoint) -> Self {
        Self {
            waypoint,
            profile: None,
            manipulator_info: None,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }
}

/// A contiguous sub-sequence of instructions: one raster segment or one
/// transition, depending on its position in the composite program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramGroup {
    #[serde(default)]
    pub profile: Option<String>,
    pub instructions: Vec<MoveInstruction>,
}

impl ProgramGroup {
    pub fn new(instructions: Vec<MoveInstruction>) -> Self {
        Self {
            profile: None,
            instructions,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Raster-style composite motion request.
///
/// Groups alternate positionally: even indices are raster segments, odd
/// indices are the transitions between them. The shape is a property of the
/// request content and is re-derived wherever it matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeProgram {
    pub name: String,
    pub manipulator: ManipulatorInfo,
    pub groups: Vec<ProgramGroup>,
}

impl CompositeProgram {
    pub fn new(name: impl Into<String>, manipulator: ManipulatorInfo) -> Self {
        Self {
            name: name.into(),
            manipulator,
            groups: Vec::new(),
        }
    }

    pub fn add_group(&mut self, group: ProgramGroup) -> &mut Self {
        self.groups.push(group);
        self
    }

    pub fn segment_count(&self) -> usize {
        self.groups.len().div_ceil(2)
    }

    pub fn transition_count(&self) -> usize {
        self.groups.len() / 2
    }
}

/// Time-parameterized joint-space trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointTrajectory {
    pub joint_names: Vec<String>,
    pub points: Vec<TrajectoryPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub positions: Vec<f64>,
    pub time_from_start: f64,
}

impl JointTrajectory {
    pub fn new(joint_names: Vec<String>) -> Self {
        Self {
            joint_names,
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Append another trajectory, rebasing its timestamps after this one.
    pub fn concat(&mut self, other: &JointTrajectory) {
        let offset = self.points.last().map(|p| p.time_from_start).unwrap_or(0.0);
        for point in &other.points {
            self.points.push(TrajectoryPoint {
                positions: point.positions.clone(),
                time_from_start: offset + point.time_from_start,
            });
        }
        if self.joint_names.is_empty() {
            self.joint_names = other.joint_names.clone();
        }
    }
}
