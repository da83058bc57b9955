use crate::utils::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 4x4 齊次轉換矩陣，列優先存放 (row-major)
pub type Matrix4 = [[f64; 4]; 4];

pub const EULER_MARKER: &str = "euler_angles_zyx";
pub const SCALE_MARKER: &str = "scale";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Translation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Translation {
    pub const ZERO: Translation = Translation {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 取矩陣第 4 欄的前三個值
    pub fn from_matrix(matrix: &Matrix4) -> Self {
        Self {
            x: matrix[0][3],
            y: matrix[1][3],
            z: matrix[2][3],
        }
    }
}

/// Euler angles in the order they are stored in a record file: about Z, then Y, then X.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerZyx {
    pub z: f64,
    pub y: f64,
    pub x: f64,
}

impl EulerZyx {
    pub fn new(z: f64, y: f64, x: f64) -> Self {
        Self { z, y, x }
    }

    /// Unpacks the stored triple in reverse into per-axis arguments:
    /// `rx = euler[2]`, `ry = euler[1]`, `rz = euler[0]`.
    pub fn to_rotation_xyz(&self) -> RotationXyz {
        RotationXyz {
            rx: self.x,
            ry: self.y,
            rz: self.z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationXyz {
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

/// 從 record 檔解析出的單一轉換
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTransform {
    pub key: String,
    pub matrix: Option<Matrix4>,
    pub translation: Translation,
    pub euler_zyx: Option<EulerZyx>,
}

impl ParsedTransform {
    pub fn rotation_block(&self) -> Option<[[f64; 3]; 3]> {
        self.matrix.map(|m| {
            [
                [m[0][0], m[0][1], m[0][2]],
                [m[1][0], m[1][1], m[1][2]],
                [m[2][0], m[2][1], m[2][2]],
            ]
        })
    }

    /// Rotation is mandatory once the transform is applied to geometry.
    pub fn into_rigid(self) -> Result<RigidTransform> {
        let euler = self
            .euler_zyx
            .ok_or_else(|| ChainError::missing(format!("{} ({})", EULER_MARKER, self.key)))?;

        Ok(RigidTransform {
            translation: self.translation,
            rotation: euler.to_rotation_xyz(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RigidTransform {
    pub translation: Translation,
    pub rotation: RotationXyz,
}

/// The options object handed to the geometry service. Absent fields mean identity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TransformSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ry: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rz: Option<f64>,
}

impl TransformSpec {
    pub fn scale_only(scale: f64) -> Self {
        Self {
            scale: Some(scale),
            ..Self::default()
        }
    }

    pub fn rigid(transform: &RigidTransform) -> Self {
        Self {
            scale: None,
            tx: Some(transform.translation.x),
            ty: Some(transform.translation.y),
            tz: Some(transform.translation.z),
            rx: Some(transform.rotation.rx),
            ry: Some(transform.rotation.ry),
            rz: Some(transform.rotation.rz),
        }
    }

    /// `--flag value` pairs for every field that is set, in a fixed order.
    pub fn to_cli_args(&self) -> Vec<String> {
        let fields = [
            ("--scale", self.scale),
            ("--tx", self.tx),
            ("--ty", self.ty),
            ("--tz", self.tz),
            ("--rx", self.rx),
            ("--ry", self.ry),
            ("--rz", self.rz),
        ];

        fields
            .iter()
            .filter_map(|(flag, value)| value.map(|v| [flag.to_string(), v.to_string()]))
            .flatten()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Scale,
    Global,
    Fine,
}

impl StageKind {
    pub const ORDER: [StageKind; 3] = [StageKind::Scale, StageKind::Global, StageKind::Fine];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Scale => "scale",
            StageKind::Global => "global",
            StageKind::Fine => "fine",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// 各階段輸出檔名在副檔名前附加的後綴
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSuffixes {
    pub scale: String,
    pub global: String,
    pub fine: String,
}

impl StageSuffixes {
    pub fn for_stage(&self, kind: StageKind) -> &str {
        match kind {
            StageKind::Scale => &self.scale,
            StageKind::Global => &self.global,
            StageKind::Fine => &self.fine,
        }
    }
}

impl Default for StageSuffixes {
    fn default() -> Self {
        Self {
            scale: "_scale".to_string(),
            global: "_global_reg".to_string(),
            fine: "_icp".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformStage {
    pub kind: StageKind,
    pub input: PathBuf,
    pub output: PathBuf,
    pub spec: TransformSpec,
}

/// Everything the chain needs, resolved from the record files before any stage runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChainParameters {
    pub scale: f64,
    pub global: RigidTransform,
    pub fine: RigidTransform,
}

impl ChainParameters {
    pub fn spec_for(&self, kind: StageKind) -> TransformSpec {
        match kind {
            StageKind::Scale => TransformSpec::scale_only(self.scale),
            StageKind::Global => TransformSpec::rigid(&self.global),
            StageKind::Fine => TransformSpec::rigid(&self.fine),
        }
    }
}
