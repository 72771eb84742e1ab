pub mod raw;
pub mod mcrt;
pub mod registry;
pub mod filter;
pub mod ledger;
pub mod commit;
pub mod config;
pub mod export;

use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};

use crate::mcrt::Mcrt;
use crate::raw::{EncodeError, RawFields};

pub use crate::commit::{InsertHandle, InsertQueue, InsertStatus};
pub use crate::config::LedgerConfig;
pub use crate::filter::{Filter, Pattern, PathMode, Polarity};
pub use crate::ledger::{Entry, Ledger, LedgerError, Uid};
pub use crate::raw::{pack_uid, unpack_uid};
pub use crate::registry::{Registry, RegistryError, SceneIdRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Pipeline {
    Emission   = 1,
    Mcrt       = 3,
    Detection  = 5,
    Processing = 7,
    // Other codes are free to be used for custom pipeline stages
    #[num_enum(catch_all)]
    Custom(u8),
}

/// Externally assigned object id carried in the low 16 bits of every event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatSurfId(u16);

impl MatSurfId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }
    pub fn id(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for MatSurfId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatSurf({})", self.0)
    }
}

/// Super/sub bits of a stage other than MCRT. No layout is assigned to them
/// yet, so they are carried as written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageCode {
    pub super_type: u8,
    pub sub_type: u8,
}

impl StageCode {
    pub const fn new(super_type: u8, sub_type: u8) -> Self {
        Self { super_type, sub_type }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Emission(StageCode),
    Mcrt(Mcrt),
    Detection(StageCode),
    Processing(StageCode),
    Custom { pipeline: u8, code: StageCode },
}

impl Stage {
    pub fn pipeline(&self) -> Pipeline {
        match self {
            Stage::Emission(_)            => Pipeline::Emission,
            Stage::Mcrt(_)                => Pipeline::Mcrt,
            Stage::Detection(_)           => Pipeline::Detection,
            Stage::Processing(_)          => Pipeline::Processing,
            Stage::Custom { pipeline, .. } => Pipeline::Custom(*pipeline),
        }
    }
}

/// Decoded form of the 32-bit event word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventType {
    pub stage: Stage,
    pub mat_surf_id: MatSurfId,
}

impl EventType {
    pub fn new(stage: Stage, mat_surf_id: MatSurfId) -> Self {
        Self { stage, mat_surf_id }
    }

    pub fn mcrt(mcrt: Mcrt, mat_surf_id: MatSurfId) -> Self {
        Self::new(Stage::Mcrt(mcrt), mat_surf_id)
    }

    pub fn emission(code: StageCode, mat_surf_id: MatSurfId) -> Self {
        Self::new(Stage::Emission(code), mat_surf_id)
    }

    pub fn detection(code: StageCode, mat_surf_id: MatSurfId) -> Self {
        Self::new(Stage::Detection(code), mat_surf_id)
    }

    pub fn processing(code: StageCode, mat_surf_id: MatSurfId) -> Self {
        Self::new(Stage::Processing(code), mat_surf_id)
    }

    pub fn pipeline(&self) -> Pipeline {
        self.stage.pipeline()
    }

    pub fn as_mcrt(&self) -> Option<&Mcrt> {
        match &self.stage {
            Stage::Mcrt(mcrt) => Some(mcrt),
            _ => None,
        }
    }

    /// Flatten into the raw field tuple. Fails only if a custom code is
    /// wider than the sub-field it lives in.
    pub fn raw_fields(&self) -> Result<RawFields, EncodeError> {
        let (pipeline, super_type, sub_type) = match &self.stage {
            Stage::Mcrt(mcrt) => {
                let (super_type, sub_type) = mcrt.codes()?;
                (u8::from(Pipeline::Mcrt) as u32, super_type, sub_type)
            }
            Stage::Emission(code) | Stage::Detection(code) | Stage::Processing(code) => (
                u8::from(self.pipeline()) as u32,
                code.super_type as u32,
                code.sub_type as u32,
            ),
            Stage::Custom { pipeline, code } => {
                (*pipeline as u32, code.super_type as u32, code.sub_type as u32)
            }
        };
        Ok(RawFields {
            pipeline,
            super_type,
            sub_type,
            mat_surf_id: self.mat_surf_id.id() as u32,
        })
    }

    pub fn encode(&self) -> Result<u32, EncodeError> {
        let raw = self.raw_fields()?.encode()?;
        if Self::decode(raw) != *self {
            return Err(EncodeError::Ambiguous { raw });
        }
        Ok(raw)
    }

    /// Total: every word decodes, unknown codes land in `Custom` arms.
    pub fn decode(raw: u32) -> Self {
        let fields = RawFields::decode(raw);
        let code = StageCode::new(fields.super_type as u8, fields.sub_type as u8);
        let stage = match Pipeline::from(fields.pipeline as u8) {
            Pipeline::Emission   => Stage::Emission(code),
            Pipeline::Mcrt       => Stage::Mcrt(Mcrt::decode(fields.super_type, fields.sub_type)),
            Pipeline::Detection  => Stage::Detection(code),
            Pipeline::Processing => Stage::Processing(code),
            Pipeline::Custom(pipeline) => Stage::Custom { pipeline, code },
        };
        Self::new(stage, MatSurfId::new(fields.mat_surf_id as u16))
    }
}

pub type Pos3 = [f64; 3];
pub type Dir3 = [f64; 3];

/// Photon packet as handed over by the transport code.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Photon {
    pub tof: f64,
    pub power: f64,
    pub wavelength: f64,
    pub pos: Pos3,
    pub dir: Dir3,
    pub uid: Uid,
}
