use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};

use crate::raw::{self, EncodeError};

/// 2-bit MCRT category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SuperType {
    Interface = 0,
    Reflector = 1,
    Material  = 2,
    #[num_enum(default)]
    Custom    = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mcrt {
    Interface(Interface),
    /// `spare` is the unassigned trailing bit of the Diffuse, Specular and
    /// Composite codes. It must stay false for every other kind.
    Reflector { kind: Reflector, spare: bool },
    Material(Material),
    Custom(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Interface {
    Reflection  = 0b000000,
    Refraction  = 0b000001,
    ReEmittance = 0b000100,
    #[num_enum(catch_all)]
    Custom(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reflector {
    Diffuse,                  // 00001x
    Specular,                 // 00010x
    Composite,                // 00011x
    RetroReflective,          // 001000
    CompositeRetroReflective, // 001001
    Custom(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    Absorption,
    Inelastic(Inelastic),
    Elastic(Elastic),
    /// Raw 6-bit sub_type: interaction `0b11`, or absorption with a nonzero extra.
    Custom(u8),
}

/// 2-bit interaction selector of a Material event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Interaction {
    Absorption = 0b00,
    Inelastic  = 0b01,
    Elastic    = 0b10,
    #[num_enum(default)]
    Custom     = 0b11,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Inelastic {
    Raman(ScatterDir),
    Fluorescence(ScatterDir),
    /// Raw 4-bit extra with scatter type `0b1x`.
    Custom(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Elastic {
    HenyeyGreenstein(ScatterDir),
    Mie(ScatterDir),
    Rayleigh(ScatterDir),
    SphericalCdf(ScatterDir),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, IntoPrimitive)]
#[repr(u8)]
pub enum ScatterDir {
    #[default]
    Any      = 0b00,
    Forward  = 0b01,
    Side     = 0b10,
    Backward = 0b11,
}

/// Scatter model without its direction, for matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScatterKind {
    Raman,
    Fluorescence,
    HenyeyGreenstein,
    Mie,
    Rayleigh,
    SphericalCdf,
}

impl ScatterKind {
    pub fn interaction(&self) -> Interaction {
        match self {
            ScatterKind::Raman | ScatterKind::Fluorescence => Interaction::Inelastic,
            _ => Interaction::Elastic,
        }
    }
}

impl ScatterDir {
    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b00 => ScatterDir::Any,
            0b01 => ScatterDir::Forward,
            0b10 => ScatterDir::Side,
            _    => ScatterDir::Backward,
        }
    }

    /// Classify a scattering angle (radians) into equal quarter-pi bands.
    pub fn from_angle(theta: f64) -> Self {
        if theta < std::f64::consts::FRAC_PI_4 {
            ScatterDir::Forward
        } else if theta < 3.0 * std::f64::consts::FRAC_PI_4 {
            ScatterDir::Side
        } else {
            ScatterDir::Backward
        }
    }

    /// Classify with custom band edges `[0, forward_end, side_end, PI]`.
    pub fn from_angle_within(theta: f64, bounds: [f64; 4]) -> Self {
        debug_assert_eq!(bounds[0], 0.0);
        debug_assert_eq!(bounds[3], std::f64::consts::PI);

        if theta >= bounds[0] && theta < bounds[1] {
            ScatterDir::Forward
        } else if theta >= bounds[1] && theta < bounds[2] {
            ScatterDir::Side
        } else {
            ScatterDir::Backward
        }
    }
}

impl Reflector {
    fn has_spare(&self) -> bool {
        matches!(self, Reflector::Diffuse | Reflector::Specular | Reflector::Composite)
    }

    fn decode(code: u8) -> (Self, bool) {
        let spare = code & 1 == 1;
        match code {
            0b000010 | 0b000011 => (Reflector::Diffuse, spare),
            0b000100 | 0b000101 => (Reflector::Specular, spare),
            0b000110 | 0b000111 => (Reflector::Composite, spare),
            0b001000 => (Reflector::RetroReflective, false),
            0b001001 => (Reflector::CompositeRetroReflective, false),
            other => (Reflector::Custom(other), false),
        }
    }

    fn code(&self, spare: bool) -> u32 {
        let spare = if self.has_spare() { spare as u32 } else { 0 };
        match self {
            Reflector::Diffuse                  => 0b000010 | spare,
            Reflector::Specular                 => 0b000100 | spare,
            Reflector::Composite                => 0b000110 | spare,
            Reflector::RetroReflective          => 0b001000,
            Reflector::CompositeRetroReflective => 0b001001,
            Reflector::Custom(code)             => *code as u32,
        }
    }
}

impl Inelastic {
    fn decode(extra: u32) -> Self {
        let dir = ScatterDir::from_bits(raw::DIRECTION.get(extra));
        match raw::SCATTER.get(extra) {
            0b00 => Inelastic::Raman(dir),
            0b01 => Inelastic::Fluorescence(dir),
            _ => Inelastic::Custom(extra as u8),
        }
    }

    fn extra(&self) -> Result<u32, EncodeError> {
        Ok(match self {
            Inelastic::Raman(dir)        => raw::SCATTER.put(0b00)? | u8::from(*dir) as u32,
            Inelastic::Fluorescence(dir) => raw::SCATTER.put(0b01)? | u8::from(*dir) as u32,
            Inelastic::Custom(extra)     => raw::EXTRA.put(*extra as u32)?,
        })
    }
}

impl Elastic {
    fn decode(extra: u32) -> Self {
        let dir = ScatterDir::from_bits(raw::DIRECTION.get(extra));
        match raw::SCATTER.get(extra) {
            0b00 => Elastic::HenyeyGreenstein(dir),
            0b01 => Elastic::Mie(dir),
            0b10 => Elastic::Rayleigh(dir),
            _    => Elastic::SphericalCdf(dir),
        }
    }

    fn extra(&self) -> u32 {
        let (scatter, dir): (u32, _) = match self {
            Elastic::HenyeyGreenstein(dir) => (0b00, dir),
            Elastic::Mie(dir)              => (0b01, dir),
            Elastic::Rayleigh(dir)         => (0b10, dir),
            Elastic::SphericalCdf(dir)     => (0b11, dir),
        };
        (scatter << raw::SCATTER.shift) | u8::from(*dir) as u32
    }

    pub fn direction(&self) -> ScatterDir {
        match self {
            Elastic::HenyeyGreenstein(dir)
            | Elastic::Mie(dir)
            | Elastic::Rayleigh(dir)
            | Elastic::SphericalCdf(dir) => *dir,
        }
    }
}

impl Material {
    fn decode(sub_type: u32) -> Self {
        let extra = raw::EXTRA.get(sub_type);
        match Interaction::from(raw::INTERACTION.get(sub_type) as u8) {
            Interaction::Absorption if extra == 0 => Material::Absorption,
            Interaction::Inelastic => Material::Inelastic(Inelastic::decode(extra)),
            Interaction::Elastic   => Material::Elastic(Elastic::decode(extra)),
            _ => Material::Custom(sub_type as u8),
        }
    }

    fn sub_type(&self) -> Result<u32, EncodeError> {
        Ok(match self {
            Material::Absorption    => raw::INTERACTION.put(Interaction::Absorption as u32)?,
            Material::Inelastic(it) => raw::INTERACTION.put(Interaction::Inelastic as u32)? | it.extra()?,
            Material::Elastic(et)   => raw::INTERACTION.put(Interaction::Elastic as u32)? | et.extra(),
            Material::Custom(code)  => raw::SUB_TYPE.check(*code as u32)?,
        })
    }

    pub fn interaction(&self) -> Interaction {
        match self {
            Material::Absorption   => Interaction::Absorption,
            Material::Inelastic(_) => Interaction::Inelastic,
            Material::Elastic(_)   => Interaction::Elastic,
            Material::Custom(code) => Interaction::from(raw::INTERACTION.get(*code as u32) as u8),
        }
    }

    pub fn scatter(&self) -> Option<ScatterKind> {
        match self {
            Material::Inelastic(Inelastic::Raman(_))        => Some(ScatterKind::Raman),
            Material::Inelastic(Inelastic::Fluorescence(_)) => Some(ScatterKind::Fluorescence),
            Material::Elastic(Elastic::HenyeyGreenstein(_)) => Some(ScatterKind::HenyeyGreenstein),
            Material::Elastic(Elastic::Mie(_))              => Some(ScatterKind::Mie),
            Material::Elastic(Elastic::Rayleigh(_))         => Some(ScatterKind::Rayleigh),
            Material::Elastic(Elastic::SphericalCdf(_))     => Some(ScatterKind::SphericalCdf),
            _ => None,
        }
    }

    pub fn direction(&self) -> Option<ScatterDir> {
        match self {
            Material::Inelastic(Inelastic::Raman(dir))
            | Material::Inelastic(Inelastic::Fluorescence(dir)) => Some(*dir),
            Material::Elastic(et) => Some(et.direction()),
            _ => None,
        }
    }
}

impl Mcrt {
    /// Decode the super/sub pair of an MCRT event word. Total over all inputs.
    pub fn decode(super_type: u32, sub_type: u32) -> Self {
        let super_type = raw::SUPER_TYPE.max() & super_type;
        let sub_type = raw::SUB_TYPE.max() & sub_type;
        match SuperType::from(super_type as u8) {
            SuperType::Interface => Mcrt::Interface(Interface::from(sub_type as u8)),
            SuperType::Reflector => {
                let (kind, spare) = Reflector::decode(sub_type as u8);
                Mcrt::Reflector { kind, spare }
            }
            SuperType::Material => Mcrt::Material(Material::decode(sub_type)),
            SuperType::Custom   => Mcrt::Custom(sub_type as u8),
        }
    }

    /// Unshifted `(super_type, sub_type)` codes. Widths are checked here,
    /// collisions with assigned codes are caught by the caller's round trip.
    pub fn codes(&self) -> Result<(u32, u32), EncodeError> {
        let sub_type = match self {
            Mcrt::Interface(it) => u8::from(*it) as u32,
            Mcrt::Reflector { kind, spare } => kind.code(*spare),
            Mcrt::Material(mt) => mt.sub_type()?,
            Mcrt::Custom(code) => *code as u32,
        };
        raw::SUB_TYPE.check(sub_type)?;
        Ok((u8::from(self.super_type()) as u32, sub_type))
    }

    pub fn super_type(&self) -> SuperType {
        match self {
            Mcrt::Interface(_)      => SuperType::Interface,
            Mcrt::Reflector { .. }  => SuperType::Reflector,
            Mcrt::Material(_)       => SuperType::Material,
            Mcrt::Custom(_)         => SuperType::Custom,
        }
    }

    pub fn interface(&self) -> Option<Interface> {
        match self {
            Mcrt::Interface(it) => Some(*it),
            _ => None,
        }
    }

    pub fn reflector(&self) -> Option<Reflector> {
        match self {
            Mcrt::Reflector { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn material(&self) -> Option<&Material> {
        match self {
            Mcrt::Material(mt) => Some(mt),
            _ => None,
        }
    }
}

// Build an MCRT payload from the names of its levels:
// 1. mcrt_event!(Interface, Reflection)           -> Mcrt::Interface(Interface::Reflection)
// 2. mcrt_event!(Reflector, Specular)             -> Mcrt::Reflector { kind: Reflector::Specular, spare: false }
// 3. mcrt_event!(Material, Elastic, Mie, Forward) -> Mcrt::Material(Material::Elastic(Elastic::Mie(ScatterDir::Forward)))
#[macro_export]
macro_rules! mcrt_event {
    (Reflector, $kind:ident) => {
        $crate::mcrt::Mcrt::Reflector {
            kind: $crate::mcrt::Reflector::$kind,
            spare: false,
        }
    };
    ($stype:ident, $sstype:ident) => {
        $crate::mcrt::Mcrt::$stype($crate::mcrt::$stype::$sstype)
    };
    ($stype:ident, $sstype:ident, $ssstype:ident, $dirtype:ident) => {
        $crate::mcrt::Mcrt::$stype($crate::mcrt::$stype::$sstype($crate::mcrt::$sstype::$ssstype(
            $crate::mcrt::ScatterDir::$dirtype,
        )))
    };
}
