//! Physical bit layout of the 32-bit event word and the 64-bit UID.
//!
//! ```text
//!  31    28 27    24 23  22 21        16 15                     0
//! +--------+--------+------+------------+------------------------+
//! |reserved|pipeline| super|  sub_type  |      mat_surf_id       |
//! +--------+--------+------+------------+------------------------+
//! ```
//!
//! Inside `sub_type` a Material event is further split into
//! `interaction` (bits 21..20), `scatter` (bits 19..18) and
//! `direction` (bits 17..16).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Names every bit field of the event word, used for error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Reserved,
    Pipeline,
    SuperType,
    SubType,
    Interaction,
    Extra,
    Scatter,
    Direction,
    MatSurfId,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Reserved    => "reserved",
            Field::Pipeline    => "pipeline",
            Field::SuperType   => "super_type",
            Field::SubType     => "sub_type",
            Field::Interaction => "interaction",
            Field::Extra       => "extra",
            Field::Scatter     => "scatter_type",
            Field::Direction   => "direction",
            Field::MatSurfId   => "mat_surf_id",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} value {value:#x} exceeds maximum {max:#x}")]
    FieldOverflow { field: Field, value: u32, max: u32 },

    /// A custom code landed on an assigned one, so the word would decode to
    /// a different event.
    #[error("encoded word {raw:#010x} does not decode back to the same event")]
    Ambiguous { raw: u32 },
}

/// A contiguous run of bits inside a 32-bit word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitField {
    pub field: Field,
    pub shift: u32,
    pub bitsize: u32,
}

impl BitField {
    pub const fn new(field: Field, shift: u32, bitsize: u32) -> Self {
        Self { field, shift, bitsize }
    }

    /// Largest value the field can hold.
    pub const fn max(&self) -> u32 {
        (1u32 << self.bitsize) - 1
    }

    /// Mask of the field in place.
    pub const fn mask(&self) -> u32 {
        self.max() << self.shift
    }

    pub const fn get(&self, raw: u32) -> u32 {
        (raw >> self.shift) & self.max()
    }

    /// Refuse anything wider than the field. The value stays unshifted.
    pub fn check(&self, value: u32) -> Result<u32, EncodeError> {
        if value > self.max() {
            return Err(EncodeError::FieldOverflow {
                field: self.field,
                value,
                max: self.max(),
            });
        }
        Ok(value)
    }

    /// Shift `value` into place, refusing anything wider than the field.
    pub fn put(&self, value: u32) -> Result<u32, EncodeError> {
        Ok(self.check(value)? << self.shift)
    }
}

pub const RESERVED:    BitField = BitField::new(Field::Reserved,    28, 4);
pub const PIPELINE:    BitField = BitField::new(Field::Pipeline,    24, 4);
pub const SUPER_TYPE:  BitField = BitField::new(Field::SuperType,   22, 2);
pub const SUB_TYPE:    BitField = BitField::new(Field::SubType,     16, 6);
pub const MAT_SURF_ID: BitField = BitField::new(Field::MatSurfId,    0, 16);

// Sub-fields of `sub_type`, relative to the 6-bit code.
pub const INTERACTION: BitField = BitField::new(Field::Interaction, 4, 2);
pub const EXTRA:       BitField = BitField::new(Field::Extra,       0, 4);
pub const SCATTER:     BitField = BitField::new(Field::Scatter,     2, 2);
pub const DIRECTION:   BitField = BitField::new(Field::Direction,   0, 2);

/// The undecoded field tuple of an event word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawFields {
    pub pipeline:    u32,
    pub super_type:  u32,
    pub sub_type:    u32,
    pub mat_surf_id: u32,
}

impl RawFields {
    /// Pack the fields, checking only that each fits its width.
    pub fn encode(&self) -> Result<u32, EncodeError> {
        Ok(PIPELINE.put(self.pipeline)?
            | SUPER_TYPE.put(self.super_type)?
            | SUB_TYPE.put(self.sub_type)?
            | MAT_SURF_ID.put(self.mat_surf_id)?)
    }

    /// Unpack any word. Reserved bits are dropped.
    pub fn decode(raw: u32) -> Self {
        Self {
            pipeline:    PIPELINE.get(raw),
            super_type:  SUPER_TYPE.get(raw),
            sub_type:    SUB_TYPE.get(raw),
            mat_surf_id: MAT_SURF_ID.get(raw),
        }
    }
}

pub fn pack_uid(seq_no: u32, event: u32) -> u64 {
    ((seq_no as u64) << 32) | event as u64
}

pub fn unpack_uid(uid: u64) -> (u32, u32) {
    ((uid >> 32) as u32, (uid & 0xFFFF_FFFF) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_do_not_overlap() {
        let fields = [RESERVED, PIPELINE, SUPER_TYPE, SUB_TYPE, MAT_SURF_ID];
        let mut covered = 0u32;
        for field in fields {
            assert_eq!(covered & field.mask(), 0, "{} overlaps", field.field);
            covered |= field.mask();
        }
        assert_eq!(covered, u32::MAX);
    }

    #[test]
    fn sub_fields_partition_sub_type() {
        assert_eq!(INTERACTION.mask() | EXTRA.mask(), SUB_TYPE.max());
        assert_eq!(INTERACTION.mask() & EXTRA.mask(), 0);
        assert_eq!(SCATTER.mask() | DIRECTION.mask(), EXTRA.max());
    }

    #[test]
    fn encode_is_bit_exact() {
        let fields = RawFields { pipeline: 3, super_type: 2, sub_type: 0b100011, mat_surf_id: 0x000b };
        assert_eq!(fields.encode().unwrap(), 0x03a3000b);
        assert_eq!(RawFields::decode(0x03a3000b), fields);
    }

    #[test]
    fn overflow_is_reported() {
        let fields = RawFields { pipeline: 1, super_type: 0, sub_type: 0x40, mat_surf_id: 0 };
        assert_eq!(
            fields.encode(),
            Err(EncodeError::FieldOverflow { field: Field::SubType, value: 0x40, max: 0x3F })
        );

        let fields = RawFields { pipeline: 1, super_type: 0, sub_type: 0, mat_surf_id: 0x1_0000 };
        assert_eq!(
            fields.encode(),
            Err(EncodeError::FieldOverflow { field: Field::MatSurfId, value: 0x1_0000, max: 0xFFFF })
        );

        let fields = RawFields { pipeline: 16, ..Default::default() };
        assert!(matches!(fields.encode(), Err(EncodeError::FieldOverflow { field: Field::Pipeline, .. })));
    }

    #[test]
    fn check_keeps_value_in_place() {
        assert_eq!(SUB_TYPE.check(0b110101), Ok(0b110101));
        assert_eq!(SUB_TYPE.put(0b110101), Ok(0b110101 << 16));
        assert_eq!(
            SUB_TYPE.check(0x40),
            Err(EncodeError::FieldOverflow { field: Field::SubType, value: 0x40, max: 0x3F })
        );
    }

    #[test]
    fn decode_ignores_reserved_bits() {
        let with_reserved = 0xF3a3000b;
        assert_eq!(RawFields::decode(with_reserved), RawFields::decode(0x03a3000b));
        assert_eq!(RawFields::decode(with_reserved).encode().unwrap(), 0x03a3000b);
    }

    #[test]
    fn decode_round_trips_every_sampled_word() {
        // Stride through the whole 32-bit space without walking all of it.
        let mut raw = 0u32;
        loop {
            let fields = RawFields::decode(raw);
            assert_eq!(fields.encode().unwrap(), raw & !RESERVED.mask());
            match raw.checked_add(0x0001_0F3B) {
                Some(next) => raw = next,
                None => break,
            }
        }
    }

    #[test]
    fn uid_packing() {
        for (seq, ev) in [(0, 0), (1, 0x03000001), (u32::MAX, u32::MAX), (42, 0x0510ffff)] {
            assert_eq!(unpack_uid(pack_uid(seq, ev)), (seq, ev));
        }
        assert_eq!(pack_uid(5, 0x03000001), 0x0000_0005_0300_0001);
    }
}
