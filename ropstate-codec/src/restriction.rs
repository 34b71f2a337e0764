//! Restriction trees used by Restrict and FindRow.

use crate::error::CodecError;
use crate::property::{PropertyTag, TaggedPropertyValue};
use crate::wire::{u16_len, Decode, Encode, WireReader, WireWriter};
use serde::{Deserialize, Serialize};

/// Deepest And/Or/Not nesting accepted on the wire, counting the root.
pub const MAX_RESTRICTION_DEPTH: usize = 128;

fn check_depth(depth: usize) -> Result<(), CodecError> {
    if depth > MAX_RESTRICTION_DEPTH {
        return Err(CodecError::NestingTooDeep {
            field: "Restriction",
            max: MAX_RESTRICTION_DEPTH,
        });
    }
    Ok(())
}

/// Relational operators for property, compare and size restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelOp {
    LessThan = 0x00,
    LessThanOrEqual = 0x01,
    GreaterThan = 0x02,
    GreaterThanOrEqual = 0x03,
    Equal = 0x04,
    NotEqual = 0x05,
    /// Regular expression match; not evaluated by this implementation.
    Like = 0x06,
    MemberOfDistributionList = 0x64,
}

impl RelOp {
    pub fn from_u8(v: u8) -> Result<Self, CodecError> {
        Ok(match v {
            0x00 => RelOp::LessThan,
            0x01 => RelOp::LessThanOrEqual,
            0x02 => RelOp::GreaterThan,
            0x03 => RelOp::GreaterThanOrEqual,
            0x04 => RelOp::Equal,
            0x05 => RelOp::NotEqual,
            0x06 => RelOp::Like,
            0x64 => RelOp::MemberOfDistributionList,
            other => {
                return Err(CodecError::InvalidEnum {
                    field: "RelOp",
                    value: other as u32,
                })
            }
        })
    }
}

/// Fuzzy level for content restrictions: match mode in the low word,
/// comparison options in the high word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FuzzyLevel {
    pub low: u16,
    pub high: u16,
}

impl FuzzyLevel {
    pub const FULLSTRING: u16 = 0x0000;
    pub const SUBSTRING: u16 = 0x0001;
    pub const PREFIX: u16 = 0x0002;

    pub const IGNORECASE: u16 = 0x0001;
    pub const IGNORENONSPACE: u16 = 0x0002;
    pub const LOOSE: u16 = 0x0004;

    pub fn new(low: u16, high: u16) -> Self {
        Self { low, high }
    }

    pub fn ignore_case(&self) -> bool {
        self.high & (Self::IGNORECASE | Self::LOOSE) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitmaskOp {
    EqualToZero = 0x00,
    NotEqualToZero = 0x01,
}

/// A restriction tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Restriction {
    And(Vec<Restriction>),
    Or(Vec<Restriction>),
    Not(Box<Restriction>),
    Content {
        fuzzy_level: FuzzyLevel,
        tag: PropertyTag,
        value: TaggedPropertyValue,
    },
    Property {
        relop: RelOp,
        tag: PropertyTag,
        value: TaggedPropertyValue,
    },
    CompareProperties {
        relop: RelOp,
        tag1: PropertyTag,
        tag2: PropertyTag,
    },
    Bitmask {
        op: BitmaskOp,
        tag: PropertyTag,
        mask: u32,
    },
    Size {
        relop: RelOp,
        tag: PropertyTag,
        size: u32,
    },
    Exist {
        tag: PropertyTag,
    },
}

impl Restriction {
    pub const AND: u8 = 0x00;
    pub const OR: u8 = 0x01;
    pub const NOT: u8 = 0x02;
    pub const CONTENT: u8 = 0x03;
    pub const PROPERTY: u8 = 0x04;
    pub const COMPARE_PROPERTIES: u8 = 0x05;
    pub const BITMASK: u8 = 0x06;
    pub const SIZE: u8 = 0x07;
    pub const EXIST: u8 = 0x08;

    pub fn restrict_type(&self) -> u8 {
        match self {
            Restriction::And(_) => Self::AND,
            Restriction::Or(_) => Self::OR,
            Restriction::Not(_) => Self::NOT,
            Restriction::Content { .. } => Self::CONTENT,
            Restriction::Property { .. } => Self::PROPERTY,
            Restriction::CompareProperties { .. } => Self::COMPARE_PROPERTIES,
            Restriction::Bitmask { .. } => Self::BITMASK,
            Restriction::Size { .. } => Self::SIZE,
            Restriction::Exist { .. } => Self::EXIST,
        }
    }

    /// Convenience constructor for an equality property restriction.
    pub fn equals(value: TaggedPropertyValue) -> Self {
        Restriction::Property {
            relop: RelOp::Equal,
            tag: value.tag,
            value,
        }
    }
}

impl Encode for Restriction {
    fn size(&self) -> usize {
        let mut total = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            total += 1 + match node {
                Restriction::And(subs) | Restriction::Or(subs) => {
                    pending.extend(subs.iter());
                    2
                }
                Restriction::Not(sub) => {
                    pending.push(sub);
                    0
                }
                Restriction::Content { value, .. } => 4 + 4 + value.size(),
                Restriction::Property { value, .. } => 1 + 4 + value.size(),
                Restriction::CompareProperties { .. } => 9,
                Restriction::Bitmask { .. } => 9,
                Restriction::Size { .. } => 9,
                Restriction::Exist { .. } => 4,
            };
        }
        total
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.encode_nested(w, 1)
    }
}

impl Restriction {
    fn encode_nested(&self, w: &mut WireWriter, depth: usize) -> Result<(), CodecError> {
        check_depth(depth)?;
        w.put_u8(self.restrict_type());
        match self {
            Restriction::And(subs) | Restriction::Or(subs) => {
                w.put_u16(u16_len("RestrictCount", subs.len())?);
                for sub in subs {
                    sub.encode_nested(w, depth + 1)?;
                }
            }
            Restriction::Not(sub) => sub.encode_nested(w, depth + 1)?,
            Restriction::Content {
                fuzzy_level,
                tag,
                value,
            } => {
                w.put_u16(fuzzy_level.low);
                w.put_u16(fuzzy_level.high);
                tag.encode(w)?;
                value.encode(w)?;
            }
            Restriction::Property { relop, tag, value } => {
                w.put_u8(*relop as u8);
                tag.encode(w)?;
                value.encode(w)?;
            }
            Restriction::CompareProperties { relop, tag1, tag2 } => {
                w.put_u8(*relop as u8);
                tag1.encode(w)?;
                tag2.encode(w)?;
            }
            Restriction::Bitmask { op, tag, mask } => {
                w.put_u8(*op as u8);
                tag.encode(w)?;
                w.put_u32(*mask);
            }
            Restriction::Size { relop, tag, size } => {
                w.put_u8(*relop as u8);
                tag.encode(w)?;
                w.put_u32(*size);
            }
            Restriction::Exist { tag } => tag.encode(w)?,
        }
        Ok(())
    }
}

impl Decode for Restriction {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Self::decode_nested(r, 1)
    }
}

impl Restriction {
    fn decode_nested(r: &mut WireReader<'_>, depth: usize) -> Result<Self, CodecError> {
        check_depth(depth)?;
        let restrict_type = r.read_u8()?;
        Ok(match restrict_type {
            Self::AND | Self::OR => {
                let count = r.read_u16()? as usize;
                let subs = (0..count)
                    .map(|_| Restriction::decode_nested(r, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                if restrict_type == Self::AND {
                    Restriction::And(subs)
                } else {
                    Restriction::Or(subs)
                }
            }
            Self::NOT => Restriction::Not(Box::new(Restriction::decode_nested(r, depth + 1)?)),
            Self::CONTENT => Restriction::Content {
                fuzzy_level: FuzzyLevel::new(r.read_u16()?, r.read_u16()?),
                tag: PropertyTag::decode(r)?,
                value: TaggedPropertyValue::decode(r)?,
            },
            Self::PROPERTY => Restriction::Property {
                relop: RelOp::from_u8(r.read_u8()?)?,
                tag: PropertyTag::decode(r)?,
                value: TaggedPropertyValue::decode(r)?,
            },
            Self::COMPARE_PROPERTIES => Restriction::CompareProperties {
                relop: RelOp::from_u8(r.read_u8()?)?,
                tag1: PropertyTag::decode(r)?,
                tag2: PropertyTag::decode(r)?,
            },
            Self::BITMASK => Restriction::Bitmask {
                op: match r.read_u8()? {
                    0x00 => BitmaskOp::EqualToZero,
                    0x01 => BitmaskOp::NotEqualToZero,
                    other => {
                        return Err(CodecError::InvalidEnum {
                            field: "BitmapRelOp",
                            value: other as u32,
                        })
                    }
                },
                tag: PropertyTag::decode(r)?,
                mask: r.read_u32()?,
            },
            Self::SIZE => Restriction::Size {
                relop: RelOp::from_u8(r.read_u8()?)?,
                tag: PropertyTag::decode(r)?,
                size: r.read_u32()?,
            },
            Self::EXIST => Restriction::Exist {
                tag: PropertyTag::decode(r)?,
            },
            other => {
                return Err(CodecError::InvalidEnum {
                    field: "RestrictType",
                    value: other as u32,
                })
            }
        })
    }
}

/// Size of a RestrictionDataSize-prefixed restriction.
pub fn sized_restriction_size(restriction: Option<&Restriction>) -> usize {
    2 + restriction.map(Encode::size).unwrap_or(0)
}

/// Writes RestrictionDataSize followed by the restriction. A missing
/// restriction is encoded as size zero.
pub fn encode_sized_restriction(
    w: &mut WireWriter,
    restriction: Option<&Restriction>,
) -> Result<(), CodecError> {
    match restriction {
        Some(restriction) => {
            w.put_u16(u16_len("RestrictionDataSize", restriction.size())?);
            restriction.encode(w)
        }
        None => {
            w.put_u16(0);
            Ok(())
        }
    }
}

/// Reads RestrictionDataSize and a restriction occupying exactly that many bytes.
pub fn decode_sized_restriction(
    r: &mut WireReader<'_>,
) -> Result<Option<Restriction>, CodecError> {
    let size = r.read_u16()? as usize;
    if size == 0 {
        return Ok(None);
    }
    let mut inner = WireReader::new(r.take(size)?);
    let restriction = Restriction::decode(&mut inner)?;
    if !inner.is_empty() {
        return Err(CodecError::LengthMismatch {
            field: "RestrictionDataSize",
            declared: size,
            actual: inner.position(),
        });
    }
    Ok(Some(restriction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{tags, PropertyValue};

    fn subject_is(s: &str) -> Restriction {
        Restriction::equals(TaggedPropertyValue::new(
            tags::SUBJECT,
            PropertyValue::Unicode(s.into()),
        ))
    }

    #[test]
    fn test_exist_layout() {
        let r = Restriction::Exist {
            tag: tags::MESSAGE_SIZE,
        };
        assert_eq!(
            r.to_bytes().unwrap().as_ref(),
            &[0x08, 0x03, 0x00, 0x08, 0x0E]
        );
    }

    #[test]
    fn test_nested_tree_roundtrip() {
        let tree = Restriction::And(vec![
            subject_is("hello"),
            Restriction::Not(Box::new(Restriction::Or(vec![
                Restriction::Exist {
                    tag: tags::IMPORTANCE,
                },
                Restriction::Size {
                    relop: RelOp::GreaterThan,
                    tag: tags::SUBJECT,
                    size: 10,
                },
            ]))),
            Restriction::Content {
                fuzzy_level: FuzzyLevel::new(FuzzyLevel::SUBSTRING, FuzzyLevel::IGNORECASE),
                tag: tags::SUBJECT,
                value: TaggedPropertyValue::new(tags::SUBJECT, PropertyValue::Unicode("ell".into())),
            },
            Restriction::Bitmask {
                op: BitmaskOp::NotEqualToZero,
                tag: tags::IMPORTANCE,
                mask: 0x2,
            },
        ]);
        let bytes = tree.to_bytes().unwrap();
        assert_eq!(bytes.len(), tree.size());
        let (decoded, consumed) = Restriction::decode_at(&bytes, 0).unwrap();
        assert_eq!(decoded, tree);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_unknown_restrict_type() {
        assert!(matches!(
            Restriction::decode_at(&[0x0B, 0, 0], 0),
            Err(CodecError::InvalidEnum {
                field: "RestrictType",
                ..
            })
        ));
    }

    #[test]
    fn test_and_count_underrun() {
        // Declares two children, carries one.
        let bytes = [0x00, 0x02, 0x00, 0x08, 0x03, 0x00, 0x08, 0x0E];
        assert!(matches!(
            Restriction::decode_at(&bytes, 0),
            Err(CodecError::Underrun { .. })
        ));
    }

    #[test]
    fn test_sized_restriction() {
        let tree = subject_is("x");
        let mut w = WireWriter::new();
        encode_sized_restriction(&mut w, Some(&tree)).unwrap();
        assert_eq!(w.len(), sized_restriction_size(Some(&tree)));
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        assert_eq!(decode_sized_restriction(&mut r).unwrap(), Some(tree));

        let mut r = WireReader::new(&[0, 0]);
        assert_eq!(decode_sized_restriction(&mut r).unwrap(), None);
    }

    #[test]
    fn test_sized_restriction_declared_too_long() {
        let tree = Restriction::Exist {
            tag: tags::SUBJECT,
        };
        let mut w = WireWriter::new();
        w.put_u16(6);
        tree.encode(&mut w).unwrap();
        w.put_u8(0xFF);
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        assert!(matches!(
            decode_sized_restriction(&mut r),
            Err(CodecError::LengthMismatch { declared: 6, actual: 5, .. })
        ));
    }

    fn nested_not_bytes(nots: usize) -> Vec<u8> {
        let mut bytes = vec![Restriction::NOT; nots];
        bytes.extend_from_slice(&[0x08, 0x1F, 0x00, 0x37, 0x00]);
        bytes
    }

    #[test]
    fn test_nesting_at_limit_decodes() {
        let bytes = nested_not_bytes(MAX_RESTRICTION_DEPTH - 1);
        let (decoded, consumed) = Restriction::decode_at(&bytes, 0).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.size(), bytes.len());
        assert_eq!(decoded.to_bytes().unwrap().as_ref(), bytes.as_slice());
    }

    #[test]
    fn test_deep_nesting_is_framing_error() {
        let body = nested_not_bytes(64_995);
        let mut w = WireWriter::new();
        w.put_u16(body.len() as u16);
        w.put_slice(&body);
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        assert_eq!(
            decode_sized_restriction(&mut r),
            Err(CodecError::NestingTooDeep {
                field: "Restriction",
                max: MAX_RESTRICTION_DEPTH,
            })
        );

        let wide = [Restriction::AND, 0x01, 0x00]
            .repeat(MAX_RESTRICTION_DEPTH)
            .into_iter()
            .chain([0x08, 0x1F, 0x00, 0x37, 0x00])
            .collect::<Vec<u8>>();
        assert!(matches!(
            Restriction::decode_at(&wide, 0),
            Err(CodecError::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_deep_tree() {
        let tree = (0..MAX_RESTRICTION_DEPTH).fold(
            Restriction::Exist { tag: tags::SUBJECT },
            |inner, _| Restriction::Not(Box::new(inner)),
        );
        assert_eq!(tree.size(), MAX_RESTRICTION_DEPTH + 5);
        assert!(matches!(
            tree.to_bytes(),
            Err(CodecError::NestingTooDeep { .. })
        ));
    }
}
