//! Restriction validation and evaluation against rows.

use crate::error::TableError;
use crate::table::Row;
use ropstate_codec::{
    BitmaskOp, FuzzyLevel, PropertyTag, PropertyType, PropertyValue, RelOp, Restriction,
    MAX_RESTRICTION_DEPTH,
};
use std::cmp::Ordering;

fn check_tag(tag: PropertyTag) -> Result<(), TableError> {
    match tag.prop_type {
        PropertyType::Unspecified | PropertyType::ErrorCode | PropertyType::Unknown(_) => {
            Err(TableError::invalid_parameter(format!(
                "restriction tag {:#010x} has no comparable type",
                tag.as_u32()
            )))
        }
        _ => Ok(()),
    }
}

fn check_relop(relop: RelOp) -> Result<(), TableError> {
    match relop {
        RelOp::Like | RelOp::MemberOfDistributionList => Err(TableError::invalid_parameter(
            format!("relational operator {:?} is not supported", relop),
        )),
        _ => Ok(()),
    }
}

fn check_value(
    tag: PropertyTag,
    value: &PropertyValue,
    value_tag: PropertyTag,
) -> Result<(), TableError> {
    if value_tag.prop_type != tag.prop_type || value.prop_type() != tag.prop_type {
        return Err(TableError::invalid_parameter(format!(
            "restriction value type {:?} does not match tag type {:?}",
            value.prop_type(),
            tag.prop_type
        )));
    }
    Ok(())
}

/// Checks that a restriction can be evaluated. Trees nested deeper than
/// `MAX_RESTRICTION_DEPTH` are rejected, which bounds `matches`.
pub fn validate(restriction: &Restriction) -> Result<(), TableError> {
    validate_nested(restriction, 1)
}

fn validate_nested(restriction: &Restriction, depth: usize) -> Result<(), TableError> {
    if depth > MAX_RESTRICTION_DEPTH {
        return Err(TableError::invalid_parameter(format!(
            "restriction nesting exceeds {} levels",
            MAX_RESTRICTION_DEPTH
        )));
    }
    match restriction {
        Restriction::And(subs) | Restriction::Or(subs) => subs
            .iter()
            .try_for_each(|sub| validate_nested(sub, depth + 1)),
        Restriction::Not(sub) => validate_nested(sub, depth + 1),
        Restriction::Content {
            fuzzy_level,
            tag,
            value,
        } => {
            check_tag(*tag)?;
            if !(tag.prop_type.is_string() || tag.prop_type == PropertyType::Binary) {
                return Err(TableError::invalid_parameter(
                    "content restriction requires a string or binary property",
                ));
            }
            if fuzzy_level.low > FuzzyLevel::PREFIX {
                return Err(TableError::invalid_parameter(format!(
                    "unknown fuzzy level {:#06x}",
                    fuzzy_level.low
                )));
            }
            check_value(*tag, &value.value, value.tag)
        }
        Restriction::Property { relop, tag, value } => {
            check_relop(*relop)?;
            check_tag(*tag)?;
            check_value(*tag, &value.value, value.tag)
        }
        Restriction::CompareProperties { relop, tag1, tag2 } => {
            check_relop(*relop)?;
            check_tag(*tag1)?;
            check_tag(*tag2)?;
            if tag1.prop_type != tag2.prop_type {
                return Err(TableError::invalid_parameter(
                    "compared properties have different types",
                ));
            }
            Ok(())
        }
        Restriction::Bitmask { tag, .. } => {
            if tag.prop_type != PropertyType::Integer32 {
                return Err(TableError::invalid_parameter(
                    "bitmask restriction requires a 32-bit integer property",
                ));
            }
            Ok(())
        }
        Restriction::Size { relop, tag, .. } => {
            check_relop(*relop)?;
            check_tag(*tag)
        }
        Restriction::Exist { tag } => check_tag(*tag),
    }
}

fn as_i64(value: &PropertyValue) -> Option<i64> {
    match value {
        PropertyValue::Integer16(v) => Some(*v as i64),
        PropertyValue::Integer32(v) => Some(*v as i64),
        PropertyValue::Integer64(v) => Some(*v),
        _ => None,
    }
}

/// Orders two values of compatible types. Strings compare without case.
pub fn compare(a: &PropertyValue, b: &PropertyValue) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return Some(x.cmp(&y));
    }
    match (a, b) {
        (PropertyValue::Floating64(x), PropertyValue::Floating64(y)) => x.partial_cmp(y),
        (PropertyValue::Floating64(x), other) => {
            as_i64(other).and_then(|y| x.partial_cmp(&(y as f64)))
        }
        (other, PropertyValue::Floating64(y)) => {
            as_i64(other).and_then(|x| (x as f64).partial_cmp(y))
        }
        (PropertyValue::Boolean(x), PropertyValue::Boolean(y)) => Some(x.cmp(y)),
        (PropertyValue::Time(x), PropertyValue::Time(y)) => Some(x.cmp(y)),
        (PropertyValue::ErrorCode(x), PropertyValue::ErrorCode(y)) => Some(x.cmp(y)),
        (PropertyValue::Guid(x), PropertyValue::Guid(y)) => Some(x.cmp(y)),
        (PropertyValue::Binary(x), PropertyValue::Binary(y))
        | (PropertyValue::ServerId(x), PropertyValue::ServerId(y)) => Some(x.cmp(y)),
        _ => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => Some(x.to_lowercase().cmp(&y.to_lowercase())),
            _ => None,
        },
    }
}

fn holds(relop: RelOp, ordering: Ordering) -> bool {
    match relop {
        RelOp::LessThan => ordering == Ordering::Less,
        RelOp::LessThanOrEqual => ordering != Ordering::Greater,
        RelOp::GreaterThan => ordering == Ordering::Greater,
        RelOp::GreaterThanOrEqual => ordering != Ordering::Less,
        RelOp::Equal => ordering == Ordering::Equal,
        RelOp::NotEqual => ordering != Ordering::Equal,
        RelOp::Like | RelOp::MemberOfDistributionList => false,
    }
}

fn content_matches(
    fuzzy_level: FuzzyLevel,
    haystack: &PropertyValue,
    needle: &PropertyValue,
) -> bool {
    let (hay, pat): (Vec<u8>, Vec<u8>) = match (haystack, needle) {
        (PropertyValue::Binary(h), PropertyValue::Binary(n)) => (h.clone(), n.clone()),
        _ => match (haystack.as_str(), needle.as_str()) {
            (Some(h), Some(n)) if fuzzy_level.ignore_case() => {
                (h.to_lowercase().into_bytes(), n.to_lowercase().into_bytes())
            }
            (Some(h), Some(n)) => (h.as_bytes().to_vec(), n.as_bytes().to_vec()),
            _ => return false,
        },
    };
    match fuzzy_level.low {
        FuzzyLevel::FULLSTRING => hay == pat,
        FuzzyLevel::SUBSTRING => {
            pat.is_empty() || hay.windows(pat.len()).any(|w| w == pat.as_slice())
        }
        FuzzyLevel::PREFIX => hay.starts_with(&pat),
        _ => false,
    }
}

/// Evaluates a restriction against a row. A missing property never matches
/// a comparison.
pub fn matches(restriction: &Restriction, row: &Row) -> bool {
    match restriction {
        Restriction::And(subs) => subs.iter().all(|r| matches(r, row)),
        Restriction::Or(subs) => subs.iter().any(|r| matches(r, row)),
        Restriction::Not(sub) => !matches(sub, row),
        Restriction::Content {
            fuzzy_level,
            tag,
            value,
        } => row
            .value(*tag)
            .is_some_and(|v| content_matches(*fuzzy_level, v, &value.value)),
        Restriction::Property { relop, tag, value } => row
            .value(*tag)
            .and_then(|v| compare(v, &value.value))
            .is_some_and(|ord| holds(*relop, ord)),
        Restriction::CompareProperties { relop, tag1, tag2 } => {
            match (row.value(*tag1), row.value(*tag2)) {
                (Some(a), Some(b)) => compare(a, b).is_some_and(|ord| holds(*relop, ord)),
                _ => false,
            }
        }
        Restriction::Bitmask { op, tag, mask } => match row.value(*tag) {
            Some(PropertyValue::Integer32(v)) => {
                let zero = (*v as u32) & mask == 0;
                match op {
                    BitmaskOp::EqualToZero => zero,
                    BitmaskOp::NotEqualToZero => !zero,
                }
            }
            _ => false,
        },
        Restriction::Size { relop, tag, size } => row
            .value(*tag)
            .is_some_and(|v| holds(*relop, (v.value_size() as u64).cmp(&(*size as u64)))),
        Restriction::Exist { tag } => row.value(*tag).is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ropstate_codec::property::tags;
    use ropstate_codec::{ResultCode, TaggedPropertyValue};

    fn row() -> Row {
        Row::new(7)
            .with(tags::SUBJECT, PropertyValue::Unicode("Quarterly Report".into()))
            .with(tags::MESSAGE_SIZE, PropertyValue::Integer32(2048))
            .with(tags::IMPORTANCE, PropertyValue::Integer32(2))
    }

    fn size_is(relop: RelOp, n: i32) -> Restriction {
        Restriction::Property {
            relop,
            tag: tags::MESSAGE_SIZE,
            value: TaggedPropertyValue::new(tags::MESSAGE_SIZE, PropertyValue::Integer32(n)),
        }
    }

    fn subject_content(low: u16, high: u16, needle: &str) -> Restriction {
        Restriction::Content {
            fuzzy_level: FuzzyLevel::new(low, high),
            tag: tags::SUBJECT,
            value: TaggedPropertyValue::new(tags::SUBJECT, PropertyValue::Unicode(needle.into())),
        }
    }

    #[test]
    fn test_property_relops() {
        let r = row();
        assert!(matches(&size_is(RelOp::Equal, 2048), &r));
        assert!(matches(&size_is(RelOp::GreaterThan, 100), &r));
        assert!(matches(&size_is(RelOp::LessThanOrEqual, 2048), &r));
        assert!(!matches(&size_is(RelOp::LessThan, 2048), &r));
        assert!(matches(&size_is(RelOp::NotEqual, 1), &r));
    }

    #[test]
    fn test_missing_property_never_matches() {
        let r = Row::new(1);
        assert!(!matches(&size_is(RelOp::Equal, 0), &r));
        assert!(!matches(&size_is(RelOp::NotEqual, 0), &r));
        assert!(!matches(&Restriction::Exist { tag: tags::MESSAGE_SIZE }, &r));
        assert!(matches(
            &Restriction::Not(Box::new(Restriction::Exist { tag: tags::MESSAGE_SIZE })),
            &r
        ));
    }

    #[test]
    fn test_boolean_combinators() {
        let r = row();
        assert!(matches(&Restriction::And(vec![]), &r));
        assert!(!matches(&Restriction::Or(vec![]), &r));
        let both = Restriction::And(vec![
            size_is(RelOp::Equal, 2048),
            Restriction::Exist { tag: tags::IMPORTANCE },
        ]);
        assert!(matches(&both, &r));
        let either = Restriction::Or(vec![size_is(RelOp::Equal, 1), size_is(RelOp::Equal, 2048)]);
        assert!(matches(&either, &r));
    }

    #[test]
    fn test_content_fuzzy_levels() {
        let r = row();
        assert!(matches(&subject_content(FuzzyLevel::SUBSTRING, 0, "Report"), &r));
        assert!(!matches(&subject_content(FuzzyLevel::SUBSTRING, 0, "report"), &r));
        assert!(matches(
            &subject_content(FuzzyLevel::SUBSTRING, FuzzyLevel::IGNORECASE, "report"),
            &r
        ));
        assert!(matches(&subject_content(FuzzyLevel::PREFIX, 0, "Quarter"), &r));
        assert!(!matches(&subject_content(FuzzyLevel::FULLSTRING, 0, "Quarter"), &r));
        assert!(matches(
            &subject_content(FuzzyLevel::FULLSTRING, 0, "Quarterly Report"),
            &r
        ));
    }

    #[test]
    fn test_bitmask_and_size() {
        let r = row();
        let bit = |op, mask| Restriction::Bitmask {
            op,
            tag: tags::IMPORTANCE,
            mask,
        };
        assert!(matches(&bit(BitmaskOp::NotEqualToZero, 0x2), &r));
        assert!(matches(&bit(BitmaskOp::EqualToZero, 0x1), &r));

        let size = Restriction::Size {
            relop: RelOp::GreaterThan,
            tag: tags::SUBJECT,
            size: 10,
        };
        assert!(matches(&size, &r));
    }

    #[test]
    fn test_compare_properties() {
        let r = row();
        let cmp = Restriction::CompareProperties {
            relop: RelOp::GreaterThan,
            tag1: tags::MESSAGE_SIZE,
            tag2: tags::IMPORTANCE,
        };
        assert!(matches(&cmp, &r));
    }

    #[test]
    fn test_string_compare_ignores_case() {
        let a = PropertyValue::Unicode("alpha".into());
        let b = PropertyValue::String8("ALPHA".into());
        assert_eq!(compare(&a, &b), Some(Ordering::Equal));
        assert_eq!(
            compare(&PropertyValue::Integer16(3), &PropertyValue::Integer64(4)),
            Some(Ordering::Less)
        );
        assert_eq!(compare(&PropertyValue::Boolean(true), &PropertyValue::Integer32(1)), None);
    }

    #[test]
    fn test_validation_bounds_nesting() {
        let nest = |levels: usize| {
            (1..levels).fold(Restriction::Exist { tag: tags::SUBJECT }, |inner, _| {
                Restriction::Not(Box::new(inner))
            })
        };
        assert!(validate(&nest(MAX_RESTRICTION_DEPTH)).is_ok());
        assert_eq!(
            validate(&nest(MAX_RESTRICTION_DEPTH + 1)).unwrap_err().code(),
            ResultCode::InvalidParameter
        );
    }

    #[test]
    fn test_validation() {
        assert!(validate(&size_is(RelOp::Equal, 1)).is_ok());

        let like = Restriction::Property {
            relop: RelOp::Like,
            tag: tags::SUBJECT,
            value: TaggedPropertyValue::new(tags::SUBJECT, PropertyValue::Unicode("x".into())),
        };
        assert_eq!(validate(&like).unwrap_err().code(), ResultCode::InvalidParameter);

        let mismatched = Restriction::Property {
            relop: RelOp::Equal,
            tag: tags::MESSAGE_SIZE,
            value: TaggedPropertyValue::new(tags::MESSAGE_SIZE, PropertyValue::Integer64(1)),
        };
        assert!(validate(&mismatched).is_err());

        let untyped = Restriction::Exist {
            tag: PropertyTag::new(0x0037, PropertyType::Unspecified),
        };
        assert!(validate(&Restriction::Not(Box::new(untyped))).is_err());

        let content_on_int = Restriction::Content {
            fuzzy_level: FuzzyLevel::default(),
            tag: tags::MESSAGE_SIZE,
            value: TaggedPropertyValue::new(tags::MESSAGE_SIZE, PropertyValue::Integer32(1)),
        };
        assert!(validate(&content_on_int).is_err());

        let bitmask_on_string = Restriction::Bitmask {
            op: BitmaskOp::EqualToZero,
            tag: tags::SUBJECT,
            mask: 1,
        };
        assert!(validate(&Restriction::And(vec![bitmask_on_string])).is_err());
    }
}
