//! Validation constraint extraction for composite members.

use crate::model::Constraints;
use crate::types::{MemberDescriptor, PrimitiveKind, TypeRef, ValidationMarker};
use log::debug;

/// A length bound at or above this is the open default and is not recorded.
pub const OPEN_MAX_LENGTH: u64 = i32::MAX as u64;

/// Turns a member's markers into [`Constraints`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintExtractor;

impl ConstraintExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Whether the member carries a presence marker
    pub fn is_required(&self, member: &MemberDescriptor) -> bool {
        member.markers.iter().any(ValidationMarker::is_presence)
    }

    /// Extract constraints, or `None` when no marker or type contributes anything.
    pub fn extract(&self, member: &MemberDescriptor) -> Option<Constraints> {
        let mut constraints = Constraints::default();
        let mut implied_pattern: Option<String> = None;
        let mut explicit_pattern: Option<String> = None;

        for marker in &member.markers {
            match marker {
                ValidationMarker::NotNull
                | ValidationMarker::NotBlank
                | ValidationMarker::NotEmpty => {}
                ValidationMarker::Length { min, max } => {
                    if let Some(min) = (*min).filter(|m| *m > 0) {
                        constraints.min_length = Some(min);
                    }
                    if let Some(max) = (*max).filter(|m| *m < OPEN_MAX_LENGTH) {
                        constraints.max_length = Some(max);
                    }
                }
                ValidationMarker::Range { min, max } => {
                    if min.is_some() {
                        constraints.min = *min;
                    }
                    if max.is_some() {
                        constraints.max = *max;
                    }
                }
                ValidationMarker::Email { pattern } => {
                    constraints.format = Some("email".to_string());
                    if let Some(pattern) = pattern {
                        implied_pattern = Some(pattern.clone());
                    }
                }
                ValidationMarker::Url => {
                    constraints.format = Some("uri".to_string());
                }
                ValidationMarker::Pattern(pattern) => {
                    explicit_pattern = Some(pattern.clone());
                }
            }
        }

        constraints.pattern = explicit_pattern.or(implied_pattern);

        if constraints.format.is_none() {
            constraints.format = implied_format(&member.ty).map(str::to_string);
        }

        if constraints.is_empty() {
            None
        } else {
            debug!("Constraints for {}: {:?}", member.name, constraints);
            Some(constraints)
        }
    }
}

/// Format implied by the member's type, looking through `Option`
fn implied_format(ty: &TypeRef) -> Option<&'static str> {
    let mut current = ty;
    while current.is_option() {
        current = &current.args[0];
    }
    PrimitiveKind::classify(current).and_then(PrimitiveKind::implied_format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn member(ty: &str, markers: Vec<ValidationMarker>) -> MemberDescriptor {
        MemberDescriptor {
            name: "field".to_string(),
            ty: TypeRef::parse(ty).unwrap(),
            markers,
        }
    }

    #[test]
    fn test_required_with_max_length() {
        let m = member(
            "String",
            vec![
                ValidationMarker::NotNull,
                ValidationMarker::Length {
                    min: None,
                    max: Some(50),
                },
            ],
        );
        let extractor = ConstraintExtractor::new();
        assert!(extractor.is_required(&m));
        assert_eq!(
            extractor.extract(&m),
            Some(Constraints {
                max_length: Some(50),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_no_markers_yields_none() {
        let m = member("String", vec![]);
        assert_eq!(ConstraintExtractor::new().extract(&m), None);
        assert!(!ConstraintExtractor::new().is_required(&m));
    }

    #[test]
    fn test_presence_marker_alone_yields_none() {
        let m = member("String", vec![ValidationMarker::NotBlank]);
        assert_eq!(ConstraintExtractor::new().extract(&m), None);
    }

    #[test]
    fn test_open_length_bounds_not_recorded() {
        let m = member(
            "String",
            vec![ValidationMarker::Length {
                min: Some(0),
                max: Some(OPEN_MAX_LENGTH),
            }],
        );
        assert_eq!(ConstraintExtractor::new().extract(&m), None);

        let m = member(
            "String",
            vec![ValidationMarker::Length {
                min: Some(3),
                max: Some(u64::MAX),
            }],
        );
        let c = ConstraintExtractor::new().extract(&m).unwrap();
        assert_eq!(c.min_length, Some(3));
        assert_eq!(c.max_length, None);
    }

    #[test]
    fn test_range_bounds() {
        let m = member(
            "i32",
            vec![ValidationMarker::Range {
                min: Some(0.0),
                max: Some(150.0),
            }],
        );
        let c = ConstraintExtractor::new().extract(&m).unwrap();
        assert_eq!(c.min, Some(0.0));
        assert_eq!(c.max, Some(150.0));
    }

    #[test]
    fn test_explicit_pattern_overrides_email_pattern() {
        let m = member(
            "String",
            vec![
                ValidationMarker::Pattern("^[a-z]+@corp\\.com$".to_string()),
                ValidationMarker::Email {
                    pattern: Some(".+@.+".to_string()),
                },
            ],
        );
        let c = ConstraintExtractor::new().extract(&m).unwrap();
        assert_eq!(c.format.as_deref(), Some("email"));
        assert_eq!(c.pattern.as_deref(), Some("^[a-z]+@corp\\.com$"));
    }

    #[test]
    fn test_email_pattern_used_without_explicit_pattern() {
        let m = member(
            "String",
            vec![ValidationMarker::Email {
                pattern: Some(".+@.+".to_string()),
            }],
        );
        let c = ConstraintExtractor::new().extract(&m).unwrap();
        assert_eq!(c.pattern.as_deref(), Some(".+@.+"));
    }

    #[test]
    fn test_type_implied_formats() {
        let extractor = ConstraintExtractor::new();
        let format = |ty: &str| extractor.extract(&member(ty, vec![])).and_then(|c| c.format);
        assert_eq!(format("NaiveDate").as_deref(), Some("date"));
        assert_eq!(format("Option<DateTime<Utc>>").as_deref(), Some("date-time"));
        assert_eq!(format("uuid::Uuid").as_deref(), Some("uuid"));
        assert_eq!(format("i64"), None);
    }

    #[test]
    fn test_marker_format_wins_over_type_format() {
        let m = member("Uuid", vec![ValidationMarker::Url]);
        let c = ConstraintExtractor::new().extract(&m).unwrap();
        assert_eq!(c.format.as_deref(), Some("uri"));
    }
}
