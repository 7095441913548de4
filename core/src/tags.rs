//! Closed-vocabulary tag validation (spec §4.B).

use crate::error::CoreError;
use crate::model::{MAX_TAGS, TAG_VOCABULARY};
use std::collections::HashSet;

pub fn validate_tags(tags: &[String]) -> Result<(), CoreError> {
    if tags.len() > MAX_TAGS {
        return Err(CoreError::Validation(format!(
            "at most {MAX_TAGS} tags are allowed, got {}",
            tags.len()
        )));
    }

    let mut seen = HashSet::with_capacity(tags.len());
    for tag in tags {
        if !TAG_VOCABULARY.contains(&tag.as_str()) {
            return Err(CoreError::Validation(format!(
                "'{tag}' is not a recognized tag"
            )));
        }
        if !seen.insert(tag.as_str()) {
            return Err(CoreError::Validation(format!("duplicate tag '{tag}'")));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_valid() {
        assert!(validate_tags(&[]).is_ok());
    }

    #[test]
    fn known_tags_are_valid() {
        let tags = vec!["Work".to_string(), "Urgent".to_string()];
        assert!(validate_tags(&tags).is_ok());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let tags = vec!["work".to_string()]; // wrong case
        assert!(validate_tags(&tags).is_err());
    }

    #[test]
    fn duplicates_are_rejected() {
        let tags = vec!["Work".to_string(), "Work".to_string()];
        assert!(validate_tags(&tags).is_err());
    }

    #[test]
    fn more_than_five_is_rejected() {
        let tags = vec![
            "Work".to_string(),
            "Personal".to_string(),
            "Shopping".to_string(),
            "Health".to_string(),
            "Finance".to_string(),
            "Learning".to_string(),
        ];
        assert!(validate_tags(&tags).is_err());
    }

    #[test]
    fn exactly_five_is_valid() {
        let tags = vec![
            "Work".to_string(),
            "Personal".to_string(),
            "Shopping".to_string(),
            "Health".to_string(),
            "Finance".to_string(),
        ];
        assert!(validate_tags(&tags).is_ok());
    }
}
