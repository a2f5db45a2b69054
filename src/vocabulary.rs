//! Field vocabulary
//!
//! Labels the field detector emits for a Thai ID card, the script each one is
//! printed in, and the derived keys the entity mapper can produce.

use crate::ocr::LanguageHint;

pub const ID_CARD: &str = "id_card";
pub const EN_NAME: &str = "en_name";
pub const EN_PREFIX: &str = "en_prefix";
pub const EN_FIRSTNAME: &str = "en_firstname";
pub const EN_LASTNAME: &str = "en_lastname";
pub const EN_NAME_RAW: &str = "en_name_raw";

/// Fields printed in Thai script
pub const THAI_FIELDS: &[&str] = &[
    "prefix_name_th",
    "first_name_th",
    "last_name_th",
    "date_of_birth_th",
    "date_of_expiry_th",
    "religion",
];

/// Fields printed in Latin script
pub const ENGLISH_FIELDS: &[&str] = &[
    "prefix_name_en",
    "first_name_en",
    "last_name_en",
    "date_of_birth_en",
    "date_of_expiry_en",
    EN_NAME,
];

/// Fields read with the combined Thai and English hint
pub const MIXED_FIELDS: &[&str] = &[ID_CARD];

/// Keys produced by splitting `en_name`
pub const DERIVED_FIELDS: &[&str] = &[EN_PREFIX, EN_FIRSTNAME, EN_LASTNAME, EN_NAME_RAW];

/// Field detector class names, in class-index order
pub const FIELD_LABELS: &[&str] = &[
    ID_CARD,
    "prefix_name_th",
    "first_name_th",
    "last_name_th",
    "prefix_name_en",
    "first_name_en",
    "last_name_en",
    EN_NAME,
    "date_of_birth_th",
    "date_of_birth_en",
    "date_of_expiry_th",
    "date_of_expiry_en",
    "religion",
];

/// Language hint for a field label
pub fn language_for(label: &str) -> LanguageHint {
    if THAI_FIELDS.contains(&label) {
        LanguageHint::Thai
    } else if ENGLISH_FIELDS.contains(&label) {
        LanguageHint::English
    } else {
        LanguageHint::Mixed
    }
}

/// Whether `label` is a detector label callers can receive
pub fn is_known_field(label: &str) -> bool {
    THAI_FIELDS.contains(&label) || ENGLISH_FIELDS.contains(&label) || MIXED_FIELDS.contains(&label)
}

/// Whether `key` may appear in an entity map
pub fn is_entity_key(key: &str) -> bool {
    is_known_field(key) || DERIVED_FIELDS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for() {
        assert_eq!(language_for("first_name_th"), LanguageHint::Thai);
        assert_eq!(language_for("religion"), LanguageHint::Thai);
        assert_eq!(language_for("date_of_expiry_th"), LanguageHint::Thai);
        assert_eq!(language_for("last_name_en"), LanguageHint::English);
        assert_eq!(language_for("en_name"), LanguageHint::English);
        assert_eq!(language_for("id_card"), LanguageHint::Mixed);
        assert_eq!(language_for("something_else"), LanguageHint::Mixed);
    }

    #[test]
    fn test_entity_keys() {
        assert!(is_entity_key("id_card"));
        assert!(is_entity_key("en_firstname"));
        assert!(!is_entity_key("class_7"));
        assert!(!is_known_field("en_name_raw"));
    }

    #[test]
    fn test_field_labels_are_known() {
        assert!(FIELD_LABELS.iter().all(|label| is_known_field(label)));
        assert_eq!(
            FIELD_LABELS.len(),
            THAI_FIELDS.len() + ENGLISH_FIELDS.len() + MIXED_FIELDS.len()
        );
    }
}
