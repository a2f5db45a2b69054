//! Entity mapping
//!
//! Turns raw OCR text per field into the values returned to callers.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ocr::RawTextMap;
use crate::vocabulary::{self, EN_FIRSTNAME, EN_LASTNAME, EN_NAME, EN_NAME_RAW, EN_PREFIX, ID_CARD};

/// Field name to cleaned value
pub type EntityMap = BTreeMap<String, String>;

/// How much the mapper rewrites OCR output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingPolicy {
    /// Digit-only ID, split English name, trim everything else
    #[default]
    Cleanup,
    /// Trim only
    Passthrough,
}

impl FromStr for MappingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cleanup" => Ok(Self::Cleanup),
            "passthrough" | "pass-through" | "none" => Ok(Self::Passthrough),
            other => Err(format!("Unknown entity policy: {}", other)),
        }
    }
}

/// Post-processes a raw text map
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityMapper {
    policy: MappingPolicy,
    /// Keep single spaces between ID digit groups instead of removing them
    keep_id_spacing: bool,
}

impl EntityMapper {
    pub fn new(policy: MappingPolicy) -> Self {
        Self {
            policy,
            keep_id_spacing: false,
        }
    }

    pub fn with_id_spacing(mut self, keep: bool) -> Self {
        self.keep_id_spacing = keep;
        self
    }

    /// Map raw field text to entities
    ///
    /// Labels outside the field vocabulary are dropped.
    pub fn map(&self, raw: &RawTextMap) -> EntityMap {
        let mut entities = EntityMap::new();

        for (label, text) in raw {
            if !vocabulary::is_known_field(label) {
                tracing::debug!(label = %label, "Dropping field outside the vocabulary");
                continue;
            }

            match (self.policy, label.as_str()) {
                (MappingPolicy::Cleanup, ID_CARD) => {
                    entities.insert(ID_CARD.to_string(), self.clean_id(text));
                }
                (MappingPolicy::Cleanup, EN_NAME) => split_english_name(text, &mut entities),
                _ => {
                    entities.insert(label.clone(), text.trim().to_string());
                }
            }
        }

        entities
    }

    fn clean_id(&self, text: &str) -> String {
        if self.keep_id_spacing {
            text.chars()
                .filter(|c| c.is_ascii_digit() || c.is_whitespace())
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            text.chars().filter(|c| c.is_ascii_digit()).collect()
        }
    }
}

/// Split "PREFIX FIRST LAST..." into its parts.
///
/// With fewer than three tokens the text is kept under `en_name_raw` for
/// manual correction.
fn split_english_name(text: &str, entities: &mut EntityMap) {
    let parts: Vec<&str> = text.split_whitespace().collect();

    if parts.len() >= 3 {
        entities.insert(EN_PREFIX.to_string(), parts[0].to_string());
        entities.insert(EN_FIRSTNAME.to_string(), parts[1].to_string());
        entities.insert(EN_LASTNAME.to_string(), parts[2..].join(" "));
    } else {
        entities.insert(EN_NAME_RAW.to_string(), text.to_string());
    }
}
