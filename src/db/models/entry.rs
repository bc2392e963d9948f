//! Journal entry data models.
//!
//! Entries and products are owned by the CRUD side of the app. The score
//! service reads the photo reference, the design tag and the ordered product
//! list, nothing else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub title: Option<String>,
    pub note: Option<String>,
    pub photo_id: Option<Uuid>,
    pub design_category: Option<String>,
    pub color_category: Option<String>,
    pub rating: f64,
    /// Products in the order the user picked them.
    pub used_products: Vec<UsedProduct>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: Some(title.into()),
            note: None,
            photo_id: None,
            design_category: None,
            color_category: None,
            rating: 0.0,
            used_products: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn design(&self) -> Option<DesignCategory> {
        self.design_category
            .as_deref()
            .and_then(DesignCategory::from_raw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsedProduct {
    pub product_id: String,
    pub name: Option<String>,
    pub order_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: impl Into<String>, category: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: Some(name.into()),
            category,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Design tags stored in `entries.design_category`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DesignCategory {
    OneColor,
    Gradation,
    French,
    Nuance,
    Deco,
    Magnet,
    Mirror,
    Aurora,
    Marble,
    Ink,
    Simple,
    Event,
    Other,
}

impl DesignCategory {
    pub const ALL: [DesignCategory; 13] = [
        DesignCategory::OneColor,
        DesignCategory::Gradation,
        DesignCategory::French,
        DesignCategory::Nuance,
        DesignCategory::Deco,
        DesignCategory::Magnet,
        DesignCategory::Mirror,
        DesignCategory::Aurora,
        DesignCategory::Marble,
        DesignCategory::Ink,
        DesignCategory::Simple,
        DesignCategory::Event,
        DesignCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DesignCategory::OneColor => "oneColor",
            DesignCategory::Gradation => "gradation",
            DesignCategory::French => "french",
            DesignCategory::Nuance => "nuance",
            DesignCategory::Deco => "deco",
            DesignCategory::Magnet => "magnet",
            DesignCategory::Mirror => "mirror",
            DesignCategory::Aurora => "aurora",
            DesignCategory::Marble => "marble",
            DesignCategory::Ink => "ink",
            DesignCategory::Simple => "simple",
            DesignCategory::Event => "event",
            DesignCategory::Other => "other",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DesignCategory::OneColor => "one color",
            DesignCategory::Gradation => "gradation",
            DesignCategory::French => "french",
            DesignCategory::Nuance => "nuance",
            DesignCategory::Deco => "3D deco",
            DesignCategory::Magnet => "magnet",
            DesignCategory::Mirror => "mirror",
            DesignCategory::Aurora => "aurora",
            DesignCategory::Marble => "marble",
            DesignCategory::Ink => "ink",
            DesignCategory::Simple => "simple",
            DesignCategory::Event => "event",
            DesignCategory::Other => "other",
        }
    }

    pub fn from_raw(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|category| category.as_str() == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_round_trip() {
        for category in DesignCategory::ALL {
            assert_eq!(DesignCategory::from_raw(category.as_str()), Some(category));
        }
    }

    #[test]
    fn unknown_design_is_none() {
        let mut entry = Entry::new("spring");
        assert_eq!(entry.design(), None);

        entry.design_category = Some("holographic".into());
        assert_eq!(entry.design(), None);

        entry.design_category = Some(" french ".into());
        assert_eq!(entry.design(), Some(DesignCategory::French));
    }
}
