//! The fixed listing field schema.
//!
//! Every extraction attempts to populate the same ordered list of named
//! fields. The catalog is fixed data, not user-editable at runtime; field
//! names are unique strings used as mapping keys throughout the pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

/// The single shared sentinel literal meaning "no information".
///
/// Producers store it for missing/null fields and consumers treat it as
/// equivalent to an absent entry, so "no information" is always comparable
/// as a literal string across the whole pipeline.
pub const NO_INFORMATION: &str = "情報なし";

/// Ordered list of unique field names every extraction targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    fields: Vec<String>,
}

impl FieldSchema {
    /// Build a schema from an ordered list of field names.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidInput`] if the list is empty or
    /// contains a duplicate name.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(ExtractError::InvalidInput(
                "field schema must not be empty".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            if !seen.insert(field.as_str()) {
                return Err(ExtractError::InvalidInput(format!(
                    "duplicate field name in schema: {field}"
                )));
            }
        }
        Ok(Self { fields })
    }

    /// The fixed rental-listing catalog of the flyer extraction tool.
    ///
    /// Order matches the listing card layout: name and money fields first,
    /// then location/access, building facts, equipment, and the handling
    /// agency block.
    #[must_use]
    pub fn listing() -> Self {
        let fields = [
            "名称",
            "家賃",
            "管理費",
            "共益費",
            "敷金",
            "礼金",
            "住所",
            "最寄駅",
            "駅からの距離",
            "建物種別",
            "構造",
            "階数",
            "築年数",
            "リフォーム年",
            "向き",
            "専有面積",
            "間取り",
            "バルコニー面積",
            "設備（キッチン）",
            "設備（バス・トイレ）",
            "設備（収納）",
            "設備（冷暖房）",
            "設備（セキュリティ）",
            "駐車場",
            "バイク置き場",
            "自転車置き場",
            "ペット可否",
            "契約期間",
            "現況",
            "引渡し時期",
            "取引形態",
            "備考",
            "取扱不動産会社",
            "電話番号",
            "不動産会社住所",
            "免許番号",
        ];
        Self {
            fields: fields.iter().map(ToString::to_string).collect(),
        }
    }

    /// Field names in schema order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields in the schema.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema holds no fields. Always false for valid schemas.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate field names in schema order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}
