//! Extraction prompt construction.
//!
//! The prompt enumerates the target fields with ordinal prefixes ("1. 家賃",
//! "2. 管理費", …) and asks for a JSON object keyed by exactly those names.
//! The provider tends to echo the ordinal prefixes back in its keys; the
//! client strips them again during normalization.

use chirashi_core::{FieldSchema, NO_INFORMATION};
use std::fmt::Write;

/// Build the extraction instruction for one flyer image.
#[must_use]
pub fn build_extraction_prompt(schema: &FieldSchema) -> String {
    let mut field_list = String::new();
    for (i, field) in schema.iter().enumerate() {
        let _ = writeln!(field_list, "{}. {}", i + 1, field);
    }

    format!(
        r#"この画像は賃貸物件の広告チラシです。画像から以下の項目を読み取り、JSONオブジェクトとして出力してください。

項目:
{field_list}
ルール:
- 出力はJSONオブジェクトのみ。説明文やマークダウンは不要です。
- キーは上記の項目名をそのまま使ってください。
- 画像から読み取れない項目は "{NO_INFORMATION}" としてください。
- 複数の値がある項目（設備など）は文字列の配列にしてください。
- 金額や面積は単位も含めて転記してください（例: "8.5万円", "25.5m²"）。

JSON:"#
    )
}
