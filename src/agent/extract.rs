//! 区切りブロックの抽出
//!
//! `extract_tag` が設定されたエージェントは、レスポンス全体ではなく
//! `<tag>` と `</tag>` に挟まれた部分だけを成果物にします。

use crate::error::ExtractionError;

/// 最初の `<tag>` と、それに続く最初の `</tag>` の間のテキストを返す（前後の空白は除去）
pub fn extract_block(text: &str, tag: &str) -> Result<String, ExtractionError> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let not_found = || ExtractionError {
        tag: tag.to_string(),
    };

    let start = text.find(&open).ok_or_else(not_found)? + open.len();
    let len = text[start..].find(&close).ok_or_else(not_found)?;

    Ok(text[start..start + len].trim().to_string())
}
