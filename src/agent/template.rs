//! ユーザープロンプトテンプレートの展開
//!
//! プレースホルダーは `{{name}}` 形式です（括弧内の前後の空白は許容）。
//! 名前に使える文字は英数字・`_`・`-`・`.` で、それ以外を含む `{{...}}` は
//! ただのテキストとして扱われます。フロー定義のエージェント名も同じ文字に
//! 制限されているため、祖先はすべてプレースホルダーで参照できます。
//!
//! 参照されたプレースホルダーに対応する値が1つでも欠けている場合、
//! 部分的に置換した文字列は返さず、[`TemplateRenderError`] になります。
//! [`render_or_verbatim`] はこのエラーをログに記録し、テンプレート原文を返します。
//!
//! ```rust
//! use std::collections::HashMap;
//! use agentflow::agent::template::render;
//!
//! let vars = HashMap::from([("draft", "hello")]);
//! assert_eq!(render("Review: {{ draft }}", &vars).unwrap(), "Review: hello");
//! assert!(render("Result: {{previous_1}}", &HashMap::new()).is_err());
//! ```

use std::collections::HashMap;

use crate::error::TemplateRenderError;

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// プレースホルダー名として使えるかどうか
pub fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn parse(template: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            break;
        };

        let name = after_open[..close].trim();
        if is_placeholder_name(name) {
            if open > 0 {
                segments.push(Segment::Text(&rest[..open]));
            }
            segments.push(Segment::Placeholder(name));
            rest = &after_open[close + 2..];
        } else {
            segments.push(Segment::Text(&rest[..open + 2]));
            rest = after_open;
        }
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    segments
}

/// テンプレートを展開する
///
/// # エラー
///
/// 参照されたプレースホルダーのうち `vars` に存在しないものがあれば
/// [`TemplateRenderError`] を返します。
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> Result<String, TemplateRenderError> {
    let segments = parse(template);

    let mut missing: Vec<String> = Vec::new();
    for segment in &segments {
        if let Segment::Placeholder(name) = segment
            && !vars.contains_key(name)
            && !missing.iter().any(|m| m == name)
        {
            missing.push(name.to_string());
        }
    }
    if !missing.is_empty() {
        return Err(TemplateRenderError { missing });
    }

    let mut rendered = String::with_capacity(template.len());
    for segment in segments {
        match segment {
            Segment::Text(text) => rendered.push_str(text),
            Segment::Placeholder(name) => rendered.push_str(vars[name]),
        }
    }
    Ok(rendered)
}

/// テンプレートを展開し、失敗した場合は警告を記録して原文を返す
pub fn render_or_verbatim(agent: &str, template: &str, vars: &HashMap<&str, &str>) -> String {
    match render(template, vars) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::warn!(agent, error = %e, "falling back to unrendered user template");
            template.to_string()
        }
    }
}
