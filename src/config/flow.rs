//! フロー定義の読み込みと検証
//!
//! # 責務
//!
//! エージェント名 → 後続エージェント名リスト の対応を JSON から読み込み、
//! トラバーサル順序とファンアウトを定義する [`FlowGraph`] を提供します。
//!
//! ## 使用例
//!
//! ```json
//! {
//!   "summarize": ["critique", "translate"],
//!   "critique": ["rewrite"]
//! }
//! ```
//!
//! - 最初に宣言されたキー（`summarize`）がルート
//! - キーとして現れない後続（`translate`, `rewrite`）は終端ノード
//! - 循環は読み込み時に [`ConfigError::Validation`] として拒否されます
//! - エージェント名は英数字・`_`・`-`・`.` のみ（`{{名前}}` で参照できること）

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde_json::Value;

use super::dto::FlowDto;
use super::read_config_file;
use crate::agent::template::is_placeholder_name;
use crate::error::ConfigError;

/// フロー定義（ドメインモデル）
///
/// バリデーション済みで、空でなく循環を含まないことが保証されています。
#[derive(Debug, Clone)]
pub struct FlowGraph {
    entries: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl FlowGraph {
    /// JSON ファイルからフロー定義を読み込む
    ///
    /// # 戻り値
    ///
    /// * `Ok(FlowGraph)` - 読み込みに成功した場合
    /// * `Err(ConfigError)` - ファイルが存在しない、不正な形式、空、または循環を含む場合
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = read_config_file(path.as_ref())?;
        Self::from_json(&content)
    }

    /// JSON 文字列からフロー定義を読み込む
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let dto: FlowDto = serde_json::from_str(json)?;
        Self::try_from(dto)
    }

    /// ルート（エントリーポイント）のエージェント名
    pub fn root(&self) -> &str {
        // 空のグラフは TryFrom で拒否済み
        &self.entries[0].0
    }

    /// 後続エージェント名（宣言順）
    ///
    /// キーとして宣言されていないエージェントは終端ノードとして空スライスを返します。
    pub fn successors(&self, agent: &str) -> &[String] {
        self.index
            .get(agent)
            .map(|&i| self.entries[i].1.as_slice())
            .unwrap_or(&[])
    }

    /// グラフ内のどこかに現れるエージェントかどうか
    pub fn contains(&self, agent: &str) -> bool {
        self.nodes().iter().any(|name| *name == agent)
    }

    /// グラフに現れるすべてのエージェント名（初出順、重複なし）
    pub fn nodes(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for (name, successors) in &self.entries {
            for candidate in std::iter::once(name).chain(successors) {
                if seen.insert(candidate.as_str()) {
                    nodes.push(candidate.as_str());
                }
            }
        }
        nodes
    }

    /// 循環を探す。見つかった場合は循環を構成する経路を返す
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a FlowGraph,
            node: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(node) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|n| *n == node).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(node.to_string());
                    return Some(cycle);
                }
                None => {}
            }

            marks.insert(node, Mark::Visiting);
            path.push(node);
            for next in graph.successors(node) {
                if let Some(cycle) = visit(graph, next, marks, path) {
                    return Some(cycle);
                }
            }
            path.pop();
            marks.insert(node, Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        for (name, _) in &self.entries {
            let mut path = Vec::new();
            if let Some(cycle) = visit(self, name, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
        None
    }
}

/// エージェント名はテンプレートのプレースホルダーとして参照できる文字だけを許す
fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation("エージェント名が空です".to_string()));
    }
    if !is_placeholder_name(name) || name == "." || name == ".." {
        return Err(ConfigError::Validation(format!(
            "エージェント名 '{name}' に使えない文字が含まれています（英数字・_・-・. のみ）"
        )));
    }
    Ok(())
}

/// DTO からドメインモデルへの変換
///
/// 値が文字列の配列でない場合、エージェント名が不正な場合、グラフが空の場合、循環を含む場合は
/// [`ConfigError::Validation`] を返します。
impl TryFrom<FlowDto> for FlowGraph {
    type Error = ConfigError;

    fn try_from(dto: FlowDto) -> Result<Self, Self::Error> {
        if dto.is_empty() {
            return Err(ConfigError::Validation("フロー定義が空です".to_string()));
        }

        let mut entries = Vec::with_capacity(dto.len());
        let mut index = HashMap::with_capacity(dto.len());

        for (name, value) in dto {
            validate_name(&name)?;

            let Value::Array(items) = value else {
                return Err(ConfigError::Validation(format!(
                    "'{name}' の後続は配列である必要があります"
                )));
            };

            let mut successors = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(next) => {
                        validate_name(&next)?;
                        successors.push(next);
                    }
                    other => {
                        return Err(ConfigError::Validation(format!(
                            "'{name}' の後続に不正な値があります: {other}"
                        )));
                    }
                }
            }

            index.insert(name.clone(), entries.len());
            entries.push((name, successors));
        }

        let graph = Self { entries, index };
        if let Some(cycle) = graph.find_cycle() {
            return Err(ConfigError::Validation(format!(
                "フロー定義に循環があります: {}",
                cycle.join(" -> ")
            )));
        }

        Ok(graph)
    }
}
