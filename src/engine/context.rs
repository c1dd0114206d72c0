//! トラバーサル中のコンテキストバンドル
//!
//! # 責務
//!
//! - 祖先エージェント名 → 祖先の出力テキスト の対応を祖先順に保持
//! - 拡張は常に新しい値を返し、呼び出し元のバンドルは変更しない
//!
//! ファンアウトでは兄弟ノードが同じ親のバンドルを受け取りますが、
//! 互いの追加分は見えません。
//!
//! # 使用例
//!
//! ```rust
//! use agentflow::engine::context::ContextBundle;
//!
//! let root = ContextBundle::new();
//! let after_a = root.extended("A", "output of A");
//! let after_b = after_a.extended("B", "output of B");
//!
//! assert!(root.is_empty());
//! assert_eq!(after_a.get("B"), None);
//! assert_eq!(after_b.get("A"), Some("output of A"));
//! ```

use std::collections::HashMap;

/// 祖先の出力1件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub agent: String,
    pub output: String,
}

/// 祖先出力の不変バンドル
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBundle {
    entries: Vec<ContextEntry>,
}

impl ContextBundle {
    /// 空のバンドル（ルートノード用）
    pub fn new() -> Self {
        Self::default()
    }

    /// `agent` の出力を末尾に加えた新しいバンドルを返す
    ///
    /// 同名の祖先が既にある場合は、その位置の出力を置き換えます。
    pub fn extended(&self, agent: &str, output: impl Into<String>) -> Self {
        let output = output.into();
        let mut entries = self.entries.clone();
        match entries.iter_mut().find(|entry| entry.agent == agent) {
            Some(existing) => existing.output = output,
            None => entries.push(ContextEntry {
                agent: agent.to_string(),
                output,
            }),
        }
        Self { entries }
    }

    /// 祖先の出力を取得
    pub fn get(&self, agent: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.agent == agent)
            .map(|entry| entry.output.as_str())
    }

    /// 祖先順のイテレーター（ルートが先頭）
    pub fn iter(&self) -> impl Iterator<Item = &ContextEntry> {
        self.entries.iter()
    }

    pub fn agents(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.agent.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// テンプレート展開用の変数表
    pub fn variables(&self) -> HashMap<&str, &str> {
        self.entries
            .iter()
            .map(|entry| (entry.agent.as_str(), entry.output.as_str()))
            .collect()
    }
}
