// 依存関係順序サービス
//
// 外部キー参照に基づいてテーブルの作成順序（参照先が先）を決定します。
// Kahnのアルゴリズムによるトポロジカルソートで、同順位は名前順に並べます。

use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// 依存関係を考慮した作成順序
///
/// `dependencies` はテーブル名 → 参照しているテーブル名の集合です。
/// 対象外のテーブルへの参照と自己参照は無視されます。
/// 循環参照がある場合は、残りのテーブルを名前順に末尾へ追加します。
pub fn creation_order(dependencies: &BTreeMap<String, BTreeSet<String>>) -> Vec<String> {
    let names: BTreeSet<&str> = dependencies.keys().map(String::as_str).collect();

    // 未解決の依存先（対象内・自己参照以外）
    let mut pending: BTreeMap<&str, BTreeSet<&str>> = dependencies
        .iter()
        .map(|(table, deps)| {
            let deps = deps
                .iter()
                .map(String::as_str)
                .filter(|dep| *dep != table.as_str() && names.contains(dep))
                .collect();
            (table.as_str(), deps)
        })
        .collect();

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(name, _)| *name)
        .collect();

    let mut sorted = Vec::with_capacity(names.len());

    while let Some(node) = ready.pop_first() {
        pending.remove(node);
        sorted.push(node.to_string());

        // このノードに依存しているノードの未解決数を減らす
        for (other, deps) in pending.iter_mut() {
            if deps.remove(node) && deps.is_empty() {
                ready.insert(*other);
            }
        }
    }

    if !pending.is_empty() {
        let remaining: Vec<&str> = pending.keys().copied().collect();
        warn!(
            tables = ?remaining,
            "Circular foreign key references detected; remaining tables are ordered by name"
        );
        sorted.extend(remaining.into_iter().map(str::to_string));
    }

    sorted
}

/// 依存関係を考慮した削除順序（作成順の逆）
pub fn drop_order(dependencies: &BTreeMap<String, BTreeSet<String>>) -> Vec<String> {
    let mut order = creation_order(dependencies);
    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
        edges
            .iter()
            .map(|(table, deps)| {
                (
                    table.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_referenced_tables_come_first() {
        let deps = graph(&[
            ("comments", &["posts", "users"]),
            ("posts", &["users"]),
            ("users", &[]),
        ]);
        assert_eq!(creation_order(&deps), vec!["users", "posts", "comments"]);
        assert_eq!(drop_order(&deps), vec!["comments", "posts", "users"]);
    }

    #[test]
    fn test_ties_are_broken_by_name() {
        let deps = graph(&[("b", &[]), ("a", &[]), ("c", &["a"])]);
        assert_eq!(creation_order(&deps), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_self_and_external_references_are_ignored() {
        let deps = graph(&[
            ("categories", &["categories"]),
            ("posts", &["categories", "external_users"]),
        ]);
        assert_eq!(creation_order(&deps), vec!["categories", "posts"]);
    }

    #[test]
    fn test_cycle_falls_back_to_name_order() {
        let deps = graph(&[("a", &["b"]), ("b", &["a"]), ("root", &[])]);
        assert_eq!(creation_order(&deps), vec!["root", "a", "b"]);
    }
}
