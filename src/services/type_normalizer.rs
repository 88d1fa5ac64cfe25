// 型正規化サービス
//
// 方言ごとに異なる型表記を比較用の正規形に変換します。
// 長さ・精度パラメータを取り除き、小文字化し、同義型を代表名にまとめます。

/// 型文字列を正規化
///
/// 未知の型はパラメータを除いた小文字表記のまま返します。
///
/// # Examples
/// ```
/// use ptah::services::type_normalizer::normalize_type;
/// assert_eq!(normalize_type("SERIAL"), normalize_type("INTEGER"));
/// assert_eq!(normalize_type("NUMERIC(10,2)"), "decimal");
/// assert_eq!(normalize_type("VARCHAR(255)"), "varchar");
/// ```
pub fn normalize_type(raw: &str) -> String {
    let lowered = collapse_whitespace(&raw.to_ascii_lowercase());

    // MySQLの真偽値はパラメータ付きでのみ判別できる
    if lowered == "tinyint(1)" {
        return "boolean".to_string();
    }

    let base = strip_parameters(&lowered);
    let canonical = match base.as_str() {
        "varchar" | "character varying" => "varchar",
        "char" | "character" | "bpchar" => "char",
        "serial" | "serial4" | "integer" | "int" | "int4" => "integer",
        "bigserial" | "serial8" | "bigint" | "int8" => "bigint",
        "smallserial" | "serial2" | "smallint" | "int2" => "smallint",
        "numeric" | "decimal" => "decimal",
        "timestamp" | "timestamp without time zone" | "datetime" => "timestamp",
        "timestamptz" | "timestamp with time zone" => "timestamptz",
        "time" | "time without time zone" => "time",
        "timetz" | "time with time zone" => "timetz",
        "boolean" | "bool" => "boolean",
        "double precision" | "double" | "float8" => "double",
        "real" | "float4" => "real",
        other => other,
    };
    canonical.to_string()
}

/// 正規化した型が一致するかどうか
pub fn types_equivalent(left: &str, right: &str) -> bool {
    normalize_type(left) == normalize_type(right)
}

// 括弧で囲まれたパラメータをすべて取り除く（`timestamp(6) with time zone` にも対応）
fn strip_parameters(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut depth = 0usize;
    for c in value.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => result.push(c),
            _ => {}
        }
    }
    collapse_whitespace(&result)
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
