// SQLクォートユーティリティ
//
// 識別子・文字列リテラルのクォートと、複数文のSQLテキストの分割を提供します。
// レンダラーとスキーマライターの両方から使用される共有モジュールです。

use crate::core::config::Dialect;

/// PostgreSQL用識別子クォート（ダブルクォート）
///
/// 識別子内のダブルクォートは二重にエスケープします。
///
/// # Examples
/// ```
/// use ptah::adapters::sql_quote::quote_identifier_postgres;
/// assert_eq!(quote_identifier_postgres("users"), r#""users""#);
/// assert_eq!(quote_identifier_postgres(r#"table"name"#), r#""table""name""#);
/// ```
pub fn quote_identifier_postgres(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// MySQL用識別子クォート（バッククォート）
///
/// 識別子内のバッククォートは二重にエスケープします。
///
/// # Examples
/// ```
/// use ptah::adapters::sql_quote::quote_identifier_mysql;
/// assert_eq!(quote_identifier_mysql("users"), "`users`");
/// assert_eq!(quote_identifier_mysql("table`name"), "`table``name`");
/// ```
pub fn quote_identifier_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// 方言に応じた識別子クォート
pub fn quote_identifier(dialect: Dialect, name: &str) -> String {
    if dialect.is_mysql_family() {
        quote_identifier_mysql(name)
    } else {
        quote_identifier_postgres(name)
    }
}

/// 文字列リテラルのクォート
///
/// シングルクォートは二重に、MySQL系ではバックスラッシュもエスケープします。
///
/// # Examples
/// ```
/// use ptah::adapters::sql_quote::quote_literal;
/// use ptah::Dialect;
/// assert_eq!(quote_literal(Dialect::PostgreSQL, "it's"), "'it''s'");
/// assert_eq!(quote_literal(Dialect::MySQL, r"a\b"), r"'a\\b'");
/// ```
pub fn quote_literal(dialect: Dialect, value: &str) -> String {
    let escaped = value.replace('\'', "''");
    let escaped = if dialect.is_mysql_family() {
        escaped.replace('\\', "\\\\")
    } else {
        escaped
    };
    format!("'{}'", escaped)
}

/// 複数のSQL文を含むテキストを個々の文に分割
///
/// 文字列リテラル・クォート識別子・ドル記号クォート内のセミコロンでは分割しません。
/// `--` 行コメントと `/* */` ブロックコメントは取り除かれ、
/// コメントのみのチャンクは結果に含まれません。
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    let mut quote: Option<char> = None;
    let mut dollar_tag: Option<String> = None;

    while i < chars.len() {
        let c = chars[i];

        if let Some(tag) = dollar_tag.as_ref() {
            if c == '$' && starts_with_at(&chars, i, tag) {
                current.push_str(tag);
                i += tag.chars().count();
                dollar_tag = None;
            } else {
                current.push(c);
                i += 1;
            }
            continue;
        }

        if let Some(q) = quote {
            current.push(c);
            if c == q {
                // 連続するクォートはエスケープ
                if chars.get(i + 1) == Some(&q) {
                    current.push(q);
                    i += 2;
                    continue;
                }
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            '$' => match dollar_tag_at(&chars, i) {
                Some(tag) => {
                    i += tag.chars().count();
                    current.push_str(&tag);
                    dollar_tag = Some(tag);
                }
                None => {
                    current.push(c);
                    i += 1;
                }
            },
            ';' => {
                push_statement(&mut statements, &current);
                current.clear();
                i += 1;
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }

    push_statement(&mut statements, &current);
    statements
}

/// コメントのみ（または空）の文かどうか
pub fn is_comment_only(sql: &str) -> bool {
    split_sql_statements(sql).is_empty()
}

fn push_statement(statements: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

fn starts_with_at(chars: &[char], at: usize, needle: &str) -> bool {
    let mut idx = at;
    for n in needle.chars() {
        if chars.get(idx) != Some(&n) {
            return false;
        }
        idx += 1;
    }
    true
}

// `$tag$` 形式のタグを読み取る（`$1` のようなプレースホルダーは対象外）
fn dollar_tag_at(chars: &[char], at: usize) -> Option<String> {
    let mut end = at + 1;
    while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
        end += 1;
    }
    if chars.get(end) != Some(&'$') {
        return None;
    }
    if chars.get(at + 1).is_some_and(|ch| ch.is_ascii_digit()) {
        return None;
    }
    Some(chars[at..=end].iter().collect())
}
