// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQL statement classification for cache invalidation.

/// Leading keywords that make a statement mutating.
const MUTATING_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "alter", "drop", "truncate", "create", "replace", "merge",
];

/// Whether a statement can change data, judged by its leading keyword.
/// Heuristic by design: when in doubt (say, a DO block), treat it as
/// mutating so the cache never serves stale rows.
pub fn is_mutating_sql(sql: &str) -> bool {
    let Some(keyword) = first_keyword(sql) else {
        return false;
    };
    if keyword.eq_ignore_ascii_case("select") || keyword.eq_ignore_ascii_case("with") {
        // WITH ... SELECT is the common case; WITH ... INSERT is caught by
        // scanning the rest of the statement.
        return sql_contains_mutation(sql);
    }
    MUTATING_KEYWORDS.iter().any(|k| keyword.eq_ignore_ascii_case(k))
        || !keyword.eq_ignore_ascii_case("select")
            && !keyword.eq_ignore_ascii_case("show")
            && !keyword.eq_ignore_ascii_case("explain")
            && sql_contains_mutation(sql)
}

fn sql_contains_mutation(sql: &str) -> bool {
    sql.split_whitespace().any(|word| {
        MUTATING_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
    })
}

/// First keyword after whitespace and `--`/`/* */` comments.
fn first_keyword(sql: &str) -> Option<&str> {
    let mut rest = sql.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(nl) => after[nl + 1..].trim_start(),
                None => return None,
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(end) => after[end + 2..].trim_start(),
                None => return None,
            };
        } else {
            break;
        }
    }
    rest.split(|c: char| c.is_whitespace() || c == '(').find(|s| !s.is_empty())
}

#[cfg(test)]
#[path = "sql_tests.rs"]
mod tests;
