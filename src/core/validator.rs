//! Static validation and correction of LLM-generated SQL.
//!
//! Deterministic and side-effect-free: same input, same verdict. Rejections
//! carry a short user-facing reason in the deployment language so the caller
//! can relay it directly.
//!
//! The destructive-keyword guard is a token-level text check, not a SQL
//! parser. It can over-reject (a column legitimately named like a keyword)
//! and under-reject (a keyword inside a quoted literal). The allow-list and
//! the store's read-only role are the guards that actually hold; a SQL-aware
//! tokenizer is the production hardening path here.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::core::catalog;

const DESTRUCTIVE_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "TRUNCATE", "ALTER", "CREATE", "GRANT", "REVOKE",
];

/// Appended when the statement carries no LIMIT at all.
const DEFAULT_LIMIT: u64 = 100;
/// Hard cap; anything above is clamped.
const MAX_LIMIT: u64 = 1000;

static DESTRUCTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b({})\b", DESTRUCTIVE_KEYWORDS.join("|")))
        .expect("destructive keyword regex")
});

static RELATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:FROM|JOIN)\s+([A-Za-z0-9_.]+)").expect("relation regex")
});

static COUNT_STAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)COUNT\s*\(\s*\*\s*\)").expect("count(*) regex"));

static DATE_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20\d{2})[-/]").expect("date year regex"));

static LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+(\d+)").expect("limit regex"));

static GENERIC_SCAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)SELECT\s+.+\s+FROM\s+fieldops\.work_orders\s+LIMIT\s+1\b")
        .expect("generic scan regex")
});

static CTE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([A-Za-z_][A-Za-z0-9_]*)\s+AS\s*\(").expect("cte name regex")
});

/// Run the full validation/correction pipeline over a candidate statement.
/// `Ok` carries the corrected SQL ready for execution; `Err` carries the
/// user-facing rejection reason.
pub fn validate_and_correct(raw: &str, today: NaiveDate) -> Result<String, String> {
    // Strip markdown fencing and keep only the first statement.
    let mut sql = raw
        .replace("```sql", "")
        .replace("```", "")
        .trim()
        .to_string();
    if let Some(idx) = sql.find(';') {
        sql.truncate(idx);
        sql = sql.trim().to_string();
    }

    // Known aggregation bug: counting rows on a view where one visit spans
    // several rows inflates visit counts. Rewrite before any other check so
    // later corrections see the final statement.
    sql = force_distinct_on_multi_row_views(&sql);

    let upper = sql.to_uppercase();
    if !(upper.starts_with("SELECT") || upper.starts_with("WITH")) {
        return Err("A consulta deve começar com SELECT ou WITH.".to_string());
    }

    if let Some(caps) = DESTRUCTIVE_RE.captures(&upper) {
        return Err(format!("Comando {} não permitido.", &caps[1]));
    }

    // Schema-qualified names go through the allow-list. Unqualified names
    // are only legitimate as same-statement CTE aliases (which never carry a
    // dot); anything else unqualified is an out-of-catalog reference.
    let cte_names = extract_cte_names(&sql);
    for relation in extract_relations(&sql) {
        let allowed = if relation.contains('.') {
            catalog::is_allowed(&relation)
        } else {
            cte_names.iter().any(|c| c.eq_ignore_ascii_case(&relation))
        };
        if !allowed {
            return Err(format!(
                "Referência a tabela/visão não permitida: {}.",
                relation
            ));
        }
    }

    let lower = sql.to_lowercase();
    for (view, column) in catalog::invalid_columns() {
        if lower.contains(column) {
            return Err(format!(
                "A coluna {} não existe em {}. Use os_created_at como referência de período.",
                column, view
            ));
        }
    }

    let min_year = today.year() - 1;
    let max_year = today.year();
    for year in extract_date_years(&sql) {
        if year < min_year || year > max_year {
            return Err(format!(
                "Ano {} inválido na consulta (intervalo aceito: {}-{}).",
                year, min_year, max_year
            ));
        }
    }

    sql = enforce_limit(&sql);

    if is_generic_scan(&sql) {
        return Err("Consulta genérica demais. Especifique OS, período ou objetivo.".to_string());
    }

    Ok(sql)
}

/// Rewrite bare `COUNT(*)` into `COUNT(DISTINCT <key>)` whenever the
/// statement references a view with several rows per visit.
fn force_distinct_on_multi_row_views(sql: &str) -> String {
    for view in catalog::multi_row_views() {
        if sql.contains(view.qualified_name) {
            let replacement = format!("COUNT(DISTINCT {})", view.grouping_key);
            return COUNT_STAR_RE.replace_all(sql, replacement.as_str()).into_owned();
        }
    }
    sql.to_string()
}

/// Candidate relation names following FROM/JOIN. CTE aliases included;
/// the caller filters on the presence of a dot.
fn extract_relations(sql: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in RELATION_RE.captures_iter(sql) {
        let name = caps[1].trim_end_matches('.').to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Names introduced as common-table-expression aliases (`name AS (`).
fn extract_cte_names(sql: &str) -> Vec<String> {
    CTE_NAME_RE
        .captures_iter(sql)
        .map(|c| c[1].to_string())
        .collect()
}

/// Year literals that look like the start of a date (followed by `-` or `/`).
fn extract_date_years(sql: &str) -> Vec<i32> {
    DATE_YEAR_RE
        .captures_iter(sql)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}

/// Append `LIMIT 100` when absent; clamp `LIMIT n > 1000` to 1000;
/// leave 1..=1000 untouched.
fn enforce_limit(sql: &str) -> String {
    match LIMIT_RE.captures(sql) {
        None => format!("{}\nLIMIT {}", sql, DEFAULT_LIMIT),
        Some(caps) => {
            let n: u64 = caps[1].parse().unwrap_or(DEFAULT_LIMIT);
            if n > MAX_LIMIT {
                LIMIT_RE
                    .replace(sql, format!("LIMIT {}", MAX_LIMIT).as_str())
                    .into_owned()
            } else {
                sql.to_string()
            }
        }
    }
}

/// An unfiltered scan of the work-orders table with `LIMIT 1` and neither
/// WHERE nor ORDER BY answers nothing useful; force the caller to narrow.
fn is_generic_scan(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    GENERIC_SCAN_RE.is_match(sql) && !upper.contains("WHERE") && !upper.contains("ORDER BY")
}
