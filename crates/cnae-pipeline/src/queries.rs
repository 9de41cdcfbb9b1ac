//! Read-only queries over the gold table
//!
//! Table names come from validated configuration and are quoted; user input
//! only ever reaches the database as a bound parameter.

use crate::db::quote_ident;
use cnae_common::CnaeRecord;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use sqlx::PgPool;

pub const DEFAULT_SECTOR_LIMIT: i64 = 10;
pub const DEFAULT_SEARCH_LIMIT: i64 = 20;

/// Number of activity codes sharing a two-character prefix
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SectorCount {
    pub sector: String,
    pub quantity: i64,
}

pub async fn total_cnaes(pool: &PgPool, table: &str) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) AS total FROM {}", quote_ident(table));
    sqlx::query_scalar::<_, i64>(&sql).fetch_one(pool).await
}

/// Largest sectors first
pub async fn cnaes_by_sector(
    pool: &PgPool,
    table: &str,
    limit: i64,
) -> Result<Vec<SectorCount>, sqlx::Error> {
    let sql = format!(
        "SELECT SUBSTRING(codigo_cnae, 1, 2) AS sector, COUNT(*) AS quantity \
         FROM {} \
         WHERE codigo_cnae IS NOT NULL \
         GROUP BY 1 \
         ORDER BY 2 DESC, 1 ASC \
         LIMIT $1",
        quote_ident(table)
    );
    sqlx::query_as::<_, SectorCount>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Case-insensitive substring search on the description
pub async fn search_cnaes(
    pool: &PgPool,
    table: &str,
    keyword: &str,
    limit: i64,
) -> Result<Vec<CnaeRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT codigo_cnae, descricao_cnae \
         FROM {} \
         WHERE descricao_cnae ILIKE $1 \
         ORDER BY codigo_cnae \
         LIMIT $2",
        quote_ident(table)
    );
    let rows = sqlx::query_as::<_, (String, Option<String>)>(&sql)
        .bind(format!("%{}%", escape_like(keyword)))
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(codigo_cnae, descricao_cnae)| CnaeRecord {
            codigo_cnae,
            descricao_cnae,
        })
        .collect())
}

/// Make `%`, `_` and `\` match literally in a LIKE pattern
pub fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

pub fn format_sectors(rows: &[SectorCount]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Sector", "Activities"]);
    for row in rows {
        table.add_row(vec![row.sector.clone(), row.quantity.to_string()]);
    }
    format!("{}\n", table)
}

pub fn format_records(rows: &[CnaeRecord]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Code", "Description"]);
    for row in rows {
        table.add_row(vec![
            row.codigo_cnae.clone(),
            row.descricao_cnae.clone().unwrap_or_else(|| "NULL".to_string()),
        ]);
    }
    format!("{}\n", table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\x"), "c:\\\\x");
    }

    #[test]
    fn test_escape_like_leaves_quotes_alone() {
        assert_eq!(escape_like("d'agua"), "d'agua");
        assert_eq!(escape_like("soja"), "soja");
    }

    #[test]
    fn test_format_records_shows_null_description() {
        let out = format_records(&[
            CnaeRecord::new("6201501", "Desenvolvimento de software"),
            CnaeRecord {
                codigo_cnae: "0111302".to_string(),
                descricao_cnae: None,
            },
        ]);
        assert!(out.contains("6201501"));
        assert!(out.contains("Desenvolvimento de software"));
        assert!(out.contains("NULL"));
    }

    #[test]
    fn test_format_sectors() {
        let out = format_sectors(&[SectorCount {
            sector: "62".to_string(),
            quantity: 7,
        }]);
        assert!(out.contains("Sector"));
        assert!(out.contains("62"));
        assert!(out.contains('7'));
    }
}
