//! Postgres translation of [`ShowFilter`] and a pool-backed show store.

use std::collections::HashMap;

use anyhow::{anyhow, Context};
use showrec_core::{
    AltNamePattern, CanonicalShow, NameTarget, PartialDate, ShowField, ShowFilter, ShowType,
    SourceBinding, UrlMatch,
};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::info;
use uuid::Uuid;

use crate::StoreError;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS shows (
    id UUID PRIMARY KEY,
    external_id INTEGER UNIQUE,
    name TEXT NOT NULL,
    alt_names TEXT[] NOT NULL DEFAULT '{}',
    season TEXT,
    show_type TEXT CHECK (show_type IN ('tv', 'ova', 'ona', 'movie', 'special')),
    description TEXT,
    thumbnail_id TEXT,
    genres TEXT[] NOT NULL DEFAULT '{}',
    episode_amount INTEGER,
    episode_duration INTEGER,
    airing_start_year INTEGER,
    airing_start_month INTEGER,
    airing_start_day INTEGER,
    airing_start_hour INTEGER,
    airing_start_minute INTEGER,
    airing_end_year INTEGER,
    airing_end_month INTEGER,
    airing_end_day INTEGER,
    airing_end_hour INTEGER,
    airing_end_minute INTEGER,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS show_source_bindings (
    show_id UUID NOT NULL REFERENCES shows (id) ON DELETE CASCADE,
    source_id TEXT NOT NULL,
    content_tag TEXT NOT NULL,
    url TEXT NOT NULL,
    PRIMARY KEY (show_id, source_id, content_tag, url)
);

CREATE INDEX IF NOT EXISTS show_source_bindings_source_idx
    ON show_source_bindings (source_id, content_tag);
"#;

/// A partial date as five nullable integer columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartialDateColumns {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub day: Option<i32>,
    pub hour: Option<i32>,
    pub minute: Option<i32>,
}

impl PartialDateColumns {
    fn from_row(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        Ok(Self {
            year: row.try_get(format!("{prefix}_year").as_str())?,
            month: row.try_get(format!("{prefix}_month").as_str())?,
            day: row.try_get(format!("{prefix}_day").as_str())?,
            hour: row.try_get(format!("{prefix}_hour").as_str())?,
            minute: row.try_get(format!("{prefix}_minute").as_str())?,
        })
    }
}

impl From<PartialDate> for PartialDateColumns {
    fn from(date: PartialDate) -> Self {
        let column = |v: Option<u32>| v.and_then(|v| i32::try_from(v).ok());
        Self {
            year: date.year,
            month: column(date.month),
            day: column(date.day),
            hour: column(date.hour),
            minute: column(date.minute),
        }
    }
}

impl From<PartialDateColumns> for PartialDate {
    fn from(columns: PartialDateColumns) -> Self {
        let field = |v: Option<i32>| v.and_then(|v| u32::try_from(v).ok());
        Self {
            year: columns.year,
            month: field(columns.month),
            day: field(columns.day),
            hour: field(columns.hour),
            minute: field(columns.minute),
        }
    }
}

fn field_column(field: ShowField) -> &'static str {
    match field {
        ShowField::Season => "s.season",
        ShowField::ShowType => "s.show_type",
        ShowField::ExternalId => "s.external_id",
    }
}

/// Appends `filter` as a boolean SQL expression over the `shows s` alias.
///
/// Equality tests are wrapped in `COALESCE(.., FALSE)` so NULL columns keep
/// the filter's two-valued semantics under `NOT`.
pub fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ShowFilter) {
    match filter {
        ShowFilter::True => {
            builder.push("TRUE");
        }
        ShowFilter::And(filters) | ShowFilter::Or(filters) if filters.is_empty() => {
            builder.push(if matches!(filter, ShowFilter::And(_)) { "TRUE" } else { "FALSE" });
        }
        ShowFilter::And(filters) | ShowFilter::Or(filters) => {
            let joiner = if matches!(filter, ShowFilter::And(_)) { " AND " } else { " OR " };
            builder.push("(");
            for (index, inner) in filters.iter().enumerate() {
                if index > 0 {
                    builder.push(joiner);
                }
                push_filter(builder, inner);
            }
            builder.push(")");
        }
        ShowFilter::Not(inner) => {
            builder.push("NOT (");
            push_filter(builder, inner);
            builder.push(")");
        }
        ShowFilter::NameMatches { target, name } => {
            let pattern = AltNamePattern::compile(name).as_str().to_string();
            match target {
                NameTarget::Name => {
                    builder.push("s.name ~* ").push_bind(pattern);
                }
                NameTarget::AltNames => {
                    builder
                        .push("EXISTS (SELECT 1 FROM unnest(s.alt_names) AS alt(name) WHERE alt.name ~* ")
                        .push_bind(pattern)
                        .push(")");
                }
            }
        }
        ShowFilter::SeasonEquals(season) => {
            builder
                .push("COALESCE(s.season = ")
                .push_bind(season.clone())
                .push(", FALSE)");
        }
        ShowFilter::ShowTypeEquals(show_type) => {
            builder
                .push("COALESCE(s.show_type = ")
                .push_bind(show_type.as_str().to_string())
                .push(", FALSE)");
        }
        ShowFilter::ExternalIdEquals(external_id) => match i32::try_from(*external_id) {
            Ok(external_id) => {
                builder
                    .push("COALESCE(s.external_id = ")
                    .push_bind(external_id)
                    .push(", FALSE)");
            }
            Err(_) => {
                builder.push("FALSE");
            }
        },
        ShowFilter::IdEquals(id) => {
            builder.push("s.id = ").push_bind(*id);
        }
        ShowFilter::FieldAbsent(field) => {
            builder.push(field_column(*field)).push(" IS NULL");
        }
        ShowFilter::HasBinding(wanted) => {
            builder
                .push("EXISTS (SELECT 1 FROM show_source_bindings b WHERE b.show_id = s.id AND b.source_id = ")
                .push_bind(wanted.source_id.clone())
                .push(" AND b.content_tag = ")
                .push_bind(wanted.content_tag.clone());
            match &wanted.url {
                UrlMatch::Equals(url) => builder.push(" AND b.url = ").push_bind(url.clone()),
                UrlMatch::NotEquals(url) => builder.push(" AND b.url <> ").push_bind(url.clone()),
            };
            builder.push(")");
        }
    }
}

pub fn candidate_query(filter: &ShowFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT s.* FROM shows s WHERE ");
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY s.created_at, s.id");
    builder
}

fn optional_u32(value: Option<i32>, column: &str) -> Result<Option<u32>, StoreError> {
    value
        .map(u32::try_from)
        .transpose()
        .with_context(|| format!("negative value in column {column}"))
        .map_err(StoreError::from)
}

fn optional_i32(value: Option<u32>, column: &str) -> Result<Option<i32>, StoreError> {
    value
        .map(i32::try_from)
        .transpose()
        .with_context(|| format!("value out of range for column {column}"))
        .map_err(StoreError::from)
}

fn show_from_row(row: &PgRow) -> Result<CanonicalShow, StoreError> {
    let show_type: Option<String> = row.try_get("show_type")?;
    let show_type = show_type
        .map(|value| value.parse::<ShowType>())
        .transpose()
        .map_err(|err| anyhow!(err))?;

    Ok(CanonicalShow {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        alt_names: row.try_get("alt_names")?,
        bindings: Vec::new(),
        season: row.try_get("season")?,
        show_type,
        external_id: optional_u32(row.try_get("external_id")?, "external_id")?,
        airing_start: PartialDateColumns::from_row(row, "airing_start")?.into(),
        airing_end: PartialDateColumns::from_row(row, "airing_end")?.into(),
        description: row.try_get("description")?,
        thumbnail_id: row.try_get("thumbnail_id")?,
        genres: row.try_get("genres")?,
        episode_amount: optional_u32(row.try_get("episode_amount")?, "episode_amount")?,
        episode_duration: optional_u32(row.try_get("episode_duration")?, "episode_duration")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct PgShowStore {
    pool: PgPool,
}

impl PgShowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        info!("show schema is up to date");
        Ok(())
    }

    pub async fn find(&self, filter: &ShowFilter) -> Result<Vec<CanonicalShow>, StoreError> {
        let rows = candidate_query(filter).build().fetch_all(&self.pool).await?;
        let mut shows = rows
            .iter()
            .map(show_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        if shows.is_empty() {
            return Ok(shows);
        }

        let ids: Vec<Uuid> = shows.iter().map(|show| show.id).collect();
        let binding_rows = sqlx::query(
            r#"
            SELECT show_id, source_id, content_tag, url
              FROM show_source_bindings
             WHERE show_id = ANY($1)
             ORDER BY show_id, source_id, content_tag, url
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut bindings: HashMap<Uuid, Vec<SourceBinding>> = HashMap::new();
        for row in binding_rows {
            let show_id: Uuid = row.try_get("show_id")?;
            bindings.entry(show_id).or_default().push(SourceBinding {
                source_id: row.try_get("source_id")?,
                content_tag: row.try_get("content_tag")?,
                url: row.try_get("url")?,
            });
        }
        for show in &mut shows {
            show.bindings = bindings.remove(&show.id).unwrap_or_default();
        }
        Ok(shows)
    }

    /// Inserts or replaces one show and its bindings in a single transaction.
    pub async fn upsert(&self, show: &CanonicalShow) -> Result<(), StoreError> {
        let start = PartialDateColumns::from(show.airing_start);
        let end = PartialDateColumns::from(show.airing_end);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO shows (
                id, external_id, name, alt_names, season, show_type, description,
                thumbnail_id, genres, episode_amount, episode_duration,
                airing_start_year, airing_start_month, airing_start_day,
                airing_start_hour, airing_start_minute,
                airing_end_year, airing_end_month, airing_end_day,
                airing_end_hour, airing_end_minute,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23)
            ON CONFLICT (id) DO UPDATE SET
                external_id = EXCLUDED.external_id,
                name = EXCLUDED.name,
                alt_names = EXCLUDED.alt_names,
                season = EXCLUDED.season,
                show_type = EXCLUDED.show_type,
                description = EXCLUDED.description,
                thumbnail_id = EXCLUDED.thumbnail_id,
                genres = EXCLUDED.genres,
                episode_amount = EXCLUDED.episode_amount,
                episode_duration = EXCLUDED.episode_duration,
                airing_start_year = EXCLUDED.airing_start_year,
                airing_start_month = EXCLUDED.airing_start_month,
                airing_start_day = EXCLUDED.airing_start_day,
                airing_start_hour = EXCLUDED.airing_start_hour,
                airing_start_minute = EXCLUDED.airing_start_minute,
                airing_end_year = EXCLUDED.airing_end_year,
                airing_end_month = EXCLUDED.airing_end_month,
                airing_end_day = EXCLUDED.airing_end_day,
                airing_end_hour = EXCLUDED.airing_end_hour,
                airing_end_minute = EXCLUDED.airing_end_minute,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(show.id)
        .bind(optional_i32(show.external_id, "external_id")?)
        .bind(&show.name)
        .bind(&show.alt_names)
        .bind(&show.season)
        .bind(show.show_type.map(|t| t.as_str()))
        .bind(&show.description)
        .bind(&show.thumbnail_id)
        .bind(&show.genres)
        .bind(optional_i32(show.episode_amount, "episode_amount")?)
        .bind(optional_i32(show.episode_duration, "episode_duration")?)
        .bind(start.year)
        .bind(start.month)
        .bind(start.day)
        .bind(start.hour)
        .bind(start.minute)
        .bind(end.year)
        .bind(end.month)
        .bind(end.day)
        .bind(end.hour)
        .bind(end.minute)
        .bind(show.created_at)
        .bind(show.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM show_source_bindings WHERE show_id = $1")
            .bind(show.id)
            .execute(&mut *tx)
            .await?;
        for binding in &show.bindings {
            sqlx::query(
                r#"
                INSERT INTO show_source_bindings (show_id, source_id, content_tag, url)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(show.id)
            .bind(&binding.source_id)
            .bind(&binding.content_tag)
            .bind(&binding.url)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use showrec_core::BindingMatch;

    #[test]
    fn year_month_only_round_trips_through_nullable_columns() {
        let date = PartialDate {
            year: Some(2016),
            month: Some(4),
            ..PartialDate::default()
        };
        let columns = PartialDateColumns::from(date);
        assert_eq!(
            columns,
            PartialDateColumns {
                year: Some(2016),
                month: Some(4),
                day: None,
                hour: None,
                minute: None,
            }
        );
        let back = PartialDate::from(columns);
        assert_eq!(back, date);
        assert_eq!(back.day, None);
        assert_eq!(back.hour, None);
        assert_eq!(back.minute, None);
    }

    #[test]
    fn midnight_survives_as_zero_not_absence() {
        let date = PartialDate {
            year: Some(2016),
            month: Some(4),
            day: Some(2),
            hour: Some(0),
            minute: Some(0),
        };
        assert_eq!(PartialDate::from(PartialDateColumns::from(date)), date);
    }

    #[test]
    fn filter_translates_to_parameterized_sql() {
        let filter = ShowFilter::or(vec![
            ShowFilter::and(vec![
                ShowFilter::none_of(vec![ShowFilter::HasBinding(BindingMatch {
                    source_id: "crunchyroll".into(),
                    content_tag: "sub".into(),
                    url: UrlMatch::NotEquals("https://cr/erased".into()),
                })]),
                ShowFilter::NameMatches {
                    target: NameTarget::AltNames,
                    name: "Erased".into(),
                },
                ShowFilter::FieldAbsent(ShowField::ExternalId),
            ]),
            ShowFilter::ExternalIdEquals(31181),
        ]);
        let query = candidate_query(&filter);
        assert_eq!(
            query.sql(),
            "SELECT s.* FROM shows s WHERE ((NOT ((EXISTS (SELECT 1 FROM show_source_bindings b \
             WHERE b.show_id = s.id AND b.source_id = $1 AND b.content_tag = $2 AND b.url <> $3))) \
             AND EXISTS (SELECT 1 FROM unnest(s.alt_names) AS alt(name) WHERE alt.name ~* $4) \
             AND s.external_id IS NULL) OR COALESCE(s.external_id = $5, FALSE)) \
             ORDER BY s.created_at, s.id"
        );
    }

    #[test]
    fn empty_groups_translate_to_constants() {
        let mut builder = QueryBuilder::<Postgres>::new("");
        push_filter(&mut builder, &ShowFilter::or(vec![]));
        builder.push(" ");
        push_filter(&mut builder, &ShowFilter::and(vec![]));
        assert_eq!(builder.sql(), "FALSE TRUE");
    }
}
