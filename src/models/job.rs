use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, Postgres, QueryBuilder};

/// The three job categories scraped from the site. Each one owns a disjoint
/// slice of the `jobs` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Regular,
    Freshers,
    Internships,
}

impl SourceType {
    /// Run order used by the coordinator.
    pub const ALL: [SourceType; 3] = [
        SourceType::Regular,
        SourceType::Freshers,
        SourceType::Internships,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Regular => "regular",
            SourceType::Freshers => "freshers",
            SourceType::Internships => "internships",
        }
    }

    /// Listing path on the site, relative to the site root.
    pub fn listing_path(self) -> &'static str {
        match self {
            SourceType::Regular => "/jobs",
            SourceType::Freshers => "/jobs/freshers",
            SourceType::Internships => "/jobs/internships",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown job source '{0}' (expected regular, freshers or internships)")]
pub struct UnknownSource(pub String);

impl FromStr for SourceType {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "regular" => Ok(SourceType::Regular),
            "freshers" => Ok(SourceType::Freshers),
            "internships" => Ok(SourceType::Internships),
            _ => Err(UnknownSource(s.to_string())),
        }
    }
}

/// Fields read off one listing card. Every field already carries its
/// default when the markup did not provide it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFields {
    pub title: String,
    pub company_location: String,
    pub salary: String,
    pub job_type: String,
    pub posted: String,
    pub skills: String,
    pub eligible_years: String,
    pub apply_url: String,
    pub company_logo_url: Option<String>,
}

/// One normalized job listing as persisted for a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub title: String,
    pub company_location: String,
    pub salary: String,
    pub job_type: String,
    pub posted: String,
    pub skills: String,
    pub eligible_years: String,
    pub apply_url: String,
    pub company_logo_url: Option<String>,
    pub source_type: SourceType,
    pub fetched_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn from_card(card: CardFields, source_type: SourceType, fetched_at: DateTime<Utc>) -> Self {
        Self {
            title: card.title,
            company_location: card.company_location,
            salary: card.salary,
            job_type: card.job_type,
            posted: card.posted,
            skills: card.skills,
            eligible_years: card.eligible_years,
            apply_url: card.apply_url,
            company_logo_url: card.company_logo_url,
            source_type,
            fetched_at,
        }
    }

    /// Write one page worth of records into the staging table for a run.
    pub async fn stage_batch(
        conn: &mut PgConnection,
        run_id: i32,
        page: u32,
        records: &[JobRecord],
    ) -> Result<u64, sqlx::Error> {
        if records.is_empty() {
            return Ok(0);
        }

        let page = i32::try_from(page).unwrap_or(i32::MAX);
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO staged_jobs (run_id, page, source_type, title, company_location, salary, job_type, posted, skills, eligible_years, apply_url, company_logo_url, fetched_at) ",
        );
        builder.push_values(records, |mut row, record| {
            row.push_bind(run_id)
                .push_bind(page)
                .push_bind(record.source_type.as_str())
                .push_bind(&record.title)
                .push_bind(&record.company_location)
                .push_bind(&record.salary)
                .push_bind(&record.job_type)
                .push_bind(&record.posted)
                .push_bind(&record.skills)
                .push_bind(&record.eligible_years)
                .push_bind(&record.apply_url)
                .push_bind(&record.company_logo_url)
                .push_bind(record.fetched_at);
        });

        let result = builder.build().execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    /// Replace the live collection of `source` with everything staged by
    /// `run_id`. Must run inside a transaction so readers never observe the
    /// collection empty.
    pub async fn swap_in_staged(
        conn: &mut PgConnection,
        source: SourceType,
        run_id: i32,
    ) -> Result<u64, sqlx::Error> {
        sqlx::query("DELETE FROM jobs WHERE source_type = $1")
            .bind(source.as_str())
            .execute(&mut *conn)
            .await?;

        let inserted = sqlx::query(
            "INSERT INTO jobs (source_type, title, company_location, salary, job_type, posted, skills, eligible_years, apply_url, company_logo_url, fetched_at)
             SELECT source_type, title, company_location, salary, job_type, posted, skills, eligible_years, apply_url, company_logo_url, fetched_at
             FROM staged_jobs WHERE run_id = $1 ORDER BY page, id",
        )
        .bind(run_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Self::discard_staged(conn, run_id).await?;
        Ok(inserted)
    }

    pub async fn discard_staged(conn: &mut PgConnection, run_id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM staged_jobs WHERE run_id = $1")
            .bind(run_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
