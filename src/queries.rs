//! The three analytical queries behind the report.
//!
//! Each statement is fixed and takes no parameters. Rows come back through
//! [`QueryRunner`] as loosely typed values and are converted here into one
//! struct per query, so a wrong column shape fails loudly as a query error.

use crate::db::{QueryRunner, Row, Value};
use crate::error::{ReportError, Result};
use chrono::NaiveDate;
use tracing::info;

/// The three most viewed articles.
///
/// Counts the joined log column rather than `*` so an article without log
/// entries shows up with zero views instead of one.
pub const TOP_ARTICLES_SQL: &str = "\
SELECT articles.title, count(article_log.url) AS num_views \
FROM article_log \
RIGHT JOIN articles \
ON articles.slug = article_log.url \
GROUP BY articles.slug, articles.title \
ORDER BY num_views DESC \
LIMIT 3";

/// Total article views per author, including authors without articles.
pub const VIEWS_PER_AUTHOR_SQL: &str = "\
SELECT authors.name, count(article_log.url) AS num_views \
FROM authors \
LEFT JOIN articles \
ON (authors.id = articles.author) \
LEFT JOIN article_log \
ON (articles.slug = article_log.url) \
GROUP BY authors.id, authors.name \
ORDER BY num_views DESC";

/// Days on which more than 1% of requests returned a 4xx or 5xx status.
///
/// Days without any error join to a NULL count, which yields a NULL
/// percentage and drops out in the outer filter.
pub const ERROR_RIDDLED_DAYS_SQL: &str = "\
SELECT day, error_percentage \
FROM ( \
    SELECT request_query.day, \
           CAST(100.0 * num_errors / num_total AS DOUBLE PRECISION) AS error_percentage \
    FROM ( \
        SELECT date(time) AS day, count(*) AS num_total \
        FROM log \
        GROUP BY day \
    ) AS request_query \
    LEFT JOIN ( \
        SELECT date(time) AS day, count(*) AS num_errors \
        FROM log \
        WHERE (status LIKE '4%') OR (status LIKE '5%') \
        GROUP BY day \
    ) AS error_query \
    ON request_query.day = error_query.day \
) AS percentage_query \
WHERE error_percentage > 1.0 \
ORDER BY day";

/// Maximum number of articles in the top-articles section.
pub const TOP_ARTICLES_LIMIT: usize = 3;

/// A typed row of one of the report queries.
pub trait ReportRow: Sized {
    /// Name used in diagnostics.
    const QUERY_NAME: &'static str;

    /// Converts a raw row, failing if the shape does not match.
    fn from_row(row: &Row) -> Result<Self>;
}

/// Views of a single article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleViews {
    pub title: String,
    pub views: i64,
}

/// Views of all articles written by one author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorViews {
    pub name: String,
    pub views: i64,
}

/// A day with its share of failed requests, in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorDay {
    pub day: NaiveDate,
    pub error_percentage: f64,
}

impl ReportRow for ArticleViews {
    const QUERY_NAME: &'static str = "top articles";

    fn from_row(row: &Row) -> Result<Self> {
        let [title, views] = columns::<2>(row, Self::QUERY_NAME)?;
        Ok(Self {
            title: text(title, Self::QUERY_NAME)?,
            views: count(views, Self::QUERY_NAME)?,
        })
    }
}

impl ReportRow for AuthorViews {
    const QUERY_NAME: &'static str = "views per author";

    fn from_row(row: &Row) -> Result<Self> {
        let [name, views] = columns::<2>(row, Self::QUERY_NAME)?;
        Ok(Self {
            name: text(name, Self::QUERY_NAME)?,
            views: count(views, Self::QUERY_NAME)?,
        })
    }
}

impl ReportRow for ErrorDay {
    const QUERY_NAME: &'static str = "error-riddled days";

    fn from_row(row: &Row) -> Result<Self> {
        let [day, percentage] = columns::<2>(row, Self::QUERY_NAME)?;
        let day = day
            .as_date()
            .ok_or_else(|| unexpected(Self::QUERY_NAME, "a date", day))?;
        let error_percentage = percentage
            .as_f64()
            .ok_or_else(|| unexpected(Self::QUERY_NAME, "a number", percentage))?;
        Ok(Self {
            day,
            error_percentage,
        })
    }
}

/// Finds the three most viewed articles, most viewed first.
pub async fn find_top_three_articles(runner: &QueryRunner) -> Result<Vec<ArticleViews>> {
    fetch(runner, TOP_ARTICLES_SQL).await
}

/// Finds the total views per author, most viewed first.
pub async fn find_views_per_author(runner: &QueryRunner) -> Result<Vec<AuthorViews>> {
    fetch(runner, VIEWS_PER_AUTHOR_SQL).await
}

/// Finds the days with more than 1% failed requests, oldest first.
pub async fn find_error_riddled_days(runner: &QueryRunner) -> Result<Vec<ErrorDay>> {
    fetch(runner, ERROR_RIDDLED_DAYS_SQL).await
}

async fn fetch<T: ReportRow>(runner: &QueryRunner, sql: &str) -> Result<Vec<T>> {
    let result = runner.run(sql).await?;
    info!(
        "{} query returned {} rows in {:?}",
        T::QUERY_NAME,
        result.row_count(),
        result.execution_time
    );
    result.rows.iter().map(T::from_row).collect()
}

fn columns<'a, const N: usize>(row: &'a Row, query: &str) -> Result<[&'a Value; N]> {
    let values: Vec<&Value> = row.iter().collect();
    values.try_into().map_err(|values: Vec<&Value>| {
        ReportError::query(format!(
            "{query} query returned {} columns, expected {N}",
            values.len()
        ))
    })
}

fn text(value: &Value, query: &str) -> Result<String> {
    value
        .as_str()
        .map(String::from)
        .ok_or_else(|| unexpected(query, "text", value))
}

fn count(value: &Value, query: &str) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| unexpected(query, "an integer", value))
}

fn unexpected(query: &str, expected: &str, found: &Value) -> ReportError {
    ReportError::query(format!(
        "{query} query returned {found:?} where {expected} was expected"
    ))
}
