//! Report rendering and output.
//!
//! The report is assembled completely in memory once all three queries have
//! succeeded, then written to a temporary file in the output directory and
//! moved into place under its final name. A failed run never leaves a
//! partial report behind, and an existing report is never overwritten.

use crate::db::QueryRunner;
use crate::error::{ReportError, Result};
use crate::queries::{
    find_error_riddled_days, find_top_three_articles, find_views_per_author, ArticleViews,
    AuthorViews, ErrorDay,
};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Line terminator used throughout the report.
pub const LINE_ENDING: &str = "\r\n";

const BANNER: [&str; 3] = [
    "------------------",
    "----- REPORT -----",
    "------------------",
];

const TOP_ARTICLES_QUESTION: &str = "1. What are the most popular three articles of all time?";
const TOP_AUTHORS_QUESTION: &str = "2. Who are the most popular article authors of all time?";
const ERROR_DAYS_QUESTION: &str = "3. On which days did more than 1% of requests lead to errors?";

/// Everything that goes into one report file.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub generated_at: NaiveDateTime,
    pub top_articles: Vec<ArticleViews>,
    pub author_views: Vec<AuthorViews>,
    pub error_days: Vec<ErrorDay>,
}

impl Report {
    /// File name for this report, e.g. `report-07-17-2016-09-05-03.txt`.
    pub fn file_name(&self) -> String {
        report_file_name(self.generated_at)
    }

    /// Renders the full report text with `\r\n` line endings.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = BANNER.iter().map(|line| line.to_string()).collect();
        lines.push(format_timestamp(self.generated_at));
        push_separator(&mut lines);

        lines.push(TOP_ARTICLES_QUESTION.to_string());
        lines.extend(self.top_articles.iter().map(format_article_line));
        push_separator(&mut lines);

        lines.push(TOP_AUTHORS_QUESTION.to_string());
        lines.extend(self.author_views.iter().map(format_author_line));
        push_separator(&mut lines);

        lines.push(ERROR_DAYS_QUESTION.to_string());
        lines.extend(self.error_days.iter().map(format_error_day_line));
        push_separator(&mut lines);

        let mut text = lines.join(LINE_ENDING);
        text.push_str(LINE_ENDING);
        text
    }
}

// Sections are set apart by two empty lines.
fn push_separator(lines: &mut Vec<String>) {
    lines.push(String::new());
    lines.push(String::new());
}

/// `report-<MM-DD-YYYY-HH-MM-SS>.txt`
pub fn report_file_name(generated_at: NaiveDateTime) -> String {
    format!("report-{}.txt", generated_at.format("%m-%d-%Y-%H-%M-%S"))
}

/// `<Month> <DD>, <YYYY> - <HH:MM:SS>`
pub fn format_timestamp(generated_at: NaiveDateTime) -> String {
    generated_at.format("%B %d, %Y - %H:%M:%S").to_string()
}

/// `<Month> <DD>, <YYYY>`
pub fn format_day(day: NaiveDate) -> String {
    day.format("%B %d, %Y").to_string()
}

pub fn format_article_line(article: &ArticleViews) -> String {
    format!("    \"{}\" - {} views", article.title, article.views)
}

pub fn format_author_line(author: &AuthorViews) -> String {
    format!("    {} -- {} views", author.name, author.views)
}

pub fn format_error_day_line(day: &ErrorDay) -> String {
    format!(
        "    {} -- {:.1}% errors",
        format_day(day.day),
        day.error_percentage
    )
}

/// Writes `contents` to `dir/file_name` without ever exposing a partial file.
///
/// Fails with a file system error if the target already exists.
pub fn write_report(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf> {
    let target = dir.join(file_name);

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
        ReportError::file_system(format!(
            "Cannot create report file in {}: {e}",
            dir.display()
        ))
    })?;
    debug!("Writing report to temporary file {}", tmp.path().display());

    tmp.write_all(contents.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| ReportError::file_system(format!("Cannot write report file: {e}")))?;

    tmp.persist_noclobber(&target).map_err(|e| {
        ReportError::file_system(format!(
            "Cannot create report file {}: {}",
            target.display(),
            e.error
        ))
    })?;

    Ok(target)
}

/// Runs the three report queries and writes the report file.
pub struct ReportGenerator {
    runner: QueryRunner,
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(runner: QueryRunner, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            output_dir: output_dir.into(),
        }
    }

    /// Generates a report stamped with the current local time.
    pub async fn generate(&self) -> Result<PathBuf> {
        self.generate_at(Local::now().naive_local()).await
    }

    /// Generates a report stamped with `generated_at`.
    ///
    /// Returns the path of the written report.
    pub async fn generate_at(&self, generated_at: NaiveDateTime) -> Result<PathBuf> {
        let report = self.collect(generated_at).await?;
        let path = write_report(&self.output_dir, &report.file_name(), &report.render())?;
        info!("Report written to {}", path.display());
        Ok(path)
    }

    /// Runs all three queries in order and gathers their rows.
    pub async fn collect(&self, generated_at: NaiveDateTime) -> Result<Report> {
        println!("...");
        let top_articles = find_top_three_articles(&self.runner).await?;

        println!("...");
        let author_views = find_views_per_author(&self.runner).await?;

        println!("...");
        let error_days = find_error_riddled_days(&self.runner).await?;

        Ok(Report {
            generated_at,
            top_articles,
            author_views,
            error_days,
        })
    }
}
