//! End-to-end report generation against a seeded news database.

use super::fixture::{empty_database, NewsFixture, SqliteConnector};
use chrono::{NaiveDate, NaiveDateTime};
use newsreport::db::QueryRunner;
use newsreport::error::ReportError;
use newsreport::report::ReportGenerator;
use pretty_assertions::assert_eq;
use regex::Regex;
use tempfile::{tempdir, TempDir};

async fn hello_world() -> (SqliteConnector, TempDir) {
    NewsFixture::new()
        .author(1, "Jane Doe")
        .article("hello-world", "Hello World", 1)
        .hits(5, "2016-07-17 10:00:00", "hello-world", "200 OK")
        .build()
        .await
}

fn generated_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2016, 7, 17)
        .unwrap()
        .and_hms_opt(18, 30, 0)
        .unwrap()
}

#[tokio::test]
async fn test_report_for_single_article() {
    let (connector, _db_dir) = hello_world().await;
    let out_dir = tempdir().unwrap();
    let generator = ReportGenerator::new(QueryRunner::new(connector), out_dir.path());

    let path = generator.generate_at(generated_at()).await.unwrap();
    let text = std::fs::read_to_string(&path).unwrap();

    let expected = [
        "------------------",
        "----- REPORT -----",
        "------------------",
        "July 17, 2016 - 18:30:00",
        "",
        "",
        "1. What are the most popular three articles of all time?",
        "    \"Hello World\" - 5 views",
        "",
        "",
        "2. Who are the most popular article authors of all time?",
        "    Jane Doe -- 5 views",
        "",
        "",
        "3. On which days did more than 1% of requests lead to errors?",
        "",
        "",
    ]
    .join("\r\n")
        + "\r\n";
    assert_eq!(text, expected);
}

#[tokio::test]
async fn test_report_lists_error_days() {
    let (connector, _db_dir) = NewsFixture::new()
        .author(1, "Jane Doe")
        .article("hello-world", "Hello World", 1)
        .hits(7, "2016-07-17 08:00:00", "hello-world", "200 OK")
        .hits(2, "2016-07-17 09:00:00", "hello-worl", "404 NOT FOUND")
        .hits(1, "2016-07-17 10:00:00", "hello-world", "500 INTERNAL SERVER ERROR")
        .build()
        .await;
    let out_dir = tempdir().unwrap();
    let generator = ReportGenerator::new(QueryRunner::new(connector), out_dir.path());

    let path = generator.generate_at(generated_at()).await.unwrap();
    let text = std::fs::read_to_string(&path).unwrap();

    assert!(text.contains(
        "3. On which days did more than 1% of requests lead to errors?\r\n    July 17, 2016 -- 30.0% errors\r\n"
    ));
    assert!(text.contains("    \"Hello World\" - 8 views\r\n"));
}

#[tokio::test]
async fn test_report_file_name_pattern() {
    let (connector, _db_dir) = hello_world().await;
    let out_dir = tempdir().unwrap();
    let generator = ReportGenerator::new(QueryRunner::new(connector), out_dir.path());

    let path = generator.generate().await.unwrap();

    let pattern = Regex::new(r"^report-\d{2}-\d{2}-\d{4}-\d{2}-\d{2}-\d{2}\.txt$").unwrap();
    let file_name = path.file_name().unwrap().to_str().unwrap();
    assert!(pattern.is_match(file_name), "unexpected name {file_name}");
    assert_eq!(path.parent().unwrap(), out_dir.path());
}

#[tokio::test]
async fn test_same_second_collision_is_rejected() {
    let (connector, _db_dir) = hello_world().await;
    let out_dir = tempdir().unwrap();
    let generator = ReportGenerator::new(QueryRunner::new(connector), out_dir.path());

    let first = generator.generate_at(generated_at()).await.unwrap();
    let original = std::fs::read_to_string(&first).unwrap();

    let err = generator.generate_at(generated_at()).await.unwrap_err();

    assert!(matches!(err, ReportError::FileSystem(_)));
    assert_eq!(std::fs::read_to_string(&first).unwrap(), original);
    assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_unreachable_database_is_connection_error() {
    let db_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let connector = SqliteConnector::new(&db_dir.path().join("absent.db"));
    let generator = ReportGenerator::new(QueryRunner::new(connector), out_dir.path());

    let err = generator.generate_at(generated_at()).await.unwrap_err();

    assert!(matches!(err, ReportError::Connection(_)));
    assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_schema_is_query_error() {
    let (connector, _db_dir) = empty_database().await;
    let out_dir = tempdir().unwrap();
    let generator = ReportGenerator::new(QueryRunner::new(connector), out_dir.path());

    let err = generator.generate_at(generated_at()).await.unwrap_err();

    assert!(matches!(err, ReportError::Query(_)));
    assert!(err.to_string().contains("no such table"));
    assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
}
