//! newsreport - Activity reports for the news website database.
//!
//! The library exposes the query definitions, the query runner and report
//! rendering. Nothing here touches the database or the file system until a
//! [`report::ReportGenerator`] is asked to generate.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod queries;
pub mod report;
