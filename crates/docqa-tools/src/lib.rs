//! Single-shot flows that need no index: invoice image Q&A, resume scoring
//! and text-to-SQL.

pub mod invoice;
pub mod resume;
pub mod sql;

pub use invoice::ask_invoice;
pub use resume::{parse_ats_report, score_resume, AtsReport};
pub use sql::{execute, text_to_sql, SqlAnswer, SqlPolicy, StudentStore};
