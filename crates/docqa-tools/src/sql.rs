//! Natural-language questions over the `STUDENT` table.
//!
//! The model writes the SQL; this module decides whether it may run. By
//! default the database is opened read-only and only a single read-only
//! statement is accepted.

use rusqlite::types::ValueRef;
use rusqlite::{params, Batch, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use docqa_core::config::SqlSettings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::Generator;
use docqa_core::types::GenerationRequest;

pub const SQL_PROMPT: &str = r#"
You are an expert in converting English questions to SQL query!
The SQL database has the name STUDENT and has the following columns - NAME, CLASS, SECTION and MARKS.

For example,
Example 1 - How many entries of records are present?, the SQL command would be something like this: SELECT COUNT(*) FROM STUDENT;
Example 2 - Tell me all the students studying in Data Science class?, the SQL command will be something like this: SELECT * FROM STUDENT WHERE CLASS="Data Science";
also the SQL code should not have ``` at the beginning or end and sql word in the output.
"#;

const CREATE_STUDENT: &str =
    "CREATE TABLE IF NOT EXISTS STUDENT(NAME VARCHAR(25), CLASS VARCHAR(25), SECTION VARCHAR(25), MARKS INT)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    pub class: String,
    pub section: String,
    pub marks: i64,
}

impl Student {
    pub fn new(name: &str, class: &str, section: &str, marks: i64) -> Self {
        Self { name: name.to_string(), class: class.to_string(), section: section.to_string(), marks }
    }
}

/// Rows inserted by `docqa init-db`.
pub fn sample_students() -> Vec<Student> {
    vec![
        Student::new("Krish", "Data Science", "A", 90),
        Student::new("Sudhanshu", "Data Science", "B", 100),
        Student::new("Darius", "Data Science", "A", 86),
        Student::new("Vikash", "DEVOPS", "A", 50),
        Student::new("Dipesh", "DEVOPS", "A", 35),
    ]
}

/// Read/write handle used to create and populate the database.
pub struct StudentStore {
    conn: Connection,
    path: PathBuf,
}

impl StudentStore {
    /// Open (creating if needed) the database and ensure the table exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Query(format!("cannot create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path).map_err(query_err)?;
        conn.execute(CREATE_STUDENT, []).map_err(query_err)?;
        Ok(Self { conn, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn insert(&self, student: &Student) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO STUDENT (NAME, CLASS, SECTION, MARKS) VALUES (?1, ?2, ?3, ?4)",
                params![student.name, student.class, student.section, student.marks],
            )
            .map_err(query_err)?;
        Ok(())
    }

    /// Insert the sample rows. Returns how many were inserted.
    pub fn seed_sample(&self) -> Result<usize> {
        let students = sample_students();
        for s in &students {
            self.insert(s)?;
        }
        info!("Seeded {} students into {}", students.len(), self.path.display());
        Ok(students.len())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM STUDENT", [], |row| row.get(0)).map_err(query_err)?;
        Ok(n.max(0) as usize)
    }
}

/// Whether generated statements may change the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlPolicy {
    pub allow_writes: bool,
}

impl SqlPolicy {
    pub fn read_only() -> Self { Self { allow_writes: false } }
}

impl From<&SqlSettings> for SqlPolicy {
    fn from(s: &SqlSettings) -> Self { Self { allow_writes: s.allow_writes } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(r) => SqlValue::Real(r),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("None"),
            SqlValue::Integer(i) => write!(f, "{i}"),
            SqlValue::Real(r) => write!(f, "{r:?}"),
            SqlValue::Text(t) => write_text_repr(f, t),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Quote like a Python `str` repr: single quotes unless the text holds one
/// and no double quote, backslash-escaping whatever else needs it.
fn write_text_repr(f: &mut fmt::Formatter<'_>, t: &str) -> fmt::Result {
    let quote = if t.contains('\'') && !t.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(t.len() + 2);
    out.push(quote);
    for c in t.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    f.write_str(&out)
}

/// One result row. Displays as a tuple: `(5,)`, `('Krish', 90)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlRow(pub Vec<SqlValue>);

impl fmt::Display for SqlRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        if values.len() == 1 {
            write!(f, "({},)", values[0])
        } else {
            write!(f, "({})", values.join(", "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlAnswer {
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<SqlRow>,
}

impl fmt::Display for SqlAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = self.rows.iter().map(ToString::to_string).collect();
        write!(f, "{}", rows.join("\n"))
    }
}

/// Model output is used as SQL after trimming surrounding whitespace only.
pub fn clean_sql(raw: &str) -> &str { raw.trim() }

/// Run one generated statement against `db_path` under `policy`.
pub fn execute(db_path: &Path, sql: &str, policy: SqlPolicy) -> Result<SqlAnswer> {
    let sql = clean_sql(sql);
    let rejected = |reason: &str| Error::QueryRejected { reason: reason.to_string(), sql: sql.to_string() };
    if sql.is_empty() {
        return Err(rejected("empty statement"));
    }
    let conn = if policy.allow_writes {
        Connection::open(db_path)
    } else {
        Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
    }
    .map_err(|e| Error::Query(format!("cannot open {}: {e}", db_path.display())))?;

    let mut batch = Batch::new(&conn, sql);
    let mut stmt = batch.next().map_err(query_err)?.ok_or_else(|| rejected("empty statement"))?;
    match batch.next() {
        Ok(None) => {}
        Ok(Some(_)) | Err(_) => {
            warn!("Rejected multi-statement SQL: {}", sql);
            return Err(rejected("only a single statement is allowed"));
        }
    }
    if !policy.allow_writes && !stmt.readonly() {
        warn!("Rejected non-read-only SQL: {}", sql);
        return Err(rejected("statement would modify the database"));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let width = columns.len();
    let mut rows = Vec::new();
    let mut cursor = stmt.query([]).map_err(query_err)?;
    while let Some(row) = cursor.next().map_err(query_err)? {
        let values = (0..width)
            .map(|i| row.get_ref(i).map(SqlValue::from))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_err)?;
        rows.push(SqlRow(values));
    }
    debug!("SQL returned {} row(s)", rows.len());
    Ok(SqlAnswer { sql: sql.to_string(), columns, rows })
}

/// Translate `question` to SQL with the generator, then run it.
pub async fn text_to_sql<G>(generator: &G, db_path: &Path, question: &str, policy: SqlPolicy) -> Result<SqlAnswer>
where
    G: Generator + ?Sized,
{
    let request = GenerationRequest::new().text(SQL_PROMPT).text(question);
    let generated = generator.generate(&request).await?;
    info!("Generated SQL: {}", clean_sql(&generated));
    execute(db_path, &generated, policy)
}

fn query_err(e: rusqlite::Error) -> Error { Error::Query(e.to_string()) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_render_as_tuples() {
        assert_eq!(SqlRow(vec![SqlValue::Integer(5)]).to_string(), "(5,)");
        assert_eq!(
            SqlRow(vec![SqlValue::Text("Krish".into()), SqlValue::Integer(90), SqlValue::Null]).to_string(),
            "('Krish', 90, None)"
        );
        assert_eq!(SqlRow(vec![SqlValue::Real(1.0)]).to_string(), "(1.0,)");
    }

    #[test]
    fn text_with_quotes_keeps_python_repr() {
        let text = |s: &str| SqlValue::Text(s.to_string()).to_string();
        assert_eq!(text("O'Brien"), r#""O'Brien""#);
        assert_eq!(text(r#"say "hi""#), r#"'say "hi"'"#);
        assert_eq!(text(r#"it's "x""#), r#"'it\'s "x"'"#);
        assert_eq!(text("a\\b"), r"'a\\b'");
    }

    #[test]
    fn only_whitespace_is_trimmed() {
        assert_eq!(clean_sql("\n  SELECT * FROM STUDENT;  \n"), "SELECT * FROM STUDENT;");
        assert_eq!(clean_sql("```sql SELECT 1```"), "```sql SELECT 1```");
    }
}
