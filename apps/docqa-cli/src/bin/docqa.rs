use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docqa_core::chunker::{Chunker, ChunkingConfig};
use docqa_core::config::{resolve_with_base, Config};
use docqa_core::ingest::collect_pdfs;
use docqa_core::types::Document;
use docqa_core::Error;
use docqa_embed::get_default_embedder;
use docqa_genai::GeminiGenerator;
use docqa_rag::{build_index, PdfChat};
use docqa_tools::{ask_invoice, score_resume, text_to_sql, SqlPolicy, StudentStore};

#[derive(Parser)]
#[command(name = "docqa", about = "Ask Gemini about PDFs, invoices, resumes and a student database", version)]
struct Cli {
    /// Vector index directory (overrides index.dir)
    #[arg(long, global = true)]
    index_dir: Option<String>,

    /// SQLite database for `sql` and `init-db` (overrides sql.database)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk and embed PDFs into a fresh index
    Build {
        /// PDF files or directories containing them
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Answer a question from the indexed PDFs
    Ask { question: String },

    /// Ask a question about an invoice image (jpg, jpeg, png)
    Invoice { image: PathBuf, question: String },

    /// Score a resume PDF against a job description
    Resume {
        pdf: PathBuf,
        job_description: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Translate a question to SQL and run it against the STUDENT table
    Sql {
        question: String,
        /// Print the generated SQL and rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create the STUDENT table and insert sample rows if it is empty
    InitDb {
        /// Only create the table
        #[arg(long)]
        no_seed: bool,
    },
}

fn init_logging(level: &str) {
    // RUST_LOG wins over the configured level
    let filter = if std::env::var("RUST_LOG").is_ok() { EnvFilter::from_default_env() } else { EnvFilter::new(level) };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

/// `[stage] message` for workspace errors, `[error] message` otherwise.
fn render_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<Error>() {
        Some(e) => format!("[{}] {}", e.stage(), e),
        None => format!("[error] {err:#}"),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    let settings = config.settings()?;
    init_logging(&settings.logging.level);

    let cwd = std::env::current_dir()?;
    let index_dir = resolve_with_base(&cwd, cli.index_dir.as_deref().unwrap_or(&settings.index.dir));
    let database = resolve_with_base(&cwd, cli.database.as_deref().unwrap_or(&settings.sql.database));

    match cli.command {
        Command::Build { paths } => {
            let documents = collect_pdfs(&paths)?;
            if documents.is_empty() {
                let searched: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                return Err(Error::Extraction { document: searched.join(", "), reason: "no PDF files found".to_string() }.into());
            }
            let embedder = get_default_embedder(&settings.genai)?;
            let chunker = Chunker::new(ChunkingConfig::from(&settings.chunking))?;
            let meta = build_index(&documents, &chunker, &index_dir, embedder.as_ref()).await?;
            println!(
                "Indexed {} chunk(s) from {} document(s) into {} ({})",
                meta.chunk_count,
                documents.len(),
                index_dir.display(),
                meta.embedder_id
            );
        }
        Command::Ask { question } => {
            let embedder = get_default_embedder(&settings.genai)?;
            let generator = GeminiGenerator::from_settings(&settings.genai)?;
            let chat = PdfChat::from_settings(embedder, generator, &settings, index_dir)?;
            println!("{}", chat.answer(&question).await?);
        }
        Command::Invoice { image, question } => {
            let image = Document::from_path(&image)?;
            let generator = GeminiGenerator::vision_from_settings(&settings.genai)?;
            println!("{}", ask_invoice(&generator, &image, &question).await?);
        }
        Command::Resume { pdf, job_description, json } => {
            let resume = Document::from_path(&pdf)?;
            let generator = GeminiGenerator::from_settings(&settings.genai)?;
            let report = score_resume(&generator, &resume, &job_description).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
        }
        Command::Sql { question, json } => {
            let generator = GeminiGenerator::from_settings(&settings.genai)?;
            let policy = SqlPolicy::from(&settings.sql);
            let answer = text_to_sql(&generator, &database, &question, policy).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{}", answer.sql);
                println!("{answer}");
            }
        }
        Command::InitDb { no_seed } => {
            let store = StudentStore::open(&database)?;
            if !no_seed && store.count()? == 0 {
                store.seed_sample()?;
            }
            info!("Database ready at {}", database.display());
            println!("{} row(s) in STUDENT at {}", store.count()?, database.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", render_error(&err));
            ExitCode::FAILURE
        }
    }
}
