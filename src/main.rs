mod config;
mod corpus;
mod embedder;
mod llm;
mod logging;
mod rag;
mod retriever;
mod sanitize;
mod utils;
mod vector_db;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use config::Settings;
use corpus::Corpus;
use embedder::FastEmbedEncoder;
use llm::GroqClient;
use rag::{RagContext, RagError, RagErrorKind};
use retriever::{RetrievedChunk, Retriever, assemble_context};
use vector_db::VectorDB;

#[derive(Parser, Debug)]
#[command(
    name = "law-rag",
    about = "Answer Indian-law questions grounded in a legal reference corpus"
)]
struct Cli {
    /// TOML config file (defaults to ./law-rag.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON array of chunk texts
    #[arg(long)]
    docs: Option<PathBuf>,

    /// Embedding matrix (.npy or .json), one row per chunk
    #[arg(long)]
    embeddings: Option<PathBuf>,

    /// Number of chunks used as context
    #[arg(long, short = 'k')]
    top_k: Option<usize>,

    /// Answer a single question and exit
    #[arg(long, short)]
    question: Option<String>,

    /// Only print the retrieved context (skip the generation call)
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Debug-level diagnostics on stderr
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(docs) = &self.docs {
            settings.corpus.docs_path = docs.clone();
        }
        if let Some(embeddings) = &self.embeddings {
            settings.corpus.embeddings_path = embeddings.clone();
        }
        if let Some(top_k) = self.top_k {
            settings.retrieval.top_k = top_k;
        }
    }
}

/// Defaults, file and env layers first, then CLI flags, then validation.
fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.apply(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn build_retriever(settings: &Settings) -> Result<Retriever> {
    let corpus = Corpus::load(
        &settings.corpus.docs_path,
        &settings.corpus.embeddings_path,
    )
    .context("failed to load corpus")?;
    tracing::info!(
        chunks = corpus.len(),
        dimensions = corpus.dimensions(),
        "corpus loaded"
    );

    let (store, embeddings) = corpus.into_parts();
    let index = VectorDB::new(embeddings).context("failed to build vector index")?;
    let encoder =
        FastEmbedEncoder::load(&settings.encoder).context("failed to load embedding model")?;

    Retriever::new(store, index, Box::new(encoder))
        .context("embedding model does not match the corpus embeddings")
}

fn render_retrieval(chunks: &[RetrievedChunk<'_>]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        out.push_str(&format!(
            "[chunk {}] distance {:.4}\n",
            chunk.index, chunk.distance
        ));
    }
    out.push_str("--- Context ---\n");
    out.push_str(&assemble_context(chunks));
    out
}

/// Process exit status for a failed `--question` run.
fn exit_status(kind: RagErrorKind) -> u8 {
    match kind {
        RagErrorKind::Input => 2,
        RagErrorKind::Retrieval => 3,
        RagErrorKind::Upstream => 4,
    }
}

fn failure_message(err: &RagError) -> String {
    match err.kind() {
        RagErrorKind::Input => "Please enter a legal question.".to_string(),
        RagErrorKind::Retrieval => format!("Could not search the legal corpus: {err}"),
        RagErrorKind::Upstream => {
            format!("The answer service is unavailable, try again shortly: {err}")
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;
    logging::init(&settings.logging, cli.verbose);

    let retriever = build_retriever(&settings)?;
    println!(
        "Loaded index with {} chunks ({} dimensions).",
        retriever.len(),
        retriever.dimensions()
    );

    let top_k = settings.retrieval.top_k;
    let respond: Box<dyn Fn(&str) -> Result<String, RagError>> = if cli.dry_run {
        Box::new(move |question: &str| -> Result<String, RagError> {
            let question = rag::normalize_question(question)?;
            let chunks = retriever.retrieve(&question, top_k)?;
            Ok(render_retrieval(&chunks))
        })
    } else {
        let generator = GroqClient::from_env(settings.generation.clone())
            .context("failed to configure generation client")?;
        tracing::info!(model = generator.model(), "generation client ready");
        let rag = RagContext::new(retriever, Box::new(generator));
        Box::new(move |question: &str| rag.answer(question, top_k))
    };

    if let Some(question) = &cli.question {
        return Ok(match respond(question.as_str()) {
            Ok(answer) => {
                println!("\n{answer}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("Error: {}", failure_message(&err));
                ExitCode::from(exit_status(err.kind()))
            }
        });
    }

    println!("\nIndian Law RAG Assistant");
    println!("Enter your legal query ('exit' or Ctrl+D to quit)");

    loop {
        let mut query = String::new();
        print!("> ");
        std::io::stdout().flush()?;

        if std::io::stdin().read_line(&mut query)? == 0 {
            break; // EOF (Ctrl+D)
        }

        let query = query.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        print!("\nThinking...");
        std::io::stdout().flush()?;
        match respond(query) {
            Ok(answer) => println!("\r{answer}\n"),
            Err(err) => eprintln!("\rError: {}\n", failure_message(&err)),
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerationError;
    use crate::retriever::RetrievalError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_cli_overrides_settings() {
        let cli = Cli::parse_from([
            "law-rag",
            "--docs",
            "corpus/docs.json",
            "--embeddings",
            "corpus/emb.npy",
            "-k",
            "5",
        ]);
        let mut settings = Settings::default();
        cli.apply(&mut settings);

        assert_eq!(settings.corpus.docs_path, PathBuf::from("corpus/docs.json"));
        assert_eq!(settings.corpus.embeddings_path, PathBuf::from("corpus/emb.npy"));
        assert_eq!(settings.retrieval.top_k, 5);
    }

    #[test]
    fn test_cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["law-rag"]);
        let mut settings = Settings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.retrieval.top_k, 3);
        assert!(!cli.dry_run);
        assert!(cli.question.is_none());
    }

    #[test]
    fn test_render_retrieval() {
        let chunks = [
            RetrievedChunk {
                index: 4,
                distance: 0.5,
                text: "Section 302 IPC: punishment for murder.",
            },
            RetrievedChunk {
                index: 1,
                distance: 0.75,
                text: "Section 304 IPC: culpable homicide.",
            },
        ];
        let rendered = render_retrieval(&chunks);
        assert!(rendered.starts_with("[chunk 4] distance 0.5000\n[chunk 1] distance 0.7500\n"));
        assert!(rendered.ends_with(
            "--- Context ---\nSection 302 IPC: punishment for murder.\n\n\
             Section 304 IPC: culpable homicide."
        ));
    }

    #[test]
    fn test_cli_flag_repairs_invalid_file_value() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("law-rag.toml");
        fs::write(&path, "[retrieval]\ntop_k = 0\n")?;
        let config = path.to_string_lossy().into_owned();

        let cli = Cli::parse_from(["law-rag", "--config", config.as_str(), "-k", "3"]);
        assert_eq!(resolve_settings(&cli)?.retrieval.top_k, 3);

        let cli = Cli::parse_from(["law-rag", "--config", config.as_str()]);
        assert!(resolve_settings(&cli).is_err());
        Ok(())
    }

    #[test]
    fn test_failures_map_to_distinct_exit_statuses() {
        let input = RagError::EmptyQuestion;
        let retrieval = RagError::Retrieval(RetrievalError::Misaligned {
            docs: 2,
            vectors: 3,
        });
        let upstream = RagError::Generation(GenerationError::Timeout);

        let statuses = [&input, &retrieval, &upstream].map(|err| exit_status(err.kind()));
        assert_eq!(statuses, [2, 3, 4]);

        assert_eq!(failure_message(&input), "Please enter a legal question.");
        assert!(failure_message(&retrieval).starts_with("Could not search the legal corpus"));
        assert!(failure_message(&upstream).contains("unavailable"));
        assert!(failure_message(&upstream).contains("timed out"));
    }
}
