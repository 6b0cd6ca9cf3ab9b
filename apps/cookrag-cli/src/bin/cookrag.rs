//! cookrag - recipe question answering over a markdown corpus.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cookrag_cli::{build_knowledge, ingest_store, rebuild_vector_index, ChatClient};
use cookrag_core::config::RagConfig;
use cookrag_hybrid::{Answer, RecipeRag};

#[derive(Parser)]
#[command(name = "cookrag", version, about = "Ask questions about a recipe collection")]
struct Cli {
    /// Directory holding `config.toml`; relative data and index paths resolve against it.
    #[arg(long, global = true, env = "COOKRAG_BASE_DIR")]
    base_dir: Option<PathBuf>,

    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-embed the corpus and replace the saved vector index.
    Index,
    /// Answer one question.
    Ask {
        question: String,
        #[arg(long)]
        stream: bool,
    },
    /// Interactive question loop.
    Chat {
        #[arg(long)]
        no_stream: bool,
    },
    /// Corpus statistics.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Write per-recipe metadata as JSON.
    ExportMetadata { output: PathBuf },
    /// Dishes in a category, optionally narrowed by a query.
    Category {
        category: String,
        #[arg(default_value = "")]
        query: String,
    },
    /// Ingredients needed for a dish.
    Ingredients { dish: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    if cli.quiet { return; }
    let filter = match cli.verbose {
        0 => "warn,cookrag=info",
        1 => "info,cookrag=debug",
        _ => "debug,cookrag=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry().with(env_filter).with(fmt::layer().with_writer(io::stderr)).init();
}

fn run(cli: &Cli) -> Result<()> {
    let base = match &cli.base_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let config = RagConfig::load_from(&base)?;
    match &cli.command {
        Command::Index => {
            let chunks = rebuild_vector_index(&config, &base)?;
            println!("Indexed {chunks} chunks into {}", config.index_dir(&base).display());
        }
        Command::Stats { json } => {
            let stats = ingest_store(&config, &base)?.statistics();
            if *json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("documents: {}", stats.total_documents);
                println!("chunks: {}", stats.total_chunks);
                println!("average chunk size: {:.1}", stats.avg_chunk_size);
                for (category, count) in &stats.categories { println!("  {category}: {count}"); }
                for (difficulty, count) in &stats.difficulties { println!("  {difficulty}: {count}"); }
            }
        }
        Command::ExportMetadata { output } => {
            ingest_store(&config, &base)?.export_metadata(output)?;
            println!("Wrote {}", output.display());
        }
        Command::Ask { question, stream } => print_answer(connect(&config, &base)?.answer(question, *stream)?)?,
        Command::Chat { no_stream } => chat(&connect(&config, &base)?, !*no_stream)?,
        Command::Category { category, query } => {
            let names = connect(&config, &base)?.search_by_category(category, query)?;
            if names.is_empty() { println!("没有找到{category}类的菜品"); }
            for name in names { println!("{name}"); }
        }
        Command::Ingredients { dish } => println!("{}", connect(&config, &base)?.ingredients_for(dish)?),
    }
    Ok(())
}

fn connect(config: &RagConfig, base: &std::path::Path) -> Result<RecipeRag> {
    let client = ChatClient::from_config(config)?;
    let knowledge = build_knowledge(config, base)?;
    Ok(RecipeRag::new(config.clone(), knowledge, Box::new(client.clone()), Box::new(client.clone()), Box::new(client)))
}

fn print_answer(answer: Answer) -> Result<()> {
    match answer {
        Answer::Text(text) => println!("{text}"),
        Answer::Stream(fragments) => {
            let mut out = io::stdout().lock();
            for fragment in fragments {
                write!(out, "{}", fragment?)?;
                out.flush()?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

fn chat(rag: &RecipeRag, stream: bool) -> Result<()> {
    println!("输入问题开始提问，输入 exit、quit 或 退出 结束。");
    let stdin = io::stdin();
    loop {
        print!("\n您的问题: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 { break; }
        let question = line.trim();
        if question.is_empty() || matches!(question, "exit" | "quit" | "退出") { break; }
        match rag.answer(question, stream) {
            Ok(answer) => print_answer(answer)?,
            Err(e) => eprintln!("Error: {e:#}"),
        }
    }
    println!("再见！");
    Ok(())
}
