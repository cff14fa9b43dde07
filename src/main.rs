use std::{sync::Arc, time::Duration};

use assessrank::{
    DataDir, GeminiClient, HttpEmbedder, IndexDb, Recommender, Refiner, Settings,
    VectorIndex,
    cli::{self, Cli, Command},
    error::{self, Error},
    evaluation,
    model::{Query, ScoredItem, yes_no},
    server,
    vector_index::SeedOutcome,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("ASSESSRANK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let settings = Settings::load(&data_dir)?;

    match cli.command {
        Command::Build(args) => cmd_build(&data_dir, &settings, args).await?,
        Command::Recommend(args) => {
            cmd_recommend(&data_dir, &settings, args).await?;
        }
        Command::Serve(args) => {
            let addr = args.addr.unwrap_or(settings.server.addr);
            let recommender = build_recommender(&data_dir, &settings).await?;
            server::serve(addr, Arc::new(recommender)).await?;
        }
        Command::Status(args) => cmd_status(&data_dir, &settings, args.json)?,
        Command::Evaluate(args) => {
            cmd_evaluate(&data_dir, &settings, args).await?;
        }
    }

    Ok(())
}

async fn open_index(
    data_dir: &DataDir,
    settings: &Settings,
) -> error::Result<VectorIndex<HttpEmbedder>> {
    VectorIndex::open_or_seed(
        &data_dir.index_db(),
        &settings.catalog_path(data_dir),
        HttpEmbedder::new(&settings.embedding)?,
        settings.index.clone(),
        Duration::from_secs(settings.embedding.timeout_secs),
    )
    .await
}

async fn build_recommender(
    data_dir: &DataDir,
    settings: &Settings,
) -> error::Result<Recommender<HttpEmbedder, GeminiClient>> {
    // Check the key before paying for a seed.
    let generator = GeminiClient::new(&settings.generation)?;
    let index = open_index(data_dir, settings).await?;
    let refiner = Refiner::new(
        generator,
        Duration::from_secs(settings.generation.timeout_secs),
    );
    Ok(Recommender::new(
        index,
        refiner,
        settings.pipeline.max_candidates,
    ))
}

async fn cmd_build(
    data_dir: &DataDir,
    settings: &Settings,
    args: cli::BuildArgs,
) -> error::Result<()> {
    let catalog = args
        .catalog
        .unwrap_or_else(|| settings.catalog_path(data_dir));
    let mut index = VectorIndex::open(
        &data_dir.index_db(),
        HttpEmbedder::new(&settings.embedding)?,
        settings.index.clone(),
        Duration::from_secs(settings.embedding.timeout_secs),
    )?;

    match index.seed(&catalog).await? {
        SeedOutcome::Seeded { items } => {
            println!("Indexed {items} assessment(s) from {}", catalog.display());
        }
        SeedOutcome::AlreadyPopulated { items } => {
            println!(
                "Index already holds {items} assessment(s); delete {} to rebuild",
                data_dir.index_db().display()
            );
        }
    }
    Ok(())
}

async fn cmd_recommend(
    data_dir: &DataDir,
    settings: &Settings,
    args: cli::RecommendArgs,
) -> error::Result<()> {
    let query = Query::new(args.query).with_top_k(args.top_k);

    let results = if args.no_refine {
        query.validate()?;
        let index = open_index(data_dir, settings).await?;
        index.search(&query.text, query.top_k).await?
    } else {
        build_recommender(data_dir, settings)
            .await?
            .recommend(&query)
            .await?
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&server::RecommendResponse {
                recommendations: results,
            })?
        );
    } else {
        format_human(&results);
    }
    Ok(())
}

fn format_human(results: &[ScoredItem]) {
    if results.is_empty() {
        println!("No recommendations.");
        return;
    }

    for (rank, r) in results.iter().enumerate() {
        println!("{:>3}. [{:.3}] {}", rank + 1, r.score, r.item.name);
        println!("     {}", r.url());
        println!(
            "     {} | {} | remote: {} | adaptive: {}",
            r.item.test_type.join(", "),
            r.item.duration,
            yes_no(r.item.remote_support),
            yes_no(r.item.adaptive_support),
        );
    }
    println!("\n{} recommendation(s)", results.len());
}

fn cmd_status(
    data_dir: &DataDir,
    settings: &Settings,
    json: bool,
) -> error::Result<()> {
    let db = IndexDb::open(&data_dir.index_db())?;
    let items = db.len()?;
    let model = db.embedding_model()?;
    let dimension = db.dimension()?;
    let catalog = settings.catalog_path(data_dir);

    if json {
        let status = serde_json::json!({
            "data_dir": data_dir.root(),
            "index": data_dir.index_db(),
            "catalog": catalog,
            "items": items,
            "embedding_model": model,
            "dimension": dimension,
            "configured_model": settings.embedding.model,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Index: {}", data_dir.index_db().display());
        println!("Catalog: {}", catalog.display());
        println!("Assessments: {items}");
        match (model, dimension) {
            (Some(model), Some(dimension)) => {
                println!("Embedding model: {model} ({dimension} dimensions)");
            }
            _ => println!("Embedding model: none (index not built)"),
        }
        println!("Configured model: {}", settings.embedding.model);
    }
    Ok(())
}

async fn cmd_evaluate(
    data_dir: &DataDir,
    settings: &Settings,
    args: cli::EvaluateArgs,
) -> error::Result<()> {
    if args.top_k == 0 {
        return Err(Error::InvalidQuery("k must be positive".into()));
    }
    let cases = evaluation::load_test_set(&args.file)?;
    let recommender = build_recommender(data_dir, settings).await?;
    let report = evaluation::evaluate(&recommender, &cases, args.top_k).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
