use quiver::config::Config;
use quiver::index::SegmentBuilder;
use quiver::startup::{build_engine, init_logging, resolve_config_path};
use quiver::testing::{build_entities, demo_entities, demo_query, demo_schema};
use quiver::types::VectorData;

const COLLECTION: &str = "demo";
const DIMENSION: usize = 128;
const ENTITIES: i64 = 20_000;
const NQ: usize = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config (priority: QUIVER_* env vars > QUIVER_CONFIG / ./quiver.toml > defaults)
    let config = Config::load(resolve_config_path().as_deref())?;
    init_logging(&config);

    let engine = build_engine(&config);

    let schema = demo_schema(COLLECTION, DIMENSION);
    let mut builder = SegmentBuilder::new(schema, &config.indexing)?;
    builder.insert_batch(demo_entities(0, ENTITIES, DIMENSION))?;
    engine.catalog().publish(builder.build()?);
    tracing::info!(collection = COLLECTION, entities = ENTITIES, "collection published");

    // Query with stored vectors; each should find itself first. Entity 0
    // falls outside the demo range leaf, so start at 1.
    let probes: Vec<(i64, Vec<f32>)> = build_entities(1, NQ as i64 + 1, DIMENSION);
    let expected: Vec<i64> = probes.iter().map(|(id, _)| *id).collect();
    let vectors = probes
        .into_iter()
        .map(|(_, v)| VectorData::Float(v))
        .collect();

    let result = engine
        .search_async(COLLECTION, demo_query(vectors, 32), None)
        .await?;

    for (q, rank) in result.self_hit_ranks(&expected).iter().enumerate() {
        match rank {
            Some(r) => tracing::info!(q, id = expected[q], rank = r, "self hit"),
            None => tracing::warn!(q, id = expected[q], "self hit missing"),
        }
    }
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
