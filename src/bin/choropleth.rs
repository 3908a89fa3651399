use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use incidencia::{
    catalog::{self, Catalog},
    query::{self, IncidenceQuery},
    store,
};
use std::{fs, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Sum incidents per municipality for one crime subtype and date range,
/// optionally joined onto the municipal polygon catalog.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Parquet table written by `incidencia`.
    #[arg(short, long, default_value = "01_datos/processed/Municipal-Delitos.parquet")]
    table: PathBuf,

    /// Crime subtype (exact match).
    #[arg(short, long, default_value = "Homicidio doloso")]
    subtype: String,

    /// First day of the range, inclusive (YYYY-MM-DD).
    #[arg(long, default_value = "2024-01-01")]
    start: NaiveDate,

    /// Last day of the range, inclusive (YYYY-MM-DD).
    #[arg(long, default_value = "2024-12-31")]
    end: NaiveDate,

    /// Municipal catalog GeoJSON keyed by CVEGEO. With it the output is a
    /// choropleth FeatureCollection, without it a JSON list of totals.
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Where to write the result; stdout if omitted.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Print the subtypes and date range available in the table and exit.
    #[arg(long)]
    list: bool,

    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let table = store::read_parquet(&args.table)?;

    if args.list {
        for s in query::subtypes(&table)? {
            println!("{}", s);
        }
        if let Some((min, max)) = query::date_bounds(&table)? {
            println!("fechas: {} .. {}", min, max);
        }
        return Ok(());
    }

    let q = IncidenceQuery {
        subtype: args.subtype,
        date_start: args.start,
        date_end: args.end,
    };
    let result = query::run_query(&table, &q)?;
    info!(municipalities = result.municipalities.len(), "{}", result.summary());

    let rendered = match &args.catalog {
        Some(path) => {
            let catalog = Catalog::load(path)?;
            let joined = catalog.join(&result);
            match &args.out {
                Some(out) => {
                    catalog::write_geojson(out, joined)?;
                    info!(path = %out.display(), "wrote choropleth");
                    return Ok(());
                }
                None => geojson::GeoJson::from(joined).to_string(),
            }
        }
        None => serde_json::to_string_pretty(&result)?,
    };

    match &args.out {
        Some(out) => fs::write(out, rendered)?,
        None => println!("{}", rendered),
    }
    Ok(())
}
