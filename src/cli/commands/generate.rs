use clap::Args;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::{open_state, OutputFormat};

#[derive(Args)]
pub struct GenerateArgs {
    #[arg(long, help = "Table id")]
    pub table: String,
    #[arg(long, default_value_t = 10, help = "Number of rows")]
    pub count: usize,
    #[arg(long, help = "Seed for reproducible output")]
    pub seed: Option<u64>,
}

pub async fn handle(args: GenerateArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = open_state().await?;

    let table = state.tables().get(&args.table).await?;
    let columns = state.columns().list(&table.id).await?;
    let registry = state.modules().registry().await?;
    let rows = state
        .transfer()
        .generate(&table, &columns, &registry, args.count, args.seed)
        .await?;

    output_success(
        &output_format,
        &format!("Inserted {} of {} generated rows into {}", rows.len(), args.count, table.name),
        Some(json!({
            "tableId": table.id,
            "requested": args.count,
            "generated": rows.len(),
        })),
    )
}
