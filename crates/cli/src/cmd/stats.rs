use anyhow::{Context, Result};
use argp::FromArgs;
use roster_core::{ActivityStore, config::Config};
use roster_db::Database;
use roster_jobs::aggregate::recalculate;

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Print the stored summary as JSON.
#[argp(subcommand, name = "stats")]
pub struct Args {
    #[argp(switch)]
    /// recompute the summary from stored activity first (no GitHub requests)
    recalculate: bool,
}

pub async fn run(args: Args, config: &Config) -> Result<()> {
    let db = Database::new(&config.db).await?;
    let key = config.refresh.summary_key.as_str();
    let summary = if args.recalculate {
        Some(recalculate(&db, key).await?)
    } else {
        db.get_summary(key).await?
    };
    match summary {
        Some(summary) => {
            let json =
                serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
            println!("{}", json);
        }
        None => println!("No summary recorded yet, run `refresh` first"),
    }
    db.close().await;
    Ok(())
}
