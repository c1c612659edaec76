use std::sync::Arc;

use anyhow::{Context, Result, bail};
use argp::FromArgs;
use roster_core::{config::Config, models::MemberRef};
use roster_db::Database;
use roster_jobs::{
    RefreshEngine,
    progress::{LogSink, ProgressReporter},
};

use crate::util::open;

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Refresh GitHub activity for all connected members and recompute the summary.
#[argp(subcommand, name = "refresh")]
pub struct Args {
    #[argp(option, arg_name = "ID")]
    /// only refresh this member (repeatable)
    member: Vec<String>,
}

pub async fn run(args: Args, config: &Config) -> Result<()> {
    let (db, github) = open(config).await?;
    let engine = RefreshEngine::new(github, db.clone(), &config.refresh);
    let mut progress = ProgressReporter::new(Arc::new(LogSink));
    let outcome = if args.member.is_empty() {
        engine.run(&mut progress).await?
    } else {
        let members = select_members(&db, &args.member).await?;
        engine.run_members(&members, &mut progress).await
    };
    println!("{}", outcome.summary);
    db.close().await;
    Ok(())
}

async fn select_members(db: &Database, ids: &[String]) -> Result<Vec<MemberRef>> {
    let members = db.get_members().await.context("Failed to list members")?;
    ids.iter()
        .map(|id| {
            let member = members
                .iter()
                .find(|member| &member.id == id)
                .with_context(|| format!("Unknown member {}", id))?;
            let member = MemberRef::from(member);
            if !member.is_refreshable() {
                bail!("Member {} has no linked GitHub account", id);
            }
            Ok(member)
        })
        .collect()
}
