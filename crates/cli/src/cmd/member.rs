use anyhow::Result;
use argp::FromArgs;
use roster_core::{config::Config, models::Member};
use roster_db::Database;

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Manage members.
#[argp(subcommand, name = "member")]
pub struct Args {
    #[argp(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Add(AddArgs),
    List(ListArgs),
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Create or update a member. Existing activity is kept.
#[argp(subcommand, name = "add")]
struct AddArgs {
    #[argp(option)]
    /// member ID
    id: String,
    #[argp(option)]
    /// display name
    name: String,
    #[argp(option, arg_name = "LOGIN")]
    /// linked GitHub login
    github: Option<String>,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// List members.
#[argp(subcommand, name = "list")]
struct ListArgs {}

pub async fn run(args: Args, config: &Config) -> Result<()> {
    let db = Database::new(&config.db).await?;
    let result = match args.command {
        SubCommand::Add(c_args) => add(&db, c_args).await,
        SubCommand::List(_) => list(&db).await,
    };
    db.close().await;
    result
}

async fn add(db: &Database, args: AddArgs) -> Result<()> {
    let member = Member { id: args.id, name: args.name, external_id: args.github };
    db.upsert_member(&member).await?;
    tracing::info!("Saved member {}", member.id);
    Ok(())
}

async fn list(db: &Database) -> Result<()> {
    for member in db.get_members().await? {
        println!(
            "{}\t{}\t{}",
            member.id,
            member.name,
            member.external_id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
