//! owl-predict: one-shot draft prediction from the command line
//!
//!   owl-predict <10 hero names...>   first five radiant, last five dire
//!   owl-predict <dotabuff match url>
//!
//! Uses the same environment and cache as the service.

use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use owl_esports::config::AppConfig;
use owl_esports::telegram::{parse_command, BotCommand};
use prediction_engine::PredictionEngine;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    owl_esports::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        bail!("usage: owl-predict <10 hero names> | <match url>");
    }
    let command = parse_command(&args.join(if args.len() == 1 { "" } else { "," }));

    let cfg = AppConfig::from_env().context("configuration")?;
    let loader = owl_esports::dataset_loader(&cfg);
    let engine = PredictionEngine::new().with_algorithm_version(cfg.algorithm_version.clone());
    engine.refresh(&loader).await.context("load dataset")?;

    let prediction = match command {
        BotCommand::Draft(names) => engine.predict_from_names(&names)?,
        BotCommand::MatchLink(url) => {
            let (record, p) = engine.predict_from_match_url(loader.fetcher(), &url).await?;
            println!(
                "Match {}: {} (radiant) vs {} (dire), radiant {}",
                record.match_id,
                record.radiant_team.name,
                record.dire_team.name,
                if record.radiant_won { "won" } else { "lost" }
            );
            p
        }
        BotCommand::Help | BotCommand::Unknown => {
            bail!("expected 10 hero names or a match url, got {:?}", args.join(" "))
        }
    };

    println!("Radiant winrate: {:.2}%", prediction.radiant);
    println!("Dire winrate:    {:.2}%", prediction.dire);
    Ok(())
}
