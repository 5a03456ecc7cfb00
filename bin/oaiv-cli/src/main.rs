use clap::Parser;
use common::init_logger;
use oaiv_cli::{render, run, OaivArgs};

#[tokio::main]
async fn main() -> oaiv_cli::Result<()> {
    let args = OaivArgs::parse();

    init_logger(&args.log_level).expect("Logger should initialize");

    let output = run(args).await?;
    println!("{}", render(&output)?);
    Ok(())
}
