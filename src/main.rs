use clap::Parser;
use lambda_ac::cli::Options;
use lambda_ac::logging::CLILogger;
use lambda_ac::Trainer;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let opts = Options::parse();
    let config = opts.train_config()?;
    println!("{:#?}", config);

    let env = opts.env_config().build_env();
    let mut trainer = Trainer::new(config, env, opts.seed)?;
    let mut logger = CLILogger::new(opts.display_period()?, true);
    let table = trainer.run(&mut logger)?;
    drop(logger);

    let path = opts.output_path();
    table.write(&path)?;
    println!("Wrote {} checkpoints to {}", table.len(), path.display());
    Ok(())
}
