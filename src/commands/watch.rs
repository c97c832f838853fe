use crate::{WatchArgs, build::Builder, config::Config};

pub async fn run(args: &WatchArgs) -> Result<(), anyhow::Error> {
    let config = Config::load_from_args(&args.config_files)?;
    let mut builder = Builder::new(config)?;

    builder.gather_data()?;
    let result = builder.compile().await?;
    println!(
        "Built {} page(s) to {}",
        result.pages,
        result.output_dir.display()
    );

    crate::build::watch(&mut builder).await?;
    Ok(())
}
