use crate::{BuildArgs, StageName, build::Builder, config::Config};

pub async fn run(args: &BuildArgs) -> Result<(), anyhow::Error> {
    let config = Config::load_from_args(&args.config_files)?;
    let mut builder = Builder::new(config)?;

    for stage in [StageName::Data, StageName::Compile, StageName::Publish] {
        let selected = match args.only {
            Some(only) => stage == only,
            None => stage <= args.build,
        };
        if !selected {
            continue;
        }

        match stage {
            StageName::Data => builder.gather_data()?,
            StageName::Compile => {
                let result = builder.compile().await?;
                println!(
                    "Built {} page(s) and {} style file(s) to {} in {}ms",
                    result.pages,
                    result.style_files,
                    result.output_dir.display(),
                    result.elapsed.as_millis()
                );
            }
            StageName::Publish => {
                builder.publish()?;
            }
        }
    }

    Ok(())
}
