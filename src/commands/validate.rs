use anyhow::Result;

use crate::Context;
use crate::cli::ValidateArgs;
use crate::ui;

pub fn run(ctx: &Context, args: ValidateArgs) -> Result<()> {
    let manifest = dsckit::manifest::load(&args.manifest)?;

    if args.print {
        println!("{}", dsckit::manifest::to_json(&manifest)?);
    } else if !ctx.quiet {
        ui::header(&args.manifest.display().to_string());
        for package in &manifest.packages {
            ui::kv(&package.package_identifier, &package.version);
        }
        println!();
    }

    if let Some(output) = &args.output {
        dsckit::manifest::save(&manifest, output)?;
        ui::success(&format!("Wrote {}", output.display()));
    }

    if !args.print {
        ui::success(&format!("Manifest is valid ({} package(s))", manifest.len()));
    }
    Ok(())
}
