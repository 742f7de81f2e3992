use clap::Parser;
use importkit::error::PlanError;
use importkit::{logging, plan};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "cook-plan",
    version,
    about = "Cook the terraformer plan, replacing names",
    long_about = "Rewrite every ResourceName under ImportedResource with the resource's \
'Name' tag and write the result to cooked_plan.json next to the input. Nothing is \
written unless every resource has a 'Name' tag."
)]
struct Cli {
    /// Path to the terraformer plan JSON file
    file_path: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match plan::cook_plan(&cli.file_path) {
        Ok(output) => {
            println!("Cooked plan has been written to {}", output.display());
            ExitCode::SUCCESS
        }
        Err(PlanError::MissingNameTags(missing)) => {
            eprintln!("Error: The following resources do not have a 'Name' tag:");
            for resource_name in &missing {
                eprintln!("  - {}", resource_name);
            }
            eprintln!("Error: Please ensure each of the above resources has a 'Name' tag and rerun.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
