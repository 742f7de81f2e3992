use clap::Parser;
use importkit::aws_config::configure_aws;
use importkit::cloud::AwsStackApi;
use importkit::config::{parse_tag, ConfigOverrides, TaggerConfig};
use importkit::logging;
use importkit::tagger::StackTagger;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "tag-stack",
    version,
    about = "Tag every resource of a CloudFormation stack",
    long_about = "Describe the resources of a CloudFormation stack, resolve each one to its ARN \
and apply a fixed tag set through the Resource Groups Tagging API. Without arguments the \
stack 'instance-scheduler-stack' is tagged with IMPORT2=true."
)]
struct Cli {
    /// CloudFormation stack name
    #[arg(long)]
    stack_name: Option<String>,

    /// Tag to apply as KEY=VALUE; repeat for several tags. Replaces the configured set
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    tags: Vec<(String, String)>,

    /// AWS region (defaults to the provider chain)
    #[arg(long)]
    region: Option<String>,

    /// AWS credentials profile
    #[arg(long)]
    profile: Option<String>,

    /// ARN partition, derived from the region when omitted
    #[arg(long)]
    partition: Option<String>,

    /// INI settings file (defaults to <config dir>/importkit/config.ini when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every SDK call
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let overrides = ConfigOverrides {
        stack_name: cli.stack_name,
        tags: cli.tags,
        region: cli.region,
        profile: cli.profile,
        partition: cli.partition,
    };
    let config = match TaggerConfig::load(cli.config.as_deref(), overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let sdk_config = configure_aws(config.region.clone(), config.profile.clone()).await;
    let api = AwsStackApi::new(&sdk_config);

    let report = match StackTagger::new(&api, &config).run().await {
        Ok(Some(report)) => report,
        Ok(None) => {
            println!("No resources found for the specified stack.");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!("{}", report);
    ExitCode::SUCCESS
}
