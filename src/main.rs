use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use env_logger::{Builder, Env};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use net2cog::cli::{
    Cli, Commands, ConvertOverrides, OutputFormat, generate_template, jobs_for_inputs,
    resolve_job_config,
};
use net2cog::convert::ConversionReport;
use net2cog::info::{
    get_granule_info, print_granule_info_csv, print_granule_info_human, print_granule_info_json,
    print_granule_info_yaml,
};
use net2cog::input::JobConfig;
use net2cog::log::{config_echo, show_farewell_with_timing, show_greeting};
use net2cog::process_job;
use net2cog::validate::{ValidationReport, validate_cog};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(err) = run(cli) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let mut builder = Builder::from_env(Env::default().default_filter_or(level));
    builder.format_timestamp_secs();
    builder.init();
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Convert {
            inputs,
            output_dir,
            variables,
            compression,
            blocksize,
            no_overviews,
            dry_run,
        } => {
            let overrides = ConvertOverrides {
                output_dir: output_dir.clone(),
                variables: variables.clone(),
                compression: *compression,
                blocksize: *blocksize,
                no_overviews: *no_overviews,
            };
            let base = resolve_job_config(cli.config.as_deref(), &overrides)
                .context("Failed to build job configuration")?;
            run_convert(&cli, &base, inputs, *dry_run)
        }
        Commands::Info {
            file,
            detailed,
            variable,
            format,
        } => {
            let info = get_granule_info(file, variable.as_deref(), *detailed)?;
            match format.as_ref().unwrap_or(&cli.output_format) {
                OutputFormat::Human => print_granule_info_human(&info),
                OutputFormat::Json => print_granule_info_json(&info)?,
                OutputFormat::Yaml => print_granule_info_yaml(&info)?,
                OutputFormat::Csv => print_granule_info_csv(&info)?,
            }
            Ok(())
        }
        Commands::Validate { files, bands } => run_validate(&cli, files, *bands),
        Commands::Template {
            template_type,
            output,
            format,
        } => {
            let rendered = generate_template(template_type, format)?;
            write_or_print(output.as_deref(), &rendered)
        }
        Commands::Completions { shell, output } => {
            let mut command = Cli::command();
            match output {
                Some(path) => {
                    let mut file = fs::File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    clap_complete::generate(*shell, &mut command, "net2cog", &mut file);
                }
                None => {
                    clap_complete::generate(*shell, &mut command, "net2cog", &mut io::stdout());
                }
            }
            Ok(())
        }
    }
}

fn run_convert(cli: &Cli, base: &JobConfig, inputs: &[PathBuf], dry_run: bool) -> Result<()> {
    let start_time = Instant::now();
    let jobs = jobs_for_inputs(base, inputs);
    for job in &jobs {
        job.validate()
            .with_context(|| format!("Invalid job for input '{}'", job.input))?;
    }

    let human = cli.output_format == OutputFormat::Human && !cli.quiet;
    if human {
        let source = cli
            .config
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "command line".to_string());
        show_greeting(&source);
        config_echo(base);
    }

    if dry_run {
        info!("Dry run: {} job(s) validated, nothing converted", jobs.len());
        return Ok(());
    }

    let progress = if human && jobs.len() > 1 {
        let pb = ProgressBar::new(jobs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut reports: Vec<ConversionReport> = Vec::with_capacity(jobs.len());
    for job in &jobs {
        if let Some(pb) = &progress {
            pb.set_message(job.input.clone());
        }
        debug!("Converting {}", job.input);
        let report = process_job(job)
            .with_context(|| format!("Failed to convert '{}'", job.input))?;
        reports.push(report);
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    match cli.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&reports)?),
        OutputFormat::Csv => {
            println!("input,output");
            for report in &reports {
                for output in &report.outputs {
                    println!("{},{}", report.input.display(), output.display());
                }
            }
        }
        OutputFormat::Human => {
            if !cli.quiet {
                for report in &reports {
                    if report.skipped {
                        println!("\nSkipped {} (not a NetCDF file)", report.input.display());
                        continue;
                    }
                    println!(
                        "\n{}: {} COG(s) in {} ms",
                        report.input.display(),
                        report.outputs.len(),
                        report.elapsed_ms
                    );
                    for output in &report.outputs {
                        println!("  {}", output.display());
                    }
                }
                show_farewell_with_timing(start_time.elapsed());
            }
        }
    }
    Ok(())
}

fn run_validate(cli: &Cli, files: &[PathBuf], bands: Option<usize>) -> Result<()> {
    let mut reports: Vec<ValidationReport> = Vec::with_capacity(files.len());
    for file in files {
        reports.push(validate_cog(file, bands)?);
    }

    match cli.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&reports)?),
        OutputFormat::Csv => {
            println!("path,valid,bands,compression,errors");
            for report in &reports {
                println!(
                    "{},{},{},{},\"{}\"",
                    report.path.display(),
                    report.valid,
                    report.bands,
                    report.compression.as_deref().unwrap_or(""),
                    report.errors.join("; ")
                );
            }
        }
        OutputFormat::Human => {
            for report in &reports {
                if report.valid {
                    println!("COG file {} is valid.", report.path.display());
                } else {
                    println!("COG file {} is NOT valid:", report.path.display());
                    for error in &report.errors {
                        println!("  - {}", error);
                    }
                }
            }
        }
    }

    let invalid = reports.iter().filter(|r| !r.valid).count();
    if invalid > 0 {
        bail!("{} of {} file(s) failed COG validation", invalid, reports.len());
    }
    Ok(())
}

fn write_or_print(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
