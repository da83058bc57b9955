use anyhow::Context;
use clap::Parser;
use transform_chain::utils::error::ErrorSeverity;
use transform_chain::utils::{logger, validation::Validate};
use transform_chain::{ChainConfig, ChainError, ChainParameters, CliArgs, TransformChainRunner};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting transform-chain");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = ChainConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;
    args.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated: {}", config.name());
    if args.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    let params = match config.records.load_parameters() {
        Ok(params) => params,
        Err(e) => exit_with(e),
    };

    let runner = TransformChainRunner::new(config.service.build())
        .with_suffixes(config.output.suffixes())
        .with_monitoring(args.monitoring_enabled(&config));

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - the transform service will not be invoked");
        print_plan(&runner, &config, &params);
        return Ok(());
    }

    let (report, outcome) = runner.run_recorded(config.input_asset(), &params);

    // 失敗時也寫出報告，記錄已完成的階段
    if let Some(path) = config.report_path() {
        if let Err(e) = report.write_summary(path) {
            tracing::error!("❌ Failed to write run report '{}': {}", path.display(), e);
            if outcome.is_ok() {
                return Err(e)
                    .with_context(|| format!("failed to write run report '{}'", path.display()));
            }
        }
    }

    match outcome {
        Ok(()) => {
            tracing::info!(
                "✅ Transform chain completed in {:?}",
                report.total_duration()
            );
            println!("✅ Transform chain completed successfully!");
            println!("📁 Final output: {}", report.final_output.display());
            Ok(())
        }
        Err(e) => {
            if !report.stages.is_empty() {
                eprintln!("📁 Last completed output: {}", report.final_output.display());
            }
            exit_with(e)
        }
    }
}

fn print_plan<S: transform_chain::GeometryTransformService>(
    runner: &TransformChainRunner<S>,
    config: &ChainConfig,
    params: &ChainParameters,
) {
    for stage in runner.plan(config.input_asset(), params) {
        let flags = stage.spec.to_cli_args().join(" ");
        tracing::info!("📋 {}: {}", stage.kind, flags);
        println!(
            "{:<7} {} -> {}  {}",
            stage.kind,
            stage.input.display(),
            stage.output.display(),
            flags
        );
    }
}

fn exit_with(e: ChainError) -> ! {
    tracing::error!(
        "❌ Transform chain failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
