use std::io::Write;
use std::panic;
use std::sync::Mutex;

use clap::Parser;
use cli::{BuildArgs, Cli, Commands, OutputFormat, PackageArgs, PublishArgs, ReleaseArgs};
use comfy_table::{presets::UTF8_FULL, Table};
use console::Term;
use debdist::{
    config::{BuildConfig, PackageConfig, PublishConfig, PublishOptions},
    env::AmbientEnv,
    errors::DistError,
};
use debdist_schema::{BuildReport, PackageManifest, PackageReport, PublishReport, ReleaseReport};
use lazy_static::lazy_static;
use miette::{Diagnostic, IntoDiagnostic};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

mod cli;

type ReportErrorFunc = dyn Fn(&miette::Report) + Send + Sync + 'static;

// XXX: We might be able to get rid of this `lazy_static` after 1.63 due to
// `const Mutex::new` being stabilized.
lazy_static! {
    static ref REPORT_ERROR: Mutex<Option<Box<ReportErrorFunc>>> = Mutex::new(None);
}

fn set_report_errors_as_json() {
    *REPORT_ERROR.lock().unwrap() = Some(Box::new(move |error| {
        // Manually invoke JSONReportHandler to format the error as a report
        // to out_.
        let mut report = String::new();
        miette::JSONReportHandler::new()
            .render_report(&mut report, error.as_ref())
            .unwrap();
        writeln!(&mut Term::stdout(), r#"{{"error": {report}}}"#).unwrap();
    }));
}

fn report_error(error: &miette::Report) {
    {
        let guard = REPORT_ERROR.lock().unwrap();
        if let Some(do_report) = &*guard {
            do_report(error);
            return;
        }
    }
    error!("{:?}", error);
}

fn main() {
    let cli = Cli::parse();
    // Init the logger
    tracing_subscriber::fmt::fmt()
        .with_max_level(cli.verbose)
        .with_target(false)
        .without_time()
        .with_ansi(console::colors_enabled_stderr())
        .with_writer(std::io::stderr)
        .init();

    // Control how errors are formatted by setting the miette hook. This will
    // only be used for errors presented to humans, when formatting an error as
    // JSON, it will be handled by a custom `report_error` override, bypassing
    // the hook.
    miette::set_hook(Box::new(move |_| {
        let graphical_theme = if console::colors_enabled_stderr() {
            miette::GraphicalTheme::unicode()
        } else {
            miette::GraphicalTheme::unicode_nocolor()
        };
        Box::new(
            miette::MietteHandlerOpts::new()
                .graphical_theme(graphical_theme)
                .build(),
        )
    }))
    .expect("failed to initialize error handler");

    // Now that miette is set up, use it to format panics.
    panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            msg
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            &msg[..]
        } else {
            "something went wrong"
        };

        #[derive(Debug, Error, Diagnostic)]
        #[error("{message}")]
        pub struct PanicError {
            pub message: String,
            #[help]
            pub help: Option<String>,
        }

        report_error(
            &miette::Report::from(PanicError {
                message: message.to_owned(),
                help: panic_info
                    .location()
                    .map(|loc| format!("at {}:{}:{}", loc.file(), loc.line(), loc.column())),
            })
            .wrap_err("debdist panicked"),
        );
    }));

    // If we're outputting JSON, replace the error report method such that it
    // writes errors out to the normal output stream as JSON.
    if cli.output_format == OutputFormat::Json {
        set_report_errors_as_json();
    }

    let ambient = AmbientEnv::capture();
    let main_result = real_main(&cli, &ambient);

    let _ = main_result.map_err(|e| {
        report_error(&e);
        let code = e.downcast_ref::<DistError>().map_or(1, DistError::exit_code);
        std::process::exit(code);
    });
}

fn real_main(cli: &Cli, ambient: &AmbientEnv) -> Result<(), miette::Report> {
    match &cli.command {
        Commands::Build(args) => cmd_build(cli, args, ambient),
        Commands::Package(args) => cmd_package(cli, args, ambient),
        Commands::Publish(args) => cmd_publish(cli, args, ambient),
        Commands::Release(args) => cmd_release(cli, args, ambient),
        Commands::ManifestSchema(_) => cmd_manifest_schema(),
    }
}

fn print_json(out: &mut Term, report: &impl Serialize) -> Result<(), miette::Report> {
    let string = serde_json::to_string_pretty(report).into_diagnostic()?;
    writeln!(out, "{string}").into_diagnostic()?;
    Ok(())
}

fn print_build_human(out: &mut Term, report: &BuildReport) -> Result<(), std::io::Error> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Target", "Debian arch", "Output"]);
    for target in &report.targets {
        table.add_row(vec![&target.friendly_name, &target.deb_arch, &target.output]);
    }
    writeln!(
        out,
        "built {} (version {}, release {})",
        report.tag, report.version, report.release
    )?;
    writeln!(out, "{table}")?;
    Ok(())
}

fn print_package_human(out: &mut Term, report: &PackageReport) -> Result<(), std::io::Error> {
    writeln!(out, "packaged {} ({} KiB installed)", report.path, report.size_kb)?;
    Ok(())
}

fn print_publish_human(out: &mut Term, report: &PublishReport) -> Result<(), std::io::Error> {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Asset", "Download"]);
    for asset in &report.assets {
        table.add_row(vec![
            asset.name.as_str(),
            asset.download_url.as_deref().unwrap_or("-"),
        ]);
    }
    match &report.release_url {
        Some(url) => writeln!(out, "published {} at {url}", report.tag)?,
        None => writeln!(out, "published {}", report.tag)?,
    }
    writeln!(out, "{table}")?;
    Ok(())
}

fn cmd_build(cli: &Cli, args: &BuildArgs, ambient: &AmbientEnv) -> Result<(), miette::Report> {
    let cfg = BuildConfig::resolve(args.to_lib(cli), ambient)?;
    let report = debdist::do_build(&cfg)?;
    let mut out = Term::stdout();
    match cli.output_format {
        OutputFormat::Human => print_build_human(&mut out, &report).into_diagnostic()?,
        OutputFormat::Json => print_json(&mut out, &report)?,
    }
    Ok(())
}

fn cmd_package(cli: &Cli, args: &PackageArgs, ambient: &AmbientEnv) -> Result<(), miette::Report> {
    let cfg = PackageConfig::resolve(args.to_lib(), ambient)?;
    let report = debdist::do_package(&cfg)?;
    let mut out = Term::stdout();
    match cli.output_format {
        OutputFormat::Human => print_package_human(&mut out, &report).into_diagnostic()?,
        OutputFormat::Json => print_json(&mut out, &report)?,
    }
    Ok(())
}

fn cmd_publish(cli: &Cli, args: &PublishArgs, ambient: &AmbientEnv) -> Result<(), miette::Report> {
    let cfg = PublishConfig::resolve(args.to_lib(cli), ambient)?;
    let report = debdist::do_publish(&cfg)?;
    let mut out = Term::stdout();
    match cli.output_format {
        OutputFormat::Human => print_publish_human(&mut out, &report).into_diagnostic()?,
        OutputFormat::Json => print_json(&mut out, &report)?,
    }
    Ok(())
}

fn cmd_release(cli: &Cli, args: &ReleaseArgs, ambient: &AmbientEnv) -> Result<(), miette::Report> {
    let build_cfg = BuildConfig::resolve(args.matrix.to_lib(cli), ambient)?;
    // Publish exactly what this run builds, not whatever an older run recorded
    let publish_cfg = PublishConfig::resolve(
        PublishOptions {
            tag: cli.tag.clone(),
            arches: build_cfg
                .targets
                .iter()
                .map(|t| t.friendly_name.to_owned())
                .collect(),
            out_dir: cli.out_dir.clone(),
            binary_name: cli.binary_name.clone(),
            api_server: args.api_server.clone(),
        },
        ambient,
    )?;
    let report: ReleaseReport = debdist::do_release(&build_cfg, &publish_cfg)?;
    let mut out = Term::stdout();
    match cli.output_format {
        OutputFormat::Human => {
            print_build_human(&mut out, &report.build).into_diagnostic()?;
            print_publish_human(&mut out, &report.publish).into_diagnostic()?;
        }
        OutputFormat::Json => print_json(&mut out, &report)?,
    }
    Ok(())
}

fn cmd_manifest_schema() -> Result<(), miette::Report> {
    let schema = PackageManifest::json_schema();
    print_json(&mut Term::stdout(), &schema)
}
