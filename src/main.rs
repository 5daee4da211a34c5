//! Scarp: Landslide Susceptibility CLI Tool
//!
//! Loads a ten-band raster, cleans and balances the pixel table, then trains
//! and compares three classifiers on whether a pixel lies on a landslide scar.

use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use scarp::cli::Cli;
use scarp::pipeline::{
    balance_classes, class_counts, clean_pixel_table, derive_label, load_raster, prepare_data,
    save_balanced, train_models, TrainingEvent,
};
use scarp::report::{export_results, ResultsReport};
use scarp::utils::{
    create_spinner, finish_with_success, finish_with_warning, print_banner, print_completion,
    print_config, print_count, print_error, print_info, print_interrupted, print_step_header,
    print_step_time, print_success, print_warning, Palette,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = ctrlc::set_handler(|| {
        print_interrupted();
        std::process::exit(1);
    }) {
        print_warning(&format!("Could not install Ctrl-C handler: {}", e));
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let palette = Palette::default();
    let config = cli.training_config();

    if !cli.input.is_file() {
        anyhow::bail!(
            "Input raster not found. Expected a ten-band GeoTIFF at: {}",
            cli.input.display()
        );
    }

    std::fs::create_dir_all(&cli.images_dir).with_context(|| {
        format!(
            "Failed to create images directory: {}",
            cli.images_dir.display()
        )
    })?;

    print_banner(env!("CARGO_PKG_VERSION"), &palette);
    print_config(
        &cli.input,
        &cli.images_dir,
        config.seed,
        config.test_fraction,
        &palette,
    );

    // Step 1: Load raster
    print_step_header(1, "Load Raster", &palette);

    let step_start = Instant::now();
    let spinner = create_spinner("Reading raster bands...");
    let (pixels, info) = match load_raster(&cli.input) {
        Ok(loaded) => loaded,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };
    finish_with_success(&spinner, "Raster loaded");

    println!("\n    {} Raster Statistics:", style("✧").cyan());
    println!("      Bands: {}", info.bands);
    println!("      Size: {} x {}", info.width, info.height);
    println!("      Pixels: {}", info.pixels());
    print_step_time(step_start.elapsed());

    // Step 2: Clean values
    print_step_header(2, "Clean Values", &palette);

    let step_start = Instant::now();
    let (cleaned, cleaning) = clean_pixel_table(&pixels)?;
    drop(pixels);

    if cleaning.rows_dropped() == 0 {
        print_info("All pixels within valid ranges");
    } else {
        for (column, count) in cleaning.invalidated.iter().filter(|(_, c)| *c > 0) {
            println!(
                "      {} {} value(s) invalid in {}",
                style("•").dim(),
                style(count).yellow(),
                column
            );
        }
        print_count(
            "row(s) dropped",
            cleaning.rows_dropped(),
            Some(cleaning.rows_before),
        );
    }
    print_success(&format!("{} rows kept", cleaning.rows_after));
    print_step_time(step_start.elapsed());

    // Step 3: Derive labels
    print_step_header(3, "Derive Labels", &palette);

    let step_start = Instant::now();
    let labelled = derive_label(&cleaned)?;
    drop(cleaned);
    let counts = class_counts(&labelled)?;

    print_count("scar pixel(s)", counts.positive, Some(counts.total()));
    print_count("non-scar pixel(s)", counts.negative, Some(counts.total()));
    print_step_time(step_start.elapsed());

    // Step 4: Balance classes
    print_step_header(4, "Balance Classes", &palette);

    let step_start = Instant::now();
    let mut balanced = balance_classes(&labelled, config.seed)?;
    drop(labelled);

    if counts.minority() == 0 {
        print_warning("Only one class present; nothing to balance");
    } else {
        print_success(&format!(
            "Downsampled to {} rows ({} per class)",
            balanced.height(),
            counts.minority()
        ));
    }

    if let Some(path) = &cli.export_balanced {
        let spinner = create_spinner("Writing balanced dataset...");
        if let Err(e) = save_balanced(&mut balanced, path) {
            spinner.finish_and_clear();
            return Err(e);
        }
        finish_with_success(&spinner, &format!("Saved to {}", path.display()));
    }
    print_step_time(step_start.elapsed());

    // Step 5: Train models
    print_step_header(5, "Train Models", &palette);

    let step_start = Instant::now();
    let data = prepare_data(&balanced, &config)?;
    print_info(&format!(
        "{} training rows, {} test rows",
        data.y_train.len(),
        data.y_test.len()
    ));

    let mut spinner = None;
    let trained = train_models(data, &config, |event| match event {
        TrainingEvent::Started(kind) => {
            spinner = Some(create_spinner(&format!("Training {}...", kind)));
        }
        TrainingEvent::Finished(result) => {
            let Some(pb) = spinner.take() else { return };
            let summary = format!(
                "{} AUC {:.4} ({:.2}s)",
                result.name(),
                result.auc,
                result.fit_time.as_secs_f64()
            );
            if result.converged() {
                finish_with_success(&pb, &summary);
            } else {
                finish_with_warning(&pb, &format!("{}, not converged", summary));
            }
        }
    });
    let outcome = match trained {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(pb) = spinner.take() {
                pb.finish_and_clear();
            }
            return Err(e);
        }
    };
    print_step_time(step_start.elapsed());

    // Results
    let report = ResultsReport::new(&cleaning, counts, balanced.height(), &outcome);
    report.display(&palette);

    if let Some(path) = &cli.report {
        export_results(&report, &config, &cli.input, path)?;
        println!();
        print_success(&format!("Results written to {}", path.display()));
    }

    print_completion(&palette);

    Ok(())
}
