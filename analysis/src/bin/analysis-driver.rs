// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Loads a JSON program model and runs the activated checks against it.
//!
//! Configuration goes through the usual chain (defaults, `Lockbound.toml`,
//! `LOCKBOUND_*` environment variables) plus command-line arguments with
//! the prefix '-L' (without spaces), e.g.:
//! `analysis-driver -Lnumeric_domain=interval model.json`

use analysis::{
    config,
    domains::{run_bounds_check, BoundsReport},
};
use cir::Program;
use std::fs;
use std::process::exit;

fn main() {
    env_logger::init();

    // Configuration errors are fatal at startup: no partial analysis runs.
    let checks = match config::parse_checks() {
        Ok(checks) => checks,
        Err(err) => {
            eprintln!("Configuration error: {}", config_error_message(&err));
            exit(2);
        }
    };
    if let Err(err) = config::parse_domain() {
        eprintln!("Configuration error: {}", config_error_message(&err));
        exit(2);
    }

    let args = config::get_filtered_args();
    let Some(model_path) = args.get(1) else {
        eprintln!("Usage: analysis-driver [-L<setting>=<value>...] <program-model.json>");
        exit(2);
    };

    let source = match fs::read_to_string(model_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Cannot read '{model_path}': {err}");
            exit(1);
        }
    };
    let program: Program = match serde_json::from_str(&source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("Malformed program model '{model_path}': {err}");
            exit(1);
        }
    };
    if let Err(err) = program.validate() {
        eprintln!("Malformed program model '{model_path}': {err}");
        exit(1);
    }

    if !config::quiet() {
        eprintln!(
            "Analyzing {} using {}...",
            model_path,
            config::numeric_domain()
        );
    }

    let mut reports: Vec<BoundsReport> = Vec::new();
    for check in checks {
        match check {
            config::Check::MemOutOfBounds => match run_bounds_check(&program) {
                Ok(report) => reports.push(report),
                Err(err) => {
                    eprintln!("{}", err.to_pretty_str(&program));
                    exit(1);
                }
            },
        }
    }

    for report in &reports {
        println!("{}", serde_json::to_string_pretty(report).unwrap());
    }

    let warnings: usize = reports.iter().map(|report| report.warn_count()).sum();
    if !config::quiet() {
        eprintln!("{warnings} potential out-of-bounds access(es)");
    }
}

fn config_error_message(err: &analysis::AnalysisError) -> String {
    match err {
        analysis::AnalysisError::UnknownCheck(name) => format!("unknown check '{name}'"),
        analysis::AnalysisError::UnknownDomain(name) => {
            format!("unknown numeric domain '{name}'")
        }
        _ => "invalid configuration".to_string(),
    }
}
