// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

mod commandline;

use self::commandline::CommandLine;
use crate::AnalysisError;
use ::config::{Config, Environment, File};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::env;
use std::sync::RwLock;

/// A check that can be activated in the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Check {
    MemOutOfBounds,
}

/// A numeric domain that can be selected in the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DomainName {
    Interval,
    Polyhedra,
}

lazy_static! {
    static ref SETTINGS: RwLock<Config> = RwLock::new({
        let mut settings = Config::default();

        // 1. Default values
        settings.set_default::<Vec<String>>(
            "ACTIVATED_CHECKS",
            vec!["mem_out_of_bounds".to_string()],
        ).unwrap();
        settings.set_default("NUMERIC_DOMAIN", "polyhedra").unwrap();
        settings.set_default("WIDENING_THRESHOLD", 3).unwrap();
        settings.set_default("INTERFERENCE_ROUNDS_BOUND", 20).unwrap();
        settings.set_default("QUIET", false).unwrap();

        // 2. Override with the optional TOML file "Lockbound.toml" (if there is any)
        settings.merge(
            File::with_name("Lockbound.toml").required(false)
        ).unwrap();

        // 3. Override with an optional TOML file specified by the `LOCKBOUND_CONFIG` env variable
        settings.merge(
            File::with_name(&env::var("LOCKBOUND_CONFIG").unwrap_or_default()).required(false)
        ).unwrap();

        // 4. Override with env variables (`LOCKBOUND_NUMERIC_DOMAIN`, ...)
        settings.merge(
            Environment::with_prefix("LOCKBOUND").ignore_empty(true)
        ).unwrap();

        // 5. Override with command-line arguments -L<arg>=<val>
        settings.merge(
            CommandLine::with_prefix("-L").ignore_invalid(true)
        ).unwrap();

        settings
    });
}

/// Return vector of arguments filtered out by prefix
pub fn get_filtered_args() -> Vec<String> {
    CommandLine::with_prefix("-L")
        .get_remaining_args()
        .collect::<Vec<String>>()
}

/// Generate a dump of the settings
pub fn dump() -> String {
    format!("{:?}", SETTINGS.read().unwrap())
}

fn read_optional_setting<T>(name: &'static str) -> Option<T>
where
    T: Deserialize<'static>,
{
    SETTINGS.read().unwrap().get(name).ok()
}

fn read_setting<T>(name: &'static str) -> T
where
    T: Deserialize<'static>,
{
    read_optional_setting(name).unwrap()
}

/// The names of the checks to run, as configured.
pub fn activated_checks() -> Vec<String> {
    read_setting("ACTIVATED_CHECKS")
}

/// The name of the numeric domain the bounds check should use.
pub fn numeric_domain() -> String {
    read_setting::<String>("NUMERIC_DOMAIN")
        .to_lowercase()
        .trim()
        .to_string()
}

/// How many times a block entry may change before the engine widens it.
pub fn widening_threshold() -> u32 {
    read_setting("WIDENING_THRESHOLD")
}

/// How many interference rounds to run before giving up on precision and
/// degrading the exchanged invariants to top.
pub fn interference_rounds_bound() -> u32 {
    read_setting("INTERFERENCE_ROUNDS_BOUND")
}

/// Should we hide user messages?
pub fn quiet() -> bool {
    read_setting("QUIET")
}

/// Resolve a list of check names; unknown names are fatal.
pub fn parse_checks_from(names: &[String]) -> Result<Vec<Check>, AnalysisError> {
    names
        .iter()
        .map(|name| match name.trim() {
            "mem_out_of_bounds" => Ok(Check::MemOutOfBounds),
            other => Err(AnalysisError::UnknownCheck(other.to_string())),
        })
        .collect()
}

/// The activated checks, resolved from the configuration.
pub fn parse_checks() -> Result<Vec<Check>, AnalysisError> {
    parse_checks_from(&activated_checks())
}

/// Resolve a domain name; unknown names are fatal.
pub fn parse_domain_from(name: &str) -> Result<DomainName, AnalysisError> {
    match name {
        "interval" => Ok(DomainName::Interval),
        "polyhedra" => Ok(DomainName::Polyhedra),
        other => Err(AnalysisError::UnknownDomain(other.to_string())),
    }
}

/// The selected numeric domain, resolved from the configuration.
pub fn parse_domain() -> Result<DomainName, AnalysisError> {
    parse_domain_from(&numeric_domain())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(parse_checks().unwrap(), vec![Check::MemOutOfBounds]);
        assert_eq!(parse_domain().unwrap(), DomainName::Polyhedra);
        assert!(widening_threshold() >= 1);
        assert!(interference_rounds_bound() >= 1);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = parse_checks_from(&["use_after_free".to_string()]).unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownCheck(_)));
        let err = parse_domain_from("octagon").unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownDomain(_)));
    }
}
