// © 2024, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use cir::{AccessKind, Body, LinearExpr, Location, Program, ThreadId, Var};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::fmt;

/// The per-access outcome of the bounds check. `NoWarn` is a proof; `Warn`
/// only means "cannot prove", which is the safe default under imprecision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Warn,
    NoWarn,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Verdict::Warn => write!(f, "WARN"),
            Verdict::NoWarn => write!(f, "NOWARN"),
        }
    }
}

impl Serialize for Verdict {
    fn serialize<Se: Serializer>(&self, serializer: Se) -> Result<Se::Ok, Se::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// One static access site with its verdict and the individual proof
/// obligations that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessReport {
    pub thread: String,
    pub location: Location,
    pub statement: String,
    pub region: String,
    pub verdict: Verdict,
    pub lower_bound_proved: bool,
    pub upper_bound_proved: bool,
    pub allocation_proved: bool,
}

impl Serialize for AccessReport {
    fn serialize<Se: Serializer>(&self, serializer: Se) -> Result<Se::Ok, Se::Error> {
        let mut map = serializer.serialize_map(Some(7))?;
        map.serialize_entry("thread", &self.thread)?;
        map.serialize_entry("location", &self.location.to_string())?;
        map.serialize_entry("statement", &self.statement)?;
        map.serialize_entry("region", &self.region)?;
        map.serialize_entry("verdict", &self.verdict)?;
        map.serialize_entry(
            "proved",
            &ProvedParts {
                lower: self.lower_bound_proved,
                upper: self.upper_bound_proved,
                allocation: self.allocation_proved,
            },
        )?;
        map.serialize_entry("summary", &format!("{self}"))?;
        map.end()
    }
}

#[derive(Serialize)]
struct ProvedParts {
    lower: bool,
    upper: bool,
    allocation: bool,
}

impl fmt::Display for AccessReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}: {} // {}",
            self.thread, self.location, self.statement, self.verdict
        )
    }
}

/// All verdicts of one bounds-check run, in deterministic (thread, location)
/// order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundsReport {
    pub domain: String,
    pub accesses: Vec<AccessReport>,
}

impl BoundsReport {
    pub(super) fn new(domain: &str, accesses: Vec<AccessReport>) -> Self {
        BoundsReport {
            domain: domain.to_string(),
            accesses,
        }
    }

    pub fn warn_count(&self) -> usize {
        self.accesses
            .iter()
            .filter(|access| access.verdict == Verdict::Warn)
            .count()
    }

    pub fn accesses_of_thread(&self, thread: &str) -> Vec<&AccessReport> {
        self.accesses
            .iter()
            .filter(|access| access.thread == thread)
            .collect()
    }
}

impl Serialize for BoundsReport {
    fn serialize<Se: Serializer>(&self, serializer: Se) -> Result<Se::Ok, Se::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("check", "mem_out_of_bounds")?;
        map.serialize_entry("domain", &self.domain)?;
        map.serialize_entry("accesses", &self.accesses)?;
        map.end()
    }
}

fn pretty_var(program: &Program, body: &Body, var: Var) -> String {
    match var {
        Var::Local(local) => body
            .local_decls
            .get(local.0)
            .map(|decl| decl.name.clone())
            .unwrap_or_else(|| format!("{local}")),
        Var::Global(global) => program
            .globals
            .get(global.0)
            .map(|decl| decl.name.clone())
            .unwrap_or_else(|| format!("{global}")),
    }
}

fn pretty_expr(program: &Program, body: &Body, expr: &LinearExpr) -> String {
    use fmt::Write;
    let mut out = String::new();
    let mut first = true;
    for &(var, coeff) in expr.terms() {
        let name = pretty_var(program, body, var);
        if first {
            match coeff {
                1 => write!(out, "{name}").unwrap(),
                -1 => write!(out, "-{name}").unwrap(),
                _ => write!(out, "{coeff}*{name}").unwrap(),
            }
            first = false;
        } else {
            let sign = if coeff < 0 { '-' } else { '+' };
            match coeff.abs() {
                1 => write!(out, " {sign} {name}").unwrap(),
                a => write!(out, " {sign} {a}*{name}").unwrap(),
            }
        }
    }
    if first {
        write!(out, "{}", expr.constant_part()).unwrap();
    } else if expr.constant_part() != 0 {
        let sign = if expr.constant_part() < 0 { '-' } else { '+' };
        write!(out, " {sign} {}", expr.constant_part().abs()).unwrap();
    }
    out
}

/// Renders `region[offset]` with the model's variable names, for readable
/// reports.
pub(super) fn pretty_access(
    program: &Program,
    thread: ThreadId,
    region: cir::Region,
    offset: &LinearExpr,
    kind: AccessKind,
) -> String {
    let body = &program.thread(thread).body;
    let region_name = program
        .regions
        .get(region.0)
        .map(|decl| decl.name.as_str())
        .unwrap_or("<unknown>");
    let verb = match kind {
        AccessKind::Load => "load",
        AccessKind::Store => "store",
    };
    format!(
        "{verb} {region_name}[{}]",
        pretty_expr(program, body, offset)
    )
}
