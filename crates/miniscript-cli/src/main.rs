//! The MiniScript challenge harness binary (spec §6 "Challenge harness").
//!
//! Loads a path to attacker source, builds a scope seeded with a `high`
//! (labelled `{"high"}`) and `low` (undefined, unlabelled) variable, parses
//! and optionally restricts the source, compiles it, runs it under a
//! monitor rule composition chosen on the command line, and prints
//! `"challenge passed"` or `"not quite. try again"` exactly as
//! `original_source/challenges/common.py`'s `Challenge.run` does — with the
//! monitor composition, restrictor, and high-value kind all made CLI flags
//! instead of hardcoded per `original_source/challenges/*/challenge.py`
//! script, since `miniscript-cli` is one harness binary rather than one
//! script per challenge.

mod challenge;

use std::{env, fmt, fs, process::ExitCode};

use challenge::{ChallengeConfig, HighKind, Outcome, RestrictorKind};
use miniscript::{builtins::StdPrint, monitor::Monitor, vm::Limits};
use rand::Rng;

struct Args {
    path: String,
    rules: Vec<String>,
    high: HighKind,
    restrictor: RestrictorKind,
    max_steps: u64,
    max_call_depth: usize,
}

#[derive(Debug)]
struct UsageError(String);

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let parsed = match parse_args(&args) {
        Ok(p) => p,
        Err(err) => {
            eprintln!("usage error: {err}");
            eprintln!(
                "usage: miniscript <code-path> [--rules block,literal,arithmetic,unary,assign,return|full|none] \
                 [--high number[:N]|boolean[:true|false]] [--restrict none|no-conditionals] \
                 [--max-steps N] [--max-call-depth N]"
            );
            return ExitCode::FAILURE;
        }
    };

    let source = match fs::read_to_string(&parsed.path) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("error reading '{}': {err}", parsed.path);
            return ExitCode::FAILURE;
        }
    };

    let monitor = match build_monitor(&parsed.rules) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("usage error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let config = ChallengeConfig {
        monitor,
        restrictor: parsed.restrictor,
        high: parsed.high,
        limits: Limits { max_call_depth: parsed.max_call_depth },
        max_steps: parsed.max_steps,
    };

    let mut out = StdPrint;
    match challenge::run(&source, &config, &mut out) {
        Outcome::Passed => {
            println!("challenge passed");
            ExitCode::SUCCESS
        }
        Outcome::FailedPolicyCheck { got } => {
            eprintln!("got low={got} with label {:?}", got.label);
            println!("not quite. try again");
            ExitCode::FAILURE
        }
        Outcome::ForbiddenSyntax => {
            eprintln!("you used forbidden syntax elements");
            println!("not quite. try again");
            ExitCode::FAILURE
        }
        Outcome::Error(err) => {
            eprintln!("{err}");
            println!("not quite. try again");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Result<Args, UsageError> {
    let mut path = None;
    let mut rules = vec!["full".to_owned()];
    let mut high = HighKind::Number(random_seed());
    let mut restrictor = RestrictorKind::AllowAll;
    let mut max_steps = 1_000_000;
    let mut max_call_depth = 256;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--rules" => {
                let value = iter.next().ok_or_else(|| UsageError("--rules requires a value".to_owned()))?;
                rules = value.split(',').map(str::to_owned).collect();
            }
            "--high" => {
                let value = iter.next().ok_or_else(|| UsageError("--high requires a value".to_owned()))?;
                high = parse_high(value)?;
            }
            "--restrict" => {
                let value = iter.next().ok_or_else(|| UsageError("--restrict requires a value".to_owned()))?;
                restrictor = match value.as_str() {
                    "none" => RestrictorKind::AllowAll,
                    "no-conditionals" => RestrictorKind::NoConditionals,
                    other => return Err(UsageError(format!("unknown restrictor '{other}'"))),
                };
            }
            "--max-steps" => {
                let value = iter.next().ok_or_else(|| UsageError("--max-steps requires a value".to_owned()))?;
                max_steps = value.parse().map_err(|_| UsageError(format!("invalid --max-steps value '{value}'")))?;
            }
            "--max-call-depth" => {
                let value = iter.next().ok_or_else(|| UsageError("--max-call-depth requires a value".to_owned()))?;
                max_call_depth =
                    value.parse().map_err(|_| UsageError(format!("invalid --max-call-depth value '{value}'")))?;
            }
            other if path.is_none() => path = Some(other.to_owned()),
            other => return Err(UsageError(format!("unexpected argument '{other}'"))),
        }
    }

    Ok(Args {
        path: path.ok_or_else(|| UsageError("missing required <code-path> argument".to_owned()))?,
        rules,
        high,
        restrictor,
        max_steps,
        max_call_depth,
    })
}

fn parse_high(spec: &str) -> Result<HighKind, UsageError> {
    match spec.split_once(':') {
        Some(("number", n)) => n.parse().map(HighKind::Number).map_err(|_| UsageError(format!("invalid number '{n}'"))),
        Some(("boolean", b)) => match b {
            "true" => Ok(HighKind::Boolean(true)),
            "false" => Ok(HighKind::Boolean(false)),
            other => Err(UsageError(format!("invalid boolean '{other}'"))),
        },
        None if spec == "number" => Ok(HighKind::Number(random_seed())),
        None if spec == "boolean" => Ok(HighKind::Boolean(rand::thread_rng().gen_bool(0.5))),
        _ => Err(UsageError(format!("invalid --high spec '{spec}'"))),
    }
}

fn random_seed() -> f64 {
    rand::thread_rng().gen_range(0..1_000_000_007) as f64
}

/// Builds the monitor for a `--rules` spec: `"full"` enables all six rules
/// (spec §4.8's "composed monitor used at top level in the shipping
/// challenges"), `"none"` disables all of them, and anything else is a
/// comma-separated subset of rule names — mirroring how each
/// `original_source/challenges/*/challenge.py` script mixes in exactly the
/// rule classes that challenge is testing.
fn build_monitor(rules: &[String]) -> Result<Monitor, UsageError> {
    if rules.len() == 1 && rules[0] == "full" {
        return Ok(Monitor::full());
    }
    if rules.len() == 1 && rules[0] == "none" {
        return Ok(Monitor::none());
    }
    let mut monitor = Monitor::none();
    for rule in rules {
        monitor = match rule.as_str() {
            "block" => monitor.with_block(true),
            "literal" => monitor.with_literal(true),
            "arithmetic" => monitor.with_arithmetic(true),
            "unary" => monitor.with_unary(true),
            "assign" => monitor.with_assign(true),
            "return" => monitor.with_return(true),
            other => return Err(UsageError(format!("unknown rule '{other}'"))),
        };
    }
    Ok(monitor)
}
