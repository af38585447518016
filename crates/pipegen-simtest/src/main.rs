//! Pipegen Headless Harness
//!
//! Sweeps difficulty levels through the background generator and checks
//! every structural property a finished level must hold.
//! Runs entirely in-process, no rendering.
//!
//! Usage:
//!   cargo run -p pipegen-simtest
//!   cargo run -p pipegen-simtest -- --verbose --levels 40 --rules rules.json

use pipegen_core::prelude::*;
use pipegen_logic::grid::GridDimensions;
use std::collections::{HashMap, HashSet};

/// Seed overrides tried per level before the level counts as failed
const SEED_ATTEMPTS: i32 = 8;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

struct Args {
    verbose: bool,
    levels: i32,
    rules: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        verbose: false,
        levels: 20,
        rules: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--verbose" => args.verbose = true,
            "--levels" => {
                let value = iter.next().ok_or("--levels needs a value")?;
                args.levels = value
                    .parse()
                    .map_err(|e| format!("bad --levels '{}': {}", value, e))?;
            }
            "--rules" => args.rules = Some(iter.next().ok_or("--rules needs a path")?),
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }
    Ok(args)
}

fn main() {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    println!("=== Pipegen Level Harness ===\n");

    let mut results = Vec::new();

    // 1. Difficulty rules
    let rules = match load_rules(args.rules.as_deref(), &mut results) {
        Some(r) => r,
        None => GeneratorRules::default(),
    };
    results.extend(validate_rules(&rules, args.levels));

    // 2. Level sweep
    results.extend(validate_level_sweep(&rules, args.levels, args.verbose));

    // 3. Determinism
    results.extend(validate_determinism(&rules));

    // 4. Invalid options & cancellation
    results.extend(validate_engine_scenarios());

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Difficulty Rules ─────────────────────────────────────────────────

fn load_rules(path: Option<&str>, results: &mut Vec<TestResult>) -> Option<GeneratorRules> {
    let path = path?;
    println!("--- Rules File ---");

    let loaded = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| GeneratorRules::from_json(&json).map_err(|e| e.to_string()));

    match loaded {
        Ok(rules) => {
            results.push(TestResult {
                name: "rules_parse".into(),
                passed: true,
                detail: format!("loaded {}", path),
            });
            Some(rules)
        }
        Err(e) => {
            results.push(TestResult {
                name: "rules_parse".into(),
                passed: false,
                detail: format!("{}: {}", path, e),
            });
            None
        }
    }
}

fn validate_rules(rules: &GeneratorRules, levels: i32) -> Vec<TestResult> {
    println!("--- Difficulty Rules ---");
    let mut results = Vec::new();

    // Every level in the sweep produces valid options
    let invalid: Vec<_> = (1..=levels)
        .filter_map(|level| {
            let errors = validate_options(&rules.options_for_level(level));
            (!errors.is_empty()).then(|| format!("level {}: {}", level, errors[0]))
        })
        .collect();
    results.push(TestResult {
        name: "rules_valid_options".into(),
        passed: invalid.is_empty(),
        detail: if invalid.is_empty() {
            format!("levels 1..={} all valid", levels)
        } else {
            invalid.join("; ")
        },
    });

    // Difficulty never decreases
    let regressions: Vec<_> = (1..levels)
        .filter(|&level| {
            let a = rules.options_for_level(level);
            let b = rules.options_for_level(level + 1);
            b.play_space_size < a.play_space_size
                || b.max_num_pipes < a.max_num_pipes
                || b.max_junctions < a.max_junctions
                || b.max_fixed < a.max_fixed
                || b.max_blocks < a.max_blocks
        })
        .collect();
    results.push(TestResult {
        name: "rules_monotonic".into(),
        passed: regressions.is_empty(),
        detail: format!("{} regressions", regressions.len()),
    });

    // Rules survive a JSON round trip
    let reparsed = rules
        .to_json_pretty()
        .map_err(|e| e.to_string())
        .and_then(|json| GeneratorRules::from_json(&json).map_err(|e| e.to_string()));
    results.push(TestResult {
        name: "rules_json".into(),
        passed: reparsed.as_ref().map_or(false, |r| r == rules),
        detail: match reparsed {
            Ok(_) => "round trip ok".into(),
            Err(e) => e,
        },
    });

    results
}

// ── 2. Level Sweep ──────────────────────────────────────────────────────

/// Generate `level`, retrying with seed overrides until one completes.
fn generate_with_retries(
    generator: &mut LevelGenerator,
    rules: &GeneratorRules,
    level: i32,
) -> Result<(GeneratedLevel, i32), String> {
    let mut last = String::from("no attempt made");
    for attempt in 0..SEED_ATTEMPTS {
        let seed = if attempt == 0 {
            None
        } else {
            Some(level.saturating_mul(1000).saturating_add(attempt))
        };
        let options = rules.options_with_seed(level, seed);
        if let Err(e) = generator.generate_level(&options) {
            return Err(e.to_string());
        }
        match generator.wait() {
            GeneratorStatus::Complete => {
                if let Some(done) = generator.level() {
                    return Ok((done.clone(), attempt + 1));
                }
                last = "complete without a level".into();
            }
            status => {
                last = match generator.last_error() {
                    Some(e) => format!("{:?}: {}", status, e),
                    None => format!("{:?}", status),
                };
                log::debug!("level {} attempt {} failed: {}", level, attempt, last);
            }
        }
    }
    Err(last)
}

fn validate_level_sweep(rules: &GeneratorRules, levels: i32, verbose: bool) -> Vec<TestResult> {
    println!("--- Level Sweep ---");
    let mut results = Vec::new();
    let mut generator = LevelGenerator::new();
    let mut completed = 0;

    for level in 1..=levels {
        match generate_with_retries(&mut generator, rules, level) {
            Ok((done, attempts)) => {
                completed += 1;
                if verbose {
                    println!(
                        "  level {:>3}: play {} pipes {} realized {} virtual {} ({} attempt(s))",
                        level,
                        done.play_space_size,
                        done.pipe_classes().len(),
                        done.realized.len(),
                        done.virtual_pipes.len(),
                        attempts
                    );
                }
                let problems = level_problems(&done);
                results.push(TestResult {
                    name: format!("level_{}_invariants", level),
                    passed: problems.is_empty(),
                    detail: if problems.is_empty() {
                        format!("{} segments ok", done.realized.len() + done.virtual_pipes.len())
                    } else {
                        problems.join("; ")
                    },
                });
            }
            Err(e) => results.push(TestResult {
                name: format!("level_{}_generates", level),
                passed: false,
                detail: e,
            }),
        }
    }

    println!("  {}/{} levels completed", completed, levels);
    results
}

/// Every broken structural property of a finished level
fn level_problems(level: &GeneratedLevel) -> Vec<String> {
    let mut problems = Vec::new();
    let Some(dims) = GridDimensions::for_play_space(level.play_space_size) else {
        return vec![format!("bad play space {}", level.play_space_size)];
    };

    // Partition
    let placed = level.realized.len() + level.virtual_pipes.len();
    if placed > dims.cell_count() {
        problems.push(format!("{} segments exceed {} cells", placed, dims.cell_count()));
    }

    // Overlap & bounds
    let mut map = HashMap::new();
    for s in level.segments() {
        if !dims.contains(s.location) {
            problems.push(format!("{} out of bounds", s.location));
        }
        if map.insert(s.location, *s).is_some() {
            problems.push(format!("overlap at {}", s.location));
        }
    }

    for s in level.segments() {
        // Shape
        if s.connections.count() != s.pipe_type.connection_count() || !s.pipe_type.accepts(s.connections) {
            problems.push(format!("bad {} shape at {}", s.pipe_type, s.location));
        }

        // Placement
        match s.pipe_type {
            PipeType::Start | PipeType::End => {
                if dims.shell_axes(s.location) != 1 {
                    problems.push(format!("{} off the shell at {}", s.pipe_type, s.location));
                }
                if dims.side_of(s.location) == Some(Direction::Back) {
                    problems.push(format!("{} on back face at {}", s.pipe_type, s.location));
                }
            }
            _ => {
                if !dims.is_interior(s.location) {
                    problems.push(format!("{} outside interior at {}", s.pipe_type, s.location));
                }
            }
        }

        // Reciprocity
        for d in s.connections.iter() {
            match map.get(&s.location.step(d)) {
                Some(n) if n.pipe_class == s.pipe_class && n.connections.contains(d.opposite()) => {}
                _ => problems.push(format!("dangling {:?} connection at {}", d, s.location)),
            }
        }
    }

    // Virtual ordering
    if !level
        .virtual_pipes
        .windows(2)
        .all(|w| w[0].pipe_type.ordinal() <= w[1].pipe_type.ordinal())
    {
        problems.push("virtual pipes not sorted by type".into());
    }

    // Per-class terminals, non-degenerate pipes
    let classes: HashSet<u8> = level.pipe_classes().into_iter().collect();
    for class in classes {
        let of = |t: PipeType| {
            level
                .segments()
                .filter(|s| s.pipe_class == class && s.pipe_type == t)
                .map(|s| s.location)
                .collect::<Vec<_>>()
        };
        let starts = of(PipeType::Start);
        let ends = of(PipeType::End);
        let junctions = of(PipeType::Junction);
        if starts.len() != 1 {
            problems.push(format!("class {} has {} starts", class, starts.len()));
        }
        if ends.len() != junctions.len() + 1 {
            problems.push(format!(
                "class {} has {} ends for {} junctions",
                class,
                ends.len(),
                junctions.len()
            ));
        }
        if let (Some(&start), Some(&end)) = (starts.first(), ends.first()) {
            if junctions.is_empty() && start.differing_axes(end) < 2 {
                problems.push(format!("class {} is a straight line {} -> {}", class, start, end));
            }
        }
    }

    problems
}

// ── 3. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(rules: &GeneratorRules) -> Vec<TestResult> {
    println!("--- Determinism ---");
    let mut results = Vec::new();

    for level in [1, 50, 200] {
        let mut a = LevelGenerator::new();
        let mut b = LevelGenerator::new();
        let outcome = match (generate_with_retries(&mut a, rules, level), generate_with_retries(&mut b, rules, level)) {
            (Ok((la, na)), Ok((lb, nb))) => {
                let bytes = (level_to_bytes(&la), level_to_bytes(&lb));
                match bytes {
                    (Ok(ba), Ok(bb)) => Ok(na == nb && ba == bb),
                    (Err(e), _) | (_, Err(e)) => Err(e.to_string()),
                }
            }
            (Err(ea), Err(eb)) => Ok(ea == eb),
            _ => Ok(false),
        };
        results.push(TestResult {
            name: format!("determinism_level_{}", level),
            passed: matches!(outcome, Ok(true)),
            detail: match outcome {
                Ok(true) => "identical snapshots".into(),
                Ok(false) => "runs diverged".into(),
                Err(e) => e,
            },
        });
    }

    results
}

// ── 4. Engine Scenarios ─────────────────────────────────────────────────

fn validate_engine_scenarios() -> Vec<TestResult> {
    println!("--- Engine Scenarios ---");
    let mut results = Vec::new();
    let mut generator = LevelGenerator::new();

    // Too-small play space is rejected without starting a worker
    let invalid = GenerateOptions {
        level: 1,
        play_space_size: 2,
        max_num_pipes: 1,
        max_junctions: 0,
        max_fixed: 0,
        max_blocks: 0,
        straight_cost: 10,
        corner_cost: 11,
    };
    let rejected = matches!(
        generator.generate_level(&invalid),
        Err(StartError::Options(OptionsError::PlaySpaceTooSmall(_)))
    );
    results.push(TestResult {
        name: "invalid_options_rejected".into(),
        passed: rejected && generator.status() == GeneratorStatus::Idle,
        detail: format!("status {:?}", generator.status()),
    });

    // Cancel right after starting a large level
    let large = GenerateOptions {
        level: 7,
        play_space_size: 40,
        max_num_pipes: 12,
        max_junctions: 11,
        max_fixed: 11,
        max_blocks: 12,
        ..invalid
    };
    let started = generator.generate_level(&large).is_ok();
    generator.cancel_level();
    results.push(TestResult {
        name: "cancel_clears_outputs".into(),
        passed: started
            && generator.status() == GeneratorStatus::Idle
            && generator.realized_pipes().is_empty()
            && generator.virtual_pipes().is_empty(),
        detail: format!("status {:?}", generator.status()),
    });

    results
}
