/// Preview: interactive expansion shell for trying out grammars.
///
/// Usage: preview --grammar <path> [--seed <n>] [--origin <symbol>]
///
/// Commands:
///   flatten <rule>   expand a rule and print the text
///   origin           expand the origin symbol
///   bulk <n>         expand the origin n times with variety stats
///   stack <symbol>   show a symbol's rule stack
///   json             print the live grammar as JSON
///   clear            drop pushed rules and usage records
///   seed <n>         reset the RNG with a new seed
///   help             list commands
///   quit             exit

use narrative_grammar::{ExpansionNode, Grammar, GrammarError, Rules};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::Path;

fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut grammar_path = None;
    let mut seed: u64 = 42;
    let mut origin = "origin".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--grammar" if i + 1 < args.len() => {
                i += 1;
                grammar_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--origin" if i + 1 < args.len() => {
                i += 1;
                origin = args[i].clone();
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(path) = grammar_path else {
        eprintln!("Missing --grammar <path>");
        print_usage();
        std::process::exit(1);
    };

    let mut grammar = match load_grammar(Path::new(&path)) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("ERROR: Failed to load grammar: {}", e);
            std::process::exit(1);
        }
    };

    println!("Loaded {} symbols", grammar.symbol_names().len());
    println!("Seed: {}", seed);
    println!("Type 'help' for commands.\n");

    let mut current_seed = seed;
    let mut rng = StdRng::seed_from_u64(current_seed);
    let origin_rule = format!("#{}#", origin);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
            None => (line.to_lowercase(), ""),
        };

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "flatten" => {
                if rest.is_empty() {
                    println!("Usage: flatten <rule>");
                    continue;
                }
                print_expansion(grammar.expand(rest, &mut rng));
            }
            "origin" => {
                print_expansion(grammar.expand(&origin_rule, &mut rng));
            }
            "bulk" => {
                let count: usize = match rest.parse() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        println!("Usage: bulk <n>");
                        continue;
                    }
                };
                run_bulk(&mut grammar, &origin_rule, count, &mut rng);
            }
            "stack" => {
                if rest.is_empty() {
                    println!("Usage: stack <symbol>");
                    continue;
                }
                print_stack(&grammar, rest);
            }
            "json" => match grammar.to_json() {
                Ok(json) => println!("{}", json),
                Err(e) => println!("ERROR: {}", e),
            },
            "clear" => {
                grammar.clear_state();
                println!("Grammar state cleared.");
            }
            "seed" => {
                if rest.is_empty() {
                    println!("Current seed: {}", current_seed);
                    continue;
                }
                match rest.parse::<u64>() {
                    Ok(s) => {
                        current_seed = s;
                        rng = StdRng::seed_from_u64(current_seed);
                        println!("Seed set to {}", current_seed);
                    }
                    Err(_) => {
                        println!("Invalid seed: {}", rest);
                    }
                }
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for commands.", cmd);
            }
        }
    }
}

fn print_usage() {
    println!("Usage: preview --grammar <path> [--seed <n>] [--origin <symbol>]");
    println!();
    println!("  --grammar   RON or JSON grammar file, or a directory of .ron files");
    println!("  --seed      RNG seed (default 42)");
    println!("  --origin    symbol expanded by 'origin' and 'bulk' (default origin)");
}

fn print_help() {
    println!("Commands:");
    println!("  flatten <rule>   Expand a rule and print the text");
    println!("  origin           Expand the origin symbol");
    println!("  bulk <n>         Expand the origin n times with variety statistics");
    println!("  stack <symbol>   Show a symbol's rule stack, bottom first");
    println!("  json             Print the live grammar as JSON");
    println!("  clear            Drop pushed rules and usage records");
    println!("  seed <n>         Reset the RNG with a new seed");
    println!("  help             Show this help");
    println!("  quit             Exit");
}

fn load_grammar(path: &Path) -> Result<Grammar, GrammarError> {
    let builder = Grammar::builder().base_modifiers();
    let builder = if path.is_dir() {
        builder.grammars_dir(path)
    } else if path.extension().and_then(|s| s.to_str()) == Some("json") {
        builder.json_str(&std::fs::read_to_string(path)?)
    } else {
        builder.ron_file(path)
    };
    builder.build()
}

fn print_expansion(result: Result<ExpansionNode, GrammarError>) {
    match result {
        Ok(root) => {
            println!("\n{}\n", root.finished_text());
            for error in root.errors() {
                println!("  ! {}", error);
            }
        }
        Err(e) => println!("ERROR: {}", e),
    }
}

fn run_bulk(grammar: &mut Grammar, origin_rule: &str, count: usize, rng: &mut StdRng) {
    let mut passages = Vec::with_capacity(count);
    let mut error_count = 0;
    for _ in 0..count {
        match grammar.expand(origin_rule, rng) {
            Ok(root) => {
                error_count += root.errors().len();
                passages.push(root.into_finished_text());
            }
            Err(e) => {
                println!("ERROR: {}", e);
                return;
            }
        }
        grammar.clear_state();
    }

    for (i, passage) in passages.iter().enumerate() {
        println!("{:>4}. {}", i + 1, passage);
    }

    let unique: HashSet<&String> = passages.iter().collect();
    println!("\n--- Variety Stats ---");
    println!("Unique passages: {} / {}", unique.len(), passages.len());
    println!("Recorded errors: {}", error_count);
}

fn print_stack(grammar: &Grammar, name: &str) {
    let Some(symbol) = grammar.symbol(name) else {
        println!("No symbol '{}'", name);
        return;
    };
    if symbol.stack().is_empty() {
        println!("'{}' has an empty rule stack", name);
    }
    for (level, set) in symbol.stack().iter().enumerate() {
        match set.rules() {
            Rules::Literal(alternatives) => println!("  [{}] {:?}", level, alternatives),
            Rules::Conditional {
                condition,
                defaults,
                ..
            } => println!(
                "  [{}] if {} ... else {:?}",
                level, condition, defaults
            ),
        }
    }
    println!("  used {} times", symbol.uses().len());
}
