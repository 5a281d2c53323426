//! fabricator CLI
//!
//! Command-line workbench for the logic fabricator.
//!
//! ## Commands
//!
//! - `repl`: interactive workbench against a SQLite-backed (or in-memory)
//!   fabric
//! - `lower <json>`: lower one IR envelope and print the engine objects
//!
//! The workbench consumes IR JSON payloads — the natural-language front-end
//! that produces them is a separate program. Example session:
//!
//! ```text
//! >> rule {"rule_type":"standard","condition":{"type":"LEAF","subject":"?x","verb":"is","object":"man"},"consequence":{"type":"statement","subject":"?x","verb":"is","object":"mortal"}}
//! >> sim {"subject":"socrates","verb":"is","object":"man"}
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use logic_fabricator::{
    beliefsystem::ForkStrategy,
    codec::{IrInput, IrRule, IrStatement, LoweredInput, Translator},
    config::FabricConfig,
    db::{DatabaseAdapter, SqliteAdapter},
    error::FabricError,
    fabricator::Fabricator,
    graph::MemoryAdapter,
    properties::Uuid,
};

#[derive(Parser)]
#[command(name = "fabricator")]
#[command(author, version, about = "A workbench for fabricating belief systems", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive workbench REPL
    Repl {
        /// Keep everything in memory instead of the configured database
        #[arg(long)]
        memory: bool,

        /// Forking strategy for the session's root belief system
        #[arg(long)]
        strategy: Option<ForkStrategy>,
    },
    /// Lower one IR JSON envelope and print the resulting engine objects
    Lower {
        /// The IR envelope, e.g. {"input_type":"statement","data":{...}}
        json: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), FabricError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = FabricConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Repl { memory, strategy } => {
            if memory {
                let fabricator = Fabricator::new(MemoryAdapter::new(), config);
                repl(fabricator, strategy).await
            } else {
                let adapter = SqliteAdapter::open(&config.db_path).await?;
                let fabricator = Fabricator::new(adapter, config);
                repl(fabricator, strategy).await
            }
        }
        Commands::Lower { json } => {
            let translator = Translator::new();
            match translator.lower_input(IrInput::from_json(&json)?)? {
                LoweredInput::Rules(rules) => {
                    for rule in rules {
                        println!("{rule}");
                    }
                }
                LoweredInput::Statement(statement) => println!("{statement}"),
            }
            Ok(())
        }
    }
}

fn print_help() {
    println!("\nCommands:");
    println!("  rule <ir json>      (fabricate a rule from IR rule data)");
    println!("  sim <ir json>       (simulate an IR statement)");
    println!("  state               (show the current world state)");
    println!("  rules               (list active rules)");
    println!("  statements          (list current facts)");
    println!("  forks               (show forked realities)");
    println!("  tensions            (show latent rule conflicts)");
    println!("  history             (show persisted simulations)");
    println!("  reset               (start a fresh belief system)");
    println!("  help                (this message)");
    println!("  exit                (leave the workbench)");
}

async fn repl<A: DatabaseAdapter>(
    mut fabricator: Fabricator<A>,
    strategy: Option<ForkStrategy>,
) -> Result<(), FabricError> {
    println!("\n--- Logic Fabricator Workbench ---");
    print_help();

    let mut current = fabricator.create_belief_system("workbench", strategy).await?;
    let translator = Translator::new();
    let stdin = io::stdin();
    loop {
        print!("\n>> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        let outcome = match command {
            "rule" | "effect" => handle_rule(&mut fabricator, current, &translator, rest).await,
            "sim" => handle_sim(&mut fabricator, &mut current, &translator, rest).await,
            "state" => {
                show_state(&fabricator, &current);
                Ok(())
            }
            "rules" => {
                show_rules(&fabricator, &current);
                Ok(())
            }
            "statements" => {
                show_statements(&fabricator, &current);
                Ok(())
            }
            "forks" => {
                show_forks(&fabricator, &current);
                Ok(())
            }
            "tensions" => {
                show_tensions(&fabricator, &current);
                Ok(())
            }
            "history" => show_history(&fabricator, current).await,
            "reset" => {
                println!("Purging reality. A new belief system is born.");
                current = fabricator.create_belief_system("workbench", strategy).await?;
                Ok(())
            }
            "help" => {
                print_help();
                Ok(())
            }
            "exit" | "quit" => break,
            other => {
                println!("  !! Unknown command: '{other}'. Type 'help' for a list.");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            println!("  !! {e}");
        }
    }
    println!("Exiting workbench.");
    Ok(())
}

async fn handle_rule<A: DatabaseAdapter>(
    fabricator: &mut Fabricator<A>,
    current: Uuid,
    translator: &Translator,
    json: &str,
) -> Result<(), FabricError> {
    if json.is_empty() {
        return Err(FabricError::Validation(
            "rule command requires IR rule JSON".to_string(),
        ));
    }
    let ir: IrRule = serde_json::from_str(json)
        .map_err(|e| FabricError::Validation(format!("malformed IR rule: {e}")))?;
    for rule in translator.lower_rule(ir)? {
        println!("  ++ Fabricated Rule: {rule}");
        fabricator.add_rule(current, rule).await?;
    }
    Ok(())
}

async fn handle_sim<A: DatabaseAdapter>(
    fabricator: &mut Fabricator<A>,
    current: &mut Uuid,
    translator: &Translator,
    json: &str,
) -> Result<(), FabricError> {
    if json.is_empty() {
        return Err(FabricError::Validation(
            "sim command requires IR statement JSON".to_string(),
        ));
    }
    let ir: IrStatement = serde_json::from_str(json)
        .map_err(|e| FabricError::Validation(format!("malformed IR statement: {e}")))?;
    let statement = translator.lower_statement(ir)?;
    if !statement.is_ground() {
        return Err(FabricError::Validation(format!(
            "input statement {statement} is not ground"
        )));
    }
    println!("\n... Simulating: {statement}");
    let (record, result) = fabricator.simulate(*current, vec![statement]).await?;

    println!("\n--- Simulation Report ---");
    if let Some(forked) = record.forked_belief_id {
        println!("  !! CONTRADICTION DETECTED: Reality has forked.");
        *current = forked;
        println!("  >> Switched context to the new forked reality.");
    }
    for contradiction in &result.contradictions {
        println!("  !! Contradiction: {contradiction}");
    }
    if result.derived_facts.is_empty() {
        println!("  >> No new facts were derived.");
    } else {
        println!("  >> Derived Facts:");
        for fact in &result.derived_facts {
            println!("     - {fact}");
        }
    }
    let changes = result.world_state_changes();
    if changes.is_empty() {
        println!("  >> World state is unchanged.");
    } else {
        println!("  >> World State Changes:");
        for (key, (old, new)) in changes {
            let old = old.map(|v| v.to_string()).unwrap_or_else(|| "None".to_string());
            let new = new.map(|v| v.to_string()).unwrap_or_else(|| "None".to_string());
            println!("     - {key}: {old} -> {new}");
        }
    }
    Ok(())
}

fn show_state<A: DatabaseAdapter>(fabricator: &Fabricator<A>, current: &Uuid) {
    println!("--- World State ---");
    match fabricator.belief_system(current) {
        Some(bs) if !bs.world_state().is_empty() => {
            for (key, value) in bs.world_state().iter() {
                println!("  {key}: {value}");
            }
        }
        _ => println!("(empty)"),
    }
}

fn show_rules<A: DatabaseAdapter>(fabricator: &Fabricator<A>, current: &Uuid) {
    println!("--- Active Rules ---");
    match fabricator.belief_system(current) {
        Some(bs) if !bs.rules().is_empty() => {
            for (i, (_, rule)) in bs.rules().iter().enumerate() {
                println!("  {}: {rule}", i + 1);
            }
        }
        _ => println!("(none)"),
    }
}

fn show_statements<A: DatabaseAdapter>(fabricator: &Fabricator<A>, current: &Uuid) {
    println!("--- Current Facts ---");
    match fabricator.belief_system(current) {
        Some(bs) if !bs.facts().is_empty() => {
            for statement in bs.facts() {
                println!("  - {statement}");
            }
        }
        _ => println!("(none)"),
    }
}

fn show_forks<A: DatabaseAdapter>(fabricator: &Fabricator<A>, current: &Uuid) {
    println!("--- Forks ---");
    match fabricator.belief_system(current) {
        Some(bs) => {
            println!("This reality has forked {} time(s).", bs.forks().len());
            for fork in bs.forks() {
                match &fork.contradiction {
                    Some(record) => println!("  - {} ({})", fork.child_id, record),
                    None => println!("  - {} (manual, {})", fork.child_id, fork.strategy),
                }
            }
        }
        None => println!("(no active belief system)"),
    }
}

fn show_tensions<A: DatabaseAdapter>(fabricator: &Fabricator<A>, current: &Uuid) {
    println!("--- Latent Tensions ---");
    match fabricator.belief_system(current) {
        Some(bs) if !bs.tensions().is_empty() => {
            for tension in bs.tensions() {
                println!(
                    "  - {} vs {} under {}",
                    tension.rule_a, tension.rule_b, tension.witness
                );
            }
        }
        _ => println!("(none)"),
    }
}

async fn show_history<A: DatabaseAdapter>(
    fabricator: &Fabricator<A>,
    current: Uuid,
) -> Result<(), FabricError> {
    println!("--- Simulation History ---");
    let history = fabricator.get_simulation_history(current).await?;
    if history.is_empty() {
        println!("(none)");
    }
    for record in history {
        println!(
            "  {} @ {}: {} introduced, {} derived, {} applied{}",
            record.id,
            record.timestamp,
            record.introduced_statements.len(),
            record.derived_statements.len(),
            record.applied_rules.len(),
            record
                .forked_belief_id
                .map(|f| format!(", forked {f}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
