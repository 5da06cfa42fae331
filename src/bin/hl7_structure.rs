//! Simple CLI for HL7 v2 structure schemas
//!
//! Inspects schema documents and builds skeleton message trees from them.

use clap::{Parser, Subcommand};
use octofhir_hl7_structure::{
    DefaultStructureFactory, EngineConfig, Group, SchemaDocument, SchemaRegistry, StructureError,
    StructureKind, StructureNode, StructureResult, StructureTree, flatten, validate,
};
use std::fs;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hl7-structure")]
#[command(about = "Inspect HL7 v2 structure schemas and build message skeletons")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the slot table of one or all structures
    Inspect {
        /// JSON schema document
        schema: String,
        /// Only show this structure
        #[arg(short, long)]
        structure: Option<String>,
    },
    /// Build a message with every required slot populated and print its records
    Skeleton {
        /// JSON schema document
        schema: String,
        /// Message type to build
        message: String,
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Check that every slot type in the document is declared
    Validate {
        /// JSON schema document
        schema: String,
        /// Suppress informational messages
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() {
    // Setup human-panic for better error messages
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new().filter_level(level).init();

    match cli.command {
        Commands::Inspect { schema, structure } => {
            handle_inspect(&schema, structure.as_deref());
        }
        Commands::Skeleton {
            schema,
            message,
            pretty,
        } => {
            handle_skeleton(&schema, &message, pretty);
        }
        Commands::Validate { schema, quiet } => {
            handle_validate(&schema, quiet);
        }
    }
}

fn load_registry(filename: &str) -> SchemaRegistry {
    let content = match fs::read_to_string(filename) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{filename}': {e}");
            process::exit(1);
        }
    };

    let document = match SchemaDocument::from_json(&content) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Error parsing schema document: {e}");
            process::exit(1);
        }
    };

    match SchemaRegistry::from_document(&document) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error loading schema document: {e}");
            process::exit(1);
        }
    }
}

fn handle_inspect(filename: &str, only: Option<&str>) {
    let registry = load_registry(filename);

    let names = match only {
        Some(name) => vec![name.to_string()],
        None => registry.type_names(),
    };

    for name in names {
        let structure = match registry.lookup(&name) {
            Ok(structure) => structure,
            Err(e) => {
                eprintln!("✗ {e}");
                process::exit(1);
            }
        };

        match structure.description() {
            Some(description) => {
                println!("{} ({}) - {}", structure.name(), structure.kind(), description)
            }
            None => println!("{} ({})", structure.name(), structure.kind()),
        }
        for slot in structure.slots() {
            let description = slot.description.as_deref().unwrap_or("");
            println!(
                "  {:>3}: {:<32} {:<32} {:<5} {}",
                slot.ordinal,
                slot.name,
                slot.type_name,
                slot.cardinality().to_string(),
                description
            );
        }
    }
}

fn handle_skeleton(filename: &str, message: &str, pretty: bool) {
    let registry = Arc::new(load_registry(filename));

    let factory = Arc::new(DefaultStructureFactory::new(registry));
    let mut tree = match StructureTree::new(message, factory, EngineConfig::strict()) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Error creating {message}: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = populate_required(&mut tree, &mut Vec::new()) {
        eprintln!("Error populating {message}: {e}");
        process::exit(1);
    }
    debug_assert!(validate(tree.root()).is_valid());

    let records = flatten(tree.root());
    let output = if pretty {
        serde_json::to_string_pretty(&records)
    } else {
        serde_json::to_string(&records)
    };
    match output {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing records: {e}");
            process::exit(1);
        }
    }
}

/// Read every required slot so lazy creation fills the tree
///
/// `ancestors` holds the group types on the current branch; meeting one of
/// them again means the required slots never bottom out.
fn populate_required(group: &mut Group, ancestors: &mut Vec<String>) -> StructureResult<()> {
    if ancestors.iter().any(|name| name == group.type_name()) {
        ancestors.push(group.type_name().to_string());
        return Err(StructureError::invalid_declaration(
            group.type_name(),
            format!("required groups form a cycle: {}", ancestors.join(" -> ")),
        ));
    }
    ancestors.push(group.type_name().to_string());

    let required: Vec<String> = group
        .children()
        .filter(|(slot, _)| slot.required)
        .map(|(slot, _)| slot.name.clone())
        .collect();

    for name in required {
        if let StructureNode::Group(child) = group.get(&name)? {
            populate_required(child, ancestors)?;
        }
    }
    ancestors.pop();
    Ok(())
}

fn handle_validate(filename: &str, quiet: bool) {
    let registry = load_registry(filename);

    match registry.check_references() {
        Ok(()) => {
            if !quiet {
                println!("✓ Schema is consistent");
                let messages = registry
                    .type_names()
                    .iter()
                    .filter_map(|name| registry.get(name))
                    .filter(|structure| structure.kind() == StructureKind::Message)
                    .count();
                println!(
                    "Structures: {} ({} message type(s))",
                    registry.len(),
                    messages
                );
            } else {
                println!("VALID");
            }
        }
        Err(e) => {
            if !quiet {
                eprintln!("✗ Inconsistent schema: {e}");
            } else {
                eprintln!("INVALID");
            }
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_hl7_structure::{StructureErrorKind, StructureTypeBuilder};

    fn tree(registry: SchemaRegistry) -> StructureTree {
        StructureTree::with_defaults("MSG", Arc::new(registry)).unwrap()
    }

    #[test]
    fn test_populate_required_fills_nested_groups() {
        let registry = SchemaRegistry::new();
        registry.declare_segments(["MSH", "PID", "NTE"]).unwrap();
        StructureTypeBuilder::group("PATIENT")
            .required("PID")
            .optional_repeating("NTE")
            .declare(&registry)
            .unwrap();
        StructureTypeBuilder::message("MSG")
            .required("MSH")
            .repeating("PATIENT")
            .declare(&registry)
            .unwrap();
        let mut tree = tree(registry);

        populate_required(&mut tree, &mut Vec::new()).unwrap();
        let paths: Vec<String> = flatten(&tree)
            .into_iter()
            .map(|record| record.path.to_string())
            .collect();
        assert_eq!(paths, vec!["MSH(0)", "PATIENT(0)", "PATIENT(0)/PID(0)"]);
        assert!(validate(&tree).is_valid());
    }

    #[test]
    fn test_populate_required_reports_cycle() {
        let registry = SchemaRegistry::new();
        registry.declare_segments(["MSH"]).unwrap();
        StructureTypeBuilder::group("LOOP_A")
            .required("LOOP_B")
            .declare(&registry)
            .unwrap();
        StructureTypeBuilder::group("LOOP_B")
            .required("LOOP_A")
            .declare(&registry)
            .unwrap();
        StructureTypeBuilder::message("MSG")
            .required("MSH")
            .optional("LOOP_A")
            .declare(&registry)
            .unwrap();
        let mut tree = tree(registry);

        // Optional entry into the cycle is left alone
        populate_required(&mut tree, &mut Vec::new()).unwrap();
        assert_eq!(tree.count("LOOP_A").unwrap(), 0);

        let err = populate_required(
            tree.get("LOOP_A").unwrap().as_group_mut().unwrap(),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), StructureErrorKind::InvalidDeclaration);
        assert!(err.to_string().contains("LOOP_A -> LOOP_B -> LOOP_A"));
    }
}
