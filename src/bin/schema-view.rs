//! Schema View CLI
//!
//! Command-line interface for navigating and validating documents through
//! their schemas.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use schema_view::{
    check, load_document_auto, Element, Error, Instance, Node, Pointer, Schema, Severity, Token,
};

#[derive(Parser)]
#[command(name = "schema-view")]
#[command(about = "Navigate and validate JSON documents through their JSON Schemas")]
#[command(version)]
struct Cli {
    /// Log schema resolution to stderr (-v debug, -vv trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a value from an instance, resolving the schema along the way
    Get {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Instance source: file path or URL
        instance: String,

        /// JSON Pointer into the instance (e.g., /owner/email)
        #[arg(long, default_value = "")]
        path: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Validate an instance against a schema or one of its subschemas
    Validate {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Instance source: file path or URL
        instance: String,

        /// JSON Pointer of the subschema to validate against (e.g., /definitions/pet)
        #[arg(long)]
        fragment: Option<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Describe the view a schema implies: identifier, shape and accessors
    Describe {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// JSON Pointer of the subschema to describe
        #[arg(long)]
        fragment: Option<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Check a schema document for broken refs, bad patterns and cycles
    Check {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Get {
            schema,
            instance,
            path,
            json,
        } => run_get(&schema, &instance, &path, json),
        Commands::Validate {
            schema,
            instance,
            fragment,
            json,
        } => run_validate(&schema, &instance, fragment.as_deref(), json),
        Commands::Describe {
            schema,
            fragment,
            json,
        } => run_describe(&schema, fragment.as_deref(), json),
        Commands::Check {
            schema,
            json,
            strict,
        } => run_check(&schema, json, strict),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load(source: &str, what: &str, json_output: bool) -> Result<Value, u8> {
    load_document_auto(source).map_err(|e| {
        report_error(json_output, &format!("loading {}: {}", what, e));
        e.exit_code() as u8
    })
}

/// Root schema of the document at `source`, or its subschema at `fragment`.
fn load_schema(source: &str, fragment: Option<&str>, json_output: bool) -> Result<Schema, u8> {
    let document = load(source, "schema", json_output)?;
    let fail = |e: Error| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    };

    let root = Node::new(document);
    let node = match fragment {
        None => root,
        Some(fragment) => {
            let pointer = Pointer::from_fragment(fragment).ok_or_else(|| {
                report_error(
                    json_output,
                    &format!("invalid fragment \"{}\": expected a JSON Pointer", fragment),
                );
                2u8
            })?;
            Node::at(std::sync::Arc::clone(root.document()), pointer)
                .and_then(|node| node.deref())
                .map_err(fail)?
        }
    };
    Schema::new(node).map_err(fail)
}

fn run_get(schema_source: &str, instance_source: &str, path: &str, json_output: bool) -> Result<(), u8> {
    let schema = load_schema(schema_source, None, json_output)?;
    let data = load(instance_source, "instance", json_output)?;
    let fail = |e: Error| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    };

    let pointer = Pointer::parse(path).ok_or_else(|| {
        report_error(
            json_output,
            &format!("invalid path \"{}\": expected a JSON Pointer", path),
        );
        2u8
    })?;

    let root = Instance::new(data, schema).map_err(fail)?;
    let mut current = Element::Instance(root);
    let mut walked = Pointer::root();

    for token in pointer.tokens() {
        walked = walked.child(token.clone());
        let next = match &current {
            Element::Instance(instance) => step(instance, token).map_err(fail)?,
            // Below a plain value there is no schema left to resolve.
            Element::Value(value) => Pointer::new([token.clone()])
                .evaluate(value)
                .cloned()
                .map(Element::Value),
        };
        current = next.ok_or_else(|| {
            fail(Error::PointerNotFound {
                pointer: walked.fragment(),
            })
        })?;
    }

    let schema_id = current
        .as_instance()
        .map(|instance| instance.schema().schema_id().to_string());
    let value = match &current {
        Element::Instance(instance) => instance.value().clone(),
        Element::Value(value) => value.clone(),
    };

    if json_output {
        let output = json!({
            "path": walked.fragment(),
            "schema_id": schema_id,
            "value": value,
        });
        println!("{}", output);
    } else {
        if let Some(id) = schema_id {
            println!("# {}", id);
        }
        let text = serde_json::to_string_pretty(&value).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", text);
    }
    Ok(())
}

/// One navigation step, by property name on objects and by index on arrays.
fn step(instance: &Instance, token: &Token) -> Result<Option<Element>, Error> {
    match (token, instance.node().is_array()) {
        (Token::Index(i), true) => instance.index(*i),
        (Token::Key(key), true) => match key.parse::<usize>() {
            Ok(i) => instance.index(i),
            Err(_) => instance.get(key),
        },
        (token, false) => instance.get(&token.as_text()),
    }
}

fn run_validate(
    schema_source: &str,
    instance_source: &str,
    fragment: Option<&str>,
    json_output: bool,
) -> Result<(), u8> {
    let schema = load_schema(schema_source, fragment, json_output)?;
    let instance = load(instance_source, "instance", json_output)?;

    let errors = schema.fully_validate_instance(&instance).map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;

    if errors.is_empty() {
        if json_output {
            println!(r#"{{"valid":true}}"#);
        } else {
            println!("Valid");
        }
        return Ok(());
    }

    if json_output {
        let output = json!({
            "valid": false,
            "schema_id": schema.schema_id(),
            "errors": errors
        });
        println!("{}", output);
    } else {
        eprintln!("Validation failed:");
        for error in errors {
            eprintln!("  {}", error);
        }
    }
    Err(1)
}

fn run_describe(schema_source: &str, fragment: Option<&str>, json_output: bool) -> Result<(), u8> {
    let schema = load_schema(schema_source, fragment, json_output)?;
    let view = schema.view().map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;

    if json_output {
        println!("{}", view.summary());
    } else {
        println!("schema: {}", view.schema_id());
        println!("shape: {:?}", view.shape());
        for accessor in view.accessors() {
            println!("  {}", accessor);
        }
    }
    Ok(())
}

fn run_check(schema_source: &str, json_output: bool, strict: bool) -> Result<(), u8> {
    let document = load(schema_source, "schema", json_output)?;
    let result = check(&document);

    if json_output {
        let text = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", text);
    } else {
        for diag in &result.diagnostics {
            let (color, label) = match diag.severity {
                Severity::Error => ("\x1b[31m", "error"),
                Severity::Warning => ("\x1b[33m", "warning"),
            };
            println!(
                "  {}{}[{}]\x1b[0m: {} - {}",
                color, label, diag.code, diag.path, diag.message
            );
        }
        if result.passes(strict) {
            println!("\x1b[32m✓ {} passed\x1b[0m", schema_source);
        } else {
            println!(
                "\x1b[31m✗ {} failed ({} errors, {} warnings)\x1b[0m",
                schema_source, result.errors, result.warnings
            );
        }
    }

    if result.passes(strict) {
        Ok(())
    } else {
        Err(1)
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
