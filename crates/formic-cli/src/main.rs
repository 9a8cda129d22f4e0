use std::fs;
use std::path::{Path, PathBuf};

use ariadne::{Config, Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand};
use serde_json::{Value as Json, json};

use formic::{ChangeEvent, CompileError, Engine, Value};

#[derive(Parser)]
#[command(name = "formic")]
#[command(about = "Reactive computed-property engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a schema, apply values and print the settled state
    Eval {
        /// Path to the schema JSON file
        schema: PathBuf,
        /// Path-keyed JSON object of values to apply
        #[arg(long)]
        values: Option<PathBuf>,
        /// JSON file holding the ambient context object
        #[arg(long)]
        context: Option<PathBuf>,
        /// Write the settled value snapshot to this file
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Compile every computed option in a schema and report failures
    Check {
        /// Path to the schema JSON file
        schema: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Eval {
            schema,
            values,
            context,
            state,
        } => {
            let schema_json = read_json(&schema);
            let mut engine = Engine::new();
            if let Err(error) = register_nodes(&mut engine, &schema_json, "") {
                report_error(&error);
                std::process::exit(1);
            }

            if let Some(values) = values {
                engine.import_values(&read_json(&values));
            }
            if let Some(context) = context {
                engine.set_context(Value::from_json(&read_json(&context)));
            }

            engine.prime();
            if let Err(error) = engine.flush() {
                eprintln!("Error: {error}");
                std::process::exit(1);
            }

            let events = engine.take_events();
            let snapshot = engine.export_values();
            let output = json!({
                "values": snapshot,
                "events": events.iter().map(event_json).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());

            if let Some(state) = state {
                if let Err(error) = fs::write(&state, snapshot.to_string()) {
                    eprintln!("Error writing {}: {error}", state.display());
                    std::process::exit(1);
                }
            }
        }
        Commands::Check { schema } => {
            let schema_json = read_json(&schema);
            let mut engine = Engine::new();
            match register_nodes(&mut engine, &schema_json, "") {
                Ok(count) => {
                    eprintln!("{count} computed nodes compiled cleanly");
                }
                Err(error) => {
                    report_error(&error);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn read_json(path: &Path) -> Json {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            eprintln!("Error reading {}: {error}", path.display());
            std::process::exit(1);
        }
    };
    match serde_json::from_str(&text) {
        Ok(json) => json,
        Err(error) => {
            eprintln!("Error parsing {}: {error}", path.display());
            std::process::exit(1);
        }
    }
}

/// Register every schema node carrying a computed surface, walking
/// `properties` recursively. Node paths mirror the property nesting.
fn register_nodes(engine: &mut Engine, schema: &Json, path: &str) -> Result<usize, CompileError> {
    let mut count = 0;
    if has_computed_surface(schema) {
        let node_path = if path.is_empty() { "/" } else { path };
        engine.add_node(node_path, schema)?;
        count += 1;
    }
    if let Some(Json::Object(properties)) = schema.get("properties") {
        for (name, child) in properties {
            count += register_nodes(engine, child, &format!("{path}/{name}"))?;
        }
    }
    Ok(count)
}

fn has_computed_surface(schema: &Json) -> bool {
    let Json::Object(fields) = schema else {
        return false;
    };
    let alias = |name: &str| fields.contains_key(format!("${name}").as_str());
    formic::schema::GATE_OPTIONS.iter().any(|gate| alias(gate))
        || alias("value")
        || alias("watch")
        || fields.contains_key("computed")
        || ["oneOf", "anyOf", "allOf"]
            .iter()
            .any(|key| matches!(fields.get(*key), Some(Json::Array(_))))
}

fn event_json(event: &ChangeEvent) -> Json {
    match event {
        ChangeEvent::ValueChanged { path, value } => {
            json!({ "kind": "value", "path": path, "value": value.to_json() })
        }
        ChangeEvent::GateChanged { path, gate, state } => {
            json!({ "kind": "gate", "path": path, "gate": gate, "state": state })
        }
        ChangeEvent::WatchFired { path, values } => {
            json!({
                "kind": "watch",
                "path": path,
                "values": values.iter().map(Value::to_json).collect::<Vec<_>>(),
            })
        }
        ChangeEvent::BranchChanged { path, selection } => {
            json!({ "kind": "branch", "path": path, "selection": selection })
        }
    }
}

/// Render a compile failure; expression errors get a source report over
/// the generated body.
fn report_error(error: &CompileError) {
    match error {
        CompileError::Expression {
            field,
            expression,
            generated,
            span,
            reason,
        } => {
            eprintln!("Error compiling `{field}`: {expression}");
            let range = span.clone().unwrap_or(0..generated.len());
            let result = Report::build(ReportKind::Error, ("expression", range.clone()))
                .with_config(Config::default().with_color(false))
                .with_message(reason)
                .with_label(Label::new(("expression", range)).with_message(reason))
                .finish()
                .eprint(("expression", Source::from(generated.as_str())));
            if result.is_err() {
                eprintln!("{error}");
            }
        }
        CompileError::Branch { .. } => eprintln!("Error: {error}"),
    }
}
