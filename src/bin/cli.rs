use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;

use dedupe::algo::string_distance;
use dedupe::model::{Attributes, DataModel, FieldDef, Record};
use dedupe::{Dedupe, LabeledPair};

#[derive(Parser)]
#[command(
    name = "dedupe",
    version,
    about = "Entity resolution: active learning, blocking, and clustering over record collections"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a model from a field-definition file and a training file, and
    /// write a settings file.
    Train {
        /// JSON field-definition file (array of {"name", "type"} objects;
        /// type is "String" or "MissingDataIndicator")
        #[arg(long)]
        fields: String,
        /// Training file (see `training_file` module documentation)
        #[arg(long)]
        training: String,
        /// Where to write the settings file
        #[arg(long)]
        out: String,
        /// Cross-validation fold count (defaults to min(20, n))
        #[arg(long)]
        cv_folds: Option<usize>,
    },
    /// Block, score, and cluster a record file (JSON array of objects,
    /// each carrying an "id" plus field values) against a settings file.
    /// Prints clusters as JSON to stdout.
    Cluster {
        /// Settings file written by `train`
        #[arg(long)]
        settings: String,
        /// Record file; reads stdin if omitted
        #[arg(long)]
        records: Option<String>,
        /// Minimum match probability to form an edge
        #[arg(long, default_value_t = 0.5)]
        threshold: f64,
    },
    /// Compute the affine-gap distance between two ad hoc strings.
    Similarity {
        a: String,
        b: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Train { fields, training, out, cv_folds } => cmd_train(&fields, &training, &out, cv_folds),
        Commands::Cluster { settings, records, threshold } => cmd_cluster(&settings, records.as_deref(), threshold),
        Commands::Similarity { a, b } => cmd_similarity(&a, &b),
    }
}

#[derive(Deserialize)]
struct FieldFileEntry {
    name: String,
    #[serde(rename = "type", default = "default_field_type")]
    kind: String,
    #[serde(default)]
    missing: bool,
}

fn default_field_type() -> String {
    "String".to_string()
}

fn read_field_definitions(path: &str) -> DataModel {
    let raw = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("failed to read field file '{path}': {e}");
        std::process::exit(1);
    });
    let entries: Vec<FieldFileEntry> = serde_json::from_str(&raw).unwrap_or_else(|e| {
        eprintln!("invalid field file JSON: {e}");
        std::process::exit(1);
    });

    let fields = entries
        .into_iter()
        .map(|e| {
            let def = match e.kind.as_str() {
                "String" => FieldDef::string(),
                other => {
                    eprintln!("unsupported field type '{other}'; the CLI only accepts String fields (Custom fields require a Rust comparator)");
                    std::process::exit(1);
                }
            };
            (e.name, def.with_missing(e.missing))
        })
        .collect();

    DataModel::new(fields).unwrap_or_else(|e| {
        eprintln!("invalid field definitions: {e}");
        std::process::exit(1);
    })
}

fn cmd_train(fields_path: &str, training_path: &str, out_path: &str, cv_folds: Option<usize>) {
    let model = read_field_definitions(fields_path);
    let training_json = fs::read_to_string(training_path).unwrap_or_else(|e| {
        eprintln!("failed to read training file '{training_path}': {e}");
        std::process::exit(1);
    });
    let labeled: Vec<LabeledPair> = Dedupe::read_training(&training_json).unwrap_or_else(|e| {
        eprintln!("invalid training file: {e}");
        std::process::exit(1);
    });

    let mut dedupe = Dedupe::new(model);
    dedupe.fit(&labeled, cv_folds).unwrap_or_else(|e| {
        eprintln!("training failed: {e}");
        std::process::exit(1);
    });

    // No separate unlabeled sample is available from the training file
    // alone; fall back to the distinct records the labeled pairs reference,
    // which is what bounds the ppc pair-coverage cap in this CLI flow.
    let mut seen = std::collections::HashSet::new();
    let sample: Vec<Record> = labeled
        .iter()
        .flat_map(|p| [&p.a, &p.b])
        .filter(|r| seen.insert(r.id.clone()))
        .cloned()
        .collect();
    dedupe.learn_blocking(&labeled, &sample, 1.0, 1.0);

    let bytes = dedupe.write_settings().unwrap_or_else(|e| {
        eprintln!("failed to serialize settings: {e}");
        std::process::exit(1);
    });
    fs::write(out_path, &bytes).unwrap_or_else(|e| {
        eprintln!("failed to write settings file '{out_path}': {e}");
        std::process::exit(1);
    });
    eprintln!("wrote {} bytes to {out_path}", bytes.len());
}

fn read_records_json(path: Option<&str>) -> Vec<Record> {
    let raw = match path {
        Some(p) => fs::read_to_string(p).unwrap_or_else(|e| {
            eprintln!("failed to read record file '{p}': {e}");
            std::process::exit(1);
        }),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).expect("failed to read stdin");
            buf
        }
    };
    let rows: Vec<Value> = serde_json::from_str(&raw).unwrap_or_else(|e| {
        eprintln!("invalid record JSON: {e}");
        std::process::exit(1);
    });

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let obj = row.as_object().cloned().unwrap_or_default();
            let id = obj
                .get("id")
                .and_then(|v| v.as_str().map(String::from).or_else(|| Some(v.to_string())))
                .unwrap_or_else(|| i.to_string());
            let mut attrs = Attributes::new();
            for (k, v) in obj {
                if k == "id" {
                    continue;
                }
                if let Some(s) = v.as_str() {
                    attrs.insert(k, s.to_string());
                }
            }
            Record::new(id, attrs)
        })
        .collect()
}

fn cmd_cluster(settings_path: &str, records_path: Option<&str>, threshold: f64) {
    let bytes = fs::read(settings_path).unwrap_or_else(|e| {
        eprintln!("failed to read settings file '{settings_path}': {e}");
        std::process::exit(1);
    });
    let dedupe = Dedupe::read_settings(&bytes, &HashMap::new()).unwrap_or_else(|e| {
        eprintln!("invalid settings file: {e}");
        std::process::exit(1);
    });

    let records = read_records_json(records_path);
    let clusters = dedupe.duplicate_clusters(&records, threshold).unwrap_or_else(|e| {
        eprintln!("clustering failed: {e}");
        std::process::exit(1);
    });

    let output: Vec<Value> = clusters
        .into_iter()
        .map(|c| {
            serde_json::json!({
                "record_ids": c.record_ids,
                "average_probability": c.average_probability,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}

fn cmd_similarity(a: &str, b: &str) {
    let distance = string_distance::normalized_affine_gap(a, b);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "a": a, "b": b, "affine_gap_distance": distance, "similarity": 1.0 - distance,
        }))
        .unwrap()
    );
}
