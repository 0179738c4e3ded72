use clap::{Args, Parser, Subcommand, ValueEnum};
use component_visa::{normalize_entities, render_json_ui, render_text};
use serde_json::{Value, json};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use visa_spec::{
    AnswerSet, DocumentChecklist, FormBundle, FormRegistry, ValidationResult,
    registry::load_bundle, required_documents, resolve_visibility, validate,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const REGISTRY_ENV: &str = "VISA_FORMS_REGISTRY";
const DEFAULT_LOG_FILTER: &str = "visa_forms=info,visa_spec=warn";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Visa form bundle inspector",
    long_about = "Evaluates visibility, document requirements and validation for visa form bundles"
)]
struct Cli {
    /// Emit debug logs on stderr.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

/// Where the bundle comes from: a file, or a registry entry.
#[derive(Args, Debug)]
struct BundleArgs {
    /// Path to a FormBundle JSON file.
    #[arg(long, value_name = "BUNDLE", conflicts_with = "form")]
    bundle: Option<PathBuf>,
    /// Registry entry as COUNTRY/FORM-ID.
    #[arg(long, value_name = "COUNTRY/FORM")]
    form: Option<String>,
    /// Registry directory (defaults to VISA_FORMS_REGISTRY).
    #[arg(long, value_name = "DIR")]
    registry: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// List the bundles of a registry directory.
    Forms {
        /// Registry directory (defaults to VISA_FORMS_REGISTRY).
        #[arg(long, value_name = "DIR")]
        registry: Option<PathBuf>,
        /// Glob over COUNTRY/FORM-ID, e.g. `ca/*`.
        #[arg(long, value_name = "GLOB")]
        filter: Option<String>,
    },
    /// Print which fields are visible for the given answers.
    Visible {
        #[command(flatten)]
        source: BundleArgs,
        /// Path to the answers JSON file.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// Print the documents currently required.
    Documents {
        #[command(flatten)]
        source: BundleArgs,
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Group documents by the answer that triggered them.
        #[arg(long)]
        checklist: bool,
    },
    /// Validate answers against a bundle.
    Validate {
        #[command(flatten)]
        source: BundleArgs,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Render the form state for the given answers.
    Render {
        #[command(flatten)]
        source: BundleArgs,
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Print the JSON Schema of the bundle format.
    Schema,
    /// Normalize a stored sub-entity list (children, education, employment, military).
    Entities {
        #[arg(long)]
        kind: String,
        /// File holding the stored value; any of the accepted shapes.
        #[arg(long, value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Command::Forms { registry, filter } => run_forms(registry, filter),
        Command::Visible { source, answers } => run_visible(source, answers),
        Command::Documents {
            source,
            answers,
            checklist,
        } => run_documents(source, answers, checklist),
        Command::Validate { source, answers } => run_validate(source, answers),
        Command::Render {
            source,
            answers,
            format,
        } => run_render(source, answers, format),
        Command::Schema => print_json(&visa_spec::bundle_schema()),
        Command::Entities { kind, input } => run_entities(&kind, &input),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn resolve_registry_dir(explicit: Option<PathBuf>) -> CliResult<PathBuf> {
    explicit
        .or_else(|| env::var_os(REGISTRY_ENV).map(PathBuf::from))
        .ok_or_else(|| {
            format!("no registry directory; pass --registry or set {}", REGISTRY_ENV).into()
        })
}

fn load_registry(dir: Option<PathBuf>) -> CliResult<FormRegistry> {
    let dir = resolve_registry_dir(dir)?;
    let registry = FormRegistry::builder().load_dir(&dir)?.build();
    info!(dir = %dir.display(), forms = registry.len(), "loaded registry");
    Ok(registry)
}

fn split_form_key(key: &str) -> CliResult<(&str, &str)> {
    key.split_once('/')
        .filter(|(country, form_id)| !country.is_empty() && !form_id.is_empty())
        .ok_or_else(|| format!("expected COUNTRY/FORM-ID, got '{}'", key).into())
}

fn load_source(source: BundleArgs) -> CliResult<FormBundle> {
    match (source.bundle, source.form) {
        (Some(path), _) => {
            let registry = FormRegistry::builder().register(load_bundle(&path)?)?.build();
            registry
                .list()
                .next()
                .cloned()
                .ok_or_else(|| format!("{} holds no form", path.display()).into())
        }
        (None, Some(key)) => {
            let (country, form_id) = split_form_key(&key)?;
            let registry = load_registry(source.registry)?;
            registry
                .get(country, form_id)
                .cloned()
                .ok_or_else(|| format!("form '{}' is not registered", key).into())
        }
        (None, None) => Err("pass --bundle or --form".into()),
    }
}

fn load_answers(path: Option<&Path>) -> CliResult<AnswerSet> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)?;
            let value: Value = serde_json::from_str(&raw)?;
            if !value.is_object() {
                return Err(format!("{} does not hold a JSON object", path.display()).into());
            }
            Ok(AnswerSet::from_value(&value))
        }
        None => Ok(AnswerSet::new()),
    }
}

fn print_json(value: &Value) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_forms(registry: Option<PathBuf>, filter: Option<String>) -> CliResult<()> {
    let registry = load_registry(registry)?;
    let bundles = match filter.as_deref() {
        Some(pattern) => registry.matching(pattern)?,
        None => registry.list().collect(),
    };
    if bundles.is_empty() {
        println!("No forms found.");
        return Ok(());
    }
    for bundle in bundles {
        let warnings = bundle.lint();
        let mut line = format!(
            "{}/{}  {} (v{}, {} fields, {} documents)",
            bundle.country,
            bundle.id,
            bundle.title,
            bundle.version,
            bundle.fields.len(),
            bundle.documents.len()
        );
        if !warnings.is_empty() {
            line.push_str(&format!("  [{} lint warning(s)]", warnings.len()));
        }
        println!("{}", line);
        for warning in warnings {
            debug!(
                owner = %warning.owner,
                missing = %warning.missing_field,
                "dangling condition reference"
            );
        }
    }
    Ok(())
}

fn run_visible(source: BundleArgs, answers: Option<PathBuf>) -> CliResult<()> {
    let bundle = load_source(source)?;
    let answers = load_answers(answers.as_deref())?;
    let visibility = resolve_visibility(&bundle, &answers);
    for field in &bundle.fields {
        if visibility.get(&field.id).copied().unwrap_or(true) {
            let marker = if field.is_required(&answers) { " [required]" } else { "" };
            println!("{} ({}){}", field.id, field.group, marker);
        }
    }
    Ok(())
}

fn run_documents(source: BundleArgs, answers: Option<PathBuf>, checklist: bool) -> CliResult<()> {
    let bundle = load_source(source)?;
    let answers = load_answers(answers.as_deref())?;
    if !checklist {
        for id in required_documents(&bundle.documents, &answers) {
            println!("{}", id);
        }
        return Ok(());
    }

    let checklist = DocumentChecklist::build(&bundle.documents, &answers, |trigger| {
        bundle
            .field(trigger)
            .map(|field| field.label.clone())
            .unwrap_or_else(|| trigger.to_string())
    });
    for group in &checklist.groups {
        println!("{}:", group.title);
        for document in &group.documents {
            let marker = if document.required { "" } else { " (optional)" };
            println!("  - {} [{}]{}", document.name, document.id, marker);
        }
    }
    Ok(())
}

fn run_validate(source: BundleArgs, answers_path: PathBuf) -> CliResult<()> {
    let bundle = load_source(source)?;
    let answers = load_answers(Some(&answers_path))?;

    let result = validate(&bundle, &answers);
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!("  {} - {} ({})", error.path, error.message, error.code);
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required answers: {}",
            result.missing_required.join(", ")
        );
    }
    if !result.unknown_fields.is_empty() {
        println!(
            "Unknown answer fields: {}",
            result.unknown_fields.join(", ")
        );
    }
}

fn run_render(source: BundleArgs, answers: Option<PathBuf>, format: RenderMode) -> CliResult<()> {
    let bundle = load_source(source)?;
    let answers = load_answers(answers.as_deref())?;
    let config = json!({ "bundle_json": serde_json::to_string(&bundle)? }).to_string();
    let answers_json = answers.to_value().to_string();

    let output = match format {
        RenderMode::Text => {
            let text = render_text(&bundle.country, &bundle.id, &config, &answers_json);
            if text.starts_with('{') {
                parse_component_result(&text)?;
            }
            text
        }
        RenderMode::Json => {
            let raw = render_json_ui(&bundle.country, &bundle.id, &config, &answers_json);
            let value = parse_component_result(&raw)?;
            serde_json::to_string_pretty(&value)?
        }
    };
    println!("{}", output);
    Ok(())
}

fn run_entities(kind: &str, input: &Path) -> CliResult<()> {
    let raw = fs::read_to_string(input)?;
    let response = normalize_entities(kind, raw.trim());
    print_json(&parse_component_result(&response)?)
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(error.to_string().into());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use assert_fs::TempDir as FsTempDir;
    use assert_fs::prelude::*;
    use tempfile::TempDir;

    const BUNDLE: &str = include_str!("../../visa-spec/tests/fixtures/canada_visitor.json");

    fn cli() -> Command {
        let mut command = Command::cargo_bin("visa-forms").expect("binary");
        command.env_remove(REGISTRY_ENV);
        command
    }

    fn write_fixture(dir: &Path, answers: &Value) -> (PathBuf, PathBuf) {
        let bundle_path = dir.join("ca.json");
        let answers_path = dir.join("answers.json");
        fs::write(&bundle_path, BUNDLE).expect("bundle");
        fs::write(&answers_path, answers.to_string()).expect("answers");
        (bundle_path, answers_path)
    }

    fn stdout_of(output: &std::process::Output) -> String {
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    #[test]
    fn split_form_key_requires_both_parts() {
        assert_eq!(split_form_key("ca/visitor").unwrap(), ("ca", "visitor"));
        assert!(split_form_key("ca/").is_err());
        assert!(split_form_key("visitor").is_err());
    }

    #[test]
    fn parse_component_result_surfaces_errors() {
        assert!(parse_component_result(r#"{"error":"boom"}"#).is_err());
        assert_eq!(
            parse_component_result(r#"{"ok":true}"#).unwrap(),
            json!({ "ok": true })
        );
    }

    #[test]
    fn visible_lists_conditional_fields() {
        let dir = TempDir::new().expect("tempdir");
        let (bundle, answers) = write_fixture(dir.path(), &json!({ "maritalStatus": "married" }));

        let output = cli()
            .args(["visible", "--bundle"])
            .arg(&bundle)
            .arg("--answers")
            .arg(&answers)
            .output()
            .expect("run");
        assert!(output.status.success());
        let stdout = stdout_of(&output);
        assert!(stdout.contains("spouseName (family) [required]"));
        assert!(!stdout.contains("hostName"));
    }

    #[test]
    fn documents_checklist_groups_by_trigger() {
        let dir = TempDir::new().expect("tempdir");
        let (bundle, answers) = write_fixture(dir.path(), &json!({ "maritalStatus": "married" }));

        let output = cli()
            .args(["documents", "--checklist", "--bundle"])
            .arg(&bundle)
            .arg("--answers")
            .arg(&answers)
            .output()
            .expect("run");
        assert!(output.status.success());
        let stdout = stdout_of(&output);
        assert!(stdout.contains("General requirements:"));
        assert!(stdout.contains("Digital photo [photo] (optional)"));
        assert!(stdout.contains("Current marital status:"));
    }

    #[test]
    fn validate_fails_on_missing_answers() {
        let dir = TempDir::new().expect("tempdir");
        let (bundle, answers) = write_fixture(dir.path(), &json!({}));

        let output = cli()
            .args(["validate", "--bundle"])
            .arg(&bundle)
            .arg("--answers")
            .arg(&answers)
            .output()
            .expect("run");
        assert!(!output.status.success());
        let stdout = stdout_of(&output);
        assert!(stdout.contains("Validation result: invalid"));
        assert!(stdout.contains("Missing required answers: familyName"));
    }

    #[test]
    fn forms_reads_registry_from_env() {
        let registry = FsTempDir::new().expect("tempdir");
        registry.child("ca.json").write_str(BUNDLE).expect("write");

        let output = cli()
            .env(REGISTRY_ENV, registry.path())
            .args(["forms", "--filter", "ca/*"])
            .output()
            .expect("run");
        assert!(output.status.success());
        assert!(stdout_of(&output).contains("ca/visitor-visa  Canada Visitor Visa"));

        let output = cli()
            .env(REGISTRY_ENV, registry.path())
            .args(["forms", "--filter", "us/*"])
            .output()
            .expect("run");
        assert!(stdout_of(&output).contains("No forms found."));
    }

    #[test]
    fn render_json_through_registry_entry() {
        let registry = FsTempDir::new().expect("tempdir");
        registry.child("ca.json").write_str(BUNDLE).expect("write");

        let output = cli()
            .args(["render", "--format", "json", "--form", "CA/visitor-visa", "--registry"])
            .arg(registry.path())
            .output()
            .expect("run");
        assert!(output.status.success());
        let value: Value = serde_json::from_slice(&output.stdout).expect("json");
        assert_eq!(value["form_id"], "visitor-visa");
        assert_eq!(value["status"], "need_input");
    }

    #[test]
    fn entities_normalizes_wrapped_input() {
        let dir = FsTempDir::new().expect("tempdir");
        let input = dir.child("children.json");
        input
            .write_str(r#"{"value":[{"id":3,"firstName":"Ana"}]}"#)
            .expect("write");

        let output = cli()
            .args(["entities", "--kind", "children", "--input"])
            .arg(input.path())
            .output()
            .expect("run");
        assert!(output.status.success());
        let value: Value = serde_json::from_slice(&output.stdout).expect("json");
        assert_eq!(value["records"][0]["id"], 3);
        assert_eq!(value["active"], 3);
    }

    #[test]
    fn missing_bundle_source_is_an_error() {
        let output = cli().arg("visible").output().expect("run");
        assert!(!output.status.success());
    }
}
