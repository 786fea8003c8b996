mod assemble;
mod binres;
mod diagnostics;
mod elf;
mod object_file;
mod project;
mod settings;


use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use palmcomp::CompressionLevel;
use palmdb::{
    AnyDatabase, Datablock, DatabaseName, FormatError, Header, RecordAttributes, RecordId,
    ResourceDatabase, ResourceKey, Tag,
};
use palmdb::part_int::U4;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::assemble::Assembler;
use crate::binres::DatabaseKind;
use crate::diagnostics::Diagnostics;
use crate::project::{parse_attributes, ConfigError, Project};
use crate::settings::{BuildSettings, Priority};


#[derive(Parser)]
#[command(version, about = "Builds and inspects PRC and PDB databases")]
struct Cli {
    /// Also log debugging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub mode: ProgMode,
}

#[derive(Subcommand)]
enum ProgMode {
    /// Assembles resources from executables, databases and raw resource files.
    Pack(PackArgs),

    /// Describes a database.
    Info(InfoArgs),
}

#[derive(Args)]
struct PackArgs {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long = "type", value_name = "TYPE")]
    pub kind_tag: Option<Tag>,

    #[arg(long)]
    pub creator: Option<Tag>,

    #[arg(long = "version-number")]
    pub version: Option<u16>,

    #[arg(long = "modnum")]
    pub modification_number: Option<u32>,

    #[arg(short, long = "attribute", value_name = "NAME")]
    pub attributes: Vec<String>,

    #[arg(long, conflicts_with_all = ["library", "generic"])]
    pub app: bool,

    #[arg(long, conflicts_with_all = ["app", "generic"])]
    pub library: bool,

    #[arg(long, conflicts_with_all = ["app", "library"])]
    pub generic: bool,

    #[arg(long)]
    pub stack_size: Option<u32>,

    #[arg(long)]
    pub heap_size: Option<u32>,

    #[arg(long)]
    pub no_data: bool,

    #[arg(long, value_name = "TYPE:ID")]
    pub main_code: Option<ResourceKey>,

    #[arg(long = "extra-code", value_name = "SECTION")]
    pub extra_code_sections: Vec<String>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=7))]
    pub compression: Option<u8>,

    #[arg(long = "force-rloc")]
    pub force_relocations: bool,

    #[arg(long, value_name = "FILE")]
    pub project: Option<PathBuf>,

    pub output: PathBuf,

    /// Input files, optionally preceded by a database name and creator.
    pub inputs: Vec<String>,
}

#[derive(Args)]
struct InfoArgs {
    #[arg(long)]
    pub json: bool,

    pub file: PathBuf,
}


fn init_logging(verbose: bool) {
    let default_level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr)
        )
        .with(filter)
        .init();
}


/// Splits off the name and creator of the positional `OUTPUT NAME CRID INPUTS...` form.
///
/// The form is assumed when neither of the first two arguments names an existing file and the
/// second is a valid creator.
fn split_legacy_arguments(inputs: &[String]) -> (Option<(String, Tag)>, Vec<PathBuf>) {
    if let [name, creator, rest @ ..] = inputs {
        if !Path::new(name).exists() && !Path::new(creator).exists() {
            if let Ok(creator_tag) = creator.parse::<Tag>() {
                let files = rest.iter().map(PathBuf::from).collect();
                return (Some((name.clone(), creator_tag)), files);
            }
        }
    }
    (None, inputs.iter().map(PathBuf::from).collect())
}

fn configure(args: &PackArgs) -> Result<(BuildSettings, Vec<PathBuf>), ConfigError> {
    let mut settings = BuildSettings::new();
    let cli = Priority::CommandLine;

    if let Some(name) = &args.name {
        settings.name.try_set(Some(DatabaseName::from(name.as_str())), cli)?;
    }
    if let Some(kind_tag) = args.kind_tag {
        settings.kind_tag.try_set(Some(kind_tag), cli)?;
    }
    if let Some(creator) = args.creator {
        settings.creator.try_set(creator, cli)?;
    }
    if let Some(version) = args.version {
        settings.version.try_set(version, cli)?;
    }
    if let Some(modification_number) = args.modification_number {
        settings.modification_number.try_set(modification_number, cli)?;
    }
    if !args.attributes.is_empty() {
        settings.attributes.try_set(parse_attributes(&args.attributes)?, cli)?;
    }
    let kind = if args.app {
        Some(DatabaseKind::Application)
    } else if args.library {
        Some(DatabaseKind::Library)
    } else if args.generic {
        Some(DatabaseKind::Generic)
    } else {
        None
    };
    if let Some(kind) = kind {
        settings.database_kind.try_set(kind, cli)?;
    }
    if let Some(stack_size) = args.stack_size {
        settings.stack_size.try_set(stack_size, cli)?;
    }
    if let Some(heap_size) = args.heap_size {
        settings.heap_size.try_set(heap_size, cli)?;
    }
    if args.no_data {
        settings.emit_data.try_set(Some(false), cli)?;
    }
    if let Some(main_code) = args.main_code {
        settings.main_code.try_set(Some(main_code), cli)?;
    }
    if !args.extra_code_sections.is_empty() {
        settings.extra_code_sections.try_set(args.extra_code_sections.clone(), cli)?;
    }
    if let Some(level) = args.compression {
        settings.compression.try_set(CompressionLevel::new(level), cli)?;
    }
    if args.force_relocations {
        settings.force_relocations.try_set(true, cli)?;
    }

    let (legacy, inputs) = split_legacy_arguments(&args.inputs);
    if let Some((name, creator)) = legacy {
        debug!("positional database name {:?} and creator {}", name, creator);
        settings.name.try_set(Some(DatabaseName::from(name.as_str())), Priority::Legacy)?;
        settings.creator.try_set(creator, Priority::Legacy)?;
    }

    if let Some(project_path) = &args.project {
        let project = Project::load(project_path)?;
        let output_name = args.output.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        project.apply(&mut settings, &output_name)?;
    }

    Ok((settings, inputs))
}

/// Writes the complete image next to `path`, then moves it into place.
fn write_database(database: &ResourceDatabase, path: &Path) -> Result<(), FormatError> {
    let image = database.serialize()?;

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = NamedTempFile::new_in(directory)?;
    temp_file.write_all(&image)?;
    temp_file.persist(path)
        .map_err(|e| e.error)?;
    Ok(())
}

fn run_pack(args: &PackArgs) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let output_origin = args.output.display().to_string();

    let (settings, inputs) = match configure(args) {
        Ok(configured) => configured,
        Err(e) => {
            diagnostics.error(&output_origin, e);
            return diagnostics;
        },
    };

    let options = settings.pack_options();
    let mut assembler = Assembler::new();
    for input in &inputs {
        if let Err(e) = assembler.add_file(input, &options, &mut diagnostics) {
            diagnostics.error(input.display(), e);
        }
    }
    if diagnostics.has_errors() {
        error!("not writing {} because of earlier errors", output_origin);
        return diagnostics;
    }
    if assembler.is_empty() {
        diagnostics.warn(&output_origin, "no resources to write");
    }

    let header: Header = settings.header(&args.output);
    if !header.name.is_terminated() {
        diagnostics.warn(&output_origin, format!("database name {:?} leaves no room for a terminating NUL", header.name.to_string()));
    }
    let database = assembler.finish(header);
    match write_database(&database, &args.output) {
        Ok(()) => info!("wrote {} resources to {}", database.len(), output_origin),
        Err(e) => diagnostics.error(&output_origin, e),
    }
    diagnostics
}


#[derive(Serialize)]
struct DatabaseSummary<'a> {
    header: &'a Header,
    app_info_size: Option<usize>,
    sort_info_size: Option<usize>,
    gap_size: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    resources: Vec<ResourceSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    records: Vec<RecordSummary>,
}

#[derive(Serialize)]
struct ResourceSummary {
    #[serde(flatten)]
    key: ResourceKey,
    size: usize,
}

#[derive(Serialize)]
struct RecordSummary {
    id: RecordId,
    attributes: RecordAttributes,
    category: U4,
    size: usize,
}

fn summarize(database: &AnyDatabase) -> DatabaseSummary<'_> {
    match database {
        AnyDatabase::Resource(db) => DatabaseSummary {
            header: &db.header,
            app_info_size: db.app_info.as_ref().map(|b| b.len()),
            sort_info_size: db.sort_info.as_ref().map(|b| b.len()),
            gap_size: db.gap.len(),
            resources: db.iter()
                .map(|(key, data)| ResourceSummary { key: *key, size: data.len() })
                .collect(),
            records: Vec::new(),
        },
        AnyDatabase::Record(db) => DatabaseSummary {
            header: &db.header,
            app_info_size: db.app_info.as_ref().map(|b| b.len()),
            sort_info_size: db.sort_info.as_ref().map(|b| b.len()),
            gap_size: db.gap.len(),
            resources: Vec::new(),
            records: db.iter()
                .map(|(id, record)| RecordSummary {
                    id: *id,
                    attributes: record.attributes,
                    category: record.category,
                    size: record.data.len(),
                })
                .collect(),
        },
    }
}

fn print_summary(summary: &DatabaseSummary<'_>) {
    let header = summary.header;
    println!("name:                {}", header.name);
    println!("type:                {}", header.kind);
    println!("creator:             {}", header.creator);
    println!("attributes:          {:?}", header.attributes);
    println!("version:             {}", header.version);
    println!("modification number: {}", header.modification_number);
    println!("created:             {}", header.created);
    println!("modified:            {}", header.modified);
    println!("backed up:           {}", header.backed_up);
    println!("unique id seed:      {}", header.unique_id_seed);
    if let Some(size) = summary.app_info_size {
        println!("AppInfo:             {} bytes", size);
    }
    if let Some(size) = summary.sort_info_size {
        println!("SortInfo:            {} bytes", size);
    }
    if summary.gap_size > 0 {
        println!("gap:                 {} bytes", summary.gap_size);
    }

    if header.is_resource() {
        println!("{} resources:", summary.resources.len());
        for resource in &summary.resources {
            println!("  {} #{:<5} {:>8} bytes", resource.key.kind, resource.key.id, resource.size);
        }
    } else {
        println!("{} records:", summary.records.len());
        for record in &summary.records {
            println!(
                "  {:#08X} {:?} category {} {:>8} bytes",
                record.id.as_base_type(), record.attributes, record.category, record.size,
            );
        }
    }
}

fn run_info(args: &InfoArgs) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let origin = args.file.display().to_string();

    let bytes = match std::fs::read(&args.file) {
        Ok(bytes) => bytes,
        Err(e) => {
            diagnostics.error(&origin, e);
            return diagnostics;
        },
    };
    let database = match AnyDatabase::parse(&Datablock::from(bytes)) {
        Ok(database) => database,
        Err(e) => {
            diagnostics.error(&origin, e);
            return diagnostics;
        },
    };

    let summary = summarize(&database);
    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => diagnostics.error(&origin, e),
        }
    } else {
        print_summary(&summary);
    }
    diagnostics
}


fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help and version requests also arrive here
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(Diagnostics::EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        },
    };
    init_logging(cli.verbose);

    let diagnostics = match &cli.mode {
        ProgMode::Pack(args) => run_pack(args),
        ProgMode::Info(args) => run_info(args),
    };
    if diagnostics.warning_count() > 0 || diagnostics.has_errors() {
        info!(
            "{} warnings, {} errors",
            diagnostics.warning_count(), diagnostics.error_count(),
        );
    }
    diagnostics.exit_code()
}
