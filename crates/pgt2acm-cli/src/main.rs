//! pgt2acm - convert ZTP PolicyGenTemplates into ACM PolicyGenerator manifests

use clap::Parser;
use pgt2acm_convert::files::NAMESPACE_FILE;
use std::path::PathBuf;

mod commands;
mod error;
mod exit_codes;
mod logging;

#[derive(Parser)]
#[command(name = "pgt2acm")]
#[command(version)]
#[command(about = "Convert ZTP PolicyGenTemplates into ACM PolicyGenerator manifests", long_about = None)]
struct Cli {
    /// PolicyGenTemplate file or directory
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output directory for the generated PolicyGenerator files
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Merge-key schema for custom resources (compact map or OpenAPI)
    #[arg(short = 's', long = "schema")]
    schema: Option<PathBuf>,

    /// Source CR kinds to pre-render patches for (comma separated)
    #[arg(short = 'k', long = "pre-render-kinds", value_delimiter = ',')]
    pre_render_kinds: Vec<String>,

    /// Namespace file, relative to the output directory, that receives the
    /// default cluster set bindings; empty to skip kustomization processing
    #[arg(short = 'n', long = "ns-file", default_value = NAMESPACE_FILE)]
    ns_file: String,

    /// Reference source CR directories to copy into both trees (comma separated)
    #[arg(short = 'c', long = "source-crs", value_delimiter = ',')]
    source_crs: Vec<PathBuf>,

    /// Show what would be generated without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Fail when a keyed list element lacks its merge key instead of
    /// replacing the whole list
    #[arg(long)]
    strict_merge_keys: bool,

    /// Print the conversion report as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug output
    #[arg(long, env = "PGT2ACM_DEBUG")]
    debug: bool,
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    logging::init(cli.debug);

    if cli.debug {
        // SAFETY: We're the only thread at this point (start of main)
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }

    let args = commands::convert::Args {
        input: cli.input,
        output: cli.output,
        schema: cli.schema,
        pre_render_kinds: cli.pre_render_kinds,
        ns_file: Some(cli.ns_file)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from),
        source_crs: cli.source_crs,
        dry_run: cli.dry_run,
        strict_merge_keys: cli.strict_merge_keys,
        json: cli.json,
    };

    if let Err(err) = commands::convert::run(&args) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
