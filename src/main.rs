use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
    sync::Arc,
};

use clap::{Args, Parser, Subcommand};

use docview::controller::{Controller, LoadOutcome};
use docview::fetch::Source;
use docview::location::Location;
use docview::markdown::RendererChoice;
use docview::page::{self, PageSurface};
use docview::registry::Registry;
use docview::serve;

/// Options shared by every command that loads documents.
#[derive(Args, Clone)]
struct ViewerArgs {
    /// Registry file (.json, .yml or .yaml) listing `file`/`title` pairs
    #[arg(long)]
    registry: Option<PathBuf>,
    /// Markdown renderer; `none` shows documents as escaped preformatted text
    #[arg(long, value_enum, default_value_t = RendererChoice::Comrak)]
    renderer: RendererChoice,
}

/// Explicit subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Load one document and write the resulting viewer page
    Open {
        /// Document filename, relative to the source
        file: String,
        /// Directory or http(s) base URL the document is fetched from
        #[arg(long, default_value = ".")]
        source: String,
        /// Write the page here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[command(flatten)]
        viewer: ViewerArgs,
    },
    /// Serve a directory of markdown documents and the viewer page over HTTP
    Serve {
        /// Directory containing the documents
        dir: String,
        /// Interface address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Starting port number for the HTTP server
        #[arg(long, default_value = "3333")]
        port: u16,
        #[command(flatten)]
        viewer: ViewerArgs,
    },
}

/// Full CLI with explicit subcommands.
#[derive(Parser)]
#[command(
    name = "docview",
    version,
    about = "A single-page markdown document viewer",
    after_help = "INVOCATION FORMS:\n  docview <file>                   Open file from the current directory (legacy)\n  docview open [OPTIONS] <file>    Open file and print the viewer page\n  docview serve [OPTIONS] <dir>    Serve documents over HTTP"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Legacy positional form: docview <file>
#[derive(Parser)]
#[command(name = "docview", version, about = "A single-page markdown document viewer")]
struct LegacyCli {
    /// Document filename in the current directory
    file: String,
}

/// Resolved dispatch mode after CLI argument parsing.
enum DispatchMode {
    Open {
        file: String,
        source: String,
        output: Option<PathBuf>,
        viewer: ViewerArgs,
    },
    Serve {
        dir: String,
        bind: String,
        port: u16,
        viewer: ViewerArgs,
    },
}

fn resolve_dispatch_mode() -> DispatchMode {
    match Cli::try_parse() {
        Ok(cli) => match cli.command {
            Commands::Open {
                file,
                source,
                output,
                viewer,
            } => DispatchMode::Open {
                file,
                source,
                output,
                viewer,
            },
            Commands::Serve {
                dir,
                bind,
                port,
                viewer,
            } => DispatchMode::Serve {
                dir,
                bind,
                port,
                viewer,
            },
        },
        Err(clap_err) => {
            // Pass --help, --version, and subcommand-level help through to the full Cli handler.
            use clap::error::ErrorKind;
            if matches!(
                clap_err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                clap_err.exit();
            }
            // Fall back to legacy positional parse: docview <file>
            if clap_err.kind() != ErrorKind::InvalidSubcommand {
                clap_err.exit();
            }
            match LegacyCli::try_parse() {
                Ok(legacy) => {
                    eprintln!("[legacy] open dispatched for: {}", legacy.file);
                    DispatchMode::Open {
                        file: legacy.file,
                        source: ".".to_owned(),
                        output: None,
                        viewer: ViewerArgs {
                            registry: None,
                            renderer: RendererChoice::default(),
                        },
                    }
                }
                Err(_) => clap_err.exit(),
            }
        }
    }
}

fn load_registry(path: Option<&Path>) -> io::Result<Registry> {
    match path {
        None => Ok(Registry::default()),
        Some(path) => Registry::load(path).map_err(|e| {
            eprintln!("Error: {e}");
            io::Error::new(io::ErrorKind::InvalidData, e)
        }),
    }
}

fn main() -> io::Result<()> {
    match resolve_dispatch_mode() {
        DispatchMode::Open {
            file,
            source,
            output,
            viewer,
        } => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let failed = rt.block_on(run_open(&file, &source, output.as_deref(), &viewer))?;
            if failed {
                process::exit(1);
            }
            Ok(())
        }
        DispatchMode::Serve {
            dir,
            bind,
            port,
            viewer,
        } => {
            let options = serve::ServeOptions {
                bind,
                port,
                registry: load_registry(viewer.registry.as_deref())?,
                renderer: viewer.renderer.renderer(),
            };
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            rt.block_on(serve::run_serve(dir, options))
        }
    }
}

/// Load `file` once and write the viewer page. Returns `true` when the load
/// failed (the page, showing the error panel, is still written).
async fn run_open(
    file: &str,
    source_arg: &str,
    output: Option<&Path>,
    viewer: &ViewerArgs,
) -> io::Result<bool> {
    let registry = Arc::new(load_registry(viewer.registry.as_deref())?);
    let source = Source::from_arg(source_arg).map_err(|msg| {
        eprintln!("Error: {msg}");
        io::Error::new(io::ErrorKind::InvalidInput, msg)
    })?;

    let source_desc = source.describe();
    let mut controller = Controller::new(
        registry,
        source,
        viewer.renderer.renderer(),
        PageSurface::default(),
        Location::parse("/"),
    );
    let outcome = controller.load_document(file).await;
    eprintln!("[open] file={file} source={source_desc} outcome={outcome:?}");

    let page = page::build_page_shell(
        controller.registry(),
        controller.surface(),
        controller.home_path(),
    );
    match output {
        Some(path) => fs::write(path, page)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(page.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(matches!(outcome, LoadOutcome::Failed(_)))
}
