/// PoseKit Terminal - annotate part poses against dataset images
///
/// Controls:
///   - x/y/z/w/p/r: nudge the relative pose (uppercase: opposite direction)
///   - h/j or 1-9: change image
///   - n/d/Tab/Delete: new, duplicate, next, remove part; a: change its CAD part
///   - c, arrows, Space, m: add a correspondence, move the cursor, store pixel, pick point
///   - [ ] / Backspace: select or remove correspondences
///   - Enter: write the solver request, l: load the solved pose
///   - t: toggle vertex snapping
///   - s: save, q/ESC: quit
use anyhow::Context;
use clap::Parser;
use posekit_core::{Dataset, Session};
use posekit_terminal::{AppConfig, TerminalApp};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, Level};

/// Terminal pose annotation over a JSON dataset.
#[derive(Parser)]
struct Args {
    /// Dataset JSON to load
    #[arg(short, long)]
    dataset: PathBuf,

    /// Where `s` saves the dataset (defaults to the input path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log file; the terminal itself is taken by the UI
    #[arg(long, default_value = "posekit.log")]
    log_file: PathBuf,

    /// Translation nudge per key press
    #[arg(long, default_value_t = 0.1)]
    translation_step: f64,

    /// Rotation nudge per key press, in degrees
    #[arg(long, default_value_t = 0.05)]
    rotation_step: f64,

    /// Edge length of the proxy cube drawn for every part
    #[arg(long, default_value_t = 50.0)]
    proxy_size: f64,

    /// Start with vertex snapping disabled
    #[arg(long)]
    no_snap: bool,

    /// Where Enter writes the pose solver request
    #[arg(long, default_value = "posekit-request.json")]
    solver_request: PathBuf,

    /// Where `l` reads the solved 16-float pose matrix from
    #[arg(long, default_value = "posekit-response.json")]
    solver_response: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_file = File::create(&args.log_file)
        .with_context(|| format!("creating log file {}", args.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let file = File::open(&args.dataset)
        .with_context(|| format!("opening dataset {}", args.dataset.display()))?;
    let dataset = Dataset::from_reader(BufReader::new(file))?;
    let session = Session::new(dataset)?;
    info!(dataset = %args.dataset.display(), "starting annotation session");

    let config = AppConfig {
        output: args.output.unwrap_or_else(|| args.dataset.clone()),
        translation_step: args.translation_step,
        rotation_step: args.rotation_step,
        proxy_size: args.proxy_size,
        snap: !args.no_snap,
        solver_request: args.solver_request,
        solver_response: args.solver_response,
    };

    let mut app = TerminalApp::new(session, config)?;
    app.run()?;

    info!("session closed");
    Ok(())
}
