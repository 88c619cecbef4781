//! Overlay CLI Tool
//!
//! Command-line interface for inspecting distributions and simulating
//! overlay playback against a scripted clock.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use overlay_core::{ActivationDocument, ActivationId, Distribution, Position};
use overlay_runtime::{
    ActivationSource, FadeTransition, HostListener, ManualPlayback, Millis, PlaybackSource,
    Session, SessionConfig,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "overlay")]
#[command(about = "Timed video overlays - inspect distributions and simulate playback")]
#[command(version)]
struct Cli {
    /// Log scheduling decisions (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show distribution information
    Inspect {
        /// Distribution file (flat or API response form)
        distribution: PathBuf,

        /// Print the distribution in flat JSON form instead
        #[arg(long)]
        json: bool,
    },

    /// Run a headless session on a scripted playback clock
    Simulate {
        /// Distribution file (flat or API response form)
        distribution: PathBuf,

        /// Directory holding one `<id>.json` per activation
        #[arg(short, long)]
        activations: PathBuf,

        /// Slot to monitor (repeatable; defaults to every slot the
        /// distribution targets)
        #[arg(long = "slot", value_name = "NAME")]
        slots: Vec<String>,

        /// Playback duration in ms (defaults to the end of the last window)
        #[arg(long)]
        duration: Option<Position>,

        /// Host clock resolution in ms
        #[arg(long, default_value = "15")]
        step: Millis,

        /// Seek at host time AT to playback position POS
        #[arg(long, value_name = "AT:POS")]
        seek: Vec<Pair>,

        /// Pause playback between host times FROM and TO
        #[arg(long, value_name = "FROM:TO")]
        pause: Vec<Pair>,

        /// Tap the preview of activation ID at host time AT
        #[arg(long, value_name = "AT:ID")]
        tap: Vec<Pair>,

        /// Press back at host time AT
        #[arg(long, value_name = "AT")]
        back: Vec<Millis>,

        /// Fade duration for detail transitions in ms (switches instantly
        /// when omitted)
        #[arg(long)]
        fade: Option<Millis>,

        /// Session configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Two numbers separated by a colon
#[derive(Debug, Clone, Copy)]
struct Pair(u64, u64);

impl FromStr for Pair {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (a, b) = s
            .split_once(':')
            .ok_or_else(|| format!("expected two numbers separated by ':', got {:?}", s))?;
        let parse = |v: &str| v.trim().parse::<u64>().map_err(|e| format!("{:?}: {}", v, e));
        Ok(Pair(parse(a)?, parse(b)?))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { distribution, json } => inspect(&distribution, json)?,

        Commands::Simulate {
            distribution,
            activations,
            slots,
            duration,
            step,
            seek,
            pause,
            tap,
            back,
            fade,
            config,
        } => {
            let script = Script {
                seeks: seek,
                pauses: pause,
                taps: tap,
                backs: back,
            };
            simulate(
                &distribution,
                activations,
                slots,
                duration,
                step,
                script,
                fade,
                config.as_deref(),
            )?
        }
    }

    Ok(())
}

fn load_distribution(path: &Path) -> Result<Distribution> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read distribution {}", path.display()))?;
    let value: Value = serde_json::from_str(&json).context("Distribution is not valid JSON")?;

    let distribution = if is_api_envelope(&value) {
        Distribution::from_api_response(&json)
    } else {
        Distribution::from_json(&json)
    };
    distribution.context("Failed to parse distribution")
}

/// Checks for the platform response envelope: a top-level `data` array
fn is_api_envelope(value: &Value) -> bool {
    value.get("data").is_some_and(Value::is_array)
}

fn inspect(path: &Path, json: bool) -> Result<()> {
    let distribution = load_distribution(path)?;
    if json {
        let flat = serde_json::to_string_pretty(&distribution)
            .context("Failed to serialize distribution")?;
        println!("{}", flat);
        return Ok(());
    }

    println!("Reading distribution: {}", path.display());
    print_info(&distribution);
    Ok(())
}

fn print_info(distribution: &Distribution) {
    println!("\n=== Distribution Information ===");
    println!("Id: {}", distribution.id());
    println!("Name: {}", distribution.name());
    println!("Instances: {}", distribution.instances().len());
    println!("Time windows: {}", distribution.window_count());
    let slots: Vec<&str> = distribution.slot_names().into_iter().collect();
    println!("Slots: {}", slots.join(", "));
    println!(
        "Config: {}",
        serde_json::to_string(&config).context("Failed to serialize config")?
    );

    let end = last_window_end(distribution);
    println!("Timeline ends at: {} ms ({:.2} seconds)", end, end as f64 / 1000.0);

    println!("\n=== Instances ===");
    for instance in distribution.instances() {
        println!(
            "  Activation {}: {} windows",
            instance.external_id,
            instance.windows.len()
        );
        for (i, window) in instance.windows.iter().enumerate() {
            println!(
                "    [{}] {}ms to {}ms in {} ({} ms)",
                i,
                window.start(),
                window.end(),
                window.slot(),
                window.duration_ms()
            );
        }
    }
}

fn last_window_end(distribution: &Distribution) -> Position {
    distribution
        .instances()
        .iter()
        .flat_map(|i| i.windows.iter())
        .map(|w| w.end())
        .max()
        .unwrap_or(0)
}

/// Reads `<id>.json` from a directory, in flat or API response form
struct DirectorySource {
    dir: PathBuf,
}

impl ActivationSource for DirectorySource {
    fn fetch(&mut self, id: ActivationId) -> overlay_runtime::Result<ActivationDocument> {
        let path = self.dir.join(format!("{}.json", id));
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(overlay_runtime::Error::ActivationNotFound(id))
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Read activation {} from {}", id, path.display());

        let value: Value = serde_json::from_str(&json).map_err(overlay_core::Error::Malformed)?;
        let doc = if is_api_envelope(&value) {
            ActivationDocument::from_api_response(&json)?
        } else {
            ActivationDocument::from_json(&json)?
        };
        Ok(doc)
    }
}

/// Prints every host callback with the playback position it happened at
struct PrintListener {
    player: ManualPlayback,
}

impl PrintListener {
    fn at(&self) -> Position {
        self.player.current_position()
    }
}

impl HostListener for PrintListener {
    fn on_enter_detail_mode(&mut self, id: ActivationId) {
        println!("[{:>7} ms] activation {} entered detail mode", self.at(), id);
    }

    fn on_exit_detail_mode(&mut self, id: ActivationId) {
        println!("[{:>7} ms] activation {} exited detail mode", self.at(), id);
    }

    fn on_time_window_exit(&mut self, id: ActivationId) {
        println!("[{:>7} ms] activation {} left its time window", self.at(), id);
    }
}

/// User and media events keyed by host time
struct Script {
    seeks: Vec<Pair>,
    pauses: Vec<Pair>,
    taps: Vec<Pair>,
    backs: Vec<Millis>,
}

impl Script {
    fn is_paused(&self, now: Millis) -> bool {
        self.pauses.iter().any(|Pair(from, to)| (*from..*to).contains(&now))
    }
}

#[allow(clippy::too_many_arguments)]
fn simulate(
    distribution_path: &Path,
    activations_dir: PathBuf,
    slots: Vec<String>,
    duration: Option<Position>,
    step: Millis,
    script: Script,
    fade: Option<Millis>,
    config_path: Option<&Path>,
) -> Result<()> {
    if step == 0 {
        bail!("--step must be at least 1 ms");
    }

    let config = match config_path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            SessionConfig::from_json(&json).context("Failed to parse config")?
        }
        None => SessionConfig::default(),
    };

    let distribution = load_distribution(distribution_path)?;
    let duration = duration.unwrap_or_else(|| last_window_end(&distribution));
    let slots = if slots.is_empty() {
        distribution
            .slot_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    } else {
        slots
    };

    println!("Simulating {} ms of playback", duration);
    println!("Slots: {}", slots.join(", "));

    let player = ManualPlayback::new();
    let listener = PrintListener {
        player: player.clone(),
    };
    let mut session = Session::new(config, Box::new(player.clone()), Box::new(listener));
    if let Some(duration_ms) = fade {
        session = session.with_transition(Box::new(FadeTransition { duration_ms }));
    }
    session.declare_slots(slots.iter().cloned());

    let mut source = DirectorySource {
        dir: activations_dir,
    };
    let report = session.load_distribution(distribution, &mut source);
    println!(
        "Loaded {} activations ({} unavailable)",
        report.loaded.len(),
        report.failed.len()
    );
    for (id, e) in &report.failed {
        println!("  Activation {}: {}", id, e);
    }

    session.on_prepared();
    let mut occupants = occupancy(&session, &slots);
    let mut seek_in_flight = false;
    let mut now: Millis = 0;

    while player.current_position() < duration {
        let next = now + step;

        if std::mem::take(&mut seek_in_flight) {
            session.on_seek_complete();
        }
        for Pair(_, position) in script.seeks.iter().filter(|Pair(at, _)| (now..next).contains(at)) {
            println!("[{:>7} ms] seek to {} ms", player.current_position(), position);
            session.on_seek_started();
            player.set_position(*position);
            seek_in_flight = true;
        }

        let playing = !script.is_paused(now);
        if playing != player.is_playing() {
            info!("Playback {}", if playing { "resumed" } else { "paused" });
            player.set_playing(playing);
        }

        for Pair(_, id) in script.taps.iter().filter(|Pair(at, _)| (now..next).contains(at)) {
            let accepted = session.request_detail(ActivationId(*id));
            println!(
                "[{:>7} ms] tap on activation {}: {}",
                player.current_position(),
                id,
                if accepted { "accepted" } else { "ignored" }
            );
        }
        for _ in script.backs.iter().filter(|at| (now..next).contains(*at)) {
            let consumed = session.handle_back_button();
            println!(
                "[{:>7} ms] back pressed: {}",
                player.current_position(),
                if consumed { "closed detail" } else { "not consumed" }
            );
        }

        if playing && !seek_in_flight {
            player.advance(step);
        }
        session.advance_to(next);
        now = next;

        let current = occupancy(&session, &slots);
        report_changes(&occupants, &current, player.current_position());
        occupants = current;
    }

    session.on_completion();
    session.run_pending();
    let current = occupancy(&session, &slots);
    report_changes(&occupants, &current, player.current_position());
    println!("[{:>7} ms] playback completed", player.current_position());

    println!("\n=== Simulation Summary ===");
    println!("Host time: {} ms", now);
    println!("Scheduler evaluations: {}", session.evaluations());
    if let Some(position) = session.last_processed() {
        println!("Last sampled position: {} ms", position);
    }
    println!("Cached activations: {}", session.activation_count());
    println!("View mutations: {}", session.drain_view_ops().len());

    println!("\n=== Activation Content ===");
    for activation in session.activations() {
        println!("  Activation {} ({}):", activation.id(), activation.name());
        for (label, surface) in [
            ("preview", activation.preview_surface()),
            ("detail", activation.detail_surface()),
        ] {
            let widgets = session.views().content(surface).unwrap_or_default();
            let rendered =
                serde_json::to_string(widgets).context("Failed to serialize widgets")?;
            println!("    {}: {}", label, rendered);
        }
    }

    Ok(())
}

fn occupancy(session: &Session, slots: &[String]) -> BTreeMap<String, Option<ActivationId>> {
    slots
        .iter()
        .map(|slot| (slot.clone(), session.occupant(slot)))
        .collect()
}

fn report_changes(
    before: &BTreeMap<String, Option<ActivationId>>,
    after: &BTreeMap<String, Option<ActivationId>>,
    position: Position,
) {
    for (slot, now) in after {
        let was = before.get(slot).copied().flatten();
        if was == *now {
            continue;
        }
        match (was, now) {
            (Some(old), Some(new)) => {
                println!("[{:>7} ms] slot {}: activation {} -> {}", position, slot, old, new)
            }
            (None, Some(new)) => println!("[{:>7} ms] slot {}: activation {} shown", position, slot, new),
            (Some(old), None) => println!("[{:>7} ms] slot {}: activation {} hidden", position, slot, old),
            (None, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("overlay-cli-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_flat_document_mentioning_data_is_not_an_envelope() {
        let dir = scratch_dir("flat");
        let flat = json!({
            "id": 5,
            "name": "Stats",
            "settings": {"preview": {"title": "Live \"data\" feed"}},
            "template": [{"name": "NativeBlock", "settings": {"data": "not an envelope"}}]
        });
        fs::write(dir.join("5.json"), flat.to_string()).unwrap();

        let mut source = DirectorySource { dir: dir.clone() };
        let doc = source.fetch(ActivationId(5)).unwrap();
        assert_eq!(doc.id, ActivationId(5));
        assert_eq!(doc.name, "Stats");
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_envelope_document_keeps_first_entry() {
        let dir = scratch_dir("envelope");
        let response = json!({"data": [
            {"id": 6, "name": "Kit", "settings": {}, "template": []}
        ]});
        fs::write(dir.join("6.json"), response.to_string()).unwrap();

        let mut source = DirectorySource { dir: dir.clone() };
        assert_eq!(source.fetch(ActivationId(6)).unwrap().name, "Kit");
        assert!(matches!(
            source.fetch(ActivationId(7)),
            Err(overlay_runtime::Error::ActivationNotFound(ActivationId(7)))
        ));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_envelope_shape_needs_data_array() {
        assert!(is_api_envelope(&json!({"data": []})));
        assert!(!is_api_envelope(&json!({"data": "text"})));
        assert!(!is_api_envelope(&json!({"id": 1, "settings": {"data": [1]}})));
    }
}
