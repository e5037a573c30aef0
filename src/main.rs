use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use procsight::controller::sort_processes;
use procsight::{Engine, EngineConfig, HostSource, Metric, Snapshot, SortColumn, terminate};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
    Pid,
    Name,
    Cpu,
    Memory,
}

impl From<SortArg> for SortColumn {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Pid => SortColumn::Pid,
            SortArg::Name => SortColumn::Name,
            SortArg::Cpu => SortColumn::Cpu,
            SortArg::Memory => SortColumn::Memory,
        }
    }
}

/// Live CPU, memory, disk and network telemetry with a process table.
#[derive(Debug, Parser)]
#[command(name = "procsight", version, about)]
struct Args {
    /// Sampling period in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Samples of history kept per metric.
    #[arg(long, default_value_t = 60)]
    history: usize,

    /// Upper bound on a single OS read, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    read_timeout_ms: u64,

    /// Report negative rates from counter resets as zero.
    #[arg(long)]
    clamp_negative: bool,

    /// Only list processes whose name contains this (case-insensitive).
    #[arg(long, default_value = "")]
    filter: String,

    #[arg(long, value_enum, default_value_t = SortArg::Cpu)]
    sort: SortArg,

    /// Processes listed per tick.
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Exit after this many snapshots.
    #[arg(long)]
    ticks: Option<u64>,

    /// Print each snapshot as one JSON document.
    #[arg(long)]
    json: bool,

    /// Write logs here instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Send a termination request to this pid and exit.
    #[arg(long, value_name = "PID")]
    terminate: Option<u32>,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_millis(self.interval_ms),
            history_capacity: self.history,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            clamp_negative_rates: self.clamp_negative,
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("procsight=info"));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return Ok(None);
    };

    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "log file path has no file name")
    })?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn print_snapshot(snapshot: &Snapshot, args: &Args) {
    let throughput: Vec<String> = [Metric::NetUp, Metric::NetDown, Metric::DiskRead, Metric::DiskWrite]
        .into_iter()
        .filter_map(|m| {
            let value = snapshot.series(m).last()?;
            Some(format!("{m} {value:.1} {}", m.unit()))
        })
        .collect();

    println!(
        "[{}] cpu {:5.1}{} @ {} MHz ({}c/{}t) | mem {:5.1}{} | {} | {} procs{}",
        snapshot.time,
        snapshot.cpu.usage_percent,
        Metric::Cpu.unit(),
        snapshot.cpu.frequency_mhz,
        snapshot.cpu.physical_cores,
        snapshot.cpu.logical_cores,
        snapshot.memory_percent,
        Metric::Memory.unit(),
        throughput.join(" | "),
        snapshot.processes.len(),
        if snapshot.partial { " (partial)" } else { "" },
    );

    let matching = snapshot.filter_processes(&args.filter);
    for p in sort_processes(&matching, args.sort.into(), true).iter().take(args.top) {
        println!(
            "  {:>7}  {:<24}  {:>6}%  {:>6}%",
            p.pid,
            p.name,
            p.cpu_label(),
            p.memory_label()
        );
    }
}

async fn run(args: Args, should_quit: Arc<AtomicBool>) -> Result<(), Box<dyn Error>> {
    let mut engine = Engine::new(HostSource::new(), args.engine_config());
    let mut rx = engine.subscribe();
    engine.start().await?;

    let mut printed = 0u64;
    while !should_quit.load(Ordering::Relaxed) {
        match tokio::time::timeout(Duration::from_millis(100), rx.changed()).await {
            Err(_) => continue,
            Ok(Err(_)) => break,
            Ok(Ok(())) => {}
        }
        let Some(snapshot) = rx.borrow_and_update().clone() else {
            continue;
        };

        if args.json {
            println!("{}", serde_json::to_string(&*snapshot)?);
        } else {
            print_snapshot(&snapshot, &args);
        }

        printed += 1;
        if args.ticks.is_some_and(|n| printed >= n) {
            break;
        }
    }

    engine.stop().await?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let _guard = init_logging(args.log_file.as_deref())?;

    if let Some(pid) = args.terminate {
        match terminate(pid) {
            Ok(()) => {
                println!("Sent termination request to process {pid}");
                return Ok(());
            }
            Err(e) => {
                eprintln!("Could not terminate process {pid}: {e}");
                std::process::exit(1);
            }
        }
    }

    let should_quit = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&should_quit))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&should_quit))?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .build()?;
    rt.block_on(run(args, should_quit))
}
