//! Threaded session runner plus the demo, benchmark and stress front ends.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::config::KitchenConfig;
use crate::error::KitchenError;
use crate::kitchen::{Kitchen, StopMode};
use crate::order_book::SpawnSchedule;
use crate::serve::format_clock;
use crate::stats::StatsSnapshot;
use crate::types::WorkerId;
use crate::worker::{Role, Worker, WorkerReport};

// Demo scale: small enough for quick CLI feedback.
const DEMO_CHEFS: usize = 3;
const DEMO_ORDERS: u64 = 6;
const DEMO_SEED: u64 = 2432;
// Watchdog sweeps this many times per stall timeout.
const WATCHDOG_SWEEPS: u32 = 4;

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    use libc::{RUSAGE_SELF, getrusage, rusage};
    // SAFETY: rusage is plain old data and getrusage fully initialises it.
    let mut usage: rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { getrusage(RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let user = usage.ru_utime.tv_sec as f64 + (usage.ru_utime.tv_usec as f64 / 1_000_000.0);
    let sys = usage.ru_stime.tv_sec as f64 + (usage.ru_stime.tv_usec as f64 / 1_000_000.0);
    Some((user, sys))
}

#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// Everything a finished session reports.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub reports: Vec<WorkerReport>,
    pub stats: StatsSnapshot,
    pub spawned: u64,
    pub pending_left: usize,
    pub stalled: Vec<WorkerId>,
    pub elapsed: Duration,
    pub cpu_user_s: Option<f64>,
    pub cpu_sys_s: Option<f64>,
}

/// Sleep for `total`, waking early once the kitchen stops spawning.
fn nap(kitchen: &Kitchen, total: Duration) {
    let step = kitchen.config().timing.tick();
    let deadline = Instant::now() + total;
    while !kitchen.is_finished() {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(step.min(deadline - now));
    }
}

fn spawn_spawner(kitchen: Arc<Kitchen>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("spawner".to_string())
        .spawn(move || {
            let spawn = kitchen.config().spawn.clone();
            let mut schedule = SpawnSchedule::new(
                Duration::from_millis(spawn.min_delay_ms),
                Duration::from_millis(spawn.max_delay_ms),
                spawn.seed,
            );
            loop {
                if spawn
                    .max_orders
                    .is_some_and(|max| kitchen.orders().spawned() >= max)
                {
                    info!("order quota reached");
                    kitchen.finish(StopMode::Drain);
                    return;
                }
                let delay = schedule.next_delay();
                nap(&kitchen, delay);
                if kitchen.orders().spawn_random(schedule.rng()).is_none()
                    && !kitchen.orders().is_spawning()
                {
                    return;
                }
            }
        })
}

fn spawn_clock(
    kitchen: Arc<Kitchen>,
    stop_flag: Arc<AtomicBool>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("clock".to_string()).spawn(move || {
        let period = kitchen.config().timing.tick();
        let mut last = Instant::now();
        while !stop_flag.load(Ordering::SeqCst) {
            thread::sleep(period);
            let now = Instant::now();
            kitchen.tick(now - last);
            last = now;
        }
    })
}

fn spawn_watchdog(
    kitchen: Arc<Kitchen>,
    stop_flag: Arc<AtomicBool>,
) -> std::io::Result<thread::JoinHandle<HashSet<WorkerId>>> {
    thread::Builder::new()
        .name("watchdog".to_string())
        .spawn(move || {
            let timeout = kitchen.config().timing.stall_timeout();
            let sweep = (timeout / WATCHDOG_SWEEPS).max(Duration::from_millis(1));
            let mut ever_stalled = HashSet::new();
            while !stop_flag.load(Ordering::SeqCst) {
                for stall in kitchen.watchdog().sweep(Instant::now(), timeout) {
                    warn!("{stall}");
                    ever_stalled.insert(stall.worker);
                }
                thread::sleep(sweep);
            }
            ever_stalled
        })
}

fn spawn_workers(kitchen: &Arc<Kitchen>) -> std::io::Result<Vec<thread::JoinHandle<WorkerReport>>> {
    let crew = &kitchen.config().crew;
    let roles = std::iter::repeat(Role::Chef)
        .take(crew.chefs)
        .chain(std::iter::repeat(Role::Prep).take(crew.preps));
    let mut handles = Vec::new();
    for (id, role) in roles.enumerate() {
        let worker = Worker::new(id as WorkerId, role, Arc::clone(kitchen));
        let handle = thread::Builder::new()
            .name(format!("{role}-{id}"))
            .spawn(move || worker.run())?;
        handles.push(handle);
    }
    Ok(handles)
}

/// Run one session to completion.
///
/// The session ends when the order quota is served, or when the configured
/// session length elapses, at which point the kitchen is finished with `mode`.
pub fn run_session(kitchen: Arc<Kitchen>, mode: StopMode) -> Result<RunOutcome, KitchenError> {
    let timing = kitchen.config().timing.clone();
    if timing.session_ms.is_none() && kitchen.config().spawn.max_orders.is_none() {
        warn!("no session length or order quota configured; running until interrupted");
    }

    let stop_flag = Arc::new(AtomicBool::new(false));
    let cpu_start = cpu_times_seconds();
    let start = Instant::now();

    let clock = spawn_clock(Arc::clone(&kitchen), Arc::clone(&stop_flag))?;
    let watchdog = spawn_watchdog(Arc::clone(&kitchen), Arc::clone(&stop_flag))?;
    let spawner = spawn_spawner(Arc::clone(&kitchen))?;
    let workers = spawn_workers(&kitchen)?;

    if let Some(session) = timing.session() {
        while !workers.iter().all(|h| h.is_finished()) {
            if start.elapsed() >= session {
                info!("session over after {}", format_clock(session));
                kitchen.finish(mode);
                break;
            }
            thread::sleep(timing.tick());
        }
    }

    let mut reports = Vec::new();
    for handle in workers {
        reports.push(handle.join().expect("worker thread panicked"));
    }
    kitchen.finish(StopMode::Drain);
    spawner.join().expect("spawner thread panicked");
    stop_flag.store(true, Ordering::SeqCst);
    clock.join().expect("clock thread panicked");
    let ever_stalled = watchdog.join().expect("watchdog thread panicked");

    let elapsed = start.elapsed();
    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };
    let mut stalled: Vec<WorkerId> = ever_stalled.into_iter().collect();
    stalled.sort_unstable();

    Ok(RunOutcome {
        reports,
        stats: kitchen.stats().snapshot(),
        spawned: kitchen.orders().spawned(),
        pending_left: kitchen.orders().pending_count(),
        stalled,
        elapsed,
        cpu_user_s,
        cpu_sys_s,
    })
}

fn print_summary(kitchen: &Kitchen, outcome: &RunOutcome) {
    let crew = &kitchen.config().crew;
    let served_per_worker: Vec<usize> = outcome.reports.iter().map(|r| r.served).collect();
    let prepared_per_worker: Vec<usize> = outcome.reports.iter().map(|r| r.prepared).collect();
    println!("chefs={} preps={} orders_spawned={}", crew.chefs, crew.preps, outcome.spawned);
    println!("orders_served={}", outcome.stats.served);
    println!("orders_failed={}", outcome.stats.failed);
    println!("orders_pending={}", outcome.pending_left);
    println!("scoreboard={} clock={}", kitchen.scoreboard().served(), kitchen.scoreboard().clock_display());
    println!("served_per_worker={served_per_worker:?}");
    println!("prepared_per_worker={prepared_per_worker:?}");
    println!("order_races={}", outcome.stats.order_races);
    println!("max_concurrent_holders={}", outcome.stats.max_concurrent_holders);
    println!("reservation_violation={}", outcome.stats.reservation_violation);
    println!("stalled_workers={:?}", outcome.stalled);
}

/// Run the default demo: a handful of orders, three chefs, no prep crew.
pub fn run_demo() -> Result<(), KitchenError> {
    let mut config = KitchenConfig::default();
    config.crew.chefs = DEMO_CHEFS;
    config.spawn.max_orders = Some(DEMO_ORDERS);
    config.spawn.seed = Some(DEMO_SEED);
    let kitchen = Arc::new(Kitchen::new(config)?);
    info!("demo start");
    let outcome = run_session(Arc::clone(&kitchen), StopMode::Drain)?;
    info!("demo finished in {}ms", outcome.elapsed.as_millis());

    println!("DEMO SUMMARY");
    print_summary(&kitchen, &outcome);
    Ok(())
}

/// Load a TOML configuration and run it as one session.
pub fn run_config(path: &Path, mode: StopMode) -> Result<(), KitchenError> {
    let config = KitchenConfig::load(path)?;
    let kitchen = Arc::new(Kitchen::new(config)?);
    let outcome = run_session(Arc::clone(&kitchen), mode)?;

    println!("SESSION SUMMARY ({})", path.display());
    print_summary(&kitchen, &outcome);
    println!("STATIONS");
    for row in kitchen.station_statuses() {
        let item = row
            .item
            .map(|(kind, state)| format!("{kind}:{state:?}"))
            .unwrap_or_else(|| "-".to_string());
        let holder = row
            .holder
            .map(|w| w.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{} holder={holder} item={item} depth={}", row.id, row.depth);
    }
    Ok(())
}

/// Parameters of one benchmark run.
#[derive(Clone, Copy, Debug)]
pub struct BenchParams {
    pub chefs: usize,
    pub preps: usize,
    pub orders: u64,
    pub cut_ms: u64,
    pub cook_ms: u64,
}

impl Default for BenchParams {
    fn default() -> Self {
        Self {
            chefs: 4,
            preps: 0,
            orders: 20,
            cut_ms: 10,
            cook_ms: 30,
        }
    }
}

impl BenchParams {
    fn config(&self) -> KitchenConfig {
        let mut config = KitchenConfig::default();
        config.crew.chefs = self.chefs;
        config.crew.preps = self.preps;
        config.spawn.max_orders = Some(self.orders);
        config.spawn.min_delay_ms = 0;
        config.spawn.max_delay_ms = 5;
        config.timing.cutting_ms = self.cut_ms;
        config.timing.cooking_ms = self.cook_ms;
        config.timing.poll_ms = 1;
        config.timing.idle_ms = 5;
        config.timing.tick_ms = 1;
        config
    }
}

const CSV_HEADER: &str = "chefs,preps,orders,served,failed,elapsed_ms,throughput_orders_per_s,order_races,reservation_denials,poll_retries,cpu_user_s,cpu_sys_s,max_holders,reservation_violation,stalled_workers";

fn benchmark_once(params: BenchParams, validate: bool) -> Result<(), KitchenError> {
    let kitchen = Arc::new(Kitchen::new(params.config())?);
    let outcome = run_session(kitchen, StopMode::Drain)?;

    let elapsed_ms = outcome.elapsed.as_secs_f64() * 1000.0;
    let throughput = if elapsed_ms > 0.0 {
        outcome.stats.served as f64 / (elapsed_ms / 1000.0)
    } else {
        0.0
    };
    let cpu_user = outcome
        .cpu_user_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    let cpu_sys = outcome
        .cpu_sys_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    println!(
        "{},{},{},{},{},{:.2},{:.2},{},{},{},{},{},{},{},{}",
        params.chefs,
        params.preps,
        params.orders,
        outcome.stats.served,
        outcome.stats.failed,
        elapsed_ms,
        throughput,
        outcome.stats.order_races,
        outcome.stats.reservation_denials,
        outcome.stats.poll_retries,
        cpu_user,
        cpu_sys,
        outcome.stats.max_concurrent_holders,
        outcome.stats.reservation_violation,
        outcome.stalled.len()
    );
    if outcome.pending_left > 0 {
        eprintln!("# warning,pending_orders,{}", outcome.pending_left);
    }
    if validate {
        if outcome.stats.reservation_violation {
            eprintln!("# violation,reservation_exclusivity");
        }
        if outcome.stats.served + outcome.stats.failed != outcome.spawned {
            eprintln!(
                "# violation,order_accounting,spawned={},served={},failed={}",
                outcome.spawned, outcome.stats.served, outcome.stats.failed
            );
        }
    }
    Ok(())
}

/// Run a single benchmark and print one CSV row.
pub fn run_benchmark(params: BenchParams, validate: bool) -> Result<(), KitchenError> {
    if params.chefs == 0 {
        return Err(KitchenError::invalid("benchmark: chefs must be > 0"));
    }
    if params.orders == 0 {
        return Err(KitchenError::invalid("benchmark: orders must be > 0"));
    }
    println!("{CSV_HEADER}");
    benchmark_once(params, validate)
}

/// Sweep crew sizes and order counts, printing CSV.
pub fn run_stress(
    chef_sets: Option<Vec<usize>>,
    prep_sets: Option<Vec<usize>>,
    order_sets: Option<Vec<u64>>,
    validate: bool,
) -> Result<(), KitchenError> {
    let chef_sets = chef_sets.unwrap_or_else(|| vec![1, 2, 4, 8]);
    let prep_sets = prep_sets.unwrap_or_else(|| vec![0, 2]);
    let mut order_sets = order_sets.unwrap_or_else(|| vec![10, 25]);
    if chef_sets.iter().any(|&chefs| chefs == 0) {
        return Err(KitchenError::invalid("stress: chef_sets must be > 0"));
    }
    let before = order_sets.len();
    order_sets.retain(|&orders| orders > 0);
    let dropped = before - order_sets.len();
    if dropped > 0 {
        eprintln!("stress warning: ignored {dropped} order set(s) <= 0");
    }
    if order_sets.is_empty() {
        return Err(KitchenError::invalid("stress: orders must be > 0"));
    }

    println!("{CSV_HEADER}");
    for &chefs in &chef_sets {
        for &preps in &prep_sets {
            for &orders in &order_sets {
                let params = BenchParams {
                    chefs,
                    preps,
                    orders,
                    ..BenchParams::default()
                };
                benchmark_once(params, validate)?;
            }
        }
    }
    Ok(())
}
