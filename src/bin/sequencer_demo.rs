//! Realtime Demo for the Step Sequencer
//!
//! Runs a handful of sequences against the wall clock and prints each step
//! as it fires. Set `RUST_LOG=step_sequencer=debug` to watch the state machine.
//!
//! Usage:
//!   cargo run --bin sequencer_demo -- --demo 1               # Looping steps with waits
//!   cargo run --bin sequencer_demo -- --demo 2 --reverse     # Same, played backwards
//!   cargo run --bin sequencer_demo -- --demo 3 --wait-ms 50  # Parallel group of sleeps
//!
//! Demos:
//!   1. Loop           - Steps separated by waits, repeated `--loops` times
//!   2. Ping-pong      - Reverses direction on every loop
//!   3. Group          - Three sleeps of different length started together
//!   4. Markers        - Repeats from a named marker, skipping the intro

use clap::Parser;
use std::rc::Rc;
use std::time::Instant;
use step_sequencer::{
    step_fn, Completion, Direction, Engine, Event, Loops, Sequencer, SequencerConfig,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "sequencer_demo")]
#[command(author, version, about = "Realtime step sequencer demo", long_about = None)]
struct Cli {
    /// Demo to run (1-4)
    #[arg(short, long, default_value = "1")]
    demo: u8,

    /// Number of steps in the looping demos
    #[arg(short, long, default_value = "4")]
    steps: usize,

    /// Passes over the sequence (0 loops forever)
    #[arg(short, long, default_value = "2")]
    loops: u32,

    /// Delay after every step, in milliseconds
    #[arg(short, long, default_value = "250")]
    wait_ms: u64,

    /// Start playing backwards
    #[arg(long)]
    reverse: bool,
}

impl Cli {
    fn config(&self) -> SequencerConfig {
        SequencerConfig {
            direction: if self.reverse {
                Direction::Backward
            } else {
                Direction::Forward
            },
            loops: if self.loops == 0 {
                Loops::Forever
            } else {
                Loops::Times(self.loops)
            },
            ..Default::default()
        }
    }
}

/// Print a line stamped with milliseconds since `start`.
fn stamp(start: Instant, msg: &str) {
    println!("[{:>6} ms] {}", start.elapsed().as_millis(), msg);
}

fn finish_on_stop(seq: &Sequencer, start: Instant) {
    seq.done(move |_| stamp(start, "sequence finished"));
}

// ============================================================================
// Demo 1: Loop
// Demonstrates: Waits between steps and bounded looping
// ============================================================================

fn run_loop(engine: &Engine, cli: &Cli, start: Instant) -> Sequencer {
    println!("\n=== Demo 1: Loop ===");
    println!(
        "{} steps, {} ms apart, {} pass(es)\n",
        cli.steps, cli.wait_ms, cli.loops
    );

    let seq = engine.sequencer(cli.config());
    for i in 0..cli.steps {
        seq.step(move |next| {
            stamp(start, &format!("step {i}"));
            next.done();
        })
        .wait(cli.wait_ms);
    }
    seq.on(Event::Loop, move |s| {
        stamp(start, &format!("loop, {:?} left", s.remaining_loops()))
    });
    finish_on_stop(&seq, start);
    seq.play();
    seq
}

// ============================================================================
// Demo 2: Ping-pong
// Demonstrates: Direction changes from a loop listener
// ============================================================================

fn run_ping_pong(engine: &Engine, cli: &Cli, start: Instant) -> Sequencer {
    println!("\n=== Demo 2: Ping-pong ===");
    println!("Direction flips on every loop\n");

    let seq = engine.sequencer(SequencerConfig {
        loop_backward: true,
        ..cli.config()
    });
    for i in 0..cli.steps {
        seq.step(move |next| {
            stamp(start, &format!("step {i}"));
            next.done();
        })
        .wait(cli.wait_ms);
    }
    // Turn around and restart from the far end.
    seq.on(Event::Loop, move |s| {
        s.reverse();
        let from = match s.direction() {
            Direction::Forward => 0,
            Direction::Backward => s.len() as isize - 1,
        };
        s.set_index(from);
        stamp(start, &format!("now heading {:?}", s.direction()));
    });
    finish_on_stop(&seq, start);
    seq.play();
    seq
}

// ============================================================================
// Demo 3: Group
// Demonstrates: A position that waits for all of its members
// ============================================================================

fn run_group(engine: &Rc<Engine>, cli: &Cli, start: Instant) -> Sequencer {
    println!("\n=== Demo 3: Group ===");
    println!("Three sleeps start together; the group ends with the longest\n");

    let seq = engine.sequencer(cli.config());
    let members = (1..=3u64).map(|k| {
        let engine = engine.clone();
        let delay = cli.wait_ms * k;
        step_fn(move |next| {
            stamp(start, &format!("member {k} sleeping {delay} ms"));
            let sleep = engine.sleep_ms(delay);
            next.done_when(Completion::awaitable(async move {
                sleep.await;
                stamp(start, &format!("member {k} woke"));
            }));
        })
    });
    seq.group(members.collect::<Vec<_>>());
    seq.step(move |next| {
        stamp(start, "group complete");
        next.done();
    });
    finish_on_stop(&seq, start);
    seq.play();
    seq
}

// ============================================================================
// Demo 4: Markers
// Demonstrates: Jumping to a named position
// ============================================================================

fn run_markers(engine: &Engine, cli: &Cli, start: Instant) -> Sequencer {
    println!("\n=== Demo 4: Markers ===");
    println!("The intro plays once, then the chorus repeats\n");

    let seq = engine.sequencer(cli.config());
    seq.step(move |next| {
        stamp(start, "intro");
        next.done();
    })
    .wait(cli.wait_ms)
    .marker("chorus");
    for line in ["chorus 1", "chorus 2"] {
        seq.step(move |next| {
            stamp(start, line);
            next.done();
        })
        .wait(cli.wait_ms);
    }
    // Wrapping lands on the intro; move the index before it runs.
    seq.on(Event::Loop, |s| {
        if let Some(chorus) = s.marker_index("chorus") {
            s.set_index(chorus as isize);
        }
    });
    finish_on_stop(&seq, start);
    seq.play();
    seq
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let engine = Rc::new(Engine::realtime());
    let start = Instant::now();

    let seq = match cli.demo {
        1 => run_loop(&engine, &cli, start),
        2 => run_ping_pong(&engine, &cli, start),
        3 => run_group(&engine, &cli, start),
        4 => run_markers(&engine, &cli, start),
        n => return Err(format!("Unknown demo {n}. Choose 1-4.").into()),
    };

    engine.run_until(|| !seq.is_initialized())?;
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "demo finished");
    Ok(())
}
