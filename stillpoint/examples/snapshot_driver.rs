//! Three workers bump shared counters while a driver takes a consistent
//! snapshot every time the whole runtime reaches a safepoint.
//!
//! Run with `RUST_LOG=stillpoint=debug` to see the pause episodes.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use stillpoint::{Builder, PauseOutcome};
use tracing_subscriber::EnvFilter;

const WORKERS: usize = 3;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let runtime = Builder::new_local().try_build()?;
    let counters = Rc::new(RefCell::new(vec![0u64; WORKERS]));

    for worker in 0..WORKERS {
        let counters = Rc::clone(&counters);
        // Workers run a different number of rounds, so they finish at
        // different episodes.
        let rounds = 2 + worker * 2;

        runtime.submit(move |cx| async move {
            for _ in 0..rounds {
                // Two half-steps with a yield in between: a snapshot taken
                // between them would see an odd value.
                counters.borrow_mut()[worker] += 1;
                cx.yield_now().await;
                counters.borrow_mut()[worker] += 1;

                cx.maybe_pause().await?;
            }
            Ok::<_, stillpoint::SafepointError>(())
        })?;
    }

    let mut snapshots = Vec::new();
    while let PauseOutcome::Paused = runtime.run_until_safe_state()? {
        let snapshot = counters.borrow().clone();
        assert!(snapshot.iter().all(|v| v % 2 == 0), "torn snapshot {snapshot:?}");

        println!(
            "episode {}: live={} counters={snapshot:?}",
            runtime.episode().map_or(0, |e| e.as_u64()),
            runtime.live_count(),
        );
        snapshots.push(snapshot);
    }

    println!(
        "{} snapshots, final counters {:?}",
        snapshots.len(),
        counters.borrow()
    );

    Ok(())
}
