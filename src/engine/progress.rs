//! Progress bar for foreground runs, fed from the shared counters.

use kdam::{Animation, Bar, BarExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::tracker::SharedProgress;

const REFRESH: Duration = Duration::from_millis(200);

/// Counter bar; the total grows while the walker is still finding files.
pub fn create_bar(desc: &'static str) -> Bar {
    kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " files"
    )
}

/// Mirror `progress` into `bar` until `stop` is raised, then draw the final numbers.
pub fn follow_progress(bar: &mut Bar, progress: &SharedProgress, stop: &AtomicBool) {
    loop {
        let finished = stop.load(Ordering::Relaxed);
        bar.total = progress.total() as usize;
        let parsed = progress.parsed() as usize;
        if parsed > bar.counter {
            let _ = bar.update(parsed - bar.counter);
        } else {
            let _ = bar.refresh();
        }
        if finished {
            break;
        }
        thread::sleep(REFRESH);
    }
    eprintln!();
}
