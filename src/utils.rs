use log::debug;
use std::time::Instant;

///
/// measure time in milli-seconds (ms) of closure.
///
pub fn timer<F, T>(f: F) -> (T, u128)
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let ret = f();
    let duration = start.elapsed();
    (ret, duration.as_millis())
}

///
/// log allocated/resident bytes reported by jemalloc, at debug level.
///
/// Statistics are best-effort: a failure to read them is only logged.
///
pub fn check_memory_usage() {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let stats = jemalloc_ctl::epoch::advance().and_then(|_| {
        let allocated = jemalloc_ctl::stats::allocated::read()?;
        let resident = jemalloc_ctl::stats::resident::read()?;
        Ok((allocated, resident))
    });
    match stats {
        Ok((allocated, resident)) => debug!("[memory] {} / {}", allocated, resident),
        Err(e) => debug!("[memory] unavailable: {}", e),
    }
}

///
/// get jointsnvmix/resources directory
///
pub fn resource_dir() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("resources")
}

//
// tests
//
