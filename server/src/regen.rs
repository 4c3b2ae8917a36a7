//! Regeneration gate and orchestration.
//!
//! One run of any mode at a time per process. A trigger either takes the gate
//! and returns immediately while the work continues on the blocking pool, or
//! is rejected as busy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use realmmap_shared::{MapMode, RegenAccepted, RegenKind, RegenOutcome, RegenReport};
use tracing::{error, info, warn};

use crate::config::DataPaths;
use crate::error::{MapError, Result};
use crate::queue::QueueStore;
use crate::render::RenderContext;
use crate::render::compositor::{RegionOptions, RegionReport, generate_regions, write_full_map};
use crate::services::nation_compiler::{
    NationLock, compile_nations, nation_table, read_nation_input,
};
use crate::state::AppState;

/// Idle/running flag with non-blocking acquire.
#[derive(Debug, Clone, Default)]
pub struct RegenGate {
    running: Arc<AtomicBool>,
}

impl RegenGate {
    pub fn try_acquire(&self) -> Option<RegenPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RegenPermit {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the lifetime of a run; the gate reopens when it drops.
#[derive(Debug)]
pub struct RegenPermit {
    running: Arc<AtomicBool>,
}

impl Drop for RegenPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Start a run in the background or fail with [`MapError::Busy`].
pub fn trigger(state: &AppState, mode: MapMode, kind: RegenKind) -> Result<RegenAccepted> {
    let Some(permit) = state.gate.try_acquire() else {
        warn!(%mode, %kind, "regeneration rejected, another run is in progress");
        return Err(MapError::Busy);
    };

    let paths = Arc::clone(&state.paths);
    let queue = state.queue.clone();
    let nations = state.nations_lock.clone();
    let last_report = Arc::clone(&state.last_report);
    tokio::spawn(async move {
        let _permit = permit;
        let outcome = tokio::task::spawn_blocking(move || {
            run_regeneration(&paths, &queue, &nations, mode, kind)
        })
        .await;
        match outcome {
            Ok(report) => *last_report.write().await = Some(report),
            Err(e) => error!(%mode, %kind, error = %e, "regeneration worker panicked"),
        }
    });

    Ok(RegenAccepted {
        success: true,
        mode,
        regen_type: kind,
        message: format!("{kind} regeneration of {mode} started"),
    })
}

/// Execute one run synchronously and summarize it. Never panics on bad data;
/// a fatal error ends the run with a failed outcome.
pub fn run_regeneration(
    paths: &DataPaths,
    queue: &QueueStore,
    nations: &NationLock,
    mode: MapMode,
    kind: RegenKind,
) -> RegenReport {
    let started_at = Utc::now();
    let started = Instant::now();
    info!(%mode, %kind, "regeneration started");

    let result = regenerate(paths, queue, nations, mode, kind);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let mut report = RegenReport {
        mode,
        kind,
        started_at,
        finished_at: Utc::now(),
        outcome: RegenOutcome::Completed,
        updated_regions: 0,
        failed_saves: 0,
        error: None,
    };
    match result {
        Ok(regions) => {
            report.updated_regions = regions.updated.len();
            report.failed_saves = regions.failed.len();
            info!(
                %mode,
                %kind,
                updated = report.updated_regions,
                failed = report.failed_saves,
                elapsed_ms,
                "regeneration finished"
            );
        }
        Err(e) => {
            error!(%mode, %kind, error = %e, elapsed_ms, "regeneration failed");
            report.outcome = RegenOutcome::Failed;
            report.error = Some(e.to_string());
        }
    }
    report
}

fn regenerate(
    paths: &DataPaths,
    queue: &QueueStore,
    nations: &NationLock,
    mode: MapMode,
    kind: RegenKind,
) -> Result<RegionReport> {
    // One read of the nation file feeds both the compile and the render.
    let nation_records = {
        let _nations = nations.hold();
        let raw = read_nation_input(paths)?;
        if mode == MapMode::Nation || kind == RegenKind::DataOnly {
            compile_nations(paths, &raw)?;
        }
        nation_table(&raw)?
    };
    if kind == RegenKind::DataOnly {
        return Ok(RegionReport::default());
    }

    let ctx = RenderContext::load(paths, nation_records)?;
    let queued_only = kind == RegenKind::Queued;
    // Raw entries this run accounts for. A full run covers everything queued
    // for the mode so far; anything enqueued after this point survives.
    let mut raw = if queued_only {
        queue.compile(&ctx.world)?.1
    } else {
        queue.raw()?
    };
    let consumed = raw.remove(mode.as_str()).unwrap_or_default();

    let publish_externally = paths.publish_dir.is_some();
    write_full_map(&ctx, mode, publish_externally)?;
    let regions = generate_regions(
        &ctx,
        mode,
        RegionOptions {
            paint_borders: true,
            publish_externally,
            queued_only,
        },
    )?;

    if !consumed.is_empty() {
        let drained = queue.drain(mode, &consumed)?;
        info!(%mode, drained, "raw queue entries consumed");
    }
    Ok(regions)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use image::{Rgba, RgbaImage};
    use realmmap_shared::{MapMode, RegenKind, RegenOutcome};
    use serde_json::{Value, json};
    use tempfile::tempdir;

    use super::{RegenGate, run_regeneration, trigger};
    use crate::config::DataPaths;
    use crate::error::MapError;
    use crate::queue::QueueStore;
    use crate::render::compositor::region_filename;
    use crate::render::raster::save_png;
    use crate::services::nation_compiler::{NationLock, read_nation_input, write_nation_input};
    use crate::state::AppState;

    /// Three provinces in a 6x2 strip, two nations where the second is a
    /// subject of the first, one county covering everything.
    pub(crate) fn seed_world(paths: &DataPaths) {
        std::fs::create_dir_all(paths.defines_dir()).expect("create defines");
        std::fs::create_dir_all(paths.input_dir()).expect("create input");
        std::fs::write(
            paths.provinces_txt(),
            "## id = r,g,b\n1 = 10,0,0\n2 = 20,0,0\n3 = 30,0,0\n",
        )
        .expect("write provinces");
        let source = RgbaImage::from_fn(6, 2, |x, _| match x {
            0..=1 => Rgba([10, 0, 0, 255]),
            2..=3 => Rgba([20, 0, 0, 255]),
            _ => Rgba([30, 0, 0, 255]),
        });
        save_png(&source, &paths.province_raster()).expect("write raster");
        std::fs::write(
            paths.definitions(MapMode::County),
            json!({"c_all": {"rgb": "5,5,5", "provinces": [1, 2, 3]}}).to_string(),
        )
        .expect("write counties");
        std::fs::write(
            paths.nation_input(),
            json!({
                "NATION_1": {"rgb": "100,0,0", "provinces": [1, 2]},
                "NATION_2": {"rgb": "0,100,0", "provinces": [3], "overlord": "NATION_1"}
            })
            .to_string(),
        )
        .expect("write nations");
    }

    #[test]
    fn gate_admits_one_holder_at_a_time() {
        let gate = RegenGate::default();
        let permit = gate.try_acquire().expect("first acquire");
        assert!(gate.is_running());
        assert!(gate.clone().try_acquire().is_none());
        drop(permit);
        assert!(!gate.is_running());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn full_run_writes_map_and_every_region() {
        let dir = tempdir().expect("temp dir");
        let paths = DataPaths::new(dir.path());
        seed_world(&paths);

        let report = run_regeneration(
            &paths,
            &QueueStore::new(&paths),
            &NationLock::default(),
            MapMode::Nation,
            RegenKind::Full,
        );

        assert_eq!(report.outcome, RegenOutcome::Completed);
        assert_eq!(report.updated_regions, 2);
        assert!(paths.full_map(MapMode::Nation).exists());
        assert!(paths.compiled_nations().exists());
        let regions = paths.regions_dir(MapMode::Nation);
        assert!(regions.join(region_filename((100, 0, 0), Some("nested"))).exists());
        assert!(regions.join(region_filename((0, 100, 0), Some("hover"))).exists());
    }

    #[test]
    fn queued_run_consumes_only_what_it_compiled() {
        let dir = tempdir().expect("temp dir");
        let paths = DataPaths::new(dir.path());
        seed_world(&paths);
        let queue = QueueStore::new(&paths);
        queue.enqueue(MapMode::Nation, "0,100,0").expect("enqueue nation");
        queue.enqueue(MapMode::County, "5,5,5").expect("enqueue county");

        let report = run_regeneration(
            &paths,
            &queue,
            &NationLock::default(),
            MapMode::Nation,
            RegenKind::Queued,
        );

        assert_eq!(report.outcome, RegenOutcome::Completed);
        // The subject pulls its overlord into the run.
        assert_eq!(report.updated_regions, 2);
        let raw = queue.raw().expect("raw queue");
        assert!(!raw.contains_key("nation"));
        assert_eq!(raw["county"], vec!["5,5,5".to_string()]);
    }

    #[test]
    fn data_only_run_touches_no_images() {
        let dir = tempdir().expect("temp dir");
        let paths = DataPaths::new(dir.path());
        seed_world(&paths);

        let report = run_regeneration(
            &paths,
            &QueueStore::new(&paths),
            &NationLock::default(),
            MapMode::County,
            RegenKind::DataOnly,
        );

        assert_eq!(report.outcome, RegenOutcome::Completed);
        assert!(paths.compiled_nations().exists());
        assert!(!paths.output_dir().exists());
    }

    #[test]
    fn missing_inputs_fail_the_run_not_the_process() {
        let dir = tempdir().expect("temp dir");
        let paths = DataPaths::new(dir.path());

        let report = run_regeneration(
            &paths,
            &QueueStore::new(&paths),
            &NationLock::default(),
            MapMode::County,
            RegenKind::Full,
        );

        assert_eq!(report.outcome, RegenOutcome::Failed);
        assert!(report.error.is_some());
    }

    #[test]
    fn run_waits_for_an_in_flight_nation_edit() {
        let dir = tempdir().expect("temp dir");
        let paths = DataPaths::new(dir.path());
        seed_world(&paths);
        let nations = NationLock::default();

        let edit = nations.hold();
        let worker = {
            let (paths, nations) = (paths.clone(), nations.clone());
            std::thread::spawn(move || {
                run_regeneration(
                    &paths,
                    &QueueStore::new(&paths),
                    &nations,
                    MapMode::Nation,
                    RegenKind::Full,
                )
            })
        };
        std::thread::sleep(Duration::from_millis(100));
        assert!(!paths.compiled_nations().exists());

        // Finish the edit the worker is waiting on.
        let mut records = read_nation_input(&paths).expect("read nations");
        records.insert(
            "NATION_3".to_string(),
            json!({"rgb": "0,0,100", "provinces": []}),
        );
        write_nation_input(&paths, &records).expect("write nations");
        drop(edit);

        let report = worker.join().expect("worker thread");
        assert_eq!(report.outcome, RegenOutcome::Completed);
        let compiled: Value = serde_json::from_str(
            &std::fs::read_to_string(paths.compiled_nations()).expect("read compiled"),
        )
        .expect("parse compiled");
        assert_eq!(compiled["NATION_3"]["size"], json!(0));
        assert_eq!(report.updated_regions, 2);
    }

    #[tokio::test]
    async fn second_trigger_while_running_is_busy() {
        let dir = tempdir().expect("temp dir");
        let state = AppState::new(DataPaths::new(dir.path()), None);
        let held = state.gate.try_acquire().expect("hold gate");

        let err = trigger(&state, MapMode::County, RegenKind::Full).expect_err("busy");
        assert!(matches!(err, MapError::Busy));

        drop(held);
        let accepted = trigger(&state, MapMode::County, RegenKind::Full).expect("accepted");
        assert!(accepted.success);
        assert_eq!(accepted.regen_type, RegenKind::Full);
    }

    #[tokio::test]
    async fn triggered_run_records_report_and_reopens_gate() {
        let dir = tempdir().expect("temp dir");
        let paths = DataPaths::new(dir.path());
        seed_world(&paths);
        let state = AppState::new(paths, None);

        trigger(&state, MapMode::County, RegenKind::Full).expect("accepted");

        let report = tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                if let Some(report) = state.last_report.read().await.clone() {
                    return report;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("run finishes");
        assert_eq!(report.outcome, RegenOutcome::Completed);
        assert_eq!(report.mode, MapMode::County);

        tokio::time::timeout(Duration::from_secs(5), async {
            while state.gate.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("gate reopens");
        assert!(state.paths.full_map(MapMode::County).exists());
    }
}
