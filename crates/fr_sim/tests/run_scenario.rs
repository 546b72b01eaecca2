// crates/fr_sim/tests/run_scenario.rs
//! 编排层端到端测试：在临时目录铺一个完整情景包，从头跑到
//! 产物落地，再验证下车、失稳与检查点续算路径。

use fr_io::SeriesReader;
use fr_sim::{
    run_scenario, CallbackSet, CollectingCallback, RunOptions, RunOutcome, RunPhase, SimError,
    BAIL_SENTINEL,
};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn square_boundary() -> Value {
    let bl = [0.0, 0.0];
    let br = [100.0, 0.0];
    let tr = [100.0, 100.0];
    let tl = [0.0, 100.0];
    json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [bl, br]},
             "properties": {"boundary": "Transmissive"}},
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [br, tr]},
             "properties": {"boundary": "Reflective"}},
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [tr, tl]},
             "properties": {"boundary": "Transmissive"}},
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [tl, bl]},
             "properties": {"boundary": "Reflective"}}
        ]
    })
}

fn rain_inflow(rate_mm_per_hour: f64) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "geometry": {"type": "Polygon",
                          "coordinates": [[[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0], [0.0, 0.0]]]},
             "properties": {"type": "Rainfall", "data": rate_mm_per_hour}}
        ]
    })
}

fn torrent_inlet(rate_m3_per_second: f64) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "geometry": {"type": "Polygon",
                          "coordinates": [[[40.0, 40.0], [60.0, 40.0], [60.0, 60.0], [40.0, 60.0], [40.0, 40.0]]]},
             "properties": {"type": "Surface", "data": rate_m3_per_second}}
        ]
    })
}

fn write_package(root: &Path, inflow: &Value) {
    let config = json!({
        "id": 3,
        "project": 9,
        "run_id": 1,
        "epsg": "EPSG:28355",
        "duration": 600,
        "resolution": 10.0,
        "boundary": "boundary.geojson",
        "inflow": "inflow.geojson"
    });
    fs::create_dir_all(root.join("inputs")).unwrap();
    fs::write(
        root.join("scenario.json"),
        serde_json::to_string_pretty(&config).unwrap(),
    )
    .unwrap();
    fs::write(
        root.join("inputs/boundary.geojson"),
        serde_json::to_string_pretty(&square_boundary()).unwrap(),
    )
    .unwrap();
    fs::write(
        root.join("inputs/inflow.geojson"),
        serde_json::to_string_pretty(inflow).unwrap(),
    )
    .unwrap();
}

fn options(batch_number: u32) -> RunOptions {
    RunOptions {
        batch_number,
        n_ranks: 2,
        ..RunOptions::default()
    }
}

fn count_frames(series: &Path) -> (usize, f64) {
    let mut reader = SeriesReader::open(series).unwrap();
    let mut n = 0usize;
    let mut last_time = f64::NAN;
    while let Some(frame) = reader.next_frame().unwrap() {
        n += 1;
        last_time = frame.time_s;
    }
    (n, last_time)
}

#[test]
fn test_complete_run_produces_products() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), &rain_inflow(50.0));
    let package = fr_scenario::ScenarioPackage::load(dir.path()).unwrap();
    let collector = Arc::new(CollectingCallback::new());

    let report = run_scenario(&package, CallbackSet::with(collector.clone()), &options(1)).unwrap();

    assert_eq!(report.run_label, "run_9_3_1");
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.sim_time_s, 600.0);
    assert_eq!(report.gates, 10);
    assert!(report.total_steps > 0);
    assert!(report.post.is_some());

    let out = package.output_dir();

    // 流场时序: 起点帧加 10 个同步门
    let (frames, last_time) = count_frames(&out.join("run_9_3_1.fts"));
    assert_eq!(frames, 11);
    assert_eq!(last_time, 600.0);

    // 逐门诊断: 注释行、表头与 10 行快照
    let diag = fs::read_to_string(out.join("run_diagnostics_1.csv")).unwrap();
    let lines: Vec<&str> = diag.lines().collect();
    assert!(lines[0].starts_with("# uniform grid 10x10 @ 10 m"));
    assert_eq!(lines.len(), 12);

    // 运行归纳
    let summary: Value =
        serde_json::from_str(&fs::read_to_string(report.summary_path.unwrap()).unwrap()).unwrap();
    assert_eq!(summary["run"]["outcome"], "Completed");
    assert_eq!(summary["model"]["n_ranks"], 2);
    assert_eq!(summary["mesh"]["active_cells"], 100);
    assert!(summary["flow"]["final_volume_m3"].as_f64().unwrap() > 0.0);

    // 全雨量落在反射域里，末门体积接近累计降雨 8.33 mm × 1 公顷
    let volume = summary["flow"]["final_volume_m3"].as_f64().unwrap();
    assert!((70.0..100.0).contains(&volume), "体积 {volume} 出乎意料");

    // 出图产物与最大包络
    assert!(out.join("run_9_3_1_depth_000000.asc").is_file());
    assert!(out.join("run_9_3_1_depth_max.asc").is_file());
    assert!(out.join("run_9_3_1_velocity_max.asc").is_file());
    assert!(out.join("run_9_3_1_depthIntegratedVelocity_max.asc").is_file());
    assert!(out.join("run_9_3_1_stage_max.asc").is_file());

    // 流水账与回调
    let journal = fs::read_to_string(out.join("run_1.log")).unwrap();
    assert!(journal.contains("status: INIT run_9_3_1 batch 1"));
    assert!(journal.contains("status: COMPLETE Completed"));
    let statuses = collector.statuses();
    assert!(statuses.iter().any(|s| s.starts_with("MESH_BUILD")));
    assert!(statuses.iter().any(|s| s == "DISTRIBUTE 2 ranks"));
    assert!(collector.last_metric("volume_m3").unwrap() > 0.0);
    assert!(collector
        .files()
        .iter()
        .any(|(label, _)| label == "flow_series"));
}

#[test]
fn test_bail_sentinel_stops_run_without_finalize() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), &rain_inflow(50.0));
    let package = fr_scenario::ScenarioPackage::load(dir.path()).unwrap();
    fs::write(package.output_dir().join(BAIL_SENTINEL), b"").unwrap();

    let report = run_scenario(&package, CallbackSet::new(), &options(1)).unwrap();

    assert_eq!(report.outcome, RunOutcome::Bailed);
    assert_eq!(report.gates, 1);
    assert!(report.summary_path.is_none());
    assert!(report.post.is_none());

    let out = package.output_dir();
    assert!(!out.join("run_summary_1.json").exists());
    // 下车前必然落了检查点
    let checkpoints: Vec<_> = fs::read_dir(package.checkpoint_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |x| x == "fck"))
        .collect();
    assert!(!checkpoints.is_empty());
    // 起点帧加一个己走完的门
    let (frames, last_time) = count_frames(&out.join("run_9_3_1.fts"));
    assert_eq!(frames, 2);
    assert_eq!(last_time, 60.0);
}

#[test]
fn test_restart_resumes_from_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), &rain_inflow(50.0));
    let package = fr_scenario::ScenarioPackage::load(dir.path()).unwrap();

    let first = run_scenario(&package, CallbackSet::new(), &options(1)).unwrap();
    assert_eq!(first.outcome, RunOutcome::Completed);

    // 指定从 480 秒的检查点接着跑剩下两个门
    let resumed = run_scenario(
        &package,
        CallbackSet::new(),
        &RunOptions {
            checkpoint_time: Some(480.0),
            ..options(2)
        },
    )
    .unwrap();

    assert_eq!(resumed.outcome, RunOutcome::Completed);
    assert_eq!(resumed.gates, 2);
    assert_eq!(resumed.sim_time_s, 600.0);

    let out = package.output_dir();
    // 时序截回 480 再续到 600，帧数不变
    let (frames, last_time) = count_frames(&out.join("run_9_3_1.fts"));
    assert_eq!(frames, 11);
    assert_eq!(last_time, 600.0);

    // 第二批次有自己的诊断、归纳与流水账
    let diag = fs::read_to_string(out.join("run_diagnostics_2.csv")).unwrap();
    assert_eq!(diag.lines().count(), 4);
    assert!(out.join("run_summary_2.json").is_file());
    let journal = fs::read_to_string(out.join("run_2.log")).unwrap();
    assert!(journal.contains("RESTART from t=480s"));
}

#[test]
fn test_restart_without_checkpoint_fails_in_phase() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), &rain_inflow(50.0));
    let package = fr_scenario::ScenarioPackage::load(dir.path()).unwrap();

    let err = run_scenario(&package, CallbackSet::new(), &options(2)).unwrap_err();
    assert_eq!(err.phase(), Some(RunPhase::Restart));
    match err {
        SimError::Phase { source, .. } => {
            assert!(matches!(*source, SimError::NoCheckpoint { .. }));
        }
        other => panic!("期望带阶段的错误，得到 {other:?}"),
    }
}

#[test]
fn test_torrential_inlet_goes_unstable() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), &torrent_inlet(4000.0));
    let package = fr_scenario::ScenarioPackage::load(dir.path()).unwrap();

    let report = run_scenario(&package, CallbackSet::new(), &options(1)).unwrap();

    assert_eq!(report.outcome, RunOutcome::Unstable);
    assert!(report.sim_time_s < report.duration_s);

    // 失稳照样收尾，归纳里带着触顶的推算流速
    let summary: Value =
        serde_json::from_str(&fs::read_to_string(report.summary_path.unwrap()).unwrap()).unwrap();
    assert_eq!(summary["run"]["outcome"], "Unstable");
    assert!(summary["stability"]["implied_max_speed_ms"].as_f64().unwrap() >= 20.0);
}
