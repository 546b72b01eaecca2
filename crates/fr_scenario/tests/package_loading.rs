// crates/fr_scenario/tests/package_loading.rs
//! 情景包加载的端到端测试：在临时目录里铺出完整的包结构，
//! 验证装配结果、违规汇总与产物目录创建。

use fr_scenario::{InflowGeometry, InflowKind, RateSeries, ScenarioError, ScenarioPackage};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

/// 100 m × 100 m 正方形边界，下上透射、左右反射。
fn square_boundary() -> Value {
    let bl = [321000.0, 5812000.0];
    let br = [321100.0, 5812000.0];
    let tr = [321100.0, 5812100.0];
    let tl = [321000.0, 5812100.0];
    json!({
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::28355"}},
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

fn polygon_feature(coords: Value, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "geometry": {"type": "Polygon", "coordinates": [coords]},
        "properties": properties
    })
}

fn collection(features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::28355"}},
        "features": features
    })
}

fn minimal_config() -> Value {
    json!({
        "id": 1,
        "project": 1,
        "run_id": 1,
        "epsg": "EPSG:28355",
        "duration": 600,
        "boundary": "boundary.geojson"
    })
}

fn write_package(root: &Path, config: &Value, inputs: &[(&str, &Value)]) {
    fs::create_dir_all(root.join("inputs")).unwrap();
    fs::write(
        root.join("scenario.json"),
        serde_json::to_string_pretty(config).unwrap(),
    )
    .unwrap();
    for (name, value) in inputs {
        fs::write(
            root.join("inputs").join(name),
            serde_json::to_string_pretty(value).unwrap(),
        )
        .unwrap();
    }
}

#[test]
fn test_minimal_package_loads() {
    let dir = tempfile::tempdir().unwrap();
    write_package(
        dir.path(),
        &minimal_config(),
        &[("boundary.geojson", &square_boundary())],
    );

    let package = ScenarioPackage::load(dir.path()).unwrap();
    assert_eq!(package.run_label(), "run_1_1_1");
    assert_eq!(package.config().epsg, 28355);
    assert_eq!(package.boundary().n_edges(), 4);
    assert!(package.boundary().polygon().is_clockwise());
    assert!((package.boundary().polygon().area() - 10_000.0).abs() < 1.0e-6);

    // 只有全域兜底糙率
    assert_eq!(package.frictions().len(), 1);
    assert!(package.inflows().is_empty());
    assert!(package.holes().is_empty());

    // 兜底出图分辨率
    assert_eq!(package.finest_resolution(None), 1000.0);
    assert_eq!(package.finest_resolution(Some(2.0)), 2.0);
}

#[test]
fn test_output_dirs_created_on_load() {
    let dir = tempfile::tempdir().unwrap();
    write_package(
        dir.path(),
        &minimal_config(),
        &[("boundary.geojson", &square_boundary())],
    );

    let package = ScenarioPackage::load(dir.path()).unwrap();
    assert!(package.output_dir().is_dir());
    assert!(package.checkpoint_dir().is_dir());
    assert!(package.output_dir().ends_with("outputs_1_1_1"));
}

#[test]
fn test_load_accepts_scenario_json_path() {
    let dir = tempfile::tempdir().unwrap();
    write_package(
        dir.path(),
        &minimal_config(),
        &[("boundary.geojson", &square_boundary())],
    );

    let package = ScenarioPackage::load(&dir.path().join("scenario.json")).unwrap();
    assert_eq!(package.run_label(), "run_1_1_1");
}

#[test]
fn test_full_package_loads() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = minimal_config();
    config["friction"] = json!("friction.geojson");
    config["inflow"] = json!("inflow.geojson");
    config["structure"] = json!("structure.geojson");
    config["mesh_region"] = json!("mesh_region.geojson");

    let friction = collection(vec![polygon_feature(
        json!([[321010.0, 5812010.0], [321040.0, 5812010.0], [321040.0, 5812040.0],
               [321010.0, 5812040.0], [321010.0, 5812010.0]]),
        json!({"mannings": "0.1"}),
    )]);
    let inflow = collection(vec![
        polygon_feature(
            json!([[321050.0, 5812050.0], [321070.0, 5812050.0], [321070.0, 5812070.0],
                   [321050.0, 5812070.0], [321050.0, 5812050.0]]),
            json!({"type": "Rainfall", "data": "10"}),
        ),
        json!({
            "type": "Feature",
            "geometry": {"type": "LineString",
                         "coordinates": [[321020.0, 5812080.0], [321060.0, 5812080.0]]},
            "properties": {"type": "Surface", "data": "19.7"}
        }),
    ]);
    let structure = collection(vec![
        polygon_feature(
            json!([[321020.0, 5812060.0], [321030.0, 5812060.0], [321030.0, 5812070.0],
                   [321020.0, 5812070.0], [321020.0, 5812060.0]]),
            json!({"method": "Mannings"}),
        ),
        polygon_feature(
            json!([[321060.0, 5812020.0], [321070.0, 5812020.0], [321070.0, 5812030.0],
                   [321060.0, 5812030.0], [321060.0, 5812020.0]]),
            json!({"method": "Holes", "name": "depot"}),
        ),
    ]);
    let mesh_region = collection(vec![polygon_feature(
        json!([[321040.0, 5812040.0], [321090.0, 5812040.0], [321090.0, 5812090.0],
               [321040.0, 5812090.0], [321040.0, 5812040.0]]),
        json!({"resolution": 5.0}),
    )]);

    write_package(
        dir.path(),
        &config,
        &[
            ("boundary.geojson", &square_boundary()),
            ("friction.geojson", &friction),
            ("inflow.geojson", &inflow),
            ("structure.geojson", &structure),
            ("mesh_region.geojson", &mesh_region),
        ],
    );

    let package = ScenarioPackage::load(dir.path()).unwrap();

    // Mannings 构筑物 + 糙率分区 + 兜底
    assert_eq!(package.frictions().len(), 3);
    assert_eq!(package.inflows().len(), 2);
    assert_eq!(package.inflows()[0].kind, InflowKind::Rainfall);
    assert_eq!(package.inflows()[0].rate, RateSeries::Constant(10.0));
    assert_eq!(package.inflows()[1].kind, InflowKind::Surface);
    assert!(matches!(
        package.inflows()[1].geometry,
        InflowGeometry::Line(_)
    ));
    assert_eq!(package.inflows()[1].rate, RateSeries::Constant(19.7));
    assert_eq!(package.holes().len(), 1);
    assert_eq!(package.holes().names[0], "depot");
    assert_eq!(package.mesh_regions().len(), 1);
    assert_eq!(package.finest_resolution(None), 5.0);
}

#[test]
fn test_missing_duration_reported_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = minimal_config();
    config.as_object_mut().unwrap().remove("duration");
    write_package(
        dir.path(),
        &config,
        &[("boundary.geojson", &square_boundary())],
    );

    let err = ScenarioPackage::load(dir.path()).unwrap_err();
    match err {
        ScenarioError::Config(config_err) => {
            assert_eq!(config_err.len(), 1);
            assert!(config_err.mentions("duration"));
        }
        other => panic!("期望 ConfigError，实际 {other:?}"),
    }
}

#[test]
fn test_input_violations_reported_together() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = minimal_config();
    config["boundary"] = json!("nope.geojson");
    config["friction"] = json!("friction.geojson");
    write_package(dir.path(), &config, &[]);
    // friction 文件存在但不是合法 JSON
    fs::write(dir.path().join("inputs/friction.geojson"), "not json").unwrap();

    let err = ScenarioPackage::load(dir.path()).unwrap_err();
    match err {
        ScenarioError::Config(config_err) => {
            assert!(config_err.len() >= 2, "违规项: {config_err}");
            assert!(config_err.mentions("boundary"));
            assert!(config_err.mentions("friction"));
        }
        other => panic!("期望 ConfigError，实际 {other:?}"),
    }
}

#[test]
fn test_mesh_region_outside_boundary_is_a_violation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = minimal_config();
    config["mesh_region"] = json!("mesh_region.geojson");
    let region = collection(vec![polygon_feature(
        json!([[400000.0, 5900000.0], [400010.0, 5900000.0], [400010.0, 5900010.0],
               [400000.0, 5900010.0], [400000.0, 5900000.0]]),
        json!({"resolution": 5.0}),
    )]);
    write_package(
        dir.path(),
        &config,
        &[
            ("boundary.geojson", &square_boundary()),
            ("mesh_region.geojson", &region),
        ],
    );

    let err = ScenarioPackage::load(dir.path()).unwrap_err();
    match err {
        ScenarioError::Config(config_err) => {
            assert!(config_err.mentions("mesh_region"));
        }
        other => panic!("期望 ConfigError，实际 {other:?}"),
    }
}

#[test]
fn test_directory_without_scenario_json() {
    let dir = tempfile::tempdir().unwrap();
    let err = ScenarioPackage::load(dir.path()).unwrap_err();
    assert!(matches!(err, ScenarioError::NotAPackage { .. }));
}

#[test]
fn test_dangling_boundary_is_a_violation() {
    let dir = tempfile::tempdir().unwrap();
    let mut boundary = square_boundary();
    // 去掉最后一条线段，环无法闭合
    boundary["features"].as_array_mut().unwrap().pop();
    write_package(
        dir.path(),
        &minimal_config(),
        &[("boundary.geojson", &boundary)],
    );

    let err = ScenarioPackage::load(dir.path()).unwrap_err();
    match err {
        ScenarioError::Config(config_err) => {
            assert!(config_err.mentions("boundary"));
            assert!(config_err.to_string().contains("悬空"));
        }
        other => panic!("期望 ConfigError，实际 {other:?}"),
    }
}
