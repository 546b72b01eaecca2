// crates/fr_sim/src/builder.rs
//! 情景到求解域的装配。
//!
//! 把情景包里的带类型要素翻译成引擎的 [`DomainSpec`]：边界环
//! 与孔洞直接带过去，糙率表和地形模型包成逐点闭包，入流速率
//! 换算成水深增速。

use fr_engine::{DomainSpec, FieldFn, PiecewiseRate, SourceTerm};
use fr_foundation::defaults::RAINFALL_FACTOR;
use fr_scenario::{InflowKind, RateSeries, ScenarioPackage};
use fr_terrain::ElevationModel;
use std::sync::Arc;

/// 速率时序换算成水深增速曲线（m/s）。
///
/// 降雨以 mm/h 计，直接乘换算系数；地表入流以 m³/s 计，摊到
/// 占地面积上。
fn convert_rate(kind: InflowKind, rate: &RateSeries, area_m2: f64) -> PiecewiseRate {
    let factor = match kind {
        InflowKind::Rainfall => RAINFALL_FACTOR,
        InflowKind::Surface => 1.0 / area_m2,
    };
    match rate {
        RateSeries::Constant(v) => PiecewiseRate::constant(v * factor),
        RateSeries::Series(points) => {
            PiecewiseRate::from_points(points.iter().map(|&(t, v)| (t, v * factor)).collect())
        }
    }
}

/// 入流要素转成引擎源项。
///
/// 线状与点状要素按网格尺寸铺成带状或方块再摊铺；合成后仍然
/// 占地退化的地表入流换算不出增速，跳过并告警。
#[must_use]
pub fn source_terms(package: &ScenarioPackage) -> Vec<SourceTerm> {
    let spread = package.finest_resolution(None);
    let mut sources = Vec::with_capacity(package.inflows().len());
    for (i, inflow) in package.inflows().iter().enumerate() {
        let footprint = inflow.geometry.footprint(spread);
        let area = footprint.area();
        if inflow.kind == InflowKind::Surface && area <= 0.0 {
            tracing::warn!("inflow {} has degenerate footprint, skipped", i);
            continue;
        }
        sources.push(SourceTerm {
            footprint,
            rate: convert_rate(inflow.kind, &inflow.rate, area),
        });
    }
    sources
}

/// 把情景包装配成求解域描述。
///
/// 地形模型由调用方先烧录构筑物再加载；没有地形当平地跑。
/// 网格分辨率取最细加密区与配置分辨率中更细的一档。
#[must_use]
pub fn build_domain(package: &ScenarioPackage, elevation: Option<ElevationModel>) -> DomainSpec {
    let resolution = package.finest_resolution(None);
    let friction_table = package.frictions().clone();
    let friction: FieldFn = Arc::new(move |p| friction_table.n_at(p));
    let elevation_field: FieldFn = match elevation {
        Some(model) => Arc::new(move |p| model.sample(p)),
        None => Arc::new(|_| 0.0),
    };
    tracing::info!(
        "domain assembled: resolution {} m, {} sources, {} holes",
        resolution,
        package.inflows().len(),
        package.holes().len()
    );
    DomainSpec::new(package.boundary().clone(), resolution)
        .with_holes(package.holes().footprints.clone())
        .with_interior_regions(package.interior_regions())
        .with_friction(friction)
        .with_elevation(elevation_field)
        .with_sources(source_terms(package))
}
