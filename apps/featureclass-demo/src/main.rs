//! featureclass demo
//!
//! Decorates a few sample classes and prints their metadata and exports.
//! Usage: `featureclass-demo [config.toml]`

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use featureclass::{
    as_mapping_with, as_record_with, class_annotations, feature_annotations, feature_names,
    feature_names_of, featureclass, record_schema_with, ClassBuilder, Feature, FeatureCache,
    FeatureClass, FeatureObject, FeatureType, FeatureclassConfig, Json, Value,
};

struct MyFeatures {
    a: i64,
    b: i64,
    cache: FeatureCache,
}

impl MyFeatures {
    fn new(a: i64, b: i64) -> Self {
        Self {
            a,
            b,
            cache: FeatureCache::new(),
        }
    }
}

impl FeatureClass for MyFeatures {
    fn features(class: &mut ClassBuilder<Self>) {
        class
            .computed("feature_1", |this| this.a.pow(2))
            .feature("feature_2", |this| {
                let feature_1: i64 = this.feature("feature_1")?;
                Ok(this.b.pow(3) + feature_1)
            })
            .computed("feature_list", |_| (0..5).collect::<Vec<i64>>());
    }

    fn annotations(annotations: &mut featureclass::Annotations) {
        annotations.insert("a", FeatureType::Int);
        annotations.insert("b", FeatureType::Int);
    }

    fn feature_cache(&self) -> &FeatureCache {
        &self.cache
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Bounds {
    min: f64,
    max: f64,
}

struct Measurements {
    samples: Vec<f64>,
    cache: FeatureCache,
}

impl FeatureClass for Measurements {
    fn features(class: &mut ClassBuilder<Self>) {
        class
            .feature("mean", |this| {
                if this.samples.is_empty() {
                    return Err("no samples".into());
                }
                Ok(this.samples.iter().sum::<f64>() / this.samples.len() as f64)
            })
            .add(
                Feature::new("bounds", |this: &Measurements| {
                    let min = this.samples.iter().copied().reduce(f64::min);
                    let max = this.samples.iter().copied().reduce(f64::max);
                    match (min, max) {
                        (Some(min), Some(max)) => Ok(Json(Bounds { min, max })),
                        _ => Err("no samples".into()),
                    }
                })
                .substitute(Value::Null),
            )
            .add(
                Feature::infallible("count", |this: &Measurements| this.samples.len())
                    .named("sample_count"),
            );
    }

    fn feature_cache(&self) -> &FeatureCache {
        &self.cache
    }
}

fn load_config() -> Result<FeatureclassConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            tracing::info!("Loaded config from {}", path);
            Ok(FeatureclassConfig::from_toml(&text)?)
        }
        None => Ok(FeatureclassConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = load_config()?;

    featureclass::<MyFeatures>();
    featureclass::<Measurements>();

    let myf = MyFeatures::new(2, 3);
    println!("feature names (class):    {:?}", feature_names::<MyFeatures>()?);
    println!("feature names (instance): {:?}", feature_names_of(&myf)?);
    println!(
        "feature annotations: {}",
        serde_json::to_string(&feature_annotations::<MyFeatures>()?)?
    );
    println!(
        "class annotations:   {}",
        serde_json::to_string(&class_annotations::<MyFeatures>()?)?
    );
    println!(
        "values: {}",
        serde_json::to_string_pretty(&as_mapping_with(&myf, &config.export)?)?
    );
    println!(
        "record type: {}",
        serde_json::to_string_pretty(&record_schema_with::<MyFeatures>(&config.export)?)?
    );

    for samples in [vec![1.5, 4.0, 2.5], Vec::new()] {
        let measurements = Measurements {
            samples,
            cache: FeatureCache::new(),
        };
        match as_record_with(&measurements, &config.export) {
            Ok(record) => println!("record: {}", serde_json::to_string(&record)?),
            Err(err) => {
                tracing::warn!("Export failed: {}", err);
                let count: usize = measurements.feature("sample_count")?;
                println!("partial: sample_count = {}", count);
            }
        }
    }

    Ok(())
}
