//! Featureclass integration tests
//!
//! Decoration, memoization, error policies, inheritance and export.

use std::cell::Cell;
use std::sync::Arc;

use featureclass::{
    as_mapping, as_record, as_record_with, class_annotations, feature_annotations,
    feature_annotations_of, feature_names, feature_names_of, featureclass, record_schema,
    ClassBuilder, ExportConfig, Feature, FeatureCache, FeatureClass, FeatureObject, FeatureType,
    FeatureclassError, Json, OnError, Value,
};
use rstest::rstest;
use serde::{Deserialize, Serialize};

// === Fixtures ===

#[derive(Default)]
struct MyFeatures {
    counter: Cell<i64>,
    cache: FeatureCache,
}

impl MyFeatures {
    fn base(&self) -> i64 {
        2
    }
}

impl FeatureClass for MyFeatures {
    fn features(class: &mut ClassBuilder<Self>) {
        class
            .computed("feature_1", |this| this.base().pow(2))
            .feature("feature_2", |this| {
                let feature_1: i64 = this.feature("feature_1")?;
                Ok(feature_1.pow(2))
            })
            .computed("inc", |this| {
                this.counter.set(this.counter.get() + 1);
                this.counter.get()
            });
    }

    fn feature_cache(&self) -> &FeatureCache {
        &self.cache
    }
}

fn my_features() -> MyFeatures {
    featureclass::<MyFeatures>();
    MyFeatures::default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Point {
    x: i64,
    y: i64,
}

#[derive(Default)]
struct Typed {
    cache: FeatureCache,
}

impl FeatureClass for Typed {
    fn features(class: &mut ClassBuilder<Self>) {
        class
            .computed("count", |_| 3u32)
            .computed("ratio", |_| 0.5f64)
            .computed("flag", |_| true)
            .computed("label", |_| String::from("typed"))
            .computed("items", |_| vec![1i64, 2, 3])
            .computed("maybe", |_| Option::<String>::None)
            .computed("anything", |_| Value::Null)
            .computed("point", |_| Json(Point { x: 1, y: -1 }));
    }

    fn feature_cache(&self) -> &FeatureCache {
        &self.cache
    }
}

#[derive(Default)]
struct Fragile {
    divisor: Cell<i64>,
    attempts: Cell<u32>,
    cache: FeatureCache,
}

impl Fragile {
    fn divide(&self) -> Result<i64, featureclass::BoxError> {
        self.attempts.set(self.attempts.get() + 1);
        match self.divisor.get() {
            0 => Err("division by zero".into()),
            d => Ok(100 / d),
        }
    }
}

impl FeatureClass for Fragile {
    fn features(class: &mut ClassBuilder<Self>) {
        class
            .feature("strict", |this| this.divide())
            .add(Feature::new("fallback", |this: &Fragile| this.divide()).substitute(-1))
            .add(
                Feature::new("ratio", |this: &Fragile| this.divide())
                    .named("handled")
                    .handle(|this: &Fragile, key, failure| {
                        Value::String(format!(
                            "{} after {} attempts: {}",
                            key,
                            this.attempts.get(),
                            failure.error()
                        ))
                    }),
            )
            .feature("dependent", |this| {
                let strict: i64 = this.feature("strict")?;
                Ok(strict + 1)
            });
    }

    fn feature_cache(&self) -> &FeatureCache {
        &self.cache
    }
}

fn fragile(divisor: i64) -> Fragile {
    featureclass::<Fragile>();
    let fragile = Fragile::default();
    fragile.divisor.set(divisor);
    fragile
}

// === Metadata ===

#[test]
fn test_feature_names() {
    let instance = my_features();
    assert_eq!(
        feature_names::<MyFeatures>().unwrap(),
        vec!["feature_1", "feature_2", "inc"]
    );
    assert_eq!(
        feature_names_of(&instance).unwrap(),
        feature_names::<MyFeatures>().unwrap()
    );
}

#[test]
fn test_feature_annotations() {
    featureclass::<MyFeatures>();
    let annotations = feature_annotations::<MyFeatures>().unwrap();
    let names = feature_names::<MyFeatures>().unwrap();
    assert_eq!(annotations.names().collect::<Vec<_>>(), names);
    for (_, ty) in annotations.iter() {
        assert_eq!(ty, &FeatureType::Int);
    }
}

#[rstest]
#[case("count", FeatureType::Int)]
#[case("ratio", FeatureType::Float)]
#[case("flag", FeatureType::Bool)]
#[case("label", FeatureType::String)]
#[case("items", FeatureType::list(FeatureType::Int))]
#[case("maybe", FeatureType::optional(FeatureType::String))]
#[case("anything", FeatureType::Any)]
#[case("point", FeatureType::Object("Point".into()))]
fn test_declared_result_types(#[case] name: &str, #[case] expected: FeatureType) {
    featureclass::<Typed>();
    let instance = Typed::default();
    let annotations = feature_annotations_of(&instance).unwrap();
    assert_eq!(annotations.get(name), Some(&expected));
}

#[test]
fn test_class_annotations_contain_features() {
    featureclass::<Typed>();
    let class = class_annotations::<Typed>().unwrap();
    for (name, ty) in feature_annotations::<Typed>().unwrap().iter() {
        assert_eq!(class.get(name), Some(ty));
    }
}

#[test]
fn test_undecorated_class_is_rejected() {
    #[derive(Default)]
    struct Undecorated {
        cache: FeatureCache,
    }

    impl FeatureClass for Undecorated {
        fn features(class: &mut ClassBuilder<Self>) {
            class.computed("x", |_| 1i64);
        }

        fn feature_cache(&self) -> &FeatureCache {
            &self.cache
        }
    }

    let instance = Undecorated::default();
    assert!(matches!(
        feature_names::<Undecorated>(),
        Err(FeatureclassError::InvalidTarget { .. })
    ));
    assert!(matches!(
        feature_annotations_of(&instance),
        Err(FeatureclassError::InvalidTarget { .. })
    ));
    assert!(matches!(
        as_mapping(&instance, false),
        Err(FeatureclassError::InvalidTarget { .. })
    ));
    assert!(matches!(
        record_schema::<Undecorated>(),
        Err(FeatureclassError::InvalidTarget { .. })
    ));
}

// === Memoization ===

#[test]
fn test_nested_feature_reads() {
    let instance = my_features();
    assert_eq!(instance.feature::<i64>("feature_1").unwrap(), 4);
    assert_eq!(instance.feature::<i64>("feature_2").unwrap(), 16);
}

#[test]
fn test_counter_is_computed_once_per_instance() {
    let a = my_features();
    let b = my_features();
    assert_eq!(a.feature::<i64>("inc").unwrap(), 1);
    assert_eq!(b.feature::<i64>("inc").unwrap(), 1);
    assert_eq!(a.feature::<i64>("inc").unwrap(), 1);
    assert_eq!(b.feature::<i64>("inc").unwrap(), 1);
    assert_eq!(a.counter.get(), 1);
}

#[test]
fn test_instances_do_not_share_caches() {
    let a = my_features();
    let b = my_features();
    a.feature_value("feature_2").unwrap();
    assert!(a.feature_cache().contains("feature_1"));
    assert!(b.feature_cache().is_empty());
}

#[test]
fn test_lookup_by_exported_name() {
    let instance = fragile(0);
    let by_key = instance.feature_value("ratio").unwrap();
    let by_name = instance.feature_value("handled").unwrap();
    assert!(Arc::ptr_eq(&by_key, &by_name));
}

// === Error policies ===

#[test]
fn test_propagate_retries_until_success() {
    let instance = fragile(0);
    let err = instance.feature_value("strict").unwrap_err();
    assert_eq!(err.as_computation().unwrap().feature(), "strict");
    assert!(instance.feature_value("strict").is_err());
    assert!(!instance.feature_cache().contains("strict"));

    instance.divisor.set(4);
    assert_eq!(instance.feature::<i64>("strict").unwrap(), 25);
    instance.divisor.set(0);
    assert_eq!(instance.feature::<i64>("strict").unwrap(), 25);
}

#[test]
fn test_substitute_is_cached() {
    let instance = fragile(0);
    assert_eq!(instance.feature::<i64>("fallback").unwrap(), -1);
    instance.divisor.set(5);
    assert_eq!(instance.feature::<i64>("fallback").unwrap(), -1);
    assert_eq!(instance.attempts.get(), 1);
}

#[test]
fn test_handler_receives_key_and_failure() {
    let instance = fragile(0);
    let message: String = instance.feature("handled").unwrap();
    assert_eq!(message, "ratio after 1 attempts: division by zero");
}

#[test]
fn test_failure_propagates_through_dependent_feature() {
    let instance = fragile(0);
    let err = instance.feature_value("dependent").unwrap_err();
    let failure = err.as_computation().unwrap();
    assert_eq!(failure.feature(), "dependent");
    assert!(failure.error().to_string().contains("strict"));
}

#[test]
fn test_policy_accessors() {
    featureclass::<Fragile>();
    let registry = featureclass::<Fragile>();
    assert!(registry.find("strict").unwrap().policy().is_propagate());
    assert!(matches!(
        registry.find("fallback").unwrap().policy(),
        OnError::Substitute(Value::Int(-1))
    ));
}

// === Inheritance ===

#[derive(Default)]
struct Base {
    a: i64,
    cache: FeatureCache,
}

impl FeatureClass for Base {
    fn features(class: &mut ClassBuilder<Self>) {
        class
            .computed("square", |this| this.a * this.a)
            .computed("label", |_| String::from("base"));
    }

    fn feature_cache(&self) -> &FeatureCache {
        &self.cache
    }
}

#[derive(Default)]
struct Derived {
    base: Base,
    b: i64,
    cache: FeatureCache,
}

impl FeatureClass for Derived {
    fn features(class: &mut ClassBuilder<Self>) {
        class
            .inherit::<Base>(|this| &this.base)
            .feature("sum", |this| {
                let square: i64 = this.feature("square")?;
                Ok(square + this.b)
            })
            .computed("label", |_| String::from("derived"));
    }

    fn feature_cache(&self) -> &FeatureCache {
        &self.cache
    }
}

#[test]
fn test_inherited_features_come_first() {
    featureclass::<Derived>();
    assert_eq!(
        feature_names::<Derived>().unwrap(),
        vec!["square", "label", "sum"]
    );
    assert_eq!(feature_names::<Base>().unwrap(), vec!["square", "label"]);
}

#[test]
fn test_inherited_values_live_in_parent_cache() {
    featureclass::<Derived>();
    let derived = Derived {
        base: Base {
            a: 3,
            ..Base::default()
        },
        b: 1,
        ..Derived::default()
    };
    assert_eq!(derived.feature::<i64>("sum").unwrap(), 10);
    assert!(derived.base.feature_cache().contains("square"));
    assert!(!derived.feature_cache().contains("square"));
    assert!(derived.feature_cache().contains("sum"));
}

#[test]
fn test_own_feature_overrides_inherited() {
    featureclass::<Derived>();
    let derived = Derived::default();
    assert_eq!(derived.feature::<String>("label").unwrap(), "derived");
    assert_eq!(derived.base.feature::<String>("label").unwrap(), "base");
    let registry = featureclass::<Derived>();
    assert!(registry.find("square").unwrap().is_inherited());
    assert!(!registry.find("label").unwrap().is_inherited());
}

// === Export ===

#[test]
fn test_as_mapping_keys_match_names() {
    let instance = my_features();
    let mapping = as_mapping(&instance, false).unwrap();
    assert_eq!(
        mapping.names().collect::<Vec<_>>(),
        feature_names_of(&instance).unwrap()
    );
    assert_eq!(mapping.get("feature_2"), Some(&Value::Int(16)));
    assert_eq!(
        mapping.to_json(),
        serde_json::json!({"feature_1": 4, "feature_2": 16, "inc": 1})
    );
}

#[rstest]
#[case(false, true)]
#[case(true, false)]
fn test_deep_copy_controls_sharing(#[case] deep_copy: bool, #[case] shared: bool) {
    let instance = my_features();
    let mapping = as_mapping(&instance, deep_copy).unwrap();
    let cached = instance.feature_value("feature_1").unwrap();
    let exported = mapping.get_shared("feature_1").unwrap();
    assert_eq!(Arc::ptr_eq(&cached, exported), shared);
    assert_eq!(cached.as_ref(), exported.as_ref());
}

#[test]
fn test_as_mapping_propagates_failure() {
    let instance = fragile(0);
    assert!(matches!(
        as_mapping(&instance, false),
        Err(FeatureclassError::Computation(_))
    ));
}

#[test]
fn test_record_mirrors_annotations() {
    featureclass::<Typed>();
    let instance = Typed::default();
    let record = as_record(&instance, true).unwrap();
    assert_eq!(record.schema().name, "Typed");
    assert_eq!(
        record.schema().annotations(),
        feature_annotations_of(&instance).unwrap()
    );
    assert_eq!(record.get("items"), Some(&Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])));
    assert_eq!(
        record.to_json()["point"],
        serde_json::json!({"x": 1, "y": -1})
    );
    let point: Json<Point> = instance.feature("point").unwrap();
    assert_eq!(point.0, Point { x: 1, y: -1 });
}

#[test]
fn test_record_schema_of_class() {
    featureclass::<MyFeatures>();
    let schema = record_schema::<MyFeatures>().unwrap();
    assert_eq!(schema.name, "MyFeatures");
    assert_eq!(
        schema.field_names().collect::<Vec<_>>(),
        vec!["feature_1", "feature_2", "inc"]
    );
    assert_eq!(schema.field("inc").unwrap().field_type, FeatureType::Int);
}

#[test]
fn test_qualified_record_names() {
    let instance = my_features();
    let config = ExportConfig {
        qualified_record_names: true,
        ..ExportConfig::default()
    };
    let record = as_record_with(&instance, &config).unwrap();
    assert!(record.schema().name.ends_with("::MyFeatures"));
}
