//! Cache key derivation tests.
//!
//! Tests verify:
//! - Keys are stable across runs and construction order
//! - Type, adjacency and nesting never collide
//! - JSON-built and builder-built parameters key identically

use std::collections::HashSet;

use pixserve::cache::{KeyGenerator, Sha256KeyGenerator, Sha512KeyGenerator};
use pixserve::params::{Params, Value};

fn sha256(params: &Params) -> String {
    Sha256KeyGenerator::new().generate(params).to_hex()
}

#[test]
fn test_empty_params_fixed_digests() {
    assert_eq!(
        sha256(&Params::new()),
        "3bcdbc5784078a41af1628d5747b4275fca2f42bf1e55e12f4ded3d914466562"
    );
    assert_eq!(
        Sha512KeyGenerator::new().generate(&Params::new()).to_hex(),
        "3449849c02da898e5359c7f6b47f01fb7fdc6e00696f4e63b629fcd8f80fa60e\
         7a504b32f3dcf14748c09e95a12c4ef38046267c2bfb6a9f4eec1564c2d1c482"
    );
}

#[test]
fn test_construction_order_irrelevant() {
    let built = Params::new()
        .with("source", "a.png")
        .with("width", 100)
        .with("format", "jpeg");
    let collected: Params = vec![
        ("format", Value::from("jpeg")),
        ("source", Value::from("a.png")),
        ("width", Value::from(100)),
    ]
    .into_iter()
    .collect();

    assert_eq!(sha256(&built), sha256(&collected));
}

#[test]
fn test_json_and_builder_agree() {
    let json: serde_json::Value = serde_json::from_str(
        r#"{"source": "a.png", "crop": {"x": 1, "y": 2.5}, "tags": ["a", true]}"#,
    )
    .unwrap();
    let from_json = Params::try_from(json).unwrap();

    let built = Params::from([
        ("source", Value::from("a.png")),
        (
            "crop",
            Value::from(Params::from([("x", Value::from(1)), ("y", Value::from(2.5))])),
        ),
        ("tags", Value::from(vec![Value::from("a"), Value::from(true)])),
    ]);

    assert_eq!(sha256(&from_json), sha256(&built));
}

#[test]
fn test_ambiguous_pairs_are_distinct() {
    let pairs = [
        (
            Params::from([("width", Value::from("12"))]),
            Params::from([("width", Value::from(12))]),
        ),
        (
            Params::from([("scale", Value::from(1))]),
            Params::from([("scale", Value::from(1.0))]),
        ),
        (
            Params::from([("ab", "c")]),
            Params::from([("a", "bc")]),
        ),
        (
            Params::from([("a", Value::from(Params::from([("b", 1)])))]),
            Params::from([("a.b", 1)]),
        ),
        (
            Params::from([("l", Value::from(vec![Value::from(1), Value::from(2)]))]),
            Params::from([("l", Value::from(vec![Value::from(2), Value::from(1)]))]),
        ),
        (
            Params::from([("flag", true)]),
            Params::from([("flag", 1)]),
        ),
    ];

    for (a, b) in pairs.iter() {
        assert_ne!(sha256(a), sha256(b), "{} and {} collide", a, b);
    }
}

#[test]
fn test_signed_zero_and_nan_normalized() {
    assert_eq!(
        sha256(&Params::from([("x", 0.0)])),
        sha256(&Params::from([("x", -0.0)]))
    );
    assert_eq!(
        sha256(&Params::from([("x", f64::NAN)])),
        sha256(&Params::from([("x", -f64::NAN)]))
    );
}

#[test]
fn test_generated_corpus_has_no_collisions() {
    let keys = Sha256KeyGenerator::new();
    let mut seen = HashSet::new();
    let mut count = 0;

    let sources = ["a.png", "b.png", "a.pn", "ga.png"];
    let values = [
        Value::from(1),
        Value::from(1.0),
        Value::from("1"),
        Value::from(true),
        Value::from(vec![Value::from(1)]),
        Value::from(Params::from([("v", 1)])),
    ];

    for source in sources {
        for name in ["w", "h", "wh"] {
            for value in values.iter() {
                let params = Params::from([("source", Value::from(source)), (name, value.clone())]);
                seen.insert(keys.generate(&params));
                count += 1;
            }
        }
        seen.insert(keys.generate(&Params::from([("source", source)])));
        count += 1;
    }

    assert_eq!(seen.len(), count);
}

#[test]
fn test_single_field_sweep_has_no_collisions() {
    let keys = Sha256KeyGenerator::new();
    let base = Params::from([("source", "base.png")]);

    let mut corpus = vec![base.clone()];
    for width in -1000..=1000i64 {
        corpus.push(base.with("width", width));
    }
    for step in 0..1000i64 {
        corpus.push(base.with("ratio", step as f64 * 0.5));
    }
    for step in 0..500i64 {
        corpus.push(base.with("crop", Params::from([("x", step)])));
    }
    for len in 0..500 {
        corpus.push(Params::from([("source", "a".repeat(len))]));
    }
    for index in 0..1000 {
        corpus.push(Params::from([("source", format!("x{}.png", index))]));
    }
    for len in 1..200 {
        corpus.push(base.with("k".repeat(len), 1));
    }

    let seen: HashSet<_> = corpus.iter().map(|params| keys.generate(params)).collect();
    assert!(corpus.len() > 4000);
    assert_eq!(seen.len(), corpus.len());
}
