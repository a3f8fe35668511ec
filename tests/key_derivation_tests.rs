//! Integration tests for cache key derivation
//!
//! These tests exercise the public key API end to end:
//! - Determinism across calls and tasks
//! - Policy isolation
//! - Cancellation truncation
//! - Sampling boundaries for lists and maps
//! - Known keys for the reference scenarios

use ouroboros_memo::key::{accumulate, digest, ArgValue, CacheSettings, ParameterMap};
use ouroboros_memo::{args, derive_key, derive_key_or_empty, KeyDerivationError, MethodSignature};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio_util::sync::CancellationToken;

fn default_text(arguments: &[ArgValue]) -> String {
    accumulate(
        "Reports",
        "Build",
        arguments,
        &CacheSettings::Default,
        &ParameterMap::default(),
    )
    .unwrap()
}

#[test]
fn test_reference_scenarios() {
    let params = ParameterMap::from_names(["id"]);

    let text = accumulate(
        "UserService",
        "GetById",
        &args![42],
        &CacheSettings::use_parameter("id"),
        &params,
    )
    .unwrap();
    assert_eq!(text, "UserServiceGetById42");
    assert_eq!(digest(&text), "i5LMmuu4DYnD+GY6aot2TunEXNE=");

    let key = derive_key(
        "UserService",
        "GetById",
        &args![42],
        &CacheSettings::IgnoreParameters,
        &params,
    )
    .unwrap();
    assert_eq!(key, "ixMddJSML5JvlJteXKqK+P714yc=");

    let sum = MethodSignature::builder("Calculator", "Sum")
        .param("x", "i32")
        .param("y", "i32")
        .returns::<i32>()
        .build();
    assert_eq!(sum.key_text(&args![2, 2]).unwrap(), "CalculatorSum0:2:2_1:2:2_");
    assert_eq!(sum.derive_key(&args![2, 2]).unwrap(), "Vqzg9UUtXN+Q8OKeTVkR+0LIDqs=");
}

#[test]
fn test_keys_are_fixed_width_base64() {
    let params = ParameterMap::from_names(["a", "b", "c"]);
    for arguments in [args![], args![1], args!["text", 2.5, true]] {
        let key = derive_key("T", "M", &arguments, &CacheSettings::Default, &params).unwrap();
        // 20-byte digest, padded
        assert_eq!(key.len(), 28);
        assert!(key.ends_with('='));
    }
}

#[test]
fn test_policy_isolation() {
    let params = ParameterMap::from_names(["id", "verbose"]);
    let by_id = CacheSettings::use_parameter("ID");

    let a = derive_key("Svc", "Get", &args![7, true], &by_id, &params).unwrap();
    let b = derive_key("Svc", "Get", &args![7, false], &by_id, &params).unwrap();
    let c = derive_key("Svc", "Get", &args![8, true], &by_id, &params).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);

    let ignore = CacheSettings::IgnoreParameters;
    let d = derive_key("Svc", "Get", &args![7, true], &ignore, &params).unwrap();
    let e = derive_key("Svc", "Get", &args![9, false], &ignore, &params).unwrap();
    assert_eq!(d, e);
    assert_eq!(d, digest("SvcGet"));
}

#[test]
fn test_identity_is_part_of_the_key() {
    let params = ParameterMap::from_names(["x"]);
    let a = derive_key("Calculator", "Sum", &args![1], &CacheSettings::Default, &params).unwrap();
    let b = derive_key("Calculator", "Product", &args![1], &CacheSettings::Default, &params).unwrap();
    let c = derive_key("Abacus", "Sum", &args![1], &CacheSettings::Default, &params).unwrap();
    assert_ne!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_cancellation_truncates() {
    let token = CancellationToken::new();
    let with_tail = default_text(&args![1, token.clone(), "tail", vec![1, 2]]);
    let without_tail = default_text(&args![1, token]);

    assert_eq!(with_tail, without_tail);
    assert_eq!(with_tail, "ReportsBuild0:1:1_");
}

#[test]
fn test_list_sampling_boundary() {
    let five = default_text(&args![vec![10, 20, 30, 40, 50]]);
    assert_eq!(five, "ReportsBuild0_10_20_30_40_50_");

    let six = default_text(&args![vec![10, 20, 30, 40, 50, 60]]);
    assert_eq!(six, "ReportsBuild0_10_");

    // 25 elements: ceil(25/10) = 3
    let many: Vec<i32> = (1..=25).collect();
    assert_eq!(default_text(&args![many]), "ReportsBuild0_1_2_3_");
}

#[test]
fn test_sampled_lists_collide_beyond_prefix() {
    let a: Vec<u32> = vec![1, 2, 3, 4, 5, 6, 7];
    let b: Vec<u32> = vec![1, 9, 9, 9, 9, 9, 9];
    assert_eq!(default_text(&args![a]), default_text(&args![b]));
}

#[test]
fn test_map_contribution() {
    let mut small = BTreeMap::new();
    small.insert("a".to_string(), 1);
    small.insert("b".to_string(), 2);
    assert_eq!(default_text(&args![small]), "ReportsBuild0_String_i32a:1b:2");

    let five: BTreeMap<u8, bool> = (0..5).map(|i| (i, i % 2 == 0)).collect();
    assert_eq!(
        default_text(&args![five]),
        "ReportsBuild0_u8_bool0:true1:false2:true3:false4:true"
    );

    let large: BTreeMap<u8, bool> = (0..6).map(|i| (i, i % 2 == 0)).collect();
    assert_eq!(default_text(&args![large]), "ReportsBuild0_u8_bool0:true");
}

#[test]
fn test_hash_collections_are_deterministic() {
    let first: HashMap<&str, i32> = [("z", 1), ("a", 2), ("m", 3)].into_iter().collect();
    let second: HashMap<&str, i32> = [("m", 3), ("z", 1), ("a", 2)].into_iter().collect();
    assert_eq!(default_text(&args![first]), default_text(&args![second]));

    let set: HashSet<i32> = [3, 1, 2].into_iter().collect();
    assert_eq!(default_text(&args![set]), "ReportsBuild0_1   2   3   ");
}

#[test]
fn test_text_null_and_opaque_arguments() {
    #[derive(Hash)]
    struct Filter {
        region: &'static str,
    }

    let filter = ArgValue::hashed(&Filter { region: "eu" });
    let text = default_text(&[ArgValue::text("Q3"), ArgValue::Null, filter.clone()]);

    let ArgValue::Opaque(hash) = filter else {
        panic!("hashed value must be opaque");
    };
    assert_eq!(text, format!("ReportsBuild0:Q31:Null2:{}", hash));
    assert_eq!(ArgValue::hashed(&Filter { region: "eu" }), ArgValue::Opaque(hash));
}

#[test]
fn test_optional_arguments() {
    let none: Option<i32> = None;
    assert_eq!(default_text(&args![none, Some(5)]), "ReportsBuild0:Null1:5:5_");
}

#[test]
fn test_named_parameter_failures() {
    let params = ParameterMap::from_names(["userId"]);

    let err = derive_key(
        "UserService",
        "GetById",
        &args![1],
        &CacheSettings::use_id(),
        &params,
    )
    .unwrap_err();
    assert!(matches!(err, KeyDerivationError::UnknownParameter { .. }));

    let err = derive_key(
        "UserService",
        "GetById",
        &args![],
        &CacheSettings::use_parameter("userid"),
        &params,
    )
    .unwrap_err();
    assert_eq!(
        err,
        KeyDerivationError::MissingArgument {
            index: 0,
            available: 0
        }
    );

    let fallback = derive_key_or_empty(
        "UserService",
        "GetById",
        &args![1],
        &CacheSettings::use_id(),
        &params,
    );
    assert_eq!(fallback, "");

    let clashing = ParameterMap::from_names(["id", "Id"]);
    let err = derive_key(
        "UserService",
        "GetById",
        &args![1, 2],
        &CacheSettings::use_id(),
        &clashing,
    )
    .unwrap_err();
    assert!(matches!(err, KeyDerivationError::AmbiguousParameter { .. }));
}

#[tokio::test]
async fn test_concurrent_derivations_do_not_interfere() {
    let handles: Vec<_> = (0..32)
        .map(|i: i64| {
            tokio::spawn(async move {
                let params = ParameterMap::from_names(["n", "label"]);
                let label = format!("item-{}", i);
                let key = derive_key(
                    "Worker",
                    "Run",
                    &args![i, label],
                    &CacheSettings::Default,
                    &params,
                )
                .unwrap();
                (i, key)
            })
        })
        .collect();

    for handle in handles {
        let (i, key) = handle.await.unwrap();
        let expected = digest(&format!("WorkerRun0:{}:{}_1:item-{}", i, i, i));
        assert_eq!(key, expected);
    }
}
