//! Integration tests for the transformation engine
//!
//! Records are declared with `#[derive(Record)]` and run through the public
//! `Transformer` API, covering traversal, dispatch and error aggregation.


use chrono::{DateTime, NaiveDate, Utc};
use fieldform_core::{Error, FieldLevel, Kind, Record, Reflect, Result, Transformer, Value};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use test_support::{builder, init_tracing, messy_user};

#[test]
fn test_user_graph_is_normalized() {
    init_tracing();
    let mut user = messy_user();

    Transformer::new().transform(&mut user).unwrap();

    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.name, "Ada Lovelace");
    assert_eq!(user.addresses[0].city, "LONDON");
    assert_eq!(user.addresses[0].zip.as_deref(), Some("N1"));
    assert_eq!(user.addresses[1].city, "PARIS");
    assert_eq!(user.addresses[1].zip, None);
    assert_eq!(user.tags, vec!["math".to_string(), "poetry".to_string()]);
    assert_eq!(user.labels["env"], "prod");
    assert_eq!(user.labels["team"], "core");
    assert_eq!(user.internal, "  untouched  ");
}

#[test]
fn test_transform_is_idempotent_for_builtins() {
    let transformer = Transformer::new();
    let mut user = messy_user();
    transformer.transform(&mut user).unwrap();
    let once = user.clone();

    transformer.transform(&mut user).unwrap();
    assert_eq!(user, once);
}

#[derive(Record, Debug, Clone, PartialEq)]
struct Plain {
    name: String,
    scores: Vec<u32>,
    nickname: Option<String>,
    nested: Option<Box<Plain>>,
}

#[test]
fn test_record_without_directives_is_untouched() {
    let mut plain = Plain {
        name: "  keep me ".to_string(),
        scores: vec![3, 1, 2],
        nickname: Some(" nick ".to_string()),
        nested: Some(Box::new(Plain {
            name: " inner ".to_string(),
            scores: Vec::new(),
            nickname: None,
            nested: None,
        })),
    };
    let before = plain.clone();

    Transformer::new().transform(&mut plain).unwrap();
    assert_eq!(plain, before);
}

#[derive(Record)]
struct TrimThenPad {
    #[transform("trim,pad")]
    value: String,
}

#[derive(Record)]
struct PadThenTrim {
    #[transform("pad,trim")]
    value: String,
}

#[test]
fn test_chain_order_is_declaration_order() {
    let transformer = builder().build().unwrap();

    let mut first = TrimThenPad {
        value: "  abc".to_string(),
    };
    transformer.transform(&mut first).unwrap();
    assert_eq!(first.value, " abc ");

    let mut second = PadThenTrim {
        value: "  abc".to_string(),
    };
    transformer.transform(&mut second).unwrap();
    assert_eq!(second.value, "abc");
}

#[derive(Record, Serialize)]
struct Deep {
    #[transform("spy")]
    z: String,
}

#[derive(Record)]
struct Middle {
    #[transform("spy", rename = "why")]
    y: String,
    deep: Deep,
}

#[derive(Record)]
struct Outer {
    #[transform("spy")]
    a: String,
    inner: Middle,
    list: Vec<Deep>,
    #[transform("spy")]
    b: String,
}

fn deep(z: &str) -> Deep {
    Deep { z: z.to_string() }
}

#[test]
fn test_namespaces_track_position_and_resolve_back() {
    let seen: Arc<Mutex<Vec<(String, String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let transformer = Transformer::builder()
        .directive("spy", move |fl: &mut FieldLevel<'_>| {
            let resolved = fl.lookup(fl.struct_namespace())?;
            sink.lock().push((
                fl.namespace().to_string(),
                fl.struct_namespace().to_string(),
                resolved.found && resolved.scalar().as_ref() == Some(fl.value()),
            ));
            Ok(true)
        })
        .build()
        .unwrap();

    let mut outer = Outer {
        a: "a".to_string(),
        inner: Middle {
            y: "y".to_string(),
            deep: deep("z"),
        },
        list: vec![deep("l0"), deep("l1")],
        b: "b".to_string(),
    };
    transformer.transform(&mut outer).unwrap();

    let entry = |display: &str, structural: &str| (display.to_string(), structural.to_string(), true);
    assert_eq!(
        *seen.lock(),
        vec![
            entry("a", "a"),
            entry("inner.why", "inner.y"),
            entry("inner.deep.z", "inner.deep.z"),
            entry("list[0].z", "list[0].z"),
            entry("list[1].z", "list[1].z"),
            entry("b", "b"),
        ]
    );
}

#[derive(Record)]
struct Labelled {
    #[transform("dive,roundtrip")]
    labels: BTreeMap<String, String>,
}

#[test]
fn test_map_keys_with_brackets_resolve_back() {
    let transformer = Transformer::builder()
        .directive("roundtrip", |fl: &mut FieldLevel<'_>| {
            let resolved = fl.lookup(fl.struct_namespace())?;
            Ok(resolved.found && resolved.scalar().as_ref() == Some(fl.value()))
        })
        .build()
        .unwrap();

    let mut labelled = Labelled {
        labels: [("a]b", "v1"), (r"c\d", "v2"), ("plain", "v3")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    };
    transformer.transform(&mut labelled).unwrap();
}

#[derive(Record)]
struct C {
    c: String,
}

#[derive(Record)]
struct B {
    b: Vec<C>,
}

#[derive(Record)]
struct A {
    a: B,
}

fn graph(len: usize) -> A {
    A {
        a: B {
            b: (0..len).map(|i| C { c: format!("c{}", i) }).collect(),
        },
    }
}

#[test]
fn test_resolver_finds_nested_element_field() {
    let transformer = Transformer::new();

    let root = graph(3);
    let res = transformer.resolve(&root, "a.b[2].c").unwrap();
    assert!(res.found);
    assert_eq!(res.kind, Kind::String);
    assert_eq!(res.scalar(), Some(Value::from("c2")));
    assert_eq!(res.downcast_ref::<String>().map(String::as_str), Some("c2"));

    let short = graph(1);
    let res = transformer.resolve(&short, "a.b[2].c").unwrap();
    assert!(!res.found);
    assert_eq!(res.scalar(), None);

    assert!(!transformer.resolve(&short, "a.missing").unwrap().found);
    assert!(!transformer.resolve(&short, "a.b[x].c").unwrap().found);
}

#[test]
fn test_resolver_rejects_mismatched_shape() {
    let root = graph(3);

    let err = Transformer::new().resolve(&root, "a.b.c").err().unwrap();
    assert!(matches!(err, Error::InvalidNamespace { .. }));
    assert!(err.is_configuration_error());

    let err = Transformer::new().resolve(&root, "a.b[0].c.d").err().unwrap();
    assert!(matches!(err, Error::InvalidNamespace { kind: Kind::String, .. }));
}

#[derive(Record)]
struct Tagged {
    #[transform("trim,bogus")]
    name: String,
    #[transform("trim")]
    later: String,
}

#[test]
fn test_unknown_directive_is_fatal_without_field_errors() {
    let mut tagged = Tagged {
        name: "  x  ".to_string(),
        later: "  y  ".to_string(),
    };

    let err = Transformer::new().transform(&mut tagged).unwrap_err();
    assert!(matches!(err, Error::UnknownDirective { ref directive, .. } if directive == "bogus"));
    assert!(err.is_configuration_error());
    assert!(err.field_errors().is_none());

    // Directives already applied stay applied; later fields are not visited.
    assert_eq!(tagged.name, "x");
    assert_eq!(tagged.later, "  y  ");
}

#[derive(Record)]
struct Pair {
    #[transform("nonempty")]
    first: String,
    #[transform("trim,nonempty,uppercase")]
    second: String,
    #[transform("trim,nonempty")]
    third: String,
}

fn failing_pair() -> Pair {
    Pair {
        first: String::new(),
        second: "   ".to_string(),
        third: " ok ".to_string(),
    }
}

#[test]
fn test_field_errors_are_collected_in_order() {
    let transformer = builder().build().unwrap();
    let mut pair = failing_pair();

    let err = transformer.transform(&mut pair).unwrap_err();
    assert!(err.is_data_error());

    let errors = err.field_errors().unwrap();
    assert_eq!(errors.len(), 2);
    let namespaces: Vec<&str> = errors.iter().map(|e| e.struct_namespace()).collect();
    assert_eq!(namespaces, vec!["first", "second"]);
    assert!(errors.iter().all(|e| e.tag() == "nonempty"));

    let rendered = err.to_string();
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("first") && lines[0].contains("nonempty"));
    assert!(lines[1].contains("second") && lines[1].contains("\"\""));

    // The failing chain stopped before `uppercase`; the rest of the record ran.
    assert_eq!(pair.second, "");
    assert_eq!(pair.third, "ok");
}

#[test]
fn test_pooled_context_does_not_leak_between_calls() {
    let transformer = builder().build().unwrap();

    let mut pair = failing_pair();
    let first = transformer.transform(&mut pair).unwrap_err();
    assert_eq!(first.field_errors().unwrap().len(), 2);

    let mut fine = Pair {
        first: "a".to_string(),
        second: "b".to_string(),
        third: "c".to_string(),
    };
    transformer.transform(&mut fine).unwrap();

    let mut pair = failing_pair();
    let third = transformer.transform(&mut pair).unwrap_err();
    assert_eq!(third.field_errors().unwrap().len(), 2);

    assert_eq!(transformer.pool().created_count(), 1);
    assert_eq!(transformer.pool().idle_count(), 1);
}

#[derive(Record, Default)]
struct Optionals {
    #[transform("trim")]
    a: Option<String>,
    #[transform("ltrim")]
    b: Option<String>,
    #[transform("rtrim")]
    c: Option<String>,
    #[transform("lowercase")]
    d: Option<String>,
    #[transform("uppercase")]
    e: Option<String>,
    #[transform("nonempty")]
    f: Option<Option<String>>,
}

#[test]
fn test_empty_optionals_are_skipped() {
    let transformer = builder().build().unwrap();
    let mut optionals = Optionals::default();

    transformer.transform(&mut optionals).unwrap();
    assert!(optionals.a.is_none() && optionals.b.is_none() && optionals.c.is_none());
    assert!(optionals.d.is_none() && optionals.e.is_none() && optionals.f.is_none());

    optionals.f = Some(None);
    transformer.transform(&mut optionals).unwrap();
    assert_eq!(optionals.f, Some(None));

    optionals.b = Some("  left  ".to_string());
    optionals.e = Some("up".to_string());
    transformer.transform(&mut optionals).unwrap();
    assert_eq!(optionals.b.as_deref(), Some("left  "));
    assert_eq!(optionals.e.as_deref(), Some("UP"));
}

#[derive(Record)]
struct Profile {
    #[transform("nonempty", rename = "displayName")]
    name: String,
    #[transform("required")]
    handle: String,
}

#[test]
fn test_field_error_carries_names_and_aliases() {
    let transformer = builder().alias("required", "trim,nonempty").build().unwrap();

    let mut profile = Profile {
        name: String::new(),
        handle: "   ".to_string(),
    };
    let err = transformer.transform(&mut profile).unwrap_err();
    let errors = err.field_errors().unwrap().as_slice();

    assert_eq!(errors[0].namespace(), "displayName");
    assert_eq!(errors[0].struct_namespace(), "name");
    assert_eq!(errors[0].field(), "displayName");
    assert_eq!(errors[0].struct_field(), "name");
    assert_eq!(errors[0].kind(), Kind::String);
    assert_eq!(errors[0].value(), &Value::from(""));
    assert_eq!(errors[0].param(), "");

    assert_eq!(errors[1].tag(), "required");
    assert_eq!(errors[1].actual_tag(), "nonempty");

    let mut profile = Profile {
        name: "ada".to_string(),
        handle: "  @ada ".to_string(),
    };
    transformer.transform(&mut profile).unwrap();
    assert_eq!(profile.handle, "@ada");
}

#[derive(Record, Serialize)]
struct Hinted {
    #[serde(skip)]
    skipped: String,
    #[serde(skip)]
    #[transform("trim")]
    explicit: String,
    #[transform("-")]
    dashed: Deep,
    #[transform(skip)]
    flagged: String,
    #[transform(readonly)]
    frozen: String,
}

#[test]
fn test_skip_omit_and_readonly_hints() {
    let mut hinted = Hinted {
        skipped: " a ".to_string(),
        explicit: " b ".to_string(),
        dashed: deep(" c "),
        flagged: " d ".to_string(),
        frozen: " e ".to_string(),
    };

    // `spy` is unregistered, so visiting `dashed.z` would be fatal.
    Transformer::new().transform(&mut hinted).unwrap();

    assert_eq!(hinted.skipped, " a ");
    assert_eq!(hinted.explicit, "b");
    assert_eq!(hinted.dashed.z, " c ");
    assert_eq!(hinted.flagged, " d ");
    assert_eq!(hinted.frozen, " e ");
}

#[derive(Record)]
struct ReadonlyWithTag {
    #[transform("trim", readonly)]
    id: String,
}

#[derive(Record)]
struct StaticStr {
    #[transform("trim")]
    label: &'static str,
}

#[test]
fn test_directive_on_unsettable_field_is_an_error() {
    let mut record = ReadonlyWithTag {
        id: " 1 ".to_string(),
    };
    let err = Transformer::new().transform(&mut record).unwrap_err();
    assert!(matches!(err, Error::NotSettable { ref namespace, .. } if namespace == "id"));

    let mut record = StaticStr { label: " x " };
    let err = Transformer::new().transform(&mut record).unwrap_err();
    assert!(matches!(err, Error::NotSettable { .. }));
    assert!(err.is_configuration_error());
}

#[derive(Record)]
struct OnRecord {
    #[transform("trim")]
    deep: Deep,
}

#[derive(Record)]
struct OnSequence {
    #[transform("trim")]
    tags: Vec<String>,
}

#[derive(Record)]
struct DiveOnScalar {
    #[transform("dive,trim")]
    name: String,
}

#[test]
fn test_directives_on_containers_are_rejected() {
    let transformer = Transformer::new();

    let err = transformer.transform(&mut OnRecord { deep: deep("z") }).unwrap_err();
    assert!(matches!(err, Error::UnsupportedTarget { kind: Kind::Record, .. }));

    let err = transformer
        .transform(&mut OnSequence { tags: Vec::new() })
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedTarget { kind: Kind::Sequence, .. }));

    let err = transformer
        .transform(&mut DiveOnScalar { name: String::new() })
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedTarget { ref directive, .. } if directive == "dive"));
}

#[derive(Record)]
struct Containers {
    #[transform("dive,dive,trim")]
    rows: Vec<Vec<String>>,
    #[transform("dive,trim")]
    maybe: Vec<Option<String>>,
    #[transform("dive,uppercase")]
    codes: HashMap<u32, String>,
    #[transform("dive,nonempty")]
    notes: BTreeMap<String, String>,
    #[transform("dive,lowercase")]
    fixed: [String; 2],
}

#[test]
fn test_dive_reaches_nested_elements() {
    let transformer = builder().build().unwrap();

    let mut codes = HashMap::new();
    codes.insert(7, "seven".to_string());
    codes.insert(3, "three".to_string());
    let mut notes = BTreeMap::new();
    notes.insert("a".to_string(), "x".to_string());
    notes.insert("b".to_string(), String::new());

    let mut containers = Containers {
        rows: vec![vec![" 1 ".to_string(), "2 ".to_string()], vec![" 3".to_string()]],
        maybe: vec![Some(" m ".to_string()), None],
        codes,
        notes,
        fixed: ["ONE".to_string(), "Two".to_string()],
    };

    let err = transformer.transform(&mut containers).unwrap_err();
    let errors = err.field_errors().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.as_slice()[0].struct_namespace(), "notes[b]");
    assert_eq!(errors.as_slice()[0].field(), "notes[b]");

    assert_eq!(containers.rows, vec![vec!["1".to_string(), "2".to_string()], vec!["3".to_string()]]);
    assert_eq!(containers.maybe, vec![Some("m".to_string()), None]);
    assert_eq!(containers.codes[&3], "THREE");
    assert_eq!(containers.codes[&7], "SEVEN");
    assert_eq!(containers.fixed, ["one".to_string(), "two".to_string()]);
}

#[derive(Record)]
struct Envelope {
    #[transform("trim")]
    payload: Box<dyn Reflect>,
    #[transform("uppercase")]
    boxed: Box<String>,
    nested: Option<Box<Address>>,
}

#[derive(Record)]
struct Address {
    #[transform("trim")]
    city: String,
}

#[test]
fn test_boxes_and_dynamic_values_are_unwrapped() {
    let mut envelope = Envelope {
        payload: Box::new(" dyn ".to_string()),
        boxed: Box::new("shout".to_string()),
        nested: Some(Box::new(Address {
            city: " oslo ".to_string(),
        })),
    };

    Transformer::new().transform(&mut envelope).unwrap();

    assert_eq!(envelope.payload.downcast_ref::<String>().map(String::as_str), Some("dyn"));
    assert_eq!(*envelope.boxed, "SHOUT");
    assert_eq!(envelope.nested.as_ref().map(|a| a.city.as_str()), Some("oslo"));
}

#[derive(Record)]
struct Passwords {
    #[transform("trim")]
    password: String,
    #[transform("trim,eqfield=password")]
    confirm: String,
}

#[test]
fn test_cross_field_directive_sees_earlier_rewrites() {
    let transformer = builder().build().unwrap();

    let mut ok = Passwords {
        password: " secret".to_string(),
        confirm: "secret ".to_string(),
    };
    transformer.transform(&mut ok).unwrap();

    let mut mismatch = Passwords {
        password: "secret".to_string(),
        confirm: "other".to_string(),
    };
    let err = transformer.transform(&mut mismatch).unwrap_err();
    let errors = err.field_errors().unwrap().as_slice();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].struct_namespace(), "confirm");
    assert_eq!(errors[0].tag(), "eqfield");
    assert_eq!(errors[0].param(), "password");
    assert!(err.to_string().contains("(param 'password')"));
}

#[derive(Record)]
struct BadPath {
    password: String,
    #[transform("eqfield=password.length")]
    confirm: String,
}

#[test]
fn test_cross_field_structural_error_is_fatal() {
    let transformer = builder().build().unwrap();
    let mut bad = BadPath {
        password: "a".to_string(),
        confirm: "a".to_string(),
    };

    let err = transformer.transform(&mut bad).unwrap_err();
    assert!(matches!(err, Error::InvalidNamespace { .. }));
    assert!(err.field_errors().is_none());
}

fn next_day(fl: &mut FieldLevel<'_>) -> Result<bool> {
    let Some(day) = fl.as_str().and_then(|s| s.parse::<NaiveDate>().ok()) else {
        return Ok(false);
    };
    match day.succ_opt() {
        Some(next) => {
            fl.set_value(next.to_string());
            Ok(true)
        }
        None => Ok(false),
    }
}

#[derive(Record)]
struct Event {
    #[transform("next_day")]
    on: NaiveDate,
    #[transform("trim")]
    at: Option<DateTime<Utc>>,
    #[transform("double")]
    seats: u8,
}

fn double(fl: &mut FieldLevel<'_>) -> Result<bool> {
    let Some(n) = fl.value().as_u64() else {
        return Ok(false);
    };
    fl.set_value(n * 2);
    Ok(true)
}

#[test]
fn test_temporal_and_numeric_leaves() {
    let transformer = Transformer::builder()
        .directive("next_day", next_day)
        .directive("double", double)
        .build()
        .unwrap();

    let at = "2025-03-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
    let mut event = Event {
        on: NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
        at: Some(at),
        seats: 21,
    };
    transformer.transform(&mut event).unwrap();

    assert_eq!(event.on, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    assert_eq!(event.at, Some(at));
    assert_eq!(event.seats, 42);

    // 200 doubled does not fit in a u8
    event.seats = 200;
    let err = transformer.transform(&mut event).unwrap_err();
    assert!(matches!(err, Error::Value { ref namespace, .. } if namespace == "seats"));
    assert_eq!(event.seats, 200);
}

#[derive(Record)]
struct Code(#[transform("trim,uppercase")] String, u32);

#[derive(Record)]
struct Wrapper<T> {
    #[transform("dive,trim")]
    items: Vec<T>,
}

#[test]
fn test_tuple_and_generic_records() {
    let mut code = Code(" ab-1 ".to_string(), 7);
    Transformer::new().transform(&mut code).unwrap();
    assert_eq!(code.0, "AB-1");
    assert_eq!(code.record_name(), "Code");
    assert_eq!(code.field_infos()[0].name, "0");

    let mut wrapper = Wrapper {
        items: vec![" x ".to_string()],
    };
    Transformer::new().transform(&mut wrapper).unwrap();
    assert_eq!(wrapper.items, vec!["x".to_string()]);
}

#[test]
fn test_non_record_roots_are_rejected() {
    let transformer = Transformer::new();

    let mut empty: Option<Address> = None;
    let err = transformer.transform(&mut empty).unwrap_err();
    assert!(err.is_usage_error());
    assert!(err.to_string().contains("no value"));

    let mut wrapped = Some(Address {
        city: " rome ".to_string(),
    });
    transformer.transform(&mut wrapped).unwrap();
    assert_eq!(wrapped.map(|a| a.city), Some("rome".to_string()));
}

#[test]
fn test_transform_dyn_accepts_erased_records() {
    let mut records: Vec<Box<dyn Reflect>> = vec![
        Box::new(Address {
            city: " a ".to_string(),
        }),
        Box::new(deep(" b ")),
    ];

    let transformer = Transformer::builder().directive("spy", |_| Ok(true)).build().unwrap();
    for record in records.iter_mut() {
        transformer.transform_dyn(record.as_mut()).unwrap();
    }

    let address = records[0].downcast_ref::<Address>().unwrap();
    assert_eq!(address.city, "a");
    assert_eq!(records[1].downcast_ref::<Deep>().unwrap().z, " b ");
}
