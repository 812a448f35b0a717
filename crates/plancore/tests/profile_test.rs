use plancore::{profile_name, DataStorage, ProfileDictionary, ProfileError, Value, DEFAULT_PROFILE};

#[derive(Debug, PartialEq)]
struct Tuning {
    weight: f64,
}

#[test]
fn named_profile_resolves() {
    let mut dictionary = ProfileDictionary::new();
    dictionary.insert("plan", "heavy", Tuning { weight: 10.0 });
    dictionary.insert("plan", DEFAULT_PROFILE, Tuning { weight: 1.0 });

    let profile = dictionary.resolve::<Tuning>("plan", "heavy").unwrap();
    assert_eq!(profile.weight, 10.0);
}

#[test]
fn missing_name_falls_back_to_default() {
    let mut dictionary = ProfileDictionary::new();
    dictionary.insert("plan", DEFAULT_PROFILE, Tuning { weight: 1.0 });

    let profile = dictionary.resolve::<Tuning>("plan", "does-not-exist").unwrap();
    assert_eq!(profile.weight, 1.0);
}

#[test]
fn missing_name_and_default_is_not_found() {
    let mut dictionary = ProfileDictionary::new();
    dictionary.insert("solver", DEFAULT_PROFILE, Tuning { weight: 1.0 });

    let err = dictionary.resolve::<Tuning>("plan", "heavy").unwrap_err();
    match err {
        ProfileError::NotFound { kind, name } => {
            assert_eq!(kind, "plan");
            assert_eq!(name, "heavy");
        }
    }
}

#[test]
fn wrong_concrete_type_is_not_found() {
    let mut dictionary = ProfileDictionary::new();
    dictionary.insert("plan", "heavy", "not a tuning".to_string());

    assert!(dictionary.resolve::<Tuning>("plan", "heavy").is_err());
}

#[test]
fn names_lists_per_kind() {
    let mut dictionary = ProfileDictionary::new();
    dictionary.insert("plan", "b", Tuning { weight: 1.0 });
    dictionary.insert("plan", "a", Tuning { weight: 2.0 });
    dictionary.insert("solver", "c", Tuning { weight: 3.0 });

    assert_eq!(dictionary.names("plan"), vec!["a", "b"]);
    assert_eq!(dictionary.names("solver"), vec!["c"]);
    assert!(dictionary.names("composite").is_empty());
}

#[test]
fn profile_name_precedence() {
    assert_eq!(profile_name(Some("instruction"), Some("group")), "instruction");
    assert_eq!(profile_name(None, Some("group")), "group");
    assert_eq!(profile_name(None, None), DEFAULT_PROFILE);
}

#[tokio::test]
async fn storage_round_trips_values() {
    let storage = DataStorage::new();
    assert!(storage.is_empty().await);

    storage.put("flag", Value::Bool(true)).await;
    storage.put("count", Value::Number(3.0)).await;

    assert!(storage.has("flag").await);
    assert_eq!(storage.get("count").await, Some(Value::Number(3.0)));
    assert_eq!(storage.get("missing").await, None);
    assert_eq!(storage.len().await, 2);

    let mut keys = storage.keys().await;
    keys.sort();
    assert_eq!(keys, vec!["count", "flag"]);
}

#[tokio::test]
async fn storage_clones_share_contents() {
    let storage = DataStorage::new();
    let view = storage.clone();
    storage.put("shared", Value::from("value")).await;
    assert_eq!(view.get("shared").await, Some(Value::from("value")));
}
