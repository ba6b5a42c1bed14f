use anyhow::Result;
use litemodel::{Database, Error, FieldDef, Model, StorageType, Value};

fn test_db() -> Database {
    let _ = env_logger::builder().is_test(true).try_init();
    Database::connect_in_memory().expect("in-memory database")
}

fn declare_person(db: &Database) -> Model {
    Model::declare("person")
        .field(FieldDef::typed("firstname", StorageType::Text))
        .field(FieldDef::typed("lastname", StorageType::Text))
        .field(FieldDef::typed("age", StorageType::Integer))
        .build(db)
        .expect("person model")
}

fn declare_player(db: &Database, person: &Model) -> Model {
    Model::declare("player")
        .field(FieldDef::reference("person", person))
        .field(FieldDef::typed("number", StorageType::Integer))
        .field(FieldDef::typed("position", StorageType::Text))
        .build(db)
        .expect("player model")
}

#[test]
fn reference_round_trips_to_a_live_record() -> Result<()> {
    let db = test_db();
    let person = declare_person(&db);
    let player = declare_player(&db, &person);

    let mut chris = person.record_with([
        ("firstname", "Chris".into()),
        ("lastname", "Taylor".into()),
        ("age", 27.into()),
    ])?;
    person.create(&db, &mut chris)?;

    let mut shortstop = player.record_with([
        ("person", chris.clone().into()),
        ("number", 3.into()),
        ("position", "SS".into()),
    ])?;
    player.create(&db, &mut shortstop)?;

    let fetched = player.get_by_key(&db, shortstop.key().unwrap())?.unwrap();
    let Some(Value::Record(linked)) = fetched.get("person") else {
        panic!("reference did not resolve to a record");
    };
    assert_eq!(**linked, chris);
    assert_eq!(fetched.get("number"), Some(&Value::from(3)));
    Ok(())
}

#[test]
fn reference_column_carries_internal_suffix() {
    let db = test_db();
    let person = declare_person(&db);
    let player = declare_player(&db, &person);

    let column = player
        .schema()
        .columns()
        .iter()
        .find(|c| c.field == "person")
        .expect("reference column");
    // The engine-side name is suffixed; the exposed field name is not.
    assert_eq!(column.name, "person_idx");
    assert_eq!(column.storage, StorageType::Reference("person"));
}

#[test]
fn null_reference_persists_and_resolves_to_null() -> Result<()> {
    let db = test_db();
    let person = declare_person(&db);
    let player = declare_player(&db, &person);

    let mut free_agent =
        player.record_with([("number", 22.into()), ("position", "P".into())])?;
    player.create(&db, &mut free_agent)?;

    let fetched = player.get_by_key(&db, free_agent.key().unwrap())?.unwrap();
    assert_eq!(fetched.get("person"), Some(&Value::Null));
    Ok(())
}

#[test]
fn unsaved_reference_is_rejected() -> Result<()> {
    let db = test_db();
    let person = declare_person(&db);
    let player = declare_player(&db, &person);

    let never_created = person.record();
    let mut record = player.record_with([("person", never_created.into())])?;
    let err = player.create(&db, &mut record).unwrap_err();
    assert!(matches!(err, Error::UnpersistedRecord(..)));
    Ok(())
}

#[test]
fn dangling_reference_resolves_to_null() -> Result<()> {
    let db = test_db();
    let person = declare_person(&db);
    let player = declare_player(&db, &person);

    let mut chris = person.record();
    person.create(&db, &mut chris)?;
    let mut record = player.record_with([("person", chris.clone().into())])?;
    player.create(&db, &mut record)?;

    person.delete(&db, &chris)?;
    let fetched = player.get_by_key(&db, record.key().unwrap())?.unwrap();
    assert_eq!(fetched.get("person"), Some(&Value::Null));
    Ok(())
}

#[test]
fn rebuilding_models_keeps_references_working() -> Result<()> {
    let db = test_db();
    let person = declare_person(&db);
    let player = declare_player(&db, &person);

    let mut chris = person.record();
    person.create(&db, &mut chris)?;
    let mut record = player.record_with([("person", chris.clone().into())])?;
    player.create(&db, &mut record)?;

    // A second derivation must not replace the registered resolver.
    let rebuilt = declare_player(&db, &declare_person(&db));
    let fetched = rebuilt.get_by_key(&db, record.key().unwrap())?.unwrap();
    let Some(Value::Record(linked)) = fetched.get("person") else {
        panic!("reference did not resolve after rebuild");
    };
    assert_eq!(**linked, chris);
    Ok(())
}
