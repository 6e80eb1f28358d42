//! End-to-end branch workflows: fork, edit both sides, merge back.

use lore_sdk::{
    BranchRecord, ConflictKind, EntityKey, EntityType, Lore, MergeAction, MergeResolutions,
    Payload, Resolution, Resolutions, SdkError, WorldTime,
};
use lore_types::{payload_from_value, CampaignId};
use serde_json::{json, Value};

fn p(value: Value) -> Payload {
    payload_from_value(value).unwrap()
}

fn t(ticks: i64) -> WorldTime {
    WorldTime::from_ticks(ticks)
}

struct Campaign {
    lore: Lore,
    main: BranchRecord,
    alt: BranchRecord,
    fort: EntityKey,
}

/// A settlement created on `main` at t0, and `alt` forked from `main` at t100.
fn campaign() -> Campaign {
    let lore = Lore::in_memory();
    let campaign = CampaignId::new();
    let main = lore.branches().create_root(campaign, "main", "gm").unwrap();
    let fort = lore
        .entities()
        .create(
            EntityType::Settlement,
            p(json!({"name": "Fort", "level": 1, "garrison": 10})),
            &main.id,
            t(0),
            "gm",
        )
        .unwrap()
        .key();
    let alt = lore
        .branches()
        .fork(campaign, &main.id, "alt", t(100), "gm")
        .unwrap();
    Campaign {
        lore,
        main,
        alt,
        fort,
    }
}

#[test]
fn child_sees_parent_only_up_to_fork() {
    let c = campaign();
    let entities = c.lore.entities();
    entities
        .update(&c.fort, p(json!({"level": 5})), 1, &c.main.id, t(150), "gm")
        .unwrap();

    let on_alt = entities.get_as_of(&c.fort, &c.alt.id, t(200)).unwrap().unwrap();
    assert_eq!(on_alt["level"], json!(1));
    let on_main = entities.get_as_of(&c.fort, &c.main.id, t(200)).unwrap().unwrap();
    assert_eq!(on_main["level"], json!(5));
}

#[test]
fn independent_edits_merge_cleanly() {
    let c = campaign();
    let entities = c.lore.entities();
    entities
        .update(&c.fort, p(json!({"level": 2})), 1, &c.alt.id, t(110), "alice")
        .unwrap();
    entities
        .update(&c.fort, p(json!({"garrison": 20})), 2, &c.main.id, t(120), "bob")
        .unwrap();

    let merges = c.lore.merges();
    let preview = merges.preview(&c.alt.id, &c.main.id, t(200)).unwrap();
    assert_eq!(preview.ancestor, c.main.id);
    assert_eq!(preview.base_time, t(100));
    assert!(!preview.has_conflicts());
    let expected = p(json!({"name": "Fort", "level": 2, "garrison": 20}));
    assert_eq!(preview.entities[0].action, MergeAction::Write(expected.clone()));

    let report = merges
        .execute(&c.alt.id, &c.main.id, t(200), &MergeResolutions::new(), "gm")
        .unwrap();
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.written[0].version, 4);
    assert_eq!(
        entities.get_as_of(&c.fort, &c.main.id, t(200)).unwrap(),
        Some(expected)
    );
    // The past on main is untouched.
    assert_eq!(
        entities.get_as_of(&c.fort, &c.main.id, t(130)).unwrap().unwrap()["level"],
        json!(1)
    );
}

#[test]
fn merge_with_nothing_changed_writes_nothing() {
    let c = campaign();
    let report = c
        .lore
        .merges()
        .execute(&c.alt.id, &c.main.id, t(200), &MergeResolutions::new(), "gm")
        .unwrap();
    assert!(report.written.is_empty());
    assert_eq!(report.unchanged, 1);
}

#[test]
fn divergent_edits_block_until_resolved() {
    let c = campaign();
    let entities = c.lore.entities();
    entities
        .update(&c.fort, p(json!({"name": "Fort Ash"})), 1, &c.alt.id, t(110), "alice")
        .unwrap();
    entities
        .update(&c.fort, p(json!({"name": "Fort Oak"})), 2, &c.main.id, t(120), "bob")
        .unwrap();

    let merges = c.lore.merges();
    let preview = merges.preview(&c.alt.id, &c.main.id, t(200)).unwrap();
    assert_eq!(preview.conflict_count(), 1);
    let (key, conflict) = preview.conflicts().next().unwrap();
    assert_eq!(key, &c.fort);
    assert_eq!(conflict.path, "name");
    assert_eq!(conflict.base_value, Some(json!("Fort")));
    assert_eq!(conflict.source_value, Some(json!("Fort Ash")));
    assert_eq!(conflict.target_value, Some(json!("Fort Oak")));

    let err = merges
        .execute(&c.alt.id, &c.main.id, t(200), &MergeResolutions::new(), "gm")
        .unwrap_err();
    match err {
        SdkError::UnresolvedConflicts { count, entities } => {
            assert_eq!(count, 1);
            assert_eq!(entities, vec![c.fort.clone()]);
        }
        other => panic!("expected UnresolvedConflicts, got {other:?}"),
    }
    assert_eq!(entities.history(&c.fort, &c.main.id).unwrap().len(), 2);

    let resolutions = MergeResolutions::from([(
        c.fort.clone(),
        Resolutions::from([("name".to_string(), Resolution::Value(json!("Fort Ashoak")))]),
    )]);
    merges
        .execute(&c.alt.id, &c.main.id, t(200), &resolutions, "gm")
        .unwrap();
    assert_eq!(
        entities.get_as_of(&c.fort, &c.main.id, t(200)).unwrap().unwrap()["name"],
        json!("Fort Ashoak")
    );
}

#[test]
fn deletion_on_source_against_unchanged_target_deletes() {
    let c = campaign();
    let entities = c.lore.entities();
    entities.delete(&c.fort, 1, &c.alt.id, t(110), "alice").unwrap();

    let report = c
        .lore
        .merges()
        .execute(&c.alt.id, &c.main.id, t(200), &MergeResolutions::new(), "gm")
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(entities.get_live_as_of(&c.fort, &c.main.id, t(200)).unwrap(), None);
    let tombstone = entities.get_as_of(&c.fort, &c.main.id, t(200)).unwrap().unwrap();
    assert_eq!(tombstone["deletedAt"], json!(200));
}

#[test]
fn deletion_against_modification_is_an_entity_conflict() {
    let c = campaign();
    let entities = c.lore.entities();
    entities.delete(&c.fort, 1, &c.alt.id, t(110), "alice").unwrap();
    entities
        .update(&c.fort, p(json!({"level": 3})), 2, &c.main.id, t(120), "bob")
        .unwrap();

    let merges = c.lore.merges();
    let preview = merges.preview(&c.alt.id, &c.main.id, t(200)).unwrap();
    let (_, conflict) = preview.conflicts().next().unwrap();
    assert_eq!(conflict.kind, ConflictKind::DeletedModified);
    assert!(conflict.path.is_empty());

    let keep_target = MergeResolutions::from([(
        c.fort.clone(),
        Resolutions::from([(String::new(), Resolution::Target)]),
    )]);
    let report = merges
        .execute(&c.alt.id, &c.main.id, t(200), &keep_target, "gm")
        .unwrap();
    assert!(report.written.is_empty());
    assert_eq!(report.unchanged, 1);
}

#[test]
fn entity_created_on_source_is_copied() {
    let c = campaign();
    let entities = c.lore.entities();
    let scout = entities
        .create(EntityType::Character, p(json!({"name": "Scout"})), &c.alt.id, t(105), "alice")
        .unwrap()
        .key();

    c.lore
        .merges()
        .execute(&c.alt.id, &c.main.id, t(200), &MergeResolutions::new(), "gm")
        .unwrap();
    assert_eq!(
        entities.get_as_of(&scout, &c.main.id, t(200)).unwrap(),
        Some(p(json!({"name": "Scout"})))
    );
    assert_eq!(entities.get_as_of(&scout, &c.main.id, t(199)).unwrap(), None);
}

#[test]
fn excluded_fields_keep_target_value() {
    let c = campaign();
    let entities = c.lore.entities();
    entities
        .update(&c.fort, p(json!({"id": "alt-copy", "level": 2})), 1, &c.alt.id, t(110), "alice")
        .unwrap();
    entities
        .update(&c.fort, p(json!({"id": "main-copy"})), 2, &c.main.id, t(120), "bob")
        .unwrap();

    let preview = c.lore.merges().preview(&c.alt.id, &c.main.id, t(200)).unwrap();
    assert!(!preview.has_conflicts());
    assert_eq!(
        preview.entities[0].action,
        MergeAction::Write(p(json!({"id": "main-copy", "name": "Fort", "level": 2, "garrison": 10})))
    );
}

#[test]
fn merging_a_branch_into_itself_is_rejected() {
    let c = campaign();
    let err = c.lore.merges().preview(&c.main.id, &c.main.id, t(0)).unwrap_err();
    assert!(matches!(err, SdkError::InvalidOperation(_)));
}
