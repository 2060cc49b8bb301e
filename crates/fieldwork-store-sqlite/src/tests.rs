//! Integration tests for `SqliteStore` against in-memory and on-disk
//! databases.

use fieldwork_core::{
  Error as CoreError,
  metadata::{self, DataType, MetaDataChanges, MetaDataFields, MetaDataQuery},
  owner::{NewDataView, NewForm, Owner, OwnerKind},
  permission::Role,
  reference::{ReferenceResolver, ResolveError},
  store::{Store, StoreError},
  widget::{NewWidget, ViewType, WidgetChanges, WidgetQuery, WidgetType},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// A project owned by bob with one form and one dataview over that form.
struct Fixture {
  project:  Owner,
  form:     Owner,
  dataview: Owner,
}

async fn fixture(s: &SqliteStore) -> Fixture {
  let project = s
    .create_project("Transportation".into(), "bob".into())
    .await
    .unwrap();
  let form = s
    .create_form(NewForm {
      project_id: project.id,
      title:      "Transportation form".into(),
      id_string:  "transportation_2011_07_25".into(),
    })
    .await
    .unwrap();
  let dataview = s
    .create_dataview(NewDataView {
      form_id: form.id,
      name:    "Bicycles only".into(),
      columns: vec!["age".into(), "_submitted_time".into()],
    })
    .await
    .unwrap();

  Fixture {
    project:  Owner::from(&project),
    form:     Owner::from(&form),
    dataview: Owner::from(&dataview),
  }
}

async fn count_metadata(s: &SqliteStore, owner: Owner, data_type: DataType) -> usize {
  s.list_metadata(&MetaDataQuery {
    owner: Some(owner.key()),
    data_type: Some(data_type),
    visible_to: None,
  })
  .await
  .unwrap()
  .len()
}

async fn count_widgets(s: &SqliteStore, owner: Owner) -> usize {
  s.list_widgets(&WidgetQuery { owner: Some(owner.key()), visible_to: None })
    .await
    .unwrap()
    .len()
}

const ENKETO_URL: &str = "https://dmfrm.enketo.org/webform";

// ─── Directory ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn creating_a_project_grants_owner_role() {
  let s = store().await;
  let project = s.create_project("p".into(), "bob".into()).await.unwrap();

  assert_eq!(s.role_for(project.id, "bob".into()).await.unwrap(), Some(Role::Owner));
  assert_eq!(s.role_for(project.id, "alice".into()).await.unwrap(), None);

  let fetched = s.get_project(project.id).await.unwrap().unwrap();
  assert_eq!(fetched.name, "p");
  assert_eq!(fetched.created_by, "bob");
}

#[tokio::test]
async fn assign_role_replaces_previous_grant() {
  let s = store().await;
  let f = fixture(&s).await;

  s.assign_role(f.project.id, "alice".into(), Role::ReadOnly).await.unwrap();
  assert_eq!(
    s.role_for(f.project.id, "alice".into()).await.unwrap(),
    Some(Role::ReadOnly)
  );

  s.assign_role(f.project.id, "alice".into(), Role::Editor).await.unwrap();
  assert_eq!(
    s.role_for(f.project.id, "alice".into()).await.unwrap(),
    Some(Role::Editor)
  );
}

#[tokio::test]
async fn form_in_missing_project_is_rejected() {
  let s = store().await;
  let err = s
    .create_form(NewForm { project_id: 42, title: "t".into(), id_string: "t".into() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ProjectNotFound(42)));
  assert!(!err.is_conflict());
}

#[tokio::test]
async fn duplicate_id_string_is_a_conflict() {
  let s = store().await;
  let f = fixture(&s).await;
  let err = s
    .create_form(NewForm {
      project_id: f.project.id,
      title:      "again".into(),
      id_string:  "transportation_2011_07_25".into(),
    })
    .await
    .unwrap_err();
  assert!(err.is_conflict(), "{err}");
}

#[tokio::test]
async fn dataview_inherits_project_from_form() {
  let s = store().await;
  let f = fixture(&s).await;

  let dv = s.get_dataview(f.dataview.id).await.unwrap().unwrap();
  assert_eq!(dv.project_id, f.project.id);
  assert_eq!(dv.columns, ["age", "_submitted_time"]);

  let err = s
    .create_dataview(NewDataView { form_id: 999, name: "x".into(), columns: vec![] })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::FormNotFound(999)));
}

#[tokio::test]
async fn lookup_owner_per_kind() {
  let s = store().await;
  let f = fixture(&s).await;

  assert_eq!(s.lookup_owner(OwnerKind::Form, f.form.id).await.unwrap(), Some(f.form));
  assert_eq!(
    s.lookup_owner(OwnerKind::DataView, f.dataview.id).await.unwrap(),
    Some(f.dataview)
  );
  assert_eq!(
    s.lookup_owner(OwnerKind::Project, f.project.id).await.unwrap(),
    Some(f.project)
  );
  assert_eq!(s.lookup_owner(OwnerKind::Form, 999).await.unwrap(), None);
}

// ─── Reference resolution ────────────────────────────────────────────────────

#[tokio::test]
async fn resolves_form_and_dataview_references() {
  let s = store().await;
  let f = fixture(&s).await;
  let widgets = ReferenceResolver::for_widgets();

  let form_ref = format!("http://testserver/api/v1/forms/{}", f.form.id);
  assert_eq!(widgets.resolve(&form_ref, &s).await.unwrap(), f.form);

  let dv_ref = format!("http://testserver/api/v1/dataviews/{}", f.dataview.id);
  let owner = widgets.resolve(&dv_ref, &s).await.unwrap();
  assert_eq!(owner, f.dataview);
  assert_eq!(owner.project_id, f.form.project_id);
}

#[tokio::test]
async fn project_reference_is_unsupported_for_widgets() {
  let s = store().await;
  let f = fixture(&s).await;

  let reference = format!("http://testserver/api/v1/projects/{}", f.project.id);
  let err = ReferenceResolver::for_widgets()
    .resolve(&reference, &s)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    ResolveError::Reference(CoreError::UnsupportedReferenceKind(ref r)) if *r == reference
  ));

  // Metadata accepts projects.
  let owner = ReferenceResolver::for_metadata()
    .resolve(&reference, &s)
    .await
    .unwrap();
  assert_eq!(owner, f.project);
}

#[tokio::test]
async fn missing_entity_is_reference_not_found() {
  let s = store().await;
  fixture(&s).await;

  let err = ReferenceResolver::for_widgets()
    .resolve("http://testserver/api/v1/forms/999", &s)
    .await
    .unwrap_err();
  assert!(matches!(err, ResolveError::Reference(CoreError::ReferenceNotFound(_))));
}

// ─── Metadata upsert ─────────────────────────────────────────────────────────

#[tokio::test]
async fn create_metadata() {
  let s = store().await;
  let f = fixture(&s).await;

  let before = count_metadata(&s, f.form, DataType::EnketoUrl).await;
  metadata::enketo_url(&s, f.form, Some(ENKETO_URL)).await.unwrap();
  assert_eq!(count_metadata(&s, f.form, DataType::EnketoUrl).await, before + 1);
}

#[tokio::test]
async fn saving_same_metadata_twice_keeps_one_record() {
  let s = store().await;
  let f = fixture(&s).await;

  let first = s
    .upsert_metadata(f.form, MetaDataFields::new(DataType::EnketoUrl, ENKETO_URL))
    .await
    .unwrap();
  assert!(first.created);
  assert_eq!(count_metadata(&s, f.form, DataType::EnketoUrl).await, 1);

  let second = s
    .upsert_metadata(f.form, MetaDataFields::new(DataType::EnketoUrl, ENKETO_URL))
    .await
    .unwrap();
  assert!(!second.created);
  assert_eq!(second.record.id, first.record.id);
  assert_eq!(count_metadata(&s, f.form, DataType::EnketoUrl).await, 1);
}

#[tokio::test]
async fn unique_type_for_owner_updates_value_in_place() {
  let s = store().await;
  let f = fixture(&s).await;

  let md = metadata::unique_type_for_owner(&s, f.form, DataType::EnketoUrl, ENKETO_URL)
    .await
    .unwrap();
  let md_1 = metadata::unique_type_for_owner(
    &s,
    f.form,
    DataType::EnketoUrl,
    "https://dmerm.enketo.org/webform",
  )
  .await
  .unwrap();

  assert_ne!(md.data_value, md_1.data_value);
  assert_eq!(md.data_type, md_1.data_type);
  assert_eq!(md.owner, md_1.owner);
  assert_eq!(md.id, md_1.id);
  assert!(md_1.updated_at >= md.updated_at);
  assert_eq!(md_1.created_at, md.created_at);
}

#[tokio::test]
async fn upsert_keeps_display_fields_unless_given() {
  let s = store().await;
  let f = fixture(&s).await;

  let mut fields = MetaDataFields::new(DataType::Source, "v1");
  fields.data_title = Some("Source".into());
  s.upsert_metadata(f.form, fields).await.unwrap();

  let up = s
    .upsert_metadata(f.form, MetaDataFields::new(DataType::Source, "v2"))
    .await
    .unwrap();
  assert_eq!(up.record.data_value, "v2");
  assert_eq!(up.record.data_title.as_deref(), Some("Source"));
}

#[tokio::test]
async fn keys_are_per_owner_and_type() {
  let s = store().await;
  let f = fixture(&s).await;

  for owner in [f.form, f.dataview, f.project] {
    s.upsert_metadata(owner, MetaDataFields::new(DataType::EnketoUrl, ENKETO_URL))
      .await
      .unwrap();
  }
  s.upsert_metadata(f.form, MetaDataFields::new(DataType::FormLicense, "CC-BY"))
    .await
    .unwrap();

  let all = s.list_metadata(&MetaDataQuery::default()).await.unwrap();
  assert_eq!(all.len(), 4);
  assert_eq!(count_metadata(&s, f.form, DataType::EnketoUrl).await, 1);
  assert_eq!(count_metadata(&s, f.dataview, DataType::EnketoUrl).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_upserts_on_one_key_produce_one_record() {
  let s = store().await;
  let f = fixture(&s).await;

  let handles: Vec<_> = (0..32)
    .map(|i| {
      let s = s.clone();
      let owner = f.form;
      tokio::spawn(async move {
        s.upsert_metadata(
          owner,
          MetaDataFields::new(DataType::EnketoUrl, format!("https://enketo/{i}")),
        )
        .await
      })
    })
    .collect();

  let mut created = 0;
  for h in handles {
    if h.await.unwrap().unwrap().created {
      created += 1;
    }
  }
  assert_eq!(created, 1);
  assert_eq!(count_metadata(&s, f.form, DataType::EnketoUrl).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_connections_on_one_file_produce_one_record() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("race.db");

  let a = SqliteStore::open(&path).await.unwrap();
  let f = fixture(&a).await;
  let b = SqliteStore::open(&path).await.unwrap();

  let race = |s: SqliteStore, tag: &'static str| {
    let owner = f.form;
    tokio::spawn(async move {
      let mut created = 0;
      for i in 0..10 {
        let up = s
          .upsert_metadata(
            owner,
            MetaDataFields::new(DataType::EnketoUrl, format!("{tag}-{i}")),
          )
          .await
          .unwrap();
        if up.created {
          created += 1;
        }
      }
      created
    })
  };

  let (ca, cb) = tokio::join!(race(a.clone(), "a"), race(b.clone(), "b"));
  assert_eq!(ca.unwrap() + cb.unwrap(), 1);
  assert_eq!(count_metadata(&a, f.form, DataType::EnketoUrl).await, 1);
  assert_eq!(count_metadata(&b, f.form, DataType::EnketoUrl).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_connections_can_both_create_forms_and_dataviews() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("forms.db");

  let a = SqliteStore::open(&path).await.unwrap();
  let f = fixture(&a).await;
  let b = SqliteStore::open(&path).await.unwrap();

  let race = |s: SqliteStore, tag: &'static str| {
    let project_id = f.project.id;
    let form_id = f.form.id;
    tokio::spawn(async move {
      let mut form_ids = Vec::new();
      for i in 0..10 {
        let form = s
          .create_form(NewForm {
            project_id,
            title: format!("{tag} {i}"),
            id_string: format!("{tag}_{i}"),
          })
          .await
          .unwrap();
        s.create_dataview(NewDataView {
          form_id,
          name: format!("{tag} view {i}"),
          columns: vec![],
        })
        .await
        .unwrap();
        form_ids.push(form.id);
      }
      form_ids
    })
  };

  let (ra, rb) = tokio::join!(race(a.clone(), "a"), race(b.clone(), "b"));
  let mut ids = ra.unwrap();
  ids.extend(rb.unwrap());
  ids.sort_unstable();
  ids.dedup();
  assert_eq!(ids.len(), 20);
  for id in ids {
    assert!(b.get_form(id).await.unwrap().is_some());
  }
}

// ─── Metadata update / delete / list ─────────────────────────────────────────

#[tokio::test]
async fn partial_metadata_update_merges() {
  let s = store().await;
  let f = fixture(&s).await;

  let md = metadata::form_license(&s, f.form, Some("CC-BY")).await.unwrap().unwrap();
  let updated = s
    .update_metadata(md.id, MetaDataChanges {
      data_title: Some("License".into()),
      ..Default::default()
    })
    .await
    .unwrap()
    .unwrap();

  assert_eq!(updated.data_value, "CC-BY");
  assert_eq!(updated.data_type, DataType::FormLicense);
  assert_eq!(updated.data_title.as_deref(), Some("License"));

  assert!(s.update_metadata(999, MetaDataChanges::default()).await.unwrap().is_none());
}

#[tokio::test]
async fn retyping_onto_an_existing_key_is_a_conflict() {
  let s = store().await;
  let f = fixture(&s).await;

  metadata::form_license(&s, f.form, Some("CC-BY")).await.unwrap();
  let data = metadata::data_license(&s, f.form, Some("ODbL")).await.unwrap().unwrap();

  let err = s
    .update_metadata(data.id, MetaDataChanges {
      data_type: Some(DataType::FormLicense),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(err.is_conflict(), "{err}");

  // Nothing changed.
  let still = s.get_metadata(data.id).await.unwrap().unwrap();
  assert_eq!(still.data_type, DataType::DataLicense);
}

#[tokio::test]
async fn delete_removes_only_the_target() {
  let s = store().await;
  let f = fixture(&s).await;

  let a = metadata::enketo_url(&s, f.form, Some(ENKETO_URL)).await.unwrap().unwrap();
  metadata::source(&s, f.form, Some("src")).await.unwrap();
  metadata::enketo_url(&s, f.dataview, Some(ENKETO_URL)).await.unwrap();

  assert!(s.delete_metadata(a.id).await.unwrap());
  assert!(!s.delete_metadata(a.id).await.unwrap());

  let form_md = s
    .list_metadata(&MetaDataQuery { owner: Some(f.form.key()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(form_md.len(), 1);
  assert_eq!(form_md[0].data_type, DataType::Source);
  assert_eq!(count_metadata(&s, f.dataview, DataType::EnketoUrl).await, 1);
}

#[tokio::test]
async fn upsert_after_delete_gets_a_new_identity() {
  let s = store().await;
  let f = fixture(&s).await;

  let first = metadata::enketo_url(&s, f.form, Some(ENKETO_URL)).await.unwrap().unwrap();
  s.delete_metadata(first.id).await.unwrap();

  let again = s
    .upsert_metadata(f.form, MetaDataFields::new(DataType::EnketoUrl, ENKETO_URL))
    .await
    .unwrap();
  assert!(again.created);
  assert_ne!(again.record.id, first.id);
  assert!(s.get_metadata(first.id).await.unwrap().is_none());
}

#[tokio::test]
async fn listing_is_narrowed_to_granted_projects() {
  let s = store().await;
  let f = fixture(&s).await;
  metadata::enketo_url(&s, f.form, Some(ENKETO_URL)).await.unwrap();

  let as_user = |user: &str| MetaDataQuery {
    visible_to: Some(user.to_owned()),
    ..Default::default()
  };

  assert_eq!(s.list_metadata(&as_user("bob")).await.unwrap().len(), 1);
  assert_eq!(s.list_metadata(&as_user("alice")).await.unwrap().len(), 0);

  s.assign_role(f.project.id, "alice".into(), Role::ReadOnly).await.unwrap();
  assert_eq!(s.list_metadata(&as_user("alice")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn getters_return_current_value() {
  let s = store().await;
  let f = fixture(&s).await;

  assert!(metadata::enketo_preview_url(&s, f.form, None).await.unwrap().is_none());
  metadata::enketo_preview_url(&s, f.form, Some("https://preview")).await.unwrap();
  let current = metadata::enketo_preview_url(&s, f.form, None).await.unwrap().unwrap();
  assert_eq!(current.data_value, "https://preview");
}

#[tokio::test]
async fn public_link_toggles() {
  let s = store().await;
  let f = fixture(&s).await;

  assert!(!metadata::public_link(&s, f.form, None).await.unwrap());
  assert!(metadata::public_link(&s, f.form, Some(true)).await.unwrap());
  assert!(metadata::public_link(&s, f.form, None).await.unwrap());
  assert!(!metadata::public_link(&s, f.form, Some(false)).await.unwrap());
  assert_eq!(count_metadata(&s, f.form, DataType::PublicLink).await, 1);
}

// ─── Widgets ─────────────────────────────────────────────────────────────────

fn chart(owner: Owner, column: &str) -> NewWidget {
  NewWidget::new(owner, WidgetType::Charts, ViewType::HorizontalBar, column)
}

#[tokio::test]
async fn widgets_get_keys_and_append_order() {
  let s = store().await;
  let f = fixture(&s).await;

  let w1 = s.create_widget(chart(f.form, "_submitted_time")).await.unwrap();
  let w2 = s.create_widget(chart(f.form, "age")).await.unwrap();
  let w3 = s.create_widget(chart(f.dataview, "age")).await.unwrap();

  assert_eq!(w1.key.len(), 32);
  assert_ne!(w1.key, w2.key);
  assert_eq!((w1.order, w2.order), (0, 1));
  assert_eq!(w3.order, 0);
  assert_eq!(w1.metadata, serde_json::json!({}));

  let fetched = s.get_widget(w2.id).await.unwrap().unwrap();
  assert_eq!(fetched.column, "age");
  assert_eq!(fetched.owner, f.form);
}

#[tokio::test]
async fn widget_partial_update_keeps_other_fields() {
  let s = store().await;
  let f = fixture(&s).await;
  let w = s.create_widget(chart(f.form, "_submitted_time")).await.unwrap();

  let patched = s
    .update_widget(w.id, WidgetChanges { column: Some("today".into()), ..Default::default() })
    .await
    .unwrap()
    .unwrap();

  assert_eq!(patched.column, "today");
  assert_eq!(patched.widget_type, WidgetType::Charts);
  assert_eq!(patched.view_type, ViewType::HorizontalBar);
  assert_eq!(patched.key, w.key);
  assert!(s.update_widget(999, WidgetChanges::default()).await.unwrap().is_none());
}

#[tokio::test]
async fn widget_full_update_can_move_owner() {
  let s = store().await;
  let f = fixture(&s).await;
  let resident = s.create_widget(chart(f.dataview, "name")).await.unwrap();
  let w = s.create_widget(chart(f.form, "age")).await.unwrap();
  assert_eq!((resident.order, w.order), (0, 0));

  let mut replacement = chart(f.dataview, "age");
  replacement.view_type = ViewType::Pie;
  replacement.title = Some("Ages".into());
  let moved = s.update_widget(w.id, replacement.into()).await.unwrap().unwrap();

  assert_eq!(moved.owner, f.dataview);
  assert_eq!(moved.view_type, ViewType::Pie);
  assert_eq!(moved.title.as_deref(), Some("Ages"));
  assert_eq!(moved.order, 1);
  assert_ne!(moved.order, resident.order);
  assert_eq!(count_widgets(&s, f.form).await, 0);
  assert_eq!(count_widgets(&s, f.dataview).await, 2);
}

#[tokio::test]
async fn widget_update_on_same_owner_keeps_order() {
  let s = store().await;
  let f = fixture(&s).await;
  s.create_widget(chart(f.form, "a")).await.unwrap();
  let w = s.create_widget(chart(f.form, "b")).await.unwrap();
  s.create_widget(chart(f.form, "c")).await.unwrap();
  assert_eq!(w.order, 1);

  let replaced = s.update_widget(w.id, chart(f.form, "bb").into()).await.unwrap().unwrap();
  assert_eq!(replaced.order, 1);

  let patched = s
    .update_widget(w.id, WidgetChanges { owner: Some(f.form), ..Default::default() })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(patched.order, 1);
}

#[tokio::test]
async fn widget_delete_is_scoped() {
  let s = store().await;
  let f = fixture(&s).await;
  let w = s.create_widget(chart(f.form, "a")).await.unwrap();
  s.create_widget(chart(f.form, "b")).await.unwrap();
  s.create_widget(chart(f.dataview, "a")).await.unwrap();

  let before = count_widgets(&s, f.form).await;
  assert!(s.delete_widget(w.id).await.unwrap());
  assert_eq!(count_widgets(&s, f.form).await, before - 1);
  assert_eq!(count_widgets(&s, f.dataview).await, 1);
  assert!(s.get_widget(w.id).await.unwrap().is_none());
  assert!(!s.delete_widget(w.id).await.unwrap());
}

#[tokio::test]
async fn widget_listing_is_narrowed_to_granted_projects() {
  let s = store().await;
  let f = fixture(&s).await;
  s.create_widget(chart(f.form, "a")).await.unwrap();
  s.create_widget(chart(f.dataview, "a")).await.unwrap();

  let other = s.create_project("other".into(), "carol".into()).await.unwrap();
  let other_form = s
    .create_form(NewForm { project_id: other.id, title: "o".into(), id_string: "o".into() })
    .await
    .unwrap();
  s.create_widget(chart(Owner::from(&other_form), "x")).await.unwrap();

  let visible = |user: &str| WidgetQuery { owner: None, visible_to: Some(user.to_owned()) };
  assert_eq!(s.list_widgets(&visible("bob")).await.unwrap().len(), 2);
  assert_eq!(s.list_widgets(&visible("carol")).await.unwrap().len(), 1);
  assert_eq!(s.list_widgets(&visible("alice")).await.unwrap().len(), 0);
  assert_eq!(s.list_widgets(&WidgetQuery::default()).await.unwrap().len(), 3);
}
