mod common;

use std::sync::Arc;

use common::{StubSource, dashboard_with, fields, sales_table};
use salesboard::error::DashboardError;

fn seeded() -> Arc<StubSource> {
    Arc::new(StubSource::with_table(sales_table(&[
        ("Mouse", 10.0, "Periféricos"),
        ("Monitor", 2.0, "Monitores"),
        ("Mouse", 5.0, "Periféricos"),
    ])))
}

#[tokio::test]
async fn add_rejects_invalid_input_without_touching_store() {
    let dashboard = dashboard_with(seeded(), false, false).await;

    for (product, quantity, category) in [
        ("", "1", "Periféricos"),
        ("   ", "1", "Periféricos"),
        ("Mouse", "0", "Periféricos"),
        ("Mouse", "-1", "Periféricos"),
        ("Mouse", "dez", "Periféricos"),
        ("Mouse", "1", ""),
    ] {
        let err = dashboard.add_record(product, quantity, category).await.unwrap_err();
        assert!(matches!(err, DashboardError::Validation(_)));
        assert!(err.is_client_error());
    }

    let too_long = "c".repeat(51);
    let err = dashboard.add_record("Mouse", "1", &too_long).await.unwrap_err();
    assert!(matches!(err, DashboardError::Validation(_)));

    assert!(dashboard.records().await.unwrap().is_empty());
}

#[tokio::test]
async fn add_assigns_increasing_ids() {
    let dashboard = dashboard_with(seeded(), false, false).await;
    let a = dashboard.add_record("Teclado", "4", "Periféricos").await.unwrap();
    let b = dashboard.add_record(" Webcam ", " 2 ", " Vídeo ").await.unwrap();

    assert!(b.id > a.id);
    assert_eq!(b.product, "Webcam");
    assert_eq!(b.quantity, 2);
    assert_eq!(b.category, "Vídeo");
}

#[tokio::test]
async fn delete_by_id() {
    let dashboard = dashboard_with(seeded(), false, false).await;
    dashboard.reload().await.unwrap();
    let records = dashboard.records().await.unwrap();

    let removed = dashboard.delete(&records[1].id.to_string()).await.unwrap();
    assert_eq!(removed, records[1]);
    assert_eq!(dashboard.records().await.unwrap().len(), 2);

    let err = dashboard.delete_by_id(records[1].id).await.unwrap_err();
    assert!(matches!(err, DashboardError::NotFound(_)));
}

#[tokio::test]
async fn non_numeric_id_is_not_found() {
    let dashboard = dashboard_with(seeded(), false, false).await;
    dashboard.reload().await.unwrap();

    let err = dashboard.delete("Mouse").await.unwrap_err();
    assert!(matches!(err, DashboardError::NotFound(_)));
    assert_eq!(dashboard.records().await.unwrap().len(), 3);
}

#[tokio::test]
async fn legacy_delete_removes_first_match_only() {
    let dashboard = dashboard_with(seeded(), false, true).await;
    dashboard.reload().await.unwrap();

    let removed = dashboard.delete("Mouse").await.unwrap();
    assert_eq!(removed.quantity, 10);
    assert_eq!(
        fields(&dashboard).await,
        vec![
            ("Monitor".to_string(), 2, "Monitores".to_string()),
            ("Mouse".to_string(), 5, "Periféricos".to_string()),
        ]
    );

    let err = dashboard.delete("Impressora").await.unwrap_err();
    assert!(matches!(err, DashboardError::NotFound(_)));
}

#[tokio::test]
async fn write_back_receives_full_table_after_mutations() {
    let source = seeded();
    let dashboard = dashboard_with(source.clone(), true, false).await;
    dashboard.reload().await.unwrap();
    assert_eq!(source.write_count(), 0);

    dashboard.add_record("Teclado", "4", "Periféricos").await.unwrap();
    let written = source.last_write().unwrap();
    assert_eq!(written.rows.len(), 4);
    assert_eq!(written.rows[3].product, "Teclado");

    let first = dashboard.records().await.unwrap()[0].id;
    dashboard.delete_by_id(first).await.unwrap();
    let written = source.last_write().unwrap();
    assert_eq!(written.rows.len(), 3);
    assert_eq!(written.rows[0].product, "Monitor");
    assert_eq!(source.write_count(), 2);
}

#[tokio::test]
async fn write_back_is_skipped_when_disabled() {
    let source = seeded();
    let dashboard = dashboard_with(source.clone(), false, false).await;

    dashboard.add_record("Teclado", "4", "Periféricos").await.unwrap();
    dashboard.delete_by_product("Teclado").await.unwrap();
    assert_eq!(source.write_count(), 0);
}

#[tokio::test]
async fn failed_write_back_keeps_the_mutation() {
    let source = Arc::new(
        StubSource::with_table(sales_table(&[("Mouse", 10.0, "Periféricos")])).failing_writes(),
    );
    let dashboard = dashboard_with(source.clone(), true, false).await;

    let created = dashboard.add_record("Teclado", "4", "Periféricos").await.unwrap();
    assert_eq!(source.write_count(), 1);
    assert_eq!(dashboard.records().await.unwrap(), vec![created.clone()]);

    dashboard.delete_by_id(created.id).await.unwrap();
    assert_eq!(source.write_count(), 2);
    assert!(dashboard.records().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_mutation_does_not_write_back() {
    let source = seeded();
    let dashboard = dashboard_with(source.clone(), true, false).await;

    assert!(dashboard.add_record("", "1", "x").await.is_err());
    assert!(dashboard.delete("999").await.is_err());
    assert_eq!(source.write_count(), 0);
}

#[tokio::test]
async fn health_reports_ok_on_live_store() {
    let dashboard = dashboard_with(seeded(), false, false).await;
    dashboard.health().await.unwrap();
}
