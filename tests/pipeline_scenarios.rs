use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabnorm::cache::{MemoryCache, Principal, ResultCache};
use tabnorm::document::{
    Cell, FormatVerdict, ReadOptions, Rowset, extract_document, sniff_format,
};
use tabnorm::normalize::normalize_rowset;
use tabnorm::pipeline::{Pipeline, Upload, merge_periods};
use tabnorm::schema::{DocumentType, TransformContext, transform};

fn fixture(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(path)
}

fn pipeline() -> (Pipeline, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let pipeline = Pipeline::with_options(cache.clone(), ReadOptions::default(), false);
    (pipeline, cache)
}

fn read_artifact(bytes: &[u8]) -> (Vec<String>, Vec<Vec<String>>) {
    let bytes = bytes.strip_prefix("\u{feff}".as_bytes()).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new().from_reader(bytes);
    let header = reader
        .headers()
        .expect("artifact header")
        .iter()
        .map(str::to_owned)
        .collect();
    let rows = reader
        .records()
        .map(|record| {
            record
                .expect("artifact record")
                .iter()
                .map(str::to_owned)
                .collect()
        })
        .collect();
    (header, rows)
}

fn column(header: &[String], name: &str) -> usize {
    header
        .iter()
        .position(|column| column == name)
        .unwrap_or_else(|| panic!("artifact lacks column {name}: {header:?}"))
}

#[test]
fn html_saved_as_xls_drops_repeated_header_row() {
    let html = "<html><body><table>\
        <tr><td>Codigo</td><td>Nombre</td></tr>\
        <tr><td>Codigo</td><td>Nombre</td></tr>\
        <tr><td>7</td><td>Tienda</td></tr>\
        </table></body></html>";

    let extracted = extract_document(html.as_bytes(), "reporte.xls", &ReadOptions::default())
        .expect("extract disguised html");
    assert_eq!(extracted.verdict, FormatVerdict::HtmlDisguisedSpreadsheet);
    assert_eq!(extracted.rowset.row_count(), 2);

    let normalized = normalize_rowset(&extracted.rowset);
    assert_eq!(normalized.columns(), &["Codigo", "Nombre"]);
    assert_eq!(normalized.row_count(), 1);
    assert_eq!(normalized.rows()[0][1], Cell::text("Tienda"));
}

#[test]
fn pipe_delimited_text_is_reparsed_into_columns() {
    let bytes = b"Codigo|Nombre|Ciudad\n1|Uno|Cali\n2|Dos|Pasto\n";
    assert_eq!(sniff_format(bytes, "csv"), FormatVerdict::DelimitedText);

    let extracted =
        extract_document(bytes, "clientes.csv", &ReadOptions::default()).expect("extract");
    assert_eq!(extracted.delimiter, Some(b'|'));
    assert!(extracted.rowset.column_count() > 1);
    assert_eq!(extracted.rowset.column_values("Ciudad"), Some(vec!["Cali".to_owned(), "Pasto".to_owned()]));
}

#[test]
fn merge_replaces_only_the_incoming_period() {
    let cumulative = Rowset::new(
        vec!["Cliente".to_owned(), "Mes".to_owned()],
        vec![
            vec![Cell::text("1"), Cell::text("Febrero")],
            vec![Cell::text("2"), Cell::text("Enero")],
            vec![Cell::text("3"), Cell::text("Febrero")],
        ],
    )
    .expect("cumulative");
    let incoming = Rowset::new(
        vec!["Cliente".to_owned(), "Mes".to_owned()],
        vec![
            vec![Cell::text("7"), Cell::text("Enero")],
            vec![Cell::text("8"), Cell::text("Enero")],
            vec![Cell::text("9"), Cell::text("Enero")],
        ],
    )
    .expect("incoming");

    let outcome = merge_periods(&cumulative, &incoming, "Mes").expect("merge");
    assert_eq!(
        outcome.rowset.column_values("Mes"),
        Some(
            ["Enero", "Enero", "Enero", "Febrero", "Febrero"]
                .map(str::to_owned)
                .to_vec()
        )
    );
    assert_eq!(
        outcome.rowset.column_values("Cliente"),
        Some(["7", "8", "9", "1", "3"].map(str::to_owned).to_vec())
    );
    assert_eq!(outcome.stats.replaced_rows, 1);
    assert_eq!(outcome.stats.added_rows, 3);
}

#[test]
fn customers_without_city_get_an_empty_city_column() {
    let rowset = Rowset::new(
        vec!["Codigo Ecom".to_owned(), "Segmento".to_owned()],
        vec![vec![Cell::Number(1001.0), Cell::text("Reposicisn")]],
    )
    .expect("rowset");

    let outcome = transform(&rowset, DocumentType::Customers, &TransformContext::default())
        .expect("tolerant customers");
    assert_eq!(outcome.rowset.column_values("Ciudad"), Some(vec![String::new()]));
    assert_eq!(outcome.rowset.column_values("Codigo Ecom"), Some(vec!["1001".to_owned()]));
    assert_eq!(outcome.rowset.column_values("Segmento"), Some(vec!["Reposicion".to_owned()]));
    assert!(outcome.stats.filled_columns.iter().any(|name| name == "Ciudad"));
}

#[test]
fn sales_currency_is_scaled_and_rendered_with_comma() {
    let (pipeline, cache) = pipeline();
    let ana = Principal::new("ana");
    let upload = Upload::from_path(&fixture("tests/fixtures/ventas_enero.csv")).expect("fixture");

    let report = pipeline
        .normalize(&ana, &upload, DocumentType::SalesByMaterial, Some("Enero"))
        .expect("normalize sales");
    assert_eq!(report.artifact.name, "ventas_mes.csv");
    assert_eq!(report.artifact.rows, 2);
    assert_eq!(report.inputs[0].delimiter.as_deref(), Some("|"));

    let entry = cache.get(&ana).expect("get").expect("cached");
    assert!(entry.bytes.starts_with("\u{feff}".as_bytes()));
    let (header, rows) = read_artifact(&entry.bytes);

    assert_eq!(header[1], "Mes");
    assert!(!header.iter().any(|name| name == "Vendedor"));
    let first = &rows[0];
    assert_eq!(first[column(&header, "Mes")], "Enero");
    assert_eq!(first[column(&header, "Venta - IVA")], "15126,00");
    assert_eq!(first[column(&header, "Marca")], "026-Colcafe");
    assert_eq!(first[column(&header, "Categoria")], "10-Cafe");
    assert_eq!(first[column(&header, "Nombre Segmento")], "Reposicion");
    assert_eq!(first[column(&header, "Cod. Asesor")], "15");
    assert_eq!(first[column(&header, "Asesor")], "PEREZ JUAN");
    assert_eq!(first[column(&header, "Ciudad")], "MEDELLIN");
    assert_eq!(rows[1][column(&header, "Venta - IVA")], "0,99");
    assert_eq!(rows[1][column(&header, "Categoria")], "09-Bebidas de chocolate");
}

#[test]
fn displays_fixture_filters_classifies_and_deduplicates() {
    let (pipeline, cache) = pipeline();
    let ana = Principal::new("ana");
    let upload = Upload::from_path(&fixture("tests/fixtures/exhibidores.xls")).expect("fixture");

    let report = pipeline
        .normalize(&ana, &upload, DocumentType::Displays, None)
        .expect("normalize displays");
    let stats = report.transform.expect("transform stats");
    assert_eq!(stats.filtered_rows, 2);
    assert_eq!(stats.duplicate_rows, 1);

    let entry = cache.get(&ana).expect("get").expect("cached");
    assert_eq!(
        String::from_utf8(entry.bytes.clone()).expect("utf-8"),
        "Numero,Cod. Cliente,Num. Comodato,Estado,Tipo,Categoria\n10,500,C1,A,NEVERA VERTICAL,Nevera\n"
    );
}

#[test]
fn merge_fixture_keeps_other_periods() {
    let (pipeline, cache) = pipeline();
    let ana = Principal::new("ana");
    let cumulative =
        Upload::from_path(&fixture("tests/fixtures/ventas_acum.csv")).expect("cumulative");
    let period =
        Upload::from_path(&fixture("tests/fixtures/ventas_mes_enero.csv")).expect("period");

    let report = pipeline.merge(&ana, &cumulative, &period).expect("merge");
    let merge = report.merge.expect("merge stats");
    assert_eq!(merge.period.as_deref(), Some("Enero"));
    assert_eq!(merge.replaced_rows, 2);
    assert_eq!(merge.added_rows, 3);

    let entry = cache.get(&ana).expect("get").expect("cached");
    let (header, rows) = read_artifact(&entry.bytes);
    assert_eq!(header, ["Cliente", "Mes", "Venta - IVA"]);
    let clients: Vec<&str> = rows.iter().map(|row| row[0].as_str()).collect();
    assert_eq!(clients, ["300", "301", "302", "201", "203"]);
    assert_eq!(rows[3][2], "20,00");
}

#[test]
fn written_fixture_roundtrips_through_the_cache_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = Arc::new(tabnorm::cache::DirCache::new(dir.path()));
    let pipeline = Pipeline::with_options(cache.clone(), ReadOptions::default(), false);
    let ana = Principal::new("ana");

    let upload = Upload::new(
        "exhibidores.xls",
        fs::read(fixture("tests/fixtures/exhibidores.xls")).expect("fixture"),
    );
    let report = pipeline
        .normalize(&ana, &upload, DocumentType::Displays, None)
        .expect("normalize");

    let reopened = tabnorm::cache::DirCache::new(dir.path());
    let entry = reopened.get(&ana).expect("get").expect("persisted");
    assert_eq!(entry.metadata.content_hash, report.artifact.content_hash);
    assert_eq!(entry.metadata.name, "Exhibidores.csv");
}
