mod common;

use common::{COSTS_HEADER, PRODUCTIONS_HEADER, simple_batch, write_export};
use margin_calculator::pipeline;
use margin_calculator::{Config, NodeKey, ResolutionState};
use rust_decimal::Decimal;
use tempfile::TempDir;

#[test]
fn resolves_semi_finished_through_source_order() {
    margin_calculator::logging::init_test();
    let tmp = TempDir::new().unwrap();
    let (productions, costs) = simple_batch(&tmp);

    let run = pipeline::run(&productions, &costs, &Config::default()).unwrap();

    assert_eq!(run.index.get(&NodeKey::new("OF1", "SEM01")), Some(Decimal::new(6, 0)));
    assert_eq!(run.index.get(&NodeKey::new("OF2", "PT01")), Some(Decimal::new(29, 0)));
    assert_eq!(run.report.counts().resolved, 2);
    assert_eq!(run.corrected, 0);

    let orders: Vec<&str> = run.order_costs.iter().map(|o| o.order_id.as_str()).collect();
    assert_eq!(orders, vec!["OF1", "OF2"]);
}

#[test]
fn invalid_codes_are_dropped_before_resolution() {
    let tmp = TempDir::new().unwrap();
    let costs = write_export(&tmp, "costes.csv", COSTS_HEADER, &["MAT01;3,00;2024-001"]);
    let productions = write_export(
        &tmp,
        "fabricaciones.csv",
        PRODUCTIONS_HEADER,
        &[
            "OF1;01/03/2024;PT01;L1;5;MAT01;2024-001;2",
            "OF2;01/03/2024;PT02;L2;5;not-a-code;2024-001;2",
        ],
    );

    let run = pipeline::run(&productions, &costs, &Config::default()).unwrap();

    assert_eq!(run.productions.validation.initial_size, 2);
    assert_eq!(run.productions.validation.final_size, 1);
    assert_eq!(run.report.entries().len(), 1);
    assert_eq!(run.index.get(&NodeKey::new("OF1", "PT01")), Some(Decimal::new(6, 0)));
}

#[test]
fn missing_purchase_price_leaves_order_unresolvable() {
    let tmp = TempDir::new().unwrap();
    let costs = write_export(&tmp, "costes.csv", COSTS_HEADER, &["MAT01;3,00;2024-001"]);
    let productions = write_export(
        &tmp,
        "fabricaciones.csv",
        PRODUCTIONS_HEADER,
        &[
            "OF1;01/03/2024;PT01;L1;5;MAT01;2024-001;2",
            "OF2;02/03/2024;PT02;L2;5;MAT01;2024-001;1",
            "OF2;02/03/2024;PT02;L2;5;MAT09;2024-999;1",
        ],
    );

    let run = pipeline::run(&productions, &costs, &Config::default()).unwrap();

    let failed: Vec<_> = run.report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].key, NodeKey::new("OF2", "PT02"));
    assert_eq!(failed[0].state, ResolutionState::Unresolvable);
    assert_eq!(failed[0].reasons, vec!["missing raw cost for MAT09".to_string()]);

    // The order summary only carries resolved orders
    assert_eq!(run.order_costs.len(), 1);
    assert_eq!(run.order_costs[0].order_id, "OF1");
}

#[test]
fn circular_semi_finished_lots_are_reported() {
    let tmp = TempDir::new().unwrap();
    let costs = write_export(&tmp, "costes.csv", COSTS_HEADER, &["MAT01;1,00;2024-001"]);
    let productions = write_export(
        &tmp,
        "fabricaciones.csv",
        PRODUCTIONS_HEADER,
        &[
            "OF1;01/03/2024;SEMA01;LA;1;SEMB01;LB;1",
            "OF2;01/03/2024;SEMB01;LB;1;SEMA01;LA;1",
            "OF3;02/03/2024;PT01;LP;1;MAT01;2024-001;4",
        ],
    );

    let run = pipeline::run(&productions, &costs, &Config::default()).unwrap();

    assert_eq!(run.report.counts().circular, 2);
    assert_eq!(run.report.cycles().len(), 1);
    assert_eq!(run.index.get(&NodeKey::new("OF3", "PT01")), Some(Decimal::new(4, 0)));
}

#[test]
fn missing_export_column_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let (productions, _) = simple_batch(&tmp);
    let costs = write_export(&tmp, "costes_sin_lote.csv", "Cód. artículo;PRCMONEDA", &["MAT01;3,00"]);

    let err = pipeline::run(&productions, &costs, &Config::default()).unwrap_err();
    assert!(format!("{:#}", err).contains("LOTEINTERNO"));
}

#[test]
fn empty_quantity_rows_are_dropped_and_reported() {
    let tmp = TempDir::new().unwrap();
    let costs = write_export(&tmp, "costes.csv", COSTS_HEADER, &["MAT01;3,00;2024-001"]);
    let productions = write_export(
        &tmp,
        "fabricaciones.csv",
        PRODUCTIONS_HEADER,
        &[
            "OF1;01/03/2024;PT01;L1;5;MAT01;2024-001;2",
            "OF1;01/03/2024;PT01;L1;5;MAT01;2024-001;",
        ],
    );

    let run = pipeline::run(&productions, &costs, &Config::default()).unwrap();

    let drop_na = run
        .productions
        .transformations
        .steps
        .iter()
        .find(|s| s.operation == "drop_na")
        .unwrap();
    assert_eq!((drop_na.rows_before, drop_na.rows_after), (2, 1));
    assert_eq!(run.index.get(&NodeKey::new("OF1", "PT01")), Some(Decimal::new(6, 0)));
}
