//! Shared helpers for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo;
use tempfile::TempDir;

pub const COSTS_HEADER: &str = "Cód. artículo;PRCMONEDA;LOTEINTERNO";
pub const PRODUCTIONS_HEADER: &str = "Nº Orden;Fecha Recepción;Producto;Lote Producto;Unidades Fabricadas;Componente;Lote Componente;Consumo Unitario";

/// Helper to get a margin-calculator command
pub fn margin() -> Command {
    Command::new(cargo::cargo_bin!("margin-calculator"))
}

/// Write a semicolon export with the given header into the temp dir
pub fn write_export(tmp: &TempDir, name: &str, header: &str, rows: &[&str]) -> PathBuf {
    let path = tmp.path().join(name);
    let mut text = String::from(header);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(&path, text).unwrap();
    path
}

/// Two raw materials, one semi-finished item and one finished product
///
/// SEM01@OF1 = 2 * 3,00 = 6
/// PT01@OF2  = 3 * SEM01@OF1 + 2 * 5,50 = 29
pub fn simple_batch(tmp: &TempDir) -> (PathBuf, PathBuf) {
    let costs = write_export(
        tmp,
        "costes.csv",
        COSTS_HEADER,
        &["MAT01;3,00;2024-001", "MAT02;5,50;2024-002"],
    );
    let productions = write_export(
        tmp,
        "fabricaciones.csv",
        PRODUCTIONS_HEADER,
        &[
            "OF1;01/03/2024;SEM01;L100;10;MAT01;2024-001;2",
            "OF2;05/03/2024;PT01;L200;20;SEM01;L100;3",
            "OF2;05/03/2024;PT01;L200;20;MAT02;2024-002;2",
        ],
    );
    (productions, costs)
}
