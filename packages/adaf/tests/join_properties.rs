//! Property tests for the join engine, natural ordering and raster shape.

use adaf::model::natural::{natural_cmp, sort_naturally};
use adaf::{
    Attributes, Column, ColumnData, DataContainer, Fill, HJoinPolicy, Raster, Split, Stack, Table,
    VJoinOptions, VSplitOptions, BASIS_NAME,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn int_table(name: &str, values: Vec<i64>) -> Table {
    let mut t = Table::new();
    t.set_column(name, values).unwrap();
    t
}

fn split_by(index: &str) -> VSplitOptions {
    VSplitOptions {
        input_index: Some(index.to_string()),
        remove_fill: true,
    }
}

// ---------------------------------------------------------------------------
// Natural ordering
// ---------------------------------------------------------------------------

#[test]
fn natural_order_of_signal_names() {
    let mut keys = vec!["sig2", "sig10", "sig1"];
    sort_naturally(&mut keys);
    assert_eq!(keys, vec!["sig1", "sig2", "sig10"]);
}

proptest! {
    #[test]
    fn natural_order_follows_numbers(prefix in "[a-z]{0,4}", a in 0u32..100_000, b in 0u32..100_000) {
        let left = format!("{prefix}{a}");
        let right = format!("{prefix}{b}");
        prop_assert_eq!(natural_cmp(&left, &right), a.cmp(&b));
    }

    #[test]
    fn natural_order_is_total(mut names in prop::collection::vec("[a-c]{1,2}[0-9]{0,3}", 0..12)) {
        sort_naturally(&mut names);
        for pair in names.windows(2) {
            prop_assert_ne!(natural_cmp(&pair[0], &pair[1]), std::cmp::Ordering::Greater);
        }
    }
}

// ---------------------------------------------------------------------------
// vjoin / vsplit
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn vsplit_undoes_vjoin(
        parts in prop::collection::vec(prop::collection::vec(-1000i64..1000, 1..6), 1..6)
    ) {
        let tables: Vec<Table> = parts.iter().map(|v| int_table("x", v.clone())).collect();
        let refs: Vec<&Table> = tables.iter().collect();
        let joined = Table::vjoin(&refs, &VJoinOptions::indexed("idx")).unwrap();
        prop_assert_eq!(joined.number_of_rows(), parts.iter().map(Vec::len).sum::<usize>());

        let split = joined.vsplit(&split_by("idx")).unwrap();
        prop_assert_eq!(split.len(), tables.len());
        for (i, (key, table)) in split.iter().enumerate() {
            prop_assert_eq!(*key, i as i64);
            prop_assert_eq!(table.column("x").unwrap().data(), tables[i].column("x").unwrap().data());
        }
    }

    #[test]
    fn vsplit_undoes_filled_vjoin(a in prop::collection::vec(0.0f64..1.0, 1..5), b in prop::collection::vec(-50i64..50, 1..5)) {
        let mut left = Table::new();
        left.set_column("a", a.clone()).unwrap();
        let right = int_table("b", b.clone());
        let options = VJoinOptions { fill: Fill::Fill, ..VJoinOptions::indexed("idx") };
        let joined = Table::vjoin(&[&left, &right], &options).unwrap();

        let split = joined.vsplit(&split_by("idx")).unwrap();
        prop_assert_eq!(split.len(), 2);
        prop_assert_eq!(split[0].1.column_names().collect::<Vec<_>>(), vec!["a"]);
        prop_assert_eq!(split[1].1.column_names().collect::<Vec<_>>(), vec!["b"]);
        prop_assert_eq!(split[0].1.column("a").unwrap().data(), &ColumnData::Float(a));
        prop_assert_eq!(split[1].1.column("b").unwrap().data(), &ColumnData::Int(b));
    }

    #[test]
    fn hjoin_columns_are_union(
        left in prop::collection::btree_set("[a-e]", 0..5),
        right in prop::collection::btree_set("[a-e]", 0..5)
    ) {
        let mut a = Table::new();
        for name in &left {
            a.set_column(name, vec![1i64]).unwrap();
        }
        let mut b = Table::new();
        for name in &right {
            b.set_column(name, vec![2i64]).unwrap();
        }
        adaf::join::table::hjoin(&mut a, &b, HJoinPolicy::default()).unwrap();
        let mut names: Vec<&str> = a.column_names().collect();
        names.sort_unstable();
        let expected: Vec<&str> = left.union(&right).map(String::as_str).collect();
        prop_assert_eq!(names, expected);
    }
}

#[test]
fn empty_input_reserves_index_values() {
    let mut raster = Raster::new("r");
    raster
        .create_basis(vec![0.01f64, 0.02, 0.03], Attributes::new())
        .unwrap();
    raster
        .create_signal("Amount", vec![1i64, 2, 3], Attributes::new())
        .unwrap();
    let flat = raster.to_table(Some("t")).unwrap();
    let empty = Table::new();

    let options = VJoinOptions {
        minimum_increment: 1,
        ..VJoinOptions::indexed("idx")
    };
    let joined = Table::vjoin(&[&empty, &flat], &options).unwrap();
    assert_eq!(joined.column("t").unwrap().len(), 3);
    assert_eq!(
        joined.column("idx").unwrap().data(),
        &ColumnData::Int(vec![1, 1, 1])
    );
}

// ---------------------------------------------------------------------------
// Raster shape
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn basis_and_signals_share_length(basis_len in 0usize..6, signal_len in 0usize..6) {
        let mut raster = Raster::new("r");
        raster.create_basis(vec![0.0f64; basis_len], Attributes::new()).unwrap();
        let created = raster.create_signal("y", vec![1i64; signal_len], Attributes::new());
        prop_assert_eq!(created.is_ok(), basis_len == signal_len);
        for ts in raster.signals() {
            prop_assert_eq!(Some(ts.y().len()), ts.t().map(Column::len));
        }
    }

    #[test]
    fn container_round_trip_keeps_raster_lengths(rows in prop::collection::vec(1usize..5, 1..4)) {
        let inputs: Vec<DataContainer> = rows
            .iter()
            .map(|&n| {
                let mut c = DataContainer::new();
                let raster = c.sys.create("s").unwrap().create("r").unwrap();
                raster.create_basis((0..n).map(|i| i as f64).collect::<Vec<_>>(), Attributes::new()).unwrap();
                raster.create_signal("y", vec![7i64; n], Attributes::new()).unwrap();
                c
            })
            .collect();
        let refs: Vec<&DataContainer> = inputs.iter().collect();
        let options = adaf::ContainerVJoinOptions {
            table: VJoinOptions::indexed("idx"),
            include_rasters: true,
            ..Default::default()
        };
        let (joined, _) = DataContainer::vjoin(&refs, &options).unwrap();
        let raster = joined.sys.get("s").unwrap().raster("r").unwrap();
        prop_assert_eq!(raster.basis().unwrap().len(), raster.number_of_rows());

        let parts = joined
            .vsplit(&adaf::ContainerVSplitOptions {
                split: split_by("idx"),
                require_index: false,
                include_rasters: true,
            })
            .unwrap();
        prop_assert_eq!(parts.len(), rows.len());
        for ((_, part), &n) in parts.iter().zip(&rows) {
            let r = part.sys.get("s").unwrap().raster("r").unwrap();
            prop_assert_eq!(r.number_of_rows(), n);
            prop_assert_eq!(r.basis().unwrap().len(), n);
        }
    }
}

#[test]
fn reserved_basis_name_rejected_before_write() {
    let mut raster = Raster::new("r");
    let err = raster
        .create_signal(BASIS_NAME, vec![1.0f64], Attributes::new())
        .unwrap_err();
    assert_eq!(err.code(), "RESERVED_NAME");
    assert!(!raster.has_basis());
    assert_eq!(raster.number_of_columns(), 0);
}
