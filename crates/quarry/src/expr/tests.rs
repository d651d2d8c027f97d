use super::*;
use crate::{
    entity::{EntityKind, EntityRef, FieldDef, FieldKind},
    plan::{NullOrder, OrderDirection},
    value::Value,
};

struct Widget;

impl EntityKind for Widget {
    const ENTITY: &'static str = "widget";
    const PRIMARY_KEY: &'static str = "id";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::new("id", FieldKind::Int),
        FieldDef::new("label", FieldKind::Text),
        FieldDef::new("weight", FieldKind::Float),
    ];
}

fn widget() -> EntityRef<Widget> {
    EntityRef::aliased("w")
}

#[test]
fn comparison_builds_bound_literal() {
    let predicate = widget().path::<i64>("id").eq(7);

    assert_eq!(
        predicate.node(),
        &ExprNode::Compare {
            op: CompareOp::Eq,
            lhs: Box::new(ExprNode::Path {
                alias: "w".to_string(),
                field: "id".to_string(),
            }),
            rhs: Box::new(ExprNode::Literal(Value::Int(7))),
        }
    );
}

#[test]
fn expr_operands_compare_paths() {
    let label = widget().path::<String>("label");
    let predicate = label.eq(&label.lower());

    assert_eq!(predicate.to_string(), "w.label = lower(w.label)");
}

#[test]
fn in_list_renders_one_placeholder_per_element() {
    let predicate = widget().path::<i64>("id").in_([1i64, 2, 3]);

    assert_eq!(predicate.to_string(), "w.id in (?, ?, ?)");
}

#[test]
fn precedence_parenthesizes_or_under_and() {
    let id = widget().path::<i64>("id");
    let a = id.eq(1);
    let b = id.eq(2);
    let c = id.eq(3);

    assert_eq!(
        (a | b).and(c).to_string(),
        "(w.id = ? or w.id = ?) and w.id = ?"
    );
}

#[test]
fn and_under_or_needs_no_parens() {
    let id = widget().path::<i64>("id");
    let joined = id.eq(1).and(id.eq(2)).or(id.eq(3));

    assert_eq!(joined.to_string(), "w.id = ? and w.id = ? or w.id = ?");
}

#[test]
fn arithmetic_binds_tighter_than_comparison() {
    let id = widget().path::<i64>("id");
    let predicate = id.add(1).mul(&id).gt(10);

    assert_eq!(predicate.to_string(), "(w.id + ?) * w.id > ?");
}

#[test]
fn is_not_null_renders_compactly() {
    let label = widget().path::<String>("label");

    assert_eq!(label.is_null().to_string(), "w.label is null");
    assert_eq!(label.is_not_null().to_string(), "w.label is not null");
}

#[test]
fn template_substitutes_positional_bound_args() {
    let expr: Expr<String> = string_template(
        "function('replace', {0}, {1}, {2})",
        [
            widget().path::<String>("label").into(),
            lit("old"),
            lit("new"),
        ],
    );

    assert_eq!(expr.to_string(), "function('replace', w.label, ?, ?)");
}

#[test]
fn template_passes_malformed_markers_through() {
    let expr: Expr<String> = string_template("concat({0}, {9}, {x})", [lit("a")]);

    assert_eq!(expr.to_string(), "concat(?, {9}, {x})");
}

#[test]
fn aggregates_are_detected_through_nesting() {
    let weight = widget().path::<f64>("weight");

    assert!(weight.sum().node().contains_aggregate());
    assert!(weight.avg().add(1.0).node().contains_aggregate());
    assert!(!weight.add(1.0).node().contains_aggregate());
}

#[test]
fn subquery_contents_do_not_leak_aggregate_detection() {
    let weight = widget().path::<f64>("weight");
    let sub = subselect(weight.max()).from(&widget());

    // The outer comparison holds a subquery, not an aggregate of its own.
    let predicate = weight.eq(sub);
    assert!(!predicate.node().contains_aggregate());
}

#[test]
fn projection_names_come_from_alias_or_path_tail() {
    let label = widget().path::<String>("label");

    assert_eq!(label.node().projection_name(), Some("label"));
    assert_eq!(
        label.clone().alias("name").node().projection_name(),
        Some("name")
    );
    assert_eq!(label.lower().node().projection_name(), None);
}

#[test]
fn entity_count_aggregates_the_source() {
    let count = widget().count();

    assert_eq!(count.to_string(), "count(w)");
    assert!(count.node().contains_aggregate());
}

#[test]
fn order_specs_carry_explicit_null_policy() {
    let spec = widget().path::<String>("label").asc().nulls_last();

    assert_eq!(spec.direction, OrderDirection::Asc);
    assert_eq!(spec.nulls, NullOrder::Last);
}
