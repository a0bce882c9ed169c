use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{
        document::{PriceDocument, PriceInterval},
        registry::Registry,
        sensor::SensorSet,
    },
    quantity::CubicMeterPrice,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

fn value_cell(value: Option<CubicMeterPrice>) -> Cell {
    value.map_or_else(
        || Cell::new("unavailable").add_attribute(Attribute::Dim),
        |value| Cell::new(value).set_alignment(CellAlignment::Right),
    )
}

pub fn build_registry_table(registry: &Registry) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Identifier", "Name", "Value"]);
    for (identifier, entry) in registry {
        table.add_row(vec![
            Cell::new(identifier).add_attribute(Attribute::Dim),
            Cell::new(&entry.display_name),
            value_cell(entry.value),
        ]);
    }
    table
}

pub fn build_sensors_table(sensors: &SensorSet) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Identifier", "Name", "Value", "Unit", "Updated"]);
    for view in sensors.iter() {
        table.add_row(vec![
            Cell::new(view.identifier()).add_attribute(Attribute::Dim),
            Cell::new(view.display_name()),
            if view.is_available() {
                value_cell(view.current_value())
            } else {
                Cell::new("never fetched").fg(Color::Red)
            },
            Cell::new(view.unit()).add_attribute(Attribute::Dim),
            view.last_updated().map_or_else(
                || Cell::new("never").fg(Color::Red),
                |updated_at| {
                    Cell::new(updated_at.format("%b %d %H:%M:%S")).add_attribute(Attribute::Dim)
                },
            ),
        ]);
    }
    table
}

pub fn build_costs_table(interval: &PriceInterval) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Additional cost", "Identifier", "Excl. VAT", "Incl. VAT"]);
    for cost in &interval.additional_costs {
        table.add_row(vec![
            Cell::new(&cost.name),
            Cell::new(cost.slug()).add_attribute(Attribute::Dim),
            Cell::new(cost.price_excl_vat).set_alignment(CellAlignment::Right),
            Cell::new(cost.price_incl_vat).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn build_intervals_table(document: &PriceDocument) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Date",
        "Start",
        "End",
        "Type",
        "Excl. VAT",
        "Incl. VAT",
        "VAT",
        "Costs",
    ]);
    for item in document.intervals() {
        let price_cell = |price: Option<CubicMeterPrice>| {
            let cell = value_cell(price);
            if item.is_average { cell.add_attribute(Attribute::Italic) } else { cell }
        };
        table.add_row(vec![
            Cell::new(item.interval.start.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(item.interval.start.format("%H:%M")),
            Cell::new(item.interval.end.format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(if item.is_average {
                format!("{} (average)", item.kind)
            } else {
                item.kind.clone()
            }),
            price_cell(item.price_excl_vat),
            price_cell(item.price_incl_vat).fg(
                if item.price_incl_vat > Some(document.average_incl_vat()) {
                    Color::Red
                } else {
                    Color::Green
                },
            ),
            Cell::new(item.vat_rate).set_alignment(CellAlignment::Right),
            Cell::new(item.additional_costs.len()).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
