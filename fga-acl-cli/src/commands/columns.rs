use colored::Colorize;
use fga_acl::table::{ColumnSpec, ColumnType, COLUMNS};
use fga_acl::TABLE_NAME;

/// Print the table schema.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", TABLE_NAME.bold());
    println!();
    for line in describe() {
        println!("  {}", line);
    }
    Ok(())
}

/// One aligned line per column: name, type, key marker and description.
pub fn describe() -> Vec<String> {
    let width = COLUMNS.iter().map(|c| c.name.len()).max().unwrap_or(0);
    COLUMNS.iter().map(|c| line(c, width)).collect()
}

fn line(column: &ColumnSpec, width: usize) -> String {
    let kind = match column.kind {
        ColumnType::String => "string",
        ColumnType::Bool => "bool",
        ColumnType::Timestamp => "timestamp",
    };
    let key = if column.key { "key" } else { "" };
    format!(
        "{:<width$}  {:<9}  {:<3}  {}",
        column.name,
        kind,
        key,
        column.description,
        width = width
    )
}
