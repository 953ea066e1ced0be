use super::error::FilterError;
use super::types::{ColumnWhitelist, FilterOrderInfo, OrderInput, SortDirection};
use crate::database::manager::DatabaseManager;

pub struct FilterOrder;

impl FilterOrder {
    /// Validate sort keys against the table's columns, keeping caller order.
    pub fn parse(inputs: &[OrderInput], columns: &ColumnWhitelist) -> Result<Vec<FilterOrderInfo>, FilterError> {
        inputs
            .iter()
            .filter(|i| !i.column.trim().is_empty())
            .map(|i| {
                Ok(FilterOrderInfo {
                    column: columns.resolve(&i.column)?.to_string(),
                    sort: SortDirection::parse(i.direction.as_deref()),
                })
            })
            .collect()
    }

    /// Query-string form: `order_by=a,b` with one shared `order_dir`.
    pub fn from_query(order_by: Option<&str>, order_dir: Option<&str>) -> Vec<OrderInput> {
        order_by
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|column| OrderInput { column: column.to_string(), direction: order_dir.map(str::to_string) })
            .collect()
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("{} {}", DatabaseManager::quote_identifier(&i.column), i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
