//! Interactive format selection (dialoguer)

use dialoguer::{Select, theme::ColorfulTheme};

use super::format_table::format_label;
use crate::core::catalog::FormatCatalog;
use crate::types::{MenuItem, ResolvedFormat};

/// Menu entries for every format in `catalog`
pub fn menu_items(catalog: &FormatCatalog) -> Vec<MenuItem<ResolvedFormat>> {
    catalog
        .formats
        .iter()
        .map(|f| MenuItem {
            label: format_label(f),
            value: f.clone(),
        })
        .collect()
}

/// Ask the user to pick one item; `None` if the menu is empty or dismissed
pub fn select<T: Clone>(items: &[MenuItem<T>], prompt: &str, default: usize) -> Option<T> {
    if items.is_empty() {
        return None;
    }

    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&labels)
        .default(default.min(items.len() - 1))
        .interact_opt()
        .ok()
        .flatten()?;

    items.get(selection).map(|item| item.value.clone())
}

/// Pick a format, preselecting `preferred` when it is in the catalog
pub fn pick_format(catalog: &FormatCatalog, preferred: Option<u32>) -> Option<ResolvedFormat> {
    let items = menu_items(catalog);
    let default = preferred
        .and_then(|itag| items.iter().position(|i| i.value.itag == itag))
        .unwrap_or(0);
    select(&items, "Select format", default)
}
