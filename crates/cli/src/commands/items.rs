use raidbook_core::items::{ItemCatalog, MAX_SUGGESTIONS};

use crate::commands::{exit, load_config, CommandResult};

pub fn run(query: &str, limit: usize) -> CommandResult {
    let config = match load_config("items") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let Some(path) = config.items.catalog_path.as_deref() else {
        return CommandResult::failure(
            "items",
            "catalog_unconfigured",
            "items.catalog_path is not set",
            exit::CATALOG,
        );
    };

    let catalog = match ItemCatalog::load(path) {
        Ok(catalog) => catalog,
        Err(error) => {
            return CommandResult::failure("items", "catalog", error.to_string(), exit::CATALOG)
        }
    };

    let matches = catalog.search_by_name(query, limit.clamp(1, MAX_SUGGESTIONS));
    if matches.is_empty() {
        return CommandResult::success("items", format!("no items match `{}`", query.trim()));
    }

    let lines: Vec<String> = matches.iter().map(|item| format!("{} {}", item.id, item.name)).collect();
    CommandResult::success("items", lines.join("\n"))
}
