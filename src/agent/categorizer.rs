use crate::agent::config::Category;
use std::collections::HashMap;

pub const UNCATEGORIZED: &str = "uncategorized";

/// Translates browser domains into category names.
///
/// Iteration over categories is map-ordered; overlapping rules have no
/// defined winner.
pub struct Categorizer {
    categories: HashMap<String, Category>,
}

impl Categorizer {
    pub fn new(categories: HashMap<String, Category>) -> Self {
        Categorizer { categories }
    }

    /// Returns the category name for a domain, or `uncategorized`.
    ///
    /// A domain matches a category when it equals a listed domain, ends
    /// with `"." + domain` (so subdomains match on a label boundary), or
    /// ends with a listed raw suffix.
    pub fn categorize(&self, domain: &str) -> String {
        if domain.is_empty() {
            return UNCATEGORIZED.to_string();
        }

        let domain = domain.to_lowercase();

        for (name, category) in &self.categories {
            for d in &category.domains {
                let d = d.to_lowercase();
                if domain == d || domain.ends_with(&format!(".{d}")) {
                    return name.clone();
                }
            }
            for suffix in &category.domain_suffixes {
                if domain.ends_with(&suffix.to_lowercase()) {
                    return name.clone();
                }
            }
        }

        UNCATEGORIZED.to_string()
    }
}
