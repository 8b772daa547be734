#[cfg(test)]
mod tests {
    use screentime::agent::categorizer::Categorizer;
    use screentime::agent::config::Category;
    use std::collections::HashMap;

    fn categorizer() -> Categorizer {
        let mut categories = HashMap::new();
        categories.insert(
            "homework".to_string(),
            Category {
                domains: vec!["khanacademy.org".to_string()],
                domain_suffixes: vec![".edu".to_string()],
            },
        );
        Categorizer::new(categories)
    }

    #[test]
    fn test_exact_domain_match() {
        assert_eq!(categorizer().categorize("khanacademy.org"), "homework");
    }

    #[test]
    fn test_subdomain_matches_on_label_boundary() {
        let c = categorizer();
        // The agent strips "www." before categorizing, but any other
        // subdomain still matches through the suffix-boundary rule.
        assert_eq!(c.categorize("es.khanacademy.org"), "homework");
        // Not a boundary match: no dot before the listed domain.
        assert_eq!(c.categorize("khanacademyfoo.org"), "uncategorized");
        assert_eq!(c.categorize("fookhanacademy.org"), "uncategorized");
    }

    #[test]
    fn test_raw_suffix_match() {
        let c = categorizer();
        assert_eq!(c.categorize("mit.edu"), "homework");
        assert_eq!(c.categorize("cs.stanford.edu"), "homework");
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(categorizer().categorize("KhanAcademy.ORG"), "homework");
    }

    #[test]
    fn test_unmatched_and_empty_domains() {
        let c = categorizer();
        assert_eq!(c.categorize("example.com"), "uncategorized");
        assert_eq!(c.categorize(""), "uncategorized");
    }
}
