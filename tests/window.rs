#[cfg(test)]
mod tests {
    use screentime::agent::window::{parse_support_information, WindowInfo};

    fn window(title: &str, class: &str) -> WindowInfo {
        WindowInfo {
            title: title.to_string(),
            class: class.to_string(),
            instance: class.to_lowercase(),
        }
    }

    #[test]
    fn test_is_browser_matches_known_classes() {
        assert!(window("Mozilla Firefox", "firefox").is_browser());
        assert!(window("New Tab", "Chromium-browser").is_browser());
        assert!(window("site", "Brave-browser").is_browser());
        assert!(!window("vim", "Alacritty").is_browser());
        assert!(!window("", "").is_browser());
    }

    #[test]
    fn test_is_idle_uses_case_insensitive_substring() {
        let patterns = vec!["screensaver".to_string(), "lock screen".to_string()];
        assert!(window("XScreenSaver", "xscreensaver").is_idle(&patterns));
        assert!(window("GNOME Lock Screen", "gnome-shell").is_idle(&patterns));
        assert!(!window("Document - LibreOffice", "libreoffice").is_idle(&patterns));
        assert!(!window("anything", "anything").is_idle(&[]));
    }

    #[test]
    fn test_is_ignored_matches_instance_or_class_exactly() {
        let ignored = vec!["1password".to_string()];
        assert!(window("1Password", "1Password").is_ignored(&ignored));
        assert!(!window("1Password - Vault", "1Password-helper").is_ignored(&ignored));
    }

    #[test]
    fn test_parse_support_information_extracts_active_window() {
        let info = "\
Windows\n\
=======\n\
Window #0:\n\
  caption: Background Task\n\
  resourceClass: worker\n\
Active Window:\n\
  caption: Mozilla Firefox\n\
  resourceClass: firefox\n\
\n\
Compositing\n";
        let window = parse_support_information(info).unwrap();
        assert_eq!(window.title, "Mozilla Firefox");
        assert_eq!(window.class, "firefox");
        assert_eq!(window.instance, "firefox");
    }

    #[test]
    fn test_parse_support_information_without_active_window() {
        assert!(parse_support_information("Windows\n=======\nWindow #0:\n  caption: x\n").is_none());
        assert!(parse_support_information("").is_none());
    }
}
