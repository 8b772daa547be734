//! Active-window detection over the session D-Bus.
//!
//! GNOME Shell answers an `Eval` of a small focus-window script; KWin is
//! probed with a fallback chain of best-effort strategies (direct caption
//! query, then `supportInformation` parsing). Returning "no focused
//! window" is a valid outcome of every strategy.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

const BROWSER_CLASSES: [&str; 7] = ["firefox", "chromium", "chrome", "brave", "brave-browser", "vivaldi", "opera"];

const GNOME_FOCUS_SCRIPT: &str = r#"
(function() {
    const win = global.display.focus_window;
    if (!win) return JSON.stringify({});
    return JSON.stringify({
        title: win.get_title() || '',
        wmClass: win.get_wm_class() || ''
    });
})()
"#;

/// The focused window.
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub title: String,
    /// WM_CLASS class name as reported by the compositor.
    pub class: String,
    /// Lowercased class, used for matching.
    pub instance: String,
}

impl WindowInfo {
    pub fn is_browser(&self) -> bool {
        let lower = self.instance.to_lowercase();
        BROWSER_CLASSES.iter().any(|b| lower == *b || lower.contains(b))
    }

    /// True when the title matches any configured idle pattern
    /// (case-insensitive substring).
    pub fn is_idle(&self, patterns: &[String]) -> bool {
        let title = self.title.to_lowercase();
        patterns.iter().any(|pattern| title.contains(&pattern.to_lowercase()))
    }

    pub fn is_ignored(&self, ignored_windows: &[String]) -> bool {
        let instance = self.instance.to_lowercase();
        let class = self.class.to_lowercase();
        ignored_windows.iter().any(|ignored| {
            let ignored = ignored.to_lowercase();
            instance == ignored || class == ignored
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compositor {
    Gnome,
    Kwin,
}

/// Queries the compositor for the focused window.
pub struct WindowProbe {
    conn: zbus::Connection,
    compositor: Compositor,
}

impl WindowProbe {
    pub async fn connect() -> Result<Self> {
        let conn = zbus::Connection::session().await.context("connect to session bus")?;
        let compositor = detect_compositor(&conn)
            .await
            .ok_or_else(|| anyhow!("unsupported compositor: could not detect GNOME or KWin"))?;
        Ok(WindowProbe { conn, compositor })
    }

    pub fn compositor(&self) -> Compositor {
        self.compositor
    }

    pub async fn active_window(&self) -> Result<Option<WindowInfo>> {
        match self.compositor {
            Compositor::Gnome => self.detect_gnome().await,
            Compositor::Kwin => self.detect_kwin().await,
        }
    }

    async fn detect_gnome(&self) -> Result<Option<WindowInfo>> {
        let reply = self
            .conn
            .call_method(Some("org.gnome.Shell"), "/org/gnome/Shell", Some("org.gnome.Shell"), "Eval", &(GNOME_FOCUS_SCRIPT,))
            .await
            .context("gnome shell eval")?;

        let (success, output): (bool, String) = reply.body().deserialize().context("decode gnome shell eval reply")?;
        if !success {
            bail!("gnome shell eval failed: {output}");
        }

        // Eval returns a JSON string, sometimes double-encoded.
        let json = match serde_json::from_str::<String>(&output) {
            Ok(inner) => inner,
            Err(_) => output,
        };
        parse_window_json(&json)
    }

    async fn detect_kwin(&self) -> Result<Option<WindowInfo>> {
        // Strategy 1: the active window caption, where KWin exposes it.
        if let Ok(reply) = self.conn.call_method(Some("org.kde.KWin"), "/KWin", Some("org.kde.KWin"), "caption", &()).await {
            if let Ok(caption) = reply.body().deserialize::<String>() {
                if !caption.is_empty() {
                    return Ok(Some(WindowInfo {
                        title: caption,
                        class: String::new(),
                        instance: String::new(),
                    }));
                }
            }
        }

        // Strategy 2: parse the active window out of supportInformation.
        let reply = self
            .conn
            .call_method(Some("org.kde.KWin"), "/KWin", Some("org.kde.KWin"), "supportInformation", &())
            .await
            .context("kwin support information")?;
        let info: String = reply.body().deserialize().context("decode kwin support information")?;
        Ok(parse_support_information(&info))
    }
}

async fn detect_compositor(conn: &zbus::Connection) -> Option<Compositor> {
    let desktop = std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default().to_lowercase();
    if desktop.contains("gnome") {
        return Some(Compositor::Gnome);
    }
    if desktop.contains("kde") || desktop.contains("plasma") {
        return Some(Compositor::Kwin);
    }

    // Fall back to probing the bus for a known compositor service.
    if service_available(conn, "org.gnome.Shell").await {
        return Some(Compositor::Gnome);
    }
    if service_available(conn, "org.kde.KWin").await {
        return Some(Compositor::Kwin);
    }

    None
}

async fn service_available(conn: &zbus::Connection, service: &str) -> bool {
    let reply = conn
        .call_method(Some("org.freedesktop.DBus"), "/org/freedesktop/DBus", Some("org.freedesktop.DBus"), "ListNames", &())
        .await;
    match reply {
        Ok(msg) => msg
            .body()
            .deserialize::<Vec<String>>()
            .map(|names| names.iter().any(|name| name == service))
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[derive(Debug, Default, Deserialize)]
struct WindowJson {
    #[serde(default)]
    title: String,
    #[serde(rename = "wmClass", default)]
    wm_class: String,
}

fn parse_window_json(raw: &str) -> Result<Option<WindowInfo>> {
    let data: WindowJson = serde_json::from_str(raw).context("parse window info")?;
    if data.title.is_empty() && data.wm_class.is_empty() {
        return Ok(None);
    }
    let instance = data.wm_class.to_lowercase();
    Ok(Some(WindowInfo {
        title: data.title,
        class: data.wm_class,
        instance,
    }))
}

/// Extracts the active window's caption and resource class from KWin's
/// `supportInformation` dump.
pub fn parse_support_information(info: &str) -> Option<WindowInfo> {
    let mut in_active_window = false;
    let mut title = String::new();
    let mut wm_class = String::new();

    for line in info.lines() {
        let line = line.trim();
        if line.starts_with("Active Window:") || line.contains("active: true") {
            in_active_window = true;
            continue;
        }
        if in_active_window {
            if let Some(rest) = line.strip_prefix("caption:") {
                title = rest.trim().to_string();
            }
            if let Some(rest) = line.strip_prefix("resourceClass:") {
                wm_class = rest.trim().to_string();
            }
            if (line.starts_with("Window #") || line.is_empty()) && (!title.is_empty() || !wm_class.is_empty()) {
                break;
            }
        }
    }

    if title.is_empty() && wm_class.is_empty() {
        return None;
    }

    let instance = wm_class.to_lowercase();
    Some(WindowInfo {
        title,
        class: wm_class,
        instance,
    })
}
