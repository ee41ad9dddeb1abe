use std::ffi::OsStr;
use std::sync::Arc;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use reqwest::Url;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::AUTH_COOKIE;
use crate::error::{FlattenError, Result};
use crate::session::BrowserSession;

/// Flags that keep a headless Chrome stable inside containers
const CHROME_FLAGS: &[&str] = &[
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--disable-browser-side-navigation",
    "--disable-gpu",
    "--disable-features=VizDisplayCompositor",
];

const WINDOW_SIZE: (u32, u32) = (1920, 1080);

/// Browser session backed by a headless Chrome tab
///
/// All page interaction goes through script evaluation. The driver calls
/// block, so each one runs inside `block_in_place` and needs the
/// multi-threaded runtime.
pub struct ChromeSession {
    // Keeps the browser process alive for as long as the tab is used
    _browser: Browser,
    tab: Arc<Tab>,
    domain: String,
}

impl ChromeSession {
    /// Launch Chrome and authenticate it against the library at `start_url`
    pub fn launch(start_url: &Url, auth_token: &str) -> Result<Self> {
        let domain = start_url
            .host_str()
            .ok_or_else(|| FlattenError::InvalidConfig {
                message: format!("start url '{}' has no host", start_url),
            })?
            .to_string();

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some(WINDOW_SIZE))
            .args(CHROME_FLAGS.iter().map(OsStr::new).collect())
            .build()
            .map_err(FlattenError::browser)?;

        let browser = Browser::new(options).map_err(FlattenError::browser)?;
        let tab = browser.new_tab().map_err(FlattenError::browser)?;

        let cookie: CookieParam = serde_json::from_value(json!({
            "name": AUTH_COOKIE,
            "value": auth_token,
            "domain": domain,
            "path": "/",
            "secure": start_url.scheme() == "https",
        }))?;
        tab.set_cookies(vec![cookie]).map_err(FlattenError::browser)?;

        debug!(domain = %domain, "Launched headless browser");
        Ok(Self {
            _browser: browser,
            tab,
            domain,
        })
    }

    fn evaluate(&self, script: &str) -> Result<Option<Value>> {
        let tab = &self.tab;
        let result = tokio::task::block_in_place(|| tab.evaluate(script, false))
            .map_err(FlattenError::browser)?;
        Ok(result.value.filter(|v| !v.is_null()))
    }
}

/// Quote a string as a JavaScript literal
fn js_string(raw: &str) -> String {
    Value::String(raw.to_string()).to_string()
}

fn class_query(class_name: &str) -> String {
    format!("document.querySelector({})", js_string(&format!(".{}", class_name)))
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let tab = &self.tab;
        tokio::task::block_in_place(|| {
            tab.navigate_to(url)?;
            tab.wait_until_navigated()?;
            Ok::<_, anyhow::Error>(())
        })
        .map_err(FlattenError::browser)
    }

    async fn element_present(&mut self, selector: &str) -> Result<bool> {
        let script = format!("!!document.querySelector({})", js_string(selector));
        Ok(matches!(self.evaluate(&script)?, Some(Value::Bool(true))))
    }

    async fn attribute(&mut self, selector: &str, attribute: &str) -> Result<Option<String>> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.getAttribute({}) : null; }})()",
            js_string(selector),
            js_string(attribute)
        );
        match self.evaluate(&script)? {
            Some(Value::String(value)) => Ok(Some(value)),
            Some(other) => Ok(Some(other.to_string())),
            None => Ok(None),
        }
    }

    async fn attribute_all(
        &mut self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<Option<String>>> {
        let script = format!(
            "JSON.stringify(Array.from(document.querySelectorAll({}), el => el.getAttribute({})))",
            js_string(selector),
            js_string(attribute)
        );
        match self.evaluate(&script)? {
            Some(Value::String(raw)) => Ok(serde_json::from_str(&raw)?),
            other => Err(FlattenError::Browser {
                message: format!("unexpected row query result {:?}", other),
            }),
        }
    }

    async fn scroll_height(&mut self, class_name: &str) -> Result<u64> {
        let script = format!(
            "(() => {{ const el = {}; return el ? el.scrollHeight : null; }})()",
            class_query(class_name)
        );
        self.evaluate(&script)?
            .as_ref()
            .and_then(Value::as_f64)
            .map(|h| h as u64)
            .ok_or_else(|| FlattenError::Browser {
                message: format!("no scrollable element with class '{}'", class_name),
            })
    }

    async fn scroll_by(&mut self, class_name: &str, delta: f64) -> Result<()> {
        // The list element itself does not scroll; its nearest scrollable
        // ancestor (or the body) does.
        let script = format!(
            r#"(() => {{
                function scrollParent(node) {{
                    if (!node) {{
                        return null;
                    }}
                    const overflowY = (node instanceof HTMLElement) && window.getComputedStyle(node).overflowY;
                    const scrollable = overflowY !== "visible" && overflowY !== "hidden";
                    if (scrollable && node.scrollHeight >= node.clientHeight) {{
                        return node;
                    }}
                    return scrollParent(node.parentNode) || document.body;
                }}
                const target = scrollParent({}) || document.body;
                target.scrollTo(0, target.scrollTop + {});
                return true;
            }})()"#,
            class_query(class_name),
            delta
        );
        self.evaluate(&script)?;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        let tab = &self.tab;
        tokio::task::block_in_place(|| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        })
        .map_err(FlattenError::browser)
    }

    fn identifier(&self) -> String {
        format!("chrome://{}", self.domain)
    }
}
