//! Browser automation operations for `browser` sandboxes.
//!
//! Each method maps to `/tools/browser_<op>` on the sandbox's Playwright
//! tool server and returns its JSON reply unchanged.

use crate::error::Result;
use crate::session::SandboxSession;
use serde_json::{json, Map, Value};

impl SandboxSession {
    /// Open a URL in the current tab.
    pub async fn browser_navigate(&self, url: &str) -> Result<Value> {
        self.call_tool("browser_navigate", &json!({ "url": url }))
            .await
    }

    /// Go back in history.
    pub async fn browser_navigate_back(&self) -> Result<Value> {
        self.call_tool("browser_navigate_back", &json!({})).await
    }

    /// Go forward in history.
    pub async fn browser_navigate_forward(&self) -> Result<Value> {
        self.call_tool("browser_navigate_forward", &json!({})).await
    }

    /// Click an element.
    ///
    /// `element` is a human-readable description, `reference` the element
    /// ref from the last snapshot.
    pub async fn browser_click(&self, element: &str, reference: &str) -> Result<Value> {
        self.call_tool(
            "browser_click",
            &json!({ "element": element, "ref": reference }),
        )
        .await
    }

    /// Type text into an element, optionally pressing Enter afterwards.
    pub async fn browser_type(
        &self,
        element: &str,
        reference: &str,
        text: &str,
        submit: bool,
    ) -> Result<Value> {
        self.call_tool(
            "browser_type",
            &json!({ "element": element, "ref": reference, "text": text, "submit": submit }),
        )
        .await
    }

    /// Hover over an element.
    pub async fn browser_hover(&self, element: &str, reference: &str) -> Result<Value> {
        self.call_tool(
            "browser_hover",
            &json!({ "element": element, "ref": reference }),
        )
        .await
    }

    /// Select options in a dropdown.
    pub async fn browser_select_option(
        &self,
        element: &str,
        reference: &str,
        values: &[&str],
    ) -> Result<Value> {
        self.call_tool(
            "browser_select_option",
            &json!({ "element": element, "ref": reference, "values": values }),
        )
        .await
    }

    /// Press a key such as `ArrowLeft` or `a`.
    pub async fn browser_press_key(&self, key: &str) -> Result<Value> {
        self.call_tool("browser_press_key", &json!({ "key": key }))
            .await
    }

    /// Wait for a number of seconds, or for text to appear or disappear.
    pub async fn browser_wait_for(
        &self,
        time: Option<f64>,
        text: Option<&str>,
        text_gone: Option<&str>,
    ) -> Result<Value> {
        let mut params = Map::new();
        if let Some(time) = time {
            params.insert("time".into(), json!(time));
        }
        if let Some(text) = text {
            params.insert("text".into(), json!(text));
        }
        if let Some(text_gone) = text_gone {
            params.insert("textGone".into(), json!(text_gone));
        }
        self.call_tool("browser_wait_for", &params).await
    }

    /// Accessibility snapshot of the current page.
    pub async fn browser_snapshot(&self) -> Result<Value> {
        self.call_tool("browser_snapshot", &json!({})).await
    }

    /// Screenshot of the page, or of the whole scrollable page with `full_page`.
    pub async fn browser_take_screenshot(
        &self,
        filename: Option<&str>,
        full_page: bool,
    ) -> Result<Value> {
        let mut params = Map::new();
        params.insert("fullPage".into(), json!(full_page));
        if let Some(filename) = filename {
            params.insert("filename".into(), json!(filename));
        }
        self.call_tool("browser_take_screenshot", &params).await
    }

    /// Resize the browser window.
    pub async fn browser_resize(&self, width: u32, height: u32) -> Result<Value> {
        self.call_tool(
            "browser_resize",
            &json!({ "width": width, "height": height }),
        )
        .await
    }

    /// Close the page.
    pub async fn browser_close(&self) -> Result<Value> {
        self.call_tool("browser_close", &json!({})).await
    }

    /// Open a new tab, optionally at a URL.
    pub async fn browser_tab_new(&self, url: Option<&str>) -> Result<Value> {
        let params = match url {
            Some(url) => json!({ "url": url }),
            None => json!({}),
        };
        self.call_tool("browser_tab_new", &params).await
    }

    /// List open tabs.
    pub async fn browser_tab_list(&self) -> Result<Value> {
        self.call_tool("browser_tab_list", &json!({})).await
    }

    /// Switch to a tab by index.
    pub async fn browser_tab_select(&self, index: u32) -> Result<Value> {
        self.call_tool("browser_tab_select", &json!({ "index": index }))
            .await
    }

    /// Close a tab by index, or the current tab.
    pub async fn browser_tab_close(&self, index: Option<u32>) -> Result<Value> {
        let params = match index {
            Some(index) => json!({ "index": index }),
            None => json!({}),
        };
        self.call_tool("browser_tab_close", &params).await
    }

    /// Save the page as PDF.
    pub async fn browser_pdf_save(&self, filename: Option<&str>) -> Result<Value> {
        let params = match filename {
            Some(filename) => json!({ "filename": filename }),
            None => json!({}),
        };
        self.call_tool("browser_pdf_save", &params).await
    }

    /// Accept or dismiss a dialog.
    pub async fn browser_handle_dialog(
        &self,
        accept: bool,
        prompt_text: Option<&str>,
    ) -> Result<Value> {
        let mut params = Map::new();
        params.insert("accept".into(), json!(accept));
        if let Some(text) = prompt_text {
            params.insert("promptText".into(), json!(text));
        }
        self.call_tool("browser_handle_dialog", &params).await
    }

    /// Upload files to the active file chooser.
    pub async fn browser_file_upload(&self, paths: &[&str]) -> Result<Value> {
        self.call_tool("browser_file_upload", &json!({ "paths": paths }))
            .await
    }

    /// Console messages logged by the page.
    pub async fn browser_console_messages(&self) -> Result<Value> {
        self.call_tool("browser_console_messages", &json!({})).await
    }

    /// Network requests made since the page loaded.
    pub async fn browser_network_requests(&self) -> Result<Value> {
        self.call_tool("browser_network_requests", &json!({})).await
    }

    /// Drag one element onto another.
    pub async fn browser_drag(
        &self,
        start_element: &str,
        start_ref: &str,
        end_element: &str,
        end_ref: &str,
    ) -> Result<Value> {
        self.call_tool(
            "browser_drag",
            &json!({
                "startElement": start_element,
                "startRef": start_ref,
                "endElement": end_element,
                "endRef": end_ref,
            }),
        )
        .await
    }

    /// Generate a Playwright test from a scenario.
    pub async fn browser_generate_playwright_test(
        &self,
        name: &str,
        description: &str,
        steps: &[&str],
    ) -> Result<Value> {
        self.call_tool(
            "browser_generate_playwright_test",
            &json!({ "name": name, "description": description, "steps": steps }),
        )
        .await
    }
}
