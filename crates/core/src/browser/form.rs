use scraper::{ElementRef, Selector};
use url::Url;

use super::{BrowserError, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

/// An HTML form read from a page, ready to fill and submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    /// Absolute submission URL.
    pub action: Url,
    pub method: FormMethod,
    fields: Vec<(String, String)>,
}

impl Form {
    pub fn new(action: Url, method: FormMethod, fields: Vec<(String, String)>) -> Self {
        Self {
            action,
            method,
            fields,
        }
    }

    /// Read the first form matching `selector` from `page`.
    ///
    /// Collects named inputs with their current values (checked boxes only,
    /// the selected or first option of each select) plus the name/value of
    /// the first named submit button.
    pub fn from_page(page: &Page, selector: &str) -> Result<Self, BrowserError> {
        let form_sel = parse_selector(selector)?;
        let field_sel = parse_selector("input, textarea, select")?;
        let option_sel = parse_selector("option")?;

        let document = page.document();
        let form = document
            .select(&form_sel)
            .next()
            .ok_or_else(|| BrowserError::FormNotFound(selector.to_string()))?;

        let action_raw = form.value().attr("action").unwrap_or("");
        let action = page
            .url
            .join(action_raw)
            .map_err(|e| BrowserError::InvalidUrl {
                url: action_raw.to_string(),
                reason: e.to_string(),
            })?;

        let method = match form.value().attr("method") {
            Some(m) if m.eq_ignore_ascii_case("post") => FormMethod::Post,
            _ => FormMethod::Get,
        };

        let mut fields = Vec::new();
        let mut button: Option<(String, String)> = None;

        for field in form.select(&field_sel) {
            let Some(name) = field.value().attr("name").filter(|n| !n.is_empty()) else {
                continue;
            };
            let value = field.value().attr("value").unwrap_or("").to_string();

            match field.value().name() {
                "textarea" => fields.push((name.to_string(), element_text(&field))),
                "select" => {
                    let selected = field
                        .select(&option_sel)
                        .find(|o| o.value().attr("selected").is_some())
                        .or_else(|| field.select(&option_sel).next());
                    let value = selected
                        .map(|o| {
                            o.value()
                                .attr("value")
                                .map(str::to_string)
                                .unwrap_or_else(|| element_text(&o))
                        })
                        .unwrap_or_default();
                    fields.push((name.to_string(), value));
                }
                _ => {
                    let kind = field
                        .value()
                        .attr("type")
                        .unwrap_or("text")
                        .to_ascii_lowercase();
                    match kind.as_str() {
                        "submit" | "image" => {
                            if button.is_none() {
                                button = Some((name.to_string(), value));
                            }
                        }
                        "button" | "reset" => {}
                        "checkbox" | "radio" => {
                            if field.value().attr("checked").is_some() {
                                fields.push((name.to_string(), value));
                            }
                        }
                        _ => fields.push((name.to_string(), value)),
                    }
                }
            }
        }

        if button.is_none() {
            let button_sel = parse_selector("button")?;
            button = form.select(&button_sel).find_map(|b| {
                let kind = b.value().attr("type").unwrap_or("submit");
                let name = b.value().attr("name").filter(|n| !n.is_empty())?;
                kind.eq_ignore_ascii_case("submit").then(|| {
                    (
                        name.to_string(),
                        b.value().attr("value").unwrap_or("").to_string(),
                    )
                })
            });
        }
        fields.extend(button);

        Ok(Self::new(action, method, fields))
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an existing field. Fields the form doesn't declare are rejected.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), BrowserError> {
        let slot = self
            .fields
            .iter_mut()
            .find(|(k, _)| k == name)
            .ok_or_else(|| BrowserError::FieldNotFound(name.to_string()))?;
        slot.1 = value.into();
        Ok(())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector).map_err(|e| BrowserError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
